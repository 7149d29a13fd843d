//! Logging initialization.

use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::args::LogArgs;

/// Builds the log filter from the logging flags.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, `RUST_LOG` if set, else a level derived from `-v`
/// 3. Any directives from `--log.filter` are added on top
pub fn env_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.base_level()));

    if let Some(custom_filter) = &args.filter {
        for directive in custom_filter.split(',').filter(|d| !d.trim().is_empty()) {
            match directive.trim().parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(err) => eprintln!("ignoring log directive {directive:?}: {err}"),
            }
        }
    }

    filter
}

/// Installs the global subscriber and prints the startup banner.
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(args));
    let installed = if args.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| eyre::eyre!("failed to install log subscriber: {err}"))?;

    if !args.quiet {
        log_startup_banner();
    }

    Ok(())
}

fn log_startup_banner() {
    println!(
        r#"
 ____                         _   _           _
|  _ \ __ _ _ __   __ _  ___ | | | | ___  ___| |_
| |_) / _` | '_ \ / _` |/ _ \| |_| |/ _ \/ __| __|
|  _ < (_| | | | | (_| |  __/|  _  | (_) \__ \ |_
|_| \_\__,_|_| |_|\__, |\___||_| |_|\___/|___/\__|
                  |___/
 Range Host v{}
"#,
        crate::version::VERSION
    );
}
