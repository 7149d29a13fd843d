//! Arguments of the `node` command.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Args;

use crate::config::NodeConfig;

/// Command line overrides for the host.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq)]
pub struct NodeArgs {
    /// Path to a TOML configuration file.
    #[arg(long, short = 'c', value_name = "PATH", env = "RANGEHOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// UDP port used to talk to the remote nodes.
    #[arg(long = "udp.port", value_name = "PORT")]
    pub udp_port: Option<u16>,

    /// Listen address of the supervisor API.
    #[arg(long = "http.addr", value_name = "ADDR")]
    pub http_addr: Option<IpAddr>,

    /// Listen port of the supervisor API.
    #[arg(long = "http.port", value_name = "PORT")]
    pub http_port: Option<u16>,

    /// Maximum number of tracked remote nodes.
    #[arg(long = "clients.max", value_name = "COUNT")]
    pub max_clients: Option<usize>,
}

impl NodeArgs {
    /// Applies the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut NodeConfig) {
        if let Some(port) = self.udp_port {
            config.network.udp_port = port;
        }
        if let Some(addr) = self.http_addr {
            config.network.http_addr = addr;
        }
        if let Some(port) = self.http_port {
            config.network.http_port = port;
        }
        if let Some(max) = self.max_clients {
            config.clients.max_clients = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::args::LogArgs;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        logs: LogArgs,
        #[command(flatten)]
        node: NodeArgs,
    }

    #[test]
    fn test_only_given_flags_override() {
        let cli = TestCli::parse_from(["rangehost", "--udp.port", "5000", "--clients.max", "8", "-vv"]);
        assert_eq!(cli.logs.base_level(), "trace");

        let mut config = NodeConfig::default();
        let http_port = config.network.http_port;
        cli.node.apply(&mut config);

        assert_eq!(config.network.udp_port, 5000);
        assert_eq!(config.clients.max_clients, 8);
        assert_eq!(config.network.http_port, http_port);
    }

    #[test]
    fn test_quiet_wins_over_verbosity() {
        let cli = TestCli::parse_from(["rangehost", "-q", "-v"]);
        assert_eq!(cli.logs.base_level(), "error");
    }

    #[test]
    fn test_config_path_from_environment() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RANGEHOST_CONFIG", "/etc/rangehost.toml");
            let cli = TestCli::parse_from(["rangehost"]);
            assert_eq!(cli.node.config, Some(PathBuf::from("/etc/rangehost.toml")));

            let cli = TestCli::parse_from(["rangehost", "-c", "local.toml"]);
            assert_eq!(cli.node.config, Some(PathBuf::from("local.toml")));
            Ok(())
        });
    }
}
