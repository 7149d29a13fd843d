//! Command line entry point.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr, bail};
use rangehost_errors::ErrorCode;
use rangehost_host::{Host, UdpTransport, receive_loop, spawn_activities};
use rangehost_node_core::args::{LogArgs, NodeArgs};
use rangehost_node_core::config::NodeConfig;
use rangehost_node_core::{logging, version};
use rangehost_primitives::MonotonicClock;
use rangehost_rpc_server::{ApiServer, ApiState};
use rangehost_tasks::{CriticalTaskError, TaskManager};
use tracing::{error, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Range host - coordinates target nodes and serves the supervisor API.
#[derive(Debug, Parser)]
#[command(author, version = version::VERSION, long_version = version::long_version(), about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    logs: LogArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the host.
    Node(NodeArgs),
}

pub(crate) async fn run() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logging(&cli.logs)?;

    match cli.command {
        Commands::Node(args) => run_node(args).await,
    }
}

async fn run_node(args: NodeArgs) -> Result<()> {
    let mut config = NodeConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let transport = match UdpTransport::bind(
        config.udp_socket_addr(),
        config.broadcast_socket_addr(),
    )
    .await
    {
        Ok(transport) => Arc::new(transport),
        Err(err) => {
            error!(code = %err.code(), %err, "udp transport unavailable");
            return Err(err).wrap_err("failed to start udp transport");
        }
    };
    info!(addr = %config.udp_socket_addr(), "udp transport bound");

    let host_config = config.host_config();
    let host = Arc::new(Host::new(
        host_config,
        transport.clone(),
        Arc::new(MonotonicClock::new()),
    ));

    let mut task_manager = TaskManager::current();
    let executor = task_manager.executor();

    executor.spawn_critical(
        "udp_receiver",
        receive_loop(transport, host.clone(), config.network.udp_buffer_size),
    );
    spawn_activities(host.clone(), host_config.schedule, &executor);

    let state = ApiState::new(host.clone(), &config.api_config());
    let server = match ApiServer::bind(config.http_socket_addr(), state).await {
        Ok(server) => server,
        Err(err) => {
            host.error_log()
                .record_host(ErrorCode::TaskCreateFailed, err.to_string());
            return Err(err).wrap_err("failed to start supervisor api");
        }
    };
    info!(addr = %server.local_addr()?, "supervisor api listening");
    executor.spawn_critical_with_graceful_shutdown_signal("api_server", move |shutdown| {
        server.serve(shutdown)
    });

    let reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            StopReason::Signal
        }
        failure = task_manager.wait_for_critical_failure() => {
            if let Some(failure) = &failure {
                error!(task = failure.task_name(), error = failure.error(), "critical task failed, shutting down");
            }
            StopReason::CriticalFailure(failure)
        }
    };

    if !task_manager.graceful_shutdown_with_timeout(SHUTDOWN_TIMEOUT).await {
        warn!("tasks still running after shutdown timeout");
    }
    info!("Range host stopped");
    reason.into_result()
}

/// Why the node loop ended.
#[derive(Debug)]
enum StopReason {
    Signal,
    CriticalFailure(Option<CriticalTaskError>),
}

impl StopReason {
    /// A critical failure becomes an error so the process exits non-zero and
    /// its supervisor restarts it.
    fn into_result(self) -> Result<()> {
        match self {
            Self::Signal => Ok(()),
            Self::CriticalFailure(Some(failure)) => {
                Err(failure).wrap_err("host stopped after a critical task failure")
            }
            Self::CriticalFailure(None) => bail!("critical task monitor closed unexpectedly"),
        }
    }
}
