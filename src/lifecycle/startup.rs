//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Hold back HTTP serving until the controller reports ready
//! - Tear everything down on a signal

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::controller::{Controller, ControllerError};
use crate::http::GatewayServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::routing::RoutingTable;
use crate::watch::{kubernetes, KubeWatchSource, WatchError, WatchSource};

/// Fatal startup or runtime failure.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("watch source: {0}")]
    Watch(#[from] WatchError),

    #[error("controller: {0}")]
    Controller(#[from] ControllerError),

    #[error("controller task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("listener {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http server: {0}")]
    Server(std::io::Error),
}

/// Run the gateway against the Kubernetes API until a termination signal.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = kubernetes::connect(&config.kube).await?;
    let source = Arc::new(KubeWatchSource::new(client, config.kube.namespace.as_deref()));

    let shutdown = Shutdown::new();
    let serving = serve(source, &config, &shutdown);
    tokio::pin!(serving);

    tokio::select! {
        result = &mut serving => return result,
        _ = signals::wait_for_signal() => shutdown.trigger(),
    }
    serving.await
}

/// Start the controller, wait until it is ready, then bind the configured
/// address and serve HTTP until `shutdown`.
pub async fn serve<S: WatchSource>(
    source: Arc<S>,
    config: &GatewayConfig,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    serve_inner(source, None, config, shutdown).await
}

/// Like [`serve`], on an already bound listener. Accepted connections wait
/// until the controller is ready.
pub async fn serve_on<S: WatchSource>(
    source: Arc<S>,
    listener: TcpListener,
    config: &GatewayConfig,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    serve_inner(source, Some(listener), config, shutdown).await
}

async fn serve_inner<S: WatchSource>(
    source: Arc<S>,
    listener: Option<TcpListener>,
    config: &GatewayConfig,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    let table = RoutingTable::new();
    let server_shutdown = shutdown.subscribe();
    let controller = Arc::new(Controller::new(source, table.clone(), &config.controller));
    let mut ready = controller.subscribe_ready();
    let mut controller_task = tokio::spawn(controller.clone().run(shutdown.subscribe()));

    tokio::select! {
        result = ready.wait_for(|ready| *ready) => {
            if result.is_err() {
                return Err(StartupError::Controller(ControllerError::Stopped));
            }
        }
        finished = &mut controller_task => {
            // Stopped before becoming ready: fine if we were asked to stop.
            let result = finished?;
            if shutdown.is_triggered() {
                return Ok(());
            }
            result?;
            return Err(StartupError::Controller(ControllerError::Stopped));
        }
    }
    tracing::info!(routes = table.len(), "Controller ready, starting HTTP server");

    let listener = match listener {
        Some(listener) => listener,
        None => {
            let address = config.listener.bind_address.clone();
            match TcpListener::bind(&address).await {
                Ok(listener) => listener,
                Err(source) => {
                    shutdown.trigger();
                    let _ = controller_task.await;
                    return Err(StartupError::Bind { address, source });
                }
            }
        }
    };

    let server = GatewayServer::new(table, &config.timeouts);
    let served = server.run(listener, server_shutdown).await;

    // Server only returns on shutdown or failure; make sure the controller stops too.
    shutdown.trigger();
    controller_task.await??;
    served.map_err(StartupError::Server)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
