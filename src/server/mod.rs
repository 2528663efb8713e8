//! HTTP server with graceful shutdown.

mod routes;

pub use routes::router;

use crate::auth::AuthConfig;
use crate::error::{DbError, DbResult};
use crate::service::RunnerService;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpServer {
    service: RunnerService,
    auth: Arc<AuthConfig>,
    host: String,
    port: u16,
}

impl HttpServer {
    pub fn new(
        service: RunnerService,
        auth: Arc<AuthConfig>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            service,
            auth,
            host: host.into(),
            port,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn bind(&self) -> DbResult<TcpListener> {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            DbError::connection(
                format!("Cannot listen on {addr}: {e}"),
                "Pick another --http-port or stop the process holding it",
            )
        })?;
        info!(
            addr = %addr,
            require_auth = self.auth.requires_auth(),
            tokens = self.auth.token_count(),
            "HTTP API listening"
        );
        Ok(listener)
    }

    /// Serve until SIGINT or SIGTERM, then close every adapter and the
    /// history store. They are closed on the error path too.
    ///
    /// In-flight requests get [`DRAIN_TIMEOUT`] after the first signal. A
    /// second signal stops waiting for them.
    pub async fn run(&self) -> DbResult<()> {
        let outcome = self.serve().await;
        self.service.shutdown().await;
        outcome
    }

    async fn serve(&self) -> DbResult<()> {
        let listener = self.bind().await?;
        let app = router(self.service.clone(), Arc::clone(&self.auth));

        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = draining_tx.send(());
        });

        tokio::select! {
            served = serve => served.map_err(|e| {
                error!(error = %e, "HTTP server failed");
                DbError::internal(format!("HTTP server error: {e}"))
            }),
            _ = drain_deadline(draining_rx) => Ok(()),
        }
    }
}

/// Resolves once draining has gone on too long. Never resolves while the
/// server is still accepting connections.
async fn drain_deadline(draining: oneshot::Receiver<()>) {
    if draining.await.is_err() {
        return std::future::pending().await;
    }
    info!(
        timeout_secs = DRAIN_TIMEOUT.as_secs(),
        "Draining in-flight requests, signal again to stop now"
    );
    tokio::select! {
        _ = tokio::time::sleep(DRAIN_TIMEOUT) => warn!("Drain timeout reached"),
        _ = shutdown_signal() => warn!("Second signal received, stopping now"),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, only Ctrl-C will stop the server");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => info!(signal = "SIGINT", "Shutdown requested"),
        _ = sigterm => info!(signal = "SIGTERM", "Shutdown requested"),
    }
}
