//! Worker server

use crate::common::{shutdown_signal, Result, WorkerConfig};
use crate::worker::http::create_router;
use crate::worker::registrar::Registrar;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub struct Worker {
    config: WorkerConfig,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr()?).await?;
        self.run(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves. The port actually
    /// bound is the one announced to the manager.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        tracing::info!("Starting worker");
        tracing::info!("  Task API: {}", local);
        tracing::info!("  Manager: {}", self.config.register_url());

        let client = reqwest::Client::builder().build()?;
        let cancel = CancellationToken::new();
        let registrar = Registrar::new(client, &self.config, local.port())
            .start(self.config.register_interval(), cancel.clone());

        tracing::info!("✓ Worker ready");

        let served = axum::serve(
            listener,
            create_router().into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        if let Err(e) = &served {
            tracing::error!("HTTP server error: {}", e);
        }

        cancel.cancel();
        if let Err(e) = registrar.await {
            tracing::error!("Registration task ended abnormally: {}", e);
        }
        tracing::info!("Worker stopped");

        Ok(served?)
    }
}
