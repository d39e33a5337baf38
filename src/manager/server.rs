//! Manager server
//!
//! Owns the shared state and the two periodic loops. Loops start after the
//! state exists and share one cancellation token; on shutdown the HTTP
//! server drains first, then the loops are cancelled and joined.

use crate::common::{shutdown_signal, Clock, ManagerConfig, Result};
use crate::manager::dispatch::{DispatchPolicy, Dispatcher};
use crate::manager::election::{Elector, ProxySet};
use crate::manager::failure::{BlacklistPolicy, FailureTracker};
use crate::manager::forward::{HttpForwarder, TaskForwarder};
use crate::manager::http::{create_router, ManagerState};
use crate::manager::reaper::Reaper;
use crate::manager::registry::Registry;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub struct Manager {
    config: ManagerConfig,
    forwarder: Arc<dyn TaskForwarder>,
}

impl Manager {
    /// Manager forwarding tasks over HTTP with one pooled client
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Ok(Self::with_forwarder(config, Arc::new(HttpForwarder::build()?)))
    }

    pub fn with_forwarder(config: ManagerConfig, forwarder: Arc<dyn TaskForwarder>) -> Self {
        Self { config, forwarder }
    }

    /// Build the shared state the loops and handlers operate on
    pub fn state(&self, clock: Clock) -> ManagerState {
        let registry = Arc::new(Registry::new());
        let proxies = Arc::new(ProxySet::new());
        let failures = Arc::new(FailureTracker::new(BlacklistPolicy {
            max_fails: self.config.max_fails,
            blacklist_ttl: self.config.proxy_blacklist_ttl,
        }));
        let dispatcher = Arc::new(Dispatcher::new(
            proxies.clone(),
            failures.clone(),
            self.forwarder.clone(),
            clock,
            DispatchPolicy {
                retries: self.config.dispatch_retries,
                backoff_base: self.config.backoff_base(),
                request_timeout: self.config.request_timeout(),
            },
        ));

        ManagerState {
            registry,
            proxies,
            failures,
            dispatcher,
            clock,
        }
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr()?).await?;
        self.run(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let config = &self.config;
        tracing::info!("Starting manager");
        tracing::info!("  HTTP API: {}", listener.local_addr()?);
        tracing::info!(
            "  Election: k={} every {}s",
            config.election_k,
            config.election_interval
        );
        tracing::info!(
            "  Worker TTL: {}s (sweep every {}s)",
            config.worker_ttl,
            config.cleanup_interval
        );
        tracing::info!(
            "  Dispatch: {} attempts, blacklist after {} failures for {}s",
            config.dispatch_retries,
            config.max_fails,
            config.proxy_blacklist_ttl
        );

        let state = self.state(Clock::new());
        let cancel = CancellationToken::new();

        let reaper = Reaper::new(
            state.registry.clone(),
            state.failures.clone(),
            state.clock,
            config.worker_ttl,
        )
        .start(config.cleanup_interval(), cancel.clone());
        let elector = Elector::new(
            state.registry.clone(),
            state.proxies.clone(),
            config.election_k,
            config.worker_port,
        )
        .start(config.election_interval(), cancel.clone());

        let router = create_router(state, config.max_body_bytes);

        tracing::info!("✓ Manager ready");

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        if let Err(e) = &served {
            tracing::error!("HTTP server error: {}", e);
        }

        cancel.cancel();
        for (name, handle) in [("reaper", reaper), ("elector", elector)] {
            if let Err(e) = handle.await {
                tracing::error!("{} task ended abnormally: {}", name, e);
            }
        }
        tracing::info!("Manager stopped");

        Ok(served?)
    }
}
