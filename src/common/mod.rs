//! Common utilities and types shared by the manager and the worker

pub mod config;
pub mod error;
pub mod tracing_middleware;
pub mod utils;

pub use config::{ManagerConfig, WorkerConfig};
pub use error::{Error, Result};
pub use tracing_middleware::{request_tracing_middleware, REQUEST_ID_HEADER};
pub use utils::{
    backoff_delay, backoff_with_jitter, lock, retry_with_backoff, run_periodic, shutdown_signal,
    Clock,
};
