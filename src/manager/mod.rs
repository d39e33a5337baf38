//! Manager implementation
//!
//! The manager is responsible for:
//! - Membership (worker heartbeats, staleness eviction)
//! - Proxy election (freshest `k` workers, every interval)
//! - Task dispatch (rotation, retries, backoff, blacklisting)

pub mod dispatch;
pub mod election;
pub mod failure;
pub mod forward;
pub mod http;
pub mod reaper;
pub mod registry;
pub mod server;

pub use dispatch::{DispatchOutcome, DispatchPolicy, Dispatcher};
pub use election::{Elector, ProxySet, ProxyTarget};
pub use failure::{BlacklistPolicy, FailureRecord, FailureTracker};
pub use forward::{HttpForwarder, TaskForwarder, TaskReply};
pub use registry::{Registry, WorkerMetadata, WorkerRecord};
pub use server::Manager;
