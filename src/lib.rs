//! # proxypool
//!
//! A minimal control plane for a pool of ephemeral task workers:
//! - Heartbeat-based membership with TTL eviction
//! - Periodic election of the freshest workers as dispatch proxies
//! - Task dispatch with rotation, retries, jittered backoff and blacklisting
//!
//! All state lives in the manager's memory and is rebuilt from heartbeats
//! after a restart.
//!
//! ## Architecture
//!
//! ```text
//!            POST /dispatch
//!                  │
//! ┌────────────────▼────────────────────────┐
//! │                Manager                  │
//! │  registry ──► elector ──► proxy set     │
//! │     ▲  reaper             │             │
//! │     │         failures ◄─ dispatcher    │
//! └─────┼─────────────────────┬─────────────┘
//!       │ POST /register      │ POST /task
//!   ┌───┴──────┬──────────────┼──────────┐
//! ┌─┴────────┐ ┌┴─────────┐  ┌▼─────────┐
//! │ Worker 1 │ │ Worker 2 │  │ Worker 3 │
//! └──────────┘ └──────────┘  └──────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start the manager
//! ```bash
//! ELECTION_K=2 proxypool-manager serve --port 8888
//! ```
//!
//! ### Start a worker
//! ```bash
//! MANAGER_HOST=10.0.0.1 proxypool-worker --port 9999
//! ```
//!
//! ### Dispatch a task
//! ```bash
//! curl -X POST localhost:8888/dispatch -d '{"job": 1}' -H 'content-type: application/json'
//! ```

pub mod common;
pub mod manager;
pub mod worker;

// Re-export commonly used types
pub use common::{Error, ManagerConfig, Result, WorkerConfig};
pub use manager::Manager;
pub use worker::Worker;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
