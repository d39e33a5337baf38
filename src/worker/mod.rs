//! Worker implementation
//!
//! Serves the task endpoint and keeps itself registered with the manager.

pub mod http;
pub mod registrar;
pub mod server;

pub use registrar::{RegisterAck, Registrar};
pub use server::Worker;
