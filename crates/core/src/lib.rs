//! Domain building blocks for the waveline migration coordinator.
//!
//! Everything in this crate is independent of HTTP and of the database:
//!
//! - [`types`]: job identity ([`JobKey`](types::JobKey)) and shared aliases.
//! - [`status`]: the job status model and reported-status normalization.
//! - [`job`]: the persisted job record and its dispatch parameters.
//! - [`lock`]: the lock record and the filesystem-backed lock store.
//! - [`liveness`]: signal-based process probes.
//! - [`wave`]: wave ids, membership and progress tallies.
//! - [`webhook`]: inbound result payload normalization.
//! - [`store`]: persistence traits plus an in-memory implementation.

pub mod error;
pub mod hashing;
pub mod job;
pub mod liveness;
pub mod lock;
pub mod status;
pub mod store;
pub mod types;
pub mod wave;
pub mod webhook;
