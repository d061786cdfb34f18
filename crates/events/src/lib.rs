//! Waveline event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: one applied job transition.

pub mod bus;

pub use bus::{EventBus, JobEvent, JobEventKind};
