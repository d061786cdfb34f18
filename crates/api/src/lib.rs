//! Waveline coordinator HTTP server library.
//!
//! Exposes configuration, wiring, state, error handling and routes so the
//! integration tests and the binary entry point share them.

pub mod background;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
