//! Outbound HTTP to the migration-execution service.
//!
//! - [`client::ResilientClient`]: bounded retry over a pluggable
//!   [`transport::HttpTransport`], classifying 4xx as final and
//!   connection failures / 5xx as retryable.
//! - [`api::MigrationServiceApi`]: typed dispatch and status calls built
//!   on the client.

pub mod api;
pub mod client;
pub mod error;
pub mod retry;
pub mod transport;

pub use api::{DispatchAccepted, DispatchRequest, MigrationServiceApi, RemoteStatus};
pub use client::ResilientClient;
pub use error::DispatchError;
pub use retry::{RetryPolicy, RetryStrategy};
pub use transport::{HttpTransport, OutboundRequest, RawResponse, ReqwestTransport, TransportFailure};
