//! HTTP client with bounded retry and status classification.
//!
//! Each attempt is logged. Connection failures and 5xx (or unclassifiable)
//! statuses are retried until the attempt budget runs out; 4xx returns
//! immediately. No state is kept between calls.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Method;
use serde::Serialize;

use crate::error::DispatchError;
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, OutboundRequest, RawResponse};

/// How a response status is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Success,
    ClientError,
    Retryable,
}

fn classify(status: u16) -> StatusClass {
    match status {
        200..=399 => StatusClass::Success,
        400..=499 => StatusClass::ClientError,
        _ => StatusClass::Retryable,
    }
}

/// Retrying client over an [`HttpTransport`].
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Send a request, retrying per the policy.
    ///
    /// Returns the first 2xx/3xx response, a [`DispatchError::Rejected`] on
    /// the first 4xx, or the last failure once attempts are exhausted.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        payload: Option<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Result<RawResponse, DispatchError> {
        let request = OutboundRequest {
            method,
            url: url.to_string(),
            body: payload,
            content_type: content_type.map(str::to_string),
        };
        let attempts = self.policy.attempts();
        let mut last_err: Option<DispatchError> = None;

        for attempt in 1..=attempts {
            let started = Instant::now();
            let outcome = self.transport.execute(&request).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(response) => match classify(response.status) {
                    StatusClass::Success => {
                        tracing::debug!(
                            method = %request.method,
                            url,
                            attempt,
                            status = response.status,
                            elapsed_ms,
                            "HTTP attempt succeeded",
                        );
                        return Ok(response);
                    }
                    StatusClass::ClientError => {
                        tracing::warn!(
                            method = %request.method,
                            url,
                            attempt,
                            status = response.status,
                            elapsed_ms,
                            "HTTP attempt rejected, not retrying",
                        );
                        return Err(DispatchError::Rejected {
                            status: response.status,
                            body: response.body,
                        });
                    }
                    StatusClass::Retryable => {
                        tracing::warn!(
                            method = %request.method,
                            url,
                            attempt,
                            max_attempts = attempts,
                            status = response.status,
                            elapsed_ms,
                            "HTTP attempt failed with server error",
                        );
                        last_err = Some(DispatchError::ServerError {
                            status: response.status,
                            body: response.body,
                            attempts: attempt,
                        });
                    }
                },
                Err(failure) => {
                    tracing::warn!(
                        method = %request.method,
                        url,
                        attempt,
                        max_attempts = attempts,
                        elapsed_ms,
                        error = %failure,
                        "HTTP attempt got no response",
                    );
                    last_err = Some(DispatchError::Transport {
                        url: url.to_string(),
                        attempts: attempt,
                        message: failure.0,
                    });
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        let err = last_err.unwrap_or_else(|| DispatchError::Transport {
            url: url.to_string(),
            attempts: 0,
            message: "no attempt was made".into(),
        });
        tracing::error!(url, error = %err, "HTTP request failed after all attempts");
        Err(err)
    }

    /// Send a JSON body.
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        payload: &T,
    ) -> Result<RawResponse, DispatchError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| DispatchError::Decode(format!("Failed to encode request: {e}")))?;
        self.send(method, url, Some(body), Some("application/json"))
            .await
    }
}
