/// Errors surfaced by the resilient client and the service API.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Never got a response: connection refused, DNS, timeout, ...
    #[error("No response from {url} after {attempts} attempt(s): {message}")]
    Transport {
        url: String,
        attempts: u32,
        message: String,
    },

    /// The remote answered with a 4xx. Not retried.
    #[error("Remote rejected the request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The remote kept answering with 5xx (or an unclassifiable status)
    /// until the attempt budget ran out.
    #[error("Remote failed with HTTP {status} after {attempts} attempt(s): {body}")]
    ServerError {
        status: u16,
        body: String,
        attempts: u32,
    },

    /// The response body did not have the expected shape.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// A base URL or built URL was malformed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl DispatchError {
    /// `true` when the remote never produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
