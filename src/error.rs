use thiserror::Error;

/// Normalized failure classes for remote service calls.
///
/// Every transport- or server-level problem surfaces as one of these three
/// variants so the managers can handle failures uniformly without inspecting
/// reqwest internals.
#[derive(Debug, Clone, Error)]
pub enum TransportFailure {
    /// The server responded with a non-success status.
    #[error("server error {status}: {body}")]
    Http { status: u16, body: String },

    /// The request went out but no response came back (timeout, dropped
    /// connection, refused connection). Usually means connectivity loss.
    #[error("no response from server")]
    NoResponse,

    /// The request could not be constructed or sent at all.
    #[error("request failed: {0}")]
    Setup(String),
}

impl TransportFailure {
    /// Collapse a reqwest error into the three-way classification.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return TransportFailure::NoResponse;
        }
        if let Some(status) = err.status() {
            return TransportFailure::Http {
                status: status.as_u16(),
                body: String::new(),
            };
        }
        if err.is_builder() || err.is_request() {
            return TransportFailure::Setup(err.to_string());
        }
        // Body/decode errors mean we got a response we could not use.
        TransportFailure::Setup(err.to_string())
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, TransportFailure::Http { status, .. } if *status >= 500)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportFailure::Http { status, .. } if *status == 401)
    }
}
