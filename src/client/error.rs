//! Error types for the Gerrit client
//!
//! Every ordinary failure is classified into a [`RequestError`] inside the
//! core and absorbed at the operation boundary. Only [`ConfigError`] escapes
//! to callers.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure raised by the transport before any HTTP response was received.
///
/// Cloneable because a single transport outcome is broadcast to every caller
/// merged onto the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// TLS negotiation or certificate validation failed.
    #[error("TLS failure: {0}")]
    Tls(String),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The request could not be built (bad header, bad URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The task driving the shared request ended without producing an outcome.
    #[error("in-flight request was interrupted")]
    Interrupted,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let detail = err.to_string();
        if err.is_timeout() {
            TransportError::Timeout(detail)
        } else if err.is_connect() {
            // rustls surfaces certificate failures as connect errors
            if detail.contains("certificate") || detail.contains("tls") {
                TransportError::Tls(detail)
            } else {
                TransportError::Connect(detail)
            }
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(detail)
        } else if err.is_builder() {
            TransportError::InvalidRequest(detail)
        } else {
            TransportError::Other(detail)
        }
    }
}

/// Classified failure of a single operation.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// A mutating request was attempted while the client is readonly.
    #[error("refused {method} {path}: client is in readonly mode")]
    Refused {
        /// HTTP verb of the refused request
        method: &'static str,
        /// Endpoint path of the refused request
        path: String,
    },

    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response arrived with a status outside `[200, 300)`.
    #[error("server answered {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Normalized response body, kept for logging
        body: String,
    },

    /// The body was not valid JSON after normalization.
    #[error("malformed response body: {reason}")]
    Envelope {
        /// Parser message
        reason: String,
        /// The offending normalized text
        text: String,
    },

    /// The JSON was valid but did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Mapping(String),
}

impl RequestError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Refused { .. } => "refused",
            RequestError::Transport(_) => "transport",
            RequestError::Status { .. } => "status",
            RequestError::Envelope { .. } => "envelope",
            RequestError::Mapping(_) => "mapping",
        }
    }
}

/// Result alias for the request pipeline
pub type RequestResult<T> = std::result::Result<T, RequestError>;

/// Configuration errors. These are programming or deployment mistakes and are
/// the only errors returned to callers.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured server URL is unusable.
    #[error("invalid server url '{url}': {detail}")]
    InvalidUrl {
        /// URL as configured
        url: String,
        /// Why it was rejected
        detail: String,
    },

    /// A username was configured without a password.
    #[error("username '{0}' has no password configured")]
    MissingPassword(String),

    /// The configuration file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    HttpClient(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for configuration handling
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
