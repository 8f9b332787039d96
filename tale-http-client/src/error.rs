//! Error types for the Tale HTTP client

use thiserror::Error;

/// Errors that can occur when using the Tale HTTP client
#[derive(Error, Debug)]
pub enum TaleError {
    /// HTTP request failed (connection, DNS, TLS)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status without a structured error payload
    #[error("Invalid HTTP status: {status}")]
    InvalidStatus {
        /// The status code that was received
        status: reqwest::StatusCode,
    },

    /// The server answered with `"status": "error"`
    #[error("Tale API error: {message}")]
    Api {
        /// Machine-readable error code, when the server sent one
        code: Option<String>,
        /// Human-readable summary built from `error` / `errors`
        message: String,
        /// The payload exactly as the server sent it
        payload: serde_json::Value,
    },

    /// The operation needs a session and none has been established
    #[error("Not authenticated: no session has been established")]
    NotAuthenticated,

    /// Session token cannot be sent in a header
    #[error("Session token contains characters not allowed in a header")]
    InvalidSession,

    /// A `%name%` placeholder in a path template had no value
    #[error("Missing value for path placeholder `{0}`")]
    MissingPathParam(String),

    /// The response lacked a field the operation depends on
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A postponed task was still processing after the last allowed poll
    #[error("Postponed task still processing after {attempts} poll(s)")]
    PollTimeout {
        /// Number of polls issued
        attempts: u32,
    },

    /// Failed to decode response as UTF-8
    #[error("Failed to decode response as UTF-8")]
    Encoding,

    /// URL could not be resolved against the base URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A URL resolved to a host other than the configured one
    #[error("Refusing to send request to foreign origin {0}")]
    ForeignOrigin(String),

    /// Failed to parse duration string
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client initialization failed
    #[error("Client initialization failed: {0}")]
    ClientInit(String),
}
