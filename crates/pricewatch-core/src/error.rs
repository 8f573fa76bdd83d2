use thiserror::Error;

/// Application-wide error types for pricewatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// HTTP request failed for a reason other than status or timeout.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A page could not be parsed into the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Reading or writing a persisted state/report file failed.
    #[error("State error: {0}")]
    StateError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Delivering a notification failed permanently.
    #[error("Notification error: {0}")]
    NotifyError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::StateError(e.to_string())
    }
}
