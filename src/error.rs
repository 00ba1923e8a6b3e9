use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum DocstreamError {
    StoreError(String),
    ConfigurationError(String),
    BroadcastError(String),
}

impl fmt::Display for DocstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocstreamError::StoreError(msg) => write!(f, "Store error: {msg}"),
            DocstreamError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            DocstreamError::BroadcastError(msg) => write!(f, "Broadcast error: {msg}"),
        }
    }
}

impl std::error::Error for DocstreamError {}

impl From<sqlx::Error> for DocstreamError {
    fn from(err: sqlx::Error) -> Self {
        DocstreamError::StoreError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocstreamError>;
