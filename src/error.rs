use thiserror::Error;

/// Main error type for chingest operations
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Query error: {message}")]
    Query { message: String },

    #[error("Codec error: {message}")]
    Codec { message: String },

    #[error("Invalid direction: {direction}")]
    InvalidDirection { direction: String },

    #[error("Export failed: {message}")]
    Export { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IngestError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into() }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query { message: message.into() }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec { message: message.into() }
    }

    pub fn invalid_direction(direction: impl Into<String>) -> Self {
        Self::InvalidDirection { direction: direction.into() }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Export { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        Self::codec(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
