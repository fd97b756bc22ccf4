use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The source blob could not be read
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    /// The source text is not well-formed XML
    #[error("Malformed document: {0}")]
    MalformedDocument(String),
    /// A table row with the same partition and row key already exists
    #[error("Duplicate key: partition '{partition}', row '{row}'")]
    DuplicateKey { partition: String, row: String },
    /// A table or blob write failed for transport or auth reasons
    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),
    /// Configuration is missing or invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Publishing finished but some events were not written
    #[error("Publishing incomplete, failed transactions: {}", failed.join(", "))]
    PublishIncomplete { failed: Vec<String> },
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(err: quick_xml::Error) -> Self {
        AppError::MalformedDocument(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::InvalidConfig(format!("invalid endpoint URL: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::SinkUnavailable(err.to_string())
    }
}

// Custom type alias for Results in this application
pub type AppResult<T> = Result<T, AppError>;
