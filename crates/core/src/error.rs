use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("share root {} is not accessible{hint}", path.display())]
    RootUnavailable { path: PathBuf, hint: String },

    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum SynonymError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("reply did not contain the expected json: {0}")]
    MalformedReply(String),

    #[error("service is not configured")]
    NotConfigured,
}

impl From<tokio::task::JoinError> for IndexError {
    fn from(value: tokio::task::JoinError) -> Self {
        IndexError::Task(value.to_string())
    }
}

impl From<tokio::task::JoinError> for SynonymError {
    fn from(value: tokio::task::JoinError) -> Self {
        SynonymError::Task(value.to_string())
    }
}
