use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid lease: {0}")]
    InvalidLease(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Connection error: {0}")]
    Connection(String),
}
