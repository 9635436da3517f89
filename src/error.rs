//! Error and Result types.
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("http error `{0}`")]
    HttpError(String),
    #[error("invalid content length for `{0}`")]
    InvalidContentLength(String),
    #[error("expected {expected} bytes in range response, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl StreamError {
    /// True when the remote resource could not be probed or fetched.
    pub fn is_resource_unavailable(&self) -> bool {
        matches!(
            self,
            StreamError::HttpStatus(_)
                | StreamError::HttpError(_)
                | StreamError::InvalidContentLength(_)
                | StreamError::UnexpectedLength { .. }
        )
    }
}

impl From<StreamError> for io::Error {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Io(e) => e,
            StreamError::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, error),
            StreamError::InvalidConfig(_) => io::Error::new(io::ErrorKind::InvalidInput, error),
            other => io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
