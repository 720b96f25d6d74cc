//! Error types for gifplug

use thiserror::Error;

use crate::status::Status;

/// Main error type for Rust-side callers of the decode context
#[derive(Error, Debug)]
pub enum GifError {
    #[error("{operation} failed: {status}")]
    Status {
        operation: &'static str,
        status: Status,
    },

    #[error("GIF has no frames")]
    Empty,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GifError {
    /// Wrap a non-ok status returned by `operation`
    pub fn status(operation: &'static str, status: Status) -> Self {
        Self::Status { operation, status }
    }

    /// Status carried by this error, if it came from the decode context
    pub fn as_status(&self) -> Option<Status> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for gifplug operations
pub type Result<T> = std::result::Result<T, GifError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GifError::status("initialise", Status::DataError);
        assert_eq!(format!("{}", err), "initialise failed: data error");

        let err = GifError::Config("bad speed".to_string());
        assert_eq!(format!("{}", err), "Config error: bad speed");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GifError = io_err.into();
        assert!(matches!(err, GifError::Io(_)));
        assert_eq!(err.as_status(), None);

        let err = GifError::status("decode", Status::FrameNoDisplay);
        assert_eq!(err.as_status(), Some(Status::FrameNoDisplay));
    }
}
