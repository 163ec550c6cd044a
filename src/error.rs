//! Error types and handling infrastructure for resfile.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types. Every fallible operation in the crate returns [`Result`];
//! backend failures (std I/O errors, gzip stream errors) are converted into
//! [`ResfileError`] at the call site so that nothing panics across the public
//! boundary.

use thiserror::Error;

/// The main error type for resfile operations.
///
/// This enum covers all failure conditions a stream handle can report:
/// open failures, path validation failures, mode/state violations,
/// short transfers, compression failures and size queries.
#[derive(Error, Debug)]
pub enum ResfileError {
    /// Backend could not be opened or created (missing file, permissions, ...)
    #[error("Open failed: {message}")]
    OpenError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Path failed validation before any backend was touched
    #[error("Invalid path: {message}")]
    InvalidPath { message: String },

    /// Operation not valid for the handle's current mode or state
    #[error("Mode violation: {message}")]
    ModeViolation { message: String },

    /// Fewer bytes transferred than requested (read refill exhausted, short write)
    #[error("Short transfer: {transferred} of {requested} bytes")]
    ShortTransfer { requested: u64, transferred: u64 },

    /// Gzip header, trailer or stream failure
    #[error("Compression error: {message}")]
    CompressionError { message: String },

    /// Size query failed or produced an unusable size
    #[error("Size query failed: {message}")]
    SizeError { message: String },

    /// Flush, seek or close failure on an already-open backend
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Standard Result type for resfile operations.
///
/// This type alias provides a consistent error handling interface across
/// all modules in the resfile codebase.
pub type Result<T> = std::result::Result<T, ResfileError>;

impl ResfileError {
    /// Create an OpenError from an io::Error with additional context
    pub fn open_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::OpenError {
            message: message.into(),
            source,
        }
    }

    /// Create an InvalidPath error with a descriptive message
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath {
            message: message.into(),
        }
    }

    /// Create a ModeViolation error with a descriptive message
    pub fn mode_violation(message: impl Into<String>) -> Self {
        Self::ModeViolation {
            message: message.into(),
        }
    }

    /// Create a ShortTransfer error from requested/transferred byte counts
    pub fn short_transfer(requested: u64, transferred: u64) -> Self {
        Self::ShortTransfer {
            requested,
            transferred,
        }
    }

    /// Create a CompressionError with a descriptive message
    pub fn compression(message: impl Into<String>) -> Self {
        Self::CompressionError {
            message: message.into(),
        }
    }

    /// Create a SizeError with a descriptive message
    pub fn size_error(message: impl Into<String>) -> Self {
        Self::SizeError {
            message: message.into(),
        }
    }

    /// Create an IoError from an io::Error with additional context
    pub fn io_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            message: message.into(),
            source,
        }
    }
}

// Automatic conversion from io::Error for `?` on std calls against open backends
impl From<std::io::Error> for ResfileError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::IoError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::IoError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::IoError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let open_err = ResfileError::open_error(
            "cannot create target",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(open_err.to_string(), "Open failed: cannot create target");

        let short = ResfileError::short_transfer(100, 42);
        assert_eq!(short.to_string(), "Short transfer: 42 of 100 bytes");

        let path_err = ResfileError::invalid_path("path is empty");
        assert_eq!(path_err.to_string(), "Invalid path: path is empty");
    }

    #[test]
    fn test_error_constructors() {
        let mode_err = ResfileError::mode_violation("read on write-mode stream");
        assert!(matches!(mode_err, ResfileError::ModeViolation { .. }));

        let comp_err = ResfileError::compression("bad gzip magic");
        assert!(matches!(comp_err, ResfileError::CompressionError { .. }));

        let size_err = ResfileError::size_error("file is empty");
        assert!(matches!(size_err, ResfileError::SizeError { .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ResfileError = io_err.into();

        match err {
            ResfileError::IoError { message, .. } => {
                assert_eq!(message, "Permission denied");
            }
            _ => panic!("Expected IoError variant"),
        }
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<u32> {
            Ok(7)
        }

        assert_eq!(returns_result().unwrap(), 7);
    }
}
