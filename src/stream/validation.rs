//! Path validation for stream handles.
//!
//! Every open/create call validates its path here before any backend is
//! touched. Overlong paths are rejected outright; the handle stores an
//! owned `PathBuf`, so there is no fixed buffer to silently truncate into.

use crate::error::{ResfileError, Result};
use std::path::Path;

/// Maximum accepted path length in bytes.
pub const MAX_PATH_LEN: usize = 512;

/// Validate a path before opening a backend on it.
///
/// # Validations Performed
/// - Path is not empty
/// - Path is at most [`MAX_PATH_LEN`] bytes
///
/// Existence and permission checks are left to the backend open itself,
/// which reports them as open errors; a write path usually does not
/// exist yet.
pub fn validate_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ResfileError::invalid_path("path is empty"));
    }

    let len = path.as_os_str().len();
    if len > MAX_PATH_LEN {
        return Err(ResfileError::invalid_path(format!(
            "path is {len} bytes, limit is {MAX_PATH_LEN}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_ordinary_path() {
        assert!(validate_path(Path::new("data/graphics.pak")).is_ok());
    }

    #[test]
    fn test_validate_empty_path() {
        let result = validate_path(Path::new(""));
        match result.unwrap_err() {
            ResfileError::InvalidPath { message } => {
                assert!(message.contains("empty"));
            }
            _ => panic!("Expected InvalidPath for empty path"),
        }
    }

    #[test]
    fn test_validate_overlong_path() {
        let long: PathBuf = PathBuf::from("x".repeat(MAX_PATH_LEN + 1));
        let result = validate_path(&long);
        match result.unwrap_err() {
            ResfileError::InvalidPath { message } => {
                assert!(message.contains("limit"));
            }
            _ => panic!("Expected InvalidPath for overlong path"),
        }
    }

    #[test]
    fn test_validate_path_at_limit() {
        let exact: PathBuf = PathBuf::from("x".repeat(MAX_PATH_LEN));
        assert!(validate_path(&exact).is_ok());
    }
}
