//! Error types for persistent state operations

use std::fmt;
use std::path::PathBuf;

/// Result type alias for state operations
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing agent state on disk
#[derive(Debug)]
pub enum StateError {
    /// The state directory could not be created or is not a directory
    InvalidStateDir(PathBuf),

    /// A throttle key could not be mapped to a file name
    InvalidKey(String),

    /// Acquiring the advisory lock for a record failed
    LockFailed(String),

    /// I/O error (file access, etc.)
    IoError(std::io::Error),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::InvalidStateDir(path) => {
                write!(f, "invalid state directory: {}", path.display())
            }
            StateError::InvalidKey(key) => write!(f, "invalid throttle key: {key:?}"),
            StateError::LockFailed(msg) => write!(f, "failed to lock state record: {msg}"),
            StateError::IoError(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StateError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::IoError(err)
    }
}
