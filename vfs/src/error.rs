//! Error types for vsys operations

use std::fmt;
use std::io;

/// Result type for vsys operations
pub type VsysResult<T> = Result<T, VsysError>;

/// Error type for vsys operations
#[derive(Debug)]
pub enum VsysError {
    /// I/O error from the underlying system
    Io(io::Error),
    /// Permission denied
    PermissionDenied(String),
    /// File or resource not found
    NotFound(String),
    /// Operation not supported by this vsys implementation
    NotSupported(String),
    /// Invalid argument
    InvalidArgument(String),
    /// Module resolution error
    ModuleResolution { specifier: String, message: String },
    /// Module loading error
    ModuleLoad { path: String, message: String },
    /// Custom error with code
    Custom { code: i32, message: String },
}

impl fmt::Display for VsysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VsysError::Io(e) => write!(f, "I/O error: {}", e),
            VsysError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            VsysError::NotFound(msg) => write!(f, "Not found: {}", msg),
            VsysError::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            VsysError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            VsysError::ModuleResolution { specifier, message } => {
                write!(f, "Cannot resolve module '{}': {}", specifier, message)
            }
            VsysError::ModuleLoad { path, message } => {
                write!(f, "Cannot load module '{}': {}", path, message)
            }
            VsysError::Custom { code, message } => {
                write!(f, "Error (code {}): {}", code, message)
            }
        }
    }
}

impl std::error::Error for VsysError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VsysError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for VsysError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => VsysError::NotFound(e.to_string()),
            io::ErrorKind::PermissionDenied => VsysError::PermissionDenied(e.to_string()),
            _ => VsysError::Io(e),
        }
    }
}
