//! Error types for the hybrid filesystem.
//!
//! [`ProxyError`] is what every proxy operation and handle returns.
//! [`ErrorCategory`] is a protocol-independent classification that the
//! WebDAV layer converts to HTTP-facing errors.

use crate::remote::RemoteError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Mutating operations that are applied to both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualOp {
    Mkdir,
    RemoveAll,
    Rename,
}

impl fmt::Display for DualOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            DualOp::Mkdir => "create directory",
            DualOp::RemoveAll => "remove",
            DualOp::Rename => "rename",
        };
        f.write_str(verb)
    }
}

/// Errors returned by the hybrid filesystem and its handles.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Path absent in every consulted store.
    #[error("Path not found: {path}")]
    NotFound { path: String },

    /// Operation not meaningful for this handle, or an invalid argument.
    #[error("Invalid operation '{op}': {reason}")]
    InvalidOperation {
        op: &'static str,
        reason: &'static str,
    },

    /// Write attempted on a read-only remote file handle.
    #[error("Remote writes not supported: {path}")]
    RemoteWriteUnsupported { path: String },

    /// Both sides of a dual-write operation failed.
    #[error("Failed to {op} '{path}' on both stores (local: {local}; remote: {remote})")]
    Combined {
        op: DualOp,
        path: String,
        #[source]
        local: io::Error,
        remote: RemoteError,
    },

    /// Local filesystem error.
    #[error("Local IO error: {0}")]
    Local(#[from] io::Error),

    /// Remote store error, propagated unchanged.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ProxyError {
    pub fn invalid(op: &'static str, reason: &'static str) -> Self {
        ProxyError::InvalidOperation { op, reason }
    }

    /// Returns true for "not found" from either store.
    pub fn is_not_found(&self) -> bool {
        ErrorCategory::from(self) == ErrorCategory::NotFound
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from(self)
    }
}

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Semantic category for proxy errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Resource not found (HTTP 404)
    NotFound,
    /// Operation invalid for this handle or argument (HTTP 403)
    InvalidOperation,
    /// Resource already exists (HTTP 405/412)
    AlreadyExists,
    /// Permission denied (HTTP 403)
    PermissionDenied,
    /// Operation not supported (HTTP 501)
    NotSupported,
    /// Both sides of a dual write failed
    CombinedFailure,
    /// Remote store failure
    Upstream,
    /// Other local I/O failure
    Io,
}

impl ErrorCategory {
    /// Returns a human-readable name for this error category.
    pub fn name(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::InvalidOperation => "InvalidOperation",
            Self::AlreadyExists => "AlreadyExists",
            Self::PermissionDenied => "PermissionDenied",
            Self::NotSupported => "NotSupported",
            Self::CombinedFailure => "CombinedFailure",
            Self::Upstream => "Upstream",
            Self::Io => "Io",
        }
    }
}

impl From<&ProxyError> for ErrorCategory {
    fn from(e: &ProxyError) -> Self {
        match e {
            ProxyError::NotFound { .. } => Self::NotFound,
            ProxyError::InvalidOperation { .. } | ProxyError::RemoteWriteUnsupported { .. } => {
                Self::InvalidOperation
            }
            ProxyError::Combined { .. } => Self::CombinedFailure,
            ProxyError::Local(e) => Self::from(e),
            ProxyError::Remote(e) => Self::from(e),
        }
    }
}

impl From<&io::Error> for ErrorCategory {
    fn from(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::InvalidInput | io::ErrorKind::IsADirectory => Self::InvalidOperation,
            io::ErrorKind::Unsupported => Self::NotSupported,
            _ => Self::Io,
        }
    }
}

impl From<&RemoteError> for ErrorCategory {
    fn from(e: &RemoteError) -> Self {
        if e.is_not_found() {
            return Self::NotFound;
        }
        match e {
            RemoteError::Status { status: 401 | 403, .. } => Self::PermissionDenied,
            RemoteError::Status { status: 405, .. } => Self::AlreadyExists,
            _ => Self::Upstream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_error_categories() {
        assert_eq!(
            ProxyError::NotFound { path: "/x".into() }.category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            ProxyError::invalid("read", "is a directory").category(),
            ErrorCategory::InvalidOperation
        );
        assert_eq!(
            ProxyError::RemoteWriteUnsupported { path: "/x".into() }.category(),
            ErrorCategory::InvalidOperation
        );
        assert_eq!(
            ProxyError::Remote(RemoteError::Transport("reset".into())).category(),
            ErrorCategory::Upstream
        );
    }

    #[test]
    fn test_not_found_from_either_store() {
        let local = ProxyError::Local(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(local.is_not_found());

        let remote = ProxyError::Remote(RemoteError::NotFound { path: "/x".into() });
        assert!(remote.is_not_found());
    }

    #[test]
    fn test_combined_error_keeps_both_causes() {
        let err = ProxyError::Combined {
            op: DualOp::Mkdir,
            path: "/docs".into(),
            local: io::Error::new(io::ErrorKind::PermissionDenied, "read-only cache"),
            remote: RemoteError::Status {
                method: "MKCOL".into(),
                path: "/docs".into(),
                status: 507,
            },
        };

        let msg = err.to_string();
        assert!(msg.contains("create directory"));
        assert!(msg.contains("read-only cache"));
        assert!(msg.contains("507"));
        assert_eq!(err.category(), ErrorCategory::CombinedFailure);

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("read-only cache"));
    }
}
