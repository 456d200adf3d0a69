//! Error handling and mapping for the WebDAV layer.
//!
//! Proxy errors are converted to dav-server errors through the shared
//! [`ErrorCategory`](cachedav_core::ErrorCategory), so the HTTP status a
//! client sees depends only on what kind of failure happened.

use cachedav_core::{ErrorCategory, ProxyError, RemoteError};
use dav_server::fs::FsError;
use std::io;
use thiserror::Error;
use tracing::debug;

/// Errors raised while setting up the client or the server.
#[derive(Debug, Error)]
pub enum WebDavError {
    /// The remote URL could not be used as a WebDAV base.
    #[error("Invalid remote URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The remote store rejected or did not answer the startup probe.
    #[error("Remote WebDAV server unreachable: {0}")]
    Connect(#[from] RemoteError),

    /// IO error (binding the listener, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for WebDAV setup operations.
pub type WebDavResult<T> = Result<T, WebDavError>;

/// Convert an error category to a dav-server FsError.
pub fn category_to_fs_error(category: ErrorCategory) -> FsError {
    match category {
        ErrorCategory::NotFound => FsError::NotFound,
        ErrorCategory::AlreadyExists => FsError::Exists,
        ErrorCategory::InvalidOperation | ErrorCategory::PermissionDenied => FsError::Forbidden,
        ErrorCategory::NotSupported => FsError::NotImplemented,
        ErrorCategory::CombinedFailure | ErrorCategory::Upstream | ErrorCategory::Io => {
            FsError::GeneralFailure
        }
    }
}

/// Converts a proxy error to a dav-server FsError.
///
/// Takes ownership to work with `.map_err()`.
#[allow(clippy::needless_pass_by_value)]
pub fn proxy_error_to_fs_error(e: ProxyError) -> FsError {
    let category = e.category();
    debug!(error = %e, category = category.name(), "Proxy operation failed");
    category_to_fs_error(category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachedav_core::DualOp;

    #[test]
    fn test_category_mapping() {
        assert!(matches!(
            category_to_fs_error(ErrorCategory::NotFound),
            FsError::NotFound
        ));
        assert!(matches!(
            category_to_fs_error(ErrorCategory::AlreadyExists),
            FsError::Exists
        ));
        assert!(matches!(
            category_to_fs_error(ErrorCategory::PermissionDenied),
            FsError::Forbidden
        ));
        assert!(matches!(
            category_to_fs_error(ErrorCategory::NotSupported),
            FsError::NotImplemented
        ));
    }

    #[test]
    fn test_proxy_error_mapping() {
        assert!(matches!(
            proxy_error_to_fs_error(ProxyError::NotFound { path: "/x".into() }),
            FsError::NotFound
        ));
        assert!(matches!(
            proxy_error_to_fs_error(ProxyError::RemoteWriteUnsupported { path: "/x".into() }),
            FsError::Forbidden
        ));
        assert!(matches!(
            proxy_error_to_fs_error(ProxyError::Remote(RemoteError::NotFound {
                path: "/x".into()
            })),
            FsError::NotFound
        ));

        let combined = ProxyError::Combined {
            op: DualOp::Rename,
            path: "/x".into(),
            local: io::Error::new(io::ErrorKind::NotFound, "gone"),
            remote: RemoteError::Transport("refused".into()),
        };
        assert!(matches!(
            proxy_error_to_fs_error(combined),
            FsError::GeneralFailure
        ));
    }
}
