/// Failure reported by an object store for a single request.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Authentication rejected: {0}")]
    Unauthorized(String),
    #[error("Access forbidden: {0}")]
    Forbidden(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected response: HTTP {status} - {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Errors caused by the network or the service being unavailable, as
    /// opposed to a definite answer from the backend.
    pub fn is_transport(&self) -> bool {
        match self {
            StoreError::Http(_) => true,
            StoreError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Adapter-level errors. Each variant names the storage key or target that
/// was being accessed and keeps the backend error as its source.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Cannot reach object storage ({target}): {source}")]
    Connectivity {
        target: String,
        #[source]
        source: StoreError,
    },
    #[error("Cannot initialize container {container}: {source}")]
    Initialization {
        container: String,
        #[source]
        source: StoreError,
    },
    #[error("Upload to {key} failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("Download of {key} failed: {source}")]
    Download {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("Copied {from} to {to} but could not remove {from}: {source}")]
    IncompleteMove {
        from: String,
        to: String,
        #[source]
        source: StoreError,
    },
    /// The write was committed but the verifier cannot see it yet.
    #[error("{key} is not yet visible after write")]
    NotYetVisible { key: String },
    #[error("{op} on {key} failed: {source}")]
    Backend {
        op: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },
}

impl StorageError {
    /// Whether repeating the same call later may succeed. The adapter itself
    /// never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::NotYetVisible { .. } => true,
            StorageError::Connectivity { source, .. } => source.is_transport(),
            _ => false,
        }
    }

    /// The storage key or target the failed call was addressing.
    pub fn key(&self) -> &str {
        match self {
            StorageError::Connectivity { target, .. } => target,
            StorageError::Initialization { container, .. } => container,
            StorageError::Upload { key, .. }
            | StorageError::Download { key, .. }
            | StorageError::NotYetVisible { key }
            | StorageError::Backend { key, .. } => key,
            StorageError::IncompleteMove { from, .. } => from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_key_and_cause() {
        let err = StorageError::Backend {
            op: "delete",
            key: "multichunks/abc".into(),
            source: StoreError::Forbidden("multichunks/abc".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("multichunks/abc"));
        assert!(msg.contains("forbidden"));
    }

    #[test]
    fn test_not_found_and_forbidden_stay_distinct() {
        assert!(StoreError::NotFound("k".into()).is_not_found());
        assert!(!StoreError::Forbidden("k".into()).is_not_found());
    }

    #[test]
    fn test_is_retryable() {
        assert!(StorageError::NotYetVisible { key: "k".into() }.is_retryable());
        let unavailable = StorageError::Connectivity {
            target: "k".into(),
            source: StoreError::Status { status: 503, body: String::new() },
        };
        assert!(unavailable.is_retryable());
        let rejected = StorageError::Connectivity {
            target: "k".into(),
            source: StoreError::Unauthorized("bad token".into()),
        };
        assert!(!rejected.is_retryable());
        let upload = StorageError::Upload {
            key: "k".into(),
            source: StoreError::Status { status: 503, body: String::new() },
        };
        assert!(!upload.is_retryable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
