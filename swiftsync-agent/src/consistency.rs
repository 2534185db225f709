use std::sync::Arc;

use tracing::debug;

use swiftsync_common::{ConsistencyVerifier, ObjectStore, RemoteFile, StorageError};

/// Verifies writes by asking the store for the newest replica of the object.
///
/// Swift only guarantees eventual consistency for object writes observed
/// through its proxies, so the transfer manager for Swift installs this
/// verifier by default.
pub struct DirectProbe<S: ObjectStore> {
    store: Arc<S>,
}

impl<S: ObjectStore> DirectProbe<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: ObjectStore> ConsistencyVerifier for DirectProbe<S> {
    fn exists_after_write(&self, file: &RemoteFile) -> Result<bool, StorageError> {
        let key = file.key();
        match self.store.object_exists_newest(&key) {
            Ok(exists) => {
                debug!(key = %key, exists, "Probed object after write");
                Ok(exists)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(source) => Err(StorageError::Connectivity { target: key, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swiftsync_common::memory::{FaultKind, MemoryStore, StoreOp};
    use swiftsync_common::{RemoteFileCategory, StoreError};

    #[test]
    fn test_reports_presence() {
        let store = Arc::new(MemoryStore::new("repo"));
        store.insert("actions/action-1", "a");
        let probe = DirectProbe::new(store);
        assert!(probe
            .exists_after_write(&RemoteFile::new(RemoteFileCategory::Action, "action-1"))
            .unwrap());
        assert!(!probe
            .exists_after_write(&RemoteFile::new(RemoteFileCategory::Action, "action-2"))
            .unwrap());
    }

    #[test]
    fn test_missing_container_is_not_an_error() {
        let probe = DirectProbe::new(Arc::new(MemoryStore::without_container("repo")));
        assert!(!probe.exists_after_write(&RemoteFile::repo_marker()).unwrap());
    }

    #[test]
    fn test_transport_failure_is_connectivity_error() {
        let store = Arc::new(MemoryStore::new("repo"));
        store.inject_fault(StoreOp::Exists, "", FaultKind::Unavailable);
        let probe = DirectProbe::new(store);
        let err = probe.exists_after_write(&RemoteFile::repo_marker()).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Connectivity { ref target, source: StoreError::Status { status: 503, .. } }
                if target == "syncany"
        ));
        assert!(err.is_retryable());
    }
}
