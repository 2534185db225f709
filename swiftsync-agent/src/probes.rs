//! Self-test probes used by setup and diagnostics.
//!
//! Probes never fail: backend errors are logged and reported as `false`.

use serde::Serialize;
use tracing::{info, warn};

use swiftsync_common::{ObjectStore, RemoteFile};

use crate::transfer::TransferManager;

/// Fixed key of the throwaway object written by [`TransferManager::can_write`].
pub const WRITE_TEST_KEY: &str = "swiftsync-write-test";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageTestResult {
    pub can_connect: bool,
    pub target_exists: bool,
    pub can_write: bool,
    pub can_create: bool,
    pub repo_marker_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<S: ObjectStore> TransferManager<S> {
    /// True iff the configured container exists.
    pub fn target_exists(&self) -> bool {
        match self.store().container_exists() {
            Ok(true) => {
                info!(container = %self.container(), "Target exists");
                true
            }
            Ok(false) => {
                info!(container = %self.container(), "Target does not exist");
                false
            }
            Err(e) => {
                warn!(container = %self.container(), error = %e, "Cannot check target existence");
                false
            }
        }
    }

    /// True iff the target exists and a probe object can be created and
    /// removed. Nothing is written when the target is missing.
    pub fn can_write(&self) -> bool {
        if !self.target_exists() {
            info!("Cannot write, target does not exist");
            return false;
        }

        let result = tempfile::NamedTempFile::new()
            .map_err(Into::into)
            .and_then(|probe| self.store().put_object(WRITE_TEST_KEY, probe.path()))
            .and_then(|_| self.store().delete_object(WRITE_TEST_KEY));

        match result {
            Ok(()) => {
                info!("Can write, test object created and deleted");
                true
            }
            Err(e) => {
                warn!(key = WRITE_TEST_KEY, error = %e, "Cannot write to target");
                false
            }
        }
    }

    /// Whether the target container may be created with the current
    /// credentials.
    pub fn can_create(&self) -> bool {
        self.store().permits_container_create()
    }

    /// True iff the repository marker object exists, i.e. the target holds
    /// an initialized repository.
    pub fn repo_marker_exists(&self) -> bool {
        let key = RemoteFile::repo_marker().key();
        match self.store().object_exists(&key) {
            Ok(true) => {
                info!(key = %key, "Repo marker exists");
                true
            }
            Ok(false) => {
                info!(key = %key, "Repo marker does not exist");
                false
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cannot check repo marker existence");
                false
            }
        }
    }

    /// Connect and run every probe. `can_create` is only evaluated when
    /// `test_create_target` is set.
    pub fn run_self_test(&self, test_create_target: bool) -> StorageTestResult {
        if let Err(e) = self.connect() {
            warn!(error = %e, "Self-test cannot connect");
            return StorageTestResult {
                error: Some(e.to_string()),
                ..Default::default()
            };
        }

        let result = StorageTestResult {
            can_connect: true,
            target_exists: self.target_exists(),
            can_write: self.can_write(),
            can_create: test_create_target && self.can_create(),
            repo_marker_exists: self.repo_marker_exists(),
            error: None,
        };
        self.disconnect();
        result
    }
}
