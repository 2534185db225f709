//! Transfer manager.
//!
//! Maps typed remote files onto object keys and drives the object store.
//! Object stores offer no rename and no conditional create, so uploads are
//! staged under `temp-<name>` and committed with a server-side copy, and
//! moves are a copy followed by a delete of the source. A crash between the
//! copy and the delete leaves both objects in place; that case is reported as
//! [`StorageError::IncompleteMove`] and never retried here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use swiftsync_common::remote_file::prefix_for;
use swiftsync_common::{
    AccountInfo, ConsistencyVerifier, ObjectInfo, ObjectStore, RemoteFile, RemoteFileCategory,
    StorageError, StoreError,
};

pub struct TransferManager<S: ObjectStore> {
    store: Arc<S>,
    verifier: Option<Arc<dyn ConsistencyVerifier>>,
}

/// Keeps the manager connected for the enclosing scope and disconnects when
/// dropped, on every exit path.
struct Connection<'a, S: ObjectStore> {
    manager: &'a TransferManager<S>,
}

impl<S: ObjectStore> Drop for Connection<'_, S> {
    fn drop(&mut self) {
        self.manager.disconnect();
    }
}

impl<S: ObjectStore> TransferManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, verifier: None }
    }

    /// Check written files with `verifier` before reporting success.
    pub fn with_verifier(mut self, verifier: Arc<dyn ConsistencyVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn container(&self) -> &str {
        self.store.container()
    }

    /// Validate the session by reading account metadata.
    pub fn connect(&self) -> Result<AccountInfo, StorageError> {
        let account = self.store.account_info().map_err(|source| StorageError::Connectivity {
            target: self.container().to_string(),
            source,
        })?;
        info!(
            bytes_used = account.bytes_used,
            containers = account.container_count,
            objects = account.object_count,
            "Using object storage account"
        );
        Ok(account)
    }

    /// Sessions are stateless; kept so callers can pair it with `connect`.
    pub fn disconnect(&self) {}

    fn connection(&self) -> Result<Connection<'_, S>, StorageError> {
        self.connect()?;
        Ok(Connection { manager: self })
    }

    /// Connect and make sure the target container exists, creating it when
    /// `create_if_missing` is set.
    pub fn init(&self, create_if_missing: bool) -> Result<(), StorageError> {
        let _connection = self.connection()?;

        let exists = self
            .store
            .container_exists()
            .map_err(|source| self.init_error(source))?;
        if exists {
            debug!(container = %self.container(), "Container already exists");
        } else if create_if_missing {
            self.store
                .create_container()
                .map_err(|source| self.init_error(source))?;
            info!(container = %self.container(), "Created container");
        } else {
            warn!(container = %self.container(), "Container does not exist and creation was not requested");
        }
        Ok(())
    }

    fn init_error(&self, source: StoreError) -> StorageError {
        StorageError::Initialization {
            container: self.container().to_string(),
            source,
        }
    }

    /// Upload `local` as `file`. The content is fully written to a staging
    /// object before anything touches the final key.
    ///
    /// [`StorageError::NotYetVisible`] is only returned after the commit: the
    /// object is stored under its final key and the staging object is gone,
    /// but the installed verifier could not observe it yet.
    pub fn upload(&self, local: &Path, file: &RemoteFile) -> Result<(), StorageError> {
        let key = file.key();
        let staging = file.staging_key();

        info!(local = %local.display(), staging = %staging, "Uploading to staging object");
        if let Err(source) = self.store.put_object(&staging, local) {
            self.discard_staging(&staging);
            return Err(StorageError::Upload { key, source });
        }

        debug!(from = %staging, to = %key, "Committing staged upload");
        if let Err(source) = self.store.copy_object(&staging, &key) {
            self.discard_staging(&staging);
            return Err(StorageError::Upload { key, source });
        }

        if let Err(source) = self.store.delete_object(&staging) {
            error!(staging = %staging, key = %key, error = %source, "Staging object left behind after commit");
            return Err(StorageError::IncompleteMove { from: staging, to: key, source });
        }

        self.verify_visible(file, key)
    }

    fn discard_staging(&self, staging: &str) {
        if let Err(e) = self.store.delete_object(staging) {
            warn!(key = %staging, error = %e, "Failed to remove staging object");
        }
    }

    fn verify_visible(&self, file: &RemoteFile, key: String) -> Result<(), StorageError> {
        let Some(verifier) = &self.verifier else {
            return Ok(());
        };
        if verifier.exists_after_write(file)? {
            debug!(key = %key, "Write verified");
            Ok(())
        } else {
            warn!(key = %key, "Written object not yet visible");
            Err(StorageError::NotYetVisible { key })
        }
    }

    /// Download `file` into `local`. The content lands in a temporary file
    /// next to `local` which then replaces it, so `local` is never half
    /// written.
    pub fn download(&self, file: &RemoteFile, local: &Path) -> Result<(), StorageError> {
        if file.name == "." || file.name == ".." {
            debug!(name = %file.name, "Skipping download of pseudo-entry");
            return Ok(());
        }

        let key = file.key();
        let fail = |source: StoreError| StorageError::Download { key: key.clone(), source };

        let dir = match local.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::Builder::new()
            .prefix(".swiftsync-")
            .tempfile_in(dir)
            .map_err(|e| fail(e.into()))?;

        info!(key = %key, temp = %temp.path().display(), "Downloading to temp file");
        self.store.get_object(&key, temp.as_file_mut()).map_err(&fail)?;
        temp.as_file().sync_all().map_err(|e| fail(e.into()))?;

        info!(temp = %temp.path().display(), local = %local.display(), "Moving temp file into place");
        temp.persist(local).map_err(|e| fail(e.error.into()))?;
        Ok(())
    }

    /// Delete `file`. Deleting a file that does not exist succeeds.
    pub fn delete(&self, file: &RemoteFile) -> Result<(), StorageError> {
        let key = file.key();
        self.store
            .delete_object(&key)
            .map_err(|source| StorageError::Backend { op: "delete", key: key.clone(), source })?;
        debug!(key = %key, "Deleted");
        Ok(())
    }

    /// Rename `source` to `target` by copying and then deleting the source.
    ///
    /// As with [`TransferManager::upload`], `NotYetVisible` means the move
    /// completed and only the visibility check failed.
    pub fn move_file(&self, source: &RemoteFile, target: &RemoteFile) -> Result<(), StorageError> {
        let from = source.key();
        let to = target.key();

        self.store
            .copy_object(&from, &to)
            .map_err(|e| StorageError::Backend { op: "copy", key: from.clone(), source: e })?;

        if let Err(e) = self.store.delete_object(&from) {
            error!(from = %from, to = %to, error = %e, "Source left behind after copy");
            return Err(StorageError::IncompleteMove { from, to, source: e });
        }

        debug!(from = %from, to = %to, "Moved");
        self.verify_visible(target, to)
    }

    /// List the files of `category` together with their object metadata.
    pub fn list_objects(
        &self,
        category: RemoteFileCategory,
    ) -> Result<Vec<(RemoteFile, ObjectInfo)>, StorageError> {
        let prefix = match prefix_for(category) {
            "" => String::new(),
            p => format!("{}/", p),
        };

        let objects = self
            .store
            .list_objects(&prefix)
            .map_err(|source| StorageError::Backend { op: "list", key: prefix.clone(), source })?;

        Ok(objects
            .into_iter()
            .filter_map(|object| RemoteFile::from_key(category, &object.key).map(|f| (f, object)))
            .collect())
    }

    /// List the files of `category`, keyed by bare name.
    pub fn list(
        &self,
        category: RemoteFileCategory,
    ) -> Result<HashMap<String, RemoteFile>, StorageError> {
        let files = self
            .list_objects(category)?
            .into_iter()
            .map(|(file, _)| (file.name.clone(), file))
            .collect::<HashMap<_, _>>();
        debug!(category = %category, count = files.len(), "Listed remote files");
        Ok(files)
    }
}
