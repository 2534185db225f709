use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;

/// Account-level usage reported by the storage service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub bytes_used: u64,
    pub container_count: u64,
    pub object_count: u64,
}

/// One object returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub hash: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Trait implemented by object storage sessions.
///
/// A store is bound to one authenticated session and one container. It only
/// performs raw requests; staging, renames, key layout and error
/// classification are the transfer manager's job. Implementations hold no
/// mutable state after construction and may be shared across threads.
pub trait ObjectStore: Send + Sync {
    /// Name of the container this store is bound to.
    fn container(&self) -> &str;

    /// Query account metadata. Used to validate the session.
    fn account_info(&self) -> Result<AccountInfo, StoreError>;

    fn container_exists(&self) -> Result<bool, StoreError>;

    fn create_container(&self) -> Result<(), StoreError>;

    /// Whether credentials accepted by this backend may always create
    /// containers.
    fn permits_container_create(&self) -> bool {
        true
    }

    /// Upload the contents of a local file to `key`, replacing any existing
    /// object.
    fn put_object(&self, key: &str, source: &Path) -> Result<(), StoreError>;

    /// Stream the object at `key` into `dest`, returning the byte count.
    fn get_object(&self, key: &str, dest: &mut dyn Write) -> Result<u64, StoreError>;

    /// Server-side copy from `from` to `to`.
    fn copy_object(&self, from: &str, to: &str) -> Result<(), StoreError>;

    /// Delete `key`. A missing object is not an error.
    fn delete_object(&self, key: &str) -> Result<(), StoreError>;

    fn object_exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Existence check that bypasses intermediate caches and asks for the
    /// newest replica. Defaults to a plain existence check.
    fn object_exists_newest(&self, key: &str) -> Result<bool, StoreError> {
        self.object_exists(key)
    }

    /// List objects directly under `prefix` (which should end in `/` unless
    /// empty). Deeper keys are not returned.
    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError>;
}
