use crate::error::StorageError;
use crate::remote_file::RemoteFile;

/// Capability for backends that are only eventually consistent.
///
/// Installed on a transfer manager at construction time. After each write the
/// manager asks whether the written file is visible yet; backends with
/// read-after-write consistency install no verifier and pay nothing.
pub trait ConsistencyVerifier: Send + Sync {
    /// Probe the backend for `file` directly. Returns `Ok(false)` when the
    /// object is not found and an error only when the backend is unreachable.
    fn exists_after_write(&self, file: &RemoteFile) -> Result<bool, StorageError>;
}
