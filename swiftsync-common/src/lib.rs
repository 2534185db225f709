pub mod backend;
pub mod consistency;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod remote_file;

pub use backend::{AccountInfo, ObjectInfo, ObjectStore};
pub use consistency::ConsistencyVerifier;
pub use error::{StorageError, StoreError};
pub use remote_file::{RemoteFile, RemoteFileCategory};
