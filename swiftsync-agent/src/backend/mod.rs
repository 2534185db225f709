pub mod auth;
pub mod swift;

use std::sync::Arc;

use swiftsync_common::{ObjectStore, StorageError};

use self::swift::SwiftStore;
use crate::config::SwiftConfig;
use crate::consistency::DirectProbe;
use crate::transfer::TransferManager;

/// Authenticate against Swift and build a transfer manager for the
/// configured container.
pub fn open_swift(config: &SwiftConfig) -> Result<TransferManager<SwiftStore>, StorageError> {
    let store = SwiftStore::connect(config).map_err(|source| StorageError::Connectivity {
        target: config.auth_url.clone(),
        source,
    })?;
    Ok(transfer_manager(Arc::new(store), config.verify_writes))
}

/// Wrap a store in a transfer manager, installing write verification for
/// stores without read-after-write consistency.
pub fn transfer_manager<S: ObjectStore + 'static>(
    store: Arc<S>,
    verify_writes: bool,
) -> TransferManager<S> {
    let manager = TransferManager::new(store.clone());
    if verify_writes {
        manager.with_verifier(Arc::new(DirectProbe::new(store)))
    } else {
        manager
    }
}
