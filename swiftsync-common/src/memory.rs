//! In-memory object store.
//!
//! Behaves like a single-container object store and can be told to fail
//! chosen operations or to delay visibility of new writes, which makes it the
//! backend double for exercising staging, move and consistency paths.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::debug;

use crate::backend::{AccountInfo, ObjectInfo, ObjectStore};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    AccountInfo,
    ContainerExists,
    CreateContainer,
    Put,
    Get,
    Copy,
    Delete,
    Exists,
    List,
}

/// Error produced by an injected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Unavailable,
    Unauthorized,
    Forbidden,
}

impl FaultKind {
    fn to_error(self, key: &str) -> StoreError {
        match self {
            FaultKind::Unavailable => StoreError::Status {
                status: 503,
                body: format!("injected fault on {}", key),
            },
            FaultKind::Unauthorized => StoreError::Unauthorized(key.to_string()),
            FaultKind::Forbidden => StoreError::Forbidden(key.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct Fault {
    op: StoreOp,
    key_fragment: String,
    kind: FaultKind,
}

#[derive(Debug, Default)]
struct State {
    container_exists: bool,
    objects: BTreeMap<String, Bytes>,
    faults: Vec<Fault>,
    eventual: bool,
    pending: HashSet<String>,
    log: Vec<(StoreOp, String)>,
}

pub struct MemoryStore {
    container: String,
    state: Mutex<State>,
}

impl MemoryStore {
    /// A store whose container already exists.
    pub fn new(container: impl Into<String>) -> Self {
        let store = Self::without_container(container);
        store.lock().container_exists = true;
        store
    }

    /// A store whose container has not been created yet.
    pub fn without_container(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every later `op` whose key contains `key_fragment` fail. An empty
    /// fragment matches every key.
    pub fn inject_fault(&self, op: StoreOp, key_fragment: impl Into<String>, kind: FaultKind) {
        self.lock().faults.push(Fault { op, key_fragment: key_fragment.into(), kind });
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// When enabled, newly written objects stay invisible to existence checks
    /// until [`MemoryStore::settle`] is called.
    pub fn set_eventually_consistent(&self, eventual: bool) {
        self.lock().eventual = eventual;
    }

    pub fn settle(&self) {
        self.lock().pending.clear();
    }

    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.lock().objects.insert(key.into(), data.into());
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Every operation issued so far with the key it addressed.
    pub fn operations(&self) -> Vec<(StoreOp, String)> {
        self.lock().log.clone()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.lock().log.iter().filter(|(o, _)| *o == op).count()
    }

    /// Record the call, then apply faults and the container check.
    fn begin(&self, op: StoreOp, keys: &[&str]) -> Result<MutexGuard<'_, State>, StoreError> {
        let mut state = self.lock();
        state.log.push((op, keys.join(" -> ")));

        let fault = state.faults.iter().find(|f| {
            f.op == op && keys.iter().any(|k| k.contains(f.key_fragment.as_str()))
        });
        if let Some(fault) = fault {
            debug!(?op, key = %keys.join(" -> "), "Injected fault");
            return Err(fault.kind.to_error(keys.first().copied().unwrap_or_default()));
        }

        let needs_container = !matches!(
            op,
            StoreOp::AccountInfo | StoreOp::ContainerExists | StoreOp::CreateContainer
        );
        if needs_container && !state.container_exists {
            return Err(StoreError::NotFound(self.container.clone()));
        }
        Ok(state)
    }

    fn visible(state: &State, key: &str) -> bool {
        state.objects.contains_key(key) && !state.pending.contains(key)
    }

    fn record_write(state: &mut State, key: &str, data: Bytes) {
        state.objects.insert(key.to_string(), data);
        if state.eventual {
            state.pending.insert(key.to_string());
        }
    }
}

impl ObjectStore for MemoryStore {
    fn container(&self) -> &str {
        &self.container
    }

    fn account_info(&self) -> Result<AccountInfo, StoreError> {
        let state = self.begin(StoreOp::AccountInfo, &[""])?;
        Ok(AccountInfo {
            bytes_used: state.objects.values().map(|b| b.len() as u64).sum(),
            container_count: u64::from(state.container_exists),
            object_count: state.objects.len() as u64,
        })
    }

    fn container_exists(&self) -> Result<bool, StoreError> {
        let state = self.begin(StoreOp::ContainerExists, &[self.container.as_str()])?;
        Ok(state.container_exists)
    }

    fn create_container(&self) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOp::CreateContainer, &[self.container.as_str()])?;
        state.container_exists = true;
        Ok(())
    }

    fn put_object(&self, key: &str, source: &Path) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOp::Put, &[key])?;
        let data = std::fs::read(source)?;
        Self::record_write(&mut state, key, Bytes::from(data));
        Ok(())
    }

    fn get_object(&self, key: &str, dest: &mut dyn Write) -> Result<u64, StoreError> {
        let state = self.begin(StoreOp::Get, &[key])?;
        let data = state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        drop(state);
        dest.write_all(&data)?;
        Ok(data.len() as u64)
    }

    fn copy_object(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOp::Copy, &[from, to])?;
        let data = state
            .objects
            .get(from)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        Self::record_write(&mut state, to, data);
        Ok(())
    }

    fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.begin(StoreOp::Delete, &[key])?;
        state.objects.remove(key);
        state.pending.remove(key);
        Ok(())
    }

    fn object_exists(&self, key: &str) -> Result<bool, StoreError> {
        let state = self.begin(StoreOp::Exists, &[key])?;
        Ok(Self::visible(&state, key))
    }

    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let state = self.begin(StoreOp::List, &[prefix])?;
        let listing = state
            .objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(key, data)| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
                hash: None,
                last_modified: None,
            })
            .collect();
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_is_shallow() {
        let store = MemoryStore::new("c");
        store.insert("multichunks/a", "1");
        store.insert("multichunks/deep/b", "2");
        store.insert("multichunksx/c", "3");
        store.insert("syncany", "4");

        let keys: Vec<_> = store.list_objects("multichunks/").unwrap().into_iter().map(|o| o.key).collect();
        assert_eq!(keys, vec!["multichunks/a"]);

        let root: Vec<_> = store.list_objects("").unwrap().into_iter().map(|o| o.key).collect();
        assert_eq!(root, vec!["syncany"]);
    }

    #[test]
    fn test_missing_container_rejects_object_calls() {
        let store = MemoryStore::without_container("c");
        assert!(!store.container_exists().unwrap());
        assert!(store.object_exists("k").unwrap_err().is_not_found());
        store.create_container().unwrap();
        assert!(!store.object_exists("k").unwrap());
    }

    #[test]
    fn test_injected_fault_matches_fragment() {
        let store = MemoryStore::new("c");
        store.insert("a/one", "1");
        store.inject_fault(StoreOp::Delete, "one", FaultKind::Forbidden);
        assert!(matches!(store.delete_object("a/one"), Err(StoreError::Forbidden(_))));
        store.clear_faults();
        store.delete_object("a/one").unwrap();
        assert!(store.object("a/one").is_none());
    }

    #[test]
    fn test_eventual_visibility() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("payload");
        std::fs::write(&src, b"data").unwrap();

        let store = MemoryStore::new("c");
        store.set_eventually_consistent(true);
        store.put_object("k", &src).unwrap();
        assert!(!store.object_exists_newest("k").unwrap());
        store.settle();
        assert!(store.object_exists_newest("k").unwrap());
    }
}
