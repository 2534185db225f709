//! Typed remote files and the storage key layout.
//!
//! Every category lives under a fixed prefix inside the container:
//!
//! | category                | prefix         |
//! |-------------------------|----------------|
//! | `Multichunk`            | `multichunks`  |
//! | `Database`, `Cleanup`   | `databases`    |
//! | `Action`                | `actions`      |
//! | `Transaction`           | `transactions` |
//! | `Temp`                  | `temp`         |
//! | `RepoMarker`            | container root |
//!
//! This layout is shared with repositories written by earlier clients and
//! must not change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the marker object that flags an initialized repository.
pub const REPO_MARKER_NAME: &str = "syncany";

/// Name prefix that distinguishes cleanup files from database files.
pub const CLEANUP_NAME_PREFIX: &str = "cleanup-";

/// Name prefix of the staging object written before an upload is committed.
pub const STAGING_NAME_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFileCategory {
    Multichunk,
    Database,
    Cleanup,
    Action,
    Transaction,
    Temp,
    RepoMarker,
}

impl RemoteFileCategory {
    pub const ALL: [RemoteFileCategory; 7] = [
        RemoteFileCategory::Multichunk,
        RemoteFileCategory::Database,
        RemoteFileCategory::Cleanup,
        RemoteFileCategory::Action,
        RemoteFileCategory::Transaction,
        RemoteFileCategory::Temp,
        RemoteFileCategory::RepoMarker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteFileCategory::Multichunk => "multichunk",
            RemoteFileCategory::Database => "database",
            RemoteFileCategory::Cleanup => "cleanup",
            RemoteFileCategory::Action => "action",
            RemoteFileCategory::Transaction => "transaction",
            RemoteFileCategory::Temp => "temp",
            RemoteFileCategory::RepoMarker => "repo_marker",
        }
    }

    /// Whether a bare name found under this category's prefix belongs to it.
    ///
    /// Database and cleanup files share the `databases` prefix and are told
    /// apart by name only. Staging objects left behind by an interrupted
    /// upload are never claimed, and the container root only yields the repo
    /// marker.
    pub fn claims(&self, name: &str) -> bool {
        if self.is_staging_name(name) {
            return false;
        }
        match self {
            RemoteFileCategory::Cleanup => name.starts_with(CLEANUP_NAME_PREFIX),
            RemoteFileCategory::Database => !name.starts_with(CLEANUP_NAME_PREFIX),
            RemoteFileCategory::RepoMarker => name == REPO_MARKER_NAME,
            _ => true,
        }
    }

    /// Whether `name` is the staging object of another file in this
    /// category. Temp files carry the staging prefix themselves, so only the
    /// doubled prefix marks their staging objects.
    pub fn is_staging_name(&self, name: &str) -> bool {
        match self {
            RemoteFileCategory::Temp => name
                .strip_prefix(STAGING_NAME_PREFIX)
                .is_some_and(|rest| rest.starts_with(STAGING_NAME_PREFIX)),
            _ => name.starts_with(STAGING_NAME_PREFIX),
        }
    }
}

impl fmt::Display for RemoteFileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteFileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RemoteFileCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown remote file category: {}", s))
    }
}

/// Storage prefix ("directory") for a category. Categories without a
/// dedicated prefix resolve to the container root.
pub fn prefix_for(category: RemoteFileCategory) -> &'static str {
    match category {
        RemoteFileCategory::Multichunk => "multichunks",
        RemoteFileCategory::Database | RemoteFileCategory::Cleanup => "databases",
        RemoteFileCategory::Action => "actions",
        RemoteFileCategory::Transaction => "transactions",
        RemoteFileCategory::Temp => "temp",
        // Repo marker and anything without a dedicated prefix.
        _ => "",
    }
}

/// Join a prefix and a bare name into an object key.
pub fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Full object key for a remote file: `{prefix}/{name}`.
pub fn key_for(file: &RemoteFile) -> String {
    join_key(prefix_for(file.category), &file.name)
}

/// A file in the remote repository, identified by category and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteFile {
    pub category: RemoteFileCategory,
    pub name: String,
}

impl RemoteFile {
    pub fn new(category: RemoteFileCategory, name: impl Into<String>) -> Self {
        Self { category, name: name.into() }
    }

    pub fn repo_marker() -> Self {
        Self::new(RemoteFileCategory::RepoMarker, REPO_MARKER_NAME)
    }

    pub fn key(&self) -> String {
        key_for(self)
    }

    /// Key of the staging object used while this file is being uploaded.
    pub fn staging_key(&self) -> String {
        join_key(
            prefix_for(self.category),
            &format!("{}{}", STAGING_NAME_PREFIX, self.name),
        )
    }

    /// Rebuild a remote file from an object key returned by a listing.
    ///
    /// Returns `None` if the key is outside the category's prefix, is nested
    /// deeper than the prefix, or carries a name the category does not claim.
    pub fn from_key(category: RemoteFileCategory, key: &str) -> Option<Self> {
        let prefix = prefix_for(category);
        let name = if prefix.is_empty() {
            key
        } else {
            key.strip_prefix(prefix)?.strip_prefix('/')?
        };

        if name.is_empty() || name.contains('/') || !category.claims(name) {
            return None;
        }
        Some(Self::new(category, name))
    }
}

impl fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_layout() {
        assert_eq!(prefix_for(RemoteFileCategory::Multichunk), "multichunks");
        assert_eq!(prefix_for(RemoteFileCategory::Database), "databases");
        assert_eq!(prefix_for(RemoteFileCategory::Cleanup), "databases");
        assert_eq!(prefix_for(RemoteFileCategory::Action), "actions");
        assert_eq!(prefix_for(RemoteFileCategory::Transaction), "transactions");
        assert_eq!(prefix_for(RemoteFileCategory::Temp), "temp");
        assert_eq!(prefix_for(RemoteFileCategory::RepoMarker), "");
    }

    #[test]
    fn test_prefix_is_stable() {
        for category in RemoteFileCategory::ALL {
            assert_eq!(prefix_for(category), prefix_for(category));
        }
    }

    #[test]
    fn test_key_for() {
        let file = RemoteFile::new(RemoteFileCategory::Multichunk, "abc123");
        assert_eq!(key_for(&file), "multichunks/abc123");
        assert_eq!(RemoteFile::repo_marker().key(), "syncany");
    }

    #[test]
    fn test_staging_key_stays_in_prefix() {
        let file = RemoteFile::new(RemoteFileCategory::Database, "db-A-1");
        assert_eq!(file.staging_key(), "databases/temp-db-A-1");
    }

    #[test]
    fn test_from_key_roundtrip() {
        for category in RemoteFileCategory::ALL {
            let name = match category {
                RemoteFileCategory::Cleanup => "cleanup-7",
                RemoteFileCategory::RepoMarker => REPO_MARKER_NAME,
                _ => "file-01",
            };
            let file = RemoteFile::new(category, name);
            assert_eq!(RemoteFile::from_key(category, &file.key()), Some(file));
        }
    }

    #[test]
    fn test_from_key_rejects_foreign_keys() {
        assert!(RemoteFile::from_key(RemoteFileCategory::Action, "multichunks/abc").is_none());
        assert!(RemoteFile::from_key(RemoteFileCategory::Action, "actionsx/abc").is_none());
        assert!(RemoteFile::from_key(RemoteFileCategory::Action, "actions/sub/abc").is_none());
        assert!(RemoteFile::from_key(RemoteFileCategory::Action, "actions/").is_none());
    }

    #[test]
    fn test_database_and_cleanup_share_prefix() {
        assert!(RemoteFile::from_key(RemoteFileCategory::Database, "databases/cleanup-3").is_none());
        assert!(RemoteFile::from_key(RemoteFileCategory::Cleanup, "databases/db-A-1").is_none());
        assert_eq!(
            RemoteFile::from_key(RemoteFileCategory::Cleanup, "databases/cleanup-3"),
            Some(RemoteFile::new(RemoteFileCategory::Cleanup, "cleanup-3"))
        );
    }

    #[test]
    fn test_staging_objects_are_not_claimed() {
        let cleanup = RemoteFile::new(RemoteFileCategory::Cleanup, "cleanup-3");
        assert!(RemoteFile::from_key(RemoteFileCategory::Database, &cleanup.staging_key()).is_none());
        assert!(RemoteFile::from_key(RemoteFileCategory::Cleanup, &cleanup.staging_key()).is_none());
        assert!(RemoteFile::from_key(RemoteFileCategory::Multichunk, "multichunks/temp-abc").is_none());

        let temp = RemoteFile::new(RemoteFileCategory::Temp, "temp-1");
        assert_eq!(RemoteFile::from_key(RemoteFileCategory::Temp, &temp.key()), Some(temp.clone()));
        assert!(RemoteFile::from_key(RemoteFileCategory::Temp, &temp.staging_key()).is_none());
    }

    #[test]
    fn test_container_root_only_yields_repo_marker() {
        assert_eq!(
            RemoteFile::from_key(RemoteFileCategory::RepoMarker, "syncany"),
            Some(RemoteFile::repo_marker())
        );
        assert!(RemoteFile::from_key(RemoteFileCategory::RepoMarker, "swiftsync-write-test").is_none());
        assert!(RemoteFile::from_key(RemoteFileCategory::RepoMarker, "temp-syncany").is_none());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("multichunk".parse::<RemoteFileCategory>(), Ok(RemoteFileCategory::Multichunk));
        assert_eq!("repo_marker".parse::<RemoteFileCategory>(), Ok(RemoteFileCategory::RepoMarker));
        assert!("chunks".parse::<RemoteFileCategory>().is_err());
    }
}
