//! Swift storage adapter for the sync client.
//!
//! Presents an OpenStack Swift container as a typed remote repository:
//! files are addressed by category and name, uploads are staged and
//! committed with a server-side copy, and writes can be verified against
//! eventually-consistent replicas.

pub mod backend;
pub mod config;
pub mod consistency;
pub mod probes;
pub mod transfer;

pub use backend::swift::SwiftStore;
pub use config::SwiftConfig;
pub use probes::StorageTestResult;
pub use transfer::TransferManager;
