use std::path::Path;

use anyhow::{bail, Context};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use swiftsync_agent::{backend, StorageTestResult, SwiftConfig, TransferManager};
use swiftsync_common::{ObjectStore, RemoteFile, RemoteFileCategory};

const USAGE: &str = "usage: swiftsync-agent <config.toml> <command>

commands:
  init [--create]
  test [--create]
  upload <local> <category> <name>
  download <category> <name> <local>
  delete <category> <name>
  move <category> <name> <category> <name>
  ls <category>

categories: multichunk, database, cleanup, action, transaction, temp, repo_marker";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, command, rest) = match args.as_slice() {
        [config_path, command, rest @ ..] => (config_path, command.as_str(), rest),
        _ => bail!("{}", USAGE),
    };
    let config = SwiftConfig::load(Path::new(config_path))?;
    info!(container = %config.container, "swiftsync-agent starting");

    let manager = match backend::open_swift(&config) {
        Ok(manager) => manager,
        Err(e) if command == "test" => {
            error!(error = %e, "Cannot authenticate");
            let result = StorageTestResult {
                error: Some(e.to_string()),
                ..Default::default()
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    run(&manager, command, rest)
}

fn run<S: ObjectStore>(
    manager: &TransferManager<S>,
    command: &str,
    args: &[String],
) -> anyhow::Result<()> {
    match (command, args) {
        ("init", flags) => {
            manager.init(has_flag(flags, "--create"))?;
            info!(container = %manager.container(), "Target initialized");
        }
        ("test", flags) => {
            let result = manager.run_self_test(has_flag(flags, "--create"));
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        ("upload", [local, category, name]) => {
            let file = remote_file(category, name)?;
            manager
                .upload(Path::new(local), &file)
                .with_context(|| format!("Failed to upload {}", local))?;
            info!(file = %file, "Upload complete");
        }
        ("download", [category, name, local]) => {
            let file = remote_file(category, name)?;
            manager
                .download(&file, Path::new(local))
                .with_context(|| format!("Failed to download {}", file))?;
            info!(file = %file, local = %local, "Download complete");
        }
        ("delete", [category, name]) => {
            manager.delete(&remote_file(category, name)?)?;
        }
        ("move", [from_category, from_name, to_category, to_name]) => {
            let source = remote_file(from_category, from_name)?;
            let target = remote_file(to_category, to_name)?;
            manager.move_file(&source, &target)?;
            info!(from = %source, to = %target, "Move complete");
        }
        ("ls", [category]) => {
            let category = parse_category(category)?;
            for (file, object) in manager.list_objects(category)? {
                println!("{:>12}  {}", object.size, file.name);
            }
        }
        _ => bail!("{}", USAGE),
    }
    Ok(())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_category(value: &str) -> anyhow::Result<RemoteFileCategory> {
    value.parse().map_err(anyhow::Error::msg)
}

fn remote_file(category: &str, name: &str) -> anyhow::Result<RemoteFile> {
    if name.is_empty() || name.contains('/') {
        bail!("invalid remote file name: {:?}", name);
    }
    Ok(RemoteFile::new(parse_category(category)?, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swiftsync_common::memory::MemoryStore;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_remote_file_parsing() {
        let file = remote_file("multichunk", "abc123").unwrap();
        assert_eq!(file.key(), "multichunks/abc123");
        assert!(remote_file("chunk", "abc123").is_err());
        assert!(remote_file("database", "a/b").is_err());
        assert!(remote_file("database", "").is_err());
    }

    #[test]
    fn test_run_commands() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::write(&src, b"payload").unwrap();
        let dest = dir.path().join("dest");

        let store = Arc::new(MemoryStore::without_container("repo"));
        let manager = TransferManager::new(store.clone());

        run(&manager, "init", &args(&["--create"])).unwrap();
        run(&manager, "upload", &args(&[src.to_str().unwrap(), "temp", "temp-1"])).unwrap();
        run(&manager, "move", &args(&["temp", "temp-1", "database", "db-A-1"])).unwrap();
        run(&manager, "download", &args(&["database", "db-A-1", dest.to_str().unwrap()])).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");

        run(&manager, "delete", &args(&["database", "db-A-1"])).unwrap();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_run_rejects_bad_arity() {
        let manager = TransferManager::new(Arc::new(MemoryStore::new("repo")));
        assert!(run(&manager, "upload", &args(&["only-one"])).is_err());
        assert!(run(&manager, "frobnicate", &[]).is_err());
    }
}
