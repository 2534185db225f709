use serde::Deserialize;
use std::path::Path;

/// Environment variable consulted when the config file carries no password.
pub const PASSWORD_ENV: &str = "SWIFTSYNC_PASSWORD";

const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Swift TempAuth / v1 (`X-Auth-User` + `X-Auth-Key`).
    TempAuth,
    /// Keystone v2 password credentials scoped to a tenant.
    Keystone,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwiftConfig {
    pub auth_url: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub preferred_region: Option<String>,
    pub container: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_verify_writes")]
    pub verify_writes: bool,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_verify_writes() -> bool {
    true
}

impl SwiftConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let mut config: SwiftConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        if non_empty(&config.password).is_none() {
            config.password = std::env::var(PASSWORD_ENV).ok();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.auth_url.is_empty() {
            anyhow::bail!("auth_url must not be empty");
        }
        if !self.auth_url.starts_with("http://") && !self.auth_url.starts_with("https://") {
            anyhow::bail!("auth_url must be an http(s) URL: {}", self.auth_url);
        }
        if self.username.is_empty() {
            anyhow::bail!("username must not be empty");
        }
        if self.password().is_none() {
            anyhow::bail!("password must be set in the config file or {}", PASSWORD_ENV);
        }
        if self.container.is_empty() {
            anyhow::bail!("container must not be empty");
        }
        if self.container.contains('/') {
            anyhow::bail!("container must not contain '/': {}", self.container);
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn password(&self) -> Option<&str> {
        non_empty(&self.password)
    }

    pub fn tenant_name(&self) -> Option<&str> {
        non_empty(&self.tenant_name)
    }

    pub fn tenant_id(&self) -> Option<&str> {
        non_empty(&self.tenant_id)
    }

    pub fn preferred_region(&self) -> Option<&str> {
        non_empty(&self.preferred_region)
    }

    /// Keystone is used as soon as any tenant selector is given.
    pub fn auth_method(&self) -> AuthMethod {
        if self.tenant_name().is_some() || self.tenant_id().is_some() {
            AuthMethod::Keystone
        } else {
            AuthMethod::TempAuth
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let toml_str = r#"
auth_url = "https://keystone.example.com/v2.0"
username = "demo"
password = "secret"
tenant_name = "demo-project"
preferred_region = "RegionOne"
container = "backups"
"#;
        let config: SwiftConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.auth_method(), AuthMethod::Keystone);
        assert_eq!(config.preferred_region(), Some("RegionOne"));
        assert_eq!(config.timeout_secs, 300);
        assert!(config.verify_writes);
    }

    #[test]
    fn test_empty_tenant_selects_tempauth() {
        let toml_str = r#"
auth_url = "http://swift.local:8080/auth/v1.0"
username = "test:tester"
password = "testing"
tenant_name = ""
tenant_id = ""
preferred_region = ""
container = "backups"
verify_writes = false
"#;
        let config: SwiftConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.auth_method(), AuthMethod::TempAuth);
        assert!(config.preferred_region().is_none());
        assert!(!config.verify_writes);
    }

    #[test]
    fn test_tenant_id_alone_selects_keystone() {
        let toml_str = r#"
auth_url = "https://keystone.example.com/v2.0"
username = "demo"
password = "secret"
tenant_id = "4a5e1c"
container = "backups"
"#;
        let config: SwiftConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.auth_method(), AuthMethod::Keystone);
    }

    #[test]
    fn test_missing_container_rejected() {
        let toml_str = r#"
auth_url = "https://keystone.example.com/v2.0"
username = "demo"
password = "secret"
container = ""
"#;
        let config: SwiftConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_auth_url_rejected() {
        let toml_str = r#"
auth_url = "keystone.example.com"
username = "demo"
password = "secret"
container = "backups"
"#;
        let config: SwiftConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_password_rejected() {
        let toml_str = r#"
auth_url = "https://keystone.example.com/v2.0"
username = "demo"
container = "backups"
"#;
        let config: SwiftConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swiftsync.toml");
        std::fs::write(
            &path,
            r#"
auth_url = "http://swift.local:8080/auth/v1.0"
username = "test:tester"
password = "testing"
container = "repo"
timeout_secs = 30
"#,
        )
        .unwrap();
        let config = SwiftConfig::load(&path).unwrap();
        assert_eq!(config.container, "repo");
        assert_eq!(config.timeout_secs, 30);
    }
}
