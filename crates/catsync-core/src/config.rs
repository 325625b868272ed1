//! Configuration types for catsync components.
//!
//! Values come from an optional TOML file (by default
//! `~/.config/catsync/config.toml`) and are then overridden by CLI flags.
//!
//! ```toml
//! [remote]
//! url = "https://catalog.example.com/root/"
//!
//! [sync]
//! resolver = "auto"
//! index_threshold = 25
//! fail_on_error = true
//!
//! [http]
//! timeout_secs = 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::SyncError;

/// How remote existence is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverStrategy {
    /// One GET per document.
    Probe,
    /// One listing per scope.
    Index,
    /// Listing for scopes with at least `index_threshold` documents, probes otherwise.
    #[default]
    Auto,
}

/// Reconciliation behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub resolver: ResolverStrategy,
    pub index_threshold: usize,
    /// Make the run fail when any single document failed.
    pub fail_on_error: bool,
    /// Skip the PUT when merging changes nothing.
    pub skip_unchanged: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverStrategy::Auto,
            index_threshold: 20,
            fail_on_error: false,
            skip_unchanged: false,
        }
    }
}

/// HTTP client configuration for the remote catalog service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("catsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Location of the remote catalog service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteConfig {
    pub url: Option<String>,
}

/// Location of the local resource store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub root: Option<PathBuf>,
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatsyncConfig {
    pub remote: RemoteConfig,
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub http: HttpConfig,
}

/// Returns `~/.config/catsync/config.toml`, if a config directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("catsync").join("config.toml"))
}

/// Loads the configuration at `path`.
///
/// A missing file yields the defaults; a present but malformed file is an error.
pub fn load_config(path: &Path) -> Result<CatsyncConfig, SyncError> {
    if !path.exists() {
        return Ok(CatsyncConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
    parse_config(&content)
        .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))
}

/// Parses a configuration document.
pub fn parse_config(content: &str) -> Result<CatsyncConfig, SyncError> {
    toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.resolver, ResolverStrategy::Auto);
        assert_eq!(config.index_threshold, 20);
        assert!(!config.fail_on_error);
        assert!(!config.skip_unchanged);
    }

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("catsync/"));
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [remote]
            url = "https://catalog.example.com/root/"

            [store]
            root = "/data/catalog"

            [sync]
            resolver = "index"
            fail_on_error = true

            [http]
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.remote.url.as_deref(), Some("https://catalog.example.com/root/"));
        assert_eq!(config.store.root, Some(PathBuf::from("/data/catalog")));
        assert_eq!(config.sync.resolver, ResolverStrategy::Index);
        assert!(config.sync.fail_on_error);
        assert_eq!(config.sync.index_threshold, 20);
        assert_eq!(config.http.timeout_secs, 5);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert!(config.remote.url.is_none());
        assert_eq!(config.sync.resolver, ResolverStrategy::Auto);
    }

    #[test]
    fn test_parse_rejects_unknown_strategy() {
        let err = parse_config("[sync]\nresolver = \"guess\"").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(config.store.root.is_none());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync\nresolver=").unwrap();
        assert!(matches!(load_config(&path), Err(SyncError::Config(_))));
    }
}
