//! Persisted kill settings.
//!
//! Stores configuration in JSON format at `~/.reallystop/config.json`.
//! Keys mirror the names the IDE extension keeps in its own settings
//! collection, so a host can share one file with the CLI.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::{FilterConfiguration, PortRestriction, DEFAULT_PROCESS_NAMES};
use crate::error::{Error, Result};

/// Settings stored in JSON format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Process names to terminate.
    #[serde(default = "default_process_list")]
    pub custom_process_list: Vec<String>,

    /// Only terminate processes owned by the current user.
    #[serde(default)]
    pub user_process_match: bool,

    /// Only terminate descendants of the caller.
    #[serde(default)]
    pub child_process_match: bool,

    /// Only terminate processes owning a port in `port_list` (or none at all).
    #[serde(default)]
    pub port_process_match: bool,

    /// Allowed local TCP ports.
    #[serde(default)]
    pub port_list: Vec<String>,

    /// Delete `bin`/`obj` output directories after killing.
    #[serde(default)]
    pub force_clean: bool,
}

fn default_process_list() -> Vec<String> {
    DEFAULT_PROCESS_NAMES.iter().map(|s| s.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            custom_process_list: default_process_list(),
            user_process_match: false,
            child_process_match: false,
            port_process_match: false,
            port_list: Vec::new(),
            force_clean: false,
        }
    }
}

impl Settings {
    /// Build the engine filter these settings describe.
    ///
    /// Blank names are dropped. A list left empty this way selects nothing.
    pub fn to_filter(&self) -> FilterConfiguration {
        let names = self
            .custom_process_list
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        FilterConfiguration::with_names(names)
            .current_user_only(self.user_process_match)
            .descendants_only(self.child_process_match)
            .ports(PortRestriction {
                enabled: self.port_process_match,
                ports: self.port_list.iter().map(|p| p.trim().to_string()).collect(),
            })
    }
}

/// Configuration store for the persisted settings.
///
/// Handles reading and writing configuration to `~/.reallystop/config.json`.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.reallystop/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        let config_path = home.join(".reallystop").join("config.json");
        Ok(Self { config_path })
    }

    /// Create a config store with a custom path (for testing).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &std::path::Path {
        &self.config_path
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Load settings from disk.
    ///
    /// Returns default settings if the file doesn't exist.
    pub async fn load(&self) -> Result<Settings> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save settings to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        let config_dir = self.config_dir();
        fs::create_dir_all(&config_dir)
            .await
            .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;

        let content = serde_json::to_string_pretty(settings)?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        debug!(path = %self.config_path.display(), "Config saved");
        Ok(())
    }

    /// Filter built from the persisted settings.
    pub async fn load_filter(&self) -> Result<FilterConfiguration> {
        Ok(self.load().await?.to_filter())
    }

    /// Replace the process name list.
    pub async fn set_process_names(&self, names: &[String]) -> Result<()> {
        let mut settings = self.load().await?;
        settings.custom_process_list = names.to_vec();
        self.save(&settings).await
    }

    /// Replace the allowed port list.
    pub async fn set_port_list(&self, ports: &[String]) -> Result<()> {
        let mut settings = self.load().await?;
        settings.port_list = ports.to_vec();
        self.save(&settings).await
    }

    /// Update the restriction and cleanup flags. `None` leaves a flag as is.
    pub async fn set_flags(
        &self,
        user_process_match: Option<bool>,
        child_process_match: Option<bool>,
        port_process_match: Option<bool>,
        force_clean: Option<bool>,
    ) -> Result<Settings> {
        let mut settings = self.load().await?;
        if let Some(v) = user_process_match {
            settings.user_process_match = v;
        }
        if let Some(v) = child_process_match {
            settings.child_process_match = v;
        }
        if let Some(v) = port_process_match {
            settings.port_process_match = v;
        }
        if let Some(v) = force_clean {
            settings.force_clean = v;
        }
        self.save(&settings).await?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store() -> (ConfigStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        (ConfigStore::with_path(path), dir)
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _dir) = test_store();
        let settings = store.load().await.unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.custom_process_list, vec!["MSBuild".to_string()]);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _dir) = test_store();

        let settings = Settings {
            custom_process_list: vec!["MSBuild".into(), "VBCSCompiler".into()],
            user_process_match: true,
            child_process_match: false,
            port_process_match: true,
            port_list: vec!["5000".into()],
            force_clean: true,
        };
        store.save(&settings).await.unwrap();

        assert_eq!(store.load().await.unwrap(), settings);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_camel_case_keys_and_partial_file() {
        let (store, _dir) = test_store();
        std::fs::create_dir_all(store.config_dir()).unwrap();
        std::fs::write(store.path(), r#"{"userProcessMatch": true, "portList": ["80"]}"#).unwrap();

        let settings = store.load().await.unwrap();
        assert!(settings.user_process_match);
        assert_eq!(settings.port_list, vec!["80".to_string()]);
        assert_eq!(settings.custom_process_list, vec!["MSBuild".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_json_is_config_error() {
        let (store, _dir) = test_store();
        std::fs::create_dir_all(store.config_dir()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(store.load().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_set_flags_keeps_unspecified() {
        let (store, _dir) = test_store();
        store.set_flags(Some(true), Some(true), None, None).await.unwrap();
        let settings = store.set_flags(None, Some(false), None, Some(true)).await.unwrap();

        assert!(settings.user_process_match);
        assert!(!settings.child_process_match);
        assert!(!settings.port_process_match);
        assert!(settings.force_clean);
        assert_eq!(store.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_names_and_ports_persist() {
        let (store, _dir) = test_store();
        store.set_process_names(&["node".to_string()]).await.unwrap();
        store.set_port_list(&["3000".to_string(), "3001".to_string()]).await.unwrap();

        let filter = store.load_filter().await.unwrap();
        assert_eq!(filter.names, vec!["node".to_string()]);
        assert_eq!(filter.restrict_to_ports.ports.len(), 2);
        assert!(!filter.restrict_to_ports.enabled);
    }

    #[test]
    fn test_to_filter_drops_blank_names() {
        let settings = Settings {
            custom_process_list: vec!["  ".into(), "MSBuild".into(), String::new()],
            child_process_match: true,
            ..Settings::default()
        };
        let filter = settings.to_filter();
        assert_eq!(filter.names, vec!["MSBuild".to_string()]);
        assert!(filter.restrict_to_descendants);
        assert!(!filter.restrict_to_current_user);
    }

    #[test]
    fn test_load_with_block_on() {
        let (store, _dir) = test_store();
        let settings = tokio_test::block_on(store.load()).unwrap();
        assert!(!settings.force_clean);
    }
}
