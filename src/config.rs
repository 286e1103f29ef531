//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (SmartHub; SMART-TV; U; Linux/SmartTV; Maple2012) AppleWebKit/534.7 (KHTML, like Gecko) SmartTV Safari/534.7";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Write diagnostics to the temp-directory log file
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout")]
    pub epg_timeout_secs: u64,
    // Seek steps for keys 1/3, 4/6 and 7/9
    #[serde(default = "default_seek_short")]
    pub seek_short_secs: i64,
    #[serde(default = "default_seek_medium")]
    pub seek_medium_secs: i64,
    #[serde(default = "default_seek_long")]
    pub seek_long_secs: i64,
    /// Companion playlist plugin config directory; enables the bcumedia grammar
    #[serde(default)]
    pub companion_config_dir: Option<PathBuf>,
}

fn default_user_agent() -> String { DEFAULT_USER_AGENT.to_string() }
fn default_timeout() -> u64 { 5 }
fn default_seek_short() -> i64 { 15 }
fn default_seek_medium() -> i64 { 60 }
fn default_seek_long() -> i64 { 300 }

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            debug: false,
            user_agent: default_user_agent(),
            epg_timeout_secs: 5,
            seek_short_secs: 15,
            seek_medium_secs: 60,
            seek_long_secs: 300,
            companion_config_dir: None,
        }
    }
}

impl ArchiveConfig {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("iptv_archive");
        path.push("config.json");
        path
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt config"),
                }
            }
        }

        Self::default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArchiveConfig::load_from(&dir.path().join("none.json"));
        assert_eq!(config, ArchiveConfig::default());
        assert_eq!(config.epg_timeout_secs, 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ArchiveConfig {
            debug: true,
            seek_long_secs: 600,
            companion_config_dir: Some(PathBuf::from("/etc/enigma2/e2m3u2bouquet")),
            ..ArchiveConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(ArchiveConfig::load_from(&path), config);
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"debug": true}"#).unwrap();
        let config = ArchiveConfig::load_from(&path);
        assert!(config.debug);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.seek_medium_secs, 60);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(ArchiveConfig::load_from(&path), ArchiveConfig::default());
    }
}
