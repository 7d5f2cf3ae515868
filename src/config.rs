//! Configuration for wtread.
//!
//! The configuration file is located at `~/.wtread/config.toml`:
//!
//! ```toml
//! # Narrow code page: 65001 (UTF-8) or 28591 (Latin-1)
//! codepage = 65001
//!
//! # Log level for ~/.wtread/wtread.log, overridden by RUST_LOG
//! log_level = "info"
//!
//! [history]
//! buffer_size = 50
//! buffer_count = 4
//! no_duplicates = false
//!
//! [editing]
//! insert_mode = true
//! word_delimiters = "\\/"
//! ```
//!
//! A missing or unreadable file yields the defaults.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::MAX_HISTORY_DEPTH;
use crate::input::CodePage;
use crate::read::EditSettings;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config path")]
    NoHome,

    #[error("Failed to access config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Narrow code page id
    pub codepage: Option<u32>,
    pub log_level: String,
    pub history: HistoryConfig,
    pub editing: EditingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            codepage: None,
            log_level: "info".to_string(),
            history: HistoryConfig::default(),
            editing: EditingConfig::default(),
        }
    }
}

/// Command history settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Commands kept per application
    pub buffer_size: usize,
    /// Rings shared by all applications
    pub buffer_count: usize,
    pub no_duplicates: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            buffer_size: 50,
            buffer_count: 4,
            no_duplicates: false,
        }
    }
}

/// Line editing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    pub insert_mode: bool,
    /// Characters besides space that end a word
    pub word_delimiters: String,
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            insert_mode: true,
            word_delimiters: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Using default config: {}", e);
                Self::default()
            }
        }
    }

    fn try_load() -> Result<Self, ConfigError> {
        let path = Self::get_config_path().ok_or(ConfigError::NoHome)?;
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::get_config_path().ok_or(ConfigError::NoHome)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Directory holding the config file and the log
    pub fn config_dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".wtread");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    fn get_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Configured code page, UTF-8 when unset or unknown
    pub fn code_page(&self) -> CodePage {
        self.codepage
            .and_then(CodePage::from_id)
            .unwrap_or_default()
    }

    /// History depth clamped to the supported range
    pub fn history_size(&self) -> usize {
        self.history.buffer_size.min(MAX_HISTORY_DEPTH)
    }

    pub fn edit_settings(&self) -> EditSettings {
        EditSettings {
            insert_mode: self.editing.insert_mode,
            history_no_duplicates: self.history.no_duplicates,
            word_delimiters: self
                .editing
                .word_delimiters
                .chars()
                .filter(|&c| c != ' ')
                .collect(),
        }
    }
}

/// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.history.buffer_size, 50);
        assert_eq!(config.history.buffer_count, 4);
        assert!(config.editing.insert_mode);
        assert_eq!(config.code_page(), CodePage::Utf8);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
codepage = 28591

[history]
no_duplicates = true

[editing]
word_delimiters = "\\/ "
"#,
        )
        .unwrap();
        assert_eq!(config.code_page(), CodePage::Latin1);
        assert_eq!(config.history.buffer_size, 50);
        assert_eq!(config.log_level, "info");

        let settings = config.edit_settings();
        assert!(settings.history_no_duplicates);
        assert_eq!(settings.word_delimiters, vec!['\\', '/']);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = Config::default();
        config.history.buffer_size = 100;
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_unknown_code_page_falls_back() {
        let config = Config {
            codepage: Some(932),
            ..Config::default()
        };
        assert_eq!(config.code_page(), CodePage::Utf8);
    }

    #[test]
    fn test_history_size_clamped() {
        let mut config = Config::default();
        config.history.buffer_size = 100_000;
        assert_eq!(config.history_size(), MAX_HISTORY_DEPTH);
    }
}
