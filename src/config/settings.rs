//! Relay settings - everything the operator can tune, as TOML
//!
//! Each section implements `Default` so a missing file, a missing section or
//! a missing key all fall back to built-in values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use super::defaults::DEFAULT_BASE_URL;
use crate::types::PayloadSchema;

/// Environment variable pointing at the settings file.
pub const CONFIG_ENV: &str = "KILLBOARD_CONFIG";

/// Environment variable overriding `[api] key`.
pub const API_KEY_ENV: &str = "KILLBOARD_API_KEY";

/// Settings file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "killboard.toml";

// ============================================================================
// Top-Level Settings
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub journal: JournalConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,

    #[serde(default)]
    pub historic: HistoricConfig,
}

impl Settings {
    /// Load from a specific TOML file path.
    ///
    /// Unknown keys are reported as warnings; semantic problems fail the load.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in super::validation::validate_unknown_keys(&contents) {
            warn!(path = %path.display(), "{}", w);
        }

        let settings: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Collect every semantic problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let url = self.server.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!(
                "server.base_url must start with http:// or https:// (got '{url}')"
            ));
        }

        if self.journal.directory.as_os_str().is_empty() {
            errors.push("journal.directory must not be empty".to_string());
        }

        for (i, name) in self.journal.allowed_commanders.iter().enumerate() {
            if name.trim().is_empty() {
                errors.push(format!("journal.allowed_commanders[{i}] is blank"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, contents).map_err(|e| ConfigError::Io(tmp.clone(), e))?;
        std::fs::rename(&tmp, path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Killboard base URL; endpoint paths are appended at dispatch time.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl ServerConfig {
    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Directory holding the game's `Journal.*.log` files.
    #[serde(default = "default_journal_dir")]
    pub directory: PathBuf,

    /// Only these commanders are submitted. Empty means everyone.
    #[serde(default)]
    pub allowed_commanders: Vec<String>,
}

/// The game's standard journal location under the user's home.
pub fn default_journal_dir() -> PathBuf {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map_or_else(
            || PathBuf::from("."),
            |home| {
                PathBuf::from(home)
                    .join("Saved Games")
                    .join("Frontier Developments")
                    .join("Elite Dangerous")
            },
        )
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            directory: default_journal_dir(),
            allowed_commanders: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer token for the killboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ApiConfig {
    /// Trimmed key; blank counts as unset.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Attach the star system of a kill to the submitted record.
    #[serde(default)]
    pub send_location: bool,

    #[serde(default)]
    pub schema: PayloadSchema,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricConfig {
    /// Scan the whole journal directory on the next start. Cleared
    /// automatically once a run completes, successful or not.
    #[serde(default)]
    pub run_on_next_startup: bool,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let settings: Settings = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(settings.server.base_url, DEFAULT_BASE_URL);
        assert!(settings.journal.allowed_commanders.is_empty());
        assert_eq!(settings.api.key(), None);
        assert!(!settings.submission.send_location);
        assert_eq!(settings.submission.schema, PayloadSchema::Current);
        assert!(!settings.historic.run_on_next_startup);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[journal]
directory = "/games/journals"
allowed_commanders = ["WDX", "Schitt Staynes"]

[api]
key = "  secret  "

[submission]
schema = "legacy"
"#;
        let settings: Settings = toml::from_str(toml_str).expect("partial TOML should parse");
        assert_eq!(settings.journal.directory, PathBuf::from("/games/journals"));
        assert_eq!(settings.journal.allowed_commanders.len(), 2);
        assert_eq!(settings.api.key(), Some("secret"));
        assert_eq!(settings.submission.schema, PayloadSchema::Legacy);
        assert_eq!(settings.server.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let settings: Settings = toml::from_str("[api]\nkey = \"   \"\n").expect("parse");
        assert_eq!(settings.api.key(), None);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut settings = Settings::default();
        settings.server.base_url = "ftp://example.com".into();
        settings.journal.allowed_commanders = vec!["ok".into(), "  ".into()];
        match settings.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().any(|e| e.contains("base_url")));
                assert!(errors.iter().any(|e| e.contains("allowed_commanders[1]")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_base_strips_trailing_slash() {
        let server = ServerConfig {
            base_url: "https://killboard.example/".into(),
        };
        assert_eq!(server.base(), "https://killboard.example");
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut original = Settings::default();
        original.api.key = Some("abc".into());
        original.historic.run_on_next_startup = true;
        let text = original.to_toml().expect("serialize");
        let back: Settings = toml::from_str(&text).expect("deserialize");
        assert_eq!(original, back);
    }

    #[test]
    fn test_save_and_load_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("killboard.toml");
        let mut settings = Settings::default();
        settings.submission.send_location = true;
        settings.save(&path).expect("save");
        let loaded = Settings::load_from_file(&path).expect("load");
        assert!(loaded.submission.send_location);
    }
}
