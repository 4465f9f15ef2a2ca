//! Relay Configuration
//!
//! Settings are loaded from a TOML file and held by a [`SettingsStore`]
//! that is constructed once in the binary and shared by reference.
//!
//! ## Loading Order
//!
//! 1. `KILLBOARD_CONFIG` environment variable (path to TOML file)
//! 2. `killboard.toml` in the current working directory
//! 3. Built-in defaults
//!
//! `KILLBOARD_API_KEY` overrides `[api] key` without ever being written back.

mod settings;
mod validation;
pub mod defaults;

pub use settings::*;
pub use validation::{suggest_correction, validate_unknown_keys, ValidationWarning};

use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::session::CommanderFilter;
use crate::types::PayloadSchema;

/// Shared, lock-free view of the current settings.
///
/// Readers take a snapshot per access, so the delivery worker always sees
/// the latest API key without blocking writers.
#[derive(Debug)]
pub struct SettingsStore {
    current: ArcSwap<Settings>,
    /// File the settings were read from; updates are persisted here.
    path: Option<PathBuf>,
    api_key_override: Option<String>,
}

impl SettingsStore {
    /// Load using the standard search order. Never fails: a broken file is
    /// reported and defaults are used instead.
    pub fn load() -> Self {
        let api_key_override = api_key_from_env();

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Settings::load_from_file(&p) {
                    Ok(settings) => {
                        info!(path = %p.display(), "Loaded settings from {}", CONFIG_ENV);
                        return Self::with_path(settings, Some(p), api_key_override);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load settings from {}, falling back", CONFIG_ENV);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Settings::load_from_file(&local) {
                Ok(settings) => {
                    info!("Loaded settings from ./{}", LOCAL_CONFIG_FILE);
                    return Self::with_path(settings, Some(local), api_key_override);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::with_path(Settings::default(), None, api_key_override)
    }

    /// Load from an explicit file; errors are returned, not swallowed.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let settings = Settings::load_from_file(path)?;
        Ok(Self::with_path(settings, Some(path.to_path_buf()), api_key_from_env()))
    }

    /// Settings that are never persisted.
    pub fn in_memory(settings: Settings) -> Self {
        Self::with_path(settings, None, None)
    }

    fn with_path(settings: Settings, path: Option<PathBuf>, api_key_override: Option<String>) -> Self {
        Self {
            current: ArcSwap::from_pointee(settings),
            path,
            api_key_override,
        }
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.current.load().journal.directory.clone()
    }

    pub fn allowed_commanders(&self) -> Vec<String> {
        self.current.load().journal.allowed_commanders.clone()
    }

    pub fn commander_filter(&self) -> CommanderFilter {
        CommanderFilter::new(self.allowed_commanders())
    }

    pub fn api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key_override {
            return Some(key.clone());
        }
        self.current.load().api.key().map(str::to_string)
    }

    pub fn send_location(&self) -> bool {
        self.current.load().submission.send_location
    }

    pub fn payload_schema(&self) -> PayloadSchema {
        self.current.load().submission.schema
    }

    pub fn base_url(&self) -> String {
        self.current.load().server.base().to_string()
    }

    pub fn run_historic_on_next_startup(&self) -> bool {
        self.current.load().historic.run_on_next_startup
    }

    /// Apply a change, validate it, publish it and persist it.
    ///
    /// On validation failure the previous settings stay active.
    pub fn update<F>(&self, change: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = Settings::clone(&self.current.load());
        change(&mut next);
        next.validate()?;

        if let Some(path) = &self.path {
            next.save(path)?;
            debug!(path = %path.display(), "Settings persisted");
        }
        self.current.store(Arc::new(next));
        Ok(())
    }

    /// Clear `historic.run_on_next_startup` once a historic run completed.
    pub fn disable_historic_run(&self) -> Result<(), ConfigError> {
        if !self.run_historic_on_next_startup() {
            return Ok(());
        }
        self.update(|s| s.historic.run_on_next_startup = false)?;
        info!("Historic run on next startup disabled");
        Ok(())
    }
}

fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
