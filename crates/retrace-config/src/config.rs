/// Application configuration: load, save and sanitize.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Largest accepted coalescing window.
const MAX_COALESCE_WINDOW_MS: u64 = 10_000;

/// How a history clear treats entries outside the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// Discard only entries whose kind intersects the filter.
    #[default]
    Matching,
    /// Discard both stacks entirely, whatever the filter.
    Everything,
}

/// History engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Same-kind edits recorded within this many milliseconds of the first
    /// one replay as a single step.
    pub coalesce_window_ms: u64,
    pub clear_policy: ClearPolicy,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            coalesce_window_ms: 500,
            clear_policy: ClearPolicy::default(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub history: HistorySettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            history: HistorySettings::default(),
        }
    }
}

impl AppConfig {
    /// Returns the config file path.
    ///
    /// Resolution order:
    /// 1. `RETRACE_CONFIG` environment variable
    /// 2. `retrace/retrace.json` under the user's config directory
    /// 3. `retrace.json` in the working directory
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("RETRACE_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .map(|d| d.join("retrace").join("retrace.json"))
            .unwrap_or_else(|| PathBuf::from("retrace.json"))
    }

    /// Loads and sanitizes the config at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let mut config: AppConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        config.sanitize();
        Ok(config)
    }

    /// Loads config from `path`, creating a default file if it doesn't exist.
    /// Returns defaults on any error (unreadable file, parse error, etc.).
    pub fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("{e:#}"),
            }
            // Return defaults on error (don't overwrite broken file)
            Self::default()
        } else {
            let config = Self::default();
            if let Err(e) = config.save(path) {
                tracing::warn!("Failed to create default config at {}: {e:#}", path.display());
            }
            config
        }
    }

    /// Saves config to `path` as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config at {}", path.display()))
    }

    /// Clamps values to valid ranges and resets invalid fields.
    pub fn sanitize(&mut self) {
        let history = &mut self.history;
        history.coalesce_window_ms = history.coalesce_window_ms.min(MAX_COALESCE_WINDOW_MS);
        if self.log_filter.trim().is_empty() {
            self.log_filter = "info".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.history.coalesce_window_ms, 500);
        assert_eq!(config.history.clear_policy, ClearPolicy::Matching);
    }

    #[test]
    fn test_sanitize_clamps_window() {
        let mut config = AppConfig::default();
        config.history.coalesce_window_ms = 60_000;
        config.sanitize();
        assert_eq!(config.history.coalesce_window_ms, 10_000);

        config.history.coalesce_window_ms = 0;
        config.sanitize();
        assert_eq!(config.history.coalesce_window_ms, 0);
    }

    #[test]
    fn test_sanitize_resets_blank_log_filter() {
        let mut config = AppConfig::default();
        config.log_filter = "   ".to_string();
        config.sanitize();
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_clear_policy_serializes_snake_case() {
        let json = serde_json::to_string(&ClearPolicy::Everything).unwrap();
        assert_eq!(json, r#""everything""#);
        let parsed: ClearPolicy = serde_json::from_str(r#""matching""#).unwrap();
        assert_eq!(parsed, ClearPolicy::Matching);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let json = r#"{"history": {"clear_policy": "everything"}}"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.log_filter, "info");
        assert_eq!(parsed.history.coalesce_window_ms, 500);
        assert_eq!(parsed.history.clear_policy, ClearPolicy::Everything);
    }

    #[test]
    fn test_config_path_env_override() {
        let original = std::env::var("RETRACE_CONFIG").ok();
        std::env::set_var("RETRACE_CONFIG", "/custom/retrace.json");
        assert_eq!(AppConfig::config_path(), PathBuf::from("/custom/retrace.json"));
        match original {
            Some(val) => std::env::set_var("RETRACE_CONFIG", val),
            None => std::env::remove_var("RETRACE_CONFIG"),
        }
    }
}
