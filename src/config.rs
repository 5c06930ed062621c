use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::adjustments::Adjustments;
use crate::filter::FilterType;
use crate::history::HistoryConfig;
use crate::operations::DEFAULT_OPERATION_LOG_CAPACITY;
use crate::reset::SmartResetPolicy;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PHOTOGRAPH_EDIT_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetFilter {
    pub filter_type: FilterType,
    #[serde(default = "full_intensity")]
    pub intensity: f32,
}

fn full_intensity() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A named filter plus user adjustments, applied as one undo step.
pub struct Preset {
    pub name: String,
    #[serde(default)]
    pub filter: Option<PresetFilter>,
    #[serde(default)]
    pub adjustments: Adjustments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Editing session settings.
pub struct SessionConfig {
    /// Longest edge of the preview the session renders into.
    pub preview_max_dimension: u32,
    pub history: HistoryConfig,
    pub smart_reset: SmartResetPolicy,
    pub operation_log_capacity: usize,
    /// Window within which rotation nudges merge into one undo step.
    pub coalesce_window_ms: u64,
    pub presets: Vec<Preset>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preview_max_dimension: 1920,
            history: HistoryConfig::default(),
            smart_reset: SmartResetPolicy::default(),
            operation_log_capacity: DEFAULT_OPERATION_LOG_CAPACITY,
            coalesce_window_ms: 2000,
            presets: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Returns the config file path: `$PHOTOGRAPH_EDIT_CONFIG` if set,
    /// otherwise `editing.toml` in the user config directory.
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|d| d.join("photograph").join("editing.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match Self::from_toml_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "Ignoring invalid config");
                Self::default()
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("failed to parse session config")
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::SessionConfig;
    use crate::adjustments::AdjustmentField;
    use crate::filter::FilterType;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.preview_max_dimension, 1920);
        assert_eq!(config.history.max_commands, 100);
        assert_eq!(config.coalesce_window(), Duration::from_secs(2));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
            operation_log_capacity = 10

            [history]
            max_commands = 5

            [smart_reset]
            significant_adjustment = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.operation_log_capacity, 10);
        assert_eq!(config.history.max_commands, 5);
        assert!(config.history.enabled);
        assert_eq!(config.smart_reset.significant_adjustment, 0.5);
        assert_eq!(config.smart_reset.significant_filter_intensity, 0.2);
    }

    #[test]
    fn presets_parse_and_lookup_ignores_case() {
        let config = SessionConfig::from_toml_str(
            r#"
            [[presets]]
            name = "Golden Hour"
            filter = { filter_type = "warm", intensity = 0.7 }
            adjustments = { warmth = 0.2, contrast = 0.1 }

            [[presets]]
            name = "Flat"
            "#,
        )
        .unwrap();
        let golden = config.preset("golden hour").unwrap();
        let filter = golden.filter.as_ref().unwrap();
        assert_eq!(filter.filter_type, FilterType::Warm);
        assert_eq!(filter.intensity, 0.7);
        assert_eq!(golden.adjustments.get(AdjustmentField::Warmth), 0.2);

        let flat = config.preset("Flat").unwrap();
        assert!(flat.filter.is_none());
        assert!(flat.adjustments.is_neutral());
        assert!(config.preset("missing").is_none());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(SessionConfig::from_toml_str("history = 3").is_err());
    }
}
