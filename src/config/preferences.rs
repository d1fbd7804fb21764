//! User preferences persisted as TOML
//!
//! Preferences hold the defaults a new project starts from and the last
//! parameters used for import and data actions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use super::{ensure_app_data_dir, preferences_path, PREFERENCES_FILE};
use crate::error::{GraphsError, Result};
use crate::figure::LegendPosition;
use crate::scales::Scale;

/// Top-level preferences document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Preferences {
    pub figure: FigurePreferences,
    /// Parser options keyed by parser id
    pub import: BTreeMap<String, Map<String, Value>>,
    pub actions: ActionPreferences,
    pub history: HistoryPreferences,
}

/// Defaults for new figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigurePreferences {
    pub bottom_label: String,
    pub left_label: String,
    pub top_label: String,
    pub right_label: String,
    pub bottom_scale: Scale,
    pub left_scale: Scale,
    pub top_scale: Scale,
    pub right_scale: Scale,
    pub title: String,
    pub legend: bool,
    pub legend_position: LegendPosition,
    pub hide_unselected: bool,
    pub use_custom_style: bool,
    pub custom_style: String,
}

impl Default for FigurePreferences {
    fn default() -> Self {
        Self {
            bottom_label: "X Value".to_string(),
            left_label: "Y Value".to_string(),
            top_label: "X Value".to_string(),
            right_label: "Y Value".to_string(),
            bottom_scale: Scale::Linear,
            left_scale: Scale::Linear,
            top_scale: Scale::Linear,
            right_scale: Scale::Linear,
            title: String::new(),
            legend: true,
            legend_position: LegendPosition::Best,
            hide_unselected: false,
            use_custom_style: false,
            custom_style: "Adwaita".to_string(),
        }
    }
}

/// Last used parameters of data actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionPreferences {
    /// 0 for Savitzky-Golay, 1 for moving average
    pub smoothen_type: u8,
    /// Savitzky-Golay window as a percentage of the data length
    pub savgol_window: f64,
    pub savgol_polynomial: usize,
    pub moving_average_box: usize,
    /// 0 centers at the maximum, 1 at the middle of the x range
    pub center_mode: u8,
    /// Name of items created by combine
    pub combine_name: String,
    /// Whether transform replaces data outside the selection
    pub transform_discard: bool,
}

impl Default for ActionPreferences {
    fn default() -> Self {
        Self {
            smoothen_type: 0,
            savgol_window: 10.0,
            savgol_polynomial: 3,
            moving_average_box: 4,
            center_mode: 0,
            combine_name: "Combined Data".to_string(),
            transform_discard: false,
        }
    }
}

/// History limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryPreferences {
    pub max_states: usize,
}

impl Default for HistoryPreferences {
    fn default() -> Self {
        Self { max_states: 100 }
    }
}

impl Preferences {
    /// Load preferences from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GraphsError::Config(format!("Failed to read preferences: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| GraphsError::Config(format!("Failed to parse preferences: {}", e)))
    }

    /// Save preferences to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GraphsError::Config(format!("Failed to serialize preferences: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| GraphsError::Config(format!("Failed to write preferences: {}", e)))
    }

    /// Load preferences from the default location
    pub fn load() -> Result<Self> {
        let path = preferences_path().ok_or_else(|| {
            GraphsError::Config("Could not determine preferences path".to_string())
        })?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load preferences, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load preferences, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save preferences to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(&dir.join(PREFERENCES_FILE))
    }

    /// Stored options for a parser, empty if none were saved
    pub fn import_options(&self, parser_id: &str) -> Map<String, Value> {
        self.import.get(parser_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        assert_eq!(prefs.figure.bottom_label, "X Value");
        assert_eq!(prefs.history.max_states, 100);
        assert_eq!(prefs.actions.combine_name, "Combined Data");
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");

        let mut prefs = Preferences::default();
        prefs.figure.left_scale = Scale::Log;
        prefs.figure.legend_position = LegendPosition::UpperLeft;
        let mut columns = Map::new();
        columns.insert("separator".into(), json!(","));
        columns.insert("skip-rows".into(), json!(2));
        prefs.import.insert("columns".into(), columns);
        prefs.save_to(&path).unwrap();

        let loaded = Preferences::load_from(&path).unwrap();
        assert_eq!(loaded, prefs);
        assert_eq!(loaded.import_options("columns")["skip-rows"], json!(2));
        assert!(loaded.import_options("sqlite").is_empty());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let prefs: Preferences = toml::from_str("[figure]\ntitle = \"Run 3\"\n").unwrap();
        assert_eq!(prefs.figure.title, "Run 3");
        assert_eq!(prefs.figure.left_label, "Y Value");
        assert_eq!(prefs.history.max_states, 100);
    }
}
