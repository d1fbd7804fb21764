//! Configuration module for Graphs
//!
//! This module handles everything persisted outside of project files:
//! - User preferences (default figure settings, import and action defaults)
//! - Application state (recent projects)
//! - The style directory
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location, or in
//! `$GRAPHS_DATA_DIR` when that variable is set:
//! - **Linux**: `~/.local/share/io.github.graphs.core/`
//! - **macOS**: `~/Library/Application Support/io.github.graphs.core/`
//! - **Windows**: `%APPDATA%\io.github.graphs.core\`
//!
//! # Files
//!
//! - `preferences.toml` - User preferences
//! - `app_state.json` - Recent projects list
//! - `styles/*.mplstyle` - Custom figure styles
//! - `logs/` - Rolling log files written by the CLI
//!
//! # Example
//!
//! ```ignore
//! use graphs_core::config::{AppState, Preferences};
//!
//! let preferences = Preferences::load_or_default();
//! let mut state = AppState::load_or_default();
//! state.add_recent_project("analysis.graphs", "analysis");
//! state.save()?;
//! ```

pub mod preferences;

pub use preferences::*;

use crate::error::{GraphsError, Result};
use crate::style::StyleParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Directory name below the platform data directory
pub const APP_ID: &str = "io.github.graphs.core";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "GRAPHS_DATA_DIR";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Preferences filename
pub const PREFERENCES_FILE: &str = "preferences.toml";

/// Style directory name
pub const STYLES_DIR: &str = "styles";

/// Style file extension
pub const STYLE_FILE_EXTENSION: &str = "mplstyle";

/// Extension of saved projects
pub const PROJECT_FILE_EXTENSION: &str = "graphs";

/// Length of the recent projects list
pub const MAX_RECENT_PROJECTS: usize = 10;

// ==================== Data Directory ====================

/// Where preferences, app state and styles live
///
/// `$GRAPHS_DATA_DIR` takes precedence over the platform data directory.
pub fn app_data_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// [`app_data_dir`], created if missing
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir()
        .ok_or_else(|| GraphsError::Config("No data directory on this platform".to_string()))?;
    std::fs::create_dir_all(&dir)
        .map_err(|e| GraphsError::Config(format!("{}: {}", dir.display(), e)))?;
    Ok(dir)
}

pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

pub fn preferences_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(PREFERENCES_FILE))
}

/// Custom `.mplstyle` files
pub fn styles_dir() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(STYLES_DIR))
}

/// Style files in the style directory, sorted by name
pub fn list_styles() -> Result<Vec<PathBuf>> {
    let Some(dir) = styles_dir().filter(|d| d.exists()) else {
        return Ok(Vec::new());
    };
    let mut styles: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == STYLE_FILE_EXTENSION))
        .collect();
    styles.sort();
    Ok(styles)
}

/// Load a style from the style directory by name
pub fn load_style(name: &str) -> Result<StyleParams> {
    let dir = styles_dir().ok_or_else(|| {
        GraphsError::Config("Could not determine style directory".to_string())
    })?;
    let path = dir.join(format!("{}.{}", name, STYLE_FILE_EXTENSION));
    if !path.exists() {
        return Err(GraphsError::Config(format!("Style '{}' does not exist", name)));
    }
    StyleParams::load(&path)
}

// ==================== Recent Projects ====================

/// A project file the user opened or saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentProject {
    pub path: PathBuf,
    /// Display name, the file stem at the time it was recorded
    pub name: String,
    /// Seconds since the Unix epoch
    #[serde(default)]
    pub opened_at: u64,
}

impl RecentProject {
    fn now(path: PathBuf, name: &str) -> Self {
        let opened_at = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            path,
            name: name.to_string(),
            opened_at,
        }
    }
}

/// State remembered between sessions
///
/// Kept apart from [`Preferences`] since nothing in here is set by the user
/// directly. A missing or unreadable file simply means a fresh start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppState {
    /// Newest first, never longer than [`MAX_RECENT_PROJECTS`]
    pub recent_projects: Vec<RecentProject>,
    /// Directory last used by an import or export dialog
    pub last_directory: Option<PathBuf>,
}

impl AppState {
    pub fn load() -> Result<Self> {
        match app_state_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(_) => Ok(Self::default()),
            None => Err(GraphsError::Config(
                "No location available for the app state".to_string(),
            )),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| GraphsError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring stored app state");
            Self::default()
        })
    }

    pub fn save(&self) -> Result<()> {
        let path = ensure_app_data_dir()?.join(APP_STATE_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        tracing::debug!(path = %path.display(), "Saved app state");
        Ok(())
    }

    /// Move `path` to the front of the recent projects
    ///
    /// The containing directory becomes the last used directory as well.
    pub fn add_recent_project(&mut self, path: impl AsRef<Path>, name: &str) {
        let path = path.as_ref();
        self.recent_projects.retain(|entry| entry.path != path);
        self.recent_projects
            .insert(0, RecentProject::now(path.to_path_buf(), name));
        self.recent_projects.truncate(MAX_RECENT_PROJECTS);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.last_directory = Some(parent.to_path_buf());
        }
    }

    pub fn remove_recent_project(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.recent_projects.retain(|entry| entry.path != path);
    }

    /// Forget projects whose file is gone, returning how many were dropped
    pub fn cleanup_missing_projects(&mut self) -> usize {
        let before = self.recent_projects.len();
        self.recent_projects.retain(|entry| entry.path.exists());
        before - self.recent_projects.len()
    }

    /// Recent projects that can still be opened
    pub fn recent(&self) -> impl Iterator<Item = &RecentProject> {
        self.recent_projects.iter().filter(|entry| entry.path.exists())
    }

    /// The newest project that still exists on disk
    pub fn get_last_project(&self) -> Option<&Path> {
        self.recent().next().map(|entry| entry.path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_projects_are_newest_first_and_unique() {
        let mut state = AppState::default();
        state.add_recent_project("/data/xrd/quartz.graphs", "quartz");
        state.add_recent_project("/data/uv-vis/dye.graphs", "dye");
        state.add_recent_project("/data/xrd/quartz.graphs", "quartz");

        let names: Vec<&str> = state.recent_projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["quartz", "dye"]);
        assert_eq!(state.last_directory, Some(PathBuf::from("/data/xrd")));

        state.remove_recent_project("/data/uv-vis/dye.graphs");
        assert_eq!(state.recent_projects.len(), 1);
    }

    #[test]
    fn test_recent_projects_are_capped() {
        let mut state = AppState::default();
        for n in 0..MAX_RECENT_PROJECTS + 3 {
            state.add_recent_project(format!("scan{}.graphs", n), "scan");
        }
        assert_eq!(state.recent_projects.len(), MAX_RECENT_PROJECTS);
        assert_eq!(
            state.recent_projects[0].path,
            PathBuf::from(format!("scan{}.graphs", MAX_RECENT_PROJECTS + 2))
        );
        assert!(state.last_directory.is_none());
    }

    #[test]
    fn test_missing_projects_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.graphs");
        std::fs::write(&kept, "{}").unwrap();

        let mut state = AppState::default();
        state.add_recent_project(&kept, "kept");
        state.add_recent_project(dir.path().join("gone.graphs"), "gone");
        assert_eq!(state.get_last_project(), Some(kept.as_path()));
        assert_eq!(state.recent().count(), 1);

        assert_eq!(state.cleanup_missing_projects(), 1);
        assert_eq!(state.recent_projects.len(), 1);
    }

    #[test]
    fn test_app_state_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(APP_STATE_FILE);
        std::fs::write(
            &path,
            r#"{"recent-projects": [{"path": "/tmp/a.graphs", "name": "a"}]}"#,
        )
        .unwrap();

        let state = AppState::load_from(&path).unwrap();
        assert_eq!(state.recent_projects[0].opened_at, 0);
        assert!(state.last_directory.is_none());

        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(
            AppState::load_from(&path),
            Err(GraphsError::Config(_))
        ));
    }
}
