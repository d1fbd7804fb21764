//! Project files
//!
//! A project is stored as a JSON dictionary:
//!
//! | key | content |
//! |---|---|
//! | `project-version` | format version, currently 2 |
//! | `version` | version of the writing application |
//! | `data` | item dictionaries |
//! | `figure-settings` | hyphen-case figure properties |
//! | `history-states` | `[batch, limits]` pairs |
//! | `history-position` | negative index into `history-states` |
//! | `view-history-states` | limits eight-tuples |
//! | `view-history-position` | negative index into `view-history-states` |
//!
//! Other top-level keys are carried through unchanged. Older dictionaries
//! are migrated on load; files that are not JSON are tried as legacy
//! pickled projects.

pub mod legacy;
pub mod migrate;
pub mod records;
pub mod replay;

use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{GraphsError, Result, ResultExt};
use crate::figure::{FigureSettings, Limits};
use crate::history::{HistoryEngine, ViewHistory};
use crate::item::Item;
use crate::model::ProjectModel;

/// Project format version written by this crate
pub const CURRENT_VERSION: u64 = 2;

/// Top-level keys interpreted by [`Project::from_dict`]
pub const KNOWN_KEYS: [&str; 8] = [
    "project-version",
    "version",
    "data",
    "figure-settings",
    "history-states",
    "history-position",
    "view-history-states",
    "view-history-position",
];

/// Everything read from a project file
#[derive(Debug, Clone)]
pub struct Project {
    pub model: ProjectModel,
    pub history: HistoryEngine,
    pub view_history: ViewHistory,
    /// Top-level keys without meaning to this version
    pub extra: Map<String, Value>,
}

fn position(dict: &Map<String, Value>, key: &str) -> Result<isize> {
    match dict.get(key) {
        None => Ok(-1),
        Some(value) => value
            .as_i64()
            .map(|p| p as isize)
            .ok_or_else(|| GraphsError::ProjectParse(format!("'{}' is not an integer", key))),
    }
}

fn items_from_value(value: &Value) -> Result<Vec<Item>> {
    let array = value
        .as_array()
        .ok_or_else(|| GraphsError::ProjectParse("'data' is not a list".to_string()))?;
    array
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let dict = entry.as_object().ok_or_else(|| {
                GraphsError::ProjectParse(format!("item {} is not a dictionary", index))
            })?;
            Item::from_dict(dict).map_err(|e| match e {
                GraphsError::ProjectParse(_) => e,
                other => GraphsError::ProjectParse(format!("item {}: {}", index, other)),
            })
        })
        .collect()
}

impl Project {
    /// A project around `model` with fresh history
    pub fn new(model: ProjectModel, max_states: usize) -> Self {
        let history = HistoryEngine::new(&model, max_states);
        let view_history = ViewHistory::new(model.figure.limits(), max_states);
        Self {
            model,
            history,
            view_history,
            extra: Map::new(),
        }
    }

    /// Build a project from a dictionary of any supported version
    pub fn from_dict(dict: Map<String, Value>, max_states: usize) -> Result<Self> {
        let dict = migrate::migrate(dict)?;

        let items = items_from_value(
            dict.get("data")
                .ok_or_else(|| GraphsError::ProjectParse("missing 'data'".to_string()))?,
        )?;
        let figure = match dict.get("figure-settings") {
            Some(Value::Object(settings)) => FigureSettings::from_dict(settings)?,
            Some(_) => {
                return Err(GraphsError::ProjectParse(
                    "'figure-settings' is not a dictionary".to_string(),
                ))
            }
            None => return Err(GraphsError::ProjectParse("missing 'figure-settings'".to_string())),
        };
        let model = ProjectModel { items, figure };
        let live: Vec<Uuid> = model.items.iter().map(|item| item.uuid).collect();

        let history = match dict.get("history-states").and_then(Value::as_array) {
            Some(raw) if !raw.is_empty() => {
                let position = position(&dict, "history-position")?;
                let states = records::decode_states(raw, position, &live)?;
                HistoryEngine::from_parts(states, position, &model, max_states)?
            }
            _ => HistoryEngine::new(&model, max_states),
        };
        let view_history = match dict.get("view-history-states").and_then(Value::as_array) {
            Some(raw) if !raw.is_empty() => {
                let states = raw
                    .iter()
                    .map(records::limits_from_value)
                    .collect::<Result<Vec<Limits>>>()?;
                let position = position(&dict, "view-history-position")?;
                ViewHistory::from_parts(states, position, max_states)?
            }
            _ => ViewHistory::new(model.figure.limits(), max_states),
        };

        let extra = dict
            .into_iter()
            .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
            .collect();
        debug!(
            "Read project with {} items and {} history states",
            model.items.len(),
            history.states().len()
        );
        Ok(Self {
            model,
            history,
            view_history,
            extra,
        })
    }

    pub fn to_dict(&self) -> Result<Map<String, Value>> {
        to_dict(&self.model, &self.history, &self.view_history, &self.extra)
    }
}

/// Current-version dictionary of a project
pub fn to_dict(
    model: &ProjectModel,
    history: &HistoryEngine,
    view_history: &ViewHistory,
    extra: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let live: Vec<Uuid> = model.items.iter().map(|item| item.uuid).collect();
    let mut dict = extra.clone();
    dict.insert("project-version".into(), json!(CURRENT_VERSION));
    dict.insert("version".into(), json!(env!("CARGO_PKG_VERSION")));
    dict.insert(
        "data".into(),
        Value::Array(
            model
                .items
                .iter()
                .map(|item| Value::Object(item.to_dict()))
                .collect(),
        ),
    );
    dict.insert(
        "figure-settings".into(),
        Value::Object(model.figure.to_dict()),
    );
    dict.insert(
        "history-states".into(),
        Value::Array(records::encode_states(history, &live)?),
    );
    dict.insert("history-position".into(), json!(history.position()));
    dict.insert(
        "view-history-states".into(),
        Value::Array(
            view_history
                .states()
                .iter()
                .map(records::limits_to_value)
                .collect(),
        ),
    );
    dict.insert(
        "view-history-position".into(),
        json!(view_history.position()),
    );
    Ok(dict)
}

/// Read the raw dictionary of a project file
///
/// Content that does not decode as JSON is tried as a legacy pickle.
pub fn read_dict(path: &Path) -> Result<Map<String, Value>> {
    let bytes = fs::read(path).with_context(|| format!("Reading {}", path.display()))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(dict)) => Ok(dict),
        Ok(_) => Err(GraphsError::ProjectParse(
            "the file does not contain a dictionary".to_string(),
        )),
        Err(e) if (e.is_syntax() || e.is_eof()) && legacy::looks_like_pickle(&bytes) => {
            info!("{} is not JSON, reading it as a legacy project", path.display());
            legacy::read_legacy(&bytes)
        }
        Err(e) => Err(GraphsError::ProjectParse(format!("not a project file: {}", e))),
    }
}

pub fn write_dict(path: &Path, dict: &Map<String, Value>) -> Result<()> {
    let content = serde_json::to_string(dict)?;
    fs::write(path, content).with_context(|| format!("Writing {}", path.display()))?;
    Ok(())
}

/// Read and migrate a project file
pub fn load(path: &Path, max_states: usize) -> Result<Project> {
    info!("Loading project {}", path.display());
    Project::from_dict(read_dict(path)?, max_states)
}

/// Write a project file in the current format
pub fn save(
    path: &Path,
    model: &ProjectModel,
    history: &HistoryEngine,
    view_history: &ViewHistory,
    extra: &Map<String, Value>,
) -> Result<()> {
    info!("Saving project {}", path.display());
    write_dict(path, &to_dict(model, history, view_history, extra)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MAX_HISTORY_STATES;
    use crate::style::StyleParams;

    fn sample() -> Project {
        let mut model = ProjectModel::default();
        let mut history = HistoryEngine::new(&model, MAX_HISTORY_STATES);
        let item = Item::data("a", vec![0.0, 1.0], vec![2.0, 3.0], &StyleParams::default());
        history.record_item_added(&item);
        model.items.push(item);
        history.add_history_state(&model, None);
        let view_history = ViewHistory::new(model.figure.limits(), MAX_HISTORY_STATES);
        Project {
            model,
            history,
            view_history,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_dict_roundtrip() {
        let mut project = sample();
        project.extra.insert("plugin-data".into(), json!({"a": 1}));
        let dict = project.to_dict().unwrap();
        assert_eq!(dict["project-version"], json!(2));
        assert_eq!(dict["history-position"], json!(-1));

        let loaded = Project::from_dict(dict.clone(), MAX_HISTORY_STATES).unwrap();
        assert_eq!(loaded.extra["plugin-data"], json!({"a": 1}));
        assert_eq!(loaded.to_dict().unwrap(), dict);
    }

    #[test]
    fn test_missing_keys() {
        let mut dict = sample().to_dict().unwrap();
        dict.remove("figure-settings");
        assert!(matches!(
            Project::from_dict(dict, MAX_HISTORY_STATES),
            Err(GraphsError::ProjectParse(_))
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.graphs");
        let project = sample();
        save(
            &path,
            &project.model,
            &project.history,
            &project.view_history,
            &project.extra,
        )
        .unwrap();
        let loaded = load(&path, MAX_HISTORY_STATES).unwrap();
        assert_eq!(loaded.model.items[0].name, "a");
        assert!(loaded.history.can_undo());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.graphs");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(read_dict(&path), Err(GraphsError::ProjectParse(_))));
    }
}
