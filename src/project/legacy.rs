//! Binary projects of the first format generation
//!
//! These were pickled dictionaries holding the item list, the figure
//! settings and two "clipboards": full snapshots of the item list and of
//! the axis limits after every change. They are turned into a version 1
//! JSON dictionary by diffing consecutive item snapshots into change
//! batches; the regular migration takes it from there.
//!
//! The history of a legacy project starts from an empty project, so a
//! non-empty first snapshot becomes a leading batch of additions.

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::error::{GraphsError, Result};
use crate::figure::{FigureSettings, LIMIT_NAMES};

/// Pickle protocol 2+ streams start with the PROTO opcode
pub fn looks_like_pickle(bytes: &[u8]) -> bool {
    bytes.first() == Some(&0x80)
}

fn parse_error(detail: impl Into<String>) -> GraphsError {
    GraphsError::ProjectParse(format!("legacy project: {}", detail.into()))
}

/// Numeric axis position from the legacy string form
fn position_code(value: &Value, second: &str) -> Value {
    match value.as_str() {
        Some(name) => json!(u8::from(name == second)),
        None => value.clone(),
    }
}

/// Map old class and attribute names onto the current ones
pub fn map_item(value: &Value) -> Result<Value> {
    let old = value
        .as_object()
        .ok_or_else(|| parse_error("item is not a dictionary"))?;
    let mut item = Map::new();
    for (key, value) in old {
        match key.as_str() {
            "type" => {
                let name = value.as_str().unwrap_or("DataItem");
                let name = if name == "Item" { "DataItem" } else { name };
                item.insert("type".into(), json!(name));
            }
            "plot_x_position" | "xposition" => {
                item.insert("xposition".into(), position_code(value, "top"));
            }
            "plot_y_position" | "yposition" => {
                item.insert("yposition".into(), position_code(value, "right"));
            }
            _ => {
                item.insert(key.clone(), value.clone());
            }
        }
    }
    item.entry("type").or_insert(json!("DataItem"));
    Ok(Value::Object(item))
}

fn map_items(value: &Value) -> Result<Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| parse_error("item list is not a list"))?
        .iter()
        .map(map_item)
        .collect()
}

fn uuids(items: &[Value]) -> Result<Vec<Uuid>> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|item| {
            let uuid = item
                .get("uuid")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| parse_error("item without a valid uuid"))?;
            if !seen.insert(uuid) {
                return Err(parse_error(format!("uuid {} appears twice", uuid)));
            }
            Ok(uuid)
        })
        .collect()
}

/// Version 1 change records turning `before` into `after`
///
/// Removals come first by descending index, then additions in order, then
/// the swaps reaching the target order, then property changes.
pub fn diff_snapshots(before: &[Value], after: &[Value]) -> Result<Vec<Value>> {
    let before_ids = uuids(before)?;
    let after_ids = uuids(after)?;
    let mut working = before_ids.clone();
    let mut batch = Vec::new();

    for (index, item) in before.iter().enumerate().rev() {
        if !after_ids.contains(&before_ids[index]) {
            batch.push(json!([2, [index, item]]));
            working.remove(index);
        }
    }
    for (item, uuid) in after.iter().zip(&after_ids) {
        if !before_ids.contains(uuid) {
            batch.push(json!([1, item]));
            working.push(*uuid);
        }
    }
    for (target, uuid) in after_ids.iter().enumerate() {
        let current = working
            .iter()
            .position(|id| id == uuid)
            .ok_or_else(|| parse_error("snapshot order cannot be reached"))?;
        if current != target {
            working.swap(target, current);
            batch.push(json!([3, [target, current]]));
        }
    }
    for (item, uuid) in after.iter().zip(&after_ids) {
        let Some(index) = before_ids.iter().position(|id| id == uuid) else {
            continue;
        };
        let (Some(old), Some(new)) = (before[index].as_object(), item.as_object()) else {
            continue;
        };
        for (key, value) in new {
            if key == "uuid" || key == "type" {
                continue;
            }
            let previous = old.get(key).cloned().unwrap_or(Value::Null);
            if &previous != value {
                batch.push(json!([0, [uuid.to_string(), key, previous, value]]));
            }
        }
    }
    Ok(batch)
}

fn limits_from_settings(settings: &Map<String, Value>) -> Value {
    let defaults = FigureSettings::default().limits();
    let limits: Vec<f64> = LIMIT_NAMES
        .iter()
        .zip(defaults)
        .map(|(name, default)| {
            settings
                .get(&name.replace('-', "_"))
                .and_then(Value::as_f64)
                .unwrap_or(default)
        })
        .collect();
    json!(limits)
}

fn negative_position(dict: &Map<String, Value>, key: &str, len: usize) -> Result<usize> {
    let position = dict.get(key).and_then(Value::as_i64).unwrap_or(-1);
    let index = len as i64 + position;
    if position > -1 || index < 0 {
        return Err(parse_error(format!("{} {} is outside of {} states", key, position, len)));
    }
    Ok(index as usize)
}

/// Convert an unpickled legacy dictionary into a version 1 JSON dictionary
pub fn legacy_to_v1(legacy: &Map<String, Value>) -> Result<Map<String, Value>> {
    let data = map_items(
        legacy
            .get("data")
            .ok_or_else(|| parse_error("missing 'data'"))?,
    )?;
    let figure_settings = legacy
        .get("figure_settings")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let limits = limits_from_settings(&figure_settings);

    let snapshots = match legacy.get("datadict_clipboard") {
        Some(clipboard) => clipboard
            .as_array()
            .ok_or_else(|| parse_error("clipboard is not a list"))?
            .iter()
            .map(map_items)
            .collect::<Result<Vec<_>>>()?,
        None => vec![data.clone()],
    };
    if snapshots.is_empty() {
        return Err(parse_error("empty clipboard"));
    }
    let current = negative_position(legacy, "clipboard_pos", snapshots.len())?;

    let mut states = vec![json!([[], limits])];
    let mut position_state = 0;
    let mut previous: Vec<Value> = Vec::new();
    for (index, snapshot) in snapshots.iter().enumerate() {
        let batch = diff_snapshots(&previous, snapshot)?;
        if !batch.is_empty() {
            states.push(json!([batch, limits]));
        }
        if index == current {
            position_state = states.len() - 1;
        }
        previous = snapshot.clone();
    }
    let history_position = position_state as i64 - states.len() as i64;

    let (view_states, view_position) = match legacy.get("view_clipboard").and_then(Value::as_array) {
        Some(views) if !views.is_empty() => {
            let index = negative_position(legacy, "view_clipboard_pos", views.len())?;
            (views.clone(), index as i64 - views.len() as i64)
        }
        _ => (vec![limits.clone()], -1),
    };

    info!(
        "Converted legacy project with {} snapshots into {} history states",
        snapshots.len(),
        states.len()
    );
    let mut dict = Map::new();
    dict.insert(
        "version".into(),
        legacy.get("version").cloned().unwrap_or(json!("1.0")),
    );
    dict.insert("data".into(), Value::Array(data));
    dict.insert("figure_settings".into(), Value::Object(figure_settings));
    dict.insert("history_states".into(), Value::Array(states));
    dict.insert("history_position".into(), json!(history_position));
    dict.insert("view_history_states".into(), Value::Array(view_states));
    dict.insert("view_history_position".into(), json!(view_position));
    Ok(dict)
}

/// Unpickle a legacy project into a version 1 JSON dictionary
pub fn read_legacy(bytes: &[u8]) -> Result<Map<String, Value>> {
    let options = serde_pickle::DeOptions::new().replace_unresolved_globals();
    let value: Value = serde_pickle::from_slice(bytes, options)
        .map_err(|e| parse_error(format!("cannot unpickle: {}", e)))?;
    let legacy = value
        .as_object()
        .ok_or_else(|| parse_error("not a dictionary"))?;
    legacy_to_v1(legacy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: u128, name: &str) -> Value {
        json!({"type": "Item", "uuid": Uuid::from_u128(n).to_string(), "name": name,
               "xdata": [0.0, 1.0], "ydata": [0.0, 1.0], "plot_x_position": "top"})
    }

    #[test]
    fn test_map_item_renames() {
        let mapped = map_item(&item(1, "a")).unwrap();
        assert_eq!(mapped["type"], json!("DataItem"));
        assert_eq!(mapped["xposition"], json!(1));
        assert!(mapped.get("plot_x_position").is_none());
    }

    #[test]
    fn test_diff_snapshots() {
        let a = map_item(&item(1, "a")).unwrap();
        let b = map_item(&item(2, "b")).unwrap();
        let mut renamed = b.clone();
        renamed["name"] = json!("c");

        let batch = diff_snapshots(&[a.clone(), b.clone()], &[renamed.clone()]).unwrap();
        assert_eq!(batch[0][0], json!(2));
        assert_eq!(batch[0][1][0], json!(0));
        assert_eq!(batch[1][0], json!(0));
        assert_eq!(batch[1][1][1], json!("name"));

        let swapped = diff_snapshots(&[a.clone(), b.clone()], &[b.clone(), a.clone()]).unwrap();
        assert_eq!(swapped, vec![json!([3, [0, 1]])]);
        assert!(diff_snapshots(&[a.clone()], &[a]).unwrap().is_empty());
    }

    #[test]
    fn test_identical_snapshots_produce_no_state() {
        let a = item(1, "a");
        let legacy = json!({
            "data": [a],
            "datadict_clipboard": [[a], [a]],
            "clipboard_pos": -1
        });
        let v1 = legacy_to_v1(legacy.as_object().unwrap()).unwrap();
        assert_eq!(v1["history_states"].as_array().unwrap().len(), 2);
        assert_eq!(v1["history_position"], json!(-1));
    }

    #[test]
    fn test_duplicate_uuid_is_ambiguous() {
        let a = item(1, "a");
        assert!(diff_snapshots(&[], &[a.clone(), a]).is_err());
    }

    #[test]
    fn test_read_pickle() {
        let legacy = json!({
            "version": "1.2",
            "data": [item(1, "a")],
            "datadict_clipboard": [[item(1, "a")]],
            "clipboard_pos": -1
        });
        let bytes = serde_pickle::to_vec(&legacy, serde_pickle::SerOptions::new()).unwrap();
        assert!(looks_like_pickle(&bytes));
        let v1 = read_legacy(&bytes).unwrap();
        assert_eq!(v1["version"], json!("1.2"));
        assert_eq!(v1["history_states"].as_array().unwrap().len(), 2);
    }
}
