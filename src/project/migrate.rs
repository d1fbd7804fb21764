//! Forward migration of project dictionaries
//!
//! Every migrator works on the raw dictionary only. A dictionary without
//! `project-version` is version 1.

use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use super::records::applied_count;
use super::replay::{self, inconsistent, Direction};
use super::CURRENT_VERSION;
use crate::error::{GraphsError, Result};

const SCALE_PROPERTIES: [&str; 4] = ["bottom-scale", "top-scale", "left-scale", "right-scale"];

/// Stored format version of a project dictionary
pub fn project_version(dict: &Map<String, Value>) -> Result<u64> {
    match dict.get("project-version") {
        None => Ok(1),
        Some(value) => value.as_u64().ok_or_else(|| {
            GraphsError::ProjectParse("project-version is not an integer".to_string())
        }),
    }
}

/// Bring `dict` up to the current format version
pub fn migrate(mut dict: Map<String, Value>) -> Result<Map<String, Value>> {
    let version = project_version(&dict)?;
    if version > CURRENT_VERSION {
        return Err(GraphsError::ProjectIncompatible(version));
    }
    if version < 2 {
        info!("Migrating project from version {}", version);
        dict = migrate_v1_to_v2(dict)?;
    }
    Ok(dict)
}

fn hyphenate(key: &str) -> String {
    key.replace('_', "-")
}

/// v1 scale codes lack radians at index 2
fn shift_scale(value: &Value) -> Value {
    match value.as_u64() {
        Some(code) if code >= 2 => json!(code + 1),
        _ => value.clone(),
    }
}

fn migrate_figure_value(key: &str, value: &Value) -> Value {
    if SCALE_PROPERTIES.contains(&key) {
        shift_scale(value)
    } else {
        value.clone()
    }
}

fn migrate_figure_settings(settings: &Map<String, Value>) -> Map<String, Value> {
    settings
        .iter()
        .map(|(key, value)| {
            let key = hyphenate(key);
            let value = migrate_figure_value(&key, value);
            (key, value)
        })
        .collect()
}

fn item_uuid(item: &Value) -> Result<Uuid> {
    item.get("uuid")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| GraphsError::ProjectParse("version 1 item without a valid uuid".to_string()))
}

fn strip_uuid(item: &Value) -> Value {
    let mut item = item.clone();
    if let Some(dict) = item.as_object_mut() {
        dict.remove("uuid");
    }
    item
}

fn malformed() -> GraphsError {
    GraphsError::ProjectParse("malformed version 1 change record".to_string())
}

fn payload_index(value: &Value) -> Result<usize> {
    value.as_u64().map(|i| i as usize).ok_or_else(malformed)
}

/// Rewrite v1 change records to reference items by index
fn migrate_states(
    states: &[Value],
    position: isize,
    live: &[Uuid],
) -> Result<Vec<Value>> {
    let mut parsed: Vec<(Vec<Value>, Value)> = Vec::with_capacity(states.len());
    for state in states {
        let pair = state.as_array().filter(|a| a.len() == 2).ok_or_else(malformed)?;
        let batch = pair[0].as_array().ok_or_else(malformed)?.clone();
        parsed.push((batch, pair[1].clone()));
    }
    let lens: Vec<usize> = parsed.iter().map(|(batch, _)| batch.len()).collect();
    let applied = applied_count(lens.len(), position);

    replay::walk(&lens, applied, live, |s, r, list, direction| {
        let record = &mut parsed[s].0[r];
        let pair = record.as_array().filter(|a| a.len() == 2).ok_or_else(malformed)?;
        let kind = pair[0].as_u64().ok_or_else(malformed)?;
        let payload = &pair[1];
        let migrated = match kind {
            0 => {
                let f = payload.as_array().filter(|a| a.len() == 4).ok_or_else(malformed)?;
                let uuid = f[0]
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(malformed)?;
                json!([0, [replay::find(list, &uuid)?, f[1], f[2], f[3]]])
            }
            1 => {
                let uuid = item_uuid(payload)?;
                match direction {
                    Direction::Forward => list.push(uuid),
                    Direction::Backward => {
                        let index = replay::find(list, &uuid)?;
                        list.remove(index);
                    }
                }
                json!([1, strip_uuid(payload)])
            }
            2 => {
                let f = payload.as_array().filter(|a| a.len() == 2).ok_or_else(malformed)?;
                let index = payload_index(&f[0])?;
                let uuid = item_uuid(&f[1])?;
                match direction {
                    Direction::Forward => {
                        if replay::remove_at(list, index)? != uuid {
                            return Err(inconsistent(format!(
                                "removed item is not at index {}",
                                index
                            )));
                        }
                    }
                    Direction::Backward => replay::insert_at(list, index, uuid)?,
                }
                json!([2, [index, strip_uuid(&f[1])]])
            }
            3 => {
                let f = payload.as_array().filter(|a| a.len() == 2).ok_or_else(malformed)?;
                replay::swap(list, payload_index(&f[0])?, payload_index(&f[1])?)?;
                record.clone()
            }
            4 => {
                let f = payload.as_array().filter(|a| a.len() == 3).ok_or_else(malformed)?;
                let key = f[0].as_str().map(hyphenate).ok_or_else(malformed)?;
                let old = migrate_figure_value(&key, &f[1]);
                let new = migrate_figure_value(&key, &f[2]);
                json!([4, [key, old, new]])
            }
            other => {
                return Err(GraphsError::ProjectParse(format!(
                    "unknown change record kind {}",
                    other
                )))
            }
        };
        *record = migrated;
        Ok(())
    })?;

    Ok(parsed
        .into_iter()
        .map(|(batch, limits)| json!([batch, limits]))
        .collect())
}

fn integer(dict: &Map<String, Value>, key: &str) -> Result<Option<isize>> {
    match dict.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_i64()
            .map(|i| Some(i as isize))
            .ok_or_else(|| GraphsError::ProjectParse(format!("'{}' is not an integer", key))),
    }
}

/// Version 1 to 2
///
/// Top-level and figure setting keys become hyphen-case, scale codes
/// account for the radians scale, and items lose their uuids; change
/// records reference items by index instead.
pub fn migrate_v1_to_v2(dict: Map<String, Value>) -> Result<Map<String, Value>> {
    let data = dict
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| GraphsError::ProjectParse("missing 'data'".to_string()))?;
    let live = data.iter().map(item_uuid).collect::<Result<Vec<Uuid>>>()?;

    let mut migrated = Map::new();
    for (key, value) in &dict {
        let value = match key.as_str() {
            "data" => Value::Array(data.iter().map(strip_uuid).collect()),
            "figure_settings" => match value.as_object() {
                Some(settings) => Value::Object(migrate_figure_settings(settings)),
                None => {
                    return Err(GraphsError::ProjectParse(
                        "figure settings are not a dictionary".to_string(),
                    ))
                }
            },
            "history_states" => {
                let states = value.as_array().ok_or_else(malformed)?;
                let position = integer(&dict, "history_position")?.unwrap_or(-1);
                Value::Array(migrate_states(states, position, &live)?)
            }
            _ => value.clone(),
        };
        migrated.insert(hyphenate(key), value);
    }
    migrated.insert("project-version".into(), json!(2));
    Ok(migrated)
}
