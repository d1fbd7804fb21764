//! Change records and history states as project file values

use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::replay::{self, inconsistent, Direction};
use crate::error::{GraphsError, Result};
use crate::figure::Limits;
use crate::history::{ChangeRecord, HistoryEngine, HistoryState};
use crate::item::Item;

fn malformed(what: &str) -> GraphsError {
    GraphsError::ProjectParse(format!("malformed {}", what))
}

pub fn limits_to_value(limits: &Limits) -> Value {
    json!(limits.to_vec())
}

pub fn limits_from_value(value: &Value) -> Result<Limits> {
    let array = value.as_array().ok_or_else(|| malformed("limits"))?;
    if array.len() != 8 {
        return Err(malformed("limits"));
    }
    let mut limits = [0.0; 8];
    for (slot, v) in limits.iter_mut().zip(array) {
        *slot = v.as_f64().ok_or_else(|| malformed("limits"))?;
    }
    Ok(limits)
}

/// Number of states, counted from the first, whose batches are applied
pub fn applied_count(len: usize, position: isize) -> usize {
    (len as isize + position + 1).max(0) as usize
}

/// Serialize the history states, resolving item uuids to indices
pub fn encode_states(history: &HistoryEngine, live: &[Uuid]) -> Result<Vec<Value>> {
    let states = history.states();
    let lens: Vec<usize> = states.iter().map(|s| s.batch.len()).collect();
    let mut encoded: Vec<Vec<Value>> = lens.iter().map(|&n| vec![Value::Null; n]).collect();
    let applied = applied_count(states.len(), history.position());

    replay::walk(&lens, applied, live, |s, r, list, direction| {
        encoded[s][r] = match &states[s].batch[r] {
            ChangeRecord::ItemPropertyChanged {
                uuid,
                property,
                old,
                new,
            } => json!([0, [replay::find(list, uuid)?, property, old, new]]),
            ChangeRecord::ItemAdded(item) => {
                match direction {
                    Direction::Forward => list.push(item.uuid),
                    Direction::Backward => {
                        if list.last() != Some(&item.uuid) {
                            return Err(inconsistent(format!(
                                "added item '{}' is not last",
                                item.name
                            )));
                        }
                        list.pop();
                    }
                }
                json!([1, item.to_dict()])
            }
            ChangeRecord::ItemRemoved { index, item } => {
                match direction {
                    Direction::Forward => {
                        if replay::at(list, *index)? != item.uuid {
                            return Err(inconsistent(format!(
                                "removed item '{}' is not at index {}",
                                item.name, index
                            )));
                        }
                        list.remove(*index);
                    }
                    Direction::Backward => replay::insert_at(list, *index, item.uuid)?,
                }
                json!([2, [index, item.to_dict()]])
            }
            ChangeRecord::ItemsSwapped { source, target } => {
                replay::swap(list, *source, *target)?;
                json!([3, [source, target]])
            }
            ChangeRecord::FigureSettingsChanged { property, old, new } => {
                json!([4, [property, old, new]])
            }
        };
        Ok(())
    })?;

    Ok(states
        .iter()
        .zip(encoded)
        .map(|(state, batch)| json!([batch, limits_to_value(&state.limits)]))
        .collect())
}

fn item_dict(value: &Value) -> Result<Item> {
    let dict: &Map<String, Value> = value.as_object().ok_or_else(|| malformed("item snapshot"))?;
    Item::from_dict(dict)
}

fn index(value: &Value) -> Result<usize> {
    value
        .as_u64()
        .map(|i| i as usize)
        .ok_or_else(|| malformed("item index"))
}

fn string(value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| malformed("property name"))
}

fn fields(payload: &Value, n: usize) -> Result<&Vec<Value>> {
    payload
        .as_array()
        .filter(|a| a.len() == n)
        .ok_or_else(|| malformed("change record payload"))
}

/// Parse one `[kind, payload]` record; kind 0 gets a placeholder uuid and
/// its index is returned separately
fn decode_record(value: &Value) -> Result<(ChangeRecord, Option<usize>)> {
    let pair = value
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| malformed("change record"))?;
    let kind = pair[0].as_u64().ok_or_else(|| malformed("change record kind"))?;
    let payload = &pair[1];
    Ok(match kind {
        0 => {
            let f = fields(payload, 4)?;
            let record = ChangeRecord::ItemPropertyChanged {
                uuid: Uuid::nil(),
                property: string(&f[1])?,
                old: f[2].clone(),
                new: f[3].clone(),
            };
            (record, Some(index(&f[0])?))
        }
        1 => (ChangeRecord::ItemAdded(item_dict(payload)?), None),
        2 => {
            let f = fields(payload, 2)?;
            let record = ChangeRecord::ItemRemoved {
                index: index(&f[0])?,
                item: item_dict(&f[1])?,
            };
            (record, None)
        }
        3 => {
            let f = fields(payload, 2)?;
            let record = ChangeRecord::ItemsSwapped {
                source: index(&f[0])?,
                target: index(&f[1])?,
            };
            (record, None)
        }
        4 => {
            let f = fields(payload, 3)?;
            let record = ChangeRecord::FigureSettingsChanged {
                property: string(&f[0])?,
                old: f[1].clone(),
                new: f[2].clone(),
            };
            (record, None)
        }
        other => {
            return Err(GraphsError::ProjectParse(format!(
                "unknown change record kind {}",
                other
            )))
        }
    })
}

/// Parse history states, assigning the live uuids to every item reference
pub fn decode_states(raw: &[Value], position: isize, live: &[Uuid]) -> Result<Vec<HistoryState>> {
    let mut batches = Vec::with_capacity(raw.len());
    let mut indices = Vec::with_capacity(raw.len());
    let mut limits = Vec::with_capacity(raw.len());
    for state in raw {
        let pair = state
            .as_array()
            .filter(|a| a.len() == 2)
            .ok_or_else(|| malformed("history state"))?;
        let records = pair[0].as_array().ok_or_else(|| malformed("history batch"))?;
        let (batch, batch_indices): (Vec<_>, Vec<_>) = records
            .iter()
            .map(decode_record)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();
        batches.push(batch);
        indices.push(batch_indices);
        limits.push(limits_from_value(&pair[1])?);
    }

    let lens: Vec<usize> = batches.iter().map(Vec::len).collect();
    let applied = applied_count(lens.len(), position);
    replay::walk(&lens, applied, live, |s, r, list, direction| {
        match &mut batches[s][r] {
            ChangeRecord::ItemPropertyChanged { uuid, .. } => {
                let index = indices[s][r].ok_or_else(|| malformed("change record"))?;
                *uuid = replay::at(list, index)?;
            }
            ChangeRecord::ItemAdded(item) => match direction {
                Direction::Forward => list.push(item.uuid),
                Direction::Backward => {
                    item.uuid = list
                        .pop()
                        .ok_or_else(|| inconsistent("an added item is missing"))?;
                }
            },
            ChangeRecord::ItemRemoved { index, item } => match direction {
                Direction::Forward => item.uuid = replay::remove_at(list, *index)?,
                Direction::Backward => replay::insert_at(list, *index, item.uuid)?,
            },
            ChangeRecord::ItemsSwapped { source, target } => {
                replay::swap(list, *source, *target)?
            }
            ChangeRecord::FigureSettingsChanged { .. } => {}
        }
        Ok(())
    })?;

    Ok(batches
        .into_iter()
        .zip(limits)
        .map(|(batch, limits)| HistoryState { batch, limits })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProjectModel;
    use crate::style::StyleParams;

    fn add(model: &mut ProjectModel, history: &mut HistoryEngine, name: &str) {
        let item = Item::data(name, vec![0.0], vec![1.0], &StyleParams::default());
        history.record_item_added(&item);
        model.items.push(item);
        history.add_history_state(model, None);
    }

    fn live(model: &ProjectModel) -> Vec<Uuid> {
        model.items.iter().map(|i| i.uuid).collect()
    }

    #[test]
    fn test_limits_value() {
        let limits = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_eq!(limits_from_value(&limits_to_value(&limits)).unwrap(), limits);
        assert!(limits_from_value(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_indices_follow_the_list_at_record_time() {
        let mut model = ProjectModel::default();
        let mut history = HistoryEngine::new(&model, 100);
        add(&mut model, &mut history, "a");
        add(&mut model, &mut history, "b");

        // swap, then rename the item now at index 0
        model.items.swap(0, 1);
        history.record_items_swapped(0, 1);
        model.items[0].name = "renamed".into();
        history.record_item_changed(&model.items[0], "name");
        history.add_history_state(&model, None);
        history.undo(&mut model).unwrap();

        let encoded = encode_states(&history, &live(&model)).unwrap();
        let batch = encoded[3][0].as_array().unwrap();
        assert_eq!(batch[1], json!([0, [0, "name", "b", "renamed"]]));

        let decoded = decode_states(&encoded, history.position(), &live(&model)).unwrap();
        let b_uuid = model.items[1].uuid;
        match &decoded[3].batch[1] {
            ChangeRecord::ItemPropertyChanged { uuid, .. } => assert_eq!(*uuid, b_uuid),
            other => panic!("unexpected record {:?}", other),
        }
        match &decoded[2].batch[0] {
            ChangeRecord::ItemAdded(item) => assert_eq!(item.uuid, b_uuid),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_decoded_history_replays() {
        let mut model = ProjectModel::default();
        let mut history = HistoryEngine::new(&model, 100);
        add(&mut model, &mut history, "a");
        let removed = model.items.remove(0);
        history.record_item_removed(0, &removed);
        history.add_history_state(&model, None);

        let encoded = encode_states(&history, &live(&model)).unwrap();
        let mut loaded = ProjectModel::default();
        let states = decode_states(&encoded, -1, &[]).unwrap();
        let mut restored = HistoryEngine::from_parts(states, -1, &loaded, 100).unwrap();
        restored.undo(&mut loaded).unwrap();
        assert_eq!(loaded.items.len(), 1);
        restored.undo(&mut loaded).unwrap();
        assert!(loaded.items.is_empty());
        restored.redo(&mut loaded).unwrap();
        assert_eq!(loaded.items[0].name, "a");
    }

    #[test]
    fn test_bad_index_is_parse_error() {
        let raw = vec![
            json!([[], limits_to_value(&[0.0; 8])]),
            json!([[[0, [3, "name", "a", "b"]]], limits_to_value(&[0.0; 8])]),
        ];
        let err = decode_states(&raw, -1, &[]).unwrap_err();
        assert!(matches!(err, GraphsError::ProjectParse(_)));
    }
}
