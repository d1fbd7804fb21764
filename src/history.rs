//! Change history and view history
//!
//! The [`HistoryEngine`] keeps a log of [`HistoryState`]s. Each state is a
//! batch of [`ChangeRecord`]s committed together plus the axis limits that
//! were current at the time. Undo replays a batch backwards applying the
//! inverse of every record, redo replays it forwards.
//!
//! Records are collected into the current batch while the engine mutates the
//! model and committed with [`HistoryEngine::add_history_state`]. Old values
//! come from deep copies of the items and figure settings taken at the last
//! commit, so callers only report *what* changed.
//!
//! The first state is an empty baseline describing the project as it was
//! created or loaded. `position` is a negative index into the state list;
//! `-1` is the newest state.
//!
//! Axis limits are not part of the change log. They live in the separate
//! [`ViewHistory`], which only ever stores eight-tuples of limits.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{GraphsError, Result};
use crate::events::ProjectEvent;
use crate::figure::{FigureSettings, Limits, LIMIT_NAMES};
use crate::item::Item;
use crate::model::ProjectModel;

/// Default maximum number of states kept in either log
pub const MAX_HISTORY_STATES: usize = 100;

/// Figure properties that are tracked by the view history instead
pub fn is_ignored_figure_property(name: &str) -> bool {
    matches!(name, "min-selected" | "max-selected") || LIMIT_NAMES.contains(&name)
}

/// One reversible mutation
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRecord {
    /// Kind 0
    ItemPropertyChanged {
        uuid: Uuid,
        property: String,
        old: Value,
        new: Value,
    },
    /// Kind 1: the item was appended to the list
    ItemAdded(Item),
    /// Kind 2: the item was removed from `index`
    ItemRemoved { index: usize, item: Item },
    /// Kind 3
    ItemsSwapped { source: usize, target: usize },
    /// Kind 4
    FigureSettingsChanged {
        property: String,
        old: Value,
        new: Value,
    },
}

impl ChangeRecord {
    /// Integer kind used in project files
    pub fn kind(&self) -> u8 {
        match self {
            ChangeRecord::ItemPropertyChanged { .. } => 0,
            ChangeRecord::ItemAdded(_) => 1,
            ChangeRecord::ItemRemoved { .. } => 2,
            ChangeRecord::ItemsSwapped { .. } => 3,
            ChangeRecord::FigureSettingsChanged { .. } => 4,
        }
    }

    /// Apply the record (`forward`) or its inverse to `model`
    pub fn apply(&self, model: &mut ProjectModel, forward: bool) -> Result<ProjectEvent> {
        match self {
            ChangeRecord::ItemPropertyChanged {
                uuid,
                property,
                old,
                new,
            } => {
                let value = if forward { new } else { old };
                model.item_mut(*uuid)?.set_property_raw(property, value)?;
                Ok(ProjectEvent::ItemChanged {
                    uuid: *uuid,
                    property: property.clone(),
                })
            }
            ChangeRecord::ItemAdded(item) => {
                if forward {
                    model.items.push(item.clone());
                    Ok(ProjectEvent::ItemAdded(item.uuid))
                } else {
                    let index = model
                        .index_of(item.uuid)
                        .ok_or(GraphsError::UnknownItem(item.uuid))?;
                    model.items.remove(index);
                    Ok(ProjectEvent::ItemRemoved(item.uuid))
                }
            }
            ChangeRecord::ItemRemoved { index, item } => {
                if forward {
                    match model.items.get(*index) {
                        Some(existing) if existing.uuid == item.uuid => {
                            model.items.remove(*index);
                            Ok(ProjectEvent::ItemRemoved(item.uuid))
                        }
                        _ => Err(inconsistent(format!(
                            "no item '{}' at index {}",
                            item.name, index
                        ))),
                    }
                } else if *index <= model.items.len() {
                    model.items.insert(*index, item.clone());
                    Ok(ProjectEvent::ItemAdded(item.uuid))
                } else {
                    Err(inconsistent(format!("cannot restore an item at index {}", index)))
                }
            }
            ChangeRecord::ItemsSwapped { source, target } => {
                let len = model.items.len();
                if *source >= len || *target >= len {
                    return Err(inconsistent(format!(
                        "cannot swap items {} and {} of {}",
                        source, target, len
                    )));
                }
                model.items.swap(*source, *target);
                Ok(ProjectEvent::ItemsSwapped(*source, *target))
            }
            ChangeRecord::FigureSettingsChanged { property, old, new } => {
                let value = if forward { new } else { old };
                model.figure.set_property_raw(property, value)?;
                Ok(ProjectEvent::FigureSettingChanged(property.clone()))
            }
        }
    }
}

fn inconsistent(detail: String) -> GraphsError {
    GraphsError::ProjectParse(format!("history does not match the project: {}", detail))
}

/// A committed batch and the limits current when it was committed
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryState {
    pub batch: Vec<ChangeRecord>,
    pub limits: Limits,
}

/// Log of committed change batches with undo/redo
#[derive(Debug, Clone)]
pub struct HistoryEngine {
    states: Vec<HistoryState>,
    position: isize,
    current_batch: Vec<ChangeRecord>,
    data_copy: HashMap<Uuid, Item>,
    figure_copy: FigureSettings,
    unsaved: bool,
    max_states: usize,
}

impl HistoryEngine {
    /// Fresh history whose baseline is the current model
    pub fn new(model: &ProjectModel, max_states: usize) -> Self {
        let baseline = HistoryState {
            batch: Vec::new(),
            limits: model.figure.limits(),
        };
        let mut history = Self {
            states: vec![baseline],
            position: -1,
            current_batch: Vec::new(),
            data_copy: HashMap::new(),
            figure_copy: model.figure.clone(),
            unsaved: false,
            max_states: max_states.max(1),
        };
        history.refresh_copies(model);
        history
    }

    /// Restore a history read from a project file
    pub fn from_parts(
        states: Vec<HistoryState>,
        position: isize,
        model: &ProjectModel,
        max_states: usize,
    ) -> Result<Self> {
        let len = states.len() as isize;
        if len == 0 || position > -1 || position < -len {
            return Err(GraphsError::ProjectParse(format!(
                "history position {} is outside of {} states",
                position, len
            )));
        }
        let mut history = Self {
            states,
            position,
            current_batch: Vec::new(),
            data_copy: HashMap::new(),
            figure_copy: model.figure.clone(),
            unsaved: false,
            max_states: max_states.max(1),
        };
        history.refresh_copies(model);
        Ok(history)
    }

    pub fn states(&self) -> &[HistoryState] {
        &self.states
    }

    pub fn position(&self) -> isize {
        self.position
    }

    pub fn current_batch(&self) -> &[ChangeRecord] {
        &self.current_batch
    }

    pub fn can_undo(&self) -> bool {
        self.position.unsigned_abs() < self.states.len()
    }

    pub fn can_redo(&self) -> bool {
        self.position < -1
    }

    pub fn unsaved(&self) -> bool {
        self.unsaved
    }

    pub fn set_unsaved(&mut self, unsaved: bool) {
        self.unsaved = unsaved;
    }

    /// Index into `states` of the state at `position`
    fn current_index(&self) -> usize {
        (self.states.len() as isize + self.position) as usize
    }

    fn refresh_copies(&mut self, model: &ProjectModel) {
        self.data_copy = model
            .items
            .iter()
            .map(|item| (item.uuid, item.clone()))
            .collect();
        self.figure_copy = model.figure.clone();
    }

    // ==================== Event Collection ====================

    /// Record that `property` of `item` now holds its current value
    pub fn record_item_changed(&mut self, item: &Item, property: &str) {
        let new = item.get_property(property).unwrap_or(Value::Null);
        let old = self
            .data_copy
            .get(&item.uuid)
            .and_then(|copy| copy.get_property(property))
            .unwrap_or(Value::Null);
        if old == new {
            return;
        }
        if let Some(copy) = self.data_copy.get_mut(&item.uuid) {
            if let Err(e) = copy.set_property_raw(property, &new) {
                debug!("Could not update history copy of '{}': {}", property, e);
            }
        }
        self.current_batch.push(ChangeRecord::ItemPropertyChanged {
            uuid: item.uuid,
            property: property.to_string(),
            old,
            new,
        });
    }

    /// Record every property of `item` that differs from the last snapshot
    pub fn record_item_diff(&mut self, item: &Item) {
        for property in item.property_names() {
            self.record_item_changed(item, property);
        }
    }

    pub fn record_item_added(&mut self, item: &Item) {
        self.data_copy.insert(item.uuid, item.clone());
        self.current_batch.push(ChangeRecord::ItemAdded(item.clone()));
    }

    /// Record a removal. Call before the item leaves the list.
    pub fn record_item_removed(&mut self, index: usize, item: &Item) {
        self.data_copy.remove(&item.uuid);
        self.current_batch.push(ChangeRecord::ItemRemoved {
            index,
            item: item.clone(),
        });
    }

    pub fn record_items_swapped(&mut self, index1: usize, index2: usize) {
        self.current_batch.push(ChangeRecord::ItemsSwapped {
            source: index2,
            target: index1,
        });
    }

    /// Record a figure setting change, skipping view-only properties
    pub fn record_figure_changed(&mut self, property: &str, figure: &FigureSettings) {
        if is_ignored_figure_property(property) {
            return;
        }
        let new = figure.get_property(property).unwrap_or(Value::Null);
        let old = self.figure_copy.get_property(property).unwrap_or(Value::Null);
        if old == new {
            return;
        }
        if let Err(e) = self.figure_copy.set_property_raw(property, &new) {
            debug!("Could not update history copy of '{}': {}", property, e);
        }
        self.current_batch.push(ChangeRecord::FigureSettingsChanged {
            property: property.to_string(),
            old,
            new,
        });
    }

    /// Drop uncommitted records and resynchronise the snapshots
    pub fn discard_batch(&mut self, model: &ProjectModel) {
        self.current_batch.clear();
        self.refresh_copies(model);
    }

    // ==================== Commit / Undo / Redo ====================

    /// Commit the current batch as a new state
    ///
    /// `old_limits`, when given, replaces the limits stored with the previous
    /// state so that undoing this batch restores the view from before the
    /// mutation started. Returns whether a state was added.
    pub fn add_history_state(&mut self, model: &ProjectModel, old_limits: Option<Limits>) -> bool {
        if self.current_batch.is_empty() {
            return false;
        }
        if self.position != -1 {
            let keep = self.current_index() + 1;
            self.states.truncate(keep);
            self.position = -1;
        }
        self.states.push(HistoryState {
            batch: std::mem::take(&mut self.current_batch),
            limits: model.figure.limits(),
        });
        if let Some(old_limits) = old_limits {
            let previous = self.states.len() - 2;
            self.states[previous].limits = old_limits;
        }
        if self.states.len() > self.max_states {
            let excess = self.states.len() - self.max_states;
            self.states.drain(..excess);
        }
        self.refresh_copies(model);
        self.unsaved = true;
        debug!(
            "Committed history state {} ({} records)",
            self.states.len(),
            self.states.last().map_or(0, |s| s.batch.len())
        );
        true
    }

    /// Step back one state, returning the resulting events
    ///
    /// The model is only modified if the whole batch replays cleanly.
    pub fn undo(&mut self, model: &mut ProjectModel) -> Result<Vec<ProjectEvent>> {
        if !self.can_undo() {
            return Ok(Vec::new());
        }
        self.discard_pending();
        let undone = self.current_index();
        let mut working = model.clone();
        let mut events = Vec::new();
        for record in self.states[undone].batch.iter().rev() {
            events.push(record.apply(&mut working, false)?);
        }
        working.figure.set_limits(&self.states[undone - 1].limits);
        *model = working;
        self.position -= 1;
        self.finish_replay(model, &mut events);
        Ok(events)
    }

    /// Step forward one state, returning the resulting events
    pub fn redo(&mut self, model: &mut ProjectModel) -> Result<Vec<ProjectEvent>> {
        if !self.can_redo() {
            return Ok(Vec::new());
        }
        self.discard_pending();
        let redone = self.current_index() + 1;
        let mut working = model.clone();
        let mut events = Vec::new();
        for record in &self.states[redone].batch {
            events.push(record.apply(&mut working, true)?);
        }
        working.figure.set_limits(&self.states[redone].limits);
        *model = working;
        self.position += 1;
        self.finish_replay(model, &mut events);
        Ok(events)
    }

    fn discard_pending(&mut self) {
        if !self.current_batch.is_empty() {
            debug!(
                "Dropping {} uncommitted history records",
                self.current_batch.len()
            );
            self.current_batch.clear();
        }
    }

    fn finish_replay(&mut self, model: &ProjectModel, events: &mut Vec<ProjectEvent>) {
        self.refresh_copies(model);
        self.unsaved = true;
        events.push(ProjectEvent::HistoryChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        });
        debug!("History position {} of {}", self.position, self.states.len());
    }
}

// ==================== View History ====================

fn isclose(a: &Limits, b: &Limits) -> bool {
    a.iter()
        .zip(b)
        .all(|(x, y)| (x - y).abs() <= 1e-8 + 1e-5 * y.abs())
}

/// Log of axis limits with back/forward navigation
#[derive(Debug, Clone, PartialEq)]
pub struct ViewHistory {
    states: Vec<Limits>,
    position: isize,
    max_states: usize,
}

impl ViewHistory {
    pub fn new(limits: Limits, max_states: usize) -> Self {
        Self {
            states: vec![limits],
            position: -1,
            max_states: max_states.max(1),
        }
    }

    pub fn from_parts(states: Vec<Limits>, position: isize, max_states: usize) -> Result<Self> {
        let len = states.len() as isize;
        if len == 0 || position > -1 || position < -len {
            return Err(GraphsError::ProjectParse(format!(
                "view history position {} is outside of {} states",
                position, len
            )));
        }
        Ok(Self {
            states,
            position,
            max_states: max_states.max(1),
        })
    }

    pub fn states(&self) -> &[Limits] {
        &self.states
    }

    pub fn position(&self) -> isize {
        self.position
    }

    pub fn can_view_back(&self) -> bool {
        self.position.unsigned_abs() < self.states.len()
    }

    pub fn can_view_forward(&self) -> bool {
        self.position < -1
    }

    fn current_index(&self) -> usize {
        (self.states.len() as isize + self.position) as usize
    }

    /// Current entry
    pub fn current(&self) -> &Limits {
        &self.states[self.current_index()]
    }

    /// Append limits unless they match the current entry. Returns whether
    /// an entry was added.
    pub fn push(&mut self, limits: Limits) -> bool {
        if isclose(&limits, self.current()) {
            return false;
        }
        let keep = self.current_index() + 1;
        self.states.truncate(keep);
        self.states.push(limits);
        self.position = -1;
        if self.states.len() > self.max_states {
            let excess = self.states.len() - self.max_states;
            self.states.drain(..excess);
        }
        true
    }

    /// Move back and apply the referenced limits
    pub fn back(&mut self, figure: &mut FigureSettings) -> bool {
        if !self.can_view_back() {
            return false;
        }
        self.position -= 1;
        figure.set_limits(self.current());
        true
    }

    /// Move forward and apply the referenced limits
    pub fn forward(&mut self, figure: &mut FigureSettings) -> bool {
        if !self.can_view_forward() {
            return false;
        }
        self.position += 1;
        figure.set_limits(self.current());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleParams;
    use serde_json::json;

    fn model_with_item() -> (ProjectModel, HistoryEngine) {
        let model = ProjectModel::default();
        let history = HistoryEngine::new(&model, MAX_HISTORY_STATES);
        (model, history)
    }

    fn add(model: &mut ProjectModel, history: &mut HistoryEngine, name: &str) -> Uuid {
        let item = Item::data(name, vec![0.0, 1.0], vec![0.0, 1.0], &StyleParams::default());
        let uuid = item.uuid;
        history.record_item_added(&item);
        model.items.push(item);
        history.add_history_state(model, None);
        uuid
    }

    #[test]
    fn test_add_undo_redo() {
        let (mut model, mut history) = model_with_item();
        assert!(!history.can_undo());
        add(&mut model, &mut history, "a");
        assert!(history.can_undo());

        history.undo(&mut model).unwrap();
        assert!(model.items.is_empty());
        assert!(!history.can_undo());
        assert!(history.can_redo());

        let events = history.redo(&mut model).unwrap();
        assert_eq!(model.items.len(), 1);
        assert!(!history.can_redo());
        assert!(matches!(events[0], ProjectEvent::ItemAdded(_)));
    }

    #[test]
    fn test_property_change_uses_snapshot_old_value() {
        let (mut model, mut history) = model_with_item();
        let uuid = add(&mut model, &mut history, "a");

        let item = model.item_mut(uuid).unwrap();
        item.set_property("name", json!("b")).unwrap();
        item.set_property("name", json!("c")).unwrap();
        let item = model.item(uuid).unwrap().clone();
        history.record_item_changed(&item, "name");
        history.record_item_changed(&item, "linewidth");
        assert_eq!(history.current_batch().len(), 1);
        history.add_history_state(&model, None);

        history.undo(&mut model).unwrap();
        assert_eq!(model.item(uuid).unwrap().name, "a");
        history.redo(&mut model).unwrap();
        assert_eq!(model.item(uuid).unwrap().name, "c");
    }

    #[test]
    fn test_remove_and_swap_replay() {
        let (mut model, mut history) = model_with_item();
        let a = add(&mut model, &mut history, "a");
        let b = add(&mut model, &mut history, "b");

        history.record_items_swapped(0, 1);
        model.items.swap(0, 1);
        let removed = model.items[1].clone();
        history.record_item_removed(1, &removed);
        model.items.remove(1);
        history.add_history_state(&model, None);
        assert_eq!(model.items[0].uuid, b);

        history.undo(&mut model).unwrap();
        assert_eq!(model.items[0].uuid, a);
        assert_eq!(model.items[1].uuid, b);
        history.redo(&mut model).unwrap();
        assert_eq!(model.items.len(), 1);
        assert_eq!(model.items[0].uuid, b);
    }

    #[test]
    fn test_figure_changes_skip_view_properties() {
        let (mut model, mut history) = model_with_item();
        model.figure.set_property("min-bottom", &json!(-4.0)).unwrap();
        history.record_figure_changed("min-bottom", &model.figure);
        model.figure.set_property("max-selected", &json!(0.5)).unwrap();
        history.record_figure_changed("max-selected", &model.figure);
        assert!(history.current_batch().is_empty());

        model.figure.set_property("title", &json!("Spectra")).unwrap();
        history.record_figure_changed("title", &model.figure);
        assert!(history.add_history_state(&model, None));
        history.undo(&mut model).unwrap();
        assert_eq!(model.figure.title, "");
    }

    #[test]
    fn test_empty_batch_does_not_commit() {
        let (model, mut history) = model_with_item();
        assert!(!history.add_history_state(&model, None));
        assert!(!history.unsaved());
    }

    #[test]
    fn test_undo_restores_old_limits() {
        let (mut model, mut history) = model_with_item();
        let before = model.figure.limits();
        let item = Item::data("a", vec![0.0], vec![0.0], &StyleParams::default());
        history.record_item_added(&item);
        model.items.push(item);
        model.figure.set_range(crate::figure::Direction::Bottom, 5.0, 6.0);
        let after = model.figure.limits();
        history.add_history_state(&model, Some(before));

        history.undo(&mut model).unwrap();
        assert_eq!(model.figure.limits(), before);
        history.redo(&mut model).unwrap();
        assert_eq!(model.figure.limits(), after);
    }

    #[test]
    fn test_commit_truncates_redo() {
        let (mut model, mut history) = model_with_item();
        add(&mut model, &mut history, "a");
        add(&mut model, &mut history, "b");
        history.undo(&mut model).unwrap();
        assert!(history.can_redo());
        add(&mut model, &mut history, "c");
        assert!(!history.can_redo());
        assert_eq!(history.states().len(), 3);
        assert_eq!(history.position(), -1);
    }

    #[test]
    fn test_state_limit() {
        let mut model = ProjectModel::default();
        let mut history = HistoryEngine::new(&model, 5);
        for i in 0..8 {
            add(&mut model, &mut history, &format!("item {}", i));
        }
        assert_eq!(history.states().len(), 5);
        while history.can_undo() {
            history.undo(&mut model).unwrap();
        }
        assert_eq!(model.items.len(), 4);
    }

    #[test]
    fn test_failed_replay_leaves_model_untouched() {
        let (mut model, mut history) = model_with_item();
        add(&mut model, &mut history, "a");
        add(&mut model, &mut history, "b");
        // Removing an item behind the history's back breaks the replay
        model.items.remove(1);
        let snapshot = model.clone();
        assert!(history.undo(&mut model).is_err());
        assert_eq!(model, snapshot);
    }

    #[test]
    fn test_view_history() {
        let mut figure = FigureSettings::default();
        let start = figure.limits();
        let mut view = ViewHistory::new(start, MAX_HISTORY_STATES);
        assert!(!view.can_view_back());

        let mut zoomed = start;
        zoomed[1] = 0.5;
        assert!(view.push(zoomed));
        assert!(!view.push(zoomed));
        assert!(view.can_view_back());

        assert!(view.back(&mut figure));
        assert_eq!(figure.limits(), start);
        assert!(view.can_view_forward());
        assert!(view.forward(&mut figure));
        assert_eq!(figure.limits(), zoomed);

        view.back(&mut figure);
        let mut panned = start;
        panned[0] = -1.0;
        view.push(panned);
        assert!(!view.can_view_forward());
        assert_eq!(view.states().len(), 2);
    }
}
