//! The project engine
//!
//! [`ProjectEngine`] owns the single mutable project: the item model, both
//! histories, the preferences a new project starts from and the current
//! style. Every user intent is one method call that either commits one
//! history state or fails without touching the model.
//!
//! Observers subscribe to [`ProjectEvent`]s on the engine's [`EventBus`];
//! failures are returned to the caller and also reported through the
//! engine's [`Notifier`].
//!
//! ```ignore
//! use graphs_core::engine::ProjectEngine;
//! use graphs_core::operations::Operation;
//!
//! let mut engine = ProjectEngine::default();
//! engine.import(&["data.csv".into()])?;
//! engine.perform_operation(&Operation::Normalize)?;
//! engine.undo()?;
//! engine.save(Some("project.graphs".as_ref()))?;
//! ```

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Preferences;
use crate::error::{GraphsError, Result};
use crate::events::{ComponentId, EventBus, Notification, Notifier, ProjectEvent, TracingNotifier};
use crate::export;
use crate::figure::{Direction, FigureSettings, Limits, LIMIT_NAMES};
use crate::history::{ChangeRecord, HistoryEngine, ViewHistory};
use crate::item::{dedup_name, Item};
use crate::model::ProjectModel;
use crate::operations::{apply_in_span, symbolic, transforms, Operation};
use crate::parsers::{self, spawn_import, ImportSettings, ImportTask};
use crate::project;
use crate::scales::Scale;
use crate::style::StyleParams;
use crate::view;

/// Name shown for a project that was never saved
pub const UNTITLED_PROJECT: &str = "Untitled Project";

/// Canvas interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Pan,
    Zoom,
    /// Operations only touch the highlighted span
    Select,
}

pub struct ProjectEngine {
    model: ProjectModel,
    history: HistoryEngine,
    view_history: ViewHistory,
    /// Top-level project keys kept for the next save
    extra: Map<String, Value>,
    preferences: Preferences,
    style: StyleParams,
    project_file: Option<PathBuf>,
    mode: Mode,
    events: EventBus,
    notifier: Box<dyn Notifier>,
}

impl Default for ProjectEngine {
    fn default() -> Self {
        Self::new(Preferences::default(), StyleParams::default())
    }
}

impl std::fmt::Debug for ProjectEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectEngine")
            .field("items", &self.model.items.len())
            .field("project_file", &self.project_file)
            .field("mode", &self.mode)
            .field("events", &self.events)
            .finish()
    }
}

impl ProjectEngine {
    /// An empty project using the figure defaults of `preferences`
    pub fn new(preferences: Preferences, style: StyleParams) -> Self {
        let model = ProjectModel::new(FigureSettings::from_preferences(&preferences.figure));
        let max_states = preferences.history.max_states;
        Self {
            history: HistoryEngine::new(&model, max_states),
            view_history: ViewHistory::new(model.figure.limits(), max_states),
            model,
            extra: Map::new(),
            preferences,
            style,
            project_file: None,
            mode: Mode::default(),
            events: EventBus::new(),
            notifier: Box::new(TracingNotifier),
        }
    }

    /// Replace the notification sink
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    // ==================== Accessors ====================

    pub fn model(&self) -> &ProjectModel {
        &self.model
    }

    pub fn items(&self) -> &[Item] {
        &self.model.items
    }

    pub fn item(&self, uuid: Uuid) -> Result<&Item> {
        self.model.item(uuid)
    }

    pub fn figure(&self) -> &FigureSettings {
        &self.model.figure
    }

    pub fn history(&self) -> &HistoryEngine {
        &self.history
    }

    pub fn view_history(&self) -> &ViewHistory {
        &self.view_history
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn style(&self) -> &StyleParams {
        &self.style
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        debug!("Interaction mode {:?}", mode);
        self.mode = mode;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn can_view_back(&self) -> bool {
        self.view_history.can_view_back()
    }

    pub fn can_view_forward(&self) -> bool {
        self.view_history.can_view_forward()
    }

    pub fn unsaved(&self) -> bool {
        self.history.unsaved()
    }

    pub fn project_file(&self) -> Option<&Path> {
        self.project_file.as_deref()
    }

    /// File stem of the project file
    pub fn project_name(&self) -> String {
        self.project_file
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNTITLED_PROJECT.to_string())
    }

    /// Directory holding the project file, empty for unsaved projects
    pub fn project_path(&self) -> String {
        self.project_file
            .as_deref()
            .and_then(Path::parent)
            .map(|dir| dir.display().to_string())
            .unwrap_or_default()
    }

    /// Top-level project keys this version does not interpret
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    // ==================== Events ====================

    pub fn subscribe<F>(&mut self, id: impl Into<ComponentId>, callback: F)
    where
        F: FnMut(&ProjectEvent) + Send + 'static,
    {
        self.events.subscribe(id, callback);
    }

    pub fn unsubscribe(&mut self, id: &ComponentId) -> bool {
        self.events.unsubscribe(id)
    }

    fn emit(&mut self, event: ProjectEvent) {
        self.events.emit(&event);
    }

    fn emit_all(&mut self, events: Vec<ProjectEvent>) {
        for event in &events {
            self.events.emit(event);
        }
    }

    fn emit_limit_changes(&mut self, before: &Limits) {
        let after = self.model.figure.limits();
        for (index, name) in LIMIT_NAMES.iter().enumerate() {
            if before[index] != after[index] {
                self.emit(ProjectEvent::FigureSettingChanged(name.to_string()));
            }
        }
    }

    fn emit_history_state(&mut self) {
        self.emit(ProjectEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    fn emit_view_state(&mut self) {
        self.emit(ProjectEvent::ViewHistoryChanged {
            can_view_back: self.view_history.can_view_back(),
            can_view_forward: self.view_history.can_view_forward(),
        });
    }

    /// Report a failure through the notifier and hand it back
    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("{}", e);
            self.notifier.notify(Notification::from_error(e));
        }
        result
    }

    // ==================== Recording ====================

    /// Record every changed property of an item and emit matching events
    fn record_item(&mut self, uuid: Uuid) -> Result<()> {
        let before = self.history.current_batch().len();
        let item = self.model.item(uuid)?;
        self.history.record_item_diff(item);
        let events: Vec<ProjectEvent> = self.history.current_batch()[before..]
            .iter()
            .filter_map(|record| match record {
                ChangeRecord::ItemPropertyChanged { uuid, property, .. } => {
                    Some(ProjectEvent::ItemChanged {
                        uuid: *uuid,
                        property: property.clone(),
                    })
                }
                _ => None,
            })
            .collect();
        self.emit_all(events);
        Ok(())
    }

    fn set_figure_recorded(&mut self, name: &str, value: &Value) -> Result<()> {
        self.model.figure.set_property(name, value)?;
        self.history.record_figure_changed(name, &self.model.figure);
        self.emit(ProjectEvent::FigureSettingChanged(name.to_string()));
        Ok(())
    }

    /// Commit the pending batch, announcing the new history state
    fn commit(&mut self, old_limits: Option<Limits>) {
        let was_unsaved = self.history.unsaved();
        if self.history.add_history_state(&self.model, old_limits) {
            self.emit_history_state();
            if !was_unsaved {
                self.emit(ProjectEvent::UnsavedChanged(true));
            }
        }
    }

    /// Undo uncommitted changes after a failed action
    fn roll_back(&mut self, snapshot: ProjectModel) {
        self.model = snapshot;
        self.history.discard_batch(&self.model);
    }

    fn push_view(&mut self) {
        if self.view_history.push(self.model.figure.limits()) {
            self.emit_view_state();
        }
    }

    // ==================== Items ====================

    fn first_unused_color(&self, used: &HashSet<String>) -> String {
        let cycle = self.style.color_cycle();
        cycle
            .iter()
            .find(|color| !used.contains(*color))
            .cloned()
            .unwrap_or_else(|| cycle[used.len() % cycle.len()].clone())
    }

    fn default_label(&self, direction: Direction) -> &str {
        let figure = &self.preferences.figure;
        match direction {
            Direction::Bottom => &figure.bottom_label,
            Direction::Left => &figure.left_label,
            Direction::Top => &figure.top_label,
            Direction::Right => &figure.right_label,
        }
    }

    /// Whether the axis label of `direction` can take `label`
    fn label_fits(&self, direction: Direction, label: &str, empty_project: bool) -> bool {
        let current = self.model.figure.label(direction);
        empty_project || current == label || current == self.default_label(direction)
    }

    /// Put `item` on an axis whose label matches its own
    ///
    /// An axis still showing its default label adopts the item's label. An
    /// item whose label conflicts with its axis moves to the opposite one.
    fn reconcile_label(
        &mut self,
        item: &mut Item,
        x_axis: bool,
        empty_project: bool,
    ) -> Result<()> {
        let label = if x_axis {
            item.xlabel.clone()
        } else {
            item.ylabel.clone()
        };
        if label.is_empty() {
            return Ok(());
        }
        let mut direction = if x_axis {
            Direction::from_xposition(item.xposition)
        } else {
            Direction::from_yposition(item.yposition)
        };
        if !self.label_fits(direction, &label, empty_project) {
            let opposite = direction.opposite();
            if !self.label_fits(opposite, &label, false) {
                return Ok(());
            }
            debug!("Moving '{}' to the {} axis", item.name, opposite);
            if x_axis {
                item.xposition = opposite.position();
            } else {
                item.yposition = opposite.position();
            }
            direction = opposite;
        }
        if self.model.figure.label(direction) != label {
            self.set_figure_recorded(&format!("{}-label", direction.name()), &json!(label))?;
        }
        Ok(())
    }

    /// Append items without committing
    fn insert_items(&mut self, items: Vec<Item>) -> Result<Vec<Uuid>> {
        let mut names = self.model.names();
        let mut colors: HashSet<String> =
            self.model.items.iter().map(|item| item.color.clone()).collect();
        let mut uuids: HashSet<Uuid> = self.model.items.iter().map(|item| item.uuid).collect();
        let mut added = Vec::with_capacity(items.len());

        for mut item in items {
            let empty_project = self.model.items.is_empty();
            item.name = dedup_name(&item.name, &names);
            names.insert(item.name.clone());
            if !uuids.insert(item.uuid) {
                item.uuid = Uuid::new_v4();
                uuids.insert(item.uuid);
            }
            if item.color.is_empty() {
                item.color = self.first_unused_color(&colors);
            }
            colors.insert(item.color.clone());
            self.reconcile_label(&mut item, true, empty_project)?;
            self.reconcile_label(&mut item, false, empty_project)?;

            let uuid = item.uuid;
            self.history.record_item_added(&item);
            self.model.items.push(item);
            self.emit(ProjectEvent::ItemAdded(uuid));
            added.push(uuid);
        }
        Ok(added)
    }

    /// Add items to the project as one undoable step
    ///
    /// Names are made unique, empty colors come from the style's color
    /// cycle and axis labels are reconciled before the limits are fitted.
    pub fn add_items(&mut self, items: Vec<Item>) -> Result<Vec<Uuid>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let snapshot = self.model.clone();
        let old_limits = self.model.figure.limits();
        match self.insert_items(items) {
            Ok(added) => {
                info!("Added {} items", added.len());
                self.optimize_limits();
                self.commit(Some(old_limits));
                Ok(added)
            }
            Err(e) => {
                self.roll_back(snapshot);
                self.report(Err(e))
            }
        }
    }

    /// Remove items as one undoable step
    pub fn delete_items(&mut self, uuids: &[Uuid]) -> Result<()> {
        if let Some(missing) = uuids.iter().find(|uuid| self.model.index_of(**uuid).is_none()) {
            return self.report(Err(GraphsError::UnknownItem(*missing)));
        }
        let old_limits = self.model.figure.limits();
        for uuid in uuids {
            let Some(index) = self.model.index_of(*uuid) else {
                continue;
            };
            self.history.record_item_removed(index, &self.model.items[index]);
            self.model.items.remove(index);
            self.emit(ProjectEvent::ItemRemoved(*uuid));
        }
        info!("Deleted {} items", uuids.len());
        self.optimize_limits();
        self.commit(Some(old_limits));
        Ok(())
    }

    /// Swap the items at two list positions
    pub fn change_position(&mut self, index1: usize, index2: usize) -> Result<()> {
        let len = self.model.items.len();
        if index1 >= len || index2 >= len {
            return self.report(Err(GraphsError::Validation(format!(
                "Cannot swap items {} and {} of {}",
                index1, index2, len
            ))));
        }
        if index1 == index2 {
            return Ok(());
        }
        self.model.items.swap(index1, index2);
        self.history.record_items_swapped(index1, index2);
        self.emit(ProjectEvent::ItemsSwapped(index1, index2));
        self.commit(None);
        Ok(())
    }

    /// Set one item property as an undoable step
    pub fn set_item_property(&mut self, uuid: Uuid, name: &str, value: Value) -> Result<()> {
        let result = self
            .model
            .item_mut(uuid)
            .and_then(|item| item.set_property(name, value));
        self.report(result)?;
        self.record_item(uuid)?;
        self.commit(None);
        Ok(())
    }

    /// Set one figure setting
    ///
    /// Limit and highlight changes only affect the view; limits are logged
    /// in the view history instead. Changing a scale refits the limits.
    pub fn set_figure_setting(&mut self, name: &str, value: Value) -> Result<()> {
        let old_limits = self.model.figure.limits();
        let result = self.set_figure_recorded(name, &value);
        self.report(result)?;
        if name.ends_with("-scale") {
            self.optimize_limits();
            self.commit(Some(old_limits));
        } else {
            if LIMIT_NAMES.contains(&name) {
                self.push_view();
            }
            self.commit(None);
        }
        Ok(())
    }

    /// Re-derive item styling after the style changed
    ///
    /// Attributes the user changed by hand are kept. The update is not an
    /// undoable step.
    pub fn apply_style(&mut self, style: StyleParams) {
        for index in 0..self.model.items.len() {
            let before = self.model.items[index].clone();
            self.model.items[index].reset(&self.style, &style);
            let item = &self.model.items[index];
            let changed: Vec<String> = item
                .property_names()
                .into_iter()
                .filter(|property| before.get_property(property) != item.get_property(property))
                .map(str::to_string)
                .collect();
            let uuid = item.uuid;
            for property in changed {
                self.emit(ProjectEvent::ItemChanged { uuid, property });
            }
        }
        self.style = style;
        self.history.discard_batch(&self.model);
    }

    // ==================== History ====================

    pub fn undo(&mut self) -> Result<()> {
        let before = self.model.figure.limits();
        let result = self.history.undo(&mut self.model);
        let events = self.report(result)?;
        self.after_replay(events, &before);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<()> {
        let before = self.model.figure.limits();
        let result = self.history.redo(&mut self.model);
        let events = self.report(result)?;
        self.after_replay(events, &before);
        Ok(())
    }

    fn after_replay(&mut self, events: Vec<ProjectEvent>, before: &Limits) {
        if events.is_empty() {
            return;
        }
        self.emit_all(events);
        self.emit_limit_changes(before);
        self.push_view();
        self.emit(ProjectEvent::UnsavedChanged(true));
    }

    pub fn view_back(&mut self) {
        let before = self.model.figure.limits();
        if self.view_history.back(&mut self.model.figure) {
            self.emit_limit_changes(&before);
            self.emit_view_state();
        }
    }

    pub fn view_forward(&mut self) {
        let before = self.model.figure.limits();
        if self.view_history.forward(&mut self.model.figure) {
            self.emit_limit_changes(&before);
            self.emit_view_state();
        }
    }

    /// Fit the limits to the visible items and log them as a view
    pub fn optimize_limits(&mut self) {
        let before = self.model.figure.limits();
        let limits = view::autoscale(&self.model);
        self.model.figure.set_limits(&limits);
        self.emit_limit_changes(&before);
        self.push_view();
    }

    // ==================== Operations ====================

    fn selected_uuids(&self) -> Vec<Uuid> {
        self.model
            .items
            .iter()
            .filter(|item| item.selected)
            .map(|item| item.uuid)
            .collect()
    }

    /// Highlighted data range on the x axis of `item`, in selection mode
    fn span_for(&self, item: &Item) -> Option<(f64, f64)> {
        (self.mode == Mode::Select).then(|| {
            let (x_axis, _) = ProjectModel::item_axes(item);
            view::highlight_range(&self.model, x_axis)
        })
    }

    /// Run `operation` on every selected item as one undoable step
    ///
    /// Returns the uuids of the items that changed. If any item fails the
    /// project is left untouched.
    pub fn perform_operation(&mut self, operation: &Operation) -> Result<Vec<Uuid>> {
        if *operation == Operation::Cut && self.mode != Mode::Select {
            return self.report(Err(GraphsError::OperationUnsupported(
                "Cut needs a highlighted span".to_string(),
            )));
        }
        let old_limits = self.model.figure.limits();
        let result = self.operate(operation);
        let changed = self.report(result)?;
        if changed.is_empty() {
            self.notifier
                .notify(Notification::info("No data found within the highlighted area"));
            return Ok(changed);
        }
        for uuid in &changed {
            self.record_item(*uuid)?;
        }
        info!("{} applied to {} items", operation.name(), changed.len());
        self.optimize_limits();
        self.commit(Some(old_limits));
        Ok(changed)
    }

    /// Compute and apply the operation on a copy, swapping it in on success
    fn operate(&mut self, operation: &Operation) -> Result<Vec<Uuid>> {
        let mut working = self.model.clone();
        let mut changed = Vec::new();
        for uuid in self.selected_uuids() {
            let item = self.model.item(uuid)?;
            if let (Some(xdata), Some(ydata)) = (item.xdata(), item.ydata()) {
                let Some((x, y)) = apply_in_span(operation, xdata, ydata, self.span_for(item))?
                else {
                    continue;
                };
                working.item_mut(uuid)?.set_data(x, y)?;
            } else if let Some(equation) = item.equation_item() {
                let transformed = symbolic::apply_to_equation(operation, &equation.equation)?;
                working
                    .item_mut(uuid)?
                    .set_property("equation", Value::from(transformed))?;
            } else {
                continue;
            }
            changed.push(uuid);
        }
        self.model = working;
        Ok(changed)
    }

    /// Stack the selected datasets vertically in list order
    ///
    /// Datasets are grouped by y axis; each group shifts by offsets on
    /// linear axes and by factors on logarithmic ones.
    pub fn shift(&mut self) -> Result<Vec<Uuid>> {
        let old_limits = self.model.figure.limits();
        let mut changed = Vec::new();
        let snapshot = self.model.clone();
        for direction in [Direction::Left, Direction::Right] {
            let group: Vec<Uuid> = self
                .model
                .items
                .iter()
                .filter(|item| {
                    item.selected
                        && item.is_data_like()
                        && Direction::from_yposition(item.yposition) == direction
                })
                .map(|item| item.uuid)
                .collect();
            if group.is_empty() {
                continue;
            }
            let axis = self.model.figure.axis(direction);
            let scale = axis.scale;
            let shifts = {
                let ydatas: Vec<&[f64]> = group
                    .iter()
                    .filter_map(|uuid| self.model.item(*uuid).ok().and_then(Item::ydata))
                    .collect();
                transforms::shift_values(&ydatas, scale, axis.min, axis.max)
            };
            for (uuid, shift) in group.iter().zip(shifts) {
                let item = self.model.item_mut(*uuid)?;
                let (Some(xdata), Some(ydata)) = (item.xdata(), item.ydata()) else {
                    continue;
                };
                let ydata = if scale == Scale::Log {
                    transforms::multiply(ydata, shift)
                } else {
                    transforms::translate(ydata, shift)
                };
                let xdata = xdata.to_vec();
                if let Err(e) = item.set_data(xdata, ydata) {
                    self.roll_back(snapshot);
                    return self.report(Err(e));
                }
                changed.push(*uuid);
            }
        }
        for uuid in &changed {
            self.record_item(*uuid)?;
        }
        self.optimize_limits();
        self.commit(Some(old_limits));
        Ok(changed)
    }

    /// Merge the selected datasets into a new item
    ///
    /// In selection mode only the highlighted points take part.
    pub fn combine(&mut self) -> Result<Option<Uuid>> {
        let mut datasets: Vec<(Vec<f64>, Vec<f64>)> = Vec::new();
        let mut labels = None;
        for item in self.model.items.iter().filter(|item| item.selected) {
            let (Some(xdata), Some(ydata)) = (item.xdata(), item.ydata()) else {
                continue;
            };
            let points: Vec<(f64, f64)> = match self.span_for(item) {
                Some((start, stop)) => xdata
                    .iter()
                    .zip(ydata)
                    .filter(|(x, _)| **x >= start && **x <= stop)
                    .map(|(x, y)| (*x, *y))
                    .collect(),
                None => xdata.iter().copied().zip(ydata.iter().copied()).collect(),
            };
            if points.is_empty() {
                continue;
            }
            labels.get_or_insert_with(|| (item.xlabel.clone(), item.ylabel.clone()));
            datasets.push(points.into_iter().unzip());
        }
        if datasets.is_empty() {
            self.notifier
                .notify(Notification::info("No data found within the highlighted area"));
            return Ok(None);
        }
        let (xdata, ydata) =
            transforms::combine(datasets.iter().map(|(x, y)| (x.as_slice(), y.as_slice())));
        let (xlabel, ylabel) = labels.unwrap_or_default();
        let item = Item::data(&self.preferences.actions.combine_name, xdata, ydata, &self.style)
            .with_labels(&xlabel, &ylabel);
        let added = self.add_items(vec![item])?;
        Ok(added.first().copied())
    }

    // ==================== Import / Export ====================

    /// Import settings for `path` using the stored parser defaults
    pub fn import_settings(&self, path: &Path) -> Result<ImportSettings> {
        let parser_id = parsers::registry().guess(path).id();
        ImportSettings::with_parser(path, parser_id, self.preferences.import_options(parser_id))
    }

    /// Parse files and add their items as one undoable step
    ///
    /// Nothing is added unless every file parses.
    pub fn import(&mut self, paths: &[PathBuf]) -> Result<Vec<Uuid>> {
        let mut items = Vec::new();
        for path in paths {
            let result = self
                .import_settings(path)
                .and_then(|settings| parsers::parse(&settings, &self.style));
            items.extend(self.report(result)?);
        }
        self.add_items(items)
    }

    /// Start parsing on a worker thread
    pub fn start_import(&self, requests: Vec<ImportSettings>) -> ImportTask {
        spawn_import(requests, self.style.clone())
    }

    /// Add the items of a finished import task
    ///
    /// Returns `None` while the task is still running.
    pub fn poll_import(&mut self, task: &ImportTask) -> Option<Result<Vec<Uuid>>> {
        let result = task.try_result()?;
        Some(self.report(result).and_then(|items| self.add_items(items)))
    }

    /// Export the selected datasets
    ///
    /// A single dataset is written to `path`, several go into the directory
    /// `path` as `<name>.txt`.
    pub fn export(&self, path: &Path, header: bool) -> Result<Vec<PathBuf>> {
        let selected: Vec<&Item> = self
            .model
            .items
            .iter()
            .filter(|item| item.selected && item.is_data_like())
            .collect();
        let result = match selected.as_slice() {
            [] => Err(GraphsError::Validation("No data selected for export".to_string())),
            [item] => export::export_item(item, path, header).map(|_| vec![path.to_path_buf()]),
            items => export::export_items(items, path, header),
        };
        self.report(result)
    }

    // ==================== Project ====================

    /// Write the project to `path`, or to the current project file
    pub fn save(&mut self, path: Option<&Path>) -> Result<()> {
        let Some(path) = path.map(Path::to_path_buf).or_else(|| self.project_file.clone()) else {
            return self.report(Err(GraphsError::Validation(
                "The project has no file yet".to_string(),
            )));
        };
        let result = project::save(
            &path,
            &self.model,
            &self.history,
            &self.view_history,
            &self.extra,
        );
        self.report(result)?;
        self.history.set_unsaved(false);
        self.project_file = Some(path.clone());
        self.emit(ProjectEvent::ProjectSaved(path));
        self.emit(ProjectEvent::UnsavedChanged(false));
        Ok(())
    }

    /// Replace the project with the one stored at `path`
    ///
    /// On failure the current project stays open.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let result = project::load(path, self.preferences.history.max_states);
        let loaded = self.report(result)?;
        self.model = loaded.model;
        self.history = loaded.history;
        self.history.set_unsaved(false);
        self.view_history = loaded.view_history;
        self.extra = loaded.extra;
        self.project_file = Some(path.to_path_buf());
        info!(
            "Opened {} with {} items",
            self.project_name(),
            self.model.items.len()
        );
        self.announce_project();
        Ok(())
    }

    /// Start over with an empty project built from the preferences
    pub fn reset(&mut self) {
        let max_states = self.preferences.history.max_states;
        self.model = ProjectModel::new(FigureSettings::from_preferences(&self.preferences.figure));
        self.history = HistoryEngine::new(&self.model, max_states);
        self.view_history = ViewHistory::new(self.model.figure.limits(), max_states);
        self.extra.clear();
        self.project_file = None;
        debug!("Project reset");
        self.announce_project();
    }

    fn announce_project(&mut self) {
        self.emit(ProjectEvent::ProjectLoaded);
        self.emit_history_state();
        self.emit_view_state();
        self.emit(ProjectEvent::UnsavedChanged(false));
    }

    /// Project dictionary as it would be saved
    pub fn to_dict(&self) -> Result<Map<String, Value>> {
        project::to_dict(&self.model, &self.history, &self.view_history, &self.extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn data(name: &str, x: &[f64], y: &[f64]) -> Item {
        Item::data(name, x.to_vec(), y.to_vec(), &StyleParams::default())
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_add_and_undo() {
        let mut engine = ProjectEngine::default();
        engine.add_items(vec![data("a", &[0.0, 1.0], &[0.0, 1.0])]).unwrap();
        assert_eq!(engine.items().len(), 1);

        engine.undo().unwrap();
        assert!(engine.items().is_empty());
        assert!(!engine.can_undo());
        assert!(engine.can_redo());

        engine.redo().unwrap();
        assert_eq!(engine.items()[0].name, "a");
        assert!(!engine.can_redo());
    }

    #[test]
    fn test_translate_undo_restores_limits() {
        let mut engine = ProjectEngine::default();
        engine
            .add_items(vec![data("a", &[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0])])
            .unwrap();
        let figure = engine.figure();
        assert!(approx(figure.axis(Direction::Bottom).min, -0.03));
        assert!(approx(figure.axis(Direction::Bottom).max, 2.03));

        engine.perform_operation(&Operation::TranslateX(10.0)).unwrap();
        let axis = engine.figure().axis(Direction::Bottom);
        assert!(approx(axis.min, 9.97));
        assert!(approx(axis.max, 12.03));

        engine.undo().unwrap();
        assert_eq!(engine.items()[0].xdata().unwrap(), &[0.0, 1.0, 2.0]);
        let axis = engine.figure().axis(Direction::Bottom);
        assert!((axis.min + 0.03).abs() < 1e-12);
        assert!((axis.max - 2.03).abs() < 1e-12);
    }

    #[test]
    fn test_label_reconciliation() {
        let mut engine = ProjectEngine::default();
        engine
            .add_items(vec![data("a", &[0.0], &[1.0]).with_labels("θ", "")])
            .unwrap();
        assert_eq!(engine.figure().label(Direction::Bottom), "θ");
        assert_eq!(engine.items()[0].xposition, 0);

        engine
            .add_items(vec![data("b", &[0.0], &[1.0]).with_labels("t", "")])
            .unwrap();
        assert_eq!(engine.items()[1].xposition, 1);
        assert_eq!(engine.figure().label(Direction::Top), "t");
    }

    #[test]
    fn test_cut_in_selection_mode() {
        let mut engine = ProjectEngine::default();
        engine
            .add_items(vec![data(
                "a",
                &[0.0, 1.0, 2.0, 3.0, 4.0],
                &[5.0, 4.0, 3.0, 2.0, 1.0],
            )])
            .unwrap();
        engine.set_figure_setting("min-bottom", json!(0.0)).unwrap();
        engine.set_figure_setting("max-bottom", json!(4.0)).unwrap();
        engine.set_figure_setting("min-selected", json!(0.25)).unwrap();
        engine.set_figure_setting("max-selected", json!(0.75)).unwrap();
        let states = engine.history().states().len();

        engine.set_mode(Mode::Select);
        engine.perform_operation(&Operation::Cut).unwrap();
        let item = &engine.items()[0];
        assert_eq!(item.xdata().unwrap(), &[0.0, 4.0]);
        assert_eq!(item.ydata().unwrap(), &[5.0, 1.0]);
        assert_eq!(engine.history().states().len(), states + 1);
        assert!(approx(engine.figure().axis(Direction::Bottom).min, -0.06));
    }

    #[test]
    fn test_cut_requires_selection_mode() {
        let mut engine = ProjectEngine::default();
        engine.add_items(vec![data("a", &[0.0, 1.0], &[0.0, 1.0])]).unwrap();
        assert!(matches!(
            engine.perform_operation(&Operation::Cut),
            Err(GraphsError::OperationUnsupported(_))
        ));
    }

    #[test]
    fn test_failed_operation_leaves_project_untouched() {
        let mut engine = ProjectEngine::default();
        engine
            .add_items(vec![
                data("a", &[0.0, 1.0], &[1.0, 2.0]),
                data("b", &[0.0, 1.0], &[0.0, 0.0]),
            ])
            .unwrap();
        let before = engine.model().clone();
        let states = engine.history().states().len();
        assert!(engine.perform_operation(&Operation::Normalize).is_err());
        assert_eq!(engine.model(), &before);
        assert_eq!(engine.history().states().len(), states);
        assert!(engine.history().current_batch().is_empty());
    }

    #[test]
    fn test_add_assigns_unique_names_and_colors() {
        let mut engine = ProjectEngine::default();
        engine
            .add_items(vec![data("a", &[0.0], &[0.0]), data("a", &[1.0], &[1.0])])
            .unwrap();
        let items = engine.items();
        assert_eq!(items[1].name, "a (1)");
        assert_ne!(items[0].color, items[1].color);
        assert_eq!(items[0].color, StyleParams::default().color_cycle()[0]);
    }

    #[test]
    fn test_delete_and_swap() {
        let mut engine = ProjectEngine::default();
        let ids = engine
            .add_items(vec![
                data("a", &[0.0], &[0.0]),
                data("b", &[1.0], &[1.0]),
                data("c", &[2.0], &[2.0]),
            ])
            .unwrap();
        engine.change_position(0, 2).unwrap();
        assert_eq!(engine.items()[0].name, "c");
        engine.delete_items(&[ids[1]]).unwrap();
        assert_eq!(engine.items().len(), 2);
        assert!(engine.delete_items(&[Uuid::new_v4()]).is_err());

        engine.undo().unwrap();
        engine.undo().unwrap();
        let names: Vec<&str> = engine.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_property_setters_emit_events() {
        let mut engine = ProjectEngine::default();
        let ids = engine.add_items(vec![data("a", &[0.0], &[0.0])]).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.subscribe("test", move |event: &ProjectEvent| {
            sink.lock().unwrap().push(event.clone());
        });

        engine.set_item_property(ids[0], "name", json!("renamed")).unwrap();
        engine.set_figure_setting("title", json!("Title")).unwrap();
        let events = seen.lock().unwrap().clone();
        assert!(events.contains(&ProjectEvent::ItemChanged {
            uuid: ids[0],
            property: "name".to_string()
        }));
        assert!(events.contains(&ProjectEvent::FigureSettingChanged("title".to_string())));

        engine.undo().unwrap();
        assert_eq!(engine.figure().title, "");
        assert!(engine.set_item_property(ids[0], "linewidth", json!(-1.0)).is_err());
    }

    #[test]
    fn test_view_history_navigation() {
        let mut engine = ProjectEngine::default();
        engine.add_items(vec![data("a", &[0.0, 1.0], &[0.0, 1.0])]).unwrap();
        engine.set_figure_setting("max-bottom", json!(5.0)).unwrap();
        assert!(engine.can_view_back());
        engine.view_back();
        assert!(engine.figure().axis(Direction::Bottom).max < 5.0);
        engine.view_forward();
        assert_eq!(engine.figure().axis(Direction::Bottom).max, 5.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.graphs");
        let mut engine = ProjectEngine::default();
        engine.add_items(vec![data("a", &[0.0, 1.0], &[0.0, 1.0])]).unwrap();
        assert!(engine.unsaved());
        engine.save(Some(&path)).unwrap();
        assert!(!engine.unsaved());
        assert_eq!(engine.project_name(), "test");

        let mut other = ProjectEngine::default();
        other.load(&path).unwrap();
        assert_eq!(other.items()[0].name, "a");
        assert!(other.can_undo());
        assert!(!other.unsaved());
    }

    #[test]
    fn test_incompatible_project_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.graphs");
        std::fs::write(&path, r#"{"project-version": 3, "data": [], "figure-settings": {}}"#)
            .unwrap();
        let mut engine = ProjectEngine::default();
        engine.add_items(vec![data("a", &[0.0], &[0.0])]).unwrap();
        assert!(matches!(
            engine.load(&path),
            Err(GraphsError::ProjectIncompatible(3))
        ));
        assert_eq!(engine.items().len(), 1);
        assert!(engine.project_file().is_none());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut engine = ProjectEngine::default();
        engine
            .add_items(vec![data("a", &[0.0], &[0.0]).with_labels("θ", "")])
            .unwrap();
        engine.reset();
        assert!(engine.items().is_empty());
        assert_eq!(engine.figure().label(Direction::Bottom), "X Value");
        assert!(!engine.can_undo());
        assert_eq!(engine.project_name(), UNTITLED_PROJECT);
    }

    #[test]
    fn test_shift_and_combine() {
        let mut engine = ProjectEngine::default();
        engine
            .add_items(vec![
                data("a", &[0.0, 1.0], &[0.0, 1.0]),
                data("b", &[0.5, 2.0], &[0.0, 1.0]),
            ])
            .unwrap();
        let axis = engine.figure().axis(Direction::Left);
        let step = 1.0 + 0.1 * (axis.max - axis.min);
        engine.shift().unwrap();
        let items = engine.items();
        assert_eq!(items[0].ydata().unwrap(), &[step, 1.0 + step]);
        assert_eq!(items[1].ydata().unwrap(), &[step + step, 1.0 + (step + step)]);

        let combined = engine.combine().unwrap().unwrap();
        let item = engine.item(combined).unwrap();
        assert_eq!(item.name, "Combined Data");
        assert_eq!(item.xdata().unwrap(), &[0.0, 0.5, 1.0, 2.0]);
    }
}
