//! Figure settings
//!
//! [`FigureSettings`] holds everything about a figure that is not item data:
//! the range, scale and label of each of the four axes, the title, legend
//! configuration, the highlighted span and the custom style selection.
//!
//! Settings are addressed by their hyphen-case project-file names
//! (`min-bottom`, `left-scale`, `legend-position`, ...) so that history
//! records and project dictionaries can carry them as JSON values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::FigurePreferences;
use crate::error::{GraphsError, Result};
use crate::scales::Scale;

/// Axis limits in project order:
/// `min-bottom, max-bottom, min-top, max-top, min-left, max-left, min-right, max-right`
pub type Limits = [f64; 8];

/// Names of the eight limit properties, in [`Limits`] order
pub const LIMIT_NAMES: [&str; 8] = [
    "min-bottom",
    "max-bottom",
    "min-top",
    "max-top",
    "min-left",
    "max-left",
    "min-right",
    "max-right",
];

/// Every figure property name
pub const FIGURE_PROPERTIES: &[&str] = &[
    "min-bottom",
    "max-bottom",
    "min-top",
    "max-top",
    "min-left",
    "max-left",
    "min-right",
    "max-right",
    "bottom-scale",
    "left-scale",
    "top-scale",
    "right-scale",
    "bottom-label",
    "left-label",
    "top-label",
    "right-label",
    "title",
    "legend",
    "legend-position",
    "hide-unselected",
    "min-selected",
    "max-selected",
    "use-custom-style",
    "custom-style",
];

/// One of the four figure axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Bottom,
    Left,
    Top,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Bottom,
        Direction::Left,
        Direction::Top,
        Direction::Right,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Direction::Bottom => "bottom",
            Direction::Left => "left",
            Direction::Top => "top",
            Direction::Right => "right",
        }
    }

    pub fn from_name(name: &str) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.name() == name)
    }

    /// Whether this is a horizontal axis
    pub fn is_x(self) -> bool {
        matches!(self, Direction::Bottom | Direction::Top)
    }

    /// The axis on the other side of the plot
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Bottom => Direction::Top,
            Direction::Top => Direction::Bottom,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// The x axis selected by an item's `xposition`
    pub fn from_xposition(position: u8) -> Direction {
        if position == 0 {
            Direction::Bottom
        } else {
            Direction::Top
        }
    }

    /// The y axis selected by an item's `yposition`
    pub fn from_yposition(position: u8) -> Direction {
        if position == 0 {
            Direction::Left
        } else {
            Direction::Right
        }
    }

    /// Item position value that targets this axis
    pub fn position(self) -> u8 {
        match self {
            Direction::Bottom | Direction::Left => 0,
            Direction::Top | Direction::Right => 1,
        }
    }

    /// Indices of `(min, max)` in [`Limits`]
    fn limit_indices(self) -> (usize, usize) {
        match self {
            Direction::Bottom => (0, 1),
            Direction::Top => (2, 3),
            Direction::Left => (4, 5),
            Direction::Right => (6, 7),
        }
    }

    fn index(self) -> usize {
        match self {
            Direction::Bottom => 0,
            Direction::Left => 1,
            Direction::Top => 2,
            Direction::Right => 3,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Legend placement, stored by integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum LegendPosition {
    #[default]
    Best,
    UpperRight,
    UpperLeft,
    LowerLeft,
    LowerRight,
    Right,
    CenterLeft,
    CenterRight,
    LowerCenter,
    UpperCenter,
    Center,
}

impl LegendPosition {
    const ALL: [LegendPosition; 11] = [
        LegendPosition::Best,
        LegendPosition::UpperRight,
        LegendPosition::UpperLeft,
        LegendPosition::LowerLeft,
        LegendPosition::LowerRight,
        LegendPosition::Right,
        LegendPosition::CenterLeft,
        LegendPosition::CenterRight,
        LegendPosition::LowerCenter,
        LegendPosition::UpperCenter,
        LegendPosition::Center,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<LegendPosition> {
        LegendPosition::ALL.get(code as usize).copied()
    }
}

impl From<LegendPosition> for u8 {
    fn from(position: LegendPosition) -> u8 {
        position.code()
    }
}

impl TryFrom<u8> for LegendPosition {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        LegendPosition::from_code(code).ok_or_else(|| format!("unknown legend position {}", code))
    }
}

/// Range, scale and label of one axis
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
    pub scale: Scale,
    pub label: String,
}

/// Per-project figure configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FigureSettings {
    axes: [Axis; 4],
    pub title: String,
    pub legend: bool,
    pub legend_position: LegendPosition,
    pub hide_unselected: bool,
    pub min_selected: f64,
    pub max_selected: f64,
    pub use_custom_style: bool,
    pub custom_style: String,
}

impl Default for FigureSettings {
    fn default() -> Self {
        Self::from_preferences(&FigurePreferences::default())
    }
}

impl FigureSettings {
    /// Settings for a new project
    pub fn from_preferences(prefs: &FigurePreferences) -> Self {
        let axis = |max: f64, scale: Scale, label: &str| Axis {
            min: 0.0,
            max,
            scale,
            label: label.to_string(),
        };
        Self {
            axes: [
                axis(1.0, prefs.bottom_scale, &prefs.bottom_label),
                axis(10.0, prefs.left_scale, &prefs.left_label),
                axis(1.0, prefs.top_scale, &prefs.top_label),
                axis(10.0, prefs.right_scale, &prefs.right_label),
            ],
            title: prefs.title.clone(),
            legend: prefs.legend,
            legend_position: prefs.legend_position,
            hide_unselected: prefs.hide_unselected,
            min_selected: 0.0,
            max_selected: 0.0,
            use_custom_style: prefs.use_custom_style,
            custom_style: prefs.custom_style.clone(),
        }
    }

    pub fn axis(&self, direction: Direction) -> &Axis {
        &self.axes[direction.index()]
    }

    pub fn scale(&self, direction: Direction) -> Scale {
        self.axis(direction).scale
    }

    pub fn label(&self, direction: Direction) -> &str {
        &self.axis(direction).label
    }

    /// Current limits as an eight-tuple
    pub fn limits(&self) -> Limits {
        let mut limits = [0.0; 8];
        for direction in Direction::ALL {
            let (lo, hi) = direction.limit_indices();
            let axis = self.axis(direction);
            limits[lo] = axis.min;
            limits[hi] = axis.max;
        }
        limits
    }

    /// Overwrite all eight limits
    pub fn set_limits(&mut self, limits: &Limits) {
        for direction in Direction::ALL {
            let (lo, hi) = direction.limit_indices();
            let axis = &mut self.axes[direction.index()];
            axis.min = limits[lo];
            axis.max = limits[hi];
        }
    }

    /// Set the range of one axis without validation
    pub fn set_range(&mut self, direction: Direction, min: f64, max: f64) {
        let axis = &mut self.axes[direction.index()];
        axis.min = min;
        axis.max = max;
    }

    pub fn get_property(&self, name: &str) -> Option<Value> {
        if let Some(index) = LIMIT_NAMES.iter().position(|n| *n == name) {
            return Some(Value::from(self.limits()[index]));
        }
        if let Some((direction, field)) = axis_property(name) {
            let axis = self.axis(direction);
            return Some(match field {
                AxisField::Scale => Value::from(axis.scale.code()),
                AxisField::Label => Value::from(axis.label.clone()),
            });
        }
        Some(match name {
            "title" => Value::from(self.title.clone()),
            "legend" => Value::Bool(self.legend),
            "legend-position" => Value::from(self.legend_position.code()),
            "hide-unselected" => Value::Bool(self.hide_unselected),
            "min-selected" => Value::from(self.min_selected),
            "max-selected" => Value::from(self.max_selected),
            "use-custom-style" => Value::Bool(self.use_custom_style),
            "custom-style" => Value::from(self.custom_style.clone()),
            _ => return None,
        })
    }

    /// Set a property, rejecting values that break figure invariants
    ///
    /// Log axes must keep `min < max`, and the highlighted span must stay
    /// inside `[0, 1]` with `min-selected <= max-selected`.
    pub fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
        let mut updated = self.clone();
        updated.set_property_raw(name, value)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a property by type only, without cross-field checks
    pub fn set_property_raw(&mut self, name: &str, value: &Value) -> Result<()> {
        if let Some(index) = LIMIT_NAMES.iter().position(|n| *n == name) {
            let v = value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(name, "expected a finite number"))?;
            let mut limits = self.limits();
            limits[index] = v;
            self.set_limits(&limits);
            return Ok(());
        }
        if let Some((direction, field)) = axis_property(name) {
            let axis = &mut self.axes[direction.index()];
            match field {
                AxisField::Scale => {
                    axis.scale = value
                        .as_i64()
                        .and_then(Scale::from_code)
                        .ok_or_else(|| invalid(name, "expected a scale code"))?
                }
                AxisField::Label => axis.label = string(name, value)?,
            }
            return Ok(());
        }
        match name {
            "title" => self.title = string(name, value)?,
            "legend" => self.legend = boolean(name, value)?,
            "legend-position" => {
                self.legend_position = value
                    .as_u64()
                    .and_then(|c| u8::try_from(c).ok())
                    .and_then(LegendPosition::from_code)
                    .ok_or_else(|| invalid(name, "expected a legend position code"))?
            }
            "hide-unselected" => self.hide_unselected = boolean(name, value)?,
            "min-selected" => self.min_selected = fraction(name, value)?,
            "max-selected" => self.max_selected = fraction(name, value)?,
            "use-custom-style" => self.use_custom_style = boolean(name, value)?,
            "custom-style" => self.custom_style = string(name, value)?,
            _ => return Err(GraphsError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for direction in Direction::ALL {
            let axis = self.axis(direction);
            if axis.scale == Scale::Log && axis.min >= axis.max {
                return Err(GraphsError::Validation(format!(
                    "The {} axis is logarithmic and cannot be inverted",
                    direction
                )));
            }
        }
        if self.min_selected > self.max_selected {
            return Err(GraphsError::Validation(
                "The highlighted span must start before it ends".to_string(),
            ));
        }
        Ok(())
    }

    /// Hyphen-case dictionary of every property
    pub fn to_dict(&self) -> Map<String, Value> {
        FIGURE_PROPERTIES
            .iter()
            .filter_map(|name| self.get_property(name).map(|v| (name.to_string(), v)))
            .collect()
    }

    /// Read settings from a project dictionary, defaulting missing keys
    pub fn from_dict(dict: &Map<String, Value>) -> Result<Self> {
        let mut settings = FigureSettings::default();
        for (key, value) in dict {
            match settings.set_property_raw(key, value) {
                Ok(()) => {}
                Err(GraphsError::UnknownProperty(_)) => {
                    warn!("Ignoring unknown figure setting '{}'", key)
                }
                Err(e) => {
                    return Err(GraphsError::ProjectParse(format!(
                        "figure setting '{}': {}",
                        key, e
                    )))
                }
            }
        }
        Ok(settings)
    }
}

enum AxisField {
    Scale,
    Label,
}

fn axis_property(name: &str) -> Option<(Direction, AxisField)> {
    let (direction, field) = name.split_once('-')?;
    let direction = Direction::from_name(direction)?;
    match field {
        "scale" => Some((direction, AxisField::Scale)),
        "label" => Some((direction, AxisField::Label)),
        _ => None,
    }
}

fn invalid(name: &str, what: &str) -> GraphsError {
    GraphsError::Validation(format!("Invalid value for '{}': {}", name, what))
}

fn string(name: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(name, "expected a string"))
}

fn boolean(name: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| invalid(name, "expected a boolean"))
}

fn fraction(name: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .filter(|v| (0.0..=1.0).contains(v))
        .ok_or_else(|| invalid(name, "expected a number within [0, 1]"))
}
