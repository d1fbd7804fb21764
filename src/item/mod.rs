//! Plot items
//!
//! An [`Item`] is one plottable element of a project. All variants share a
//! uuid, a name, color, alpha, selection state, the axes they are drawn on and
//! their axis labels. Variant-specific attributes live in [`ItemKind`].
//!
//! Items are addressed by property name through [`Item::get_property`] and
//! [`Item::set_property`]; change records in the history carry those names
//! together with JSON values. The project file stores items as flat
//! dictionaries produced by [`Item::to_dict`].

pub mod variants;

use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

use crate::error::{GraphsError, Result};
use crate::scales::Scale;
use crate::style::StyleParams;
pub use variants::{DataItem, EquationItem, FillItem, GeneratedDataItem, TextItem};
use variants::{invalid, value_to_bool, value_to_string};

/// Property names shared by every item type
pub const COMMON_PROPERTIES: &[&str] = &[
    "name",
    "color",
    "alpha",
    "selected",
    "xposition",
    "yposition",
    "xlabel",
    "ylabel",
];

/// Type tag stored under `type` in item dictionaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Data,
    GeneratedData,
    Equation,
    Text,
    Fill,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Data => "DataItem",
            ItemType::GeneratedData => "GeneratedDataItem",
            ItemType::Equation => "EquationItem",
            ItemType::Text => "TextItem",
            ItemType::Fill => "FillItem",
        }
    }

    pub fn parse(name: &str) -> Option<ItemType> {
        Some(match name {
            "DataItem" => ItemType::Data,
            "GeneratedDataItem" => ItemType::GeneratedData,
            "EquationItem" => ItemType::Equation,
            "TextItem" => ItemType::Text,
            "FillItem" => ItemType::Fill,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific item data
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Data(DataItem),
    GeneratedData(GeneratedDataItem),
    Equation(EquationItem),
    Text(TextItem),
    Fill(FillItem),
}

/// A single plottable element
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub uuid: Uuid,
    pub name: String,
    pub color: String,
    pub alpha: f64,
    pub selected: bool,
    /// 0 for the bottom axis, 1 for the top axis
    pub xposition: u8,
    /// 0 for the left axis, 1 for the right axis
    pub yposition: u8,
    pub xlabel: String,
    pub ylabel: String,
    pub kind: ItemKind,
}

impl Item {
    fn with_kind(name: &str, kind: ItemKind) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            color: String::new(),
            alpha: 1.0,
            selected: true,
            xposition: 0,
            yposition: 0,
            xlabel: String::new(),
            ylabel: String::new(),
            kind,
        }
    }

    /// A dataset styled from `style`
    pub fn data(name: &str, xdata: Vec<f64>, ydata: Vec<f64>, style: &StyleParams) -> Self {
        Self::with_kind(name, ItemKind::Data(DataItem::new(xdata, ydata, style)))
    }

    /// A dataset sampled from `equation`, named `Y = <equation>`
    pub fn generated(
        equation: &str,
        xstart: &str,
        xstop: &str,
        steps: usize,
        scale: Scale,
        style: &StyleParams,
    ) -> Result<Self> {
        let generated = GeneratedDataItem::new(equation, xstart, xstop, steps, scale, style)?;
        Ok(Self::with_kind(
            &equation_name(equation),
            ItemKind::GeneratedData(generated),
        ))
    }

    /// An equation drawn over the visible range, named `Y = <equation>`
    pub fn equation(equation: &str, style: &StyleParams) -> Result<Self> {
        crate::expression::Equation::parse(equation)?;
        Ok(Self::with_kind(
            &equation_name(equation),
            ItemKind::Equation(EquationItem::new(equation, style)),
        ))
    }

    pub fn text(name: &str, xanchor: f64, yanchor: f64, text: &str, style: &StyleParams) -> Self {
        let mut item = Self::with_kind(
            name,
            ItemKind::Text(TextItem::new(xanchor, yanchor, text, style)),
        );
        item.color = style.get("text.color").unwrap_or("#000000").to_string();
        item
    }

    pub fn fill(name: &str, xdata: Vec<f64>, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        let mut item = Self::with_kind(name, ItemKind::Fill(FillItem { xdata, lower, upper }));
        item.alpha = 0.5;
        item
    }

    /// Set axis labels, builder style
    pub fn with_labels(mut self, xlabel: &str, ylabel: &str) -> Self {
        self.xlabel = xlabel.to_string();
        self.ylabel = ylabel.to_string();
        self
    }

    pub fn item_type(&self) -> ItemType {
        match self.kind {
            ItemKind::Data(_) => ItemType::Data,
            ItemKind::GeneratedData(_) => ItemType::GeneratedData,
            ItemKind::Equation(_) => ItemType::Equation,
            ItemKind::Text(_) => ItemType::Text,
            ItemKind::Fill(_) => ItemType::Fill,
        }
    }

    /// Dataset view of data-like variants
    pub fn data_item(&self) -> Option<&DataItem> {
        match &self.kind {
            ItemKind::Data(d) => Some(d),
            ItemKind::GeneratedData(g) => Some(&g.data),
            _ => None,
        }
    }

    pub fn data_item_mut(&mut self) -> Option<&mut DataItem> {
        match &mut self.kind {
            ItemKind::Data(d) => Some(d),
            ItemKind::GeneratedData(g) => Some(&mut g.data),
            _ => None,
        }
    }

    pub fn is_data_like(&self) -> bool {
        self.data_item().is_some()
    }

    pub fn equation_item(&self) -> Option<&EquationItem> {
        match &self.kind {
            ItemKind::Equation(e) => Some(e),
            _ => None,
        }
    }

    pub fn xdata(&self) -> Option<&[f64]> {
        self.data_item().map(|d| d.xdata.as_slice())
    }

    pub fn ydata(&self) -> Option<&[f64]> {
        self.data_item().map(|d| d.ydata.as_slice())
    }

    /// Replace the data of a data-like item, checking lengths
    pub fn set_data(&mut self, xdata: Vec<f64>, ydata: Vec<f64>) -> Result<()> {
        if xdata.len() != ydata.len() {
            return Err(GraphsError::Validation(format!(
                "xdata has {} values but ydata has {}",
                xdata.len(),
                ydata.len()
            )));
        }
        let name = self.name.clone();
        let data = self.data_item_mut().ok_or_else(|| {
            GraphsError::Validation(format!("'{}' does not hold data", name))
        })?;
        data.xdata = xdata;
        data.ydata = ydata;
        Ok(())
    }

    /// All property names of this item, shared ones first
    pub fn property_names(&self) -> Vec<&'static str> {
        let specific: &[&'static str] = match self.kind {
            ItemKind::Data(_) => DataItem::PROPERTIES,
            ItemKind::GeneratedData(_) => {
                return COMMON_PROPERTIES
                    .iter()
                    .chain(DataItem::PROPERTIES)
                    .chain(GeneratedDataItem::GENERATOR_PROPERTIES)
                    .copied()
                    .collect()
            }
            ItemKind::Equation(_) => EquationItem::PROPERTIES,
            ItemKind::Text(_) => TextItem::PROPERTIES,
            ItemKind::Fill(_) => FillItem::PROPERTIES,
        };
        COMMON_PROPERTIES.iter().chain(specific).copied().collect()
    }

    pub fn get_property(&self, name: &str) -> Option<Value> {
        let common = match name {
            "name" => Some(Value::from(self.name.clone())),
            "color" => Some(Value::from(self.color.clone())),
            "alpha" => Some(Value::from(self.alpha)),
            "selected" => Some(Value::Bool(self.selected)),
            "xposition" => Some(Value::from(self.xposition)),
            "yposition" => Some(Value::from(self.yposition)),
            "xlabel" => Some(Value::from(self.xlabel.clone())),
            "ylabel" => Some(Value::from(self.ylabel.clone())),
            _ => None,
        };
        common.or_else(|| match &self.kind {
            ItemKind::Data(d) => d.get(name),
            ItemKind::GeneratedData(g) => g.get(name),
            ItemKind::Equation(e) => e.get(name),
            ItemKind::Text(t) => t.get(name),
            ItemKind::Fill(f) => f.get(name),
        })
    }

    /// Set a property with validation and derived updates
    ///
    /// Changing the equation or sampling of a generated item regenerates its
    /// data; changing an equation renames an item still called
    /// `Y = <old equation>`. On error the item is left unchanged.
    pub fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        let mut updated = self.clone();
        updated.set_property_raw(name, &value)?;

        match &mut updated.kind {
            ItemKind::GeneratedData(g) if GeneratedDataItem::GENERATOR_PROPERTIES.contains(&name) => {
                let (x, y) = g.generate()?;
                g.data.xdata = x;
                g.data.ydata = y;
            }
            ItemKind::Equation(e) if name == "equation" => {
                crate::expression::Equation::parse(&e.equation)?;
            }
            _ => {}
        }

        if name == "equation" {
            let renamed = match (self.equation_text(), updated.equation_text()) {
                (Some(old), Some(new)) if self.name == equation_name(old) => {
                    Some(equation_name(new))
                }
                _ => None,
            };
            if let Some(renamed) = renamed {
                updated.name = renamed;
            }
        }

        *self = updated;
        Ok(())
    }

    fn equation_text(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::GeneratedData(g) => Some(&g.equation),
            ItemKind::Equation(e) => Some(&e.equation),
            _ => None,
        }
    }

    /// Set a stored property verbatim, without derived updates
    pub fn set_property_raw(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "name" => self.name = value_to_string(name, value)?,
            "color" => self.color = value_to_string(name, value)?,
            "alpha" => {
                let alpha = variants::value_to_f64(name, value)?;
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(GraphsError::Validation(format!(
                        "alpha must be within [0, 1], got {}",
                        alpha
                    )));
                }
                self.alpha = alpha;
            }
            "selected" => self.selected = value_to_bool(name, value)?,
            "xposition" => self.xposition = position(name, value)?,
            "yposition" => self.yposition = position(name, value)?,
            "xlabel" => self.xlabel = value_to_string(name, value)?,
            "ylabel" => self.ylabel = value_to_string(name, value)?,
            _ => {
                let known = match &mut self.kind {
                    ItemKind::Data(d) => d.set(name, value)?,
                    ItemKind::GeneratedData(g) => g.set_raw(name, value)?,
                    ItemKind::Equation(e) => e.set(name, value)?,
                    ItemKind::Text(t) => t.set(name, value)?,
                    ItemKind::Fill(f) => f.set(name, value)?,
                };
                if !known {
                    return Err(GraphsError::UnknownProperty(name.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Style-derived attributes as `(property, style key)` pairs
    fn style_keys(&self) -> &'static [(&'static str, &'static str)] {
        match self.kind {
            ItemKind::Data(_) | ItemKind::GeneratedData(_) => DataItem::STYLE_KEYS,
            ItemKind::Equation(_) => EquationItem::STYLE_KEYS,
            ItemKind::Text(_) => TextItem::STYLE_KEYS,
            ItemKind::Fill(_) => &[],
        }
    }

    /// Re-derive style attributes still at their `old_style` values
    pub fn reset(&mut self, old_style: &StyleParams, new_style: &StyleParams) {
        for (property, key) in self.style_keys() {
            let (Some(current), Some(old), Some(new)) = (
                self.get_property(property),
                style_value(old_style, key, property),
                style_value(new_style, key, property),
            ) else {
                continue;
            };
            if values_equal(&current, &old) {
                if let Err(e) = self.set_property_raw(property, &new) {
                    warn!("Could not apply style value for '{}': {}", property, e);
                }
            }
        }
    }

    /// Flat dictionary with a `type` tag, excluding the uuid
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut dict = Map::new();
        dict.insert("type".into(), Value::from(self.item_type().as_str()));
        for name in self.property_names() {
            if let Some(value) = self.get_property(name) {
                dict.insert(name.to_string(), value);
            }
        }
        dict
    }

    /// Rebuild an item from [`Item::to_dict`] output with a fresh uuid
    pub fn from_dict(dict: &Map<String, Value>) -> Result<Item> {
        let type_name = dict
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphsError::ProjectParse("item without a type".to_string()))?;
        let item_type = ItemType::parse(type_name).ok_or_else(|| {
            GraphsError::ProjectParse(format!("unknown item type '{}'", type_name))
        })?;
        let mut item = Item::empty(item_type);
        for (key, value) in dict {
            if key == "type" || key == "uuid" {
                continue;
            }
            match item.set_property_raw(key, value) {
                Ok(()) => {}
                Err(GraphsError::UnknownProperty(_)) => {
                    warn!("Ignoring unknown {} property '{}'", type_name, key)
                }
                Err(e) => return Err(e.with_context(format!("{} '{}'", type_name, key))),
            }
        }
        if let Some(data) = item.data_item() {
            data.validate()?;
        }
        Ok(item)
    }

    /// Default-valued item of the given type
    pub fn empty(item_type: ItemType) -> Item {
        let style = StyleParams::default();
        let kind = match item_type {
            ItemType::Data => ItemKind::Data(DataItem::new(Vec::new(), Vec::new(), &style)),
            ItemType::GeneratedData => ItemKind::GeneratedData(GeneratedDataItem {
                data: DataItem::new(Vec::new(), Vec::new(), &style),
                equation: "x".to_string(),
                xstart: "0".to_string(),
                xstop: "10".to_string(),
                steps: 100,
                scale: Scale::Linear,
            }),
            ItemType::Equation => ItemKind::Equation(EquationItem::new("x", &style)),
            ItemType::Text => ItemKind::Text(TextItem::new(0.0, 0.0, "", &style)),
            ItemType::Fill => ItemKind::Fill(FillItem {
                xdata: Vec::new(),
                lower: Vec::new(),
                upper: Vec::new(),
            }),
        };
        Item::with_kind("", kind)
    }
}

fn position(name: &str, value: &Value) -> Result<u8> {
    match value.as_u64() {
        Some(p @ (0 | 1)) => Ok(p as u8),
        _ => Err(invalid(name, "expected 0 or 1")),
    }
}

/// Value a style would give `property`, typed like the property
fn style_value(style: &StyleParams, key: &str, property: &str) -> Option<Value> {
    let raw = style.get(key)?;
    match property {
        "linestyle" | "markerstyle" | "color" => Some(Value::from(raw)),
        _ => raw.parse::<f64>().ok().map(Value::from),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() <= 1e-9 * x.abs().max(y.abs()).max(1.0),
        _ => a == b,
    }
}

/// Default name of an item built from an equation
pub fn equation_name(equation: &str) -> String {
    format!("Y = {}", equation)
}

/// `name` if unused, otherwise `name (k)` with the smallest free `k >= 1`
pub fn dedup_name(name: &str, used: &HashSet<String>) -> String {
    if !used.contains(name) {
        return name.to_string();
    }
    (1..)
        .map(|k| format!("{} ({})", name, k))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}
