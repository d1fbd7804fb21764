//! Per-variant item attributes and their property tables

use serde_json::Value;

use crate::error::{GraphsError, Result};
use crate::expression::{parse_number, Environment, Equation};
use crate::scales::{self, Scale};
use crate::style::StyleParams;

// ---- Value conversion helpers ----

/// Encode floats, writing non-finite values as `null`
pub(crate) fn floats_to_value(values: &[f64]) -> Value {
    Value::Array(
        values
            .iter()
            .map(|v| {
                serde_json::Number::from_f64(*v)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            })
            .collect(),
    )
}

/// Decode floats, reading `null` as NaN
pub(crate) fn value_to_floats(name: &str, value: &Value) -> Result<Vec<f64>> {
    let array = value
        .as_array()
        .ok_or_else(|| invalid(name, "expected an array of numbers"))?;
    array
        .iter()
        .map(|v| match v {
            Value::Null => Ok(f64::NAN),
            v => v
                .as_f64()
                .ok_or_else(|| invalid(name, "expected an array of numbers")),
        })
        .collect()
}

pub(crate) fn optional_floats_to_value(values: &Option<Vec<f64>>) -> Value {
    values.as_deref().map(floats_to_value).unwrap_or(Value::Null)
}

pub(crate) fn value_to_optional_floats(name: &str, value: &Value) -> Result<Option<Vec<f64>>> {
    match value {
        Value::Null => Ok(None),
        v => value_to_floats(name, v).map(Some),
    }
}

pub(crate) fn value_to_f64(name: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| invalid(name, "expected a number"))
}

pub(crate) fn value_to_non_negative(name: &str, value: &Value) -> Result<f64> {
    let v = value_to_f64(name, value)?;
    if v < 0.0 {
        return Err(GraphsError::Validation(format!(
            "'{}' must not be negative, got {}",
            name, v
        )));
    }
    Ok(v)
}

pub(crate) fn value_to_string(name: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(name, "expected a string"))
}

pub(crate) fn value_to_bool(name: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| invalid(name, "expected a boolean"))
}

pub(crate) fn invalid(name: &str, what: &str) -> GraphsError {
    GraphsError::Validation(format!("Invalid value for '{}': {}", name, what))
}

fn style_string(style: &StyleParams, key: &str, fallback: &str) -> String {
    style.get(key).unwrap_or(fallback).to_string()
}

fn style_f64(style: &StyleParams, key: &str, fallback: f64) -> f64 {
    style.get_f64(key).unwrap_or(fallback)
}

// ---- DataItem ----

/// Measured x/y data with optional error bars
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub xdata: Vec<f64>,
    pub ydata: Vec<f64>,
    pub xerr: Option<Vec<f64>>,
    pub yerr: Option<Vec<f64>>,
    pub showxerr: bool,
    pub showyerr: bool,
    pub linestyle: String,
    pub linewidth: f64,
    pub markerstyle: String,
    pub markersize: f64,
}

impl DataItem {
    pub const PROPERTIES: &'static [&'static str] = &[
        "xdata",
        "ydata",
        "xerr",
        "yerr",
        "showxerr",
        "showyerr",
        "linestyle",
        "linewidth",
        "markerstyle",
        "markersize",
    ];

    pub const STYLE_KEYS: &'static [(&'static str, &'static str)] = &[
        ("linestyle", "lines.linestyle"),
        ("linewidth", "lines.linewidth"),
        ("markerstyle", "lines.marker"),
        ("markersize", "lines.markersize"),
    ];

    pub fn new(xdata: Vec<f64>, ydata: Vec<f64>, style: &StyleParams) -> Self {
        Self {
            xdata,
            ydata,
            xerr: None,
            yerr: None,
            showxerr: false,
            showyerr: false,
            linestyle: style_string(style, "lines.linestyle", "-"),
            linewidth: style_f64(style, "lines.linewidth", 1.5),
            markerstyle: style_string(style, "lines.marker", "None"),
            markersize: style_f64(style, "lines.markersize", 6.0),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        Some(match name {
            "xdata" => floats_to_value(&self.xdata),
            "ydata" => floats_to_value(&self.ydata),
            "xerr" => optional_floats_to_value(&self.xerr),
            "yerr" => optional_floats_to_value(&self.yerr),
            "showxerr" => Value::Bool(self.showxerr),
            "showyerr" => Value::Bool(self.showyerr),
            "linestyle" => Value::from(self.linestyle.clone()),
            "linewidth" => Value::from(self.linewidth),
            "markerstyle" => Value::from(self.markerstyle.clone()),
            "markersize" => Value::from(self.markersize),
            _ => return None,
        })
    }

    /// Returns `Ok(false)` for names this variant does not have
    pub(crate) fn set(&mut self, name: &str, value: &Value) -> Result<bool> {
        match name {
            "xdata" => self.xdata = value_to_floats(name, value)?,
            "ydata" => self.ydata = value_to_floats(name, value)?,
            "xerr" => self.xerr = value_to_optional_floats(name, value)?,
            "yerr" => self.yerr = value_to_optional_floats(name, value)?,
            "showxerr" => self.showxerr = value_to_bool(name, value)?,
            "showyerr" => self.showyerr = value_to_bool(name, value)?,
            "linestyle" => self.linestyle = value_to_string(name, value)?,
            "linewidth" => self.linewidth = value_to_non_negative(name, value)?,
            "markerstyle" => self.markerstyle = value_to_string(name, value)?,
            "markersize" => self.markersize = value_to_non_negative(name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Check the length invariants between data and error arrays
    pub fn validate(&self) -> Result<()> {
        if self.xdata.len() != self.ydata.len() {
            return Err(GraphsError::Validation(format!(
                "xdata has {} values but ydata has {}",
                self.xdata.len(),
                self.ydata.len()
            )));
        }
        for (label, err) in [("xerr", &self.xerr), ("yerr", &self.yerr)] {
            if let Some(err) = err {
                if err.len() != self.xdata.len() {
                    return Err(GraphsError::Validation(format!(
                        "{} has {} values but the data has {}",
                        label,
                        err.len(),
                        self.xdata.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---- GeneratedDataItem ----

/// Data sampled from an equation over `[xstart, xstop]`
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDataItem {
    pub data: DataItem,
    pub equation: String,
    pub xstart: String,
    pub xstop: String,
    pub steps: usize,
    pub scale: Scale,
}

impl GeneratedDataItem {
    pub const GENERATOR_PROPERTIES: &'static [&'static str] =
        &["equation", "xstart", "xstop", "steps", "scale"];

    pub fn new(
        equation: &str,
        xstart: &str,
        xstop: &str,
        steps: usize,
        scale: Scale,
        style: &StyleParams,
    ) -> Result<Self> {
        let mut item = Self {
            data: DataItem::new(Vec::new(), Vec::new(), style),
            equation: equation.to_string(),
            xstart: xstart.to_string(),
            xstop: xstop.to_string(),
            steps,
            scale,
        };
        let (x, y) = item.generate()?;
        item.data.xdata = x;
        item.data.ydata = y;
        Ok(item)
    }

    /// Sample the equation with the current generator settings
    pub fn generate(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        let start = parse_number(&self.xstart)?;
        let stop = parse_number(&self.xstop)?;
        if self.steps == 0 {
            return Err(GraphsError::Validation(
                "At least one step is required".to_string(),
            ));
        }
        let x = scales::sample(start, stop, self.steps, self.scale);
        let y = Equation::parse(&self.equation)?
            .evaluate_array(&Environment::new().with_x(&x))?;
        Ok((x, y))
    }

    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        Some(match name {
            "equation" => Value::from(self.equation.clone()),
            "xstart" => Value::from(self.xstart.clone()),
            "xstop" => Value::from(self.xstop.clone()),
            "steps" => Value::from(self.steps),
            "scale" => Value::from(self.scale.code()),
            _ => return self.data.get(name),
        })
    }

    /// Set a property without regenerating
    pub(crate) fn set_raw(&mut self, name: &str, value: &Value) -> Result<bool> {
        match name {
            "equation" => self.equation = value_to_string(name, value)?,
            "xstart" => self.xstart = value_to_string(name, value)?,
            "xstop" => self.xstop = value_to_string(name, value)?,
            "steps" => {
                self.steps = value
                    .as_u64()
                    .ok_or_else(|| invalid(name, "expected a positive integer"))?
                    as usize
            }
            "scale" => {
                self.scale = value
                    .as_i64()
                    .and_then(Scale::from_code)
                    .ok_or_else(|| invalid(name, "expected a scale code"))?
            }
            _ => return self.data.set(name, value),
        }
        Ok(true)
    }
}

// ---- EquationItem ----

/// An analytic curve drawn over the visible x range
#[derive(Debug, Clone, PartialEq)]
pub struct EquationItem {
    pub equation: String,
    pub linestyle: String,
    pub linewidth: f64,
}

impl EquationItem {
    pub const PROPERTIES: &'static [&'static str] = &["equation", "linestyle", "linewidth"];

    pub const STYLE_KEYS: &'static [(&'static str, &'static str)] = &[
        ("linestyle", "lines.linestyle"),
        ("linewidth", "lines.linewidth"),
    ];

    pub fn new(equation: &str, style: &StyleParams) -> Self {
        Self {
            equation: equation.to_string(),
            linestyle: style_string(style, "lines.linestyle", "-"),
            linewidth: style_f64(style, "lines.linewidth", 1.5),
        }
    }

    /// Sample the equation at `xdata`
    pub fn evaluate(&self, xdata: &[f64]) -> Result<Vec<f64>> {
        Equation::parse(&self.equation)?.evaluate_array(&Environment::new().with_x(xdata))
    }

    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        Some(match name {
            "equation" => Value::from(self.equation.clone()),
            "linestyle" => Value::from(self.linestyle.clone()),
            "linewidth" => Value::from(self.linewidth),
            _ => return None,
        })
    }

    pub(crate) fn set(&mut self, name: &str, value: &Value) -> Result<bool> {
        match name {
            "equation" => self.equation = value_to_string(name, value)?,
            "linestyle" => self.linestyle = value_to_string(name, value)?,
            "linewidth" => self.linewidth = value_to_non_negative(name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

// ---- TextItem ----

/// A text annotation anchored in data coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub xanchor: f64,
    pub yanchor: f64,
    pub text: String,
    pub size: f64,
    pub rotation: f64,
}

impl TextItem {
    pub const PROPERTIES: &'static [&'static str] =
        &["xanchor", "yanchor", "text", "size", "rotation"];

    pub const STYLE_KEYS: &'static [(&'static str, &'static str)] =
        &[("size", "font.size"), ("color", "text.color")];

    pub fn new(xanchor: f64, yanchor: f64, text: &str, style: &StyleParams) -> Self {
        Self {
            xanchor,
            yanchor,
            text: text.to_string(),
            size: style_f64(style, "font.size", 10.0),
            rotation: 0.0,
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        Some(match name {
            "xanchor" => Value::from(self.xanchor),
            "yanchor" => Value::from(self.yanchor),
            "text" => Value::from(self.text.clone()),
            "size" => Value::from(self.size),
            "rotation" => Value::from(self.rotation),
            _ => return None,
        })
    }

    pub(crate) fn set(&mut self, name: &str, value: &Value) -> Result<bool> {
        match name {
            "xanchor" => self.xanchor = value_to_f64(name, value)?,
            "yanchor" => self.yanchor = value_to_f64(name, value)?,
            "text" => self.text = value_to_string(name, value)?,
            "size" => self.size = value_to_non_negative(name, value)?,
            "rotation" => self.rotation = value_to_f64(name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

// ---- FillItem ----

/// A band between a lower and an upper curve
#[derive(Debug, Clone, PartialEq)]
pub struct FillItem {
    pub xdata: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl FillItem {
    pub const PROPERTIES: &'static [&'static str] = &["data"];

    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        match name {
            "data" => Some(Value::Array(vec![
                floats_to_value(&self.xdata),
                floats_to_value(&self.lower),
                floats_to_value(&self.upper),
            ])),
            _ => None,
        }
    }

    pub(crate) fn set(&mut self, name: &str, value: &Value) -> Result<bool> {
        if name != "data" {
            return Ok(false);
        }
        let parts = value
            .as_array()
            .filter(|parts| parts.len() == 3)
            .ok_or_else(|| invalid(name, "expected [xdata, lower, upper]"))?;
        let xdata = value_to_floats(name, &parts[0])?;
        let lower = value_to_floats(name, &parts[1])?;
        let upper = value_to_floats(name, &parts[2])?;
        if lower.len() != xdata.len() || upper.len() != xdata.len() {
            return Err(invalid(name, "xdata, lower and upper differ in length"));
        }
        self.xdata = xdata;
        self.lower = lower;
        self.upper = upper;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nan_roundtrips_through_null() {
        let value = floats_to_value(&[1.0, f64::NAN]);
        assert_eq!(value, json!([1.0, null]));
        let back = value_to_floats("xdata", &value).unwrap();
        assert_eq!(back[0], 1.0);
        assert!(back[1].is_nan());
    }

    #[test]
    fn test_negative_linewidth_rejected() {
        let mut item = DataItem::new(vec![], vec![], &StyleParams::default());
        let err = item.set("linewidth", &json!(-1.0)).unwrap_err();
        assert!(matches!(err, GraphsError::Validation(_)));
        assert_eq!(item.linewidth, 1.5);
    }

    #[test]
    fn test_generate_samples_equation() {
        let item = GeneratedDataItem::new("x^2", "0", "2", 3, Scale::Linear, &StyleParams::default())
            .unwrap();
        assert_eq!(item.data.xdata, vec![0.0, 1.0, 2.0]);
        assert_eq!(item.data.ydata, vec![0.0, 1.0, 4.0]);
    }

    #[test]
    fn test_generate_rejects_bad_bounds() {
        let err = GeneratedDataItem::new("x", "a", "2", 3, Scale::Linear, &StyleParams::default())
            .unwrap_err();
        assert!(matches!(err, GraphsError::InvalidNumber(_)));
    }

    #[test]
    fn test_fill_requires_equal_lengths() {
        let mut fill = FillItem {
            xdata: vec![],
            lower: vec![],
            upper: vec![],
        };
        assert!(fill.set("data", &json!([[0.0, 1.0], [0.0], [1.0, 2.0]])).is_err());
        assert!(fill.set("data", &json!([[0.0], [0.0], [1.0]])).unwrap());
        assert_eq!(fill.upper, vec![1.0]);
    }
}
