//! Delimited text columns

use regex::Regex;
use serde_json::{json, Map, Value};
use std::fs;

use super::{ImportSettings, Parser};
use crate::error::{GraphsError, Result};
use crate::item::Item;
use crate::style::StyleParams;

/// Column delimiter choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Whitespace,
    Tab,
    Colon,
    Semicolon,
    Comma,
    Period,
    Custom,
}

impl Delimiter {
    pub fn from_name(name: &str) -> Option<Delimiter> {
        Some(match name {
            "whitespace" => Delimiter::Whitespace,
            "tab" => Delimiter::Tab,
            "colon" => Delimiter::Colon,
            "semicolon" => Delimiter::Semicolon,
            "comma" => Delimiter::Comma,
            "period" => Delimiter::Period,
            "custom" => Delimiter::Custom,
            _ => return None,
        })
    }

    fn pattern(self, custom: &str) -> String {
        match self {
            Delimiter::Whitespace => r"\s+".to_string(),
            Delimiter::Tab => r"\t".to_string(),
            Delimiter::Colon => ":".to_string(),
            Delimiter::Semicolon => ";".to_string(),
            Delimiter::Comma => ",".to_string(),
            Delimiter::Period => r"\.".to_string(),
            Delimiter::Custom => custom.to_string(),
        }
    }
}

/// Options of a columns import
#[derive(Debug, Clone)]
pub struct ColumnsOptions {
    pub delimiter: Delimiter,
    pub custom_delimiter: String,
    /// Decimal separator, `.` or `,`
    pub separator: String,
    pub column_x: usize,
    pub column_y: usize,
    pub skip_rows: usize,
}

impl Default for ColumnsOptions {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Whitespace,
            custom_delimiter: String::new(),
            separator: ".".to_string(),
            column_x: 0,
            column_y: 1,
            skip_rows: 0,
        }
    }
}

impl ColumnsOptions {
    fn from_settings(settings: &ImportSettings) -> Result<Self> {
        let delimiter_name = settings.get_str("delimiter", "whitespace");
        let delimiter = Delimiter::from_name(delimiter_name)
            .ok_or_else(|| GraphsError::Parse(format!("Unknown delimiter '{}'", delimiter_name)))?;
        Ok(Self {
            delimiter,
            custom_delimiter: settings.get_str("custom-delimiter", "").to_string(),
            separator: settings.get_str("separator", ".").to_string(),
            column_x: settings.get_usize("column-x", 0),
            column_y: settings.get_usize("column-y", 1),
            skip_rows: settings.get_usize("skip-rows", 0),
        })
    }
}

/// Parsed columns with labels taken from the header, if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    pub xdata: Vec<f64>,
    pub ydata: Vec<f64>,
    pub xlabel: String,
    pub ylabel: String,
}

/// Swap `,` and `.` so European decimals parse
fn swap_separators(line: &str) -> String {
    line.replace(',', "\u{0}")
        .replace('.', ",")
        .replace('\u{0}', ".")
}

/// Parse text content into two columns
pub fn parse_columns(content: &str, options: &ColumnsOptions) -> Result<Columns> {
    let pattern = options.delimiter.pattern(&options.custom_delimiter);
    let splitter = Regex::new(&pattern)
        .map_err(|e| GraphsError::Parse(format!("Invalid delimiter '{}': {}", pattern, e)))?;

    let mut columns = Columns::default();
    let mut header: Option<Vec<String>> = None;
    let mut started = false;

    for (index, raw) in content.lines().enumerate().skip(options.skip_rows) {
        let line = if options.separator == "," {
            swap_separators(raw.trim())
        } else {
            raw.trim().to_string()
        };
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = splitter
            .split(&line)
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        let values: Option<Vec<f64>> = fields.iter().map(|f| f.parse::<f64>().ok()).collect();

        match values {
            Some(values) if values.len() == 1 => {
                columns.xdata.push(columns.ydata.len() as f64);
                columns.ydata.push(values[0]);
                started = true;
            }
            Some(values) if !values.is_empty() => {
                let x = values.get(options.column_x);
                let y = values.get(options.column_y);
                match (x, y) {
                    (Some(x), Some(y)) => {
                        columns.xdata.push(*x);
                        columns.ydata.push(*y);
                        started = true;
                    }
                    _ => {
                        return Err(GraphsError::Parse(format!(
                            "Can't import from file, missing column on line {}",
                            index + 1
                        )))
                    }
                }
            }
            _ if started => {
                return Err(GraphsError::Parse(format!(
                    "Can't import from file, bad value on line {}",
                    index + 1
                )))
            }
            _ => header = Some(fields.iter().map(|f| f.to_string()).collect()),
        }
    }

    if columns.xdata.is_empty() {
        return Err(GraphsError::Parse("Unable to import from file".to_string()));
    }
    if let Some(header) = header {
        if header.len() == 1 {
            columns.ylabel = header[0].clone();
        } else {
            columns.xlabel = header.get(options.column_x).cloned().unwrap_or_default();
            columns.ylabel = header.get(options.column_y).cloned().unwrap_or_default();
        }
    }
    Ok(columns)
}

pub struct ColumnsParser;

impl Parser for ColumnsParser {
    fn id(&self) -> &'static str {
        "columns"
    }

    fn display_name(&self) -> &'static str {
        "Columns"
    }

    fn file_suffixes(&self) -> &'static [&'static str] {
        &["txt", "csv", "dat", "tsv"]
    }

    fn default_options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        options.insert("delimiter".into(), json!("whitespace"));
        options.insert("custom-delimiter".into(), json!(""));
        options.insert("separator".into(), json!("."));
        options.insert("column-x".into(), json!(0));
        options.insert("column-y".into(), json!(1));
        options.insert("skip-rows".into(), json!(0));
        options
    }

    fn parse(&self, settings: &ImportSettings, style: &StyleParams) -> Result<Vec<Item>> {
        let options = ColumnsOptions::from_settings(settings)?;
        let content = fs::read_to_string(&settings.path)?;
        let columns = parse_columns(&content, &options)?;
        let item = Item::data(&settings.file_stem(), columns.xdata, columns.ydata, style)
            .with_labels(&columns.xlabel, &columns.ylabel);
        Ok(vec![item])
    }
}
