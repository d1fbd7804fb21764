//! ODS and Excel workbooks

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{json, Map, Value};

use super::{ImportSettings, Parser};
use crate::error::{GraphsError, Result};
use crate::expression::{Environment, Equation};
use crate::item::Item;
use crate::style::StyleParams;

/// Numeric value of a cell, `None` for text and empty cells
pub fn cell_value(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// One column as values plus the label found above the first value
pub fn read_column(rows: &[Vec<Data>], column: usize) -> (Vec<f64>, String) {
    let mut values = Vec::new();
    let mut label = String::new();
    for row in rows {
        let Some(cell) = row.get(column) else {
            continue;
        };
        match cell_value(cell) {
            Some(v) => values.push(v),
            None if values.is_empty() => {
                if let Some(text) = cell_text(cell) {
                    label = text;
                }
            }
            None => {}
        }
    }
    (values, label)
}

/// x values for a single column of `len` values
pub fn generate_x(expression: &str, len: usize) -> Result<Vec<f64>> {
    let env = Environment::new().with_n(len);
    Equation::parse(expression)?.evaluate_array(&env)
}

fn open_error(e: calamine::Error) -> GraphsError {
    GraphsError::Parse(format!("Unable to open spreadsheet: {}", e))
}

pub struct SpreadsheetParser;

impl Parser for SpreadsheetParser {
    fn id(&self) -> &'static str {
        "spreadsheet"
    }

    fn display_name(&self) -> &'static str {
        "Spreadsheet"
    }

    fn file_suffixes(&self) -> &'static [&'static str] {
        &["ods", "xlsx", "xls"]
    }

    fn default_options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        options.insert("column-x".into(), json!(0));
        options.insert("column-y".into(), json!(1));
        options.insert("x-expression".into(), json!("n"));
        options
    }

    fn init_settings(&self, settings: &mut ImportSettings) -> Result<()> {
        let workbook = open_workbook_auto(&settings.path).map_err(open_error)?;
        let sheets = workbook.sheet_names();
        let first = sheets
            .first()
            .cloned()
            .ok_or_else(|| GraphsError::Parse("Spreadsheet has no sheets".to_string()))?;
        settings.options.entry("sheet").or_insert(json!(first));
        settings.options.insert("sheets".into(), json!(sheets));
        Ok(())
    }

    fn parse(&self, settings: &ImportSettings, style: &StyleParams) -> Result<Vec<Item>> {
        let mut workbook = open_workbook_auto(&settings.path).map_err(open_error)?;
        let sheet = settings.get_str("sheet", "").to_string();
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| GraphsError::Parse(format!("Unable to read sheet '{}': {}", sheet, e)))?;
        let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();

        let column_y = settings.get_usize("column-y", 1);
        let (ydata, ylabel) = read_column(&rows, column_y);
        if ydata.is_empty() {
            return Err(GraphsError::Parse(format!(
                "No numeric values in column {} of '{}'",
                column_y + 1,
                sheet
            )));
        }

        // A negative x column selects single-column mode
        let column_x = settings.options.get("column-x").and_then(Value::as_i64).unwrap_or(0);
        let (xdata, xlabel) = if column_x < 0 {
            let expression = settings.get_str("x-expression", "n");
            (generate_x(expression, ydata.len())?, String::new())
        } else {
            read_column(&rows, column_x as usize)
        };
        if xdata.len() != ydata.len() {
            return Err(GraphsError::Parse(format!(
                "Columns of '{}' have different lengths",
                sheet
            )));
        }

        let name = if ylabel.is_empty() {
            settings.file_stem()
        } else {
            ylabel.clone()
        };
        Ok(vec![Item::data(&name, xdata, ydata, style).with_labels(&xlabel, &ylabel)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<Data>> {
        vec![
            vec![Data::String("time".into()), Data::String("signal".into())],
            vec![Data::Float(0.0), Data::Int(4)],
            vec![Data::Float(0.5), Data::String("5.5".into())],
            vec![Data::Float(1.0), Data::Empty],
        ]
    }

    #[test]
    fn test_read_column_with_label() {
        let (values, label) = read_column(&rows(), 1);
        assert_eq!(values, vec![4.0, 5.5]);
        assert_eq!(label, "signal");
        let (values, label) = read_column(&rows(), 0);
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
        assert_eq!(label, "time");
    }

    #[test]
    fn test_generate_x_over_index() {
        assert_eq!(generate_x("2*n + 1", 3).unwrap(), vec![1.0, 3.0, 5.0]);
        assert!(generate_x("n +", 3).is_err());
    }

    #[test]
    fn test_broken_archive_fails_init() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"not a zip").unwrap();
        let result = ImportSettings::with_parser(file.path(), "spreadsheet", Map::new());
        assert!(result.is_err());
    }
}
