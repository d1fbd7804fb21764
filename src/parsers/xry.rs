//! Leybold XRY measurement files
//!
//! Fixed line layout:
//!
//! - line 1: `XR01`
//! - line 5: scan parameters, field 1 is the first angle, field 4 the step
//! - line 17: `<item count> <value count>`
//! - from line 19: `value count` rows with one column per item
//! - then the number of text annotations followed by one `x y label` row
//!   per annotation

use std::fs;

use super::{ImportSettings, Parser};
use crate::error::{GraphsError, Result};
use crate::item::Item;
use crate::style::StyleParams;

const HEADER: &str = "XR01";
const PARAMS_LINE: usize = 4;
const COUNTS_LINE: usize = 16;
const DATA_START: usize = 18;

fn invalid(line: usize) -> GraphsError {
    GraphsError::Parse(format!("Invalid xry file, unexpected content on line {}", line + 1))
}

fn field<T: std::str::FromStr>(lines: &[&str], line: usize, index: usize) -> Result<T> {
    lines
        .get(line)
        .and_then(|l| l.split_whitespace().nth(index))
        .and_then(|f| f.parse::<T>().ok())
        .ok_or_else(|| invalid(line))
}

/// Parse xry content into datasets and text annotations
pub fn parse_xry(content: &str, name: &str, style: &StyleParams) -> Result<Vec<Item>> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.first().map(|l| l.trim()) != Some(HEADER) {
        return Err(GraphsError::Parse("Invalid xry file, missing XR01 header".to_string()));
    }
    let start: f64 = field(&lines, PARAMS_LINE, 0)?;
    let step: f64 = field(&lines, PARAMS_LINE, 3)?;
    let item_count: usize = field(&lines, COUNTS_LINE, 0)?;
    let value_count: usize = field(&lines, COUNTS_LINE, 1)?;

    let xdata: Vec<f64> = (0..value_count).map(|i| start + step * i as f64).collect();
    let mut ydatas = vec![Vec::with_capacity(value_count); item_count];
    for row in 0..value_count {
        let line = DATA_START + row;
        for (column, ydata) in ydatas.iter_mut().enumerate() {
            ydata.push(field(&lines, line, column)?);
        }
    }

    let mut items: Vec<Item> = ydatas
        .into_iter()
        .enumerate()
        .map(|(i, ydata)| {
            let item_name = if item_count == 1 {
                name.to_string()
            } else {
                format!("{} ({})", name, i + 1)
            };
            Item::data(&item_name, xdata.clone(), ydata, style)
                .with_labels("β (°)", "R (1/s)")
        })
        .collect();

    let mut cursor = DATA_START + value_count;
    while lines.get(cursor).is_some_and(|l| l.trim().is_empty()) {
        cursor += 1;
    }
    if cursor < lines.len() {
        let annotations: usize = field(&lines, cursor, 0)?;
        for k in 0..annotations {
            let line = cursor + 1 + k;
            let x: f64 = field(&lines, line, 0)?;
            let y: f64 = field(&lines, line, 1)?;
            let label = lines[line]
                .split_whitespace()
                .skip(2)
                .collect::<Vec<_>>()
                .join(" ");
            items.push(Item::text(&label, x, y, &label, style));
        }
    }
    Ok(items)
}

pub struct XryParser;

impl Parser for XryParser {
    fn id(&self) -> &'static str {
        "xry"
    }

    fn display_name(&self) -> &'static str {
        "Leybold xry"
    }

    fn file_suffixes(&self) -> &'static [&'static str] {
        &["xry"]
    }

    fn parse(&self, settings: &ImportSettings, style: &StyleParams) -> Result<Vec<Item>> {
        let bytes = fs::read(&settings.path)?;
        // Files are Latin-1
        let content: String = bytes.iter().map(|&b| b as char).collect();
        parse_xry(&content, &settings.file_stem(), style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemType;

    fn sample(annotations: &str) -> String {
        let mut lines = vec!["XR01".to_string()];
        lines.extend((1..4).map(|i| format!("header {}", i)));
        lines.push("2.5 0 0 0.5 1".to_string());
        lines.extend((5..16).map(|_| "0".to_string()));
        lines.push("2 3".to_string());
        lines.push(String::new());
        lines.push("10 100".to_string());
        lines.push("20 200".to_string());
        lines.push("30 300".to_string());
        lines.push(annotations.to_string());
        lines.join("\n")
    }

    #[test]
    fn test_parse_items_and_annotations() {
        let content = sample("1\n3.0 25 peak one");
        let items = parse_xry(&content, "scan", &StyleParams::default()).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name, "scan (1)");
        assert_eq!(items[0].xdata().unwrap(), &[2.5, 3.0, 3.5]);
        assert_eq!(items[1].ydata().unwrap(), &[100.0, 200.0, 300.0]);
        assert_eq!(items[2].item_type(), ItemType::Text);
        assert_eq!(items[2].name, "peak one");
    }

    #[test]
    fn test_without_annotations() {
        let items = parse_xry(&sample(""), "scan", &StyleParams::default()).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_requires_header() {
        let err = parse_xry("XR02\n", "scan", &StyleParams::default()).unwrap_err();
        assert!(matches!(err, GraphsError::Parse(_)));
    }
}
