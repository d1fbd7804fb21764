//! Plain text export of datasets
//!
//! Each dataset becomes two tab-separated columns in C `%.12e` notation,
//! optionally preceded by a `xlabel<TAB>ylabel` header line.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{GraphsError, Result, ResultExt};
use crate::item::{dedup_name, Item};

/// `value` formatted like C's `%.12e`
pub fn format_scientific(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let formatted = format!("{:.12e}", value);
    let Some((mantissa, exponent)) = formatted.split_once('e') else {
        return formatted;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

/// Write x/y columns to `writer`
pub fn write_columns<W: Write>(
    writer: &mut W,
    xdata: &[f64],
    ydata: &[f64],
    header: Option<(&str, &str)>,
) -> Result<()> {
    if let Some((xlabel, ylabel)) = header {
        writeln!(writer, "{}\t{}", xlabel, ylabel)?;
    }
    for (x, y) in xdata.iter().zip(ydata) {
        writeln!(writer, "{}\t{}", format_scientific(*x), format_scientific(*y))?;
    }
    Ok(())
}

/// Write one dataset to `path`
pub fn export_item(item: &Item, path: &Path, header: bool) -> Result<()> {
    let (Some(xdata), Some(ydata)) = (item.xdata(), item.ydata()) else {
        return Err(GraphsError::Validation(format!(
            "'{}' has no data to export",
            item.name
        )));
    };
    let file = File::create(path).with_context(|| format!("Creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let labels = header.then_some((item.xlabel.as_str(), item.ylabel.as_str()));
    write_columns(&mut writer, xdata, ydata, labels)?;
    writer.flush()?;
    Ok(())
}

fn file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    if cleaned.trim().is_empty() {
        "data".to_string()
    } else {
        cleaned
    }
}

/// Write every dataset of `items` as `<name>.txt` into `directory`
///
/// Items without data are skipped. Returns the written paths.
pub fn export_items(items: &[&Item], directory: &Path, header: bool) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(directory)?;
    let mut used = HashSet::new();
    let mut written = Vec::new();
    for item in items {
        if !item.is_data_like() {
            warn!("Skipping '{}', it holds no data", item.name);
            continue;
        }
        let stem = dedup_name(&file_name(&item.name), &used);
        used.insert(stem.clone());
        let path = directory.join(format!("{}.txt", stem));
        export_item(item, &path, header)?;
        written.push(path);
    }
    info!("Exported {} datasets to {}", written.len(), directory.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StyleParams;

    #[test]
    fn test_format_scientific() {
        assert_eq!(format_scientific(1.0), "1.000000000000e+00");
        assert_eq!(format_scientific(-0.00123), "-1.230000000000e-03");
        assert_eq!(format_scientific(1.5e100), "1.500000000000e+100");
        assert_eq!(format_scientific(0.0), "0.000000000000e+00");
    }

    #[test]
    fn test_write_columns_with_header() {
        let mut out = Vec::new();
        write_columns(&mut out, &[0.0, 1.0], &[2.0, 3.0], Some(("t", "v"))).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "t\tv");
        assert_eq!(lines[2], "1.000000000000e+00\t3.000000000000e+00");
    }

    #[test]
    fn test_export_items_dedups_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let style = StyleParams::default();
        let a = Item::data("a/b", vec![0.0], vec![1.0], &style);
        let b = Item::data("a/b", vec![0.0], vec![1.0], &style);
        let text = Item::text("note", 0.0, 0.0, "hi", &style);
        let written = export_items(&[&a, &b, &text], dir.path(), false).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("a_b.txt").exists());
        assert!(dir.path().join("a_b (1).txt").exists());
    }
}
