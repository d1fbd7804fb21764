//! PANalytical XRDML diffraction scans

use roxmltree::{Document, Node};
use std::fs;

use super::{ImportSettings, Parser};
use crate::error::{GraphsError, Result};
use crate::item::Item;
use crate::style::StyleParams;

fn find<'a, 'input>(root: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    root.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}

fn text_f64(node: Node, what: &str) -> Result<f64> {
    node.text()
        .and_then(|t| t.trim().parse::<f64>().ok())
        .ok_or_else(|| GraphsError::Parse(format!("Invalid {} in xrdml file", what)))
}

fn missing(what: &str) -> GraphsError {
    GraphsError::Parse(format!("No {} found in xrdml file", what))
}

/// Evenly spaced values including both ends
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Parse the first scan of an XRDML document into a dataset
pub fn parse_xrdml(content: &str, name: &str, style: &StyleParams) -> Result<Item> {
    let doc = Document::parse(content)
        .map_err(|e| GraphsError::Parse(format!("Invalid xrdml file: {}", e)))?;
    let root = doc.root();

    let counting_time = text_f64(
        find(root, "commonCountingTime").ok_or_else(|| missing("counting time"))?,
        "counting time",
    )?;
    if counting_time == 0.0 {
        return Err(GraphsError::Parse("Counting time of zero in xrdml file".to_string()));
    }
    let intensities = find(root, "intensities")
        .or_else(|| find(root, "counts"))
        .ok_or_else(|| missing("intensities"))?;
    let ydata = intensities
        .text()
        .unwrap_or_default()
        .split_whitespace()
        .map(|v| v.parse::<f64>().map(|c| c / counting_time))
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(|_| GraphsError::Parse("Invalid intensity in xrdml file".to_string()))?;

    let scan_axis = find(root, "scan")
        .and_then(|n| n.attribute("scanAxis"))
        .unwrap_or("2Theta");
    let positions: Vec<Node> = root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "positions")
        .collect();
    let axis_name = if scan_axis.starts_with("2Theta") {
        "2Theta"
    } else {
        scan_axis
    };
    let position = positions
        .iter()
        .find(|n| n.attribute("axis") == Some(axis_name))
        .or_else(|| positions.first())
        .ok_or_else(|| missing("positions"))?;
    let unit = position.attribute("unit").unwrap_or("deg");
    let start = text_f64(
        find(*position, "startPosition").ok_or_else(|| missing("start position"))?,
        "start position",
    )?;
    let end = text_f64(
        find(*position, "endPosition").ok_or_else(|| missing("end position"))?,
        "end position",
    )?;

    let xdata = linspace(start, end, ydata.len());
    Ok(Item::data(name, xdata, ydata, style)
        .with_labels(&format!("{} ({})", scan_axis, unit), "Intensity (cps)"))
}

pub struct XrdmlParser;

impl Parser for XrdmlParser {
    fn id(&self) -> &'static str {
        "xrdml"
    }

    fn display_name(&self) -> &'static str {
        "XRDML"
    }

    fn file_suffixes(&self) -> &'static [&'static str] {
        &["xrdml"]
    }

    fn parse(&self, settings: &ImportSettings, style: &StyleParams) -> Result<Vec<Item>> {
        let content = fs::read_to_string(&settings.path)?;
        Ok(vec![parse_xrdml(&content, &settings.file_stem(), style)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xrdMeasurements xmlns="http://www.xrdml.com/XRDMeasurement/1.5">
  <xrdMeasurement>
    <scan scanAxis="Gonio">
      <dataPoints>
        <positions axis="2Theta" unit="deg">
          <startPosition>10.0</startPosition>
          <endPosition>12.0</endPosition>
        </positions>
        <positions axis="Omega" unit="deg">
          <startPosition>5.0</startPosition>
          <endPosition>6.0</endPosition>
        </positions>
        <commonCountingTime unit="seconds">2.0</commonCountingTime>
        <intensities unit="counts">10 20 30</intensities>
      </dataPoints>
    </scan>
  </xrdMeasurement>
</xrdMeasurements>"#;

    #[test]
    fn test_parse_scan() {
        let item = parse_xrdml(SCAN, "scan", &StyleParams::default()).unwrap();
        assert_eq!(item.xdata().unwrap(), &[10.0, 11.0, 12.0]);
        assert_eq!(item.ydata().unwrap(), &[5.0, 10.0, 15.0]);
        assert_eq!(item.xlabel, "Gonio (deg)");
        assert_eq!(item.ylabel, "Intensity (cps)");
    }

    #[test]
    fn test_missing_intensities() {
        let content = SCAN.replace("intensities", "other");
        let err = parse_xrdml(&content, "scan", &StyleParams::default()).unwrap_err();
        assert!(matches!(err, GraphsError::Parse(_)));
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
    }
}
