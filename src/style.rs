//! Style parameter files
//!
//! Figures are styled through a flat map of `key: value` parameters in the
//! `.mplstyle` format. Item constructors read their default line width,
//! marker, text size and color from the active [`StyleParams`], and
//! [`Item::reset`](crate::item::Item::reset) re-derives them when the style
//! changes.
//!
//! Reading follows a few rules:
//! - the second line, if it is a `# <name>` comment, names the style
//! - blacklisted keys are refused, ignore-listed keys are dropped with a warning
//! - symbolic font sizes (`large`) are scaled by `font.size`, symbolic weights
//!   (`bold`) become numeric weights

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use crate::error::{GraphsError, Result, ResultExt};

/// Keys that can never be set from a style file
pub const STYLE_BLACKLIST: &[&str] = &[
    "backend",
    "backend_fallback",
    "interactive",
    "toolbar",
    "timezone",
    "date.epoch",
    "docstring.hardcopy",
    "figure.max_open_warning",
    "figure.raise_window",
    "savefig.directory",
    "tk.window_focus",
    "webagg.address",
    "webagg.open_in_browser",
    "webagg.port",
    "webagg.port_retries",
];

/// Keys that are valid but have no effect on a Graphs figure
pub const STYLE_IGNORELIST: &[&str] = &[
    "figure.dpi",
    "figure.figsize",
    "savefig.dpi",
    "savefig.format",
    "savefig.bbox",
    "savefig.transparent",
];

/// Keys whose values may be symbolic font sizes
pub const FONT_SIZE_KEYS: &[&str] = &[
    "axes.labelsize",
    "axes.titlesize",
    "figure.titlesize",
    "legend.fontsize",
    "legend.title_fontsize",
    "xtick.labelsize",
    "ytick.labelsize",
];

/// Keys whose values may be symbolic font weights
pub const FONT_WEIGHT_KEYS: &[&str] = &[
    "font.weight",
    "axes.labelweight",
    "axes.titleweight",
    "figure.titleweight",
];

const DEFAULT_COLOR_CYCLE: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

fn font_size_scale(name: &str) -> Option<f64> {
    Some(match name {
        "xx-small" => 0.579,
        "x-small" => 0.694,
        "small" | "smaller" => 0.833,
        "medium" => 1.0,
        "large" | "larger" => 1.2,
        "x-large" => 1.44,
        "xx-large" => 1.728,
        _ => return None,
    })
}

fn font_weight(name: &str) -> Option<u32> {
    Some(match name {
        "ultralight" => 100,
        "light" => 200,
        "normal" | "regular" | "book" => 400,
        "medium" | "roman" => 500,
        "semibold" | "demibold" | "demi" => 600,
        "bold" => 700,
        "heavy" | "extra bold" => 800,
        "black" => 900,
        _ => return None,
    })
}

fn cycle_color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"'#?([0-9a-fA-F]{6})'").expect("valid regex"))
}

/// Drop a trailing `#` comment, leaving quoted `#` characters alone
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match (c, quote) {
            ('\'' | '"', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            ('#', None) => return &line[..i],
            _ => {}
        }
    }
    line
}

/// A named set of style parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StyleParams {
    pub name: String,
    params: BTreeMap<String, String>,
}

impl Default for StyleParams {
    fn default() -> Self {
        let mut params = BTreeMap::new();
        for (key, value) in [
            ("lines.linestyle", "-"),
            ("lines.linewidth", "1.5"),
            ("lines.marker", "None"),
            ("lines.markersize", "6"),
            ("font.size", "10"),
            ("text.color", "#000000"),
            ("axes.facecolor", "#ffffff"),
            ("figure.facecolor", "#ffffff"),
        ] {
            params.insert(key.to_string(), value.to_string());
        }
        Self {
            name: "Default".to_string(),
            params,
        }
    }
}

impl StyleParams {
    /// Empty parameter set with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Parse the contents of a style file
    pub fn parse(content: &str) -> Self {
        let mut style = StyleParams::new("");
        for (line_number, line) in content.lines().enumerate() {
            if line_number == 1 {
                if let Some(name) = line.strip_prefix('#') {
                    style.name = name.trim().to_string();
                    continue;
                }
            }
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                warn!("Missing colon in style file line {}: {}", line_number + 1, line);
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            if STYLE_BLACKLIST.contains(&key) {
                warn!("Refusing blacklisted style key '{}'", key);
                continue;
            }
            if STYLE_IGNORELIST.contains(&key) {
                warn!("Ignoring unsupported style key '{}'", key);
                continue;
            }
            style.params.insert(key.to_string(), value.to_string());
        }
        style.translate_fonts();
        style
    }

    fn translate_fonts(&mut self) {
        let base = self.get_f64("font.size").unwrap_or(10.0);
        for key in FONT_SIZE_KEYS {
            if let Some(value) = self.params.get_mut(*key) {
                if value.parse::<f64>().is_err() {
                    match font_size_scale(value) {
                        Some(scale) => *value = format!("{}", base * scale),
                        None => warn!("Unknown font size '{}' for '{}'", value, key),
                    }
                }
            }
        }
        for key in FONT_WEIGHT_KEYS {
            if let Some(value) = self.params.get_mut(*key) {
                if value.parse::<f64>().is_err() {
                    match font_weight(value) {
                        Some(weight) => *value = weight.to_string(),
                        None => warn!("Unknown font weight '{}' for '{}'", value, key),
                    }
                }
            }
        }
    }

    /// Serialize to style file text
    pub fn write(&self) -> String {
        let mut out = format!("# Generated via Graphs\n# {}\n", self.name);
        for (key, value) in &self.params {
            if STYLE_BLACKLIST.contains(&key.as_str()) || STYLE_IGNORELIST.contains(&key.as_str())
            {
                continue;
            }
            out.push_str(&format!("{}: {}\n", key, value));
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Reading style {}", path.display()))?;
        let mut style = Self::parse(&content);
        if style.name.is_empty() {
            style.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(style)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.write())
            .with_context(|| format!("Writing style {}", path.display()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        if STYLE_BLACKLIST.contains(&key) {
            return Err(GraphsError::Validation(format!(
                "Style key '{}' cannot be set",
                key
            )));
        }
        self.params.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Colors of `axes.prop_cycle`, or the default ten-color cycle
    pub fn color_cycle(&self) -> Vec<String> {
        let colors: Vec<String> = self
            .get("axes.prop_cycle")
            .map(|cycle| {
                cycle_color_pattern()
                    .captures_iter(cycle)
                    .map(|c| format!("#{}", c[1].to_lowercase()))
                    .collect()
            })
            .unwrap_or_default();
        if colors.is_empty() {
            DEFAULT_COLOR_CYCLE.iter().map(|c| c.to_string()).collect()
        } else {
            colors
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Generated via Graphs
# Solarized
lines.linewidth: 2  # thicker
lines.marker: o
font.size: 12
axes.titlesize: large
font.weight: bold
backend: agg
savefig.dpi: 300
axes.prop_cycle: cycler('color', ['#268BD2', 'dc322f'])
";

    #[test]
    fn test_parse_reads_name_and_values() {
        let style = StyleParams::parse(SAMPLE);
        assert_eq!(style.name, "Solarized");
        assert_eq!(style.get_f64("lines.linewidth"), Some(2.0));
        assert_eq!(style.get("lines.marker"), Some("o"));
    }

    #[test]
    fn test_blacklist_and_ignorelist() {
        let style = StyleParams::parse(SAMPLE);
        assert_eq!(style.get("backend"), None);
        assert_eq!(style.get("savefig.dpi"), None);
        assert!(style.clone().set("backend", "agg").is_err());
    }

    #[test]
    fn test_font_translation() {
        let style = StyleParams::parse(SAMPLE);
        let size = style.get_f64("axes.titlesize").unwrap();
        assert!((size - 14.4).abs() < 1e-9);
        assert_eq!(style.get("font.weight"), Some("700"));
    }

    #[test]
    fn test_color_cycle() {
        let style = StyleParams::parse(SAMPLE);
        assert_eq!(style.color_cycle(), vec!["#268bd2", "#dc322f"]);
        assert_eq!(StyleParams::default().color_cycle().len(), 10);
    }

    #[test]
    fn test_write_header_and_roundtrip() {
        let style = StyleParams::parse(SAMPLE);
        let text = style.write();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("# Generated via Graphs"));
        assert_eq!(lines.next(), Some("# Solarized"));
        assert_eq!(StyleParams::parse(&text), style);
    }
}
