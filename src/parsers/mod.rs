//! Import parsers
//!
//! Every supported file format is handled by a [`Parser`]. Parsers are
//! registered once in a process-wide [`ParserRegistry`]; the parser for a
//! file is guessed from its extension, falling back to the `columns` parser
//! for anything unknown.
//!
//! An import is described by [`ImportSettings`]: the file, the parser id and
//! a JSON map of parser options. [`ImportSettings::new`] fills in the
//! parser's defaults and lets the parser derive further options (available
//! sheets, tables, columns) through [`Parser::init_settings`].
//!
//! # Example
//!
//! ```ignore
//! use graphs_core::parsers::{self, ImportSettings};
//! use graphs_core::style::StyleParams;
//!
//! let settings = ImportSettings::new("spectrum.xrdml")?;
//! let items = parsers::parse(&settings, &StyleParams::default())?;
//! ```

pub mod columns;
pub mod project;
pub mod spreadsheet;
pub mod sqlite;
pub mod task;
pub mod xrdml;
pub mod xry;

pub use task::{spawn_import, ImportTask};

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{error, info};

use crate::error::{GraphsError, Result};
use crate::item::Item;
use crate::style::StyleParams;

/// Id of the fallback parser
pub const DEFAULT_PARSER: &str = "columns";

/// A file format that can be imported
pub trait Parser: Send + Sync {
    /// Stable identifier, also used for stored preferences
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Lowercase extensions without the dot
    fn file_suffixes(&self) -> &'static [&'static str];

    /// Options a fresh import starts with
    fn default_options(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Derive options that depend on the file
    ///
    /// Fails when the file cannot be inspected at all, in which case the
    /// parser is unusable for it.
    fn init_settings(&self, _settings: &mut ImportSettings) -> Result<()> {
        Ok(())
    }

    /// Read the file into items
    fn parse(&self, settings: &ImportSettings, style: &StyleParams) -> Result<Vec<Item>>;
}

/// One pending import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub path: PathBuf,
    pub parser_id: String,
    pub options: Map<String, Value>,
}

impl ImportSettings {
    /// Settings for `path` with the guessed parser and its defaults
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let parser_id = registry().guess(&path).id().to_string();
        Self::with_parser(path, &parser_id, Map::new())
    }

    /// Settings for an explicit parser, layering `overrides` on the defaults
    pub fn with_parser(
        path: impl Into<PathBuf>,
        parser_id: &str,
        overrides: Map<String, Value>,
    ) -> Result<Self> {
        let parser = registry()
            .get(parser_id)
            .ok_or_else(|| GraphsError::Parse(format!("Unknown import mode '{}'", parser_id)))?;
        let mut options = parser.default_options();
        options.extend(overrides);
        let mut settings = Self {
            path: path.into(),
            parser_id: parser_id.to_string(),
            options,
        };
        parser.init_settings(&mut settings)?;
        Ok(settings)
    }

    /// File name without extension, used to name imported items
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.options.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.options
            .get(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.options.get(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

/// All known parsers
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(columns::ColumnsParser),
                Box::new(project::ProjectParser),
                Box::new(xrdml::XrdmlParser),
                Box::new(xry::XryParser),
                Box::new(spreadsheet::SpreadsheetParser),
                Box::new(sqlite::SqliteParser),
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&dyn Parser> {
        self.parsers.iter().find(|p| p.id() == id).map(|p| p.as_ref())
    }

    pub fn parsers(&self) -> impl Iterator<Item = &dyn Parser> {
        self.parsers.iter().map(|p| p.as_ref())
    }

    /// Parser for a file, by extension
    pub fn guess(&self, path: &Path) -> &dyn Parser {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.parsers
            .iter()
            .find(|p| p.file_suffixes().contains(&extension.as_str()))
            .or_else(|| self.parsers.iter().find(|p| p.id() == DEFAULT_PARSER))
            .map(|p| p.as_ref())
            .unwrap_or_else(|| self.parsers[0].as_ref())
    }
}

/// The process-wide parser registry
pub fn registry() -> &'static ParserRegistry {
    static REGISTRY: OnceLock<ParserRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ParserRegistry::new)
}

/// Run an import
///
/// Parse errors are returned as they are; any other failure is logged and
/// reported as a generic import failure.
pub fn parse(settings: &ImportSettings, style: &StyleParams) -> Result<Vec<Item>> {
    let parser = registry()
        .get(&settings.parser_id)
        .ok_or_else(|| GraphsError::Parse(format!("Unknown import mode '{}'", settings.parser_id)))?;
    info!("Importing {} as {}", settings.path.display(), parser.id());
    match parser.parse(settings, style) {
        Ok(items) => Ok(items),
        Err(e) if matches!(e.root(), GraphsError::Parse(_)) => Err(e),
        Err(e) => {
            error!("Importing {} failed: {}", settings.path.display(), e);
            Err(GraphsError::Parse("Import failed".to_string()))
        }
    }
}

/// Guess the parser for `path` and import it with default options
pub fn import_file(path: impl Into<PathBuf>, style: &StyleParams) -> Result<Vec<Item>> {
    let settings = ImportSettings::new(path)?;
    parse(&settings, style)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_by_extension() {
        let registry = registry();
        assert_eq!(registry.guess(Path::new("a.graphs")).id(), "project");
        assert_eq!(registry.guess(Path::new("a.XRDML")).id(), "xrdml");
        assert_eq!(registry.guess(Path::new("a.xry")).id(), "xry");
        assert_eq!(registry.guess(Path::new("a.ods")).id(), "spreadsheet");
        assert_eq!(registry.guess(Path::new("a.sqlite3")).id(), "sqlite");
        assert_eq!(registry.guess(Path::new("a.csv")).id(), "columns");
        assert_eq!(registry.guess(Path::new("README")).id(), "columns");
    }

    #[test]
    fn test_unknown_parser() {
        let err = ImportSettings::with_parser("a.txt", "nope", Map::new()).unwrap_err();
        assert!(matches!(err, GraphsError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_import_failure() {
        let settings = ImportSettings::with_parser(
            "/definitely/not/here.txt",
            DEFAULT_PARSER,
            Map::new(),
        )
        .unwrap();
        let err = parse(&settings, &StyleParams::default()).unwrap_err();
        assert_eq!(err.to_string(), "Import failed");
    }
}
