//! Items of another project file

use super::{ImportSettings, Parser};
use crate::error::Result;
use crate::history::MAX_HISTORY_STATES;
use crate::item::Item;
use crate::project;
use crate::style::StyleParams;

pub struct ProjectParser;

impl Parser for ProjectParser {
    fn id(&self) -> &'static str {
        "project"
    }

    fn display_name(&self) -> &'static str {
        "Project"
    }

    fn file_suffixes(&self) -> &'static [&'static str] {
        &["graphs"]
    }

    fn parse(&self, settings: &ImportSettings, _style: &StyleParams) -> Result<Vec<Item>> {
        let project = project::load(&settings.path, MAX_HISTORY_STATES)?;
        Ok(project.model.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphsError;
    use crate::parsers;
    use serde_json::json;

    #[test]
    fn test_import_items_of_project() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.graphs");
        let dict = json!({
            "project-version": 2,
            "data": [{"type": "DataItem", "name": "a", "xdata": [1.0], "ydata": [2.0]}],
            "figure-settings": {}
        });
        std::fs::write(&path, dict.to_string()).unwrap();
        let items = parsers::import_file(&path, &StyleParams::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "a");
    }

    #[test]
    fn test_incompatible_project_fails_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.graphs");
        std::fs::write(&path, r#"{"project-version": 9, "data": []}"#).unwrap();
        let err = parsers::import_file(&path, &StyleParams::default()).unwrap_err();
        assert!(matches!(err, GraphsError::Parse(_)));
    }
}
