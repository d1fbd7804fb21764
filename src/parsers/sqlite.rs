//! SQLite tables

use rusqlite::{Connection, OpenFlags};
use serde_json::{json, Map, Value};

use super::{ImportSettings, Parser};
use crate::error::{GraphsError, Result};
use crate::item::Item;
use crate::style::StyleParams;

fn db_error(e: rusqlite::Error) -> GraphsError {
    GraphsError::Parse(format!("Unable to read database: {}", e))
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn open(settings: &ImportSettings) -> Result<Connection> {
    Connection::open_with_flags(&settings.path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(db_error)
}

pub fn tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .map_err(db_error)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(db_error)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_error)?;
    Ok(names)
}

pub fn columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote(table)))
        .map_err(db_error)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(db_error)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_error)?;
    Ok(names)
}

/// Values of the requested columns, `NULL` read as NaN
fn read_columns(conn: &Connection, table: &str, names: &[&str]) -> Result<Vec<Vec<f64>>> {
    let selection: Vec<String> = names.iter().map(|n| quote(n)).collect();
    let sql = format!("SELECT {} FROM {}", selection.join(", "), quote(table));
    let mut stmt = conn.prepare(&sql).map_err(db_error)?;
    let mut result = vec![Vec::new(); names.len()];
    let mut rows = stmt.query([]).map_err(db_error)?;
    while let Some(row) = rows.next().map_err(db_error)? {
        for (i, column) in result.iter_mut().enumerate() {
            let value: Option<f64> = row.get(i).map_err(db_error)?;
            column.push(value.unwrap_or(f64::NAN));
        }
    }
    Ok(result)
}

pub struct SqliteParser;

impl Parser for SqliteParser {
    fn id(&self) -> &'static str {
        "sqlite"
    }

    fn display_name(&self) -> &'static str {
        "SQLite"
    }

    fn file_suffixes(&self) -> &'static [&'static str] {
        &["db", "sqlite", "sqlite3"]
    }

    fn default_options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        options.insert("column-xerr".into(), json!(""));
        options.insert("column-yerr".into(), json!(""));
        options
    }

    fn init_settings(&self, settings: &mut ImportSettings) -> Result<()> {
        let conn = open(settings)?;
        let tables = tables(&conn)?;
        let first = tables
            .first()
            .cloned()
            .ok_or_else(|| GraphsError::Parse("Database has no tables".to_string()))?;
        let table = settings.get_str("table", &first).to_string();
        let columns = columns(&conn, &table)?;
        settings.options.insert("tables".into(), json!(tables));
        settings.options.insert("table".into(), json!(table));
        let mut defaults = columns.iter();
        if let Some(x) = defaults.next() {
            settings.options.entry("column-x").or_insert(json!(x));
        }
        if let Some(y) = defaults.next() {
            settings.options.entry("column-y").or_insert(json!(y));
        }
        settings.options.insert("columns".into(), json!(columns));
        Ok(())
    }

    fn parse(&self, settings: &ImportSettings, style: &StyleParams) -> Result<Vec<Item>> {
        let conn = open(settings)?;
        let table = settings.get_str("table", "");
        let column_x = settings.get_str("column-x", "");
        let column_y = settings.get_str("column-y", "");
        if table.is_empty() || column_x.is_empty() || column_y.is_empty() {
            return Err(GraphsError::Parse("Choose a table and two columns".to_string()));
        }
        let xerr = settings.get_str("column-xerr", "");
        let yerr = settings.get_str("column-yerr", "");

        let mut names = vec![column_x, column_y];
        names.extend([xerr, yerr].into_iter().filter(|n| !n.is_empty()));
        let mut values = read_columns(&conn, table, &names)?.into_iter();
        let xdata = values.next().unwrap_or_default();
        let ydata = values.next().unwrap_or_default();
        if xdata.is_empty() {
            return Err(GraphsError::Parse(format!("Table '{}' is empty", table)));
        }

        let mut item =
            Item::data(table, xdata, ydata, style).with_labels(column_x, column_y);
        if let Some(data) = item.data_item_mut() {
            if !xerr.is_empty() {
                data.xerr = values.next();
                data.showxerr = true;
            }
            if !yerr.is_empty() {
                data.yerr = values.next();
                data.showyerr = true;
            }
        }
        Ok(vec![item])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".db").tempfile().unwrap();
        let conn = Connection::open(file.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE measurements (time REAL, signal REAL, error REAL);
             INSERT INTO measurements VALUES (0.0, 1.0, 0.1), (1.0, 2.0, 0.2), (2.0, NULL, 0.3);
             CREATE TABLE empty (a REAL, b REAL);",
        )
        .unwrap();
        file
    }

    #[test]
    fn test_init_lists_tables_and_columns() {
        let db = database();
        let mut overrides = Map::new();
        overrides.insert("table".into(), json!("measurements"));
        let settings = ImportSettings::with_parser(db.path(), "sqlite", overrides).unwrap();
        assert_eq!(settings.options["tables"], json!(["empty", "measurements"]));
        assert_eq!(settings.options["column-x"], json!("time"));
        assert_eq!(settings.options["column-y"], json!("signal"));
    }

    #[test]
    fn test_parse_with_error_column() {
        let db = database();
        let mut overrides = Map::new();
        overrides.insert("table".into(), json!("measurements"));
        overrides.insert("column-yerr".into(), json!("error"));
        let settings = ImportSettings::with_parser(db.path(), "sqlite", overrides).unwrap();
        let items = SqliteParser.parse(&settings, &StyleParams::default()).unwrap();
        let data = items[0].data_item().unwrap();
        assert_eq!(data.xdata, vec![0.0, 1.0, 2.0]);
        assert!(data.ydata[2].is_nan());
        assert_eq!(data.yerr.as_deref(), Some(&[0.1, 0.2, 0.3][..]));
        assert_eq!(items[0].ylabel, "signal");
    }

    #[test]
    fn test_empty_table() {
        let db = database();
        let settings = ImportSettings::with_parser(db.path(), "sqlite", Map::new()).unwrap();
        assert_eq!(settings.options["table"], json!("empty"));
        let err = SqliteParser.parse(&settings, &StyleParams::default()).unwrap_err();
        assert!(matches!(err, GraphsError::Parse(_)));
    }
}
