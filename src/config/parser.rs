//! Fragment parsing.

use std::path::Path;

use serde_json::{Map, Number, Value};

use super::error::BoxError;
use super::ConfigError;

/// Turns the text of one fragment file into a key/value tree.
///
/// The engine only sees files whose extension matches [`extension`](Self::extension).
pub trait FragmentParser: Send + Sync + std::fmt::Debug {
    /// File extension handled by this parser, without the leading dot.
    fn extension(&self) -> &str;

    fn parse(&self, text: &str) -> Result<Map<String, Value>, BoxError>;
}

/// Parses TOML fragments (`*.toml`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlParser;

impl FragmentParser for TomlParser {
    fn extension(&self) -> &str {
        "toml"
    }

    fn parse(&self, text: &str) -> Result<Map<String, Value>, BoxError> {
        let table: toml::Table = toml::from_str(text)?;
        Ok(table_to_map(table))
    }
}

fn table_to_map(table: toml::Table) -> Map<String, Value> {
    table
        .into_iter()
        .map(|(key, value)| (key, toml_to_json(value)))
        .collect()
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(table_to_map(table)),
    }
}

/// Reads and parses a fragment file.
pub fn read_fragment(
    parser: &dyn FragmentParser,
    path: &Path,
) -> Result<Map<String, Value>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    parser
        .parse(&contents)
        .map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
}
