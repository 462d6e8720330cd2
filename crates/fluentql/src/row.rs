//! Row representation and typed decoding.

use crate::error::DbResult;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A result row: column name to value, in the order the engine returned them.
pub type Row = serde_json::Map<String, Value>;

/// Decode a row into `T` via serde.
pub fn from_row<T: DeserializeOwned>(row: Row) -> DbResult<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Decode rows into `Vec<T>` via serde.
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> DbResult<Vec<T>> {
    rows.into_iter().map(from_row).collect()
}

/// Hashable key for a cell value, used to match keys across result sets.
///
/// `null` has no key: it never matches anything.
pub(crate) fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Extension helpers on [`Row`].
pub trait RowExt {
    /// Get a column as `T`, returning `Ok(None)` for missing or null cells.
    fn get_as<T: DeserializeOwned>(&self, column: &str) -> DbResult<Option<T>>;
}

impl RowExt for Row {
    fn get_as<T: DeserializeOwned>(&self, column: &str) -> DbResult<Option<T>> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }
}
