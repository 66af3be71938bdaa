//! In-memory record store over the configuration document.
//!
//! The document is kept as parsed JSON. Every `G2_CONFIG` member whose value
//! is an array is a *table*; its elements are flat *rows*. Other members
//! (such as `CONFIG_BASE_VERSION`) are *sections* and are reachable through
//! [`RecordStore::section`].
//!
//! Field comparisons are made on scalar string forms, so a stored `1000`
//! matches a lookup value of `"1000"`. Lookups on a missing table behave like
//! lookups on an empty one.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{ConfigError, Result};

/// Top-level key of a configuration document.
pub const ROOT_KEY: &str = "G2_CONFIG";

/// One row of a configuration table, keyed by internal column names.
pub type Row = Map<String, Value>;

/// A user-facing record, keyed by external field names.
pub type Record = Map<String, Value>;

/// An identifier given by the user: either a numeric ID or a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    /// Numeric primary key, e.g. `FTYPE_ID`.
    Id(i64),
    /// Unique code, e.g. `FTYPE_CODE`. Always upper case.
    Code(String),
}

impl RecordKey {
    /// Parse a bare token: all digits is an ID, anything else an upper-cased
    /// code.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = token.parse() {
                return RecordKey::Id(id);
            }
        }
        RecordKey::Code(token.to_uppercase())
    }

    /// Pick the column this key should be matched against.
    pub fn field<'a>(&self, id_field: &'a str, code_field: &'a str) -> &'a str {
        match self {
            RecordKey::Id(_) => id_field,
            RecordKey::Code(_) => code_field,
        }
    }

    /// The key as a JSON value.
    pub fn value(&self) -> Value {
        match self {
            RecordKey::Id(id) => Value::from(*id),
            RecordKey::Code(code) => Value::from(code.as_str()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Id(id) => write!(f, "{id}"),
            RecordKey::Code(code) => f.write_str(code),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(id: i64) -> Self {
        RecordKey::Id(id)
    }
}

impl From<&str> for RecordKey {
    fn from(code: &str) -> Self {
        RecordKey::Code(code.to_uppercase())
    }
}

/// Interpret a scalar as an integer. Numeric strings count.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Render a scalar the way it is compared and displayed. Null is empty.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose equality used by all field lookups.
pub fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => a == b,
        _ => value_to_string(a) == value_to_string(b),
    }
}

fn row_matches(row: &Row, field: &str, value: &Value) -> bool {
    row.get(field).is_some_and(|v| values_match(v, value))
}

/// The parsed configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStore {
    members: Map<String, Value>,
}

impl RecordStore {
    /// Wrap a parsed document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the document has no
    /// `G2_CONFIG` object.
    pub fn from_value(doc: Value) -> Result<Self> {
        let Value::Object(mut root) = doc else {
            return Err(ConfigError::invalid("configuration is not a JSON object"));
        };
        match root.remove(ROOT_KEY) {
            Some(Value::Object(members)) => Ok(Self { members }),
            Some(_) => Err(ConfigError::invalid(format!("{ROOT_KEY} is not an object"))),
            None => Err(ConfigError::invalid(format!(
                "configuration has no {ROOT_KEY} member"
            ))),
        }
    }

    /// Parse a document from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// An empty document with no tables.
    pub fn empty() -> Self {
        Self {
            members: Map::new(),
        }
    }

    /// The whole document, including the `G2_CONFIG` wrapper.
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(ROOT_KEY.to_string(), Value::Object(self.members.clone()));
        Value::Object(root)
    }

    /// Encode the document compactly.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_value())?)
    }

    /// Encode the document for humans.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    /// Names of every `G2_CONFIG` member, tables and sections alike.
    pub fn section_names(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    /// A raw `G2_CONFIG` member.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    /// A raw `G2_CONFIG` member, mutably.
    pub fn section_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.members.get_mut(name)
    }

    /// Insert or replace a `G2_CONFIG` member.
    pub fn insert_section(&mut self, name: &str, value: Value) -> Option<Value> {
        self.members.insert(name.to_string(), value)
    }

    /// Remove a `G2_CONFIG` member, keeping the order of the rest.
    pub fn remove_section(&mut self, name: &str) -> Option<Value> {
        self.members.shift_remove(name)
    }

    /// Whether a table (array member) exists.
    pub fn has_table(&self, table: &str) -> bool {
        matches!(self.section(table), Some(Value::Array(_)))
    }

    /// Rows of a table together with their positions.
    pub fn indexed_rows<'a>(&'a self, table: &str) -> impl Iterator<Item = (usize, &'a Row)> + use<'a> {
        let rows: &'a [Value] = match self.section(table) {
            Some(Value::Array(rows)) => rows,
            _ => &[],
        };
        rows.iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_object().map(|row| (i, row)))
    }

    /// Rows of a table in insertion order.
    pub fn rows<'a>(&'a self, table: &str) -> impl Iterator<Item = &'a Row> + use<'a> {
        self.indexed_rows(table).map(|(_, row)| row)
    }

    fn position(&self, table: &str, fields: &[(&str, Value)]) -> Option<usize> {
        self.indexed_rows(table)
            .find(|(_, row)| fields.iter().all(|(f, v)| row_matches(row, f, v)))
            .map(|(i, _)| i)
    }

    fn table_rows_mut(&mut self, table: &str) -> Option<&mut Vec<Value>> {
        self.members.get_mut(table).and_then(Value::as_array_mut)
    }

    /// First row whose `field` matches `value`.
    pub fn get_record(&self, table: &str, field: &str, value: impl Into<Value>) -> Option<&Row> {
        let value = value.into();
        self.rows(table).find(|row| row_matches(row, field, &value))
    }

    /// First row matching every field/value pair.
    pub fn get_record_by_fields(&self, table: &str, fields: &[(&str, Value)]) -> Option<&Row> {
        self.rows(table)
            .find(|row| fields.iter().all(|(f, v)| row_matches(row, f, v)))
    }

    /// All rows of a table, or those whose `field` matches the given value.
    pub fn get_record_list(&self, table: &str, filter: Option<(&str, Value)>) -> Vec<&Row> {
        match filter {
            Some((field, value)) => self
                .rows(table)
                .filter(|row| row_matches(row, field, &value))
                .collect(),
            None => self.rows(table).collect(),
        }
    }

    /// Number of rows whose `field` matches `value`.
    pub fn count_matching(&self, table: &str, field: &str, value: &Value) -> usize {
        self.rows(table)
            .filter(|row| row_matches(row, field, value))
            .count()
    }

    /// Look up a row by ID or code.
    pub fn find(&self, table: &str, id_field: &str, code_field: &str, key: &RecordKey) -> Option<&Row> {
        self.get_record(table, key.field(id_field, code_field), key.value())
    }

    /// Append a row, creating the table when absent.
    pub fn add_record(&mut self, table: &str, row: Row) {
        match self.table_rows_mut(table) {
            Some(rows) => rows.push(Value::Object(row)),
            None => {
                self.members
                    .insert(table.to_string(), Value::Array(vec![Value::Object(row)]));
            }
        }
    }

    /// Replace the first matching row wholesale.
    pub fn update_record(&mut self, table: &str, field: &str, value: impl Into<Value>, new_row: Row) -> bool {
        let Some(index) = self.position(table, &[(field, value.into())]) else {
            return false;
        };
        match self.table_rows_mut(table).and_then(|rows| rows.get_mut(index)) {
            Some(slot) => {
                *slot = Value::Object(new_row);
                true
            }
            None => false,
        }
    }

    /// Merge `changes` into the first row matching every field/value pair.
    pub fn merge_record(&mut self, table: &str, fields: &[(&str, Value)], changes: Row) -> bool {
        let Some(index) = self.position(table, fields) else {
            return false;
        };
        match self
            .table_rows_mut(table)
            .and_then(|rows| rows.get_mut(index))
            .and_then(Value::as_object_mut)
        {
            Some(row) => {
                row.extend(changes);
                true
            }
            None => false,
        }
    }

    /// Remove the first matching row.
    pub fn delete_record(&mut self, table: &str, field: &str, value: impl Into<Value>) -> bool {
        self.delete_record_by_fields(table, &[(field, value.into())])
    }

    /// Remove the first row matching every field/value pair.
    pub fn delete_record_by_fields(&mut self, table: &str, fields: &[(&str, Value)]) -> bool {
        let Some(index) = self.position(table, fields) else {
            return false;
        };
        match self.table_rows_mut(table) {
            Some(rows) if index < rows.len() => {
                rows.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Remove rows by position. Positions refer to the current table.
    pub fn remove_rows(&mut self, table: &str, positions: &[usize]) -> usize {
        let Some(rows) = self.table_rows_mut(table) else {
            return 0;
        };
        let mut positions = positions.to_vec();
        positions.sort_unstable();
        positions.dedup();
        let mut removed = 0;
        for &pos in positions.iter().rev() {
            if pos < rows.len() {
                rows.remove(pos);
                removed += 1;
            }
        }
        removed
    }

    /// `max(existing ids) + 1`, never below `seed`.
    ///
    /// IDs are unique within this document only; concurrent sessions editing
    /// copies of the same configuration can hand out the same ID.
    ///
    /// # Errors
    ///
    /// Fails when the largest existing ID is `i64::MAX`.
    pub fn get_next_id(&self, table: &str, id_field: &str, seed: i64) -> Result<i64> {
        next_after(self.rows(table).filter_map(|row| row.get(id_field).and_then(value_as_i64)), seed)
    }

    /// Next `EXEC_ORDER` among the `table` rows matching `filter`.
    pub fn next_exec_order(&self, table: &str, filter: (&str, Value)) -> Result<i64> {
        next_after(
            self.get_record_list(table, Some(filter))
                .into_iter()
                .filter_map(|row| row.get("EXEC_ORDER").and_then(value_as_i64)),
            1,
        )
    }
}

/// One past the largest of `values`, never below `floor`.
fn next_after(values: impl Iterator<Item = i64>, floor: i64) -> Result<i64> {
    match values.max() {
        Some(max) => max
            .checked_add(1)
            .map(|next| next.max(floor))
            .ok_or_else(|| ConfigError::invalid("ID space exhausted")),
        None => Ok(floor),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn store_with_sources() -> RecordStore {
        RecordStore::from_value(json!({
            "G2_CONFIG": {
                "CFG_DSRC": [
                    {"DSRC_ID": 1000, "DSRC_CODE": "CUSTOMER"},
                    {"DSRC_ID": 1050, "DSRC_CODE": "WATCHLIST"}
                ],
                "CONFIG_BASE_VERSION": {"VERSION": "4.0.0"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_record_key_parse() {
        assert_eq!(RecordKey::parse("42"), RecordKey::Id(42));
        assert_eq!(RecordKey::parse(" name "), RecordKey::Code("NAME".into()));
        assert_eq!(RecordKey::parse("a1"), RecordKey::Code("A1".into()));
        assert_eq!(RecordKey::parse("-5"), RecordKey::Code("-5".into()));
    }

    #[test]
    fn test_missing_root_rejected() {
        assert!(RecordStore::from_value(json!({"CFG_DSRC": []})).is_err());
        assert!(RecordStore::from_json("not json").is_err());
    }

    #[test]
    fn test_add_then_get_returns_same_row() {
        let mut store = RecordStore::empty();
        let new_row = row(json!({"FELEM_ID": 7, "FELEM_CODE": "FULL_NAME"}));
        store.add_record("CFG_FELEM", new_row.clone());
        assert_eq!(store.get_record("CFG_FELEM", "FELEM_CODE", "FULL_NAME"), Some(&new_row));
    }

    #[test]
    fn test_loose_matching() {
        let store = store_with_sources();
        assert!(store.get_record("CFG_DSRC", "DSRC_ID", "1000").is_some());
        assert!(store.get_record("CFG_DSRC", "DSRC_ID", 1050).is_some());
        assert!(store.get_record("CFG_DSRC", "DSRC_CODE", "customer").is_none());
    }

    #[test]
    fn test_unknown_table_is_empty() {
        let store = store_with_sources();
        assert!(store.get_record_list("CFG_NOPE", None).is_empty());
        assert!(store.get_record("CFG_NOPE", "X", 1).is_none());
        // sections are not tables
        assert!(store.get_record_list("CONFIG_BASE_VERSION", None).is_empty());
        assert!(!store.has_table("CONFIG_BASE_VERSION"));
    }

    #[test]
    fn test_get_record_by_fields() {
        let mut store = RecordStore::empty();
        store.add_record("CFG_FBOM", row(json!({"FTYPE_ID": 1, "FELEM_ID": 2})));
        store.add_record("CFG_FBOM", row(json!({"FTYPE_ID": 1, "FELEM_ID": 3})));
        let found = store
            .get_record_by_fields("CFG_FBOM", &[("FTYPE_ID", json!(1)), ("FELEM_ID", json!(3))])
            .unwrap();
        assert_eq!(found["FELEM_ID"], json!(3));
        assert!(
            store
                .get_record_by_fields("CFG_FBOM", &[("FTYPE_ID", json!(2)), ("FELEM_ID", json!(3))])
                .is_none()
        );
    }

    #[test]
    fn test_delete_removes_exactly_one() {
        let mut store = store_with_sources();
        assert!(store.delete_record("CFG_DSRC", "DSRC_CODE", "CUSTOMER"));
        assert!(store.get_record("CFG_DSRC", "DSRC_CODE", "CUSTOMER").is_none());
        assert_eq!(store.get_record_list("CFG_DSRC", None).len(), 1);
        assert!(!store.delete_record("CFG_DSRC", "DSRC_CODE", "CUSTOMER"));
    }

    #[test]
    fn test_update_requires_match() {
        let mut store = store_with_sources();
        let replacement = row(json!({"DSRC_ID": 1000, "DSRC_CODE": "CLIENT"}));
        assert!(store.update_record("CFG_DSRC", "DSRC_ID", 1000, replacement));
        assert!(store.get_record("CFG_DSRC", "DSRC_CODE", "CLIENT").is_some());
        assert!(!store.update_record("CFG_DSRC", "DSRC_ID", 9, Row::new()));
    }

    #[test]
    fn test_next_id_sparse_ids() {
        let store = store_with_sources();
        assert_eq!(store.get_next_id("CFG_DSRC", "DSRC_ID", 1000).unwrap(), 1051);
        assert_eq!(store.get_next_id("CFG_DSRC", "DSRC_ID", 5000).unwrap(), 5000);
        assert_eq!(store.get_next_id("CFG_FTYPE", "FTYPE_ID", 1000).unwrap(), 1000);
    }

    #[test]
    fn test_next_id_at_i64_max() {
        let mut store = store_with_sources();
        store.add_record("CFG_DSRC", row(json!({"DSRC_ID": i64::MAX, "DSRC_CODE": "BIG"})));
        let err = store.get_next_id("CFG_DSRC", "DSRC_ID", 1000).unwrap_err();
        assert!(err.to_string().contains("ID space exhausted"));

        store.add_record("CFG_FBOM", row(json!({"FTYPE_ID": 1, "EXEC_ORDER": i64::MAX})));
        assert!(store.next_exec_order("CFG_FBOM", ("FTYPE_ID", json!(1))).is_err());
        assert_eq!(store.next_exec_order("CFG_FBOM", ("FTYPE_ID", json!(2))).unwrap(), 1);
    }

    #[test]
    fn test_remove_rows_by_position() {
        let mut store = store_with_sources();
        assert_eq!(store.remove_rows("CFG_DSRC", &[1, 0, 1]), 2);
        assert!(store.get_record_list("CFG_DSRC", None).is_empty());
    }

    #[test]
    fn test_section_order_preserved() {
        let mut store = store_with_sources();
        store.insert_section("CFG_NEW", json!([]));
        assert_eq!(
            store.section_names(),
            vec!["CFG_DSRC", "CONFIG_BASE_VERSION", "CFG_NEW"]
        );
        store.remove_section("CFG_DSRC");
        assert_eq!(store.section_names(), vec!["CONFIG_BASE_VERSION", "CFG_NEW"]);
    }
}
