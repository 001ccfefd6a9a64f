use indexmap::IndexMap;

use crate::types::SqlValue;

/// Driver-agnostic raw result of one native execution.
///
/// Read statements carry columns and rows; write statements carry the
/// affected-row count instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryResult {
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows, where each row is a vector of values in column order
    pub rows: Vec<Vec<SqlValue>>,
    /// Set for statements that produced no result set
    pub affected_rows: Option<u64>,
    /// Auto-increment id reported by the server, when the driver exposes one
    pub last_insert_id: Option<u64>,
}

impl RawQueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows,
            affected_rows: None,
            last_insert_id: None,
        }
    }

    pub fn affected(count: u64) -> Self {
        Self {
            affected_rows: Some(count),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_last_insert_id(mut self, id: u64) -> Self {
        self.last_insert_id = Some(id);
        self
    }

    /// True when the statement produced a result set rather than a row count.
    pub fn is_result_set(&self) -> bool {
        self.affected_rows.is_none()
    }
}

/// A single row fetched in object mode.
/// Values are accessed by column name or by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: IndexMap<String, SqlValue>,
}

impl Row {
    /// Creates a new Row from column names and values.
    pub(crate) fn new(columns: &[String], values: Vec<SqlValue>) -> Self {
        let values = columns
            .iter()
            .cloned()
            .zip(values)
            .collect();
        Self { values }
    }

    /// Gets a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    /// Gets a value by position.
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get_index(index).map(|(_, v)| v)
    }

    /// Returns all column names in this row, in result order.
    pub fn columns(&self) -> Vec<&str> {
        self.values.keys().map(|s| s.as_str()).collect()
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_map(self) -> IndexMap<String, SqlValue> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get() {
        let columns = vec!["id".to_string(), "name".to_string()];
        let values = vec![SqlValue::Int(1), SqlValue::from("John")];
        let row = Row::new(&columns, values);

        assert_eq!(row.get("id"), Some(&SqlValue::Int(1)));
        assert_eq!(row.get("name"), Some(&SqlValue::from("John")));
        assert_eq!(row.get_index(1), Some(&SqlValue::from("John")));
        assert!(row.get("missing").is_none());
        assert_eq!(row.columns(), vec!["id", "name"]);
    }

    #[test]
    fn test_raw_result_kinds() {
        let read = RawQueryResult::new(vec!["id".to_string()], vec![]);
        assert!(read.is_result_set());

        let write = RawQueryResult::affected(3).with_last_insert_id(10);
        assert!(!write.is_result_set());
        assert_eq!(write.affected_rows, Some(3));
        assert_eq!(write.last_insert_id, Some(10));
    }
}
