use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::types::{RawQueryResult, Row, SqlValue};

/// Shape of fetched rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Column name to value.
    #[default]
    Assoc,
    /// Values by position.
    Num,
    /// Both of the above.
    Both,
    /// A [`Row`] accessed by name or position.
    Object,
    /// Fetch nothing.
    None,
}

/// One fetched row, shaped by its [`FetchMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedRow {
    Assoc(IndexMap<String, SqlValue>),
    Num(Vec<SqlValue>),
    Both {
        assoc: IndexMap<String, SqlValue>,
        num: Vec<SqlValue>,
    },
    Object(Row),
}

impl FetchedRow {
    /// Value by column name, for every shape that carries names.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        match self {
            FetchedRow::Assoc(map) | FetchedRow::Both { assoc: map, .. } => map.get(column),
            FetchedRow::Object(row) => row.get(column),
            FetchedRow::Num(_) => None,
        }
    }

    /// Value by position.
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        match self {
            FetchedRow::Assoc(map) => map.get_index(index).map(|(_, v)| v),
            FetchedRow::Num(values) | FetchedRow::Both { num: values, .. } => values.get(index),
            FetchedRow::Object(row) => row.get_index(index),
        }
    }
}

/// Result of executing a statement.
///
/// Wraps either a cursor over the rows a read statement produced or the
/// affected-row count of a write statement. The cursor only moves forward;
/// once it is drained every fetch returns `None`.
#[derive(Debug, Clone)]
pub struct Query {
    columns: Vec<String>,
    rows: VecDeque<Vec<SqlValue>>,
    row_count: u64,
    affected_rows: Option<u64>,
    fetch_mode: FetchMode,
}

impl Query {
    pub(crate) fn new(raw: RawQueryResult, fetch_mode: FetchMode) -> Self {
        Self {
            row_count: raw.rows.len() as u64,
            columns: raw.columns,
            rows: raw.rows.into(),
            affected_rows: raw.affected_rows,
            fetch_mode,
        }
    }

    /// Rows read for a read statement, rows affected for a write statement.
    pub fn num_rows(&self) -> u64 {
        match self.affected_rows {
            Some(affected) => affected,
            None => self.row_count,
        }
    }

    /// Rows affected by a write statement; zero for reads.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows.unwrap_or(0)
    }

    /// True when this result came with a cursor.
    pub fn has_result_set(&self) -> bool {
        self.affected_rows.is_none()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    pub fn set_fetch_mode(&mut self, mode: FetchMode) {
        self.fetch_mode = mode;
    }

    pub fn is_exhausted(&self) -> bool {
        self.rows.is_empty()
    }

    /// Advance by one row. `FetchMode::None` never touches the cursor.
    pub fn fetch(&mut self, mode: FetchMode) -> Option<FetchedRow> {
        if mode == FetchMode::None {
            return None;
        }
        let values = self.rows.pop_front()?;
        Some(self.shape(values, mode))
    }

    pub fn fetch_assoc(&mut self) -> Option<IndexMap<String, SqlValue>> {
        let values = self.rows.pop_front()?;
        Some(self.columns.iter().cloned().zip(values).collect())
    }

    pub fn fetch_row(&mut self) -> Option<Vec<SqlValue>> {
        self.rows.pop_front()
    }

    pub fn fetch_object(&mut self) -> Option<Row> {
        let values = self.rows.pop_front()?;
        Some(Row::new(&self.columns, values))
    }

    /// Drain the cursor. `FetchMode::None` returns nothing and leaves the
    /// cursor where it is.
    pub fn fetch_all(&mut self, mode: FetchMode) -> Vec<FetchedRow> {
        if mode == FetchMode::None {
            return Vec::new();
        }
        let rows: Vec<Vec<SqlValue>> = self.rows.drain(..).collect();
        rows.into_iter().map(|values| self.shape(values, mode)).collect()
    }

    fn shape(&self, values: Vec<SqlValue>, mode: FetchMode) -> FetchedRow {
        match mode {
            FetchMode::Num | FetchMode::None => FetchedRow::Num(values),
            FetchMode::Assoc => {
                FetchedRow::Assoc(self.columns.iter().cloned().zip(values).collect())
            }
            FetchMode::Both => FetchedRow::Both {
                assoc: self
                    .columns
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect(),
                num: values,
            },
            FetchMode::Object => FetchedRow::Object(Row::new(&self.columns, values)),
        }
    }
}

/// Iterates the remaining rows in the query's fetch mode.
impl Iterator for Query {
    type Item = FetchedRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch(self.fetch_mode)
    }
}
