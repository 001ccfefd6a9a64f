use crate::builders::{Compile, CompileContext, CompileMode, CompiledQuery};
use crate::error::{DbError, Result};
use crate::platform::Platform;
use crate::types::SqlValue;

/// INSERT statement builder.
///
/// Either list columns and add one or more rows with [`Insert::values`], or
/// assign single-row values column by column with [`Insert::set`].
#[derive(Debug, Clone)]
pub struct Insert {
    platform: Platform,
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    assignments: Vec<(String, SqlValue)>,
}

impl Insert {
    pub(crate) fn new(platform: Platform, table: impl Into<String>) -> Self {
        Self {
            platform,
            table: table.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            assignments: Vec::new(),
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add a row. Its arity must match the column list.
    pub fn values<I, V>(mut self, row: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let row: Vec<SqlValue> = row.into_iter().map(Into::into).collect();
        if row.len() != self.columns.len() {
            return Err(DbError::integrity(format!(
                "INSERT INTO {} lists {} column(s) but a row has {} value(s)",
                self.table,
                self.columns.len(),
                row.len()
            )));
        }
        self.rows.push(row);
        Ok(self)
    }

    /// Assign a single column of a single-row insert.
    pub fn set<V: Into<SqlValue>>(mut self, column: impl Into<String>, value: V) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn to_sql(&self) -> Result<String> {
        Ok(self.compile(&self.platform, CompileMode::Literal)?.sql)
    }

    pub fn to_prepared(&self) -> Result<CompiledQuery> {
        self.compile(&self.platform, CompileMode::Parameterized)
    }

    fn build_sql(&self, ctx: &mut CompileContext<'_>) -> Result<String> {
        let (columns, rows): (Vec<&String>, Vec<Vec<&SqlValue>>) =
            match (self.assignments.is_empty(), self.rows.is_empty()) {
                (false, true) if self.columns.is_empty() => (
                    self.assignments.iter().map(|(c, _)| c).collect(),
                    vec![self.assignments.iter().map(|(_, v)| v).collect()],
                ),
                (true, false) => (
                    self.columns.iter().collect(),
                    self.rows.iter().map(|row| row.iter().collect()).collect(),
                ),
                (true, true) => {
                    return Err(DbError::invalid_state(format!(
                        "INSERT INTO {} has no values",
                        self.table
                    )))
                }
                _ => {
                    return Err(DbError::invalid_state(format!(
                        "INSERT INTO {} mixes set() with columns()/values()",
                        self.table
                    )))
                }
            };

        let platform = *ctx.platform();
        let quoted_columns: Vec<String> = columns
            .iter()
            .map(|c| platform.quote_identifier(c))
            .collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ",
            platform.quote_identifier_list(&self.table, &[]),
            quoted_columns.join(", ")
        );
        let rendered_rows: Vec<String> = rows
            .iter()
            .map(|row| {
                let values: Vec<String> = columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| ctx.bind(column, value))
                    .collect();
                format!("({})", values.join(", "))
            })
            .collect();
        sql.push_str(&rendered_rows.join(", "));
        Ok(sql)
    }
}

impl Compile for Insert {
    fn compile(&self, platform: &Platform, mode: CompileMode) -> Result<CompiledQuery> {
        let mut ctx = CompileContext::new(platform, mode);
        let sql = self.build_sql(&mut ctx)?;
        Ok(ctx.finish(sql))
    }
}
