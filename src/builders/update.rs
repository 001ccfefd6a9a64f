use crate::builders::{Compile, CompileContext, CompileMode, CompiledQuery};
use crate::clauses::WhereClause;
use crate::error::{DbError, Result};
use crate::platform::Platform;
use crate::types::SqlValue;

/// UPDATE statement builder.
#[derive(Debug, Clone)]
pub struct Update {
    platform: Platform,
    table: String,
    assignments: Vec<(String, SqlValue)>,
    where_clause: Option<WhereClause>,
}

impl Update {
    pub(crate) fn new(platform: Platform, table: impl Into<String>) -> Self {
        Self {
            platform,
            table: table.into(),
            assignments: Vec::new(),
            where_clause: None,
        }
    }

    /// Assign a column. Assigning the same column twice keeps the last value.
    pub fn set<V: Into<SqlValue>>(mut self, column: impl Into<String>, value: V) -> Self {
        let column = column.into();
        let value = value.into();
        match self.assignments.iter_mut().find(|(c, _)| *c == column) {
            Some(existing) => existing.1 = value,
            None => self.assignments.push((column, value)),
        }
        self
    }

    super::where_methods!();

    pub fn to_sql(&self) -> Result<String> {
        Ok(self.compile(&self.platform, CompileMode::Literal)?.sql)
    }

    pub fn to_prepared(&self) -> Result<CompiledQuery> {
        self.compile(&self.platform, CompileMode::Parameterized)
    }

    fn build_sql(&self, ctx: &mut CompileContext<'_>) -> Result<String> {
        if self.assignments.is_empty() {
            return Err(DbError::invalid_state(format!(
                "UPDATE {} has no assignments",
                self.table
            )));
        }
        let platform = *ctx.platform();
        let assignments: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, value)| {
                format!("{} = {}", platform.quote_identifier(column), ctx.bind(column, value))
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            platform.quote_identifier_list(&self.table, &[]),
            assignments.join(", ")
        );
        if let Some(ref where_clause) = self.where_clause {
            sql.push_str(" WHERE ");
            let where_sql = where_clause.build_sql(ctx);
            sql.push_str(&where_sql);
        }
        Ok(sql)
    }
}

impl Compile for Update {
    fn compile(&self, platform: &Platform, mode: CompileMode) -> Result<CompiledQuery> {
        let mut ctx = CompileContext::new(platform, mode);
        let sql = self.build_sql(&mut ctx)?;
        Ok(ctx.finish(sql))
    }
}
