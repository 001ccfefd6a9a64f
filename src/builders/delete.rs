use crate::builders::{Compile, CompileContext, CompileMode, CompiledQuery};
use crate::clauses::WhereClause;
use crate::error::Result;
use crate::platform::Platform;

/// DELETE statement builder.
#[derive(Debug, Clone)]
pub struct Delete {
    platform: Platform,
    table: String,
    where_clause: Option<WhereClause>,
}

impl Delete {
    pub(crate) fn new(platform: Platform, table: impl Into<String>) -> Self {
        Self {
            platform,
            table: table.into(),
            where_clause: None,
        }
    }

    super::where_methods!();

    pub fn to_sql(&self) -> Result<String> {
        Ok(self.compile(&self.platform, CompileMode::Literal)?.sql)
    }

    pub fn to_prepared(&self) -> Result<CompiledQuery> {
        self.compile(&self.platform, CompileMode::Parameterized)
    }
}

impl Compile for Delete {
    fn compile(&self, platform: &Platform, mode: CompileMode) -> Result<CompiledQuery> {
        let mut ctx = CompileContext::new(platform, mode);
        let mut sql = format!(
            "DELETE FROM {}",
            platform.quote_identifier_list(&self.table, &[])
        );
        if let Some(ref where_clause) = self.where_clause {
            sql.push_str(" WHERE ");
            let where_sql = where_clause.build_sql(&mut ctx);
            sql.push_str(&where_sql);
        }
        Ok(ctx.finish(sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;

    #[test]
    fn test_delete_with_where() {
        let delete = Delete::new(Platform::new(Driver::Mysqli), "session")
            .where_op("expires_at", "<", 1_700_000_000)
            .unwrap()
            .where_null("user_id");
        let compiled = delete.to_prepared().unwrap();
        assert_eq!(
            compiled.sql,
            "DELETE FROM `session` WHERE (`expires_at` < ?) AND (`user_id` IS NULL)"
        );
        assert_eq!(compiled.params.len(), 1);
    }

    #[test]
    fn test_delete_all() {
        let sql = Delete::new(Platform::new(Driver::MssqlPdo), "dbo.session")
            .to_sql()
            .unwrap();
        assert_eq!(sql, "DELETE FROM [dbo].[session]");
    }
}
