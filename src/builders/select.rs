use crate::builders::{Compile, CompileContext, CompileMode, CompiledQuery};
use crate::clauses::{Direction, Join, JoinType, OrderBy, WhereClause, EXPRESSION_KEYWORDS};
use crate::config::SqlDialect;
use crate::error::{DbError, Result};
use crate::platform::Platform;

/// Largest LIMIT MySQL accepts, used when only an offset is given.
const MYSQL_MAX_LIMIT: &str = "18446744073709551615";

/// SELECT statement builder.
///
/// Joins the platform cannot express fail when they are added, so a
/// finished builder always compiles to SQL its dialect understands.
#[derive(Debug, Clone)]
pub struct Select {
    platform: Platform,
    distinct: bool,
    columns: Vec<String>,
    from: Option<(String, Option<String>)>,
    joins: Vec<Join>,
    where_clause: Option<WhereClause>,
    group_by: Vec<String>,
    having: Option<WhereClause>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    pub(crate) fn new(platform: Platform) -> Self {
        Self {
            platform,
            distinct: false,
            columns: Vec::new(),
            from: None,
            joins: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Add columns to select. No columns means `*`.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Specify the table to select from.
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some((table.into(), None));
        self
    }

    /// Specify the table to select from, under an alias.
    pub fn from_as(mut self, table: impl Into<String>, alias: impl Into<String>) -> Self {
        self.from = Some((table.into(), Some(alias.into())));
        self
    }

    /// Add a join of the given type. Fails with `UnsupportedOperation`
    /// when the dialect has no such join.
    pub fn join(
        mut self,
        kind: JoinType,
        table: impl Into<String>,
        condition: impl Into<String>,
        alias: Option<&str>,
    ) -> Result<Self> {
        let join = Join::new(&self.platform, kind, table, condition, alias)?;
        self.joins.push(join);
        Ok(self)
    }

    pub fn inner_join(
        self,
        table: impl Into<String>,
        condition: impl Into<String>,
        alias: Option<&str>,
    ) -> Result<Self> {
        self.join(JoinType::Inner, table, condition, alias)
    }

    pub fn left_join(
        self,
        table: impl Into<String>,
        condition: impl Into<String>,
        alias: Option<&str>,
    ) -> Result<Self> {
        self.join(JoinType::Left, table, condition, alias)
    }

    pub fn right_join(
        self,
        table: impl Into<String>,
        condition: impl Into<String>,
        alias: Option<&str>,
    ) -> Result<Self> {
        self.join(JoinType::Right, table, condition, alias)
    }

    pub fn full_join(
        self,
        table: impl Into<String>,
        condition: impl Into<String>,
        alias: Option<&str>,
    ) -> Result<Self> {
        self.join(JoinType::Full, table, condition, alias)
    }

    super::where_methods!();

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    /// AND a condition onto the HAVING clause.
    pub fn having(mut self, clause: WhereClause) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(clause),
            None => clause,
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    /// Add a LIMIT to the query.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Compile with values inlined.
    pub fn to_sql(&self) -> Result<String> {
        Ok(self.compile(&self.platform, CompileMode::Literal)?.sql)
    }

    /// Compile with placeholders in this builder's dialect.
    pub fn to_prepared(&self) -> Result<CompiledQuery> {
        self.compile(&self.platform, CompileMode::Parameterized)
    }

    fn build_sql(&self, ctx: &mut CompileContext<'_>) -> Result<String> {
        let platform = *ctx.platform();
        let dialect = platform.dialect();
        let (table, alias) = self
            .from
            .as_ref()
            .ok_or_else(|| DbError::invalid_state("SELECT has no FROM table"))?;

        let mut sql = String::with_capacity(256);

        // SELECT clause
        sql.push_str("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        let top = dialect == SqlDialect::SqlServer && self.offset.is_none();
        if let (true, Some(limit)) = (top, self.limit) {
            sql.push_str(&format!("TOP {} ", limit));
        }
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let columns: Vec<String> = self
                .columns
                .iter()
                .map(|c| platform.quote_identifier_list(c, EXPRESSION_KEYWORDS))
                .collect();
            sql.push_str(&columns.join(", "));
        }

        // FROM clause
        sql.push_str(" FROM ");
        sql.push_str(&platform.quote_identifier_list(table, &[]));
        if let Some(alias) = alias {
            sql.push_str(" AS ");
            sql.push_str(&platform.quote_identifier(alias));
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.build_sql(&platform)?);
        }

        // WHERE clause
        if let Some(ref where_clause) = self.where_clause {
            sql.push_str(" WHERE ");
            let where_sql = where_clause.build_sql(ctx);
            sql.push_str(&where_sql);
        }

        if !self.group_by.is_empty() {
            let groups: Vec<String> = self
                .group_by
                .iter()
                .map(|c| platform.quote_identifier_list(c, EXPRESSION_KEYWORDS))
                .collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups.join(", "));
        }

        if let Some(ref having) = self.having {
            sql.push_str(" HAVING ");
            let having_sql = having.build_sql(ctx);
            sql.push_str(&having_sql);
        }

        let paged_server = dialect == SqlDialect::SqlServer && self.offset.is_some();
        if !self.order_by.is_empty() {
            let orders: Vec<String> = self.order_by.iter().map(|o| o.build_sql(&platform)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        } else if paged_server {
            // OFFSET ... FETCH requires an ORDER BY.
            sql.push_str(" ORDER BY (SELECT NULL)");
        }

        // LIMIT clause
        match dialect {
            SqlDialect::SqlServer => {
                if let Some(offset) = self.offset {
                    sql.push_str(&format!(" OFFSET {} ROWS", offset));
                    if let Some(limit) = self.limit {
                        sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
                    }
                }
            }
            SqlDialect::MySql | SqlDialect::PostgreSql => {
                match (self.limit, self.offset) {
                    (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
                    (None, Some(_)) if dialect == SqlDialect::MySql => {
                        sql.push_str(" LIMIT ");
                        sql.push_str(MYSQL_MAX_LIMIT);
                    }
                    _ => {}
                }
                if let Some(offset) = self.offset {
                    sql.push_str(&format!(" OFFSET {}", offset));
                }
            }
        }

        Ok(sql)
    }
}

impl Compile for Select {
    fn compile(&self, platform: &Platform, mode: CompileMode) -> Result<CompiledQuery> {
        let mut ctx = CompileContext::new(platform, mode);
        let sql = self.build_sql(&mut ctx)?;
        Ok(ctx.finish(sql))
    }
}
