use std::fmt;
use std::str::FromStr;

use crate::builders::CompileContext;
use crate::clauses::EXPRESSION_KEYWORDS;
use crate::error::{DbError, Result};
use crate::types::SqlValue;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "<>" | "!=" => Ok(Operator::NotEq),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::LtEq),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::GtEq),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            _ => Err(DbError::unsupported(format!("Unsupported operator '{}'", s))),
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Inlined or bound depending on the compile mode.
    Value(SqlValue),
    /// Another column, always rendered as a quoted identifier.
    Column(String),
}

/// Represents a WHERE (or HAVING) condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    /// column <op> operand
    Compare {
        column: String,
        op: Operator,
        operand: Operand,
    },
    /// column [NOT] IN (values)
    In {
        column: String,
        values: Vec<SqlValue>,
        negated: bool,
    },
    /// column IS [NOT] NULL
    Null { column: String, negated: bool },
    /// clause AND clause
    And(Box<WhereClause>, Box<WhereClause>),
    /// clause OR clause
    Or(Box<WhereClause>, Box<WhereClause>),
}

impl WhereClause {
    /// Creates an equality condition: column = value
    pub fn eq<V: Into<SqlValue>>(column: impl Into<String>, value: V) -> Self {
        Self::compare(column, Operator::Eq, value)
    }

    /// Creates a comparison with an explicit operator.
    pub fn compare<V: Into<SqlValue>>(column: impl Into<String>, op: Operator, value: V) -> Self {
        WhereClause::Compare {
            column: column.into(),
            op,
            operand: Operand::Value(value.into()),
        }
    }

    /// Creates a comparison from an operator string such as `">="` or
    /// `"not like"`.
    pub fn op<V: Into<SqlValue>>(column: impl Into<String>, op: &str, value: V) -> Result<Self> {
        Ok(Self::compare(column, op.parse()?, value))
    }

    /// Compares two columns: left <op> right
    pub fn columns(left: impl Into<String>, op: Operator, right: impl Into<String>) -> Self {
        WhereClause::Compare {
            column: left.into(),
            op,
            operand: Operand::Column(right.into()),
        }
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        WhereClause::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        WhereClause::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        WhereClause::Null {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        WhereClause::Null {
            column: column.into(),
            negated: true,
        }
    }

    /// Combines this clause with another using AND
    pub fn and(self, other: WhereClause) -> Self {
        WhereClause::And(Box::new(self), Box::new(other))
    }

    /// Combines this clause with another using OR
    pub fn or(self, other: WhereClause) -> Self {
        WhereClause::Or(Box::new(self), Box::new(other))
    }

    /// Builds the SQL fragment, binding or inlining values through `ctx`.
    pub fn build_sql(&self, ctx: &mut CompileContext<'_>) -> String {
        match self {
            WhereClause::Compare {
                column,
                op,
                operand,
            } => {
                let rhs = match operand {
                    Operand::Value(SqlValue::Null) if *op == Operator::Eq => {
                        return format!("{} IS NULL", quote_column(ctx, column));
                    }
                    Operand::Value(SqlValue::Null) if *op == Operator::NotEq => {
                        return format!("{} IS NOT NULL", quote_column(ctx, column));
                    }
                    Operand::Value(value) => ctx.bind(column, value),
                    Operand::Column(other) => quote_column(ctx, other),
                };
                format!("{} {} {}", quote_column(ctx, column), op, rhs)
            }
            WhereClause::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // Nothing is IN an empty set.
                    return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
                }
                let list = values
                    .iter()
                    .map(|v| ctx.bind(column, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", quote_column(ctx, column), keyword, list)
            }
            WhereClause::Null { column, negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {}", quote_column(ctx, column), keyword)
            }
            WhereClause::And(left, right) => {
                let left_sql = left.build_sql(ctx);
                let right_sql = right.build_sql(ctx);
                format!("({}) AND ({})", left_sql, right_sql)
            }
            WhereClause::Or(left, right) => {
                let left_sql = left.build_sql(ctx);
                let right_sql = right.build_sql(ctx);
                format!("({}) OR ({})", left_sql, right_sql)
            }
        }
    }
}

fn quote_column(ctx: &CompileContext<'_>, column: &str) -> String {
    ctx.platform()
        .quote_identifier_list(column, EXPRESSION_KEYWORDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::CompileMode;
    use crate::config::Driver;
    use crate::error::ErrorKind;
    use crate::platform::Platform;

    fn build(driver: Driver, mode: CompileMode, clause: &WhereClause) -> (String, Vec<(String, SqlValue)>) {
        let platform = Platform::new(driver);
        let mut ctx = CompileContext::new(&platform, mode);
        let sql = clause.build_sql(&mut ctx);
        (sql, ctx.into_params())
    }

    #[test]
    fn test_eq_clause() {
        let clause = WhereClause::eq("users.name", "John");
        let (sql, params) = build(Driver::Pgsql, CompileMode::Parameterized, &clause);

        assert_eq!(sql, "\"users\".\"name\" = $1");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].1, SqlValue::Text("John".to_string()));
    }

    #[test]
    fn test_and_clause() {
        let clause = WhereClause::eq("name", "John").and(WhereClause::eq("age", 30));
        let (sql, params) = build(Driver::Pgsql, CompileMode::Parameterized, &clause);

        assert_eq!(sql, "(\"name\" = $1) AND (\"age\" = $2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_literal_mode_inlines_values() {
        let clause = WhereClause::eq("name", "O'Brien").or(WhereClause::is_in("id", [1, 2]));
        let (sql, params) = build(Driver::Mysqli, CompileMode::Literal, &clause);

        assert_eq!(sql, "(`name` = 'O\\'Brien') OR (`id` IN (1, 2))");
        assert!(params.is_empty());
    }

    #[test]
    fn test_named_parameters_follow_column_names() {
        let clause = WhereClause::is_in("u.id", [1, 2]).and(WhereClause::eq("u.id", 3));
        let (sql, params) = build(Driver::MysqlPdo, CompileMode::Parameterized, &clause);

        assert_eq!(sql, "(`u`.`id` IN (:u_id, :u_id_2)) AND (`u`.`id` = :u_id_3)");
        let names: Vec<&str> = params.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["u_id", "u_id_2", "u_id_3"]);
    }

    #[test]
    fn test_null_and_column_operands() {
        let clause = WhereClause::eq("deleted_at", None::<i64>)
            .and(WhereClause::columns("a.id", Operator::Eq, "b.a_id"));
        let (sql, params) = build(Driver::MssqlPdo, CompileMode::Parameterized, &clause);
        assert_eq!(sql, "([deleted_at] IS NULL) AND ([a].[id] = [b].[a_id])");
        assert!(params.is_empty());
    }

    #[test]
    fn test_empty_in_list() {
        let (sql, _) = build(Driver::Mysqli, CompileMode::Literal, &WhereClause::is_in("id", Vec::<i64>::new()));
        assert_eq!(sql, "1 = 0");
        let (sql, _) = build(Driver::Mysqli, CompileMode::Literal, &WhereClause::not_in("id", Vec::<i64>::new()));
        assert_eq!(sql, "1 = 1");
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("not  like".parse::<Operator>().unwrap(), Operator::NotLike);
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::NotEq);
        let err = "<=>".parse::<Operator>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    }
}
