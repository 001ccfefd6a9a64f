use crate::config::{Driver, SqlDialect};
use crate::types::SqlValue;

/// How a dialect spells bind placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    /// No native binding; values must be inlined.
    None,
    /// `?`
    Position,
    /// `$1`, `$2`, ...
    Index,
    /// `:name`
    Named,
}

/// Per-dialect quoting and parameter-style rules.
///
/// A `Platform` is a pure function of its driver. It holds no counters: the
/// builders number their placeholders per compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    driver: Driver,
}

impl Platform {
    pub fn new(driver: Driver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn dialect(&self) -> SqlDialect {
        self.driver.dialect()
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.driver.parameter_type()
    }

    /// Quote a single identifier, escaping the dialect's closing quote.
    pub fn quote_identifier(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        match self.dialect() {
            SqlDialect::MySql => {
                out.push('`');
                out.push_str(&name.replace('`', "``"));
                out.push('`');
            }
            SqlDialect::SqlServer => {
                out.push('[');
                out.push_str(&name.replace(']', "]]"));
                out.push(']');
            }
            SqlDialect::PostgreSql => {
                out.push('"');
                for c in name.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            }
        }
        out
    }

    /// Quote every identifier token of an expression such as
    /// `table.column AS alias`.
    ///
    /// Delimiters (`.`, whitespace, `*`, any other non identifier character)
    /// are copied through, as are single-quoted literals. The dialect's own
    /// quote characters belong to the token and get escaped. The keyword `AS`,
    /// purely numeric tokens and any token found in `skip` (case-insensitive)
    /// stay bare.
    pub fn quote_identifier_list(&self, expr: &str, skip: &[&str]) -> String {
        let mut out = String::with_capacity(expr.len() + 8);
        let mut token = String::new();
        let mut in_literal = false;
        for c in expr.chars() {
            if in_literal {
                out.push(c);
                // A doubled quote closes and reopens, which nets out.
                in_literal = c != '\'';
            } else if c == '\'' {
                self.flush_token(&mut out, &mut token, skip);
                out.push(c);
                in_literal = true;
            } else if is_identifier_char(c) || self.is_identifier_quote(c) {
                token.push(c);
            } else {
                self.flush_token(&mut out, &mut token, skip);
                out.push(c);
            }
        }
        self.flush_token(&mut out, &mut token, skip);
        out
    }

    /// Quote characters stay inside their token so `quote_identifier`
    /// escapes them.
    fn is_identifier_quote(&self, c: char) -> bool {
        match self.dialect() {
            SqlDialect::MySql => c == '`',
            SqlDialect::PostgreSql => c == '"',
            SqlDialect::SqlServer => c == '[' || c == ']',
        }
    }

    fn flush_token(&self, out: &mut String, token: &mut String, skip: &[&str]) {
        if token.is_empty() {
            return;
        }
        let bare = token.eq_ignore_ascii_case("AS")
            || token.chars().all(|c| c.is_ascii_digit())
            || skip.iter().any(|s| s.eq_ignore_ascii_case(token));
        if bare {
            out.push_str(token);
        } else {
            out.push_str(&self.quote_identifier(token));
        }
        token.clear();
    }

    /// Render a value as a SQL literal.
    pub fn quote_value(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) if f.is_finite() => {
                let rendered = f.to_string();
                if rendered.contains(['.', 'e', 'E']) {
                    rendered
                } else {
                    format!("{}.0", rendered)
                }
            }
            SqlValue::Float(_) => "NULL".to_string(),
            SqlValue::Bool(b) => match (self.dialect(), b) {
                (SqlDialect::PostgreSql, true) => "TRUE".to_string(),
                (SqlDialect::PostgreSql, false) => "FALSE".to_string(),
                (_, true) => "1".to_string(),
                (_, false) => "0".to_string(),
            },
            SqlValue::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                match self.dialect() {
                    SqlDialect::PostgreSql => format!("'\\x{}'::bytea", hex),
                    SqlDialect::MySql | SqlDialect::SqlServer if hex.is_empty() => {
                        "''".to_string()
                    }
                    SqlDialect::MySql | SqlDialect::SqlServer => format!("0x{}", hex),
                }
            }
            SqlValue::Text(s) => self.quote_string(s),
        }
    }

    /// Quote a string literal with the dialect's escaping rules.
    pub fn quote_string(&self, value: &str) -> String {
        match self.dialect() {
            SqlDialect::MySql => {
                let mut out = String::with_capacity(value.len() + 2);
                out.push('\'');
                for c in value.chars() {
                    match c {
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '"' => out.push_str("\\\""),
                        '\x1a' => out.push_str("\\Z"),
                        c => out.push(c),
                    }
                }
                out.push('\'');
                out
            }
            SqlDialect::SqlServer => format!("'{}'", value.replace('\'', "''")),
            SqlDialect::PostgreSql => {
                // Same output as libpq's PQescapeLiteral.
                let doubled = value.replace('\'', "''");
                if value.contains('\\') {
                    format!("E'{}'", doubled.replace('\\', "\\\\"))
                } else {
                    format!("'{}'", doubled)
                }
            }
        }
    }

    /// Render the placeholder for a parameter name.
    pub fn format_parameter_name(&self, name: &str) -> String {
        match self.parameter_type() {
            ParameterType::None | ParameterType::Position => "?".to_string(),
            ParameterType::Index => format!("${}", name.trim_start_matches('$')),
            ParameterType::Named => format!(":{}", name.trim_start_matches(':')),
        }
    }

    /// Strip placeholder sigils so `:id`, `$1` and `id` address the same slot.
    pub fn normalize_parameter_name<'a>(&self, name: &'a str) -> &'a str {
        match self.parameter_type() {
            ParameterType::Index => name.trim_start_matches('$'),
            ParameterType::Named => name.trim_start_matches(':'),
            ParameterType::None | ParameterType::Position => name,
        }
    }

    pub(crate) fn begin_transaction_sql(&self) -> &'static str {
        match self.dialect() {
            SqlDialect::MySql => "START TRANSACTION",
            SqlDialect::PostgreSql => "BEGIN",
            SqlDialect::SqlServer => "BEGIN TRANSACTION",
        }
    }

    pub(crate) fn commit_sql(&self) -> &'static str {
        match self.dialect() {
            SqlDialect::SqlServer => "COMMIT TRANSACTION",
            _ => "COMMIT",
        }
    }

    pub(crate) fn rollback_sql(&self) -> &'static str {
        match self.dialect() {
            SqlDialect::SqlServer => "ROLLBACK TRANSACTION",
            _ => "ROLLBACK",
        }
    }

    /// Metadata query listing the columns of `table`, and the result column
    /// holding each name.
    pub(crate) fn column_names_sql(&self, table: &str) -> (String, &'static str) {
        match self.dialect() {
            SqlDialect::MySql => (
                format!("DESCRIBE {}", self.quote_identifier_list(table, &[])),
                "Field",
            ),
            SqlDialect::PostgreSql | SqlDialect::SqlServer => (
                format!(
                    "SELECT column_name FROM information_schema.columns \
                     WHERE table_name = {} ORDER BY ordinal_position",
                    self.quote_string(table)
                ),
                "column_name",
            ),
        }
    }

    /// Statement reading back a generated id, when the driver has no native
    /// accessor for it.
    pub(crate) fn last_insert_id_sql(&self, sequence: Option<&str>) -> Option<String> {
        match self.dialect() {
            SqlDialect::MySql => None,
            SqlDialect::SqlServer => Some("SELECT CAST(@@IDENTITY AS BIGINT)".to_string()),
            SqlDialect::PostgreSql => Some(match sequence {
                Some(seq) => format!("SELECT currval({})", self.quote_string(seq)),
                None => "SELECT lastval()".to_string(),
            }),
        }
    }

    /// Session variable assignment for the `init` option.
    pub(crate) fn set_session_sql(&self, key: &str, value: &SqlValue) -> String {
        let value = self.quote_value(value);
        match self.dialect() {
            SqlDialect::MySql => format!("SET {} = {}", key, value),
            SqlDialect::PostgreSql => format!("SET {} TO {}", key, value),
            SqlDialect::SqlServer => format!("SET {} {}", key, value),
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mysql() -> Platform {
        Platform::new(Driver::Mysqli)
    }

    fn pgsql() -> Platform {
        Platform::new(Driver::Pgsql)
    }

    fn mssql() -> Platform {
        Platform::new(Driver::MssqlPdo)
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(mysql().quote_identifier("a`b"), "`a``b`");
        assert_eq!(mssql().quote_identifier("a]b"), "[a]]b]");
        assert_eq!(pgsql().quote_identifier("a\"b"), "\"a\\\"b\"");
        assert_eq!(pgsql().quote_identifier("user"), "\"user\"");
    }

    #[test]
    fn test_quote_identifier_list_with_alias() {
        assert_eq!(
            mysql().quote_identifier_list("t.col AS alias", &[]),
            "`t`.`col` AS `alias`"
        );
        assert_eq!(
            mssql().quote_identifier_list("t.col as alias", &[]),
            "[t].[col] as [alias]"
        );
        assert_eq!(
            pgsql().quote_identifier_list("t.col AS alias", &[]),
            "\"t\".\"col\" AS \"alias\""
        );
    }

    #[test]
    fn test_quote_identifier_list_star_and_skip() {
        assert_eq!(mysql().quote_identifier_list("u.*", &[]), "`u`.*");
        assert_eq!(mysql().quote_identifier_list("*", &[]), "*");
        assert_eq!(
            mysql().quote_identifier_list("COUNT(*) AS total", &["count"]),
            "COUNT(*) AS `total`"
        );
        assert_eq!(
            pgsql().quote_identifier_list("u.id = p.user_id", &[]),
            "\"u\".\"id\" = \"p\".\"user_id\""
        );
    }

    #[test]
    fn test_quote_identifier_list_escapes_embedded_quotes() {
        assert_eq!(pgsql().quote_identifier_list("a\"b", &[]), "\"a\\\"b\"");
        assert_eq!(mysql().quote_identifier_list("t.a`b", &[]), "`t`.`a``b`");
        assert_eq!(mssql().quote_identifier_list("a]b AS c", &[]), "[a]]b] AS [c]");
    }

    #[test]
    fn test_quote_value() {
        let p = mysql();
        assert_eq!(p.quote_value(&SqlValue::Null), "NULL");
        assert_eq!(p.quote_value(&SqlValue::Int(-4)), "-4");
        assert_eq!(p.quote_value(&SqlValue::Float(2.0)), "2.0");
        assert_eq!(p.quote_value(&SqlValue::Float(f64::NAN)), "NULL");
        assert_eq!(p.quote_value(&SqlValue::Bool(true)), "1");
        assert_eq!(pgsql().quote_value(&SqlValue::Bool(false)), "FALSE");
        assert_eq!(p.quote_value(&SqlValue::Bytes(vec![0xde, 0xad])), "0xdead");
        assert_eq!(
            pgsql().quote_value(&SqlValue::Bytes(vec![0x01])),
            "'\\x01'::bytea"
        );
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(mysql().quote_string("O'Brien\n"), "'O\\'Brien\\n'");
        assert_eq!(mssql().quote_string("O'Brien"), "'O''Brien'");
        assert_eq!(pgsql().quote_string("O'Brien"), "'O''Brien'");
        assert_eq!(pgsql().quote_string("C:\\tmp"), "E'C:\\\\tmp'");
    }

    #[test]
    fn test_format_parameter_name() {
        assert_eq!(mysql().format_parameter_name("id"), "?");
        assert_eq!(Platform::new(Driver::Mysql).format_parameter_name("id"), "?");
        assert_eq!(pgsql().format_parameter_name("3"), "$3");
        assert_eq!(pgsql().format_parameter_name("$3"), "$3");
        assert_eq!(mssql().format_parameter_name("id"), ":id");
        assert_eq!(mssql().format_parameter_name(":id"), ":id");
        assert_eq!(mssql().normalize_parameter_name(":id"), "id");
    }

    #[test]
    fn test_dialect_statements() {
        assert_eq!(mysql().begin_transaction_sql(), "START TRANSACTION");
        assert_eq!(mssql().rollback_sql(), "ROLLBACK TRANSACTION");
        assert_eq!(
            mysql().column_names_sql("user"),
            ("DESCRIBE `user`".to_string(), "Field")
        );
        assert_eq!(mysql().last_insert_id_sql(Some("ignored")), None);
        assert_eq!(
            pgsql().last_insert_id_sql(Some("user_id_seq")).as_deref(),
            Some("SELECT currval('user_id_seq')")
        );
        assert_eq!(
            pgsql().last_insert_id_sql(None).as_deref(),
            Some("SELECT lastval()")
        );
        assert_eq!(
            mysql().set_session_sql("sql_mode", &SqlValue::from("ANSI")),
            "SET sql_mode = 'ANSI'"
        );
    }

    proptest! {
        #[test]
        fn prop_backtick_quoting_escapes_exactly_once(name in "[a-z`]{0,12}") {
            let quoted = mysql().quote_identifier(&name);
            let inner = &quoted[1..quoted.len() - 1];
            prop_assert_eq!(inner.replace("``", "`"), name.clone());
            prop_assert_eq!(inner.matches('`').count(), name.matches('`').count() * 2);
        }

        #[test]
        fn prop_identifier_list_keeps_dots_and_as(
            table in "[a-z][a-z0-9_]{0,8}",
            column in "[a-z][a-z0-9_]{0,8}",
            alias in "[a-z][a-z0-9_]{0,8}",
        ) {
            prop_assume!(!alias.eq_ignore_ascii_case("as"));
            prop_assume!(!table.eq_ignore_ascii_case("as"));
            prop_assume!(!column.eq_ignore_ascii_case("as"));
            let expr = format!("{}.{} AS {}", table, column, alias);
            for platform in [mysql(), pgsql(), mssql()] {
                let expected = format!(
                    "{}.{} AS {}",
                    platform.quote_identifier(&table),
                    platform.quote_identifier(&column),
                    platform.quote_identifier(&alias)
                );
                prop_assert_eq!(platform.quote_identifier_list(&expr, &[]), expected);
            }
        }
    }
}
