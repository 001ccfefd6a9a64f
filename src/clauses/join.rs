use std::fmt;

use crate::clauses::CONDITION_KEYWORDS;
use crate::error::{DbError, Result};
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One JOIN of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinType,
    pub table: String,
    pub condition: String,
    pub alias: Option<String>,
}

impl Join {
    /// Record a join, refusing join types the platform cannot express.
    pub fn new(
        platform: &Platform,
        kind: JoinType,
        table: impl Into<String>,
        condition: impl Into<String>,
        alias: Option<&str>,
    ) -> Result<Self> {
        check_supported(platform, kind)?;
        Ok(Self {
            kind,
            table: table.into(),
            condition: condition.into(),
            alias: alias.map(str::to_string),
        })
    }

    /// Render the join for `platform`, which may differ from the one the
    /// join was recorded against.
    pub fn build_sql(&self, platform: &Platform) -> Result<String> {
        check_supported(platform, self.kind)?;
        let mut sql = format!(
            "{} {}",
            self.kind,
            platform.quote_identifier_list(&self.table, &[])
        );
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&platform.quote_identifier(alias));
        }
        sql.push_str(" ON ");
        sql.push_str(&platform.quote_identifier_list(&self.condition, CONDITION_KEYWORDS));
        Ok(sql)
    }
}

fn check_supported(platform: &Platform, kind: JoinType) -> Result<()> {
    if kind == JoinType::Full && !platform.driver().supports_full_join() {
        return Err(DbError::unsupported(format!(
            "{} cannot express FULL JOIN",
            platform.driver()
        ))
        .with_driver(platform.driver()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn build_sql(&self, platform: &Platform) -> String {
        let direction = match self.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        format!(
            "{} {}",
            platform.quote_identifier_list(&self.column, super::EXPRESSION_KEYWORDS),
            direction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;
    use crate::error::ErrorKind;

    #[test]
    fn test_join_sql() {
        let platform = Platform::new(Driver::Mysqli);
        let join = Join::new(
            &platform,
            JoinType::Left,
            "profile",
            "p.user_id = u.id AND p.state = 'active'",
            Some("p"),
        )
        .unwrap();
        assert_eq!(
            join.build_sql(&platform).unwrap(),
            "LEFT JOIN `profile` AS `p` ON `p`.`user_id` = `u`.`id` AND `p`.`state` = 'active'"
        );
    }

    #[test]
    fn test_full_join_refused_on_mysql() {
        for driver in [Driver::Mysql, Driver::Mysqli, Driver::MysqlPdo] {
            let err = Join::new(&Platform::new(driver), JoinType::Full, "t", "a = b", None)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
            assert_eq!(err.driver(), Some(driver));
        }
        assert!(Join::new(&Platform::new(Driver::Pgsql), JoinType::Full, "t", "a = b", None).is_ok());
    }

    #[test]
    fn test_full_join_rechecked_when_rendered() {
        let join = Join::new(&Platform::new(Driver::Pgsql), JoinType::Full, "t", "a = b", None)
            .unwrap();
        assert_eq!(
            join.build_sql(&Platform::new(Driver::PgsqlPdo)).unwrap(),
            "FULL JOIN \"t\" ON \"a\" = \"b\""
        );
        let err = join.build_sql(&Platform::new(Driver::Mysqli)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(err.driver(), Some(Driver::Mysqli));
    }

    #[test]
    fn test_order_by() {
        let order = OrderBy {
            column: "u.created_at".to_string(),
            direction: Direction::Desc,
        };
        assert_eq!(
            order.build_sql(&Platform::new(Driver::MssqlPdo)),
            "[u].[created_at] DESC"
        );
    }
}
