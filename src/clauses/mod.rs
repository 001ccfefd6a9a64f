mod join;
mod where_clause;

pub use join::{Direction, Join, JoinType, OrderBy};
pub use where_clause::{Operand, Operator, WhereClause};

/// Function names and keywords left bare when quoting column expressions.
pub(crate) const EXPRESSION_KEYWORDS: &[&str] = &[
    "DISTINCT", "COUNT", "SUM", "AVG", "MIN", "MAX", "COALESCE", "LOWER", "UPPER", "NULL",
];

/// Keywords left bare when quoting join conditions.
pub(crate) const CONDITION_KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "IS", "NULL", "IN", "LIKE", "BETWEEN", "TRUE", "FALSE",
];
