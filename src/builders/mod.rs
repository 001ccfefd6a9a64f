/// WHERE helpers shared by Select, Update and Delete. Expects a
/// `where_clause: Option<WhereClause>` field.
macro_rules! where_methods {
    () => {
        /// Add an equality condition, ANDed with any existing condition.
        pub fn where_<V: Into<$crate::types::SqlValue>>(
            self,
            column: impl Into<String>,
            value: V,
        ) -> Self {
            self.where_clause($crate::clauses::WhereClause::eq(column, value))
        }

        /// Add a condition with an operator string such as `">="`.
        /// Unknown operators fail immediately.
        pub fn where_op<V: Into<$crate::types::SqlValue>>(
            self,
            column: impl Into<String>,
            op: &str,
            value: V,
        ) -> $crate::error::Result<Self> {
            Ok(self.where_clause($crate::clauses::WhereClause::op(column, op, value)?))
        }

        /// Add an equality condition, ORed with the existing condition.
        pub fn or_where<V: Into<$crate::types::SqlValue>>(
            mut self,
            column: impl Into<String>,
            value: V,
        ) -> Self {
            let clause = $crate::clauses::WhereClause::eq(column, value);
            self.where_clause = Some(match self.where_clause.take() {
                Some(existing) => existing.or(clause),
                None => clause,
            });
            self
        }

        pub fn where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
        where
            I: IntoIterator<Item = V>,
            V: Into<$crate::types::SqlValue>,
        {
            self.where_clause($crate::clauses::WhereClause::is_in(column, values))
        }

        pub fn where_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
        where
            I: IntoIterator<Item = V>,
            V: Into<$crate::types::SqlValue>,
        {
            self.where_clause($crate::clauses::WhereClause::not_in(column, values))
        }

        pub fn where_null(self, column: impl Into<String>) -> Self {
            self.where_clause($crate::clauses::WhereClause::is_null(column))
        }

        pub fn where_not_null(self, column: impl Into<String>) -> Self {
            self.where_clause($crate::clauses::WhereClause::is_not_null(column))
        }

        /// AND an arbitrary condition tree onto the WHERE clause.
        pub fn where_clause(mut self, clause: $crate::clauses::WhereClause) -> Self {
            self.where_clause = Some(match self.where_clause.take() {
                Some(existing) => existing.and(clause),
                None => clause,
            });
            self
        }
    };
}

pub(crate) use where_methods;

mod compile;
mod delete;
mod factory;
mod insert;
mod select;
mod update;

pub use self::compile::{Compile, CompileContext, CompileMode, CompiledQuery};
pub use self::delete::Delete;
pub use self::factory::Factory;
pub use self::insert::Insert;
pub use self::select::Select;
pub use self::update::Update;

