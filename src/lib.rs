//! dbrs - A dialect-aware database adapter layer with a fluent query builder
//!
//! One [`Adapter`] owns one native connection to a MySQL, PostgreSQL or
//! SQL Server database. Builders obtained from the adapter's [`Factory`]
//! compile either to literal SQL for [`Adapter::query`] or to placeholder
//! SQL for [`Adapter::prepare_query`], in the adapter's own dialect.
//!
//! # Example
//! ```no_run
//! use dbrs::{AdapterConfig, DbManager, Driver, FetchMode, OverridePolicy};
//!
//! # fn main() -> dbrs::Result<()> {
//! let mut manager = DbManager::new(OverridePolicy::Deny);
//! manager.register(
//!     "default",
//!     AdapterConfig::new("default", Driver::Mysqli)
//!         .server("db.internal")
//!         .credentials("app", "secret")
//!         .db_name("shop"),
//! )?;
//!
//! let adapter = manager.default_adapter().expect("registered above");
//! let select = adapter
//!     .builder_factory()
//!     .select(["id", "name"])
//!     .from("user")
//!     .where_("username", "bob");
//!
//! if let Some(mut statement) = adapter.prepare_query(&select)? {
//!     let mut query = statement.execute(FetchMode::Assoc)?;
//!     while let Some(row) = query.fetch_assoc() {
//!         println!("{:?}", row);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod builders;
pub mod clauses;
pub mod config;
pub mod drivers;
pub mod error;
pub mod manager;
pub mod placeholders;
pub mod platform;
pub mod query;
pub mod statement;
pub mod traits;
pub mod types;

// Re-export main types for convenient access
pub use adapter::{Adapter, AdapterState};
pub use builders::{Compile, CompileMode, CompiledQuery, Delete, Factory, Insert, Select, Update};
pub use clauses::{Direction, JoinType, Operator, WhereClause};
pub use config::{AdapterConfig, AdapterOptions, Driver, ManagerConfig, OverridePolicy, SqlDialect, SslMode};
pub use error::{DbError, ErrorKind, Result};
pub use manager::DbManager;
pub use platform::{ParameterType, Platform};
pub use query::{FetchMode, FetchedRow, Query};
pub use statement::{BindType, Statement};
pub use traits::{NativeConnection, NativeDriver};
pub use types::{RawQueryResult, Row, SqlValue};
