use std::sync::Arc;

use crate::config::{Driver, SqlDialect};
use crate::error::{DbError, Result};
use crate::traits::NativeDriver;

#[cfg(feature = "mssql")]
mod mssql;
#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "pgsql")]
mod postgres;

pub use self::in_memory_test::{InMemoryTestDriver, InMemoryTestResponseBuilder, RecordedQuery};
#[cfg(feature = "mssql")]
pub use self::mssql::MssqlDriver;
#[cfg(feature = "mysql")]
pub use self::mysql::MysqlDriver;
#[cfg(feature = "pgsql")]
pub use self::postgres::PostgresDriver;

/// Native driver serving `driver`, if its family is compiled in.
pub fn native_driver(driver: Driver) -> Result<Arc<dyn NativeDriver>> {
    match driver.dialect() {
        #[cfg(feature = "mysql")]
        SqlDialect::MySql => Ok(Arc::new(MysqlDriver::new())),
        #[cfg(feature = "pgsql")]
        SqlDialect::PostgreSql => Ok(Arc::new(PostgresDriver)),
        #[cfg(feature = "mssql")]
        SqlDialect::SqlServer => Ok(Arc::new(MssqlDriver)),
        #[allow(unreachable_patterns)]
        _ => Err(DbError::configuration(format!(
            "Driver '{}' is not compiled into this build",
            driver
        ))
        .with_driver(driver)),
    }
}
