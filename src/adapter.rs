use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::builders::{Compile, CompileMode, Factory};
use crate::config::{AdapterConfig, Driver};
use crate::drivers;
use crate::error::{DbError, ErrorKind, Result};
use crate::placeholders;
use crate::platform::Platform;
use crate::query::{FetchMode, Query};
use crate::statement::Statement;
use crate::traits::{NativeConnection, NativeDriver, NativeParam, PreparedHandle};
use crate::types::{RawQueryResult, SqlValue};

/// Connection lifecycle of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Closed,
    Opened,
    InTransaction,
}

/// One named connection to one database server.
///
/// The connection opens lazily on the first statement and stays open until
/// [`Adapter::close`] or drop. Failures are returned as [`DbError`] and also
/// recorded, so [`Adapter::error_code`] and [`Adapter::error_message`]
/// describe the most recent failed call.
pub struct Adapter {
    config: AdapterConfig,
    platform: Platform,
    native_driver: Arc<dyn NativeDriver>,
    connection: Option<Box<dyn NativeConnection>>,
    state: AdapterState,
    last_error: Option<(Option<i64>, String)>,
    last_insert_id: Option<u64>,
}

impl Adapter {
    /// Create an adapter backed by the native driver compiled in for
    /// `config.driver`. Nothing is opened yet.
    pub fn new(config: AdapterConfig) -> Result<Self> {
        let native_driver = drivers::native_driver(config.driver)?;
        Self::with_driver(config, native_driver)
    }

    /// Create an adapter over a caller-supplied native driver.
    pub fn with_driver(config: AdapterConfig, native_driver: Arc<dyn NativeDriver>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            platform: Platform::new(config.driver),
            config,
            native_driver,
            connection: None,
            state: AdapterState::Closed,
            last_error: None,
            last_insert_id: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn driver(&self) -> Driver {
        self.config.driver
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != AdapterState::Closed
    }

    pub fn in_transaction(&self) -> bool {
        self.state == AdapterState::InTransaction
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Factory for builders speaking this adapter's dialect.
    pub fn builder_factory(&self) -> Factory {
        Factory::new(self.platform)
    }

    /// Native error code of the most recent failed call.
    pub fn error_code(&self) -> Option<i64> {
        self.last_error.as_ref().and_then(|(code, _)| *code)
    }

    /// Message of the most recent failed call.
    pub fn error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|(_, message)| message.as_str())
    }

    /// Open the native connection and apply the `init` session settings.
    /// Opening an open adapter does nothing.
    pub fn open(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        debug!(adapter = %self.config.name, target = %self.config.display_string(), "opening connection");
        let mut connection = match self.native_driver.connect(&self.config) {
            Ok(connection) => connection,
            Err(e) => {
                let e = self.connection_error(e);
                return Err(self.record(e));
            }
        };

        let init = self.config.options.init.clone();
        for (key, value) in &init {
            let sql = self.platform.set_session_sql(key, &SqlValue::from_json(value));
            debug!(sql = %sql, "applying session setting");
            if let Err(e) = connection.query(&sql) {
                if let Err(close_err) = connection.close() {
                    warn!(error = %close_err, "failed to close connection after init failure");
                }
                let e = DbError::connection(format!(
                    "Adapter '{}': init setting '{}' failed",
                    self.config.name, key
                ))
                .with_driver(self.config.driver)
                .with_previous(e);
                return Err(self.record(e));
            }
        }

        self.connection = Some(connection);
        self.state = AdapterState::Opened;
        self.last_error = None;
        info!(adapter = %self.config.name, driver = %self.config.driver, "connection opened");
        Ok(())
    }

    /// Close the native connection. Closing a closed adapter does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };
        if self.state == AdapterState::InTransaction {
            warn!(adapter = %self.config.name, "closing connection with an open transaction");
        }
        self.state = AdapterState::Closed;
        let result = connection.close();
        info!(adapter = %self.config.name, "connection closed");
        result.map_err(|e| self.record(e))
    }

    /// Execute a raw SQL string or a builder with values inlined.
    pub fn query<Q: Compile + ?Sized>(&mut self, sql: &Q) -> Result<Query> {
        let compiled = sql
            .compile(&self.platform, CompileMode::Literal)
            .map_err(|e| self.record(e))?;
        let raw = self.run(&compiled.sql)?;
        Ok(Query::new(raw, FetchMode::default()))
    }

    /// Prepare a raw SQL string or a builder.
    ///
    /// Returns `Ok(None)` when the driver cannot prepare statements. Values a
    /// builder collected are bound before the statement is returned.
    pub fn prepare_query<Q: Compile + ?Sized>(&mut self, sql: &Q) -> Result<Option<Statement<'_>>> {
        if !self.config.driver.supports_prepared() {
            debug!(driver = %self.config.driver, "driver has no prepared statements");
            return Ok(None);
        }

        let compiled = sql
            .compile(&self.platform, CompileMode::Parameterized)
            .map_err(|e| self.record(e))?;
        let declared = placeholders::scan(&compiled.sql, &self.platform);

        let connection = self.connection()?;
        let (native_sql, native_order) = declared.rewrite(&compiled.sql, connection.placeholder_style());
        debug!(sql = %compiled.sql, native = %native_sql, "preparing statement");
        let handle = match connection.prepare(&native_sql) {
            Ok(handle) => handle,
            Err(e) => {
                let e = self.query_error(e);
                return Err(self.record(e));
            }
        };
        self.last_error = None;

        let mut statement = Statement::new(self, handle, compiled.sql, declared, native_order);
        for (name, value) in compiled.params {
            statement.bind_exact(&name, value)?;
        }
        Ok(Some(statement))
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.state == AdapterState::InTransaction {
            let e = DbError::invalid_state("A transaction is already in progress")
                .with_driver(self.config.driver);
            return Err(self.record(e));
        }
        self.run(self.platform.begin_transaction_sql())?;
        self.state = AdapterState::InTransaction;
        info!(adapter = %self.config.name, "transaction started");
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.end_transaction(self.platform.commit_sql())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.end_transaction(self.platform.rollback_sql())
    }

    /// Id generated by the most recent insert.
    ///
    /// `sequence` names the PostgreSQL sequence to read; other dialects
    /// ignore it.
    pub fn last_insert_id(&mut self, sequence: Option<&str>) -> Result<u64> {
        if sequence.is_some() && !self.config.driver.supports_sequences() {
            debug!(driver = %self.config.driver, "ignoring sequence name");
        }
        let Some(sql) = self.platform.last_insert_id_sql(sequence) else {
            let native = self.connection()?.last_insert_id();
            return Ok(native.or(self.last_insert_id).unwrap_or(0));
        };

        let raw = self.run(&sql)?;
        let id = raw
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(SqlValue::as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(id).unwrap_or(0))
    }

    /// Column names of `table`, in declaration order.
    pub fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        let (sql, column) = self.platform.column_names_sql(table);
        let mut query = match self.query(&sql) {
            Ok(query) => query,
            Err(e) => {
                let e = DbError::query(format!("Cannot read columns of table '{}'", table))
                    .with_driver(self.config.driver)
                    .with_previous(e);
                return Err(self.record(e));
            }
        };

        let mut names = Vec::new();
        while let Some(row) = query.fetch_object() {
            let name = row
                .get(column)
                .or_else(|| row.get(&column.to_uppercase()))
                .or_else(|| row.get_index(0));
            if let Some(SqlValue::Text(name)) = name {
                names.push(name.clone());
            }
        }
        Ok(names)
    }

    pub(crate) fn execute_prepared(
        &mut self,
        handle: PreparedHandle,
        params: &[NativeParam],
        fetch_mode: FetchMode,
    ) -> Result<Query> {
        let result = self.connection()?.execute_prepared(handle, params);
        let raw = self.finish(result)?;
        Ok(Query::new(raw, fetch_mode))
    }

    pub(crate) fn close_prepared(&mut self, handle: PreparedHandle) -> Result<()> {
        match self.connection.as_mut() {
            Some(connection) => connection.close_prepared(handle),
            None => Ok(()),
        }
    }

    fn end_transaction(&mut self, sql: &str) -> Result<()> {
        if self.state != AdapterState::InTransaction {
            let e = DbError::invalid_state("No transaction is in progress")
                .with_driver(self.config.driver);
            return Err(self.record(e));
        }
        self.run(sql)?;
        self.state = AdapterState::Opened;
        info!(adapter = %self.config.name, sql, "transaction finished");
        Ok(())
    }

    /// Open if needed and hand out the native connection.
    fn connection(&mut self) -> Result<&mut Box<dyn NativeConnection>> {
        self.open()?;
        match self.connection.as_mut() {
            Some(connection) => Ok(connection),
            None => Err(DbError::invalid_state("Connection is not open").with_driver(self.config.driver)),
        }
    }

    fn run(&mut self, sql: &str) -> Result<RawQueryResult> {
        debug!(adapter = %self.config.name, sql, "executing query");
        let result = self.connection()?.query(sql);
        self.finish(result)
    }

    fn finish(&mut self, result: Result<RawQueryResult>) -> Result<RawQueryResult> {
        match result {
            Ok(raw) => {
                self.last_error = None;
                if raw.last_insert_id.is_some() {
                    self.last_insert_id = raw.last_insert_id;
                }
                Ok(raw)
            }
            Err(e) => {
                let e = self.query_error(e);
                Err(self.record(e))
            }
        }
    }

    fn query_error(&self, e: DbError) -> DbError {
        e.with_driver(self.config.driver)
    }

    fn connection_error(&self, e: DbError) -> DbError {
        if e.is(ErrorKind::Connection) {
            e.with_driver(self.config.driver)
        } else {
            DbError::connection(format!(
                "Adapter '{}': cannot connect to {}",
                self.config.name,
                self.config.display_string()
            ))
            .with_driver(self.config.driver)
            .with_previous(e)
        }
    }

    /// Remember `e` as the most recent failure and hand it back.
    pub(crate) fn record(&mut self, e: DbError) -> DbError {
        warn!(adapter = %self.config.name, error = %e, "database call failed");
        self.last_error = Some((e.code(), e.message().to_string()));
        e
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.config.name)
            .field("driver", &self.config.driver)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close connection on drop");
        }
    }
}
