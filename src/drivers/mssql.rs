use std::collections::HashMap;

use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, QueryStream, ToSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::config::{AdapterConfig, SslMode};
use crate::error::{DbError, ErrorKind, Result};
use crate::placeholders::PlaceholderStyle;
use crate::traits::{NativeConnection, NativeDriver, NativeParam, PreparedHandle};
use crate::types::{RawQueryResult, SqlValue};

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server driver implementation using tiberius.
///
/// TDS has no separate prepare step; prepared SQL is kept client side and
/// sent through `sp_executesql` with its parameters on every execution.
#[derive(Debug, Default, Clone, Copy)]
pub struct MssqlDriver;

impl NativeDriver for MssqlDriver {
    fn connect(&self, config: &AdapterConfig) -> Result<Box<dyn NativeConnection>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbError::connection("Cannot start SQL Server runtime").with_previous(e))?;

        let mut tds = Config::new();
        tds.host(&config.server);
        tds.port(config.port());
        tds.authentication(AuthMethod::sql_server(&config.username, &config.password));
        if let Some(db_name) = &config.db_name {
            tds.database(db_name);
        }
        let ssl_mode = config.ssl_mode();
        tds.encryption(match ssl_mode {
            SslMode::Disable => EncryptionLevel::NotSupported,
            SslMode::Prefer => EncryptionLevel::Off,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => EncryptionLevel::Required,
        });
        if !ssl_mode.verifies_certificate() {
            tds.trust_cert();
        }

        let client = match config.connect_timeout() {
            Some(timeout) => runtime
                .block_on(tokio::time::timeout(timeout, open(tds)))
                .map_err(|_| {
                    DbError::connection(format!("Connection timed out after {}s", timeout.as_secs()))
                })??,
            None => runtime.block_on(open(tds))?,
        };
        debug!(server = %config.server, port = config.port(), "SQL Server connection established");

        Ok(Box::new(MssqlConnection {
            runtime,
            client: Some(client),
            statements: HashMap::new(),
            next_handle: 1,
        }))
    }
}

async fn open(tds: Config) -> Result<TdsClient> {
    let addr = tds.get_addr();
    let tcp = TcpStream::connect(&addr).await.map_err(|e| {
        DbError::connection(format!("Cannot reach {}: {}", addr, e)).with_previous(e)
    })?;
    tcp.set_nodelay(true)
        .map_err(|e| DbError::connection("Cannot configure socket").with_previous(e))?;
    Client::connect(tds, tcp.compat_write())
        .await
        .map_err(|e| tds_error(e, ErrorKind::Connection))
}

struct MssqlConnection {
    runtime: Runtime,
    client: Option<TdsClient>,
    statements: HashMap<u64, String>,
    next_handle: u64,
}

/// How a statement has to be sent, judged by its first keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    /// Produces a result set.
    Rows,
    /// Session or transaction control; must run as a plain batch.
    Batch,
    /// Reports an affected-row count.
    Write,
}

impl StatementKind {
    fn of(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match keyword.as_str() {
            "SELECT" | "WITH" | "EXEC" | "EXECUTE" => StatementKind::Rows,
            "BEGIN" | "COMMIT" | "ROLLBACK" | "SAVE" | "SET" | "USE" | "DECLARE" => {
                StatementKind::Batch
            }
            _ => StatementKind::Write,
        }
    }
}

impl MssqlConnection {
    fn run(&mut self, sql: &str, params: &[NativeParam]) -> Result<RawQueryResult> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| DbError::invalid_state("SQL Server connection is closed"))?;
        let converted: Vec<Box<dyn ToSql>> = params.iter().map(|p| to_tds(&p.value)).collect();
        let refs: Vec<&dyn ToSql> = converted.iter().map(|b| b.as_ref()).collect();
        let kind = StatementKind::of(sql);

        self.runtime.block_on(execute(client, kind, sql, &refs))
    }
}

async fn execute(
    client: &mut TdsClient,
    kind: StatementKind,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<RawQueryResult> {
    match kind {
        StatementKind::Batch if params.is_empty() => {
            client
                .simple_query(sql)
                .await
                .map_err(|e| tds_error(e, ErrorKind::Query))?
                .into_results()
                .await
                .map_err(|e| tds_error(e, ErrorKind::Query))?;
            Ok(RawQueryResult::affected(0))
        }
        StatementKind::Rows => {
            let stream = if params.is_empty() {
                client.simple_query(sql).await
            } else {
                client.query(sql, params).await
            }
            .map_err(|e| tds_error(e, ErrorKind::Query))?;
            collect(stream).await
        }
        StatementKind::Batch | StatementKind::Write => {
            let result = client
                .execute(sql, params)
                .await
                .map_err(|e| tds_error(e, ErrorKind::Query))?;
            Ok(RawQueryResult::affected(result.total()))
        }
    }
}

impl NativeConnection for MssqlConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::AtP
    }

    fn query(&mut self, sql: &str) -> Result<RawQueryResult> {
        self.run(sql, &[])
    }

    fn prepare(&mut self, sql: &str) -> Result<PreparedHandle> {
        let handle = PreparedHandle(self.next_handle);
        self.next_handle += 1;
        self.statements.insert(handle.0, sql.to_string());
        Ok(handle)
    }

    fn execute_prepared(
        &mut self,
        handle: PreparedHandle,
        params: &[NativeParam],
    ) -> Result<RawQueryResult> {
        let sql = self
            .statements
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| DbError::invalid_state("Unknown prepared statement"))?;
        self.run(&sql, params)
    }

    fn close_prepared(&mut self, handle: PreparedHandle) -> Result<()> {
        self.statements.remove(&handle.0);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.statements.clear();
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        self.runtime
            .block_on(client.close())
            .map_err(|e| tds_error(e, ErrorKind::Connection))
    }
}

async fn collect(stream: QueryStream<'_>) -> Result<RawQueryResult> {
    let mut stream = stream;
    let columns: Vec<String> = stream
        .columns()
        .await
        .map_err(|e| tds_error(e, ErrorKind::Query))?
        .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = stream
        .into_first_result()
        .await
        .map_err(|e| tds_error(e, ErrorKind::Query))?;
    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().map(from_tds).collect())
        .collect();
    Ok(RawQueryResult::new(columns, rows))
}

fn tds_error(e: tiberius::error::Error, kind: ErrorKind) -> DbError {
    let err = match &e {
        tiberius::error::Error::Server(token) => {
            DbError::new(kind, token.message().to_string()).with_code(i64::from(token.code()))
        }
        other => DbError::new(kind, other.to_string()),
    };
    err.with_previous(e)
}

fn to_tds(value: &SqlValue) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null => Box::new(Option::<String>::None),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::Int(i) => Box::new(*i),
        SqlValue::Float(f) => Box::new(*f),
        SqlValue::Text(s) => Box::new(s.clone()),
        SqlValue::Bytes(b) => Box::new(b.clone()),
    }
}

fn from_tds(data: ColumnData<'static>) -> SqlValue {
    match data {
        ColumnData::U8(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        ColumnData::I16(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        ColumnData::I32(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        ColumnData::I64(v) => v.map_or(SqlValue::Null, SqlValue::Int),
        ColumnData::F32(v) => v.map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v))),
        ColumnData::F64(v) => v.map_or(SqlValue::Null, SqlValue::Float),
        ColumnData::Bit(v) => v.map_or(SqlValue::Null, SqlValue::Bool),
        ColumnData::String(v) => v.map_or(SqlValue::Null, |s| SqlValue::Text(s.into_owned())),
        ColumnData::Binary(v) => v.map_or(SqlValue::Null, |b| SqlValue::Bytes(b.into_owned())),
        ColumnData::Guid(v) => v.map_or(SqlValue::Null, |g| SqlValue::Text(g.to_string())),
        ColumnData::Numeric(v) => v.map_or(SqlValue::Null, |n| SqlValue::Text(n.to_string())),
        // Temporal types are read as text by casting in SQL.
        other => {
            debug!(value = ?other, "undecoded SQL Server value");
            SqlValue::Null
        }
    }
}
