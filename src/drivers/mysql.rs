use std::collections::HashMap;
use std::sync::Mutex;

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, Params, Pool, PooledConn, SslOpts, Value};
use tracing::debug;

use crate::config::{AdapterConfig, SslMode};
use crate::error::{DbError, ErrorKind, Result};
use crate::placeholders::PlaceholderStyle;
use crate::traits::{NativeConnection, NativeDriver, NativeParam, PreparedHandle};
use crate::types::{RawQueryResult, SqlValue};

/// MySQL driver implementation using the `mysql` crate.
///
/// Serves every MySQL flavour; the adapter decides whether statements may
/// be prepared. With the `pooled` option the driver keeps a pool and hands
/// its connections back on close, so reopening reuses them.
#[derive(Default)]
pub struct MysqlDriver {
    pool: Mutex<Option<Pool>>,
}

impl MysqlDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn pooled_conn(&self, opts: Opts) -> Result<PooledConn> {
        let mut guard = self
            .pool
            .lock()
            .map_err(|_| DbError::connection("MySQL pool lock poisoned"))?;
        let pool = match guard.as_ref() {
            Some(pool) => pool.clone(),
            None => {
                let pool = Pool::new(opts).map_err(|e| mysql_error(e, ErrorKind::Connection))?;
                *guard = Some(pool.clone());
                pool
            }
        };
        pool.get_conn().map_err(|e| mysql_error(e, ErrorKind::Connection))
    }
}

impl NativeDriver for MysqlDriver {
    fn connect(&self, config: &AdapterConfig) -> Result<Box<dyn NativeConnection>> {
        let opts = Opts::from(build_opts(config));
        let handle = if config.options.pooled.unwrap_or(false) {
            ConnHandle::Pooled(self.pooled_conn(opts)?)
        } else {
            ConnHandle::Direct(Conn::new(opts).map_err(|e| mysql_error(e, ErrorKind::Connection))?)
        };
        debug!(server = %config.server, port = config.port(), "MySQL connection established");
        Ok(Box::new(MysqlConnection {
            handle: Some(handle),
            statements: HashMap::new(),
            next_handle: 1,
        }))
    }
}

fn build_opts(config: &AdapterConfig) -> OptsBuilder {
    let mut builder = OptsBuilder::new()
        .user(Some(config.username.as_str()))
        .pass(Some(config.password.as_str()))
        .db_name(config.db_name.as_deref())
        .tcp_connect_timeout(config.connect_timeout());
    builder = match &config.options.socket {
        Some(socket) => builder.socket(Some(socket.as_str())),
        None => builder
            .ip_or_hostname(Some(config.server.as_str()))
            .tcp_port(config.port()),
    };
    let ssl = match config.ssl_mode() {
        SslMode::Disable | SslMode::Prefer => None,
        SslMode::Require => Some(
            SslOpts::default()
                .with_danger_accept_invalid_certs(true)
                .with_danger_skip_domain_validation(true),
        ),
        SslMode::VerifyCa => Some(SslOpts::default().with_danger_skip_domain_validation(true)),
        SslMode::VerifyFull => Some(SslOpts::default()),
    };
    builder.ssl_opts(ssl)
}

enum ConnHandle {
    Direct(Conn),
    Pooled(PooledConn),
}

impl ConnHandle {
    fn conn(&mut self) -> &mut Conn {
        match self {
            ConnHandle::Direct(conn) => conn,
            ConnHandle::Pooled(conn) => conn.as_mut(),
        }
    }
}

struct MysqlConnection {
    handle: Option<ConnHandle>,
    statements: HashMap<u64, mysql::Statement>,
    next_handle: u64,
}

impl MysqlConnection {
    fn conn(&mut self) -> Result<&mut Conn> {
        self.handle
            .as_mut()
            .map(ConnHandle::conn)
            .ok_or_else(|| DbError::invalid_state("MySQL connection is closed"))
    }
}

impl NativeConnection for MysqlConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    fn query(&mut self, sql: &str) -> Result<RawQueryResult> {
        let conn = self.conn()?;
        let result = conn
            .query_iter(sql)
            .map_err(|e| mysql_error(e, ErrorKind::Query))?;
        collect(result)
    }

    fn prepare(&mut self, sql: &str) -> Result<PreparedHandle> {
        let statement = self
            .conn()?
            .prep(sql)
            .map_err(|e| mysql_error(e, ErrorKind::Query))?;
        let handle = PreparedHandle(self.next_handle);
        self.next_handle += 1;
        self.statements.insert(handle.0, statement);
        Ok(handle)
    }

    fn execute_prepared(
        &mut self,
        handle: PreparedHandle,
        params: &[NativeParam],
    ) -> Result<RawQueryResult> {
        let statement = self
            .statements
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| DbError::invalid_state("Unknown prepared statement"))?;
        let values: Vec<Value> = params.iter().map(|p| to_mysql_value(&p.value)).collect();
        let params = if values.is_empty() {
            Params::Empty
        } else {
            Params::Positional(values)
        };
        let result = self
            .conn()?
            .exec_iter(&statement, params)
            .map_err(|e| mysql_error(e, ErrorKind::Query))?;
        collect(result)
    }

    fn close_prepared(&mut self, handle: PreparedHandle) -> Result<()> {
        let Some(statement) = self.statements.remove(&handle.0) else {
            return Ok(());
        };
        self.conn()?
            .close(statement)
            .map_err(|e| mysql_error(e, ErrorKind::Query))
    }

    fn last_insert_id(&mut self) -> Option<u64> {
        let id = self.conn().ok()?.last_insert_id();
        (id != 0).then_some(id)
    }

    fn close(&mut self) -> Result<()> {
        self.statements.clear();
        // Direct connections close on drop; pooled ones return to the pool.
        self.handle.take();
        Ok(())
    }
}

/// Drain the current result set of a text or binary query.
fn collect<P: mysql::prelude::Protocol>(
    mut result: mysql::QueryResult<'_, '_, '_, P>,
) -> Result<RawQueryResult> {
    let columns: Vec<String> = result
        .columns()
        .as_ref()
        .iter()
        .map(|c| c.name_str().to_string())
        .collect();

    let mut rows = Vec::new();
    for row in result.by_ref() {
        let row = row.map_err(|e| mysql_error(e, ErrorKind::Query))?;
        rows.push(
            (0..row.len())
                .map(|i| row.as_ref(i).cloned().map_or(SqlValue::Null, from_mysql_value))
                .collect(),
        );
    }

    let raw = if columns.is_empty() {
        RawQueryResult::affected(result.affected_rows())
    } else {
        RawQueryResult::new(columns, rows)
    };
    Ok(match result.last_insert_id() {
        Some(id) if id != 0 => raw.with_last_insert_id(id),
        _ => raw,
    })
}

fn mysql_error(e: mysql::Error, kind: ErrorKind) -> DbError {
    let err = match &e {
        mysql::Error::MySqlError(server) => {
            DbError::new(kind, server.message.clone()).with_code(i64::from(server.code))
        }
        other => DbError::new(kind, other.to_string()),
    };
    err.with_previous(e)
}

fn to_mysql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
    }
}

fn from_mysql_value(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => SqlValue::Int(i),
            Err(_) => SqlValue::Text(u.to_string()),
        },
        Value::Float(f) => SqlValue::Float(f64::from(f)),
        Value::Double(d) => SqlValue::Float(d),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let mut text = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            );
            if micros != 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            SqlValue::Text(text)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let hours = u64::from(days) * 24 + u64::from(hours);
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                if negative { "-" } else { "" },
                hours,
                minutes,
                seconds
            );
            if micros != 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            SqlValue::Text(text)
        }
    }
}
