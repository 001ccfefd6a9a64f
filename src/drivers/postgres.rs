use std::collections::HashMap;

use postgres_native_tls::MakeTlsConnector;
use tokio::runtime::Runtime;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, SimpleQueryMessage, Socket};
use tracing::{debug, error};

use crate::config::{AdapterConfig, SslMode};
use crate::error::{DbError, Result};
use crate::placeholders::PlaceholderStyle;
use crate::traits::{NativeConnection, NativeDriver, NativeParam, PreparedHandle};
use crate::types::{RawQueryResult, SqlValue};

/// PostgreSQL driver implementation using tokio-postgres.
///
/// Every call blocks on a private current-thread runtime owned by the
/// connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDriver;

impl NativeDriver for PostgresDriver {
    fn connect(&self, config: &AdapterConfig) -> Result<Box<dyn NativeConnection>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbError::connection("Cannot start PostgreSQL runtime").with_previous(e))?;

        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.server)
            .port(config.port())
            .user(&config.username)
            .password(&config.password);
        if let Some(db_name) = &config.db_name {
            pg.dbname(db_name);
        }
        if let Some(timeout) = config.connect_timeout() {
            pg.connect_timeout(timeout);
        }

        let ssl_mode = config.ssl_mode();
        pg.ssl_mode(match ssl_mode {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
                tokio_postgres::config::SslMode::Require
            }
        });

        let client = match ssl_mode {
            SslMode::Disable => runtime.block_on(spawn_connection(&pg, NoTls))?,
            mode => {
                let tls = tls_connector(mode)?;
                runtime.block_on(spawn_connection(&pg, tls))?
            }
        };
        debug!(server = %config.server, port = config.port(), "PostgreSQL connection established");

        Ok(Box::new(PostgresConnection {
            runtime,
            client: Some(client),
            statements: HashMap::new(),
            next_handle: 1,
        }))
    }
}

/// Connect and drive the connection future on the current runtime.
async fn spawn_connection<T>(config: &tokio_postgres::Config, tls: T) -> Result<Client>
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let (client, connection) = config.connect(tls).await.map_err(|e| {
        DbError::connection(format!("Failed to connect to PostgreSQL: {}", e)).with_previous(e)
    })?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "PostgreSQL connection error");
        }
    });

    Ok(client)
}

fn tls_connector(mode: SslMode) -> Result<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    if !mode.verifies_certificate() {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    } else if mode == SslMode::VerifyCa {
        builder.danger_accept_invalid_hostnames(true);
    }
    let connector = builder
        .build()
        .map_err(|e| DbError::connection("Failed to build TLS connector").with_previous(e))?;
    Ok(MakeTlsConnector::new(connector))
}

struct PostgresConnection {
    runtime: Runtime,
    client: Option<Client>,
    statements: HashMap<u64, tokio_postgres::Statement>,
    next_handle: u64,
}

impl PostgresConnection {
    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| DbError::invalid_state("PostgreSQL connection is closed"))
    }
}

impl NativeConnection for PostgresConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }

    fn query(&mut self, sql: &str) -> Result<RawQueryResult> {
        let client = self.client()?;
        let messages = self
            .runtime
            .block_on(client.simple_query(sql))
            .map_err(query_error)?;

        let mut columns: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        let mut affected = None;
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(description) => {
                    columns = Some(description.iter().map(|c| c.name().to_string()).collect());
                }
                SimpleQueryMessage::Row(row) => {
                    if columns.is_none() {
                        columns = Some(row.columns().iter().map(|c| c.name().to_string()).collect());
                    }
                    let values = (0..row.len())
                        .map(|i| match row.get(i) {
                            Some(text) => SqlValue::Text(text.to_string()),
                            None => SqlValue::Null,
                        })
                        .collect();
                    rows.push(values);
                }
                SimpleQueryMessage::CommandComplete(count) => affected = Some(count),
                _ => {}
            }
        }

        Ok(simple_query_result(columns, rows, affected))
    }

    fn prepare(&mut self, sql: &str) -> Result<PreparedHandle> {
        let client = self.client()?;
        let statement = self
            .runtime
            .block_on(client.prepare(sql))
            .map_err(query_error)?;
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
        let client = self.client()?;
        let statement = self
            .statements
            .get(&handle.0)
            .ok_or_else(|| DbError::invalid_state("Unknown prepared statement"))?;
        if statement.params().len() != params.len() {
            return Err(DbError::integrity(format!(
                "Statement expects {} parameter(s), got {}",
                statement.params().len(),
                params.len()
            )));
        }

        let converted: Vec<Box<dyn ToSql + Sync + Send>> = params
            .iter()
            .zip(statement.params())
            .map(|(param, ty)| sql_value_to_tosql(&param.value, ty))
            .collect::<Result<_>>()?;
        let param_refs: Vec<&(dyn ToSql + Sync)> = converted
            .iter()
            .map(|b| b.as_ref() as &(dyn ToSql + Sync))
            .collect();

        if statement.columns().is_empty() {
            let count = self
                .runtime
                .block_on(client.execute(statement, &param_refs))
                .map_err(query_error)?;
            return Ok(RawQueryResult::affected(count));
        }

        let rows = self
            .runtime
            .block_on(client.query(statement, &param_refs))
            .map_err(query_error)?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let result_rows = rows
            .iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(i, col)| row_value(row, i, col.type_()))
                    .collect()
            })
            .collect();
        Ok(RawQueryResult::new(columns, result_rows))
    }

    fn close_prepared(&mut self, handle: PreparedHandle) -> Result<()> {
        // Dropping the statement deallocates it on the server.
        self.statements.remove(&handle.0);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.statements.clear();
        self.client.take();
        Ok(())
    }
}

fn query_error(e: tokio_postgres::Error) -> DbError {
    let (code, message) = match e.as_db_error() {
        Some(db) => (db.code().code().to_string(), db.message().to_string()),
        None => (String::new(), e.to_string()),
    };
    let mut err = if code.is_empty() {
        DbError::query(message)
    } else {
        DbError::query(format!("[{}] {}", code, message))
    };
    // SQLSTATE is alphanumeric; only the purely numeric ones fit the code slot.
    if let Ok(numeric) = code.parse::<i64>() {
        err = err.with_code(numeric);
    }
    err.with_previous(e)
}

/// Convert a SqlValue to a boxed ToSql accepted by the declared type.
fn sql_value_to_tosql(value: &SqlValue, ty: &Type) -> Result<Box<dyn ToSql + Sync + Send>> {
    let mismatch = || {
        DbError::integrity(format!("Cannot send {:?} as PostgreSQL {}", value, ty))
    };
    let int = |value: &SqlValue| -> Result<Option<i64>> {
        match value {
            SqlValue::Null => Ok(None),
            SqlValue::Bool(b) => Ok(Some(i64::from(*b))),
            other => other.as_i64().map(Some).ok_or_else(mismatch),
        }
    };

    let boxed: Box<dyn ToSql + Sync + Send> = match *ty {
        Type::BOOL => Box::new(match value {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(*b),
            SqlValue::Text(s) => Some(matches!(s.as_str(), "t" | "true" | "1" | "TRUE" | "on")),
            other => Some(other.as_i64().ok_or_else(mismatch)? != 0),
        }),
        Type::INT2 => Box::new(
            int(value)?
                .map(i16::try_from)
                .transpose()
                .map_err(|_| mismatch())?,
        ),
        Type::INT4 => Box::new(
            int(value)?
                .map(i32::try_from)
                .transpose()
                .map_err(|_| mismatch())?,
        ),
        Type::INT8 => Box::new(int(value)?),
        Type::OID => Box::new(
            int(value)?
                .map(u32::try_from)
                .transpose()
                .map_err(|_| mismatch())?,
        ),
        Type::FLOAT4 => Box::new(match value {
            SqlValue::Null => None,
            other => Some(other.as_f64().ok_or_else(mismatch)? as f32),
        }),
        Type::FLOAT8 => Box::new(match value {
            SqlValue::Null => None,
            other => Some(other.as_f64().ok_or_else(mismatch)?),
        }),
        Type::BYTEA => Box::new(match value {
            SqlValue::Null => None,
            SqlValue::Bytes(b) => Some(b.clone()),
            other => Some(other.to_string().into_bytes()),
        }),
        Type::JSON | Type::JSONB => Box::new(match value {
            SqlValue::Null => None,
            SqlValue::Text(s) => {
                Some(serde_json::from_str::<serde_json::Value>(s).map_err(|_| mismatch())?)
            }
            other => Some(serde_json::Value::from(other.to_string())),
        }),
        _ => Box::new(match value {
            SqlValue::Null => None,
            other => Some(other.to_string()),
        }),
    };
    Ok(boxed)
}

/// Convert a row value at a given index to a SqlValue.
fn row_value(row: &tokio_postgres::Row, index: usize, ty: &Type) -> SqlValue {
    fn get<'a, T, F>(row: &'a tokio_postgres::Row, index: usize, f: F) -> SqlValue
    where
        T: tokio_postgres::types::FromSql<'a>,
        F: FnOnce(T) -> SqlValue,
    {
        row.try_get::<_, Option<T>>(index)
            .ok()
            .flatten()
            .map(f)
            .unwrap_or(SqlValue::Null)
    }

    match *ty {
        Type::BOOL => get(row, index, SqlValue::Bool),
        Type::INT2 => get(row, index, |v: i16| SqlValue::Int(i64::from(v))),
        Type::INT4 => get(row, index, |v: i32| SqlValue::Int(i64::from(v))),
        Type::INT8 => get(row, index, SqlValue::Int),
        Type::OID => get(row, index, |v: u32| SqlValue::Int(i64::from(v))),
        Type::FLOAT4 => get(row, index, |v: f32| SqlValue::Float(f64::from(v))),
        Type::FLOAT8 => get(row, index, SqlValue::Float),
        Type::BYTEA => get(row, index, SqlValue::Bytes),
        Type::JSON | Type::JSONB => {
            get(row, index, |v: serde_json::Value| SqlValue::Text(v.to_string()))
        }
        _ => get(row, index, SqlValue::Text),
    }
}

/// A statement that described a row set is a read, even when it returned no
/// rows. Anything else reports the count of its command tag.
fn simple_query_result(
    columns: Option<Vec<String>>,
    rows: Vec<Vec<SqlValue>>,
    affected: Option<u64>,
) -> RawQueryResult {
    match columns {
        Some(columns) => RawQueryResult::new(columns, rows),
        None => RawQueryResult::affected(affected.unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_select_keeps_result_set() {
        let result = simple_query_result(Some(vec!["id".to_string()]), Vec::new(), Some(0));
        assert!(result.is_result_set());
        assert_eq!(result.columns, ["id"]);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_command_without_description_reports_count() {
        let result = simple_query_result(None, Vec::new(), Some(3));
        assert!(!result.is_result_set());
        assert_eq!(result.affected_rows, Some(3));
    }

    #[test]
    fn test_params_follow_declared_type() {
        assert!(sql_value_to_tosql(&SqlValue::from("42"), &Type::INT4).is_ok());
        assert!(sql_value_to_tosql(&SqlValue::Null, &Type::INT8).is_ok());
        assert!(sql_value_to_tosql(&SqlValue::Float(1.5), &Type::FLOAT8).is_ok());
        assert!(sql_value_to_tosql(&SqlValue::from("bob"), &Type::TEXT).is_ok());
    }

    #[test]
    fn test_param_conversion_rejects_mismatches() {
        let err = sql_value_to_tosql(&SqlValue::from("abc"), &Type::INT4).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Integrity);
        assert!(sql_value_to_tosql(&SqlValue::Int(70_000), &Type::INT2).is_err());
    }
}
