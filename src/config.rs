use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};
use crate::platform::ParameterType;

/// Native driver an adapter talks to.
///
/// Each driver doubles as the capability descriptor for its dialect: what
/// parameter style it binds with, whether it can prepare statements, which
/// joins it can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Driver {
    /// Legacy single-connection MySQL driver, no prepared statements.
    #[serde(rename = "mysql")]
    Mysql,
    /// Improved MySQL driver with native `?` prepared statements.
    #[serde(rename = "mysqli")]
    Mysqli,
    #[serde(rename = "mysql-pdo")]
    MysqlPdo,
    #[serde(rename = "pgsql")]
    Pgsql,
    #[serde(rename = "pgsql-pdo")]
    PgsqlPdo,
    #[serde(rename = "mssql-pdo")]
    MssqlPdo,
}

/// SQL dialect family spoken by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    MySql,
    PostgreSql,
    SqlServer,
}

impl Driver {
    pub const ALL: [Driver; 6] = [
        Driver::Mysql,
        Driver::Mysqli,
        Driver::MysqlPdo,
        Driver::Pgsql,
        Driver::PgsqlPdo,
        Driver::MssqlPdo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Mysqli => "mysqli",
            Driver::MysqlPdo => "mysql-pdo",
            Driver::Pgsql => "pgsql",
            Driver::PgsqlPdo => "pgsql-pdo",
            Driver::MssqlPdo => "mssql-pdo",
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        match self {
            Driver::Mysql | Driver::Mysqli | Driver::MysqlPdo => SqlDialect::MySql,
            Driver::Pgsql | Driver::PgsqlPdo => SqlDialect::PostgreSql,
            Driver::MssqlPdo => SqlDialect::SqlServer,
        }
    }

    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Driver::Mysql => ParameterType::None,
            Driver::Mysqli => ParameterType::Position,
            Driver::Pgsql => ParameterType::Index,
            Driver::MysqlPdo | Driver::PgsqlPdo | Driver::MssqlPdo => ParameterType::Named,
        }
    }

    pub fn supports_prepared(&self) -> bool {
        self.parameter_type() != ParameterType::None
    }

    /// MySQL has no FULL OUTER JOIN.
    pub fn supports_full_join(&self) -> bool {
        self.dialect() != SqlDialect::MySql
    }

    /// Whether `last_insert_id` honours a sequence name.
    pub fn supports_sequences(&self) -> bool {
        self.dialect() == SqlDialect::PostgreSql
    }

    pub fn default_port(&self) -> u16 {
        match self.dialect() {
            SqlDialect::MySql => 3306,
            SqlDialect::PostgreSql => 5432,
            SqlDialect::SqlServer => 1433,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Driver {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        Driver::ALL
            .iter()
            .copied()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DbError::configuration(format!("Unknown driver '{}'", s)))
    }
}

/// TLS negotiation mode, using the PostgreSQL sslmode vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn requires_tls(&self) -> bool {
        matches!(self, SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull)
    }

    pub fn verifies_certificate(&self) -> bool {
        matches!(self, SslMode::VerifyCa | SslMode::VerifyFull)
    }
}

/// Per-driver connection options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterOptions {
    pub port: Option<u16>,
    /// Unix socket path, MySQL family only.
    pub socket: Option<String>,
    pub ssl_mode: Option<SslMode>,
    /// Connect timeout in seconds.
    pub connect_timeout: Option<u64>,
    pub pooled: Option<bool>,
    pub encrypted: Option<bool>,
    /// Session variables applied right after the connection opens.
    pub init: BTreeMap<String, serde_json::Value>,
}

/// Configuration of a single named adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    pub name: String,
    pub driver: Driver,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(default)]
    pub db_name: Option<String>,
    /// Marks this adapter as the manager's default.
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub options: AdapterOptions,
}

impl AdapterConfig {
    pub fn new(name: impl Into<String>, driver: Driver) -> Self {
        Self {
            name: name.into(),
            driver,
            server: String::from("localhost"),
            username: String::new(),
            password: String::new(),
            db_name: None,
            default: false,
            options: AdapterOptions::default(),
        }
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    pub fn options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn port(&self) -> u16 {
        self.options.port.unwrap_or_else(|| self.driver.default_port())
    }

    pub fn ssl_mode(&self) -> SslMode {
        match (self.options.ssl_mode, self.options.encrypted) {
            (Some(mode), _) => mode,
            (None, Some(true)) => SslMode::Require,
            (None, Some(false)) => SslMode::Disable,
            (None, None) => SslMode::default(),
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.options.connect_timeout.map(Duration::from_secs)
    }

    /// Human readable target, never includes the password.
    pub fn display_string(&self) -> String {
        format!(
            "{}://{}@{}:{}/{}",
            self.driver,
            self.username,
            self.server,
            self.port(),
            self.db_name.as_deref().unwrap_or("")
        )
    }

    /// Reject configurations that can never open.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DbError::configuration("Adapter name must not be empty"));
        }
        if let Some(socket) = &self.options.socket {
            if self.driver.dialect() != SqlDialect::MySql {
                return Err(DbError::configuration(format!(
                    "Adapter '{}': option 'socket' is only supported by MySQL drivers",
                    self.name
                ))
                .with_driver(self.driver));
            }
            if socket.is_empty() {
                return Err(DbError::configuration(format!(
                    "Adapter '{}': option 'socket' must not be empty",
                    self.name
                ))
                .with_driver(self.driver));
            }
        } else if self.server.trim().is_empty() {
            return Err(DbError::configuration(format!(
                "Adapter '{}': missing required option 'server'",
                self.name
            ))
            .with_driver(self.driver));
        }
        if let (Some(mode), Some(false)) = (self.options.ssl_mode, self.options.encrypted) {
            if mode.requires_tls() {
                return Err(DbError::configuration(format!(
                    "Adapter '{}': sslMode {:?} contradicts encrypted = false",
                    self.name, mode
                ))
                .with_driver(self.driver));
            }
        }
        Ok(())
    }
}

/// What happens when a name is registered twice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverridePolicy {
    #[default]
    Deny,
    Allow,
}

/// Top-level configuration consumed by [`crate::DbManager::from_config`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig {
    #[serde(default)]
    pub override_policy: OverridePolicy,
    #[serde(default, rename = "adapter")]
    pub adapters: Vec<AdapterConfig>,
}

impl ManagerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            DbError::configuration(format!("Invalid database configuration: {}", e)).with_previous(e)
        })
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DbError::configuration(format!("Cannot read {}: {}", path.display(), e)).with_previous(e)
        })?;
        Self::from_toml_str(&content)
    }
}
