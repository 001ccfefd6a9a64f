use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::config::Driver;

/// Broad category of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Opening the native connection failed.
    Connection,
    /// Missing or duplicate adapter, missing or contradictory option.
    Configuration,
    /// The native driver rejected a statement (syntax, constraint, permission).
    Query,
    /// The driver or dialect cannot express the requested operation.
    UnsupportedOperation,
    /// Parameter count mismatch or another binding contract violation.
    Integrity,
    /// A call arrived out of sequence (transactions, closed handles).
    InvalidState,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connection => "Connection failed",
            ErrorKind::Configuration => "Configuration error",
            ErrorKind::Query => "Query failed",
            ErrorKind::UnsupportedOperation => "Unsupported operation",
            ErrorKind::Integrity => "Integrity error",
            ErrorKind::InvalidState => "Invalid state",
        };
        f.write_str(name)
    }
}

/// Error type for dbrs operations.
///
/// Every native driver error is converted into a `DbError` before it leaves
/// the adapter. The driver tag is stamped at construction so callers can tell
/// which dialect produced the failure; the native error, if any, is kept as
/// the error source.
#[derive(Debug, Error)]
#[error("{kind}{}: {message}", tag_suffix(.driver, .code))]
pub struct DbError {
    kind: ErrorKind,
    driver: Option<Driver>,
    code: Option<i64>,
    message: String,
    #[source]
    previous: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

fn tag_suffix(driver: &Option<Driver>, code: &Option<i64>) -> String {
    match (driver, code) {
        (Some(driver), Some(code)) => format!(" [{} #{}]", driver, code),
        (Some(driver), None) => format!(" [{}]", driver),
        (None, Some(code)) => format!(" [#{}]", code),
        (None, None) => String::new(),
    }
}

impl DbError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            driver: None,
            code: None,
            message: message.into(),
            previous: None,
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Query, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, message)
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Integrity, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    /// Stamp the dialect tag. An existing tag is kept.
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver.get_or_insert(driver);
        self
    }

    /// Attach the native error code.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach the error that caused this one.
    pub fn with_previous<E>(mut self, previous: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.previous = Some(Box::new(previous));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn driver(&self) -> Option<Driver> {
        self.driver
    }

    pub fn code(&self) -> Option<i64> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error this one wraps, if any.
    pub fn previous(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.previous.as_deref()
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

/// Result type alias for dbrs operations
pub type Result<T> = std::result::Result<T, DbError>;
