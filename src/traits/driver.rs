use crate::config::AdapterConfig;
use crate::error::Result;
use crate::placeholders::PlaceholderStyle;
use crate::statement::BindType;
use crate::types::{RawQueryResult, SqlValue};

/// Identifier of a statement prepared on a native connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreparedHandle(pub u64);

/// A value handed to the native bind API, with its resolved bind type.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeParam {
    pub value: SqlValue,
    pub bind_type: BindType,
}

/// Trait for native database driver implementations.
/// Drivers are responsible for:
/// - Opening connections from an adapter configuration
/// - Converting bound values to native types
/// - Executing statements and converting results to RawQueryResult
pub trait NativeDriver: Send + Sync {
    /// Open a new connection. Every failure is a `Connection` error.
    fn connect(&self, config: &AdapterConfig) -> Result<Box<dyn NativeConnection>>;
}

/// One open native connection. Calls block until the server answers.
pub trait NativeConnection: Send {
    /// Placeholder syntax `prepare` expects.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Execute SQL with no parameters.
    fn query(&mut self, sql: &str) -> Result<RawQueryResult>;

    /// Prepare SQL written in [`NativeConnection::placeholder_style`].
    fn prepare(&mut self, sql: &str) -> Result<PreparedHandle>;

    /// Execute a prepared statement with positional parameters.
    fn execute_prepared(
        &mut self,
        handle: PreparedHandle,
        params: &[NativeParam],
    ) -> Result<RawQueryResult>;

    /// Release a prepared statement. Unknown handles are ignored.
    fn close_prepared(&mut self, handle: PreparedHandle) -> Result<()>;

    /// Auto-increment id of the most recent insert, when the native API
    /// tracks one.
    fn last_insert_id(&mut self) -> Option<u64> {
        None
    }

    /// Close the connection. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}
