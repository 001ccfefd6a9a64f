use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::adapter::Adapter;
use crate::error::{DbError, Result};
use crate::placeholders::PlaceholderMap;
use crate::platform::ParameterType;
use crate::query::{FetchMode, Query};
use crate::traits::{NativeParam, PreparedHandle};
use crate::types::SqlValue;

/// Declared or inferred scalar kind of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindType {
    /// Infer from the value: numbers bind as doubles, null as null,
    /// everything else as strings.
    #[default]
    Auto,
    Integer,
    Double,
    String,
    Null,
}

impl BindType {
    /// The type `Auto` resolves to for `value`.
    pub fn infer(value: &SqlValue) -> BindType {
        match value {
            SqlValue::Null => BindType::Null,
            SqlValue::Int(_) | SqlValue::Float(_) => BindType::Double,
            _ => BindType::String,
        }
    }

    /// The exact type of a value, used for values collected by builders.
    pub(crate) fn of(value: &SqlValue) -> BindType {
        match value {
            SqlValue::Null => BindType::Null,
            SqlValue::Int(_) | SqlValue::Bool(_) => BindType::Integer,
            SqlValue::Float(_) => BindType::Double,
            SqlValue::Text(_) | SqlValue::Bytes(_) => BindType::String,
        }
    }

    /// Resolve `Auto` and coerce `value` to the resolved type.
    fn apply(self, name: &str, value: SqlValue) -> Result<(SqlValue, BindType)> {
        let resolved = match self {
            BindType::Auto => BindType::infer(&value),
            other => other,
        };
        let mismatch = |value: &SqlValue| {
            DbError::integrity(format!(
                "Parameter '{}': cannot bind {:?} as {:?}",
                name, value, resolved
            ))
        };
        let coerced = match (resolved, value) {
            (BindType::Null, _) | (_, SqlValue::Null) => SqlValue::Null,
            (BindType::Integer, value) => match value.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => return Err(mismatch(&value)),
            },
            (BindType::Double, SqlValue::Int(i)) => SqlValue::Int(i),
            (BindType::Double, value) => match value.as_f64() {
                Some(f) => SqlValue::Float(f),
                None => return Err(mismatch(&value)),
            },
            (BindType::String, SqlValue::Bytes(b)) => SqlValue::Bytes(b),
            (BindType::String, SqlValue::Text(s)) => SqlValue::Text(s),
            (BindType::String, value) => SqlValue::Text(value.to_string()),
            (BindType::Auto, value) => value,
        };
        let resolved = if coerced.is_null() { BindType::Null } else { resolved };
        Ok((coerced, resolved))
    }
}

/// A prepared statement bound to one adapter.
///
/// Holds the native prepared handle and an ordered map of bound parameters.
/// The adapter stays mutably borrowed for the statement's lifetime, so a
/// statement can never outlive its connection or be used concurrently with
/// it. Dropping the statement releases the native handle.
#[derive(Debug)]
pub struct Statement<'a> {
    adapter: &'a mut Adapter,
    handle: Option<PreparedHandle>,
    sql: String,
    placeholders: PlaceholderMap,
    native_order: Vec<usize>,
    params: IndexMap<String, (SqlValue, BindType)>,
}

impl<'a> Statement<'a> {
    pub(crate) fn new(
        adapter: &'a mut Adapter,
        handle: PreparedHandle,
        sql: String,
        placeholders: PlaceholderMap,
        native_order: Vec<usize>,
    ) -> Self {
        Self {
            adapter,
            handle: Some(handle),
            sql,
            placeholders,
            native_order,
            params: IndexMap::new(),
        }
    }

    /// SQL as prepared, in the adapter's parameter style.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of distinct placeholders the SQL declares.
    pub fn param_count(&self) -> usize {
        self.placeholders.len()
    }

    /// Number of parameters bound so far.
    pub fn bound_count(&self) -> usize {
        self.params.len()
    }

    /// Bound value and resolved type of a parameter.
    pub fn bound(&self, name: &str) -> Option<&(SqlValue, BindType)> {
        let name = self.adapter.platform().normalize_parameter_name(name);
        self.params.get(name)
    }

    /// Bind a value by name.
    ///
    /// Positional dialects send values in first-bind order; rebinding a name
    /// replaces its value in place. Indexed and named dialects refuse names
    /// the SQL does not declare.
    pub fn bind_value<V: Into<SqlValue>>(
        &mut self,
        name: &str,
        value: V,
        bind_type: BindType,
    ) -> Result<()> {
        let platform = *self.adapter.platform();
        let name = platform.normalize_parameter_name(name);
        if platform.parameter_type() != ParameterType::Position
            && self.placeholders.slot(name).is_none()
        {
            return Err(DbError::integrity(format!(
                "Parameter '{}' is not declared by the statement",
                name
            ))
            .with_driver(platform.driver()));
        }
        let bound = bind_type.apply(name, value.into())?;
        self.params.insert(name.to_string(), bound);
        Ok(())
    }

    /// Bind several values with inferred types.
    pub fn bind_values<I, S, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<SqlValue>,
    {
        for (name, value) in values {
            self.bind_value(name.as_ref(), value, BindType::Auto)?;
        }
        Ok(())
    }

    /// Bind a builder-collected value, recording a failure on the adapter.
    pub(crate) fn bind_exact(&mut self, name: &str, value: SqlValue) -> Result<()> {
        let bind_type = BindType::of(&value);
        self.bind_value(name, value, bind_type)
            .map_err(|e| self.adapter.record(e))
    }

    /// Forget every bound value. The native handle stays prepared.
    pub fn clear_binds(&mut self) {
        self.params.clear();
    }

    /// Run the statement with the current bindings.
    pub fn execute(&mut self, fetch_mode: FetchMode) -> Result<Query> {
        let handle = self
            .handle
            .ok_or_else(|| DbError::invalid_state("Statement has been closed"))?;
        let native = self.native_params()?;
        debug!(sql = %self.sql, params = native.len(), "executing prepared statement");
        self.adapter.execute_prepared(handle, &native, fetch_mode)
    }

    /// Release the native handle.
    pub fn close(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.adapter.close_prepared(handle),
            None => Ok(()),
        }
    }

    /// Resolve bound values into native positional order.
    fn native_params(&self) -> Result<Vec<NativeParam>> {
        let platform = self.adapter.platform();
        let declared = self.placeholders.len();
        if declared != self.params.len() {
            return Err(DbError::integrity(format!(
                "Statement declares {} parameter(s) but {} are bound",
                declared,
                self.params.len()
            ))
            .with_driver(platform.driver()));
        }

        let mut slots = Vec::with_capacity(declared);
        for (index, name) in self.placeholders.names().iter().enumerate() {
            let bound = match platform.parameter_type() {
                ParameterType::Position => self.params.get_index(index).map(|(_, v)| v),
                _ => self.params.get(name.as_str()),
            };
            let (value, bind_type) = bound.ok_or_else(|| {
                DbError::integrity(format!("Parameter '{}' is not bound", name))
                    .with_driver(platform.driver())
            })?;
            slots.push(NativeParam {
                value: value.clone(),
                bind_type: *bind_type,
            });
        }

        Ok(self
            .native_order
            .iter()
            .filter_map(|slot| slots.get(*slot).cloned())
            .collect())
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.adapter.close_prepared(handle) {
                warn!(error = %e, "failed to release prepared statement");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_auto_inference() {
        assert_eq!(
            BindType::Auto.apply("id", SqlValue::Int(5)).unwrap(),
            (SqlValue::Int(5), BindType::Double)
        );
        assert_eq!(
            BindType::Auto.apply("ratio", SqlValue::Float(0.5)).unwrap(),
            (SqlValue::Float(0.5), BindType::Double)
        );
        assert_eq!(
            BindType::Auto.apply("name", SqlValue::Null).unwrap(),
            (SqlValue::Null, BindType::Null)
        );
        assert_eq!(
            BindType::Auto.apply("name", SqlValue::from("x")).unwrap(),
            (SqlValue::from("x"), BindType::String)
        );
        assert_eq!(
            BindType::Auto.apply("flag", SqlValue::Bool(true)).unwrap(),
            (SqlValue::from("true"), BindType::String)
        );
    }

    #[test]
    fn test_explicit_null_forces_null() {
        assert_eq!(
            BindType::Null.apply("name", SqlValue::from("x")).unwrap(),
            (SqlValue::Null, BindType::Null)
        );
    }

    #[test]
    fn test_explicit_coercions() {
        assert_eq!(
            BindType::Integer.apply("id", SqlValue::from("42")).unwrap(),
            (SqlValue::Int(42), BindType::Integer)
        );
        assert_eq!(
            BindType::Double.apply("x", SqlValue::from("1.5")).unwrap(),
            (SqlValue::Float(1.5), BindType::Double)
        );
        assert_eq!(
            BindType::String.apply("x", SqlValue::Int(7)).unwrap(),
            (SqlValue::from("7"), BindType::String)
        );
        let err = BindType::Integer.apply("id", SqlValue::from("abc")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }
}
