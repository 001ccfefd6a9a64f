use crate::error::Result;
use crate::platform::{ParameterType, Platform};
use crate::types::SqlValue;

/// How values reach the compiled SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Values are inlined with `Platform::quote_value`.
    Literal,
    /// Values are replaced by placeholders and returned alongside the SQL.
    Parameterized,
}

/// SQL text plus the values its placeholders expect, in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<(String, SqlValue)>,
}

impl CompiledQuery {
    pub fn literal(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Anything the adapter can turn into SQL: builders and raw strings.
pub trait Compile {
    fn compile(&self, platform: &Platform, mode: CompileMode) -> Result<CompiledQuery>;
}

impl Compile for str {
    fn compile(&self, _platform: &Platform, _mode: CompileMode) -> Result<CompiledQuery> {
        Ok(CompiledQuery::literal(self))
    }
}

impl Compile for String {
    fn compile(&self, platform: &Platform, mode: CompileMode) -> Result<CompiledQuery> {
        self.as_str().compile(platform, mode)
    }
}

impl<T: Compile + ?Sized> Compile for &T {
    fn compile(&self, platform: &Platform, mode: CompileMode) -> Result<CompiledQuery> {
        (**self).compile(platform, mode)
    }
}

/// State of a single compilation: the placeholder counter and collected
/// parameters live here, never on the builder or the platform.
pub struct CompileContext<'a> {
    platform: &'a Platform,
    mode: CompileMode,
    counter: usize,
    params: Vec<(String, SqlValue)>,
}

impl<'a> CompileContext<'a> {
    pub fn new(platform: &'a Platform, mode: CompileMode) -> Self {
        Self {
            platform,
            mode,
            counter: 0,
            params: Vec::new(),
        }
    }

    pub fn platform(&self) -> &Platform {
        self.platform
    }

    /// Inline `value` or allocate a placeholder for it. `hint` names the
    /// column the value belongs to; named dialects derive the parameter
    /// name from it.
    pub fn bind(&mut self, hint: &str, value: &SqlValue) -> String {
        let parameter_type = self.platform.parameter_type();
        if self.mode == CompileMode::Literal || parameter_type == ParameterType::None {
            return self.platform.quote_value(value);
        }
        self.counter += 1;
        let name = match parameter_type {
            ParameterType::Named => self.unique_name(hint),
            _ => self.counter.to_string(),
        };
        let placeholder = self.platform.format_parameter_name(&name);
        self.params.push((name, value.clone()));
        placeholder
    }

    fn unique_name(&self, hint: &str) -> String {
        let mut base: String = hint
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>()
            .trim_matches('_')
            .to_string();
        if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
            base.insert(0, 'p');
        }
        if !self.params.iter().any(|(n, _)| *n == base) {
            return base;
        }
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !self.params.iter().any(|(n, _)| n == candidate))
            .unwrap_or(base)
    }

    pub fn into_params(self) -> Vec<(String, SqlValue)> {
        self.params
    }

    pub fn finish(self, sql: String) -> CompiledQuery {
        CompiledQuery {
            sql,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;

    #[test]
    fn test_counter_is_scoped_to_one_compilation() {
        let platform = Platform::new(Driver::Pgsql);
        for _ in 0..2 {
            let mut ctx = CompileContext::new(&platform, CompileMode::Parameterized);
            assert_eq!(ctx.bind("a", &SqlValue::Int(1)), "$1");
            assert_eq!(ctx.bind("b", &SqlValue::Int(2)), "$2");
        }
    }

    #[test]
    fn test_named_hints_are_sanitized() {
        let platform = Platform::new(Driver::MssqlPdo);
        let mut ctx = CompileContext::new(&platform, CompileMode::Parameterized);
        assert_eq!(ctx.bind("COUNT(*)", &SqlValue::Int(1)), ":COUNT");
        assert_eq!(ctx.bind("1st", &SqlValue::Int(1)), ":p1st");
        assert_eq!(ctx.bind("count", &SqlValue::Int(1)), ":count");
    }

    #[test]
    fn test_no_parameter_dialect_inlines() {
        let platform = Platform::new(Driver::Mysql);
        let mut ctx = CompileContext::new(&platform, CompileMode::Parameterized);
        assert_eq!(ctx.bind("name", &SqlValue::from("bob")), "'bob'");
        assert!(ctx.into_params().is_empty());
    }

    #[test]
    fn test_raw_sql_compiles_to_itself() {
        let platform = Platform::new(Driver::Mysqli);
        let compiled = "SELECT 1".compile(&platform, CompileMode::Parameterized).unwrap();
        assert_eq!(compiled, CompiledQuery::literal("SELECT 1"));
    }
}
