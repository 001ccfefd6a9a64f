use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::config::{AdapterConfig, ManagerConfig, OverridePolicy};
use crate::error::{DbError, Result};

/// Registry of named adapters.
///
/// # Example
/// ```
/// use dbrs::{AdapterConfig, DbManager, Driver, OverridePolicy};
///
/// let mut manager = DbManager::new(OverridePolicy::Deny);
/// manager
///     .register("default", AdapterConfig::new("default", Driver::Mysqli))
///     .unwrap();
///
/// assert!(manager.adapter("default").is_some());
/// assert!(manager.adapter("reporting").is_none());
/// assert!(manager.register("default", AdapterConfig::new("default", Driver::Pgsql)).is_err());
/// ```
#[derive(Debug, Default)]
pub struct DbManager {
    policy: OverridePolicy,
    adapters: IndexMap<String, Adapter>,
    default: Option<String>,
}

impl DbManager {
    pub fn new(policy: OverridePolicy) -> Self {
        Self {
            policy,
            adapters: IndexMap::new(),
            default: None,
        }
    }

    /// Build a manager and register every configured adapter in order.
    pub fn from_config(config: ManagerConfig) -> Result<Self> {
        let mut manager = Self::new(config.override_policy);
        for adapter in config.adapters {
            let name = adapter.name.clone();
            manager.register(name, adapter)?;
        }
        Ok(manager)
    }

    pub fn override_policy(&self) -> OverridePolicy {
        self.policy
    }

    /// Register an adapter built from `config` under `name`.
    pub fn register(&mut self, name: impl Into<String>, mut config: AdapterConfig) -> Result<()> {
        let name = name.into();
        self.check_override(&name)?;
        config.name = name.clone();
        let adapter = Adapter::new(config)?;
        self.insert(name, adapter);
        Ok(())
    }

    /// Register an already constructed adapter under its own name.
    pub fn register_adapter(&mut self, adapter: Adapter) -> Result<()> {
        let name = adapter.name().to_string();
        self.check_override(&name)?;
        self.insert(name, adapter);
        Ok(())
    }

    /// The adapter registered as `name`, or `None`.
    pub fn adapter(&mut self, name: &str) -> Option<&mut Adapter> {
        self.adapters.get_mut(name)
    }

    pub fn default_adapter(&mut self) -> Option<&mut Adapter> {
        let name = self.default.as_deref()?;
        self.adapters.get_mut(name)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.adapters.contains_key(name) {
            return Err(DbError::configuration(format!(
                "Cannot make unknown adapter '{}' the default",
                name
            )));
        }
        self.default = Some(name.to_string());
        Ok(())
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Close and forget an adapter. Returns false when `name` is unknown.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        let Some(mut adapter) = self.adapters.shift_remove(name) else {
            return Ok(false);
        };
        if self.default.as_deref() == Some(name) {
            self.default = self.adapters.keys().next().cloned();
        }
        adapter.close()?;
        debug!(adapter = name, "adapter removed");
        Ok(true)
    }

    /// Close every adapter, returning the first failure.
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for adapter in self.adapters.values_mut() {
            if let Err(e) = adapter.close() {
                warn!(adapter = adapter.name(), error = %e, "failed to close adapter");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn check_override(&self, name: &str) -> Result<()> {
        if self.policy == OverridePolicy::Deny && self.adapters.contains_key(name) {
            return Err(DbError::configuration(format!(
                "Adapter '{}' is already registered",
                name
            )));
        }
        Ok(())
    }

    fn insert(&mut self, name: String, adapter: Adapter) {
        let flagged = adapter.config().default;
        if flagged || self.default.is_none() {
            self.default = Some(name.clone());
        }
        info!(adapter = %name, driver = %adapter.driver(), default = flagged, "adapter registered");
        if let Some(mut previous) = self.adapters.insert(name, adapter) {
            if let Err(e) = previous.close() {
                warn!(error = %e, "failed to close replaced adapter");
            }
        }
    }
}
