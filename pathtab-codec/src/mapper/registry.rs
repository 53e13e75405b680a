//! Process-wide capability registry
//!
//! Modules, scalar rules, and named graphs registered here apply to every
//! mapper resolved afterwards. Each registration bumps a monotonically
//! increasing version; resolved mappers record the version they were built
//! against and the cache rebuilds any mapper whose version is stale. Built
//! mappers are never changed in place.

use crate::classify::ScalarRule;
use pathtab_format::{PathTabError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard};

/// Tree transform applied by every mapper after serialization
pub trait MapperModule: Send + Sync {
    /// Unique module name
    fn name(&self) -> &str;

    /// Rewrite the serialized tree in place
    fn transform(&self, tree: &mut Value);
}

#[derive(Default)]
struct RegistryState {
    version: u64,
    modules: Vec<Arc<dyn MapperModule>>,
    scalar_rules: Vec<Arc<dyn ScalarRule>>,
    graphs: BTreeMap<String, Arc<BTreeSet<String>>>,
}

/// Registry of global capabilities
pub struct CapabilityRegistry {
    state: RwLock<RegistryState>,
}

impl CapabilityRegistry {
    /// Create a new empty registry at version 0
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> Arc<Self> {
        static INSTANCE: OnceLock<Arc<CapabilityRegistry>> = OnceLock::new();
        INSTANCE.get_or_init(|| Arc::new(CapabilityRegistry::new())).clone()
    }

    /// Register a mapper module
    ///
    /// # Errors
    ///
    /// Returns an error if a module with the same name is already registered
    pub fn register_module(&self, module: Arc<dyn MapperModule>) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        if state.modules.iter().any(|m| m.name() == module.name()) {
            return Err(PathTabError::InvalidConfig(format!(
                "mapper module '{}' is already registered",
                module.name()
            )));
        }
        tracing::debug!(module = module.name(), "registering mapper module");
        state.modules.push(module);
        state.version += 1;
        Ok(state.version)
    }

    /// Register an object shape that classifies as a scalar
    pub fn register_scalar_rule(&self, rule: Arc<dyn ScalarRule>) -> u64 {
        let mut state = self.state.write().unwrap();
        tracing::debug!(rule = rule.name(), "registering scalar rule");
        state.scalar_rules.push(rule);
        state.version += 1;
        state.version
    }

    /// Register (or replace) a named graph of dotted paths
    pub fn register_graph<I, S>(&self, name: impl Into<String>, paths: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let paths: BTreeSet<String> = paths.into_iter().map(Into::into).collect();
        let mut state = self.state.write().unwrap();
        tracing::debug!(graph = %name, paths = paths.len(), "registering graph");
        state.graphs.insert(name, Arc::new(paths));
        state.version += 1;
        state.version
    }

    /// Current version
    pub fn version(&self) -> u64 {
        self.state.read().unwrap().version
    }

    /// Read-locked view; registrations wait until it is dropped
    pub fn snapshot(&self) -> RegistrySnapshot<'_> {
        RegistrySnapshot {
            state: self.state.read().unwrap(),
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Consistent view of the registry at one version
pub struct RegistrySnapshot<'a> {
    state: RwLockReadGuard<'a, RegistryState>,
}

impl RegistrySnapshot<'_> {
    /// Version this snapshot reflects
    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Registered modules in registration order
    pub fn modules(&self) -> &[Arc<dyn MapperModule>] {
        &self.state.modules
    }

    /// Registered scalar rules in registration order
    pub fn scalar_rules(&self) -> &[Arc<dyn ScalarRule>] {
        &self.state.scalar_rules
    }

    /// Paths of a named graph
    pub fn graph(&self, name: &str) -> Option<Arc<BTreeSet<String>>> {
        self.state.graphs.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl MapperModule for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn transform(&self, tree: &mut Value) {
            if let Value::String(s) = tree {
                *s = s.to_uppercase();
            }
        }
    }

    #[test]
    fn registrations_bump_version() {
        let registry = CapabilityRegistry::new();
        assert_eq!(registry.version(), 0);
        assert_eq!(registry.register_module(Arc::new(Upper)).unwrap(), 1);
        assert_eq!(registry.register_graph("g", ["a"]), 2);
        assert_eq!(registry.version(), 2);
    }

    #[test]
    fn duplicate_module_is_rejected() {
        let registry = CapabilityRegistry::new();
        registry.register_module(Arc::new(Upper)).unwrap();
        assert!(registry.register_module(Arc::new(Upper)).is_err());
        assert_eq!(registry.version(), 1);
    }

    #[test]
    fn snapshot_exposes_state() {
        let registry = CapabilityRegistry::new();
        registry.register_module(Arc::new(Upper)).unwrap();
        registry.register_graph("summary", ["id", "total"]);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.version(), 2);
        assert_eq!(snapshot.modules().len(), 1);
        assert!(snapshot.scalar_rules().is_empty());
        assert_eq!(snapshot.graph("summary").unwrap().len(), 2);
        assert!(snapshot.graph("missing").is_none());
    }
}
