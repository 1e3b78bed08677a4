// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Named shared components visible to expressions
//!
//! A context may carry a [`ComponentRegistry`]. Bare identifiers that are
//! not bound locally fall through to it, and `@name` references read it
//! directly. The process-wide registry lives in a write-once
//! [`RegistryCell`]: it can be installed exactly once and is read without
//! locking afterwards.

use crate::core::{RegistryError, Value};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;

/// Lookup of named shared components
pub trait ComponentRegistry: Send + Sync {
    /// Get the component registered under `name`
    fn component(&self, name: &str) -> Option<Value>;

    /// Check whether a component is registered under `name`
    fn contains(&self, name: &str) -> bool {
        self.component(name).is_some()
    }
}

impl<S> ComponentRegistry for HashMap<String, Value, S>
where
    S: BuildHasher + Send + Sync,
{
    fn component(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn contains(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

/// Concurrent registry populated at start-up
#[derive(Debug, Default)]
pub struct StaticComponentRegistry {
    components: DashMap<String, Value>,
}

impl StaticComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component, returning the one it replaced
    pub fn register(&self, name: impl Into<String>, component: impl Into<Value>) -> Option<Value> {
        self.components.insert(name.into(), component.into())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_component(self, name: impl Into<String>, component: impl Into<Value>) -> Self {
        self.register(name, component);
        self
    }

    /// Remove a component
    pub fn unregister(&self, name: &str) -> Option<Value> {
        self.components.remove(name).map(|(_, value)| value)
    }

    /// Registered component names, unordered
    pub fn names(&self) -> Vec<String> {
        self.components.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if no component is registered
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ComponentRegistry for StaticComponentRegistry {
    fn component(&self, name: &str) -> Option<Value> {
        self.components.get(name).map(|entry| entry.value().clone())
    }

    fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }
}

/// Write-once holder for a shared registry
///
/// Transitions at most once from unset to set. Reads after initialization
/// take no lock.
pub struct RegistryCell {
    cell: OnceCell<Arc<dyn ComponentRegistry>>,
}

impl RegistryCell {
    /// Create an unset cell
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Install the registry
    ///
    /// Fails with [`RegistryError::AlreadyRegistered`] when a registry is
    /// already installed; the installed one stays in effect.
    pub fn set(&self, registry: Arc<dyn ComponentRegistry>) -> Result<(), RegistryError> {
        self.cell.set(registry).map_err(|_rejected| {
            log::warn!("Component registry already registered; keeping the first registration");
            RegistryError::AlreadyRegistered
        })
    }

    /// The installed registry, if any
    pub fn get(&self) -> Option<&Arc<dyn ComponentRegistry>> {
        self.cell.get()
    }

    /// Check whether a registry is installed
    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl Default for RegistryCell {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegistryCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCell")
            .field("is_set", &self.is_set())
            .finish()
    }
}

static GLOBAL_REGISTRY: RegistryCell = RegistryCell::new();

/// Install the process-wide component registry
///
/// May succeed once per process. A second call returns
/// [`RegistryError::AlreadyRegistered`].
pub fn register_global(registry: Arc<dyn ComponentRegistry>) -> Result<(), RegistryError> {
    GLOBAL_REGISTRY.set(registry)?;
    log::debug!("Process-wide component registry installed");
    Ok(())
}

/// The process-wide component registry, if installed
pub fn global_registry() -> Option<Arc<dyn ComponentRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_static_registry() {
        let registry = StaticComponentRegistry::new()
            .with_component("limit", 50)
            .with_component("currency", "USD");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.component("limit"), Some(Value::Integer(50)));
        assert!(registry.contains("currency"));
        assert!(!registry.contains("missing"));

        assert_eq!(registry.register("limit", 75), Some(Value::Integer(50)));
        assert_eq!(registry.unregister("limit"), Some(Value::Integer(75)));
        assert_eq!(registry.names(), vec!["currency".to_string()]);
    }

    #[test]
    fn test_hash_map_registry() {
        let mut components = HashMap::new();
        components.insert("rate".to_string(), Value::from(3));
        assert_eq!(components.component("rate"), Some(Value::Integer(3)));
        assert!(!ComponentRegistry::contains(&components, "other"));
    }

    #[test]
    fn test_registry_cell_is_write_once() {
        let cell = RegistryCell::new();
        assert!(!cell.is_set());

        let first: Arc<dyn ComponentRegistry> =
            Arc::new(StaticComponentRegistry::new().with_component("source", "first"));
        let second: Arc<dyn ComponentRegistry> =
            Arc::new(StaticComponentRegistry::new().with_component("source", "second"));

        assert_eq!(cell.set(first), Ok(()));
        assert_eq!(cell.set(second), Err(RegistryError::AlreadyRegistered));

        let installed = cell.get().unwrap();
        assert_eq!(installed.component("source"), Some(Value::string("first")));
    }
}
