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

//! Binding contexts
//!
//! A context is built either from an explicit name/value map or from an
//! intercepted method invocation. Both paths may attach a component
//! registry; local bindings always shadow registry components.

use crate::core::{Value, ValueMap};
use crate::discovery::{DeclaredParameterNames, MethodDescriptor, ParameterNameDiscoverer};
use crate::registry::{self, ComponentRegistry};
use std::fmt;
use std::sync::Arc;

/// Name-to-value environment used during evaluation
///
/// Read-only while an expression is evaluated against it.
#[derive(Clone, Default)]
pub struct BindingContext {
    bindings: ValueMap,
    registry: Option<Arc<dyn ComponentRegistry>>,
}

impl BindingContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap explicit name/value pairs; later duplicates overwrite earlier ones
    pub fn from_map<I, K, V>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            bindings: bindings
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
            registry: None,
        }
    }

    /// Like [`from_map`](Self::from_map); an absent map yields an empty context
    pub fn from_optional_map<I, K, V>(bindings: Option<I>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        bindings.map_or_else(Self::new, Self::from_map)
    }

    /// Bind invocation arguments to the names declared on the descriptor
    pub fn from_invocation(method: Option<&MethodDescriptor>, arguments: Option<&[Value]>) -> Self {
        Self::from_invocation_with(&DeclaredParameterNames, method, arguments)
    }

    /// Bind invocation arguments to names found by `discoverer`
    ///
    /// Any of these yields an empty context instead of an error: an absent
    /// method or argument list, no discoverable names, or a name count that
    /// differs from the argument count. Expressions that do not reference
    /// parameters still evaluate against it.
    pub fn from_invocation_with(
        discoverer: &dyn ParameterNameDiscoverer,
        method: Option<&MethodDescriptor>,
        arguments: Option<&[Value]>,
    ) -> Self {
        let (Some(method), Some(arguments)) = (method, arguments) else {
            log::debug!("Invocation context without method or arguments; no bindings");
            return Self::new();
        };

        let Some(names) = discoverer.parameter_names(method) else {
            log::debug!("No parameter names for {method}; no bindings");
            return Self::new();
        };

        if names.len() != arguments.len() {
            log::debug!(
                "{method} has {} parameter names but {} arguments; no bindings",
                names.len(),
                arguments.len()
            );
            return Self::new();
        }

        let bindings = names
            .iter()
            .zip(arguments)
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        Self {
            bindings,
            registry: None,
        }
    }

    /// Add or replace a binding
    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a binding in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.bindings.insert(name.into(), value.into())
    }

    /// Attach a component registry, replacing any attached one
    pub fn with_registry(mut self, registry: Arc<dyn ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Attach the process-wide registry unless a registry is already attached
    pub fn with_global_registry(mut self) -> Self {
        if self.registry.is_none() {
            self.registry = registry::global_registry();
        }
        self
    }

    /// Local binding only
    pub fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Registry component only
    pub fn component(&self, name: &str) -> Option<Value> {
        self.registry
            .as_ref()
            .and_then(|registry| registry.component(name))
    }

    /// Local binding first, then the registry
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.binding(name)
            .cloned()
            .or_else(|| self.component(name))
    }

    /// All local bindings in insertion order
    pub fn bindings(&self) -> &ValueMap {
        &self.bindings
    }

    /// The attached registry
    pub fn registry(&self) -> Option<&Arc<dyn ComponentRegistry>> {
        self.registry.as_ref()
    }

    /// Check whether a registry is attached
    pub fn has_registry(&self) -> bool {
        self.registry.is_some()
    }

    /// Number of local bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if there are no local bindings
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("bindings", &self.bindings)
            .field("has_registry", &self.has_registry())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{ParameterNameTable, parameter_names};
    use crate::registry::StaticComponentRegistry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::HashMap;

    fn transfer(names: &[&str]) -> MethodDescriptor {
        MethodDescriptor::new("PaymentService", "transfer", 2).with_parameter_names(names)
    }

    #[test]
    fn test_from_map() {
        let ctx = BindingContext::from_map([("x", 5), ("y", 3)]);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.binding("x"), Some(&Value::Integer(5)));
        assert_eq!(ctx.lookup("missing"), None);

        let absent: Option<HashMap<String, Value>> = None;
        assert!(BindingContext::from_optional_map(absent).is_empty());
    }

    #[test]
    fn test_from_invocation_zips_in_order() {
        let method = transfer(&["amount", "currency"]);
        let args = [Value::from(100), Value::string("USD")];
        let ctx = BindingContext::from_invocation(Some(&method), Some(&args));

        let names: Vec<&str> = ctx.bindings().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["amount", "currency"]);
        assert_eq!(ctx.binding("amount"), Some(&Value::Integer(100)));
        assert_eq!(ctx.binding("currency"), Some(&Value::string("USD")));
    }

    #[rstest]
    #[case::one_name_two_args(&["amount"], 2)]
    #[case::two_names_one_arg(&["amount", "currency"], 1)]
    #[case::no_args(&["amount"], 0)]
    fn test_count_mismatch_yields_no_bindings(#[case] names: &[&str], #[case] arg_count: usize) {
        let method = transfer(names);
        let args: Vec<Value> = (0..arg_count as i64).map(Value::from).collect();
        let ctx = BindingContext::from_invocation(Some(&method), Some(&args));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_absent_inputs_yield_no_bindings() {
        let method = transfer(&["amount", "currency"]);
        let args = [Value::from(1), Value::from(2)];

        assert!(BindingContext::from_invocation(None, Some(&args)).is_empty());
        assert!(BindingContext::from_invocation(Some(&method), None).is_empty());

        let undeclared = MethodDescriptor::new("PaymentService", "transfer", 2);
        assert!(BindingContext::from_invocation(Some(&undeclared), Some(&args)).is_empty());
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let discoverer = |_: &MethodDescriptor| Some(parameter_names(["a", "a"]));
        let method = MethodDescriptor::new("Svc", "run", 2);
        let args = [Value::from(1), Value::from(2)];
        let ctx = BindingContext::from_invocation_with(&discoverer, Some(&method), Some(&args));

        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.binding("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_table_discoverer() {
        let table = ParameterNameTable::new();
        table.register("Svc", "run", ["count"]);
        let method = MethodDescriptor::new("Svc", "run", 1);
        let args = [Value::from(7)];
        let ctx = BindingContext::from_invocation_with(&table, Some(&method), Some(&args));
        assert_eq!(ctx.binding("count"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_bindings_shadow_registry() {
        let registry = StaticComponentRegistry::new()
            .with_component("limit", 100)
            .with_component("rate", 2);
        let ctx = BindingContext::from_map([("limit", 5)]).with_registry(Arc::new(registry));

        assert!(ctx.has_registry());
        assert_eq!(ctx.lookup("limit"), Some(Value::Integer(5)));
        assert_eq!(ctx.lookup("rate"), Some(Value::Integer(2)));
        assert_eq!(ctx.binding("rate"), None);
        assert_eq!(ctx.component("limit"), Some(Value::Integer(100)));
    }
}
