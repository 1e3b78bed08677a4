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

//! Parameter-name discovery for intercepted method calls
//!
//! Rust has no runtime reflection over parameter names, so names come from
//! a [`ParameterNameDiscoverer`]: either declared on the
//! [`MethodDescriptor`] itself (what a proc-macro or code generator would
//! emit), registered in a [`ParameterNameTable`] at start-up, or supplied by
//! any closure. "No names available" is an ordinary `None`, never an error.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Ordered parameter names of one method
pub type ParameterNames = Arc<[Arc<str>]>;

/// Build [`ParameterNames`] from any list of strings
pub fn parameter_names<I, S>(names: I) -> ParameterNames
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| Arc::<str>::from(name.as_ref()))
        .collect()
}

/// Identity of an intercepted method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    owner: Arc<str>,
    name: Arc<str>,
    arity: usize,
    declared_names: Option<ParameterNames>,
}

impl MethodDescriptor {
    /// Describe a method without declared parameter names
    pub fn new(owner: impl AsRef<str>, name: impl AsRef<str>, arity: usize) -> Self {
        Self {
            owner: Arc::from(owner.as_ref()),
            name: Arc::from(name.as_ref()),
            arity,
            declared_names: None,
        }
    }

    /// Attach declared parameter names
    ///
    /// The arity is left alone: a descriptor whose names disagree with its
    /// arguments degrades to an empty context at binding time.
    pub fn with_parameter_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.declared_names = Some(parameter_names(names));
        self
    }

    /// Owning type name
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Parameter names carried on the descriptor
    pub fn declared_parameter_names(&self) -> Option<&ParameterNames> {
        self.declared_names.as_ref()
    }

    /// Lookup key of the form `Owner::method/arity`
    pub fn signature(&self) -> String {
        format!("{}::{}/{}", self.owner, self.name, self.arity)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.name)
    }
}

/// Resolves the ordered parameter names of a method
pub trait ParameterNameDiscoverer: Send + Sync {
    /// Names in declaration order, or `None` when unavailable
    fn parameter_names(&self, method: &MethodDescriptor) -> Option<ParameterNames>;
}

impl<F> ParameterNameDiscoverer for F
where
    F: Fn(&MethodDescriptor) -> Option<ParameterNames> + Send + Sync,
{
    fn parameter_names(&self, method: &MethodDescriptor) -> Option<ParameterNames> {
        self(method)
    }
}

/// Reads the names declared on the descriptor
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredParameterNames;

impl ParameterNameDiscoverer for DeclaredParameterNames {
    fn parameter_names(&self, method: &MethodDescriptor) -> Option<ParameterNames> {
        method.declared_parameter_names().cloned()
    }
}

/// Names registered per method signature
#[derive(Debug, Default)]
pub struct ParameterNameTable {
    entries: DashMap<String, ParameterNames>,
}

impl ParameterNameTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the names of `owner::method`; the arity is the name count
    pub fn register<I, S>(&self, owner: &str, method: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = parameter_names(names);
        let key = MethodDescriptor::new(owner, method, names.len()).signature();
        self.entries.insert(key, names);
    }

    /// Number of registered signatures
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ParameterNameDiscoverer for ParameterNameTable {
    fn parameter_names(&self, method: &MethodDescriptor) -> Option<ParameterNames> {
        self.entries
            .get(&method.signature())
            .map(|entry| entry.value().clone())
    }
}

/// Tries discoverers in order; the first one yielding names wins
#[derive(Default, Clone)]
pub struct DiscovererChain {
    discoverers: Vec<Arc<dyn ParameterNameDiscoverer>>,
}

impl DiscovererChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a discoverer
    pub fn with(mut self, discoverer: impl ParameterNameDiscoverer + 'static) -> Self {
        self.discoverers.push(Arc::new(discoverer));
        self
    }

    /// Number of discoverers in the chain
    pub fn len(&self) -> usize {
        self.discoverers.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.discoverers.is_empty()
    }
}

impl fmt::Debug for DiscovererChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscovererChain")
            .field("len", &self.discoverers.len())
            .finish()
    }
}

impl ParameterNameDiscoverer for DiscovererChain {
    fn parameter_names(&self, method: &MethodDescriptor) -> Option<ParameterNames> {
        self.discoverers
            .iter()
            .find_map(|discoverer| discoverer.parameter_names(method))
    }
}
