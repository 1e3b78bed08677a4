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

//! Cached, fault-tolerant expression evaluation
//!
//! Compiles expressions in a small expression language once, evaluates them
//! against a binding context built from a map or from an intercepted method
//! call, and turns every evaluation-time failure into an empty result.
//! Syntax errors and a second registry registration are the only hard
//! failures.
//!
//! ```rust
//! use expr_resolver::{BindingContext, evaluate, resolve_or_default};
//!
//! let ctx = BindingContext::from_map([("x", 5), ("y", 3)]);
//! assert_eq!(evaluate::<i64>("x + y", &ctx).unwrap(), Some(8));
//! assert_eq!(evaluate::<i64>("unknownVar", &ctx).unwrap(), None);
//! assert_eq!(resolve_or_default(None, &ctx, || 1_i64).unwrap(), 1);
//! ```

#![warn(missing_docs)]

pub mod ast;
pub mod core;
pub mod discovery;
pub mod evaluator;
pub mod intercept;
pub mod parser;
pub mod registry;
pub mod resolver;

pub use crate::core::{
    EvaluationError, FromValue, ParseError, RegistryError, ResolverError, Result, Value, ValueMap,
};
pub use discovery::{
    DeclaredParameterNames, DiscovererChain, MethodDescriptor, ParameterNameDiscoverer,
    ParameterNameTable, ParameterNames,
};
pub use evaluator::{
    BindingContext, CacheStats, CompiledExpression, EvaluatorConfig, ExpressionCache,
    ExpressionEvaluator,
};
pub use intercept::{CallEvent, InterceptionAdapter, InvocationEvent};
pub use registry::{ComponentRegistry, RegistryCell, StaticComponentRegistry};
pub use resolver::ExpressionResolver;

use std::sync::Arc;

/// Compiled form of `text` from the process-wide cache
pub fn compile_or_get(text: &str) -> Result<Arc<CompiledExpression>> {
    ExpressionEvaluator::global().compile(text)
}

/// Evaluate `text` against `context` with the process-wide evaluator
///
/// `Ok(None)` for empty results and evaluation failures; `Err` only for
/// compile failures. A context without a registry sees the process-wide
/// registry, as the resolver facade does.
pub fn evaluate<T: FromValue>(text: &str, context: &BindingContext) -> Result<Option<T>> {
    let evaluator = ExpressionEvaluator::global();
    if context.has_registry() || registry::global_registry().is_none() {
        return evaluator.evaluate(text, context);
    }
    evaluator.evaluate(text, &context.clone().with_global_registry())
}

/// Evaluate `text` against the arguments of a method invocation
pub fn evaluate_invocation<T: FromValue>(
    text: &str,
    method: Option<&MethodDescriptor>,
    arguments: Option<&[Value]>,
) -> Result<Option<T>> {
    ExpressionResolver::from_invocation(method, arguments).get(text)
}

/// Evaluate `text` against `context`, falling back to `default`
///
/// See [`ExpressionResolver::resolve_or_default`].
pub fn resolve_or_default<T, F>(
    text: Option<&str>,
    context: &BindingContext,
    default: F,
) -> Result<T>
where
    T: FromValue,
    F: FnOnce() -> T,
{
    ExpressionResolver::new(context.clone()).resolve_or_default(text, default)
}

/// Context over explicit name/value pairs; `None` yields an empty context
pub fn context_from_map<I, K, V>(bindings: Option<I>) -> BindingContext
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    BindingContext::from_optional_map(bindings)
}

/// Context over an invocation, names taken from the descriptor
pub fn context_from_invocation(
    method: Option<&MethodDescriptor>,
    arguments: Option<&[Value]>,
) -> BindingContext {
    BindingContext::from_invocation(method, arguments)
}

/// Install the process-wide dependency registry
///
/// Succeeds once per process; later calls return
/// [`RegistryError::AlreadyRegistered`] and leave the first in effect.
pub fn register_dependency_registry(
    registry: impl ComponentRegistry + 'static,
) -> std::result::Result<(), RegistryError> {
    registry::register_global(Arc::new(registry))
}

/// Resolver for an intercepted call
pub fn adapter_from_call(event: &impl CallEvent) -> ExpressionResolver<'static> {
    InterceptionAdapter::new().from_call(event)
}

/// Resolver for an intercepted call, only if `condition` evaluates to true
pub fn adapter_from_call_with_condition(
    event: &impl CallEvent,
    condition: Option<&str>,
) -> Result<Option<ExpressionResolver<'static>>> {
    InterceptionAdapter::new().from_call_with_condition(event, condition)
}
