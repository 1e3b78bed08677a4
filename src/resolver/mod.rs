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

//! Context-bound resolver facade

use crate::core::{FromValue, Result, Value};
use crate::discovery::MethodDescriptor;
use crate::evaluator::{BindingContext, ExpressionEvaluator};

/// Evaluates expressions against one binding context
///
/// Cheap to create; build one per call site. The process-wide component
/// registry, when installed, is attached to contexts that carry none.
///
/// # Examples
///
/// ```rust
/// use expr_resolver::ExpressionResolver;
///
/// let resolver = ExpressionResolver::from_map([("amount", 120)]);
/// assert_eq!(resolver.get::<bool>("amount > 100").unwrap(), Some(true));
///
/// let limit = resolver.resolve_or_default(Some("  "), || 50_i64).unwrap();
/// assert_eq!(limit, 50);
/// ```
#[derive(Debug, Clone)]
pub struct ExpressionResolver<'e> {
    context: BindingContext,
    evaluator: &'e ExpressionEvaluator,
}

impl ExpressionResolver<'static> {
    /// Wrap `context` using the process-wide evaluator
    pub fn new(context: BindingContext) -> Self {
        Self::with_evaluator(ExpressionEvaluator::global(), context)
    }

    /// Resolver over explicit name/value pairs
    pub fn from_map<I, K, V>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(BindingContext::from_map(bindings))
    }

    /// Resolver over an invocation, names taken from the descriptor
    pub fn from_invocation(method: Option<&MethodDescriptor>, arguments: Option<&[Value]>) -> Self {
        Self::new(BindingContext::from_invocation(method, arguments))
    }
}

impl<'e> ExpressionResolver<'e> {
    /// Wrap `context` using a specific evaluator
    pub fn with_evaluator(evaluator: &'e ExpressionEvaluator, context: BindingContext) -> Self {
        Self {
            context: context.with_global_registry(),
            evaluator,
        }
    }

    /// Evaluate `text` as `T`; `Ok(None)` when the result is empty
    pub fn get<T: FromValue>(&self, text: &str) -> Result<Option<T>> {
        self.evaluator.evaluate(text, &self.context)
    }

    /// Evaluate `text` without coercion
    pub fn get_value(&self, text: &str) -> Result<Option<Value>> {
        self.evaluator.evaluate_value(text, &self.context)
    }

    /// Evaluate `text`, falling back to `default`
    ///
    /// Absent or blank text returns `default()` without evaluating. An
    /// empty result also returns `default()`. `default` runs only when
    /// needed. Compile errors still propagate.
    pub fn resolve_or_default<T, F>(&self, text: Option<&str>, default: F) -> Result<T>
    where
        T: FromValue,
        F: FnOnce() -> T,
    {
        let Some(text) = text.filter(|text| !text.trim().is_empty()) else {
            return Ok(default());
        };
        Ok(self.get(text)?.unwrap_or_else(default))
    }

    /// The wrapped context
    pub fn context(&self) -> &BindingContext {
        &self.context
    }

    /// The evaluator in use
    pub fn evaluator(&self) -> &'e ExpressionEvaluator {
        self.evaluator
    }

    /// Unwrap the context
    pub fn into_context(self) -> BindingContext {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResolverError;
    use crate::evaluator::EvaluatorConfig;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::cell::Cell;

    #[test]
    fn test_get() {
        let resolver = ExpressionResolver::from_map([("x", 5), ("y", 3)]);
        assert_eq!(resolver.get::<i64>("x + y").unwrap(), Some(8));
        assert_eq!(resolver.get_value("y").unwrap(), Some(Value::Integer(3)));
        assert_eq!(resolver.get::<i64>("unknownVar").unwrap(), None);
    }

    #[rstest]
    #[case::absent(None)]
    #[case::empty(Some(""))]
    #[case::blank(Some("  \t "))]
    fn test_blank_text_skips_evaluation(#[case] text: Option<&str>) {
        let evaluator = ExpressionEvaluator::with_config(EvaluatorConfig::for_testing());
        let resolver = ExpressionResolver::with_evaluator(&evaluator, BindingContext::new());

        assert_eq!(resolver.resolve_or_default(text, || 7_i64).unwrap(), 7);
        let stats = evaluator.cache().stats();
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[test]
    fn test_default_is_lazy() {
        let resolver = ExpressionResolver::from_map([("limit", 10)]);
        let calls = Cell::new(0);
        let default = || {
            calls.set(calls.get() + 1);
            0_i64
        };

        assert_eq!(resolver.resolve_or_default(Some("limit * 2"), default).unwrap(), 20);
        assert_eq!(calls.get(), 0);

        assert_eq!(resolver.resolve_or_default(Some("missing"), default).unwrap(), 0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_compile_error_is_not_defaulted() {
        let resolver = ExpressionResolver::from_map([("x", 1)]);
        let err = resolver
            .resolve_or_default(Some("x +"), || 0_i64)
            .unwrap_err();
        assert!(matches!(err, ResolverError::Compile { .. }));
    }

    #[test]
    fn test_from_invocation() {
        let method = MethodDescriptor::new("PaymentService", "transfer", 2)
            .with_parameter_names(["amount", "currency"]);
        let args = [Value::from(100), Value::string("USD")];
        let resolver = ExpressionResolver::from_invocation(Some(&method), Some(&args));

        assert_eq!(resolver.get::<i64>("amount").unwrap(), Some(100));
        assert_eq!(
            resolver.get::<String>("currency.toLowerCase()").unwrap(),
            Some("usd".to_string())
        );
        assert_eq!(resolver.context().len(), 2);
    }
}
