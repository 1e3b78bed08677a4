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

//! Safe evaluation entry point

use super::cache::ExpressionCache;
use super::compiled::CompiledExpression;
use super::config::EvaluatorConfig;
use super::context::BindingContext;
use super::interpreter::interpret;
use crate::core::{FromValue, Result, ResolverError, Value};
use once_cell::sync::Lazy;
use std::sync::Arc;

static GLOBAL_EVALUATOR: Lazy<ExpressionEvaluator> = Lazy::new(ExpressionEvaluator::new);

/// Compiles through a cache and evaluates with failure suppression
///
/// Compile errors are returned as [`ResolverError::Compile`]. Evaluation
/// errors (unresolved names, type mismatches, arithmetic faults) and
/// failed coercions to the requested type become `Ok(None)`.
///
/// # Examples
///
/// ```rust
/// use expr_resolver::{BindingContext, ExpressionEvaluator};
///
/// let evaluator = ExpressionEvaluator::new();
/// let ctx = BindingContext::from_map([("x", 5), ("y", 3)]);
///
/// assert_eq!(evaluator.evaluate::<i64>("x + y", &ctx).unwrap(), Some(8));
/// assert_eq!(evaluator.evaluate::<i64>("unknownVar", &ctx).unwrap(), None);
/// assert!(evaluator.evaluate::<i64>("x +", &ctx).is_err());
/// ```
#[derive(Debug)]
pub struct ExpressionEvaluator {
    cache: ExpressionCache,
    config: EvaluatorConfig,
}

impl ExpressionEvaluator {
    /// Create an evaluator with default configuration
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    /// Create an evaluator with custom configuration
    pub fn with_config(config: EvaluatorConfig) -> Self {
        for warning in config.validate() {
            log::warn!("Evaluator configuration: {warning}");
        }
        Self {
            cache: ExpressionCache::with_config(config.cache.clone()),
            config,
        }
    }

    /// The process-wide evaluator
    pub fn global() -> &'static ExpressionEvaluator {
        &GLOBAL_EVALUATOR
    }

    /// Configuration in use
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// The compiled-expression cache
    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    /// Compiled form of `text`, from the cache when possible
    pub fn compile(&self, text: &str) -> Result<Arc<CompiledExpression>> {
        self.cache
            .compile_or_get(text)
            .map_err(|source| ResolverError::compile(text, source))
    }

    /// Evaluate `text` and coerce the result to `T`
    ///
    /// `Ok(None)` when the result is null or evaluation/coercion fails.
    pub fn evaluate<T: FromValue>(
        &self,
        text: &str,
        context: &BindingContext,
    ) -> Result<Option<T>> {
        let compiled = self.compile(text)?;
        Ok(self.evaluate_compiled(&compiled, context))
    }

    /// Evaluate `text` without coercion
    pub fn evaluate_value(&self, text: &str, context: &BindingContext) -> Result<Option<Value>> {
        self.evaluate::<Value>(text, context)
    }

    /// Evaluate an already compiled expression and coerce the result to `T`
    pub fn evaluate_compiled<T: FromValue>(
        &self,
        compiled: &CompiledExpression,
        context: &BindingContext,
    ) -> Option<T> {
        let value = match interpret(compiled, context) {
            Ok(Value::Null) => return None,
            Ok(value) => value,
            Err(e) => {
                log::debug!("Evaluation of '{compiled}' suppressed: {e}");
                return None;
            }
        };

        match T::from_value(value) {
            Ok(result) => Some(result),
            Err(e) => {
                log::debug!("Result of '{compiled}' suppressed: {e}");
                None
            }
        }
    }
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParseError;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn context() -> BindingContext {
        BindingContext::from_map([("x", Value::from(5)), ("label", Value::string("42"))])
    }

    #[test]
    fn test_typed_results() {
        let evaluator = ExpressionEvaluator::new();
        let ctx = context();

        assert_eq!(evaluator.evaluate::<i64>("x * 2", &ctx).unwrap(), Some(10));
        assert_eq!(evaluator.evaluate::<bool>("x > 1", &ctx).unwrap(), Some(true));
        assert_eq!(
            evaluator.evaluate::<Decimal>("x / 2.0", &ctx).unwrap(),
            Some(Decimal::new(25, 1))
        );
        assert_eq!(
            evaluator.evaluate::<String>("x", &ctx).unwrap(),
            Some("5".to_string())
        );
        assert_eq!(evaluator.evaluate::<i64>("label", &ctx).unwrap(), Some(42));
    }

    #[test]
    fn test_failures_are_empty() {
        let evaluator = ExpressionEvaluator::new();
        let ctx = context();

        assert_eq!(evaluator.evaluate::<i64>("unknownVar", &ctx).unwrap(), None);
        assert_eq!(evaluator.evaluate::<i64>("x / 0", &ctx).unwrap(), None);
        assert_eq!(evaluator.evaluate::<i64>("null", &ctx).unwrap(), None);
        // Coercion failure belongs to the same channel
        assert_eq!(evaluator.evaluate::<bool>("x", &ctx).unwrap(), None);
    }

    #[test]
    fn test_compile_failure_propagates() {
        let evaluator = ExpressionEvaluator::new();
        let err = evaluator.evaluate::<i64>("x +", &context()).unwrap_err();

        assert_eq!(
            err,
            ResolverError::compile(
                "x +",
                ParseError::UnexpectedEnd {
                    expected: "operand".to_string()
                }
            )
        );
    }

    #[test]
    fn test_long_operator_chain_is_a_compile_failure() {
        let evaluator = ExpressionEvaluator::with_config(EvaluatorConfig::for_testing());
        let ctx = context();

        let chain = vec!["x == 0"; 3_000].join(" or ");
        let err = evaluator.evaluate::<bool>(&chain, &ctx).unwrap_err();
        assert!(matches!(
            err.as_parse_error(),
            Some(ParseError::TooDeeplyNested { .. })
        ));

        let sum = vec!["x"; 100].join(" + ");
        assert_eq!(evaluator.evaluate::<i64>(&sum, &ctx).unwrap(), Some(500));
    }

    #[test]
    fn test_compile_uses_cache() {
        let evaluator = ExpressionEvaluator::with_config(EvaluatorConfig::for_testing());
        let first = evaluator.compile("x + 1").unwrap();
        let second = evaluator.compile("x + 1").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(evaluator.cache().stats().hits, 1);
    }

    #[test]
    fn test_global_evaluator_is_shared() {
        assert!(std::ptr::eq(
            ExpressionEvaluator::global(),
            ExpressionEvaluator::global()
        ));
    }
}
