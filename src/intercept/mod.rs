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

//! Adapter between call interception and expression resolution
//!
//! An interception layer (a proxy, a middleware, a proc-macro wrapper)
//! hands over a [`CallEvent`] per intercepted call. The adapter binds the
//! call's arguments to parameter names and returns an
//! [`ExpressionResolver`] for it, optionally gated on a boolean condition.

use crate::core::{Result, Value};
use crate::discovery::{DeclaredParameterNames, MethodDescriptor, ParameterNameDiscoverer};
use crate::evaluator::{BindingContext, ExpressionEvaluator};
use crate::resolver::ExpressionResolver;
use std::fmt;
use std::sync::Arc;

/// One intercepted call: target method plus actual arguments
pub trait CallEvent {
    /// Target method, if known
    fn method(&self) -> Option<&MethodDescriptor>;

    /// Actual arguments in positional order, if known
    fn arguments(&self) -> Option<&[Value]>;
}

impl<E: CallEvent + ?Sized> CallEvent for &E {
    fn method(&self) -> Option<&MethodDescriptor> {
        (**self).method()
    }

    fn arguments(&self) -> Option<&[Value]> {
        (**self).arguments()
    }
}

/// Owned [`CallEvent`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationEvent {
    method: Option<Arc<MethodDescriptor>>,
    arguments: Option<Vec<Value>>,
}

impl InvocationEvent {
    /// Event for a fully known call
    pub fn new(method: impl Into<Arc<MethodDescriptor>>, arguments: Vec<Value>) -> Self {
        Self {
            method: Some(method.into()),
            arguments: Some(arguments),
        }
    }

    /// Event where either part may be missing
    pub fn partial(method: Option<Arc<MethodDescriptor>>, arguments: Option<Vec<Value>>) -> Self {
        Self { method, arguments }
    }
}

impl CallEvent for InvocationEvent {
    fn method(&self) -> Option<&MethodDescriptor> {
        self.method.as_deref()
    }

    fn arguments(&self) -> Option<&[Value]> {
        self.arguments.as_deref()
    }
}

/// Builds resolvers from intercepted calls
#[derive(Clone)]
pub struct InterceptionAdapter<'e> {
    evaluator: &'e ExpressionEvaluator,
    discoverer: Arc<dyn ParameterNameDiscoverer>,
}

impl InterceptionAdapter<'static> {
    /// Adapter over the process-wide evaluator, reading declared names
    pub fn new() -> Self {
        Self::with_evaluator(ExpressionEvaluator::global())
    }
}

impl Default for InterceptionAdapter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'e> InterceptionAdapter<'e> {
    /// Adapter over a specific evaluator, reading declared names
    pub fn with_evaluator(evaluator: &'e ExpressionEvaluator) -> Self {
        Self {
            evaluator,
            discoverer: Arc::new(DeclaredParameterNames),
        }
    }

    /// Replace the parameter-name discoverer
    pub fn with_discoverer(mut self, discoverer: impl ParameterNameDiscoverer + 'static) -> Self {
        self.discoverer = Arc::new(discoverer);
        self
    }

    /// Resolver bound to the call's arguments
    ///
    /// Never fails: an event without usable names yields a resolver over an
    /// empty context.
    pub fn from_call(&self, event: &impl CallEvent) -> ExpressionResolver<'e> {
        let context = BindingContext::from_invocation_with(
            self.discoverer.as_ref(),
            event.method(),
            event.arguments(),
        );
        ExpressionResolver::with_evaluator(self.evaluator, context)
    }

    /// Resolver for the call, only if `condition` evaluates to true
    ///
    /// An absent, blank, empty-valued or false condition yields `Ok(None)`:
    /// the caller should skip expression evaluation for this call. Use
    /// [`from_call`](Self::from_call) for unconditional evaluation.
    pub fn from_call_with_condition(
        &self,
        event: &impl CallEvent,
        condition: Option<&str>,
    ) -> Result<Option<ExpressionResolver<'e>>> {
        let resolver = self.from_call(event);
        if resolver.resolve_or_default(condition, || false)? {
            Ok(Some(resolver))
        } else {
            log::trace!("Condition {condition:?} closed the gate");
            Ok(None)
        }
    }
}

impl fmt::Debug for InterceptionAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionAdapter")
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ParameterNameTable;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn transfer_event(amount: i64) -> InvocationEvent {
        let method = MethodDescriptor::new("PaymentService", "transfer", 2)
            .with_parameter_names(["amount", "currency"]);
        InvocationEvent::new(method, vec![Value::from(amount), Value::string("USD")])
    }

    #[test]
    fn test_from_call() {
        let adapter = InterceptionAdapter::new();
        let resolver = adapter.from_call(&transfer_event(100));
        assert_eq!(resolver.get::<i64>("amount").unwrap(), Some(100));
    }

    #[rstest]
    #[case::closed(10, Some("amount > 50"), false)]
    #[case::open(60, Some("amount > 50"), true)]
    #[case::absent(60, None, false)]
    #[case::blank(60, Some("   "), false)]
    #[case::unresolved(60, Some("fee > 1"), false)]
    #[case::non_boolean(60, Some("amount"), false)]
    fn test_condition_gate(
        #[case] amount: i64,
        #[case] condition: Option<&str>,
        #[case] open: bool,
    ) {
        let adapter = InterceptionAdapter::new();
        let gated = adapter
            .from_call_with_condition(&transfer_event(amount), condition)
            .unwrap();
        assert_eq!(gated.is_some(), open);
    }

    #[test]
    fn test_open_gate_yields_usable_resolver() {
        let adapter = InterceptionAdapter::new();
        let resolver = adapter
            .from_call_with_condition(&transfer_event(60), Some("currency == 'USD'"))
            .unwrap()
            .unwrap();
        assert_eq!(resolver.get::<i64>("amount * 2").unwrap(), Some(120));
    }

    #[test]
    fn test_malformed_condition_propagates() {
        let adapter = InterceptionAdapter::new();
        assert!(
            adapter
                .from_call_with_condition(&transfer_event(60), Some("amount >"))
                .is_err()
        );
    }

    #[test]
    fn test_custom_discoverer() {
        let table = ParameterNameTable::new();
        table.register("Svc", "charge", ["total"]);
        let adapter = InterceptionAdapter::new().with_discoverer(table);

        let event = InvocationEvent::new(MethodDescriptor::new("Svc", "charge", 1), vec![
            Value::from(9),
        ]);
        assert_eq!(adapter.from_call(&event).get::<i64>("total").unwrap(), Some(9));
    }

    #[test]
    fn test_partial_event_yields_empty_context() {
        let adapter = InterceptionAdapter::new();
        let event = InvocationEvent::partial(None, Some(vec![Value::from(1)]));
        let resolver = adapter.from_call(&event);

        assert!(resolver.context().is_empty());
        assert_eq!(resolver.get::<i64>("1 + 1").unwrap(), Some(2));
    }
}
