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

//! Process-wide dependency registry
//!
//! Kept in its own test binary: the registry can be installed once per
//! process, so everything touching it runs in a single test.

use expr_resolver::{
    BindingContext, ExpressionResolver, InvocationEvent, MethodDescriptor, RegistryError,
    StaticComponentRegistry, Value, adapter_from_call_with_condition, evaluate,
    register_dependency_registry,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn test_global_registry_lifecycle() {
    let ctx = BindingContext::from_map([("amount", 80)]);
    assert_eq!(evaluate::<i64>("limit", &ctx).unwrap(), None);

    let first = StaticComponentRegistry::new()
        .with_component("limit", 50)
        .with_component("amount", 1);
    assert_eq!(register_dependency_registry(first), Ok(()));

    let second = StaticComponentRegistry::new().with_component("limit", 999);
    assert_eq!(
        register_dependency_registry(second),
        Err(RegistryError::AlreadyRegistered)
    );

    // Facades attach the first registration; bindings still win
    let resolver = ExpressionResolver::new(ctx.clone());
    assert!(resolver.context().has_registry());
    assert_eq!(resolver.get::<i64>("limit").unwrap(), Some(50));
    assert_eq!(resolver.get::<i64>("@limit").unwrap(), Some(50));
    assert_eq!(resolver.get::<i64>("amount").unwrap(), Some(80));
    assert_eq!(resolver.get::<i64>("@amount").unwrap(), Some(1));
    assert_eq!(resolver.get::<bool>("amount > limit").unwrap(), Some(true));
    assert_eq!(resolver.get::<i64>("#limit").unwrap(), None);

    // The free function agrees with the facade
    assert_eq!(evaluate::<i64>("limit", &ctx).unwrap(), Some(50));
    assert_eq!(evaluate::<i64>("amount", &ctx).unwrap(), Some(80));
    assert!(!ctx.has_registry());
    let own = ctx
        .clone()
        .with_registry(Arc::new(StaticComponentRegistry::new().with_component("limit", 7)));
    assert_eq!(evaluate::<i64>("limit", &own).unwrap(), Some(7));

    // Intercepted calls see the registry as well
    let method = MethodDescriptor::new("PaymentService", "transfer", 1)
        .with_parameter_names(["amount"]);
    let event = InvocationEvent::new(method, vec![Value::from(20)]);
    let gated = adapter_from_call_with_condition(&event, Some("amount < limit")).unwrap();
    assert!(gated.is_some());
}
