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

//! End-to-end scenarios through the public entry points

use expr_resolver::{
    BindingContext, ExpressionResolver, InvocationEvent, MethodDescriptor, ResolverError, Value,
    adapter_from_call, adapter_from_call_with_condition, compile_or_get, context_from_invocation,
    context_from_map, evaluate, evaluate_invocation, resolve_or_default,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

fn transfer() -> MethodDescriptor {
    MethodDescriptor::new("PaymentService", "transfer", 2)
        .with_parameter_names(["amount", "currency"])
}

fn transfer_event(amount: i64) -> InvocationEvent {
    InvocationEvent::new(transfer(), vec![Value::from(amount), Value::string("USD")])
}

#[test]
fn test_map_context_arithmetic() {
    let ctx = context_from_map(Some([("x", 5), ("y", 3)]));
    assert_eq!(evaluate::<i64>("x + y", &ctx).unwrap(), Some(8));
}

#[test]
fn test_invocation_context_binds_parameters() {
    let args = [Value::from(100), Value::string("USD")];
    let ctx = context_from_invocation(Some(&transfer()), Some(&args));

    assert_eq!(evaluate::<i64>("amount", &ctx).unwrap(), Some(100));
    assert_eq!(
        evaluate_invocation::<String>("currency", Some(&transfer()), Some(&args)).unwrap(),
        Some("USD".to_string())
    );
}

#[test]
fn test_unknown_reference_is_empty() {
    let ctx = BindingContext::new();
    assert_eq!(evaluate::<Value>("unknownVar", &ctx).unwrap(), None);
}

#[test]
fn test_absent_map_is_empty_context() {
    let ctx = context_from_map::<HashMap<String, Value>, _, _>(None);
    assert!(ctx.is_empty());
    assert_eq!(evaluate::<i64>("1 + 2", &ctx).unwrap(), Some(3));
}

#[rstest]
#[case::below(10, false)]
#[case::above(60, true)]
fn test_condition_gate(#[case] amount: i64, #[case] open: bool) {
    let gated = adapter_from_call_with_condition(&transfer_event(amount), Some("amount > 50"))
        .unwrap();
    assert_eq!(gated.is_some(), open);

    if let Some(resolver) = gated {
        assert_eq!(resolver.get::<i64>("amount").unwrap(), Some(amount));
    }
}

#[test]
fn test_unconditional_adapter() {
    let resolver = adapter_from_call(&transfer_event(10));
    assert_eq!(
        resolver.get::<String>("currency + ':' + amount").unwrap(),
        Some("USD:10".to_string())
    );
}

#[test]
fn test_malformed_expression_is_a_hard_failure() {
    let err = compile_or_get("x +").unwrap_err();
    assert!(matches!(err, ResolverError::Compile { ref expression, .. } if expression == "x +"));
    assert!(err.as_parse_error().is_some());

    let ctx = context_from_map(Some([("x", 1)]));
    assert!(evaluate::<i64>("x +", &ctx).is_err());
}

#[test]
fn test_cache_identity() {
    let text = "amount * 3 + 1";
    let first = compile_or_get(text).unwrap();
    let second = compile_or_get(&String::from(text)).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[rstest]
#[case::one_name_two_args(&["amount"], vec![Value::from(1), Value::from(2)])]
#[case::two_names_one_arg(&["amount", "currency"], vec![Value::from(1)])]
#[case::two_names_no_args(&["amount", "currency"], vec![])]
fn test_count_mismatch_has_zero_bindings(#[case] names: &[&str], #[case] args: Vec<Value>) {
    let method = MethodDescriptor::new("Svc", "run", names.len()).with_parameter_names(names);
    let ctx = context_from_invocation(Some(&method), Some(&args));

    assert_eq!(ctx.len(), 0);
    assert_eq!(evaluate::<i64>("amount", &ctx).unwrap(), None);
}

#[rstest]
#[case::absent(None)]
#[case::blank(Some("  "))]
fn test_default_without_evaluation(#[case] text: Option<&str>) {
    let ctx = BindingContext::new();
    let calls = Cell::new(0);

    let value = resolve_or_default(text, &ctx, || {
        calls.set(calls.get() + 1);
        "fallback".to_string()
    })
    .unwrap();

    assert_eq!(value, "fallback");
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_default_on_empty_result() {
    let ctx = context_from_map(Some([("limit", Value::Null)]));
    assert_eq!(resolve_or_default(Some("limit"), &ctx, || 25_i64).unwrap(), 25);
    assert_eq!(resolve_or_default(Some("limit ?: 5"), &ctx, || 25_i64).unwrap(), 5);
}

#[test]
fn test_resolver_reuse_across_expressions() {
    let resolver = ExpressionResolver::from_map([
        ("order", Value::map([
            ("total", Value::from(250)),
            ("items", Value::list([Value::string("book"), Value::string("pen")])),
        ])),
    ]);

    assert_eq!(resolver.get::<i64>("order.total").unwrap(), Some(250));
    assert_eq!(resolver.get::<i64>("order.items.size()").unwrap(), Some(2));
    assert_eq!(resolver.get::<bool>("order.items.contains('pen')").unwrap(), Some(true));
    assert_eq!(
        resolver.get::<Vec<String>>("order.items").unwrap(),
        Some(vec!["book".to_string(), "pen".to_string()])
    );
    assert_eq!(resolver.get::<i64>("order.discount").unwrap(), None);
}
