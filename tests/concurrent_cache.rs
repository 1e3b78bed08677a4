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

//! Concurrent access to the compiled-expression cache

use expr_resolver::{
    BindingContext, CompiledExpression, EvaluatorConfig, ExpressionEvaluator, Value,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

#[test]
fn test_concurrent_first_compile_converges() {
    let evaluator = Arc::new(ExpressionEvaluator::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let evaluator = Arc::clone(&evaluator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                evaluator.compile("a * b + c").unwrap()
            })
        })
        .collect();

    let compiled: Vec<Arc<CompiledExpression>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Every thread ends up with a complete form of the same text, and the
    // cache now serves one shared instance
    for form in &compiled {
        assert_eq!(form.source(), "a * b + c");
    }
    let cached = evaluator.compile("a * b + c").unwrap();
    assert!(compiled.iter().any(|form| Arc::ptr_eq(form, &cached)));
    assert_eq!(evaluator.cache().len(), 1);
}

#[test]
fn test_concurrent_evaluation_with_eviction() {
    let evaluator = Arc::new(ExpressionEvaluator::with_config(
        EvaluatorConfig::default()
            .with_retained_entries(Some(2))
            .with_sweep_threshold(8),
    ));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let evaluator = Arc::clone(&evaluator);
            thread::spawn(move || {
                let ctx = BindingContext::from_map([("n", Value::from(t as i64))]);
                for i in 0..200_i64 {
                    let text = format!("n + {}", i % 16);
                    let result = evaluator.evaluate::<i64>(&text, &ctx).unwrap();
                    assert_eq!(result, Some(t as i64 + i % 16));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = evaluator.cache().stats();
    assert_eq!(stats.hits + stats.misses, (THREADS * 200) as u64);
    assert!(stats.evictions > 0);
}

#[test]
fn test_shared_context_across_threads() {
    let ctx = Arc::new(BindingContext::from_map([("limit", 100)]));
    let evaluator = Arc::new(ExpressionEvaluator::new());

    let handles: Vec<_> = (0..THREADS as i64)
        .map(|t| {
            let ctx = Arc::clone(&ctx);
            let evaluator = Arc::clone(&evaluator);
            thread::spawn(move || {
                evaluator
                    .evaluate::<bool>(&format!("limit > {}", t * 20), &ctx)
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<Option<bool>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results,
        (0..THREADS as i64).map(|t| Some(100 > t * 20)).collect::<Vec<_>>()
    );
}
