use criterion::{Criterion, criterion_group, criterion_main};
use expr_resolver::parser::{Tokenizer, parse};
use expr_resolver::{
    BindingContext, EvaluatorConfig, ExpressionEvaluator, InterceptionAdapter, InvocationEvent,
    MethodDescriptor, Value,
};
use std::hint::black_box;

const EXPRESSIONS: &[&str] = &[
    "amount",
    "amount * rate + fee",
    "amount > 50 and currency == 'USD'",
    "customer?.name.toUpperCase().startsWith('A') ? 'priority' : 'standard'",
    "{1, 2, 3}.contains(amount % 4)",
];

fn context() -> BindingContext {
    BindingContext::from_map([
        ("amount", Value::from(120)),
        ("rate", Value::from(3)),
        ("fee", Value::from(2)),
        ("currency", Value::string("USD")),
        ("customer", Value::map([("name", Value::string("Ada"))])),
    ])
}

fn benchmark_tokenizer(c: &mut Criterion) {
    let expression = EXPRESSIONS[3];

    c.bench_function("tokenizer", |b| {
        b.iter(|| {
            let mut tokenizer = Tokenizer::new(black_box(expression));
            black_box(tokenizer.tokenize_all())
        })
    });
}

fn benchmark_parser(c: &mut Criterion) {
    for (i, expression) in EXPRESSIONS.iter().enumerate() {
        c.bench_function(&format!("expr_{i}_parse"), |b| {
            b.iter(|| black_box(parse(black_box(expression))))
        });
    }
}

fn benchmark_evaluate(c: &mut Criterion) {
    let ctx = context();
    let cached = ExpressionEvaluator::new();
    let uncached = ExpressionEvaluator::with_config(EvaluatorConfig::uncached());

    for (i, expression) in EXPRESSIONS.iter().enumerate() {
        c.bench_function(&format!("expr_{i}_evaluate_cached"), |b| {
            b.iter(|| black_box(cached.evaluate_value(black_box(expression), &ctx)))
        });

        c.bench_function(&format!("expr_{i}_evaluate_uncached"), |b| {
            b.iter(|| black_box(uncached.evaluate_value(black_box(expression), &ctx)))
        });
    }
}

fn benchmark_interception(c: &mut Criterion) {
    let method = MethodDescriptor::new("PaymentService", "transfer", 2)
        .with_parameter_names(["amount", "currency"]);
    let event = InvocationEvent::new(method, vec![Value::from(60), Value::string("USD")]);
    let adapter = InterceptionAdapter::new();

    c.bench_function("intercept_with_condition", |b| {
        b.iter(|| {
            let resolver = adapter
                .from_call_with_condition(black_box(&event), Some("amount > 50"))
                .ok()
                .flatten();
            black_box(resolver.map(|r| r.get::<i64>("amount * 2")))
        })
    });
}

criterion_group!(
    benches,
    benchmark_tokenizer,
    benchmark_parser,
    benchmark_evaluate,
    benchmark_interception
);
criterion_main!(benches);
