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

//! Command-line front end for evaluating expressions
//!
//! Bindings come from a JSON object file and/or repeated `--var name=<json>`
//! flags. Exit code 1 means the expression did not compile or the inputs
//! were unusable; an empty result is not an error.

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use expr_resolver::ast::Reference;
use expr_resolver::{
    BindingContext, EvaluatorConfig, ExpressionEvaluator, ExpressionResolver, FromValue, Value,
    ValueMap,
};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "expr-resolver")]
#[command(about = "Evaluate expressions against named bindings")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// JSON file with evaluator configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression
    Eval {
        /// Expression to evaluate
        expression: String,
        /// Binding as NAME=JSON; non-JSON text is taken as a string
        #[arg(long = "var", value_name = "NAME=JSON")]
        vars: Vec<String>,
        /// JSON file holding an object of bindings
        #[arg(short, long)]
        bindings: Option<PathBuf>,
        /// Type to coerce the result to
        #[arg(short = 't', long = "type", value_enum, default_value_t = ResultType::Json)]
        result_type: ResultType,
        /// Value printed when the result is empty
        #[arg(short, long)]
        default: Option<String>,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
        /// Suppress informational messages
        #[arg(short, long)]
        quiet: bool,
        /// Print cache statistics to stderr
        #[arg(long)]
        stats: bool,
    },
    /// Compile an expression and list the names it reads
    Check {
        /// Expression to check
        expression: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ResultType {
    Bool,
    Int,
    Decimal,
    String,
    Json,
}

fn main() {
    // Setup human-panic for better error messages
    human_panic::setup_panic!();
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let evaluator = ExpressionEvaluator::with_config(load_config(cli.config.as_ref())?);

    match cli.command {
        Commands::Eval {
            expression,
            vars,
            bindings,
            result_type,
            default,
            pretty,
            quiet,
            stats,
        } => {
            let context = build_context(bindings.as_ref(), &vars)?;
            let options = EvalOptions {
                result_type,
                default: default.as_deref(),
                pretty,
                quiet,
            };
            handle_eval(&evaluator, &expression, context, &options)?;
            if stats {
                eprintln!("{}", serde_json::to_string(&evaluator.cache().stats())?);
            }
            Ok(())
        }
        Commands::Check { expression } => handle_check(&evaluator, &expression),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EvaluatorConfig> {
    let Some(path) = path else {
        return Ok(EvaluatorConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing config file '{}'", path.display()))
}

struct EvalOptions<'a> {
    result_type: ResultType,
    default: Option<&'a str>,
    pretty: bool,
    quiet: bool,
}

fn json_or_string(text: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(text)
        .map(Value::from)
        .unwrap_or_else(|_| Value::string(text))
}

fn build_context(bindings: Option<&PathBuf>, vars: &[String]) -> Result<BindingContext> {
    let mut map = ValueMap::new();

    if let Some(path) = bindings {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading bindings file '{}'", path.display()))?;
        let json: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("parsing bindings file '{}'", path.display()))?;
        let serde_json::Value::Object(object) = json else {
            bail!("bindings file '{}' must hold a JSON object", path.display());
        };
        map.extend(object.into_iter().map(|(name, value)| (name, Value::from(value))));
    }

    for var in vars {
        let Some((name, value)) = var.split_once('=') else {
            bail!("--var expects NAME=JSON, got '{var}'");
        };
        map.insert(name.trim().to_string(), json_or_string(value));
    }

    Ok(BindingContext::from_map(map))
}

fn handle_eval(
    evaluator: &ExpressionEvaluator,
    expression: &str,
    context: BindingContext,
    options: &EvalOptions<'_>,
) -> Result<()> {
    evaluator.compile(expression)?;
    let resolver = ExpressionResolver::with_evaluator(evaluator, context);
    let default = options.default;

    let output = match options.result_type {
        ResultType::Bool => resolve_display::<bool>(&resolver, expression, default)?,
        ResultType::Int => resolve_display::<i64>(&resolver, expression, default)?,
        ResultType::Decimal => resolve_display::<Decimal>(&resolver, expression, default)?,
        ResultType::String => resolve_display::<String>(&resolver, expression, default)?,
        ResultType::Json => {
            let fallback = default.map(json_or_string);
            let value = resolve(&resolver, expression, fallback)?;
            value
                .map(|value| {
                    let json = value.to_json();
                    if options.pretty {
                        serde_json::to_string_pretty(&json)
                    } else {
                        serde_json::to_string(&json)
                    }
                })
                .transpose()?
        }
    };

    match output {
        Some(text) => println!("{text}"),
        None if !options.quiet => eprintln!("(empty result)"),
        None => {}
    }
    Ok(())
}

fn resolve<T: FromValue>(
    resolver: &ExpressionResolver<'_>,
    expression: &str,
    fallback: Option<T>,
) -> Result<Option<T>> {
    let value = match fallback {
        Some(fallback) => Some(resolver.resolve_or_default(Some(expression), || fallback)?),
        None => resolver.get(expression)?,
    };
    Ok(value)
}

fn resolve_display<T: FromValue + Display>(
    resolver: &ExpressionResolver<'_>,
    expression: &str,
    default: Option<&str>,
) -> Result<Option<String>> {
    let fallback = default
        .map(|text| {
            T::from_value(Value::string(text))
                .with_context(|| format!("--default '{text}' is not a valid {}", T::TYPE_NAME))
        })
        .transpose()?;
    Ok(resolve(resolver, expression, fallback)?.map(|value| value.to_string()))
}

fn handle_check(evaluator: &ExpressionEvaluator, expression: &str) -> Result<()> {
    let compiled = evaluator.compile(expression)?;
    println!("OK");

    let references: Vec<String> = compiled
        .references()
        .iter()
        .map(|reference| match reference {
            Reference::Identifier(name) => name.clone(),
            Reference::Variable(name) => format!("#{name}"),
            Reference::Component(name) => format!("@{name}"),
        })
        .collect();
    if !references.is_empty() {
        println!("References: {}", references.join(", "));
    }
    Ok(())
}
