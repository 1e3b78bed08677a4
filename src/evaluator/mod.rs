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

//! Expression compilation, caching and evaluation
//!
//! [`ExpressionEvaluator`] is the boundary: it compiles through an
//! [`ExpressionCache`], interprets against a [`BindingContext`] and turns
//! every evaluation-time failure into an empty result.

pub mod cache;
pub mod compiled;
pub mod config;
pub mod context;
pub mod engine;
pub mod interpreter;

pub use cache::{CacheStats, ExpressionCache};
pub use compiled::CompiledExpression;
pub use config::{CacheConfig, EvaluatorConfig};
pub use context::BindingContext;
pub use engine::ExpressionEvaluator;
pub use interpreter::{Interpreter, interpret};
