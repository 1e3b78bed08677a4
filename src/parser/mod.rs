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

//! Expression parser
//!
//! Converts expression text into an [`ExpressionNode`] tree using a
//! hand-written tokenizer and a Pratt parser.

pub mod pratt;
pub mod span;
pub mod tokenizer;

pub use pratt::{MAX_NESTING_DEPTH, Precedence, PrattParser, parse_expression};
pub use span::Spanned;
pub use tokenizer::{Token, Tokenizer};

use crate::ast::ExpressionNode;
use crate::core::ParseResult;

/// Parse an expression string into an AST
pub fn parse(input: &str) -> ParseResult<ExpressionNode> {
    parse_expression(input)
}
