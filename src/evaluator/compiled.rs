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

//! Compiled form of an expression

use crate::ast::{ExpressionNode, Reference};
use crate::core::ParseResult;
use crate::parser;
use std::fmt;
use std::sync::Arc;

/// A parsed, immutable, thread-safe expression ready for evaluation
///
/// Evaluation never mutates a compiled expression, so one instance is
/// shared behind an `Arc` by every caller of the same source text.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: Arc<str>,
    root: ExpressionNode,
    references: Vec<Reference>,
}

impl CompiledExpression {
    /// Parse `source` into a compiled expression
    pub fn compile(source: &str) -> ParseResult<Self> {
        let root = parser::parse(source)?;
        let references = root.references();
        Ok(Self {
            source: Arc::from(source),
            root,
            references,
        })
    }

    /// The exact source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Root of the expression tree
    pub fn root(&self) -> &ExpressionNode {
        &self.root
    }

    /// Environment names the expression reads, in source order
    pub fn references(&self) -> &[Reference] {
        &self.references
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
