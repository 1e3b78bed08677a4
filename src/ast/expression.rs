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

//! Expression AST node definitions

use super::operator::{BinaryOperator, UnaryOperator};
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::sync::Arc;

/// Method call arguments; almost every call has at most two
pub type Arguments = SmallVec<[ExpressionNode; 2]>;

/// AST representation of an expression
///
/// Large variants are boxed to keep the enum small.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// Literal value
    Literal(LiteralValue),

    /// Bare identifier: local binding first, then the component registry
    Identifier(String),

    /// `#name`: local binding only
    Variable(String),

    /// `@name`: component registry only
    Component(String),

    /// Property navigation (`base.name` or `base?.name`)
    Property {
        /// Navigated expression
        base: Box<ExpressionNode>,
        /// Property name
        name: String,
        /// `?.` navigation yields null on a null base
        null_safe: bool,
    },

    /// Method call on a receiver (`base.name(args)`) (boxed for size optimization)
    MethodCall(Box<MethodCallData>),

    /// Index access (`base[index]`)
    Index {
        /// Indexed expression
        base: Box<ExpressionNode>,
        /// Index expression
        index: Box<ExpressionNode>,
    },

    /// Binary operation (boxed for size optimization)
    BinaryOp(Box<BinaryOpData>),

    /// Unary operation
    UnaryOp {
        /// The operator
        op: UnaryOperator,
        /// The operand
        operand: Box<ExpressionNode>,
    },

    /// Ternary conditional (boxed for size optimization)
    Conditional(Box<ConditionalData>),

    /// Elvis operator (`value ?: fallback`)
    Elvis {
        /// Primary expression
        value: Box<ExpressionNode>,
        /// Used when the primary is null
        fallback: Box<ExpressionNode>,
    },

    /// Inline list (`{a, b, c}`)
    List(Vec<ExpressionNode>),
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Integer literal
    Integer(i64),
    /// Decimal literal
    Decimal(Decimal),
    /// String literal, escapes already processed
    String(Arc<str>),
}

/// Binary operation data
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOpData {
    /// The operator
    pub op: BinaryOperator,
    /// Left operand
    pub left: ExpressionNode,
    /// Right operand
    pub right: ExpressionNode,
}

/// Method call data
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCallData {
    /// Receiver expression
    pub base: ExpressionNode,
    /// Method name
    pub method: String,
    /// Call arguments
    pub arguments: Arguments,
    /// `?.` call yields null on a null receiver
    pub null_safe: bool,
}

/// Conditional expression data
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalData {
    /// Boolean condition
    pub condition: ExpressionNode,
    /// Value when the condition holds
    pub then_expr: ExpressionNode,
    /// Value otherwise
    pub else_expr: ExpressionNode,
}

/// A name the expression reads from its environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reference {
    /// Bare identifier
    Identifier(String),
    /// `#name`
    Variable(String),
    /// `@name`
    Component(String),
}

impl ExpressionNode {
    /// Create a literal node
    pub fn literal(value: LiteralValue) -> Self {
        ExpressionNode::Literal(value)
    }

    /// Create a binary operation node
    pub fn binary(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        ExpressionNode::BinaryOp(Box::new(BinaryOpData { op, left, right }))
    }

    /// Create a unary operation node
    pub fn unary(op: UnaryOperator, operand: ExpressionNode) -> Self {
        ExpressionNode::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a conditional node
    pub fn conditional(
        condition: ExpressionNode,
        then_expr: ExpressionNode,
        else_expr: ExpressionNode,
    ) -> Self {
        ExpressionNode::Conditional(Box::new(ConditionalData {
            condition,
            then_expr,
            else_expr,
        }))
    }

    /// Create a method call node
    pub fn method_call(
        base: ExpressionNode,
        method: impl Into<String>,
        arguments: Arguments,
        null_safe: bool,
    ) -> Self {
        ExpressionNode::MethodCall(Box::new(MethodCallData {
            base,
            method: method.into(),
            arguments,
            null_safe,
        }))
    }

    /// Collect every environment name the expression reads, in source order
    ///
    /// Duplicates are kept out; property and method names are not references.
    pub fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<Reference>) {
        match self {
            ExpressionNode::Literal(_) => {}
            ExpressionNode::Identifier(name) => {
                push_unique(out, Reference::Identifier(name.clone()))
            }
            ExpressionNode::Variable(name) => push_unique(out, Reference::Variable(name.clone())),
            ExpressionNode::Component(name) => {
                push_unique(out, Reference::Component(name.clone()))
            }
            ExpressionNode::Property { base, .. } => base.collect_references(out),
            ExpressionNode::MethodCall(call) => {
                call.base.collect_references(out);
                for arg in &call.arguments {
                    arg.collect_references(out);
                }
            }
            ExpressionNode::Index { base, index } => {
                base.collect_references(out);
                index.collect_references(out);
            }
            ExpressionNode::BinaryOp(data) => {
                data.left.collect_references(out);
                data.right.collect_references(out);
            }
            ExpressionNode::UnaryOp { operand, .. } => operand.collect_references(out),
            ExpressionNode::Conditional(data) => {
                data.condition.collect_references(out);
                data.then_expr.collect_references(out);
                data.else_expr.collect_references(out);
            }
            ExpressionNode::Elvis { value, fallback } => {
                value.collect_references(out);
                fallback.collect_references(out);
            }
            ExpressionNode::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
        }
    }
}

fn push_unique(out: &mut Vec<Reference>, reference: Reference) {
    if !out.contains(&reference) {
        out.push(reference);
    }
}
