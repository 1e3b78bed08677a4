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

//! Tree-walking interpreter
//!
//! Every failure is an [`EvaluationError`]; the engine decides what to do
//! with it.

use super::compiled::CompiledExpression;
use super::context::BindingContext;
use crate::ast::{BinaryOperator, ExpressionNode, LiteralValue, MethodCallData, UnaryOperator};
use crate::core::{EvaluationError, EvaluationResult, Value};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxBuildHasher;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Upper bound on cached `matches` patterns before the cache is reset
const MAX_CACHED_PATTERNS: usize = 256;

/// Full-match regexes keyed by pattern text
static PATTERN_CACHE: Lazy<DashMap<String, Regex, FxBuildHasher>> =
    Lazy::new(|| DashMap::with_hasher(FxBuildHasher));

fn full_match_regex(pattern: &str) -> EvaluationResult<Regex> {
    if let Some(regex) = PATTERN_CACHE.get(pattern) {
        return Ok(regex.value().clone());
    }

    let regex =
        Regex::new(&format!("^(?:{pattern})$")).map_err(|e| EvaluationError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

    if PATTERN_CACHE.len() >= MAX_CACHED_PATTERNS {
        PATTERN_CACHE.clear();
    }
    PATTERN_CACHE.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Evaluate a compiled expression against a context
pub fn interpret(
    compiled: &CompiledExpression,
    context: &BindingContext,
) -> EvaluationResult<Value> {
    Interpreter::new(context).evaluate(compiled.root())
}

/// Evaluates expression trees against one context
pub struct Interpreter<'ctx> {
    context: &'ctx BindingContext,
}

impl<'ctx> Interpreter<'ctx> {
    /// Create an interpreter over `context`
    pub fn new(context: &'ctx BindingContext) -> Self {
        Self { context }
    }

    /// Evaluate one node
    pub fn evaluate(&self, node: &ExpressionNode) -> EvaluationResult<Value> {
        match node {
            ExpressionNode::Literal(literal) => Ok(literal_value(literal)),
            ExpressionNode::Identifier(name) => self.context.lookup(name).ok_or_else(|| {
                EvaluationError::UnresolvedReference { name: name.clone() }
            }),
            ExpressionNode::Variable(name) => self.context.binding(name).cloned().ok_or_else(|| {
                EvaluationError::UnresolvedReference {
                    name: format!("#{name}"),
                }
            }),
            ExpressionNode::Component(name) => self
                .context
                .component(name)
                .ok_or_else(|| EvaluationError::UnresolvedComponent { name: name.clone() }),
            ExpressionNode::Property {
                base,
                name,
                null_safe,
            } => {
                let target = self.evaluate(base)?;
                property(target, name, *null_safe)
            }
            ExpressionNode::MethodCall(call) => self.evaluate_method_call(call),
            ExpressionNode::Index { base, index } => {
                let target = self.evaluate(base)?;
                let index = self.evaluate(index)?;
                index_value(&target, &index)
            }
            ExpressionNode::BinaryOp(data) => {
                self.evaluate_binary(data.op, &data.left, &data.right)
            }
            ExpressionNode::UnaryOp { op, operand } => {
                let operand = self.evaluate(operand)?;
                unary(*op, operand)
            }
            ExpressionNode::Conditional(data) => {
                let condition = self.evaluate(&data.condition)?;
                if truthy(&condition, "?:")? {
                    self.evaluate(&data.then_expr)
                } else {
                    self.evaluate(&data.else_expr)
                }
            }
            ExpressionNode::Elvis { value, fallback } => match self.evaluate(value)? {
                Value::Null => self.evaluate(fallback),
                value => Ok(value),
            },
            ExpressionNode::List(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<EvaluationResult<Vec<_>>>()
                .map(Value::list),
        }
    }

    fn evaluate_binary(
        &self,
        op: BinaryOperator,
        left: &ExpressionNode,
        right: &ExpressionNode,
    ) -> EvaluationResult<Value> {
        if op.is_short_circuit() {
            let lhs = require_bool(op, self.evaluate(left)?)?;
            // `false and _` and `true or _` never look at the right side
            if (op == BinaryOperator::And) != lhs {
                return Ok(Value::Boolean(lhs));
            }
            let rhs = require_bool(op, self.evaluate(right)?)?;
            return Ok(Value::Boolean(rhs));
        }

        let lhs = self.evaluate(left)?;
        let rhs = self.evaluate(right)?;
        binary(op, &lhs, &rhs)
    }

    fn evaluate_method_call(&self, call: &MethodCallData) -> EvaluationResult<Value> {
        let receiver = self.evaluate(&call.base)?;
        if receiver.is_null() {
            if call.null_safe {
                return Ok(Value::Null);
            }
            return Err(EvaluationError::NullReference {
                operation: format!("call '{}()'", call.method),
            });
        }

        let arguments = call
            .arguments
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<EvaluationResult<Vec<_>>>()?;
        call_method(&receiver, &call.method, &arguments)
    }
}

fn literal_value(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::Null => Value::Null,
        LiteralValue::Boolean(b) => Value::Boolean(*b),
        LiteralValue::Integer(i) => Value::Integer(*i),
        LiteralValue::Decimal(d) => Value::Decimal(*d),
        LiteralValue::String(s) => Value::String(s.clone()),
    }
}

/// Null counts as false; anything else that is not a boolean is an error
fn truthy(value: &Value, operation: &str) -> EvaluationResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(EvaluationError::type_mismatch(
            operation,
            "Boolean",
            other.type_name(),
        )),
    }
}

fn require_bool(op: BinaryOperator, value: Value) -> EvaluationResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| EvaluationError::type_mismatch(op.as_str(), "Boolean", value.type_name()))
}

fn property(target: Value, name: &str, null_safe: bool) -> EvaluationResult<Value> {
    match target {
        Value::Null if null_safe => Ok(Value::Null),
        Value::Null => Err(EvaluationError::NullReference {
            operation: format!("access property '{name}'"),
        }),
        Value::Map(map) => map
            .get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UnknownProperty {
                property: name.to_string(),
                type_name: "Map".to_string(),
            }),
        other => Err(EvaluationError::UnknownProperty {
            property: name.to_string(),
            type_name: other.type_name().to_string(),
        }),
    }
}

fn checked_position(index: i64, size: usize) -> EvaluationResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < size)
        .ok_or(EvaluationError::IndexOutOfBounds { index, size })
}

fn index_value(target: &Value, index: &Value) -> EvaluationResult<Value> {
    match (target, index) {
        (Value::Null, _) => Err(EvaluationError::NullReference {
            operation: "index".to_string(),
        }),
        (Value::List(items), Value::Integer(i)) => {
            let position = checked_position(*i, items.len())?;
            Ok(items[position].clone())
        }
        (Value::String(s), Value::Integer(i)) => {
            let size = s.chars().count();
            let position = checked_position(*i, size)?;
            Ok(s
                .chars()
                .nth(position)
                .map_or(Value::Null, |c| Value::string(c.to_string())))
        }
        (Value::Map(map), Value::String(key)) => {
            Ok(map.get(&**key).cloned().unwrap_or_default())
        }
        (Value::Map(_), other) => Err(EvaluationError::type_mismatch(
            "[]",
            "String",
            other.type_name(),
        )),
        (Value::List(_) | Value::String(_), other) => Err(EvaluationError::type_mismatch(
            "[]",
            "Integer",
            other.type_name(),
        )),
        (other, _) => Err(EvaluationError::type_mismatch(
            "[]",
            "List, String or Map",
            other.type_name(),
        )),
    }
}

fn unary(op: UnaryOperator, operand: Value) -> EvaluationResult<Value> {
    match (op, operand) {
        (UnaryOperator::Negate, Value::Integer(i)) => i
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| EvaluationError::arithmetic("integer overflow in negation")),
        (UnaryOperator::Negate, Value::Decimal(d)) => Ok(Value::Decimal(-d)),
        (UnaryOperator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOperator::Negate, other) => Err(EvaluationError::type_mismatch(
            "-",
            "Integer or Decimal",
            other.type_name(),
        )),
        (UnaryOperator::Not, other) => Err(EvaluationError::type_mismatch(
            "!",
            "Boolean",
            other.type_name(),
        )),
    }
}

fn binary(op: BinaryOperator, lhs: &Value, rhs: &Value) -> EvaluationResult<Value> {
    match op {
        BinaryOperator::Add => add(lhs, rhs),
        BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => arithmetic(op, lhs, rhs),
        BinaryOperator::Equal => Ok(Value::Boolean(values_equal(lhs, rhs))),
        BinaryOperator::NotEqual => Ok(Value::Boolean(!values_equal(lhs, rhs))),
        BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => {
            let ordering = compare(op, lhs, rhs)?;
            let result = match op {
                BinaryOperator::LessThan => ordering == Ordering::Less,
                BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
                BinaryOperator::GreaterThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Boolean(result))
        }
        BinaryOperator::Matches => match (lhs, rhs) {
            (Value::String(text), Value::String(pattern)) => {
                Ok(Value::Boolean(full_match_regex(pattern)?.is_match(text)))
            }
            (Value::String(_), other) | (other, _) => Err(EvaluationError::type_mismatch(
                "matches",
                "String",
                other.type_name(),
            )),
        },
        BinaryOperator::And | BinaryOperator::Or => {
            let lhs = require_bool(op, lhs.clone())?;
            let rhs = require_bool(op, rhs.clone())?;
            Ok(Value::Boolean(if op == BinaryOperator::And {
                lhs && rhs
            } else {
                lhs || rhs
            }))
        }
    }
}

fn add(lhs: &Value, rhs: &Value) -> EvaluationResult<Value> {
    match (lhs, rhs) {
        (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::string(format!("{lhs}{rhs}"))),
        (Value::List(left), Value::List(right)) => {
            Ok(Value::list(left.iter().chain(right.iter()).cloned()))
        }
        _ => arithmetic(BinaryOperator::Add, lhs, rhs),
    }
}

fn arithmetic(op: BinaryOperator, lhs: &Value, rhs: &Value) -> EvaluationResult<Value> {
    if let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) {
        return integer_arithmetic(op, *a, *b).map(Value::Integer);
    }

    let (Some(a), Some(b)) = (lhs.as_decimal(), rhs.as_decimal()) else {
        let offending = if lhs.is_numeric() { rhs } else { lhs };
        return Err(EvaluationError::type_mismatch(
            op.as_str(),
            "Integer or Decimal",
            offending.type_name(),
        ));
    };
    decimal_arithmetic(op, a, b).map(Value::Decimal)
}

fn integer_arithmetic(op: BinaryOperator, a: i64, b: i64) -> EvaluationResult<i64> {
    if matches!(op, BinaryOperator::Divide | BinaryOperator::Modulo) && b == 0 {
        return Err(EvaluationError::arithmetic("division by zero"));
    }
    let result = match op {
        BinaryOperator::Add => a.checked_add(b),
        BinaryOperator::Subtract => a.checked_sub(b),
        BinaryOperator::Multiply => a.checked_mul(b),
        BinaryOperator::Divide => a.checked_div(b),
        BinaryOperator::Modulo => a.checked_rem(b),
        _ => None,
    };
    result.ok_or_else(|| EvaluationError::arithmetic(format!("integer overflow in {a} {op} {b}")))
}

fn decimal_arithmetic(op: BinaryOperator, a: Decimal, b: Decimal) -> EvaluationResult<Decimal> {
    if matches!(op, BinaryOperator::Divide | BinaryOperator::Modulo) && b.is_zero() {
        return Err(EvaluationError::arithmetic("division by zero"));
    }
    let result = match op {
        BinaryOperator::Add => a.checked_add(b),
        BinaryOperator::Subtract => a.checked_sub(b),
        BinaryOperator::Multiply => a.checked_mul(b),
        BinaryOperator::Divide => a.checked_div(b),
        BinaryOperator::Modulo => a.checked_rem(b),
        _ => None,
    };
    result.ok_or_else(|| EvaluationError::arithmetic(format!("decimal overflow in {a} {op} {b}")))
}

/// Structural equality with integer/decimal promotion
pub fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Decimal(b)) | (Value::Decimal(b), Value::Integer(a)) => {
            Decimal::from(*a) == *b
        }
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => lhs == rhs,
    }
}

fn compare(op: BinaryOperator, lhs: &Value, rhs: &Value) -> EvaluationResult<Ordering> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => match (lhs.as_decimal(), rhs.as_decimal()) {
            (Some(a), Some(b)) => Ok(a.cmp(&b)),
            _ => {
                let offending = if lhs.is_numeric() || matches!(lhs, Value::String(_)) {
                    rhs
                } else {
                    lhs
                };
                Err(EvaluationError::type_mismatch(
                    op.as_str(),
                    "two numbers or two strings",
                    offending.type_name(),
                ))
            }
        },
    }
}

fn expect_arity(method: &str, arguments: &[Value], expected: usize) -> EvaluationResult<()> {
    if arguments.len() == expected {
        Ok(())
    } else {
        Err(EvaluationError::InvalidArgumentCount {
            method: method.to_string(),
            expected,
            actual: arguments.len(),
        })
    }
}

fn string_argument<'a>(method: &str, argument: &'a Value) -> EvaluationResult<&'a str> {
    argument
        .as_str()
        .ok_or_else(|| EvaluationError::type_mismatch(method, "String", argument.type_name()))
}

fn unknown_method(method: &str, receiver: &Value) -> EvaluationError {
    EvaluationError::UnknownMethod {
        method: method.to_string(),
        type_name: receiver.type_name().to_string(),
    }
}

fn length_of(receiver: &Value) -> Option<usize> {
    match receiver {
        Value::String(s) => Some(s.chars().count()),
        Value::List(items) => Some(items.len()),
        Value::Map(map) => Some(map.len()),
        _ => None,
    }
}

fn call_method(receiver: &Value, method: &str, arguments: &[Value]) -> EvaluationResult<Value> {
    match method {
        "size" | "length" => {
            expect_arity(method, arguments, 0)?;
            let len = length_of(receiver).ok_or_else(|| unknown_method(method, receiver))?;
            i64::try_from(len)
                .map(Value::Integer)
                .map_err(|_| EvaluationError::arithmetic("length exceeds integer range"))
        }
        "isEmpty" => {
            expect_arity(method, arguments, 0)?;
            let len = length_of(receiver).ok_or_else(|| unknown_method(method, receiver))?;
            Ok(Value::Boolean(len == 0))
        }
        "contains" => {
            expect_arity(method, arguments, 1)?;
            let needle = &arguments[0];
            let found = match receiver {
                Value::String(s) => s.contains(string_argument(method, needle)?),
                Value::List(items) => items.iter().any(|item| values_equal(item, needle)),
                Value::Map(map) => map.contains_key(string_argument(method, needle)?),
                other => return Err(unknown_method(method, other)),
            };
            Ok(Value::Boolean(found))
        }
        "startsWith" | "endsWith" => {
            expect_arity(method, arguments, 1)?;
            let Value::String(s) = receiver else {
                return Err(unknown_method(method, receiver));
            };
            let affix = string_argument(method, &arguments[0])?;
            let result = if method == "startsWith" {
                s.starts_with(affix)
            } else {
                s.ends_with(affix)
            };
            Ok(Value::Boolean(result))
        }
        "toUpperCase" | "toLowerCase" | "trim" => {
            expect_arity(method, arguments, 0)?;
            let Value::String(s) = receiver else {
                return Err(unknown_method(method, receiver));
            };
            let result = match method {
                "toUpperCase" => s.to_uppercase(),
                "toLowerCase" => s.to_lowercase(),
                _ => s.trim().to_string(),
            };
            Ok(Value::string(result))
        }
        _ => Err(unknown_method(method, receiver)),
    }
}
