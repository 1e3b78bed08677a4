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

//! Pratt parser for the expression language
//!
//! Precedence, lowest to highest:
//!
//! | Level          | Operators                       | Associativity |
//! |----------------|---------------------------------|---------------|
//! | Ternary        | `c ? a : b`, `a ?: b`           | right         |
//! | Or             | `or`, `\|\|`                    | left          |
//! | And            | `and`, `&&`                     | left          |
//! | Equality       | `==`, `!=`, `matches`           | left          |
//! | Relational     | `<`, `<=`, `>`, `>=`            | left          |
//! | Additive       | `+`, `-`                        | left          |
//! | Multiplicative | `*`, `/`, `%`                   | left          |
//! | Unary          | `-`, `!`, `not`                 | prefix        |
//! | Postfix        | `.name`, `?.name`, `(..)`, `[..]` | left        |

use super::span::Spanned;
use super::tokenizer::{Token, Tokenizer};
use crate::ast::{Arguments, BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};
use crate::core::{ParseError, ParseResult};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Maximum nesting depth accepted by the parser
pub const MAX_NESTING_DEPTH: usize = 128;

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Ternary and elvis (right associative)
    Ternary = 1,
    /// Logical OR
    Or = 2,
    /// Logical AND
    And = 3,
    /// Equality and regex match
    Equality = 4,
    /// Ordering comparisons
    Relational = 5,
    /// Additive operators
    Additive = 6,
    /// Multiplicative operators
    Multiplicative = 7,
    /// Prefix operators
    Unary = 8,
    /// Navigation, calls and indexing
    Postfix = 9,
}

impl Precedence {
    /// Get the next higher precedence level for left-associative operators
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Ternary => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Relational,
            Precedence::Relational => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Postfix,
            Precedence::Postfix => Precedence::Postfix,
        }
    }
}

fn binary_operator(token: &Token<'_>) -> Option<(BinaryOperator, Precedence)> {
    let entry = match token {
        Token::Or => (BinaryOperator::Or, Precedence::Or),
        Token::And => (BinaryOperator::And, Precedence::And),
        Token::Equal => (BinaryOperator::Equal, Precedence::Equality),
        Token::NotEqual => (BinaryOperator::NotEqual, Precedence::Equality),
        Token::Matches => (BinaryOperator::Matches, Precedence::Equality),
        Token::LessThan => (BinaryOperator::LessThan, Precedence::Relational),
        Token::LessThanOrEqual => (BinaryOperator::LessThanOrEqual, Precedence::Relational),
        Token::GreaterThan => (BinaryOperator::GreaterThan, Precedence::Relational),
        Token::GreaterThanOrEqual => (BinaryOperator::GreaterThanOrEqual, Precedence::Relational),
        Token::Plus => (BinaryOperator::Add, Precedence::Additive),
        Token::Minus => (BinaryOperator::Subtract, Precedence::Additive),
        Token::Multiply => (BinaryOperator::Multiply, Precedence::Multiplicative),
        Token::Divide => (BinaryOperator::Divide, Precedence::Multiplicative),
        Token::Percent => (BinaryOperator::Modulo, Precedence::Multiplicative),
        _ => return None,
    };
    Some(entry)
}

/// Pratt parser over a token stream
pub struct PrattParser<'input> {
    tokenizer: Tokenizer<'input>,
    current: Option<Spanned<Token<'input>>>,
    depth: usize,
}

impl<'input> PrattParser<'input> {
    /// Create a parser and load the first token
    pub fn new(input: &'input str) -> ParseResult<Self> {
        let mut tokenizer = Tokenizer::new(input);
        let current = tokenizer.next_token()?;
        Ok(Self {
            tokenizer,
            current,
            depth: 0,
        })
    }

    fn advance(&mut self) -> ParseResult<Option<Spanned<Token<'input>>>> {
        let next = self.tokenizer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn current(&self) -> Option<&Token<'input>> {
        self.current.as_ref().map(|t| &t.value)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match &self.current {
            Some(token) => ParseError::UnexpectedToken {
                found: token.value.to_string(),
                expected: expected.to_string(),
                position: token.start,
            },
            None => ParseError::UnexpectedEnd {
                expected: expected.to_string(),
            },
        }
    }

    fn expect(&mut self, expected: Token<'input>) -> ParseResult<()> {
        match self.current() {
            Some(token) if *token == expected => {
                self.advance()?;
                Ok(())
            }
            _ => Err(self.unexpected(&format!("'{expected}'"))),
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::TooDeeplyNested {
                limit: MAX_NESTING_DEPTH,
                position: self.tokenizer.position(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Count one more node folded onto the left spine of a loop-built tree
    fn deepen(&mut self, folded: &mut usize) -> ParseResult<()> {
        self.enter()?;
        *folded += 1;
        Ok(())
    }

    /// Parse complete input
    pub fn parse(&mut self) -> ParseResult<ExpressionNode> {
        let expr = self.parse_expression(Precedence::Ternary)?;

        // Ensure we consumed all input
        if self.current.is_some() {
            return Err(self.unexpected("end of expression"));
        }

        Ok(expr)
    }

    fn parse_expression(&mut self, min_precedence: Precedence) -> ParseResult<ExpressionNode> {
        self.enter()?;
        let result = self.parse_expression_inner(min_precedence);
        self.leave();
        result
    }

    // Operator and postfix chains are folded in a loop; each fold still
    // counts against the nesting limit until the loop ends.
    fn parse_expression_inner(
        &mut self,
        min_precedence: Precedence,
    ) -> ParseResult<ExpressionNode> {
        let mut folded = 0;
        let result = self.parse_operators(min_precedence, &mut folded);
        self.depth -= folded;
        result
    }

    fn parse_operators(
        &mut self,
        min_precedence: Precedence,
        folded: &mut usize,
    ) -> ParseResult<ExpressionNode> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.current() {
            match token {
                Token::Question if min_precedence <= Precedence::Ternary => {
                    self.advance()?;
                    self.deepen(folded)?;
                    let then_expr = self.parse_expression(Precedence::Ternary)?;
                    self.expect(Token::Colon)?;
                    let else_expr = self.parse_expression(Precedence::Ternary)?;
                    left = ExpressionNode::conditional(left, then_expr, else_expr);
                }
                Token::Elvis if min_precedence <= Precedence::Ternary => {
                    self.advance()?;
                    self.deepen(folded)?;
                    let fallback = self.parse_expression(Precedence::Ternary)?;
                    left = ExpressionNode::Elvis {
                        value: Box::new(left),
                        fallback: Box::new(fallback),
                    };
                }
                _ => {
                    let Some((op, precedence)) = binary_operator(token) else {
                        break;
                    };
                    if precedence < min_precedence {
                        break;
                    }
                    self.advance()?;
                    self.deepen(folded)?;
                    let right = self.parse_expression(precedence.next_level())?;
                    left = ExpressionNode::binary(op, left, right);
                }
            }
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<ExpressionNode> {
        let op = match self.current() {
            Some(Token::Minus) => Some(UnaryOperator::Negate),
            Some(Token::Not) => Some(UnaryOperator::Not),
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance()?;
                self.enter()?;
                let operand = self.parse_unary();
                self.leave();
                Ok(ExpressionNode::unary(op, operand?))
            }
            None => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<ExpressionNode> {
        let Some(spanned) = self.advance_if_present()? else {
            return Err(ParseError::UnexpectedEnd {
                expected: "operand".to_string(),
            });
        };
        let start = spanned.start;

        let node = match spanned.value {
            Token::Integer(i) => ExpressionNode::literal(LiteralValue::Integer(i)),
            Token::Decimal(text) => {
                let value = text
                    .parse::<Decimal>()
                    .map_err(|_| ParseError::InvalidNumber {
                        literal: text.to_string(),
                        position: start,
                    })?;
                ExpressionNode::literal(LiteralValue::Decimal(value))
            }
            Token::String(raw) => {
                let text = process_string_escapes(raw, start)?;
                ExpressionNode::literal(LiteralValue::String(Arc::from(text)))
            }
            Token::Boolean(b) => ExpressionNode::literal(LiteralValue::Boolean(b)),
            Token::Null => ExpressionNode::literal(LiteralValue::Null),
            Token::Identifier(name) => ExpressionNode::Identifier(name.to_string()),
            Token::Variable(name) => ExpressionNode::Variable(name.to_string()),
            Token::Component(name) => ExpressionNode::Component(name.to_string()),
            Token::LeftParen => {
                let inner = self.parse_expression(Precedence::Ternary)?;
                self.expect(Token::RightParen)?;
                inner
            }
            Token::LeftBrace => ExpressionNode::List(self.parse_list_items()?),
            other => {
                return Err(ParseError::UnexpectedToken {
                    found: other.to_string(),
                    expected: "operand".to_string(),
                    position: start,
                });
            }
        };

        Ok(node)
    }

    fn advance_if_present(&mut self) -> ParseResult<Option<Spanned<Token<'input>>>> {
        if self.current.is_none() {
            return Ok(None);
        }
        self.advance()
    }

    /// Items of an inline list; the opening brace is already consumed
    fn parse_list_items(&mut self) -> ParseResult<Vec<ExpressionNode>> {
        let mut items = Vec::new();
        if self.current() == Some(&Token::RightBrace) {
            self.advance()?;
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression(Precedence::Ternary)?);
            match self.current() {
                Some(Token::Comma) => {
                    self.advance()?;
                }
                Some(Token::RightBrace) => {
                    self.advance()?;
                    return Ok(items);
                }
                _ => return Err(self.unexpected("',' or '}'")),
            }
        }
    }

    /// Arguments of a method call; the opening parenthesis is already consumed
    fn parse_arguments(&mut self) -> ParseResult<Arguments> {
        let mut args = Arguments::new();
        if self.current() == Some(&Token::RightParen) {
            self.advance()?;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression(Precedence::Ternary)?);
            match self.current() {
                Some(Token::Comma) => {
                    self.advance()?;
                }
                Some(Token::RightParen) => {
                    self.advance()?;
                    return Ok(args);
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
    }

    fn parse_postfix(&mut self, left: ExpressionNode) -> ParseResult<ExpressionNode> {
        let mut folded = 0;
        let result = self.parse_postfix_chain(left, &mut folded);
        self.depth -= folded;
        result
    }

    fn parse_postfix_chain(
        &mut self,
        mut left: ExpressionNode,
        folded: &mut usize,
    ) -> ParseResult<ExpressionNode> {
        loop {
            match self.current() {
                Some(Token::Dot) | Some(Token::SafeDot) => {
                    let null_safe = self.current() == Some(&Token::SafeDot);
                    self.advance()?;
                    self.deepen(folded)?;
                    let name = match self.current() {
                        Some(Token::Identifier(name)) => name.to_string(),
                        _ => return Err(self.unexpected("property or method name")),
                    };
                    self.advance()?;

                    if self.current() == Some(&Token::LeftParen) {
                        self.advance()?;
                        let arguments = self.parse_arguments()?;
                        left = ExpressionNode::method_call(left, name, arguments, null_safe);
                    } else {
                        left = ExpressionNode::Property {
                            base: Box::new(left),
                            name,
                            null_safe,
                        };
                    }
                }
                Some(Token::LeftBracket) => {
                    self.advance()?;
                    self.deepen(folded)?;
                    let index = self.parse_expression(Precedence::Ternary)?;
                    self.expect(Token::RightBracket)?;
                    left = ExpressionNode::Index {
                        base: Box::new(left),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(left),
            }
        }
    }
}

/// Process escape sequences in a string literal body
fn process_string_escapes(input: &str, position: usize) -> ParseResult<String> {
    if !input.contains('\\') {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => result.push(c),
                    None => {
                        return Err(ParseError::InvalidEscape {
                            sequence: format!("\\u{hex}"),
                            position,
                        });
                    }
                }
            }
            Some(other) => {
                return Err(ParseError::InvalidEscape {
                    sequence: format!("\\{other}"),
                    position,
                });
            }
            None => {
                return Err(ParseError::InvalidEscape {
                    sequence: "\\".to_string(),
                    position,
                });
            }
        }
    }

    Ok(result)
}

/// Parse expression text into an AST
pub fn parse_expression(input: &str) -> ParseResult<ExpressionNode> {
    if input.trim().is_empty() {
        return Err(ParseError::EmptyExpression);
    }
    PrattParser::new(input)?.parse()
}
