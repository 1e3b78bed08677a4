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

//! Tokenizer for expression text
//!
//! Tokens borrow from the input; string literals are handed to the parser
//! raw, with escape processing deferred until the literal is actually used.

use super::span::Spanned;
use crate::core::{ParseError, ParseResult};
use std::fmt;
use unicode_xid::UnicodeXID;

/// Token with zero-copy string slices
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Decimal literal as string slice, parsed on demand (e.g., 3.14)
    Decimal(&'input str),
    /// String literal body between the quotes, escapes unprocessed
    String(&'input str),
    /// Boolean literal value
    Boolean(bool),
    /// `null`
    Null,

    /// Identifier
    Identifier(&'input str),
    /// `#name` variable reference
    Variable(&'input str),
    /// `@name` component reference
    Component(&'input str),

    /// Addition operator (+)
    Plus,
    /// Subtraction operator (-)
    Minus,
    /// Multiplication operator (*)
    Multiply,
    /// Division operator (/)
    Divide,
    /// Remainder operator (%)
    Percent,
    /// Equality operator (==)
    Equal,
    /// Inequality operator (!=)
    NotEqual,
    /// Less than operator (<)
    LessThan,
    /// Less than or equal operator (<=)
    LessThanOrEqual,
    /// Greater than operator (>)
    GreaterThan,
    /// Greater than or equal operator (>=)
    GreaterThanOrEqual,
    /// Logical AND (and, &&)
    And,
    /// Logical OR (or, ||)
    Or,
    /// Logical NOT (not, !)
    Not,
    /// Regex match keyword (matches)
    Matches,

    /// Ternary question mark (?)
    Question,
    /// Ternary colon (:)
    Colon,
    /// Elvis operator (?:)
    Elvis,
    /// Null-safe navigation (?.)
    SafeDot,
    /// Navigation (.)
    Dot,
    /// Comma (,)
    Comma,
    /// Left parenthesis
    LeftParen,
    /// Right parenthesis
    RightParen,
    /// Left bracket
    LeftBracket,
    /// Right bracket
    RightBracket,
    /// Left brace
    LeftBrace,
    /// Right brace
    RightBrace,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(i) => write!(f, "{i}"),
            Token::Decimal(d) => f.write_str(d),
            Token::String(s) => write!(f, "'{s}'"),
            Token::Boolean(b) => write!(f, "{b}"),
            Token::Null => f.write_str("null"),
            Token::Identifier(name) => f.write_str(name),
            Token::Variable(name) => write!(f, "#{name}"),
            Token::Component(name) => write!(f, "@{name}"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Multiply => f.write_str("*"),
            Token::Divide => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::Equal => f.write_str("=="),
            Token::NotEqual => f.write_str("!="),
            Token::LessThan => f.write_str("<"),
            Token::LessThanOrEqual => f.write_str("<="),
            Token::GreaterThan => f.write_str(">"),
            Token::GreaterThanOrEqual => f.write_str(">="),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::Not => f.write_str("not"),
            Token::Matches => f.write_str("matches"),
            Token::Question => f.write_str("?"),
            Token::Colon => f.write_str(":"),
            Token::Elvis => f.write_str("?:"),
            Token::SafeDot => f.write_str("?."),
            Token::Dot => f.write_str("."),
            Token::Comma => f.write_str(","),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::LeftBracket => f.write_str("["),
            Token::RightBracket => f.write_str("]"),
            Token::LeftBrace => f.write_str("{"),
            Token::RightBrace => f.write_str("}"),
        }
    }
}

fn keyword<'a>(text: &str) -> Option<Token<'a>> {
    match text {
        "true" => Some(Token::Boolean(true)),
        "false" => Some(Token::Boolean(false)),
        "null" => Some(Token::Null),
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "not" => Some(Token::Not),
        "matches" => Some(Token::Matches),
        _ => None,
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch == '_' || ch.is_xid_start()
}

fn is_identifier_continue(ch: char) -> bool {
    ch == '_' || ch.is_xid_continue()
}

/// Streaming tokenizer over an expression string
pub struct Tokenizer<'input> {
    input: &'input str,
    position: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a tokenizer at the start of `input`
    pub fn new(input: &'input str) -> Self {
        Self { input, position: 0 }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.position
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.position..].chars();
        chars.next();
        chars.next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if !ch.is_whitespace() {
                break;
            }
            self.position += ch.len_utf8();
        }
    }

    fn read_identifier(&mut self) -> &'input str {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if !is_identifier_continue(ch) {
                break;
            }
            self.position += ch.len_utf8();
        }
        &self.input[start..self.position]
    }

    fn read_number(&mut self, start: usize) -> ParseResult<Token<'input>> {
        let bytes = self.input.as_bytes();
        while self.position < bytes.len() && bytes[self.position].is_ascii_digit() {
            self.position += 1;
        }

        // A dot only belongs to the number when a digit follows it
        let is_decimal = self.position + 1 < bytes.len()
            && bytes[self.position] == b'.'
            && bytes[self.position + 1].is_ascii_digit();

        if is_decimal {
            self.position += 1;
            while self.position < bytes.len() && bytes[self.position].is_ascii_digit() {
                self.position += 1;
            }
            return Ok(Token::Decimal(&self.input[start..self.position]));
        }

        let literal = &self.input[start..self.position];
        literal
            .parse::<i64>()
            .map(Token::Integer)
            .map_err(|_| ParseError::InvalidNumber {
                literal: literal.to_string(),
                position: start,
            })
    }

    fn read_string(&mut self, quote: char, start: usize) -> ParseResult<Token<'input>> {
        // Skip the opening quote
        self.position += quote.len_utf8();
        let body_start = self.position;
        let mut escaped = false;

        while let Some(ch) = self.peek_char() {
            self.position += ch.len_utf8();
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                let body_end = self.position - quote.len_utf8();
                return Ok(Token::String(&self.input[body_start..body_end]));
            }
        }

        Err(ParseError::UnterminatedString { position: start })
    }

    fn read_prefixed_name(
        &mut self,
        start: usize,
        marker: char,
        build: fn(&'input str) -> Token<'input>,
    ) -> ParseResult<Token<'input>> {
        self.position += marker.len_utf8();
        match self.peek_char() {
            Some(ch) if is_identifier_start(ch) => Ok(build(self.read_identifier())),
            _ => Err(ParseError::UnexpectedCharacter {
                character: marker,
                position: start,
            }),
        }
    }

    /// Produce the next token, or `None` at end of input
    pub fn next_token(&mut self) -> ParseResult<Option<Spanned<Token<'input>>>> {
        self.skip_whitespace();
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return Ok(None);
        };

        let token = match ch {
            '0'..='9' => self.read_number(start)?,
            '\'' | '"' => self.read_string(ch, start)?,
            '#' => self.read_prefixed_name(start, '#', Token::Variable)?,
            '@' => self.read_prefixed_name(start, '@', Token::Component)?,
            c if is_identifier_start(c) => {
                let text = self.read_identifier();
                keyword(text).unwrap_or(Token::Identifier(text))
            }
            _ => {
                let (token, width) = match (ch, self.peek_second()) {
                    ('=', Some('=')) => (Token::Equal, 2),
                    ('!', Some('=')) => (Token::NotEqual, 2),
                    ('<', Some('=')) => (Token::LessThanOrEqual, 2),
                    ('>', Some('=')) => (Token::GreaterThanOrEqual, 2),
                    ('&', Some('&')) => (Token::And, 2),
                    ('|', Some('|')) => (Token::Or, 2),
                    ('?', Some(':')) => (Token::Elvis, 2),
                    ('?', Some('.')) => (Token::SafeDot, 2),
                    ('+', _) => (Token::Plus, 1),
                    ('-', _) => (Token::Minus, 1),
                    ('*', _) => (Token::Multiply, 1),
                    ('/', _) => (Token::Divide, 1),
                    ('%', _) => (Token::Percent, 1),
                    ('<', _) => (Token::LessThan, 1),
                    ('>', _) => (Token::GreaterThan, 1),
                    ('!', _) => (Token::Not, 1),
                    ('?', _) => (Token::Question, 1),
                    (':', _) => (Token::Colon, 1),
                    ('.', _) => (Token::Dot, 1),
                    (',', _) => (Token::Comma, 1),
                    ('(', _) => (Token::LeftParen, 1),
                    (')', _) => (Token::RightParen, 1),
                    ('[', _) => (Token::LeftBracket, 1),
                    (']', _) => (Token::RightBracket, 1),
                    ('{', _) => (Token::LeftBrace, 1),
                    ('}', _) => (Token::RightBrace, 1),
                    _ => {
                        return Err(ParseError::UnexpectedCharacter {
                            character: ch,
                            position: start,
                        });
                    }
                };
                self.position += width;
                token
            }
        };

        Ok(Some(Spanned::new(token, start, self.position)))
    }

    /// Tokenize the whole input
    pub fn tokenize_all(&mut self) -> ParseResult<Vec<Spanned<Token<'input>>>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}
