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

//! Error types for expression compilation and evaluation
//!
//! Three channels are kept apart on purpose:
//!
//! - [`ParseError`]: malformed expression text. Always surfaces to the caller.
//! - [`EvaluationError`]: data-dependent failures while running a compiled
//!   expression. The evaluator converts these into an empty result.
//! - [`RegistryError`]: misuse of the process-wide component registry.
//!
//! [`ResolverError`] is the only error type that crosses the public
//! evaluate/resolve boundary.

use thiserror::Error;

/// Result type alias for resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Result type alias for the evaluation channel
pub type EvaluationResult<T> = std::result::Result<T, EvaluationError>;

/// Result type alias for parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Syntax errors raised while compiling expression text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The expression text is empty or only whitespace
    #[error("Empty expression")]
    EmptyExpression,

    /// A token appeared where it is not allowed
    #[error("Unexpected token '{found}' at position {position}, expected {expected}")]
    UnexpectedToken {
        /// Text of the offending token
        found: String,
        /// What the parser was looking for
        expected: String,
        /// Byte offset of the token
        position: usize,
    },

    /// Input ended in the middle of an expression
    #[error("Unexpected end of expression, expected {expected}")]
    UnexpectedEnd {
        /// What the parser was looking for
        expected: String,
    },

    /// A character that starts no token
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter {
        /// The character
        character: char,
        /// Byte offset of the character
        position: usize,
    },

    /// A numeric literal that does not fit its type
    #[error("Invalid number literal '{literal}' at position {position}")]
    InvalidNumber {
        /// Literal text
        literal: String,
        /// Byte offset of the literal
        position: usize,
    },

    /// A string literal without its closing quote
    #[error("Unterminated string literal starting at position {position}")]
    UnterminatedString {
        /// Byte offset of the opening quote
        position: usize,
    },

    /// An escape sequence the language does not define
    #[error("Invalid escape sequence '{sequence}' at position {position}")]
    InvalidEscape {
        /// The escape text
        sequence: String,
        /// Byte offset of the backslash
        position: usize,
    },

    /// Nesting exceeded the parser depth limit
    #[error("Expression nests deeper than {limit} levels at position {position}")]
    TooDeeplyNested {
        /// Configured depth limit
        limit: usize,
        /// Byte offset where the limit was hit
        position: usize,
    },
}

impl ParseError {
    /// Byte offset of the error, when known
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::EmptyExpression | ParseError::UnexpectedEnd { .. } => None,
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedCharacter { position, .. }
            | ParseError::InvalidNumber { position, .. }
            | ParseError::UnterminatedString { position }
            | ParseError::InvalidEscape { position, .. }
            | ParseError::TooDeeplyNested { position, .. } => Some(*position),
        }
    }
}

/// Failures raised while evaluating a compiled expression against a context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// An identifier resolved neither to a binding nor to a component
    #[error("Unresolved reference '{name}'")]
    UnresolvedReference {
        /// The identifier
        name: String,
    },

    /// An `@name` reference with no matching registry component
    #[error("Unresolved component '@{name}'")]
    UnresolvedComponent {
        /// The component name
        name: String,
    },

    /// Property access on a map without that key
    #[error("Property '{property}' not found on {type_name}")]
    UnknownProperty {
        /// The property name
        property: String,
        /// Type of the navigated value
        type_name: String,
    },

    /// Navigation or method call on a null value
    #[error("Cannot {operation} on null")]
    NullReference {
        /// Description of the attempted operation
        operation: String,
    },

    /// An operator or method received an operand of the wrong type
    #[error("Type mismatch in {operation}: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Operator or method name
        operation: String,
        /// Accepted type(s)
        expected: String,
        /// Type that was supplied
        actual: String,
    },

    /// Overflow, division by zero and friends
    #[error("Arithmetic error: {message}")]
    Arithmetic {
        /// Human-readable description
        message: String,
    },

    /// Index outside the bounds of a list or string
    #[error("Index {index} out of bounds for size {size}")]
    IndexOutOfBounds {
        /// The requested index
        index: i64,
        /// Length of the indexed value
        size: usize,
    },

    /// Method name not supported by the receiver type
    #[error("Unknown method '{method}' on {type_name}")]
    UnknownMethod {
        /// The method name
        method: String,
        /// Type of the receiver
        type_name: String,
    },

    /// Method called with the wrong number of arguments
    #[error("Method '{method}' expects {expected} arguments, got {actual}")]
    InvalidArgumentCount {
        /// The method name
        method: String,
        /// Expected argument count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// A `matches` pattern that is not a valid regular expression
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern text
        pattern: String,
        /// Regex compiler message
        message: String,
    },

    /// The result could not be coerced to the requested type
    #[error("Conversion error: cannot convert {from} to {to}")]
    Conversion {
        /// Type of the evaluated value
        from: String,
        /// Requested type
        to: String,
    },
}

impl EvaluationError {
    /// Shorthand for [`EvaluationError::TypeMismatch`]
    pub fn type_mismatch(
        operation: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        EvaluationError::TypeMismatch {
            operation: operation.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Shorthand for [`EvaluationError::Arithmetic`]
    pub fn arithmetic(message: impl Into<String>) -> Self {
        EvaluationError::Arithmetic {
            message: message.into(),
        }
    }

    /// Shorthand for [`EvaluationError::Conversion`]
    pub fn conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        EvaluationError::Conversion {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Errors from the write-once component registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A registry was already installed; the first one stays in effect
    #[error("Component registry is already registered")]
    AlreadyRegistered,
}

/// Errors surfaced by the public resolver API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// The expression text failed to compile
    #[error("Failed to compile expression '{expression}': {source}")]
    Compile {
        /// The offending expression text
        expression: String,
        /// Underlying syntax error
        #[source]
        source: ParseError,
    },

    /// Component registry misuse
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ResolverError {
    /// Wrap a parse error together with the expression text
    pub fn compile(expression: impl Into<String>, source: ParseError) -> Self {
        ResolverError::Compile {
            expression: expression.into(),
            source,
        }
    }

    /// The underlying parse error, if this is a compile failure
    pub fn as_parse_error(&self) -> Option<&ParseError> {
        match self {
            ResolverError::Compile { source, .. } => Some(source),
            ResolverError::Registry(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_position() {
        let err = ParseError::UnexpectedCharacter {
            character: '$',
            position: 4,
        };
        assert_eq!(err.position(), Some(4));
        assert_eq!(ParseError::EmptyExpression.position(), None);
    }

    #[test]
    fn test_compile_error_display() {
        let err = ResolverError::compile(
            "x +",
            ParseError::UnexpectedEnd {
                expected: "operand".to_string(),
            },
        );
        let message = err.to_string();
        assert!(message.contains("'x +'"));
        assert!(message.contains("expected operand"));
        assert!(err.as_parse_error().is_some());
    }

    #[test]
    fn test_registry_error_is_transparent() {
        let err: ResolverError = RegistryError::AlreadyRegistered.into();
        assert_eq!(err.to_string(), "Component registry is already registered");
        assert!(err.as_parse_error().is_none());
    }
}
