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

//! Coercion of evaluation results into requested Rust types
//!
//! The requested type is the `T` of `evaluate::<T>`. A failed coercion is an
//! evaluation-channel failure, so callers see it as an empty result.

use super::error::{EvaluationError, EvaluationResult};
use super::value::{Value, ValueMap};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;

/// Conversion from a non-null [`Value`] into a concrete type
///
/// `Value::Null` never reaches an implementation through the evaluator; it
/// is mapped to the empty result before coercion.
pub trait FromValue: Sized {
    /// Name used in conversion error messages
    const TYPE_NAME: &'static str;

    /// Convert, or report why the value does not fit
    fn from_value(value: Value) -> EvaluationResult<Self>;
}

fn mismatch<T: FromValue>(value: &Value) -> EvaluationError {
    EvaluationError::conversion(value.type_name(), T::TYPE_NAME)
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "Value";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "Boolean";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        match &value {
            Value::Boolean(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "Integer";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        match &value {
            Value::Integer(i) => Ok(*i),
            Value::Decimal(d) if d.fract().is_zero() => {
                d.to_i64().ok_or_else(|| mismatch::<Self>(&value))
            }
            Value::String(s) => s.trim().parse().map_err(|_| mismatch::<Self>(&value)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl FromValue for i32 {
    const TYPE_NAME: &'static str = "Integer";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        let type_name = value.type_name();
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| EvaluationError::conversion(type_name, "32-bit Integer"))
    }
}

impl FromValue for u64 {
    const TYPE_NAME: &'static str = "Unsigned Integer";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        let type_name = value.type_name();
        let wide = i64::from_value(value)?;
        u64::try_from(wide).map_err(|_| EvaluationError::conversion(type_name, Self::TYPE_NAME))
    }
}

impl FromValue for Decimal {
    const TYPE_NAME: &'static str = "Decimal";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        match &value {
            Value::Integer(i) => Ok(Decimal::from(*i)),
            Value::Decimal(d) => Ok(*d),
            Value::String(s) => s.trim().parse().map_err(|_| mismatch::<Self>(&value)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "Float";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        match &value {
            Value::Integer(i) => Ok(*i as f64),
            Value::Decimal(d) => d.to_f64().ok_or_else(|| mismatch::<Self>(&value)),
            Value::String(s) => s.trim().parse().map_err(|_| mismatch::<Self>(&value)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "String";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        Ok(match value {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        })
    }
}

impl FromValue for Arc<str> {
    const TYPE_NAME: &'static str = "String";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        Ok(match value {
            Value::String(s) => s,
            other => Arc::from(other.to_string()),
        })
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    const TYPE_NAME: &'static str = "List";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        match value {
            Value::List(items) => {
                let items = Arc::try_unwrap(items).unwrap_or_else(|shared| (*shared).clone());
                items.into_iter().map(T::from_value).collect()
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for ValueMap {
    const TYPE_NAME: &'static str = "Map";

    fn from_value(value: Value) -> EvaluationResult<Self> {
        match value {
            Value::Map(map) => Ok(Arc::try_unwrap(map).unwrap_or_else(|shared| (*shared).clone())),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Boolean(true), Some(true))]
    #[case(Value::string("FALSE"), Some(false))]
    #[case(Value::Integer(1), None)]
    #[case(Value::string("yes"), None)]
    fn test_bool_coercion(#[case] input: Value, #[case] expected: Option<bool>) {
        assert_eq!(bool::from_value(input).ok(), expected);
    }

    #[rstest]
    #[case(Value::Integer(42), Some(42))]
    #[case(Value::Decimal(Decimal::new(400, 1)), Some(40))]
    #[case(Value::Decimal(Decimal::new(405, 1)), None)]
    #[case(Value::string(" 17 "), Some(17))]
    #[case(Value::Boolean(true), None)]
    fn test_integer_coercion(#[case] input: Value, #[case] expected: Option<i64>) {
        assert_eq!(i64::from_value(input).ok(), expected);
    }

    #[test]
    fn test_narrowing_reports_conversion_error() {
        let err = i32::from_value(Value::Integer(i64::MAX)).unwrap_err();
        assert!(matches!(err, EvaluationError::Conversion { .. }));
        assert!(u64::from_value(Value::Integer(-1)).is_err());
    }

    #[test]
    fn test_everything_renders_as_string() {
        assert_eq!(String::from_value(Value::Integer(8)).unwrap(), "8");
        assert_eq!(String::from_value(Value::from(vec![1, 2])).unwrap(), "[1, 2]");
    }

    #[test]
    fn test_list_coercion_is_elementwise() {
        let list = Value::from(vec![1, 2, 3]);
        assert_eq!(Vec::<i64>::from_value(list).unwrap(), vec![1, 2, 3]);

        let mixed = Value::list([Value::Integer(1), Value::Boolean(false)]);
        assert!(Vec::<i64>::from_value(mixed).is_err());
    }

    #[test]
    fn test_decimal_from_integer_and_string() {
        assert_eq!(Decimal::from_value(Value::Integer(2)).unwrap(), Decimal::from(2));
        assert_eq!(
            Decimal::from_value(Value::string("1.25")).unwrap(),
            Decimal::new(125, 2)
        );
        assert_eq!(f64::from_value(Value::Integer(3)).unwrap(), 3.0);
    }
}
