//! Scalar coercion for loosely-typed source values.
//!
//! The telematics feed delivers almost every value as text, even numeric codes
//! (`"line_code": "1151"`), while delimited records are text by construction.
//! This module turns those values into the primitive types of the domain
//! entities and reports malformed input with enough context to name the
//! offending text and the target type.
//!
//! # Rules
//!
//! - `null` never fails: [`coerce`] yields `None` and the caller leaves the
//!   target at its default value
//! - Integers are parsed as decimal text for each signed width; overflow of the
//!   width is [`Malformed::OutOfRange`]
//! - JSON numbers are coerced through their decimal text, so `2.0` is not an
//!   integer
//! - Floats must be finite after parsing
//! - String targets accept strings unchanged and render numbers or booleans as
//!   their JSON text
//! - Arrays and objects are never coerced ([`Malformed::NotScalar`])

use serde_json::Value;
use std::fmt;
use std::num::IntErrorKind;
use thiserror::Error;

/// Target type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Nested or object-valued field; never deep-mapped, only cleared.
    Reference,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "string",
            FieldKind::Int8 => "int8",
            FieldKind::Int16 => "int16",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Float32 => "float32",
            FieldKind::Float64 => "float64",
            FieldKind::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// Why a value could not be coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    NotNumeric,
    OutOfRange,
    NotScalar,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Malformed::NotNumeric => f.write_str("not a decimal number"),
            Malformed::OutOfRange => f.write_str("out of range"),
            Malformed::NotScalar => f.write_str("not a scalar value"),
        }
    }
}

/// A source value that does not fit its target type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot coerce `{text}` to {kind}: {reason}")]
pub struct CoercionError {
    pub text: String,
    pub kind: FieldKind,
    pub reason: Malformed,
}

impl CoercionError {
    pub fn new(text: impl Into<String>, kind: FieldKind, reason: Malformed) -> Self {
        Self {
            text: text.into(),
            kind,
            reason,
        }
    }
}

/// A primitive type a source value can be coerced into.
pub trait Coerce: Sized {
    const KIND: FieldKind;

    fn from_text(text: &str) -> Result<Self, CoercionError>;
}

macro_rules! impl_integer {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl Coerce for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn from_text(text: &str) -> Result<Self, CoercionError> {
                    text.trim().parse::<$ty>().map_err(|err| {
                        let reason = match err.kind() {
                            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                                Malformed::OutOfRange
                            }
                            _ => Malformed::NotNumeric,
                        };
                        CoercionError::new(text, Self::KIND, reason)
                    })
                }
            }
        )+
    };
}

macro_rules! impl_float {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl Coerce for $ty {
                const KIND: FieldKind = FieldKind::$kind;

                fn from_text(text: &str) -> Result<Self, CoercionError> {
                    let parsed = text
                        .trim()
                        .parse::<$ty>()
                        .map_err(|_| CoercionError::new(text, Self::KIND, Malformed::NotNumeric))?;

                    if parsed.is_finite() {
                        return Ok(parsed);
                    }

                    // "inf" and "NaN" parse but are not decimal numbers; "1e40" is
                    // a decimal number that overflows the width.
                    let reason = if text.chars().any(|c| c.is_ascii_digit()) {
                        Malformed::OutOfRange
                    } else {
                        Malformed::NotNumeric
                    };
                    Err(CoercionError::new(text, Self::KIND, reason))
                }
            }
        )+
    };
}

impl_integer!(i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64);
impl_float!(f32 => Float32, f64 => Float64);

impl Coerce for String {
    const KIND: FieldKind = FieldKind::Text;

    fn from_text(text: &str) -> Result<Self, CoercionError> {
        Ok(text.to_string())
    }
}

/// Coerce a dynamic value into `T`.
///
/// Returns `Ok(None)` for `null`, leaving the target untouched.
pub fn coerce<T: Coerce>(value: &Value) -> Result<Option<T>, CoercionError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => T::from_text(text).map(Some),
        Value::Number(number) => T::from_text(&number.to_string()).map(Some),
        Value::Bool(flag) => T::from_text(if *flag { "true" } else { "false" }).map(Some),
        Value::Array(_) | Value::Object(_) => Err(CoercionError::new(
            value.to_string(),
            T::KIND,
            Malformed::NotScalar,
        )),
    }
}

/// A coerced value tagged with its type, for callers that only know the
/// target kind at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

/// Coerce a dynamic value into the scalar type named by `kind`.
///
/// `Reference` targets always come back as `None`, whatever the source holds.
pub fn coerce_as(value: &Value, kind: FieldKind) -> Result<Option<Scalar>, CoercionError> {
    let scalar = match kind {
        FieldKind::Text => coerce::<String>(value)?.map(Scalar::Text),
        FieldKind::Int8 => coerce::<i8>(value)?.map(Scalar::Int8),
        FieldKind::Int16 => coerce::<i16>(value)?.map(Scalar::Int16),
        FieldKind::Int32 => coerce::<i32>(value)?.map(Scalar::Int32),
        FieldKind::Int64 => coerce::<i64>(value)?.map(Scalar::Int64),
        FieldKind::Float32 => coerce::<f32>(value)?.map(Scalar::Float32),
        FieldKind::Float64 => coerce::<f64>(value)?.map(Scalar::Float64),
        FieldKind::Reference => None,
    };
    Ok(scalar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_widths_round_trip() {
        assert_eq!(i8::from_text("-128").unwrap(), i8::MIN);
        assert_eq!(i16::from_text("32767").unwrap(), i16::MAX);
        assert_eq!(i32::from_text("1754").unwrap(), 1754);
        assert_eq!(i64::from_text("9223372036854775807").unwrap(), i64::MAX);
        assert_eq!(i32::from_text(" 799 ").unwrap(), 799);
    }

    #[test]
    fn test_integer_overflow_is_out_of_range() {
        let err = i8::from_text("128").unwrap_err();
        assert_eq!(err.kind, FieldKind::Int8);
        assert_eq!(err.reason, Malformed::OutOfRange);
        assert_eq!(err.text, "128");

        let err = i16::from_text("-40000").unwrap_err();
        assert_eq!(err.reason, Malformed::OutOfRange);
    }

    #[test]
    fn test_integer_rejects_non_numeric_text() {
        for text in ["", "12a", "9889.61", "one", "1 2"] {
            let err = i32::from_text(text).unwrap_err();
            assert_eq!(err.reason, Malformed::NotNumeric, "input {text:?}");
        }
    }

    #[test]
    fn test_float_parsing() {
        assert_eq!(f32::from_text("9889.61").unwrap(), 9889.61_f32);
        assert_eq!(f64::from_text("37.9986").unwrap(), 37.9986);
        assert_eq!(f64::from_text("-1").unwrap(), -1.0);

        assert_eq!(
            f32::from_text("1e40").unwrap_err().reason,
            Malformed::OutOfRange
        );
        assert_eq!(f64::from_text("NaN").unwrap_err().reason, Malformed::NotNumeric);
        assert_eq!(f64::from_text("inf").unwrap_err().reason, Malformed::NotNumeric);
        assert_eq!(f64::from_text("23,6").unwrap_err().reason, Malformed::NotNumeric);
    }

    #[test]
    fn test_coerce_json_values() {
        assert_eq!(coerce::<i32>(&json!("1151")).unwrap(), Some(1151));
        assert_eq!(coerce::<i32>(&json!(1151)).unwrap(), Some(1151));
        assert_eq!(coerce::<f64>(&json!(23.665)).unwrap(), Some(23.665));
        assert_eq!(coerce::<i16>(&Value::Null).unwrap(), None);
        assert_eq!(
            coerce::<String>(&json!("ΠΛΑΤΕΙΑ ΚΑΝΙΓΓΟΣ")).unwrap(),
            Some("ΠΛΑΤΕΙΑ ΚΑΝΙΓΓΟΣ".to_string())
        );
        assert_eq!(coerce::<String>(&json!(21)).unwrap(), Some("21".to_string()));
    }

    #[test]
    fn test_coerce_rejects_non_integral_numbers_and_structures() {
        let err = coerce::<i32>(&json!(2.5)).unwrap_err();
        assert_eq!(err.reason, Malformed::NotNumeric);

        let err = coerce::<i8>(&json!(300)).unwrap_err();
        assert_eq!(err.reason, Malformed::OutOfRange);

        let err = coerce::<String>(&json!({"nested": true})).unwrap_err();
        assert_eq!(err.reason, Malformed::NotScalar);

        let err = coerce::<i64>(&json!(true)).unwrap_err();
        assert_eq!(err.reason, Malformed::NotNumeric);
    }

    #[test]
    fn test_coerce_as_dispatches_on_kind() {
        assert_eq!(
            coerce_as(&json!("7"), FieldKind::Int8).unwrap(),
            Some(Scalar::Int8(7))
        );
        assert_eq!(
            coerce_as(&json!("7"), FieldKind::Text).unwrap(),
            Some(Scalar::Text("7".to_string()))
        );
        assert_eq!(coerce_as(&Value::Null, FieldKind::Float64).unwrap(), None);
        assert_eq!(
            coerce_as(&json!({"ml": 1}), FieldKind::Reference).unwrap(),
            None
        );
    }

    #[test]
    fn test_error_message_names_text_and_kind() {
        let err = i16::from_text("x1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot coerce `x1` to int16: not a decimal number"
        );
    }
}
