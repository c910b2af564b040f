//! Coercion Engine - raw string tokens into typed field values
//!
//! Every bindable leaf type implements [`Leaf`]:
//! - scalars (`bool`, integers, floats, `String`) take the first token
//! - `Vec<T>` is rebuilt from all tokens
//! - `[T; N]` requires exactly `N` tokens
//! - `Duration` requires exactly one token (any other count is a no-op)
//! - `Option<T>` allocates on first write
//! - `serde_json::Value` ignores tokens (document decode only)
//!
//! Fields marked `#[tags(document)]` skip [`Leaf`] entirely: any serde type
//! is filled through [`DocumentValue`] and tag-sourced tokens are ignored.
//!
//! [`apply_tokens`] applies the default policy before handing tokens over.

mod duration;

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use duration::parse_duration;

/// Destination shape of a leaf field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Bool,
    /// Signed integer of the given bit width
    Int(u8),
    /// Unsigned integer of the given bit width
    Uint(u8),
    /// Floating point of the given bit width
    Float(u8),
    Str,
    Duration,
    Array { len: usize, elem: Box<Shape> },
    List(Box<Shape>),
    Optional(Box<Shape>),
    /// Free-form document value (`serde_json::Value`)
    Document,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Bool => f.write_str("bool"),
            Shape::Int(bits) => write!(f, "i{bits}"),
            Shape::Uint(bits) => write!(f, "u{bits}"),
            Shape::Float(bits) => write!(f, "f{bits}"),
            Shape::Str => f.write_str("string"),
            Shape::Duration => f.write_str("duration"),
            Shape::Array { len, elem } => write!(f, "[{elem}; {len}]"),
            Shape::List(elem) => write!(f, "Vec<{elem}>"),
            Shape::Optional(inner) => write!(f, "Option<{inner}>"),
            Shape::Document => f.write_str("document"),
        }
    }
}

/// A raw value could not be converted into its destination shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot coerce {raw:?} into {shape}: {reason}")]
pub struct CoercionError {
    /// The offending raw value (token list for count mismatches)
    pub raw: String,
    pub shape: Shape,
    pub reason: String,
}

impl CoercionError {
    pub fn new(raw: impl Into<String>, shape: Shape, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            shape,
            reason: reason.into(),
        }
    }
}

/// A document value did not fit its destination
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError(err.to_string())
    }
}

/// How numbers inside free-form document values are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberMode {
    /// Every number becomes an `f64`
    #[default]
    Float,
    /// Integers stay exact
    Exact,
}

/// Default fallback for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPolicy {
    pub enabled: bool,
    /// Stored verbatim, split on `separator` only when used
    pub raw_value: String,
    pub separator: String,
}

impl DefaultPolicy {
    pub fn disabled(separator: impl Into<String>) -> Self {
        Self {
            enabled: false,
            raw_value: String::new(),
            separator: separator.into(),
        }
    }

    pub fn new(raw_value: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            enabled: true,
            raw_value: raw_value.into(),
            separator: separator.into(),
        }
    }

    /// The default value split into tokens.
    ///
    /// An empty separator splits into single characters.
    pub fn tokens(&self) -> Vec<String> {
        if self.separator.is_empty() {
            return self.raw_value.chars().map(String::from).collect();
        }
        self.raw_value
            .split(self.separator.as_str())
            .map(str::to_owned)
            .collect()
    }
}

/// A bindable field type
pub trait Leaf {
    /// Static shape, recorded in the compiled plan
    fn leaf_shape() -> Shape
    where
        Self: Sized;

    /// Coerce non-empty raw tokens into `self`
    fn set_tokens(&mut self, tokens: &[String]) -> Result<(), CoercionError>;

    /// Assign a value taken from a decoded document
    fn set_document(&mut self, value: &Value, numbers: NumberMode) -> Result<(), DecodeError>;

    /// Read-only view of the current value, used by validators
    fn snapshot(&self) -> Value;
}

/// A field filled only by document decode
pub trait DocumentValue {
    /// Replace the value with `value`; `null` leaves it untouched
    fn assign_document(&mut self, value: &Value) -> Result<(), DecodeError>;

    fn document_snapshot(&self) -> Value;
}

impl<T: DeserializeOwned + Serialize> DocumentValue for T {
    fn assign_document(&mut self, value: &Value) -> Result<(), DecodeError> {
        if value.is_null() {
            return Ok(());
        }
        *self = T::deserialize(value)?;
        Ok(())
    }

    fn document_snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Coerce `tokens` into `leaf`, falling back to the default policy.
///
/// - no tokens, no default: `leaf` is left untouched
/// - no tokens, default enabled: the default is split and used instead
pub fn apply_tokens(
    leaf: &mut dyn Leaf,
    tokens: Vec<String>,
    policy: &DefaultPolicy,
) -> Result<(), CoercionError> {
    let tokens = if tokens.is_empty() {
        if !policy.enabled {
            return Ok(());
        }
        policy.tokens()
    } else {
        tokens
    };
    leaf.set_tokens(&tokens)
}

/// A single-token value: the element type of lists and arrays
pub trait Scalar: Sized + Default {
    fn shape() -> Shape;

    /// Parse one raw token; the error is the human-readable reason
    fn parse_token(token: &str) -> Result<Self, String>;

    fn from_document(value: &Value) -> Result<Self, DecodeError>;

    fn to_document(&self) -> Value;
}

fn parse_scalar<T: Scalar>(token: &str) -> Result<T, CoercionError> {
    T::parse_token(token).map_err(|reason| CoercionError::new(token, T::shape(), reason))
}

macro_rules! int_scalar {
    ($($ty:ty => $shape:expr),* $(,)?) => {$(
        impl Scalar for $ty {
            fn shape() -> Shape {
                $shape
            }

            fn parse_token(token: &str) -> Result<Self, String> {
                let token = if token.is_empty() { "0" } else { token };
                if token.starts_with('+') && matches!($shape, Shape::Uint(_)) {
                    return Err("sign not allowed for unsigned integer".to_string());
                }
                token.parse::<$ty>().map_err(|err| err.to_string())
            }

            fn from_document(value: &Value) -> Result<Self, DecodeError> {
                Ok(<$ty as Deserialize>::deserialize(value)?)
            }

            fn to_document(&self) -> Value {
                Value::from(*self)
            }
        }
    )*};
}

int_scalar!(
    i8 => Shape::Int(8),
    i16 => Shape::Int(16),
    i32 => Shape::Int(32),
    i64 => Shape::Int(64),
    isize => Shape::Int(usize::BITS as u8),
    u8 => Shape::Uint(8),
    u16 => Shape::Uint(16),
    u32 => Shape::Uint(32),
    u64 => Shape::Uint(64),
    usize => Shape::Uint(usize::BITS as u8),
);

fn is_infinity_literal(token: &str) -> bool {
    let unsigned = token.trim_start_matches(['+', '-']);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

macro_rules! float_scalar {
    ($($ty:ty => $bits:expr),* $(,)?) => {$(
        impl Scalar for $ty {
            fn shape() -> Shape {
                Shape::Float($bits)
            }

            fn parse_token(token: &str) -> Result<Self, String> {
                let token = if token.is_empty() { "0.0" } else { token };
                let parsed = token.parse::<$ty>().map_err(|err| err.to_string())?;
                // Overflowing finite literals parse to infinity
                if parsed.is_infinite() && !is_infinity_literal(token) {
                    return Err("value out of range".to_string());
                }
                Ok(parsed)
            }

            fn from_document(value: &Value) -> Result<Self, DecodeError> {
                Ok(<$ty as Deserialize>::deserialize(value)?)
            }

            fn to_document(&self) -> Value {
                Value::from(*self)
            }
        }
    )*};
}

float_scalar!(f32 => 32, f64 => 64);

impl Scalar for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn parse_token(token: &str) -> Result<Self, String> {
        match token {
            "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            _ => Err("not a boolean literal".to_string()),
        }
    }

    fn from_document(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_bool()
            .ok_or_else(|| DecodeError(format!("expected a boolean, got {value}")))
    }

    fn to_document(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Scalar for String {
    fn shape() -> Shape {
        Shape::Str
    }

    fn parse_token(token: &str) -> Result<Self, String> {
        Ok(token.to_owned())
    }

    fn from_document(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| DecodeError(format!("expected a string, got {value}")))
    }

    fn to_document(&self) -> Value {
        Value::String(self.clone())
    }
}

macro_rules! scalar_leaf {
    ($($ty:ty),* $(,)?) => {$(
        impl Leaf for $ty {
            fn leaf_shape() -> Shape {
                <$ty as Scalar>::shape()
            }

            fn set_tokens(&mut self, tokens: &[String]) -> Result<(), CoercionError> {
                let token = tokens.first().map(String::as_str).unwrap_or_default();
                *self = parse_scalar::<$ty>(token)?;
                Ok(())
            }

            fn set_document(&mut self, value: &Value, _numbers: NumberMode) -> Result<(), DecodeError> {
                if value.is_null() {
                    return Ok(());
                }
                *self = <$ty as Scalar>::from_document(value)?;
                Ok(())
            }

            fn snapshot(&self) -> Value {
                self.to_document()
            }
        }
    )*};
}

scalar_leaf!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String);

impl Leaf for Duration {
    fn leaf_shape() -> Shape {
        Shape::Duration
    }

    fn set_tokens(&mut self, tokens: &[String]) -> Result<(), CoercionError> {
        let [token] = tokens else {
            return Ok(());
        };
        *self = parse_duration(token)
            .map_err(|reason| CoercionError::new(token.as_str(), Shape::Duration, reason))?;
        Ok(())
    }

    /// Documents carry durations as integer nanoseconds
    fn set_document(&mut self, value: &Value, _numbers: NumberMode) -> Result<(), DecodeError> {
        if value.is_null() {
            return Ok(());
        }
        let nanos = value
            .as_u64()
            .ok_or_else(|| DecodeError(format!("expected non-negative nanoseconds, got {value}")))?;
        *self = Duration::from_nanos(nanos);
        Ok(())
    }

    fn snapshot(&self) -> Value {
        Value::from(u64::try_from(self.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl<T: Scalar> Leaf for Vec<T> {
    fn leaf_shape() -> Shape {
        Shape::List(Box::new(T::shape()))
    }

    fn set_tokens(&mut self, tokens: &[String]) -> Result<(), CoercionError> {
        *self = tokens
            .iter()
            .map(|token| parse_scalar::<T>(token))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn set_document(&mut self, value: &Value, _numbers: NumberMode) -> Result<(), DecodeError> {
        match value {
            Value::Null => self.clear(),
            Value::Array(items) => {
                *self = items
                    .iter()
                    .map(T::from_document)
                    .collect::<Result<_, _>>()?;
            }
            other => return Err(DecodeError(format!("expected an array, got {other}"))),
        }
        Ok(())
    }

    fn snapshot(&self) -> Value {
        Value::Array(self.iter().map(Scalar::to_document).collect())
    }
}

impl<T: Scalar, const N: usize> Leaf for [T; N] {
    fn leaf_shape() -> Shape {
        Shape::Array {
            len: N,
            elem: Box::new(T::shape()),
        }
    }

    fn set_tokens(&mut self, tokens: &[String]) -> Result<(), CoercionError> {
        if tokens.len() != N {
            return Err(CoercionError::new(
                format!("{tokens:?}"),
                Self::leaf_shape(),
                format!("expected {N} values, got {}", tokens.len()),
            ));
        }
        let parsed = tokens
            .iter()
            .map(|token| parse_scalar::<T>(token))
            .collect::<Result<Vec<T>, _>>()?;
        for (slot, value) in self.iter_mut().zip(parsed) {
            *slot = value;
        }
        Ok(())
    }

    /// Missing trailing items are zeroed, extra items are ignored
    fn set_document(&mut self, value: &Value, _numbers: NumberMode) -> Result<(), DecodeError> {
        let items = match value {
            Value::Null => return Ok(()),
            Value::Array(items) => items,
            other => return Err(DecodeError(format!("expected an array, got {other}"))),
        };
        let mut parsed = items
            .iter()
            .take(N)
            .map(T::from_document)
            .collect::<Result<Vec<T>, _>>()?
            .into_iter();
        for slot in self.iter_mut() {
            *slot = parsed.next().unwrap_or_default();
        }
        Ok(())
    }

    fn snapshot(&self) -> Value {
        Value::Array(self.iter().map(Scalar::to_document).collect())
    }
}

impl<T: Leaf + Default> Leaf for Option<T> {
    fn leaf_shape() -> Shape {
        Shape::Optional(Box::new(T::leaf_shape()))
    }

    fn set_tokens(&mut self, tokens: &[String]) -> Result<(), CoercionError> {
        let fresh = self.is_none();
        let inner = self.get_or_insert_with(T::default);
        if let Err(err) = inner.set_tokens(tokens) {
            if fresh {
                *self = None;
            }
            return Err(err);
        }
        Ok(())
    }

    fn set_document(&mut self, value: &Value, numbers: NumberMode) -> Result<(), DecodeError> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        let fresh = self.is_none();
        let inner = self.get_or_insert_with(T::default);
        if let Err(err) = inner.set_document(value, numbers) {
            if fresh {
                *self = None;
            }
            return Err(err);
        }
        Ok(())
    }

    fn snapshot(&self) -> Value {
        self.as_ref().map_or(Value::Null, Leaf::snapshot)
    }
}

impl Leaf for Value {
    fn leaf_shape() -> Shape {
        Shape::Document
    }

    /// Unsupported for tokens: succeeds without assigning
    fn set_tokens(&mut self, _tokens: &[String]) -> Result<(), CoercionError> {
        Ok(())
    }

    fn set_document(&mut self, value: &Value, numbers: NumberMode) -> Result<(), DecodeError> {
        let mut value = value.clone();
        if numbers == NumberMode::Float {
            floatify_numbers(&mut value);
        }
        *self = value;
        Ok(())
    }

    fn snapshot(&self) -> Value {
        self.clone()
    }
}

/// Replace every number in `value` with its `f64` approximation
pub fn floatify_numbers(value: &mut Value) {
    match value {
        Value::Number(number) => {
            if let Some(float) = number.as_f64().and_then(serde_json::Number::from_f64) {
                *number = float;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(floatify_numbers),
        Value::Object(map) => map.values_mut().for_each(floatify_numbers),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn toks(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn coerce<T: Leaf + Default>(values: &[&str]) -> Result<T, CoercionError> {
        let mut value = T::default();
        apply_tokens(&mut value, toks(values), &DefaultPolicy::disabled("|"))?;
        Ok(value)
    }

    // ═══════════════════════════════════════════════════════════════
    // Scalars
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn bool_literals() {
        for literal in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(coerce::<bool>(&[literal]).unwrap(), "{literal}");
        }
        for literal in ["0", "f", "F", "FALSE", "false", "False", ""] {
            assert!(!coerce::<bool>(&[literal]).unwrap(), "{literal}");
        }
        assert!(coerce::<bool>(&["yes"]).is_err());
    }

    #[test]
    fn ints_respect_width() {
        assert_eq!(coerce::<i8>(&["-128"]).unwrap(), -128);
        assert!(coerce::<i8>(&["128"]).is_err());
        assert_eq!(coerce::<i64>(&["+42"]).unwrap(), 42);
        assert_eq!(coerce::<u16>(&["65535"]).unwrap(), 65535);
        assert!(coerce::<u16>(&["65536"]).is_err());
    }

    #[test]
    fn unsigned_rejects_negative() {
        let err = coerce::<u32>(&["-1"]).unwrap_err();
        assert_eq!(err.raw, "-1");
        assert_eq!(err.shape, Shape::Uint(32));
    }

    #[test]
    fn unsigned_rejects_plus_sign() {
        let err = coerce::<u64>(&["+5"]).unwrap_err();
        assert_eq!(err.raw, "+5");
        assert_eq!(err.shape, Shape::Uint(64));
        assert!(coerce::<u8>(&["+0"]).is_err());
        assert_eq!(coerce::<i32>(&["+5"]).unwrap(), 5);
    }

    #[test]
    fn empty_token_is_zero() {
        assert_eq!(coerce::<i32>(&[""]).unwrap(), 0);
        assert_eq!(coerce::<u8>(&[""]).unwrap(), 0);
        assert_eq!(coerce::<f64>(&[""]).unwrap(), 0.0);
    }

    #[test]
    fn floats() {
        assert_eq!(coerce::<f64>(&["1.5e3"]).unwrap(), 1500.0);
        assert_eq!(coerce::<f32>(&["0.25"]).unwrap(), 0.25);
        assert!(coerce::<f32>(&["1e40"]).is_err());
        assert!(coerce::<f64>(&["inf"]).unwrap().is_infinite());
        assert!(coerce::<f64>(&["1.2.3"]).is_err());
    }

    #[test]
    fn string_is_verbatim_and_takes_first_token() {
        assert_eq!(coerce::<String>(&[" a b "]).unwrap(), " a b ");
        assert_eq!(coerce::<String>(&["first", "second"]).unwrap(), "first");
    }

    // ═══════════════════════════════════════════════════════════════
    // Defaults
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn no_tokens_no_default_leaves_value_untouched() {
        let mut value = 7_i32;
        apply_tokens(&mut value, vec![], &DefaultPolicy::disabled("|")).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn default_is_split_on_separator() {
        let mut value: Vec<i64> = Vec::new();
        apply_tokens(&mut value, vec![], &DefaultPolicy::new("1|2|3", "|")).unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[test]
    fn default_ignored_when_tokens_present() {
        let mut value = 0_u32;
        apply_tokens(&mut value, toks(&["5"]), &DefaultPolicy::new("9", "|")).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn empty_separator_splits_chars() {
        assert_eq!(DefaultPolicy::new("abc", "").tokens(), toks(&["a", "b", "c"]));
    }

    // ═══════════════════════════════════════════════════════════════
    // Sequences
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn array_requires_exact_count() {
        assert!(coerce::<[i32; 3]>(&["1", "2"]).is_err());
        assert!(coerce::<[i32; 3]>(&["1", "2", "3", "4"]).is_err());
        assert_eq!(coerce::<[i32; 3]>(&["1", "2", "3"]).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn array_failure_keeps_previous_values() {
        let mut value = [9_u8, 9, 9];
        let err = value.set_tokens(&toks(&["1", "x", "3"])).unwrap_err();
        assert_eq!(err.raw, "x");
        assert_eq!(value, [9, 9, 9]);
    }

    #[test]
    fn list_is_rebuilt_to_token_count() {
        let mut value = vec![1_i32, 2, 3, 4];
        value.set_tokens(&toks(&["7", "8"])).unwrap();
        assert_eq!(value, vec![7, 8]);
        assert!(value.set_tokens(&toks(&["7", "nope"])).is_err());
        assert_eq!(value, vec![7, 8]);
    }

    // ═══════════════════════════════════════════════════════════════
    // Duration
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn duration_single_token() {
        assert_eq!(coerce::<Duration>(&["1m10s"]).unwrap(), Duration::from_secs(70));
        assert!(coerce::<Duration>(&["10 parsecs"]).is_err());
    }

    #[test]
    fn duration_other_counts_are_noop() {
        let mut value = Duration::from_secs(3);
        value.set_tokens(&toks(&["1s", "2s"])).unwrap();
        assert_eq!(value, Duration::from_secs(3));
    }

    // ═══════════════════════════════════════════════════════════════
    // Option / Value
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn option_allocates_on_write() {
        assert_eq!(coerce::<Option<String>>(&["abc"]).unwrap(), Some("abc".to_string()));

        let mut value: Option<i32> = None;
        apply_tokens(&mut value, vec![], &DefaultPolicy::disabled("|")).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn option_reverts_on_failure() {
        let mut value: Option<u8> = None;
        assert!(value.set_tokens(&toks(&["300"])).is_err());
        assert_eq!(value, None);
    }

    #[test]
    fn document_value_ignores_tokens() {
        let mut value = json!({"keep": true});
        value.set_tokens(&toks(&["x"])).unwrap();
        assert_eq!(value, json!({"keep": true}));
    }

    #[test]
    fn document_numbers() {
        let source = json!({"id": 280123412341234123_u64});

        let mut exact = Value::Null;
        exact.set_document(&source, NumberMode::Exact).unwrap();
        assert_eq!(exact["id"].as_u64(), Some(280123412341234123));

        let mut float = Value::Null;
        float.set_document(&source, NumberMode::Float).unwrap();
        assert!(float["id"].is_f64());
    }

    #[test]
    fn document_into_scalars() {
        let mut count = 0_i32;
        count.set_document(&json!(12), NumberMode::Float).unwrap();
        assert_eq!(count, 12);
        assert!(count.set_document(&json!("12"), NumberMode::Float).is_err());

        let mut pair = [0_u8; 2];
        pair.set_document(&json!([5]), NumberMode::Float).unwrap();
        assert_eq!(pair, [5, 0]);
    }

    #[test]
    fn serde_types_fill_from_document() {
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
        struct Item {
            id: u32,
            tags: Vec<String>,
        }

        let mut items: Vec<Item> = Vec::new();
        items.assign_document(&json!([{"id": 1, "tags": ["a"]}])).unwrap();
        assert_eq!(items, vec![Item { id: 1, tags: vec!["a".into()] }]);

        items.assign_document(&Value::Null).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items.assign_document(&json!({"id": 1})).is_err());
        assert_eq!(items.document_snapshot(), json!([{"id": 1, "tags": ["a"]}]));
    }

    #[test]
    fn shape_display() {
        assert_eq!(<[i32; 3]>::leaf_shape().to_string(), "[i32; 3]");
        assert_eq!(<Option<Vec<u8>>>::leaf_shape().to_string(), "Option<Vec<u8>>");
    }
}
