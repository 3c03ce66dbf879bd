//! Literal constant values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The payload of a [`Expr::Value`](crate::expr::Expr::Value) literal.
///
/// The literal's hardware type lives on the expression node, so re-stamping a
/// constant with another type never touches its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    /// An integer.
    Int(i64),
    /// A floating-point number.
    Real(f64),
    /// A bit string, most significant bit first (`"0110"`).
    Bits(String),
    /// A text string (print arguments).
    Str(String),
}

impl ConstValue {
    /// Returns `true` if the value is numerically zero.
    pub fn is_zero(&self) -> bool {
        match self {
            ConstValue::Int(v) => *v == 0,
            ConstValue::Real(v) => *v == 0.0,
            ConstValue::Bits(bits) => bits.chars().all(|c| c == '0'),
            ConstValue::Str(_) => false,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Real(v) => write!(f, "{v:?}"),
            ConstValue::Bits(bits) => write!(f, "b{bits}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}
