//! Typed values flowing through the tree.
//!
//! A [`Value`] is a closed sum over the six kinds the evaluator understands:
//! three scalars (`Bool`, `Integer`, `Double`), complex numbers, and the two
//! batched kinds holding one entry per event of a data or phase-space sample.
//! Strategies match on the variant directly; there are no downcasts.

use std::fmt;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Number of batch entries shown by [`Value`]'s `Display` before eliding.
const DISPLAY_PREVIEW: usize = 4;

/// Tag identifying the payload of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Integer,
    Double,
    Complex,
    /// One double per event.
    MultiDouble,
    /// One complex number per event.
    MultiComplex,
}

impl ValueKind {
    /// All kinds in declaration order.
    pub const ALL: [ValueKind; 6] = [
        ValueKind::Bool,
        ValueKind::Integer,
        ValueKind::Double,
        ValueKind::Complex,
        ValueKind::MultiDouble,
        ValueKind::MultiComplex,
    ];

    /// Whether values of this kind hold one entry per event.
    pub fn is_batched(self) -> bool {
        matches!(self, ValueKind::MultiDouble | ValueKind::MultiComplex)
    }

    /// The zero (or empty) value of this kind.
    ///
    /// Used as the cached value of a node that has never been computed.
    pub fn default_value(self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Integer => Value::Integer(0),
            ValueKind::Double => Value::Double(0.0),
            ValueKind::Complex => Value::Complex(Complex64::new(0.0, 0.0)),
            ValueKind::MultiDouble => Value::MultiDouble(Vec::new()),
            ValueKind::MultiComplex => Value::MultiComplex(Vec::new()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Double => "double",
            ValueKind::Complex => "complex",
            ValueKind::MultiDouble => "multi double",
            ValueKind::MultiComplex => "multi complex",
        };
        f.write_str(name)
    }
}

/// A value held by a leaf or cached by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Double(f64),
    Complex(Complex64),
    MultiDouble(Vec<f64>),
    MultiComplex(Vec<Complex64>),
}

impl Value {
    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::Double(_) => ValueKind::Double,
            Value::Complex(_) => ValueKind::Complex,
            Value::MultiDouble(_) => ValueKind::MultiDouble,
            Value::MultiComplex(_) => ValueKind::MultiComplex,
        }
    }

    /// Number of events for batched values, `None` for scalars.
    pub fn batch_len(&self) -> Option<usize> {
        match self {
            Value::MultiDouble(v) => Some(v.len()),
            Value::MultiComplex(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Whether every numeric entry is finite. Booleans and integers always are.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Bool(_) | Value::Integer(_) => true,
            Value::Double(v) => v.is_finite(),
            Value::Complex(c) => c.is_finite(),
            Value::MultiDouble(v) => v.iter().all(|x| x.is_finite()),
            Value::MultiComplex(v) => v.iter().all(|c| c.is_finite()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The value as a double, if it is exactly a `Double`.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<Complex64> {
        match self {
            Value::Complex(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_multi_double(&self) -> Option<&[f64]> {
        match self {
            Value::MultiDouble(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_multi_complex(&self) -> Option<&[Complex64]> {
        match self {
            Value::MultiComplex(v) => Some(v),
            _ => None,
        }
    }

    /// Scalar promoted to a real number (`Integer` and `Double`).
    pub fn to_real(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Scalar promoted to a complex number (`Integer`, `Double` and `Complex`).
    pub fn to_complex(&self) -> Option<Complex64> {
        match self {
            Value::Complex(c) => Some(*c),
            other => other.to_real().map(|re| Complex64::new(re, 0.0)),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Double(0.0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Complex(c) => write!(f, "({}, {})", c.re, c.im),
            Value::MultiDouble(v) => write_batch(f, v, |f, x| write!(f, "{x}")),
            Value::MultiComplex(v) => write_batch(f, v, |f, c| write!(f, "({}, {})", c.re, c.im)),
        }
    }
}

fn write_batch<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    item: impl Fn(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    f.write_str("[")?;
    for (i, x) in items.iter().take(DISPLAY_PREVIEW).enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item(f, x)?;
    }
    if items.len() > DISPLAY_PREVIEW {
        write!(f, ", ... ({} events)", items.len())?;
    }
    f.write_str("]")
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Complex64> for Value {
    fn from(v: Complex64) -> Self {
        Value::Complex(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::MultiDouble(v)
    }
}

impl From<Vec<Complex64>> for Value {
    fn from(v: Vec<Complex64>) -> Self {
        Value::MultiComplex(v)
    }
}
