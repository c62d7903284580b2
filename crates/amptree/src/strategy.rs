//! The operator contract executed by tree nodes.
//!
//! A [`Strategy`] maps the ordered values of a node's children to one output
//! value of a fixed [`ValueKind`]. Strategies are pure: the same inputs always
//! produce the same output, and no state survives between calls. That is what
//! lets the tree cache results and skip clean subgraphs.
//!
//! Physics strategies (lineshapes, angular functions, form factors) implement
//! the same trait outside this crate. The helpers below cover the input
//! checking every implementation needs: arity, sibling batch lengths, and
//! broadcasting scalars against batched inputs.

use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;

use crate::error::EvalError;
use crate::value::{Value, ValueKind};

/// A pure operation over a node's child values.
pub trait Strategy: Send + Sync {
    /// Name used in diagnostics and tree dumps.
    fn name(&self) -> &str;

    /// Kind of every value [`execute`](Self::execute) returns.
    fn result_kind(&self) -> ValueKind;

    /// Compute the output from the children's values in declared order.
    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError>;
}

/// Shared handle to a strategy. One instance is typically reused by many nodes.
pub type StrategyRef = Arc<dyn Strategy>;

impl fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.name(), self.result_kind())
    }
}

/// Fail unless exactly `expected` inputs are present.
pub fn check_arity(strategy: &str, inputs: &[&Value], expected: usize) -> Result<(), EvalError> {
    if inputs.len() == expected {
        Ok(())
    } else {
        Err(EvalError::Arity {
            strategy: strategy.to_string(),
            expected,
            found: inputs.len(),
        })
    }
}

/// Common length of all batched inputs, `None` if every input is a scalar.
pub fn common_batch_len(strategy: &str, inputs: &[&Value]) -> Result<Option<usize>, EvalError> {
    let mut common: Option<usize> = None;
    for (index, value) in inputs.iter().enumerate() {
        let Some(len) = value.batch_len() else {
            continue;
        };
        match common {
            None => common = Some(len),
            Some(expected) if expected != len => {
                return Err(EvalError::ShapeMismatch {
                    strategy: strategy.to_string(),
                    index,
                    expected,
                    found: len,
                });
            }
            Some(_) => {}
        }
    }
    Ok(common)
}

/// Like [`common_batch_len`], but a batched result needs a batch to size it.
///
/// Scalar-only inputs are a `TypeMismatch` on the first input. Only an empty
/// input list is `MissingBatch`.
pub fn require_batch_len(strategy: &str, inputs: &[&Value]) -> Result<usize, EvalError> {
    if let Some(n) = common_batch_len(strategy, inputs)? {
        return Ok(n);
    }
    match inputs.first() {
        Some(first) => Err(type_mismatch(strategy, 0, "at least one batched input", first)),
        None => Err(EvalError::MissingBatch {
            strategy: strategy.to_string(),
        }),
    }
}

/// Build a [`EvalError::TypeMismatch`] for input `index`.
pub fn type_mismatch(strategy: &str, index: usize, expected: &str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        strategy: strategy.to_string(),
        index,
        expected: expected.to_string(),
        found: found.kind(),
    }
}

/// A real-valued input, either broadcast or one entry per event.
#[derive(Debug, Clone, Copy)]
pub enum RealLane<'a> {
    Scalar(f64),
    Batch(&'a [f64]),
}

impl RealLane<'_> {
    /// Entry for event `i`.
    #[inline]
    pub fn at(&self, i: usize) -> f64 {
        match self {
            RealLane::Scalar(x) => *x,
            RealLane::Batch(xs) => xs[i],
        }
    }
}

/// View `value` as a real lane. Integers are promoted.
pub fn real_lane<'a>(strategy: &str, index: usize, value: &'a Value) -> Result<RealLane<'a>, EvalError> {
    match value {
        Value::MultiDouble(xs) => Ok(RealLane::Batch(xs)),
        other => other
            .to_real()
            .map(RealLane::Scalar)
            .ok_or_else(|| type_mismatch(strategy, index, "integer, double or multi double", other)),
    }
}

/// A complex-valued input, either broadcast or one entry per event.
#[derive(Debug, Clone, Copy)]
pub enum ComplexLane<'a> {
    Scalar(Complex64),
    Real(&'a [f64]),
    Batch(&'a [Complex64]),
}

impl ComplexLane<'_> {
    /// Entry for event `i`.
    #[inline]
    pub fn at(&self, i: usize) -> Complex64 {
        match self {
            ComplexLane::Scalar(c) => *c,
            ComplexLane::Real(xs) => Complex64::new(xs[i], 0.0),
            ComplexLane::Batch(cs) => cs[i],
        }
    }
}

/// View `value` as a complex lane. Integers and doubles are promoted.
pub fn complex_lane<'a>(
    strategy: &str,
    index: usize,
    value: &'a Value,
) -> Result<ComplexLane<'a>, EvalError> {
    match value {
        Value::MultiDouble(xs) => Ok(ComplexLane::Real(xs)),
        Value::MultiComplex(cs) => Ok(ComplexLane::Batch(cs)),
        other => other.to_complex().map(ComplexLane::Scalar).ok_or_else(|| {
            type_mismatch(strategy, index, "a numeric scalar or batch", other)
        }),
    }
}
