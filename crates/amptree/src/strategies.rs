//! Generic reducers shipped with the evaluator.
//!
//! Each reducer is constructed with the result kind it should produce, the
//! same way a model builder picks `AddAll` over batched complex amplitudes or
//! over scalar doubles. Inputs are promoted (integer → double → complex) and
//! scalars broadcast against batched inputs. Sibling batches must have equal
//! length.
//!
//! | Strategy | Inputs | Result kinds |
//! |----------|--------|--------------|
//! | [`AddAll`] | any number | integer, double, complex, multi double, multi complex |
//! | [`MultiplyAll`] | any number | integer, double, complex, multi double, multi complex |
//! | [`AbsSquare`] | 1 | double, multi double |
//! | [`LogOf`] | 1 | double, complex, multi double, multi complex |
//! | [`Inverse`] | 1 | double, complex, multi double, multi complex |
//! | [`SquareRoot`] | 1 | double, complex, multi double, multi complex |
//! | [`ComplexFromPolar`] | 2 (magnitude, phase) | complex, multi complex |
//! | [`ComplexProduct`] | 2 (prefactor, body) | complex, multi complex |
//!
//! A scalar-result `AddAll`/`MultiplyAll` collapses each batched input over
//! its events first, and a double-result `LogOf` over a batch returns the
//! sum of logs. That is how a normalization integral or a log-likelihood is
//! reduced to one number.

use num_complex::Complex64;

use crate::error::EvalError;
use crate::reductions;
use crate::strategy::{
    ComplexLane, RealLane, Strategy, check_arity, common_batch_len, complex_lane, real_lane,
    require_batch_len, type_mismatch,
};
use crate::value::{Value, ValueKind};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

fn unsupported(strategy: &str, kind: ValueKind) -> EvalError {
    EvalError::UnsupportedResult {
        strategy: strategy.to_string(),
        kind,
    }
}

/// Associative combination shared by [`AddAll`] and [`MultiplyAll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fold {
    Sum,
    Product,
}

impl Fold {
    fn int(self, a: i64, b: i64) -> i64 {
        match self {
            Fold::Sum => a.wrapping_add(b),
            Fold::Product => a.wrapping_mul(b),
        }
    }

    fn real(self, a: f64, b: f64) -> f64 {
        match self {
            Fold::Sum => a + b,
            Fold::Product => a * b,
        }
    }

    fn complex(self, a: Complex64, b: Complex64) -> Complex64 {
        match self {
            Fold::Sum => a + b,
            Fold::Product => a * b,
        }
    }

    fn int_identity(self) -> i64 {
        match self {
            Fold::Sum => 0,
            Fold::Product => 1,
        }
    }

    fn identity(self) -> Complex64 {
        match self {
            Fold::Sum => ZERO,
            Fold::Product => ONE,
        }
    }

    fn collapse_real(self, xs: &[f64]) -> f64 {
        match self {
            Fold::Sum => reductions::sum(xs, 0.0),
            Fold::Product => reductions::product(xs, 1.0),
        }
    }

    fn collapse_complex(self, cs: &[Complex64]) -> Complex64 {
        match self {
            Fold::Sum => reductions::sum(cs, ZERO),
            Fold::Product => reductions::product(cs, ONE),
        }
    }

    fn apply(self, strategy: &str, kind: ValueKind, inputs: &[&Value]) -> Result<Value, EvalError> {
        match kind {
            ValueKind::Integer => {
                let mut acc = self.int_identity();
                for (i, v) in inputs.iter().enumerate() {
                    match v {
                        Value::Integer(x) => acc = self.int(acc, *x),
                        other => return Err(type_mismatch(strategy, i, "integer", other)),
                    }
                }
                common_batch_len(strategy, inputs)?;
                Ok(Value::Integer(acc))
            }
            ValueKind::Double => {
                let mut acc = self.identity().re;
                for (i, v) in inputs.iter().enumerate() {
                    let x = match v {
                        Value::MultiDouble(xs) => self.collapse_real(xs),
                        other => other.to_real().ok_or_else(|| {
                            type_mismatch(strategy, i, "integer, double or multi double", other)
                        })?,
                    };
                    acc = self.real(acc, x);
                }
                common_batch_len(strategy, inputs)?;
                Ok(Value::Double(acc))
            }
            ValueKind::Complex => {
                let mut acc = self.identity();
                for (i, v) in inputs.iter().enumerate() {
                    let c = match v {
                        Value::MultiDouble(xs) => Complex64::new(self.collapse_real(xs), 0.0),
                        Value::MultiComplex(cs) => self.collapse_complex(cs),
                        other => other
                            .to_complex()
                            .ok_or_else(|| type_mismatch(strategy, i, "a numeric value", other))?,
                    };
                    acc = self.complex(acc, c);
                }
                common_batch_len(strategy, inputs)?;
                Ok(Value::Complex(acc))
            }
            ValueKind::MultiDouble => {
                let lanes = inputs
                    .iter()
                    .enumerate()
                    .map(|(i, v)| real_lane(strategy, i, v))
                    .collect::<Result<Vec<_>, _>>()?;
                let n = require_batch_len(strategy, inputs)?;
                let mut out = vec![self.identity().re; n];
                for lane in lanes {
                    match lane {
                        RealLane::Scalar(x) => out.iter_mut().for_each(|o| *o = self.real(*o, x)),
                        RealLane::Batch(xs) => out
                            .iter_mut()
                            .zip(xs)
                            .for_each(|(o, x)| *o = self.real(*o, *x)),
                    }
                }
                Ok(Value::MultiDouble(out))
            }
            ValueKind::MultiComplex => {
                let lanes = inputs
                    .iter()
                    .enumerate()
                    .map(|(i, v)| complex_lane(strategy, i, v))
                    .collect::<Result<Vec<_>, _>>()?;
                let n = require_batch_len(strategy, inputs)?;
                let mut out = vec![self.identity(); n];
                for lane in lanes {
                    match lane {
                        ComplexLane::Scalar(c) => {
                            out.iter_mut().for_each(|o| *o = self.complex(*o, c))
                        }
                        ComplexLane::Real(xs) => out
                            .iter_mut()
                            .zip(xs)
                            .for_each(|(o, x)| *o = self.complex(*o, Complex64::new(*x, 0.0))),
                        ComplexLane::Batch(cs) => out
                            .iter_mut()
                            .zip(cs)
                            .for_each(|(o, c)| *o = self.complex(*o, *c)),
                    }
                }
                Ok(Value::MultiComplex(out))
            }
            ValueKind::Bool => Err(unsupported(strategy, kind)),
        }
    }
}

/// Sum of all inputs.
#[derive(Debug, Clone)]
pub struct AddAll {
    kind: ValueKind,
}

impl AddAll {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind }
    }
}

impl Strategy for AddAll {
    fn name(&self) -> &str {
        "AddAll"
    }

    fn result_kind(&self) -> ValueKind {
        self.kind
    }

    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError> {
        Fold::Sum.apply(self.name(), self.kind, inputs)
    }
}

/// Product of all inputs.
#[derive(Debug, Clone)]
pub struct MultiplyAll {
    kind: ValueKind,
}

impl MultiplyAll {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind }
    }
}

impl Strategy for MultiplyAll {
    fn name(&self) -> &str {
        "MultiplyAll"
    }

    fn result_kind(&self) -> ValueKind {
        self.kind
    }

    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError> {
        Fold::Product.apply(self.name(), self.kind, inputs)
    }
}

/// Squared modulus, always real.
#[derive(Debug, Clone)]
pub struct AbsSquare {
    kind: ValueKind,
}

impl AbsSquare {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind }
    }
}

impl Strategy for AbsSquare {
    fn name(&self) -> &str {
        "AbsSquare"
    }

    fn result_kind(&self) -> ValueKind {
        self.kind
    }

    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError> {
        check_arity(self.name(), inputs, 1)?;
        let input = inputs[0];
        match self.kind {
            ValueKind::Double => match input {
                Value::Complex(c) => Ok(Value::Double(c.norm_sqr())),
                other => other
                    .to_real()
                    .map(|x| Value::Double(x * x))
                    .ok_or_else(|| type_mismatch(self.name(), 0, "a numeric scalar", other)),
            },
            ValueKind::MultiDouble => match input {
                Value::MultiDouble(xs) => Ok(Value::MultiDouble(xs.iter().map(|x| x * x).collect())),
                Value::MultiComplex(cs) => {
                    Ok(Value::MultiDouble(cs.iter().map(|c| c.norm_sqr()).collect()))
                }
                other => Err(type_mismatch(self.name(), 0, "multi double or multi complex", other)),
            },
            kind => Err(unsupported(self.name(), kind)),
        }
    }
}

/// Natural logarithm.
///
/// With a double result and a batched input, returns the sum of the logs.
#[derive(Debug, Clone)]
pub struct LogOf {
    kind: ValueKind,
}

impl LogOf {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind }
    }
}

impl Strategy for LogOf {
    fn name(&self) -> &str {
        "LogOf"
    }

    fn result_kind(&self) -> ValueKind {
        self.kind
    }

    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError> {
        check_arity(self.name(), inputs, 1)?;
        let input = inputs[0];
        match self.kind {
            ValueKind::Double => match input {
                Value::MultiDouble(xs) => {
                    let logs: Vec<f64> = xs.iter().map(|x| x.ln()).collect();
                    Ok(Value::Double(reductions::sum(&logs, 0.0)))
                }
                other => other.to_real().map(|x| Value::Double(x.ln())).ok_or_else(|| {
                    type_mismatch(self.name(), 0, "integer, double or multi double", other)
                }),
            },
            ValueKind::Complex => input
                .to_complex()
                .map(|c| Value::Complex(c.ln()))
                .ok_or_else(|| type_mismatch(self.name(), 0, "a numeric scalar", input)),
            ValueKind::MultiDouble => match input {
                Value::MultiDouble(xs) => Ok(Value::MultiDouble(xs.iter().map(|x| x.ln()).collect())),
                other => Err(type_mismatch(self.name(), 0, "multi double", other)),
            },
            ValueKind::MultiComplex => map_complex_batch(self.name(), input, |c| c.ln()),
            kind => Err(unsupported(self.name(), kind)),
        }
    }
}

/// Reciprocal. Division by zero yields infinity, not an error.
#[derive(Debug, Clone)]
pub struct Inverse {
    kind: ValueKind,
}

impl Inverse {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind }
    }
}

impl Strategy for Inverse {
    fn name(&self) -> &str {
        "Inverse"
    }

    fn result_kind(&self) -> ValueKind {
        self.kind
    }

    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError> {
        check_arity(self.name(), inputs, 1)?;
        let input = inputs[0];
        match self.kind {
            ValueKind::Double => input
                .to_real()
                .map(|x| Value::Double(x.recip()))
                .ok_or_else(|| type_mismatch(self.name(), 0, "integer or double", input)),
            ValueKind::Complex => input
                .to_complex()
                .map(|c| Value::Complex(ONE / c))
                .ok_or_else(|| type_mismatch(self.name(), 0, "a numeric scalar", input)),
            ValueKind::MultiDouble => match input {
                Value::MultiDouble(xs) => {
                    Ok(Value::MultiDouble(xs.iter().map(|x| x.recip()).collect()))
                }
                other => Err(type_mismatch(self.name(), 0, "multi double", other)),
            },
            ValueKind::MultiComplex => map_complex_batch(self.name(), input, |c| ONE / c),
            kind => Err(unsupported(self.name(), kind)),
        }
    }
}

/// Square root. Negative doubles yield NaN, complex kinds the principal root.
#[derive(Debug, Clone)]
pub struct SquareRoot {
    kind: ValueKind,
}

impl SquareRoot {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind }
    }
}

impl Strategy for SquareRoot {
    fn name(&self) -> &str {
        "SquareRoot"
    }

    fn result_kind(&self) -> ValueKind {
        self.kind
    }

    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError> {
        check_arity(self.name(), inputs, 1)?;
        let input = inputs[0];
        match self.kind {
            ValueKind::Double => input
                .to_real()
                .map(|x| Value::Double(x.sqrt()))
                .ok_or_else(|| type_mismatch(self.name(), 0, "integer or double", input)),
            ValueKind::Complex => input
                .to_complex()
                .map(|c| Value::Complex(c.sqrt()))
                .ok_or_else(|| type_mismatch(self.name(), 0, "a numeric scalar", input)),
            ValueKind::MultiDouble => match input {
                Value::MultiDouble(xs) => Ok(Value::MultiDouble(xs.iter().map(|x| x.sqrt()).collect())),
                other => Err(type_mismatch(self.name(), 0, "multi double", other)),
            },
            ValueKind::MultiComplex => map_complex_batch(self.name(), input, |c| c.sqrt()),
            kind => Err(unsupported(self.name(), kind)),
        }
    }
}

fn map_complex_batch(
    strategy: &str,
    input: &Value,
    f: impl Fn(Complex64) -> Complex64,
) -> Result<Value, EvalError> {
    match input {
        Value::MultiComplex(cs) => Ok(Value::MultiComplex(cs.iter().map(|c| f(*c)).collect())),
        Value::MultiDouble(xs) => Ok(Value::MultiComplex(
            xs.iter().map(|x| f(Complex64::new(*x, 0.0))).collect(),
        )),
        other => Err(type_mismatch(strategy, 0, "multi double or multi complex", other)),
    }
}

/// `magnitude * exp(i * phase)` from two real inputs.
///
/// Used for fit coefficients parametrized as magnitude and phase. To scale an
/// amplitude by such a coefficient, use [`ComplexProduct`].
#[derive(Debug, Clone)]
pub struct ComplexFromPolar {
    kind: ValueKind,
}

impl ComplexFromPolar {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind }
    }
}

impl Strategy for ComplexFromPolar {
    fn name(&self) -> &str {
        "ComplexFromPolar"
    }

    fn result_kind(&self) -> ValueKind {
        self.kind
    }

    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError> {
        check_arity(self.name(), inputs, 2)?;
        match self.kind {
            ValueKind::Complex => {
                let magnitude = inputs[0]
                    .to_real()
                    .ok_or_else(|| type_mismatch(self.name(), 0, "integer or double", inputs[0]))?;
                let phase = inputs[1]
                    .to_real()
                    .ok_or_else(|| type_mismatch(self.name(), 1, "integer or double", inputs[1]))?;
                Ok(Value::Complex(Complex64::from_polar(magnitude, phase)))
            }
            ValueKind::MultiComplex => {
                let magnitude = real_lane(self.name(), 0, inputs[0])?;
                let phase = real_lane(self.name(), 1, inputs[1])?;
                let n = require_batch_len(self.name(), inputs)?;
                Ok(Value::MultiComplex(
                    (0..n)
                        .map(|i| Complex64::from_polar(magnitude.at(i), phase.at(i)))
                        .collect(),
                ))
            }
            kind => Err(unsupported(self.name(), kind)),
        }
    }
}

/// Product of a complex prefactor and a complex body.
#[derive(Debug, Clone)]
pub struct ComplexProduct {
    kind: ValueKind,
}

impl ComplexProduct {
    pub fn new(kind: ValueKind) -> Self {
        Self { kind }
    }
}

impl Strategy for ComplexProduct {
    fn name(&self) -> &str {
        "ComplexProduct"
    }

    fn result_kind(&self) -> ValueKind {
        self.kind
    }

    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError> {
        check_arity(self.name(), inputs, 2)?;
        match self.kind {
            ValueKind::Complex => {
                let prefactor = inputs[0]
                    .to_complex()
                    .ok_or_else(|| type_mismatch(self.name(), 0, "a numeric scalar", inputs[0]))?;
                let body = inputs[1]
                    .to_complex()
                    .ok_or_else(|| type_mismatch(self.name(), 1, "a numeric scalar", inputs[1]))?;
                Ok(Value::Complex(prefactor * body))
            }
            ValueKind::MultiComplex => {
                let prefactor = complex_lane(self.name(), 0, inputs[0])?;
                let body = complex_lane(self.name(), 1, inputs[1])?;
                let n = require_batch_len(self.name(), inputs)?;
                Ok(Value::MultiComplex(
                    (0..n).map(|i| prefactor.at(i) * body.at(i)).collect(),
                ))
            }
            kind => Err(unsupported(self.name(), kind)),
        }
    }
}
