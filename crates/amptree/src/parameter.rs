//! Mutable leaf values with dependent invalidation.
//!
//! A [`Parameter`] is a named [`Value`] that the outside world changes
//! between recalculations: fit parameters set by an optimizer, or the batched
//! kinematic variables of a freshly loaded sample. Every successful
//! [`set_value`](Parameter::set_value) bumps a revision counter and pushes a
//! dirty mark to each [`TreeNode`] that consumes the parameter.
//!
//! Parameters do not own their subscribers. The subscriber list holds
//! [`Weak`] references, so dropping a tree releases its nodes even while the
//! optimizer still holds the parameter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::MutationError;
use crate::node::TreeNode;
use crate::value::{Value, ValueKind};

/// Closed interval a parameter value may be restricted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Value,
    pub max: Value,
}

impl Bounds {
    /// Whether `min < max` and `value` lies inside.
    ///
    /// Complex bounds are checked on the real and imaginary parts
    /// independently. Bounds of a different kind than `value` never enclose it.
    pub fn encloses(&self, value: &Value) -> bool {
        match (value, &self.min, &self.max) {
            (Value::Integer(v), Value::Integer(min), Value::Integer(max)) => {
                max > min && min <= v && v <= max
            }
            (Value::Double(v), Value::Double(min), Value::Double(max)) => {
                max > min && min <= v && v <= max
            }
            (Value::Complex(v), Value::Complex(min), Value::Complex(max)) => {
                max.re > min.re
                    && min.re <= v.re
                    && v.re <= max.re
                    && max.im > min.im
                    && min.im <= v.im
                    && v.im <= max.im
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
struct ParameterState {
    value: Arc<Value>,
    fixed: bool,
    bounds: Option<Bounds>,
    use_bounds: bool,
    error: Option<Value>,
}

/// A named, externally mutable value.
pub struct Parameter {
    name: String,
    kind: ValueKind,
    state: RwLock<ParameterState>,
    revision: AtomicU64,
    subscribers: Mutex<Vec<Weak<TreeNode>>>,
}

impl Parameter {
    /// Create a free parameter without bounds or error.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            kind: value.kind(),
            state: RwLock::new(ParameterState {
                value: Arc::new(value),
                fixed: false,
                bounds: None,
                use_bounds: false,
                error: None,
            }),
            revision: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Create a fixed parameter. Used for constant leaves.
    pub fn constant(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let param = Self::new(name, value);
        param.fix();
        param
    }

    /// Create a parameter restricted to `[min, max]`.
    ///
    /// Fails if the bounds are inverted or do not enclose `value`.
    pub fn bounded(
        name: impl Into<String>,
        value: impl Into<Value>,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Result<Self, MutationError> {
        let param = Self::new(name, value);
        param.set_bounds(min, max)?;
        Ok(param)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind fixed at construction.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Current value. Cheap to clone, batched payloads are shared.
    pub fn value(&self) -> Arc<Value> {
        Arc::clone(&self.state.read().value)
    }

    /// Number of successful value changes since construction.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Replace the value and invalidate every dependent node.
    ///
    /// Fails without side effects if the parameter is fixed, the kind differs,
    /// or bounds are enforced and the value lies outside them.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<(), MutationError> {
        let value = value.into();
        {
            let mut state = self.state.write();
            if state.fixed {
                return Err(MutationError::ParameterFixed(self.name.clone()));
            }
            if value.kind() != self.kind {
                return Err(MutationError::KindMismatch {
                    name: self.name.clone(),
                    expected: self.kind,
                    found: value.kind(),
                });
            }
            if state.use_bounds
                && let Some(bounds) = &state.bounds
                && !bounds.encloses(&value)
            {
                return Err(MutationError::OutOfBounds {
                    name: self.name.clone(),
                    value,
                });
            }
            state.value = Arc::new(value);
        }
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(parameter = %self.name, revision, "parameter changed");
        self.notify();
        Ok(())
    }

    /// Replace both bounds.
    ///
    /// Succeeds only if `max > min` and the current value lies inside;
    /// otherwise the previous bounds are kept.
    pub fn set_bounds(
        &self,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Result<(), MutationError> {
        let bounds = Bounds {
            min: min.into(),
            max: max.into(),
        };
        let mut state = self.state.write();
        if !bounds.encloses(&state.value) {
            return Err(MutationError::InvalidBounds {
                name: self.name.clone(),
                min: bounds.min,
                max: bounds.max,
            });
        }
        state.bounds = Some(bounds);
        Ok(())
    }

    /// Replace the lower bound, keeping the upper one.
    ///
    /// A parameter without bounds rejects this.
    pub fn set_min(&self, min: impl Into<Value>) -> Result<(), MutationError> {
        let max = self.bounds().map(|b| b.max);
        match max {
            Some(max) => self.set_bounds(min, max),
            None => Err(MutationError::InvalidBounds {
                name: self.name.clone(),
                min: min.into(),
                max: self.kind.default_value(),
            }),
        }
    }

    /// Replace the upper bound, keeping the lower one.
    ///
    /// A parameter without bounds rejects this.
    pub fn set_max(&self, max: impl Into<Value>) -> Result<(), MutationError> {
        let min = self.bounds().map(|b| b.min);
        match min {
            Some(min) => self.set_bounds(min, max),
            None => Err(MutationError::InvalidBounds {
                name: self.name.clone(),
                min: self.kind.default_value(),
                max: max.into(),
            }),
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.state.read().bounds.clone()
    }

    /// Enforce bounds on [`set_value`](Self::set_value).
    pub fn use_bounds(&self, enforce: bool) {
        self.state.write().use_bounds = enforce;
    }

    /// Whether bounds exist and are enforced.
    pub fn uses_bounds(&self) -> bool {
        let state = self.state.read();
        state.use_bounds && state.bounds.is_some()
    }

    pub fn fix(&self) {
        self.state.write().fixed = true;
    }

    pub fn free(&self) {
        self.state.write().fixed = false;
    }

    pub fn is_fixed(&self) -> bool {
        self.state.read().fixed
    }

    /// Uncertainty annotation. Never affects recomputation.
    pub fn error(&self) -> Option<Value> {
        self.state.read().error.clone()
    }

    pub fn set_error(&self, error: impl Into<Value>) -> Result<(), MutationError> {
        let error = error.into();
        if error.kind() != self.kind {
            return Err(MutationError::KindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                found: error.kind(),
            });
        }
        self.state.write().error = Some(error);
        Ok(())
    }

    /// Register a node that consumes this parameter.
    pub(crate) fn subscribe(&self, node: &Arc<TreeNode>) {
        let mut subscribers = self.subscribers.lock();
        if !subscribers
            .iter()
            .any(|s| std::ptr::eq(s.as_ptr(), Arc::as_ptr(node)))
        {
            subscribers.push(Arc::downgrade(node));
        }
    }

    /// Number of live nodes consuming this parameter.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    fn notify(&self) {
        let live: Vec<Arc<TreeNode>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|s| s.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for node in live {
            node.mark_dirty();
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("value", &state.value)
            .field("fixed", &state.fixed)
            .field("bounds", &state.bounds)
            .field("revision", &self.revision())
            .finish()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        write!(f, "{}\t Val = {}", self.name, state.value)?;
        if let Some(bounds) = &state.bounds {
            write!(f, "\t  Min-Max = {} to {}", bounds.min, bounds.max)?;
        }
        if let Some(error) = &state.error {
            write!(f, "\t  Err = {error}")?;
        }
        write!(f, "\t Type = {}", self.kind)
    }
}
