//! Name-indexed parameter collections for optimizer drivers.
//!
//! An optimizer works on a flat vector of real numbers. [`ParameterList`]
//! maps that vector onto the free double parameters of a model, in insertion
//! order, and pushes every change through [`Parameter::set_value`] so the
//! dependent trees are invalidated as usual.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::MutationError;
use crate::parameter::Parameter;
use crate::value::{Value, ValueKind};

/// Ordered collection of shared parameters, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    params: IndexMap<String, Arc<Parameter>>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `param`, returning the parameter it replaced under the same name.
    pub fn insert(&mut self, param: Arc<Parameter>) -> Option<Arc<Parameter>> {
        self.params.insert(param.name().to_string(), param)
    }

    /// Add `param` under `name`, which may differ from the parameter's own.
    pub fn insert_as(
        &mut self,
        name: impl Into<String>,
        param: Arc<Parameter>,
    ) -> Option<Arc<Parameter>> {
        self.params.insert(name.into(), param)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Parameter>> {
        self.params.get(name)
    }

    /// Like [`get`](Self::get), failing with `UnknownParameter`.
    pub fn parameter(&self, name: &str) -> Result<&Arc<Parameter>, MutationError> {
        self.params
            .get(name)
            .ok_or_else(|| MutationError::UnknownParameter(name.to_string()))
    }

    /// Set the value of the parameter called `name`.
    pub fn set_value(&self, name: &str, value: impl Into<Value>) -> Result<(), MutationError> {
        self.parameter(name)?.set_value(value)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Parameter>> {
        self.params.values()
    }

    /// Parameters an optimizer may vary: not fixed, kind double.
    pub fn free_parameters(&self) -> Vec<&Arc<Parameter>> {
        self.params
            .values()
            .filter(|p| !p.is_fixed() && p.kind() == ValueKind::Double)
            .collect()
    }

    /// Current values of [`free_parameters`](Self::free_parameters).
    pub fn free_values(&self) -> Vec<f64> {
        self.free_parameters()
            .iter()
            .filter_map(|p| p.value().as_double())
            .collect()
    }

    /// Apply an optimizer vector to the free parameters, in order.
    ///
    /// The length must match exactly. Values are applied one by one; on a
    /// rejected value (enforced bounds) the earlier ones stay applied.
    pub fn set_free_values(&self, values: &[f64]) -> Result<(), MutationError> {
        let free = self.free_parameters();
        if free.len() != values.len() {
            return Err(MutationError::LengthMismatch {
                expected: free.len(),
                found: values.len(),
            });
        }
        for (param, value) in free.into_iter().zip(values) {
            param.set_value(*value)?;
        }
        Ok(())
    }
}

impl FromIterator<Arc<Parameter>> for ParameterList {
    fn from_iter<I: IntoIterator<Item = Arc<Parameter>>>(iter: I) -> Self {
        let mut list = Self::new();
        for param in iter {
            list.insert(param);
        }
        list
    }
}

impl fmt::Display for ParameterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for param in self.params.values() {
            writeln!(f, "{param}")?;
        }
        Ok(())
    }
}
