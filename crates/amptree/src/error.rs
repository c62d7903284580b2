//! Error types for tree construction, parameter mutation and evaluation.
//!
//! # Error Categories
//!
//! - **Construction errors** ([`ConstructionError`]): raised while wiring a
//!   [`FunctionTree`](crate::FunctionTree). Never recovered automatically; the
//!   caller has to fix its construction sequence.
//! - **Mutation errors** ([`MutationError`]): raised by
//!   [`Parameter`](crate::Parameter) mutators. A failed mutation has no side
//!   effect, so the caller may ignore it or retry.
//! - **Evaluation errors** ([`EvalError`]): raised by a
//!   [`Strategy`](crate::Strategy) during recomputation. They abort the
//!   current [`recalculate`](crate::FunctionTree::recalculate) call and are
//!   reported together with the failing node.
//!
//! # Numeric Degeneracy
//!
//! NaN and infinite results are not errors. They are valid values that
//! propagate upward; the tree logs a diagnostic when
//! [`TreeConfig::check_finite`](crate::TreeConfig) is set and carries on.

use thiserror::Error;

use crate::value::{Value, ValueKind};

/// Crate result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the function tree.
#[derive(Debug, Error)]
pub enum Error {
    /// The tree could not be built as requested.
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// A parameter rejected a mutation.
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// A strategy failed while recomputing a node.
    ///
    /// The node stays dirty, so the next recalculation retries it.
    #[error("evaluation of node '{node}' failed: {source}")]
    Evaluation {
        /// Name of the node whose strategy failed.
        node: String,
        /// The underlying strategy failure.
        #[source]
        source: EvalError,
    },
}

/// Errors raised while building a [`FunctionTree`](crate::FunctionTree).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// A child was attached to a parent name that is not registered yet.
    #[error("unknown parent node: {0}")]
    UnknownParent(String),

    /// A node referenced by name does not exist.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// The name is already taken by a different node or leaf.
    #[error("name already registered: {0}")]
    DuplicateName(String),

    /// The tree already has a head.
    #[error("tree already has a head: {0}")]
    HeadExists(String),

    /// The operation needs a head but none was created.
    #[error("tree has no head")]
    MissingHead,

    /// Attaching the child would make the graph cyclic.
    #[error("linking '{child}' under '{parent}' would create a cycle")]
    CycleDetected {
        /// The node being attached.
        child: String,
        /// The node it was attached to.
        parent: String,
    },

    /// Registered nodes that cannot be reached from the head.
    #[error("nodes not reachable from head: {0:?}")]
    Detached(Vec<String>),
}

/// Errors raised by parameter mutators and parameter lists.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    /// The parameter is fixed and refuses new values.
    #[error("parameter '{0}' is fixed")]
    ParameterFixed(String),

    /// Bounds are inverted, do not enclose the value, or do not apply to the
    /// parameter's kind.
    #[error("invalid bounds for '{name}': {min} to {max}")]
    InvalidBounds {
        /// Parameter name.
        name: String,
        /// Rejected lower bound.
        min: Value,
        /// Rejected upper bound.
        max: Value,
    },

    /// The new value has a different kind than the parameter.
    #[error("kind mismatch for '{name}': expected {expected}, found {found}")]
    KindMismatch {
        /// Parameter name.
        name: String,
        /// Kind fixed at construction.
        expected: ValueKind,
        /// Kind of the rejected value.
        found: ValueKind,
    },

    /// Bounds are enforced and the new value lies outside them.
    #[error("value {value} is outside the bounds of '{name}'")]
    OutOfBounds {
        /// Parameter name.
        name: String,
        /// The rejected value.
        value: Value,
    },

    /// No parameter with this name exists in the list.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// An optimizer vector does not match the number of free parameters.
    #[error("expected {expected} free values, got {found}")]
    LengthMismatch {
        /// Number of free double parameters.
        expected: usize,
        /// Length of the supplied vector.
        found: usize,
    },
}

/// Errors raised by a [`Strategy`](crate::Strategy) during execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// An input has a kind the strategy cannot consume.
    #[error("{strategy}: input {index} has kind {found}, expected {expected}")]
    TypeMismatch {
        /// Strategy name.
        strategy: String,
        /// Position of the offending input.
        index: usize,
        /// Human-readable description of the accepted kinds.
        expected: String,
        /// Kind that was supplied.
        found: ValueKind,
    },

    /// Sibling batched inputs have different lengths.
    #[error("{strategy}: batched input {index} has length {found}, expected {expected}")]
    ShapeMismatch {
        /// Strategy name.
        strategy: String,
        /// Position of the offending input.
        index: usize,
        /// Length of the first batched input.
        expected: usize,
        /// Length of the offending input.
        found: usize,
    },

    /// A fixed-arity strategy received the wrong number of inputs.
    #[error("{strategy}: expected {expected} inputs, got {found}")]
    Arity {
        /// Strategy name.
        strategy: String,
        /// Required input count.
        expected: usize,
        /// Supplied input count.
        found: usize,
    },

    /// The strategy was declared with a result kind it cannot produce.
    #[error("{strategy} cannot produce a {kind} result")]
    UnsupportedResult {
        /// Strategy name.
        strategy: String,
        /// Declared result kind.
        kind: ValueKind,
    },

    /// A batched result was requested with no inputs to size it.
    #[error("{strategy}: batched result has no inputs to size it")]
    MissingBatch {
        /// Strategy name.
        strategy: String,
    },

    /// The strategy returned a value whose kind differs from its declaration.
    #[error("{strategy}: declared {declared} result, returned {returned}")]
    ResultKind {
        /// Strategy name.
        strategy: String,
        /// Declared result kind.
        declared: ValueKind,
        /// Kind actually returned.
        returned: ValueKind,
    },
}

impl Error {
    /// Whether this error was raised while building a tree.
    pub fn is_construction(&self) -> bool {
        matches!(self, Error::Construction(_))
    }

    /// Whether this error was raised by a parameter mutator.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Error::Mutation(_))
    }

    /// Whether this error aborted a recalculation.
    pub fn is_evaluation(&self) -> bool {
        matches!(self, Error::Evaluation { .. })
    }
}
