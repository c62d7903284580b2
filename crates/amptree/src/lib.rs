//! Amptree.
//!
//! This crate provides an incremental evaluator for amplitude models. A model
//! is a directed acyclic graph of pure operations ([`Strategy`]) over named
//! inputs ([`Parameter`]). Evaluating it repeatedly while an optimizer varies
//! a few parameters only re-executes the part of the graph those parameters
//! feed.
//!
//! # Architecture
//!
//! - [`value`] - Typed values: [`Value`] and [`ValueKind`]
//! - [`parameter`] - Mutable leaves with bounds and dirty propagation
//! - [`strategy`] - The [`Strategy`] contract plus input-checking helpers
//! - [`strategies`] - Generic reducers such as `AddAll` and `AbsSquare`
//! - [`node`] - [`TreeNode`], the cached graph vertex
//! - [`tree`] - [`FunctionTree`], the container and construction API
//! - [`parameter_list`] - [`ParameterList`] for optimizer drivers
//! - [`reductions`] - Deterministic reductions over the event axis
//! - [`config`] - [`TreeConfig`] evaluation settings
//! - [`error`] - Error types for construction, mutation and evaluation
//!
//! # Evaluation Model
//!
//! 1. **Build** - Create the head, then nodes and leaves under named parents
//! 2. **Mutate** - Set parameter values; dependents are flagged dirty
//! 3. **Recalculate** - Dirty nodes recompute in post-order, clean ones
//!    return their cached value
//!
//! Batched kinds (`MultiDouble`, `MultiComplex`) carry one entry per event of
//! a data or phase-space sample, so per-event work is done once per batch
//! instead of once per event.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use amptree::strategies::{AbsSquare, AddAll};
//! use amptree::{FunctionTree, Parameter, Value, ValueKind};
//! use num_complex::Complex64;
//!
//! let coupling = Arc::new(Parameter::new("g", Complex64::new(1.0, 0.0)));
//!
//! let mut tree = FunctionTree::new();
//! tree.create_head("intensity", Arc::new(AbsSquare::new(ValueKind::Double)))?;
//! tree.create_node("sum", Arc::new(AddAll::new(ValueKind::Complex)), "intensity")?;
//! tree.create_leaf("g", Arc::clone(&coupling), "sum")?;
//! tree.create_leaf("bg", Complex64::new(0.0, 1.0), "sum")?;
//!
//! assert_eq!(*tree.recalculate()?, Value::Double(2.0));
//!
//! coupling.set_value(Complex64::new(2.0, 0.0))?;
//! assert_eq!(*tree.recalculate()?, Value::Double(5.0));
//! # Ok::<(), amptree::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod node;
pub mod parameter;
pub mod parameter_list;
pub mod reductions;
pub mod strategies;
pub mod strategy;
pub mod tree;
pub mod value;

pub use config::{ParallelConfig, TreeConfig};
pub use error::{ConstructionError, Error, EvalError, MutationError, Result};
pub use node::{Child, TreeNode};
pub use parameter::{Bounds, Parameter};
pub use parameter_list::ParameterList;
pub use strategy::{Strategy, StrategyRef};
pub use tree::{FunctionTree, Leaf};
pub use value::{Value, ValueKind};
