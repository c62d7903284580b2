//! Deterministic reductions over the event axis.
//!
//! Collapsing a batched value into a scalar (summing |A|² over a phase-space
//! sample, or the log-likelihood over a data sample) uses a fixed binary tree
//! whose pairing is decided by index:
//!
//! ```text
//! Events:  [e0, e1, e2, e3, e4]
//!
//! Level 0: e0+e1  e2+e3  e4
//! Level 1: (e0+e1)+(e2+e3)  e4
//! Level 2: ((e0+e1)+(e2+e3))+e4
//! ```
//!
//! The structure depends only on the length, so repeated evaluation of the
//! same sample yields bit-identical results. Pairwise summation also keeps the
//! rounding error at `O(log n)` instead of `O(n)` for the sample sizes a fit
//! works with.

use std::ops::{Add, Mul};

/// Reduce `values` with `op` along a fixed binary tree.
///
/// Returns `None` for an empty slice.
///
/// # Example
///
/// ```
/// use amptree::reductions::tree_reduce;
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(tree_reduce(&values, |a, b| a + b), Some(15.0));
/// ```
pub fn tree_reduce<T, F>(values: &[T], op: F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    if values.is_empty() {
        return None;
    }

    if values.len() == 1 {
        return Some(values[0]);
    }

    let mut current: Vec<T> = values.to_vec();
    let mut next: Vec<T> = Vec::with_capacity(values.len().div_ceil(2));

    while current.len() > 1 {
        next.clear();

        let mut i = 0;
        while i + 1 < current.len() {
            next.push(op(current[i], current[i + 1]));
            i += 2;
        }

        // Carry forward odd element
        if i < current.len() {
            next.push(current[i]);
        }

        std::mem::swap(&mut current, &mut next);
    }

    Some(current[0])
}

/// Tree sum; `zero` for an empty slice.
pub fn sum<T>(values: &[T], zero: T) -> T
where
    T: Copy + Add<Output = T>,
{
    tree_reduce(values, |a, b| a + b).unwrap_or(zero)
}

/// Tree product; `one` for an empty slice.
pub fn product<T>(values: &[T], one: T) -> T
where
    T: Copy + Mul<Output = T>,
{
    tree_reduce(values, |a, b| a * b).unwrap_or(one)
}
