//! Graph vertices with cached results.
//!
//! A [`TreeNode`] applies its [`Strategy`] to the values of its children and
//! caches the output. The cache is guarded by a dirty flag:
//!
//! - a leaf change or a new child pushes a dirty mark up through every
//!   parent ([`TreeNode::mark_dirty`]);
//! - [`TreeNode::recompute`] re-executes only dirty nodes, in post-order, and
//!   returns the cached value for clean ones.
//!
//! Marking stops at a node that is already dirty. Every path that clears a
//! flag recomputes the children first, so the parents of a dirty node are
//! always dirty themselves.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tracing::{trace, warn};

use crate::config::TreeConfig;
use crate::error::{Error, EvalError, Result};
use crate::parameter::Parameter;
use crate::strategy::StrategyRef;
use crate::value::Value;

/// An input of a [`TreeNode`].
#[derive(Debug, Clone)]
pub enum Child {
    Node(Arc<TreeNode>),
    Leaf(Arc<Parameter>),
}

impl Child {
    pub fn name(&self) -> &str {
        match self {
            Child::Node(node) => node.name(),
            Child::Leaf(param) => param.name(),
        }
    }
}

/// A vertex of a function tree.
pub struct TreeNode {
    name: String,
    strategy: StrategyRef,
    children: RwLock<Vec<Child>>,
    parents: Mutex<Vec<Weak<TreeNode>>>,
    value: RwLock<Arc<Value>>,
    dirty: AtomicBool,
    evaluations: AtomicU64,
}

impl TreeNode {
    /// Create a dirty node without children.
    ///
    /// The cached value starts as the default of the strategy's result kind.
    pub fn new(name: impl Into<String>, strategy: StrategyRef) -> Arc<Self> {
        let initial = strategy.result_kind().default_value();
        Arc::new(Self {
            name: name.into(),
            strategy,
            children: RwLock::new(Vec::new()),
            parents: Mutex::new(Vec::new()),
            value: RwLock::new(Arc::new(initial)),
            dirty: AtomicBool::new(true),
            evaluations: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> &StrategyRef {
        &self.strategy
    }

    /// Snapshot of the children in argument order.
    pub fn children(&self) -> Vec<Child> {
        self.children.read().clone()
    }

    /// Number of live parents, across every tree sharing this node.
    pub fn parent_count(&self) -> usize {
        self.parents
            .lock()
            .iter()
            .filter(|p| p.strong_count() > 0)
            .count()
    }

    /// Last computed value. Stale while the node is dirty.
    pub fn value(&self) -> Arc<Value> {
        Arc::clone(&self.value.read())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Number of strategy invocations since construction.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Flag this node and, transitively, every parent for recomputation.
    pub fn mark_dirty(&self) {
        if self.dirty.swap(true, Ordering::AcqRel) {
            return;
        }
        trace!(node = %self.name, "marked dirty");
        let parents: Vec<Arc<TreeNode>> = {
            let mut parents = self.parents.lock();
            parents.retain(|p| p.strong_count() > 0);
            parents.iter().filter_map(Weak::upgrade).collect()
        };
        for parent in parents {
            parent.mark_dirty();
        }
    }

    /// Append `child` as the last argument and mark this node dirty.
    pub fn add_child(self: &Arc<Self>, child: Child) {
        match &child {
            Child::Node(node) => node.add_parent(self),
            Child::Leaf(param) => param.subscribe(self),
        }
        self.children.write().push(child);
        self.mark_dirty();
    }

    fn add_parent(&self, parent: &Arc<TreeNode>) {
        let mut parents = self.parents.lock();
        if !parents
            .iter()
            .any(|p| std::ptr::eq(p.as_ptr(), Arc::as_ptr(parent)))
        {
            parents.push(Arc::downgrade(parent));
        }
    }

    /// Whether `target` is this node or one of its descendants.
    ///
    /// Each shared descendant is visited once.
    pub fn reaches(&self, target: &TreeNode) -> bool {
        if std::ptr::eq(self, target) {
            return true;
        }
        let mut visited: HashSet<*const TreeNode> = HashSet::new();
        let mut stack: Vec<Arc<TreeNode>> = self
            .children()
            .into_iter()
            .filter_map(|child| match child {
                Child::Node(node) => Some(node),
                Child::Leaf(_) => None,
            })
            .collect();
        while let Some(node) = stack.pop() {
            if std::ptr::eq(Arc::as_ptr(&node), target) {
                return true;
            }
            if !visited.insert(Arc::as_ptr(&node)) {
                continue;
            }
            for child in node.children() {
                if let Child::Node(next) = child {
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Bring this node up to date and return its value.
    ///
    /// Dirty child nodes are recomputed first; clean subgraphs are not
    /// visited. On failure the node stays dirty and the cached value is left
    /// untouched.
    pub fn recompute(&self, config: &TreeConfig) -> Result<Arc<Value>> {
        if !self.is_dirty() {
            return Ok(self.value());
        }

        // No lock is held while children recurse
        let children = self.children();
        let dirty: Vec<&Arc<TreeNode>> = children
            .iter()
            .filter_map(|child| match child {
                Child::Node(node) if node.is_dirty() => Some(node),
                _ => None,
            })
            .collect();

        if config.parallel.enabled && dirty.len() >= config.parallel.threshold {
            dirty
                .par_iter()
                .try_for_each(|node| node.recompute(config).map(|_| ()))?;
        } else {
            for node in dirty {
                node.recompute(config)?;
            }
        }

        let inputs: Vec<Arc<Value>> = children
            .iter()
            .map(|child| match child {
                Child::Node(node) => node.recompute(config),
                Child::Leaf(param) => Ok(param.value()),
            })
            .collect::<Result<_>>()?;
        let refs: Vec<&Value> = inputs.iter().map(Arc::as_ref).collect();

        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let result = self
            .strategy
            .execute(&refs)
            .map_err(|source| self.evaluation_error(source))?;

        let declared = self.strategy.result_kind();
        if result.kind() != declared {
            return Err(self.evaluation_error(EvalError::ResultKind {
                strategy: self.strategy.name().to_string(),
                declared,
                returned: result.kind(),
            }));
        }

        if config.check_finite && !result.is_finite() {
            warn!(
                node = %self.name,
                strategy = self.strategy.name(),
                "non-finite result"
            );
        }
        trace!(node = %self.name, strategy = self.strategy.name(), "recomputed");

        let result = Arc::new(result);
        *self.value.write() = Arc::clone(&result);
        self.dirty.store(false, Ordering::Release);
        Ok(result)
    }

    fn evaluation_error(&self, source: EvalError) -> Error {
        Error::Evaluation {
            node: self.name.clone(),
            source,
        }
    }

    /// Indented dump of this node and its children, `depth` levels deep.
    pub fn render(&self, depth: usize) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0, depth);
        out
    }

    fn render_into(&self, out: &mut String, indent: usize, depth: usize) {
        let pad = "  ".repeat(indent);
        let state = if self.is_dirty() { " (dirty)" } else { "" };
        let _ = writeln!(
            out,
            "{pad}{} [{:?}] = {}{state}",
            self.name,
            self.strategy,
            self.value()
        );

        let children = self.children();
        if depth <= 1 {
            if !children.is_empty() {
                let _ = writeln!(out, "{pad}  ...");
            }
            return;
        }
        for child in &children {
            match child {
                Child::Node(node) => node.render_into(out, indent + 1, depth - 1),
                Child::Leaf(param) => {
                    let _ = writeln!(out, "{pad}  {} = {}", param.name(), param.value());
                }
            }
        }
    }
}

impl std::fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeNode")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field(
                "children",
                &self.children.read().iter().map(Child::name).collect::<Vec<_>>(),
            )
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
