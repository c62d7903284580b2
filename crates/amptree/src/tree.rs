//! The graph container and its construction API.
//!
//! A [`FunctionTree`] owns a head node plus name-indexed registries of every
//! node and leaf reachable from it. Construction is by name: each new node or
//! leaf is attached under a parent that must already be registered, so a tree
//! is always built top-down and the graph stays acyclic.
//!
//! ```
//! use std::sync::Arc;
//!
//! use amptree::strategies::{AddAll, MultiplyAll};
//! use amptree::{FunctionTree, Parameter, Value, ValueKind};
//!
//! let c = Arc::new(Parameter::new("c", 3.0));
//!
//! let mut tree = FunctionTree::new();
//! tree.create_head("Head", Arc::new(MultiplyAll::new(ValueKind::Double)))?;
//! tree.create_leaf("a", 2.0, "Head")?;
//! tree.create_node("b", Arc::new(AddAll::new(ValueKind::Double)), "Head")?;
//! tree.create_leaf("c", Arc::clone(&c), "b")?;
//! tree.create_leaf("d", 4.0, "b")?;
//!
//! assert_eq!(*tree.recalculate()?, Value::Double(14.0));
//!
//! c.set_value(5.0)?;
//! assert_eq!(*tree.recalculate()?, Value::Double(16.0));
//! # Ok::<(), amptree::Error>(())
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use num_complex::Complex64;
use tracing::{debug, instrument};

use crate::config::TreeConfig;
use crate::error::{ConstructionError, Result};
use crate::node::{Child, TreeNode};
use crate::parameter::Parameter;
use crate::parameter_list::ParameterList;
use crate::strategy::StrategyRef;
use crate::value::Value;

/// Depth used by `Display`.
const DISPLAY_DEPTH: usize = 10;

/// What [`FunctionTree::create_leaf`] attaches.
#[derive(Debug, Clone)]
pub enum Leaf {
    /// A fixed value, wrapped in a constant [`Parameter`].
    Constant(Value),
    /// A parameter owned by the caller, usually also held by an optimizer or
    /// a sample provider.
    Parameter(Arc<Parameter>),
}

impl From<Arc<Parameter>> for Leaf {
    fn from(param: Arc<Parameter>) -> Self {
        Leaf::Parameter(param)
    }
}

impl From<Value> for Leaf {
    fn from(value: Value) -> Self {
        Leaf::Constant(value)
    }
}

impl From<f64> for Leaf {
    fn from(value: f64) -> Self {
        Leaf::Constant(value.into())
    }
}

impl From<i64> for Leaf {
    fn from(value: i64) -> Self {
        Leaf::Constant(value.into())
    }
}

impl From<Complex64> for Leaf {
    fn from(value: Complex64) -> Self {
        Leaf::Constant(value.into())
    }
}

impl From<Vec<f64>> for Leaf {
    fn from(value: Vec<f64>) -> Self {
        Leaf::Constant(value.into())
    }
}

impl From<Vec<Complex64>> for Leaf {
    fn from(value: Vec<Complex64>) -> Self {
        Leaf::Constant(value.into())
    }
}

/// A DAG of strategy nodes over parameter leaves, evaluated incrementally.
#[derive(Debug, Default)]
pub struct FunctionTree {
    head: Option<Arc<TreeNode>>,
    nodes: IndexMap<String, Arc<TreeNode>>,
    leaves: IndexMap<String, Arc<Parameter>>,
    config: TreeConfig,
}

impl FunctionTree {
    /// Create an empty tree with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree with custom settings.
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Create the root node.
    pub fn create_head(
        &mut self,
        name: impl Into<String>,
        strategy: StrategyRef,
    ) -> Result<Arc<TreeNode>> {
        let name = name.into();
        if let Some(head) = &self.head {
            return Err(ConstructionError::HeadExists(head.name().to_string()).into());
        }
        self.ensure_free(&name)?;

        let node = TreeNode::new(name.clone(), strategy);
        debug!(node = %name, strategy = node.strategy().name(), "head created");
        self.nodes.insert(name, Arc::clone(&node));
        self.head = Some(Arc::clone(&node));
        Ok(node)
    }

    /// Create an internal node as the last child of `parent`.
    pub fn create_node(
        &mut self,
        name: impl Into<String>,
        strategy: StrategyRef,
        parent: &str,
    ) -> Result<Arc<TreeNode>> {
        let name = name.into();
        let parent_node = self.parent(parent)?;
        self.ensure_free(&name)?;

        let node = TreeNode::new(name.clone(), strategy);
        parent_node.add_child(Child::Node(Arc::clone(&node)));
        debug!(
            node = %name,
            strategy = node.strategy().name(),
            under = parent,
            "node created"
        );
        self.nodes.insert(name, Arc::clone(&node));
        Ok(node)
    }

    /// Attach a leaf as the last child of `parent`.
    ///
    /// Creating a leaf under a name that is already registered as the same
    /// leaf (the same parameter, or an equal constant) attaches the existing
    /// leaf again, so several nodes share it. Any other reuse of a name is
    /// rejected.
    pub fn create_leaf(
        &mut self,
        name: impl Into<String>,
        leaf: impl Into<Leaf>,
        parent: &str,
    ) -> Result<Arc<Parameter>> {
        let name = name.into();
        let leaf = leaf.into();
        let parent_node = self.parent(parent)?;

        if let Some(existing) = self.leaves.get(&name) {
            let same = match &leaf {
                Leaf::Parameter(param) => Arc::ptr_eq(existing, param),
                Leaf::Constant(value) => existing.is_fixed() && *existing.value() == *value,
            };
            if !same {
                return Err(ConstructionError::DuplicateName(name).into());
            }
            let existing = Arc::clone(existing);
            parent_node.add_child(Child::Leaf(Arc::clone(&existing)));
            debug!(leaf = %name, under = parent, "shared leaf attached");
            return Ok(existing);
        }
        self.ensure_free(&name)?;

        let param = match leaf {
            Leaf::Parameter(param) => param,
            Leaf::Constant(value) => Arc::new(Parameter::constant(name.clone(), value)),
        };
        parent_node.add_child(Child::Leaf(Arc::clone(&param)));
        debug!(leaf = %name, kind = %param.kind(), under = parent, "leaf created");
        self.leaves.insert(name, Arc::clone(&param));
        Ok(param)
    }

    /// Attach an already registered node or leaf under a further parent.
    pub fn link(&mut self, child: &str, parent: &str) -> Result<()> {
        let parent_node = self.parent(parent)?;

        if let Some(leaf) = self.leaves.get(child) {
            parent_node.add_child(Child::Leaf(Arc::clone(leaf)));
            debug!(leaf = child, under = parent, "leaf linked");
            return Ok(());
        }

        let child_node = self
            .nodes
            .get(child)
            .ok_or_else(|| ConstructionError::UnknownNode(child.to_string()))?;
        if child_node.reaches(&parent_node) {
            return Err(ConstructionError::CycleDetected {
                child: child.to_string(),
                parent: parent.to_string(),
            }
            .into());
        }
        parent_node.add_child(Child::Node(Arc::clone(child_node)));
        debug!(node = child, under = parent, "node linked");
        Ok(())
    }

    /// Graft the head of `other` under `parent` and merge its registries.
    ///
    /// The nodes stay shared with `other`: a parameter change invalidates
    /// both trees. Entries already shared between the two trees are fine,
    /// while a name bound to different nodes or leaves is rejected before
    /// anything is attached.
    pub fn insert_tree(&mut self, other: &FunctionTree, parent: &str) -> Result<()> {
        let other_head = other.head.as_ref().ok_or(ConstructionError::MissingHead)?;
        let parent_node = self.parent(parent)?;

        for (name, node) in &other.nodes {
            let clash = match self.nodes.get(name) {
                Some(existing) => !Arc::ptr_eq(existing, node),
                None => self.leaves.contains_key(name),
            };
            if clash {
                return Err(ConstructionError::DuplicateName(name.clone()).into());
            }
        }
        for (name, leaf) in &other.leaves {
            let clash = match self.leaves.get(name) {
                Some(existing) => !Arc::ptr_eq(existing, leaf),
                None => self.nodes.contains_key(name),
            };
            if clash {
                return Err(ConstructionError::DuplicateName(name.clone()).into());
            }
        }
        if other_head.reaches(&parent_node) {
            return Err(ConstructionError::CycleDetected {
                child: other_head.name().to_string(),
                parent: parent.to_string(),
            }
            .into());
        }

        parent_node.add_child(Child::Node(Arc::clone(other_head)));
        for (name, node) in &other.nodes {
            self.nodes
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(node));
        }
        for (name, leaf) in &other.leaves {
            self.leaves
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(leaf));
        }
        debug!(
            head = other_head.name(),
            under = parent,
            nodes = other.nodes.len(),
            leaves = other.leaves.len(),
            "tree inserted"
        );
        Ok(())
    }

    /// Bring every dirty node up to date and return the head's value.
    #[instrument(skip_all, fields(nodes = self.nodes.len()))]
    pub fn recalculate(&self) -> Result<Arc<Value>> {
        let head = self.head.as_ref().ok_or(ConstructionError::MissingHead)?;
        head.recompute(&self.config)
    }

    /// Check that a head exists and every registered entry hangs below it.
    pub fn verify(&self) -> Result<()> {
        let head = self.head.as_ref().ok_or(ConstructionError::MissingHead)?;

        let mut nodes: HashSet<*const TreeNode> = HashSet::new();
        let mut leaves: HashSet<*const Parameter> = HashSet::new();
        let mut stack = vec![Arc::clone(head)];
        while let Some(node) = stack.pop() {
            if !nodes.insert(Arc::as_ptr(&node)) {
                continue;
            }
            for child in node.children() {
                match child {
                    Child::Node(n) => stack.push(n),
                    Child::Leaf(p) => {
                        leaves.insert(Arc::as_ptr(&p));
                    }
                }
            }
        }

        let detached: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, n)| !nodes.contains(&Arc::as_ptr(n)))
            .map(|(name, _)| name.clone())
            .chain(
                self.leaves
                    .iter()
                    .filter(|(_, p)| !leaves.contains(&Arc::as_ptr(p)))
                    .map(|(name, _)| name.clone()),
            )
            .collect();
        if detached.is_empty() {
            Ok(())
        } else {
            Err(ConstructionError::Detached(detached).into())
        }
    }

    pub fn head(&self) -> Option<&Arc<TreeNode>> {
        self.head.as_ref()
    }

    pub fn node(&self, name: &str) -> Option<&Arc<TreeNode>> {
        self.nodes.get(name)
    }

    pub fn leaf(&self, name: &str) -> Option<&Arc<Parameter>> {
        self.leaves.get(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Registered nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Arc<TreeNode>)> {
        self.nodes.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Registered leaves in creation order.
    pub fn leaves(&self) -> impl Iterator<Item = (&str, &Arc<Parameter>)> {
        self.leaves.iter().map(|(name, leaf)| (name.as_str(), leaf))
    }

    /// Every non-constant leaf, keyed by the name it was registered under.
    pub fn parameters(&self) -> ParameterList {
        let mut list = ParameterList::new();
        for (name, param) in self.leaves.iter().filter(|(_, p)| !p.is_fixed()) {
            list.insert_as(name.clone(), Arc::clone(param));
        }
        list
    }

    /// Indented dump of the tree, `depth` levels deep.
    pub fn render(&self, depth: usize) -> String {
        match &self.head {
            Some(head) => head.render(depth),
            None => String::from("<empty tree>\n"),
        }
    }

    fn parent(&self, name: &str) -> std::result::Result<Arc<TreeNode>, ConstructionError> {
        self.nodes
            .get(name)
            .cloned()
            .ok_or_else(|| ConstructionError::UnknownParent(name.to_string()))
    }

    fn ensure_free(&self, name: &str) -> std::result::Result<(), ConstructionError> {
        if self.nodes.contains_key(name) || self.leaves.contains_key(name) {
            Err(ConstructionError::DuplicateName(name.to_string()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for FunctionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(DISPLAY_DEPTH))
    }
}
