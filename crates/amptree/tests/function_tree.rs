//! End-to-end tests for incremental evaluation.
//!
//! These tests verify the full cycle:
//! Build tree → Recalculate → Mutate parameters → Recalculate

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use amptree::strategies::{
    AbsSquare, AddAll, ComplexFromPolar, ComplexProduct, MultiplyAll, SquareRoot,
};
use amptree::{
    Error, EvalError, FunctionTree, Parameter, Strategy, StrategyRef, TreeConfig, Value, ValueKind,
};
use num_complex::Complex64;

/// Wraps a strategy and counts its invocations.
struct Counting {
    inner: StrategyRef,
    calls: Arc<AtomicUsize>,
}

impl Counting {
    fn wrap(inner: StrategyRef) -> (StrategyRef, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = Arc::new(Counting {
            inner,
            calls: Arc::clone(&calls),
        });
        (strategy, calls)
    }
}

impl Strategy for Counting {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn result_kind(&self) -> ValueKind {
        self.inner.result_kind()
    }

    fn execute(&self, inputs: &[&Value]) -> Result<Value, EvalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(inputs)
    }
}

/// Claims a double result but returns an integer.
struct Liar;

impl Strategy for Liar {
    fn name(&self) -> &str {
        "Liar"
    }

    fn result_kind(&self) -> ValueKind {
        ValueKind::Double
    }

    fn execute(&self, _inputs: &[&Value]) -> Result<Value, EvalError> {
        Ok(Value::Integer(1))
    }
}

fn add() -> StrategyRef {
    Arc::new(AddAll::new(ValueKind::Double))
}

fn mul() -> StrategyRef {
    Arc::new(MultiplyAll::new(ValueKind::Double))
}

/// Head = MultiplyAll(a = 2, b = AddAll(c = 3, d = 4))
#[test]
fn test_end_to_end_update() {
    let c = Arc::new(Parameter::new("c", 3.0));
    let mut tree = FunctionTree::new();
    tree.create_head("Head", mul()).unwrap();
    tree.create_leaf("a", 2.0, "Head").unwrap();
    tree.create_node("b", add(), "Head").unwrap();
    tree.create_leaf("c", Arc::clone(&c), "b").unwrap();
    tree.create_leaf("d", 4.0, "b").unwrap();
    tree.verify().unwrap();

    assert_eq!(*tree.recalculate().unwrap(), Value::Double(14.0));

    c.set_value(5.0).unwrap();
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(16.0));
}

/// A clean recalculation returns the cache without invoking any strategy.
#[test]
fn test_clean_recalculate_is_idempotent() {
    let (head, head_calls) = Counting::wrap(mul());
    let (inner, inner_calls) = Counting::wrap(add());

    let mut tree = FunctionTree::new();
    tree.create_head("Head", head).unwrap();
    tree.create_node("inner", inner, "Head").unwrap();
    tree.create_leaf("x", 1.5, "inner").unwrap();
    tree.create_leaf("y", 2.0, "Head").unwrap();

    let first = tree.recalculate().unwrap();
    let second = tree.recalculate().unwrap();
    let third = tree.recalculate().unwrap();

    assert_eq!(*first, Value::Double(3.0));
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&second, &third));
    assert_eq!(head_calls.load(Ordering::SeqCst), 1);
    assert_eq!(inner_calls.load(Ordering::SeqCst), 1);
}

/// Chain A → B → C plus an unrelated branch X → D under one head.
/// Changing one leaf re-executes only the nodes above it.
#[test]
fn test_dirty_frontier_is_minimal() {
    let c = Arc::new(Parameter::new("C", 1.0));
    let d = Arc::new(Parameter::new("D", 10.0));
    let (head, head_calls) = Counting::wrap(add());
    let (a, a_calls) = Counting::wrap(add());
    let (b, b_calls) = Counting::wrap(add());
    let (x, x_calls) = Counting::wrap(add());

    let mut tree = FunctionTree::new();
    tree.create_head("Head", head).unwrap();
    tree.create_node("A", a, "Head").unwrap();
    tree.create_node("B", b, "A").unwrap();
    tree.create_leaf("C", Arc::clone(&c), "B").unwrap();
    tree.create_node("X", x, "Head").unwrap();
    tree.create_leaf("D", Arc::clone(&d), "X").unwrap();

    assert_eq!(*tree.recalculate().unwrap(), Value::Double(11.0));

    c.set_value(2.0).unwrap();
    assert!(!tree.node("X").unwrap().is_dirty());
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(12.0));
    assert_eq!(a_calls.load(Ordering::SeqCst), 2);
    assert_eq!(b_calls.load(Ordering::SeqCst), 2);
    assert_eq!(x_calls.load(Ordering::SeqCst), 1);

    d.set_value(20.0).unwrap();
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(22.0));
    assert_eq!(a_calls.load(Ordering::SeqCst), 2);
    assert_eq!(b_calls.load(Ordering::SeqCst), 2);
    assert_eq!(x_calls.load(Ordering::SeqCst), 2);
    assert_eq!(head_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_invalidation_reaches_top_of_long_chain() {
    let leaf = Arc::new(Parameter::new("x", 1.0));
    let mut tree = FunctionTree::new();
    tree.create_head("n0", add()).unwrap();
    for i in 1..200 {
        tree.create_node(format!("n{i}"), add(), &format!("n{}", i - 1))
            .unwrap();
    }
    tree.create_leaf("x", Arc::clone(&leaf), "n199").unwrap();
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(1.0));

    for (_, node) in tree.nodes() {
        assert!(!node.is_dirty());
    }
    leaf.set_value(7.0).unwrap();
    for (_, node) in tree.nodes() {
        assert!(node.is_dirty());
    }
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(7.0));
    assert_eq!(tree.head().unwrap().evaluations(), 2);
}

#[test]
fn test_fixed_parameter_does_not_dirty() {
    let width = Arc::new(Parameter::new("width", 0.15));
    let mut tree = FunctionTree::new();
    tree.create_head("Head", add()).unwrap();
    tree.create_leaf("width", Arc::clone(&width), "Head").unwrap();
    tree.recalculate().unwrap();

    width.fix();
    assert!(width.set_value(0.3).is_err());
    assert!(!tree.head().unwrap().is_dirty());
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(0.15));
    assert_eq!(tree.head().unwrap().evaluations(), 1);
}

/// One amplitude subtree shared by two intensity trees.
#[test]
fn test_shared_subtree_invalidates_both_trees() {
    let mag = Arc::new(Parameter::new("mag", 1.0));
    let mut amp = FunctionTree::new();
    amp.create_head(
        "coeff",
        Arc::new(ComplexFromPolar::new(ValueKind::Complex)),
    )
    .unwrap();
    amp.create_leaf("mag", Arc::clone(&mag), "coeff").unwrap();
    amp.create_leaf("phase", 0.0, "coeff").unwrap();

    let mut first = FunctionTree::new();
    first
        .create_head("I1", Arc::new(AbsSquare::new(ValueKind::Double)))
        .unwrap();
    first.insert_tree(&amp, "I1").unwrap();

    let mut second = FunctionTree::new();
    second
        .create_head("I2", Arc::new(AbsSquare::new(ValueKind::Double)))
        .unwrap();
    second
        .create_node(
            "scaled",
            Arc::new(ComplexProduct::new(ValueKind::Complex)),
            "I2",
        )
        .unwrap();
    second.create_leaf("k", 3.0, "scaled").unwrap();
    second.insert_tree(&amp, "scaled").unwrap();

    assert_eq!(*first.recalculate().unwrap(), Value::Double(1.0));
    assert_eq!(*second.recalculate().unwrap(), Value::Double(9.0));
    assert_eq!(amp.head().unwrap().evaluations(), 1);
    assert_eq!(amp.head().unwrap().parent_count(), 2);

    mag.set_value(2.0).unwrap();
    assert!(first.head().unwrap().is_dirty());
    assert!(second.head().unwrap().is_dirty());
    assert_eq!(*first.recalculate().unwrap(), Value::Double(4.0));
    assert_eq!(*second.recalculate().unwrap(), Value::Double(36.0));
}

fn batched_model(config: TreeConfig, events: usize) -> (FunctionTree, Vec<Arc<Parameter>>) {
    let mut tree = FunctionTree::with_config(config);
    tree.create_head("nll", Arc::new(AddAll::new(ValueKind::Double)))
        .unwrap();
    tree.create_node(
        "intensity",
        Arc::new(AbsSquare::new(ValueKind::MultiDouble)),
        "nll",
    )
    .unwrap();
    tree.create_node(
        "sum",
        Arc::new(AddAll::new(ValueKind::MultiComplex)),
        "intensity",
    )
    .unwrap();

    let mut params = Vec::new();
    for r in 0..8 {
        let reso = format!("reso{r}");
        let coeff = format!("coeff{r}");
        let mag = Arc::new(Parameter::new(format!("mag{r}"), 1.0 + r as f64 * 0.1));
        let phase = Arc::new(Parameter::new(format!("phase{r}"), r as f64 * 0.3));

        tree.create_node(
            &reso,
            Arc::new(ComplexProduct::new(ValueKind::MultiComplex)),
            "sum",
        )
        .unwrap();
        tree.create_node(
            &coeff,
            Arc::new(ComplexFromPolar::new(ValueKind::Complex)),
            &reso,
        )
        .unwrap();
        tree.create_leaf(format!("mag{r}"), Arc::clone(&mag), &coeff)
            .unwrap();
        tree.create_leaf(format!("phase{r}"), Arc::clone(&phase), &coeff)
            .unwrap();
        let shape: Vec<Complex64> = (0..events)
            .map(|i| Complex64::new((i + r) as f64 * 0.01, 1.0 / (1.0 + r as f64)))
            .collect();
        tree.create_leaf(format!("shape{r}"), shape, &reso).unwrap();
        params.push(mag);
        params.push(phase);
    }
    (tree, params)
}

/// The same model evaluated with and without rayon fan-out.
#[test]
fn test_parallel_matches_sequential() {
    let (sequential, seq_params) = batched_model(TreeConfig::default(), 257);
    let (parallel, par_params) = batched_model(TreeConfig::parallel(), 257);

    let a = sequential.recalculate().unwrap();
    let b = parallel.recalculate().unwrap();
    assert_eq!(
        a.as_double().unwrap().to_bits(),
        b.as_double().unwrap().to_bits()
    );

    for (s, p) in seq_params.iter().zip(&par_params).step_by(3) {
        let v = s.value().as_double().unwrap() + 0.25;
        s.set_value(v).unwrap();
        p.set_value(v).unwrap();
    }
    let a = sequential.recalculate().unwrap();
    let b = parallel.recalculate().unwrap();
    assert_eq!(*a, *b);
    assert_ne!(*a, Value::Double(0.0));
}

/// A strategy failure names the node and leaves it dirty for a retry.
#[test]
fn test_evaluation_error_leaves_node_dirty() {
    let first = Arc::new(Parameter::new("first", vec![1.0, 2.0]));
    let second = Arc::new(Parameter::new("second", vec![1.0, 2.0, 3.0]));

    let mut tree = FunctionTree::new();
    tree.create_head("Head", Arc::new(AddAll::new(ValueKind::Double)))
        .unwrap();
    tree.create_node(
        "sum",
        Arc::new(AddAll::new(ValueKind::MultiDouble)),
        "Head",
    )
    .unwrap();
    tree.create_leaf("first", Arc::clone(&first), "sum").unwrap();
    tree.create_leaf("second", Arc::clone(&second), "sum").unwrap();

    let err = tree.recalculate().unwrap_err();
    assert!(err.is_evaluation());
    match err {
        Error::Evaluation { node, source } => {
            assert_eq!(node, "sum");
            assert!(matches!(source, EvalError::ShapeMismatch { index: 1, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(tree.node("sum").unwrap().is_dirty());
    assert!(tree.head().unwrap().is_dirty());

    second.set_value(vec![3.0, 4.0]).unwrap();
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(10.0));
    assert_eq!(
        *tree.node("sum").unwrap().value(),
        Value::MultiDouble(vec![4.0, 6.0])
    );
}

#[test]
fn test_declared_kind_is_enforced() {
    let mut tree = FunctionTree::new();
    tree.create_head("Head", Arc::new(Liar)).unwrap();
    let err = tree.recalculate().unwrap_err();
    assert!(matches!(
        err,
        Error::Evaluation {
            source: EvalError::ResultKind {
                declared: ValueKind::Double,
                returned: ValueKind::Integer,
                ..
            },
            ..
        }
    ));
    assert_eq!(*tree.head().unwrap().value(), Value::Double(0.0));
}

/// NaN is a value: it propagates and the call still succeeds.
#[test]
fn test_nan_propagates() {
    let x = Arc::new(Parameter::new("x", 4.0));
    let mut tree = FunctionTree::new();
    tree.create_head("Head", add()).unwrap();
    tree.create_node(
        "root",
        Arc::new(SquareRoot::new(ValueKind::Double)),
        "Head",
    )
    .unwrap();
    tree.create_leaf("x", Arc::clone(&x), "root").unwrap();
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(2.0));

    x.set_value(-1.0).unwrap();
    let value = tree.recalculate().unwrap();
    assert!(value.as_double().unwrap().is_nan());
}

/// A new sample of a different size flows through once every batched leaf
/// is replaced.
#[test]
fn test_sample_replacement() {
    let m12 = Arc::new(Parameter::new("m12sq", vec![1.0, 2.0]));
    let m23 = Arc::new(Parameter::new("m23sq", vec![3.0, 4.0]));
    let mut tree = FunctionTree::new();
    tree.create_head("norm", add()).unwrap();
    tree.create_node(
        "product",
        Arc::new(MultiplyAll::new(ValueKind::MultiDouble)),
        "norm",
    )
    .unwrap();
    tree.create_leaf("m12sq", Arc::clone(&m12), "product").unwrap();
    tree.create_leaf("m23sq", Arc::clone(&m23), "product").unwrap();
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(11.0));

    m12.set_value(vec![1.0, 1.0, 1.0]).unwrap();
    assert!(tree.recalculate().is_err());
    m23.set_value(vec![1.0, 2.0, 3.0]).unwrap();
    assert_eq!(*tree.recalculate().unwrap(), Value::Double(6.0));
}
