use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;

use cellgraph_common::{CellError, CellErrorKind, LiteralValue};
use cellgraph_eval::test_workbook::{addr, range_addr};
use cellgraph_eval::{
    ArgValue, EvalError, Function, FunctionContext, FunctionProvider, GlobalFunctions,
    GraphBuildError, Session, TestWorkbook,
};

/// `TICK(x)` — identity on its first argument, counting every invocation.
struct Tick {
    calls: Arc<AtomicUsize>,
}

impl Function for Tick {
    fn name(&self) -> &'static str {
        "TICK"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        args[0].clone().into_value(ctx)
    }
}

/// `SEVEN()` — a zero-argument function.
struct Seven;

impl Function for Seven {
    fn name(&self) -> &'static str {
        "SEVEN"
    }

    fn eval(
        &self,
        _args: &[ArgValue],
        _ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        Ok(LiteralValue::Int(7))
    }
}

/// Builtins plus the test-local functions above.
struct TestFns {
    calls: Arc<AtomicUsize>,
}

impl TestFns {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            TestFns {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl FunctionProvider for TestFns {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        match name.to_ascii_uppercase().as_str() {
            "TICK" => Some(Arc::new(Tick {
                calls: self.calls.clone(),
            })),
            "SEVEN" => Some(Arc::new(Seven)),
            other => GlobalFunctions.get_function(other),
        }
    }
}

fn n(v: f64) -> LiteralValue {
    LiteralValue::Number(v)
}

#[test]
fn literal_dependency_feeds_a_formula() {
    let wb = TestWorkbook::new()
        .with_number("B1", 10.0)
        .with_formula("A1", "=B1+1");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();

    // the graph carries the edge B1 → A1
    assert_eq!(s.dependents_of(&addr("B1")), Some(vec![addr("A1")]));
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(11.0));

    s.set_value(&addr("B1"), n(20.0)).unwrap();
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(21.0));
}

#[test]
fn chain_evaluates_through_dependencies() {
    let wb = TestWorkbook::new()
        .with_number("C1", 5.0)
        .with_formula("B1", "=C1*2")
        .with_formula("A1", "=B1+1");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();

    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(11.0));
    // dependencies got cached along the way
    assert_eq!(s.is_dirty(&addr("B1")), Some(false));
    assert_eq!(s.evaluate(&addr("B1")).unwrap(), n(10.0));
}

#[test]
fn evaluation_is_memoized() {
    let (fns, calls) = TestFns::new();
    let wb = TestWorkbook::new()
        .with_number("B1", 3.0)
        .with_formula("A1", "=TICK(B1)+1");
    let mut s = Session::build_graph_with(&[addr("A1")], &wb, &fns).unwrap();

    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(4.0));
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(4.0));
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(4.0));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "formula must run once");
}

#[test]
fn set_value_invalidates_the_dependent_closure() {
    let wb = TestWorkbook::new()
        .with_number("C1", 5.0)
        .with_formula("B1", "=C1*2")
        .with_formula("A1", "=B1+1");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(11.0));

    s.set_value(&addr("C1"), n(7.0)).unwrap();
    assert_eq!(s.is_dirty(&addr("B1")), Some(true));
    assert_eq!(s.is_dirty(&addr("A1")), Some(true));
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(15.0));
}

#[test]
fn unchanged_set_value_does_not_invalidate() {
    let (fns, calls) = TestFns::new();
    let wb = TestWorkbook::new()
        .with_number("B1", 3.0)
        .with_formula("A1", "=TICK(B1)");
    let mut s = Session::build_graph_with(&[addr("A1")], &wb, &fns).unwrap();
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(3.0));

    s.set_value(&addr("B1"), n(3.0)).unwrap();
    assert_eq!(s.is_dirty(&addr("A1")), Some(false));
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(3.0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn writing_into_an_empty_cell_counts_as_a_change() {
    let wb = TestWorkbook::new().with_formula("A1", "=B1+1");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();
    // empty B1 coerces to 0
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(1.0));

    s.set_value(&addr("B1"), n(41.0)).unwrap();
    assert_eq!(s.is_dirty(&addr("A1")), Some(true));
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(42.0));
}

#[test]
fn two_cell_cycle_is_detected() {
    let wb = TestWorkbook::new()
        .with_formula("A1", "=B1")
        .with_formula("B1", "=A1");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();

    let err = s.evaluate(&addr("A1")).unwrap_err();
    assert!(
        matches!(err.root_cause(), EvalError::CycleDetected(_)),
        "got {err}"
    );
    // detection must not wedge the session
    let err = s.evaluate(&addr("A1")).unwrap_err();
    assert!(matches!(err.root_cause(), EvalError::CycleDetected(_)));
}

#[test]
fn self_reference_is_a_cycle() {
    let wb = TestWorkbook::new().with_formula("A1", "=A1+1");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();
    let err = s.evaluate(&addr("A1")).unwrap_err();
    assert!(matches!(err.root_cause(), EvalError::CycleDetected(_)));
}

#[test]
fn acyclic_region_of_a_cyclic_graph_still_evaluates() {
    let wb = TestWorkbook::new()
        .with_formula("A1", "=B1")
        .with_formula("B1", "=A1")
        .with_number("C1", 9.0)
        .with_formula("D1", "=C1+1");
    let mut s = Session::build_graph(&[addr("A1"), addr("D1")], &wb).unwrap();

    assert!(s.evaluate(&addr("A1")).is_err());
    assert_eq!(s.evaluate(&addr("D1")).unwrap(), n(10.0));
}

#[test]
fn range_sum_and_invalidation_through_the_range() {
    let wb = TestWorkbook::new()
        .with_number("A1", 1.0)
        .with_number("A2", 2.0)
        .with_number("A3", 3.0)
        .with_formula("B1", "=SUM(A1:A3)");
    let mut s = Session::build_graph(&[addr("B1")], &wb).unwrap();
    assert_eq!(s.evaluate(&addr("B1")).unwrap(), n(6.0));

    // the range node passes invalidation from member to consumer
    s.set_value(&addr("A2"), n(20.0)).unwrap();
    assert_eq!(s.is_dirty(&addr("B1")), Some(true));
    assert_eq!(s.evaluate(&addr("B1")).unwrap(), n(24.0));

    // the range node itself exists and names its members
    assert!(s.contains(&range_addr("A1:A3")));
    let deps = s.dependents_of(&addr("A2")).unwrap();
    assert_eq!(deps, vec![range_addr("A1:A3")]);
}

#[test]
fn index_only_forces_the_touched_member() {
    let (fns, calls) = TestFns::new();
    // A1 is expensive; INDEX(B) never looks at it
    let wb = TestWorkbook::new()
        .with_formula("A1", "=TICK(10)")
        .with_formula("A2", "=TICK(20)")
        .with_formula("B1", "=INDEX(A1:A2,2)");
    let mut s = Session::build_graph_with(&[addr("B1")], &wb, &fns).unwrap();

    assert_eq!(s.evaluate(&addr("B1")).unwrap(), LiteralValue::Int(20));
    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "only the indexed member may evaluate"
    );
    assert_eq!(s.is_dirty(&addr("A1")), Some(true), "A1 stays unevaluated");
}

#[test]
fn zero_argument_function() {
    let (fns, _) = TestFns::new();
    let wb = TestWorkbook::new().with_formula("A1", "=SEVEN()+1");
    let mut s = Session::build_graph_with(&[addr("A1")], &wb, &fns).unwrap();
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(8.0));
}

#[test]
fn build_reports_the_offending_cell() {
    let wb = TestWorkbook::new()
        .with_formula("A1", "=B1+1")
        .with_formula("B1", "=NOPE(1)");
    let err = Session::build_graph(&[addr("A1")], &wb).unwrap_err();
    let GraphBuildError::Formula {
        address, formula, ..
    } = err
    else {
        panic!("expected formula error");
    };
    assert_eq!(address, addr("B1"));
    assert_eq!(formula, "=NOPE(1)");
}

#[test]
fn division_by_zero_surfaces_with_location() {
    let wb = TestWorkbook::new()
        .with_number("B1", 0.0)
        .with_formula("A1", "=1/B1");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();

    let err = s.evaluate(&addr("A1")).unwrap_err();
    let EvalError::Inner {
        address, source, ..
    } = &err
    else {
        panic!("expected located error, got {err}");
    };
    assert_eq!(*address, addr("A1"));
    assert!(
        matches!(source.as_ref(), EvalError::Value(e) if e.kind == CellErrorKind::Div)
    );

    // the failure is reproducible, not swallowed by the cache
    assert!(s.evaluate(&addr("A1")).is_err());
}

#[test]
fn error_literal_propagates_as_a_value_error() {
    let wb = TestWorkbook::new()
        .with_value("B1", LiteralValue::Error(CellError::new(CellErrorKind::Na)))
        .with_formula("A1", "=B1+1");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();
    let err = s.evaluate(&addr("A1")).unwrap_err();
    assert!(
        matches!(err.root_cause(), EvalError::Value(e) if e.kind == CellErrorKind::Na)
    );
}

#[test]
fn reset_drops_the_cache_and_recomputes() {
    let (fns, calls) = TestFns::new();
    let wb = TestWorkbook::new()
        .with_number("B1", 3.0)
        .with_formula("A1", "=TICK(B1)");
    let mut s = Session::build_graph_with(&[addr("A1")], &wb, &fns).unwrap();

    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(3.0));
    s.reset(&addr("A1")).unwrap();
    assert_eq!(s.is_dirty(&addr("A1")), Some(true));
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(3.0));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn reset_clears_stored_inputs_too() {
    let wb = TestWorkbook::new()
        .with_number("B1", 10.0)
        .with_formula("A1", "=B1+1");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(11.0));

    // a reset input reads as Empty until something writes it again
    s.reset(&addr("B1")).unwrap();
    assert_eq!(s.evaluate(&addr("B1")).unwrap(), LiteralValue::Empty);
    assert_eq!(s.is_dirty(&addr("A1")), Some(true));
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(1.0));

    s.set_value(&addr("B1"), n(10.0)).unwrap();
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(11.0));
}

#[test]
fn unknown_address_is_an_error() {
    let wb = TestWorkbook::new().with_number("A1", 1.0);
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();
    assert!(matches!(
        s.evaluate(&addr("Z99")),
        Err(EvalError::UnknownAddress(_))
    ));
    assert!(matches!(
        s.set_value(&addr("Z99"), n(1.0)),
        Err(EvalError::UnknownAddress(_))
    ));
}

#[test]
fn conditional_takes_the_live_branch() {
    let wb = TestWorkbook::new()
        .with_number("A1", 15.0)
        .with_formula("B1", "=IF(A1>10,\"big\",\"small\")");
    let mut s = Session::build_graph(&[addr("B1")], &wb).unwrap();
    assert_eq!(
        s.evaluate(&addr("B1")).unwrap(),
        LiteralValue::Text("big".to_string())
    );

    s.set_value(&addr("A1"), n(2.0)).unwrap();
    assert_eq!(
        s.evaluate(&addr("B1")).unwrap(),
        LiteralValue::Text("small".to_string())
    );
}

#[test]
fn cross_sheet_references_resolve() {
    let wb = TestWorkbook::new()
        .with_cell_on(
            "Data",
            "A1",
            cellgraph_eval::CellSnapshot::value(n(100.0)),
        )
        .with_formula("A1", "=Data!A1/4");
    let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();
    assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(25.0));
}

#[test]
fn evaluating_a_range_materializes_an_array() {
    let wb = TestWorkbook::new()
        .with_number("A1", 1.0)
        .with_number("A2", 2.0)
        .with_formula("B1", "=SUM(A1:A2)");
    let mut s = Session::build_graph(&[addr("B1")], &wb).unwrap();

    let value = s.evaluate(&range_addr("A1:A2")).unwrap();
    assert_eq!(
        value,
        LiteralValue::Array(vec![vec![n(1.0)], vec![n(2.0)]])
    );
}

proptest! {
    /// Whatever sequence of writes hits the input, a dependent formula
    /// always reflects the latest value on its next evaluation.
    #[test]
    fn evaluation_tracks_every_input_write(
        writes in prop::collection::vec(-1000i64..1000, 1..16),
    ) {
        let wb = TestWorkbook::new()
            .with_number("B1", 0.0)
            .with_formula("A1", "=B1+1");
        let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();

        for w in writes {
            s.set_value(&addr("B1"), n(w as f64)).unwrap();
            prop_assert_eq!(s.evaluate(&addr("A1")).unwrap(), n(w as f64 + 1.0));
        }
    }

    /// Resetting an already-evaluated cell never changes what it
    /// recomputes to.
    #[test]
    fn reset_is_value_stable(seed in -1000i64..1000) {
        let wb = TestWorkbook::new()
            .with_number("B1", seed as f64)
            .with_formula("A1", "=B1*2");
        let mut s = Session::build_graph(&[addr("A1")], &wb).unwrap();

        let first = s.evaluate(&addr("A1")).unwrap();
        s.reset(&addr("A1")).unwrap();
        prop_assert_eq!(s.evaluate(&addr("A1")).unwrap(), first);
    }
}

#[test]
fn concat_and_comparison_operators() {
    let wb = TestWorkbook::new()
        .with_value("A1", LiteralValue::Text("ab".to_string()))
        .with_formula("B1", "=\"a\"&\"b\"=A1")
        .with_formula("C1", "=50%*200");
    let mut s = Session::build_graph(&[addr("B1"), addr("C1")], &wb).unwrap();
    assert_eq!(s.evaluate(&addr("B1")).unwrap(), LiteralValue::Boolean(true));
    assert_eq!(s.evaluate(&addr("C1")).unwrap(), n(100.0));
}
