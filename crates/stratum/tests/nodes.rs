//! Behavior of the node catalog: cutoffs, folds, watch, freeze, always
//! and func sources.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use stratum::{
    always, constant, cutoff, cutoff2, fold_left, fold_map, fold_right, freeze, func, map, map2,
    map3, var, Graph,
};

fn approx_eq(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

#[test]
fn test_cutoff_epsilon() {
    let g = Graph::new();

    let input = var(&g, 3.14f64);
    let c = cutoff(&g, &input, |old: &f64, new: &f64| (new - old).abs() <= 0.1);
    let ten = constant(&g, 10.0f64);
    let out = map2(&g, &c, &ten, |a: &f64, b: &f64| a + b);

    let _o = g.observe(&out).unwrap();

    g.stabilize().unwrap();
    approx_eq(out.value(), 13.14);

    // within epsilon: suppressed
    input.set(3.15);
    g.stabilize().unwrap();
    approx_eq(out.value(), 13.14);

    // past epsilon, measured from the last propagated value
    input.set(3.26);
    g.stabilize().unwrap();
    approx_eq(out.value(), 13.26);
}

#[test]
fn test_cutoff_suppresses_descendant_recomputes() {
    let g = Graph::new();

    let input = var(&g, 1i64);
    let c = cutoff(&g, &input, |_old: &i64, _new: &i64| true);
    let out = map(&g, &c, |x: &i64| x + 1);

    let _o = g.observe(&out).unwrap();
    g.stabilize().unwrap();
    assert_eq!(out.node().num_recomputes(), 1);

    input.set(2);
    g.stabilize().unwrap();

    // the cutoff recomputed, its descendant did not
    assert_eq!(c.node().num_recomputes(), 2);
    assert_eq!(out.node().num_recomputes(), 1);
    assert_eq!(out.value(), 2);
}

#[test]
fn test_cutoff2_incremental_threshold() {
    let g = Graph::new();

    let epsilon = var(&g, 1.0f64);
    let input = var(&g, 10.0f64);
    let c = cutoff2(&g, &epsilon, &input, |eps: &f64, old: &f64, new: &f64| {
        (new - old).abs() <= *eps
    });

    let _o = g.observe(&c).unwrap();

    g.stabilize().unwrap();
    approx_eq(c.value(), 10.0);

    input.set(10.5);
    g.stabilize().unwrap();
    approx_eq(c.value(), 10.0);

    // tightening the threshold lets the same delta through
    epsilon.set(0.1);
    input.set(10.6);
    g.stabilize().unwrap();
    approx_eq(c.value(), 10.6);
}

#[test]
fn test_fold_left_and_right() {
    let g = Graph::new();

    let items = var(&g, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    let left = fold_left(&g, &items, String::new(), |acc, item: &String| {
        format!("{acc}{item}")
    });
    let right = fold_right(&g, &items, String::new(), |acc, item: &String| {
        format!("{acc}{item}")
    });

    let _ol = g.observe(&left).unwrap();
    let _or = g.observe(&right).unwrap();

    g.stabilize().unwrap();
    assert_eq!(left.value(), "abc");
    assert_eq!(right.value(), "cba");

    items.set(vec!["x".to_string(), "y".to_string()]);
    g.stabilize().unwrap();
    assert_eq!(left.value(), "xy");
    assert_eq!(right.value(), "yx");
}

#[test]
fn test_fold_map_in_key_order() {
    let g = Graph::new();

    let mut entries = BTreeMap::new();
    entries.insert("b".to_string(), 2i64);
    entries.insert("a".to_string(), 1i64);
    let input = var(&g, entries);

    let folded = fold_map(&g, &input, String::new(), |acc, key: &String, value: &i64| {
        format!("{acc}{key}={value};")
    });

    let _o = g.observe(&folded).unwrap();
    g.stabilize().unwrap();
    assert_eq!(folded.value(), "a=1;b=2;");

    let mut updated = BTreeMap::new();
    updated.insert("c".to_string(), 3i64);
    input.set(updated);
    g.stabilize().unwrap();
    assert_eq!(folded.value(), "c=3;");
}

#[test]
fn test_watch_records_history() {
    let g = Graph::new();

    let v = var(&g, "a".to_string());
    let w = stratum::watch(&g, &v);

    let _o = g.observe(&w).unwrap();

    g.stabilize().unwrap();
    v.set("b".to_string());
    g.stabilize().unwrap();
    // nothing changed; no new entry
    g.stabilize().unwrap();

    assert_eq!(w.value(), "b");
    assert_eq!(w.values(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_freeze_latches_first_value() {
    let g = Graph::new();

    let v = var(&g, 1i64);
    let f = freeze(&g, &v);
    let out = map(&g, &f, |x: &i64| x + 100);

    let _o = g.observe(&out).unwrap();

    g.stabilize().unwrap();
    assert_eq!(out.value(), 101);

    v.set(5);
    g.stabilize().unwrap();
    assert_eq!(f.value(), 1);
    assert_eq!(out.value(), 101);
    assert_eq!(out.node().num_recomputes(), 1);
    assert_eq!(v.value(), 5);
}

#[test]
fn test_always_recomputes_every_pass() {
    let g = Graph::new();

    let v = var(&g, "x".to_string());
    let a = always(&g, &v);
    let updates = Arc::new(AtomicU32::new(0));
    let seen = updates.clone();
    a.node().on_update(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let _o = g.observe(&a).unwrap();

    g.stabilize().unwrap();
    g.stabilize().unwrap();
    g.stabilize().unwrap();

    assert_eq!(a.node().num_recomputes(), 3);
    assert_eq!(updates.load(Ordering::SeqCst), 3);
}

#[test]
fn test_func_reruns_on_set_stale() {
    let g = Graph::new();

    let calls = Arc::new(AtomicU32::new(0));
    let f = {
        let calls = calls.clone();
        func(&g, move |_ctx| {
            Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
        })
    };

    let _o = g.observe(&f).unwrap();

    g.stabilize().unwrap();
    assert_eq!(f.value(), 1);

    // quiescent without a set_stale
    g.stabilize().unwrap();
    assert_eq!(f.value(), 1);

    g.set_stale(&f).unwrap();
    g.stabilize().unwrap();
    assert_eq!(f.value(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_func_sees_stabilization_context() {
    let g = Graph::new();

    let f = func(&g, |ctx| Ok(ctx.stabilization_num()));
    let _o = g.observe(&f).unwrap();

    g.stabilize().unwrap();
    assert_eq!(f.value(), 1);

    g.set_stale(&f).unwrap();
    g.stabilize().unwrap();
    assert_eq!(f.value(), 2);
}

#[test]
fn test_map3() {
    let g = Graph::new();

    let a = var(&g, 1i64);
    let b = var(&g, 2i64);
    let c = var(&g, 3i64);
    let sum = map3(&g, &a, &b, &c, |a: &i64, b: &i64, c: &i64| a + b + c);

    let _o = g.observe(&sum).unwrap();
    g.stabilize().unwrap();
    assert_eq!(sum.value(), 6);

    b.set(20);
    g.stabilize().unwrap();
    assert_eq!(sum.value(), 24);
}

#[test]
fn test_labels_flow_into_display() {
    let g = Graph::new();
    let v = var(&g, 0u64);
    v.node().set_label("my-input");
    assert_eq!(v.node().label().as_deref(), Some("my-input"));
    assert_eq!(format!("{:?}", v.node()), "my-input");
}
