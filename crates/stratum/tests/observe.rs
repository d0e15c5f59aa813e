//! Observation and necessity: linking, unlinking and the ref-counted
//! activation of ancestors.

use stratum::{map, map2, var, Graph};

#[test]
fn test_two_independent_observers() {
    let g = Graph::new();

    let v0 = var(&g, "h0".to_string());
    let v1 = var(&g, "h1".to_string());
    let m0 = map(&g, &v0, |v: &String| v.clone());
    let m1 = map(&g, &v1, |v: &String| v.clone());

    let o0 = g.observe(&m0).unwrap();
    let o1 = g.observe(&m1).unwrap();

    g.stabilize().unwrap();
    assert_eq!(o0.value(), "h0");
    assert_eq!(o1.value(), "h1");

    o1.unobserve();
    assert!(!g.is_observing(&m1));

    v0.set("not h0".to_string());
    v1.set("not h1".to_string());

    // the unobserved branch is not even enqueued
    assert_eq!(g.recompute_heap_len(), 1);

    g.stabilize().unwrap();
    assert_eq!(o0.value(), "not h0");
    assert_eq!(o1.value(), "");
    assert_eq!(m1.node().num_recomputes(), 1);
}

#[test]
fn test_observe_then_unobserve_restores_counts() {
    let g = Graph::new();

    let v = var(&g, 1u64);
    let m = map(&g, &v, |x: &u64| x + 1);
    assert_eq!(g.num_nodes(), 0);

    let o = g.observe(&m).unwrap();
    // var, map, observer
    assert_eq!(g.num_nodes(), 3);
    assert!(g.is_observing(&m));
    assert!(g.is_observing(&v));

    o.unobserve();
    assert_eq!(g.num_nodes(), 0);
    assert!(!g.is_observing(&m));
    assert!(!g.is_observing(&v));
    assert_eq!(g.recompute_heap_len(), 0);

    // stabilizing the empty graph afterwards is harmless
    g.stabilize().unwrap();
}

#[test]
fn test_diamond_keeps_shared_ancestor_necessary() {
    let g = Graph::new();

    let a = var(&g, 1u64);
    let left = map(&g, &a, |x: &u64| x + 1);
    let right = map(&g, &a, |x: &u64| x * 2);
    let z = map2(&g, &left, &right, |l: &u64, r: &u64| l + r);

    let o_left = g.observe(&left).unwrap();
    let o_z = g.observe(&z).unwrap();

    g.stabilize().unwrap();
    assert_eq!(o_z.value(), 4);

    // dropping one path leaves the shared ancestor necessary via the other
    o_z.unobserve();
    assert!(g.is_observing(&a));
    assert!(g.is_observing(&left));
    assert!(!g.is_observing(&right));
    assert!(!g.is_observing(&z));

    a.set(10);
    g.stabilize().unwrap();
    assert_eq!(o_left.value(), 11);
}

#[test]
fn test_multiple_observers_on_one_node() {
    let g = Graph::new();

    let v = var(&g, 5u64);
    let m = map(&g, &v, |x: &u64| x * x);

    let o0 = g.observe(&m).unwrap();
    let o1 = g.observe(&m).unwrap();

    g.stabilize().unwrap();
    assert_eq!(o0.value(), 25);
    assert_eq!(o1.value(), 25);

    // still observed after one of the two detaches
    o0.unobserve();
    assert!(g.is_observing(&m));
    assert!(g.is_observing(&v));

    v.set(6);
    g.stabilize().unwrap();
    assert_eq!(o1.value(), 36);

    o1.unobserve();
    assert!(!g.is_observing(&m));
    assert_eq!(g.num_nodes(), 0);
}

#[test]
fn test_observer_value_reads_through() {
    let g = Graph::new();

    let v = var(&g, 2u64);
    let o = g.observe(&v).unwrap();

    // before the first pass the var already holds its value
    assert_eq!(o.value(), 2);
    g.stabilize().unwrap();
    assert_eq!(o.value(), 2);

    v.set(3);
    assert_eq!(o.value(), 3);
}

#[test]
fn test_height_validity_across_operations() {
    let g = Graph::new();

    let a = var(&g, 1u64);
    let b = map(&g, &a, |x: &u64| x + 1);
    let c = map2(&g, &a, &b, |a: &u64, b: &u64| a + b);
    let o = g.observe(&c).unwrap();

    g.stabilize().unwrap();
    a.set(2);
    g.stabilize().unwrap();
    assert_eq!(o.value(), 5);

    // every dependency sits strictly below its dependents
    assert!(a.node().height() < b.node().height());
    assert!(b.node().height() < c.node().height());
    assert!(c.node().height() < o.node().height());
}
