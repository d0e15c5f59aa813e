//! Dynamic graph mutation through binds: splicing, necessity handoff,
//! nesting and the tuple conveniences.

use stratum::{
    bind, bind2, bind3, bind4, bind_if, bind_opt, constant, map, var, Graph, NodeKind,
};

#[test]
fn test_bind_swaps_subgraphs() {
    let g = Graph::new();

    let sw = var(&g, false);
    let i0 = constant(&g, "foo".to_string());
    i0.node().set_label("i0");
    let m0 = map(&g, &i0, |v: &String| format!("{v}-moo"));
    m0.node().set_label("m0");
    let i1 = constant(&g, "bar".to_string());
    i1.node().set_label("i1");
    let m1 = map(&g, &i1, |v: &String| format!("{v}-loo"));
    m1.node().set_label("m1");

    let b = {
        let m0 = m0.clone();
        let m1 = m1.clone();
        bind(&g, &sw, move |_s, swv: &bool| {
            if *swv {
                m0.clone()
            } else {
                m1.clone()
            }
        })
    };
    let mb = map(&g, &b, |v: &String| format!("{v}-baz"));
    mb.node().set_label("mb");

    let _o = g.observe(&mb).unwrap();

    assert!(g.has(&sw));

    g.stabilize().unwrap();

    // only the chosen branch is in the graph
    assert!(!g.has(&i0));
    assert!(!g.has(&m0));
    assert!(g.has(&i1));
    assert!(g.has(&m1));
    assert!(m1.node().is_necessary());

    assert_eq!(mb.value(), "bar-loo-baz");

    sw.set(true);
    assert!(g.is_pending(&sw));
    assert_eq!(g.recompute_heap_len(), 1);

    g.stabilize().unwrap();

    assert!(g.has(&i0));
    assert!(g.has(&m0));
    assert!(i0.node().is_necessary());
    assert!(m0.node().is_necessary());
    assert!(!g.has(&i1));
    assert!(!g.has(&m1));

    assert_eq!(mb.value(), "foo-moo-baz");
}

#[test]
fn test_bind_scope_nodes_are_fresh_per_invocation() {
    let g = Graph::new();

    let source = var(&g, "i".to_string());
    let sw = var(&g, false);
    let b = {
        let source = source.clone();
        bind(&g, &sw, move |s, flag: &bool| {
            if *flag {
                map(s, &source, |v: &String| format!("{v}-t"))
            } else {
                map(s, &source, |v: &String| format!("{v}-f"))
            }
        })
    };

    let o = g.observe(&b).unwrap();

    g.stabilize().unwrap();
    assert_eq!(o.value(), "i-f");

    sw.set(true);
    g.stabilize().unwrap();
    assert_eq!(o.value(), "i-t");

    // the swapped-out map no longer participates; only the live branch
    // reacts to the source
    source.set("j".to_string());
    g.stabilize().unwrap();
    assert_eq!(o.value(), "j-t");
}

#[test]
fn test_bind_if() {
    let g = Graph::new();

    let sw = var(&g, false);
    let i0 = constant(&g, "foo".to_string());
    let i1 = constant(&g, "bar".to_string());

    let b = {
        let i0 = i0.clone();
        let i1 = i1.clone();
        bind_if(&g, &sw, move |_ctx, _s, swv| {
            Ok(if swv { i0.clone() } else { i1.clone() })
        })
    };

    let _o = g.observe(&b).unwrap();

    g.stabilize().unwrap();
    assert_eq!(b.value(), "bar");

    sw.set(true);
    g.stabilize().unwrap();
    assert_eq!(b.value(), "foo");
}

#[test]
fn test_bind2() {
    let g = Graph::new();

    let v0 = var(&g, "a".to_string());
    let v1 = var(&g, "b".to_string());

    let b2 = bind2(&g, &v0, &v1, |s, a: &String, b: &String| {
        constant(s, format!("{a}{b}"))
    });
    assert_eq!(b2.node().kind(), NodeKind::Bind2);
    assert_eq!(b2.node().kind().as_str(), "bind2");

    let o = g.observe(&b2).unwrap();
    g.stabilize().unwrap();
    assert_eq!(o.value(), "ab");

    v0.set("xa".to_string());
    g.stabilize().unwrap();
    assert_eq!(o.value(), "xab");

    v1.set("xb".to_string());
    g.stabilize().unwrap();
    assert_eq!(o.value(), "xaxb");
}

#[test]
fn test_bind3() {
    let g = Graph::new();

    let v0 = var(&g, "a".to_string());
    let v1 = var(&g, "b".to_string());
    let v2 = var(&g, "c".to_string());

    let b3 = bind3(&g, &v0, &v1, &v2, |s, a: &String, b: &String, c: &String| {
        constant(s, format!("{a}{b}{c}"))
    });
    assert_eq!(b3.node().kind(), NodeKind::Bind3);

    let o = g.observe(&b3).unwrap();
    g.stabilize().unwrap();
    assert_eq!(o.value(), "abc");

    v0.set("xa".to_string());
    g.stabilize().unwrap();
    assert_eq!(o.value(), "xabc");

    v1.set("xb".to_string());
    g.stabilize().unwrap();
    assert_eq!(o.value(), "xaxbc");

    v2.set("xc".to_string());
    g.stabilize().unwrap();
    assert_eq!(o.value(), "xaxbxc");
}

#[test]
fn test_bind4() {
    let g = Graph::new();

    let v0 = var(&g, "a".to_string());
    let v1 = var(&g, "b".to_string());
    let v2 = var(&g, "c".to_string());
    let v3 = var(&g, "d".to_string());

    let b4 = bind4(
        &g,
        &v0,
        &v1,
        &v2,
        &v3,
        |s, a: &String, b: &String, c: &String, d: &String| constant(s, format!("{a}{b}{c}{d}")),
    );
    assert_eq!(b4.node().kind(), NodeKind::Bind4);

    let o = g.observe(&b4).unwrap();
    g.stabilize().unwrap();
    assert_eq!(o.value(), "abcd");

    v2.set("xc".to_string());
    g.stabilize().unwrap();
    assert_eq!(o.value(), "abxcd");
}

#[test]
fn test_bind_nested() {
    let g = Graph::new();

    let outer_sw = var(&g, false);
    let inner_sw = var(&g, false);

    let b = {
        let inner_sw = inner_sw.clone();
        bind(&g, &outer_sw, move |s, ov: &bool| {
            if *ov {
                constant(s, "outer-true".to_string())
            } else {
                bind(s, &inner_sw, move |s2, iv: &bool| {
                    if *iv {
                        constant(s2, "ib".to_string())
                    } else {
                        constant(s2, "ia".to_string())
                    }
                })
            }
        })
    };

    let o = g.observe(&b).unwrap();

    g.stabilize().unwrap();
    assert_eq!(o.value(), "ia");

    inner_sw.set(true);
    g.stabilize().unwrap();
    assert_eq!(o.value(), "ib");

    outer_sw.set(true);
    g.stabilize().unwrap();
    assert_eq!(o.value(), "outer-true");
    assert!(!g.has(&inner_sw));

    outer_sw.set(false);
    g.stabilize().unwrap();
    assert!(g.has(&inner_sw));
}

#[test]
fn test_bind_opt_absent_rhs() {
    let g = Graph::new();

    let src = var(&g, 0i64);
    let base = var(&g, 7i64);
    let b = {
        let base = base.clone();
        bind_opt(&g, &src, move |s, v: &i64| {
            if *v > 0 {
                let factor = *v;
                Some(map(s, &base, move |x: &i64| x * factor))
            } else {
                None
            }
        })
    };

    let o = g.observe(&b).unwrap();

    g.stabilize().unwrap();
    assert_eq!(o.value(), 0);

    src.set(3);
    g.stabilize().unwrap();
    assert_eq!(o.value(), 21);
    assert!(g.has(&base));

    src.set(0);
    g.stabilize().unwrap();
    assert_eq!(o.value(), 0);
    assert!(!g.has(&base));
}

#[test]
fn test_bind_stamps_bound_at() {
    let g = Graph::new();

    let sw = var(&g, false);
    let b = bind(&g, &sw, |s, swv: &bool| constant(s, i64::from(*swv)));
    let _o = g.observe(&b).unwrap();

    g.stabilize().unwrap();
    assert_eq!(b.node().bound_at(), 1);

    sw.set(true);
    g.stabilize().unwrap();
    assert_eq!(b.node().bound_at(), 2);
    assert_eq!(b.value(), 1);
}
