//! Pure transformation nodes.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::RecomputeCtx;
use crate::incr::{
    finish_node, link_new, AsIncr, ErasedNode, Incr, Recomputed, TypedNode, Value,
};
use crate::node::{NodeKind, NodeMeta};
use crate::scope::Scope;
use crate::StabilizeError;

/// Apply `f` to an input incremental, producing a new incremental of the
/// function's output type.
pub fn map<A, B, F>(scope: impl Into<Scope>, input: impl AsIncr<A>, f: F) -> Incr<B>
where
    A: Value,
    B: Value,
    F: Fn(&A) -> B + Send + Sync + 'static,
{
    let scope = scope.into();
    let input = input.as_incr();
    let node = Arc::new(MapNode {
        meta: NodeMeta::new(NodeKind::Map, &scope),
        input: input.clone(),
        f,
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, input.erased());
    Incr::from_parts(node, erased)
}

struct MapNode<A: Value, B: Value, F> {
    meta: NodeMeta,
    input: Incr<A>,
    f: F,
    value: Mutex<Option<B>>,
}

impl<A, B, F> ErasedNode for MapNode<A, B, F>
where
    A: Value,
    B: Value,
    F: Fn(&A) -> B + Send + Sync + 'static,
{
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let value = (self.f)(&self.input.value());
        *self.value.lock() = Some(value);
        Ok(Recomputed::Changed)
    }
}

impl<A, B, F> TypedNode<B> for MapNode<A, B, F>
where
    A: Value,
    B: Value,
    F: Fn(&A) -> B + Send + Sync + 'static,
{
    fn read(&self) -> B {
        self.value.lock().clone().unwrap_or_default()
    }
}

/// Apply a binary function to two input incrementals.
pub fn map2<A, B, C, F>(
    scope: impl Into<Scope>,
    a: impl AsIncr<A>,
    b: impl AsIncr<B>,
    f: F,
) -> Incr<C>
where
    A: Value,
    B: Value,
    C: Value,
    F: Fn(&A, &B) -> C + Send + Sync + 'static,
{
    let scope = scope.into();
    let a = a.as_incr();
    let b = b.as_incr();
    let node = Arc::new(Map2Node {
        meta: NodeMeta::new(NodeKind::Map2, &scope),
        a: a.clone(),
        b: b.clone(),
        f,
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, a.erased());
    link_new(&erased, b.erased());
    Incr::from_parts(node, erased)
}

struct Map2Node<A: Value, B: Value, C: Value, F> {
    meta: NodeMeta,
    a: Incr<A>,
    b: Incr<B>,
    f: F,
    value: Mutex<Option<C>>,
}

impl<A, B, C, F> ErasedNode for Map2Node<A, B, C, F>
where
    A: Value,
    B: Value,
    C: Value,
    F: Fn(&A, &B) -> C + Send + Sync + 'static,
{
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let value = (self.f)(&self.a.value(), &self.b.value());
        *self.value.lock() = Some(value);
        Ok(Recomputed::Changed)
    }
}

impl<A, B, C, F> TypedNode<C> for Map2Node<A, B, C, F>
where
    A: Value,
    B: Value,
    C: Value,
    F: Fn(&A, &B) -> C + Send + Sync + 'static,
{
    fn read(&self) -> C {
        self.value.lock().clone().unwrap_or_default()
    }
}

/// Apply a ternary function to three input incrementals.
pub fn map3<A, B, C, D, F>(
    scope: impl Into<Scope>,
    a: impl AsIncr<A>,
    b: impl AsIncr<B>,
    c: impl AsIncr<C>,
    f: F,
) -> Incr<D>
where
    A: Value,
    B: Value,
    C: Value,
    D: Value,
    F: Fn(&A, &B, &C) -> D + Send + Sync + 'static,
{
    let scope = scope.into();
    let a = a.as_incr();
    let b = b.as_incr();
    let c = c.as_incr();
    let node = Arc::new(Map3Node {
        meta: NodeMeta::new(NodeKind::Map3, &scope),
        a: a.clone(),
        b: b.clone(),
        c: c.clone(),
        f,
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, a.erased());
    link_new(&erased, b.erased());
    link_new(&erased, c.erased());
    Incr::from_parts(node, erased)
}

struct Map3Node<A: Value, B: Value, C: Value, D: Value, F> {
    meta: NodeMeta,
    a: Incr<A>,
    b: Incr<B>,
    c: Incr<C>,
    f: F,
    value: Mutex<Option<D>>,
}

impl<A, B, C, D, F> ErasedNode for Map3Node<A, B, C, D, F>
where
    A: Value,
    B: Value,
    C: Value,
    D: Value,
    F: Fn(&A, &B, &C) -> D + Send + Sync + 'static,
{
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let value = (self.f)(&self.a.value(), &self.b.value(), &self.c.value());
        *self.value.lock() = Some(value);
        Ok(Recomputed::Changed)
    }
}

impl<A, B, C, D, F> TypedNode<D> for Map3Node<A, B, C, D, F>
where
    A: Value,
    B: Value,
    C: Value,
    D: Value,
    F: Fn(&A, &B, &C) -> D + Send + Sync + 'static,
{
    fn read(&self) -> D {
        self.value.lock().clone().unwrap_or_default()
    }
}

/// Select between two incrementals based on a boolean condition node.
///
/// The value tracks `a` while the condition holds and `b` otherwise. All
/// three inputs stay necessary; for swapping whole subgraphs in and out
/// use [`bind`](crate::bind).
pub fn map_if<T>(
    scope: impl Into<Scope>,
    a: impl AsIncr<T>,
    b: impl AsIncr<T>,
    cond: impl AsIncr<bool>,
) -> Incr<T>
where
    T: Value,
{
    let scope = scope.into();
    let a = a.as_incr();
    let b = b.as_incr();
    let cond = cond.as_incr();
    let node = Arc::new(MapIfNode {
        meta: NodeMeta::new(NodeKind::MapIf, &scope),
        a: a.clone(),
        b: b.clone(),
        cond: cond.clone(),
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, a.erased());
    link_new(&erased, b.erased());
    link_new(&erased, cond.erased());
    Incr::from_parts(node, erased)
}

struct MapIfNode<T: Value> {
    meta: NodeMeta,
    a: Incr<T>,
    b: Incr<T>,
    cond: Incr<bool>,
    value: Mutex<Option<T>>,
}

impl<T: Value> ErasedNode for MapIfNode<T> {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let value = if self.cond.value() {
            self.a.value()
        } else {
            self.b.value()
        };
        *self.value.lock() = Some(value);
        Ok(Recomputed::Changed)
    }
}

impl<T: Value> TypedNode<T> for MapIfNode<T> {
    fn read(&self) -> T {
        self.value.lock().clone().unwrap_or_default()
    }
}
