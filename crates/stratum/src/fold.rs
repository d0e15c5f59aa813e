//! Fold nodes over incremental collections.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::RecomputeCtx;
use crate::incr::{
    finish_node, link_new, AsIncr, ErasedNode, Incr, Recomputed, TypedNode, Value,
};
use crate::node::{NodeKind, NodeMeta};
use crate::scope::Scope;
use crate::StabilizeError;

/// Fold an incremental vector left-to-right from `base`.
pub fn fold_left<T, B, F>(
    scope: impl Into<Scope>,
    input: impl AsIncr<Vec<T>>,
    base: B,
    f: F,
) -> Incr<B>
where
    T: Value,
    B: Value,
    F: Fn(B, &T) -> B + Send + Sync + 'static,
{
    fold_vec(scope.into(), input.as_incr(), base, f, Direction::Left)
}

/// Fold an incremental vector right-to-left from `base`.
pub fn fold_right<T, B, F>(
    scope: impl Into<Scope>,
    input: impl AsIncr<Vec<T>>,
    base: B,
    f: F,
) -> Incr<B>
where
    T: Value,
    B: Value,
    F: Fn(B, &T) -> B + Send + Sync + 'static,
{
    fold_vec(scope.into(), input.as_incr(), base, f, Direction::Right)
}

#[derive(Clone, Copy)]
enum Direction {
    Left,
    Right,
}

fn fold_vec<T, B, F>(scope: Scope, input: Incr<Vec<T>>, base: B, f: F, dir: Direction) -> Incr<B>
where
    T: Value,
    B: Value,
    F: Fn(B, &T) -> B + Send + Sync + 'static,
{
    let node = Arc::new(FoldVecNode {
        meta: NodeMeta::new(NodeKind::Fold, &scope),
        input: input.clone(),
        base,
        f,
        dir,
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, input.erased());
    Incr::from_parts(node, erased)
}

struct FoldVecNode<T: Value, B: Value, F> {
    meta: NodeMeta,
    input: Incr<Vec<T>>,
    base: B,
    f: F,
    dir: Direction,
    value: Mutex<Option<B>>,
}

impl<T, B, F> ErasedNode for FoldVecNode<T, B, F>
where
    T: Value,
    B: Value,
    F: Fn(B, &T) -> B + Send + Sync + 'static,
{
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let items = self.input.value();
        let mut acc = self.base.clone();
        match self.dir {
            Direction::Left => {
                for item in &items {
                    acc = (self.f)(acc, item);
                }
            }
            Direction::Right => {
                for item in items.iter().rev() {
                    acc = (self.f)(acc, item);
                }
            }
        }
        *self.value.lock() = Some(acc);
        Ok(Recomputed::Changed)
    }
}

impl<T, B, F> TypedNode<B> for FoldVecNode<T, B, F>
where
    T: Value,
    B: Value,
    F: Fn(B, &T) -> B + Send + Sync + 'static,
{
    fn read(&self) -> B {
        self.value.lock().clone().unwrap_or_default()
    }
}

/// Fold an incremental map in key order from `base`.
pub fn fold_map<K, V, B, F>(
    scope: impl Into<Scope>,
    input: impl AsIncr<BTreeMap<K, V>>,
    base: B,
    f: F,
) -> Incr<B>
where
    K: Value + Ord,
    V: Value,
    B: Value,
    F: Fn(B, &K, &V) -> B + Send + Sync + 'static,
{
    let scope = scope.into();
    let input = input.as_incr();
    let node = Arc::new(FoldMapNode {
        meta: NodeMeta::new(NodeKind::Fold, &scope),
        input: input.clone(),
        base,
        f,
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, input.erased());
    Incr::from_parts(node, erased)
}

struct FoldMapNode<K: Value + Ord, V: Value, B: Value, F> {
    meta: NodeMeta,
    input: Incr<BTreeMap<K, V>>,
    base: B,
    f: F,
    value: Mutex<Option<B>>,
}

impl<K, V, B, F> ErasedNode for FoldMapNode<K, V, B, F>
where
    K: Value + Ord,
    V: Value,
    B: Value,
    F: Fn(B, &K, &V) -> B + Send + Sync + 'static,
{
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let entries = self.input.value();
        let mut acc = self.base.clone();
        for (key, value) in &entries {
            acc = (self.f)(acc, key, value);
        }
        *self.value.lock() = Some(acc);
        Ok(Recomputed::Changed)
    }
}

impl<K, V, B, F> TypedNode<B> for FoldMapNode<K, V, B, F>
where
    K: Value + Ord,
    V: Value,
    B: Value,
    F: Fn(B, &K, &V) -> B + Send + Sync + 'static,
{
    fn read(&self) -> B {
        self.value.lock().clone().unwrap_or_default()
    }
}
