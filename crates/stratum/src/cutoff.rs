//! Cutoff nodes: user predicates that stop change propagation.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::RecomputeCtx;
use crate::incr::{
    finish_node, link_new, AsIncr, ErasedNode, Incr, Recomputed, TypedNode, Value,
};
use crate::node::{NodeKind, NodeMeta};
use crate::scope::Scope;
use crate::StabilizeError;

/// Wrap `input` with a cutoff predicate.
///
/// Whenever the input changes, `f(old, new)` decides whether the change
/// is worth propagating: returning true treats the recomputation as
/// value-unchanged, dependents are not enqueued, and the node keeps `old`
/// as the comparison base for the next change.
pub fn cutoff<T, F>(scope: impl Into<Scope>, input: impl AsIncr<T>, f: F) -> Incr<T>
where
    T: Value,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    let scope = scope.into();
    let input = input.as_incr();
    let node = Arc::new(CutoffNode {
        meta: NodeMeta::new(NodeKind::Cutoff, &scope),
        input: input.clone(),
        f,
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, input.erased());
    Incr::from_parts(node, erased)
}

struct CutoffNode<T: Value, F> {
    meta: NodeMeta,
    input: Incr<T>,
    f: F,
    value: Mutex<Option<T>>,
}

impl<T, F> ErasedNode for CutoffNode<T, F>
where
    T: Value,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let new = self.input.value();
        let mut value = self.value.lock();
        match &*value {
            Some(old) if (self.f)(old, &new) => Ok(Recomputed::Unchanged),
            _ => {
                *value = Some(new);
                Ok(Recomputed::Changed)
            }
        }
    }
}

impl<T, F> TypedNode<T> for CutoffNode<T, F>
where
    T: Value,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    fn read(&self) -> T {
        self.value.lock().clone().unwrap_or_default()
    }
}

/// A cutoff whose predicate also reads an auxiliary input, typically a
/// threshold that is itself incremental.
pub fn cutoff2<E, T, F>(
    scope: impl Into<Scope>,
    epsilon: impl AsIncr<E>,
    input: impl AsIncr<T>,
    f: F,
) -> Incr<T>
where
    E: Value,
    T: Value,
    F: Fn(&E, &T, &T) -> bool + Send + Sync + 'static,
{
    let scope = scope.into();
    let epsilon = epsilon.as_incr();
    let input = input.as_incr();
    let node = Arc::new(Cutoff2Node {
        meta: NodeMeta::new(NodeKind::Cutoff2, &scope),
        epsilon: epsilon.clone(),
        input: input.clone(),
        f,
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, epsilon.erased());
    link_new(&erased, input.erased());
    Incr::from_parts(node, erased)
}

struct Cutoff2Node<E: Value, T: Value, F> {
    meta: NodeMeta,
    epsilon: Incr<E>,
    input: Incr<T>,
    f: F,
    value: Mutex<Option<T>>,
}

impl<E, T, F> ErasedNode for Cutoff2Node<E, T, F>
where
    E: Value,
    T: Value,
    F: Fn(&E, &T, &T) -> bool + Send + Sync + 'static,
{
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let new = self.input.value();
        let epsilon = self.epsilon.value();
        let mut value = self.value.lock();
        match &*value {
            Some(old) if (self.f)(&epsilon, old, &new) => Ok(Recomputed::Unchanged),
            _ => {
                *value = Some(new);
                Ok(Recomputed::Changed)
            }
        }
    }
}

impl<E, T, F> TypedNode<T> for Cutoff2Node<E, T, F>
where
    E: Value,
    T: Value,
    F: Fn(&E, &T, &T) -> bool + Send + Sync + 'static,
{
    fn read(&self) -> T {
        self.value.lock().clone().unwrap_or_default()
    }
}
