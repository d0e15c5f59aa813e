//! Always nodes: recomputed on every stabilization.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::RecomputeCtx;
use crate::incr::{
    finish_node, link_new, AsIncr, ErasedNode, Incr, Recomputed, TypedNode, Value,
};
use crate::node::{NodeKind, NodeMeta};
use crate::scope::Scope;
use crate::StabilizeError;

/// Pass `input` through, recomputing on every pass whether or not
/// anything upstream changed. Useful for side-effecting listeners that
/// must observe every stabilization.
pub fn always<T: Value>(scope: impl Into<Scope>, input: impl AsIncr<T>) -> Incr<T> {
    let scope = scope.into();
    let input = input.as_incr();
    let node = Arc::new(AlwaysNode {
        meta: NodeMeta::new(NodeKind::Always, &scope),
        input: input.clone(),
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, input.erased());
    if let Some(graph) = scope.graph() {
        graph.always_nodes.lock().push(Arc::downgrade(&erased));
    }
    Incr::from_parts(node, erased)
}

struct AlwaysNode<T: Value> {
    meta: NodeMeta,
    input: Incr<T>,
    value: Mutex<Option<T>>,
}

impl<T: Value> ErasedNode for AlwaysNode<T> {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        *self.value.lock() = Some(self.input.value());
        Ok(Recomputed::Changed)
    }

    fn is_stale(&self) -> bool {
        true
    }
}

impl<T: Value> TypedNode<T> for AlwaysNode<T> {
    fn read(&self) -> T {
        self.value.lock().clone().unwrap_or_default()
    }
}
