//! Constant nodes.

use std::sync::Arc;

use crate::graph::RecomputeCtx;
use crate::incr::{finish_node, ErasedNode, Incr, Recomputed, TypedNode, Value};
use crate::node::{NodeKind, NodeMeta};
use crate::scope::Scope;
use crate::StabilizeError;

/// Create a node that always holds `value`.
///
/// The node is recomputed once, the first time it becomes necessary, and
/// never changes afterwards.
pub fn constant<T: Value>(scope: impl Into<Scope>, value: T) -> Incr<T> {
    let scope = scope.into();
    let node = Arc::new(ConstantNode {
        meta: NodeMeta::new(NodeKind::Constant, &scope),
        value,
    });
    let (node, erased) = finish_node(node, &scope);
    Incr::from_parts(node, erased)
}

struct ConstantNode<T: Value> {
    meta: NodeMeta,
    value: T,
}

impl<T: Value> ErasedNode for ConstantNode<T> {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        Ok(Recomputed::Changed)
    }

    fn is_stale(&self) -> bool {
        self.meta.recomputed_at() == 0
    }
}

impl<T: Value> TypedNode<T> for ConstantNode<T> {
    fn read(&self) -> T {
        self.value.clone()
    }
}
