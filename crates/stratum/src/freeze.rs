//! Freeze nodes: a permanent cutoff after the first computed value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::RecomputeCtx;
use crate::incr::{
    finish_node, link_new, AsIncr, ErasedNode, Incr, Recomputed, TypedNode, Value,
};
use crate::node::{NodeKind, NodeMeta};
use crate::scope::Scope;
use crate::StabilizeError;

/// Latch onto the first value `input` produces and never change again.
pub fn freeze<T: Value>(scope: impl Into<Scope>, input: impl AsIncr<T>) -> Incr<T> {
    let scope = scope.into();
    let input = input.as_incr();
    let node = Arc::new(FreezeNode {
        meta: NodeMeta::new(NodeKind::Freeze, &scope),
        input: input.clone(),
        frozen: AtomicBool::new(false),
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, input.erased());
    Incr::from_parts(node, erased)
}

struct FreezeNode<T: Value> {
    meta: NodeMeta,
    input: Incr<T>,
    frozen: AtomicBool,
    value: Mutex<Option<T>>,
}

impl<T: Value> ErasedNode for FreezeNode<T> {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        if self.frozen.load(Ordering::Acquire) {
            return Ok(Recomputed::Unchanged);
        }
        *self.value.lock() = Some(self.input.value());
        self.frozen.store(true, Ordering::Release);
        Ok(Recomputed::Changed)
    }
}

impl<T: Value> TypedNode<T> for FreezeNode<T> {
    fn read(&self) -> T {
        self.value.lock().clone().unwrap_or_default()
    }
}
