//! Func nodes: context-aware fallible sources.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::NodeError;
use crate::graph::{RecomputeCtx, StabilizeContext};
use crate::incr::{finish_node, ErasedNode, Incr, Recomputed, TypedNode, Value};
use crate::node::{NodeKind, NodeMeta};
use crate::scope::Scope;
use crate::StabilizeError;

/// A source node computed by calling `f`.
///
/// The function runs when the node first becomes necessary and again
/// whenever [`Graph::set_stale`](crate::Graph::set_stale) re-arms it. A
/// returned error fires the node's error listeners and aborts the pass;
/// the node stays pending and is retried on the next stabilization.
pub fn func<T, F>(scope: impl Into<Scope>, f: F) -> Incr<T>
where
    T: Value,
    F: Fn(&StabilizeContext<'_>) -> Result<T, NodeError> + Send + Sync + 'static,
{
    let scope = scope.into();
    let node = Arc::new(FuncNode {
        meta: NodeMeta::new(NodeKind::Func, &scope),
        f,
        value: Mutex::new(None),
    });
    let (node, erased) = finish_node(node, &scope);
    Incr::from_parts(node, erased)
}

struct FuncNode<T: Value, F> {
    meta: NodeMeta,
    f: F,
    value: Mutex<Option<T>>,
}

impl<T, F> ErasedNode for FuncNode<T, F>
where
    T: Value,
    F: Fn(&StabilizeContext<'_>) -> Result<T, NodeError> + Send + Sync + 'static,
{
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let value = (self.f)(&ctx.public()).map_err(|e| self.meta.user_error(e))?;
        *self.value.lock() = Some(value);
        Ok(Recomputed::Changed)
    }
}

impl<T, F> TypedNode<T> for FuncNode<T, F>
where
    T: Value,
    F: Fn(&StabilizeContext<'_>) -> Result<T, NodeError> + Send + Sync + 'static,
{
    fn read(&self) -> T {
        self.value.lock().clone().unwrap_or_default()
    }
}
