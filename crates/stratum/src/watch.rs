//! Watch nodes: record the sequence of values an incremental takes.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::RecomputeCtx;
use crate::incr::{
    finish_node, link_new, AsIncr, ErasedNode, Incr, Recomputed, TypedNode, Value,
};
use crate::node::{NodeHandle, NodeKind, NodeMeta};
use crate::scope::Scope;
use crate::StabilizeError;

/// Track the values a node takes across stabilizations.
pub fn watch<T: Value>(scope: impl Into<Scope>, input: impl AsIncr<T>) -> Watch<T> {
    let scope = scope.into();
    let input = input.as_incr();
    let node = Arc::new(WatchNode {
        meta: NodeMeta::new(NodeKind::Watch, &scope),
        input: input.clone(),
        value: Mutex::new(None),
        values: Mutex::new(Vec::new()),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, input.erased());
    Watch {
        incr: Incr::from_parts(node.clone(), erased),
        node,
    }
}

struct WatchNode<T: Value> {
    meta: NodeMeta,
    input: Incr<T>,
    value: Mutex<Option<T>>,
    values: Mutex<Vec<T>>,
}

impl<T: Value> ErasedNode for WatchNode<T> {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let value = self.input.value();
        self.values.lock().push(value.clone());
        *self.value.lock() = Some(value);
        Ok(Recomputed::Changed)
    }
}

impl<T: Value> TypedNode<T> for WatchNode<T> {
    fn read(&self) -> T {
        self.value.lock().clone().unwrap_or_default()
    }
}

/// Handle onto a watch node.
pub struct Watch<T: Value> {
    node: Arc<WatchNode<T>>,
    incr: Incr<T>,
}

impl<T: Value> Watch<T> {
    pub fn value(&self) -> T {
        self.node.read()
    }

    /// Every value observed so far, in stabilization order.
    pub fn values(&self) -> Vec<T> {
        self.node.values.lock().clone()
    }

    pub fn node(&self) -> NodeHandle {
        self.incr.node()
    }
}

impl<T: Value> AsIncr<T> for Watch<T> {
    fn as_incr(&self) -> Incr<T> {
        self.incr.clone()
    }
}

impl<T: Value> Clone for Watch<T> {
    fn clone(&self) -> Self {
        Watch {
            node: self.node.clone(),
            incr: self.incr.clone(),
        }
    }
}
