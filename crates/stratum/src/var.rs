//! Input nodes.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::{GraphInner, RecomputeCtx};
use crate::incr::{finish_node, ErasedNode, Incr, Recomputed, TypedNode, Value};
use crate::node::{NodeHandle, NodeKind, NodeMeta};
use crate::scope::Scope;
use crate::StabilizeError;

/// Create an input node holding `value`.
pub fn var<T: Value>(scope: impl Into<Scope>, value: T) -> Var<T> {
    let scope = scope.into();
    let node = Arc::new(VarNode {
        meta: NodeMeta::new(NodeKind::Var, &scope),
        value: Mutex::new(value),
    });
    let (node, erased) = finish_node(node, &scope);
    Var {
        incr: Incr::from_parts(node.clone(), erased),
        node,
    }
}

pub(crate) struct VarNode<T: Value> {
    meta: NodeMeta,
    value: Mutex<T>,
}

impl<T: Value> VarNode<T> {
    /// Overwrite the value and stamp it for the upcoming pass.
    fn apply_set(&self, graph: &GraphInner, value: T) {
        *self.value.lock() = value;
        let upcoming = graph
            .stabilization_num
            .load(std::sync::atomic::Ordering::Acquire)
            + 1;
        self.meta.set_set_at(upcoming);
        if self.meta.is_necessary() {
            if let Some(me) = self.meta.me_ref() {
                graph.heap.lock().add(me);
            }
        }
    }
}

impl<T: Value> ErasedNode for VarNode<T> {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        // the write already happened in `set`; recomputation just
        // propagates it
        Ok(Recomputed::Changed)
    }

    fn is_stale(&self) -> bool {
        self.meta.set_at() > self.meta.recomputed_at()
    }
}

impl<T: Value> TypedNode<T> for VarNode<T> {
    fn read(&self) -> T {
        self.value.lock().clone()
    }
}

/// An input whose value is overwritten with [`set`](Var::set).
///
/// Cheap to clone; all clones refer to the same input.
pub struct Var<T: Value> {
    node: Arc<VarNode<T>>,
    incr: Incr<T>,
}

impl<T: Value> Var<T> {
    /// The input's current value.
    ///
    /// A `set` issued while a stabilization is running is not visible
    /// here until that pass completes.
    pub fn value(&self) -> T {
        self.node.read()
    }

    /// Overwrite the input's value and schedule dependents for the next
    /// stabilization.
    ///
    /// Called while a stabilization is running, the write is deferred and
    /// applied when the pass ends, so mid-pass reads stay consistent.
    pub fn set(&self, value: T) {
        let Some(graph) = self.node.meta.graph() else {
            *self.node.value.lock() = value;
            return;
        };
        if graph.stabilizing.load(std::sync::atomic::Ordering::Acquire) {
            graph.tracer.on_var_set_deferred(&self.node.meta.info());
            let node = self.node.clone();
            graph
                .deferred_sets
                .lock()
                .push(Box::new(move |g: &GraphInner| {
                    node.apply_set(g, value);
                }));
        } else {
            self.node.apply_set(&graph, value);
        }
    }

    pub fn node(&self) -> NodeHandle {
        self.incr.node()
    }

    pub(crate) fn incr(&self) -> Incr<T> {
        self.incr.clone()
    }
}

impl<T: Value> Clone for Var<T> {
    fn clone(&self) -> Self {
        Var {
            node: self.node.clone(),
            incr: self.incr.clone(),
        }
    }
}

impl<T: Value> std::fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.node.meta.display_name())
    }
}
