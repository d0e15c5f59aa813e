//! Observers and the necessity tracker.
//!
//! An observer is a sentinel node attached to an output of interest. A
//! node is *necessary*, and participates in stabilization, exactly when
//! some observer can reach it along current dependency edges. Necessity
//! is tracked by propagating observer identities up the dependency edges
//! when observation (or a bind splice) links a subtree in, and
//! withdrawing them when the last path to an observer disappears.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::StabilizeError;
use crate::graph::{Graph, GraphInner, RecomputeCtx};
use crate::ident::NodeId;
use crate::incr::{finish_node, AsIncr, ErasedNode, Incr, NodeRef, Recomputed, TypedNode, Value};
use crate::node::{NodeHandle, NodeKind, NodeMeta};

impl GraphInner {
    /// Walk the dependency closure of `node`, adding `observer` to every
    /// reached node's observer set. Nodes already carrying the observer
    /// are skipped, which terminates diamonds and re-links.
    pub(crate) fn observe_reachable(&self, node: &NodeRef, observer: NodeId) {
        if !node.meta().add_observer(observer) {
            return;
        }
        if node.meta().observer_ids().len() == 1 {
            self.became_necessary(node);
        }
        for parent in node.meta().parents_snapshot() {
            self.observe_reachable(&parent, observer);
        }
    }

    /// Withdraw `observer` from `node` and its dependency closure, but
    /// only where no other dependent still carries the observer (another
    /// path through a diamond, or a right-hand side shared with a
    /// different subtree).
    pub(crate) fn unobserve_reachable(&self, node: &NodeRef, observer: NodeId) {
        if !node.meta().has_observer(observer) {
            return;
        }
        let still_reachable = node
            .meta()
            .children_snapshot()
            .iter()
            .any(|c| c.meta().has_observer(observer));
        if still_reachable {
            return;
        }
        if node.meta().remove_observer(observer) {
            self.became_unnecessary(node);
        }
        for parent in node.meta().parents_snapshot() {
            self.unobserve_reachable(&parent, observer);
        }
    }

    pub(crate) fn became_necessary(&self, node: &NodeRef) {
        self.num_nodes.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
        self.tracer.on_became_necessary(&node.meta().info());
        if node.is_stale() {
            self.heap.lock().add(node.clone());
        }
    }

    pub(crate) fn became_unnecessary(&self, node: &NodeRef) {
        self.num_nodes.fetch_sub(1, std::sync::atomic::Ordering::AcqRel);
        self.tracer.on_became_unnecessary(&node.meta().info());
        self.heap.lock().remove(node.meta().id());
    }
}

impl Graph {
    /// Observe a node, marking it and its entire dependency closure as
    /// necessary. The returned [`Observer`] exposes the node's value and
    /// keeps the subgraph alive until [`Observer::unobserve`].
    pub fn observe<T: Value>(&self, input: impl AsIncr<T>) -> Result<Observer<T>, StabilizeError> {
        let input = input.as_incr();
        if !self.owns(input.meta().graph_ptr()) {
            return Err(StabilizeError::GraphUnset);
        }

        let scope = self.root_scope();
        let node = Arc::new(ObserverNode {
            meta: NodeMeta::new(NodeKind::Observer, &scope),
            input: Mutex::new(Some(input.clone())),
        });
        let (node, erased) = finish_node(node, &scope);
        let id = erased.meta().id();

        // the observer observes itself; everything else follows from the
        // link below
        erased.meta().add_observer(id);
        self.inner.became_necessary(&erased);
        self.inner.link(&erased, input.erased())?;
        self.inner.observers.lock().insert(id, erased.clone());

        Ok(Observer {
            node,
            erased,
            graph: Arc::downgrade(&self.inner),
        })
    }
}

pub(crate) struct ObserverNode<T: Value> {
    meta: NodeMeta,
    input: Mutex<Option<Incr<T>>>,
}

impl<T: Value> ErasedNode for ObserverNode<T> {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        // sentinel; the stabilizer never calls this
        Ok(Recomputed::Unchanged)
    }
}

impl<T: Value> TypedNode<T> for ObserverNode<T> {
    fn read(&self) -> T {
        let input = self.input.lock().clone();
        match input {
            Some(input) => input.value(),
            None => T::default(),
        }
    }
}

/// A handle onto an observed output.
///
/// Reads through to the observed node's value; after
/// [`unobserve`](Observer::unobserve) it reads the value type's default
/// and must not be re-used.
pub struct Observer<T: Value> {
    node: Arc<ObserverNode<T>>,
    erased: NodeRef,
    graph: Weak<GraphInner>,
}

impl<T: Value> Observer<T> {
    /// The observed node's current value.
    pub fn value(&self) -> T {
        self.node.read()
    }

    pub fn node(&self) -> NodeHandle {
        NodeHandle::new(self.erased.clone())
    }

    /// Remove this observer from the graph, withdrawing necessity from
    /// every node only it was keeping alive.
    pub fn unobserve(&self) {
        let Some(graph) = self.graph.upgrade() else {
            return;
        };
        let input = self.node.input.lock().take();
        if let Some(input) = input {
            graph.unlink(&self.erased, input.erased());
        }
        let id = self.erased.meta().id();
        graph.observers.lock().remove(&id);
        if self.erased.meta().remove_observer(id) {
            graph.became_unnecessary(&self.erased);
        }
        self.erased.meta().clear_parents();
        self.erased.meta().clear_children();
    }
}

impl<T: Value> AsIncr<T> for Observer<T> {
    fn as_incr(&self) -> Incr<T> {
        Incr::from_parts(self.node.clone(), self.erased.clone())
    }
}

impl<T: Value> std::fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.erased.meta().display_name())
    }
}
