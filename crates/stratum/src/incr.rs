//! The typed node handle and the erased capability set the scheduler
//! works against.

use std::sync::{Arc, Weak};

use crate::graph::RecomputeCtx;
use crate::node::{NodeHandle, NodeMeta};
use crate::scope::Scope;
use crate::{StabilizeError, Var};

/// Values carried by incremental nodes.
///
/// A node's value must be cheap to clone; nodes hand out copies rather
/// than references so that the graph can recompute behind the scenes.
/// `Default` is the value read from a node that has not been computed yet
/// (for example an observer after `unobserve`).
pub trait Value: Clone + Default + Send + Sync + 'static {}

// Blanket implementation for all types that satisfy the bounds
impl<T> Value for T where T: Clone + Default + Send + Sync + 'static {}

/// Outcome of one node recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recomputed {
    /// The value changed; dependents must be considered.
    Changed,
    /// A cutoff held; dependents are not enqueued.
    Unchanged,
}

/// The non-generic capability set every node exposes to the scheduler.
///
/// Typed value access lives on the concrete node types; the recompute
/// heap and the stabilizer only ever see this trait object.
pub(crate) trait ErasedNode: Send + Sync {
    fn meta(&self) -> &NodeMeta;

    /// Recompute this node's value from its current dependencies.
    fn recompute(&self, ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError>;

    /// Whether this node needs a recompute at the next opportunity.
    ///
    /// Inputs override this: a var is stale only after a `set`. Everything
    /// else is stale when it has never computed, was marked stale, rebound,
    /// or has a dependency that changed after its last recompute.
    fn is_stale(&self) -> bool {
        let meta = self.meta();
        let recomputed_at = meta.recomputed_at();
        if recomputed_at == 0 {
            return true;
        }
        if meta.set_at() > recomputed_at || meta.bound_at() > recomputed_at {
            return true;
        }
        meta.parents_snapshot()
            .iter()
            .any(|p| p.meta().changed_at() > recomputed_at)
    }

    /// Restore the edges a bind maintains around its right-hand side.
    /// No-op for non-binds.
    fn relink(&self, _ctx: &RecomputeCtx<'_>) -> Result<(), StabilizeError> {
        Ok(())
    }

    fn is_bind(&self) -> bool {
        false
    }
}

pub(crate) type NodeRef = Arc<dyn ErasedNode>;
pub(crate) type WeakNodeRef = Weak<dyn ErasedNode>;

/// A node with typed value access.
pub(crate) trait TypedNode<T: Value>: ErasedNode {
    fn read(&self) -> T;
}

/// Finish constructing a node: record the weak self-reference and register
/// it in the scope it was created in.
pub(crate) fn finish_node<N: ErasedNode + 'static>(node: Arc<N>, scope: &Scope) -> (Arc<N>, NodeRef) {
    let erased: NodeRef = node.clone();
    erased.meta().set_me(Arc::downgrade(&erased));
    scope.register(&erased);
    (node, erased)
}

/// Record a dependency edge at construction time.
///
/// The new child has no dependents and no observers yet, so only the edge
/// lists and the child's own height need touching; the full
/// height-adjustment and necessity propagation run when the node is
/// observed or spliced in by a bind.
pub(crate) fn link_new(child: &NodeRef, parent: &NodeRef) {
    child.meta().push_parent(parent.clone());
    parent.meta().push_child(Arc::downgrade(child));
    let floor = parent.meta().height() + 1;
    if child.meta().height() < floor {
        child.meta().set_height(floor);
    }
}

/// A typed handle onto an incremental node.
///
/// Cheap to clone; all clones refer to the same node.
pub struct Incr<T: Value> {
    typed: Arc<dyn TypedNode<T>>,
    erased: NodeRef,
}

impl<T: Value> Incr<T> {
    pub(crate) fn from_parts(typed: Arc<dyn TypedNode<T>>, erased: NodeRef) -> Self {
        Incr { typed, erased }
    }

    /// The node's current value.
    pub fn value(&self) -> T {
        self.typed.read()
    }

    /// Metadata access: identity, stamps, listeners.
    pub fn node(&self) -> NodeHandle {
        NodeHandle::new(self.erased.clone())
    }

    pub(crate) fn erased(&self) -> &NodeRef {
        &self.erased
    }

    pub(crate) fn meta(&self) -> &NodeMeta {
        self.erased.meta()
    }
}

impl<T: Value> Clone for Incr<T> {
    fn clone(&self) -> Self {
        Incr {
            typed: self.typed.clone(),
            erased: self.erased.clone(),
        }
    }
}

impl<T: Value> std::fmt::Debug for Incr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.meta().display_name())
    }
}

/// Anything that can stand in for a dependency of type `T`.
///
/// Lets constructors accept `&Var<T>`, `&Incr<T>` and `&Observer<T>`
/// wherever an input is expected.
pub trait AsIncr<T: Value> {
    fn as_incr(&self) -> Incr<T>;
}

impl<T: Value> AsIncr<T> for Incr<T> {
    fn as_incr(&self) -> Incr<T> {
        self.clone()
    }
}

impl<T: Value> AsIncr<T> for Var<T> {
    fn as_incr(&self) -> Incr<T> {
        self.incr()
    }
}

impl<T: Value, A: AsIncr<T>> AsIncr<T> for &A {
    fn as_incr(&self) -> Incr<T> {
        (**self).as_incr()
    }
}
