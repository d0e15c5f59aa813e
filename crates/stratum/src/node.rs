//! Per-node metadata: identity, height, edges, observers, and the
//! stabilization-number stamps that drive change propagation.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::error::{NodeError, StabilizeError};
use crate::graph::GraphInner;
use crate::ident::NodeId;
use crate::incr::{NodeRef, WeakNodeRef};
use crate::scope::Scope;
use crate::tracer::NodeInfo;

pub(crate) type UpdateHandler = Arc<dyn Fn() + Send + Sync>;
pub(crate) type ErrorHandler = Arc<dyn Fn(&StabilizeError) + Send + Sync>;

/// The kind tag of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NodeKind {
    /// An input whose value is overwritten with `set`.
    Var,
    /// A constant introduced with `constant`.
    Constant,
    Map,
    Map2,
    Map3,
    MapIf,
    Bind,
    Bind2,
    Bind3,
    Bind4,
    /// The auxiliary scheduling pivot a bind places between its input and
    /// its bound right-hand side.
    BindChange,
    Observer,
    Cutoff,
    Cutoff2,
    Fold,
    Watch,
    Freeze,
    Always,
    Func,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Var => "var",
            NodeKind::Constant => "constant",
            NodeKind::Map => "map",
            NodeKind::Map2 => "map2",
            NodeKind::Map3 => "map3",
            NodeKind::MapIf => "map-if",
            NodeKind::Bind => "bind",
            NodeKind::Bind2 => "bind2",
            NodeKind::Bind3 => "bind3",
            NodeKind::Bind4 => "bind4",
            NodeKind::BindChange => "bind-lhs-change",
            NodeKind::Observer => "observer",
            NodeKind::Cutoff => "cutoff",
            NodeKind::Cutoff2 => "cutoff2",
            NodeKind::Fold => "fold",
            NodeKind::Watch => "watch",
            NodeKind::Freeze => "freeze",
            NodeKind::Always => "always",
            NodeKind::Func => "func",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata record owned by every node.
///
/// All fields use interior mutability: the graph mutates them during
/// stabilization under the single-writer discipline, while external
/// callers only touch the heap (which carries its own lock) and the
/// per-field mutexes here.
pub(crate) struct NodeMeta {
    id: NodeId,
    kind: NodeKind,
    graph: Weak<GraphInner>,
    created_in: Scope,
    /// Weak self-reference, set immediately after the owning `Arc` is
    /// constructed. Lets the metadata re-enqueue its own node.
    me: Mutex<Option<WeakNodeRef>>,
    label: Mutex<Option<String>>,
    height: AtomicUsize,
    /// Dependencies: nodes this one reads. Strong references, so a node
    /// keeps its input subgraph alive.
    parents: Mutex<Vec<NodeRef>>,
    /// Dependents: nodes that read this one. Weak, so observers own the
    /// graph and unreferenced subtrees can be dropped.
    children: Mutex<Vec<WeakNodeRef>>,
    /// Observers by which this node is transitively reachable.
    observers: Mutex<IndexSet<NodeId, ahash::RandomState>>,
    set_at: AtomicU64,
    changed_at: AtomicU64,
    recomputed_at: AtomicU64,
    bound_at: AtomicU64,
    num_recomputes: AtomicU64,
    on_update: Mutex<Vec<UpdateHandler>>,
    on_error: Mutex<Vec<ErrorHandler>>,
}

impl NodeMeta {
    pub(crate) fn new(kind: NodeKind, scope: &Scope) -> Self {
        NodeMeta {
            id: NodeId::next(),
            kind,
            graph: scope.graph_weak(),
            created_in: scope.clone(),
            me: Mutex::new(None),
            label: Mutex::new(None),
            height: AtomicUsize::new(0),
            parents: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            observers: Mutex::new(IndexSet::with_hasher(ahash::RandomState::new())),
            set_at: AtomicU64::new(0),
            changed_at: AtomicU64::new(0),
            recomputed_at: AtomicU64::new(0),
            bound_at: AtomicU64::new(0),
            num_recomputes: AtomicU64::new(0),
            on_update: Mutex::new(Vec::new()),
            on_error: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.kind
    }

    pub(crate) fn graph(&self) -> Option<Arc<GraphInner>> {
        self.graph.upgrade()
    }

    pub(crate) fn graph_ptr(&self) -> &Weak<GraphInner> {
        &self.graph
    }

    pub(crate) fn created_in(&self) -> &Scope {
        &self.created_in
    }

    pub(crate) fn set_me(&self, me: WeakNodeRef) {
        *self.me.lock() = Some(me);
    }

    pub(crate) fn me_ref(&self) -> Option<NodeRef> {
        self.me.lock().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn label(&self) -> Option<String> {
        self.label.lock().clone()
    }

    pub(crate) fn set_label(&self, label: impl Into<String>) {
        *self.label.lock() = Some(label.into());
    }

    /// Display name used in errors, cycle paths and trace events.
    pub(crate) fn display_name(&self) -> String {
        match self.label() {
            Some(label) => label,
            None => format!("{}[{}]", self.kind.as_str(), self.id),
        }
    }

    pub(crate) fn height(&self) -> usize {
        self.height.load(Ordering::Acquire)
    }

    pub(crate) fn set_height(&self, height: usize) {
        self.height.store(height, Ordering::Release);
    }

    pub(crate) fn set_at(&self) -> u64 {
        self.set_at.load(Ordering::Acquire)
    }

    pub(crate) fn set_set_at(&self, at: u64) {
        self.set_at.store(at, Ordering::Release);
    }

    pub(crate) fn changed_at(&self) -> u64 {
        self.changed_at.load(Ordering::Acquire)
    }

    pub(crate) fn set_changed_at(&self, at: u64) {
        self.changed_at.store(at, Ordering::Release);
    }

    pub(crate) fn recomputed_at(&self) -> u64 {
        self.recomputed_at.load(Ordering::Acquire)
    }

    pub(crate) fn set_recomputed_at(&self, at: u64) {
        self.recomputed_at.store(at, Ordering::Release);
    }

    pub(crate) fn bound_at(&self) -> u64 {
        self.bound_at.load(Ordering::Acquire)
    }

    pub(crate) fn set_bound_at(&self, at: u64) {
        self.bound_at.store(at, Ordering::Release);
    }

    pub(crate) fn num_recomputes(&self) -> u64 {
        self.num_recomputes.load(Ordering::Acquire)
    }

    pub(crate) fn bump_recomputes(&self) {
        self.num_recomputes.fetch_add(1, Ordering::AcqRel);
    }

    //
    // edges
    //

    pub(crate) fn push_parent(&self, parent: NodeRef) {
        self.parents.lock().push(parent);
    }

    pub(crate) fn has_parent(&self, id: NodeId) -> bool {
        self.parents.lock().iter().any(|p| p.meta().id() == id)
    }

    pub(crate) fn remove_parent(&self, id: NodeId) {
        self.parents.lock().retain(|p| p.meta().id() != id);
    }

    pub(crate) fn parents_snapshot(&self) -> Vec<NodeRef> {
        self.parents.lock().clone()
    }

    pub(crate) fn clear_parents(&self) {
        self.parents.lock().clear();
    }

    pub(crate) fn push_child(&self, child: WeakNodeRef) {
        self.children.lock().push(child);
    }

    pub(crate) fn remove_child(&self, id: NodeId) {
        self.children.lock().retain(|c| match c.upgrade() {
            Some(c) => c.meta().id() != id,
            None => false,
        });
    }

    /// Upgrades the dependent list, pruning entries whose nodes have been
    /// dropped.
    pub(crate) fn children_snapshot(&self) -> Vec<NodeRef> {
        let mut children = self.children.lock();
        children.retain(|c| c.strong_count() > 0);
        children.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn clear_children(&self) {
        self.children.lock().clear();
    }

    //
    // observers
    //

    /// Returns true if the observer was newly added.
    pub(crate) fn add_observer(&self, id: NodeId) -> bool {
        self.observers.lock().insert(id)
    }

    /// Returns true if the node lost its last observer.
    pub(crate) fn remove_observer(&self, id: NodeId) -> bool {
        let mut observers = self.observers.lock();
        observers.shift_remove(&id) && observers.is_empty()
    }

    pub(crate) fn has_observer(&self, id: NodeId) -> bool {
        self.observers.lock().contains(&id)
    }

    pub(crate) fn observer_ids(&self) -> Vec<NodeId> {
        self.observers.lock().iter().copied().collect()
    }

    pub(crate) fn is_necessary(&self) -> bool {
        !self.observers.lock().is_empty()
    }

    //
    // listeners
    //

    pub(crate) fn push_on_update(&self, handler: UpdateHandler) {
        self.on_update.lock().push(handler);
    }

    pub(crate) fn on_update_snapshot(&self) -> Vec<UpdateHandler> {
        self.on_update.lock().clone()
    }

    pub(crate) fn push_on_error(&self, handler: ErrorHandler) {
        self.on_error.lock().push(handler);
    }

    pub(crate) fn on_error_snapshot(&self) -> Vec<ErrorHandler> {
        self.on_error.lock().clone()
    }

    pub(crate) fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id,
            kind: self.kind,
            label: self.label(),
            height: self.height(),
        }
    }

    /// Wrap a compute-function failure with this node's identity.
    pub(crate) fn user_error(&self, err: NodeError) -> StabilizeError {
        StabilizeError::Node {
            node: self.display_name(),
            source: Arc::from(err),
        }
    }
}

impl fmt::Debug for NodeMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeMeta")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("height", &self.height())
            .field("set_at", &self.set_at())
            .field("changed_at", &self.changed_at())
            .field("recomputed_at", &self.recomputed_at())
            .finish()
    }
}

/// Public handle onto a node's metadata.
///
/// Obtained from [`Incr::node`](crate::Incr::node) and friends; exposes
/// identity, stamps and listener registration without the value type.
#[derive(Clone)]
pub struct NodeHandle {
    pub(crate) node: NodeRef,
}

impl NodeHandle {
    pub(crate) fn new(node: NodeRef) -> Self {
        NodeHandle { node }
    }

    pub fn id(&self) -> NodeId {
        self.node.meta().id()
    }

    pub fn kind(&self) -> NodeKind {
        self.node.meta().kind()
    }

    pub fn label(&self) -> Option<String> {
        self.node.meta().label()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        self.node.meta().set_label(label);
    }

    /// The node's height: strictly greater than the height of every
    /// current dependency.
    pub fn height(&self) -> usize {
        self.node.meta().height()
    }

    /// Stabilization number at which this input last had its value
    /// overwritten. Zero for non-inputs and never-set inputs.
    pub fn set_at(&self) -> u64 {
        self.node.meta().set_at()
    }

    /// Stabilization number at which this node's value last changed.
    pub fn changed_at(&self) -> u64 {
        self.node.meta().changed_at()
    }

    /// Stabilization number at which this node was last recomputed, even
    /// if its value did not change.
    pub fn recomputed_at(&self) -> u64 {
        self.node.meta().recomputed_at()
    }

    /// Stabilization number at which a bind last re-evaluated which
    /// right-hand side it is bound to. Zero for non-binds.
    pub fn bound_at(&self) -> u64 {
        self.node.meta().bound_at()
    }

    pub fn num_recomputes(&self) -> u64 {
        self.node.meta().num_recomputes()
    }

    /// True when at least one observer can reach this node.
    pub fn is_necessary(&self) -> bool {
        self.node.meta().is_necessary()
    }

    /// Register a listener invoked after this node's value changes during
    /// a stabilization.
    pub fn on_update(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.node.meta().push_on_update(Arc::new(handler));
    }

    /// Register a listener invoked when this node's compute function
    /// fails.
    pub fn on_error(&self, handler: impl Fn(&StabilizeError) + Send + Sync + 'static) {
        self.node.meta().push_on_error(Arc::new(handler));
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node.meta().display_name())
    }
}
