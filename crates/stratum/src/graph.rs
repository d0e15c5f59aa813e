//! The graph container and the stabilization driver.
//!
//! A [`Graph`] owns the recompute heap, the observer set and the
//! stabilization bookkeeping. `stabilize` drains the heap minimum-height
//! first, recomputing exactly the nodes whose inputs changed since the
//! previous pass and propagating changes only where a value actually
//! moved.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StabilizeError;
use crate::heap::RecomputeHeap;
use crate::ident::NodeId;
use crate::incr::{AsIncr, NodeRef, Recomputed, Value, WeakNodeRef};
use crate::node::NodeKind;
use crate::scope::Scope;
use crate::tracer::{NoopTracer, RecomputeResult, Tracer};

const DEFAULT_HEIGHT_CAPACITY: usize = 32;

pub(crate) type DeferredSet = Box<dyn FnOnce(&GraphInner) + Send>;
pub(crate) type StartHandler = Arc<dyn Fn() + Send + Sync>;
pub(crate) type EndHandler = Arc<dyn Fn(Option<&StabilizeError>) + Send + Sync>;

/// Cooperative cancellation for [`Graph::stabilize_with`].
///
/// The engine checks the token between node recomputes; compute functions
/// that receive a [`StabilizeContext`] may also honor it.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Context handed to context-aware compute functions (`func`, `bind_ctx`).
pub struct StabilizeContext<'a> {
    num: u64,
    token: &'a CancelToken,
}

impl StabilizeContext<'_> {
    /// The number of the stabilization pass currently running.
    pub fn stabilization_num(&self) -> u64 {
        self.num
    }

    /// Whether the caller asked the pass to stop.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Internal per-recompute context.
pub(crate) struct RecomputeCtx<'a> {
    pub(crate) graph: &'a GraphInner,
    pub(crate) num: u64,
    pub(crate) token: &'a CancelToken,
}

impl RecomputeCtx<'_> {
    pub(crate) fn public(&self) -> StabilizeContext<'_> {
        StabilizeContext {
            num: self.num,
            token: self.token,
        }
    }
}

pub(crate) struct GraphInner {
    /// Number of the most recently started stabilization pass.
    pub(crate) stabilization_num: AtomicU64,
    /// Compare-and-set guard: at most one pass runs at a time.
    pub(crate) stabilizing: AtomicBool,
    pub(crate) heap: Mutex<RecomputeHeap>,
    /// Live observers by id. Observer roots own their input subgraphs.
    pub(crate) observers: Mutex<HashMap<NodeId, NodeRef, ahash::RandomState>>,
    /// Var writes issued while a pass was running, applied when it ends.
    pub(crate) deferred_sets: Mutex<Vec<DeferredSet>>,
    /// Nodes that are stale every pass; seeded into the heap at the top
    /// of each stabilization.
    pub(crate) always_nodes: Mutex<Vec<WeakNodeRef>>,
    pub(crate) start_handlers: Mutex<Vec<StartHandler>>,
    pub(crate) end_handlers: Mutex<Vec<EndHandler>>,
    /// Currently necessary nodes, observers included.
    pub(crate) num_nodes: AtomicU64,
    /// Lifetime count of value changes, observers excluded.
    pub(crate) num_nodes_changed: AtomicU64,
    /// Lifetime count of recomputes, observers excluded.
    pub(crate) num_nodes_recomputed: AtomicU64,
    pub(crate) tracer: Arc<dyn Tracer>,
}

/// Builder for a [`Graph`].
pub struct GraphBuilder {
    tracer: Arc<dyn Tracer>,
    height_capacity: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        GraphBuilder {
            tracer: Arc::new(NoopTracer),
            height_capacity: DEFAULT_HEIGHT_CAPACITY,
        }
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a tracer receiving stabilization progress events.
    ///
    /// Tracing is fire-and-forget; a tracer cannot affect stabilization.
    pub fn with_tracer(mut self, tracer: impl Tracer) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Pre-allocate recompute-heap buckets for graphs whose depth is
    /// known up front. The bucket array still grows on demand.
    pub fn with_height_capacity(mut self, heights: usize) -> Self {
        self.height_capacity = heights;
        self
    }

    pub fn build(self) -> Graph {
        Graph {
            inner: Arc::new(GraphInner {
                stabilization_num: AtomicU64::new(0),
                stabilizing: AtomicBool::new(false),
                heap: Mutex::new(RecomputeHeap::new(self.height_capacity)),
                observers: Mutex::new(HashMap::default()),
                deferred_sets: Mutex::new(Vec::new()),
                always_nodes: Mutex::new(Vec::new()),
                start_handlers: Mutex::new(Vec::new()),
                end_handlers: Mutex::new(Vec::new()),
                num_nodes: AtomicU64::new(0),
                num_nodes_changed: AtomicU64::new(0),
                num_nodes_recomputed: AtomicU64::new(0),
                tracer: self.tracer,
            }),
        }
    }
}

/// A computation graph of incremental nodes.
///
/// Cheap to clone; all clones refer to the same graph.
#[derive(Clone)]
pub struct Graph {
    pub(crate) inner: Arc<GraphInner>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        GraphBuilder::new().build()
    }

    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub(crate) fn root_scope(&self) -> Scope {
        Scope::root(&self.inner)
    }

    /// Number of the most recently started stabilization pass.
    pub fn stabilization_num(&self) -> u64 {
        self.inner.stabilization_num.load(Ordering::Acquire)
    }

    /// Count of currently necessary nodes, observers included.
    pub fn num_nodes(&self) -> u64 {
        self.inner.num_nodes.load(Ordering::Acquire)
    }

    /// Lifetime count of node value changes across all passes.
    pub fn num_nodes_changed(&self) -> u64 {
        self.inner.num_nodes_changed.load(Ordering::Acquire)
    }

    /// Lifetime count of node recomputes across all passes.
    pub fn num_nodes_recomputed(&self) -> u64 {
        self.inner.num_nodes_recomputed.load(Ordering::Acquire)
    }

    /// Number of nodes currently pending recomputation. Diagnostics.
    pub fn recompute_heap_len(&self) -> usize {
        self.inner.heap.lock().len()
    }

    /// Whether the node is currently queued for recomputation.
    pub fn is_pending<T: Value>(&self, input: impl AsIncr<T>) -> bool {
        self.inner.heap.lock().has(input.as_incr().meta().id())
    }

    /// Whether the node currently participates in this graph's
    /// computation, that is, some observer reaches it.
    pub fn has<T: Value>(&self, input: impl AsIncr<T>) -> bool {
        let incr = input.as_incr();
        self.owns(incr.meta().graph_ptr()) && incr.meta().is_necessary()
    }

    /// Whether at least one observer reaches the node.
    pub fn is_observing<T: Value>(&self, input: impl AsIncr<T>) -> bool {
        input.as_incr().meta().is_necessary()
    }

    /// Mark a node stale so the next stabilization recomputes it even if
    /// no input changed. The lever for re-arming `func` sources.
    pub fn set_stale<T: Value>(&self, input: impl AsIncr<T>) -> Result<(), StabilizeError> {
        let incr = input.as_incr();
        if !self.owns(incr.meta().graph_ptr()) {
            return Err(StabilizeError::GraphUnset);
        }
        let meta = incr.meta();
        meta.set_set_at(self.stabilization_num() + 1);
        if meta.is_necessary() {
            self.inner.heap.lock().add(incr.erased().clone());
        }
        Ok(())
    }

    /// Register a listener fired at the start of every stabilization.
    pub fn on_stabilization_start(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.inner.start_handlers.lock().push(Arc::new(handler));
    }

    /// Register a listener fired when a stabilization ends, with the
    /// error if the pass failed.
    pub fn on_stabilization_end(
        &self,
        handler: impl Fn(Option<&StabilizeError>) + Send + Sync + 'static,
    ) {
        self.inner.end_handlers.lock().push(Arc::new(handler));
    }

    /// Run one stabilization pass.
    pub fn stabilize(&self) -> Result<(), StabilizeError> {
        self.stabilize_with(&CancelToken::new())
    }

    /// Run one stabilization pass, checking the token between nodes.
    pub fn stabilize_with(&self, token: &CancelToken) -> Result<(), StabilizeError> {
        let inner = &self.inner;
        if inner
            .stabilizing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StabilizeError::AlreadyStabilizing);
        }

        let num = inner.stabilization_num.fetch_add(1, Ordering::AcqRel) + 1;
        inner.tracer.on_stabilize_start(num);
        let start_handlers = inner.start_handlers.lock().clone();
        for handler in start_handlers {
            handler();
        }

        self.seed_always_nodes();
        let result = self.drain(num, token);

        // apply var writes deferred while the pass was running
        let deferred: Vec<DeferredSet> = std::mem::take(&mut *inner.deferred_sets.lock());
        for apply in deferred {
            apply(inner.as_ref());
        }

        inner.stabilizing.store(false, Ordering::Release);
        let end_handlers = inner.end_handlers.lock().clone();
        for handler in end_handlers {
            handler(result.as_ref().err());
        }
        inner.tracer.on_stabilize_end(num, result.as_ref().err());
        result
    }

    fn seed_always_nodes(&self) {
        let mut always = self.inner.always_nodes.lock();
        always.retain(|n| n.strong_count() > 0);
        let live: Vec<NodeRef> = always.iter().filter_map(|n| n.upgrade()).collect();
        drop(always);
        let mut heap = self.inner.heap.lock();
        for node in live {
            if node.meta().is_necessary() {
                heap.add(node);
            }
        }
    }

    fn drain(&self, num: u64, token: &CancelToken) -> Result<(), StabilizeError> {
        loop {
            if token.is_cancelled() {
                return Err(StabilizeError::Cancelled);
            }
            let node = self.inner.heap.lock().remove_min();
            let Some(node) = node else {
                return Ok(());
            };
            // necessity may have been lost earlier in this pass
            if !node.meta().is_necessary() {
                continue;
            }
            self.recompute_node(&node, num, token)?;
        }
    }

    fn recompute_node(
        &self,
        node: &NodeRef,
        num: u64,
        token: &CancelToken,
    ) -> Result<(), StabilizeError> {
        let inner = &self.inner;
        let meta = node.meta();
        if meta.kind() == NodeKind::Observer {
            // observers are sentinels: popped, never recomputed
            return Ok(());
        }

        inner.num_nodes_recomputed.fetch_add(1, Ordering::AcqRel);
        meta.bump_recomputes();
        meta.set_recomputed_at(num);
        inner.tracer.on_recompute_start(&meta.info());

        let ctx = RecomputeCtx {
            graph: inner.as_ref(),
            num,
            token,
        };
        match node.recompute(&ctx) {
            Err(err) => {
                for handler in meta.on_error_snapshot() {
                    handler(&err);
                }
                inner
                    .tracer
                    .on_recompute_end(&meta.info(), &RecomputeResult::Failed(err.to_string()));
                // keep the node pending so the next pass retries it
                inner.heap.lock().add(node.clone());
                Err(err)
            }
            Ok(Recomputed::Unchanged) => {
                inner
                    .tracer
                    .on_recompute_end(&meta.info(), &RecomputeResult::Cutoff);
                Ok(())
            }
            Ok(Recomputed::Changed) => {
                meta.set_changed_at(num);
                inner.num_nodes_changed.fetch_add(1, Ordering::AcqRel);
                inner
                    .tracer
                    .on_recompute_end(&meta.info(), &RecomputeResult::Changed);
                let children = meta.children_snapshot();
                let mut heap = inner.heap.lock();
                for child in children {
                    if child.meta().is_necessary() && child.is_stale() {
                        heap.add(child);
                    }
                }
                drop(heap);
                for handler in meta.on_update_snapshot() {
                    handler();
                }
                Ok(())
            }
        }
    }

    pub(crate) fn owns(&self, graph: &std::sync::Weak<GraphInner>) -> bool {
        std::sync::Weak::ptr_eq(graph, &Arc::downgrade(&self.inner))
    }
}

impl GraphInner {
    /// Add a dependency edge `child -> parent` and restore the graph
    /// invariants around it: the child's observers flow into the parent's
    /// subtree, and heights are adjusted so every dependency sits strictly
    /// below its dependents.
    pub(crate) fn link(&self, child: &NodeRef, parent: &NodeRef) -> Result<(), StabilizeError> {
        if !child.meta().has_parent(parent.meta().id()) {
            child.meta().push_parent(parent.clone());
            parent.meta().push_child(Arc::downgrade(child));
        }
        for observer in child.meta().observer_ids() {
            self.observe_reachable(parent, observer);
        }
        self.ensure_height_requirement(child, parent)
    }

    /// Remove the dependency edge `child -> parent`, withdrawing the
    /// child's observers from the parent's subtree where no other
    /// dependent still carries them.
    pub(crate) fn unlink(&self, child: &NodeRef, parent: &NodeRef) {
        child.meta().remove_parent(parent.meta().id());
        parent.meta().remove_child(child.meta().id());
        for observer in child.meta().observer_ids() {
            self.unobserve_reachable(parent, observer);
        }
    }
}
