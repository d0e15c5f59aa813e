//! Scopes: the lexical regions node construction happens in.
//!
//! Every constructor takes a scope as its first argument. The root scope
//! comes from a [`Graph`]; inside a bind's function the engine supplies
//! that bind's scope, so nodes created there are registered against the
//! bind and lose necessity together with its right-hand side.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::graph::{Graph, GraphInner};
use crate::incr::{NodeRef, WeakNodeRef};

/// The scope a node is created in: the graph root, or one bind's
/// right-hand-side region.
#[derive(Clone)]
pub struct Scope {
    kind: ScopeKind,
}

#[derive(Clone)]
enum ScopeKind {
    Root(Weak<GraphInner>),
    Bind(Arc<BindScope>),
}

impl Scope {
    pub(crate) fn root(graph: &Arc<GraphInner>) -> Self {
        Scope {
            kind: ScopeKind::Root(Arc::downgrade(graph)),
        }
    }

    pub(crate) fn bind(scope: Arc<BindScope>) -> Self {
        Scope {
            kind: ScopeKind::Bind(scope),
        }
    }

    pub(crate) fn graph_weak(&self) -> Weak<GraphInner> {
        match &self.kind {
            ScopeKind::Root(graph) => graph.clone(),
            ScopeKind::Bind(scope) => scope.graph.clone(),
        }
    }

    pub(crate) fn graph(&self) -> Option<Arc<GraphInner>> {
        self.graph_weak().upgrade()
    }

    /// Record a freshly created node in this scope.
    ///
    /// Root-scope nodes need no registration; bind scopes accumulate
    /// their right-hand-side nodes so a later splice can re-link them.
    pub(crate) fn register(&self, node: &NodeRef) {
        if let ScopeKind::Bind(scope) = &self.kind {
            scope.rhs_nodes.lock().push(Arc::downgrade(node));
        }
    }
}

impl From<&Graph> for Scope {
    fn from(graph: &Graph) -> Self {
        graph.root_scope()
    }
}

impl From<&Scope> for Scope {
    fn from(scope: &Scope) -> Self {
        scope.clone()
    }
}

/// State shared by all nodes created on behalf of one bind.
pub(crate) struct BindScope {
    pub(crate) graph: Weak<GraphInner>,
    /// Every node created inside the bind's function, in creation order.
    /// Weak: a right-hand side that was swapped out and dropped should
    /// not be kept alive by its scope.
    pub(crate) rhs_nodes: Mutex<Vec<WeakNodeRef>>,
}

impl BindScope {
    pub(crate) fn new(graph: Weak<GraphInner>) -> Self {
        BindScope {
            graph,
            rhs_nodes: Mutex::new(Vec::new()),
        }
    }

    /// Live nodes registered in this scope, pruning dropped entries.
    pub(crate) fn rhs_snapshot(&self) -> Vec<NodeRef> {
        let mut rhs = self.rhs_nodes.lock();
        rhs.retain(|n| n.strong_count() > 0);
        rhs.iter().filter_map(Weak::upgrade).collect()
    }
}
