//! Bind nodes: dynamic subgraph splicing.
//!
//! A bind takes an input and a function from the input's value to a node.
//! Its own value is whatever node the function last returned, and the
//! engine splices that right-hand side in and out of the graph as the
//! input changes. Binds buy dynamism at a real cost: every swap re-links
//! edges, re-propagates necessity and re-runs the height engine, so use
//! them where the shape of the computation genuinely depends on data.
//!
//! Alongside the bound node the engine maintains a `bind-lhs-change`
//! pivot between the input and the right-hand side, so nodes downstream
//! of the bind observe the input transition in the same pass as the
//! swap.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::NodeError;
use crate::graph::{GraphInner, RecomputeCtx, StabilizeContext};
use crate::incr::{
    finish_node, link_new, AsIncr, ErasedNode, Incr, NodeRef, Recomputed, TypedNode, Value,
};
use crate::map::{map2, map3};
use crate::node::{NodeKind, NodeMeta};
use crate::scope::{BindScope, Scope};
use crate::StabilizeError;

type BindFn<A, B> = Box<
    dyn Fn(&StabilizeContext<'_>, &Scope, &A) -> Result<Option<Incr<B>>, NodeError> + Send + Sync,
>;

/// Let the graph swap out an entire subgraph as a function of `input`.
///
/// `f` runs whenever the input's value changes; nodes it creates through
/// the supplied [`Scope`] belong to this bind's right-hand side and lose
/// necessity together when a later swap replaces them.
pub fn bind<A, B, F>(scope: impl Into<Scope>, input: impl AsIncr<A>, f: F) -> Incr<B>
where
    A: Value,
    B: Value,
    F: Fn(&Scope, &A) -> Incr<B> + Send + Sync + 'static,
{
    bind_inner(
        scope.into(),
        input.as_incr(),
        NodeKind::Bind,
        Box::new(move |_ctx, s, a| Ok(Some(f(s, a)))),
    )
}

/// Like [`bind`], but the right-hand side may be absent, in which case
/// the bind reads as the value type's default.
pub fn bind_opt<A, B, F>(scope: impl Into<Scope>, input: impl AsIncr<A>, f: F) -> Incr<B>
where
    A: Value,
    B: Value,
    F: Fn(&Scope, &A) -> Option<Incr<B>> + Send + Sync + 'static,
{
    bind_inner(
        scope.into(),
        input.as_incr(),
        NodeKind::Bind,
        Box::new(move |_ctx, s, a| Ok(f(s, a))),
    )
}

/// Like [`bind`], but the function is context-aware and may fail. A
/// failure aborts the bind without touching the current right-hand side,
/// fires the node's error listeners, and stops the stabilization.
pub fn bind_ctx<A, B, F>(scope: impl Into<Scope>, input: impl AsIncr<A>, f: F) -> Incr<B>
where
    A: Value,
    B: Value,
    F: Fn(&StabilizeContext<'_>, &Scope, &A) -> Result<Incr<B>, NodeError> + Send + Sync + 'static,
{
    bind_inner(
        scope.into(),
        input.as_incr(),
        NodeKind::Bind,
        Box::new(move |ctx, s, a| f(ctx, s, a).map(Some)),
    )
}

/// A [`bind_ctx`] over a boolean switch.
pub fn bind_if<B, F>(scope: impl Into<Scope>, cond: impl AsIncr<bool>, f: F) -> Incr<B>
where
    B: Value,
    F: Fn(&StabilizeContext<'_>, &Scope, bool) -> Result<Incr<B>, NodeError>
        + Send
        + Sync
        + 'static,
{
    bind_inner(
        scope.into(),
        cond.as_incr(),
        NodeKind::Bind,
        Box::new(move |ctx, s, v: &bool| f(ctx, s, *v).map(Some)),
    )
}

/// A bind over two inputs.
pub fn bind2<A, B, C, F>(
    scope: impl Into<Scope>,
    a: impl AsIncr<A>,
    b: impl AsIncr<B>,
    f: F,
) -> Incr<C>
where
    A: Value,
    B: Value,
    C: Value,
    F: Fn(&Scope, &A, &B) -> Incr<C> + Send + Sync + 'static,
{
    let scope = scope.into();
    let joined = map2(&scope, a, b, |a: &A, b: &B| (a.clone(), b.clone()));
    bind_inner(
        scope,
        joined,
        NodeKind::Bind2,
        Box::new(move |_ctx, s, (a, b): &(A, B)| Ok(Some(f(s, a, b)))),
    )
}

/// A bind over three inputs.
pub fn bind3<A, B, C, D, F>(
    scope: impl Into<Scope>,
    a: impl AsIncr<A>,
    b: impl AsIncr<B>,
    c: impl AsIncr<C>,
    f: F,
) -> Incr<D>
where
    A: Value,
    B: Value,
    C: Value,
    D: Value,
    F: Fn(&Scope, &A, &B, &C) -> Incr<D> + Send + Sync + 'static,
{
    let scope = scope.into();
    let joined = map3(&scope, a, b, c, |a: &A, b: &B, c: &C| {
        (a.clone(), b.clone(), c.clone())
    });
    bind_inner(
        scope,
        joined,
        NodeKind::Bind3,
        Box::new(move |_ctx, s, (a, b, c): &(A, B, C)| Ok(Some(f(s, a, b, c)))),
    )
}

/// A bind over four inputs.
pub fn bind4<A, B, C, D, E, F>(
    scope: impl Into<Scope>,
    a: impl AsIncr<A>,
    b: impl AsIncr<B>,
    c: impl AsIncr<C>,
    d: impl AsIncr<D>,
    f: F,
) -> Incr<E>
where
    A: Value,
    B: Value,
    C: Value,
    D: Value,
    E: Value,
    F: Fn(&Scope, &A, &B, &C, &D) -> Incr<E> + Send + Sync + 'static,
{
    let scope = scope.into();
    let left = map2(&scope, a, b, |a: &A, b: &B| (a.clone(), b.clone()));
    let right = map2(&scope, c, d, |c: &C, d: &D| (c.clone(), d.clone()));
    let joined = map2(&scope, left, right, |l: &(A, B), r: &(C, D)| {
        (l.clone(), r.clone())
    });
    bind_inner(
        scope,
        joined,
        NodeKind::Bind4,
        Box::new(move |_ctx, s, ((a, b), (c, d)): &((A, B), (C, D))| Ok(Some(f(s, a, b, c, d)))),
    )
}

fn bind_inner<A: Value, B: Value>(
    scope: Scope,
    input: Incr<A>,
    kind: NodeKind,
    run: BindFn<A, B>,
) -> Incr<B> {
    let bind_scope = Arc::new(BindScope::new(scope.graph_weak()));
    let node = Arc::new(BindNode {
        meta: NodeMeta::new(kind, &scope),
        input: input.clone(),
        run,
        scope: bind_scope.clone(),
        state: Mutex::new(BindState::default()),
    });
    let (node, erased) = finish_node(node, &scope);
    link_new(&erased, input.erased());
    Incr::from_parts(node, erased)
}

struct ChangeHandles<B: Value> {
    node: Arc<BindChangeNode<B>>,
    erased: NodeRef,
}

impl<B: Value> Clone for ChangeHandles<B> {
    fn clone(&self) -> Self {
        ChangeHandles {
            node: self.node.clone(),
            erased: self.erased.clone(),
        }
    }
}

struct BindState<B: Value> {
    bound: Option<Incr<B>>,
    change: Option<ChangeHandles<B>>,
    /// Whether the bind function has ever run.
    ran: bool,
}

impl<B: Value> Default for BindState<B> {
    fn default() -> Self {
        BindState {
            bound: None,
            change: None,
            ran: false,
        }
    }
}

struct BindNode<A: Value, B: Value> {
    meta: NodeMeta,
    input: Incr<A>,
    run: BindFn<A, B>,
    scope: Arc<BindScope>,
    state: Mutex<BindState<B>>,
}

impl<A: Value, B: Value> BindNode<A, B> {
    fn me(&self) -> Result<NodeRef, StabilizeError> {
        self.meta.me_ref().ok_or(StabilizeError::GraphUnset)
    }

    fn unlink_old_bound(&self, graph: &GraphInner, me: &NodeRef) {
        let (old, change) = {
            let mut state = self.state.lock();
            (state.bound.take(), state.change.clone())
        };
        if let Some(old) = old {
            // sever the bind edge first: unobservation then drains out of
            // the old right-hand side through its still-linked change
            // pivot before that edge disappears
            graph.unlink(me, old.erased());
            if let Some(change) = &change {
                graph.unlink(old.erased(), &change.erased);
            }
        }
    }

    fn unlink_bind_change(&self, graph: &GraphInner) {
        let change = self.state.lock().change.take();
        if let Some(change) = change {
            graph.unlink(&change.erased, self.input.erased());
        }
    }

    fn link_bind_change(&self, graph: &GraphInner) -> Result<(), StabilizeError> {
        let created_in = self.meta.created_in().clone();
        let node = Arc::new(BindChangeNode::<B> {
            meta: NodeMeta::new(NodeKind::BindChange, &created_in),
            rhs: Mutex::new(None),
        });
        let (node, erased) = finish_node(node, &created_in);
        if let Some(label) = self.meta.label() {
            erased.meta().set_label(format!("{label}-change"));
        }
        graph.link(&erased, self.input.erased())?;
        self.state.lock().change = Some(ChangeHandles { node, erased });
        Ok(())
    }

    fn link_new_bound(
        &self,
        graph: &GraphInner,
        me: &NodeRef,
        new: Incr<B>,
        ctx: &RecomputeCtx<'_>,
    ) -> Result<(), StabilizeError> {
        let change = {
            let mut state = self.state.lock();
            state.bound = Some(new.clone());
            state.change.clone()
        };
        if let Some(change) = &change {
            *change.node.rhs.lock() = Some(new.clone());
        }
        graph.link(me, new.erased())?;
        if let Some(change) = &change {
            graph.link(new.erased(), &change.erased)?;
        }
        self.relink_scope(ctx)
    }

    /// Re-run the link walk for nested binds in this scope whose
    /// necessity survived, so a reused right-hand side is fully wired
    /// again.
    fn relink_scope(&self, ctx: &RecomputeCtx<'_>) -> Result<(), StabilizeError> {
        for node in self.scope.rhs_snapshot() {
            if node.is_bind() && node.meta().is_necessary() {
                node.relink(ctx)?;
            }
        }
        Ok(())
    }
}

impl<A: Value, B: Value> ErasedNode for BindNode<A, B> {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn is_bind(&self) -> bool {
        true
    }

    fn recompute(&self, ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        let graph = ctx.graph;
        let me = self.me()?;

        let (old_bound, ran) = {
            let state = self.state.lock();
            (state.bound.clone(), state.ran)
        };

        // Only re-run the bind function when the left-hand side moved in
        // this pass (or the bind has never run). When the bound node
        // itself triggered this recompute, stamping bound_at is what lets
        // the change continue to our dependents.
        let lhs_changed = self.input.meta().changed_at() == ctx.num || !ran;
        if !lhs_changed {
            self.meta.set_bound_at(ctx.num);
            return Ok(Recomputed::Changed);
        }

        let input_value = self.input.value();
        let new_rhs = (self.run)(&ctx.public(), &Scope::bind(self.scope.clone()), &input_value)
            .map_err(|e| self.meta.user_error(e))?;
        self.state.lock().ran = true;

        let bind_changed = match (old_bound, new_rhs) {
            (Some(old), Some(new)) if old.meta().id() == new.meta().id() => {
                // same right-hand side returned; restore any links a
                // previous swap may have severed
                self.relink(ctx)?;
                old.meta().changed_at() > self.meta.bound_at()
            }
            (Some(old), Some(new)) => {
                graph.tracer.on_bind_swapped(
                    &self.meta.info(),
                    Some(&old.meta().info()),
                    Some(&new.meta().info()),
                );
                self.unlink_old_bound(graph, &me);
                self.unlink_bind_change(graph);
                self.link_bind_change(graph)?;
                self.link_new_bound(graph, &me, new, ctx)?;
                true
            }
            (None, Some(new)) => {
                graph
                    .tracer
                    .on_bind_swapped(&self.meta.info(), None, Some(&new.meta().info()));
                self.link_bind_change(graph)?;
                self.link_new_bound(graph, &me, new, ctx)?;
                true
            }
            (Some(old), None) => {
                graph
                    .tracer
                    .on_bind_swapped(&self.meta.info(), Some(&old.meta().info()), None);
                self.unlink_old_bound(graph, &me);
                self.unlink_bind_change(graph);
                true
            }
            (None, None) => false,
        };

        if bind_changed {
            self.meta.set_bound_at(ctx.num);
        }
        Ok(Recomputed::Changed)
    }

    fn relink(&self, ctx: &RecomputeCtx<'_>) -> Result<(), StabilizeError> {
        let graph = ctx.graph;
        let me = self.me()?;
        let (bound, change) = {
            let state = self.state.lock();
            (state.bound.clone(), state.change.clone())
        };
        if let Some(change) = &change {
            graph.link(&change.erased, self.input.erased())?;
        }
        if let Some(bound) = &bound {
            graph.link(&me, bound.erased())?;
            if let Some(change) = &change {
                graph.link(bound.erased(), &change.erased)?;
            }
            self.relink_scope(ctx)?;
        }
        Ok(())
    }
}

impl<A: Value, B: Value> TypedNode<B> for BindNode<A, B> {
    fn read(&self) -> B {
        let bound = self.state.lock().bound.clone();
        match bound {
            Some(bound) => bound.value(),
            None => B::default(),
        }
    }
}

/// The `bind-lhs-change` pivot. Sits between a bind's input and its
/// right-hand side so the right-hand side is scheduled strictly after the
/// input in any pass where the input changes.
struct BindChangeNode<B: Value> {
    meta: NodeMeta,
    rhs: Mutex<Option<Incr<B>>>,
}

impl<B: Value> ErasedNode for BindChangeNode<B> {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn recompute(&self, _ctx: &RecomputeCtx<'_>) -> Result<Recomputed, StabilizeError> {
        Ok(Recomputed::Changed)
    }
}

impl<B: Value> TypedNode<B> for BindChangeNode<B> {
    fn read(&self) -> B {
        let rhs = self.rhs.lock().clone();
        match rhs {
            Some(rhs) => rhs.value(),
            None => B::default(),
        }
    }
}
