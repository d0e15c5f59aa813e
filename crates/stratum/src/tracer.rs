//! Tracer trait for observing stabilization progress.
//!
//! This module defines the [`Tracer`] trait and related types for
//! observing the engine. The default [`NoopTracer`] provides zero cost
//! when tracing is not needed; attach an implementation through
//! [`GraphBuilder::with_tracer`](crate::GraphBuilder::with_tracer).
//!
//! Tracing is fire-and-forget: implementations cannot fail a
//! stabilization, and a slow tracer only slows the pass down.

use crate::error::StabilizeError;
use crate::ident::NodeId;
use crate::node::NodeKind;

/// A snapshot of a node's identity at the moment an event fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: Option<String>,
    pub height: usize,
}

impl NodeInfo {
    /// Display name matching errors and cycle paths.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{}[{}]", self.kind.as_str(), self.id),
        }
    }
}

/// Classification of one node recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeResult {
    /// The node computed a new value; dependents were considered.
    Changed,
    /// A cutoff held; propagation stopped at this node.
    Cutoff,
    /// The compute function failed with the given message.
    Failed(String),
}

/// Tracer for stabilization progress events.
///
/// All methods have default empty implementations, so implementations
/// only override the events they are interested in.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; observer creation and var sets
/// can fire events from threads other than the stabilizing one.
pub trait Tracer: Send + Sync + 'static {
    /// A stabilization pass started.
    #[inline]
    fn on_stabilize_start(&self, _num: u64) {}

    /// A stabilization pass ended, with the error if it failed.
    #[inline]
    fn on_stabilize_end(&self, _num: u64, _error: Option<&StabilizeError>) {}

    /// A node was pulled from the recompute heap and is about to run.
    #[inline]
    fn on_recompute_start(&self, _node: &NodeInfo) {}

    /// A node finished recomputing.
    #[inline]
    fn on_recompute_end(&self, _node: &NodeInfo, _result: &RecomputeResult) {}

    /// A node gained its first observer and joined the computation.
    #[inline]
    fn on_became_necessary(&self, _node: &NodeInfo) {}

    /// A node lost its last observer and left the computation.
    #[inline]
    fn on_became_unnecessary(&self, _node: &NodeInfo) {}

    /// A bind re-evaluated which right-hand side it is bound to.
    #[inline]
    fn on_bind_swapped(&self, _bind: &NodeInfo, _old: Option<&NodeInfo>, _new: Option<&NodeInfo>) {
    }

    /// A var write arrived mid-pass and was queued for the pass end.
    #[inline]
    fn on_var_set_deferred(&self, _node: &NodeInfo) {}

    /// The adjust-heights engine moved a node.
    #[inline]
    fn on_height_adjusted(&self, _node: &NodeInfo, _old_height: usize, _new_height: usize) {}
}

/// Tracer that discards all events.
///
/// This is the default for [`Graph`](crate::Graph).
pub struct NoopTracer;

impl Tracer for NoopTracer {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTracer {
        recomputes: AtomicUsize,
    }

    impl Tracer for CountingTracer {
        fn on_recompute_end(&self, _node: &NodeInfo, _result: &RecomputeResult) {
            self.recomputes.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_tracer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopTracer>();
        assert_send_sync::<Arc<CountingTracer>>();
    }

    #[test]
    fn test_counting_tracer_sees_recomputes() {
        use crate::{map, var, Graph};

        let tracer = Arc::new(CountingTracer {
            recomputes: AtomicUsize::new(0),
        });

        struct Forward(Arc<CountingTracer>);
        impl Tracer for Forward {
            fn on_recompute_end(&self, node: &NodeInfo, result: &RecomputeResult) {
                self.0.on_recompute_end(node, result);
            }
        }

        let g = Graph::builder().with_tracer(Forward(tracer.clone())).build();
        let v = var(&g, 1u64);
        let m = map(&g, &v, |x: &u64| x * 2);
        let _o = g.observe(&m).unwrap();
        g.stabilize().unwrap();

        assert_eq!(tracer.recomputes.load(Ordering::Relaxed), 1);
    }
}
