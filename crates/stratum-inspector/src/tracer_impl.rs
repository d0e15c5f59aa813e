//! Bridge from the core `Tracer` trait to `EventSink` implementations.

use stratum::{NodeInfo, RecomputeResult, StabilizeError, Tracer};

use crate::events::{GraphEvent, NodeKey};
use crate::sink::EventSink;

/// A [`Tracer`] that forwards every event to an [`EventSink`].
///
/// Attach it when building a graph:
///
/// ```
/// use std::sync::Arc;
/// use stratum::Graph;
/// use stratum_inspector::{EventCollector, EventSinkTracer};
///
/// let collector = Arc::new(EventCollector::new());
/// let graph = Graph::builder()
///     .with_tracer(EventSinkTracer::new(collector.clone()))
///     .build();
/// ```
pub struct EventSinkTracer<S: EventSink> {
    sink: S,
}

impl<S: EventSink> EventSinkTracer<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: EventSink> Tracer for EventSinkTracer<S> {
    fn on_stabilize_start(&self, num: u64) {
        self.sink.emit(GraphEvent::StabilizeStart { num });
    }

    fn on_stabilize_end(&self, num: u64, error: Option<&StabilizeError>) {
        self.sink.emit(GraphEvent::StabilizeEnd {
            num,
            error: error.map(|e| e.to_string()),
        });
        self.sink.pass_ended(num);
    }

    fn on_recompute_start(&self, node: &NodeInfo) {
        self.sink.emit(GraphEvent::RecomputeStart {
            node: node.into(),
            height: node.height,
        });
    }

    fn on_recompute_end(&self, node: &NodeInfo, result: &RecomputeResult) {
        self.sink.emit(GraphEvent::RecomputeEnd {
            node: node.into(),
            result: result.into(),
        });
    }

    fn on_became_necessary(&self, node: &NodeInfo) {
        self.sink.emit(GraphEvent::BecameNecessary { node: node.into() });
    }

    fn on_became_unnecessary(&self, node: &NodeInfo) {
        self.sink
            .emit(GraphEvent::BecameUnnecessary { node: node.into() });
    }

    fn on_bind_swapped(&self, bind: &NodeInfo, old: Option<&NodeInfo>, new: Option<&NodeInfo>) {
        self.sink.emit(GraphEvent::BindSwapped {
            bind: bind.into(),
            old: old.map(NodeKey::from),
            new: new.map(NodeKey::from),
        });
    }

    fn on_var_set_deferred(&self, node: &NodeInfo) {
        self.sink.emit(GraphEvent::VarSetDeferred { node: node.into() });
    }

    fn on_height_adjusted(&self, node: &NodeInfo, old_height: usize, new_height: usize) {
        self.sink.emit(GraphEvent::HeightAdjusted {
            node: node.into(),
            old_height,
            new_height,
        });
    }
}
