//! Pass-grouped event collection.
//!
//! `EventCollector` slices the event stream at stabilization boundaries:
//! every completed pass becomes one [`PassTrace`] holding the events
//! that led up to and ran inside it. Tests assert against a single pass
//! (which nodes changed, which hit a cutoff, whether it failed) instead
//! of scanning one long flat sequence.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::events::{EventLog, EventResult, GraphEvent, NodeKey};
use crate::sink::EventSink;

/// The events of one stabilization pass.
///
/// A trace starts where the previous pass ended, so it also carries
/// between-pass activity such as observation or input writes that fed
/// this pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassTrace {
    /// The pass number.
    pub num: u64,
    /// Events in emission order.
    pub events: Vec<GraphEvent>,
}

impl PassTrace {
    /// Nodes whose recompute produced a new value in this pass.
    pub fn changed(&self) -> Vec<NodeKey> {
        self.recomputes_with(|result| matches!(result, EventResult::Changed))
    }

    /// Nodes whose recompute was absorbed by a cutoff in this pass.
    pub fn cutoffs(&self) -> Vec<NodeKey> {
        self.recomputes_with(|result| matches!(result, EventResult::Cutoff))
    }

    /// Whether the pass ended in an error.
    pub fn failed(&self) -> bool {
        self.events.iter().any(|event| {
            matches!(
                event,
                GraphEvent::StabilizeEnd { error: Some(_), .. }
            )
        })
    }

    fn recomputes_with(&self, want: impl Fn(&EventResult) -> bool) -> Vec<NodeKey> {
        self.events
            .iter()
            .filter_map(|event| match event {
                GraphEvent::RecomputeEnd { node, result } if want(result) => Some(node.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct CollectorState {
    /// Sealed passes, oldest first.
    passes: Vec<PassTrace>,
    /// Events since the last pass boundary.
    pending: Vec<GraphEvent>,
}

/// Collects events and seals them into [`PassTrace`]s at each pass
/// boundary.
///
/// # Example
///
/// ```
/// use stratum_inspector::{EventCollector, EventSink, GraphEvent};
///
/// let collector = EventCollector::new();
/// collector.emit(GraphEvent::StabilizeStart { num: 1 });
/// collector.emit(GraphEvent::StabilizeEnd { num: 1, error: None });
/// collector.pass_ended(1);
///
/// let passes = collector.passes();
/// assert_eq!(passes.len(), 1);
/// assert!(!passes[0].failed());
/// ```
#[derive(Debug, Default)]
pub struct EventCollector {
    state: Mutex<CollectorState>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// All sealed passes, oldest first.
    pub fn passes(&self) -> Vec<PassTrace> {
        self.state.lock().passes.clone()
    }

    /// The most recently sealed pass.
    pub fn last_pass(&self) -> Option<PassTrace> {
        self.state.lock().passes.last().cloned()
    }

    /// Events that have not been sealed into a pass yet (nothing has
    /// stabilized since they were emitted).
    pub fn pending(&self) -> Vec<GraphEvent> {
        self.state.lock().pending.clone()
    }

    /// Every collected event in emission order, sealed or not, as one
    /// flat log for order assertions with [`to_kinds`](crate::to_kinds).
    pub fn log(&self) -> EventLog {
        let state = self.state.lock();
        let mut events = Vec::new();
        for pass in &state.passes {
            events.extend(pass.events.iter().cloned());
        }
        events.extend(state.pending.iter().cloned());
        EventLog { events }
    }

    /// Drop everything collected so far.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.passes.clear();
        state.pending.clear();
    }
}

impl EventSink for EventCollector {
    fn emit(&self, event: GraphEvent) {
        self.state.lock().pending.push(event);
    }

    fn pass_ended(&self, num: u64) {
        let mut state = self.state.lock();
        let events = std::mem::take(&mut state.pending);
        state.passes.push(PassTrace { num, events });
    }
}

impl EventSink for std::sync::Arc<EventCollector> {
    fn emit(&self, event: GraphEvent) {
        self.as_ref().emit(event);
    }

    fn pass_ended(&self, num: u64) {
        self.as_ref().pass_ended(num);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recompute(kind: &str, result: EventResult) -> GraphEvent {
        GraphEvent::RecomputeEnd {
            node: NodeKey::new(0, kind, None),
            result,
        }
    }

    #[test]
    fn test_boundaries_seal_passes() {
        let collector = EventCollector::new();

        collector.emit(GraphEvent::StabilizeStart { num: 1 });
        collector.emit(recompute("map", EventResult::Changed));
        collector.pass_ended(1);

        collector.emit(GraphEvent::StabilizeStart { num: 2 });
        collector.pass_ended(2);

        let passes = collector.passes();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].num, 1);
        assert_eq!(passes[0].events.len(), 2);
        assert_eq!(passes[1].num, 2);
        assert_eq!(collector.last_pass().unwrap().num, 2);
    }

    #[test]
    fn test_unsealed_events_stay_pending() {
        let collector = EventCollector::new();
        collector.emit(GraphEvent::BecameNecessary {
            node: NodeKey::new(3, "var", None),
        });

        assert!(collector.passes().is_empty());
        assert_eq!(collector.pending().len(), 1);

        // the next boundary folds them into that pass
        collector.pass_ended(1);
        assert!(collector.pending().is_empty());
        assert_eq!(collector.passes()[0].events.len(), 1);
    }

    #[test]
    fn test_pass_trace_changed_and_cutoffs() {
        let collector = EventCollector::new();
        collector.emit(recompute("map", EventResult::Changed));
        collector.emit(recompute("cutoff", EventResult::Cutoff));
        collector.emit(recompute("map2", EventResult::Changed));
        collector.pass_ended(1);

        let pass = collector.last_pass().unwrap();
        let changed: Vec<String> = pass.changed().into_iter().map(|n| n.kind).collect();
        assert_eq!(changed, vec!["map", "map2"]);
        let cutoffs: Vec<String> = pass.cutoffs().into_iter().map(|n| n.kind).collect();
        assert_eq!(cutoffs, vec!["cutoff"]);
        assert!(!pass.failed());
    }

    #[test]
    fn test_pass_trace_failed() {
        let collector = EventCollector::new();
        collector.emit(GraphEvent::StabilizeEnd {
            num: 1,
            error: Some("node func[1] failed: boom".to_string()),
        });
        collector.pass_ended(1);
        assert!(collector.last_pass().unwrap().failed());
    }

    #[test]
    fn test_log_flattens_sealed_and_pending_in_order() {
        let collector = EventCollector::new();
        collector.emit(GraphEvent::StabilizeStart { num: 1 });
        collector.pass_ended(1);
        collector.emit(GraphEvent::BecameUnnecessary {
            node: NodeKey::new(9, "observer", None),
        });

        let log = collector.log();
        assert_eq!(log.events.len(), 2);
        assert!(matches!(log.events[0], GraphEvent::StabilizeStart { .. }));
        assert!(matches!(
            log.events[1],
            GraphEvent::BecameUnnecessary { .. }
        ));

        collector.clear();
        assert!(collector.log().events.is_empty());
        assert!(collector.passes().is_empty());
    }
}
