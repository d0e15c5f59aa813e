//! Sinks receiving stabilization events.
//!
//! A sink is fed two things: individual [`GraphEvent`]s as they happen,
//! and a pass boundary after every stabilization. The boundary is what
//! lets sinks work per pass (group, summarize, ship a batch) instead of
//! treating the event stream as one unstructured sequence.
//!
//! There is no "disabled" sink here; a graph that should not trace at
//! all simply keeps the core's `NoopTracer`.

use crate::events::GraphEvent;

/// Receives stabilization events.
pub trait EventSink: Send + Sync + 'static {
    /// Called for every event.
    fn emit(&self, event: GraphEvent);

    /// Called after stabilization pass `num` finishes, whether it
    /// succeeded or failed. Events emitted between two boundaries belong
    /// to the later pass, including between-pass activity such as
    /// observation.
    ///
    /// The default implementation does nothing.
    fn pass_ended(&self, _num: u64) {}
}

/// Selects which categories of events a sink receives.
///
/// The categories follow the shape of a stabilization: the pass bracket,
/// the recompute stream inside it, necessity transitions around
/// observation, structural changes made by binds, and input writes.
///
/// Toggle individual categories with struct update syntax:
///
/// ```
/// use stratum_inspector::EventFilter;
///
/// let only_recomputes = EventFilter {
///     recomputes: true,
///     ..EventFilter::none()
/// };
/// assert!(!only_recomputes.necessity);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    /// `StabilizeStart` / `StabilizeEnd`.
    pub passes: bool,
    /// `RecomputeStart` / `RecomputeEnd`.
    pub recomputes: bool,
    /// `BecameNecessary` / `BecameUnnecessary`.
    pub necessity: bool,
    /// `BindSwapped` / `HeightAdjusted`.
    pub structure: bool,
    /// `VarSetDeferred`.
    pub inputs: bool,
}

impl EventFilter {
    /// Admit every category.
    pub const fn all() -> Self {
        EventFilter {
            passes: true,
            recomputes: true,
            necessity: true,
            structure: true,
            inputs: true,
        }
    }

    /// Admit nothing; a starting point for struct update syntax.
    pub const fn none() -> Self {
        EventFilter {
            passes: false,
            recomputes: false,
            necessity: false,
            structure: false,
            inputs: false,
        }
    }

    /// Whether this filter admits the given event.
    pub fn admits(&self, event: &GraphEvent) -> bool {
        match event {
            GraphEvent::StabilizeStart { .. } | GraphEvent::StabilizeEnd { .. } => self.passes,
            GraphEvent::RecomputeStart { .. } | GraphEvent::RecomputeEnd { .. } => self.recomputes,
            GraphEvent::BecameNecessary { .. } | GraphEvent::BecameUnnecessary { .. } => {
                self.necessity
            }
            GraphEvent::BindSwapped { .. } | GraphEvent::HeightAdjusted { .. } => self.structure,
            GraphEvent::VarSetDeferred { .. } => self.inputs,
        }
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Narrows the event stream reaching `inner` to the categories the
/// filter admits.
///
/// Pass boundaries are always forwarded, even when the `passes` category
/// is off: a sink that groups by pass still needs the boundary when it
/// only records, say, recomputes.
pub struct FilteredSink<S: EventSink> {
    filter: EventFilter,
    inner: S,
}

impl<S: EventSink> FilteredSink<S> {
    pub fn new(filter: EventFilter, inner: S) -> Self {
        Self { filter, inner }
    }
}

impl<S: EventSink> EventSink for FilteredSink<S> {
    fn emit(&self, event: GraphEvent) {
        if self.filter.admits(&event) {
            self.inner.emit(event);
        }
    }

    fn pass_ended(&self, num: u64) {
        self.inner.pass_ended(num);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventResult, NodeKey};
    use parking_lot::Mutex;

    /// Records a short tag per delivery, pass boundaries included.
    #[derive(Default)]
    struct TagSink {
        tags: Mutex<Vec<String>>,
    }

    impl EventSink for TagSink {
        fn emit(&self, event: GraphEvent) {
            let tag = match event {
                GraphEvent::StabilizeStart { .. } => "start",
                GraphEvent::StabilizeEnd { .. } => "end",
                GraphEvent::RecomputeStart { .. } => "rc-start",
                GraphEvent::RecomputeEnd { .. } => "rc-end",
                GraphEvent::BecameNecessary { .. } => "nec",
                GraphEvent::BecameUnnecessary { .. } => "unnec",
                GraphEvent::BindSwapped { .. } => "swap",
                GraphEvent::HeightAdjusted { .. } => "height",
                GraphEvent::VarSetDeferred { .. } => "deferred",
            };
            self.tags.lock().push(tag.to_string());
        }

        fn pass_ended(&self, num: u64) {
            self.tags.lock().push(format!("pass:{num}"));
        }
    }

    fn key() -> NodeKey {
        NodeKey::new(1, "map", None)
    }

    #[test]
    fn test_filter_none_blocks_every_category() {
        let filter = EventFilter::none();
        assert!(!filter.admits(&GraphEvent::StabilizeStart { num: 1 }));
        assert!(!filter.admits(&GraphEvent::BecameNecessary { node: key() }));
        assert!(!filter.admits(&GraphEvent::VarSetDeferred { node: key() }));
    }

    #[test]
    fn test_filter_admits_by_category() {
        let filter = EventFilter {
            recomputes: true,
            structure: true,
            ..EventFilter::none()
        };
        assert!(filter.admits(&GraphEvent::RecomputeEnd {
            node: key(),
            result: EventResult::Changed,
        }));
        assert!(filter.admits(&GraphEvent::HeightAdjusted {
            node: key(),
            old_height: 1,
            new_height: 2,
        }));
        assert!(!filter.admits(&GraphEvent::StabilizeEnd {
            num: 1,
            error: None,
        }));
        assert!(!filter.admits(&GraphEvent::BecameUnnecessary { node: key() }));
    }

    #[test]
    fn test_filtered_sink_narrows_but_keeps_boundaries() {
        let sink = FilteredSink::new(
            EventFilter {
                recomputes: true,
                ..EventFilter::none()
            },
            TagSink::default(),
        );

        sink.emit(GraphEvent::StabilizeStart { num: 1 });
        sink.emit(GraphEvent::RecomputeEnd {
            node: key(),
            result: EventResult::Cutoff,
        });
        sink.emit(GraphEvent::BecameNecessary { node: key() });
        sink.pass_ended(1);

        assert_eq!(*sink.inner.tags.lock(), vec!["rc-end", "pass:1"]);
    }
}
