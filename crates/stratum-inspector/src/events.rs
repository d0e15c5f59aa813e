//! Event types for stabilization tracing.
//!
//! This module defines the events emitted while a graph stabilizes:
//! pass lifecycle, node recomputes, necessity transitions, bind swaps,
//! deferred writes and height adjustments.

use serde::{Deserialize, Serialize};

use stratum::NodeInfo;

/// Represents a node in a type-erased, assertion-friendly manner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    /// The node id, unique within a process.
    pub id: u64,
    /// The node kind string (e.g. "map2", "bind-lhs-change").
    pub kind: String,
    /// The node's label, if one was set.
    pub label: Option<String>,
}

impl NodeKey {
    pub fn new(id: u64, kind: impl Into<String>, label: Option<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            label,
        }
    }
}

impl From<&NodeInfo> for NodeKey {
    fn from(info: &NodeInfo) -> Self {
        Self {
            id: info.id.0,
            kind: info.kind.as_str().to_string(),
            label: info.label.clone(),
        }
    }
}

/// Recompute result classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventResult {
    /// The node computed a new value.
    Changed,
    /// A cutoff held; propagation stopped.
    Cutoff,
    /// The compute function failed.
    Failed { message: String },
}

impl From<&stratum::RecomputeResult> for EventResult {
    fn from(result: &stratum::RecomputeResult) -> Self {
        match result {
            stratum::RecomputeResult::Changed => EventResult::Changed,
            stratum::RecomputeResult::Cutoff => EventResult::Cutoff,
            stratum::RecomputeResult::Failed(message) => EventResult::Failed {
                message: message.clone(),
            },
        }
    }
}

/// One stabilization event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphEvent {
    StabilizeStart {
        num: u64,
    },
    StabilizeEnd {
        num: u64,
        error: Option<String>,
    },
    RecomputeStart {
        node: NodeKey,
        height: usize,
    },
    RecomputeEnd {
        node: NodeKey,
        result: EventResult,
    },
    BecameNecessary {
        node: NodeKey,
    },
    BecameUnnecessary {
        node: NodeKey,
    },
    BindSwapped {
        bind: NodeKey,
        old: Option<NodeKey>,
        new: Option<NodeKey>,
    },
    VarSetDeferred {
        node: NodeKey,
    },
    HeightAdjusted {
        node: NodeKey,
        old_height: usize,
        new_height: usize,
    },
}

/// The sequence of events one run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub events: Vec<GraphEvent>,
}

/// Compressed event shape for order assertions: node identity without the
/// process-dependent id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    StabilizeStart,
    StabilizeEnd { failed: bool },
    Recompute { kind: String, result: EventResult },
    BecameNecessary { kind: String },
    BecameUnnecessary { kind: String },
    BindSwapped { kind: String },
    VarSetDeferred,
    HeightAdjusted { kind: String },
}

/// Strip a log down to assertable kinds, dropping ids and heights.
pub fn to_kinds(log: &EventLog) -> Vec<EventKind> {
    log.events
        .iter()
        .filter_map(|event| {
            Some(match event {
                GraphEvent::StabilizeStart { .. } => EventKind::StabilizeStart,
                GraphEvent::StabilizeEnd { error, .. } => EventKind::StabilizeEnd {
                    failed: error.is_some(),
                },
                GraphEvent::RecomputeStart { .. } => return None,
                GraphEvent::RecomputeEnd { node, result } => EventKind::Recompute {
                    kind: node.kind.clone(),
                    result: result.clone(),
                },
                GraphEvent::BecameNecessary { node } => EventKind::BecameNecessary {
                    kind: node.kind.clone(),
                },
                GraphEvent::BecameUnnecessary { node } => EventKind::BecameUnnecessary {
                    kind: node.kind.clone(),
                },
                GraphEvent::BindSwapped { bind, .. } => EventKind::BindSwapped {
                    kind: bind.kind.clone(),
                },
                GraphEvent::VarSetDeferred { .. } => EventKind::VarSetDeferred,
                GraphEvent::HeightAdjusted { node, .. } => EventKind::HeightAdjusted {
                    kind: node.kind.clone(),
                },
            })
        })
        .collect()
}
