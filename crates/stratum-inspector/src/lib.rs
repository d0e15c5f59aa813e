//! Stratum Inspector: tracing and observability for the stratum
//! incremental engine.
//!
//! This crate bridges stratum's `Tracer` API to pluggable event sinks.
//! The event stream is structured around stabilization passes: sinks see
//! a boundary after every pass, and the collector seals events into one
//! [`PassTrace`] per pass so assertions can ask "what did pass 3 do"
//! directly.
//!
//! - **EventCollector**: pass-grouped collection for testing and
//!   assertion, with per-pass helpers (`changed`, `cutoffs`, `failed`)
//! - **EventFilter / FilteredSink**: narrow a sink to event categories
//!   (recomputes, necessity, structure, inputs)
//! - **EventSinkTracer**: the `Tracer` implementation forwarding to a sink
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use stratum::{map2, var, Graph};
//! use stratum_inspector::{EventCollector, EventSinkTracer};
//!
//! let collector = Arc::new(EventCollector::new());
//! let g = Graph::builder()
//!     .with_tracer(EventSinkTracer::new(collector.clone()))
//!     .build();
//!
//! let a = var(&g, 1i64);
//! let b = var(&g, 2i64);
//! let sum = map2(&g, &a, &b, |a, b| a + b);
//! let o = g.observe(&sum).unwrap();
//! g.stabilize().unwrap();
//! assert_eq!(o.value(), 3);
//!
//! let pass = collector.last_pass().unwrap();
//! assert_eq!(pass.num, 1);
//! assert!(!pass.failed());
//! assert_eq!(pass.changed().len(), 1); // the map2
//! ```
//!
//! # Event Types
//!
//! - **Pass lifecycle**: `StabilizeStart`, `StabilizeEnd`
//! - **Recomputes**: `RecomputeStart`, `RecomputeEnd` (changed, cutoff or
//!   failed)
//! - **Necessity**: `BecameNecessary`, `BecameUnnecessary`
//! - **Dynamism**: `BindSwapped`, `HeightAdjusted`
//! - **Inputs**: `VarSetDeferred`
//!
//! See [`GraphEvent`] for the complete list. All event and trace types
//! serialize with serde for file capture and later analysis.

mod collector;
mod events;
mod sink;
mod tracer_impl;

pub use collector::{EventCollector, PassTrace};
pub use events::{to_kinds, EventKind, EventLog, EventResult, GraphEvent, NodeKey};
pub use sink::{EventFilter, EventSink, FilteredSink};
pub use tracer_impl::EventSinkTracer;
