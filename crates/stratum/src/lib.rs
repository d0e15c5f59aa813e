//! Stratum: self-adjusting computation over a height-stratified DAG of
//! incremental nodes.
//!
//! A program declares inputs ([`var`]), pure transformations ([`map`],
//! [`map2`], ...) and dynamic dependencies ([`bind`]) whose values derive
//! from other nodes. On demand, [`Graph::stabilize`] recomputes exactly
//! the nodes whose inputs changed since the previous pass, in a valid
//! topological order, and propagates changes only where a value actually
//! moved.
//!
//! # Key Properties
//!
//! - **Height-ordered scheduling**: a bucket queue keyed by node height
//!   guarantees every node recomputes after all of its dependencies
//! - **Observation drives work**: only nodes reachable from an observer
//!   are ever computed; unobserved subgraphs cost nothing
//! - **Change cutoff**: propagation stops at nodes whose values did not
//!   change, modulated by user [`cutoff`] predicates
//! - **Dynamic shape**: [`bind`] splices whole subgraphs in and out
//!   mid-pass while preserving the height invariant
//!
//! # Example
//!
//! ```
//! use stratum::{map2, var, Graph};
//!
//! let g = Graph::new();
//! let a = var(&g, 1i64);
//! let b = var(&g, 2i64);
//! let sum = map2(&g, &a, &b, |a, b| a + b);
//!
//! let o = g.observe(&sum).unwrap();
//! g.stabilize().unwrap();
//! assert_eq!(o.value(), 3);
//!
//! a.set(10);
//! g.stabilize().unwrap();
//! assert_eq!(o.value(), 12);
//! ```
//!
//! # Observability
//!
//! Attach a [`Tracer`] through [`GraphBuilder::with_tracer`] to receive
//! structured progress events; the `stratum-inspector` crate provides
//! collectors and sinks built on top of it.

mod always;
mod bind;
mod constant;
mod cutoff;
mod error;
mod fold;
mod freeze;
mod func;
mod graph;
mod heap;
mod heights;
mod ident;
mod incr;
mod map;
mod node;
mod observer;
mod scope;
mod tracer;
mod var;
mod watch;

pub use always::always;
pub use bind::{bind, bind2, bind3, bind4, bind_ctx, bind_if, bind_opt};
pub use constant::constant;
pub use cutoff::{cutoff, cutoff2};
pub use error::{NodeError, StabilizeError};
pub use fold::{fold_left, fold_map, fold_right};
pub use freeze::freeze;
pub use func::func;
pub use graph::{CancelToken, Graph, GraphBuilder, StabilizeContext};
pub use ident::NodeId;
pub use incr::{AsIncr, Incr, Value};
pub use map::{map, map2, map3, map_if};
pub use node::{NodeHandle, NodeKind};
pub use observer::Observer;
pub use scope::Scope;
pub use tracer::{NodeInfo, NoopTracer, RecomputeResult, Tracer};
pub use var::{var, Var};
pub use watch::{watch, Watch};
