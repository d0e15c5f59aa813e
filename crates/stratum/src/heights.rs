//! The adjust-heights engine.
//!
//! Whenever an edge `child -> parent` appears (at observation, or when a
//! bind splices in a new right-hand side), the child's height may no
//! longer exceed its dependency's. The engine raises the child to
//! `parent.height + 1` and propagates depth-first through the child's
//! dependents, re-bucketing any node that currently sits in the recompute
//! heap. Revisiting a node that is still on the propagation stack means
//! the edge closed a cycle.

use crate::error::StabilizeError;
use crate::graph::GraphInner;
use crate::incr::NodeRef;

impl GraphInner {
    pub(crate) fn ensure_height_requirement(
        &self,
        child: &NodeRef,
        parent: &NodeRef,
    ) -> Result<(), StabilizeError> {
        let mut stack = Vec::new();
        self.ensure_height_inner(child, parent, &mut stack)
    }

    fn ensure_height_inner(
        &self,
        child: &NodeRef,
        parent: &NodeRef,
        stack: &mut Vec<NodeRef>,
    ) -> Result<(), StabilizeError> {
        let child_meta = child.meta();
        let parent_meta = parent.meta();
        if child_meta.height() > parent_meta.height() {
            return Ok(());
        }
        if stack.iter().any(|n| n.meta().id() == child_meta.id()) {
            let mut path: Vec<String> = stack.iter().map(|n| n.meta().display_name()).collect();
            path.push(child_meta.display_name());
            return Err(StabilizeError::CycleDetected { path });
        }

        stack.push(child.clone());
        let old_height = child_meta.height();
        let new_height = parent_meta.height() + 1;
        child_meta.set_height(new_height);
        self.tracer
            .on_height_adjusted(&child_meta.info(), old_height, new_height);
        self.heap.lock().fix(child);

        for dependent in child_meta.children_snapshot() {
            self.ensure_height_inner(&dependent, child, stack)?;
        }
        stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{map, map2, var, Graph, StabilizeError};

    #[test]
    fn test_heights_strictly_increase_along_edges() {
        let g = Graph::new();
        let v0 = var(&g, 1u64);
        let v1 = var(&g, 2u64);
        let m0 = map(&g, &v0, |x: &u64| x + 1);
        let m1 = map2(&g, &m0, &v1, |a: &u64, b: &u64| a + b);
        let top = map(&g, &m1, |x: &u64| x * 2);

        assert_eq!(v0.node().height(), 0);
        assert_eq!(m0.node().height(), 1);
        assert_eq!(m1.node().height(), 2);
        assert_eq!(top.node().height(), 3);
    }

    #[test]
    fn test_cycle_detected_through_bind() {
        use std::sync::{Arc, OnceLock};

        let g = Graph::new();
        let v = var(&g, false);
        let slot: Arc<OnceLock<crate::Incr<String>>> = Arc::new(OnceLock::new());
        let slot_in_bind = slot.clone();
        let b = crate::bind(&g, &v, move |_s, _v: &bool| {
            slot_in_bind.get().unwrap().clone()
        });
        let m = map(&g, &b, |s: &String| s.clone());
        slot.set(m.clone()).ok();

        let _o = g.observe(&m).unwrap();
        let err = g.stabilize().unwrap_err();
        assert!(matches!(err, StabilizeError::CycleDetected { .. }));
    }
}
