//! Error types for graph stabilization.

use std::fmt;
use std::sync::Arc;

/// Error type returned by user compute functions.
///
/// User domain failures are wrapped into [`StabilizeError::Node`] by the
/// engine, which records which node produced them.
pub type NodeError = Box<dyn std::error::Error + Send + Sync>;

/// Engine-level stabilization errors.
///
/// These are distinct from user domain errors, which originate in compute
/// functions and are carried in the `Node` variant together with the
/// failing node's display name.
#[derive(Debug, Clone)]
pub enum StabilizeError {
    /// Another stabilization is already running on this graph.
    ///
    /// At most one stabilization may be active per graph; concurrent
    /// callers receive this error instead of blocking.
    AlreadyStabilizing,

    /// A dependency cycle was detected while adjusting node heights.
    ///
    /// The `path` contains a debug representation of the nodes forming
    /// the cycle.
    CycleDetected {
        /// Debug representation of the nodes forming the cycle.
        path: Vec<String>,
    },

    /// The node is not attached to a live graph, or belongs to a
    /// different graph than the one operated on.
    GraphUnset,

    /// The stabilization was cancelled through its cancellation token.
    Cancelled,

    /// A node's compute function returned an error.
    ///
    /// The failing node stays in the recompute heap and is retried on the
    /// next stabilization.
    Node {
        /// Display name of the failing node.
        node: String,
        /// The error produced by the compute function.
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for StabilizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StabilizeError::AlreadyStabilizing => {
                write!(f, "stabilization already in progress")
            }
            StabilizeError::CycleDetected { path } => {
                write!(f, "dependency cycle detected: {}", path.join(" -> "))
            }
            StabilizeError::GraphUnset => write!(f, "node is not attached to a graph"),
            StabilizeError::Cancelled => write!(f, "stabilization cancelled"),
            StabilizeError::Node { node, source } => {
                write!(f, "node {} failed: {}", node, source)
            }
        }
    }
}

impl std::error::Error for StabilizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StabilizeError::Node { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = StabilizeError::CycleDetected {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
        assert_eq!(
            StabilizeError::AlreadyStabilizing.to_string(),
            "stabilization already in progress"
        );
    }

    #[test]
    fn test_node_error_source() {
        let inner: NodeError = "boom".into();
        let err = StabilizeError::Node {
            node: "func[3]".into(),
            source: Arc::from(inner),
        };
        assert_eq!(err.to_string(), "node func[3] failed: boom");
        assert!(std::error::Error::source(&err).is_some());
    }
}
