//! Errors raised when decoding CRDT state that violates an invariant.

use shoplist_types::NodeId;
use thiserror::Error;

/// Invariant violations detected while decoding a CRDT from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrdtError {
    /// A dot carries a counter beyond its node's causal context.
    #[error("dot ({element}, {node}, {counter}) is outside the causal context")]
    DotOutsideContext {
        element: String,
        node: NodeId,
        counter: u32,
    },

    /// Dot counters start at 1.
    #[error("dot ({element}, {node}) has counter 0")]
    ZeroCounter { element: String, node: NodeId },

    /// A node has decremented more than it incremented.
    #[error("node {node} decremented {negative} but only incremented {positive}")]
    DecrementExceedsIncrement {
        node: NodeId,
        positive: u32,
        negative: u32,
    },
}
