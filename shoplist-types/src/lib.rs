//! Core type definitions for the shoplist store.
//!
//! This crate defines the identifiers shared by every layer of the system:
//! - [`NodeId`]: identity a CRDT mutation is attributed to
//! - [`ListId`]: the key a shopping list is stored under
//! - [`NodeAddr`]: the `address:port` of a physical storage node
//!
//! Nothing here performs I/O; the types are plain values that serialize
//! transparently on the wire.

mod addr;
mod ids;

pub use addr::NodeAddr;
pub use ids::{ListId, NodeId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing or validating identifiers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid node address: {0}")]
    InvalidAddress(String),

    #[error("invalid list id: {0}")]
    InvalidListId(String),
}
