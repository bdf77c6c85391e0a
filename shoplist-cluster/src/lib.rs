//! Replication layer for shoplist nodes.
//!
//! A [`ClusterNode`] bundles the membership ring, the local list store and a
//! [`PeerTransport`], and drives every inter-node protocol:
//!
//! - **Coordinator**: client reads and writes fanned out to a quorum of the
//!   key's replicas, with substitution on failure and read repair
//! - **Gossip**: membership exchange and liveness tracking
//! - **Anti-entropy**: digest pull, merge, push with peers sharing a partition
//! - **Hinted handoff**: moving lists to the partition that owns them
//! - **Join**: entering a cluster through a seed
//!
//! # Example
//!
//! ```
//! use shoplist_cluster::{ClusterConfig, ClusterNode, mock::MemoryNetwork};
//! use shoplist_ring::HashRing;
//! use shoplist_storage::{ListStore, MemoryStore};
//! use shoplist_types::NodeAddr;
//! use std::sync::Arc;
//!
//! let network = MemoryNetwork::new();
//! let node = ClusterNode::new(
//!     NodeAddr::new("127.0.0.1", "7000"),
//!     Arc::new(HashRing::new()),
//!     Arc::new(ListStore::new(Arc::new(MemoryStore::new()))),
//!     network.clone(),
//!     ClusterConfig::default(),
//! );
//! network.register(&node);
//! assert_eq!(node.ring().len(), 1);
//! ```

mod anti_entropy;
mod config;
mod coordinator;
mod error;
mod gossip;
mod handoff;
mod http;
mod membership;
mod node;
pub mod protocol;
mod runtime;
pub mod transport;

pub use anti_entropy::AntiEntropyReport;
pub use config::ClusterConfig;
pub use coordinator::quorum_size;
pub use error::{ClusterError, ClusterResult};
pub use gossip::GossipReport;
pub use handoff::{HandoffReport, Relocation, handoff_quorum};
pub use http::{
    ANTI_ENTROPY_PATH, GOSSIP_PATH, HttpTransport, JOIN_PATH, LIST_PATH, OPERATION_PATH, PING_PATH,
};
pub use node::ClusterNode;
pub use protocol::{
    DigestMessage, ListsMessage, MembersMessage, MessageBody, PeerReply, PeerRequest, ReadRequest,
    WriteAck, WriteRequest,
};
pub use runtime::{BackgroundTasks, spawn_background};
pub use transport::{PeerTransport, mock};
