//! Membership records.

use serde::{Deserialize, Serialize};
use shoplist_types::NodeAddr;

/// Health of a physical node as seen by this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    /// Responding to gossip.
    Ok,
    /// Missed enough consecutive gossip rounds to be routed around.
    Unresponsive,
    /// Recently added, never contacted.
    Unknown,
}

/// A physical node on the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub addr: NodeAddr,
    pub status: NodeStatus,
    /// Consecutive failed gossip rounds.
    pub dead_counter: u32,
    /// Virtual-node names, `"{id}_vnode{i}"`.
    pub vnodes: Vec<String>,
}

impl NodeInfo {
    pub(crate) fn new(addr: NodeAddr, status: NodeStatus) -> Self {
        Self {
            addr,
            status,
            dead_counter: 0,
            vnodes: Vec::new(),
        }
    }

    /// Ring identity, `address:port`.
    #[must_use]
    pub fn id(&self) -> String {
        self.addr.id()
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == NodeStatus::Ok
    }
}

/// One row of the membership table exchanged by gossip and join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub address: String,
    pub port: String,
    pub status: NodeStatus,
}

impl MemberEntry {
    #[must_use]
    pub fn addr(&self) -> NodeAddr {
        NodeAddr::new(self.address.clone(), self.port.clone())
    }
}

impl From<&NodeInfo> for MemberEntry {
    fn from(info: &NodeInfo) -> Self {
        Self {
            address: info.addr.address.clone(),
            port: info.addr.port.clone(),
            status: info.status,
        }
    }
}
