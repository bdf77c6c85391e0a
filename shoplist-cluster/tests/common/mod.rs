//! Shared helpers for multi-node cluster tests.

#![allow(dead_code)]

use shoplist_cluster::{ClusterConfig, ClusterNode, mock::MemoryNetwork};
use shoplist_crdt::ShoppingList;
use shoplist_ring::{HashRing, NodeStatus};
use shoplist_storage::{ListStore, MemoryStore};
use shoplist_types::NodeAddr;
use std::sync::Arc;
use std::time::Duration;

pub struct TestCluster {
    pub network: Arc<MemoryNetwork>,
    pub nodes: Vec<Arc<ClusterNode>>,
}

impl TestCluster {
    pub fn addrs(&self) -> Vec<NodeAddr> {
        self.nodes.iter().map(|n| n.addr().clone()).collect()
    }

    pub fn addr(&self, i: usize) -> NodeAddr {
        self.nodes[i].addr().clone()
    }

    pub fn take_down(&self, i: usize) {
        self.network.set_down(&self.nodes[i].id(), true);
    }

    pub fn bring_up(&self, i: usize) {
        self.network.set_down(&self.nodes[i].id(), false);
    }

    pub fn stall(&self, i: usize) {
        self.network.set_stalled(&self.nodes[i].id(), true);
    }

    /// Whether any request of `kind` was sent to node `i`.
    pub fn was_sent(&self, i: usize, kind: &str) -> bool {
        let id = self.nodes[i].id();
        self.network
            .requests()
            .iter()
            .any(|(peer, k)| *peer == id && *k == kind)
    }
}

pub fn addr(i: usize) -> NodeAddr {
    NodeAddr::new("10.0.0.1", (7000 + i).to_string())
}

/// Timeouts short enough that failing calls do not slow the suite.
pub fn fast_config() -> ClusterConfig {
    ClusterConfig {
        gossip_interval: Duration::from_millis(20),
        anti_entropy_interval: Duration::from_millis(50),
        hinted_handoff_interval: Duration::from_millis(50),
        request_timeout: Duration::from_millis(500),
        gossip_timeout: Duration::from_millis(200),
        client_deadline: Duration::from_secs(2),
        dead_threshold: 3,
    }
}

pub fn empty_store() -> Arc<ListStore> {
    Arc::new(ListStore::new(Arc::new(MemoryStore::new())))
}

/// A node whose ring holds itself plus `known` (all OK).
pub fn node_knowing(
    network: &Arc<MemoryNetwork>,
    own: NodeAddr,
    known: &[NodeAddr],
    config: ClusterConfig,
) -> Arc<ClusterNode> {
    let ring = Arc::new(HashRing::new());
    for other in known {
        ring.add_node_with_status(other, NodeStatus::Ok);
    }
    let node = ClusterNode::new(own, ring, empty_store(), network.clone(), config);
    network.register(&node);
    node
}

/// `n` nodes on one in-memory network, every ring holding every node as OK.
pub fn cluster(n: usize) -> TestCluster {
    cluster_with(n, fast_config())
}

pub fn cluster_with(n: usize, config: ClusterConfig) -> TestCluster {
    let network = MemoryNetwork::new();
    let addrs: Vec<NodeAddr> = (0..n).map(addr).collect();
    let nodes = addrs
        .iter()
        .map(|own| node_knowing(&network, own.clone(), &addrs, config.clone()))
        .collect();
    TestCluster { network, nodes }
}

pub fn list_with(node: &str, items: &[(&str, i64)]) -> ShoppingList {
    let mut list = ShoppingList::new(node);
    for (name, qty) in items {
        list.add_or_update_item(name, *qty);
    }
    list
}

/// Polls `check` until it returns true or two seconds pass.
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
