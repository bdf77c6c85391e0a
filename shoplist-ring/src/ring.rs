//! The hash ring proper.

use crate::node::{MemberEntry, NodeInfo, NodeStatus};
use crate::token::{Token, token_for};
use shoplist_types::NodeAddr;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Upper bound on the replication factor (and virtual nodes per node).
pub const MAX_REPLICATION_FACTOR: usize = 8;

#[derive(Debug, Default)]
struct RingState {
    /// Token → physical node id.
    tokens: BTreeMap<Token, String>,
    nodes: BTreeMap<String, NodeInfo>,
    replication_factor: usize,
    /// Token of every OK-owned vnode → its replica set.
    partitions: BTreeMap<Token, Vec<NodeAddr>>,
    version: u64,
}

/// Membership ring shared by every subsystem of a node.
///
/// All methods take `&self`; mutations hold the write lock for their whole
/// duration and lookups only the read lock.
#[derive(Debug)]
pub struct HashRing {
    state: RwLock<RingState>,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

impl HashRing {
    /// Creates an empty ring with replication factor 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RingState {
                replication_factor: 1,
                ..RingState::default()
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RingState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RingState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // ── Membership ───────────────────────────────────────────────

    /// Adds a physical node. The local node starts OK, any other UNKNOWN.
    ///
    /// Returns false if either part is empty or the node is already present.
    pub fn add_node(&self, address: &str, port: &str, is_self: bool) -> bool {
        let status = if is_self {
            NodeStatus::Ok
        } else {
            NodeStatus::Unknown
        };
        self.add_node_with_status(&NodeAddr::new(address, port), status)
    }

    /// Adds a physical node with an explicit initial status.
    pub fn add_node_with_status(&self, addr: &NodeAddr, status: NodeStatus) -> bool {
        if addr.is_incomplete() {
            return false;
        }
        let id = addr.id();
        let mut state = self.write();
        if state.nodes.contains_key(&id) {
            return false;
        }
        state.nodes.insert(id.clone(), NodeInfo::new(addr.clone(), status));
        state.rebalance();
        info!(node = %id, ?status, rf = state.replication_factor, "node added to ring");
        true
    }

    /// Removes a physical node and its tokens.
    pub fn remove_node(&self, id: &str) -> bool {
        let mut state = self.write();
        let Some(info) = state.nodes.remove(id) else {
            return false;
        };
        for vnode in &info.vnodes {
            state.tokens.remove(&token_for(vnode));
        }
        state.rebalance();
        info!(node = %id, rf = state.replication_factor, "node removed from ring");
        true
    }

    /// Sets a node's status. Returns true if it changed.
    pub fn set_status(&self, id: &str, status: NodeStatus) -> bool {
        let mut state = self.write();
        let changed = match state.nodes.get_mut(id) {
            Some(info) if info.status != status => {
                info.status = status;
                true
            }
            _ => false,
        };
        if changed {
            state.rebuild_partitions();
            info!(node = %id, ?status, "node status changed");
        }
        changed
    }

    /// Counts a failed contact. Once `threshold` consecutive failures are
    /// reached the node is marked UNRESPONSIVE; returns true on that flip.
    pub fn record_failure(&self, id: &str, threshold: u32) -> bool {
        let mut state = self.write();
        let Some(info) = state.nodes.get_mut(id) else {
            return false;
        };
        info.dead_counter = info.dead_counter.saturating_add(1);
        debug!(node = %id, dead_counter = info.dead_counter, "contact failed");
        if info.dead_counter >= threshold && info.status != NodeStatus::Unresponsive {
            info.status = NodeStatus::Unresponsive;
            state.rebuild_partitions();
            info!(node = %id, "node marked unresponsive");
            return true;
        }
        false
    }

    /// Counts a successful contact: resets the dead counter and marks the
    /// node OK. Returns true if the status changed.
    pub fn record_success(&self, id: &str) -> bool {
        let mut state = self.write();
        let Some(info) = state.nodes.get_mut(id) else {
            return false;
        };
        info.dead_counter = 0;
        if info.status == NodeStatus::Ok {
            return false;
        }
        info.status = NodeStatus::Ok;
        state.rebuild_partitions();
        info!(node = %id, "node marked ok");
        true
    }

    /// Adds every member not yet on the ring (other than `self_id`) as
    /// UNRESPONSIVE. Returns how many were added.
    pub fn merge_members(&self, entries: &[MemberEntry], self_id: &str) -> usize {
        let mut state = self.write();
        let mut added = 0;
        for entry in entries {
            let addr = entry.addr();
            let id = addr.id();
            if addr.is_incomplete() || id == self_id || state.nodes.contains_key(&id) {
                continue;
            }
            state
                .nodes
                .insert(id, NodeInfo::new(addr, NodeStatus::Unresponsive));
            added += 1;
        }
        if added > 0 {
            state.rebalance();
            info!(added, rf = state.replication_factor, "learned members from peer");
        }
        added
    }

    // ── Lookups ──────────────────────────────────────────────────

    /// Membership table for gossip and join replies.
    #[must_use]
    pub fn members(&self) -> Vec<MemberEntry> {
        self.read().nodes.values().map(MemberEntry::from).collect()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<NodeInfo> {
        self.read().nodes.get(id).cloned()
    }

    #[must_use]
    pub fn status(&self, id: &str) -> Option<NodeStatus> {
        self.read().nodes.get(id).map(|n| n.status)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.read().nodes.contains_key(id)
    }

    /// All physical nodes, ordered by id.
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.read().nodes.values().cloned().collect()
    }

    /// Every node except `self_id`, regardless of status.
    #[must_use]
    pub fn peers(&self, self_id: &str) -> Vec<NodeAddr> {
        self.read()
            .nodes
            .iter()
            .filter(|(id, _)| id.as_str() != self_id)
            .map(|(_, n)| n.addr.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().nodes.is_empty()
    }

    #[must_use]
    pub fn replication_factor(&self) -> usize {
        self.read().replication_factor
    }

    /// Bumped on every membership or health change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.read().version
    }

    /// Tokens owned by node `id`.
    #[must_use]
    pub fn vnode_tokens(&self, id: &str) -> Vec<Token> {
        self.read()
            .nodes
            .get(id)
            .map(|n| n.vnodes.iter().map(|v| token_for(v)).collect())
            .unwrap_or_default()
    }

    /// Up to `replication_factor` distinct OK nodes for `key`, clockwise
    /// from its hash.
    #[must_use]
    pub fn healthy_nodes_for_id(&self, key: &str) -> Vec<NodeAddr> {
        let state = self.read();
        let mut nodes = state.walk_healthy(token_for(key));
        nodes.truncate(state.replication_factor);
        nodes
    }

    /// Every distinct OK node in clockwise order from `key`'s hash. The
    /// first `replication_factor` entries equal
    /// [`healthy_nodes_for_id`](Self::healthy_nodes_for_id); the rest are
    /// substitutes.
    #[must_use]
    pub fn preference_list(&self, key: &str) -> Vec<NodeAddr> {
        self.read().walk_healthy(token_for(key))
    }

    /// First token at or after `key`'s hash (wrapping) owned by an OK node.
    #[must_use]
    pub fn next_healthy_virtual_node(&self, key: &str) -> Option<Token> {
        let state = self.read();
        state
            .walk(token_for(key))
            .find(|(_, id)| state.nodes.get(*id).is_some_and(NodeInfo::is_ok))
            .map(|(token, _)| token)
    }

    /// Replica set of the partition `key` falls into; empty when no node is
    /// healthy.
    #[must_use]
    pub fn partition_for(&self, key: &str) -> Vec<NodeAddr> {
        let Some(token) = self.next_healthy_virtual_node(key) else {
            return Vec::new();
        };
        self.partition(token)
    }

    /// Replica set of the partition starting at `token`.
    #[must_use]
    pub fn partition(&self, token: Token) -> Vec<NodeAddr> {
        self.read()
            .partitions
            .get(&token)
            .cloned()
            .unwrap_or_default()
    }

    /// Full partition table.
    #[must_use]
    pub fn partitions(&self) -> BTreeMap<Token, Vec<NodeAddr>> {
        self.read().partitions.clone()
    }
}

impl RingState {
    /// Tokens clockwise from `start`, wrapping once.
    fn walk(&self, start: Token) -> impl Iterator<Item = (Token, &String)> {
        self.tokens
            .range(start..)
            .chain(self.tokens.range(..start))
            .map(|(&t, id)| (t, id))
    }

    fn walk_healthy(&self, start: Token) -> Vec<NodeAddr> {
        let healthy = self.nodes.values().filter(|n| n.is_ok()).count();
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for (_, id) in self.walk(start) {
            if out.len() == healthy {
                break;
            }
            let Some(info) = self.nodes.get(id) else {
                continue;
            };
            if info.is_ok() && seen.insert(id.as_str()) {
                out.push(info.addr.clone());
            }
        }
        out
    }

    /// Recomputes the replication factor, adjusts every node's vnodes to
    /// match, and rebuilds partitions.
    fn rebalance(&mut self) {
        let rf = self
            .nodes
            .len()
            .saturating_sub(1)
            .clamp(1, MAX_REPLICATION_FACTOR);
        self.replication_factor = rf;

        let mut added = Vec::new();
        let mut removed = Vec::new();
        for (id, info) in &mut self.nodes {
            while info.vnodes.len() < rf {
                let vnode = format!("{id}_vnode{}", info.vnodes.len());
                added.push((token_for(&vnode), id.clone()));
                info.vnodes.push(vnode);
            }
            while info.vnodes.len() > rf {
                if let Some(vnode) = info.vnodes.pop() {
                    removed.push(token_for(&vnode));
                }
            }
        }
        for token in removed {
            self.tokens.remove(&token);
        }
        self.tokens.extend(added);

        self.rebuild_partitions();
    }

    fn rebuild_partitions(&mut self) {
        let mut partitions = BTreeMap::new();
        for (&token, id) in &self.tokens {
            if !self.nodes.get(id).is_some_and(NodeInfo::is_ok) {
                continue;
            }
            let mut replicas = self.walk_healthy(token);
            replicas.truncate(self.replication_factor);
            partitions.insert(token, replicas);
        }
        self.partitions = partitions;
        self.version += 1;
    }
}
