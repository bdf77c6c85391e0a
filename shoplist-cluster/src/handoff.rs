//! Hinted handoff: moves lists this node holds but no longer owns.
//!
//! After membership or health changes a list can end up on a node outside
//! its partition. Each round finds those lists, writes them to every node
//! of the correct partition, and deletes the local copy once a majority of
//! the partition (capped at its size) acknowledged. Besides its own period,
//! a round also runs after any gossip round that changed the ring.

use crate::node::ClusterNode;
use crate::protocol::{PeerReply, PeerRequest, WriteRequest};
use shoplist_crdt::ShoppingList;
use shoplist_types::{ListId, NodeAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A list stored here that belongs to `targets`.
#[derive(Debug, Clone)]
pub struct Relocation {
    pub list_id: ListId,
    pub targets: Vec<NodeAddr>,
}

/// Result of one hinted-handoff round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandoffReport {
    pub relocated: usize,
    pub retained: usize,
}

/// Acks needed before the local copy may be dropped.
#[must_use]
pub fn handoff_quorum(replication_factor: usize, targets: usize) -> usize {
    (replication_factor / 2 + 1).min(targets)
}

impl ClusterNode {
    /// Lists whose partition does not include this node.
    pub async fn pending_relocations(&self) -> Vec<Relocation> {
        let ids = match self.blocking(|store| store.list_ids()).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "could not scan lists for handoff");
                return Vec::new();
            }
        };
        let self_id = self.id();
        ids.into_iter()
            .filter_map(|list_id| {
                let targets = self.ring().partition_for(list_id.as_str());
                let misplaced = !targets.is_empty() && targets.iter().all(|a| a.id() != self_id);
                misplaced.then_some(Relocation { list_id, targets })
            })
            .collect()
    }

    /// Runs one hinted-handoff round.
    pub async fn hinted_handoff_round(self: &Arc<Self>) -> HandoffReport {
        let mut report = HandoffReport::default();
        for relocation in self.pending_relocations().await {
            if self.relocate(&relocation).await {
                report.relocated += 1;
            } else {
                report.retained += 1;
            }
        }
        if report.relocated > 0 {
            info!(relocated = report.relocated, retained = report.retained, "hinted handoff round");
        }
        report
    }

    /// Runs a handoff round if the ring changed since the version in `seen`,
    /// and records the current version there.
    pub async fn handoff_on_ring_change(
        self: &Arc<Self>,
        seen: &AtomicU64,
    ) -> Option<HandoffReport> {
        let version = self.ring().version();
        if seen.swap(version, Ordering::AcqRel) == version {
            return None;
        }
        debug!(version, "ring changed, checking for misplaced lists");
        Some(self.hinted_handoff_round().await)
    }

    /// Sends one list to its partition; deletes it locally on enough acks.
    async fn relocate(self: &Arc<Self>, relocation: &Relocation) -> bool {
        let id = &relocation.list_id;
        let list = match self.local_read(id).await {
            Ok(Some(list)) => list,
            Ok(None) => return false,
            Err(e) => {
                warn!(list_id = %id, error = %e, "could not read list for handoff");
                return false;
            }
        };

        let required = handoff_quorum(self.ring().replication_factor(), relocation.targets.len());
        let acks = self.send_to_all(id, &list, &relocation.targets).await;
        if acks < required {
            debug!(list_id = %id, acks, required, "handoff not acknowledged, keeping local copy");
            return false;
        }

        // A write may have landed while the copies were in flight.
        match self.local_read(id).await {
            Ok(Some(current)) if current == list => {}
            Ok(_) => return false,
            Err(e) => {
                warn!(list_id = %id, error = %e, "could not re-read list after handoff");
                return false;
            }
        }
        let delete_id = id.clone();
        match self.blocking(move |store| store.delete(&delete_id)).await {
            Ok(()) => {
                debug!(list_id = %id, acks, "handed off list");
                true
            }
            Err(e) => {
                warn!(list_id = %id, error = %e, "could not delete handed-off list");
                false
            }
        }
    }

    async fn send_to_all(self: &Arc<Self>, id: &ListId, list: &ShoppingList, targets: &[NodeAddr]) -> usize {
        let timeout = self.config().request_timeout;
        let mut sends = JoinSet::new();
        for peer in targets.iter().cloned() {
            let node = Arc::clone(self);
            let request = PeerRequest::Write(WriteRequest {
                list_id: id.clone(),
                content: list.clone(),
            });
            sends.spawn(async move { node.call(&peer, request, timeout).await });
        }

        let mut acks = 0;
        while let Some(joined) = sends.join_next().await {
            if matches!(joined, Ok(Ok(PeerReply::Ack))) {
                acks += 1;
            }
        }
        acks
    }
}
