//! Liveness gossip.
//!
//! Every round the node sends its membership table to every other member.
//! A peer that answers is reset to OK; one that misses `dead_threshold`
//! consecutive rounds is marked UNRESPONSIVE and routed around until it
//! answers again.

use crate::node::ClusterNode;
use crate::protocol::{MembersMessage, PeerReply, PeerRequest};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Result of one gossip round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GossipReport {
    pub reached: usize,
    pub failed: usize,
    /// Peers skipped because another round with them was in progress.
    pub skipped: usize,
}

impl ClusterNode {
    /// Gossips with every peer once, concurrently.
    pub async fn gossip_round(self: &Arc<Self>) -> GossipReport {
        let mut report = GossipReport::default();
        let mut exchanges = JoinSet::new();

        for peer in self.ring().peers(&self.id()) {
            let Some(guard) = self.try_lock_peer(&peer.id()) else {
                report.skipped += 1;
                continue;
            };
            let node = Arc::clone(self);
            exchanges.spawn(async move {
                let _guard = guard;
                let request = PeerRequest::Gossip(MembersMessage {
                    nodes: node.ring().members(),
                });
                let result = node
                    .call(&peer, request, node.config().gossip_timeout)
                    .await;
                let id = peer.id();
                match result {
                    Ok(PeerReply::Members(members)) => {
                        node.ring().merge_members(&members.nodes, &node.id());
                        node.ring().record_success(&id);
                        true
                    }
                    Ok(other) => {
                        warn!(peer = %peer, reply = other.kind(), "unexpected gossip reply");
                        node.ring().record_failure(&id, node.config().dead_threshold);
                        false
                    }
                    Err(e) => {
                        debug!(peer = %peer, error = %e, "gossip failed");
                        node.ring().record_failure(&id, node.config().dead_threshold);
                        false
                    }
                }
            });
        }

        while let Some(joined) = exchanges.join_next().await {
            match joined {
                Ok(true) => report.reached += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    warn!(error = %e, "gossip task failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
