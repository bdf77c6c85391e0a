//! Push-pull anti-entropy.
//!
//! A round picks up to `replication_factor` peers that share a partition
//! with this node. With each one:
//!
//! 1. PULL: send `list_id → context digest` for every local list; the peer
//!    answers with its copy of each list both sides hold whose digest
//!    differs. Lists only one side holds are left alone.
//! 2. MERGE+PUSH: merge and persist each returned list locally, then push
//!    the merged lists back so the peer converges too.
//!
//! Digests only cover the causal context, so two copies that saw the same
//! adds but different removals compare equal here; read repair covers that.

use crate::error::{ClusterError, ClusterResult};
use crate::node::ClusterNode;
use crate::protocol::{DigestMessage, ListsMessage, PeerReply, PeerRequest};
use rand::seq::SliceRandom;
use shoplist_types::NodeAddr;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one anti-entropy round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AntiEntropyReport {
    pub peers: usize,
    /// Lists that differed and were reconciled.
    pub reconciled: usize,
    pub failed: usize,
}

impl ClusterNode {
    /// Peers sharing a partition with one of this node's tokens, shuffled,
    /// at most `replication_factor` of them.
    #[must_use]
    pub fn anti_entropy_peers(&self) -> Vec<NodeAddr> {
        let self_id = self.id();
        let ring = self.ring();
        let mut seen = BTreeSet::new();
        let mut peers: Vec<NodeAddr> = ring
            .vnode_tokens(&self_id)
            .into_iter()
            .flat_map(|token| ring.partition(token))
            .filter(|addr| addr.id() != self_id && seen.insert(addr.id()))
            .collect();
        peers.shuffle(&mut rand::thread_rng());
        peers.truncate(ring.replication_factor());
        peers
    }

    /// Runs one anti-entropy round with the selected peers.
    pub async fn anti_entropy_round(self: &Arc<Self>) -> AntiEntropyReport {
        let peers = self.anti_entropy_peers();
        let mut report = AntiEntropyReport::default();

        for peer in peers {
            let Some(_guard) = self.try_lock_peer(&peer.id()) else {
                debug!(peer = %peer, "peer busy, skipping anti-entropy");
                continue;
            };
            report.peers += 1;
            match self.sync_with_peer(&peer).await {
                Ok(count) => report.reconciled += count,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "anti-entropy failed");
                    report.failed += 1;
                }
            }
        }

        if report.reconciled > 0 {
            info!(
                peers = report.peers,
                reconciled = report.reconciled,
                "anti-entropy round reconciled lists"
            );
        }
        report
    }

    /// Pull-merge-push with one peer. Returns the number of lists reconciled.
    pub async fn sync_with_peer(&self, peer: &NodeAddr) -> ClusterResult<usize> {
        let timeout = self.config().request_timeout;
        let digests = self.blocking(|store| store.digests()).await?;

        let differing = match self
            .call(peer, PeerRequest::DigestPull(DigestMessage { digests }), timeout)
            .await?
        {
            PeerReply::Lists(msg) => msg.lists,
            other => {
                return Err(ClusterError::Protocol(format!(
                    "expected lists, got {}",
                    other.kind()
                )));
            }
        };
        if differing.is_empty() {
            return Ok(0);
        }

        let merged = self
            .blocking(move |store| {
                let mut out = BTreeMap::new();
                for (id, remote) in differing {
                    let list = store.merge_and_store(&id, &remote)?;
                    out.insert(id, list);
                }
                Ok(out)
            })
            .await?;
        let count = merged.len();

        match self
            .call(peer, PeerRequest::MergedPush(ListsMessage { lists: merged }), timeout)
            .await?
        {
            PeerReply::Ack => {
                debug!(peer = %peer, count, "anti-entropy push acknowledged");
                Ok(count)
            }
            other => Err(ClusterError::Protocol(format!(
                "expected ack, got {}",
                other.kind()
            ))),
        }
    }
}
