//! Quorum coordinator for client reads and writes.
//!
//! ```text
//! SELECT_REPLICAS → FANOUT → AWAIT_QUORUM → { SUCCEED | RETRY_WITH_NEXT_REPLICA | FAIL }
//! ```
//!
//! Candidates come from the ring's preference list. The first
//! `replication_factor` are shuffled so load spreads across replicas; the
//! rest are substitutes. `required = N/2 + 1` calls are dispatched at once
//! and every failure is replaced by the next unused candidate until the
//! quorum is met, candidates run out, or the client deadline passes.

use crate::error::{ClusterError, ClusterResult};
use crate::node::ClusterNode;
use crate::protocol::{PeerReply, PeerRequest, ReadRequest, WriteAck, WriteRequest};
use rand::seq::SliceRandom;
use shoplist_crdt::{Crdt, ShoppingList};
use shoplist_types::{ListId, NodeAddr};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Majority of `n`: `n / 2 + 1`.
#[must_use]
pub fn quorum_size(n: usize) -> usize {
    n / 2 + 1
}

/// Replies gathered by one quorum round.
#[derive(Debug, Default)]
pub(crate) struct QuorumOutcome {
    pub replies: Vec<(NodeAddr, PeerReply)>,
    pub failures: usize,
    pub required: usize,
}

/// Puts the first `n` candidates in random order.
fn shuffle_head(candidates: &mut [NodeAddr], n: usize) {
    let n = n.min(candidates.len());
    candidates[..n].shuffle(&mut rand::thread_rng());
}

impl ClusterNode {
    /// Coordinated write: merges `list` into a quorum of replicas.
    pub async fn coordinate_write(
        self: &Arc<Self>,
        id: &ListId,
        list: ShoppingList,
    ) -> ClusterResult<WriteAck> {
        let candidates = self.ring().preference_list(id.as_str());
        let rf = self.ring().replication_factor();
        self.write_to(candidates, rf, id, list).await
    }

    /// Coordinated write over an explicit candidate list.
    pub async fn write_to(
        self: &Arc<Self>,
        mut candidates: Vec<NodeAddr>,
        replication_factor: usize,
        id: &ListId,
        list: ShoppingList,
    ) -> ClusterResult<WriteAck> {
        shuffle_head(&mut candidates, replication_factor);
        let n = replication_factor.min(candidates.len());
        let request = PeerRequest::Write(WriteRequest {
            list_id: id.clone(),
            content: list,
        });

        let outcome = self
            .quorum(candidates, n, request, |reply| matches!(reply, PeerReply::Ack))
            .await;
        let acks = outcome.replies.len();
        if n > 0 && acks >= outcome.required {
            debug!(list_id = %id, acks, required = outcome.required, "write quorum met");
            Ok(WriteAck {
                acks,
                required: outcome.required,
            })
        } else {
            warn!(list_id = %id, acks, required = outcome.required, "write quorum failed");
            Err(ClusterError::Unavailable(format!(
                "write reached {acks} of {} required replicas",
                outcome.required
            )))
        }
    }

    /// Coordinated read. `Ok(None)` when every replica reached answered
    /// "not found"; `Unavailable` when none was reached.
    pub async fn coordinate_read(self: &Arc<Self>, id: &ListId) -> ClusterResult<Option<ShoppingList>> {
        let candidates = self.ring().preference_list(id.as_str());
        let rf = self.ring().replication_factor();
        self.read_from(candidates, rf, id).await
    }

    /// Coordinated read over an explicit candidate list.
    pub async fn read_from(
        self: &Arc<Self>,
        mut candidates: Vec<NodeAddr>,
        replication_factor: usize,
        id: &ListId,
    ) -> ClusterResult<Option<ShoppingList>> {
        shuffle_head(&mut candidates, replication_factor);
        let n = replication_factor.min(candidates.len());
        let request = PeerRequest::Read(ReadRequest {
            list_id: id.clone(),
        });

        let outcome = self
            .quorum(candidates, n, request, |reply| {
                matches!(reply, PeerReply::List(_) | PeerReply::NotFound)
            })
            .await;
        if outcome.replies.is_empty() {
            warn!(list_id = %id, failures = outcome.failures, "no replica reachable for read");
            return Err(ClusterError::Unavailable(format!(
                "no replica of {id} reachable"
            )));
        }

        let merged = outcome
            .replies
            .iter()
            .filter_map(|(_, reply)| match reply {
                PeerReply::List(list) => Some(list),
                _ => None,
            })
            .fold(None::<ShoppingList>, |acc, list| {
                Some(match acc {
                    Some(acc) => acc.merged(list),
                    None => list.clone(),
                })
            });

        let Some(merged) = merged else {
            return Ok(None);
        };
        self.spawn_read_repair(id, &merged, &outcome.replies);
        Ok(Some(merged))
    }

    /// Writes `merged` back to every replica read whose copy differs.
    fn spawn_read_repair(
        self: &Arc<Self>,
        id: &ListId,
        merged: &ShoppingList,
        replies: &[(NodeAddr, PeerReply)],
    ) {
        let stale: Vec<NodeAddr> = replies
            .iter()
            .filter(|(_, reply)| !matches!(reply, PeerReply::List(list) if list == merged))
            .map(|(addr, _)| addr.clone())
            .collect();
        if stale.is_empty() {
            return;
        }

        let node = Arc::clone(self);
        let id = id.clone();
        let merged = merged.clone();
        tokio::spawn(async move {
            let timeout = node.config().request_timeout;
            for peer in stale {
                let request = PeerRequest::Write(WriteRequest {
                    list_id: id.clone(),
                    content: merged.clone(),
                });
                match node.call(&peer, request, timeout).await {
                    Ok(PeerReply::Ack) => debug!(peer = %peer, list_id = %id, "read repair applied"),
                    Ok(other) => warn!(peer = %peer, reply = other.kind(), "unexpected read repair reply"),
                    Err(e) => warn!(peer = %peer, list_id = %id, error = %e, "read repair failed"),
                }
            }
        });
    }

    /// Dispatches `request` to `required` candidates at a time until that
    /// many replies satisfy `accept`, substituting failed candidates.
    pub(crate) async fn quorum<F>(
        self: &Arc<Self>,
        candidates: Vec<NodeAddr>,
        n: usize,
        request: PeerRequest,
        accept: F,
    ) -> QuorumOutcome
    where
        F: Fn(&PeerReply) -> bool,
    {
        let required = quorum_size(n);
        let mut outcome = QuorumOutcome {
            required,
            ..QuorumOutcome::default()
        };
        if n == 0 {
            return outcome;
        }

        let deadline = Instant::now() + self.config().client_deadline;
        let timeout = self.config().request_timeout;
        let mut pending = candidates.into_iter();
        let mut calls = JoinSet::new();

        let spawn = |calls: &mut JoinSet<_>, peer: NodeAddr| {
            let node = Arc::clone(self);
            let request = request.clone();
            calls.spawn(async move {
                let result = node.call(&peer, request, timeout).await;
                (peer, result)
            });
        };

        for peer in pending.by_ref().take(required) {
            spawn(&mut calls, peer);
        }

        while outcome.replies.len() < required {
            let joined = match tokio::time::timeout_at(deadline, calls.join_next()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    warn!(required, got = outcome.replies.len(), "client deadline reached");
                    break;
                }
            };
            match joined {
                Ok((peer, Ok(reply))) if accept(&reply) => {
                    outcome.replies.push((peer, reply));
                    continue;
                }
                Ok((peer, Ok(reply))) => {
                    warn!(peer = %peer, reply = reply.kind(), "unexpected replica reply");
                }
                Ok((peer, Err(e))) => {
                    debug!(peer = %peer, error = %e, "replica call failed");
                }
                Err(e) => warn!(error = %e, "replica call task failed"),
            }
            outcome.failures += 1;
            if let Some(next) = pending.next() {
                spawn(&mut calls, next);
            }
        }

        // Abandon calls still in flight.
        calls.abort_all();
        outcome
    }
}
