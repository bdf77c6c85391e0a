//! A cluster member: ring, store and transport bundled with the handlers
//! that serve peer requests against the local replica.

use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::protocol::{
    DigestMessage, ListsMessage, MembersMessage, PeerReply, PeerRequest, ReadRequest, WriteRequest,
};
use crate::transport::PeerTransport;
use dashmap::DashMap;
use shoplist_crdt::ShoppingList;
use shoplist_ring::{HashRing, NodeStatus};
use shoplist_storage::{ListStore, StorageResult};
use shoplist_types::{ListId, NodeAddr};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// One storage node of the cluster.
pub struct ClusterNode {
    addr: NodeAddr,
    id: String,
    ring: Arc<HashRing>,
    store: Arc<ListStore>,
    transport: Arc<dyn PeerTransport>,
    config: ClusterConfig,
    /// Serializes gossip and anti-entropy rounds per peer.
    peer_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ClusterNode {
    /// Creates a node and registers it on `ring` as OK.
    pub fn new(
        addr: NodeAddr,
        ring: Arc<HashRing>,
        store: Arc<ListStore>,
        transport: Arc<dyn PeerTransport>,
        config: ClusterConfig,
    ) -> Arc<Self> {
        let id = addr.id();
        if !ring.add_node(&addr.address, &addr.port, true) {
            ring.set_status(&id, NodeStatus::Ok);
        }
        info!(node = %id, "cluster node created");
        Arc::new(Self {
            addr,
            id,
            ring,
            store,
            transport,
            config,
            peer_locks: DashMap::new(),
        })
    }

    #[must_use]
    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }

    /// Ring identity, `address:port`.
    #[must_use]
    pub fn id(&self) -> String {
        self.id.clone()
    }

    #[must_use]
    pub fn ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ListStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Sends `request` to `peer` with a timeout. Requests addressed to this
    /// node are served in-process.
    pub async fn call(
        &self,
        peer: &NodeAddr,
        request: PeerRequest,
        timeout: Duration,
    ) -> ClusterResult<PeerReply> {
        let fut = async {
            if peer.id() == self.id {
                self.handle(request).await
            } else {
                self.transport.request(peer, request).await
            }
        };
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| ClusterError::Timeout)?
    }

    /// Checks that `peer` answers.
    pub async fn ping(&self, peer: &NodeAddr) -> ClusterResult<()> {
        match self
            .call(peer, PeerRequest::Ping, self.config.request_timeout)
            .await?
        {
            PeerReply::Pong => Ok(()),
            other => Err(ClusterError::Protocol(format!(
                "expected pong, got {}",
                other.kind()
            ))),
        }
    }

    /// Non-blocking per-peer lock; `None` if a round with `peer` is already
    /// in progress.
    pub(crate) fn try_lock_peer(&self, peer: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = self.peer_locks.entry(peer.to_string()).or_default().clone();
        lock.try_lock_owned().ok()
    }

    // ── Inbound ──────────────────────────────────────────────────

    /// Serves a peer request against the local replica.
    pub async fn handle(&self, request: PeerRequest) -> ClusterResult<PeerReply> {
        match request {
            PeerRequest::Read(ReadRequest { list_id }) => Ok(match self.local_read(&list_id).await? {
                Some(list) => PeerReply::List(list),
                None => PeerReply::NotFound,
            }),
            PeerRequest::Write(WriteRequest { list_id, content }) => {
                self.local_write(&list_id, content).await?;
                Ok(PeerReply::Ack)
            }
            PeerRequest::Gossip(members) => Ok(PeerReply::Members(self.handle_gossip(&members))),
            PeerRequest::DigestPull(digest) => {
                Ok(PeerReply::Lists(self.handle_digest_pull(digest).await?))
            }
            PeerRequest::MergedPush(lists) => {
                self.handle_merged_push(lists).await?;
                Ok(PeerReply::Ack)
            }
            PeerRequest::Join(addr) => {
                if addr.is_incomplete() {
                    return Err(ClusterError::Protocol(format!("incomplete address {addr}")));
                }
                Ok(match self.handle_join(&addr) {
                    Ok(members) => PeerReply::Members(members),
                    Err(reason) => PeerReply::Rejected(reason),
                })
            }
            PeerRequest::Ping => Ok(PeerReply::Pong),
        }
    }

    /// Reads the local copy of a list.
    pub async fn local_read(&self, id: &ListId) -> ClusterResult<Option<ShoppingList>> {
        let id = id.clone();
        self.blocking(move |store| store.get(&id)).await
    }

    /// Merges `list` into the local copy and returns the result.
    pub async fn local_write(&self, id: &ListId, list: ShoppingList) -> ClusterResult<ShoppingList> {
        let id = id.clone();
        self.blocking(move |store| store.merge_and_store(&id, &list))
            .await
    }

    /// Merges the sender's membership table and returns ours.
    pub fn handle_gossip(&self, members: &MembersMessage) -> MembersMessage {
        self.ring.merge_members(&members.nodes, &self.id);
        MembersMessage {
            nodes: self.ring.members(),
        }
    }

    /// Returns full lists for keys both sides hold whose digests differ.
    pub async fn handle_digest_pull(&self, remote: DigestMessage) -> ClusterResult<ListsMessage> {
        let local = self.blocking(|store| store.digests()).await?;
        let differing: Vec<ListId> = remote
            .digests
            .into_iter()
            .filter(|(id, hash)| local.get(id).is_some_and(|mine| mine != hash))
            .map(|(id, _)| id)
            .collect();

        if differing.is_empty() {
            return Ok(ListsMessage::default());
        }
        let lists = self
            .blocking(move |store| {
                let mut out = BTreeMap::new();
                for id in differing {
                    if let Some(list) = store.get(&id)? {
                        out.insert(id, list);
                    }
                }
                Ok(out)
            })
            .await?;
        debug!(count = lists.len(), "digest pull answered");
        Ok(ListsMessage { lists })
    }

    /// Merges and persists lists pushed by an anti-entropy peer.
    pub async fn handle_merged_push(&self, pushed: ListsMessage) -> ClusterResult<usize> {
        self.blocking(move |store| {
            let count = pushed.lists.len();
            for (id, list) in &pushed.lists {
                store.merge_and_store(id, list)?;
            }
            Ok(count)
        })
        .await
    }

    /// Adds a joining node as UNKNOWN. Errors with a reason when the node is
    /// already a member.
    pub fn handle_join(&self, addr: &NodeAddr) -> Result<MembersMessage, String> {
        if !self
            .ring
            .add_node_with_status(addr, NodeStatus::Unknown)
        {
            warn!(node = %addr, "rejected duplicate join");
            return Err(format!("node {addr} is already a member"));
        }
        info!(node = %addr, "node joined");
        Ok(MembersMessage {
            nodes: self.ring.members(),
        })
    }

    /// Runs a store operation on the blocking pool.
    pub(crate) async fn blocking<T, F>(&self, f: F) -> ClusterResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ListStore) -> StorageResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || f(&store)).await {
            Ok(result) => result.map_err(Into::into),
            Err(e) => Err(ClusterError::Internal(format!("storage task failed: {e}"))),
        }
    }
}
