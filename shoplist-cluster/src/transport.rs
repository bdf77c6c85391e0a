//! Transport layer abstraction.
//!
//! [`PeerTransport`] is the only way a node talks to another. The
//! production implementation is [`HttpTransport`](crate::HttpTransport);
//! [`mock::MemoryNetwork`] routes requests in-process for multi-node tests.

use crate::error::ClusterResult;
use crate::protocol::{PeerReply, PeerRequest};
use async_trait::async_trait;
use shoplist_types::NodeAddr;

/// Sends one request to one peer and waits for its reply.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn request(&self, peer: &NodeAddr, request: PeerRequest) -> ClusterResult<PeerReply>;
}

/// An in-memory transport for testing.
pub mod mock {
    use super::*;
    use crate::error::ClusterError;
    use crate::node::ClusterNode;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, RwLock, Weak};

    /// Routes requests straight to registered [`ClusterNode`]s.
    ///
    /// Nodes can be marked down, in which case requests to them fail like a
    /// refused connection, or stalled, in which case requests never answer.
    #[derive(Default)]
    pub struct MemoryNetwork {
        nodes: RwLock<HashMap<String, Weak<ClusterNode>>>,
        down: RwLock<HashSet<String>>,
        stalled: RwLock<HashSet<String>>,
        requests: RwLock<Vec<(String, &'static str)>>,
    }

    impl MemoryNetwork {
        #[must_use]
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Makes `node` reachable at its address.
        pub fn register(&self, node: &Arc<ClusterNode>) {
            self.nodes
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(node.id(), Arc::downgrade(node));
        }

        /// Marks a node unreachable (`true`) or reachable again (`false`).
        pub fn set_down(&self, id: &str, down: bool) {
            let mut set = self.down.write().unwrap_or_else(|e| e.into_inner());
            if down {
                set.insert(id.to_string());
            } else {
                set.remove(id);
            }
        }

        /// Makes requests to a node hang (`true`) until the caller gives up,
        /// or answer normally again (`false`).
        pub fn set_stalled(&self, id: &str, stalled: bool) {
            let mut set = self.stalled.write().unwrap_or_else(|e| e.into_inner());
            if stalled {
                set.insert(id.to_string());
            } else {
                set.remove(id);
            }
        }

        fn is_stalled(&self, id: &str) -> bool {
            self.stalled
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .contains(id)
        }

        /// Every `(peer id, request kind)` sent so far.
        #[must_use]
        pub fn requests(&self) -> Vec<(String, &'static str)> {
            self.requests
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }

        pub fn clear_requests(&self) {
            self.requests
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .clear();
        }

        fn lookup(&self, id: &str) -> ClusterResult<Arc<ClusterNode>> {
            if self
                .down
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .contains(id)
            {
                return Err(ClusterError::Network(format!("connection refused: {id}")));
            }
            self.nodes
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(id)
                .and_then(Weak::upgrade)
                .ok_or_else(|| ClusterError::Network(format!("no route to {id}")))
        }
    }

    #[async_trait]
    impl PeerTransport for MemoryNetwork {
        async fn request(&self, peer: &NodeAddr, request: PeerRequest) -> ClusterResult<PeerReply> {
            let id = peer.id();
            self.requests
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .push((id.clone(), request.kind()));
            if self.is_stalled(&id) {
                std::future::pending::<()>().await;
            }
            let node = self.lookup(&id)?;
            node.handle(request).await
        }
    }
}
