//! Joining an existing cluster through a seed node.

use crate::error::{ClusterError, ClusterResult};
use crate::node::ClusterNode;
use crate::protocol::{PeerReply, PeerRequest};
use shoplist_types::NodeAddr;
use tracing::{info, warn};

impl ClusterNode {
    /// Announces this node to `seed` and adopts the membership table it
    /// returns. Returns the number of members learned.
    ///
    /// The seed registers the joiner as UNKNOWN; gossip promotes it to OK
    /// once it answers a round.
    pub async fn join(&self, seed: &NodeAddr) -> ClusterResult<usize> {
        if seed.id() == self.id() {
            return Err(ClusterError::Rejected("cannot join through self".into()));
        }
        let request = PeerRequest::Join(self.addr().clone());
        match self
            .call(seed, request, self.config().request_timeout)
            .await?
        {
            PeerReply::Members(members) => {
                let learned = self.ring().merge_members(&members.nodes, &self.id());
                self.ring().record_success(&seed.id());
                info!(seed = %seed, learned, members = self.ring().len(), "joined cluster");
                Ok(learned)
            }
            PeerReply::Rejected(reason) => {
                warn!(seed = %seed, %reason, "join rejected");
                Err(ClusterError::Rejected(reason))
            }
            other => Err(ClusterError::Protocol(format!(
                "expected members, got {}",
                other.kind()
            ))),
        }
    }
}
