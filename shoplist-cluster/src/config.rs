use std::time::Duration;

/// Timing knobs for replication and background repair.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Period of the liveness gossip loop.
    pub gossip_interval: Duration,
    /// Period of the anti-entropy loop.
    pub anti_entropy_interval: Duration,
    /// Period of the hinted-handoff loop.
    pub hinted_handoff_interval: Duration,
    /// Timeout of a single replica call.
    pub request_timeout: Duration,
    /// Timeout of a single gossip exchange.
    pub gossip_timeout: Duration,
    /// Overall deadline of a coordinated client read or write.
    pub client_deadline: Duration,
    /// Consecutive gossip failures before a peer is marked UNRESPONSIVE.
    pub dead_threshold: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            gossip_interval: Duration::from_secs(1),
            anti_entropy_interval: Duration::from_secs(60),
            hinted_handoff_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(2),
            gossip_timeout: Duration::from_millis(500),
            client_deadline: Duration::from_secs(5),
            dead_threshold: 3,
        }
    }
}
