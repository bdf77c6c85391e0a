//! Background loops: gossip, anti-entropy and hinted handoff.

use crate::node::ClusterNode;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Handles of the running background loops.
///
/// Dropping it stops every loop.
pub struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Signals every loop to stop and waits until they have.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!("background tasks stopped");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Starts the gossip, anti-entropy and hinted-handoff loops for `node`.
pub fn spawn_background(node: Arc<ClusterNode>) -> BackgroundTasks {
    let (tx, rx) = watch::channel(false);
    let config = node.config().clone();

    let handles = vec![
        spawn_loop("gossip", config.gossip_interval, rx.clone(), {
            let node = Arc::clone(&node);
            let seen_version = Arc::new(AtomicU64::new(node.ring().version()));
            move || {
                let node = Arc::clone(&node);
                let seen_version = Arc::clone(&seen_version);
                async move {
                    let report = node.gossip_round().await;
                    debug!(?report, "gossip round");
                    if let Some(report) = node.handoff_on_ring_change(&seen_version).await {
                        debug!(?report, "hinted handoff after ring change");
                    }
                }
            }
        }),
        spawn_loop("anti-entropy", config.anti_entropy_interval, rx.clone(), {
            let node = Arc::clone(&node);
            move || {
                let node = Arc::clone(&node);
                async move {
                    let report = node.anti_entropy_round().await;
                    debug!(?report, "anti-entropy round");
                }
            }
        }),
        spawn_loop("hinted-handoff", config.hinted_handoff_interval, rx, {
            let node = Arc::clone(&node);
            move || {
                let node = Arc::clone(&node);
                async move {
                    let report = node.hinted_handoff_round().await;
                    debug!(?report, "hinted handoff round");
                }
            }
        }),
    ];

    info!(node = %node.id(), "background tasks started");
    BackgroundTasks {
        shutdown: tx,
        handles,
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut round: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh node settles.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => round().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(task = name, "loop stopping");
                        break;
                    }
                }
            }
        }
    })
}
