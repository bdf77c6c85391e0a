//! Bounded Positive-Negative Counter CRDT.
//!
//! Like a PN-Counter, each node tracks its own increments and decrements in
//! two maps keyed by node id. The difference is the local bound: a node can
//! never decrement more than it has itself incremented, so
//! `negative[n] <= positive[n]` for every `n` and the value never drops
//! below zero.
//!
//! Merge takes the per-node max of both maps, which preserves the bound.

use crate::{Crdt, CrdtError};
use serde::{Deserialize, Serialize};
use shoplist_types::NodeId;
use std::collections::{BTreeMap, BTreeSet};

/// A quantity counter whose per-node decrements are bounded by that node's
/// increments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "CounterWire")]
pub struct BoundedPNCounter {
    #[serde(rename = "positive_count")]
    positive: BTreeMap<NodeId, u32>,
    #[serde(rename = "negative_count")]
    negative: BTreeMap<NodeId, u32>,
}

#[derive(Deserialize)]
struct CounterWire {
    #[serde(default)]
    positive_count: BTreeMap<NodeId, u32>,
    #[serde(default)]
    negative_count: BTreeMap<NodeId, u32>,
}

impl TryFrom<CounterWire> for BoundedPNCounter {
    type Error = CrdtError;

    fn try_from(wire: CounterWire) -> Result<Self, Self::Error> {
        for (node, &negative) in &wire.negative_count {
            let positive = wire.positive_count.get(node).copied().unwrap_or(0);
            if negative > positive {
                return Err(CrdtError::DecrementExceedsIncrement {
                    node: node.clone(),
                    positive,
                    negative,
                });
            }
        }
        Ok(Self {
            positive: wire.positive_count,
            negative: wire.negative_count,
        })
    }
}

impl BoundedPNCounter {
    /// Creates a new counter with value 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter by `amount` on behalf of `node`.
    pub fn increment(&mut self, node: &NodeId, amount: u32) {
        if amount == 0 {
            return;
        }
        let entry = self.positive.entry(node.clone()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Decrements the counter by up to `amount` on behalf of `node`.
    ///
    /// The node's decrements are clamped to its own increments, so a
    /// decrement larger than what the node has added only brings its share
    /// to zero.
    pub fn decrement(&mut self, node: &NodeId, amount: u32) {
        let limit = self.positive.get(node).copied().unwrap_or(0);
        let current = self.negative.get(node).copied().unwrap_or(0);
        let next = current.saturating_add(amount).min(limit);
        if next != current {
            self.negative.insert(node.clone(), next);
        }
    }

    /// Returns `sum(positive) - sum(negative)`; never negative.
    #[must_use]
    pub fn value(&self) -> i64 {
        let pos: i64 = self.positive.values().map(|&v| i64::from(v)).sum();
        let neg: i64 = self.negative.values().map(|&v| i64::from(v)).sum();
        pos - neg
    }

    /// Increments recorded for `node`.
    #[must_use]
    pub fn positive(&self, node: &NodeId) -> u32 {
        self.positive.get(node).copied().unwrap_or(0)
    }

    /// Decrements recorded for `node`.
    #[must_use]
    pub fn negative(&self, node: &NodeId) -> u32 {
        self.negative.get(node).copied().unwrap_or(0)
    }

    fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.positive.keys().chain(self.negative.keys())
    }
}

fn merge_max(a: &BTreeMap<NodeId, u32>, b: &BTreeMap<NodeId, u32>) -> BTreeMap<NodeId, u32> {
    let mut out = a.clone();
    for (node, &count) in b {
        let entry = out.entry(node.clone()).or_insert(0);
        *entry = (*entry).max(count);
    }
    out
}

fn dominated(a: &BTreeMap<NodeId, u32>, b: &BTreeMap<NodeId, u32>) -> bool {
    a.iter()
        .all(|(node, &count)| count <= b.get(node).copied().unwrap_or(0))
}

impl Crdt for BoundedPNCounter {
    fn merged(&self, other: &Self) -> Self {
        Self {
            positive: merge_max(&self.positive, &other.positive),
            negative: merge_max(&self.negative, &other.negative),
        }
    }

    fn is_dominated_by(&self, other: &Self) -> bool {
        dominated(&self.positive, &other.positive) && dominated(&self.negative, &other.negative)
    }
}

impl PartialEq for BoundedPNCounter {
    fn eq(&self, other: &Self) -> bool {
        // Missing entries count as zero
        let nodes: BTreeSet<_> = self.nodes().chain(other.nodes()).collect();
        nodes.into_iter().all(|node| {
            self.positive(node) == other.positive(node)
                && self.negative(node) == other.negative(node)
        })
    }
}

impl Eq for BoundedPNCounter {}
