//! Add-Wins Set with a causal dot context.
//!
//! Each add of an element by a node produces a *dot* `(element, node,
//! counter)` where `counter` is the node's next sequence number. The
//! *context* records, per node, the highest counter this replica has seen.
//!
//! Removal deletes the element's dots but keeps the context, so the replica
//! remembers having observed those adds. On merge a dot that only one side
//! holds survives if the other side has not yet observed it
//! (`counter > other.context[node]`); a dot the other side observed and
//! dropped stays removed. A concurrent add produces a dot the remover never
//! saw, so add wins.

use crate::{Crdt, CrdtError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shoplist_types::NodeId;
use std::collections::{BTreeMap, BTreeSet};

/// A single add event: `element` added by `node` at sequence `counter`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dot {
    pub element: String,
    pub node: NodeId,
    pub counter: u32,
}

/// An Add-Wins Set of item names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AWSetWire", into = "AWSetWire")]
pub struct AWSet {
    state: BTreeSet<Dot>,
    context: BTreeMap<NodeId, u32>,
}

/// Compact wire shape: dots and context entries as JSON arrays.
#[derive(Serialize, Deserialize)]
struct AWSetWire {
    #[serde(default)]
    state: Vec<(String, NodeId, u32)>,
    #[serde(default)]
    context: Vec<(NodeId, u32)>,
}

impl From<AWSet> for AWSetWire {
    fn from(set: AWSet) -> Self {
        Self {
            state: set
                .state
                .into_iter()
                .map(|d| (d.element, d.node, d.counter))
                .collect(),
            context: set.context.into_iter().collect(),
        }
    }
}

impl TryFrom<AWSetWire> for AWSet {
    type Error = CrdtError;

    fn try_from(wire: AWSetWire) -> Result<Self, Self::Error> {
        let mut context = BTreeMap::new();
        for (node, counter) in wire.context {
            if counter == 0 {
                continue;
            }
            let entry = context.entry(node).or_insert(0);
            *entry = counter.max(*entry);
        }

        let mut state = BTreeSet::new();
        for (element, node, counter) in wire.state {
            if counter == 0 {
                return Err(CrdtError::ZeroCounter { element, node });
            }
            if counter > context.get(&node).copied().unwrap_or(0) {
                return Err(CrdtError::DotOutsideContext {
                    element,
                    node,
                    counter,
                });
            }
            state.insert(Dot {
                element,
                node,
                counter,
            });
        }

        Ok(Self { state, context })
    }
}

impl AWSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `element` on behalf of `node`.
    ///
    /// Allocates the node's next counter, replaces any earlier dot of the
    /// same `(element, node)` pair and advances the context by one.
    pub fn add(&mut self, element: &str, node: &NodeId) {
        let counter = self.max_counter(node) + 1;
        self.state
            .retain(|d| !(d.element == element && &d.node == node));
        self.state.insert(Dot {
            element: element.to_string(),
            node: node.clone(),
            counter,
        });
        self.context.insert(node.clone(), counter);
    }

    /// Removes every dot of `element`. The context is left untouched.
    pub fn remove(&mut self, element: &str) {
        self.state.retain(|d| d.element != element);
    }

    /// Returns true if any dot carries `element`.
    #[must_use]
    pub fn contains(&self, element: &str) -> bool {
        self.state.iter().any(|d| d.element == element)
    }

    /// Distinct elements, sorted.
    #[must_use]
    pub fn elements(&self) -> Vec<String> {
        let unique: BTreeSet<&str> = self.state.iter().map(|d| d.element.as_str()).collect();
        unique.into_iter().map(str::to_string).collect()
    }

    /// Number of distinct elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Highest counter observed from `node` (0 if never seen).
    #[must_use]
    pub fn max_counter(&self, node: &NodeId) -> u32 {
        self.context.get(node).copied().unwrap_or(0)
    }

    pub fn dots(&self) -> impl Iterator<Item = &Dot> {
        self.state.iter()
    }

    #[must_use]
    pub fn context(&self) -> &BTreeMap<NodeId, u32> {
        &self.context
    }

    /// Hex SHA-256 of the causal context.
    ///
    /// Two replicas with equal digests have observed the same adds. The
    /// digest does not see removals, which read-repair reconciles instead.
    #[must_use]
    pub fn context_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (node, counter) in &self.context {
            hasher.update(node.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(counter.to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn unseen_by<'a>(&'a self, other: &'a Self) -> impl Iterator<Item = &'a Dot> + 'a {
        self.state
            .iter()
            .filter(move |d| d.counter > other.max_counter(&d.node))
    }
}

impl Crdt for AWSet {
    fn merged(&self, other: &Self) -> Self {
        let mut state: BTreeSet<Dot> = self.state.intersection(&other.state).cloned().collect();
        state.extend(self.unseen_by(other).cloned());
        state.extend(other.unseen_by(self).cloned());

        let mut context = self.context.clone();
        for (node, &counter) in &other.context {
            let entry = context.entry(node.clone()).or_insert(0);
            *entry = (*entry).max(counter);
        }

        Self { state, context }
    }

    fn is_dominated_by(&self, other: &Self) -> bool {
        let context_le = self
            .context
            .iter()
            .all(|(node, &counter)| counter <= other.max_counter(node));
        // Every dot of `other` that `self` has observed must still be in `self`,
        // otherwise `self` carries a removal `other` lacks.
        let removals_seen = other
            .state
            .iter()
            .filter(|d| d.counter <= self.max_counter(&d.node))
            .all(|d| self.state.contains(d));
        context_le && removals_seen
    }
}

impl FromIterator<(String, NodeId)> for AWSet {
    fn from_iter<I: IntoIterator<Item = (String, NodeId)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (element, node) in iter {
            set.add(&element, &node);
        }
        set
    }
}
