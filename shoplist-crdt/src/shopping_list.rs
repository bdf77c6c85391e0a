//! Shopping list: an [`AWSet`] of item names plus a quantity counter per item.

use crate::{AWSet, BoundedPNCounter, Crdt};
use serde::{Deserialize, Serialize};
use shoplist_types::NodeId;
use std::collections::BTreeMap;

/// One replicated shopping list.
///
/// `node_id` is the writer identity local operations are attributed to. It
/// is not replicated state: merges keep the receiver's id and equality
/// ignores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingList {
    pub node_id: NodeId,
    #[serde(default)]
    items: BTreeMap<String, BoundedPNCounter>,
    #[serde(default)]
    awset: AWSet,
}

impl ShoppingList {
    /// Creates an empty list owned by `node_id`.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            items: BTreeMap::new(),
            awset: AWSet::new(),
        }
    }

    /// Changes the quantity of `name` by `delta`.
    ///
    /// Positive deltas increment and negative deltas decrement (clamped to
    /// this writer's own increments). Any non-zero delta (re-)adds the name
    /// to the set, so a concurrent removal elsewhere loses.
    pub fn add_or_update_item(&mut self, name: &str, delta: i64) {
        if delta == 0 {
            return;
        }
        let amount = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
        let counter = self.items.entry(name.to_string()).or_default();
        if delta > 0 {
            counter.increment(&self.node_id, amount);
        } else {
            counter.decrement(&self.node_id, amount);
        }
        self.awset.add(name, &self.node_id);
    }

    /// Removes `name` from the list.
    ///
    /// Only the name leaves the set. Its counter is kept so merges stay
    /// associative, so a later re-add continues from the retained quantity:
    ///
    /// ```
    /// use shoplist_crdt::ShoppingList;
    ///
    /// let mut list = ShoppingList::new("a");
    /// list.add_or_update_item("milk", 3);
    /// list.remove_item("milk");
    /// assert_eq!(list.quantity("milk"), None);
    ///
    /// list.add_or_update_item("milk", 1);
    /// assert_eq!(list.quantity("milk"), Some(4));
    /// ```
    pub fn remove_item(&mut self, name: &str) {
        self.awset.remove(name);
    }

    /// Current quantity of `name`, or `None` if it is not on the list.
    #[must_use]
    pub fn quantity(&self, name: &str) -> Option<i64> {
        if !self.awset.contains(name) {
            return None;
        }
        Some(self.items.get(name).map_or(0, BoundedPNCounter::value))
    }

    /// Names currently on the list, sorted.
    #[must_use]
    pub fn item_names(&self) -> Vec<String> {
        self.awset.elements()
    }

    /// Visible items with their quantities.
    #[must_use]
    pub fn items(&self) -> BTreeMap<String, i64> {
        self.item_names()
            .into_iter()
            .map(|name| {
                let qty = self.items.get(&name).map_or(0, BoundedPNCounter::value);
                (name, qty)
            })
            .collect()
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> Option<&BoundedPNCounter> {
        self.items.get(name)
    }

    #[must_use]
    pub fn awset(&self) -> &AWSet {
        &self.awset
    }

    /// Digest of the list's causal context, used by anti-entropy.
    #[must_use]
    pub fn context_digest(&self) -> String {
        self.awset.context_digest()
    }

    /// Returns a copy of this list attributed to another writer.
    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<NodeId>) -> Self {
        self.node_id = node_id.into();
        self
    }
}

impl Crdt for ShoppingList {
    fn merged(&self, other: &Self) -> Self {
        let awset = self.awset.merged(&other.awset);

        let mut items = self.items.clone();
        for (name, counter) in &other.items {
            let merged = match items.get(name) {
                Some(mine) => mine.merged(counter),
                None => counter.clone(),
            };
            items.insert(name.clone(), merged);
        }

        Self {
            node_id: self.node_id.clone(),
            items,
            awset,
        }
    }

    fn is_dominated_by(&self, other: &Self) -> bool {
        let empty = BoundedPNCounter::new();
        self.awset.is_dominated_by(&other.awset)
            && self
                .items
                .iter()
                .all(|(name, c)| c.is_dominated_by(other.items.get(name).unwrap_or(&empty)))
    }
}

impl PartialEq for ShoppingList {
    fn eq(&self, other: &Self) -> bool {
        let empty = BoundedPNCounter::new();
        self.awset == other.awset
            && self
                .items
                .keys()
                .chain(other.items.keys())
                .all(|name| {
                    self.items.get(name).unwrap_or(&empty)
                        == other.items.get(name).unwrap_or(&empty)
                })
    }
}

impl Eq for ShoppingList {}
