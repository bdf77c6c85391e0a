//! CRDT implementations for the shoplist store.
//!
//! This crate provides the Conflict-free Replicated Data Types a shopping
//! list is built from:
//!
//! - [`BoundedPNCounter`]: per-item quantity, decrements bounded per node
//! - [`AWSet`]: Add-Wins Set of item names with a causal dot context
//! - [`ShoppingList`]: composition of both, one per list id
//!
//! All CRDTs in this crate satisfy the following properties:
//! - **Commutative**: merge(a, b) == merge(b, a)
//! - **Associative**: merge(merge(a, b), c) == merge(a, merge(b, c))
//! - **Idempotent**: merge(a, a) == a
//!
//! Merges are pure: [`Crdt::merged`] returns a new value and leaves both
//! inputs untouched. Callers holding shared state replace it with the result
//! under their own lock.

mod aw_set;
mod bounded_pn_counter;
mod error;
mod shopping_list;

pub use aw_set::{AWSet, Dot};
pub use bounded_pn_counter::BoundedPNCounter;
pub use error::CrdtError;
pub use shopping_list::ShoppingList;

/// A state-based CRDT: a join-semilattice with a pure merge.
pub trait Crdt: Clone {
    /// Returns the least upper bound of `self` and `other`.
    #[must_use]
    fn merged(&self, other: &Self) -> Self;

    /// Returns true if `self ⊑ other`, i.e. merging `self` into `other`
    /// yields `other` unchanged.
    fn is_dominated_by(&self, other: &Self) -> bool;

    /// Replaces `self` with `self.merged(other)`.
    fn merge(&mut self, other: &Self) {
        *self = self.merged(other);
    }
}
