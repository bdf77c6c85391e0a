//! Consistent-hashing ring for shoplist nodes.
//!
//! Every physical node owns `replication_factor` virtual-node tokens on a
//! 128-bit ring. A key is served by the distinct healthy nodes found walking
//! clockwise from the key's hash. The replication factor, and with it the
//! number of virtual nodes per physical node, follows cluster size:
//! `min(8, nodes - 1)`, never below 1.

mod node;
mod ring;
mod token;

pub use node::{MemberEntry, NodeInfo, NodeStatus};
pub use ring::{HashRing, MAX_REPLICATION_FACTOR};
pub use token::{Token, token_for};
