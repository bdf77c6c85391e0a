//! Inter-node protocol messages.
//!
//! The protocol is request-response over HTTP:
//! 1. Replica reads and writes carry a list id (and the list, for writes)
//! 2. Gossip and join exchange membership tables
//! 3. Anti-entropy sends a digest, gets back the lists whose digests
//!    differ, then pushes the merged lists
//!
//! [`PeerRequest`] and [`PeerReply`] are the transport-neutral forms; the
//! structs below are their JSON bodies.

use serde::{Deserialize, Serialize};
use shoplist_crdt::ShoppingList;
use shoplist_ring::MemberEntry;
use shoplist_types::{ListId, NodeAddr};
use std::collections::BTreeMap;

/// Body of a read, `{list_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub list_id: ListId,
}

/// Body of a write, `{list_id, content}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub list_id: ListId,
    pub content: ShoppingList,
}

/// Membership table, `{nodes: [{address, port, status}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersMessage {
    #[serde(default)]
    pub nodes: Vec<MemberEntry>,
}

/// Anti-entropy digest, `{digests: {list_id: hex}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestMessage {
    #[serde(default)]
    pub digests: BTreeMap<ListId, String>,
}

/// A batch of lists, `{lists: {list_id: ShoppingList}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListsMessage {
    #[serde(default)]
    pub lists: BTreeMap<ListId, ShoppingList>,
}

/// Acknowledgement of a coordinated write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub acks: usize,
    pub required: usize,
}

/// Generic `{message}` body (ping, errors).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A request from one node to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRequest {
    /// Read the replica's local copy.
    Read(ReadRequest),
    /// Merge a list into the replica's local copy.
    Write(WriteRequest),
    /// Liveness gossip carrying the sender's membership table.
    Gossip(MembersMessage),
    /// Anti-entropy pull: the sender's digests.
    DigestPull(DigestMessage),
    /// Anti-entropy push: lists merged by the sender.
    MergedPush(ListsMessage),
    /// Ask to be added to the receiver's ring.
    Join(NodeAddr),
    Ping,
}

impl PeerRequest {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Write(_) => "write",
            Self::Gossip(_) => "gossip",
            Self::DigestPull(_) => "digest_pull",
            Self::MergedPush(_) => "merged_push",
            Self::Join(_) => "join",
            Self::Ping => "ping",
        }
    }
}

/// A reply to a [`PeerRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerReply {
    /// The replica's copy of a list.
    List(ShoppingList),
    /// The replica holds no copy.
    NotFound,
    /// The write or push was applied.
    Ack,
    /// Lists whose digests differ (reply to a digest pull).
    Lists(ListsMessage),
    /// The receiver's membership table (reply to gossip or join).
    Members(MembersMessage),
    Pong,
    /// The receiver refused the request (e.g. duplicate join).
    Rejected(String),
}

impl PeerReply {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::NotFound => "not_found",
            Self::Ack => "ack",
            Self::Lists(_) => "lists",
            Self::Members(_) => "members",
            Self::Pong => "pong",
            Self::Rejected(_) => "rejected",
        }
    }
}
