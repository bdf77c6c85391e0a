//! Storage layer for shoplist nodes.
//!
//! # Architecture
//!
//! - [`KvStore`] is the durable engine: an opaque `key → bytes` map with
//!   `get`/`put`/`delete`/`commit` and an atomic `write_batch`.
//!   [`SqliteStore`] backs it with a single SQLite table; [`MemoryStore`]
//!   keeps everything in a map for tests and ephemeral nodes.
//! - [`ListStore`] layers typed [`ShoppingList`](shoplist_crdt::ShoppingList)
//!   values on top: JSON encoding, a per-list lock around merge-and-store,
//!   and the digest index under the reserved key
//!   [`DIGEST_INDEX_KEY`] used by anti-entropy.

mod error;
mod kv;
mod list_store;
mod memory;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use kv::{BatchOp, KvStore};
pub use list_store::{DIGEST_INDEX_KEY, ListStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
