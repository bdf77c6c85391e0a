use crate::StorageResult;

/// One write of an atomic [`KvStore::write_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(String, Vec<u8>),
    Delete(String),
}

impl BatchOp {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put(key, _) | Self::Delete(key) => key,
        }
    }
}

/// Durable byte store behind a [`ListStore`](crate::ListStore).
///
/// Implementations must be safe to share across threads; callers serialize
/// read-modify-write cycles themselves.
pub trait KvStore: Send + Sync {
    /// Returns the bytes stored under `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Deletes `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Applies every op or none of them.
    fn write_batch(&self, ops: &[BatchOp]) -> StorageResult<()>;

    /// Flushes pending writes to durable storage.
    fn commit(&self) -> StorageResult<()>;

    /// All keys currently stored, in ascending order.
    fn keys(&self) -> StorageResult<Vec<String>>;
}
