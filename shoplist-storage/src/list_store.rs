//! Typed shopping-list store over a [`KvStore`].
//!
//! Each list id maps to the JSON encoding of its [`ShoppingList`]. The
//! reserved key [`DIGEST_INDEX_KEY`] holds a JSON `Map<ListId, hex>` of
//! context digests, kept in step with every write so anti-entropy can build
//! its digest without decoding every list.

use crate::{BatchOp, KvStore, StorageError, StorageResult};
use dashmap::DashMap;
use shoplist_crdt::{Crdt, ShoppingList};
use shoplist_types::ListId;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Reserved key of the digest index. Never accepted as a list id.
pub const DIGEST_INDEX_KEY: &str = "lists_id_dot_contents";

/// Shopping lists keyed by [`ListId`], with a lock per list.
pub struct ListStore {
    kv: Arc<dyn KvStore>,
    locks: DashMap<ListId, Arc<Mutex<()>>>,
    index_lock: Mutex<()>,
}

impl ListStore {
    /// Wraps a durable store.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            locks: DashMap::new(),
            index_lock: Mutex::new(()),
        }
    }

    /// Reads a list, or `None` if this node holds no copy.
    pub fn get(&self, id: &ListId) -> StorageResult<Option<ShoppingList>> {
        check_key(id)?;
        self.read(id)
    }

    /// Merges `incoming` into the stored copy (or stores it as-is if there is
    /// none) and returns the merged list.
    pub fn merge_and_store(&self, id: &ListId, incoming: &ShoppingList) -> StorageResult<ShoppingList> {
        check_key(id)?;
        let lock = self.lock_for(id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let merged = match self.read(id)? {
            Some(current) => current.merged(incoming),
            None => incoming.clone(),
        };
        let put = BatchOp::Put(id.to_string(), serde_json::to_vec(&merged)?);
        self.write_indexed(put, |index| {
            index.insert(id.clone(), merged.context_digest());
        })?;
        self.kv.commit()?;

        debug!(list_id = %id, items = merged.item_names().len(), "stored list");
        Ok(merged)
    }

    /// Removes a list and its digest entry, then drops the list's lock
    /// unless another caller still holds it.
    pub fn delete(&self, id: &ListId) -> StorageResult<()> {
        check_key(id)?;
        let result = {
            let lock = self.lock_for(id);
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            self.write_indexed(BatchOp::Delete(id.to_string()), |index| {
                index.remove(id);
            })
            .and_then(|()| self.kv.commit())
        };
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
        result?;

        debug!(list_id = %id, "deleted list");
        Ok(())
    }

    /// Ids of every stored list.
    pub fn list_ids(&self) -> StorageResult<Vec<ListId>> {
        Ok(self
            .kv
            .keys()?
            .into_iter()
            .filter(|k| k != DIGEST_INDEX_KEY)
            .map(ListId::new)
            .collect())
    }

    /// Context digest of every stored list.
    pub fn digests(&self) -> StorageResult<BTreeMap<ListId, String>> {
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_index()
    }

    /// Recomputes the digest index from the stored lists.
    ///
    /// Lists that fail to decode are skipped and logged.
    pub fn rebuild_index(&self) -> StorageResult<usize> {
        let mut index = BTreeMap::new();
        for id in self.list_ids()? {
            match self.read(&id) {
                Ok(Some(list)) => {
                    index.insert(id, list.context_digest());
                }
                Ok(None) => {}
                Err(e) => warn!(list_id = %id, error = %e, "skipping undecodable list"),
            }
        }
        let count = index.len();
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.kv.put(DIGEST_INDEX_KEY, &serde_json::to_vec(&index)?)?;
        self.kv.commit()?;
        Ok(count)
    }

    fn read(&self, id: &ListId) -> StorageResult<Option<ShoppingList>> {
        let Some(bytes) = self.kv.get(id.as_str())? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::InvalidData(format!("list {id}: {e}")))
    }

    fn read_index(&self) -> StorageResult<BTreeMap<ListId, String>> {
        match self.kv.get(DIGEST_INDEX_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::InvalidData(format!("digest index: {e}"))),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Applies `op` together with the index update `f` in one batch, so a
    /// list and its digest entry never disagree.
    fn write_indexed(
        &self,
        op: BatchOp,
        f: impl FnOnce(&mut BTreeMap<ListId, String>),
    ) -> StorageResult<()> {
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut index = self.read_index()?;
        f(&mut index);
        let index = BatchOp::Put(DIGEST_INDEX_KEY.to_string(), serde_json::to_vec(&index)?);
        self.kv.write_batch(&[op, index])
    }

    fn lock_for(&self, id: &ListId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_default().clone()
    }
}

fn check_key(id: &ListId) -> StorageResult<()> {
    if id.as_str() == DIGEST_INDEX_KEY {
        return Err(StorageError::ReservedKey(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn store() -> ListStore {
        ListStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn delete_drops_the_list_lock() {
        let store = store();
        let id = ListId::new("weekly");
        store.merge_and_store(&id, &ShoppingList::new("a")).unwrap();
        assert_eq!(store.locks.len(), 1);

        store.delete(&id).unwrap();
        assert!(store.locks.is_empty());
    }

    #[test]
    fn delete_keeps_a_lock_still_in_use() {
        let store = store();
        let id = ListId::new("weekly");
        store.merge_and_store(&id, &ShoppingList::new("a")).unwrap();

        let held = store.lock_for(&id);
        store.delete(&id).unwrap();
        assert_eq!(store.locks.len(), 1);

        drop(held);
        store.delete(&id).unwrap();
        assert!(store.locks.is_empty());
    }
}
