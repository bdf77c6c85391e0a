use crate::{BatchOp, KvStore, StorageResult};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// In-memory [`KvStore`]. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> T) -> T {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut map)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.with_map(|m| m.get(key).cloned()))
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.with_map(|m| m.insert(key.to_string(), value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.with_map(|m| m.remove(key));
        Ok(())
    }

    fn write_batch(&self, ops: &[BatchOp]) -> StorageResult<()> {
        self.with_map(|m| {
            for op in ops {
                match op {
                    BatchOp::Put(key, value) => {
                        m.insert(key.clone(), value.clone());
                    }
                    BatchOp::Delete(key) => {
                        m.remove(key);
                    }
                }
            }
        });
        Ok(())
    }

    fn commit(&self) -> StorageResult<()> {
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.with_map(|m| m.keys().cloned().collect()))
    }
}
