//! In-memory storage backend for tests.

use crate::{ColumnFamily, Storage, StorageResult, WriteBatch};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// `Storage` implementation backed by in-process maps. Batches apply under
/// one write lock, so the atomicity contract matches the RocksDB backend.
#[derive(Default)]
pub struct MemoryStorage {
    families: RwLock<HashMap<ColumnFamily, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .families
            .read()
            .get(&cf)
            .and_then(|m| m.get(key).cloned()))
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.families
            .write()
            .entry(cf)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        if let Some(m) = self.families.write().get_mut(&cf) {
            m.remove(key);
        }
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut families = self.families.write();
        for op in batch.ops {
            let family = families.entry(op.cf()).or_default();
            match op {
                crate::batch::BatchOp::Put { key, value, .. } => {
                    family.insert(key, value);
                }
                crate::batch::BatchOp::Delete { key, .. } => {
                    family.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn iter(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>> {
        let snapshot: Vec<_> = self
            .families
            .read()
            .get(&cf)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Ok(Box::new(snapshot.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        storage.put(ColumnFamily::Headers, b"k", b"v").unwrap();
        assert_eq!(
            storage.get(ColumnFamily::Headers, b"k").unwrap(),
            Some(b"v".to_vec())
        );
        assert!(storage.contains(ColumnFamily::Headers, b"k").unwrap());
        // Families are isolated.
        assert_eq!(storage.get(ColumnFamily::Trie, b"k").unwrap(), None);
    }

    #[test]
    fn test_memory_batch() {
        let storage = MemoryStorage::new();
        let mut batch = WriteBatch::new();
        batch.put(ColumnFamily::Headers, b"a".as_slice(), b"1".as_slice());
        batch.put(ColumnFamily::Headers, b"b".as_slice(), b"2".as_slice());
        batch.delete(ColumnFamily::Headers, b"a".as_slice());
        storage.write_batch(batch).unwrap();

        assert_eq!(storage.get(ColumnFamily::Headers, b"a").unwrap(), None);
        assert_eq!(
            storage.get(ColumnFamily::Headers, b"b").unwrap(),
            Some(b"2".to_vec())
        );
    }

    #[test]
    fn test_iter_is_ordered() {
        let storage = MemoryStorage::new();
        storage.put(ColumnFamily::Headers, b"b", b"2").unwrap();
        storage.put(ColumnFamily::Headers, b"a", b"1").unwrap();
        let keys: Vec<_> = storage
            .iter(ColumnFamily::Headers)
            .unwrap()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
