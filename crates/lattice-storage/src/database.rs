//! RocksDB database implementation.

use crate::{ColumnFamily, Storage, StorageError, StorageResult, WriteBatch};
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// RocksDB database wrapper.
pub struct Database {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        info!("opening database at {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(256);
        opts.set_keep_log_file_num(1);
        opts.set_max_total_wal_size(64 * 1024 * 1024);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_background_jobs(4);

        // One shared block cache across column families keeps read memory
        // bounded instead of one unbounded default cache per CF.
        let block_cache = Cache::new_lru_cache(128 * 1024 * 1024);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ColumnFamily::all()
            .iter()
            .map(|cf| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

                let mut block_opts = BlockBasedOptions::default();
                block_opts.set_block_cache(&block_cache);
                block_opts.set_cache_index_and_filter_blocks(true);
                cf_opts.set_block_based_table_factory(&block_opts);

                ColumnFamilyDescriptor::new(cf.name(), cf_opts)
            })
            .collect();

        let db =
            DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, cf_descriptors)?;

        debug!("database opened successfully");

        Ok(Self { db: Arc::new(db) })
    }

    /// Flush all pending writes to disk. Called on shutdown so in-flight
    /// KV operations drain before the process exits.
    pub fn flush(&self) -> StorageResult<()> {
        for cf in ColumnFamily::all() {
            if let Some(handle) = self.db.cf_handle(cf.name()) {
                self.db.flush_cf(&handle)?;
            }
        }
        Ok(())
    }
}

impl Storage for Database {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let handle = self
            .db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf.name().to_string()))?;
        Ok(self.db.get_cf(&handle, key)?)
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let handle = self
            .db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf.name().to_string()))?;
        self.db.put_cf(&handle, key, value)?;
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        let handle = self
            .db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf.name().to_string()))?;
        self.db.delete_cf(&handle, key)?;
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut rocks_batch = rocksdb::WriteBatch::default();

        for op in batch.ops {
            let cf = op.cf();
            let handle = self
                .db
                .cf_handle(cf.name())
                .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf.name().to_string()))?;

            match op {
                crate::batch::BatchOp::Put { key, value, .. } => {
                    rocks_batch.put_cf(&handle, &key, &value);
                }
                crate::batch::BatchOp::Delete { key, .. } => {
                    rocks_batch.delete_cf(&handle, &key);
                }
            }
        }

        self.db.write(rocks_batch)?;
        Ok(())
    }

    fn iter(
        &self,
        cf: ColumnFamily,
    ) -> StorageResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>> {
        let handle = self
            .db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf.name().to_string()))?;

        let collected: Vec<_> = self
            .db
            .iterator_cf(&handle, rocksdb::IteratorMode::Start)
            .filter_map(|r| r.ok())
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect();

        Ok(Box::new(collected.into_iter()))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}
