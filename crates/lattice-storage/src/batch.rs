//! Staged multi-key writes.
//!
//! Anything that must hold together across keys (a block body, its state
//! entry, the header and the new trie root) is staged into one
//! [`WriteBatch`] and handed to the backend in a single call, so readers
//! never observe half of an invariant.

use crate::ColumnFamily;

/// One staged mutation against a column family.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put {
        cf: ColumnFamily,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: ColumnFamily,
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Column family this mutation targets.
    pub fn cf(&self) -> ColumnFamily {
        match self {
            BatchOp::Put { cf, .. } | BatchOp::Delete { cf, .. } => *cf,
        }
    }
}

/// An ordered set of mutations applied atomically by the backend.
///
/// Staging is infallible; any failure surfaces when the batch is
/// executed. Later operations win over earlier ones on the same key,
/// matching the backend's write order.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
        }
    }

    /// Stage a put.
    pub fn put(&mut self, cf: ColumnFamily, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put {
            cf,
            key: key.into(),
            value: value.into(),
        });
    }

    /// Stage a delete.
    pub fn delete(&mut self, cf: ColumnFamily, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete {
            cf,
            key: key.into(),
        });
    }

    /// Number of staged mutations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Append every mutation of `other`, preserving order.
    pub fn merge(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }
}
