//! Fixed-width hash identifiers.
//!
//! All digests in the system are 32-byte Blake2b-256 values. `BlockHash`
//! and `TxHash` are distinct newtypes so block and transaction identifiers
//! cannot be mixed up at compile time.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

/// Length of every digest in bytes.
pub const HASH_LENGTH: usize = 32;

/// Compute the Blake2b-256 digest of `data`.
pub fn blake2b_256(data: &[u8]) -> [u8; HASH_LENGTH] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut arr = [0u8; HASH_LENGTH];
    arr.copy_from_slice(&out);
    arr
}

macro_rules! hash_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; HASH_LENGTH]);

        impl $name {
            /// The all-zero digest.
            pub const ZERO: Self = Self([0u8; HASH_LENGTH]);

            /// Hash arbitrary bytes into this identifier type.
            pub fn hash(data: &[u8]) -> Self {
                Self(blake2b_256(data))
            }

            /// Raw bytes of the digest.
            pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
                &self.0
            }

            /// Parse from a 32-byte slice.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                if bytes.len() != HASH_LENGTH {
                    return None;
                }
                let mut arr = [0u8; HASH_LENGTH];
                arr.copy_from_slice(bytes);
                Some(Self(arr))
            }

            /// XOR two digests, used for seed derivation.
            pub fn xor(&self, other: &Self) -> Self {
                let mut out = [0u8; HASH_LENGTH];
                for (i, b) in out.iter_mut().enumerate() {
                    *b = self.0[i] ^ other.0[i];
                }
                Self(out)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0[..8]))
            }
        }

        impl From<[u8; HASH_LENGTH]> for $name {
            fn from(arr: [u8; HASH_LENGTH]) -> Self {
                Self(arr)
            }
        }
    };
}

hash_newtype! {
    /// Generic 32-byte digest (state roots, clique ids, seeds).
    Hash
}

hash_newtype! {
    /// Identifier of a block, the digest of its serialized header.
    BlockHash
}

hash_newtype! {
    /// Identifier of a transaction, the digest of its unsigned body.
    TxHash
}

impl From<TxHash> for Hash {
    fn from(h: TxHash) -> Self {
        Hash(h.0)
    }
}

impl From<BlockHash> for Hash {
    fn from(h: BlockHash) -> Self {
        Hash(h.0)
    }
}
