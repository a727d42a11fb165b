//! Error types for serialization and indexing.

use thiserror::Error;

/// Errors raised while decoding or validating core types.
#[derive(Error, Debug)]
pub enum TypesError {
    /// Input ended before the expected number of bytes.
    #[error("unexpected end of input: needed {needed} more bytes")]
    UnexpectedEof { needed: usize },

    /// Trailing bytes after a complete value.
    #[error("trailing bytes after value: {0}")]
    TrailingBytes(usize),

    /// A length prefix exceeds the allowed maximum.
    #[error("length {got} exceeds limit {limit}")]
    LengthLimit { got: usize, limit: usize },

    /// A dependency vector has the wrong number of entries.
    #[error("dependency vector has {got} entries, expected {expected}")]
    BadDepCount { got: usize, expected: usize },

    /// A group index is outside `[0, groups)`.
    #[error("group index {got} out of range for {groups} groups")]
    BadGroup { got: u8, groups: u8 },
}

/// Result type for core type operations.
pub type TypesResult<T> = Result<T, TypesError>;
