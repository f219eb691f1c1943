//! Error types for the espstore storage layer.

use thiserror::Error;

use crate::codec::CodecError;
use crate::types::Tag;

/// Top-level error type for all store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A `find`-family lookup did not match any record.
    ///
    /// The `search`-family counterparts report absence as `None` instead;
    /// callers pick which of the two treats a miss as exceptional.
    #[error("record not found: '{key}'")]
    NotFound {
        /// The id, index or coordinate that failed to match, rendered as text.
        key: String,
    },

    /// A cell with this identity already exists; cells are never
    /// silently overwritten by runtime insertion.
    #[error("failed to create {kind} cell '{id}': already exists")]
    DuplicateRecord {
        /// Cell kind, `"interior"` or `"exterior"`.
        kind: &'static str,
        /// Cell name or grid coordinate, rendered as text.
        id: String,
    },

    /// A record tag no store is registered for.
    #[error("unknown record type: {tag}")]
    UnknownRecord {
        /// The unrecognized record tag.
        tag: Tag,
    },

    /// Decode or encode failure from the record codec layer, propagated
    /// unmodified; aborts the in-progress plugin load.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Build a [`StoreError::NotFound`] from any displayable key.
    #[must_use]
    pub fn not_found(key: impl ToString) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }
}
