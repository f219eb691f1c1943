//! Stores for records with a stable small numeric identity.
//!
//! [`IndexedStore`] holds plugin-loaded catalog records (magic effects,
//! skills) keyed by their integer index; [`AttributeStore`] holds the
//! closed built-in attribute set, synthesized rather than loaded. Neither
//! has a dynamic layer.

use std::collections::BTreeMap;

use crate::codec::RecordReader;
use crate::error::{Result, StoreError};
use crate::records::{Attribute, IndexedRecord};

// ---------------------------------------------------------------------------
// IndexedStore
// ---------------------------------------------------------------------------

/// Record table keyed by integer index, overwrite-on-duplicate.
#[derive(Debug, Clone)]
pub struct IndexedStore<T> {
    records: BTreeMap<u32, T>,
}

impl<T> Default for IndexedStore<T> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }
}

impl<T: IndexedRecord> IndexedStore<T> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one record and upsert it by its index; a later plugin's
    /// record replaces an earlier one wholesale.
    ///
    /// # Errors
    /// Decode failures propagate unmodified.
    pub fn load(&mut self, reader: &mut dyn RecordReader) -> Result<()> {
        let record = T::load(reader)?;
        self.records.insert(record.index(), record);
        Ok(())
    }

    /// Materialize derived state after all plugins are loaded. Indexed
    /// catalogs have none; present for a uniform store lifecycle.
    pub fn set_up(&mut self) {}

    /// Look up a record by index.
    #[must_use]
    pub fn search(&self, index: u32) -> Option<&T> {
        self.records.get(&index)
    }

    /// Like [`IndexedStore::search`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the index is unoccupied.
    pub fn find(&self, index: u32) -> Result<&T> {
        self.search(index)
            .ok_or_else(|| StoreError::not_found(format!("index {index}")))
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no record has been loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }
}

// ---------------------------------------------------------------------------
// AttributeStore
// ---------------------------------------------------------------------------

/// The closed built-in attribute catalog.
///
/// Nothing is loaded from plugins; `set_up` materializes the full fixed
/// enumeration.
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    records: Vec<Attribute>,
}

impl AttributeStore {
    /// Create an empty store; call [`AttributeStore::set_up`] to populate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize the built-in attribute set.
    pub fn set_up(&mut self) {
        self.records.clear();
        self.records.reserve(Attribute::COUNT);
        for (index, id) in Attribute::IDS.iter().enumerate() {
            self.records.push(Attribute {
                index: u32::try_from(index).unwrap_or_default(),
                id,
            });
        }
    }

    /// Look up an attribute by its enumeration index.
    #[must_use]
    pub fn search(&self, index: u32) -> Option<&Attribute> {
        self.records.get(index as usize)
    }

    /// Like [`AttributeStore::search`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the index is out of range.
    pub fn find(&self, index: u32) -> Result<&Attribute> {
        self.search(index)
            .ok_or_else(|| StoreError::not_found(format!("attribute {index}")))
    }

    /// Number of attributes; zero before `set_up`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True before `set_up` has run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate attributes in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
