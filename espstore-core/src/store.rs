//! Generic two-layer record store.
//!
//! Most record types live in a [`Store`]: an immutable static layer fed
//! by plugin loading, a mutable dynamic layer fed by runtime insertion
//! and save files, and one shared index spanning the two for iteration.
//!
//! The shared index holds `(layer, key)` handles into the owning maps
//! rather than references, so unrelated insertions never invalidate it.
//! Its layout invariant: the first `statics.len()` entries are static
//! handles in insertion order, everything after is dynamic. Every dynamic
//! insert and erase restores this invariant before returning.

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

use crate::codec::{RecordReader, RecordWriter};
use crate::error::{Result, StoreError};
use crate::records::StoreRecord;
use crate::types::{ProgressListener, tags};

// ---------------------------------------------------------------------------
// Shared-index handles
// ---------------------------------------------------------------------------

/// Which layer a shared-index handle points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Static,
    Dynamic,
}

/// Stable handle into one of the two owning maps.
#[derive(Debug, Clone)]
struct SharedKey {
    layer: Layer,
    key: String,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Two-layer string-keyed record table with overlay semantics.
///
/// Keys are compared case-insensitively; records keep their original-case
/// id for display and serialization. A record id present in both layers
/// is shadowed: the dynamic layer wins on lookup.
#[derive(Debug, Clone)]
pub struct Store<T> {
    statics: BTreeMap<String, T>,
    dynamics: BTreeMap<String, T>,
    shared: Vec<SharedKey>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self {
            statics: BTreeMap::new(),
            dynamics: BTreeMap::new(),
            shared: Vec::new(),
        }
    }
}

impl<T: StoreRecord> Store<T> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one record from a plugin into the static layer.
    ///
    /// A record id already present merges: the existing slot is decoded
    /// into again and the last plugin wins field-by-field, while the
    /// record's position in the shared index stays where the first plugin
    /// put it.
    ///
    /// # Errors
    /// Decode failures propagate unmodified and abort the plugin load.
    pub fn load(&mut self, reader: &mut dyn RecordReader, id: &str) -> Result<()> {
        let key = id.to_lowercase();
        let fresh = !self.statics.contains_key(&key);
        let record = self.statics.entry(key.clone()).or_default();
        record.set_id(id);
        if let Err(err) = record.load(reader) {
            // A fresh slot must not outlive a failed decode: leaving it
            // would expose a default-constructed record to lookups and
            // desynchronize the map from the shared static prefix. A
            // failed merge keeps the existing record, partially merged
            // at worst.
            if fresh {
                self.statics.remove(&key);
            }
            return Err(err.into());
        }
        if fresh {
            // Keep the static prefix contiguous even if dynamic entries
            // already exist in the shared index.
            self.shared.insert(
                self.statics.len() - 1,
                SharedKey {
                    layer: Layer::Static,
                    key,
                },
            );
        }
        Ok(())
    }

    /// Materialize derived state after all plugins are loaded. The generic
    /// store has none; concrete stores build their sorted views here.
    pub fn set_up(&mut self) {}

    /// Look up a record by case-insensitive id. Dynamic layer wins.
    #[must_use]
    pub fn search(&self, id: &str) -> Option<&T> {
        let key = id.to_lowercase();
        self.dynamics.get(&key).or_else(|| self.statics.get(&key))
    }

    /// Like [`Store::search`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no record matches.
    pub fn find(&self, id: &str) -> Result<&T> {
        self.search(id).ok_or_else(|| StoreError::not_found(id))
    }

    /// Pick a uniformly random record whose id starts with the given
    /// case-insensitive prefix.
    ///
    /// The random source is passed in by the caller; seeding it makes the
    /// selection reproducible.
    #[must_use]
    pub fn search_random<R: Rng + ?Sized>(&self, prefix: &str, rng: &mut R) -> Option<&T> {
        let prefix = prefix.to_lowercase();
        let matches: Vec<&T> = self
            .iter()
            .filter(|rec| rec.id().to_lowercase().starts_with(&prefix))
            .collect();
        matches.choose(rng).copied()
    }

    /// Like [`Store::search_random`], but an empty match set is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no id starts with the prefix.
    pub fn find_random<R: Rng + ?Sized>(&self, prefix: &str, rng: &mut R) -> Result<&T> {
        self.search_random(prefix, rng)
            .ok_or_else(|| StoreError::not_found(prefix))
    }

    /// Upsert a record into the dynamic layer.
    ///
    /// Fresh ids are appended to the shared index; overwrites keep their
    /// existing position. Returns the stored record, which stays valid
    /// until it is erased.
    pub fn insert(&mut self, record: T) -> &T {
        let key = record.id().to_lowercase();
        let fresh = !self.dynamics.contains_key(&key);
        self.dynamics.insert(key.clone(), record);
        if fresh {
            self.shared.push(SharedKey {
                layer: Layer::Dynamic,
                key: key.clone(),
            });
        }
        // The entry was just inserted.
        self.dynamics
            .get(&key)
            .unwrap_or_else(|| unreachable!("dynamic record vanished after insert"))
    }

    /// Upsert a record into the static layer, outside of plugin loading.
    ///
    /// Used by engine-synthesized defaults. Same shared-index contract as
    /// [`Store::insert`], except the fresh handle lands at the end of the
    /// static prefix.
    pub fn insert_static(&mut self, record: T) -> &T {
        let key = record.id().to_lowercase();
        let fresh = !self.statics.contains_key(&key);
        self.statics.insert(key.clone(), record);
        if fresh {
            self.shared.insert(
                self.statics.len() - 1,
                SharedKey {
                    layer: Layer::Static,
                    key: key.clone(),
                },
            );
        }
        self.statics
            .get(&key)
            .unwrap_or_else(|| unreachable!("static record vanished after insert"))
    }

    /// Remove a dynamic record by case-insensitive id. Returns whether a
    /// record was removed. The static layer is never touched.
    pub fn erase(&mut self, id: &str) -> bool {
        let key = id.to_lowercase();
        if self.dynamics.remove(&key).is_none() {
            return false;
        }
        self.rebuild_dynamic_suffix();
        true
    }

    /// Remove a static record by case-insensitive id. Returns whether a
    /// record was removed. Dynamic entries keep their shared-index
    /// positions.
    pub fn erase_static(&mut self, id: &str) -> bool {
        let key = id.to_lowercase();
        if self.statics.remove(&key).is_none() {
            return false;
        }
        self.shared
            .retain(|h| h.layer != Layer::Static || h.key != key);
        true
    }

    /// Drop the whole dynamic layer, truncating the shared index back to
    /// its static prefix. Used to reset to the plugin baseline before
    /// reloading a save.
    pub fn clear_dynamic(&mut self) {
        self.shared.truncate(self.statics.len());
        self.dynamics.clear();
    }

    /// Is the record with this id a dynamic-layer record?
    #[must_use]
    pub fn is_dynamic(&self, id: &str) -> bool {
        self.dynamics.contains_key(&id.to_lowercase())
    }

    /// Number of records across both layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// True if neither layer holds any record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }

    /// Number of dynamic-layer records.
    #[must_use]
    pub fn dynamic_len(&self) -> usize {
        self.dynamics.len()
    }

    /// Iterate all records, static layer first in insertion order, then
    /// dynamic.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.shared.iter().filter_map(|h| self.resolve(h))
    }

    /// Append every record's original-case id to `out`.
    pub fn list_identifiers(&self, out: &mut Vec<String>) {
        out.reserve(self.len());
        out.extend(self.iter().map(|rec| rec.id().to_string()));
    }

    /// Serialize the dynamic layer, one enveloped record at a time,
    /// reporting progress after each.
    ///
    /// # Errors
    /// Encode failures propagate unmodified.
    pub fn write(
        &self,
        writer: &mut dyn RecordWriter,
        progress: &mut dyn ProgressListener,
    ) -> Result<()> {
        for record in self.dynamics.values() {
            writer.start_record(T::TAG)?;
            writer.sub_str(tags::NAME, record.id())?;
            record.save(writer)?;
            writer.end_record(T::TAG)?;
            progress.advance();
        }
        Ok(())
    }

    /// Decode one record from a save stream into the dynamic layer.
    ///
    /// # Errors
    /// Decode failures propagate unmodified.
    pub fn read(&mut self, reader: &mut dyn RecordReader, id: &str) -> Result<&T> {
        let mut record = T::default();
        record.set_id(id);
        record.load(reader)?;
        Ok(self.insert(record))
    }

    fn rebuild_dynamic_suffix(&mut self) {
        self.shared.truncate(self.statics.len());
        self.shared.extend(self.dynamics.keys().map(|key| SharedKey {
            layer: Layer::Dynamic,
            key: key.clone(),
        }));
    }

    fn resolve(&self, handle: &SharedKey) -> Option<&T> {
        match handle.layer {
            Layer::Static => self.statics.get(&handle.key),
            Layer::Dynamic => self.dynamics.get(&handle.key),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
