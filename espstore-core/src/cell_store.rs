//! World-cell store: merges cell records across plugins.
//!
//! Cells are the one record type plugins merge field-by-field instead of
//! replacing: multiple plugins write to the same cell, reference lists
//! accumulate, and a later plugin may relocate an individual reference
//! into a different exterior cell ("moved reference"). Interior cells are
//! keyed by name, exterior cells by grid coordinate, and both kinds keep
//! the usual static/dynamic split with shared lists rebuilt in `set_up`.
//!
//! Exterior merge works on a removed copy of the cell: the record is
//! taken out of the map, merged against the stream (which may touch any
//! other exterior cell through moved references) and reinserted. A moved
//! reference that targets the cell currently being merged lands in that
//! in-flight copy, never in a synthesized duplicate.

use std::collections::BTreeMap;
use tracing::debug;

use crate::codec::RecordReader;
use crate::error::{Result, StoreError};
use crate::records::{Cell, CellRef, MovedRef};
use crate::types::{GridPos, tags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Static,
    Dynamic,
}

/// Two-layer cell table with separate interior and exterior keying.
#[derive(Debug, Clone, Default)]
pub struct CellStore {
    interiors: BTreeMap<String, Cell>,
    exteriors: BTreeMap<GridPos, Cell>,
    dynamic_interiors: BTreeMap<String, Cell>,
    dynamic_exteriors: BTreeMap<GridPos, Cell>,
    shared_interiors: Vec<(Layer, String)>,
    shared_exteriors: Vec<(Layer, GridPos)>,
}

impl CellStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------

    /// Look up an interior cell by case-insensitive name.
    #[must_use]
    pub fn search_interior(&self, name: &str) -> Option<&Cell> {
        let key = name.to_lowercase();
        self.interiors
            .get(&key)
            .or_else(|| self.dynamic_interiors.get(&key))
    }

    /// Look up an exterior cell by grid coordinate.
    #[must_use]
    pub fn search_exterior(&self, x: i32, y: i32) -> Option<&Cell> {
        let key = GridPos::new(x, y);
        self.exteriors
            .get(&key)
            .or_else(|| self.dynamic_exteriors.get(&key))
    }

    /// Look up the stored cell with the same identity as `cell`.
    #[must_use]
    pub fn search(&self, cell: &Cell) -> Option<&Cell> {
        if cell.is_exterior() {
            self.search_exterior(cell.grid.x, cell.grid.y)
        } else {
            self.search_interior(&cell.name)
        }
    }

    /// Like [`CellStore::search_interior`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no interior cell has this name.
    pub fn find_interior(&self, name: &str) -> Result<&Cell> {
        self.search_interior(name)
            .ok_or_else(|| StoreError::not_found(name))
    }

    /// Like [`CellStore::search_exterior`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no exterior cell sits at `(x, y)`.
    pub fn find_exterior(&self, x: i32, y: i32) -> Result<&Cell> {
        self.search_exterior(x, y)
            .ok_or_else(|| StoreError::not_found(GridPos::new(x, y)))
    }

    /// The exterior cell at `(x, y)`, synthesized on demand.
    ///
    /// A moved reference may target a cell no plugin has loaded yet; the
    /// synthesized stand-in has a water plane and no ambient light, and
    /// lives in the static layer like any plugin-loaded cell.
    pub fn search_or_create(&mut self, x: i32, y: i32) -> &Cell {
        &*self.exterior_or_create_mut(GridPos::new(x, y))
    }

    /// Representative exterior cell for a display name: the northernmost
    /// cell in the easternmost matching column.
    #[must_use]
    pub fn search_ext_by_name(&self, name: &str) -> Option<&Cell> {
        self.pick_canonical(|cell| cell.name.eq_ignore_ascii_case(name))
    }

    /// Representative exterior cell for a region: the northernmost cell
    /// in the easternmost matching column.
    #[must_use]
    pub fn search_ext_by_region(&self, region: &str) -> Option<&Cell> {
        self.pick_canonical(|cell| {
            cell.region
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(region))
        })
    }

    fn pick_canonical(&self, matches: impl Fn(&Cell) -> bool) -> Option<&Cell> {
        let mut best: Option<&Cell> = None;
        for cell in self.exteriors_iter() {
            if !matches(cell) {
                continue;
            }
            let better = best.is_none_or(|b| {
                cell.grid.x > b.grid.x || (cell.grid.x == b.grid.x && cell.grid.y > b.grid.y)
            });
            if better {
                best = Some(cell);
            }
        }
        best
    }

    // -----------------------------------------------------------------
    // Loading and merge
    // -----------------------------------------------------------------

    /// Decode one cell record from a plugin, merging into any cell already
    /// loaded under the same identity.
    ///
    /// The header is decoded first to classify the cell and obtain its
    /// key. On a merge, header fields are overwritten (last plugin wins)
    /// and reference lists accumulate; for exterior cells the stream's
    /// moved-reference groups are applied across the whole store before
    /// the cell's own references are read.
    ///
    /// # Errors
    /// Decode failures propagate unmodified and abort the plugin load.
    pub fn load(&mut self, reader: &mut dyn RecordReader, name: &str) -> Result<()> {
        let mut incoming = Cell {
            name: name.to_string(),
            ..Cell::default()
        };
        incoming.load_header(reader)?;

        if incoming.is_exterior() {
            self.load_exterior(reader, incoming)
        } else {
            self.load_interior(reader, incoming)
        }
    }

    fn load_interior(&mut self, reader: &mut dyn RecordReader, incoming: Cell) -> Result<()> {
        let key = incoming.name.to_lowercase();
        match self.interiors.remove(&key) {
            Some(mut existing) => {
                debug!(cell = %key, "merging interior cell");
                merge_header(&mut existing, incoming);
                // The detached cell goes back even when the stream is
                // malformed; earlier plugins' references must survive a
                // failed merge, partially merged at worst.
                let merged = existing.load_refs(reader, true);
                self.interiors.insert(key, existing);
                merged?;
            }
            None => {
                let mut cell = incoming;
                cell.load_refs(reader, false)?;
                self.interiors.insert(key, cell);
            }
        }
        Ok(())
    }

    fn load_exterior(&mut self, reader: &mut dyn RecordReader, incoming: Cell) -> Result<()> {
        let key = incoming.grid;
        match self.exteriors.remove(&key) {
            Some(mut existing) => {
                debug!(cell = %key, "merging exterior cell");
                merge_header(&mut existing, incoming);
                // Same reinsert-on-error contract as the interior merge.
                let merged = self.merge_exterior_stream(reader, &mut existing, key);
                self.exteriors.insert(key, existing);
                merged?;
            }
            None => {
                let mut cell = incoming;
                let moved = self.collect_moved_refs(reader, &mut cell, key)?;
                cell.load_refs(reader, false)?;
                // First declaration of this cell, nothing to reconcile.
                cell.moved_refs = moved;
                self.exteriors.insert(key, cell);
            }
        }
        Ok(())
    }

    /// Merge one exterior cell record's stream into the detached cell:
    /// moved-reference groups, accumulated placed references, then
    /// moved-list reconciliation.
    fn merge_exterior_stream(
        &mut self,
        reader: &mut dyn RecordReader,
        existing: &mut Cell,
        key: GridPos,
    ) -> Result<()> {
        let moved = self.collect_moved_refs(reader, existing, key)?;
        existing.load_refs(reader, true)?;
        self.reconcile_moved_refs(existing, key, moved);
        Ok(())
    }

    /// Consume the stream's moved-reference groups, leasing each surviving
    /// reference into its destination cell.
    ///
    /// `own_cell` is the cell currently being loaded, detached from the
    /// map; a group targeting `own_key` leases into it directly.
    fn collect_moved_refs(
        &mut self,
        reader: &mut dyn RecordReader,
        own_cell: &mut Cell,
        own_key: GridPos,
    ) -> Result<Vec<MovedRef>> {
        let mut moved = Vec::new();
        while reader.is_next_sub(tags::MVRF) {
            let mv = Cell::read_moved_ref(reader)?;
            let (cell_ref, deleted) = Cell::read_ref(reader)?;
            if !deleted {
                let dest = if mv.target == own_key {
                    &mut *own_cell
                } else {
                    self.exterior_or_create_mut(mv.target)
                };
                upsert_lease(&mut dest.leased_refs, cell_ref);
            }
            moved.push(mv);
        }
        Ok(moved)
    }

    /// Merge freshly read moved references into an already-known cell's
    /// moved list. A reference re-moved to a new destination is withdrawn
    /// from its previous destination's leased list first, keeping each
    /// moved reference a single origin-to-destination edge.
    fn reconcile_moved_refs(&mut self, existing: &mut Cell, own_key: GridPos, moved: Vec<MovedRef>) {
        for mv in moved {
            let Some(slot) = existing
                .moved_refs
                .iter()
                .position(|m| m.ref_num == mv.ref_num)
            else {
                existing.moved_refs.push(mv);
                continue;
            };

            let previous_target = existing.moved_refs[slot].target;
            existing.moved_refs[slot] = mv;
            if previous_target == mv.target {
                continue;
            }
            debug!(
                reference = %mv.ref_num,
                from = %previous_target,
                to = %mv.target,
                "reference re-moved to a new cell"
            );
            if previous_target == own_key {
                existing.leased_refs.retain(|r| r.ref_num != mv.ref_num);
            } else if let Some(dest) = self.exterior_mut(previous_target) {
                dest.leased_refs.retain(|r| r.ref_num != mv.ref_num);
            }
        }
    }

    fn exterior_mut(&mut self, key: GridPos) -> Option<&mut Cell> {
        if let Some(cell) = self.exteriors.get_mut(&key) {
            return Some(cell);
        }
        self.dynamic_exteriors.get_mut(&key)
    }

    fn exterior_or_create_mut(&mut self, key: GridPos) -> &mut Cell {
        if let Some(cell) = self.dynamic_exteriors.get_mut(&key) {
            return cell;
        }
        self.exteriors.entry(key).or_insert_with(|| {
            debug!(cell = %key, "synthesizing exterior cell for a moved reference");
            Cell {
                flags: Cell::FLAG_HAS_WATER,
                grid: key,
                ..Cell::default()
            }
        })
    }

    /// Rebuild the shared interior and exterior lists from the static
    /// maps. Run once, after all plugins are loaded.
    pub fn set_up(&mut self) {
        self.shared_interiors = self
            .interiors
            .keys()
            .map(|k| (Layer::Static, k.clone()))
            .collect();
        self.shared_exteriors = self
            .exteriors
            .keys()
            .map(|k| (Layer::Static, *k))
            .collect();
    }

    // -----------------------------------------------------------------
    // Dynamic layer
    // -----------------------------------------------------------------

    /// Insert a runtime-created cell into the dynamic layer.
    ///
    /// Unlike the generic store, cells refuse duplication: an identity
    /// already present in either layer is an error.
    ///
    /// # Errors
    /// [`StoreError::DuplicateRecord`] if the identity exists.
    pub fn insert(&mut self, cell: Cell) -> Result<&Cell> {
        if self.search(&cell).is_some() {
            return Err(StoreError::DuplicateRecord {
                kind: if cell.is_exterior() {
                    "exterior"
                } else {
                    "interior"
                },
                id: if cell.is_exterior() {
                    cell.grid.to_string()
                } else {
                    cell.name.clone()
                },
            });
        }

        if cell.is_exterior() {
            let key = cell.grid;
            self.dynamic_exteriors.insert(key, cell);
            self.shared_exteriors.push((Layer::Dynamic, key));
            Ok(&self.dynamic_exteriors[&key])
        } else {
            let key = cell.name.to_lowercase();
            self.dynamic_interiors.insert(key.clone(), cell);
            self.shared_interiors.push((Layer::Dynamic, key.clone()));
            Ok(&self.dynamic_interiors[&key])
        }
    }

    /// Remove a dynamic interior cell. Returns whether one was removed;
    /// static cells are never touched.
    pub fn erase_interior(&mut self, name: &str) -> bool {
        let key = name.to_lowercase();
        if self.dynamic_interiors.remove(&key).is_none() {
            return false;
        }
        self.shared_interiors.retain(|(layer, _)| *layer == Layer::Static);
        self.shared_interiors.extend(
            self.dynamic_interiors
                .keys()
                .map(|k| (Layer::Dynamic, k.clone())),
        );
        true
    }

    /// Remove a dynamic exterior cell. Returns whether one was removed;
    /// static cells are never touched.
    pub fn erase_exterior(&mut self, x: i32, y: i32) -> bool {
        let key = GridPos::new(x, y);
        if self.dynamic_exteriors.remove(&key).is_none() {
            return false;
        }
        self.shared_exteriors.retain(|(layer, _)| *layer == Layer::Static);
        self.shared_exteriors
            .extend(self.dynamic_exteriors.keys().map(|k| (Layer::Dynamic, *k)));
        true
    }

    // -----------------------------------------------------------------
    // Bulk views
    // -----------------------------------------------------------------

    /// Interior cells in shared-list order.
    pub fn interiors_iter(&self) -> impl Iterator<Item = &Cell> {
        self.shared_interiors
            .iter()
            .filter_map(|(layer, key)| match layer {
                Layer::Static => self.interiors.get(key),
                Layer::Dynamic => self.dynamic_interiors.get(key),
            })
    }

    /// Exterior cells in shared-list order.
    pub fn exteriors_iter(&self) -> impl Iterator<Item = &Cell> {
        self.shared_exteriors
            .iter()
            .filter_map(|(layer, key)| match layer {
                Layer::Static => self.exteriors.get(key),
                Layer::Dynamic => self.dynamic_exteriors.get(key),
            })
    }

    /// Cells in both shared lists, interiors and exteriors counted
    /// separately and summed. Zero before `set_up`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared_interiors.len() + self.shared_exteriors.len()
    }

    /// True if both shared lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared_interiors.is_empty() && self.shared_exteriors.is_empty()
    }

    /// Append every interior cell's name to `out`. Exterior cells have no
    /// usable identifier string.
    pub fn list_identifiers(&self, out: &mut Vec<String>) {
        out.reserve(self.shared_interiors.len());
        out.extend(self.interiors_iter().map(|cell| cell.name.clone()));
    }
}

/// Overwrite the mutable header fields on a merge; identity fields stay.
fn merge_header(existing: &mut Cell, incoming: Cell) {
    existing.flags = incoming.flags;
    existing.name = incoming.name;
    existing.region = incoming.region;
    existing.ambient = incoming.ambient;
}

fn upsert_lease(leased: &mut Vec<CellRef>, incoming: CellRef) {
    match leased.iter_mut().find(|r| r.ref_num == incoming.ref_num) {
        Some(slot) => *slot = incoming,
        None => leased.push(incoming),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{MemReader, RawRecord, Value};
    use crate::types::{RefNum, Tag};

    struct CellRecord {
        subs: Vec<(Tag, Value)>,
    }

    impl CellRecord {
        fn interior() -> Self {
            Self {
                subs: vec![(
                    tags::DATA,
                    Value::Ints(vec![Cell::FLAG_INTERIOR.cast_signed(), 0, 0]),
                )],
            }
        }

        fn exterior(x: i32, y: i32) -> Self {
            Self {
                subs: vec![(tags::DATA, Value::Ints(vec![0, x, y]))],
            }
        }

        fn region(mut self, region: &str) -> Self {
            self.subs.push((tags::RGNN, Value::Str(region.into())));
            self
        }

        fn moved(mut self, ref_num: u32, target: (i32, i32), id: &str) -> Self {
            self.subs.push((
                tags::MVRF,
                Value::Ints(vec![ref_num.cast_signed(), target.0, target.1]),
            ));
            self.subs.push((tags::FRMR, Value::Int(ref_num.cast_signed())));
            self.subs.push((tags::NAME, Value::Str(id.into())));
            self
        }

        fn reference(mut self, ref_num: u32, id: &str) -> Self {
            self.subs.push((tags::FRMR, Value::Int(ref_num.cast_signed())));
            self.subs.push((tags::NAME, Value::Str(id.into())));
            self
        }

        // A reference group cut off before its NAME subrecord.
        fn truncated_reference(mut self, ref_num: u32) -> Self {
            self.subs.push((tags::FRMR, Value::Int(ref_num.cast_signed())));
            self
        }

        fn record(self) -> RawRecord {
            RawRecord {
                tag: Cell::TAG,
                subs: self.subs,
            }
        }

        fn load(self, store: &mut CellStore, name: &str) {
            let rec = self.record();
            store.load(&mut MemReader::new(&rec), name).expect("load cell");
        }
    }

    #[test]
    fn exterior_merge_unions_references_and_takes_later_name() {
        let mut store = CellStore::new();
        CellRecord::exterior(2, 3)
            .reference(10, "rock")
            .load(&mut store, "Old Name");
        CellRecord::exterior(2, 3)
            .reference(11, "tree")
            .load(&mut store, "New Name");
        store.set_up();

        assert_eq!(store.len(), 1);
        let cell = store.find_exterior(2, 3).expect("cell");
        assert_eq!(cell.name, "New Name");
        let ids: Vec<_> = cell.refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rock", "tree"]);
    }

    #[test]
    fn merge_replaces_reference_with_same_number() {
        let mut store = CellStore::new();
        CellRecord::exterior(0, 0)
            .reference(7, "door_closed")
            .load(&mut store, "");
        CellRecord::exterior(0, 0)
            .reference(7, "door_open")
            .load(&mut store, "");

        let cell = store.search_exterior(0, 0).expect("cell");
        assert_eq!(cell.refs.len(), 1);
        assert_eq!(cell.refs[0].id, "door_open");
    }

    #[test]
    fn moved_reference_is_leased_to_target_and_tracked_at_origin() {
        let mut store = CellStore::new();
        CellRecord::exterior(0, 0)
            .moved(42, (1, 0), "signpost")
            .load(&mut store, "");

        let origin = store.search_exterior(0, 0).expect("origin");
        assert!(origin.refs.iter().all(|r| r.ref_num != RefNum(42)));
        assert_eq!(origin.moved_refs.len(), 1);
        assert_eq!(origin.moved_refs[0].target, GridPos::new(1, 0));

        let target = store.search_exterior(1, 0).expect("synthesized target");
        assert_eq!(target.leased_refs.len(), 1);
        assert_eq!(target.leased_refs[0].id, "signpost");
        // Synthesized stand-in gets the default water flag.
        assert_ne!(target.flags & Cell::FLAG_HAS_WATER, 0);
    }

    #[test]
    fn re_moved_reference_leaves_previous_destination() {
        let mut store = CellStore::new();
        CellRecord::exterior(0, 0)
            .moved(42, (1, 0), "signpost")
            .load(&mut store, "");
        // A later plugin moves the same reference further east.
        CellRecord::exterior(0, 0)
            .moved(42, (2, 0), "signpost")
            .load(&mut store, "");

        let previous = store.search_exterior(1, 0).expect("previous target");
        assert!(previous.leased_refs.is_empty());
        let current = store.search_exterior(2, 0).expect("current target");
        assert_eq!(current.leased_refs.len(), 1);
        let origin = store.search_exterior(0, 0).expect("origin");
        assert_eq!(origin.moved_refs.len(), 1);
        assert_eq!(origin.moved_refs[0].target, GridPos::new(2, 0));
    }

    #[test]
    fn failed_merge_keeps_the_previously_loaded_cell() {
        let mut store = CellStore::new();
        CellRecord::exterior(2, 3)
            .reference(10, "rock")
            .load(&mut store, "Coast");

        // A later plugin re-declares the cell with a malformed stream.
        let broken = CellRecord::exterior(2, 3)
            .truncated_reference(11)
            .record();
        assert!(store.load(&mut MemReader::new(&broken), "Coast").is_err());

        let cell = store.search_exterior(2, 3).expect("cell survives");
        assert_eq!(cell.refs.len(), 1);
        assert_eq!(cell.refs[0].id, "rock");

        // Same contract for interiors.
        CellRecord::interior().reference(20, "chair").load(&mut store, "Hall");
        let broken = CellRecord::interior().truncated_reference(21).record();
        assert!(store.load(&mut MemReader::new(&broken), "Hall").is_err());
        let hall = store.search_interior("hall").expect("cell survives");
        assert_eq!(hall.refs.len(), 1);
    }

    #[test]
    fn moved_reference_targeting_own_cell_lands_in_flight() {
        let mut store = CellStore::new();
        CellRecord::exterior(5, 5)
            .reference(1, "rock")
            .load(&mut store, "");
        // Merge pass whose moved reference targets the very cell being merged.
        CellRecord::exterior(5, 5)
            .moved(9, (5, 5), "lantern")
            .load(&mut store, "");

        let cell = store.search_exterior(5, 5).expect("cell");
        assert_eq!(cell.refs.len(), 1, "no duplicate cell was synthesized");
        assert_eq!(cell.leased_refs.len(), 1);
        assert_eq!(cell.leased_refs[0].id, "lantern");
    }

    #[test]
    fn search_or_create_synthesizes_once() {
        let mut store = CellStore::new();
        let created = store.search_or_create(-3, 4);
        assert_ne!(created.flags & Cell::FLAG_HAS_WATER, 0);
        assert_eq!(created.grid, GridPos::new(-3, 4));

        // A second call returns the same cell, not a fresh one.
        store.search_or_create(-3, 4);
        store.set_up();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn interior_and_exterior_counted_separately() {
        let mut store = CellStore::new();
        CellRecord::interior().load(&mut store, "Mages Guild");
        CellRecord::exterior(0, 0).load(&mut store, "");
        CellRecord::exterior(0, 1).load(&mut store, "");
        store.set_up();

        assert_eq!(store.len(), 3);
        assert!(store.search_interior("mages guild").is_some());
        let mut ids = Vec::new();
        store.list_identifiers(&mut ids);
        assert_eq!(ids, vec!["Mages Guild"]);
    }

    #[test]
    fn insert_rejects_duplicate_identity() {
        let mut store = CellStore::new();
        CellRecord::interior().load(&mut store, "Guild");
        store.set_up();

        let dup = Cell {
            name: "GUILD".into(),
            flags: Cell::FLAG_INTERIOR,
            ..Cell::default()
        };
        let err = store.insert(dup).expect_err("duplicate");
        assert!(matches!(
            err,
            StoreError::DuplicateRecord { kind: "interior", .. }
        ));

        let fresh = Cell {
            name: "New Tower".into(),
            flags: Cell::FLAG_INTERIOR,
            ..Cell::default()
        };
        store.insert(fresh).expect("fresh insert");
        assert_eq!(store.len(), 2);
        assert!(store.search_interior("new tower").is_some());
    }

    #[test]
    fn erase_removes_dynamic_cells_only() {
        let mut store = CellStore::new();
        CellRecord::exterior(1, 1).load(&mut store, "");
        store.set_up();
        store
            .insert(Cell {
                grid: GridPos::new(8, 8),
                ..Cell::default()
            })
            .expect("insert");

        assert!(store.erase_exterior(8, 8));
        assert!(!store.erase_exterior(8, 8));
        // Static cells survive erase attempts.
        assert!(!store.erase_exterior(1, 1));
        assert!(store.search_exterior(1, 1).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn canonical_exterior_picks_easternmost_then_northernmost() {
        let mut store = CellStore::new();
        for (x, y) in [(0, 0), (2, 1), (2, 5), (1, 9)] {
            CellRecord::exterior(x, y)
                .region("Bitter Coast")
                .load(&mut store, "Shoreline");
        }
        store.set_up();

        let by_name = store.search_ext_by_name("shoreline").expect("by name");
        assert_eq!(by_name.grid, GridPos::new(2, 5));
        let by_region = store.search_ext_by_region("BITTER COAST").expect("by region");
        assert_eq!(by_region.grid, GridPos::new(2, 5));
        assert!(store.search_ext_by_name("nowhere").is_none());
    }
}
