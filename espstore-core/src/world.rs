//! Top-level aggregate: one store per record type behind a single
//! tag-dispatched loading surface.
//!
//! Plugins are decoded record by record in load order. Each record is
//! routed to its store by type tag, later plugins overriding earlier
//! ones inside the stores themselves. After the last plugin,
//! [`WorldStore::set_up`] runs exactly once to freeze the static layers
//! and build the derived lookup structures.

use tracing::{debug, info};

use crate::cell_store::CellStore;
use crate::codec::{RecordReader, RecordWriter};
use crate::error::{Result, StoreError};
use crate::indexed::{AttributeStore, IndexedStore};
use crate::pathgrid_store::PathgridStore;
use crate::records::{Global, MagicEffect, Region, Script, Skill, StoreRecord};
use crate::store::Store;
use crate::terrain::{LandStore, LandTextureStore};
use crate::types::{ProgressListener, Tag, tags};

/// Every store the engine consults, owned together so one load pass and
/// one `set_up` pass cover them all.
#[derive(Debug, Clone, Default)]
pub struct WorldStore {
    /// Global variables.
    pub globals: Store<Global>,
    /// Scripts.
    pub scripts: Store<Script>,
    /// Regions.
    pub regions: Store<Region>,
    /// Cells, interior and exterior.
    pub cells: CellStore,
    /// Terrain height data.
    pub lands: LandStore,
    /// Terrain texture table, keyed by originating plugin.
    pub land_textures: LandTextureStore,
    /// Magic effects, identified by numeric index.
    pub magic_effects: IndexedStore<MagicEffect>,
    /// Skills, identified by numeric index.
    pub skills: IndexedStore<Skill>,
    /// The fixed attribute catalog, synthesized in `set_up`.
    pub attributes: AttributeStore,
    /// Navigation meshes, classified against `cells`.
    pub pathgrids: PathgridStore,
}

impl WorldStore {
    /// Create an empty world store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one decoded record to its store.
    ///
    /// `id` is the record's `NAME` identifier when its type carries one
    /// and is ignored otherwise. Pathgrids are classified against the
    /// cells loaded so far, which is why plugin record order matters.
    ///
    /// # Errors
    /// [`StoreError::UnknownRecord`] for a tag no store claims; decode
    /// failures propagate unmodified.
    pub fn load_record(
        &mut self,
        tag: Tag,
        reader: &mut dyn RecordReader,
        id: &str,
    ) -> Result<()> {
        match tag {
            tags::GLOB => self.globals.load(reader, id),
            tags::SCPT => self.scripts.load(reader, id),
            tags::REGN => self.regions.load(reader, id),
            tags::CELL => self.cells.load(reader, id),
            tags::LAND => self.lands.load(reader),
            tags::LTEX => self.land_textures.load(reader, id),
            tags::MGEF => self.magic_effects.load(reader),
            tags::SKIL => self.skills.load(reader),
            tags::PGRD => {
                // The pathgrid store consults the cell store while
                // loading; destructuring splits the borrow.
                let Self {
                    pathgrids, cells, ..
                } = self;
                pathgrids.load(reader, cells)
            }
            _ => {
                debug!(%tag, "no store claims record type");
                Err(StoreError::UnknownRecord { tag })
            }
        }
    }

    /// Freeze the static layers and build derived structures. Call once,
    /// after the last plugin.
    pub fn set_up(&mut self) {
        self.globals.set_up();
        self.scripts.set_up();
        self.regions.set_up();
        self.cells.set_up();
        self.lands.set_up();
        self.magic_effects.set_up();
        self.skills.set_up();
        self.attributes.set_up();

        info!(
            globals = self.globals.len(),
            scripts = self.scripts.len(),
            regions = self.regions.len(),
            cells = self.cells.len(),
            lands = self.lands.len(),
            pathgrids = self.pathgrids.len(),
            "record stores ready"
        );
    }

    /// Number of runtime-created records a save stream will carry.
    #[must_use]
    pub fn dynamic_len(&self) -> usize {
        self.globals.dynamic_len() + self.scripts.dynamic_len() + self.regions.dynamic_len()
    }

    /// Serialize every dynamic record, reporting progress per record.
    ///
    /// # Errors
    /// Encode failures propagate unmodified.
    pub fn write_dynamic(
        &self,
        writer: &mut dyn RecordWriter,
        progress: &mut dyn ProgressListener,
    ) -> Result<()> {
        self.globals.write(writer, progress)?;
        self.scripts.write(writer, progress)?;
        self.regions.write(writer, progress)?;
        Ok(())
    }

    /// Replay one record from a save stream into its dynamic layer.
    ///
    /// # Errors
    /// [`StoreError::UnknownRecord`] for a tag saves never carry; decode
    /// failures propagate unmodified.
    pub fn read_record(&mut self, tag: Tag, reader: &mut dyn RecordReader, id: &str) -> Result<()> {
        match tag {
            Global::TAG => self.globals.read(reader, id).map(|_| ()),
            Script::TAG => self.scripts.read(reader, id).map(|_| ()),
            Region::TAG => self.regions.read(reader, id).map(|_| ()),
            _ => Err(StoreError::UnknownRecord { tag }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{MemReader, RawRecord, Value};
    use crate::records::Cell;

    #[test]
    fn load_record_routes_by_tag() {
        let mut world = WorldStore::new();
        let rec = RawRecord {
            tag: tags::GLOB,
            subs: vec![(tags::FLTV, Value::Float(1.0))],
        };
        world
            .load_record(tags::GLOB, &mut MemReader::new(&rec), "Day")
            .expect("load");
        assert!(world.globals.search("day").is_some());
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let mut world = WorldStore::new();
        let rec = RawRecord {
            tag: Tag(*b"BOOK"),
            subs: vec![],
        };
        let err = world
            .load_record(Tag(*b"BOOK"), &mut MemReader::new(&rec), "x")
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownRecord { .. }));
    }

    #[test]
    fn set_up_synthesizes_attribute_catalog() {
        let mut world = WorldStore::new();
        assert!(world.attributes.is_empty());
        world.set_up();
        assert_eq!(world.attributes.len(), 8);
    }

    #[test]
    fn pathgrid_classification_sees_prior_cells() {
        let mut world = WorldStore::new();
        let cell = RawRecord {
            tag: tags::CELL,
            subs: vec![(
                tags::DATA,
                Value::Ints(vec![Cell::FLAG_INTERIOR.cast_signed(), 0, 0]),
            )],
        };
        world
            .load_record(tags::CELL, &mut MemReader::new(&cell), "Guild Hall")
            .expect("cell");

        let pg = RawRecord {
            tag: tags::PGRD,
            subs: vec![
                (tags::NAME, Value::Str("Guild Hall".into())),
                (tags::DATA, Value::Ints(vec![0, 0])),
            ],
        };
        world
            .load_record(tags::PGRD, &mut MemReader::new(&pg), "")
            .expect("pathgrid");

        assert!(world.pathgrids.search_interior("guild hall").is_some());
    }

    #[test]
    fn dynamic_records_survive_a_save_round_trip() {
        let mut world = WorldStore::new();
        world.set_up();
        world.globals.insert(Global {
            id: "CrimeGoldDiscount".into(),
            value: 0.5,
        });
        world.scripts.insert(Script {
            id: "doorScript".into(),
            text: "begin doorScript\nend".into(),
        });
        assert_eq!(world.dynamic_len(), 2);

        let mut writer = crate::codec::MemWriter::new();
        let mut progress = crate::types::NullListener;
        world
            .write_dynamic(&mut writer, &mut progress)
            .expect("write");

        let mut restored = WorldStore::new();
        restored.set_up();
        for rec in writer.records() {
            let mut reader = MemReader::new(rec);
            let id = reader.next_str(tags::NAME).expect("envelope id");
            restored
                .read_record(rec.tag, &mut reader, &id)
                .expect("read");
        }

        assert_eq!(restored.dynamic_len(), 2);
        let global = restored.globals.find("crimegolddiscount").expect("global");
        assert!((global.value - 0.5).abs() < f32::EPSILON);
        assert!(restored.scripts.is_dynamic("doorscript"));
    }
}
