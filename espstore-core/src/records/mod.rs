//! Record types and the capability traits the stores are generic over.
//!
//! Each record type owns its opaque load/save contract against the codec
//! seam; the stores never look inside a record beyond its identity.

pub mod cell;
pub mod land;
pub mod pathgrid;
pub mod simple;

pub use cell::{Cell, CellRef, MovedRef};
pub use land::{Land, LandTexture};
pub use pathgrid::{Pathgrid, PathgridPoint};
pub use simple::{Attribute, Global, MagicEffect, Region, Script, Skill};

use crate::codec::{CodecError, RecordReader, RecordWriter};
use crate::types::Tag;

/// Capability contract for records held in the generic string-keyed
/// [`Store`](crate::Store).
///
/// `load` decodes this record's subrecords from the cursor; the id itself
/// arrives separately through the envelope and is installed with `set_id`
/// before `load` runs. The stored id keeps the caller's original casing;
/// map keys are lowercased by the store.
pub trait StoreRecord: Clone + Default {
    /// Record type tag, used for envelope framing and stream routing.
    const TAG: Tag;

    /// The record's string identifier, original case preserved.
    fn id(&self) -> &str;

    /// Install the record's string identifier.
    fn set_id(&mut self, id: &str);

    /// Decode this record's fields from the cursor, consuming exactly the
    /// record's remaining subrecords.
    ///
    /// # Errors
    /// Any [`CodecError`] from the decode layer.
    fn load(&mut self, reader: &mut dyn RecordReader) -> Result<(), CodecError>;

    /// Emit this record's fields as subrecords. The id envelope is written
    /// by the store, not here.
    ///
    /// # Errors
    /// Any [`CodecError`] from the encode layer.
    fn save(&self, writer: &mut dyn RecordWriter) -> Result<(), CodecError>;
}

/// Capability contract for records keyed by a stable small numeric index,
/// held in [`IndexedStore`](crate::IndexedStore).
pub trait IndexedRecord: Clone {
    /// Record type tag.
    const TAG: Tag;

    /// The record's numeric identity.
    fn index(&self) -> u32;

    /// Decode one record from the cursor.
    ///
    /// # Errors
    /// Any [`CodecError`] from the decode layer.
    fn load(reader: &mut dyn RecordReader) -> Result<Self, CodecError>;
}
