//! Plain record types: the string-keyed majority and the index-keyed
//! catalogs.
//!
//! Field sets are deliberately small; the full on-disk layouts belong to
//! the decode layer. What matters here is each type's identity and its
//! load/save contract.

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, RecordReader, RecordWriter};
use crate::records::{IndexedRecord, StoreRecord};
use crate::types::{Tag, tags};

// ---------------------------------------------------------------------------
// String-keyed records
// ---------------------------------------------------------------------------

/// A script attached to objects or run by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Script id, original case preserved.
    pub id: String,
    /// Script source text.
    pub text: String,
}

impl StoreRecord for Script {
    const TAG: Tag = tags::SCPT;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn load(&mut self, reader: &mut dyn RecordReader) -> Result<(), CodecError> {
        self.text = reader.next_str(tags::TEXT)?;
        Ok(())
    }

    fn save(&self, writer: &mut dyn RecordWriter) -> Result<(), CodecError> {
        writer.sub_str(tags::TEXT, &self.text)
    }
}

/// A named exterior region grouping many cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Region id, original case preserved.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl StoreRecord for Region {
    const TAG: Tag = tags::REGN;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn load(&mut self, reader: &mut dyn RecordReader) -> Result<(), CodecError> {
        self.name = reader.next_str(tags::FNAM)?;
        Ok(())
    }

    fn save(&self, writer: &mut dyn RecordWriter) -> Result<(), CodecError> {
        writer.sub_str(tags::FNAM, &self.name)
    }
}

/// A global scripting variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Global {
    /// Variable id, original case preserved.
    pub id: String,
    /// Current value.
    pub value: f32,
}

impl StoreRecord for Global {
    const TAG: Tag = tags::GLOB;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn load(&mut self, reader: &mut dyn RecordReader) -> Result<(), CodecError> {
        self.value = reader.next_float(tags::FLTV)?;
        Ok(())
    }

    fn save(&self, writer: &mut dyn RecordWriter) -> Result<(), CodecError> {
        writer.sub_float(tags::FLTV, self.value)
    }
}

// ---------------------------------------------------------------------------
// Index-keyed records
// ---------------------------------------------------------------------------

fn unsigned_index(raw: i32) -> Result<u32, CodecError> {
    u32::try_from(raw).map_err(|_| CodecError::TypeMismatch {
        tag: tags::INTV,
        expected: "unsigned index",
    })
}

/// A magic effect from the fixed effect catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MagicEffect {
    /// Catalog index.
    pub index: u32,
    /// Base casting cost.
    pub base_cost: f32,
}

impl IndexedRecord for MagicEffect {
    const TAG: Tag = tags::MGEF;

    fn index(&self) -> u32 {
        self.index
    }

    fn load(reader: &mut dyn RecordReader) -> Result<Self, CodecError> {
        let index = unsigned_index(reader.next_int(tags::INTV)?)?;
        let base_cost = reader.next_float(tags::MEDT)?;
        Ok(Self { index, base_cost })
    }
}

/// A skill from the fixed skill catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Catalog index.
    pub index: u32,
    /// Governing attribute index.
    pub attribute: u32,
}

impl IndexedRecord for Skill {
    const TAG: Tag = tags::SKIL;

    fn index(&self) -> u32 {
        self.index
    }

    fn load(reader: &mut dyn RecordReader) -> Result<Self, CodecError> {
        let index = unsigned_index(reader.next_int(tags::INTV)?)?;
        let attribute = unsigned_index(reader.next_int(tags::SKDT)?)?;
        Ok(Self { index, attribute })
    }
}

// ---------------------------------------------------------------------------
// Built-in attribute catalog
// ---------------------------------------------------------------------------

/// One of the eight built-in character attributes.
///
/// Attributes are not loaded from plugins; the attribute store
/// synthesizes the full closed set during `set_up`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Position in the fixed attribute enumeration.
    pub index: u32,
    /// Canonical attribute id.
    pub id: &'static str,
}

impl Attribute {
    /// Canonical ids of the closed attribute set, in enumeration order.
    pub const IDS: [&'static str; 8] = [
        "strength",
        "intelligence",
        "willpower",
        "agility",
        "speed",
        "endurance",
        "personality",
        "luck",
    ];

    /// Number of attributes in the closed set.
    pub const COUNT: usize = Self::IDS.len();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
