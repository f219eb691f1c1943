//! Core identity and framing types shared by every store.
//!
//! Plugin files are streams of tagged records; the types here carry the
//! identities the storage layer keys on: four-byte record tags, exterior
//! grid coordinates, and placed-object reference numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Record / subrecord tags
// ---------------------------------------------------------------------------

/// Four-byte ASCII tag identifying a record or subrecord in a plugin stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    /// Build a tag from its four raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

/// Well-known record and subrecord tags consumed by this layer.
///
/// The field-level schema behind each tag belongs to the decode layer;
/// the stores only use these to route records and frame envelopes.
pub mod tags {
    use super::Tag;

    /// World cell record.
    pub const CELL: Tag = Tag(*b"CELL");
    /// Terrain heightmap record.
    pub const LAND: Tag = Tag(*b"LAND");
    /// Terrain texture palette entry.
    pub const LTEX: Tag = Tag(*b"LTEX");
    /// AI navigation mesh record.
    pub const PGRD: Tag = Tag(*b"PGRD");
    /// Script record.
    pub const SCPT: Tag = Tag(*b"SCPT");
    /// Region record.
    pub const REGN: Tag = Tag(*b"REGN");
    /// Global variable record.
    pub const GLOB: Tag = Tag(*b"GLOB");
    /// Magic effect record (index-keyed).
    pub const MGEF: Tag = Tag(*b"MGEF");
    /// Skill record (index-keyed).
    pub const SKIL: Tag = Tag(*b"SKIL");

    /// Record id envelope subrecord.
    pub const NAME: Tag = Tag(*b"NAME");
    /// Fixed-layout data subrecord.
    pub const DATA: Tag = Tag(*b"DATA");
    /// Region name subrecord on exterior cells.
    pub const RGNN: Tag = Tag(*b"RGNN");
    /// Ambient lighting subrecord on cells.
    pub const AMBI: Tag = Tag(*b"AMBI");
    /// Placed-object reference subrecord.
    pub const FRMR: Tag = Tag(*b"FRMR");
    /// Deletion marker subrecord.
    pub const DELE: Tag = Tag(*b"DELE");
    /// Moved-reference subrecord on exterior cells.
    pub const MVRF: Tag = Tag(*b"MVRF");
    /// Integer value subrecord (indexes, grid keys).
    pub const INTV: Tag = Tag(*b"INTV");
    /// Float value subrecord.
    pub const FLTV: Tag = Tag(*b"FLTV");
    /// Script text subrecord.
    pub const TEXT: Tag = Tag(*b"TEXT");
    /// Display name subrecord.
    pub const FNAM: Tag = Tag(*b"FNAM");
    /// Terrain height data subrecord.
    pub const VHGT: Tag = Tag(*b"VHGT");
    /// Pathgrid point list subrecord.
    pub const PGRP: Tag = Tag(*b"PGRP");
    /// Pathgrid edge list subrecord.
    pub const PGRC: Tag = Tag(*b"PGRC");
    /// Magic effect / skill data subrecord.
    pub const MEDT: Tag = Tag(*b"MEDT");
    /// Skill data subrecord.
    pub const SKDT: Tag = Tag(*b"SKDT");
}

// ---------------------------------------------------------------------------
// Spatial identity
// ---------------------------------------------------------------------------

/// Signed 2D grid coordinate of an exterior cell or terrain square.
///
/// Ordering is by `x` first, then `y`; the land store's binary search and
/// every exterior map rely on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    /// Eastward grid coordinate.
    pub x: i32,
    /// Northward grid coordinate.
    pub y: i32,
}

impl GridPos {
    /// Build a grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Unique number of a placed-object reference within the loaded content.
///
/// Moved-reference bookkeeping treats this as the reference's identity when
/// relocating it between cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RefNum(pub u32);

impl fmt::Display for RefNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Load-order index of a plugin within the current session.
pub type PluginIndex = usize;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Collaborator notified once per serialized dynamic record during a save.
pub trait ProgressListener {
    /// Advance the progress indicator by one unit of work.
    fn advance(&mut self);
}

/// Listener that discards all progress notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl ProgressListener for NullListener {
    fn advance(&mut self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
