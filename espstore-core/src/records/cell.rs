//! World-cell record: placed references, leased references and
//! moved-reference bookkeeping.
//!
//! A cell record in a plugin stream looks like this (after the `NAME`
//! envelope consumed by the loader):
//!
//! ```text
//! DATA  [flags, grid_x, grid_y]
//! RGNN  region id            (optional, exterior only)
//! AMBI  packed ambient color (optional)
//! MVRF  [ref_num, target_x, target_y]   \  zero or more moved-reference
//! FRMR  ref_num                          } groups, exterior only;
//! NAME  object id                        } consumed by the cell store,
//! DELE  0                               /  not by `load_refs`
//! FRMR  ref_num   \
//! NAME  object id  } zero or more placed-reference groups
//! DELE  0         /  (DELE optional)
//! ```
//!
//! Whether the reference lists accumulate or replace is the cell store's
//! decision, passed to [`Cell::load_refs`] as the merge flag.

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, RecordReader, RecordWriter};
use crate::types::{GridPos, RefNum, Tag, tags};

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// An object placed in a cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellRef {
    /// Content-wide unique reference number.
    pub ref_num: RefNum,
    /// Id of the placed object.
    pub id: String,
}

/// Note that a reference declared in this cell now lives in another cell.
///
/// Each moved reference is one edge: it appears in the origin cell's
/// moved list and as a leased [`CellRef`] in the destination cell,
/// exactly once, keyed by its reference number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedRef {
    /// Reference number of the relocated object.
    pub ref_num: RefNum,
    /// Grid coordinate of the destination cell.
    pub target: GridPos,
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// A world cell: interior (identified by name) or exterior (identified by
/// grid coordinate).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Cell name; the identity of interior cells, display-only (and often
    /// empty) for exterior cells. Original case preserved.
    pub name: String,
    /// Region this exterior cell belongs to, if any.
    pub region: Option<String>,
    /// Cell flags, see the `FLAG_*` constants.
    pub flags: u32,
    /// Grid coordinate; meaningful for exterior cells only.
    pub grid: GridPos,
    /// Packed ambient light color.
    pub ambient: u32,
    /// Objects placed in this cell.
    pub refs: Vec<CellRef>,
    /// References on loan from other cells that declared them moved here.
    pub leased_refs: Vec<CellRef>,
    /// References declared here but relocated to other cells.
    pub moved_refs: Vec<MovedRef>,
}

impl Cell {
    /// Record type tag.
    pub const TAG: Tag = tags::CELL;

    /// Set when the cell is an interior.
    pub const FLAG_INTERIOR: u32 = 0x01;
    /// Set when the cell has a water plane.
    pub const FLAG_HAS_WATER: u32 = 0x02;

    /// True for grid-keyed exterior cells.
    #[must_use]
    pub fn is_exterior(&self) -> bool {
        self.flags & Self::FLAG_INTERIOR == 0
    }

    /// Decode the cheap header only: flags, grid coordinate, region and
    /// ambient light. Classifies the cell before any reference is read.
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] if the `DATA` payload is malformed,
    /// or any other decode-layer failure.
    pub fn load_header(&mut self, reader: &mut dyn RecordReader) -> Result<(), CodecError> {
        let data = reader.next_ints(tags::DATA)?;
        let [flags, x, y] = data[..] else {
            return Err(CodecError::TypeMismatch {
                tag: tags::DATA,
                expected: "[flags, x, y] cell header",
            });
        };
        self.flags = flags.cast_unsigned();
        self.grid = GridPos::new(x, y);

        if reader.is_next_sub(tags::RGNN) {
            self.region = Some(reader.next_str(tags::RGNN)?);
        }
        if reader.is_next_sub(tags::AMBI) {
            self.ambient = reader.next_int(tags::AMBI)?.cast_unsigned();
        }
        Ok(())
    }

    /// Decode the remaining placed-reference groups.
    ///
    /// With `merge` set, incoming references accumulate into the existing
    /// list: a reference replaces any earlier one with the same reference
    /// number, and a deletion marker removes it. Without `merge`, the
    /// stream's references simply populate the list.
    ///
    /// # Errors
    /// Any decode-layer failure inside a reference group.
    pub fn load_refs(
        &mut self,
        reader: &mut dyn RecordReader,
        merge: bool,
    ) -> Result<(), CodecError> {
        while reader.is_next_sub(tags::FRMR) {
            let (cell_ref, deleted) = Self::read_ref(reader)?;
            if deleted {
                self.refs.retain(|r| r.ref_num != cell_ref.ref_num);
            } else if merge {
                match self.refs.iter_mut().find(|r| r.ref_num == cell_ref.ref_num) {
                    Some(existing) => *existing = cell_ref,
                    None => self.refs.push(cell_ref),
                }
            } else {
                self.refs.push(cell_ref);
            }
        }
        Ok(())
    }

    /// Decode one placed-reference group: `FRMR`, `NAME` and an optional
    /// `DELE` deletion marker.
    ///
    /// # Errors
    /// Any decode-layer failure inside the group.
    pub fn read_ref(reader: &mut dyn RecordReader) -> Result<(CellRef, bool), CodecError> {
        let ref_num = RefNum(reader.next_int(tags::FRMR)?.cast_unsigned());
        let id = reader.next_str(tags::NAME)?;
        let deleted = reader.try_value(tags::DELE)?.is_some();
        Ok((CellRef { ref_num, id }, deleted))
    }

    /// Decode one moved-reference header: the `MVRF` subrecord naming the
    /// relocated reference and its destination coordinate. The reference
    /// group itself follows and is read with [`Cell::read_ref`].
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] if the `MVRF` payload is malformed.
    pub fn read_moved_ref(reader: &mut dyn RecordReader) -> Result<MovedRef, CodecError> {
        let data = reader.next_ints(tags::MVRF)?;
        let [ref_num, x, y] = data[..] else {
            return Err(CodecError::TypeMismatch {
                tag: tags::MVRF,
                expected: "[ref_num, target_x, target_y] moved reference",
            });
        };
        Ok(MovedRef {
            ref_num: RefNum(ref_num.cast_unsigned()),
            target: GridPos::new(x, y),
        })
    }

    /// Emit header and placed references. Leased and moved bookkeeping is
    /// load-time state and is not serialized.
    ///
    /// # Errors
    /// Any encode-layer failure.
    pub fn save(&self, writer: &mut dyn RecordWriter) -> Result<(), CodecError> {
        writer.sub_ints(
            tags::DATA,
            vec![self.flags.cast_signed(), self.grid.x, self.grid.y],
        )?;
        if let Some(region) = &self.region {
            writer.sub_str(tags::RGNN, region)?;
        }
        if self.ambient != 0 {
            writer.sub_int(tags::AMBI, self.ambient.cast_signed())?;
        }
        for r in &self.refs {
            writer.sub_int(tags::FRMR, r.ref_num.0.cast_signed())?;
            writer.sub_str(tags::NAME, &r.id)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
