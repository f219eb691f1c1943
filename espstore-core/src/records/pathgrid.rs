//! AI navigation mesh record.
//!
//! The record names its owning cell but does not say whether that cell is
//! interior or exterior; the pathgrid store disambiguates against the
//! cell store at load time.

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, RecordReader};
use crate::types::{GridPos, Tag, tags};

/// One node of a navigation mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathgridPoint {
    /// X position within the cell.
    pub x: i32,
    /// Y position within the cell.
    pub y: i32,
    /// Z position within the cell.
    pub z: i32,
}

/// Navigation mesh of one cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pathgrid {
    /// Name of the owning cell. For exterior cells this may instead be the
    /// region name, which is what makes classification ambiguous.
    pub cell: String,
    /// Grid coordinate; `(0, 0)` for interior cells, which collides with a
    /// real exterior coordinate and so cannot classify the record.
    pub grid: GridPos,
    /// Mesh nodes.
    pub points: Vec<PathgridPoint>,
    /// Edges as index pairs into `points`.
    pub edges: Vec<(u32, u32)>,
}

impl Pathgrid {
    /// Record type tag.
    pub const TAG: Tag = tags::PGRD;

    /// Decode one pathgrid record: `NAME` owning cell, `DATA` grid key,
    /// optional `PGRP` point list and `PGRC` edge list.
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] on malformed point or edge payloads,
    /// or any other decode-layer failure.
    pub fn load(reader: &mut dyn RecordReader) -> Result<Self, CodecError> {
        let cell = reader.next_str(tags::NAME)?;
        let key = reader.next_ints(tags::DATA)?;
        let [x, y] = key[..] else {
            return Err(CodecError::TypeMismatch {
                tag: tags::DATA,
                expected: "[x, y] pathgrid key",
            });
        };

        let mut points = Vec::new();
        if let Some(raw) = reader.try_value(tags::PGRP)? {
            let crate::codec::Value::Ints(raw) = raw else {
                return Err(CodecError::TypeMismatch {
                    tag: tags::PGRP,
                    expected: "int struct",
                });
            };
            if raw.len() % 3 != 0 {
                return Err(CodecError::TypeMismatch {
                    tag: tags::PGRP,
                    expected: "flat [x, y, z] point triples",
                });
            }
            points = raw
                .chunks_exact(3)
                .map(|p| PathgridPoint {
                    x: p[0],
                    y: p[1],
                    z: p[2],
                })
                .collect();
        }

        let mut edges = Vec::new();
        if let Some(raw) = reader.try_value(tags::PGRC)? {
            let crate::codec::Value::Ints(raw) = raw else {
                return Err(CodecError::TypeMismatch {
                    tag: tags::PGRC,
                    expected: "int struct",
                });
            };
            if raw.len() % 2 != 0 {
                return Err(CodecError::TypeMismatch {
                    tag: tags::PGRC,
                    expected: "flat [from, to] edge pairs",
                });
            }
            for pair in raw.chunks_exact(2) {
                let from = u32::try_from(pair[0]).map_err(|_| CodecError::TypeMismatch {
                    tag: tags::PGRC,
                    expected: "unsigned edge index",
                })?;
                let to = u32::try_from(pair[1]).map_err(|_| CodecError::TypeMismatch {
                    tag: tags::PGRC,
                    expected: "unsigned edge index",
                })?;
                edges.push((from, to));
            }
        }

        Ok(Self {
            cell,
            grid: GridPos::new(x, y),
            points,
            edges,
        })
    }
}
