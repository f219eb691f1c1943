//! Terrain records: heightmap squares and texture palette entries.

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, RecordReader};
use crate::types::{GridPos, Tag, tags};

/// One terrain square's heightmap data, keyed by grid coordinate.
///
/// Effectively immutable once loading finishes; background terrain
/// streaming reads these from worker threads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Land {
    /// Grid coordinate of this terrain square.
    pub grid: GridPos,
    /// Terrain data flags.
    pub flags: u32,
    /// Vertex heights, row-major.
    pub heights: Vec<f32>,
}

impl Land {
    /// Record type tag.
    pub const TAG: Tag = tags::LAND;

    /// Decode one land record: `INTV` grid key, `DATA` flags and the
    /// optional `VHGT` height payload.
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] on a malformed grid key, or any other
    /// decode-layer failure.
    pub fn load(reader: &mut dyn RecordReader) -> Result<Self, CodecError> {
        let key = reader.next_ints(tags::INTV)?;
        let [x, y] = key[..] else {
            return Err(CodecError::TypeMismatch {
                tag: tags::INTV,
                expected: "[x, y] land key",
            });
        };
        let flags = reader.next_int(tags::DATA)?.cast_unsigned();
        let heights = match reader.try_value(tags::VHGT)? {
            Some(crate::codec::Value::Floats(h)) => h,
            Some(_) => {
                return Err(CodecError::TypeMismatch {
                    tag: tags::VHGT,
                    expected: "float struct",
                });
            }
            None => Vec::new(),
        };
        Ok(Self {
            grid: GridPos::new(x, y),
            flags,
            heights,
        })
    }
}

/// One terrain texture palette entry.
///
/// Texture indexes are local to the plugin that defined them, so the
/// texture store keys entries by (plugin, index) rather than by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandTexture {
    /// Texture id, original case preserved.
    pub id: String,
    /// Index local to the defining plugin.
    pub index: u32,
    /// Path of the texture image.
    pub texture: String,
}

impl LandTexture {
    /// Record type tag.
    pub const TAG: Tag = tags::LTEX;

    /// Decode one texture entry: `INTV` local index and `DATA` path.
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] on a negative index, or any other
    /// decode-layer failure.
    pub fn load(reader: &mut dyn RecordReader, id: &str) -> Result<Self, CodecError> {
        let index = u32::try_from(reader.next_int(tags::INTV)?).map_err(|_| {
            CodecError::TypeMismatch {
                tag: tags::INTV,
                expected: "unsigned texture index",
            }
        })?;
        let texture = reader.next_str(tags::DATA)?;
        Ok(Self {
            id: id.to_string(),
            index,
            texture,
        })
    }
}
