//! Seam to the external record codec layer.
//!
//! The stores never touch raw bytes. They consume one record at a time
//! through [`RecordReader`], a cursor over the current record's tagged
//! subrecord payloads, and emit dynamic records through [`RecordWriter`],
//! which frames each record in a `start_record`/`end_record` envelope.
//! The binary field-level schema lives entirely behind these traits.
//!
//! [`MemWriter`] and [`MemReader`] are the in-memory reference
//! implementation of the seam. Save round-trips and the test suites run
//! against them; production loaders substitute the real file codec.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

use crate::types::{PluginIndex, Tag};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Decode or encode failure raised at the codec seam.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The record ended while another subrecord was expected.
    #[error("unexpected end of record while looking for subrecord {expected}")]
    Eof {
        /// Tag of the subrecord the decoder was looking for.
        expected: Tag,
    },

    /// The next subrecord carries a different tag than required.
    #[error("expected subrecord {expected}, found {found}")]
    UnexpectedSub {
        /// Tag the decoder required.
        expected: Tag,
        /// Tag actually present in the stream.
        found: Tag,
    },

    /// A subrecord payload has the wrong shape for its consumer.
    #[error("subrecord {tag} is not a {expected} payload")]
    TypeMismatch {
        /// Tag of the offending subrecord.
        tag: Tag,
        /// Payload kind the consumer required.
        expected: &'static str,
    },

    /// Record envelope misuse on the writer side.
    #[error("record framing error: {0}")]
    Framing(String),
}

// ---------------------------------------------------------------------------
// Subrecord payloads
// ---------------------------------------------------------------------------

/// Decoded payload of one subrecord.
///
/// The decode layer maps on-disk field layouts to these shapes; record
/// types map them to their fields. The stores themselves only ever
/// forward them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Text payload.
    Str(String),
    /// Single 32-bit integer payload.
    Int(i32),
    /// Single float payload.
    Float(f32),
    /// Fixed-layout integer struct payload.
    Ints(Vec<i32>),
    /// Fixed-layout float struct payload.
    Floats(Vec<f32>),
    /// Opaque payload carried through without interpretation.
    Bytes(Vec<u8>),
}

impl Value {
    /// Human-readable payload kind, used in type-mismatch errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Ints(_) => "int struct",
            Self::Floats(_) => "float struct",
            Self::Bytes(_) => "bytes",
        }
    }
}

// ---------------------------------------------------------------------------
// Reader / writer contracts
// ---------------------------------------------------------------------------

/// Cursor over the subrecords of the record currently being loaded.
pub trait RecordReader {
    /// True if the next subrecord carries `tag`. Does not consume.
    fn is_next_sub(&mut self, tag: Tag) -> bool;

    /// True if the current record has subrecords left.
    fn has_more_subs(&mut self) -> bool;

    /// Consume the next subrecord, which must carry `tag`.
    ///
    /// # Errors
    /// [`CodecError::Eof`] at end of record, [`CodecError::UnexpectedSub`]
    /// on a tag mismatch.
    fn next_value(&mut self, tag: Tag) -> Result<Value, CodecError>;

    /// Load-order index of the plugin this record came from.
    fn plugin_index(&self) -> PluginIndex {
        0
    }

    /// Consume the next subrecord if it carries `tag`, else leave the
    /// cursor untouched.
    ///
    /// # Errors
    /// Propagates [`Self::next_value`] failures.
    fn try_value(&mut self, tag: Tag) -> Result<Option<Value>, CodecError> {
        if self.is_next_sub(tag) {
            self.next_value(tag).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Consume a string subrecord.
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] if the payload is not [`Value::Str`].
    fn next_str(&mut self, tag: Tag) -> Result<String, CodecError> {
        match self.next_value(tag)? {
            Value::Str(s) => Ok(s),
            _ => Err(CodecError::TypeMismatch {
                tag,
                expected: "string",
            }),
        }
    }

    /// Consume an integer subrecord.
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] if the payload is not [`Value::Int`].
    fn next_int(&mut self, tag: Tag) -> Result<i32, CodecError> {
        match self.next_value(tag)? {
            Value::Int(v) => Ok(v),
            _ => Err(CodecError::TypeMismatch { tag, expected: "int" }),
        }
    }

    /// Consume a float subrecord.
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] if the payload is not [`Value::Float`].
    fn next_float(&mut self, tag: Tag) -> Result<f32, CodecError> {
        match self.next_value(tag)? {
            Value::Float(v) => Ok(v),
            _ => Err(CodecError::TypeMismatch {
                tag,
                expected: "float",
            }),
        }
    }

    /// Consume an integer-struct subrecord.
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] if the payload is not [`Value::Ints`].
    fn next_ints(&mut self, tag: Tag) -> Result<Vec<i32>, CodecError> {
        match self.next_value(tag)? {
            Value::Ints(v) => Ok(v),
            _ => Err(CodecError::TypeMismatch {
                tag,
                expected: "int struct",
            }),
        }
    }

    /// Consume a float-struct subrecord.
    ///
    /// # Errors
    /// [`CodecError::TypeMismatch`] if the payload is not [`Value::Floats`].
    fn next_floats(&mut self, tag: Tag) -> Result<Vec<f32>, CodecError> {
        match self.next_value(tag)? {
            Value::Floats(v) => Ok(v),
            _ => Err(CodecError::TypeMismatch {
                tag,
                expected: "float struct",
            }),
        }
    }
}

/// Sink for serialized records, framed in a record envelope.
pub trait RecordWriter {
    /// Open a record envelope with the given record tag.
    ///
    /// # Errors
    /// [`CodecError::Framing`] if a record is already open.
    fn start_record(&mut self, tag: Tag) -> Result<(), CodecError>;

    /// Close the currently open record envelope, which must carry `tag`.
    ///
    /// # Errors
    /// [`CodecError::Framing`] if no record is open or the tag differs.
    fn end_record(&mut self, tag: Tag) -> Result<(), CodecError>;

    /// Append one subrecord to the open record.
    ///
    /// # Errors
    /// [`CodecError::Framing`] if no record is open.
    fn sub(&mut self, tag: Tag, value: Value) -> Result<(), CodecError>;

    /// Append a string subrecord.
    ///
    /// # Errors
    /// Propagates [`Self::sub`] failures.
    fn sub_str(&mut self, tag: Tag, value: &str) -> Result<(), CodecError> {
        self.sub(tag, Value::Str(value.to_string()))
    }

    /// Append an integer subrecord.
    ///
    /// # Errors
    /// Propagates [`Self::sub`] failures.
    fn sub_int(&mut self, tag: Tag, value: i32) -> Result<(), CodecError> {
        self.sub(tag, Value::Int(value))
    }

    /// Append a float subrecord.
    ///
    /// # Errors
    /// Propagates [`Self::sub`] failures.
    fn sub_float(&mut self, tag: Tag, value: f32) -> Result<(), CodecError> {
        self.sub(tag, Value::Float(value))
    }

    /// Append an integer-struct subrecord.
    ///
    /// # Errors
    /// Propagates [`Self::sub`] failures.
    fn sub_ints(&mut self, tag: Tag, value: Vec<i32>) -> Result<(), CodecError> {
        self.sub(tag, Value::Ints(value))
    }

    /// Append a float-struct subrecord.
    ///
    /// # Errors
    /// Propagates [`Self::sub`] failures.
    fn sub_floats(&mut self, tag: Tag, value: Vec<f32>) -> Result<(), CodecError> {
        self.sub(tag, Value::Floats(value))
    }
}

// ---------------------------------------------------------------------------
// In-memory reference implementation
// ---------------------------------------------------------------------------

/// One fully decoded record: its tag plus subrecords in stream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Record type tag.
    pub tag: Tag,
    /// Subrecords in the order they were written.
    pub subs: Vec<(Tag, Value)>,
}

/// [`RecordWriter`] that collects framed records in memory.
#[derive(Debug, Default)]
pub struct MemWriter {
    records: Vec<RawRecord>,
    open: Option<RawRecord>,
}

impl MemWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All records written so far, in write order.
    #[must_use]
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// Consume the writer and return the collected records.
    #[must_use]
    pub fn into_records(self) -> Vec<RawRecord> {
        self.records
    }
}

impl RecordWriter for MemWriter {
    fn start_record(&mut self, tag: Tag) -> Result<(), CodecError> {
        if let Some(open) = &self.open {
            return Err(CodecError::Framing(format!(
                "start_record({tag}) while {} is still open",
                open.tag
            )));
        }
        self.open = Some(RawRecord {
            tag,
            subs: Vec::new(),
        });
        Ok(())
    }

    fn end_record(&mut self, tag: Tag) -> Result<(), CodecError> {
        match self.open.take() {
            Some(rec) if rec.tag == tag => {
                self.records.push(rec);
                Ok(())
            }
            Some(rec) => {
                let open_tag = rec.tag;
                self.open = Some(rec);
                Err(CodecError::Framing(format!(
                    "end_record({tag}) does not match open record {open_tag}"
                )))
            }
            None => Err(CodecError::Framing(format!(
                "end_record({tag}) with no open record"
            ))),
        }
    }

    fn sub(&mut self, tag: Tag, value: Value) -> Result<(), CodecError> {
        match &mut self.open {
            Some(rec) => {
                rec.subs.push((tag, value));
                Ok(())
            }
            None => Err(CodecError::Framing(format!(
                "subrecord {tag} written outside a record envelope"
            ))),
        }
    }
}

/// [`RecordReader`] over one in-memory record.
#[derive(Debug)]
pub struct MemReader {
    subs: VecDeque<(Tag, Value)>,
    plugin: PluginIndex,
}

impl MemReader {
    /// Cursor over a record's subrecords, attributed to plugin 0.
    #[must_use]
    pub fn new(record: &RawRecord) -> Self {
        Self::with_plugin(record, 0)
    }

    /// Cursor over a record's subrecords, attributed to the given plugin.
    #[must_use]
    pub fn with_plugin(record: &RawRecord, plugin: PluginIndex) -> Self {
        Self {
            subs: record.subs.iter().cloned().collect(),
            plugin,
        }
    }
}

impl RecordReader for MemReader {
    fn is_next_sub(&mut self, tag: Tag) -> bool {
        self.subs.front().is_some_and(|(t, _)| *t == tag)
    }

    fn has_more_subs(&mut self) -> bool {
        !self.subs.is_empty()
    }

    fn next_value(&mut self, tag: Tag) -> Result<Value, CodecError> {
        match self.subs.pop_front() {
            Some((t, value)) if t == tag => Ok(value),
            Some((t, value)) => {
                self.subs.push_front((t, value));
                Err(CodecError::UnexpectedSub {
                    expected: tag,
                    found: t,
                })
            }
            None => Err(CodecError::Eof { expected: tag }),
        }
    }

    fn plugin_index(&self) -> PluginIndex {
        self.plugin
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tags;

    #[test]
    fn writer_frames_records() {
        let mut w = MemWriter::new();
        w.start_record(tags::SCPT).expect("start");
        w.sub_str(tags::NAME, "wraith_guard").expect("name");
        w.sub_str(tags::TEXT, "begin wraith_guard\nend").expect("text");
        w.end_record(tags::SCPT).expect("end");

        assert_eq!(w.records().len(), 1);
        assert_eq!(w.records()[0].tag, tags::SCPT);
        assert_eq!(w.records()[0].subs.len(), 2);
    }

    #[test]
    fn writer_rejects_unbalanced_envelopes() {
        let mut w = MemWriter::new();
        assert!(w.sub_int(tags::INTV, 1).is_err());
        w.start_record(tags::GLOB).expect("start");
        assert!(w.start_record(tags::GLOB).is_err());
        assert!(w.end_record(tags::SCPT).is_err());
        w.end_record(tags::GLOB).expect("end");
        assert!(w.end_record(tags::GLOB).is_err());
    }

    #[test]
    fn reader_replays_subs_in_order() {
        let rec = RawRecord {
            tag: tags::GLOB,
            subs: vec![
                (tags::NAME, Value::Str("day".into())),
                (tags::FLTV, Value::Float(3.0)),
            ],
        };
        let mut r = MemReader::new(&rec);
        assert!(r.is_next_sub(tags::NAME));
        assert_eq!(r.next_str(tags::NAME).expect("name"), "day");
        assert!((r.next_float(tags::FLTV).expect("fltv") - 3.0).abs() < f32::EPSILON);
        assert!(!r.has_more_subs());
        assert!(matches!(
            r.next_value(tags::FLTV),
            Err(CodecError::Eof { .. })
        ));
    }

    #[test]
    fn reader_keeps_cursor_on_tag_mismatch() {
        let rec = RawRecord {
            tag: tags::GLOB,
            subs: vec![(tags::FLTV, Value::Float(1.0))],
        };
        let mut r = MemReader::new(&rec);
        assert!(matches!(
            r.next_value(tags::NAME),
            Err(CodecError::UnexpectedSub { .. })
        ));
        // Mismatch must not consume the subrecord.
        assert!((r.next_float(tags::FLTV).expect("fltv") - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn typed_accessors_reject_wrong_payloads() {
        let rec = RawRecord {
            tag: tags::GLOB,
            subs: vec![(tags::FLTV, Value::Float(1.0))],
        };
        let mut r = MemReader::new(&rec);
        assert!(matches!(
            r.next_str(tags::FLTV),
            Err(CodecError::TypeMismatch { .. })
        ));
    }
}
