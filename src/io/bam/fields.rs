//! On-demand field projection.
//!
//! Callers name the fields they want once; every record then fills a
//! caller-owned [`FieldValues`] with exactly those fields. Fields nobody asked
//! for are never decoded, text buffers are recycled between records, and all
//! requested tags are found in one walk over the tag region.
//!
//! | name | value |
//! |------|-------|
//! | `QNAME` | query name |
//! | `FLAG` | bitwise flag |
//! | `RNAME` | reference name, `*` without a reference |
//! | `POS` | 1-based position, 0 when unset |
//! | `MAPQ` | mapping quality |
//! | `CIGAR` | CIGAR text, `*` without operations |
//! | `MRNM` | mate reference name, `*` without one |
//! | `MPOS` | 1-based mate position, 0 when unset |
//! | `ISIZE` | template length |
//! | `SEQ` | bases, `*` when empty |
//! | `QUAL` | Phred+33 qualities, `*` when empty or unavailable |
//! | `SEQ_LENGTH` | raw sequence length from the CIGAR |
//! | `MAPPED_SEQ_LENGTH` | mapped sequence length from the CIGAR |
//! | one or two characters | optional tag, `*` when absent |

use super::error::{BamDecodeError, DecodeResult};
use super::header::Header;
use super::record::RecordView;
use super::tags::{decode_value, ArrayValue, RawTag, TagKey, TagValue};
use std::fmt;

/// A field that projection can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `QNAME`
    QueryName,
    /// `FLAG`
    Flag,
    /// `RNAME`
    ReferenceName,
    /// `POS`
    Position,
    /// `MAPQ`
    MappingQuality,
    /// `CIGAR`
    Cigar,
    /// `MRNM`
    MateReferenceName,
    /// `MPOS`
    MatePosition,
    /// `ISIZE`
    InsertSize,
    /// `SEQ`
    Sequence,
    /// `QUAL`
    Quality,
    /// `SEQ_LENGTH`
    SeqLength,
    /// `MAPPED_SEQ_LENGTH`
    MappedSeqLength,
    /// Optional tag by name
    Tag(TagKey),
}

impl Field {
    /// Parse a field name. Names of at most two characters are tags; other
    /// unknown names give `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "QNAME" => Self::QueryName,
            "FLAG" => Self::Flag,
            "RNAME" => Self::ReferenceName,
            "POS" => Self::Position,
            "MAPQ" => Self::MappingQuality,
            "CIGAR" => Self::Cigar,
            "MRNM" => Self::MateReferenceName,
            "MPOS" => Self::MatePosition,
            "ISIZE" => Self::InsertSize,
            "SEQ" => Self::Sequence,
            "QUAL" => Self::Quality,
            "SEQ_LENGTH" => Self::SeqLength,
            "MAPPED_SEQ_LENGTH" => Self::MappedSeqLength,
            other => return TagKey::parse(other).map(Self::Tag),
        })
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::QueryName => "QNAME",
            Self::Flag => "FLAG",
            Self::ReferenceName => "RNAME",
            Self::Position => "POS",
            Self::MappingQuality => "MAPQ",
            Self::Cigar => "CIGAR",
            Self::MateReferenceName => "MRNM",
            Self::MatePosition => "MPOS",
            Self::InsertSize => "ISIZE",
            Self::Sequence => "SEQ",
            Self::Quality => "QUAL",
            Self::SeqLength => "SEQ_LENGTH",
            Self::MappedSeqLength => "MAPPED_SEQ_LENGTH",
            Self::Tag(key) => return write!(f, "{}", key),
        };
        f.write_str(name)
    }
}

/// A projected value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Integer field or integer tag
    Integer(i64),
    /// `f` tag
    Float(f32),
    /// `A` tag
    Char(u8),
    /// Text field, `Z` or `H` tag
    Text(String),
    /// `B` tag
    Array(ArrayValue),
    /// Not present; renders as `*`
    Absent,
}

impl FieldValue {
    /// Integer value, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The `*` sentinel.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Char(c) => write!(f, "{}", *c as char),
            Self::Text(s) => f.write_str(s),
            Self::Array(a) => write!(f, "{}", a),
            Self::Absent => f.write_str("*"),
        }
    }
}

/// Caller-owned projection result, valid until the next projection into it.
///
/// Entries keep the order in which fields were requested.
#[derive(Debug, Default)]
pub struct FieldValues {
    entries: Vec<(Field, FieldValue)>,
    spare: Vec<String>,
}

impl FieldValues {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry, keeping text allocations for reuse.
    pub fn clear(&mut self) {
        for (_, value) in self.entries.drain(..) {
            if let FieldValue::Text(mut s) = value {
                s.clear();
                self.spare.push(s);
            }
        }
    }

    fn take_string(&mut self) -> String {
        self.spare.pop().unwrap_or_default()
    }

    /// Value for `field`, if it was requested.
    pub fn get(&self, field: &Field) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v)
    }

    /// Value for a field given by name.
    pub fn get_by_name(&self, name: &str) -> Option<&FieldValue> {
        self.get(&Field::parse(name)?)
    }

    /// `(field, value)` pairs in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&Field, &FieldValue)> {
        self.entries.iter().map(|(f, v)| (f, v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn reference_name(
    header: &Header,
    id: Option<usize>,
    field: &'static str,
    out: &mut String,
) -> DecodeResult<bool> {
    let Some(id) = id else {
        return Ok(false);
    };
    let name = header
        .reference_name(id)
        .ok_or(BamDecodeError::InvalidReferenceId {
            value: id as i32,
            field,
        })?;
    out.push_str(name);
    Ok(true)
}

/// Text-or-absent helper: fills a recycled string, keeps it only when `fill`
/// reports a value.
fn text_value<F>(values: &mut FieldValues, fill: F) -> DecodeResult<FieldValue>
where
    F: FnOnce(&mut String) -> DecodeResult<bool>,
{
    let mut s = values.take_string();
    if fill(&mut s)? && !s.is_empty() {
        Ok(FieldValue::Text(s))
    } else {
        s.clear();
        values.spare.push(s);
        Ok(FieldValue::Absent)
    }
}

fn tag_value(raw: &RawTag<'_>, values: &mut FieldValues) -> DecodeResult<FieldValue> {
    if matches!(raw.type_code, b'Z' | b'H') {
        // value ends with its NUL, guaranteed by the tag walker
        let bytes = &raw.value[..raw.value.len() - 1];
        let text = std::str::from_utf8(bytes).map_err(|source| BamDecodeError::InvalidUtf8 {
            field: "tag string",
            source,
        })?;
        let mut s = values.take_string();
        s.push_str(text);
        return Ok(FieldValue::Text(s));
    }

    let (value, _) = decode_value(raw.name, raw.type_code, raw.value)?;
    Ok(match value {
        TagValue::Char(c) => FieldValue::Char(c),
        TagValue::Integer(_, v) => FieldValue::Integer(v),
        TagValue::Float(v) => FieldValue::Float(v),
        TagValue::String(s) | TagValue::Hex(s) => FieldValue::Text(s),
        TagValue::Array(a) => FieldValue::Array(a),
    })
}

/// Fill `out` with exactly `fields` for `view`, clearing it first.
///
/// # Errors
///
/// Fails on a reference index outside the header dictionary, invalid UTF-8
/// in a requested text field, or a corrupt tag region when a tag is
/// requested. `out` is left cleared on error.
///
/// # Example
///
/// ```
/// use alnstream::io::bam::{project, Field, FieldValues, Header, RecordBuilder, RecordView};
///
/// let raw = RecordBuilder::new("r1").cigar_text("2S4M2S")?.sequence(b"ACGTACGT").build()?;
/// let view = RecordView::new(&raw)?;
/// let fields = [Field::SeqLength, Field::MappedSeqLength, Field::parse("XX").unwrap()];
///
/// let mut values = FieldValues::new();
/// project(&view, &Header::default(), &fields, &mut values)?;
/// assert_eq!(values.get(&Field::SeqLength).and_then(|v| v.as_int()), Some(8));
/// assert_eq!(values.get_by_name("MAPPED_SEQ_LENGTH").and_then(|v| v.as_int()), Some(4));
/// assert_eq!(values.get_by_name("XX").unwrap().to_string(), "*");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn project(
    view: &RecordView<'_>,
    header: &Header,
    fields: &[Field],
    out: &mut FieldValues,
) -> DecodeResult<()> {
    out.clear();
    let result = fill(view, header, fields, out);
    if result.is_err() {
        out.clear();
    }
    result
}

fn fill(
    view: &RecordView<'_>,
    header: &Header,
    fields: &[Field],
    out: &mut FieldValues,
) -> DecodeResult<()> {
    let mut pending_tags = 0usize;

    for &field in fields {
        let value = match field {
            Field::QueryName => text_value(out, |s| {
                s.push_str(view.name()?);
                Ok(true)
            })?,
            Field::Flag => FieldValue::Integer(view.flags().bits() as i64),
            Field::ReferenceName => text_value(out, |s| {
                reference_name(header, view.reference_id(), "read", s)
            })?,
            Field::Position => FieldValue::Integer(view.position().unwrap_or(0) as i64),
            Field::MappingQuality => FieldValue::Integer(view.mapq() as i64),
            Field::Cigar => text_value(out, |s| {
                view.cigar()?.write_text(s)?;
                Ok(true)
            })?,
            Field::MateReferenceName => text_value(out, |s| {
                reference_name(header, view.mate_reference_id(), "mate", s)
            })?,
            Field::MatePosition => FieldValue::Integer(view.mate_position().unwrap_or(0) as i64),
            Field::InsertSize => FieldValue::Integer(view.template_length() as i64),
            Field::Sequence => text_value(out, |s| {
                view.sequence_into(s)?;
                Ok(true)
            })?,
            Field::Quality => text_value(out, |s| {
                if !view.has_quality() {
                    return Ok(false);
                }
                view.quality_into(s);
                Ok(true)
            })?,
            Field::SeqLength => FieldValue::Integer(view.raw_sequence_length()? as i64),
            Field::MappedSeqLength => FieldValue::Integer(view.mapped_sequence_length()? as i64),
            Field::Tag(_) => {
                pending_tags += 1;
                FieldValue::Absent
            }
        };
        out.entries.push((field, value));
    }

    if pending_tags == 0 {
        return Ok(());
    }

    for raw in view.tags().raw_iter() {
        let raw = raw?;
        for i in 0..out.entries.len() {
            let (field, value) = &out.entries[i];
            let wanted = matches!(field, Field::Tag(key) if key.as_bytes() == raw.name);
            if !wanted || !value.is_absent() {
                continue;
            }
            let decoded = tag_value(&raw, out)?;
            out.entries[i].1 = decoded;
            pending_tags -= 1;
        }
        if pending_tags == 0 {
            break;
        }
    }

    Ok(())
}
