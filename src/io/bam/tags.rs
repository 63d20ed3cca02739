//! BAM optional tags (auxiliary data).
//!
//! Optional tags store additional information about alignments such as:
//! - Edit distance (NM:i)
//! - Alignment score (AS:i)
//! - Read group (RG:Z)
//! - Many others
//!
//! # Format
//!
//! Each tag is encoded as:
//! - 2 bytes: tag name (e.g., "NM")
//! - 1 byte: value type (`A c C s S i I f Z H B`)
//! - N bytes: value (format depends on type)
//!
//! # Codec guarantees
//!
//! Integers keep their original width alongside the value, so re-encoding
//! reproduces the exact type code and byte count. Lookups walk the region
//! with [`value_size`], which measures a value without decoding it.

use super::error::{BamDecodeError, DecodeResult};
use std::fmt;

/// Width and signedness of an integer tag (`c C s S i I`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerType {
    /// `c`
    Int8,
    /// `C`
    UInt8,
    /// `s`
    Int16,
    /// `S`
    UInt16,
    /// `i`
    Int32,
    /// `I`
    UInt32,
}

impl IntegerType {
    /// Map a type code to its integer type.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'c' => Self::Int8,
            b'C' => Self::UInt8,
            b's' => Self::Int16,
            b'S' => Self::UInt16,
            b'i' => Self::Int32,
            b'I' => Self::UInt32,
            _ => return None,
        })
    }

    /// Type code character.
    pub fn code(self) -> u8 {
        match self {
            Self::Int8 => b'c',
            Self::UInt8 => b'C',
            Self::Int16 => b's',
            Self::UInt16 => b'S',
            Self::Int32 => b'i',
            Self::UInt32 => b'I',
        }
    }

    /// Encoded width in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 => 4,
        }
    }

    fn read(self, b: &[u8]) -> i64 {
        match self {
            Self::Int8 => b[0] as i8 as i64,
            Self::UInt8 => b[0] as i64,
            Self::Int16 => i16::from_le_bytes([b[0], b[1]]) as i64,
            Self::UInt16 => u16::from_le_bytes([b[0], b[1]]) as i64,
            Self::Int32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64,
            Self::UInt32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64,
        }
    }

    // Truncates to the declared width; values come from `read` or the builder.
    fn write(self, value: i64, out: &mut Vec<u8>) {
        match self {
            Self::Int8 => out.push(value as i8 as u8),
            Self::UInt8 => out.push(value as u8),
            Self::Int16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
            Self::UInt16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
            Self::Int32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
            Self::UInt32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
        }
    }
}

/// Tag value types in BAM format.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Character (A): Single printable character
    Char(u8),
    /// Integer (`c C s S i I`) with its original width
    Integer(IntegerType, i64),
    /// Float (f): IEEE 754 single-precision float
    Float(f32),
    /// String (Z): Null-terminated string
    String(String),
    /// Hex string (H): Hex-encoded data
    Hex(String),
    /// Array (B): Typed array of numbers
    Array(ArrayValue),
}

impl TagValue {
    /// Type code this value encodes as.
    pub fn type_code(&self) -> u8 {
        match self {
            Self::Char(_) => b'A',
            Self::Integer(ty, _) => ty.code(),
            Self::Float(_) => b'f',
            Self::String(_) => b'Z',
            Self::Hex(_) => b'H',
            Self::Array(_) => b'B',
        }
    }

    /// Integer value, if this is an integer tag.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(_, v) => Some(*v),
            _ => None,
        }
    }

    /// Text value of a `Z` or `H` tag.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Hex(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{}", *c as char),
            Self::Integer(_, v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) | Self::Hex(s) => f.write_str(s),
            Self::Array(arr) => write!(f, "{}", arr),
        }
    }
}

/// Array value types for tag arrays (B type).
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    /// Array of signed 8-bit integers
    Int8(Vec<i8>),
    /// Array of unsigned 8-bit integers
    UInt8(Vec<u8>),
    /// Array of signed 16-bit integers
    Int16(Vec<i16>),
    /// Array of unsigned 16-bit integers
    UInt16(Vec<u16>),
    /// Array of signed 32-bit integers
    Int32(Vec<i32>),
    /// Array of unsigned 32-bit integers
    UInt32(Vec<u32>),
    /// Array of 32-bit floats
    Float(Vec<f32>),
}

impl ArrayValue {
    /// Subtype code character.
    pub fn subtype(&self) -> u8 {
        match self {
            Self::Int8(_) => b'c',
            Self::UInt8(_) => b'C',
            Self::Int16(_) => b's',
            Self::UInt16(_) => b'S',
            Self::Int32(_) => b'i',
            Self::UInt32(_) => b'I',
            Self::Float(_) => b'f',
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Int8(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    /// No elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements widened to `i64` for integer arrays; `None` for float arrays.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        Some(match self {
            Self::Int8(v) => v.iter().map(|&x| x as i64).collect(),
            Self::UInt8(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Int16(v) => v.iter().map(|&x| x as i64).collect(),
            Self::UInt16(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Int32(v) => v.iter().map(|&x| x as i64).collect(),
            Self::UInt32(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Float(_) => return None,
        })
    }
}

fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", v)?;
    }
    Ok(())
}

impl fmt::Display for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},", self.subtype() as char)?;
        match self {
            Self::Int8(v) => join(f, v),
            Self::UInt8(v) => join(f, v),
            Self::Int16(v) => join(f, v),
            Self::UInt16(v) => join(f, v),
            Self::Int32(v) => join(f, v),
            Self::UInt32(v) => join(f, v),
            Self::Float(v) => join(f, v),
        }
    }
}

/// Two-byte tag name used for lookups and exclusion.
///
/// Names shorter than two characters are padded with NUL and therefore never
/// match a tag stored in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagKey([u8; 2]);

impl TagKey {
    /// Key from raw name bytes.
    pub const fn new(name: [u8; 2]) -> Self {
        Self(name)
    }

    /// Parse a name of at most two ASCII characters.
    pub fn parse(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > 2 || !bytes.is_ascii() {
            return None;
        }
        let mut key = [0u8; 2];
        key[..bytes.len()].copy_from_slice(bytes);
        Some(Self(key))
    }

    /// Name bytes.
    pub fn as_bytes(&self) -> [u8; 2] {
        self.0
    }
}

impl From<[u8; 2]> for TagKey {
    fn from(name: [u8; 2]) -> Self {
        Self(name)
    }
}

impl From<&[u8; 2]> for TagKey {
    fn from(name: &[u8; 2]) -> Self {
        Self(*name)
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter().filter(|&&b| b != 0) {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

fn need(data: &[u8], n: usize) -> DecodeResult<()> {
    if data.len() < n {
        return Err(BamDecodeError::UnexpectedEof {
            context: "tag value",
            expected: n,
            actual: data.len(),
        });
    }
    Ok(())
}

fn nul_position(data: &[u8], offset: usize) -> DecodeResult<usize> {
    data.iter()
        .position(|&b| b == 0)
        .ok_or(BamDecodeError::MissingNulTerminator {
            field: "tag string",
            offset,
        })
}

fn array_element_width(tag: [u8; 2], subtype: u8) -> DecodeResult<usize> {
    match subtype {
        b'c' | b'C' => Ok(1),
        b's' | b'S' => Ok(2),
        b'i' | b'I' | b'f' => Ok(4),
        _ => Err(BamDecodeError::InvalidArraySubtype { tag, subtype }),
    }
}

fn array_count(data: &[u8]) -> DecodeResult<usize> {
    need(data, 5)?;
    let count = i32::from_le_bytes([data[1], data[2], data[3], data[4]]);
    if count < 0 {
        return Err(BamDecodeError::NegativeLength {
            field: "tag array count",
            value: count,
        });
    }
    Ok(count as usize)
}

/// Size in bytes of the value that follows `type_code`, without decoding it.
pub fn value_size(tag: [u8; 2], type_code: u8, data: &[u8]) -> DecodeResult<usize> {
    let size = match type_code {
        b'A' | b'c' | b'C' => 1,
        b's' | b'S' => 2,
        b'i' | b'I' | b'f' => 4,
        b'Z' | b'H' => nul_position(data, 0)? + 1,
        b'B' => {
            need(data, 1)?;
            let width = array_element_width(tag, data[0])?;
            5 + array_count(data)? * width
        }
        _ => return Err(BamDecodeError::InvalidTagType { tag, type_code }),
    };
    need(data, size)?;
    Ok(size)
}

fn decode_text(data: &[u8], field: &'static str) -> DecodeResult<(String, usize)> {
    let end = nul_position(data, 0)?;
    let text = std::str::from_utf8(&data[..end])
        .map_err(|source| BamDecodeError::InvalidUtf8 { field, source })?;
    Ok((text.to_owned(), end + 1))
}

fn decode_array(tag: [u8; 2], data: &[u8]) -> DecodeResult<(ArrayValue, usize)> {
    need(data, 1)?;
    let subtype = data[0];
    let width = array_element_width(tag, subtype)?;
    let count = array_count(data)?;
    let size = 5 + count * width;
    need(data, size)?;

    let body = data[5..size].chunks_exact(width);
    let array = match subtype {
        b'c' => ArrayValue::Int8(body.map(|b| b[0] as i8).collect()),
        b'C' => ArrayValue::UInt8(body.map(|b| b[0]).collect()),
        b's' => ArrayValue::Int16(body.map(|b| i16::from_le_bytes([b[0], b[1]])).collect()),
        b'S' => ArrayValue::UInt16(body.map(|b| u16::from_le_bytes([b[0], b[1]])).collect()),
        b'i' => ArrayValue::Int32(
            body.map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
        b'I' => ArrayValue::UInt32(
            body.map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
        b'f' => ArrayValue::Float(
            body.map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
        _ => return Err(BamDecodeError::InvalidArraySubtype { tag, subtype }),
    };
    Ok((array, size))
}

/// Decode one tag value.
///
/// Returns the value and the number of bytes it occupied in `data`.
///
/// # Errors
///
/// - [`BamDecodeError::InvalidTagType`] for a type code outside `AcCsSiIfZHB`
/// - [`BamDecodeError::InvalidArraySubtype`] for a bad `B` subtype
/// - [`BamDecodeError::UnexpectedEof`] when the value is truncated
pub fn decode_value(tag: [u8; 2], type_code: u8, data: &[u8]) -> DecodeResult<(TagValue, usize)> {
    if let Some(ty) = IntegerType::from_code(type_code) {
        need(data, ty.width())?;
        return Ok((TagValue::Integer(ty, ty.read(data)), ty.width()));
    }

    match type_code {
        b'A' => {
            need(data, 1)?;
            Ok((TagValue::Char(data[0]), 1))
        }
        b'f' => {
            need(data, 4)?;
            let v = f32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            Ok((TagValue::Float(v), 4))
        }
        b'Z' => {
            let (text, size) = decode_text(data, "tag string")?;
            Ok((TagValue::String(text), size))
        }
        b'H' => {
            let (text, size) = decode_text(data, "tag hex string")?;
            Ok((TagValue::Hex(text), size))
        }
        b'B' => {
            let (array, size) = decode_array(tag, data)?;
            Ok((TagValue::Array(array), size))
        }
        _ => Err(BamDecodeError::InvalidTagType { tag, type_code }),
    }
}

/// Append the encoded value (without name or type code) to `out`.
pub fn encode_value(value: &TagValue, out: &mut Vec<u8>) {
    match value {
        TagValue::Char(c) => out.push(*c),
        TagValue::Integer(ty, v) => ty.write(*v, out),
        TagValue::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
        TagValue::String(s) | TagValue::Hex(s) => {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        TagValue::Array(array) => {
            out.push(array.subtype());
            out.extend_from_slice(&(array.len() as i32).to_le_bytes());
            match array {
                ArrayValue::Int8(v) => out.extend(v.iter().map(|&x| x as u8)),
                ArrayValue::UInt8(v) => out.extend_from_slice(v),
                ArrayValue::Int16(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                ArrayValue::UInt16(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                ArrayValue::Int32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                ArrayValue::UInt32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                ArrayValue::Float(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            }
        }
    }
}

/// Append a complete tag (name, type code, value) to `out`.
pub fn encode_tag(name: [u8; 2], value: &TagValue, out: &mut Vec<u8>) {
    out.extend_from_slice(&name);
    out.push(value.type_code());
    encode_value(value, out);
}

/// One undecoded tag inside a record's tag region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTag<'a> {
    /// Two-character name
    pub name: [u8; 2],
    /// Type code
    pub type_code: u8,
    /// Value bytes
    pub value: &'a [u8],
    /// Name, type code and value as stored
    pub bytes: &'a [u8],
}

impl RawTag<'_> {
    /// Decode the value.
    pub fn decode(&self) -> DecodeResult<TagValue> {
        decode_value(self.name, self.type_code, self.value).map(|(value, _)| value)
    }
}

/// A single decoded BAM tag with name and value.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Two-character tag name (e.g., "NM", "AS", "RG")
    pub name: [u8; 2],
    /// Tag value
    pub value: TagValue,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match &self.value {
            TagValue::Integer(..) => b'i',
            other => other.type_code(),
        };
        write!(
            f,
            "{}:{}:{}",
            TagKey(self.name),
            code as char,
            self.value
        )
    }
}

/// Borrowed view over a record's tag region.
///
/// # Example
///
/// ```
/// use alnstream::io::bam::{Tags, TagValue};
///
/// // NM:C:5 then AS:i:100
/// let data = [b'N', b'M', b'C', 5, b'A', b'S', b'i', 100, 0, 0, 0];
/// let tags = Tags::new(&data);
/// assert_eq!(tags.get(b"AS").unwrap().and_then(|v| v.as_int()), Some(100));
/// assert!(tags.get(b"XX").unwrap().is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tags<'a> {
    data: &'a [u8],
}

impl<'a> Tags<'a> {
    /// Wrap raw tag bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Raw tag region.
    pub fn as_raw(&self) -> &'a [u8] {
        self.data
    }

    /// Check if tags are empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total size of the tag region in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Walk tags without decoding their values.
    pub fn raw_iter(&self) -> RawTagIter<'a> {
        RawTagIter {
            data: self.data,
            cursor: 0,
        }
    }

    /// Decode every tag in order.
    pub fn iter(&self) -> impl Iterator<Item = DecodeResult<Tag>> + 'a {
        self.raw_iter().map(|raw| {
            let raw = raw?;
            Ok(Tag {
                name: raw.name,
                value: raw.decode()?,
            })
        })
    }

    /// Find a tag without decoding it.
    pub fn get_raw(&self, name: &[u8; 2]) -> DecodeResult<Option<RawTag<'a>>> {
        for raw in self.raw_iter() {
            let raw = raw?;
            if &raw.name == name {
                return Ok(Some(raw));
            }
        }
        Ok(None)
    }

    /// Decode a specific tag by name.
    ///
    /// Returns `Ok(None)` when the tag is absent. Tags before it are skipped
    /// by size only.
    pub fn get(&self, name: &[u8; 2]) -> DecodeResult<Option<TagValue>> {
        self.get_raw(name)?.map(|raw| raw.decode()).transpose()
    }
}

/// Iterator over [`RawTag`]s. Stops after the first error.
pub struct RawTagIter<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> RawTagIter<'a> {
    fn next_tag(&mut self) -> DecodeResult<RawTag<'a>> {
        let start = self.cursor;
        let rest = &self.data[start..];
        if rest.len() < 3 {
            return Err(BamDecodeError::UnexpectedEof {
                context: "tag header",
                expected: 3,
                actual: rest.len(),
            });
        }
        let name = [rest[0], rest[1]];
        let type_code = rest[2];
        let size = value_size(name, type_code, &rest[3..])?;
        self.cursor = start + 3 + size;
        Ok(RawTag {
            name,
            type_code,
            value: &rest[3..3 + size],
            bytes: &rest[..3 + size],
        })
    }
}

impl<'a> Iterator for RawTagIter<'a> {
    type Item = DecodeResult<RawTag<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.data.len() {
            return None;
        }
        let result = self.next_tag();
        if result.is_err() {
            self.cursor = self.data.len();
        }
        Some(result)
    }
}

/// Copy the tag region into `out`, leaving out every tag named in `excluded`.
///
/// Kept tags are copied byte-for-byte in their original order. Absent names
/// and repeated names in `excluded` have no effect.
pub fn encode_tags_excluding(
    data: &[u8],
    excluded: &[TagKey],
    out: &mut Vec<u8>,
) -> DecodeResult<()> {
    if excluded.is_empty() {
        // Region is validated even when nothing is removed.
        for raw in Tags::new(data).raw_iter() {
            raw?;
        }
        out.extend_from_slice(data);
        return Ok(());
    }

    for raw in Tags::new(data).raw_iter() {
        let raw = raw?;
        if !excluded.contains(&TagKey(raw.name)) {
            out.extend_from_slice(raw.bytes);
        }
    }
    Ok(())
}
