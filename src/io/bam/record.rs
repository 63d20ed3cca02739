//! Zero-copy view over one raw BAM record.
//!
//! A BAM record represents a single alignment (read mapped to reference).
//! Each record contains alignment information, sequence data, quality scores,
//! and optional tags.
//!
//! # Binary Format
//!
//! ```text
//! BAM Record (binary, little-endian):
//! - block_size (int32): Total record size in bytes (excluding this field)
//! - refID (int32): Reference sequence ID (-1 for unmapped)
//! - pos (int32): 0-based leftmost position (-1 for unmapped)
//! - l_read_name (uint8): Length of read name (includes null terminator)
//! - mapq (uint8): Mapping quality (255 = unavailable)
//! - bin (uint16): BAI index bin (for indexing)
//! - n_cigar_op (uint16): Number of CIGAR operations
//! - flag (uint16): Bitwise FLAGS
//! - l_seq (int32): Sequence length
//! - next_refID (int32): Reference ID of mate/next read
//! - next_pos (int32): Position of mate/next read
//! - tlen (int32): Template length
//! - read_name (char[l_read_name]): Null-terminated read name
//! - cigar (uint32[n_cigar_op]): CIGAR operations
//! - seq (uint8[(l_seq+1)/2]): 4-bit encoded sequence
//! - qual (char[l_seq]): Phred quality scores
//! - tags: Optional tags (variable length)
//! ```
//!
//! Offsets below include the leading `block_size` field.
//!
//! [`RecordView::new`] checks every length against the buffer once. After
//! that, fixed fields are plain little-endian reads and variable regions are
//! subslices; nothing is decoded until asked for.

use super::cigar::{Cigar, CigarOp};
use super::error::{BamDecodeError, DecodeResult};
use super::flags::Flags;
use super::sequence::{decode_quality_into, decode_sequence_into, MISSING_QUALITY};
use super::tags::Tags;

/// Bytes before the read name, `block_size` included.
pub const FIXED_LENGTH: usize = 36;

const REF_ID: usize = 4;
const POS: usize = 8;
const L_READ_NAME: usize = 12;
const MAPQ: usize = 13;
const BIN: usize = 14;
const N_CIGAR_OP: usize = 16;
const FLAG: usize = 18;
const L_SEQ: usize = 20;
const NEXT_REF_ID: usize = 24;
const NEXT_POS: usize = 28;
const TLEN: usize = 32;

fn i32_at(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Validate reference ID: -1 (none) or >= 0.
fn parse_reference_id(ref_id: i32, field: &'static str) -> DecodeResult<Option<usize>> {
    const UNMAPPED: i32 = -1;

    match ref_id {
        UNMAPPED => Ok(None),
        n if n >= 0 => Ok(Some(n as usize)),
        invalid => Err(BamDecodeError::InvalidReferenceId {
            value: invalid,
            field,
        }),
    }
}

/// Validated, borrowed view over a raw record (block size prefix included).
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    data: &'a [u8],
    l_seq: usize,
    cigar_start: usize,
    seq_start: usize,
    qual_start: usize,
    tags_start: usize,
}

impl<'a> RecordView<'a> {
    /// Validate `data` and build a view over it.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Data is too short for fixed fields
    /// - `block_size` disagrees with the buffer length
    /// - `l_read_name` is zero or the name lacks its NUL terminator
    /// - `l_seq` is negative
    /// - A reference ID is below -1
    /// - CIGAR, sequence or quality run past the end of the record
    pub fn new(data: &'a [u8]) -> DecodeResult<Self> {
        if data.len() < FIXED_LENGTH {
            return Err(BamDecodeError::UnexpectedEof {
                context: "record fixed fields",
                expected: FIXED_LENGTH,
                actual: data.len(),
            });
        }

        let block_size = i32_at(data, 0);
        if block_size < 0 {
            return Err(BamDecodeError::NegativeLength {
                field: "block size",
                value: block_size,
            });
        }
        if block_size as usize != data.len() - 4 {
            return Err(BamDecodeError::BlockSizeMismatch {
                declared: block_size as usize,
                actual: data.len() - 4,
            });
        }

        parse_reference_id(i32_at(data, REF_ID), "read")?;
        parse_reference_id(i32_at(data, NEXT_REF_ID), "mate")?;

        // l_read_name >= 1 (minimum "*\0" style names still carry the NUL)
        let l_read_name = data[L_READ_NAME];
        if l_read_name == 0 {
            return Err(BamDecodeError::InvalidReadNameLength {
                length: l_read_name,
                offset: L_READ_NAME,
            });
        }

        let l_seq = i32_at(data, L_SEQ);
        if l_seq < 0 {
            return Err(BamDecodeError::NegativeLength {
                field: "sequence length",
                value: l_seq,
            });
        }
        let l_seq = l_seq as usize;
        let n_cigar_op = u16_at(data, N_CIGAR_OP) as usize;

        let cigar_start = FIXED_LENGTH + l_read_name as usize;
        let seq_start = cigar_start + n_cigar_op * 4;
        let qual_start = seq_start + l_seq.div_ceil(2);
        let tags_start = qual_start + l_seq;

        if tags_start > data.len() {
            return Err(BamDecodeError::UnexpectedEof {
                context: "record variable fields",
                expected: tags_start,
                actual: data.len(),
            });
        }
        if data[cigar_start - 1] != 0 {
            return Err(BamDecodeError::MissingNulTerminator {
                field: "read name",
                offset: cigar_start - 1,
            });
        }

        Ok(Self {
            data,
            l_seq,
            cigar_start,
            seq_start,
            qual_start,
            tags_start,
        })
    }

    /// Whole record as read, `block_size` included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Everything up to the tag region, `block_size` included.
    pub fn core_bytes(&self) -> &'a [u8] {
        &self.data[..self.tags_start]
    }

    /// Read name bytes without the NUL terminator.
    pub fn name_bytes(&self) -> &'a [u8] {
        &self.data[FIXED_LENGTH..self.cigar_start - 1]
    }

    /// Read name.
    pub fn name(&self) -> DecodeResult<&'a str> {
        std::str::from_utf8(self.name_bytes()).map_err(|source| BamDecodeError::InvalidUtf8 {
            field: "read name",
            source,
        })
    }

    /// Reference index, `None` for -1.
    pub fn reference_id(&self) -> Option<usize> {
        let id = i32_at(self.data, REF_ID);
        (id >= 0).then_some(id as usize)
    }

    /// 1-based leftmost position, `None` when unset.
    pub fn position(&self) -> Option<u32> {
        let pos = i32_at(self.data, POS);
        (pos >= 0).then(|| pos as u32 + 1)
    }

    /// Mapping quality (255 = unavailable).
    pub fn mapq(&self) -> u8 {
        self.data[MAPQ]
    }

    /// BAI bin.
    pub fn bin(&self) -> u16 {
        u16_at(self.data, BIN)
    }

    /// Bitwise FLAG.
    pub fn flags(&self) -> Flags {
        Flags::new(u16_at(self.data, FLAG))
    }

    /// Declared query length (`l_seq`).
    pub fn query_length(&self) -> usize {
        self.l_seq
    }

    /// Mate reference index, `None` for -1.
    pub fn mate_reference_id(&self) -> Option<usize> {
        let id = i32_at(self.data, NEXT_REF_ID);
        (id >= 0).then_some(id as usize)
    }

    /// 1-based mate position, `None` when unset.
    pub fn mate_position(&self) -> Option<u32> {
        let pos = i32_at(self.data, NEXT_POS);
        (pos >= 0).then(|| pos as u32 + 1)
    }

    /// Observed template length.
    pub fn template_length(&self) -> i32 {
        i32_at(self.data, TLEN)
    }

    /// CIGAR exactly as stored in the fixed record area.
    pub fn stored_cigar(&self) -> Cigar<'a> {
        Cigar::new(&self.data[self.cigar_start..self.seq_start])
    }

    /// Effective CIGAR.
    ///
    /// BAM's 16-bit `n_cigar_op` cannot hold more than 65,535 operations.
    /// Long reads then store a `<l_seq>S<n>N` placeholder and keep the real
    /// operations in a `CG:B,I` (or `B,i`) tag, which is returned here
    /// instead. A placeholder without a usable `CG` tag is returned as is.
    pub fn cigar(&self) -> DecodeResult<Cigar<'a>> {
        let stored = self.stored_cigar();
        if stored.len() != 2 {
            return Ok(stored);
        }

        let mut ops = stored.iter();
        let first = ops.next().transpose()?;
        let second = ops.next().transpose()?;
        let is_placeholder = matches!(first, Some(CigarOp::SoftClip(len)) if len as usize == self.l_seq)
            && matches!(second, Some(CigarOp::RefSkip(_)));
        if !is_placeholder {
            return Ok(stored);
        }

        match self.tags().get_raw(b"CG")? {
            Some(tag) if tag.type_code == b'B' && matches!(tag.value.first(), Some(b'I' | b'i')) => {
                Ok(Cigar::new(&tag.value[5..]))
            }
            _ => Ok(stored),
        }
    }

    /// Packed 4-bit sequence bytes.
    pub fn sequence_bytes(&self) -> &'a [u8] {
        &self.data[self.seq_start..self.qual_start]
    }

    /// Decode the sequence into `out`, replacing its contents.
    pub fn sequence_into(&self, out: &mut String) -> DecodeResult<()> {
        decode_sequence_into(self.sequence_bytes(), self.l_seq, out)
    }

    /// Raw Phred qualities (no +33 offset).
    pub fn quality(&self) -> &'a [u8] {
        &self.data[self.qual_start..self.tags_start]
    }

    /// Qualities are stored (first byte is not `0xFF`).
    pub fn has_quality(&self) -> bool {
        self.quality().first().is_some_and(|&q| q != MISSING_QUALITY)
    }

    /// Render qualities as Phred+33 text (`*` when unavailable) into `out`.
    pub fn quality_into(&self, out: &mut String) {
        decode_quality_into(self.quality(), out)
    }

    /// Optional tag region.
    pub fn tags(&self) -> Tags<'a> {
        Tags::new(&self.data[self.tags_start..])
    }

    /// Raw sequence length from the effective CIGAR, or `l_seq` without one.
    pub fn raw_sequence_length(&self) -> DecodeResult<usize> {
        self.cigar()?.raw_sequence_length(self.l_seq)
    }

    /// Mapped sequence length from the effective CIGAR, or `l_seq` without one.
    pub fn mapped_sequence_length(&self) -> DecodeResult<usize> {
        self.cigar()?.mapped_sequence_length(self.l_seq)
    }
}
