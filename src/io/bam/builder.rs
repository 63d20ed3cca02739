//! Construct raw records from owned values.
//!
//! The output is a complete record buffer (block size prefix included) in the
//! same layout [`RecordView`](super::RecordView) reads.

use super::cigar::{encode_cigar, parse_cigar_text, reference_span, CigarOp};
use super::sequence::{encode_quality, encode_sequence};
use super::tags::{encode_tag, ArrayValue, TagValue};
use std::io;

/// Largest CIGAR that fits the 16-bit `n_cigar_op` field.
pub const MAX_INLINE_CIGAR_OPS: usize = u16::MAX as usize;

/// Builder for raw alignment records.
///
/// Positions are 1-based; 0 means "unset" and is stored as -1.
///
/// # Example
///
/// ```
/// use alnstream::io::bam::{RecordBuilder, RecordView};
///
/// let raw = RecordBuilder::new("read1")
///     .reference_id(0)
///     .position(101)
///     .cigar_text("4M")?
///     .sequence(b"ACGT")
///     .quality(b"IIII")
///     .build()?;
/// let view = RecordView::new(&raw)?;
/// assert_eq!(view.position(), Some(101));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    name: String,
    reference_id: i32,
    position: i32,
    mapq: u8,
    flags: u16,
    cigar: Vec<CigarOp>,
    sequence: Vec<u8>,
    quality: Vec<u8>,
    mate_reference_id: i32,
    mate_position: i32,
    template_length: i32,
    tags: Vec<u8>,
}

impl RecordBuilder {
    /// Start a record with the given query name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference_id: -1,
            position: 0,
            mapq: 255,
            flags: 0,
            cigar: Vec::new(),
            sequence: Vec::new(),
            quality: Vec::new(),
            mate_reference_id: -1,
            mate_position: 0,
            template_length: 0,
            tags: Vec::new(),
        }
    }

    /// Reference index, or -1 for none.
    pub fn reference_id(mut self, id: i32) -> Self {
        self.reference_id = id;
        self
    }

    /// 1-based leftmost position.
    pub fn position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Mapping quality (255 = unavailable).
    pub fn mapq(mut self, mapq: u8) -> Self {
        self.mapq = mapq;
        self
    }

    /// Bitwise FLAG.
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// CIGAR operations.
    pub fn cigar(mut self, ops: &[CigarOp]) -> Self {
        self.cigar = ops.to_vec();
        self
    }

    /// CIGAR in SAM text form (`2S4M2S`).
    pub fn cigar_text(mut self, text: &str) -> io::Result<Self> {
        self.cigar = parse_cigar_text(text)?;
        Ok(self)
    }

    /// Bases as ASCII.
    pub fn sequence(mut self, bases: &[u8]) -> Self {
        self.sequence = bases.to_vec();
        self
    }

    /// Qualities as Phred+33 text. `*` stores "unavailable".
    pub fn quality(mut self, text: &[u8]) -> Self {
        self.quality = text.to_vec();
        self
    }

    /// Mate reference index (-1 for none) and 1-based mate position.
    pub fn mate(mut self, reference_id: i32, position: i32) -> Self {
        self.mate_reference_id = reference_id;
        self.mate_position = position;
        self
    }

    /// Observed template length.
    pub fn template_length(mut self, tlen: i32) -> Self {
        self.template_length = tlen;
        self
    }

    /// Append a typed optional tag.
    pub fn tag(mut self, name: [u8; 2], value: TagValue) -> Self {
        encode_tag(name, &value, &mut self.tags);
        self
    }

    /// Append pre-encoded tag bytes verbatim.
    pub fn raw_tags(mut self, bytes: &[u8]) -> Self {
        self.tags.extend_from_slice(bytes);
        self
    }

    /// Serialize to a complete record buffer.
    ///
    /// CIGARs longer than [`MAX_INLINE_CIGAR_OPS`] are stored as a
    /// `<l_seq>S<span>N` placeholder with the real operations in `CG:B,I`.
    pub fn build(&self) -> io::Result<Vec<u8>> {
        let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidInput, msg);

        let name = if self.name.is_empty() { "*" } else { self.name.as_str() };
        if name.len() > 254 || name.as_bytes().contains(&0) {
            return Err(invalid(format!("Unusable read name {:?}", name)));
        }
        let has_quality = !self.quality.is_empty() && self.quality != b"*";
        if has_quality && self.quality.len() != self.sequence.len() {
            return Err(invalid(format!(
                "Quality length {} does not match sequence length {}",
                self.quality.len(),
                self.sequence.len()
            )));
        }
        let l_seq = i32::try_from(self.sequence.len())
            .map_err(|_| invalid("Sequence too long".to_string()))?;

        let span = reference_span(&self.cigar);
        let (inline_cigar, overflow) = if self.cigar.len() > MAX_INLINE_CIGAR_OPS {
            let placeholder = vec![
                CigarOp::SoftClip(l_seq as u32),
                CigarOp::RefSkip(span.min((1 << 28) - 1) as u32),
            ];
            (placeholder, Some(&self.cigar))
        } else {
            (self.cigar.clone(), None)
        };

        let pos0 = self.position - 1;
        let bin = calculate_bin(pos0.max(0), span.max(1).min(i32::MAX as u64) as i32);

        let mut out = Vec::with_capacity(64 + name.len() + self.sequence.len() * 2 + self.tags.len());
        out.extend_from_slice(&0i32.to_le_bytes()); // block size, patched below
        out.extend_from_slice(&self.reference_id.to_le_bytes());
        out.extend_from_slice(&pos0.to_le_bytes());
        out.push((name.len() + 1) as u8);
        out.push(self.mapq);
        out.extend_from_slice(&bin.to_le_bytes());
        out.extend_from_slice(&(inline_cigar.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&l_seq.to_le_bytes());
        out.extend_from_slice(&self.mate_reference_id.to_le_bytes());
        out.extend_from_slice(&(self.mate_position - 1).to_le_bytes());
        out.extend_from_slice(&self.template_length.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        encode_cigar(&inline_cigar, &mut out);
        encode_sequence(&self.sequence, &mut out);
        encode_quality(&self.quality, self.sequence.len(), &mut out);
        if let Some(ops) = overflow {
            let packed = ops.iter().map(CigarOp::to_packed).collect();
            encode_tag(*b"CG", &TagValue::Array(ArrayValue::UInt32(packed)), &mut out);
        }
        out.extend_from_slice(&self.tags);

        let block_size = i32::try_from(out.len() - 4)
            .map_err(|_| invalid("Record too large".to_string()))?;
        out[..4].copy_from_slice(&block_size.to_le_bytes());
        Ok(out)
    }
}

/// BAI bin for a 0-based start and reference span.
pub fn calculate_bin(start: i32, length: i32) -> u16 {
    let end = start.saturating_add(length);

    if end > start {
        let beg = start as u32;
        let end = (end - 1) as u32;

        if (beg >> 14) == (end >> 14) {
            return ((beg >> 14) + 4681) as u16;
        }
        if (beg >> 17) == (end >> 17) {
            return ((beg >> 17) + 585) as u16;
        }
        if (beg >> 20) == (end >> 20) {
            return ((beg >> 20) + 73) as u16;
        }
        if (beg >> 23) == (end >> 23) {
            return ((beg >> 23) + 9) as u16;
        }
        if (beg >> 26) == (end >> 26) {
            return ((beg >> 26) + 1) as u16;
        }
    }

    0
}
