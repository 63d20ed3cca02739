//! CIGAR (Compact Idiosyncratic Gapped Alignment Report) codec.
//!
//! CIGAR strings describe how a read aligns to the reference, including
//! matches, insertions, deletions, and other operations.
//!
//! # BAM Format
//!
//! In BAM, CIGAR is stored as 32-bit little-endian integers:
//! - Low 4 bits: operation type (0-8)
//! - High 28 bits: operation length (0 to 268,435,455)
//!
//! # Operations
//!
//! - M: Match/mismatch (alignment match, can include mismatches)
//! - I: Insertion to reference
//! - D: Deletion from reference
//! - N: Skipped region from reference (intron for RNA-seq)
//! - S: Soft clipping (bases present in read, not in alignment)
//! - H: Hard clipping (bases not present in read)
//! - P: Padding (silent deletion from padded reference)
//! - =: Sequence match (bases match reference)
//! - X: Sequence mismatch (bases don't match reference)
//!
//! # Derived lengths
//!
//! Two metrics are summed straight from the packed operations without
//! materialising a `Vec`:
//!
//! - raw sequence length: M, I, S, H (plus `=` and `X`)
//! - mapped sequence length: M (plus `=` and `X`)
//!
//! An empty operation list falls back to the declared query length.

use super::error::{BamDecodeError, DecodeResult};
use std::fmt::{self, Write as _};
use std::io;

/// CIGAR operation types.
///
/// Each operation describes a type of alignment event and its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    /// Match or mismatch (M)
    Match(u32),
    /// Insertion to reference (I)
    Insertion(u32),
    /// Deletion from reference (D)
    Deletion(u32),
    /// Skipped region from reference (N)
    RefSkip(u32),
    /// Soft clipping (S)
    SoftClip(u32),
    /// Hard clipping (H)
    HardClip(u32),
    /// Padding (P)
    Padding(u32),
    /// Sequence match (=)
    SeqMatch(u32),
    /// Sequence mismatch (X)
    SeqMismatch(u32),
}

impl CigarOp {
    /// Decode one packed operation (`length << 4 | code`).
    pub fn from_packed(packed: u32) -> DecodeResult<Self> {
        let length = packed >> 4;
        Ok(match packed & 0x0F {
            0 => CigarOp::Match(length),
            1 => CigarOp::Insertion(length),
            2 => CigarOp::Deletion(length),
            3 => CigarOp::RefSkip(length),
            4 => CigarOp::SoftClip(length),
            5 => CigarOp::HardClip(length),
            6 => CigarOp::Padding(length),
            7 => CigarOp::SeqMatch(length),
            8 => CigarOp::SeqMismatch(length),
            code => return Err(BamDecodeError::InvalidCigarOp { value: code }),
        })
    }

    /// Pack into the 32-bit BAM representation.
    pub fn to_packed(&self) -> u32 {
        (self.length() << 4) | self.code()
    }

    /// Numeric operation code (0-8).
    pub fn code(&self) -> u32 {
        match self {
            CigarOp::Match(_) => 0,
            CigarOp::Insertion(_) => 1,
            CigarOp::Deletion(_) => 2,
            CigarOp::RefSkip(_) => 3,
            CigarOp::SoftClip(_) => 4,
            CigarOp::HardClip(_) => 5,
            CigarOp::Padding(_) => 6,
            CigarOp::SeqMatch(_) => 7,
            CigarOp::SeqMismatch(_) => 8,
        }
    }

    /// Get the operation count/length.
    pub fn length(&self) -> u32 {
        match *self {
            CigarOp::Match(len)
            | CigarOp::Insertion(len)
            | CigarOp::Deletion(len)
            | CigarOp::RefSkip(len)
            | CigarOp::SoftClip(len)
            | CigarOp::HardClip(len)
            | CigarOp::Padding(len)
            | CigarOp::SeqMatch(len)
            | CigarOp::SeqMismatch(len) => len,
        }
    }

    /// Check if this operation has zero length.
    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// Get the operation type as a character (for SAM format).
    pub fn as_char(&self) -> char {
        match self {
            CigarOp::Match(_) => 'M',
            CigarOp::Insertion(_) => 'I',
            CigarOp::Deletion(_) => 'D',
            CigarOp::RefSkip(_) => 'N',
            CigarOp::SoftClip(_) => 'S',
            CigarOp::HardClip(_) => 'H',
            CigarOp::Padding(_) => 'P',
            CigarOp::SeqMatch(_) => '=',
            CigarOp::SeqMismatch(_) => 'X',
        }
    }

    /// Build an operation from its SAM character and length.
    pub fn from_char(op: char, length: u32) -> Option<Self> {
        Some(match op {
            'M' => CigarOp::Match(length),
            'I' => CigarOp::Insertion(length),
            'D' => CigarOp::Deletion(length),
            'N' => CigarOp::RefSkip(length),
            'S' => CigarOp::SoftClip(length),
            'H' => CigarOp::HardClip(length),
            'P' => CigarOp::Padding(length),
            '=' => CigarOp::SeqMatch(length),
            'X' => CigarOp::SeqMismatch(length),
            _ => return None,
        })
    }

    /// Counts toward the raw sequence length (M, I, S, H, =, X).
    pub fn consumes_raw_sequence(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_)
                | CigarOp::Insertion(_)
                | CigarOp::SoftClip(_)
                | CigarOp::HardClip(_)
                | CigarOp::SeqMatch(_)
                | CigarOp::SeqMismatch(_)
        )
    }

    /// Advances along the reference (M, D, N, =, X).
    pub fn consumes_reference(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_)
                | CigarOp::Deletion(_)
                | CigarOp::RefSkip(_)
                | CigarOp::SeqMatch(_)
                | CigarOp::SeqMismatch(_)
        )
    }

    /// Counts toward the mapped sequence length (M, =, X).
    pub fn is_match_or_mismatch(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_) | CigarOp::SeqMatch(_) | CigarOp::SeqMismatch(_)
        )
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.length(), self.as_char())
    }
}

/// Borrowed view over packed CIGAR bytes (4 bytes per operation).
///
/// Nothing is decoded until the operations are iterated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cigar<'a> {
    raw: &'a [u8],
}

impl<'a> Cigar<'a> {
    /// Wrap packed CIGAR bytes. The length must be a multiple of 4.
    pub(crate) fn new(raw: &'a [u8]) -> Self {
        debug_assert_eq!(raw.len() % 4, 0);
        Self { raw }
    }

    /// Packed bytes as stored in the record.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.raw.len() / 4
    }

    /// No operations present.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Iterate decoded operations.
    pub fn iter(&self) -> CigarIter<'a> {
        CigarIter {
            chunks: self.raw.chunks_exact(4),
        }
    }

    /// Decode all operations into a vector.
    pub fn to_vec(&self) -> DecodeResult<Vec<CigarOp>> {
        self.iter().collect()
    }

    /// Raw sequence length, falling back to `query_length` when empty.
    pub fn raw_sequence_length(&self, query_length: usize) -> DecodeResult<usize> {
        sum_lengths(self.iter(), query_length, CigarOp::consumes_raw_sequence)
    }

    /// Mapped sequence length, falling back to `query_length` when empty.
    pub fn mapped_sequence_length(&self, query_length: usize) -> DecodeResult<usize> {
        sum_lengths(self.iter(), query_length, CigarOp::is_match_or_mismatch)
    }

    /// Append the SAM text form (e.g. `2S4M2S`) to `out`.
    ///
    /// Writes nothing for an empty CIGAR; callers decide on the `*` sentinel.
    pub fn write_text(&self, out: &mut String) -> DecodeResult<()> {
        for op in self.iter() {
            let op = op?;
            // Writing into a String cannot fail.
            let _ = write!(out, "{}{}", op.length(), op.as_char());
        }
        Ok(())
    }
}

/// Iterator over packed CIGAR operations.
pub struct CigarIter<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
}

impl Iterator for CigarIter<'_> {
    type Item = DecodeResult<CigarOp>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        let packed = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        Some(CigarOp::from_packed(packed))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

fn sum_lengths<I>(ops: I, query_length: usize, counts: fn(&CigarOp) -> bool) -> DecodeResult<usize>
where
    I: Iterator<Item = DecodeResult<CigarOp>>,
{
    let mut seen = false;
    let mut total = 0usize;
    for op in ops {
        let op = op?;
        seen = true;
        if counts(&op) {
            total += op.length() as usize;
        }
    }
    Ok(if seen { total } else { query_length })
}

/// Raw sequence length over decoded operations (M, I, S, H, =, X).
pub fn raw_sequence_length(ops: &[CigarOp], query_length: usize) -> usize {
    if ops.is_empty() {
        return query_length;
    }
    ops.iter()
        .filter(|op| op.consumes_raw_sequence())
        .map(|op| op.length() as usize)
        .sum()
}

/// Mapped sequence length over decoded operations (M, =, X).
pub fn mapped_sequence_length(ops: &[CigarOp], query_length: usize) -> usize {
    if ops.is_empty() {
        return query_length;
    }
    ops.iter()
        .filter(|op| op.is_match_or_mismatch())
        .map(|op| op.length() as usize)
        .sum()
}

/// Number of reference bases covered by `ops`.
pub fn reference_span(ops: &[CigarOp]) -> u64 {
    ops.iter()
        .filter(|op| op.consumes_reference())
        .map(|op| op.length() as u64)
        .sum()
}

/// Parse BAM CIGAR operations from binary format.
///
/// # Errors
///
/// Returns error if:
/// - Data is too short for specified number of operations
/// - Invalid operation code encountered (not 0-8)
///
/// # Example
///
/// ```
/// use alnstream::io::bam::{parse_cigar, CigarOp};
///
/// // 100M = 100 << 4 | 0 = 1600 = 0x00000640 (little-endian)
/// let data = vec![0x40, 0x06, 0x00, 0x00];
/// let cigar = parse_cigar(&data, 1).unwrap();
/// assert_eq!(cigar, vec![CigarOp::Match(100)]);
/// ```
pub fn parse_cigar(data: &[u8], n_ops: usize) -> DecodeResult<Vec<CigarOp>> {
    let required_bytes = n_ops * 4;
    if data.len() < required_bytes {
        return Err(BamDecodeError::UnexpectedEof {
            context: "CIGAR",
            expected: required_bytes,
            actual: data.len(),
        });
    }
    Cigar::new(&data[..required_bytes]).to_vec()
}

/// Append packed operations to `out`.
pub fn encode_cigar(ops: &[CigarOp], out: &mut Vec<u8>) {
    out.reserve(ops.len() * 4);
    for op in ops {
        out.extend_from_slice(&op.to_packed().to_le_bytes());
    }
}

/// Parse the SAM text form (`2S4M2S`). `*` and the empty string give no operations.
pub fn parse_cigar_text(text: &str) -> io::Result<Vec<CigarOp>> {
    if text.is_empty() || text == "*" {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    let mut length: Option<u32> = None;
    for c in text.chars() {
        if let Some(digit) = c.to_digit(10) {
            let next = length
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|n| n.checked_add(digit))
                .filter(|n| *n < (1 << 28))
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("CIGAR length too large in {:?}", text),
                    )
                })?;
            length = Some(next);
            continue;
        }

        let len = length.take().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("CIGAR operation {:?} without length in {:?}", c, text),
            )
        })?;
        let op = CigarOp::from_char(c, len).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid CIGAR operation {:?} in {:?}", c, text),
            )
        })?;
        ops.push(op);
    }

    if length.is_some() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Trailing length without operation in {:?}", text),
        ));
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn packed(ops: &[CigarOp]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_cigar(ops, &mut out);
        out
    }

    #[test]
    fn test_cigar_op_display() {
        assert_eq!(format!("{}", CigarOp::Match(100)), "100M");
        assert_eq!(format!("{}", CigarOp::Insertion(5)), "5I");
        assert_eq!(format!("{}", CigarOp::SeqMismatch(2)), "2X");
    }

    #[test]
    fn test_parse_multiple_operations() {
        // 50M 5I 45M
        let data = vec![
            0x20, 0x03, 0x00, 0x00, // 50M
            0x51, 0x00, 0x00, 0x00, // 5I
            0xD0, 0x02, 0x00, 0x00, // 45M
        ];
        let cigar = parse_cigar(&data, 3).unwrap();
        assert_eq!(
            cigar,
            vec![CigarOp::Match(50), CigarOp::Insertion(5), CigarOp::Match(45)]
        );
    }

    #[test]
    fn test_parse_all_operations() {
        let data: Vec<u8> = (0x10u8..=0x18).flat_map(|b| [b, 0, 0, 0]).collect();
        let cigar = parse_cigar(&data, 9).unwrap();
        let text: String = cigar.iter().map(|op| op.to_string()).collect();
        assert_eq!(text, "1M1I1D1N1S1H1P1=1X");
    }

    #[test]
    fn test_insufficient_data_error() {
        let result = parse_cigar(&[0x10, 0x00], 1);
        assert!(matches!(
            result,
            Err(BamDecodeError::UnexpectedEof { expected: 4, actual: 2, .. })
        ));
    }

    #[test]
    fn test_invalid_operation_code() {
        let result = parse_cigar(&[0x19, 0x00, 0x00, 0x00], 1);
        assert!(matches!(result, Err(BamDecodeError::InvalidCigarOp { value: 9 })));
    }

    #[test]
    fn test_large_length() {
        let cigar = parse_cigar(&[0xF0, 0xFF, 0xFF, 0xFF], 1).unwrap();
        assert_eq!(cigar[0], CigarOp::Match(268_435_455));
    }

    #[test]
    fn test_lengths_4m() {
        let raw = packed(&parse_cigar_text("4M").unwrap());
        let cigar = Cigar::new(&raw);
        assert_eq!(cigar.raw_sequence_length(4).unwrap(), 4);
        assert_eq!(cigar.mapped_sequence_length(4).unwrap(), 4);
    }

    #[test]
    fn test_lengths_soft_clipped() {
        let raw = packed(&parse_cigar_text("2S4M2S").unwrap());
        let cigar = Cigar::new(&raw);
        assert_eq!(cigar.raw_sequence_length(8).unwrap(), 8);
        assert_eq!(cigar.mapped_sequence_length(8).unwrap(), 4);
    }

    #[test]
    fn test_lengths_ignore_deletions_and_skips() {
        let ops = parse_cigar_text("3H2I5M10D4N3=1X").unwrap();
        assert_eq!(raw_sequence_length(&ops, 0), 3 + 2 + 5 + 3 + 1);
        assert_eq!(mapped_sequence_length(&ops, 0), 5 + 3 + 1);
    }

    #[test]
    fn test_empty_cigar_falls_back_to_query_length() {
        let cigar = Cigar::new(&[]);
        assert_eq!(cigar.raw_sequence_length(37).unwrap(), 37);
        assert_eq!(cigar.mapped_sequence_length(37).unwrap(), 37);
        assert_eq!(cigar.raw_sequence_length(0).unwrap(), 0);
        assert_eq!(raw_sequence_length(&[], 12), 12);
    }

    #[test]
    fn test_reference_span() {
        let ops = parse_cigar_text("2S3M4D1I2N1=1X").unwrap();
        assert_eq!(reference_span(&ops), 3 + 4 + 2 + 1 + 1);
    }

    #[test]
    fn test_write_text() {
        let raw = packed(&[CigarOp::SoftClip(2), CigarOp::Match(4), CigarOp::SoftClip(2)]);
        let mut out = String::new();
        Cigar::new(&raw).write_text(&mut out).unwrap();
        assert_eq!(out, "2S4M2S");

        let mut empty = String::new();
        Cigar::new(&[]).write_text(&mut empty).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_parse_text_errors() {
        assert!(parse_cigar_text("M").is_err());
        assert!(parse_cigar_text("4Q").is_err());
        assert!(parse_cigar_text("4M3").is_err());
        assert!(parse_cigar_text("*").unwrap().is_empty());
    }

    fn op_strategy() -> impl Strategy<Value = CigarOp> {
        (0u32..=8, 0u32..10_000).prop_map(|(code, len)| {
            CigarOp::from_packed((len << 4) | code).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_packed_roundtrip(op in op_strategy()) {
            prop_assert_eq!(CigarOp::from_packed(op.to_packed()).unwrap(), op);
        }

        #[test]
        fn prop_raw_at_least_mapped(
            ops in prop::collection::vec(op_strategy(), 0..20),
            query_length in 0usize..1000
        ) {
            let raw = packed(&ops);
            let cigar = Cigar::new(&raw);
            let raw_len = cigar.raw_sequence_length(query_length).unwrap();
            let mapped_len = cigar.mapped_sequence_length(query_length).unwrap();
            prop_assert!(raw_len >= mapped_len);
            prop_assert_eq!(raw_len, raw_sequence_length(&ops, query_length));
            prop_assert_eq!(mapped_len, mapped_sequence_length(&ops, query_length));
        }

        #[test]
        fn prop_text_roundtrip(ops in prop::collection::vec(op_strategy(), 1..20)) {
            let text: String = ops.iter().map(|op| op.to_string()).collect();
            prop_assert_eq!(parse_cigar_text(&text).unwrap(), ops);
        }
    }
}
