//! 4-bit BAM sequence and Phred quality codec.
//!
//! BAM stores sequences in 4-bit encoding (2 bases per byte) to save space.
//! Each nibble (4 bits) encodes one base using a lookup table.
//!
//! # Format
//!
//! - High nibble first, low nibble second within each byte
//! - 16 possible values (4 bases + ambiguity codes)
//! - Example: byte 0x12 -> bases at indices 1 ('A') and 2 ('C')
//!
//! Quality scores are raw Phred values; text form adds 33. A quality block
//! whose first byte is `0xFF` means "not stored" and renders as `*`.

use super::error::{BamDecodeError, DecodeResult};

/// BAM 4-bit to ASCII base lookup table.
///
/// - 0 = '=' (match to reference, not used in practice)
/// - 1-4 = A, C, G, T
/// - 5-15 = IUPAC ambiguity codes (M, R, S, V, W, Y, H, K, D, B, N)
const SEQ_LOOKUP: [u8; 16] = [
    b'=', b'A', b'C', b'M', // 0-3
    b'G', b'R', b'S', b'V', // 4-7
    b'T', b'W', b'Y', b'H', // 8-11
    b'K', b'D', b'B', b'N', // 12-15
];

/// Quality byte meaning "no quality stored".
pub const MISSING_QUALITY: u8 = 0xFF;

fn check_length(data: &[u8], required: usize, context: &'static str) -> DecodeResult<()> {
    if data.len() < required {
        return Err(BamDecodeError::UnexpectedEof {
            context,
            expected: required,
            actual: data.len(),
        });
    }
    Ok(())
}

#[inline]
fn base_at(data: &[u8], i: usize) -> u8 {
    let byte = data[i / 2];
    let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
    SEQ_LOOKUP[nibble as usize]
}

/// Decode a 4-bit encoded BAM sequence to ASCII.
///
/// # Errors
///
/// Returns error if `data` is too short for the specified `length`.
///
/// # Example
///
/// ```
/// use alnstream::io::bam::decode_sequence;
///
/// // Byte 0x12 encodes bases at indices 1 ('A') and 2 ('C')
/// let data = vec![0x12];
/// let sequence = decode_sequence(&data, 2).unwrap();
/// assert_eq!(sequence, b"AC");
/// ```
pub fn decode_sequence(data: &[u8], length: usize) -> DecodeResult<Vec<u8>> {
    check_length(data, length.div_ceil(2), "sequence")?;
    Ok((0..length).map(|i| base_at(data, i)).collect())
}

/// Decode into a reusable `String`, replacing its contents.
pub fn decode_sequence_into(data: &[u8], length: usize, out: &mut String) -> DecodeResult<()> {
    check_length(data, length.div_ceil(2), "sequence")?;
    out.clear();
    out.reserve(length);
    out.extend((0..length).map(|i| base_at(data, i) as char));
    Ok(())
}

/// Render Phred qualities as Phred+33 text into `out`, replacing its contents.
///
/// Writes `*` when the block is empty or starts with [`MISSING_QUALITY`].
pub fn decode_quality_into(data: &[u8], out: &mut String) {
    out.clear();
    if data.first().map_or(true, |&q| q == MISSING_QUALITY) {
        out.push('*');
        return;
    }
    out.reserve(data.len());
    out.extend(data.iter().map(|&q| (q.saturating_add(33)) as char));
}

/// Convert one ASCII base to its 4-bit code. Unknown characters map to `N`.
pub fn base_to_4bit(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'=' => 0,
        b'A' => 1,
        b'C' => 2,
        b'M' => 3,
        b'G' => 4,
        b'R' => 5,
        b'S' => 6,
        b'V' => 7,
        b'T' => 8,
        b'W' => 9,
        b'Y' => 10,
        b'H' => 11,
        b'K' => 12,
        b'D' => 13,
        b'B' => 14,
        _ => 15,
    }
}

/// Pack ASCII bases into 4-bit pairs, appending to `out`.
pub fn encode_sequence(sequence: &[u8], out: &mut Vec<u8>) {
    out.reserve(sequence.len().div_ceil(2));
    for pair in sequence.chunks(2) {
        let high = base_to_4bit(pair[0]) << 4;
        let low = pair.get(1).map_or(0, |&b| base_to_4bit(b));
        out.push(high | low);
    }
}

/// Convert Phred+33 text to raw qualities, appending to `out`.
///
/// `*` (or empty text) yields `length` bytes of [`MISSING_QUALITY`].
pub fn encode_quality(text: &[u8], length: usize, out: &mut Vec<u8>) {
    if text.is_empty() || text == b"*" {
        out.extend(std::iter::repeat(MISSING_QUALITY).take(length));
        return;
    }
    out.extend(text.iter().map(|&c| c.saturating_sub(33)));
}
