//! BAM header framing.
//!
//! The BAM header consists of:
//! 1. Magic bytes ("BAM\1")
//! 2. SAM header text
//! 3. Reference sequence dictionary
//!
//! # Format
//!
//! ```text
//! BAM Header:
//! - 4 bytes: Magic ("BAM\1")
//! - 4 bytes: SAM header text length (l_text, int32)
//! - l_text bytes: SAM header text
//! - 4 bytes: Number of reference sequences (n_ref, int32)
//! - For each reference:
//!   - 4 bytes: Reference name length (l_name, int32, includes null terminator)
//!   - l_name bytes: Reference name (null-terminated)
//!   - 4 bytes: Reference length (int32)
//! ```

use super::error::{BamDecodeError, DecodeResult};
use super::sam_header::{HeaderGroup, ProgramGuess, SamHeader};
use log::warn;
use std::io::{self, Read, Write};

/// BAM magic bytes.
pub const BAM_MAGIC: &[u8; 4] = b"BAM\x01";

/// Reference sequence information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Reference sequence name (e.g., "chr1", "chrM")
    pub name: String,
    /// Reference sequence length in bases
    pub length: u32,
}

impl Reference {
    /// Create a new reference.
    pub fn new(name: impl Into<String>, length: u32) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// Alignment stream header.
///
/// Holds the verbatim text, the reference dictionary used to resolve record
/// reference indices, and the parsed text. Built once per input stream and
/// shared read-only by every output destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// SAM header text (includes @HD, @SQ, @RG, @PG lines)
    pub text: String,
    /// Reference sequences (chromosomes/contigs)
    pub references: Vec<Reference>,
    records: SamHeader,
}

impl Header {
    /// Create a header from its text and reference dictionary.
    pub fn new(text: String, references: Vec<Reference>) -> Self {
        let records = SamHeader::parse(text.trim_end_matches('\0'));
        Self {
            text,
            references,
            records,
        }
    }

    /// Header with the dictionary taken from `@SQ` lines (`SN`, `LN`).
    ///
    /// Used for streams whose header is text only.
    pub fn from_text(text: String) -> Self {
        let records = SamHeader::parse(text.trim_end_matches('\0'));
        let references = records
            .entries("SQ")
            .iter()
            .filter_map(|entry| {
                let name = entry.get("SN")?;
                let length = match entry.get("LN").map(str::parse::<u32>) {
                    Some(Ok(len)) => len,
                    _ => {
                        warn!("@SQ {} has no usable LN; using 0", name);
                        0
                    }
                };
                Some(Reference::new(name, length))
            })
            .collect();
        Self {
            text,
            references,
            records,
        }
    }

    /// Get reference by ID.
    pub fn reference(&self, id: usize) -> Option<&Reference> {
        self.references.get(id)
    }

    /// Get reference name by ID.
    pub fn reference_name(&self, id: usize) -> Option<&str> {
        self.reference(id).map(|r| r.name.as_str())
    }

    /// Get number of reference sequences.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Parsed header text.
    pub fn records(&self) -> &SamHeader {
        &self.records
    }

    /// See [`SamHeader::singleton_tag`].
    pub fn singleton_tag(&self, record_type: &str, tag: &str) -> Option<&str> {
        self.records.singleton_tag(record_type, tag)
    }

    /// See [`SamHeader::group`].
    pub fn group(&self, record_type: &str) -> Option<&HeaderGroup> {
        self.records.group(record_type)
    }

    /// See [`SamHeader::mapping_program`].
    pub fn mapping_program(&self) -> ProgramGuess {
        self.records.mapping_program()
    }
}

fn read_i32<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn non_negative(value: i32, field: &'static str) -> DecodeResult<usize> {
    if value < 0 {
        return Err(BamDecodeError::NegativeLength { field, value });
    }
    Ok(value as usize)
}

/// Read and validate BAM magic bytes.
pub fn read_magic<R: Read>(reader: &mut R) -> DecodeResult<()> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;

    if &magic != BAM_MAGIC {
        return Err(BamDecodeError::InvalidMagic { actual: magic });
    }

    Ok(())
}

/// Read exactly `len` bytes onto the end of `buf`.
///
/// The buffer grows only with bytes actually read, so a corrupt length on a
/// short stream fails with [`BamDecodeError::UnexpectedEof`] instead of
/// allocating `len` bytes up front.
pub(crate) fn read_bounded<R: Read>(
    reader: &mut R,
    len: usize,
    buf: &mut Vec<u8>,
    context: &'static str,
) -> DecodeResult<()> {
    let start = buf.len();
    reader.by_ref().take(len as u64).read_to_end(buf)?;
    let actual = buf.len() - start;
    if actual < len {
        return Err(BamDecodeError::UnexpectedEof {
            context,
            expected: len,
            actual,
        });
    }
    Ok(())
}

/// Read SAM header text (`l_text` then text).
///
/// The text is kept verbatim, trailing NUL padding included, so writing the
/// header back reproduces `l_text`. Parsing ignores the padding.
pub fn read_header_text<R: Read>(reader: &mut R) -> DecodeResult<String> {
    let len = non_negative(read_i32(reader)?, "header text length")?;

    let mut text_bytes = Vec::new();
    read_bounded(reader, len, &mut text_bytes, "header text")?;

    String::from_utf8(text_bytes).map_err(|e| BamDecodeError::InvalidUtf8 {
        field: "header text",
        source: e.utf8_error(),
    })
}

/// Read a single reference sequence.
pub fn read_reference<R: Read>(reader: &mut R) -> DecodeResult<Reference> {
    let name_len = read_i32(reader)?;
    if name_len <= 0 {
        return Err(BamDecodeError::InvalidHeader {
            message: format!("Invalid reference name length: {}", name_len),
        });
    }

    let mut name_bytes = Vec::new();
    read_bounded(reader, name_len as usize, &mut name_bytes, "reference name")?;

    if name_bytes.pop() != Some(0) {
        return Err(BamDecodeError::MissingNulTerminator {
            field: "reference name",
            offset: 0,
        });
    }

    let name = String::from_utf8(name_bytes).map_err(|e| BamDecodeError::InvalidUtf8 {
        field: "reference name",
        source: e.utf8_error(),
    })?;

    let length = non_negative(read_i32(reader)?, "reference length")?;

    Ok(Reference::new(name, length as u32))
}

/// Read all reference sequences (`n_ref` then each reference).
pub fn read_references<R: Read>(reader: &mut R) -> DecodeResult<Vec<Reference>> {
    let count = non_negative(read_i32(reader)?, "reference count")?;

    // Cap the pre-allocation; a corrupt count must not reserve gigabytes.
    let mut references = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        references.push(read_reference(reader)?);
    }

    Ok(references)
}

/// Read complete binary BAM header (magic, text, references).
///
/// # Example
///
/// ```no_run
/// use alnstream::io::bam::header::read_header;
/// use std::fs::File;
/// use std::io::BufReader;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut reader = BufReader::new(File::open("alignments.raw")?);
/// let header = read_header(&mut reader)?;
/// for (i, r) in header.references.iter().enumerate() {
///     println!("  {}: {} ({} bp)", i, r.name, r.length);
/// }
/// # Ok(())
/// # }
/// ```
pub fn read_header<R: Read>(reader: &mut R) -> DecodeResult<Header> {
    read_magic(reader)?;
    let text = read_header_text(reader)?;
    let references = read_references(reader)?;
    Ok(Header::new(text, references))
}

/// Write `header` in binary framing.
///
/// Text and references are reproduced byte-for-byte, so reading the output
/// back with [`read_header`] yields an equal header.
pub fn write_header<W: Write>(writer: &mut W, header: &Header) -> io::Result<()> {
    let text = header.text.as_bytes();
    let too_large = |what: &str| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} does not fit in a 32-bit length", what),
        )
    };

    writer.write_all(BAM_MAGIC)?;
    let l_text = i32::try_from(text.len()).map_err(|_| too_large("header text"))?;
    writer.write_all(&l_text.to_le_bytes())?;
    writer.write_all(text)?;

    let n_ref = i32::try_from(header.references.len()).map_err(|_| too_large("reference count"))?;
    writer.write_all(&n_ref.to_le_bytes())?;
    for reference in &header.references {
        let l_name = i32::try_from(reference.name.len() + 1)
            .map_err(|_| too_large("reference name"))?;
        writer.write_all(&l_name.to_le_bytes())?;
        writer.write_all(reference.name.as_bytes())?;
        writer.write_all(&[0])?;
        writer.write_all(&(reference.length as i32).to_le_bytes())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> Header {
        Header::new(
            String::from("@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n@SQ\tSN:chr2\tLN:2000\n"),
            vec![Reference::new("chr1", 1000), Reference::new("chr2", 2000)],
        )
    }

    #[test]
    fn test_read_magic_invalid() {
        let mut cursor = Cursor::new(b"BAMX");
        assert!(matches!(
            read_magic(&mut cursor),
            Err(BamDecodeError::InvalidMagic { actual }) if &actual == b"BAMX"
        ));
    }

    #[test]
    fn test_read_header_text_keeps_nul_padding() {
        let mut data = vec![7, 0, 0, 0];
        data.extend_from_slice(b"@CO\tx\0");
        data.push(0);
        let text = read_header_text(&mut Cursor::new(data)).unwrap();
        assert_eq!(text, "@CO\tx\0\0");
    }

    #[test]
    fn test_padded_header_round_trips_byte_for_byte() {
        let text = "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n";
        let mut input = Vec::new();
        input.extend_from_slice(BAM_MAGIC);
        input.extend_from_slice(&((text.len() + 1) as i32).to_le_bytes());
        input.extend_from_slice(text.as_bytes());
        input.push(0);
        input.extend_from_slice(&1i32.to_le_bytes());
        input.extend_from_slice(&5i32.to_le_bytes());
        input.extend_from_slice(b"chr1\0");
        input.extend_from_slice(&1000i32.to_le_bytes());

        let header = read_header(&mut Cursor::new(&input)).unwrap();
        assert_eq!(header.singleton_tag("HD", "VN"), Some("1.6"));
        assert_eq!(header.records().entries("SQ").len(), 1);

        let mut output = Vec::new();
        write_header(&mut output, &header).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_oversized_text_length_fails_without_allocating() {
        let mut data = i32::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(b"@HD\tVN:1.6\n");
        assert!(matches!(
            read_header_text(&mut Cursor::new(data)),
            Err(BamDecodeError::UnexpectedEof { context: "header text", actual: 11, .. })
        ));
    }

    #[test]
    fn test_oversized_reference_name_length() {
        let mut data = i32::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(b"chr1\0");
        assert!(matches!(
            read_reference(&mut Cursor::new(data)),
            Err(BamDecodeError::UnexpectedEof { context: "reference name", actual: 5, .. })
        ));
    }

    #[test]
    fn test_read_reference() {
        let mut data = vec![5, 0, 0, 0];
        data.extend_from_slice(b"chr1\0");
        data.extend_from_slice(&248956422u32.to_le_bytes());

        let reference = read_reference(&mut Cursor::new(data)).unwrap();
        assert_eq!(reference.name, "chr1");
        assert_eq!(reference.length, 248956422);
    }

    #[test]
    fn test_reference_name_without_nul() {
        let mut data = vec![4, 0, 0, 0];
        data.extend_from_slice(b"chr1");
        data.extend_from_slice(&10u32.to_le_bytes());
        assert!(matches!(
            read_reference(&mut Cursor::new(data)),
            Err(BamDecodeError::MissingNulTerminator { .. })
        ));
    }

    #[test]
    fn test_negative_reference_count() {
        let data = (-1i32).to_le_bytes();
        assert!(matches!(
            read_references(&mut Cursor::new(data)),
            Err(BamDecodeError::NegativeLength { value: -1, .. })
        ));
    }

    #[test]
    fn test_write_then_read() {
        let header = sample_header();
        let mut out = Vec::new();
        write_header(&mut out, &header).unwrap();

        let back = read_header(&mut Cursor::new(&out)).unwrap();
        assert_eq!(back, header);

        let mut again = Vec::new();
        write_header(&mut again, &back).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn test_truncated_header() {
        let mut out = Vec::new();
        write_header(&mut out, &sample_header()).unwrap();
        out.truncate(out.len() - 3);
        assert!(matches!(
            read_header(&mut Cursor::new(out)),
            Err(BamDecodeError::Io(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn test_from_text_builds_dictionary() {
        let header = Header::from_text("@SQ\tSN:chrA\tLN:50\n@SQ\tSN:chrB\n".into());
        assert_eq!(header.reference_count(), 2);
        assert_eq!(header.reference_name(0), Some("chrA"));
        assert_eq!(header.reference(0).unwrap().length, 50);
        assert_eq!(header.reference(1).unwrap().length, 0);
        assert_eq!(header.reference_name(2), None);
    }

    #[test]
    fn test_delegates_to_records() {
        let header = sample_header();
        assert_eq!(header.singleton_tag("HD", "VN"), Some("1.6"));
        assert_eq!(header.group("SQ").unwrap().len(), 2);
        assert_eq!(header.mapping_program(), ProgramGuess::Unknown);
    }
}
