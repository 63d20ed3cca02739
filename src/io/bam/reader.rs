//! Record framing over a decompressed byte channel.
//!
//! The channel carries a header followed by length-prefixed records. Three
//! header framings are recognised from the first bytes:
//!
//! - `BAM\1`: binary header (magic, text, reference dictionary)
//! - `@XY\t`: text header lines only; the dictionary comes from `@SQ` lines
//! - anything else (or nothing): no header, records start immediately
//!
//! A header line is `@`, a two-letter record type, then a tab (or a newline
//! for a bare `@CO`). A record whose block size happens to start with `0x40`
//! or `0x42` is therefore not mistaken for a header.
//!
//! Records are read into a caller-supplied buffer that is reused across
//! reads, so a stream of any length runs in memory proportional to its
//! largest record.
//!
//! # Usage
//!
//! ```no_run
//! use alnstream::io::bam::{BamChannel, RecordView};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut channel = BamChannel::new(BufReader::new(File::open("alignments.raw")?));
//! let (header, _) = channel.read_header()?;
//! println!("Header: {} references", header.reference_count());
//!
//! let mut buf = Vec::new();
//! while channel.read_record(&mut buf)? {
//!     let view = RecordView::new(&buf)?;
//!     println!("{}", view.name()?);
//! }
//! # Ok(())
//! # }
//! ```

use super::error::{BamDecodeError, DecodeResult};
use super::header::{read_bounded, read_header, Header, BAM_MAGIC};
use log::debug;
use std::io::{self, BufRead, Read};

/// Bytes needed to tell the framings apart.
const SNIFF_LEN: usize = 4;

/// How the header was framed on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFraming {
    /// `BAM\1` magic, text and binary reference dictionary
    Binary,
    /// `@` text lines only
    Text,
    /// No header
    Absent,
}

/// True if `head` opens a SAM header line.
fn is_header_line(head: &[u8]) -> bool {
    matches!(head, [b'@', a, b, b'\t' | b'\n'] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic())
}

/// `BufRead` wrapper that can peek a fixed number of bytes even when they
/// straddle the inner reader's buffer boundary.
struct Lookahead<R> {
    pending: Vec<u8>,
    pos: usize,
    inner: R,
}

impl<R: BufRead> Lookahead<R> {
    fn new(inner: R) -> Self {
        Self {
            pending: Vec::with_capacity(SNIFF_LEN),
            pos: 0,
            inner,
        }
    }

    /// Up to `n` upcoming bytes, fewer only at end of stream.
    fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.pos > 0 {
            self.pending.drain(..self.pos);
            self.pos = 0;
        }
        while self.pending.len() < n {
            let available = self.inner.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let take = available.len().min(n - self.pending.len());
            self.pending.extend_from_slice(&available[..take]);
            self.inner.consume(take);
        }
        let end = self.pending.len().min(n);
        Ok(&self.pending[..end])
    }
}

impl<R: BufRead> Read for Lookahead<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.pending.len() {
            let n = (&self.pending[self.pos..]).read(buf)?;
            self.consume(n);
            return Ok(n);
        }
        self.inner.read(buf)
    }
}

impl<R: BufRead> BufRead for Lookahead<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos < self.pending.len() {
            return Ok(&self.pending[self.pos..]);
        }
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if self.pos < self.pending.len() {
            self.pos += amt;
            if self.pos >= self.pending.len() {
                self.pending.clear();
                self.pos = 0;
            }
        } else {
            self.inner.consume(amt);
        }
    }
}

/// Sequential reader of header then records.
pub struct BamChannel<R> {
    reader: Lookahead<R>,
}

impl<R: BufRead> BamChannel<R> {
    /// Wrap a decompressed byte channel.
    pub fn new(reader: R) -> Self {
        Self {
            reader: Lookahead::new(reader),
        }
    }

    /// Read the header, leaving the channel at the first record.
    ///
    /// Binary framing needs the full `BAM\1` magic. Text framing stops at
    /// the first line that is not a header line; those bytes stay unread and
    /// belong to the first record.
    pub fn read_header(&mut self) -> DecodeResult<(Header, HeaderFraming)> {
        let head = self.reader.peek(SNIFF_LEN)?;
        let framing = if head == BAM_MAGIC {
            HeaderFraming::Binary
        } else if is_header_line(head) {
            HeaderFraming::Text
        } else {
            HeaderFraming::Absent
        };

        let header = match framing {
            HeaderFraming::Binary => {
                let header = read_header(&mut self.reader)?;
                debug!(
                    "Binary header: {} bytes of text, {} references",
                    header.text.len(),
                    header.reference_count()
                );
                header
            }
            HeaderFraming::Text => {
                let text = self.read_text_lines()?;
                let header = Header::from_text(text);
                debug!(
                    "Text header: {} references from @SQ lines",
                    header.reference_count()
                );
                header
            }
            HeaderFraming::Absent => {
                debug!("No header on channel");
                Header::default()
            }
        };
        Ok((header, framing))
    }

    fn read_text_lines(&mut self) -> DecodeResult<String> {
        let mut text = Vec::new();
        while is_header_line(self.reader.peek(SNIFF_LEN)?) {
            self.reader.read_until(b'\n', &mut text)?;
        }
        String::from_utf8(text).map_err(|e| BamDecodeError::InvalidUtf8 {
            field: "header text",
            source: e.utf8_error(),
        })
    }

    /// Read the next record into `buf` (block size prefix included).
    ///
    /// Returns `Ok(false)` at a clean end of stream, leaving `buf` untouched.
    ///
    /// # Errors
    ///
    /// A stream that ends inside the block size or the record body is an
    /// [`BamDecodeError::UnexpectedEof`]; a negative block size is a
    /// [`BamDecodeError::NegativeLength`].
    pub fn read_record(&mut self, buf: &mut Vec<u8>) -> DecodeResult<bool> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(false);
        }

        let mut size_buf = [0u8; 4];
        let got = read_fully(&mut self.reader, &mut size_buf)?;
        if got < size_buf.len() {
            return Err(BamDecodeError::UnexpectedEof {
                context: "record block size",
                expected: 4,
                actual: got,
            });
        }

        let block_size = i32::from_le_bytes(size_buf);
        if block_size < 0 {
            return Err(BamDecodeError::NegativeLength {
                field: "block size",
                value: block_size,
            });
        }

        buf.clear();
        buf.extend_from_slice(&size_buf);
        read_bounded(&mut self.reader, block_size as usize, buf, "record body")?;

        Ok(true)
    }

    /// Consume and discard everything left on the channel.
    ///
    /// Returns the number of bytes discarded.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(&mut self.reader, &mut io::sink())
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader.inner
    }

    /// Unwrap the underlying reader.
    ///
    /// Bytes already peeked while sniffing a header line are not returned
    /// to it.
    pub fn into_inner(self) -> R {
        self.reader.inner
    }
}

/// Like `read_exact`, but reports how many bytes arrived before EOF.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::bam::builder::RecordBuilder;
    use crate::io::bam::header::{write_header, Reference};
    use crate::io::bam::tags::TagValue;
    use std::io::{BufReader, Cursor};

    /// Binary header + the given records.
    fn create_minimal_bam(records: &[Vec<u8>]) -> Vec<u8> {
        let header = Header::new(
            "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n".into(),
            vec![Reference::new("chr1", 1000)],
        );
        let mut data = Vec::new();
        write_header(&mut data, &header).unwrap();
        for r in records {
            data.extend_from_slice(r);
        }
        data
    }

    fn record(name: &str) -> Vec<u8> {
        RecordBuilder::new(name)
            .reference_id(0)
            .position(10)
            .cigar_text("4M")
            .unwrap()
            .sequence(b"ACGT")
            .build()
            .unwrap()
    }

    #[test]
    fn test_binary_header_then_records() {
        let data = create_minimal_bam(&[record("a"), record("b")]);
        let mut channel = BamChannel::new(Cursor::new(data));

        let (header, framing) = channel.read_header().unwrap();
        assert_eq!(framing, HeaderFraming::Binary);
        assert_eq!(header.reference_name(0), Some("chr1"));

        let mut buf = Vec::new();
        assert!(channel.read_record(&mut buf).unwrap());
        assert_eq!(buf, record("a"));
        assert!(channel.read_record(&mut buf).unwrap());
        assert_eq!(buf, record("b"));

        assert!(!channel.read_record(&mut buf).unwrap());
        assert_eq!(buf, record("b"), "buffer untouched at end of stream");
    }

    #[test]
    fn test_text_header_leaves_first_record() {
        let mut data = b"@HD\tVN:1.6\n@SQ\tSN:chrX\tLN:77\n".to_vec();
        data.extend_from_slice(&record("first"));
        let mut channel = BamChannel::new(Cursor::new(data));

        let (header, framing) = channel.read_header().unwrap();
        assert_eq!(framing, HeaderFraming::Text);
        assert_eq!(header.reference_name(0), Some("chrX"));
        assert_eq!(header.singleton_tag("HD", "VN"), Some("1.6"));

        let mut buf = Vec::new();
        assert!(channel.read_record(&mut buf).unwrap());
        assert_eq!(buf, record("first"));
    }

    /// Unmapped record named `r` padded with a string tag to `block_size`.
    fn record_with_block_size(block_size: usize) -> Vec<u8> {
        // 32 fixed bytes, "r\0", then tag name, type, value and NUL
        let padding = block_size - 34 - 4;
        let data = RecordBuilder::new("r")
            .tag(*b"XP", TagValue::String("a".repeat(padding)))
            .build()
            .unwrap();
        assert_eq!(data[..4], (block_size as i32).to_le_bytes());
        data
    }

    #[test]
    fn test_text_header_then_record_starting_with_at_sign() {
        let rec = record_with_block_size(64);
        assert_eq!(rec[0], b'@');
        let mut data = b"@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:100\n".to_vec();
        data.extend_from_slice(&rec);
        data.extend_from_slice(&rec);
        let mut channel = BamChannel::new(Cursor::new(data));

        let (header, framing) = channel.read_header().unwrap();
        assert_eq!(framing, HeaderFraming::Text);
        assert_eq!(header.text, "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:100\n");

        let mut buf = Vec::new();
        let mut count = 0;
        while channel.read_record(&mut buf).unwrap() {
            assert_eq!(buf, rec);
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_headerless_record_starting_with_magic_byte() {
        let rec = record_with_block_size(66);
        assert_eq!(rec[0], BAM_MAGIC[0]);
        let mut channel = BamChannel::new(Cursor::new(rec.clone()));

        let (_, framing) = channel.read_header().unwrap();
        assert_eq!(framing, HeaderFraming::Absent);
        let mut buf = Vec::new();
        assert!(channel.read_record(&mut buf).unwrap());
        assert_eq!(buf, rec);
    }

    #[test]
    fn test_text_header_across_small_buffers() {
        let mut data = b"@HD\tVN:1.6\n@SQ\tSN:chrX\tLN:77\n@CO\n".to_vec();
        data.extend_from_slice(&record("first"));
        data.extend_from_slice(&record("second"));
        let mut channel = BamChannel::new(BufReader::with_capacity(3, Cursor::new(data)));

        let (header, framing) = channel.read_header().unwrap();
        assert_eq!(framing, HeaderFraming::Text);
        assert_eq!(header.reference_name(0), Some("chrX"));

        let mut buf = Vec::new();
        assert!(channel.read_record(&mut buf).unwrap());
        assert_eq!(buf, record("first"));
        assert!(channel.read_record(&mut buf).unwrap());
        assert_eq!(buf, record("second"));
        assert!(!channel.read_record(&mut buf).unwrap());
    }

    #[test]
    fn test_huge_block_size_on_short_stream() {
        let mut data = create_minimal_bam(&[]);
        data.extend_from_slice(&[0xff, 0xff, 0xff, 0x7f]);
        data.extend_from_slice(&[0u8; 10]);
        let mut channel = BamChannel::new(Cursor::new(data));
        channel.read_header().unwrap();

        let result = channel.read_record(&mut Vec::new());
        assert!(matches!(
            result,
            Err(BamDecodeError::UnexpectedEof {
                context: "record body",
                expected: 2147483647,
                actual: 10,
            })
        ));
    }

    #[test]
    fn test_no_header() {
        let data = record("only");
        let mut channel = BamChannel::new(Cursor::new(data.clone()));
        let (header, framing) = channel.read_header().unwrap();
        assert_eq!(framing, HeaderFraming::Absent);
        assert_eq!(header.reference_count(), 0);

        let mut buf = Vec::new();
        assert!(channel.read_record(&mut buf).unwrap());
        assert_eq!(buf, data);
    }

    #[test]
    fn test_empty_channel() {
        let mut channel = BamChannel::new(Cursor::new(Vec::new()));
        let (_, framing) = channel.read_header().unwrap();
        assert_eq!(framing, HeaderFraming::Absent);
        assert!(!channel.read_record(&mut Vec::new()).unwrap());
    }

    #[test]
    fn test_truncated_block_size() {
        let mut channel = BamChannel::new(Cursor::new(vec![10u8, 0]));
        assert!(matches!(
            channel.read_record(&mut Vec::new()),
            Err(BamDecodeError::UnexpectedEof { context: "record block size", actual: 2, .. })
        ));
    }

    #[test]
    fn test_truncated_body() {
        let mut data = record("cut");
        data.truncate(data.len() - 3);
        let mut channel = BamChannel::new(Cursor::new(data));
        assert!(matches!(
            channel.read_record(&mut Vec::new()),
            Err(BamDecodeError::UnexpectedEof { context: "record body", .. })
        ));
    }

    #[test]
    fn test_negative_block_size() {
        let mut channel = BamChannel::new(Cursor::new((-5i32).to_le_bytes().to_vec()));
        assert!(matches!(
            channel.read_record(&mut Vec::new()),
            Err(BamDecodeError::NegativeLength { value: -5, .. })
        ));
    }

    #[test]
    fn test_drain_counts_remaining_bytes() {
        let data = create_minimal_bam(&[record("a"), record("b")]);
        let total = data.len();
        let mut channel = BamChannel::new(Cursor::new(data));
        channel.read_header().unwrap();
        let mut buf = Vec::new();
        channel.read_record(&mut buf).unwrap();
        let consumed = channel.get_ref().position() as usize;

        assert_eq!(channel.drain().unwrap() as usize, total - consumed);
        assert!(!channel.read_record(&mut buf).unwrap());
    }
}
