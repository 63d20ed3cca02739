//! Byte channels with transparent compression.
//!
//! Input: [`DataSource`] opens a local file or stdin; [`CompressedReader`]
//! sniffs the gzip magic (`1f 8b`) and decodes gzip or BGZF (a series of gzip
//! members) with `flate2`'s multi-member decoder. Anything else passes through.
//!
//! Output: [`CompressedWriter`] picks an encoding from the [`DataSink`]:
//!
//! - `.bam`, `.bgz` → BGZF blocks plus the standard 28-byte EOF marker
//! - `.gz` → single-member gzip
//! - anything else, stdout → uncompressed
//!
//! All channels are strictly sequential.

use crate::io::DataSink;
use flate2::bufread::MultiGzDecoder;
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Gzip magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Input channel location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Local file path
    Local(PathBuf),
    /// Standard input
    Stdin,
}

impl DataSource {
    /// Create a local file data source
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        DataSource::Local(path.as_ref().to_path_buf())
    }

    /// Open the raw (still compressed) byte channel.
    pub fn open(&self) -> io::Result<Box<dyn BufRead + Send>> {
        match self {
            DataSource::Local(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            DataSource::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
        }
    }

    /// Path for local sources.
    pub fn path(&self) -> Option<&Path> {
        match self {
            DataSource::Local(path) => Some(path),
            DataSource::Stdin => None,
        }
    }
}

/// Decompressed view of a [`DataSource`].
///
/// # Example
///
/// ```no_run
/// use alnstream::io::compression::{CompressedReader, DataSource};
///
/// # fn main() -> std::io::Result<()> {
/// let reader = CompressedReader::new(DataSource::from_path("alignments.bam"))?;
/// // Reader implements BufRead
/// # Ok(())
/// # }
/// ```
pub struct CompressedReader {
    inner: Box<dyn BufRead + Send>,
}

impl CompressedReader {
    /// Open `source`, decoding gzip/BGZF if the magic bytes say so.
    pub fn new(source: DataSource) -> io::Result<Self> {
        Self::from_reader(source.open()?)
    }

    /// Wrap an already open channel.
    pub fn from_reader(mut reader: Box<dyn BufRead + Send>) -> io::Result<Self> {
        let is_gzipped = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

        if is_gzipped {
            Ok(Self {
                inner: Box::new(BufReader::new(MultiGzDecoder::new(reader))),
            })
        } else {
            Ok(Self { inner: reader })
        }
    }

    /// Get the inner buffered reader
    pub fn into_inner(self) -> Box<dyn BufRead + Send> {
        self.inner
    }
}

impl Read for CompressedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for CompressedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

/// Maximum uncompressed size for a single BGZF block.
///
/// BGZF blocks must decompress to at most 64 KB; 60 KB leaves headroom for
/// incompressible data.
pub const BGZF_BLOCK_SIZE: usize = 60 * 1024;

/// BGZF end-of-file marker (an empty block).
pub const BGZF_EOF: [u8; 28] = [
    31, 139, 8, 4, 0, 0, 0, 0, 0, 255, // Header (10 bytes)
    6, 0, 66, 67, 2, 0, 27, 0, // Extra field with BSIZE=27 (8 bytes)
    3, 0, // Empty deflate block (2 bytes)
    0, 0, 0, 0, // CRC32 (4 bytes)
    0, 0, 0, 0, // ISIZE=0 (4 bytes)
];

/// Sequential BGZF writer.
///
/// # BGZF Format
///
/// Each block is a complete gzip member with the BGZF extra field:
/// - Extra subfield SI1='B' (66), SI2='C' (67)
/// - SLEN=2 (2-byte BSIZE field)
/// - BSIZE = total compressed block size - 1
pub struct BgzfWriter {
    writer: Box<dyn Write + Send>,
    current_block: Vec<u8>,
    level: Compression,
}

impl BgzfWriter {
    /// Create a BGZF writer.
    pub fn new(writer: Box<dyn Write + Send>, level: Compression) -> Self {
        Self {
            writer,
            current_block: Vec::with_capacity(BGZF_BLOCK_SIZE),
            level,
        }
    }

    /// Compress one block into BGZF framing.
    ///
    /// Standard gzip header (10 bytes) with FEXTRA set, the 6-byte `BC`
    /// extra field, raw deflate data, then CRC32 and ISIZE.
    pub fn compress_block(data: &[u8], level: Compression) -> io::Result<Vec<u8>> {
        let mut deflate = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), level);
        deflate.write_all(data)?;
        let deflated = deflate.finish()?;

        let crc = crc32fast::hash(data);
        let isize = data.len() as u32;

        let mut block = Vec::with_capacity(deflated.len() + 26);
        block.extend_from_slice(&[31, 139, 8, 4, 0, 0, 0, 0, 0, 255]);
        block.extend_from_slice(&6u16.to_le_bytes()); // XLEN
        block.extend_from_slice(&[66, 67]); // SI1, SI2
        block.extend_from_slice(&2u16.to_le_bytes()); // SLEN
        let bsize_pos = block.len();
        block.extend_from_slice(&0u16.to_le_bytes()); // BSIZE, patched below
        block.extend_from_slice(&deflated);
        block.extend_from_slice(&crc.to_le_bytes());
        block.extend_from_slice(&isize.to_le_bytes());

        let bsize = u16::try_from(block.len() - 1).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("BGZF block of {} bytes exceeds 64 KB", block.len()),
            )
        })?;
        block[bsize_pos..bsize_pos + 2].copy_from_slice(&bsize.to_le_bytes());

        Ok(block)
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if self.current_block.is_empty() {
            return Ok(());
        }
        let block = Self::compress_block(&self.current_block, self.level)?;
        self.writer.write_all(&block)?;
        self.current_block.clear();
        Ok(())
    }

    /// Write the last block and the EOF marker.
    pub fn finish(mut self) -> io::Result<()> {
        self.flush_block()?;
        self.writer.write_all(&BGZF_EOF)?;
        self.writer.flush()
    }
}

impl Write for BgzfWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut remaining = buf;

        while !remaining.is_empty() {
            let space_in_block = BGZF_BLOCK_SIZE - self.current_block.len();
            let to_copy = remaining.len().min(space_in_block);

            self.current_block.extend_from_slice(&remaining[..to_copy]);
            remaining = &remaining[to_copy..];

            if self.current_block.len() >= BGZF_BLOCK_SIZE {
                self.flush_block()?;
            }
        }

        Ok(buf.len())
    }

    /// Closes the current block early so everything written so far is on the
    /// underlying channel.
    fn flush(&mut self) -> io::Result<()> {
        self.flush_block()?;
        self.writer.flush()
    }
}

/// Output channel with encoding chosen from the sink.
///
/// # Example
///
/// ```no_run
/// use alnstream::io::{DataSink, compression::CompressedWriter};
/// use std::io::Write;
///
/// # fn main() -> std::io::Result<()> {
/// let mut writer = CompressedWriter::new(DataSink::from_path("out.bam"))?;
/// writer.write_all(b"payload")?;
/// writer.finish()?; // Important: writes the BGZF EOF marker
/// # Ok(())
/// # }
/// ```
pub enum CompressedWriter {
    /// Uncompressed writer with buffering
    Plain(Option<BufWriter<Box<dyn Write + Send>>>),
    /// Gzip compressed writer
    Gzip(Option<GzEncoder<BufWriter<Box<dyn Write + Send>>>>),
    /// BGZF compressed writer
    Bgzf(Option<BgzfWriter>),
}

impl CompressedWriter {
    /// Open `sink` at the default compression level (6).
    pub fn new(sink: DataSink) -> io::Result<Self> {
        Self::with_level(sink, Compression::default())
    }

    /// Open `sink` at the given compression level.
    pub fn with_level(sink: DataSink, level: Compression) -> io::Result<Self> {
        match sink {
            DataSink::Local(path) => {
                let file: Box<dyn Write + Send> = Box::new(File::create(&path)?);
                match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
                    "bam" | "bgz" => Ok(Self::new_bgzf(file, level)),
                    "gz" => Ok(Self::new_gzip(file, level)),
                    _ => Ok(Self::new_plain(file)),
                }
            }
            DataSink::Stdout => Ok(Self::new_plain(Box::new(io::stdout()))),
        }
    }

    /// Create a plain (uncompressed) writer
    pub fn new_plain(writer: Box<dyn Write + Send>) -> Self {
        Self::Plain(Some(BufWriter::new(writer)))
    }

    /// Create a gzip compressed writer
    pub fn new_gzip(writer: Box<dyn Write + Send>, level: Compression) -> Self {
        Self::Gzip(Some(GzEncoder::new(BufWriter::new(writer), level)))
    }

    /// Create a BGZF compressed writer
    pub fn new_bgzf(writer: Box<dyn Write + Send>, level: Compression) -> Self {
        Self::Bgzf(Some(BgzfWriter::new(writer, level)))
    }

    /// Finish writing and consume the writer.
    ///
    /// Flushes buffered data and, for compressed formats, finalizes the
    /// stream. Call this rather than relying on `Drop`, which can only flush.
    pub fn finish(mut self) -> io::Result<()> {
        match &mut self {
            Self::Plain(w) => match w.take() {
                Some(mut writer) => writer.flush(),
                None => Ok(()),
            },
            Self::Gzip(w) => match w.take() {
                Some(encoder) => encoder.finish()?.flush(),
                None => Ok(()),
            },
            Self::Bgzf(w) => match w.take() {
                Some(writer) => writer.finish(),
                None => Ok(()),
            },
        }
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(Some(w)) => w.write(buf),
            Self::Gzip(Some(w)) => w.write(buf),
            Self::Bgzf(Some(w)) => w.write(buf),
            _ => Err(io::Error::new(
                io::ErrorKind::Other,
                "Cannot write to finished writer",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(Some(w)) => w.flush(),
            Self::Gzip(Some(w)) => w.flush(),
            Self::Bgzf(Some(w)) => w.flush(),
            _ => Ok(()),
        }
    }
}

impl Drop for CompressedWriter {
    fn drop(&mut self) {
        // Best-effort flush; finish() reports errors
        let _ = self.flush();
    }
}
