//! Record encoder and per-channel writer.
//!
//! Re-encoding never touches the source buffer: the record up to the tag
//! region is copied verbatim, kept tags follow in their original order, and
//! the block size is recomputed.
//!
//! # Example
//!
//! ```
//! use alnstream::io::bam::{BamWriter, Header, RecordBuilder, RecordView, TagKey, TagValue};
//! use alnstream::io::bam::tags::IntegerType;
//!
//! let raw = RecordBuilder::new("read1")
//!     .tag(*b"NM", TagValue::Integer(IntegerType::UInt8, 0))
//!     .tag(*b"XS", TagValue::Integer(IntegerType::Int32, 12))
//!     .build()?;
//! let view = RecordView::new(&raw)?;
//!
//! let mut writer = BamWriter::new(Vec::new());
//! writer.write_header(&Header::default())?;
//! writer.write_view(&view, &[TagKey::new(*b"XS")])?;
//! assert_eq!(writer.records_written(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use super::error::{BamDecodeError, DecodeResult};
use super::header::{write_header, Header};
use super::record::RecordView;
use super::tags::{encode_tags_excluding, TagKey};
use crate::io::compression::CompressedWriter;
use std::io::{self, Write};

/// Re-encode `view` into `out` without the tags named in `excluded`.
///
/// `out` is cleared first and holds a complete record (block size prefix
/// included) on success.
pub fn encode_record(
    view: &RecordView<'_>,
    excluded: &[TagKey],
    out: &mut Vec<u8>,
) -> DecodeResult<()> {
    out.clear();
    out.reserve(view.as_bytes().len());
    out.extend_from_slice(view.core_bytes());
    encode_tags_excluding(view.tags().as_raw(), excluded, out)?;

    let block_size = out.len() - 4;
    // Never larger than the source record, which already fit.
    let declared = i32::try_from(block_size).map_err(|_| BamDecodeError::BlockSizeMismatch {
        declared: block_size,
        actual: block_size,
    })?;
    out[..4].copy_from_slice(&declared.to_le_bytes());
    Ok(())
}

/// Writes a header and records to one output channel.
pub struct BamWriter<W> {
    writer: W,
    records_written: usize,
    scratch: Vec<u8>,
}

impl<W: Write> BamWriter<W> {
    /// Wrap an output channel.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
            scratch: Vec::new(),
        }
    }

    /// Write `header` in binary framing.
    pub fn write_header(&mut self, header: &Header) -> io::Result<()> {
        write_header(&mut self.writer, header)
    }

    /// Write an already encoded record (block size prefix included).
    pub fn write_record(&mut self, raw: &[u8]) -> io::Result<()> {
        self.writer.write_all(raw)?;
        self.records_written += 1;
        Ok(())
    }

    /// Re-encode `view` without `excluded` tags and write it.
    pub fn write_view(&mut self, view: &RecordView<'_>, excluded: &[TagKey]) -> DecodeResult<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        let result = encode_record(view, excluded, &mut scratch)
            .and_then(|()| self.write_record(&scratch).map_err(BamDecodeError::from));
        self.scratch = scratch;
        result
    }

    /// Get number of records written.
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush the underlying channel.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Get a reference to the underlying channel.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwrap the underlying channel.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl BamWriter<CompressedWriter> {
    /// Flush all buffers and finalize the compressed stream.
    ///
    /// Must be called to ensure all data is written correctly.
    pub fn finish(self) -> io::Result<()> {
        self.writer.finish()
    }
}
