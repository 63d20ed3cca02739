//! Pull-based alignment stream.
//!
//! [`AlignmentStream`] owns the input channel, the cached header, one record
//! buffer that is overwritten on every read, and the open output
//! destinations. The caller owns the [`FieldValues`] it projects into.
//!
//! ```text
//! Unopened --open()/advance()--> Open --advance() == false--> Exhausted
//! ```
//!
//! # Example
//!
//! ```no_run
//! use alnstream::io::bam::{AlignmentStream, FieldValues};
//! use alnstream::io::DataSink;
//!
//! # fn main() -> alnstream::Result<()> {
//! let mut stream = AlignmentStream::from_path("alignments.bam")?;
//! stream.set_fields(&["QNAME", "FLAG", "NM"]);
//! stream.set_excluded_tags(&["XS"]);
//!
//! let primary = DataSink::from_path("primary.bam");
//! let mut values = FieldValues::new();
//! while stream.advance(&mut values)? {
//!     let flag = values.get_by_name("FLAG").and_then(|v| v.as_int()).unwrap_or(0);
//!     if flag & 0x900 == 0 {
//!         stream.write(&primary)?;
//!     }
//! }
//! let summary = stream.close()?;
//! println!("{} records read", summary.records_read);
//! # Ok(())
//! # }
//! ```

use super::fields::{project, Field, FieldValues};
use super::header::Header;
use super::outputs::Outputs;
use super::reader::{BamChannel, HeaderFraming};
use super::record::RecordView;
use super::tags::TagKey;
use crate::error::{Error, Result};
use crate::io::compression::{CompressedReader, DataSource};
use crate::io::DataSink;
use flate2::Compression;
use log::{debug, trace};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default initial capacity of the record buffer.
pub const DEFAULT_RECORD_CAPACITY: usize = 512;

/// Lifecycle of an [`AlignmentStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Header not read yet
    Unopened,
    /// Header read, records may remain
    Open,
    /// End of stream reached
    Exhausted,
}

/// Stream configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamOptions {
    /// Compression level for BGZF/gzip destinations
    pub output_compression: Compression,
    /// Initial record buffer capacity in bytes
    pub record_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            output_compression: Compression::default(),
            record_capacity: DEFAULT_RECORD_CAPACITY,
        }
    }
}

impl StreamOptions {
    /// Set the output compression level.
    pub fn with_output_compression(mut self, level: Compression) -> Self {
        self.output_compression = level;
        self
    }

    /// Set the initial record buffer capacity.
    pub fn with_record_capacity(mut self, capacity: usize) -> Self {
        self.record_capacity = capacity;
        self
    }
}

/// Counters reported by [`AlignmentStream::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CloseSummary {
    /// Records successfully read
    pub records_read: u64,
    /// Unread input bytes discarded on close
    pub bytes_drained: u64,
    /// Output destinations finished
    pub destinations_finished: usize,
}

/// Streaming reader with field projection and tag-stripping writes.
///
/// Call [`close`](Self::close) when done: it drains the input and finalizes
/// every output (BGZF outputs are truncated without it).
pub struct AlignmentStream<R: BufRead> {
    channel: BamChannel<R>,
    state: StreamState,
    header: Arc<Header>,
    framing: Option<HeaderFraming>,
    fields: Vec<Field>,
    excluded: Vec<TagKey>,
    record: Vec<u8>,
    has_record: bool,
    records_read: u64,
    outputs: Outputs,
}

impl<R: BufRead> AlignmentStream<R> {
    /// Create an unopened stream over a decompressed byte channel.
    pub fn from_reader(reader: R) -> Self {
        Self::from_reader_with_options(reader, StreamOptions::default())
    }

    /// Create an unopened stream with explicit options.
    pub fn from_reader_with_options(reader: R, options: StreamOptions) -> Self {
        Self {
            channel: BamChannel::new(reader),
            state: StreamState::Unopened,
            header: Arc::default(),
            framing: None,
            fields: Vec::new(),
            excluded: Vec::new(),
            record: Vec::with_capacity(options.record_capacity),
            has_record: false,
            records_read: 0,
            outputs: Outputs::new(options.output_compression),
        }
    }

    /// Read and cache the header. Calling it again returns the cached header.
    pub fn open(&mut self) -> Result<&Arc<Header>> {
        if self.state == StreamState::Unopened {
            let (header, framing) = self.channel.read_header()?;
            debug!(
                "Opened stream: {:?} header, {} references",
                framing,
                header.reference_count()
            );
            self.header = Arc::new(header);
            self.framing = Some(framing);
            self.state = StreamState::Open;
        }
        Ok(&self.header)
    }

    /// Cached header, once opened.
    pub fn header(&self) -> Option<&Arc<Header>> {
        (self.state != StreamState::Unopened).then_some(&self.header)
    }

    /// How the header was framed, once opened.
    pub fn framing(&self) -> Option<HeaderFraming> {
        self.framing
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Register the fields projected by [`advance`](Self::advance).
    ///
    /// Names longer than two characters that are not known fields are
    /// ignored.
    pub fn set_fields<S: AsRef<str>>(&mut self, names: &[S]) {
        self.fields.clear();
        for name in names {
            let name = name.as_ref();
            match Field::parse(name) {
                Some(field) => self.fields.push(field),
                None => debug!("Ignoring unknown field name {:?}", name),
            }
        }
    }

    /// Register already parsed fields.
    pub fn set_field_list(&mut self, fields: Vec<Field>) {
        self.fields = fields;
    }

    /// Registered fields, in projection order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Set the tags removed by [`write`](Self::write).
    ///
    /// Replaces any earlier set. Names that cannot be tag names are ignored.
    pub fn set_excluded_tags<S: AsRef<str>>(&mut self, names: &[S]) {
        self.excluded.clear();
        for name in names {
            let name = name.as_ref();
            match TagKey::parse(name) {
                Some(key) => self.excluded.push(key),
                None => debug!("Ignoring invalid tag name {:?} in exclusion set", name),
            }
        }
    }

    /// Current exclusion set.
    pub fn excluded_tags(&self) -> &[TagKey] {
        &self.excluded
    }

    /// Read the next record and project the registered fields into `values`.
    ///
    /// Returns `Ok(false)` at end of stream, leaving `values` untouched. An
    /// unopened stream is opened first. A malformed record fails the call
    /// and clears `values`; nothing is skipped.
    pub fn advance(&mut self, values: &mut FieldValues) -> Result<bool> {
        match self.state {
            StreamState::Unopened => {
                self.open()?;
            }
            StreamState::Exhausted => return Ok(false),
            StreamState::Open => {}
        }

        self.has_record = false;
        match self.channel.read_record(&mut self.record) {
            Ok(true) => {}
            Ok(false) => {
                debug!("End of stream after {} records", self.records_read);
                self.state = StreamState::Exhausted;
                return Ok(false);
            }
            Err(e) => {
                values.clear();
                return Err(e.into());
            }
        }

        let view = match RecordView::new(&self.record) {
            Ok(view) => view,
            Err(e) => {
                values.clear();
                return Err(e.into());
            }
        };
        project(&view, &self.header, &self.fields, values)?;

        self.records_read += 1;
        self.has_record = true;
        trace!(
            "Record {}: {} bytes, {} fields",
            self.records_read,
            self.record.len(),
            values.len()
        );
        Ok(true)
    }

    /// View of the most recently decoded record.
    pub fn record(&self) -> Option<RecordView<'_>> {
        if self.has_record {
            RecordView::new(&self.record).ok()
        } else {
            None
        }
    }

    /// Records successfully read so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Write the current record to `sink` without the exclusion set's tags.
    pub fn write(&mut self, sink: &DataSink) -> Result<()> {
        let view = decoded_view(self.has_record, &self.record)?;
        self.outputs.write(sink, &self.header, &view, &self.excluded)
    }

    /// Write the current record to `sink` without `excluded` tags.
    ///
    /// The registered exclusion set is not used or changed.
    pub fn write_excluding(&mut self, sink: &DataSink, excluded: &[TagKey]) -> Result<()> {
        let view = decoded_view(self.has_record, &self.record)?;
        self.outputs.write(sink, &self.header, &view, excluded)
    }

    /// Number of output destinations opened so far.
    pub fn destination_count(&self) -> usize {
        self.outputs.len()
    }

    /// Drain unread input, then finish every open destination.
    ///
    /// Destinations are finished even if draining fails.
    pub fn close(mut self) -> Result<CloseSummary> {
        let drained = self.channel.drain();
        let finished = self.outputs.finish_all();

        let summary = CloseSummary {
            records_read: self.records_read,
            bytes_drained: drained?,
            destinations_finished: finished?,
        };
        debug!(
            "Closed stream: {} records read, {} bytes drained, {} destinations finished",
            summary.records_read, summary.bytes_drained, summary.destinations_finished
        );
        Ok(summary)
    }
}

fn decoded_view(has_record: bool, record: &[u8]) -> Result<RecordView<'_>> {
    if !has_record {
        return Err(Error::WriteBeforeDecode);
    }
    Ok(RecordView::new(record)?)
}

impl AlignmentStream<CompressedReader> {
    /// Open `source`, decoding gzip/BGZF transparently.
    ///
    /// The header is read lazily by [`open`](Self::open) or the first
    /// [`advance`](Self::advance).
    pub fn from_source(source: DataSource) -> Result<Self> {
        Self::from_source_with_options(source, StreamOptions::default())
    }

    /// Open `source` with explicit options.
    pub fn from_source_with_options(source: DataSource, options: StreamOptions) -> Result<Self> {
        let path = source
            .path()
            .map_or_else(|| PathBuf::from("<stdin>"), Path::to_path_buf);
        let reader = CompressedReader::new(source).map_err(|source| Error::Open { path, source })?;
        Ok(Self::from_reader_with_options(reader, options))
    }

    /// Open a local file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_source(DataSource::from_path(path))
    }
}
