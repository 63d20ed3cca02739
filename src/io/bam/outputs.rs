//! Per-destination output state.
//!
//! Each [`DataSink`] maps to one open [`BamWriter`] and a `header_written`
//! flag. A destination is opened the first time a record is routed to it, the
//! header goes out exactly once, and every destination is finished together.
//!
//! Local paths are keyed after making them absolute and dropping `.`
//! components, so `out.bam` and `./out.bam` share one writer. `..` and
//! symlinks are not resolved.

use super::header::Header;
use super::record::RecordView;
use super::tags::TagKey;
use super::writer::BamWriter;
use crate::error::{Error, Result};
use crate::io::compression::CompressedWriter;
use crate::io::DataSink;
use flate2::Compression;
use log::{debug, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Component, PathBuf};

/// Key under which `sink` is tracked.
fn destination_key(sink: &DataSink) -> DataSink {
    match sink {
        DataSink::Local(path) => {
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                match std::env::current_dir() {
                    Ok(dir) => dir.join(path),
                    Err(_) => path.clone(),
                }
            };
            DataSink::Local(
                absolute
                    .components()
                    .filter(|c| !matches!(c, Component::CurDir))
                    .collect(),
            )
        }
        DataSink::Stdout => DataSink::Stdout,
    }
}

/// One open output channel.
pub struct Destination {
    writer: BamWriter<CompressedWriter>,
    header_written: bool,
}

impl Destination {
    fn open(sink: &DataSink, level: Compression) -> Result<Self> {
        let writer = CompressedWriter::with_level(sink.clone(), level).map_err(|source| {
            Error::Open {
                path: match sink {
                    DataSink::Local(path) => path.clone(),
                    DataSink::Stdout => PathBuf::from("<stdout>"),
                },
                source,
            }
        })?;
        Ok(Self {
            writer: BamWriter::new(writer),
            header_written: false,
        })
    }

    /// Whether the header has gone out on this channel.
    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Records written so far.
    pub fn records_written(&self) -> usize {
        self.writer.records_written()
    }
}

/// Output destinations keyed by sink identity.
pub struct Outputs {
    destinations: HashMap<DataSink, Destination>,
    level: Compression,
}

impl Outputs {
    /// Create an empty set of destinations.
    pub fn new(level: Compression) -> Self {
        Self {
            destinations: HashMap::new(),
            level,
        }
    }

    /// Write `view` to `sink` without the `excluded` tags.
    ///
    /// Opens `sink` and writes `header` on first use. The header is flushed
    /// straight away; if that fails the destination is dropped, so a later
    /// write reopens the sink from scratch rather than appending to a partial
    /// header.
    pub fn write(
        &mut self,
        sink: &DataSink,
        header: &Header,
        view: &RecordView<'_>,
        excluded: &[TagKey],
    ) -> Result<()> {
        let key = destination_key(sink);
        let destination = match self.destinations.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Opening output destination {}", sink);
                entry.insert(Destination::open(sink, self.level)?)
            }
        };

        if !destination.header_written {
            let sent = destination
                .writer
                .write_header(header)
                .and_then(|()| destination.writer.flush());
            if let Err(e) = sent {
                warn!("Header write to {} failed, dropping destination", sink);
                self.destinations.remove(&key);
                return Err(Error::Io(e));
            }
            destination.header_written = true;
        }
        destination.writer.write_view(view, excluded)?;
        Ok(())
    }

    /// State of `sink`, if it has been opened.
    pub fn get(&self, sink: &DataSink) -> Option<&Destination> {
        self.destinations.get(&destination_key(sink))
    }

    /// Number of open destinations.
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    /// Whether no destination has been opened.
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Finish every destination, returning how many were finished.
    ///
    /// All destinations are finished even if one fails; the first error is
    /// returned.
    pub fn finish_all(&mut self) -> Result<usize> {
        let mut finished = 0;
        let mut first_error = None;

        for (sink, destination) in self.destinations.drain() {
            let records = destination.records_written();
            match destination.writer.finish() {
                Ok(()) => {
                    debug!("Finished {}: {} records", sink, records);
                    finished += 1;
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(Error::Io(e)),
            None => Ok(finished),
        }
    }
}
