//! Output destinations for streaming writes
//!
//! `DataSink` is the write counterpart to `DataSource`. It identifies a
//! destination; opening it is left to
//! [`CompressedWriter`](crate::io::compression::CompressedWriter). Sinks are
//! hashable so they can key per-destination state.
//!
//! # Example
//!
//! ```
//! use alnstream::io::DataSink;
//!
//! // Write to local file
//! let sink = DataSink::from_path("filtered.bam");
//! assert!(sink.is_compressed());
//!
//! // Write to stdout
//! let sink = DataSink::stdout();
//! assert!(!sink.is_compressed());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

/// Output destination for streaming writes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataSink {
    /// Write to a local file path
    ///
    /// Compression format is auto-detected from file extension:
    /// - `.bam`, `.bgz` → BGZF
    /// - `.gz` → gzip
    /// - other → uncompressed
    Local(PathBuf),

    /// Write to standard output, uncompressed
    Stdout,
}

impl DataSink {
    /// Create a sink from a file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self::Local(path.as_ref().to_path_buf())
    }

    /// Create a sink for standard output
    pub fn stdout() -> Self {
        Self::Stdout
    }

    /// Get the file extension if this is a local file sink
    pub(crate) fn extension(&self) -> Option<&str> {
        match self {
            Self::Local(path) => path.extension().and_then(|s| s.to_str()),
            Self::Stdout => None,
        }
    }

    /// Check if this sink represents a compressed output
    pub fn is_compressed(&self) -> bool {
        matches!(self.extension(), Some("bam") | Some("bgz") | Some("gz"))
    }
}

impl fmt::Display for DataSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Stdout => f.write_str("<stdout>"),
        }
    }
}
