//! Error types for alnstream

use crate::io::bam::error::BamDecodeError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for alnstream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while streaming alignment records
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on an already-open channel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header or record could not be decoded
    #[error(transparent)]
    Decode(#[from] BamDecodeError),

    /// The input channel could not be established
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        /// Location that failed to open
        path: PathBuf,
        /// Underlying cause
        source: std::io::Error,
    },

    /// A write was requested before any record was decoded
    #[error("No decoded record to write: call advance() before write()")]
    WriteBeforeDecode,
}
