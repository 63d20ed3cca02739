//! alnstream: streaming BAM record codec
//!
//! # Overview
//!
//! alnstream reads alignment records one at a time, decodes only the fields a
//! caller asks for, and re-writes selected records to any number of outputs
//! with chosen optional tags stripped.
//!
//! ## Key Features
//!
//! - **Streaming**: one reused record buffer, constant memory
//! - **Projection**: zero-copy record view; fields decoded on request
//! - **Re-encoding**: tag exclusion without touching the rest of the record
//! - **Transparent compression**: gzip/BGZF input detection, BGZF output
//!
//! ## Quick Start
//!
//! ```no_run
//! use alnstream::{AlignmentStream, FieldValues};
//!
//! # fn main() -> alnstream::Result<()> {
//! let mut stream = AlignmentStream::from_path("alignments.bam")?;
//! stream.set_fields(&["QNAME", "MAPPED_SEQ_LENGTH", "NM"]);
//!
//! let mut values = FieldValues::new();
//! while stream.advance(&mut values)? {
//!     // Process one record at a time
//! }
//! stream.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`io::bam`]: header model, codecs, record view, projection, stream
//! - [`io::compression`]: input/output byte channels
//! - [`error`]: crate-level error type

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod io;

// Re-export commonly used types
pub use error::{Error, Result};
pub use io::bam::{AlignmentStream, Field, FieldValue, FieldValues, Header};
pub use io::{DataSink, DataSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
