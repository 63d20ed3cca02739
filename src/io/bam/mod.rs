//! Streaming BAM record codec.
//!
//! Records are read one at a time into a reused buffer, decoded lazily through
//! a zero-copy [`RecordView`], projected into caller-owned [`FieldValues`] on
//! demand, and optionally re-encoded to any number of destinations with
//! selected tags removed.
//!
//! # Layers
//!
//! - **Codecs**: [`cigar`], [`sequence`], [`tags`] and [`flags`] decode and
//!   encode the individual record regions.
//! - **Header**: [`header`] reads and writes the binary framing;
//!   [`sam_header`] models the `@`-line text (singleton `@HD`, keyed groups,
//!   comments, mapping program guess).
//! - **Records**: [`record`] validates a raw buffer once and exposes typed
//!   accessors; [`fields`] projects the requested subset; [`builder`]
//!   assembles raw records from owned values.
//! - **Channels**: [`reader`] frames header and records on a byte channel;
//!   [`writer`] re-encodes records; [`outputs`] keeps one writer per
//!   destination with header-once semantics.
//! - **Driver**: [`stream`] ties it together as a pull-based state machine.
//!
//! # Memory
//!
//! One record buffer, one scratch buffer per destination and the reused
//! strings inside [`FieldValues`]. Memory does not grow with stream length.
//!
//! # Example
//!
//! ```no_run
//! use alnstream::io::bam::{AlignmentStream, FieldValues};
//! use alnstream::io::DataSink;
//!
//! # fn main() -> alnstream::Result<()> {
//! let mut stream = AlignmentStream::from_path("alignments.bam")?;
//! stream.set_fields(&["QNAME", "RNAME", "POS", "CIGAR"]);
//! stream.set_excluded_tags(&["OQ", "XA"]);
//!
//! let sink = DataSink::from_path("slim.bam");
//! let mut values = FieldValues::new();
//! while stream.advance(&mut values)? {
//!     for (field, value) in values.iter() {
//!         print!("{}={}\t", field, value);
//!     }
//!     println!();
//!     stream.write(&sink)?;
//! }
//! stream.close()?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cigar;
pub mod error;
pub mod fields;
pub mod flags;
pub mod header;
pub mod outputs;
pub mod reader;
pub mod record;
pub mod sam_header;
pub mod sequence;
pub mod stream;
pub mod tags;
pub mod writer;

// Re-export main types for convenience
pub use builder::RecordBuilder;
pub use cigar::{parse_cigar, Cigar, CigarOp};
pub use error::{BamDecodeError, DecodeResult};
pub use fields::{project, Field, FieldValue, FieldValues};
pub use flags::Flags;
pub use header::{Header, Reference};
pub use outputs::Outputs;
pub use reader::{BamChannel, HeaderFraming};
pub use record::RecordView;
pub use sam_header::{HeaderEntry, HeaderGroup, ProgramGuess, SamHeader};
pub use sequence::decode_sequence;
pub use stream::{AlignmentStream, CloseSummary, StreamOptions, StreamState};
pub use tags::{ArrayValue, Tag, TagKey, TagValue, Tags};
pub use writer::{encode_record, BamWriter};
