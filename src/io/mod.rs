//! I/O module: byte channels, output destinations and the BAM codec
//!
//! Input and output are strictly sequential; memory stays constant
//! regardless of stream length.

pub mod bam;
pub mod compression;
pub mod sink;

pub use compression::{CompressedReader, CompressedWriter, DataSource};
pub use sink::DataSink;
