//! BAM decoding error types.
//!
//! Every failure while framing, decoding or re-encoding a record maps to one
//! variant here so callers can tell a truncated stream from an unsupported tag
//! type or a corrupt header without string matching.

use std::{error, fmt, io, str};

/// Errors that can occur during BAM decoding.
///
/// # Example
///
/// ```
/// use alnstream::io::bam::error::BamDecodeError;
///
/// fn describe(err: &BamDecodeError) -> String {
///     match err {
///         BamDecodeError::InvalidTagType { tag, type_code } => format!(
///             "{}{} uses unsupported type {}",
///             tag[0] as char, tag[1] as char, *type_code as char
///         ),
///         other => other.to_string(),
///     }
/// }
/// ```
#[derive(Debug)]
pub enum BamDecodeError {
    /// I/O error occurred during reading
    Io(io::Error),

    /// Stream does not start with `BAM\1`
    InvalidMagic {
        /// The actual bytes found
        actual: [u8; 4],
    },

    /// Header framing or text is unusable
    InvalidHeader {
        /// Description of the problem
        message: String,
    },

    /// Reference ID is neither -1 nor a valid dictionary index
    InvalidReferenceId {
        /// The offending value
        value: i32,
        /// "read" or "mate"
        field: &'static str,
    },

    /// Read name length of zero
    InvalidReadNameLength {
        /// The invalid length value
        length: u8,
        /// Offset in the record
        offset: usize,
    },

    /// String field without its NUL terminator
    MissingNulTerminator {
        /// Which field was missing the terminator
        field: &'static str,
        /// Offset in the record
        offset: usize,
    },

    /// Invalid UTF-8 in a text field
    InvalidUtf8 {
        /// Which field had invalid UTF-8
        field: &'static str,
        /// The underlying UTF-8 error
        source: str::Utf8Error,
    },

    /// Declared block size disagrees with the bytes present
    BlockSizeMismatch {
        /// Block size from the record prefix
        declared: usize,
        /// Bytes actually available after the prefix
        actual: usize,
    },

    /// A length field is negative
    NegativeLength {
        /// Which field
        field: &'static str,
        /// The negative value
        value: i32,
    },

    /// Not enough bytes for the declared layout
    UnexpectedEof {
        /// What was being decoded
        context: &'static str,
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Tag type code outside `AcCsSiIfZHB`
    InvalidTagType {
        /// Tag name
        tag: [u8; 2],
        /// The unsupported type code
        type_code: u8,
    },

    /// Array subtype outside `cCsSiIf`
    InvalidArraySubtype {
        /// Tag name
        tag: [u8; 2],
        /// The invalid subtype code
        subtype: u8,
    },

    /// CIGAR operation code above 8
    InvalidCigarOp {
        /// The invalid operation code
        value: u32,
    },
}

impl error::Error for BamDecodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InvalidUtf8 { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for BamDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),

            Self::InvalidMagic { actual } => {
                write!(
                    f,
                    "Invalid BAM magic bytes: expected [BAM\\x01], got {:?}",
                    actual
                )
            }

            Self::InvalidHeader { message } => write!(f, "Invalid header: {}", message),

            Self::InvalidReferenceId { value, field } => {
                write!(f, "Invalid {} reference ID: {}", field, value)
            }

            Self::InvalidReadNameLength { length, offset } => {
                write!(
                    f,
                    "Invalid read name length at offset {}: {} (must be >= 1)",
                    offset, length
                )
            }

            Self::MissingNulTerminator { field, offset } => {
                write!(f, "Missing NUL terminator in {} at offset {}", field, offset)
            }

            Self::InvalidUtf8 { field, source } => {
                write!(f, "Invalid UTF-8 in {}: {}", field, source)
            }

            Self::BlockSizeMismatch { declared, actual } => {
                write!(
                    f,
                    "Record block size {} does not match {} bytes present",
                    declared, actual
                )
            }

            Self::NegativeLength { field, value } => {
                write!(f, "Invalid negative {}: {}", field, value)
            }

            Self::UnexpectedEof {
                context,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Unexpected end of data while decoding {}: expected {} bytes, got {}",
                    context, expected, actual
                )
            }

            Self::InvalidTagType { tag, type_code } => {
                write!(
                    f,
                    "Unsupported tag type for {}{}: {:?}",
                    tag[0] as char, tag[1] as char, *type_code as char
                )
            }

            Self::InvalidArraySubtype { tag, subtype } => {
                write!(
                    f,
                    "Invalid array subtype for {}{}: {:?}",
                    tag[0] as char, tag[1] as char, *subtype as char
                )
            }

            Self::InvalidCigarOp { value } => {
                write!(f, "Invalid CIGAR operation: {}", value)
            }
        }
    }
}

impl From<io::Error> for BamDecodeError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<BamDecodeError> for io::Error {
    fn from(e: BamDecodeError) -> Self {
        match e {
            BamDecodeError::Io(io_err) => io_err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Result alias used by the codec layer.
pub type DecodeResult<T> = std::result::Result<T, BamDecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_tag_type() {
        let err = BamDecodeError::InvalidTagType {
            tag: *b"XQ",
            type_code: b'q',
        };
        assert_eq!(err.to_string(), "Unsupported tag type for XQ: 'q'");
    }

    #[test]
    fn test_into_io_error_keeps_kind() {
        let err: io::Error = BamDecodeError::InvalidCigarOp { value: 9 }.into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let inner = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        let err: io::Error = BamDecodeError::Io(inner).into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
