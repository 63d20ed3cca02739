//! Bitwise alignment FLAG.
//!
//! Each predicate reads exactly one bit, so flipping any other bit never
//! changes its answer.

use std::fmt;

/// `0x1`: template has multiple segments.
pub const PAIRED: u16 = 0x1;
/// `0x2`: every segment is properly aligned.
pub const PROPER_PAIR: u16 = 0x2;
/// `0x4`: segment is unmapped.
pub const UNMAPPED: u16 = 0x4;
/// `0x8`: next segment is unmapped.
pub const MATE_UNMAPPED: u16 = 0x8;
/// `0x10`: sequence is reverse complemented.
pub const REVERSE: u16 = 0x10;
/// `0x20`: next segment is reverse complemented.
pub const MATE_REVERSE: u16 = 0x20;
/// `0x40`: first segment in the template.
pub const FIRST_SEGMENT: u16 = 0x40;
/// `0x80`: last segment in the template.
pub const LAST_SEGMENT: u16 = 0x80;
/// `0x100`: secondary alignment.
pub const SECONDARY: u16 = 0x100;
/// `0x200`: fails platform/vendor quality checks.
pub const QC_FAIL: u16 = 0x200;
/// `0x400`: PCR or optical duplicate.
pub const DUPLICATE: u16 = 0x400;
/// `0x800`: supplementary alignment.
pub const SUPPLEMENTARY: u16 = 0x800;

/// Alignment FLAG value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u16);

impl Flags {
    /// Wrap a raw FLAG value.
    pub const fn new(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw FLAG value.
    pub const fn bits(self) -> u16 {
        self.0
    }

    fn is_set(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    /// Template has multiple segments.
    pub fn is_paired(self) -> bool {
        self.is_set(PAIRED)
    }

    /// Each segment is properly aligned according to the aligner.
    pub fn is_proper_pair(self) -> bool {
        self.is_set(PROPER_PAIR)
    }

    /// Segment is mapped (bit `0x4` clear).
    pub fn is_mapped(self) -> bool {
        !self.is_set(UNMAPPED)
    }

    /// Segment is unmapped (bit `0x4` set).
    pub fn is_unmapped(self) -> bool {
        self.is_set(UNMAPPED)
    }

    /// Next segment is mapped (bit `0x8` clear).
    pub fn is_mate_mapped(self) -> bool {
        !self.is_set(MATE_UNMAPPED)
    }

    /// Sequence is reverse complemented.
    pub fn is_reverse(self) -> bool {
        self.is_set(REVERSE)
    }

    /// Next segment is reverse complemented.
    pub fn is_mate_reverse(self) -> bool {
        self.is_set(MATE_REVERSE)
    }

    /// First segment in the template.
    pub fn is_first_segment(self) -> bool {
        self.is_set(FIRST_SEGMENT)
    }

    /// Last segment in the template.
    pub fn is_last_segment(self) -> bool {
        self.is_set(LAST_SEGMENT)
    }

    /// Secondary alignment.
    pub fn is_secondary(self) -> bool {
        self.is_set(SECONDARY)
    }

    /// Fails platform/vendor quality checks.
    pub fn is_qc_fail(self) -> bool {
        self.is_set(QC_FAIL)
    }

    /// PCR or optical duplicate.
    pub fn is_duplicate(self) -> bool {
        self.is_set(DUPLICATE)
    }

    /// Supplementary alignment.
    pub fn is_supplementary(self) -> bool {
        self.is_set(SUPPLEMENTARY)
    }
}

impl From<u16> for Flags {
    fn from(bits: u16) -> Self {
        Self(bits)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
