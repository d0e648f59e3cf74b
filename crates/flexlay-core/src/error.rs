//! Layout planning and validation errors.

use std::error::Error;
use std::fmt;

/// Errors found while validating a slot table or planning a block.
///
/// Every variant is `Copy` and carries only static data so that the
/// validator can return it from `const fn` code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// Offset or size arithmetic overflowed, or the block exceeds the
    /// largest size the platform allocator accepts.
    Overflow,
    /// The number of build requests does not match the number of slots.
    RequestCountMismatch {
        /// Number of declared slots.
        expected: usize,
        /// Number of requests supplied.
        found: usize,
    },
    /// A value slot received an element count, or an array slot did not.
    RequestKindMismatch {
        /// The offending slot.
        slot: &'static str,
    },
    /// An element alignment is not a power of two.
    InvalidAlignment {
        /// The offending slot.
        slot: &'static str,
        /// The rejected alignment.
        align: usize,
    },
    /// Array elements must occupy at least one byte so that `end - begin`
    /// recovers the element count.
    ZeroSizedElement {
        /// The offending slot.
        slot: &'static str,
    },
    /// An end-less (`Unsized`) slot was declared for an element type that
    /// needs its destructor run.
    UnsizedNeedsDrop {
        /// The offending slot.
        slot: &'static str,
    },
    /// A slot that stores its own begin address also names an anchor.
    AnchorOnStoredKind {
        /// The offending slot.
        slot: &'static str,
    },
    /// A header-adjacent slot is not the first array slot.
    HeaderAdjacentNotFirst {
        /// The offending slot.
        slot: &'static str,
    },
    /// An anchored slot does not name the array slot immediately before it.
    AnchorNotPredecessor {
        /// The offending slot.
        slot: &'static str,
        /// Index of the named anchor.
        anchor: usize,
    },
    /// The anchor slot does not store an end address.
    AnchorWithoutEnd {
        /// The offending slot.
        slot: &'static str,
        /// Index of the named anchor.
        anchor: usize,
    },
    /// A slot's field is not where declaration order puts it in the header.
    FieldOffsetMismatch {
        /// The offending slot.
        slot: &'static str,
        /// Offset implied by declaration order.
        expected: usize,
        /// Offset reported for the field.
        found: usize,
    },
    /// The header type's size differs from the sum of its declared slots
    /// (plus padding), i.e. it carries undeclared fields.
    HeaderSizeMismatch {
        /// Size implied by the slot table.
        expected: usize,
        /// Actual size of the header type.
        found: usize,
    },
}

impl LayoutError {
    /// Short static description, usable from `const` panics.
    pub const fn summary(&self) -> &'static str {
        match self {
            Self::Overflow => "layout size overflows the address space",
            Self::RequestCountMismatch { .. } => "build request count differs from slot count",
            Self::RequestKindMismatch { .. } => "build request kind differs from slot kind",
            Self::InvalidAlignment { .. } => "element alignment is not a power of two",
            Self::ZeroSizedElement { .. } => "array slots cannot hold zero-sized elements",
            Self::UnsizedNeedsDrop { .. } => {
                "unsized array slots cannot hold elements that need drop"
            }
            Self::AnchorOnStoredKind { .. } => "only adjacent array slots may name an anchor",
            Self::HeaderAdjacentNotFirst { .. } => {
                "a header-adjacent array slot must be the first array slot"
            }
            Self::AnchorNotPredecessor { .. } => {
                "an anchored slot must follow its anchor array slot directly"
            }
            Self::AnchorWithoutEnd { .. } => "an anchor slot must store its end address",
            Self::FieldOffsetMismatch { .. } => "header field order differs from slot order",
            Self::HeaderSizeMismatch { .. } => "header type has fields beyond its declared slots",
        }
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => f.write_str(self.summary()),
            Self::RequestCountMismatch { expected, found } => {
                write!(f, "expected {expected} build requests, got {found}")
            }
            Self::RequestKindMismatch { slot } => {
                write!(f, "slot '{slot}': {}", self.summary())
            }
            Self::InvalidAlignment { slot, align } => {
                write!(f, "slot '{slot}': alignment {align} is not a power of two")
            }
            Self::ZeroSizedElement { slot }
            | Self::UnsizedNeedsDrop { slot }
            | Self::AnchorOnStoredKind { slot }
            | Self::HeaderAdjacentNotFirst { slot } => {
                write!(f, "slot '{slot}': {}", self.summary())
            }
            Self::AnchorNotPredecessor { slot, anchor } | Self::AnchorWithoutEnd { slot, anchor } => {
                write!(f, "slot '{slot}' (anchor {anchor}): {}", self.summary())
            }
            Self::FieldOffsetMismatch {
                slot,
                expected,
                found,
            } => {
                write!(
                    f,
                    "slot '{slot}': field at offset {found}, declaration order implies {expected}"
                )
            }
            Self::HeaderSizeMismatch { expected, found } => {
                write!(
                    f,
                    "header is {found} bytes but its slots account for {expected} bytes"
                )
            }
        }
    }
}

impl Error for LayoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_slot() {
        let err = LayoutError::ZeroSizedElement { slot: "markers" };
        assert!(err.to_string().contains("markers"));
    }

    #[test]
    fn header_mismatch_reports_both_sizes() {
        let err = LayoutError::HeaderSizeMismatch {
            expected: 16,
            found: 24,
        };
        let msg = err.to_string();
        assert!(msg.contains("16"));
        assert!(msg.contains("24"));
    }
}
