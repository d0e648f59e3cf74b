//! Build errors.

use std::alloc::Layout;
use std::error::Error;
use std::fmt;

use flexlay_core::LayoutError;

/// Errors that can occur while building a composite.
///
/// `AllocationFailed` and `TooLarge` are the only ones a caller can cause
/// with valid input. `RegionOverrun` and `PlanMismatch` mean the plan pass
/// and the construct pass disagreed, which is a defect in the layout
/// arithmetic rather than a caller problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// The slot table or the requests could not be planned.
    Layout(LayoutError),
    /// The raw allocator returned no memory.
    AllocationFailed {
        /// The block layout that was requested.
        layout: Layout,
    },
    /// The planned block exceeds `BuildConfig::max_block_bytes`.
    TooLarge {
        /// Planned block size in bytes.
        requested: usize,
        /// Configured cap in bytes.
        limit: usize,
    },
    /// A region did not fit in the bytes left by the plan.
    RegionOverrun {
        /// The slot being constructed.
        slot: &'static str,
        /// Bytes the region needed, padding included.
        needed: usize,
        /// Bytes still unclaimed in the block.
        remaining: usize,
    },
    /// Construction consumed a different number of bytes than planned.
    PlanMismatch {
        /// Trailing bytes reserved by the plan pass.
        planned: usize,
        /// Trailing bytes consumed by the construct pass.
        consumed: usize,
    },
}

impl BuildError {
    /// Whether this error signals a layout arithmetic defect.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::RegionOverrun { .. } | Self::PlanMismatch { .. })
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layout(err) => write!(f, "invalid layout: {err}"),
            Self::AllocationFailed { layout } => {
                write!(
                    f,
                    "allocation of {} bytes (align {}) failed",
                    layout.size(),
                    layout.align()
                )
            }
            Self::TooLarge { requested, limit } => {
                write!(f, "block of {requested} bytes exceeds the {limit} byte limit")
            }
            Self::RegionOverrun {
                slot,
                needed,
                remaining,
            } => {
                write!(
                    f,
                    "slot '{slot}' needs {needed} bytes but only {remaining} remain in the block"
                )
            }
            Self::PlanMismatch { planned, consumed } => {
                write!(
                    f,
                    "construction consumed {consumed} trailing bytes, plan reserved {planned}"
                )
            }
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Layout(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LayoutError> for BuildError {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}
