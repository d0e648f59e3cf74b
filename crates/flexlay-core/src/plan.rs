//! The plan pass: exact region offsets from run-time element counts.
//!
//! Planning walks the slot table in declaration order over a virtual
//! address space whose origin is the block base. The running offset starts
//! at the header size; every array slot is placed at the next offset
//! aligned for its element type. No memory is touched.

use std::alloc::Layout;

use smallvec::SmallVec;

use crate::align::align_up;
use crate::error::LayoutError;
use crate::slot::{SlotKind, SlotRequest, SlotShape};

/// Placement of one array slot's elements inside the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionPlan {
    slot: usize,
    offset: usize,
    padding: usize,
    count: usize,
    bytes: usize,
}

impl RegionPlan {
    /// Index of the slot this region belongs to.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Offset of the first element from the block base.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Alignment padding inserted before the first element.
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Bytes occupied by the elements themselves.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Offset one past the last element.
    pub fn end(&self) -> usize {
        self.offset + self.bytes
    }
}

/// Result of the plan pass for one build.
///
/// The block is `header_size + trailing_bytes` bytes, aligned to the
/// largest alignment of the header and every element type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutPlan {
    header_size: usize,
    trailing_bytes: usize,
    layout: Layout,
    regions: SmallVec<[RegionPlan; 8]>,
}

impl LayoutPlan {
    /// Plan a block for a header with layout `header`, the slot table
    /// `shapes`, and one request per slot.
    ///
    /// Fails if the request table does not line up with the slots, or if
    /// any size computation overflows.
    pub fn compute<'a, I>(header: Layout, shapes: I, requests: &[SlotRequest]) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = &'a SlotShape>,
        I::IntoIter: ExactSizeIterator,
    {
        let shapes = shapes.into_iter();
        if shapes.len() != requests.len() {
            return Err(LayoutError::RequestCountMismatch {
                expected: shapes.len(),
                found: requests.len(),
            });
        }

        let header_size = header.size();
        let mut block_align = header.align();
        let mut offset = header_size;
        let mut regions = SmallVec::new();

        for (index, (shape, request)) in shapes.zip(requests).enumerate() {
            match (shape.kind, *request) {
                (SlotKind::Value, SlotRequest::Value) => {}
                (SlotKind::Array { element, .. }, SlotRequest::Array(count)) => {
                    let required = element
                        .required_bytes(count, offset)
                        .ok_or(LayoutError::Overflow)?;
                    let start = align_up(offset, element.align()).ok_or(LayoutError::Overflow)?;
                    let padding = start - offset;
                    regions.push(RegionPlan {
                        slot: index,
                        offset: start,
                        padding,
                        count,
                        bytes: required - padding,
                    });
                    offset = offset.checked_add(required).ok_or(LayoutError::Overflow)?;
                    block_align = block_align.max(element.align());
                }
                _ => return Err(LayoutError::RequestKindMismatch { slot: shape.name }),
            }
        }

        let layout = Layout::from_size_align(offset, block_align).map_err(|_| LayoutError::Overflow)?;
        Ok(Self {
            header_size,
            trailing_bytes: offset - header_size,
            layout,
            regions,
        })
    }

    /// Bytes reserved for the header.
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Bytes reserved after the header for all array regions, padding
    /// included.
    pub fn trailing_bytes(&self) -> usize {
        self.trailing_bytes
    }

    /// Total block size: `header_size + trailing_bytes`.
    pub fn block_size(&self) -> usize {
        self.layout.size()
    }

    /// Alignment the block must be allocated with.
    pub fn block_align(&self) -> usize {
        self.layout.align()
    }

    /// Layout to request from the allocator.
    pub fn block_layout(&self) -> Layout {
        self.layout
    }

    /// Region planned for array slot `slot`, if it is one.
    pub fn region(&self, slot: usize) -> Option<&RegionPlan> {
        self.regions.iter().find(|r| r.slot == slot)
    }

    /// All planned regions in declaration order.
    pub fn regions(&self) -> &[RegionPlan] {
        &self.regions
    }
}
