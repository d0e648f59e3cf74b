//! The array region builder: a bump cursor over a block's trailing bytes.
//!
//! The construct pass hands each array slot to [`BlockCursor`] in
//! declaration order. The cursor aligns itself for the element type,
//! checks that the region fits in what the plan left, constructs the
//! elements, and moves past them.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use flexlay_core::{ElementLayout, LayoutError};

use crate::decl::ElementOps;
use crate::descriptor::Region;
use crate::error::BuildError;

/// Bump cursor over the unclaimed part of a block.
#[derive(Debug)]
pub struct BlockCursor {
    cursor: NonNull<u8>,
    remaining: usize,
}

impl BlockCursor {
    /// A cursor over `capacity` bytes starting at `start`.
    ///
    /// # Safety
    ///
    /// `[start, start + capacity)` must be writable memory inside one
    /// allocation, not otherwise in use for as long as the cursor and the
    /// regions it hands out are.
    pub unsafe fn new(start: NonNull<u8>, capacity: usize) -> Self {
        Self {
            cursor: start,
            remaining: capacity,
        }
    }

    /// Current position.
    pub fn position(&self) -> NonNull<u8> {
        self.cursor
    }

    /// Bytes not yet claimed.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Check that the regions claimed so far used exactly `planned` bytes,
    /// the trailing size computed by the plan pass for the same requests.
    pub fn finish(&self, planned: usize) -> Result<(), BuildError> {
        if self.remaining == 0 {
            return Ok(());
        }
        Err(BuildError::PlanMismatch {
            planned,
            consumed: planned.saturating_sub(self.remaining),
        })
    }

    /// Claim room for `count` elements laid out as `element`, aligned,
    /// without constructing anything. Alignment padding is filled with
    /// `padding_fill` when given.
    ///
    /// Returns the raw region, or an error if it does not fit.
    pub fn reserve(
        &mut self,
        slot: &'static str,
        element: ElementLayout,
        count: usize,
        padding_fill: Option<u8>,
    ) -> Result<Region, BuildError> {
        let padding = self.cursor.as_ptr().align_offset(element.align());
        let bytes = element.array_bytes(count).ok_or(LayoutError::Overflow)?;
        let needed = padding.checked_add(bytes).ok_or(LayoutError::Overflow)?;
        if needed > self.remaining {
            return Err(BuildError::RegionOverrun {
                slot,
                needed,
                remaining: self.remaining,
            });
        }

        // SAFETY: `padding + bytes <= remaining`, so both pointers stay
        // inside the range handed to `new`.
        let (begin, end) = unsafe {
            let begin = self.cursor.add(padding);
            (begin, begin.add(bytes))
        };
        if let Some(byte) = padding_fill {
            // SAFETY: the padding bytes lie inside the claimed range.
            unsafe { self.cursor.as_ptr().write_bytes(byte, padding) };
        }
        self.cursor = end;
        self.remaining -= needed;
        Ok(Region::new(begin, end))
    }

    /// Claim a region like [`reserve`](Self::reserve) and default-construct
    /// `count` elements in it with `ops`.
    ///
    /// # Safety
    ///
    /// `ops` and `element` must describe the same element type.
    pub unsafe fn consume(
        &mut self,
        slot: &'static str,
        element: ElementLayout,
        ops: &ElementOps,
        count: usize,
        padding_fill: Option<u8>,
    ) -> Result<Region, BuildError> {
        let region = self.reserve(slot, element, count, padding_fill)?;
        // SAFETY: the region is aligned for the element type and has room
        // for exactly `count` elements.
        unsafe { ops.init(region.begin(), count) };
        Ok(region)
    }
}
