//! The owning handle: accessors and teardown.
//!
//! A [`FlexBox`] owns one block holding a header `H` followed by its
//! trailing regions. The header never moves: adjacent slots locate their
//! elements relative to the header's own address, so the handle hands out
//! `&H` but never `&mut H`, and neither the handle nor `H` can be cloned.
//! Dropping the handle destroys every element that needs drop, then the
//! header, then releases the block.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::slice;

use flexlay_core::{ArrayKind, SlotKind};
use tracing::trace;

use crate::decl::{FlexLayout, Slot};
use crate::descriptor::{element_count, ArrayDescriptor, BoundedDescriptor};
use crate::raw::{align_ptr, Global, RawAllocator};

/// Unique owner of a built composite.
pub struct FlexBox<H: FlexLayout, A: RawAllocator = Global> {
    pub(crate) ptr: NonNull<H>,
    pub(crate) layout: Layout,
    pub(crate) alloc: A,
    pub(crate) _owns: PhantomData<H>,
}

impl<H: FlexLayout, A: RawAllocator> FlexBox<H, A> {
    /// The header, with value slots and array descriptors as plain fields.
    pub fn header(&self) -> &H {
        // SAFETY: the header was written at the block start during the
        // build and stays initialised until drop.
        unsafe { self.ptr.as_ref() }
    }

    /// Address of the header (and of the block).
    pub fn as_ptr(&self) -> *const H {
        self.ptr.as_ptr()
    }

    /// Layout of the whole block, as handed to the allocator.
    pub fn block_layout(&self) -> Layout {
        self.layout
    }

    /// The allocator that owns the block.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// First element of an array slot.
    ///
    /// Stored for `Sized`/`Unsized` slots; for adjacent slots computed from
    /// the current header address (or the anchor's end) on every call.
    pub fn begin<D: ArrayDescriptor>(&self, slot: Slot<H, D>) -> NonNull<D::Element> {
        debug_assert_eq!(slot.decl().shape().array_kind(), Some(D::KIND));
        self.slot_begin(slot.index()).cast()
    }

    /// One past the last element of a slot that stores its end.
    pub fn end<D: BoundedDescriptor>(&self, slot: Slot<H, D>) -> NonNull<D::Element> {
        debug_assert_eq!(slot.decl().shape().array_kind(), Some(D::KIND));
        self.slot_end(slot.index()).cast()
    }

    /// Number of elements in a slot that stores its end.
    pub fn len<D: BoundedDescriptor>(&self, slot: Slot<H, D>) -> usize {
        element_count(self.begin(slot), self.end(slot))
    }

    /// The elements of a slot that stores its end.
    pub fn as_slice<D: BoundedDescriptor>(&self, slot: Slot<H, D>) -> &[D::Element] {
        let len = self.len(slot);
        // SAFETY: `[begin, end)` holds `len` initialised elements owned by
        // this block; `&self` keeps them alive and unaliased by `&mut`.
        unsafe { slice::from_raw_parts(self.begin(slot).as_ptr(), len) }
    }

    /// The elements of a slot that stores its end, mutably.
    pub fn as_mut_slice<D: BoundedDescriptor>(&mut self, slot: Slot<H, D>) -> &mut [D::Element] {
        let len = self.len(slot);
        // SAFETY: as for `as_slice`; `&mut self` makes the access unique.
        unsafe { slice::from_raw_parts_mut(self.begin(slot).as_ptr(), len) }
    }

    /// The first `len` elements of any array slot.
    ///
    /// For slots without a stored end the length has to come from the
    /// caller's own bookkeeping.
    ///
    /// # Safety
    ///
    /// `len` must not exceed the count the slot was built with.
    pub unsafe fn slice_with_len<D: ArrayDescriptor>(&self, slot: Slot<H, D>, len: usize) -> &[D::Element] {
        // SAFETY: the caller bounds `len` by the built count.
        unsafe { slice::from_raw_parts(self.begin(slot).as_ptr(), len) }
    }

    /// Mutable counterpart of [`slice_with_len`](Self::slice_with_len).
    ///
    /// # Safety
    ///
    /// `len` must not exceed the count the slot was built with.
    pub unsafe fn slice_with_len_mut<D: ArrayDescriptor>(
        &mut self,
        slot: Slot<H, D>,
        len: usize,
    ) -> &mut [D::Element] {
        // SAFETY: the caller bounds `len` by the built count.
        unsafe { slice::from_raw_parts_mut(self.begin(slot).as_ptr(), len) }
    }

    /// Tear a composite down. `None` is a no-op.
    ///
    /// Equivalent to dropping the handle.
    pub fn destroy(this: Option<Self>) {
        drop(this);
    }

    pub(crate) fn slot_begin(&self, index: usize) -> NonNull<u8> {
        let shape = H::SLOTS[index].shape();
        let SlotKind::Array {
            kind,
            anchor,
            element,
        } = shape.kind
        else {
            panic!("slot '{}' is not an array slot", shape.name);
        };
        if kind.stores_begin() {
            return self.read_word(shape.field_offset);
        }
        let after = match anchor {
            Some(anchor) => self.slot_end(anchor),
            None => self.header_end(),
        };
        align_ptr(after, element.align())
    }

    pub(crate) fn slot_end(&self, index: usize) -> NonNull<u8> {
        let shape = H::SLOTS[index].shape();
        match shape.array_kind() {
            Some(ArrayKind::Sized) => self.read_word(shape.field_offset + mem::size_of::<NonNull<u8>>()),
            Some(ArrayKind::AdjacentSized) => self.read_word(shape.field_offset),
            _ => panic!("slot '{}' does not store an end address", shape.name),
        }
    }

    fn read_word(&self, offset: usize) -> NonNull<u8> {
        // SAFETY: the slot table puts a pointer-aligned descriptor word at
        // `offset` inside the initialised header (`FlexLayout` contract;
        // offsets re-checked by `LAYOUT_CHECK`).
        unsafe { self.ptr.cast::<u8>().add(offset).cast::<NonNull<u8>>().read() }
    }

    fn header_end(&self) -> NonNull<u8> {
        // SAFETY: the block is at least `size_of::<H>()` bytes long.
        unsafe { self.ptr.cast::<u8>().add(mem::size_of::<H>()) }
    }
}

impl<H: FlexLayout, A: RawAllocator> Deref for FlexBox<H, A> {
    type Target = H;

    fn deref(&self) -> &H {
        self.header()
    }
}

/// Returns the block to its allocator, even if an element's drop panics.
struct ReleaseBlock<'a, A: RawAllocator> {
    alloc: &'a A,
    block: NonNull<u8>,
    layout: Layout,
}

impl<A: RawAllocator> Drop for ReleaseBlock<'_, A> {
    fn drop(&mut self) {
        // SAFETY: the block came from `alloc.allocate(layout)` during the
        // build and is released exactly once, here.
        unsafe { self.alloc.deallocate(self.block, self.layout) }
    }
}

impl<H: FlexLayout, A: RawAllocator> Drop for FlexBox<H, A> {
    fn drop(&mut self) {
        let _release = ReleaseBlock {
            alloc: &self.alloc,
            block: self.ptr.cast(),
            layout: self.layout,
        };

        for (index, decl) in H::SLOTS.iter().enumerate() {
            let (Some(ops), Some(element)) = (decl.ops(), decl.shape().element()) else {
                continue;
            };
            if !ops.needs_drop() {
                continue;
            }
            let begin = self.slot_begin(index);
            let end = self.slot_end(index);
            let count = (end.as_ptr() as usize - begin.as_ptr() as usize) / element.size();
            // SAFETY: the region holds `count` elements constructed during
            // the build; nothing reads them after this point.
            unsafe { ops.drop_in_place(begin, count) };
        }

        // SAFETY: the header is initialised and dropped exactly once.
        unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };
        trace!(size = self.layout.size(), "destroyed composite block");
    }
}

impl<H: FlexLayout, A: RawAllocator> fmt::Debug for FlexBox<H, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlexBox")
            .field("ptr", &self.ptr)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

// SAFETY: the handle owns the block exclusively; the header carries the
// element types' auto traits through its descriptors.
unsafe impl<H: FlexLayout + Send, A: RawAllocator + Send> Send for FlexBox<H, A> {}
// SAFETY: `&FlexBox` only gives shared access to the header and elements.
unsafe impl<H: FlexLayout + Sync, A: RawAllocator + Sync> Sync for FlexBox<H, A> {}
