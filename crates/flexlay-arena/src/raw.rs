//! The raw memory boundary: the allocator trait and pointer alignment.
//!
//! A composite asks its allocator for exactly one block per build and
//! returns exactly that block, with the same layout, on teardown.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::error::Error;
use std::fmt;
use std::ptr::{self, NonNull};

/// The allocator could not satisfy a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl Error for AllocError {}

/// Source of raw blocks for composites.
///
/// # Safety
///
/// A successful `allocate(layout)` must return a pointer to at least
/// `layout.size()` writable bytes aligned to `layout.align()`, valid until
/// passed to `deallocate` with the same layout. Blocks must not overlap
/// while live.
pub unsafe trait RawAllocator {
    /// Allocate one block.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Release a block obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `self.allocate(layout)` with this exact
    /// `layout` and must not have been released already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process-wide allocator (`std::alloc`).
///
/// Zero-sized blocks never reach the global allocator: they are served
/// with a dangling, well-aligned pointer and released as a no-op.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

// SAFETY: forwards to `std::alloc`, whose contract matches ours; the
// zero-size path returns an aligned non-null pointer that is never read
// or written (no bytes belong to it).
unsafe impl RawAllocator for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return NonNull::new(ptr::without_provenance_mut(layout.align())).ok_or(AllocError);
        }
        // SAFETY: the layout has a non-zero size.
        NonNull::new(unsafe { alloc::alloc(layout) }).ok_or(AllocError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            // SAFETY: the caller guarantees `ptr` came from `allocate(layout)`,
            // which for non-zero sizes is `alloc::alloc(layout)`.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }
}

// SAFETY: forwards to `A`.
unsafe impl<A: RawAllocator + ?Sized> RawAllocator for &A {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

/// Round `ptr` up to the next address aligned to `align`.
///
/// This is [`flexlay_core::align_up`] applied to a real address. The
/// result keeps the provenance of `ptr`; it is only dereferenceable if it
/// still lies inside the allocation `ptr` points into.
///
/// # Panics
///
/// Panics if `align` is not a power of two.
pub fn align_ptr(ptr: NonNull<u8>, align: usize) -> NonNull<u8> {
    assert!(flexlay_core::is_valid_alignment(align), "alignment must be a power of two");
    let pad = ptr.as_ptr().align_offset(align);
    let aligned = ptr.as_ptr().wrapping_add(pad);
    // A non-null address rounded up within the address space stays non-null;
    // should it wrap, fall back to the (unaligned) input instead of null.
    NonNull::new(aligned).unwrap_or(ptr)
}
