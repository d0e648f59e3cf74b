//! Test utilities for flexlay development.
//!
//! Provides a [`CountingAllocator`] that records every block it hands out
//! (and can be told to refuse the next one), and a [`Tracked`] element
//! type that counts constructions and drops and can be told to panic
//! during construction.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flexlay_arena::{AllocError, Global, RawAllocator};

#[derive(Debug, Default)]
struct AllocStats {
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    outstanding_bytes: AtomicUsize,
    fail_next: AtomicBool,
    last_layout: Mutex<Option<Layout>>,
}

/// Allocator wrapper over [`Global`] that keeps statistics.
///
/// Clones share the same counters, so a test can keep one clone and hand
/// the other to the code under test.
#[derive(Clone, Debug, Default)]
pub struct CountingAllocator {
    stats: Arc<AllocStats>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful allocations so far.
    pub fn allocations(&self) -> usize {
        self.stats.allocations.load(Ordering::SeqCst)
    }

    pub fn deallocations(&self) -> usize {
        self.stats.deallocations.load(Ordering::SeqCst)
    }

    /// Blocks allocated and not yet released.
    pub fn outstanding_blocks(&self) -> usize {
        self.allocations() - self.deallocations()
    }

    pub fn outstanding_bytes(&self) -> usize {
        self.stats.outstanding_bytes.load(Ordering::SeqCst)
    }

    /// Layout of the most recent allocation request, successful or not.
    pub fn last_layout(&self) -> Option<Layout> {
        *self.stats.last_layout.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next allocation request fail.
    pub fn fail_next(&self) {
        self.stats.fail_next.store(true, Ordering::SeqCst);
    }
}

// SAFETY: delegates to `Global`, which upholds the contract.
#[allow(unsafe_code)]
unsafe impl RawAllocator for CountingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        *self.stats.last_layout.lock().unwrap_or_else(|e| e.into_inner()) = Some(layout);
        if self.stats.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AllocError);
        }
        let block = Global.allocate(layout)?;
        self.stats.allocations.fetch_add(1, Ordering::SeqCst);
        self.stats.outstanding_bytes.fetch_add(layout.size(), Ordering::SeqCst);
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.stats.deallocations.fetch_add(1, Ordering::SeqCst);
        self.stats.outstanding_bytes.fetch_sub(layout.size(), Ordering::SeqCst);
        // SAFETY: forwarded caller contract; the block came from `Global`.
        unsafe { Global.deallocate(ptr, layout) }
    }
}

thread_local! {
    static CONSTRUCTED: Cell<usize> = const { Cell::new(0) };
    static DROPPED: Cell<usize> = const { Cell::new(0) };
    static PANIC_AT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Element type with observable construction and destruction.
///
/// Counters are per thread, which keeps parallel tests independent. Call
/// [`Tracked::reset`] at the start of each test.
#[derive(Debug, PartialEq, Eq)]
pub struct Tracked {
    pub serial: usize,
}

impl Tracked {
    /// Zero the counters and clear any pending panic.
    pub fn reset() {
        CONSTRUCTED.with(|c| c.set(0));
        DROPPED.with(|c| c.set(0));
        PANIC_AT.with(|c| c.set(None));
    }

    pub fn constructed() -> usize {
        CONSTRUCTED.with(Cell::get)
    }

    pub fn dropped() -> usize {
        DROPPED.with(Cell::get)
    }

    /// Elements constructed and not yet dropped.
    pub fn live() -> usize {
        Self::constructed() - Self::dropped()
    }

    /// Panic in `Default` once `n` more elements have been constructed.
    pub fn panic_after(n: usize) {
        PANIC_AT.with(|c| c.set(Some(Self::constructed() + n)));
    }
}

impl Default for Tracked {
    fn default() -> Self {
        let serial = Self::constructed();
        if PANIC_AT.with(Cell::get) == Some(serial) {
            PANIC_AT.with(|c| c.set(None));
            panic!("Tracked construction #{serial} failed");
        }
        CONSTRUCTED.with(|c| c.set(serial + 1));
        Self { serial }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        DROPPED.with(|c| c.set(c.get() + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_allocator_tracks_blocks() {
        let alloc = CountingAllocator::new();
        let layout = Layout::from_size_align(24, 8).unwrap();
        let block = alloc.allocate(layout).unwrap();
        assert_eq!(alloc.outstanding_blocks(), 1);
        assert_eq!(alloc.outstanding_bytes(), 24);
        assert_eq!(alloc.last_layout(), Some(layout));
        #[allow(unsafe_code)]
        // SAFETY: allocated above with the same layout.
        unsafe {
            alloc.clone().deallocate(block, layout)
        };
        assert_eq!(alloc.outstanding_blocks(), 0);
        assert_eq!(alloc.outstanding_bytes(), 0);
    }

    #[test]
    fn fail_next_refuses_once() {
        let alloc = CountingAllocator::new();
        let layout = Layout::from_size_align(8, 8).unwrap();
        alloc.fail_next();
        assert_eq!(alloc.allocate(layout), Err(AllocError));
        assert_eq!(alloc.allocations(), 0);
        let block = alloc.allocate(layout).unwrap();
        #[allow(unsafe_code)]
        // SAFETY: allocated above with the same layout.
        unsafe {
            alloc.deallocate(block, layout)
        };
    }

    #[test]
    fn tracked_counts_and_panics_on_request() {
        Tracked::reset();
        let a = Tracked::default();
        let b = Tracked::default();
        assert_eq!((a.serial, b.serial), (0, 1));
        drop(a);
        assert_eq!(Tracked::live(), 1);

        Tracked::panic_after(1);
        let _c = Tracked::default();
        let result = std::panic::catch_unwind(Tracked::default);
        assert!(result.is_err());
        assert_eq!(Tracked::constructed(), 3);
        drop(b);
        drop(_c);
        assert_eq!(Tracked::live(), 0);
    }
}
