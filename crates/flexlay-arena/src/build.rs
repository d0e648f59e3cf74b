//! The layout builder: plan, allocate, construct, check, assemble.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use flexlay_core::{LayoutPlan, SlotRequest};
use smallvec::SmallVec;
use tracing::{debug, error, trace};

use crate::config::BuildConfig;
use crate::cursor::BlockCursor;
use crate::decl::{ElementOps, FlexLayout, SlotDecl};
use crate::descriptor::{ArrayDescriptor, Region};
use crate::error::BuildError;
use crate::handle::FlexBox;
use crate::raw::RawAllocator;

/// Regions built for one composite, indexed by slot.
///
/// Handed to the header assembly closure so it can turn each array slot's
/// region into that slot's descriptor.
pub struct Regions<'a> {
    slots: &'a [Option<Region>],
}

impl Regions<'_> {
    /// Descriptor for array slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not an array slot.
    pub fn descriptor<D: ArrayDescriptor>(&self, index: usize) -> D {
        match self.slots.get(index).copied().flatten() {
            Some(region) => D::from_region(region),
            None => panic!("slot {index} has no constructed region"),
        }
    }

    /// Number of slots (value and array).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the layout has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Undoes a partial build: drops constructed elements, frees the block.
struct BuildGuard<'a, A: RawAllocator> {
    alloc: &'a A,
    block: NonNull<u8>,
    layout: Layout,
    built: SmallVec<[(Region, ElementOps, usize); 8]>,
    armed: bool,
}

impl<'a, A: RawAllocator> BuildGuard<'a, A> {
    fn new(alloc: &'a A, block: NonNull<u8>, layout: Layout) -> Self {
        Self {
            alloc,
            block,
            layout,
            built: SmallVec::new(),
            armed: true,
        }
    }

    fn record(&mut self, region: Region, ops: ElementOps, count: usize) {
        if ops.needs_drop() {
            self.built.push((region, ops, count));
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<A: RawAllocator> Drop for BuildGuard<'_, A> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for (region, ops, count) in self.built.iter().rev() {
            // SAFETY: each recorded region holds `count` constructed elements
            // that nothing else references yet.
            unsafe { ops.drop_in_place(region.begin(), *count) };
        }
        // SAFETY: allocated by `alloc` with `layout` in this build.
        unsafe { self.alloc.deallocate(self.block, self.layout) };
    }
}

impl<H: FlexLayout, A: RawAllocator> FlexBox<H, A> {
    /// Build a composite in one block from `alloc`.
    ///
    /// `requests` holds one entry per slot of `H::SLOTS`: the element count
    /// for array slots, [`SlotRequest::Value`] for value slots. `assemble`
    /// receives the constructed regions and returns the header, which is
    /// then moved to the start of the block.
    ///
    /// Steps: plan the block over virtual offsets, allocate it, construct
    /// every array region in declaration order, check that construction
    /// consumed exactly the planned bytes, then write the header. On any
    /// error or panic, constructed elements are dropped and the block is
    /// released before returning.
    ///
    /// # Safety
    ///
    /// `assemble` must store `regions.descriptor(i)` in the field of every
    /// array slot `i`, with the descriptor type declared for that slot, and
    /// must not let descriptors escape into anything but the returned
    /// header.
    pub unsafe fn try_build_with<F>(
        alloc: A,
        config: &BuildConfig,
        requests: &[SlotRequest],
        assemble: F,
    ) -> Result<Self, BuildError>
    where
        F: FnOnce(&Regions<'_>) -> H,
    {
        #[allow(clippy::let_unit_value)]
        let () = H::LAYOUT_CHECK;

        let plan = LayoutPlan::compute(Layout::new::<H>(), H::SLOTS.iter().map(SlotDecl::shape), requests)?;
        let layout = plan.block_layout();
        if layout.size() > config.max_block_bytes {
            debug!(
                requested = layout.size(),
                limit = config.max_block_bytes,
                "composite block exceeds configured limit"
            );
            return Err(BuildError::TooLarge {
                requested: layout.size(),
                limit: config.max_block_bytes,
            });
        }
        trace!(
            header = plan.header_size(),
            trailing = plan.trailing_bytes(),
            align = layout.align(),
            "planned composite block"
        );

        let Ok(block) = alloc.allocate(layout) else {
            debug!(size = layout.size(), align = layout.align(), "composite allocation failed");
            return Err(BuildError::AllocationFailed { layout });
        };
        let mut guard = BuildGuard::new(&alloc, block, layout);

        // SAFETY: the block is `header_size + trailing_bytes` bytes long and
        // exclusively ours; the cursor covers the part after the header.
        let mut cursor = unsafe { BlockCursor::new(block.add(plan.header_size()), plan.trailing_bytes()) };
        let mut regions: SmallVec<[Option<Region>; 8]> = SmallVec::with_capacity(H::SLOTS.len());
        for (decl, request) in H::SLOTS.iter().zip(requests) {
            let (Some(ops), Some(element), SlotRequest::Array(count)) =
                (decl.ops(), decl.shape().element(), *request)
            else {
                regions.push(None);
                continue;
            };
            // SAFETY: `ops` and `element` come from the same declaration.
            let region = unsafe { cursor.consume(decl.name(), element, ops, count, config.padding_fill) }
                .inspect_err(|err| error!(%err, "construct pass overran the planned block"))?;
            guard.record(region, *ops, count);
            regions.push(Some(region));
        }

        if let Err(err) = cursor.finish(plan.trailing_bytes()) {
            error!(%err, "construct pass disagrees with plan");
            return Err(err);
        }

        let header = assemble(&Regions { slots: &regions });
        // SAFETY: the block starts with `size_of::<H>()` bytes aligned for
        // `H` (the block alignment includes `align_of::<H>()`).
        unsafe { block.cast::<H>().as_ptr().write(header) };
        guard.disarm();

        Ok(FlexBox {
            ptr: block.cast(),
            layout,
            alloc,
            _owns: PhantomData,
        })
    }

    /// Unwrap a build result the way the infallible constructors do:
    /// allocation failure goes to [`alloc::handle_alloc_error`], every
    /// other error panics.
    pub fn unwrap_build(result: Result<Self, BuildError>) -> Self {
        match result {
            Ok(built) => built,
            Err(BuildError::AllocationFailed { layout }) => alloc::handle_alloc_error(layout),
            Err(err) => panic!("composite build failed: {err}"),
        }
    }

    /// Header size of `H` in bytes.
    pub const fn header_size() -> usize {
        mem::size_of::<H>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{SizedAdjacentArray, SizedArray, UnsizedArray};
    use crate::raw::{AllocError, Global};
    use crate::Slot;
    use flexlay_core::{align_up, LayoutError};
    use std::cell::Cell;
    use std::mem::offset_of;

    #[repr(C)]
    struct Demo {
        tag: u32,
        bytes: UnsizedArray<u8>,
        words: SizedArray<u64>,
        tail: SizedAdjacentArray<u16>,
    }

    // SAFETY: fields listed in order with their offsets and exact types.
    unsafe impl FlexLayout for Demo {
        const SLOTS: &'static [SlotDecl] = &[
            SlotDecl::value::<u32>("tag", offset_of!(Demo, tag)),
            SlotDecl::array::<UnsizedArray<u8>>("bytes", offset_of!(Demo, bytes), None),
            SlotDecl::array::<SizedArray<u64>>("words", offset_of!(Demo, words), None),
            SlotDecl::array::<SizedAdjacentArray<u16>>("tail", offset_of!(Demo, tail), Some(2)),
        ];
    }

    const BYTES: Slot<Demo, UnsizedArray<u8>> = unsafe { Slot::new_unchecked(1) };
    const WORDS: Slot<Demo, SizedArray<u64>> = unsafe { Slot::new_unchecked(2) };
    const TAIL: Slot<Demo, SizedAdjacentArray<u16>> = unsafe { Slot::new_unchecked(3) };

    fn build_demo<A: RawAllocator>(
        alloc: A,
        config: &BuildConfig,
        counts: [usize; 3],
    ) -> Result<FlexBox<Demo, A>, BuildError> {
        let requests = [
            SlotRequest::Value,
            SlotRequest::Array(counts[0]),
            SlotRequest::Array(counts[1]),
            SlotRequest::Array(counts[2]),
        ];
        // SAFETY: every array slot receives its own descriptor.
        unsafe {
            FlexBox::try_build_with(alloc, config, &requests, |regions| Demo {
                tag: 7,
                bytes: regions.descriptor(1),
                words: regions.descriptor(2),
                tail: regions.descriptor(3),
            })
        }
    }

    fn addr<T>(ptr: NonNull<T>) -> usize {
        ptr.as_ptr() as usize
    }

    #[test]
    fn regions_follow_the_header_in_order() {
        let built = build_demo(Global, &BuildConfig::default(), [5, 3, 2]).unwrap();
        assert_eq!(built.tag, 7);

        let header_end = built.as_ptr() as usize + size_of::<Demo>();
        assert_eq!(addr(built.begin(BYTES)), header_end);
        assert_eq!(addr(built.begin(WORDS)), align_up(header_end + 5, align_of::<u64>()).unwrap());
        assert_eq!(addr(built.begin(TAIL)), addr(built.end(WORDS)));
        assert_eq!(built.len(WORDS), 3);
        assert_eq!(built.len(TAIL), 2);
        assert_eq!(built.as_slice(WORDS), &[0, 0, 0]);
        assert_eq!(built.words.as_slice(), &[0, 0, 0]);

        let block_end = built.as_ptr() as usize + built.block_layout().size();
        assert_eq!(addr(built.end(TAIL)), block_end);
    }

    #[test]
    fn elements_are_writable_through_the_handle() {
        let mut built = build_demo(Global, &BuildConfig::default(), [0, 4, 1]).unwrap();
        built.as_mut_slice(WORDS).copy_from_slice(&[1, 2, 3, 4]);
        built.as_mut_slice(TAIL)[0] = 9;
        assert_eq!(built.as_slice(WORDS), &[1, 2, 3, 4]);
        assert_eq!(built.as_slice(TAIL), &[9]);
        // SAFETY: `bytes` was built with zero elements.
        assert!(unsafe { built.slice_with_len(BYTES, 0) }.is_empty());
    }

    #[test]
    fn zero_counts_build_a_header_sized_block() {
        let built = build_demo(Global, &BuildConfig::default(), [0, 0, 0]).unwrap();
        assert_eq!(built.block_layout().size(), size_of::<Demo>());
        assert_eq!(built.len(WORDS), 0);
        assert_eq!(built.len(TAIL), 0);
    }

    #[test]
    fn request_count_mismatch_is_reported() {
        let requests = [SlotRequest::Value, SlotRequest::Array(1)];
        // SAFETY: the closure is never reached.
        let result = unsafe {
            FlexBox::<Demo>::try_build_with(Global, &BuildConfig::default(), &requests, |_| unreachable!())
        };
        assert!(matches!(
            result,
            Err(BuildError::Layout(LayoutError::RequestCountMismatch { expected: 4, found: 2 }))
        ));
    }

    #[test]
    fn block_limit_is_enforced_before_allocating() {
        let config = BuildConfig::new().with_max_block_bytes(size_of::<Demo>());
        let err = build_demo(Global, &config, [1, 0, 0]).unwrap_err();
        assert!(matches!(err, BuildError::TooLarge { limit, .. } if limit == size_of::<Demo>()));
    }

    struct Refuse {
        calls: Cell<usize>,
    }

    // SAFETY: never hands out memory.
    unsafe impl RawAllocator for Refuse {
        fn allocate(&self, _layout: Layout) -> Result<NonNull<u8>, AllocError> {
            self.calls.set(self.calls.get() + 1);
            Err(AllocError)
        }

        unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
            unreachable!("nothing was allocated");
        }
    }

    #[test]
    fn allocation_failure_is_reported() {
        let refuse = Refuse { calls: Cell::new(0) };
        let err = build_demo(&refuse, &BuildConfig::default(), [2, 2, 2]).unwrap_err();
        assert!(matches!(err, BuildError::AllocationFailed { .. }));
        assert_eq!(refuse.calls.get(), 1);
    }

    #[test]
    fn padding_fill_marks_the_gap() {
        let config = BuildConfig::new().with_padding_fill(0xAB);
        let built = build_demo(Global, &config, [1, 1, 0]).unwrap();
        let gap_start = addr(built.begin(BYTES)) + 1;
        let gap_end = addr(built.begin(WORDS));
        assert!(gap_end > gap_start);
        for at in gap_start..gap_end {
            // SAFETY: the gap lies inside the live block.
            assert_eq!(unsafe { *(at as *const u8) }, 0xAB);
        }
    }

    #[test]
    #[should_panic(expected = "composite build failed")]
    fn unwrap_build_panics_on_layout_errors() {
        let config = BuildConfig::new().with_max_block_bytes(0);
        FlexBox::unwrap_build(build_demo(Global, &config, [0, 0, 0]));
    }

    #[test]
    fn destroy_accepts_none() {
        FlexBox::<Demo>::destroy(None);
        FlexBox::destroy(Some(build_demo(Global, &BuildConfig::default(), [1, 1, 1]).unwrap()));
    }
}
