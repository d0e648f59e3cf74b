//! Slot declarations: the typed side of the slot table.
//!
//! A [`SlotDecl`] pairs a [`SlotShape`] (pure layout data) with the
//! element operations the builder and destroyer need for array slots.
//! A header type opts in by implementing [`FlexLayout`], whose slot table
//! is validated while compiling.

#![allow(unsafe_code)]

use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use flexlay_core::{ElementLayout, LayoutValidator, SlotShape};

use crate::descriptor::ArrayDescriptor;

/// Type-erased element constructor and destructor for one array slot.
#[derive(Clone, Copy)]
pub struct ElementOps {
    init: unsafe fn(NonNull<u8>, usize),
    drop: Option<unsafe fn(NonNull<u8>, usize)>,
}

impl ElementOps {
    /// Operations for `T`: default construction, plus drop when `T` needs it.
    pub const fn of<T: Default>() -> Self {
        Self {
            init: default_fill::<T>,
            drop: if mem::needs_drop::<T>() {
                Some(drop_range::<T>)
            } else {
                None
            },
        }
    }

    /// Default-construct `count` elements at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be aligned for, and valid for writes of, `count` elements
    /// of the type these operations were created for.
    pub unsafe fn init(&self, ptr: NonNull<u8>, count: usize) {
        // SAFETY: forwarded caller contract.
        unsafe { (self.init)(ptr, count) }
    }

    /// Drop `count` initialised elements at `ptr`. No-op for element types
    /// without drop glue.
    ///
    /// # Safety
    ///
    /// `ptr` must point at `count` initialised elements of the type these
    /// operations were created for, which must not be used afterwards.
    pub unsafe fn drop_in_place(&self, ptr: NonNull<u8>, count: usize) {
        if let Some(drop) = self.drop {
            // SAFETY: forwarded caller contract.
            unsafe { drop(ptr, count) }
        }
    }

    /// Whether [`drop_in_place`](Self::drop_in_place) does anything.
    pub fn needs_drop(&self) -> bool {
        self.drop.is_some()
    }
}

/// Drops the elements written so far if a `T::default()` panics.
struct PartialFill<T> {
    base: *mut T,
    len: usize,
}

impl<T> Drop for PartialFill<T> {
    fn drop(&mut self) {
        // SAFETY: exactly `len` elements from `base` have been written.
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.base, self.len)) }
    }
}

unsafe fn default_fill<T: Default>(ptr: NonNull<u8>, count: usize) {
    let mut fill = PartialFill {
        base: ptr.cast::<T>().as_ptr(),
        len: 0,
    };
    while fill.len < count {
        // SAFETY: the caller provides room for `count` aligned elements.
        unsafe { fill.base.add(fill.len).write(T::default()) };
        fill.len += 1;
    }
    mem::forget(fill);
}

unsafe fn drop_range<T>(ptr: NonNull<u8>, count: usize) {
    // SAFETY: the caller provides `count` initialised elements.
    unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(ptr.cast::<T>().as_ptr(), count)) }
}

/// One slot of a header type's table.
#[derive(Clone, Copy)]
pub struct SlotDecl {
    shape: SlotShape,
    ops: Option<ElementOps>,
}

impl SlotDecl {
    /// A value slot of type `T` at `offset` in the header.
    pub const fn value<T>(name: &'static str, offset: usize) -> Self {
        Self {
            shape: SlotShape::value(name, offset, mem::size_of::<T>(), mem::align_of::<T>()),
            ops: None,
        }
    }

    /// An array slot whose header field is the descriptor `D`, at `offset`.
    ///
    /// `anchor` is the index of the slot an adjacent array follows, or
    /// `None` to follow the header.
    pub const fn array<D>(name: &'static str, offset: usize, anchor: Option<usize>) -> Self
    where
        D: ArrayDescriptor,
        D::Element: Default,
    {
        let shape = SlotShape::array(
            name,
            offset,
            D::KIND,
            anchor,
            ElementLayout::of::<D::Element>(),
        );
        assert!(
            shape.field_size == mem::size_of::<D>() && shape.field_align == mem::align_of::<D>(),
            "descriptor footprint differs from its kind"
        );
        Self {
            shape,
            ops: Some(ElementOps::of::<D::Element>()),
        }
    }

    /// Layout data for this slot.
    pub const fn shape(&self) -> &SlotShape {
        &self.shape
    }

    /// Field name.
    pub const fn name(&self) -> &'static str {
        self.shape.name
    }

    /// Element operations, for array slots.
    pub const fn ops(&self) -> Option<&ElementOps> {
        self.ops.as_ref()
    }
}

/// A header type laid out as a composite.
///
/// Usually implemented by the `flex_layout!` macro in the `flexlay` crate.
///
/// # Safety
///
/// `SLOTS` must list every field of `Self` in declaration order, with
/// `offset_of!` offsets, and each array slot's descriptor type must be
/// the exact type of that field. `Self` must be `repr(C)`. The header-size
/// and ordering parts of this contract are re-checked by
/// [`LAYOUT_CHECK`](Self::LAYOUT_CHECK); the field types are not, and
/// neither is a field hidden in the tail padding after the last declared
/// slot (the check compares against the padded header size).
///
/// `Self` must not observe its descriptors' elements in `Drop`: the
/// destroyer drops every array range before it drops the header. The
/// simplest way to guarantee this is to not implement `Drop` for `Self`
/// at all.
pub unsafe trait FlexLayout: Sized {
    /// The slot table.
    const SLOTS: &'static [SlotDecl];

    /// Compile-time validation of [`SLOTS`](Self::SLOTS) against `Self`.
    ///
    /// Evaluated on every build; referencing it in a `const _` item turns
    /// a bad table into a compile error at the declaration site.
    const LAYOUT_CHECK: () = check_layout::<Self>();
}

/// Validate `H::SLOTS` against `H`, panicking (at compile time when
/// const-evaluated) on the first problem.
pub const fn check_layout<H: FlexLayout>() {
    let slots = H::SLOTS;
    let mut validator = LayoutValidator::new();
    let mut i = 0;
    while i < slots.len() {
        validator = match validator.push(&slots[i].shape) {
            Ok(next) => next,
            Err(err) => panic!("{}", err.summary()),
        };
        i += 1;
    }
    if let Err(err) = validator.finish(mem::size_of::<H>()) {
        panic!("{}", err.summary());
    }
}

/// Index of `name` in `names`, for resolving slot names at compile time.
///
/// # Panics
///
/// Panics if `name` is not present.
pub const fn slot_index(names: &[&str], name: &str) -> usize {
    let mut i = 0;
    while i < names.len() {
        if str_eq(names[i], name) {
            return i;
        }
        i += 1;
    }
    panic!("unknown slot name");
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Typed name of array slot `index` of header `H`, whose field is `D`.
///
/// Accessors on `FlexBox` take a slot token rather than an index so that
/// end-dependent queries only type-check for descriptors that store an end.
pub struct Slot<H, D> {
    index: usize,
    _marker: PhantomData<fn() -> (H, D)>,
}

impl<H: FlexLayout, D: ArrayDescriptor> Slot<H, D> {
    /// Token for slot `index`.
    ///
    /// # Safety
    ///
    /// Slot `index` of `H::SLOTS` must be an array slot whose header field
    /// has type `D`.
    pub const unsafe fn new_unchecked(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Index into `H::SLOTS`.
    pub const fn index(self) -> usize {
        self.index
    }

    /// The slot's declaration.
    pub fn decl(self) -> &'static SlotDecl {
        &H::SLOTS[self.index]
    }
}

impl<H, D> Clone for Slot<H, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H, D> Copy for Slot<H, D> {}

impl<H, D> std::fmt::Debug for Slot<H, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Slot").field(&self.index).finish()
    }
}
