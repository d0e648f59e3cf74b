//! Header-side array descriptors.
//!
//! One descriptor type per [`ArrayKind`]. Each is `repr(C)` with only
//! pointer fields (begin first, end second) so that the slot table can
//! locate its words from the field offset alone. Descriptors are created
//! exclusively by the builder and are neither `Clone` nor `Copy`: a
//! descriptor is only meaningful inside the header it was built into.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::slice;

use flexlay_core::ArrayKind;

/// Extent of one constructed trailing region, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    begin: NonNull<u8>,
    end: NonNull<u8>,
}

impl Region {
    pub(crate) fn new(begin: NonNull<u8>, end: NonNull<u8>) -> Self {
        debug_assert!(begin <= end);
        Self { begin, end }
    }

    /// First byte of the first element.
    pub fn begin(&self) -> NonNull<u8> {
        self.begin
    }

    /// One past the last byte of the last element.
    pub fn end(&self) -> NonNull<u8> {
        self.end
    }

    /// Bytes covered by the elements.
    pub fn byte_len(&self) -> usize {
        self.end.as_ptr() as usize - self.begin.as_ptr() as usize
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A header field describing one trailing array.
///
/// Implemented only by the four descriptor types of this module.
pub trait ArrayDescriptor: sealed::Sealed + Sized {
    /// Element type of the array.
    type Element;

    /// Storage kind this descriptor implements.
    const KIND: ArrayKind;

    /// Descriptor for a freshly constructed region.
    #[doc(hidden)]
    fn from_region(region: Region) -> Self;
}

/// Descriptors that store an end address, so the element count is
/// recoverable. Only these support `end`, `len`, and slice access.
pub trait BoundedDescriptor: ArrayDescriptor {}

/// Begin pointer only. Legal only for elements that need no drop.
#[repr(C)]
pub struct UnsizedArray<T> {
    begin: NonNull<T>,
}

impl<T> UnsizedArray<T> {
    /// First element.
    pub fn begin(&self) -> NonNull<T> {
        self.begin
    }
}

impl<T> sealed::Sealed for UnsizedArray<T> {}

impl<T> ArrayDescriptor for UnsizedArray<T> {
    type Element = T;
    const KIND: ArrayKind = ArrayKind::Unsized;

    fn from_region(region: Region) -> Self {
        Self {
            begin: region.begin.cast(),
        }
    }
}

/// Begin and end pointers.
#[repr(C)]
pub struct SizedArray<T> {
    begin: NonNull<T>,
    end: NonNull<T>,
}

impl<T> SizedArray<T> {
    /// First element.
    pub fn begin(&self) -> NonNull<T> {
        self.begin
    }

    /// One past the last element.
    pub fn end(&self) -> NonNull<T> {
        self.end
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        element_count::<T>(self.begin, self.end)
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: descriptors only come from `from_region` during a build,
        // where `[begin, end)` holds `len` initialised elements owned by
        // the same block as `self`; the borrow of `self` keeps the block
        // alive and no `&mut` to the elements can coexist with `&self`.
        unsafe { slice::from_raw_parts(self.begin.as_ptr(), self.len()) }
    }
}

impl<T> sealed::Sealed for SizedArray<T> {}

impl<T> ArrayDescriptor for SizedArray<T> {
    type Element = T;
    const KIND: ArrayKind = ArrayKind::Sized;

    fn from_region(region: Region) -> Self {
        Self {
            begin: region.begin.cast(),
            end: region.end.cast(),
        }
    }
}

impl<T> BoundedDescriptor for SizedArray<T> {}

/// No stored pointers; begins right after the header or its anchor.
#[repr(C)]
pub struct AdjacentArray<T> {
    _element: PhantomData<T>,
}

impl<T> sealed::Sealed for AdjacentArray<T> {}

impl<T> ArrayDescriptor for AdjacentArray<T> {
    type Element = T;
    const KIND: ArrayKind = ArrayKind::AdjacentUnsized;

    fn from_region(_region: Region) -> Self {
        Self {
            _element: PhantomData,
        }
    }
}

/// End pointer only; begins right after the header or its anchor.
#[repr(C)]
pub struct SizedAdjacentArray<T> {
    end: NonNull<T>,
}

impl<T> SizedAdjacentArray<T> {
    /// One past the last element.
    pub fn end(&self) -> NonNull<T> {
        self.end
    }
}

impl<T> sealed::Sealed for SizedAdjacentArray<T> {}

impl<T> ArrayDescriptor for SizedAdjacentArray<T> {
    type Element = T;
    const KIND: ArrayKind = ArrayKind::AdjacentSized;

    fn from_region(region: Region) -> Self {
        Self {
            end: region.end.cast(),
        }
    }
}

impl<T> BoundedDescriptor for SizedAdjacentArray<T> {}

// SAFETY: descriptors own (through their block) the elements they point
// at, so they can cross threads exactly when the elements can.
unsafe impl<T: Send> Send for UnsizedArray<T> {}
// SAFETY: shared access only hands out `&T`.
unsafe impl<T: Sync> Sync for UnsizedArray<T> {}
// SAFETY: as for `UnsizedArray`.
unsafe impl<T: Send> Send for SizedArray<T> {}
// SAFETY: as for `UnsizedArray`.
unsafe impl<T: Sync> Sync for SizedArray<T> {}
// SAFETY: as for `UnsizedArray`.
unsafe impl<T: Send> Send for SizedAdjacentArray<T> {}
// SAFETY: as for `UnsizedArray`.
unsafe impl<T: Sync> Sync for SizedAdjacentArray<T> {}

macro_rules! impl_debug {
    ($($ty:ident),*) => {
        $(
            impl<T> fmt::Debug for $ty<T> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_struct(stringify!($ty))
                        .field("kind", &<Self as ArrayDescriptor>::KIND)
                        .finish_non_exhaustive()
                }
            }
        )*
    };
}

impl_debug!(UnsizedArray, SizedArray, AdjacentArray, SizedAdjacentArray);

/// Type-level selection of the cheapest descriptor for `T`.
///
/// `NEEDS_DROP` is `core::mem::needs_drop::<T>()`, spelled out at the use
/// site because stable Rust cannot compute it from a generic parameter:
///
/// ```
/// use flexlay_arena::{Auto, AutoSelect, SizedArray, UnsizedArray};
///
/// type Bytes = <Auto<u8, { core::mem::needs_drop::<u8>() }> as AutoSelect>::Array;
/// type Names = <Auto<String, { core::mem::needs_drop::<String>() }> as AutoSelect>::Array;
///
/// fn is<A, B: Same<A>>() {}
/// trait Same<T> {}
/// impl<T> Same<T> for T {}
/// is::<Bytes, UnsizedArray<u8>>();
/// is::<Names, SizedArray<String>>();
/// ```
pub struct Auto<T, const NEEDS_DROP: bool>(PhantomData<T>);

/// Maps [`Auto`] to concrete descriptor types.
pub trait AutoSelect {
    /// `UnsizedArray<T>` or `SizedArray<T>`.
    type Array: ArrayDescriptor;
    /// `AdjacentArray<T>` or `SizedAdjacentArray<T>`.
    type Adjacent: ArrayDescriptor;
}

impl<T> AutoSelect for Auto<T, false> {
    type Array = UnsizedArray<T>;
    type Adjacent = AdjacentArray<T>;
}

impl<T> AutoSelect for Auto<T, true> {
    type Array = SizedArray<T>;
    type Adjacent = SizedAdjacentArray<T>;
}

pub(crate) fn element_count<T>(begin: NonNull<T>, end: NonNull<T>) -> usize {
    let bytes = end.as_ptr() as usize - begin.as_ptr() as usize;
    match std::mem::size_of::<T>() {
        0 => 0,
        size => bytes / size,
    }
}
