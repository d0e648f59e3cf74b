//! Single-block construction and teardown of composites made of a header
//! followed by variable-length trailing arrays.
//!
//! `flexlay-core` computes where everything goes; this crate replays that
//! plan against real memory:
//!
//! 1. [`LayoutPlan`](flexlay_core::LayoutPlan) sizes the block.
//! 2. A [`RawAllocator`] hands out exactly one block.
//! 3. A [`BlockCursor`] walks the trailing part, default-constructing each
//!    array in declaration order.
//! 4. The cursor must land exactly on the planned end
//!    ([`BuildError::PlanMismatch`] otherwise).
//! 5. The header is assembled from the regions' descriptors and written at
//!    the block start.
//!
//! The result is a [`FlexBox`], which frees everything in one go on drop.
//!
//! Header types describe themselves through the [`FlexLayout`] trait. The
//! `flexlay` facade crate has a macro that writes the impl.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod build;
pub mod config;
pub mod cursor;
pub mod decl;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod raw;

pub use build::Regions;
pub use config::BuildConfig;
pub use cursor::BlockCursor;
pub use decl::{check_layout, slot_index, ElementOps, FlexLayout, Slot, SlotDecl};
pub use descriptor::{
    AdjacentArray, ArrayDescriptor, Auto, AutoSelect, BoundedDescriptor, Region, SizedAdjacentArray, SizedArray,
    UnsizedArray,
};
pub use error::BuildError;
pub use flexlay_core::SlotRequest;
pub use handle::FlexBox;
pub use raw::{align_ptr, AllocError, Global, RawAllocator};
