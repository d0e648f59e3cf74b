//! Layout planning for composites made of a fixed header followed by
//! variable-length trailing arrays, all living in one allocation.
//!
//! This is the leaf crate of the workspace. It contains no pointers and no
//! `unsafe`: every computation runs over a virtual address space whose
//! origin is the start of the block. `flexlay-arena` replays the same
//! arithmetic against real memory.
//!
//! # Pieces
//!
//! - [`align_up`]: the rounding rule every offset goes through.
//! - [`SlotShape`] / [`SlotKind`] / [`ArrayKind`]: the ordered slot table
//!   describing a header (value fields and array descriptors).
//! - [`LayoutValidator`]: const-evaluable checks that a slot table is
//!   coherent and matches the header type it describes.
//! - [`LayoutPlan`]: the plan pass, turning per-slot element counts into
//!   exact region offsets and a block [`Layout`](std::alloc::Layout).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod align;
pub mod element;
pub mod error;
pub mod plan;
pub mod slot;
pub mod validate;

pub use align::{align_up, is_valid_alignment, padding_for};
pub use element::ElementLayout;
pub use error::LayoutError;
pub use plan::{LayoutPlan, RegionPlan};
pub use slot::{ArrayKind, SlotKind, SlotRequest, SlotShape};
pub use validate::{validate_shapes, LayoutValidator};
