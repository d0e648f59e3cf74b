//! Flexlay: a fixed header followed by variable-length arrays, in one
//! allocation.
//!
//! This is the facade crate. It re-exports the layout planner and the
//! arena, and provides [`flex_layout!`], which turns a field list into a
//! `repr(C)` header type with a validated slot table, typed slot tokens,
//! and constructors.
//!
//! # Quick start
//!
//! ```rust
//! use flexlay::prelude::*;
//!
//! flex_layout! {
//!     /// A length-prefixed message with trailing payload and names.
//!     pub struct Message {
//!         pub id: value(u32),
//!         pub payload: unsized_array(u8),
//!         pub names: sized_array(String),
//!     }
//! }
//!
//! // One count per array field, one value per value field.
//! let mut msg = Message::build(7, 16, 3);
//! assert_eq!(msg.id, 7);
//! assert_eq!(msg.len(Message::names), 3);
//!
//! msg.as_mut_slice(Message::names)[0].push_str("first");
//! assert_eq!(msg.names.as_slice()[0], "first");
//!
//! // Unsized arrays do not record their length; the payload starts right
//! // after the header.
//! let header_end = msg.as_ptr() as usize + size_of::<Message>();
//! assert_eq!(msg.begin(Message::payload).as_ptr() as usize, header_end);
//! ```
//!
//! # Slot kinds
//!
//! | Kind | Descriptor | Stores | Notes |
//! |------|------------|--------|-------|
//! | `value(T)` | `T` | the value | Constructor argument of type `T` |
//! | `unsized_array(T)` | [`UnsizedArray`](arena::UnsizedArray) | begin | `T` must not need drop |
//! | `sized_array(T)` | [`SizedArray`](arena::SizedArray) | begin, end | |
//! | `unsized_adjacent(T)` | [`AdjacentArray`](arena::AdjacentArray) | nothing | `T` must not need drop |
//! | `sized_adjacent(T)` | [`SizedAdjacentArray`](arena::SizedAdjacentArray) | end | |
//! | `array(T)` | unsized if `T` needs no drop, else sized | | |
//! | `adjacent(T)` | unsized adjacent if `T` needs no drop, else sized adjacent | | |
//!
//! Adjacent arrays store no begin address. Without `after`, an adjacent
//! array follows the header and must be the first array field. With
//! `after field`, it follows the named array, which must be the array
//! field right before it and must store its end:
//!
//! ```rust
//! use flexlay::prelude::*;
//!
//! flex_layout! {
//!     struct Packed {
//!         keys: sized_adjacent(u32),
//!         vals: unsized_adjacent(u64) after keys,
//!     }
//! }
//!
//! let packed = Packed::build(3, 2);
//! let keys_end = packed.end(Packed::keys).as_ptr() as usize;
//! let vals = packed.begin(Packed::vals).as_ptr() as usize;
//! assert_eq!(vals, keys_end.next_multiple_of(align_of::<u64>()));
//! ```
//!
//! Tables that break these rules are rejected at compile time:
//!
//! ```compile_fail
//! use flexlay::prelude::*;
//!
//! flex_layout! {
//!     struct Leaky {
//!         names: unsized_array(String),
//!     }
//! }
//! ```
//!
//! ```compile_fail
//! use flexlay::prelude::*;
//!
//! flex_layout! {
//!     struct Misplaced {
//!         first: sized_array(u8),
//!         second: sized_adjacent(u8),
//!     }
//! }
//! ```
//!
//! ```compile_fail
//! use flexlay::prelude::*;
//!
//! flex_layout! {
//!     struct Empty {
//!         units: sized_array(()),
//!     }
//! }
//! ```
//!
//! The header cannot implement `Drop` itself, since its array elements are
//! destroyed before it is:
//!
//! ```compile_fail
//! use flexlay::prelude::*;
//!
//! flex_layout! {
//!     struct Watched {
//!         items: sized_array(String),
//!     }
//! }
//!
//! impl Drop for Watched {
//!     fn drop(&mut self) {
//!         assert!(self.items.as_slice().is_empty());
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`layout`] | `flexlay-core` | Alignment, slot tables, validation, the plan pass |
//! | [`arena`] | `flexlay-arena` | Descriptors, builder, [`FlexBox`](arena::FlexBox), allocators |
//!
//! The macro output contains `unsafe` blocks; the slot table it generates
//! is the proof obligation, and the compile-time layout check backs it up.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Layout planning (`flexlay-core`).
///
/// Pure arithmetic: [`layout::align_up`], slot tables, and
/// [`layout::LayoutPlan`].
pub use flexlay_core as layout;

/// Construction, access, and teardown (`flexlay-arena`).
pub use flexlay_arena as arena;

#[doc(hidden)]
pub mod macros;

/// Common imports for declaring and using composites.
pub mod prelude {
    pub use crate::flex_layout;
    pub use flexlay_arena::{
        AdjacentArray, BuildConfig, BuildError, FlexBox, FlexLayout, Global, RawAllocator, SizedAdjacentArray,
        SizedArray, Slot, UnsizedArray,
    };
}
