//! Static validation of slot tables.
//!
//! Everything here is `const fn` so that a header type's slot table can be
//! checked while the program is being compiled: a bad table becomes a
//! compile error instead of a runtime surprise.

use crate::align::{align_up, is_valid_alignment};
use crate::error::LayoutError;
use crate::slot::{ArrayKind, SlotKind, SlotShape};

/// Incremental checker for a slot table.
///
/// Feed slots in declaration order with [`push`](Self::push), then call
/// [`finish`](Self::finish) with the real header size. Along the way the
/// validator rebuilds the `repr(C)` layout the slots imply, so it catches
/// both incoherent array declarations and header types that do not match
/// their table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutValidator {
    index: usize,
    offset: usize,
    align: usize,
    prev_array: Option<(usize, ArrayKind)>,
}

impl LayoutValidator {
    /// An empty validator (no slots seen yet).
    pub const fn new() -> Self {
        Self {
            index: 0,
            offset: 0,
            align: 1,
            prev_array: None,
        }
    }

    /// Check the next slot and fold it into the implied header layout.
    pub const fn push(self, shape: &SlotShape) -> Result<Self, LayoutError> {
        let slot = shape.name;
        let mut next = self;

        if let SlotKind::Array {
            kind,
            anchor,
            element,
        } = shape.kind
        {
            if !is_valid_alignment(element.align()) {
                return Err(LayoutError::InvalidAlignment {
                    slot,
                    align: element.align(),
                });
            }
            if element.size() == 0 {
                return Err(LayoutError::ZeroSizedElement { slot });
            }
            if element.needs_drop() && !kind.stores_end() {
                return Err(LayoutError::UnsizedNeedsDrop { slot });
            }
            match (kind.is_adjacent(), anchor) {
                (false, Some(_)) => return Err(LayoutError::AnchorOnStoredKind { slot }),
                (false, None) => {}
                (true, None) => {
                    if self.prev_array.is_some() {
                        return Err(LayoutError::HeaderAdjacentNotFirst { slot });
                    }
                }
                (true, Some(anchor)) => match self.prev_array {
                    Some((prev, prev_kind)) if prev == anchor => {
                        if !prev_kind.stores_end() {
                            return Err(LayoutError::AnchorWithoutEnd { slot, anchor });
                        }
                    }
                    _ => return Err(LayoutError::AnchorNotPredecessor { slot, anchor }),
                },
            }
            next.prev_array = Some((self.index, kind));
        }

        if !is_valid_alignment(shape.field_align) {
            return Err(LayoutError::InvalidAlignment {
                slot,
                align: shape.field_align,
            });
        }
        let expected = match align_up(self.offset, shape.field_align) {
            Some(offset) => offset,
            None => return Err(LayoutError::Overflow),
        };
        if expected != shape.field_offset {
            return Err(LayoutError::FieldOffsetMismatch {
                slot,
                expected,
                found: shape.field_offset,
            });
        }
        next.offset = match expected.checked_add(shape.field_size) {
            Some(offset) => offset,
            None => return Err(LayoutError::Overflow),
        };
        if shape.field_align > next.align {
            next.align = shape.field_align;
        }
        next.index += 1;
        Ok(next)
    }

    /// Number of slots pushed so far.
    pub const fn slot_count(&self) -> usize {
        self.index
    }

    /// Header size implied by the slots pushed so far, including trailing
    /// padding up to the header alignment.
    pub const fn header_size(&self) -> Option<usize> {
        align_up(self.offset, self.align)
    }

    /// Header alignment implied by the slots pushed so far.
    pub const fn header_align(&self) -> usize {
        self.align
    }

    /// Compare the implied header size with the real one.
    ///
    /// Both sizes include tail padding, so bytes placed there are not
    /// attributed to any slot.
    pub const fn finish(self, actual_size: usize) -> Result<(), LayoutError> {
        match self.header_size() {
            Some(expected) if expected == actual_size => Ok(()),
            Some(expected) => Err(LayoutError::HeaderSizeMismatch {
                expected,
                found: actual_size,
            }),
            None => Err(LayoutError::Overflow),
        }
    }
}

impl Default for LayoutValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a whole slot table against a header of `header_size` bytes.
pub const fn validate_shapes(shapes: &[SlotShape], header_size: usize) -> Result<(), LayoutError> {
    let mut validator = LayoutValidator::new();
    let mut i = 0;
    while i < shapes.len() {
        validator = match validator.push(&shapes[i]) {
            Ok(next) => next,
            Err(err) => return Err(err),
        };
        i += 1;
    }
    validator.finish(header_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementLayout;
    use std::mem;

    const PTR: usize = mem::size_of::<*const u8>();

    fn bytes() -> ElementLayout {
        ElementLayout::new(1, 1, false)
    }

    fn droppy() -> ElementLayout {
        ElementLayout::new(24, 8, true)
    }

    #[test]
    fn value_then_arrays_is_accepted() {
        let shapes = [
            SlotShape::value("id", 0, 4, 4),
            SlotShape::array("bytes", PTR, ArrayKind::Unsized, None, bytes()),
            SlotShape::array("items", 2 * PTR, ArrayKind::Sized, None, droppy()),
        ];
        assert_eq!(validate_shapes(&shapes, 4 * PTR), Ok(()));
    }

    #[test]
    fn extra_header_bytes_are_rejected() {
        let shapes = [SlotShape::value("id", 0, 4, 4)];
        assert_eq!(
            validate_shapes(&shapes, 16),
            Err(LayoutError::HeaderSizeMismatch {
                expected: 4,
                found: 16
            })
        );
    }

    #[test]
    fn out_of_order_field_is_rejected() {
        let shapes = [
            SlotShape::value("a", 4, 4, 4),
            SlotShape::value("b", 0, 4, 4),
        ];
        assert!(matches!(
            validate_shapes(&shapes, 8),
            Err(LayoutError::FieldOffsetMismatch { slot: "a", .. })
        ));
    }

    #[test]
    fn unsized_with_drop_is_rejected() {
        let shapes = [SlotShape::array("names", 0, ArrayKind::Unsized, None, droppy())];
        assert_eq!(
            validate_shapes(&shapes, PTR),
            Err(LayoutError::UnsizedNeedsDrop { slot: "names" })
        );
        let shapes = [SlotShape::array("names", 0, ArrayKind::AdjacentUnsized, None, droppy())];
        assert_eq!(
            validate_shapes(&shapes, 0),
            Err(LayoutError::UnsizedNeedsDrop { slot: "names" })
        );
    }

    #[test]
    fn zero_sized_elements_are_rejected() {
        let zst = ElementLayout::new(0, 1, false);
        let shapes = [SlotShape::array("marks", 0, ArrayKind::Sized, None, zst)];
        assert_eq!(
            validate_shapes(&shapes, 2 * PTR),
            Err(LayoutError::ZeroSizedElement { slot: "marks" })
        );
    }

    #[test]
    fn header_adjacent_must_come_first() {
        let shapes = [
            SlotShape::array("first", 0, ArrayKind::Sized, None, bytes()),
            SlotShape::array("second", 2 * PTR, ArrayKind::AdjacentUnsized, None, bytes()),
        ];
        assert_eq!(
            validate_shapes(&shapes, 2 * PTR),
            Err(LayoutError::HeaderAdjacentNotFirst { slot: "second" })
        );
    }

    #[test]
    fn anchor_must_be_direct_predecessor_with_end() {
        let shapes = [
            SlotShape::array("a", 0, ArrayKind::Sized, None, bytes()),
            SlotShape::array("b", 2 * PTR, ArrayKind::Sized, None, bytes()),
            SlotShape::array("c", 4 * PTR, ArrayKind::AdjacentUnsized, Some(0), bytes()),
        ];
        assert_eq!(
            validate_shapes(&shapes, 4 * PTR),
            Err(LayoutError::AnchorNotPredecessor { slot: "c", anchor: 0 })
        );

        let shapes = [
            SlotShape::array("a", 0, ArrayKind::Unsized, None, bytes()),
            SlotShape::array("b", PTR, ArrayKind::AdjacentUnsized, Some(0), bytes()),
        ];
        assert_eq!(
            validate_shapes(&shapes, PTR),
            Err(LayoutError::AnchorWithoutEnd { slot: "b", anchor: 0 })
        );
    }

    #[test]
    fn anchor_on_value_slot_is_not_a_predecessor() {
        let shapes = [
            SlotShape::value("id", 0, 8, 8),
            SlotShape::array("b", 8, ArrayKind::AdjacentUnsized, Some(0), bytes()),
        ];
        assert_eq!(
            validate_shapes(&shapes, 8),
            Err(LayoutError::AnchorNotPredecessor { slot: "b", anchor: 0 })
        );
    }

    #[test]
    fn stored_kinds_cannot_name_anchors() {
        let shapes = [
            SlotShape::array("a", 0, ArrayKind::Sized, None, bytes()),
            SlotShape::array("b", 2 * PTR, ArrayKind::Sized, Some(0), bytes()),
        ];
        assert_eq!(
            validate_shapes(&shapes, 4 * PTR),
            Err(LayoutError::AnchorOnStoredKind { slot: "b" })
        );
    }

    #[test]
    fn adjacent_chain_is_accepted() {
        let shapes = [
            SlotShape::array("head", 0, ArrayKind::AdjacentSized, None, droppy()),
            SlotShape::array("mid", PTR, ArrayKind::AdjacentSized, Some(0), droppy()),
            SlotShape::array("tail", 2 * PTR, ArrayKind::AdjacentUnsized, Some(1), bytes()),
        ];
        assert_eq!(validate_shapes(&shapes, 2 * PTR), Ok(()));
    }

    #[test]
    fn validator_runs_in_const_context() {
        const SHAPES: [SlotShape; 2] = [
            SlotShape::value("id", 0, 2, 2),
            SlotShape::array("data", PTR, ArrayKind::Sized, None, ElementLayout::of::<u32>()),
        ];
        const OK: bool = validate_shapes(&SHAPES, 3 * PTR).is_ok();
        assert!(OK);
    }

    #[test]
    fn header_size_includes_tail_padding() {
        let v = LayoutValidator::new()
            .push(&SlotShape::value("wide", 0, 8, 8))
            .unwrap()
            .push(&SlotShape::value("narrow", 8, 1, 1))
            .unwrap();
        assert_eq!(v.header_size(), Some(16));
        assert_eq!(v.header_align(), 8);
        assert_eq!(v.slot_count(), 2);
    }

    #[test]
    fn tail_padding_is_compared_as_a_whole() {
        // `{ u64, u8 }` and `{ u64, u8, u8 }` both occupy 16 bytes.
        let shapes = [SlotShape::value("wide", 0, 8, 8), SlotShape::value("narrow", 8, 1, 1)];
        assert_eq!(validate_shapes(&shapes, 16), Ok(()));
        assert_eq!(
            validate_shapes(&shapes, 24),
            Err(LayoutError::HeaderSizeMismatch {
                expected: 16,
                found: 24
            })
        );
    }
}
