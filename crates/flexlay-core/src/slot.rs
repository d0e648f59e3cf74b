//! The slot descriptor model.
//!
//! A composite header is an ordered list of slots. Each slot is either a
//! plain value field or an array descriptor. Array descriptors come in four
//! kinds, differing in which addresses they keep in the header:
//!
//! | Kind              | Stores        | Begin comes from                    |
//! |-------------------|---------------|-------------------------------------|
//! | `Unsized`         | begin         | the header                          |
//! | `Sized`           | begin + end   | the header                          |
//! | `AdjacentUnsized` | nothing       | header end, or anchor end, aligned  |
//! | `AdjacentSized`   | end           | header end, or anchor end, aligned  |

use std::mem;

use crate::element::ElementLayout;

/// Storage kind of an array slot's header descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    /// Begin pointer only. Elements must not need drop.
    Unsized,
    /// Begin and end pointers.
    Sized,
    /// No pointers; begin is derived from the header end or the anchor.
    AdjacentUnsized,
    /// End pointer only; begin is derived like [`ArrayKind::AdjacentUnsized`].
    AdjacentSized,
}

impl ArrayKind {
    /// Cheapest kind that can still tear its elements down:
    /// `Unsized` for trivially droppable elements, `Sized` otherwise.
    pub const fn auto(needs_drop: bool) -> Self {
        if needs_drop {
            Self::Sized
        } else {
            Self::Unsized
        }
    }

    /// Adjacent counterpart of [`ArrayKind::auto`].
    pub const fn auto_adjacent(needs_drop: bool) -> Self {
        if needs_drop {
            Self::AdjacentSized
        } else {
            Self::AdjacentUnsized
        }
    }

    /// Whether the descriptor holds the begin address.
    pub const fn stores_begin(self) -> bool {
        matches!(self, Self::Unsized | Self::Sized)
    }

    /// Whether the descriptor holds the end address.
    pub const fn stores_end(self) -> bool {
        matches!(self, Self::Sized | Self::AdjacentSized)
    }

    /// Whether begin is computed relative to the header or an anchor.
    pub const fn is_adjacent(self) -> bool {
        matches!(self, Self::AdjacentUnsized | Self::AdjacentSized)
    }

    /// Number of pointers the descriptor keeps in the header.
    pub const fn descriptor_words(self) -> usize {
        self.stores_begin() as usize + self.stores_end() as usize
    }

    /// Header bytes taken by the descriptor.
    pub const fn descriptor_size(self) -> usize {
        self.descriptor_words() * mem::size_of::<*const u8>()
    }

    /// Alignment of the descriptor inside the header.
    pub const fn descriptor_align(self) -> usize {
        if self.descriptor_words() == 0 {
            1
        } else {
            mem::align_of::<*const u8>()
        }
    }
}

/// What a slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    /// A plain field, constructed from a caller-supplied value.
    Value,
    /// A trailing array described by a header descriptor.
    Array {
        /// Descriptor storage kind.
        kind: ArrayKind,
        /// For adjacent kinds: index of the slot whose end this array
        /// follows. `None` means the array follows the header itself.
        anchor: Option<usize>,
        /// Element type requirements.
        element: ElementLayout,
    },
}

/// One entry of a composite's slot table.
///
/// Besides the slot kind, a shape records where the slot's field lives in
/// the header (`field_offset`) and how big and aligned it is, so that the
/// table can be checked against the concrete header type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotShape {
    /// Field name, for diagnostics.
    pub name: &'static str,
    /// Value or array.
    pub kind: SlotKind,
    /// Byte offset of the slot's field inside the header.
    pub field_offset: usize,
    /// Size of the slot's field inside the header.
    pub field_size: usize,
    /// Alignment of the slot's field inside the header.
    pub field_align: usize,
}

impl SlotShape {
    /// A value slot whose field has the given size and alignment.
    pub const fn value(name: &'static str, field_offset: usize, field_size: usize, field_align: usize) -> Self {
        Self {
            name,
            kind: SlotKind::Value,
            field_offset,
            field_size,
            field_align,
        }
    }

    /// An array slot; the descriptor footprint follows from `kind`.
    pub const fn array(
        name: &'static str,
        field_offset: usize,
        kind: ArrayKind,
        anchor: Option<usize>,
        element: ElementLayout,
    ) -> Self {
        Self {
            name,
            kind: SlotKind::Array {
                kind,
                anchor,
                element,
            },
            field_offset,
            field_size: kind.descriptor_size(),
            field_align: kind.descriptor_align(),
        }
    }

    /// Whether this is an array slot.
    pub const fn is_array(&self) -> bool {
        matches!(self.kind, SlotKind::Array { .. })
    }

    /// Descriptor kind, for array slots.
    pub const fn array_kind(&self) -> Option<ArrayKind> {
        match self.kind {
            SlotKind::Array { kind, .. } => Some(kind),
            SlotKind::Value => None,
        }
    }

    /// Element layout, for array slots.
    pub const fn element(&self) -> Option<ElementLayout> {
        match self.kind {
            SlotKind::Array { element, .. } => Some(element),
            SlotKind::Value => None,
        }
    }

    /// Anchor slot index, for anchored adjacent slots.
    pub const fn anchor(&self) -> Option<usize> {
        match self.kind {
            SlotKind::Array { anchor, .. } => anchor,
            SlotKind::Value => None,
        }
    }
}

/// Per-slot build argument as seen by the planner.
///
/// Value slots carry their value elsewhere; only array counts matter for
/// layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRequest {
    /// The slot is a value field.
    Value,
    /// The slot is an array of this many elements.
    Array(usize),
}

impl SlotRequest {
    /// Element count, for array requests.
    pub const fn count(self) -> Option<usize> {
        match self {
            Self::Array(count) => Some(count),
            Self::Value => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PTR: usize = mem::size_of::<*const u8>();

    #[test]
    fn descriptor_sizes_follow_stored_pointers() {
        assert_eq!(ArrayKind::Unsized.descriptor_size(), PTR);
        assert_eq!(ArrayKind::Sized.descriptor_size(), 2 * PTR);
        assert_eq!(ArrayKind::AdjacentUnsized.descriptor_size(), 0);
        assert_eq!(ArrayKind::AdjacentSized.descriptor_size(), PTR);
        assert_eq!(ArrayKind::AdjacentUnsized.descriptor_align(), 1);
    }

    #[test]
    fn auto_selects_by_drop_requirement() {
        assert_eq!(ArrayKind::auto(false), ArrayKind::Unsized);
        assert_eq!(ArrayKind::auto(true), ArrayKind::Sized);
        assert_eq!(ArrayKind::auto_adjacent(false), ArrayKind::AdjacentUnsized);
        assert_eq!(ArrayKind::auto_adjacent(true), ArrayKind::AdjacentSized);
    }

    #[test]
    fn unsized_saves_one_pointer_over_sized() {
        let sized = ArrayKind::Sized.descriptor_size();
        let unsized_ = ArrayKind::Unsized.descriptor_size();
        assert_eq!(sized - unsized_, PTR);
    }

    #[test]
    fn array_shape_accessors() {
        let el = ElementLayout::of::<u16>();
        let shape = SlotShape::array("tail", 8, ArrayKind::AdjacentSized, Some(1), el);
        assert!(shape.is_array());
        assert_eq!(shape.array_kind(), Some(ArrayKind::AdjacentSized));
        assert_eq!(shape.element(), Some(el));
        assert_eq!(shape.anchor(), Some(1));
        assert_eq!(shape.field_size, PTR);

        let value = SlotShape::value("id", 0, 4, 4);
        assert!(!value.is_array());
        assert_eq!(value.element(), None);
    }
}
