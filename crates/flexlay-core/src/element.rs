//! Size, alignment, and drop requirements of an array element type.

use std::mem;

use crate::align::align_up;

/// What the planner needs to know about one array element type.
///
/// Captured once per slot with [`ElementLayout::of`]. The `needs_drop` bit
/// decides whether a slot must remember its end so that teardown can walk
/// the elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementLayout {
    size: usize,
    align: usize,
    needs_drop: bool,
}

impl ElementLayout {
    /// Layout of `T`.
    pub const fn of<T>() -> Self {
        Self {
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
            needs_drop: mem::needs_drop::<T>(),
        }
    }

    /// Layout from raw parts. Used by tests and hand-built shape tables.
    pub const fn new(size: usize, align: usize, needs_drop: bool) -> Self {
        Self {
            size,
            align,
            needs_drop,
        }
    }

    /// Size of one element in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Required alignment of the element type.
    pub const fn align(&self) -> usize {
        self.align
    }

    /// Whether elements need their destructor run.
    pub const fn needs_drop(&self) -> bool {
        self.needs_drop
    }

    /// `count * size`, or `None` on overflow.
    pub const fn array_bytes(&self, count: usize) -> Option<usize> {
        count.checked_mul(self.size)
    }

    /// Bytes a run of `count` elements consumes when placed at `start`:
    /// the padding needed to align `start`, plus the elements themselves.
    ///
    /// `required_bytes(count, start) = align_up(start) - start + count * size`.
    pub const fn required_bytes(&self, count: usize, start: usize) -> Option<usize> {
        let aligned = match align_up(start, self.align) {
            Some(aligned) => aligned,
            None => return None,
        };
        match self.array_bytes(count) {
            Some(bytes) => bytes.checked_add(aligned - start),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_captures_type_properties() {
        let l = ElementLayout::of::<u64>();
        assert_eq!(l.size(), 8);
        assert_eq!(l.align(), mem::align_of::<u64>());
        assert!(!l.needs_drop());

        assert!(ElementLayout::of::<String>().needs_drop());
    }

    #[test]
    fn required_bytes_includes_leading_padding() {
        let l = ElementLayout::new(4, 4, false);
        assert_eq!(l.required_bytes(3, 8), Some(12));
        assert_eq!(l.required_bytes(3, 9), Some(3 + 12));
    }

    #[test]
    fn zero_count_still_pays_padding() {
        let l = ElementLayout::new(8, 8, false);
        assert_eq!(l.required_bytes(0, 13), Some(3));
        assert_eq!(l.required_bytes(0, 16), Some(0));
    }

    #[test]
    fn overflowing_count_is_rejected() {
        let l = ElementLayout::new(16, 8, false);
        assert_eq!(l.array_bytes(usize::MAX), None);
        assert_eq!(l.required_bytes(usize::MAX / 16 + 1, 0), None);
        assert_eq!(l.required_bytes(0, usize::MAX), None);
        assert_eq!(l.required_bytes(usize::MAX / 16, 1), Some(usize::MAX / 16 * 16 + 7));
    }
}
