//! Alignment arithmetic shared by the plan pass and the construct pass.
//!
//! All functions here work on plain `usize` addresses. The plan pass feeds
//! them offsets relative to a block base of zero; the arena feeds them the
//! same rule through `align_offset` on real pointers. Because every block is
//! allocated at the maximum alignment of its contents, both produce the
//! same padding for every region.

/// Whether `align` is usable as an alignment (a non-zero power of two).
pub const fn is_valid_alignment(align: usize) -> bool {
    align.is_power_of_two()
}

/// Smallest value `>= addr` that is a multiple of `align`.
///
/// Returns `None` if the rounded value does not fit in `usize`.
///
/// # Panics
///
/// Panics in debug builds if `align` is not a power of two.
pub const fn align_up(addr: usize, align: usize) -> Option<usize> {
    debug_assert!(is_valid_alignment(align), "alignment must be a power of two");
    let mask = align - 1;
    match addr.checked_add(mask) {
        Some(bumped) => Some(bumped & !mask),
        None => None,
    }
}

/// Bytes needed to move `addr` up to the next multiple of `align`.
///
/// Wraps instead of failing; callers that can overflow use [`align_up`].
pub const fn padding_for(addr: usize, align: usize) -> usize {
    let mask = align.wrapping_sub(1);
    (addr.wrapping_add(mask) & !mask).wrapping_sub(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_aligned_is_unchanged() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(16, 8), Some(16));
        assert_eq!(align_up(7, 1), Some(7));
    }

    #[test]
    fn rounds_up_to_next_multiple() {
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(9, 4), Some(12));
        assert_eq!(align_up(13, 16), Some(16));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(align_up(usize::MAX, 2), None);
        assert_eq!(align_up(usize::MAX, 1), Some(usize::MAX));
    }

    #[test]
    fn padding_matches_align_up() {
        for addr in 0..64usize {
            for shift in 0..6 {
                let align = 1usize << shift;
                let up = align_up(addr, align).unwrap();
                assert_eq!(padding_for(addr, align), up - addr);
            }
        }
    }

    #[test]
    fn alignment_validity() {
        assert!(is_valid_alignment(1));
        assert!(is_valid_alignment(64));
        assert!(!is_valid_alignment(0));
        assert!(!is_valid_alignment(12));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn result_is_smallest_aligned_value(addr in 0usize..1 << 40, shift in 0u32..12) {
                let align = 1usize << shift;
                let up = align_up(addr, align).unwrap();
                prop_assert!(up >= addr);
                prop_assert_eq!(up % align, 0);
                prop_assert!(up - addr < align);
            }
        }
    }
}
