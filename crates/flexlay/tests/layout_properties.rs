//! Property tests: regions of arbitrary composites are aligned, ordered,
//! disjoint, and exactly fill the block.

use flexlay::prelude::*;
use proptest::prelude::*;

flex_layout! {
    struct Mixed {
        tag: value(u8),
        bytes: sized_array(u8),
        halves: sized_array(u16),
        words: sized_adjacent(u64) after halves,
        names: sized_array(String),
    }
}

proptest! {
    #[test]
    fn regions_tile_the_block(
        bytes in 0usize..64,
        halves in 0usize..64,
        words in 0usize..64,
        names in 0usize..16,
    ) {
        let mixed = Mixed::build(1, bytes, halves, words, names);
        let base = mixed.as_ptr() as usize;
        let header_end = base + size_of::<Mixed>();

        let spans = [
            (mixed.begin(Mixed::bytes).as_ptr() as usize, mixed.end(Mixed::bytes).as_ptr() as usize, 1),
            (mixed.begin(Mixed::halves).as_ptr() as usize, mixed.end(Mixed::halves).as_ptr() as usize, align_of::<u16>()),
            (mixed.begin(Mixed::words).as_ptr() as usize, mixed.end(Mixed::words).as_ptr() as usize, align_of::<u64>()),
            (mixed.begin(Mixed::names).as_ptr() as usize, mixed.end(Mixed::names).as_ptr() as usize, align_of::<String>()),
        ];

        let mut cursor = header_end;
        for (begin, end, align) in spans {
            prop_assert_eq!(begin % align, 0);
            prop_assert!(begin >= cursor);
            prop_assert!(begin - cursor < align);
            prop_assert!(end >= begin);
            cursor = end;
        }
        prop_assert_eq!(cursor, base + mixed.block_layout().size());

        prop_assert_eq!(mixed.len(Mixed::bytes), bytes);
        prop_assert_eq!(mixed.len(Mixed::halves), halves);
        prop_assert_eq!(mixed.len(Mixed::words), words);
        prop_assert_eq!(mixed.len(Mixed::names), names);
        prop_assert!(mixed.as_slice(Mixed::names).iter().all(String::is_empty));
    }
}
