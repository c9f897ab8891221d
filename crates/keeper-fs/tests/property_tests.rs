use keeper_fs::io::streams_equal;
use proptest::prelude::*;
use std::io::Cursor;

proptest! {
    #[test]
    fn streams_equal_iff_bytes_equal(
        a in proptest::collection::vec(any::<u8>(), 0..10_000),
        b in proptest::collection::vec(any::<u8>(), 0..10_000),
    ) {
        prop_assert_eq!(streams_equal(Cursor::new(&a), Cursor::new(&b)), a == b);
    }

    #[test]
    fn flipping_one_byte_breaks_equality(
        data in proptest::collection::vec(any::<u8>(), 1..10_000),
        index in any::<prop::sample::Index>(),
    ) {
        let mut changed = data.clone();
        let i = index.index(changed.len());
        changed[i] ^= 0xff;

        prop_assert!(streams_equal(Cursor::new(&data), Cursor::new(&data)));
        prop_assert!(!streams_equal(Cursor::new(&data), Cursor::new(&changed)));
    }
}
