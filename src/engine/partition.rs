//! Key to reducer routing
//!
//! Both sides of the shuffle rely on this being the only place that decides
//! which reducer owns a key.

/// 32-bit polynomial hash over the key's UTF-16 code units
///
/// Depends only on the key's content, so it is stable across runs, processes
/// and platforms.
pub fn stable_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Reducer index for `key` in `[0, reducers)`
///
/// The sign bit is masked off rather than negated, so `i32::MIN` maps to a
/// valid index. `reducers` must be non-zero; job validation rejects zero.
pub fn partition(key: &str, reducers: usize) -> usize {
    debug_assert!(reducers > 0, "reducer count must be positive");
    if reducers == 0 {
        return 0;
    }
    let masked = (stable_hash(key) & i32::MAX) as u32 as usize;
    masked % reducers
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_hash_values() {
        assert_eq!(stable_hash(""), 0);
        assert_eq!(stable_hash("a"), 97);
        assert_eq!(stable_hash("ab"), 97 * 31 + 98);
        assert_eq!(stable_hash("hello"), 99_162_322);
    }

    #[test]
    fn test_single_reducer_owns_everything() {
        for key in ["", "a", "the", "zebra", "🦀"] {
            assert_eq!(partition(key, 1), 0);
        }
    }

    #[test]
    fn test_negative_hash_is_masked() {
        // "polygenelubricants" hashes to i32::MIN
        assert_eq!(stable_hash("polygenelubricants"), i32::MIN);
        assert_eq!(partition("polygenelubricants", 7), 0);
    }

    #[test]
    fn test_zero_reducers_does_not_panic_in_release() {
        if cfg!(debug_assertions) {
            return;
        }
        assert_eq!(partition("key", 0), 0);
    }

    proptest! {
        #[test]
        fn test_partition_in_range(key in ".{0,40}", reducers in 1usize..64) {
            prop_assert!(partition(&key, reducers) < reducers);
        }

        #[test]
        fn test_partition_is_deterministic(key in ".{0,40}", reducers in 1usize..64) {
            let owned = key.clone();
            prop_assert_eq!(partition(&key, reducers), partition(&owned, reducers));
        }
    }
}
