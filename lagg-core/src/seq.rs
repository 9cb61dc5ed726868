//! Wrap-aware arithmetic over the 16-bit frame sequence counter.
//!
//! Sequence numbers wrap modulo [`RANGE`], so plain `<`/`>` comparisons break
//! down near the wrap point. Ordering is decided with half-range comparison:
//! `seq` is ahead of `rx` when the forward distance from `rx` is non-zero and
//! below [`HALF_RANGE`].

/// Sequence number carried in every frame header.
pub type SeqNum = u16;

/// Size of the sequence space (matches the 16-bit header field).
pub const RANGE: u32 = 1 << 16;

/// Half of the sequence space; the recency window.
pub const HALF_RANGE: u32 = RANGE / 2;

/// Forward distance from `from` to `to`, assuming `to` is ahead of `from`.
///
/// # Examples
///
/// ```
/// use lagg_core::seq::seq_distance;
/// assert_eq!(seq_distance(10, 15), 5);
/// // 65535 -> 0 is one step forward
/// assert_eq!(seq_distance(65535, 0), 1);
/// ```
pub fn seq_distance(from: SeqNum, to: SeqNum) -> u32 {
    if from <= to {
        u32::from(to) - u32::from(from)
    } else {
        (u32::from(to) + RANGE) - u32::from(from)
    }
}

/// True iff `seq` is ahead of `rx_seq` by strictly less than half the range.
///
/// `seq == rx_seq` is not recent: that number has already been delivered.
pub fn is_recent(seq: SeqNum, rx_seq: SeqNum) -> bool {
    let dist = seq_distance(rx_seq, seq);
    dist > 0 && dist < HALF_RANGE
}

/// The sequence number following `seq`.
pub fn next(seq: SeqNum) -> SeqNum {
    seq.wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_distance_forward() {
        assert_eq!(seq_distance(0, 0), 0);
        assert_eq!(seq_distance(1, 2), 1);
        assert_eq!(seq_distance(100, 65535), 65435);
    }

    #[test]
    fn test_distance_wrapped() {
        assert_eq!(seq_distance(65535, 0), 1);
        assert_eq!(seq_distance(65530, 4), 10);
        assert_eq!(seq_distance(1, 0), 65535);
    }

    #[test]
    fn test_recent_wraparound() {
        // rx_seq = 65535: sequence 0 is ahead by one, not behind
        assert!(is_recent(0, 65535));
        assert!(is_recent(100, 65535));
        assert!(!is_recent(65535, 65535));
        assert!(!is_recent(65534, 65535));
    }

    #[test]
    fn test_recent_window_edges() {
        assert!(is_recent(1, 0));
        assert!(is_recent(32767, 0));
        assert!(!is_recent(32768, 0));
        assert!(!is_recent(65535, 0));
    }

    #[test]
    fn test_next_wraps() {
        assert_eq!(next(65535), 0);
        assert_eq!(next(7), 8);
    }

    proptest! {
        #[test]
        fn prop_distance_matches_wrapping_sub(from in any::<u16>(), to in any::<u16>()) {
            prop_assert_eq!(seq_distance(from, to), u32::from(to.wrapping_sub(from)));
        }

        #[test]
        fn prop_recent_is_antisymmetric(a in any::<u16>(), b in any::<u16>()) {
            // Two distinct numbers can't both be ahead of each other.
            prop_assert!(!(is_recent(a, b) && is_recent(b, a)));
        }

        #[test]
        fn prop_successor_is_recent(rx in any::<u16>()) {
            prop_assert!(is_recent(next(rx), rx));
        }
    }
}
