//! Chunk boundaries. These are pure functions of the axis length, the number
//! of workers and the worker's rank, so no worker ever needs to ask another
//! where its chunk starts.

use std::ops::Range;

/// The number of elements of an axis of length `n` that `rank` holds when it
/// is split over `size` workers. Earlier ranks get the remainder.
pub fn local_len(n: usize, size: usize, rank: usize) -> usize {
    n / size + usize::from(rank < n % size)
}

/// The first index of `rank`'s chunk.
pub fn local_start(n: usize, size: usize, rank: usize) -> usize {
    rank * (n / size) + rank.min(n % size)
}

/// The indices of `rank`'s chunk.
pub fn local_range(n: usize, size: usize, rank: usize) -> Range<usize> {
    let start = local_start(n, size, rank);
    start..start + local_len(n, size, rank)
}

/// The chunk lengths of all ranks.
pub fn split_lengths(n: usize, size: usize) -> Vec<usize> {
    (0..size).map(|rank| local_len(n, size, rank)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remainder_goes_to_earliest_ranks() {
        assert_eq!(split_lengths(10, 3), vec![4, 3, 3]);
        assert_eq!(split_lengths(10, 2), vec![5, 5]);
        assert_eq!(split_lengths(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(local_range(10, 3, 0), 0..4);
        assert_eq!(local_range(10, 3, 1), 4..7);
        assert_eq!(local_range(10, 3, 2), 7..10);
        assert_eq!(local_range(2, 4, 3), 2..2);
    }

    #[test]
    fn test_ranges_tile_the_axis() {
        for n in 1..40 {
            for size in 1..9 {
                let mut next = 0;
                for rank in 0..size {
                    let r = local_range(n, size, rank);
                    assert_eq!(r.start, next);
                    next = r.end;
                }
                assert_eq!(next, n);
            }
        }
    }
}
