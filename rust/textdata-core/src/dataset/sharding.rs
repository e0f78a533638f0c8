// rust/textdata-core/src/dataset/sharding.rs

use crate::error::Result;
use crate::gang::validate_coordinates;

/// Partitions a stream across `world_size` ranks, keeping only the items
/// that belong to `rank`.
///
/// Items are dealt out round-robin: the `i`-th item of the stream goes to
/// rank `i % world_size`. Each rank keeps the relative order of its items
/// and the partition depends on nothing but the position in the stream.
///
/// With `allow_uneven` the trailing items are handed out as usual and ranks
/// may end up one item apart. Without it the stream is consumed in groups
/// of `world_size` and a trailing incomplete group is dropped on every
/// rank, so all ranks see the same number of items.
///
/// Upstream errors are forwarded on every rank.
pub struct Shard<I> {
    inner: I,
    rank: usize,
    world_size: usize,
    allow_uneven: bool,
    position: usize,
}

impl<I, T> Shard<I>
where
    I: Iterator<Item = Result<T>>,
{
    /// Creates a sharded view of `inner`.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::InvalidShard` if `world_size` is zero or `rank`
    /// is not below it.
    pub fn new(inner: I, rank: u32, world_size: u32, allow_uneven: bool) -> Result<Self> {
        validate_coordinates(rank, world_size)?;

        Ok(Self {
            inner,
            rank: rank as usize,
            world_size: world_size as usize,
            allow_uneven,
            position: 0,
        })
    }

    fn next_uneven(&mut self) -> Option<Result<T>> {
        loop {
            let item = self.inner.next()?;

            let position = self.position;
            self.position += 1;

            if item.is_err() || position % self.world_size == self.rank {
                return Some(item);
            }
        }
    }

    fn next_even(&mut self) -> Option<Result<T>> {
        let mut selected = None;

        // Read one full group; keep our slot, drop the rest.
        for slot in 0..self.world_size {
            match self.inner.next() {
                Some(Ok(item)) => {
                    if slot == self.rank {
                        selected = Some(item);
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => return None,
            }
        }

        selected.map(Ok)
    }
}

impl<I, T> Iterator for Shard<I>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.allow_uneven {
            self.next_uneven()
        } else {
            self.next_even()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReaderError;

    fn shard_of(n: u32, rank: u32, world_size: u32, allow_uneven: bool) -> Vec<u32> {
        Shard::new((0..n).map(Ok), rank, world_size, allow_uneven)
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_shard_round_robin() {
        assert_eq!(shard_of(10, 0, 3, true), vec![0, 3, 6, 9]);
        assert_eq!(shard_of(10, 1, 3, true), vec![1, 4, 7]);
        assert_eq!(shard_of(10, 2, 3, true), vec![2, 5, 8]);
    }

    #[test]
    fn test_shard_completeness() {
        for world_size in 1..6 {
            let mut all: Vec<u32> = (0..world_size)
                .flat_map(|rank| shard_of(37, rank, world_size, true))
                .collect();
            all.sort_unstable();
            assert_eq!(all, (0..37).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_shard_single_rank_is_identity() {
        assert_eq!(shard_of(5, 0, 1, true), vec![0, 1, 2, 3, 4]);
        assert_eq!(shard_of(5, 0, 1, false), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_shard_even_drops_trailing_group() {
        assert_eq!(shard_of(10, 0, 3, false), vec![0, 3, 6]);
        assert_eq!(shard_of(10, 1, 3, false), vec![1, 4, 7]);
        assert_eq!(shard_of(10, 2, 3, false), vec![2, 5, 8]);
    }

    #[test]
    fn test_shard_more_ranks_than_items() {
        assert_eq!(shard_of(2, 3, 4, true), Vec::<u32>::new());
        assert_eq!(shard_of(2, 0, 4, false), Vec::<u32>::new());
    }

    #[test]
    fn test_shard_invalid_rank() {
        assert!(Shard::new((0..3).map(Ok::<u32, ReaderError>), 2, 2, true).is_err());
        assert!(Shard::new((0..3).map(Ok::<u32, ReaderError>), 0, 0, true).is_err());
    }

    #[test]
    fn test_shard_forwards_errors_on_every_rank() {
        for rank in 0..2 {
            let items = vec![Ok(0u32), Err(ReaderError::pipeline("bad line"))];
            let out: Vec<_> = Shard::new(items.into_iter(), rank, 2, true)
                .unwrap()
                .collect();
            assert!(out.iter().any(|r| r.is_err()));
        }
    }
}
