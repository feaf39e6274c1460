use std::ops::RangeBounds;

use perm_treap::sequence::{range_to_lr, Direction, OutOfRange, Sequence};

/// Dummy implementation, most of the operations take linear time.
#[derive(Clone, Debug, Default)]
pub struct SlowSequence {
    values: Vec<i64>,
}

impl SlowSequence {
    fn slice(&mut self, range: impl RangeBounds<usize>) -> Result<&mut [i64], OutOfRange> {
        let [l, r] = range_to_lr(range, self.values.len())?;
        Ok(&mut self.values[l..r])
    }
}

/// Returns false and wraps around if `arr` is already the last permutation.
pub fn next_permutation(arr: &mut [i64]) -> bool {
    match arr.windows(2).rposition(|w| w[0] < w[1]) {
        Some(i) => {
            let j = i + arr[i + 1..].partition_point(|x| &arr[i] < x);
            arr.swap(i, j);
            arr[i + 1..].reverse();
            true
        }
        None => {
            arr.reverse();
            false
        }
    }
}

pub fn prev_permutation(arr: &mut [i64]) -> bool {
    match arr.windows(2).rposition(|w| w[0] > w[1]) {
        Some(i) => {
            let j = i + arr[i + 1..].partition_point(|x| &arr[i] > x);
            arr.swap(i, j);
            arr[i + 1..].reverse();
            true
        }
        None => {
            arr.reverse();
            false
        }
    }
}

impl Sequence for SlowSequence {
    fn with_seed(_seed: u64) -> Self {
        Self::default()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn push_back(&mut self, value: i64) {
        self.values.push(value);
    }

    fn insert(&mut self, pos: usize, value: i64) -> Result<(), OutOfRange> {
        let len = self.len();
        if pos > len {
            return Err(OutOfRange::Position { pos, len });
        }
        self.values.insert(pos, value);
        Ok(())
    }

    fn remove(&mut self, pos: usize) -> Result<i64, OutOfRange> {
        let len = self.len();
        if pos >= len {
            return Err(OutOfRange::Position { pos, len });
        }
        Ok(self.values.remove(pos))
    }

    fn range_sum(&mut self, range: impl RangeBounds<usize>) -> Result<i64, OutOfRange> {
        Ok(self
            .slice(range)?
            .iter()
            .fold(0i64, |acc, &x| acc.wrapping_add(x)))
    }

    fn range_add(&mut self, delta: i64, range: impl RangeBounds<usize>) -> Result<(), OutOfRange> {
        let slice = self.slice(range)?;
        if slice.iter().any(|x| x.checked_add(delta).is_none()) {
            return Err(OutOfRange::Overflow { delta });
        }
        slice.iter_mut().for_each(|x| *x += delta);
        Ok(())
    }

    fn range_set(&mut self, value: i64, range: impl RangeBounds<usize>) -> Result<(), OutOfRange> {
        self.slice(range)?.fill(value);
        Ok(())
    }

    fn reverse(&mut self, range: impl RangeBounds<usize>) -> Result<(), OutOfRange> {
        self.slice(range)?.reverse();
        Ok(())
    }

    fn permutation_step(
        &mut self,
        direction: Direction,
        range: impl RangeBounds<usize>,
    ) -> Result<bool, OutOfRange> {
        let slice = self.slice(range)?;
        Ok(match direction {
            Direction::Next => next_permutation(slice),
            Direction::Prev => prev_permutation(slice),
        })
    }

    fn to_vec(&mut self) -> Vec<i64> {
        self.values.clone()
    }

    fn clear(&mut self) {
        self.values.clear();
    }
}
