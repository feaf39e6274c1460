use std::fmt::Debug;
use std::ops::RangeBounds;

use thiserror::Error;

pub mod treap;

pub type Idx = usize;

/// Seed used when none is given explicitly.
pub const DEFAULT_SEED: u64 = 2012;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutOfRange {
    #[error("position {pos} is out of range for a sequence of length {len}")]
    Position { pos: usize, len: usize },
    /// `end` is exclusive.
    #[error("range {start}..{end} is empty or out of range for a sequence of length {len}")]
    Range { start: usize, end: usize, len: usize },
    /// Some value of the range would leave the `i64` domain.
    #[error("adding {delta} to the range overflows i64")]
    Overflow { delta: i64 },
}

/// Direction of a permutation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lexicographic successor.
    Next,
    /// Lexicographic predecessor.
    Prev,
}

/// A mutable sequence of `i64` supporting positional edits, range updates and in-place
/// permutation stepping of any contiguous range.
///
/// Ranges must be non-empty and lie inside `0..len()`, otherwise `OutOfRange::Range` is
/// returned and the sequence is left untouched.
pub trait Sequence
where
    Self: Debug,
{
    /// Empty sequence whose internal randomness is seeded with `seed`.
    fn with_seed(seed: u64) -> Self
    where
        Self: Sized;
    /// New sequence with given values, in order.
    fn from_values(seed: u64, values: impl IntoIterator<Item = i64>) -> Self
    where
        Self: Sized,
    {
        let mut seq = Self::with_seed(seed);
        for value in values {
            seq.push_back(value);
        }
        seq
    }
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Append `value` at the end.
    fn push_back(&mut self, value: i64);
    /// Insert `value` so that it ends up at position `pos`. Requires `pos <= len()`.
    fn insert(&mut self, pos: usize, value: i64) -> Result<(), OutOfRange>;
    /// Remove the element at `pos` and return it. Requires `pos < len()`.
    fn remove(&mut self, pos: usize) -> Result<i64, OutOfRange>;
    /// Sum of the values in the range, wrapping on overflow.
    fn range_sum(&mut self, range: impl RangeBounds<usize>) -> Result<i64, OutOfRange>;
    /// Add `delta` to every value in the range. Fails with `OutOfRange::Overflow`, changing
    /// nothing, if any value would overflow.
    fn range_add(&mut self, delta: i64, range: impl RangeBounds<usize>) -> Result<(), OutOfRange>;
    /// Overwrite every value in the range with `value`.
    fn range_set(&mut self, value: i64, range: impl RangeBounds<usize>) -> Result<(), OutOfRange>;
    /// Reverse the order of the range.
    fn reverse(&mut self, range: impl RangeBounds<usize>) -> Result<(), OutOfRange>;
    /// Rearrange the range into the next or previous lexicographic permutation. Returns
    /// false if it wrapped around, ie. the range was the last (first) permutation and is
    /// now the first (last) one.
    fn permutation_step(
        &mut self,
        direction: Direction,
        range: impl RangeBounds<usize>,
    ) -> Result<bool, OutOfRange>;
    fn next_permutation(&mut self, range: impl RangeBounds<usize>) -> Result<bool, OutOfRange> {
        self.permutation_step(Direction::Next, range)
    }
    fn prev_permutation(&mut self, range: impl RangeBounds<usize>) -> Result<bool, OutOfRange> {
        self.permutation_step(Direction::Prev, range)
    }
    /// All values, in order.
    fn to_vec(&mut self) -> Vec<i64>;
    fn clear(&mut self);
}

/// Converts a range to `[start, end)`, checking it is non-empty and fits in `len`.
pub fn range_to_lr(range: impl RangeBounds<usize>, len: usize) -> Result<[usize; 2], OutOfRange> {
    use std::ops::Bound::*;
    let start = match range.start_bound() {
        Included(start) => Some(*start),
        Excluded(start) => start.checked_add(1),
        Unbounded => Some(0),
    };
    let end = match range.end_bound() {
        Included(end) => end.checked_add(1),
        Excluded(end) => Some(*end),
        Unbounded => Some(len),
    };
    match (start, end) {
        (Some(start), Some(end)) if start < end && end <= len => Ok([start, end]),
        (start, end) => Err(OutOfRange::Range {
            start: start.unwrap_or(usize::MAX),
            end: end.unwrap_or(usize::MAX),
            len,
        }),
    }
}
