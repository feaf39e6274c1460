use std::fmt::{Display, Formatter};
use std::str::{FromStr, SplitAsciiWhitespace};

use thiserror::Error;

use crate::sequence::{treap::Treap, OutOfRange, Sequence};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("input ended while reading {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("invalid {expected}: {token:?}")]
    InvalidNumber { token: String, expected: &'static str },
    #[error("unknown opcode {opcode}, expected 1 to 7")]
    UnknownOpcode { opcode: u8 },
    #[error("unexpected trailing input {token:?}")]
    TrailingInput { token: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolveError {
    #[error("query #{index} ({query:?}) failed: {source}")]
    Query {
        index: usize,
        query: Query,
        source: OutOfRange,
    },
}

/// One request against the sequence. Ranges are inclusive and 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Sum { l: usize, r: usize },
    Insert { value: i64, pos: usize },
    Remove { pos: usize },
    Set { value: i64, l: usize, r: usize },
    Add { delta: i64, l: usize, r: usize },
    NextPermutation { l: usize, r: usize },
    PrevPermutation { l: usize, r: usize },
}

impl Query {
    pub fn execute(&self, seq: &mut impl Sequence, out: &mut Output) -> Result<(), OutOfRange> {
        match *self {
            Query::Sum { l, r } => out.sums.push(seq.range_sum(l..=r)?),
            Query::Insert { value, pos } => seq.insert(pos, value)?,
            Query::Remove { pos } => {
                seq.remove(pos)?;
            }
            Query::Set { value, l, r } => seq.range_set(value, l..=r)?,
            Query::Add { delta, l, r } => seq.range_add(delta, l..=r)?,
            Query::NextPermutation { l, r } => {
                seq.next_permutation(l..=r)?;
            }
            Query::PrevPermutation { l, r } => {
                seq.prev_permutation(l..=r)?;
            }
        }
        Ok(())
    }
}

/// Whitespace separated tokens of the input.
struct Tokens<'a>(SplitAsciiWhitespace<'a>);

impl<'a> Tokens<'a> {
    fn next<T: FromStr>(&mut self, expected: &'static str) -> Result<T, ParseError> {
        let token = self.0.next().ok_or(ParseError::UnexpectedEnd { expected })?;
        token.parse().map_err(|_| ParseError::InvalidNumber {
            token: token.to_owned(),
            expected,
        })
    }
    fn query(&mut self) -> Result<Query, ParseError> {
        let query = match self.next::<u8>("opcode")? {
            1 => Query::Sum {
                l: self.next("l")?,
                r: self.next("r")?,
            },
            2 => Query::Insert {
                value: self.next("value")?,
                pos: self.next("pos")?,
            },
            3 => Query::Remove {
                pos: self.next("pos")?,
            },
            4 => Query::Set {
                value: self.next("value")?,
                l: self.next("l")?,
                r: self.next("r")?,
            },
            5 => Query::Add {
                delta: self.next("delta")?,
                l: self.next("l")?,
                r: self.next("r")?,
            },
            6 => Query::NextPermutation {
                l: self.next("l")?,
                r: self.next("r")?,
            },
            7 => Query::PrevPermutation {
                l: self.next("l")?,
                r: self.next("r")?,
            },
            opcode => return Err(ParseError::UnknownOpcode { opcode }),
        };
        Ok(query)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input {
    pub elements: Vec<i64>,
    pub queries: Vec<Query>,
}

impl Input {
    /// Parses `n`, `n` elements, `m`, then `m` queries.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut tokens = Tokens(text.split_ascii_whitespace());
        let n: usize = tokens.next("element count")?;
        let elements = (0..n)
            .map(|_| tokens.next("element"))
            .collect::<Result<Vec<i64>, _>>()?;
        let m: usize = tokens.next("query count")?;
        let queries = (0..m)
            .map(|_| tokens.query())
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(token) = tokens.0.next() {
            return Err(ParseError::TrailingInput {
                token: token.to_owned(),
            });
        }
        Ok(Self { elements, queries })
    }
}

/// Results of the sum queries, in order, and the final sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub sums: Vec<i64>,
    pub result: Vec<i64>,
}

impl Display for Output {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for sum in &self.sums {
            writeln!(f, "{sum}")?;
        }
        for (i, x) in self.result.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{x}")?;
        }
        writeln!(f)
    }
}

/// Runs all queries of `input` on a fresh sequence seeded with `seed`. Stops at the first
/// query that fails.
pub fn solve_with<S: Sequence>(input: &Input, seed: u64) -> Result<Output, SolveError> {
    let mut seq = S::from_values(seed, input.elements.iter().copied());
    let mut out = Output::default();
    for (index, query) in input.queries.iter().enumerate() {
        log::trace!("query #{index}: {query:?}");
        query
            .execute(&mut seq, &mut out)
            .map_err(|source| SolveError::Query {
                index,
                query: *query,
                source,
            })?;
    }
    out.result = seq.to_vec();
    log::debug!(
        "answered {} queries, final length {}",
        input.queries.len(),
        out.result.len()
    );
    Ok(out)
}

pub fn solve(input: &Input, seed: u64) -> Result<Output, SolveError> {
    solve_with::<Treap>(input, seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let input = Input::parse("3\n1 2 3\n4\n1 0 2\n2 10 3\n3 0\n7 0 1\n").unwrap();
        assert_eq!(input.elements, vec![1, 2, 3]);
        assert_eq!(
            input.queries,
            vec![
                Query::Sum { l: 0, r: 2 },
                Query::Insert { value: 10, pos: 3 },
                Query::Remove { pos: 0 },
                Query::PrevPermutation { l: 0, r: 1 },
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Input::parse("2 1"),
            Err(ParseError::UnexpectedEnd {
                expected: "element"
            })
        );
        assert_eq!(
            Input::parse("1 x 0"),
            Err(ParseError::InvalidNumber {
                token: "x".into(),
                expected: "element"
            })
        );
        assert_eq!(
            Input::parse("1 5 1 8 0 0"),
            Err(ParseError::UnknownOpcode { opcode: 8 })
        );
        assert_eq!(
            Input::parse("1 5 1 1 0 -1"),
            Err(ParseError::InvalidNumber {
                token: "-1".into(),
                expected: "r"
            })
        );
        assert_eq!(
            Input::parse("0 0 9"),
            Err(ParseError::TrailingInput { token: "9".into() })
        );
    }

    #[test]
    fn test_output_format() {
        let out = Output {
            sums: vec![6, -1],
            result: vec![3, 1, 2],
        };
        assert_eq!(out.to_string(), "6\n-1\n3 1 2\n");
        assert_eq!(Output::default().to_string(), "\n");
    }
}
