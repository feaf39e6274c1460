pub mod query;
pub mod sequence;

pub use query::{solve, Input, Output, Query};
pub use sequence::{treap::Treap, Direction, OutOfRange, Sequence, DEFAULT_SEED};
