//! Shared helpers used across the crate.

mod bitset;
mod dot;

pub use bitset::BitSet;
pub use dot::escape_dot;
