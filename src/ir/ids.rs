//! Handles into the method graph arena.
//!
//! Blocks and values live in vectors owned by [`MethodGraph`](super::MethodGraph);
//! they refer to each other through these copyable indices instead of pointers,
//! so cycles (loops, phi inputs, use lists) need no shared ownership.

use std::fmt;

/// Identifier of a basic block.
///
/// Block ids are assigned in creation order and never reused. A removed block
/// keeps its id; it is only unlinked from the graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Creates a `BlockId` from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the raw index, usable to index per-block side tables.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Identifier of a value node (phi, parameter, constant or operation).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub(crate) usize);

impl ValueId {
    /// Creates a `ValueId` from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        ValueId(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueId({})", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<usize> for BlockId {
    fn from(index: usize) -> Self {
        BlockId(index)
    }
}

impl From<BlockId> for usize {
    fn from(id: BlockId) -> Self {
        id.0
    }
}

impl From<usize> for ValueId {
    fn from(index: usize) -> Self {
        ValueId(index)
    }
}

impl From<ValueId> for usize {
    fn from(id: ValueId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting() {
        assert_eq!(format!("{}", BlockId::new(3)), "B3");
        assert_eq!(format!("{:?}", BlockId::new(3)), "BlockId(3)");
        assert_eq!(format!("{}", ValueId::new(12)), "v12");
    }

    #[test]
    fn test_conversions() {
        let id: ValueId = 4usize.into();
        assert_eq!(usize::from(id), 4);
        assert!(BlockId::new(1) < BlockId::new(2));
    }
}
