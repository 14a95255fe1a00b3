//! Basic blocks of the method graph.
//!
//! A [`BasicBlock`] holds ordered predecessor and successor lists, a phi list and
//! an instruction list. Edge order is significant: phi inputs follow predecessor
//! order, and the terminator's successor order encodes branch semantics
//! (see [`Op`](super::Op)).
//!
//! Blocks carry their exception-handling role in [`TryCatchInfo`] and, once the
//! CFG has been analyzed, their immediate dominator and [`LoopInfo`] when they
//! head a loop.

use bitflags::bitflags;

use crate::{
    ir::{BlockId, ValueId},
    utils::BitSet,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Structural role flags of a basic block
    pub struct BlockFlags: u32 {
        /// The unique entry block
        const ENTRY = 0x0001;
        /// The unique exit block
        const EXIT = 0x0002;
        /// Created by the builders, not by a bytecode block start; never translated
        const SYNTHETIC = 0x0004;
        /// Ends in a try boundary
        const TRY_BOUNDARY = 0x0008;
        /// Unreachable and unlinked from the graph
        const REMOVED = 0x0010;
    }
}

/// Exception-handling role of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TryCatchInfo {
    /// Inside a protected region entered through the given try-entry boundary
    /// block; the boundary's exceptional successors are the active handlers.
    Try {
        /// The try-entry boundary block of the region
        entry: BlockId,
    },
    /// First block of an exception handler.
    Catch {
        /// Caught type index, `None` for catch-all
        type_index: Option<u32>,
    },
}

/// Loop headed by a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInfo {
    /// The loop header
    pub header: BlockId,
    /// The single predecessor outside the loop, once the loop is simplified
    pub pre_header: Option<BlockId>,
    /// Predecessors of the header that close the loop
    pub back_edges: Vec<BlockId>,
    /// Blocks of the loop body, header included
    pub blocks: BitSet,
    /// `true` if the header does not dominate all back edges
    pub irreducible: bool,
}

impl LoopInfo {
    /// Creates loop information with no body yet.
    #[must_use]
    pub fn new(header: BlockId, block_capacity: usize) -> Self {
        LoopInfo {
            header,
            pre_header: None,
            back_edges: Vec::new(),
            blocks: BitSet::new(block_capacity),
            irreducible: false,
        }
    }

    /// Returns `true` if `block` is a back edge of this loop.
    #[must_use]
    pub fn is_back_edge(&self, block: BlockId) -> bool {
        self.back_edges.contains(&block)
    }

    /// Returns `true` if `block` belongs to the loop body.
    #[must_use]
    pub fn contains(&self, block: BlockId) -> bool {
        block.index() < self.blocks.len() && self.blocks.contains(block.index())
    }
}

/// A basic block.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Identity of the block
    pub id: BlockId,
    /// Offset of the first covered instruction. Synthetic blocks carry the
    /// offset they stand in for; entry and exit carry none.
    pub offset: Option<u32>,
    /// First offset past the block's instructions, for bytecode blocks
    pub end_offset: Option<u32>,
    pub(crate) predecessors: Vec<BlockId>,
    pub(crate) successors: Vec<BlockId>,
    pub(crate) phis: Vec<ValueId>,
    pub(crate) instructions: Vec<ValueId>,
    /// Role flags
    pub flags: BlockFlags,
    /// Exception-handling role
    pub try_catch: Option<TryCatchInfo>,
    /// Loop information, present on loop headers
    pub loop_info: Option<LoopInfo>,
    /// Immediate dominator; `None` for the entry block and before analysis
    pub dominator: Option<BlockId>,
}

impl BasicBlock {
    /// Creates an unlinked, empty block.
    #[must_use]
    pub fn new(id: BlockId, offset: Option<u32>, flags: BlockFlags) -> Self {
        BasicBlock {
            id,
            offset,
            end_offset: None,
            predecessors: Vec::new(),
            successors: Vec::new(),
            phis: Vec::new(),
            instructions: Vec::new(),
            flags,
            try_catch: None,
            loop_info: None,
            dominator: None,
        }
    }

    /// Predecessors, in phi input order.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// Successors, in terminator order.
    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    /// Successors reached without an exception.
    #[must_use]
    pub fn normal_successors(&self) -> &[BlockId] {
        if self.is_try_boundary() {
            &self.successors[..self.successors.len().min(1)]
        } else {
            &self.successors
        }
    }

    /// Handler blocks reached exceptionally; only try boundaries have any.
    #[must_use]
    pub fn exceptional_successors(&self) -> &[BlockId] {
        if self.is_try_boundary() && !self.successors.is_empty() {
            &self.successors[1..]
        } else {
            &[]
        }
    }

    /// Phis, in creation order.
    #[must_use]
    pub fn phis(&self) -> &[ValueId] {
        &self.phis
    }

    /// Instructions, in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[ValueId] {
        &self.instructions
    }

    /// The last instruction, normally the terminator.
    #[must_use]
    pub fn last_instruction(&self) -> Option<ValueId> {
        self.instructions.last().copied()
    }

    /// Index of `pred` in the predecessor list.
    #[must_use]
    pub fn predecessor_index(&self, pred: BlockId) -> Option<usize> {
        self.predecessors.iter().position(|p| *p == pred)
    }

    /// Returns `true` for the entry block.
    #[must_use]
    pub fn is_entry(&self) -> bool {
        self.flags.contains(BlockFlags::ENTRY)
    }

    /// Returns `true` for the exit block.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        self.flags.contains(BlockFlags::EXIT)
    }

    /// Returns `true` for blocks with no bytecode of their own.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.flags.contains(BlockFlags::SYNTHETIC)
    }

    /// Returns `true` for try boundary blocks.
    #[must_use]
    pub fn is_try_boundary(&self) -> bool {
        self.flags.contains(BlockFlags::TRY_BOUNDARY)
    }

    /// Returns `true` once the block was removed as unreachable.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.flags.contains(BlockFlags::REMOVED)
    }

    /// Returns `true` for loop headers.
    #[must_use]
    pub fn is_loop_header(&self) -> bool {
        self.loop_info.is_some()
    }

    /// Returns `true` for the first block of an exception handler.
    #[must_use]
    pub fn is_catch_block(&self) -> bool {
        matches!(self.try_catch, Some(TryCatchInfo::Catch { .. }))
    }

    /// Returns `true` for blocks inside a protected region.
    #[must_use]
    pub fn is_try_block(&self) -> bool {
        matches!(self.try_catch, Some(TryCatchInfo::Try { .. }))
    }

    /// The try-entry boundary of the block's protected region.
    #[must_use]
    pub fn try_entry(&self) -> Option<BlockId> {
        match self.try_catch {
            Some(TryCatchInfo::Try { entry }) => Some(entry),
            _ => None,
        }
    }
}
