//! Control-flow block builder.
//!
//! [`BlockBuilder`] turns a [`CodeItem`] into the block skeleton of a
//! [`MethodGraph`]: one block per block-start offset, normal edges for
//! fall-through, branches, switches and returns, and synthetic try boundary
//! blocks carrying the exceptional edges into handlers.
//!
//! # Phases
//!
//! 1. **Block starts**: offset 0, try range starts and ends, handler addresses,
//!    branch and switch targets, and the instruction after every branch,
//!    switch or `move-exception` that can continue.
//! 2. **Linking**: fall-through edges (including returns and throws into the
//!    exit block) are linked while walking the stream; branch and case edges
//!    are linked afterwards, once every block exists. A conditional block
//!    therefore lists its fall-through before its branch target, and a block
//!    reached by fall-through lists that predecessor before any branch.
//! 3. **Try boundaries**: handlers get a landing pad when needed, protected
//!    blocks that can throw get an entry boundary and an exit boundary on every
//!    edge leaving the region.
//!
//! Small and sparse switches are lowered to a chain of case blocks, one per key
//! after the first; the instruction builder fills them with compare-and-branch.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    bytecode::{CodeItem, FlowType, Opcode},
    config::BuildStats,
    ir::{BlockFlags, BlockId, MethodGraph, Op, TryBoundaryKind, TryCatchInfo},
    types::DataType,
    Result,
};

/// Where the bytecode of a method landed in the block graph.
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    starts: BTreeMap<u32, BlockId>,
    case_blocks: HashMap<u32, Vec<BlockId>>,
    /// Measurements of the body
    pub stats: BuildStats,
}

impl BlockMap {
    /// The block whose first instruction is at `offset`.
    #[must_use]
    pub fn block_at(&self, offset: u32) -> Option<BlockId> {
        self.starts.get(&offset).copied()
    }

    /// Returns `true` if a block starts at `offset`.
    #[must_use]
    pub fn is_block_start(&self, offset: u32) -> bool {
        self.starts.contains_key(&offset)
    }

    /// Case blocks of the lowered switch at `switch_offset`, in key order
    /// starting with the second key.
    #[must_use]
    pub fn case_blocks(&self, switch_offset: u32) -> &[BlockId] {
        self.case_blocks
            .get(&switch_offset)
            .map_or(&[], Vec::as_slice)
    }

    /// Block starts in offset order.
    pub fn starts(&self) -> impl Iterator<Item = (u32, BlockId)> + '_ {
        self.starts.iter().map(|(offset, block)| (*offset, *block))
    }
}

/// Builds the block skeleton of one method body.
pub struct BlockBuilder<'a> {
    graph: &'a mut MethodGraph,
    code: &'a CodeItem,
    map: BlockMap,
    throwing_blocks: Vec<BlockId>,
}

impl<'a> BlockBuilder<'a> {
    /// Creates a builder filling `graph`, which must hold only its entry block.
    pub fn new(graph: &'a mut MethodGraph, code: &'a CodeItem) -> Self {
        BlockBuilder {
            graph,
            code,
            map: BlockMap::default(),
            throwing_blocks: Vec::new(),
        }
    }

    /// Creates, links and guards the blocks of the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] for an empty body, a branch,
    /// switch case or handler that does not start an instruction, control
    /// falling off the end of the code, or a try range past the end of the code.
    pub fn build(mut self) -> Result<BlockMap> {
        self.code.validate()?;
        self.map.stats.code_units = self.code.code_units();
        self.map.stats.instructions = self.code.instructions.len();

        self.create_blocks()?;
        self.link_blocks()?;
        self.insert_try_boundaries()?;

        log::debug!(
            "method {}: {} blocks, {} branches, {} handlers",
            self.graph.method_index(),
            self.graph.block_count(),
            self.map.stats.branches,
            self.map.stats.catch_handlers
        );
        Ok(self.map)
    }

    /// Builds the skeleton of a body with no bytecode: entry, one body block
    /// and exit. Returns the body block.
    pub fn build_minimal(graph: &mut MethodGraph) -> BlockId {
        let body = graph.add_block(None, BlockFlags::empty());
        let exit = graph.add_exit_block();
        graph.add_edge(graph.entry(), body);
        graph.add_edge(body, exit);
        body
    }

    fn block_at(&self, offset: u32) -> Result<BlockId> {
        self.map
            .block_at(offset)
            .ok_or_else(|| invalid_bytecode!("no block starts at {:#x}", offset))
    }

    fn create_blocks(&mut self) -> Result<()> {
        let code = self.code;
        let size = code.code_units();
        match code.instructions.first() {
            None => return Err(invalid_bytecode!("method body has no instructions")),
            Some(first) if first.offset != 0 => {
                return Err(invalid_bytecode!("first instruction at {:#x}", first.offset))
            }
            Some(_) => {}
        }

        let mut starts = BTreeSet::from([0u32]);
        for item in &code.tries {
            starts.insert(item.start);
            if item.end > size {
                return Err(invalid_bytecode!(
                    "try range {:#x}..{:#x} ends past the code ({} code units)",
                    item.start,
                    item.end,
                    size
                ));
            }
            if item.end < size {
                starts.insert(item.end);
            }
            starts.extend(item.handlers.iter().map(|h| h.address));
        }

        for insn in &code.instructions {
            if insn.opcode.is_branch() {
                self.map.stats.branches += 1;
                starts.insert(insn.target()?);
            } else if insn.opcode.is_switch() {
                self.map.stats.branches += 1;
                starts.extend(insn.switch_table()?.targets.iter().copied());
            } else if insn.opcode != Opcode::MoveException {
                continue;
            }
            if insn.opcode.can_continue() {
                let next = insn.next_offset();
                if next >= size {
                    return Err(invalid_bytecode!(
                        "'{}' at {:#x} falls through past the end of the code",
                        insn.opcode,
                        insn.offset
                    ));
                }
                starts.insert(next);
            }
        }

        if let Some(bad) = starts.iter().find(|offset| code.index_of(**offset).is_none()) {
            return Err(invalid_bytecode!(
                "control transfers to {:#x}, which does not start an instruction",
                bad
            ));
        }

        // Blocks are numbered in code order; case blocks follow their switch.
        for insn in &code.instructions {
            if starts.contains(&insn.offset) {
                let block = self.graph.add_block(Some(insn.offset), BlockFlags::empty());
                self.map.starts.insert(insn.offset, block);
            }
            if insn.opcode.is_switch() {
                let table = insn.switch_table()?;
                if table.builds_decision_tree() && table.len() > 1 {
                    let cases = (1..table.len())
                        .map(|_| self.graph.add_block(Some(insn.offset), BlockFlags::SYNTHETIC))
                        .collect();
                    self.map.case_blocks.insert(insn.offset, cases);
                }
            }
        }
        self.graph.add_exit_block();
        Ok(())
    }

    fn link_blocks(&mut self) -> Result<()> {
        let Some(exit) = self.graph.exit() else {
            return Err(invalid_bytecode!("exit block missing"));
        };
        let entry = self.graph.entry();
        let first = self.block_at(0)?;
        self.graph.add_edge(entry, first);

        let mut pending: Vec<(BlockId, u32)> = Vec::new();
        let mut current: Option<BlockId> = None;
        let mut throwing = false;

        for insn in &self.code.instructions {
            if let Some(start) = self.map.block_at(insn.offset) {
                if let Some(block) = current {
                    self.graph.add_edge(block, start);
                }
                current = Some(start);
                throwing = false;
            }
            // Unreachable code after an unconditional transfer.
            let Some(block) = current else {
                continue;
            };
            self.graph.block_mut(block).end_offset = Some(insn.next_offset());

            if !throwing && insn.opcode.can_throw() {
                throwing = true;
                self.throwing_blocks.push(block);
            }

            match insn.opcode.flow() {
                FlowType::Sequential => continue,
                FlowType::UnconditionalBranch => pending.push((block, insn.target()?)),
                FlowType::ConditionalBranch => {
                    let fallthrough = self.block_at(insn.next_offset())?;
                    self.graph.add_edge(block, fallthrough);
                    pending.push((block, insn.target()?));
                }
                FlowType::Switch => {
                    let table = insn.switch_table()?;
                    let fallthrough = self.block_at(insn.next_offset())?;
                    if table.builds_decision_tree() {
                        let cases = self.map.case_blocks(insn.offset).to_vec();
                        let mut compare = block;
                        for (index, target) in table.targets.iter().enumerate() {
                            let next = cases.get(index).copied().unwrap_or(fallthrough);
                            self.graph.add_edge(compare, next);
                            pending.push((compare, *target));
                            compare = next;
                        }
                        if table.is_empty() {
                            self.graph.add_edge(block, fallthrough);
                        }
                    } else {
                        self.graph.add_edge(block, fallthrough);
                        pending.extend(table.targets.iter().map(|target| (block, *target)));
                    }
                }
                FlowType::Return | FlowType::Throw => self.graph.add_edge(block, exit),
            }
            current = None;
        }

        if current.is_some() {
            return Err(invalid_bytecode!("control falls through past the end of the code"));
        }

        for (block, target) in pending {
            let target = self.block_at(target)?;
            self.graph.add_edge(block, target);
        }
        Ok(())
    }

    fn try_item_of(&self, try_blocks: &BTreeMap<BlockId, usize>, block: BlockId) -> Option<usize> {
        try_blocks.get(&block).copied()
    }

    fn insert_try_boundaries(&mut self) -> Result<()> {
        if self.code.tries.is_empty() {
            return Ok(());
        }
        self.graph.has_try_catch = true;

        // Protected blocks without a throwing instruction are treated as
        // unprotected; they need no exceptional edges.
        let mut try_blocks: BTreeMap<BlockId, usize> = BTreeMap::new();
        for block in &self.throwing_blocks {
            let Some(offset) = self.graph.block(*block).offset else {
                continue;
            };
            if let Some(index) = self.code.tries.iter().position(|t| t.covers(offset)) {
                try_blocks.insert(*block, index);
            }
        }

        let mut catch_blocks: HashMap<u32, BlockId> = HashMap::new();
        for item in &self.code.tries {
            for handler in &item.handlers {
                if catch_blocks.contains_key(&handler.address) {
                    continue;
                }
                let mut catch_block = self.block_at(handler.address)?;
                if try_blocks.contains_key(&catch_block)
                    || self.might_have_live_normal_predecessors(catch_block, handler.address)
                {
                    let pad = self
                        .graph
                        .add_block(Some(handler.address), BlockFlags::SYNTHETIC);
                    self.graph
                        .append(pad, Op::Goto, DataType::Void, &[], Some(handler.address));
                    self.graph.add_edge(pad, catch_block);
                    log::trace!("landing pad {} for handler at {:#x}", pad, handler.address);
                    catch_block = pad;
                }
                catch_blocks.insert(handler.address, catch_block);
                self.graph.block_mut(catch_block).try_catch = Some(TryCatchInfo::Catch {
                    type_index: handler.type_index,
                });
            }
        }
        self.map.stats.catch_handlers = catch_blocks.len();

        // One entry boundary per region entry, shared by all predecessors so
        // that loop headers keep a single dominator.
        for (&block, &item) in &try_blocks {
            let entered_from_outside = self
                .graph
                .block(block)
                .predecessors()
                .iter()
                .any(|pred| self.try_item_of(&try_blocks, *pred) != Some(item));
            if !entered_from_outside {
                continue;
            }
            let offset = self.graph.block(block).offset;
            let boundary = self
                .graph
                .add_block(offset, BlockFlags::SYNTHETIC | BlockFlags::TRY_BOUNDARY);
            self.graph.reroute_predecessors(block, boundary);
            self.graph.append(
                boundary,
                Op::TryBoundary {
                    kind: TryBoundaryKind::Entry,
                },
                DataType::Void,
                &[],
                offset,
            );
            self.link_handlers(boundary, item, &catch_blocks)?;
        }

        for (&block, &item) in &try_blocks {
            let mut position = 0;
            while position < self.graph.block(block).successors().len() {
                let successor = self.graph.block(block).successors()[position];
                position += 1;
                if let Some(other) = self.try_item_of(&try_blocks, successor) {
                    debug_assert_eq!(other, item, "edge between try regions without boundary");
                    continue;
                }
                let boundary = self.graph.split_edge(
                    block,
                    successor,
                    Op::TryBoundary {
                        kind: TryBoundaryKind::Exit,
                    },
                    BlockFlags::TRY_BOUNDARY,
                );
                self.link_handlers(boundary, item, &catch_blocks)?;
            }
        }
        Ok(())
    }

    /// A handler starting with `move-exception` is only entered exceptionally.
    /// Otherwise any normal predecessor might survive dead block removal.
    fn might_have_live_normal_predecessors(&self, block: BlockId, address: u32) -> bool {
        let starts_with_move_exception = self
            .code
            .instruction_at(address)
            .is_some_and(|insn| insn.opcode == Opcode::MoveException);
        !starts_with_move_exception && !self.graph.block(block).predecessors().is_empty()
    }

    fn link_handlers(&mut self, boundary: BlockId, item: usize, catch_blocks: &HashMap<u32, BlockId>) -> Result<()> {
        for handler in &self.code.tries[item].handlers {
            let Some(&catch_block) = catch_blocks.get(&handler.address) else {
                return Err(invalid_bytecode!("handler at {:#x} has no block", handler.address));
            };
            if !self.graph.block(boundary).successors().contains(&catch_block) {
                self.graph.add_edge(boundary, catch_block);
            }
        }
        Ok(())
    }
}
