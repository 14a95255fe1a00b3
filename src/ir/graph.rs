//! The method graph arena.
//!
//! [`MethodGraph`] owns every [`BasicBlock`] and [`Value`] of one method. Blocks
//! and values reference each other through [`BlockId`] and [`ValueId`]; all
//! edits that touch more than one node (edges, inputs, use lists, environments)
//! go through the methods here so the back-references stay consistent.
//!
//! Removal never frees arena slots. A removed block is flagged and unlinked, a
//! removed value loses its owning block and its use-list entries. Dropping the
//! graph frees everything at once, which is also what happens when a build is
//! abandoned halfway.
//!
//! Every mutating method bumps [`MethodGraph::revision`], which lets callers
//! detect whether a pass changed anything.

use std::collections::HashMap;

use crate::{
    bytecode::Register,
    ir::{
        BasicBlock, BlockFlags, BlockId, Constant, EnvUse, Environment, Op, PhiInfo, UseSite,
        Value, ValueId, ValueKind,
    },
    types::DataType,
};

/// Control-flow graph of one method in SSA form.
#[derive(Debug, Clone)]
pub struct MethodGraph {
    pub(crate) blocks: Vec<BasicBlock>,
    pub(crate) values: Vec<Value>,
    entry: BlockId,
    pub(crate) exit: Option<BlockId>,
    pub(crate) rpo: Vec<BlockId>,
    method_index: u32,
    registers: u16,
    ins: u16,
    outs: u16,
    constants: HashMap<Constant, ValueId>,
    pub(crate) has_try_catch: bool,
    pub(crate) has_irreducible_loops: bool,
    revision: u64,
}

impl MethodGraph {
    /// Creates a graph holding only its entry block.
    #[must_use]
    pub fn new(method_index: u32, registers: u16, ins: u16, outs: u16) -> Self {
        let entry = BlockId::new(0);
        MethodGraph {
            blocks: vec![BasicBlock::new(entry, None, BlockFlags::ENTRY)],
            values: Vec::new(),
            entry,
            exit: None,
            rpo: Vec::new(),
            method_index,
            registers,
            ins,
            outs,
            constants: HashMap::new(),
            has_try_catch: false,
            has_irreducible_loops: false,
            revision: 0,
        }
    }

    /// Index of the method this graph was built from.
    #[must_use]
    pub fn method_index(&self) -> u32 {
        self.method_index
    }

    /// Total number of virtual registers.
    #[must_use]
    pub fn registers(&self) -> u16 {
        self.registers
    }

    /// Number of incoming argument registers.
    #[must_use]
    pub fn ins(&self) -> u16 {
        self.ins
    }

    /// Outgoing argument register budget.
    #[must_use]
    pub fn outs(&self) -> u16 {
        self.outs
    }

    /// The entry block.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// The exit block; `None` when no path leaves the method.
    #[must_use]
    pub fn exit(&self) -> Option<BlockId> {
        self.exit
    }

    /// Blocks in reverse post order, as computed by CFG analysis.
    #[must_use]
    pub fn reverse_post_order(&self) -> &[BlockId] {
        &self.rpo
    }

    /// Returns `true` if the method has protected regions.
    #[must_use]
    pub fn has_try_catch(&self) -> bool {
        self.has_try_catch
    }

    /// Returns `true` if some loop has more than one entry.
    #[must_use]
    pub fn has_irreducible_loops(&self) -> bool {
        self.has_irreducible_loops
    }

    /// Mutation counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    fn touch(&mut self) {
        self.revision += 1;
    }

    /// A block by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this graph.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    /// Live blocks in creation order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().filter(|b| !b.is_removed())
    }

    /// Number of live blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// Number of block slots, removed blocks included; bounds block ids.
    #[must_use]
    pub fn block_capacity(&self) -> usize {
        self.blocks.len()
    }

    /// A value by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this graph.
    #[must_use]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    /// Values still attached to a block, in creation order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().filter(|v| v.is_in_graph())
    }

    /// Number of live phis.
    #[must_use]
    pub fn phi_count(&self) -> usize {
        self.blocks().map(|b| b.phis.len()).sum()
    }

    /// Number of non-phi values attached to blocks.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks().map(|b| b.instructions.len()).sum()
    }

    // ---- blocks and edges -------------------------------------------------

    /// Creates an unlinked block.
    pub fn add_block(&mut self, offset: Option<u32>, flags: BlockFlags) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, offset, flags));
        self.touch();
        id
    }

    /// Creates the exit block.
    pub fn add_exit_block(&mut self) -> BlockId {
        let exit = self.add_block(None, BlockFlags::EXIT);
        self.exit = Some(exit);
        exit
    }

    /// Appends the edge `from -> to` to both edge lists.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.index()].successors.push(to);
        self.blocks[to.index()].predecessors.push(from);
        self.touch();
    }

    /// Redirects the first `block -> old` edge to `new`, appending `block` to
    /// `new`'s predecessors.
    pub fn replace_successor(&mut self, block: BlockId, old: BlockId, new: BlockId) {
        if let Some(slot) = self.blocks[block.index()]
            .successors
            .iter_mut()
            .find(|s| **s == old)
        {
            *slot = new;
        }
        let old_preds = &mut self.blocks[old.index()].predecessors;
        if let Some(pos) = old_preds.iter().position(|p| *p == block) {
            old_preds.remove(pos);
        }
        self.blocks[new.index()].predecessors.push(block);
        self.touch();
    }

    /// Places the unlinked block `middle` on the edge `from -> to`, keeping the
    /// edge's position in both `from`'s successor and `to`'s predecessor lists.
    pub fn insert_between(&mut self, from: BlockId, to: BlockId, middle: BlockId) {
        if let Some(slot) = self.blocks[from.index()]
            .successors
            .iter_mut()
            .find(|s| **s == to)
        {
            *slot = middle;
        }
        if let Some(slot) = self.blocks[to.index()]
            .predecessors
            .iter_mut()
            .find(|p| **p == from)
        {
            *slot = middle;
        }
        let mid = &mut self.blocks[middle.index()];
        mid.predecessors.push(from);
        mid.successors.push(to);
        self.touch();
    }

    /// Splits the edge `from -> to` with a new synthetic block ending in `terminator`.
    pub fn split_edge(&mut self, from: BlockId, to: BlockId, terminator: Op, flags: BlockFlags) -> BlockId {
        let offset = self.blocks[to.index()].offset;
        let middle = self.add_block(offset, flags | BlockFlags::SYNTHETIC);
        self.insert_between(from, to, middle);
        self.append(middle, terminator, DataType::Void, &[], offset);
        middle
    }

    /// Moves every predecessor of `block` to the unlinked block `dominator`,
    /// which becomes `block`'s only predecessor.
    pub fn reroute_predecessors(&mut self, block: BlockId, dominator: BlockId) {
        let preds = std::mem::take(&mut self.blocks[block.index()].predecessors);
        for pred in &preds {
            for succ in &mut self.blocks[pred.index()].successors {
                if *succ == block {
                    *succ = dominator;
                }
            }
        }
        let dom = &mut self.blocks[dominator.index()];
        dom.predecessors = preds;
        dom.successors.push(block);
        self.blocks[block.index()].predecessors.push(dominator);
        self.touch();
    }

    /// Unlinks an unreachable block and detaches its values.
    pub(crate) fn remove_block(&mut self, id: BlockId) {
        let succs = std::mem::take(&mut self.blocks[id.index()].successors);
        for succ in succs {
            self.blocks[succ.index()].predecessors.retain(|p| *p != id);
        }
        self.blocks[id.index()].predecessors.clear();
        let values: Vec<ValueId> = {
            let block = &self.blocks[id.index()];
            block.phis.iter().chain(&block.instructions).copied().collect()
        };
        for value in values {
            self.detach(value);
        }
        let block = &mut self.blocks[id.index()];
        block.phis.clear();
        block.instructions.clear();
        block.flags.insert(BlockFlags::REMOVED);
        if self.exit == Some(id) {
            self.exit = None;
        }
        self.touch();
    }

    /// Returns `true` if `a` dominates `b`. Requires CFG analysis.
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = Some(b);
        while let Some(block) = current {
            if block == a {
                return true;
            }
            current = self.blocks[block.index()].dominator;
        }
        false
    }

    /// Returns `true` if `a` dominates `b` and differs from it.
    #[must_use]
    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns `true` if value `a` is available before value `b` executes on every path.
    ///
    /// Within one block, phis precede instructions and instructions are ordered;
    /// phis of the same block do not dominate each other.
    #[must_use]
    pub fn value_strictly_dominates(&self, a: ValueId, b: ValueId) -> bool {
        let (Some(block_a), Some(block_b)) = (self.value(a).block, self.value(b).block) else {
            return false;
        };
        if block_a != block_b {
            return self.strictly_dominates(block_a, block_b);
        }
        match (self.value(a).is_phi(), self.value(b).is_phi()) {
            (true, false) => true,
            (false, false) => {
                let list = &self.blocks[block_a.index()].instructions;
                let pos_a = list.iter().position(|v| *v == a);
                let pos_b = list.iter().position(|v| *v == b);
                matches!((pos_a, pos_b), (Some(x), Some(y)) if x < y)
            }
            _ => false,
        }
    }

    // ---- values -----------------------------------------------------------

    fn alloc(&mut self, kind: ValueKind, ty: DataType, inputs: &[ValueId], offset: Option<u32>) -> ValueId {
        let id = ValueId::new(self.values.len());
        for (index, input) in inputs.iter().enumerate() {
            self.values[input.index()].uses.push(UseSite { user: id, index });
        }
        self.values.push(Value {
            id,
            kind,
            ty,
            block: None,
            inputs: inputs.to_vec(),
            uses: Vec::new(),
            env_uses: Vec::new(),
            offset,
            environment: None,
        });
        self.touch();
        id
    }

    /// Appends an operation to `block`.
    pub fn append(&mut self, block: BlockId, op: Op, ty: DataType, inputs: &[ValueId], offset: Option<u32>) -> ValueId {
        let id = self.alloc(ValueKind::Operation(op), ty, inputs, offset);
        self.values[id.index()].block = Some(block);
        self.blocks[block.index()].instructions.push(id);
        id
    }

    /// Inserts an operation before every instruction of `block`.
    pub fn prepend(&mut self, block: BlockId, op: Op, ty: DataType, inputs: &[ValueId], offset: Option<u32>) -> ValueId {
        let id = self.alloc(ValueKind::Operation(op), ty, inputs, offset);
        self.values[id.index()].block = Some(block);
        self.blocks[block.index()].instructions.insert(0, id);
        id
    }

    /// Inserts an operation right after `anchor`, in `anchor`'s block.
    ///
    /// A phi anchor places the operation first among the block's instructions.
    pub fn insert_after(&mut self, anchor: ValueId, op: Op, ty: DataType, inputs: &[ValueId]) -> ValueId {
        let offset = self.values[anchor.index()].offset;
        let id = self.alloc(ValueKind::Operation(op), ty, inputs, offset);
        if let Some(block) = self.values[anchor.index()].block {
            let list = &mut self.blocks[block.index()].instructions;
            let pos = list.iter().position(|v| *v == anchor).map_or(0, |p| p + 1);
            list.insert(pos, id);
            self.values[id.index()].block = Some(block);
        }
        id
    }

    /// Inserts an operation right before `anchor`, in `anchor`'s block.
    pub fn insert_before(&mut self, anchor: ValueId, op: Op, ty: DataType, inputs: &[ValueId]) -> ValueId {
        let offset = self.values[anchor.index()].offset;
        let id = self.alloc(ValueKind::Operation(op), ty, inputs, offset);
        if let Some(block) = self.values[anchor.index()].block {
            let list = &mut self.blocks[block.index()].instructions;
            let pos = list.iter().position(|v| *v == anchor).unwrap_or(list.len());
            list.insert(pos, id);
            self.values[id.index()].block = Some(block);
        }
        id
    }

    /// Appends an incoming parameter to the entry block.
    pub fn add_parameter(&mut self, index: u16, is_this: bool, descriptor: &str, ty: DataType) -> ValueId {
        let kind = ValueKind::Parameter {
            index,
            is_this,
            descriptor: descriptor.to_string(),
        };
        let id = self.alloc(kind, ty, &[], None);
        self.values[id.index()].block = Some(self.entry);
        self.blocks[self.entry.index()].instructions.push(id);
        id
    }

    /// The cached constant node for `constant`, created in the entry block on first use.
    ///
    /// Constants are placed before the entry block's trailing suspend check and goto.
    pub fn constant(&mut self, constant: Constant) -> ValueId {
        if let Some(id) = self.constants.get(&constant) {
            if self.values[id.index()].is_in_graph() {
                return *id;
            }
        }
        let id = self.alloc(ValueKind::Constant(constant), constant.data_type(), &[], None);
        let entry = self.entry;
        let position = {
            let list = &self.blocks[entry.index()].instructions;
            let mut pos = list.len();
            while pos > 0
                && matches!(
                    self.values[list[pos - 1].index()].op(),
                    Some(Op::Goto | Op::SuspendCheck)
                )
            {
                pos -= 1;
            }
            pos
        };
        self.blocks[entry.index()].instructions.insert(position, id);
        self.values[id.index()].block = Some(entry);
        self.constants.insert(constant, id);
        id
    }

    /// The 32-bit integer constant `value`.
    pub fn int_constant(&mut self, value: i32) -> ValueId {
        self.constant(Constant::Int(value))
    }

    /// The 64-bit integer constant `value`.
    pub fn long_constant(&mut self, value: i64) -> ValueId {
        self.constant(Constant::Long(value))
    }

    /// The null reference constant.
    pub fn null_constant(&mut self) -> ValueId {
        self.constant(Constant::Null)
    }

    /// Creates a live phi for `register` in `block`, without inputs.
    pub fn add_phi(&mut self, block: BlockId, register: Register, ty: DataType, offset: Option<u32>) -> ValueId {
        let kind = ValueKind::Phi(PhiInfo {
            register,
            live: true,
        });
        let id = self.alloc(kind, ty, &[], offset);
        self.values[id.index()].block = Some(block);
        self.blocks[block.index()].phis.push(id);
        id
    }

    /// Creates a phi of type `ty` merging the same register and inputs as
    /// `phi`, placed right after it.
    pub fn insert_phi_copy_after(&mut self, phi: ValueId, ty: DataType) -> ValueId {
        let source = &self.values[phi.index()];
        let (kind, inputs, offset, block) = (
            source.kind.clone(),
            source.inputs.clone(),
            source.offset,
            source.block,
        );
        let id = self.alloc(kind, ty, &inputs, offset);
        if let Some(block) = block {
            let list = &mut self.blocks[block.index()].phis;
            let pos = list.iter().position(|v| *v == phi).map_or(list.len(), |p| p + 1);
            list.insert(pos, id);
            self.values[id.index()].block = Some(block);
        }
        id
    }

    /// Appends `input` to `value`'s inputs.
    pub fn add_input(&mut self, value: ValueId, input: ValueId) {
        let index = self.values[value.index()].inputs.len();
        self.values[value.index()].inputs.push(input);
        self.values[input.index()].uses.push(UseSite { user: value, index });
        self.touch();
    }

    /// Replaces input `index` of `user` with `new`.
    pub fn replace_input(&mut self, user: ValueId, index: usize, new: ValueId) {
        let old = self.values[user.index()].inputs[index];
        if old == new {
            return;
        }
        self.remove_use(old, UseSite { user, index });
        self.values[user.index()].inputs[index] = new;
        self.values[new.index()].uses.push(UseSite { user, index });
        self.touch();
    }

    fn remove_use(&mut self, value: ValueId, site: UseSite) {
        let uses = &mut self.values[value.index()].uses;
        if let Some(pos) = uses.iter().position(|u| *u == site) {
            uses.swap_remove(pos);
        }
    }

    /// Sets the type of a value.
    pub fn set_type(&mut self, value: ValueId, ty: DataType) {
        if self.values[value.index()].ty != ty {
            self.values[value.index()].ty = ty;
            self.touch();
        }
    }

    /// Replaces the operation payload of an operation value.
    pub fn set_op(&mut self, value: ValueId, op: Op) {
        if let ValueKind::Operation(current) = &mut self.values[value.index()].kind {
            if *current != op {
                *current = op;
                self.touch();
            }
        }
    }

    /// Marks a phi live or dead.
    pub fn set_phi_live(&mut self, phi: ValueId, live: bool) {
        if let ValueKind::Phi(info) = &mut self.values[phi.index()].kind {
            if info.live != live {
                info.live = live;
                self.touch();
            }
        }
    }

    /// Attaches an environment snapshot to `holder`.
    pub fn set_environment(&mut self, holder: ValueId, slots: Vec<Option<ValueId>>) {
        for (slot, value) in slots.iter().enumerate() {
            if let Some(value) = value {
                self.values[value.index()]
                    .env_uses
                    .push(EnvUse { holder, slot });
            }
        }
        self.values[holder.index()].environment = Some(Environment { slots });
        self.touch();
    }

    /// Redirects every use and environment capture of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        let uses = std::mem::take(&mut self.values[old.index()].uses);
        for site in &uses {
            self.values[site.user.index()].inputs[site.index] = new;
        }
        self.values[new.index()].uses.extend(uses);

        let env_uses = std::mem::take(&mut self.values[old.index()].env_uses);
        for capture in &env_uses {
            if let Some(env) = &mut self.values[capture.holder.index()].environment {
                env.slots[capture.slot] = Some(new);
            }
        }
        self.values[new.index()].env_uses.extend(env_uses);
        self.touch();
    }

    /// Removes a value from its block.
    ///
    /// Its inputs forget the use, environments capturing it get an undefined
    /// slot, and values captured by its own environment forget the capture.
    /// Remaining users must be removed as well; they keep a stale input.
    pub fn remove_value(&mut self, id: ValueId) {
        let Some(block) = self.values[id.index()].block else {
            return;
        };
        let blk = &mut self.blocks[block.index()];
        blk.phis.retain(|v| *v != id);
        blk.instructions.retain(|v| *v != id);
        self.detach(id);
        self.touch();
    }

    fn detach(&mut self, id: ValueId) {
        let inputs = self.values[id.index()].inputs.clone();
        for (index, input) in inputs.into_iter().enumerate() {
            self.remove_use(input, UseSite { user: id, index });
        }
        let env_uses = std::mem::take(&mut self.values[id.index()].env_uses);
        for capture in env_uses {
            if let Some(env) = &mut self.values[capture.holder.index()].environment {
                env.slots[capture.slot] = None;
            }
        }
        if let Some(env) = self.values[id.index()].environment.take() {
            for (slot, value) in env.slots.iter().enumerate() {
                if let Some(value) = value {
                    self.values[value.index()]
                        .env_uses
                        .retain(|u| !(u.holder == id && u.slot == slot));
                }
            }
        }
        self.values[id.index()].block = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (MethodGraph, [BlockId; 4]) {
        let mut graph = MethodGraph::new(0, 2, 0, 0);
        let entry = graph.entry();
        let left = graph.add_block(Some(2), BlockFlags::empty());
        let right = graph.add_block(Some(4), BlockFlags::empty());
        let join = graph.add_block(Some(6), BlockFlags::empty());
        graph.add_edge(entry, left);
        graph.add_edge(entry, right);
        graph.add_edge(left, join);
        graph.add_edge(right, join);
        (graph, [entry, left, right, join])
    }

    #[test]
    fn test_constants_are_cached_before_terminators() {
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let entry = graph.entry();
        graph.append(entry, Op::SuspendCheck, DataType::Void, &[], None);
        graph.append(entry, Op::Goto, DataType::Void, &[], None);
        let a = graph.int_constant(3);
        let b = graph.int_constant(3);
        assert_eq!(a, b);
        let instructions = graph.block(entry).instructions();
        assert_eq!(instructions[0], a);
        assert_eq!(instructions.len(), 3);
    }

    #[test]
    fn test_use_lists_follow_inputs() {
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let entry = graph.entry();
        let one = graph.int_constant(1);
        let two = graph.int_constant(2);
        let add = graph.append(entry, Op::Binary(crate::ir::BinaryOp::Add), DataType::Int32, &[one, one], None);
        assert_eq!(graph.value(one).uses().len(), 2);

        graph.replace_input(add, 1, two);
        assert_eq!(graph.value(one).uses().len(), 1);
        assert_eq!(graph.value(two).uses(), &[UseSite { user: add, index: 1 }]);

        graph.replace_all_uses(one, two);
        assert!(!graph.value(one).has_uses());
        assert_eq!(graph.value(add).inputs(), &[two, two]);

        graph.remove_value(add);
        assert!(!graph.value(two).has_uses());
        assert!(!graph.value(add).is_in_graph());
    }

    #[test]
    fn test_insert_between_keeps_positions() {
        let (mut graph, [entry, left, _, join]) = diamond();
        let split = graph.split_edge(left, join, Op::Goto, BlockFlags::empty());
        assert_eq!(graph.block(join).predecessors()[0], split);
        assert_eq!(graph.block(left).successors(), &[split]);
        assert!(graph.block(split).is_synthetic());
        assert_eq!(graph.block(split).offset, Some(6));
        let _ = entry;
    }

    #[test]
    fn test_reroute_predecessors() {
        let (mut graph, [_, left, right, join]) = diamond();
        let boundary = graph.add_block(Some(6), BlockFlags::TRY_BOUNDARY);
        graph.reroute_predecessors(join, boundary);
        assert_eq!(graph.block(join).predecessors(), &[boundary]);
        assert_eq!(graph.block(boundary).predecessors(), &[left, right]);
        assert_eq!(graph.block(left).successors(), &[boundary]);
    }

    #[test]
    fn test_replace_successor_appends_predecessor() {
        let (mut graph, [entry, left, right, join]) = diamond();
        let pad = graph.add_block(Some(6), BlockFlags::SYNTHETIC);
        graph.replace_successor(left, join, pad);
        assert_eq!(graph.block(join).predecessors(), &[right]);
        assert_eq!(graph.block(pad).predecessors(), &[left]);
        let _ = entry;
    }

    #[test]
    fn test_environment_captures() {
        let mut graph = MethodGraph::new(0, 2, 0, 0);
        let entry = graph.entry();
        let zero = graph.int_constant(0);
        let check = graph.append(entry, Op::SuspendCheck, DataType::Void, &[], None);
        graph.set_environment(check, vec![Some(zero), Some(zero)]);
        assert!(graph.value(zero).has_env_alias());

        let one = graph.int_constant(1);
        graph.replace_all_uses(zero, one);
        assert_eq!(graph.value(check).environment().unwrap().get(1), Some(one));

        graph.remove_value(one);
        assert_eq!(graph.value(check).environment().unwrap().get(0), None);
    }

    #[test]
    fn test_phi_copy_is_adjacent() {
        let (mut graph, [_, _, _, join]) = diamond();
        let first = graph.add_phi(join, 0, DataType::Int32, None);
        let other = graph.add_phi(join, 1, DataType::Int32, None);
        let copy = graph.insert_phi_copy_after(first, DataType::Float32);
        assert_eq!(graph.block(join).phis(), &[first, copy, other]);
        assert_eq!(graph.value(copy).phi().unwrap().register, 0);
    }

    #[test]
    fn test_remove_block_unlinks() {
        let (mut graph, [_, left, _, join]) = diamond();
        graph.remove_block(left);
        assert!(graph.block(left).is_removed());
        assert_eq!(graph.block(join).predecessors().len(), 1);
        assert_eq!(graph.block_count(), 3);
    }
}
