//! Instruction builder: bytecode to SSA values in one reverse post order pass.
//!
//! Every block owns a local table mapping each virtual register to its current
//! value. A block's table is initialized from its predecessors when the block
//! is reached, which reverse post order guarantees to be after all of them
//! except for loop back edges:
//!
//! - **catch blocks** have their phis created eagerly, when the first throwing
//!   site reaching them records its locals; later sites add one input each,
//! - **loop headers** create a phi per register the pre-header defines; the
//!   back edge inputs are added once the whole method is translated,
//! - **other blocks** merge their predecessors, creating a phi only where the
//!   predecessors disagree.
//!
//! Reads go through [`InstructionBuilder::load_local`], which swaps an integer
//! value read as a float or reference for its typed equivalent. The ambiguities
//! that remain are recorded with the [`SsaFinalizer`] for after the build.

use crate::{
    builder::BlockMap,
    bytecode::{CompilationUnit, Register},
    ir::{BlockId, ClinitCheckRequirement, Dispatch, Invoke, MethodGraph, Op, ValueId, ValueKind},
    resolver::{InvokeKind, Resolver},
    ssa::SsaFinalizer,
    types::DataType,
    Error, Result,
};

/// Local table of one block; `None` marks an undefined register.
pub(super) type Locals = Vec<Option<ValueId>>;

/// Populates the blocks of an analyzed skeleton with SSA values.
pub struct InstructionBuilder<'a, 's> {
    pub(super) graph: &'a mut MethodGraph,
    pub(super) ssa: &'a mut SsaFinalizer<'s>,
    pub(super) unit: CompilationUnit<'s>,
    pub(super) resolver: &'a dyn Resolver,
    /// Local tables by block index, allocated on first access
    locals_for: Vec<Locals>,
    /// Block whose local table is current
    pub(super) block: BlockId,
    /// Block receiving new instructions; `None` once a terminator was built
    pub(super) current_block: Option<BlockId>,
    /// Offset of the instruction being translated
    pub(super) offset: Option<u32>,
    /// Value a following `move-result` reads
    pub(super) latest_result: Option<ValueId>,
    pub(super) this_parameter: Option<ValueId>,
    loop_headers: Vec<BlockId>,
}

impl<'a, 's> InstructionBuilder<'a, 's> {
    /// Creates a builder for `graph`, which must hold the analyzed block
    /// skeleton of `unit`.
    pub fn new(
        graph: &'a mut MethodGraph,
        ssa: &'a mut SsaFinalizer<'s>,
        unit: CompilationUnit<'s>,
        resolver: &'a dyn Resolver,
    ) -> Self {
        let entry = graph.entry();
        let capacity = graph.block_capacity();
        InstructionBuilder {
            graph,
            ssa,
            unit,
            resolver,
            locals_for: vec![Vec::new(); capacity],
            block: entry,
            current_block: Some(entry),
            offset: None,
            latest_result: None,
            this_parameter: None,
            loop_headers: Vec::new(),
        }
    }

    /// Translates the body of the unit block by block in reverse post order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBytecode`] for reads of undefined registers,
    /// malformed operands or call arguments, and signatures that do not match
    /// the frame; [`Error::UnsupportedInstruction`] for opcodes without a
    /// translation.
    pub fn build(mut self, map: &BlockMap) -> Result<()> {
        let Some(code) = self.unit.code else {
            return Err(Error::GraphError(format!(
                "method {} has no body to translate",
                self.unit.method_index
            )));
        };

        for block in self.graph.reverse_post_order().to_vec() {
            self.current_block = Some(block);
            self.offset = None;
            self.initialize_block_locals(block)?;

            let node = self.graph.block(block);
            if node.is_entry() {
                self.initialize_parameters()?;
                self.append(Op::SuspendCheck, DataType::Void, &[]);
                self.append(Op::Goto, DataType::Void, &[]);
                continue;
            }
            if node.is_exit() {
                self.append(Op::Exit, DataType::Void, &[]);
                continue;
            }
            if node.is_loop_header() {
                let offset = node.offset;
                let check = self
                    .graph
                    .prepend(block, Op::SuspendCheck, DataType::Void, &[], offset);
                let slots = self.locals().to_vec();
                self.graph.set_environment(check, slots);
            }

            let node = self.graph.block(block);
            let Some(start) = node.offset else {
                continue;
            };
            // Synthetic blocks arrive with their terminator.
            if node.is_synthetic() || map.block_at(start) != Some(block) {
                continue;
            }

            let first = code
                .index_of(start)
                .ok_or_else(|| invalid_bytecode!("block {} starts inside an instruction at {:#x}", block, start))?;
            let is_try_block = node.is_try_block();
            for insn in &code.instructions[first..] {
                if self.current_block.is_none() || (insn.offset != start && map.is_block_start(insn.offset)) {
                    break;
                }
                self.offset = Some(insn.offset);
                if is_try_block && insn.opcode.can_throw() {
                    self.propagate_locals_to_catch_blocks();
                }
                self.translate(insn, map)?;
            }
            if self.current_block.is_some() {
                self.append(Op::Goto, DataType::Void, &[]);
            }
        }

        self.set_loop_header_phi_inputs();
        log::debug!(
            "method {}: {} values, {} phis after instruction building",
            self.graph.method_index(),
            self.graph.values().filter(|v| v.is_in_graph()).count(),
            self.graph.phi_count()
        );
        Ok(())
    }

    /// Fills the skeleton made by
    /// [`BlockBuilder::build_minimal`](crate::builder::BlockBuilder::build_minimal):
    /// the body calls the method itself with its own arguments and returns the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBytecode`] if the method index or its signature
    /// does not match the frame.
    pub fn build_minimal(mut self, body: BlockId) -> Result<()> {
        let entry = self.graph.entry();
        self.current_block = Some(entry);
        self.initialize_block_locals(entry)?;
        self.initialize_parameters()?;
        self.append(Op::Goto, DataType::Void, &[]);

        self.current_block = Some(body);
        self.initialize_block_locals(body)?;
        let method = self.unit.method()?;
        let first_in = self.graph.registers() - self.graph.ins();
        let mut arguments = Vec::new();
        for register in first_in..self.graph.registers() {
            if self.locals()[usize::from(register)].is_none() {
                continue;
            }
            let argument = if arguments.is_empty() && !self.unit.is_static {
                self.load_null_checked_local(register)?
            } else {
                self.load_local(register, DataType::Void)?
            };
            arguments.push(argument);
        }

        let return_type = method.signature.return_type();
        let invoke = Op::Invoke(Invoke {
            kind: if self.unit.is_static {
                InvokeKind::Static
            } else {
                InvokeKind::Direct
            },
            method: self.unit.method_index,
            dispatch: Dispatch::StaticOrDirect {
                clinit: ClinitCheckRequirement::None,
                string_init: false,
            },
            arguments: arguments.len() as u32,
        });
        let result = self.append(invoke, return_type, &arguments);
        if return_type == DataType::Void {
            self.append(Op::ReturnVoid, DataType::Void, &[]);
        } else {
            self.append(Op::Return, DataType::Void, &[result]);
        }

        if let Some(exit) = self.graph.exit() {
            self.current_block = Some(exit);
            self.block = exit;
            self.append(Op::Exit, DataType::Void, &[]);
        }
        log::debug!("method {}: minimal body built", self.graph.method_index());
        Ok(())
    }

    // ---- locals -----------------------------------------------------------

    fn vregs(&self) -> usize {
        usize::from(self.graph.registers())
    }

    /// The current local table.
    pub(super) fn locals(&self) -> &[Option<ValueId>] {
        &self.locals_for[self.block.index()]
    }

    pub(super) fn locals_mut(&mut self) -> &mut Locals {
        &mut self.locals_for[self.block.index()]
    }

    /// Allocates the local table of `block` on first access.
    ///
    /// A catch block gets a phi for every register defined in the current
    /// table: it is first accessed from the first throwing site reaching it.
    fn ensure_locals(&mut self, block: BlockId) {
        let vregs = self.vregs();
        if self.locals_for[block.index()].len() == vregs {
            return;
        }
        let mut locals = vec![None; vregs];
        if self.graph.block(block).is_catch_block() {
            let offset = self.graph.block(block).offset;
            let current = &self.locals_for[self.block.index()];
            for (register, value) in current.iter().enumerate() {
                if let Some(value) = value {
                    let ty = self.graph.value(*value).ty.to_phi_type();
                    let phi = self.graph.add_phi(block, register as Register, ty, offset);
                    locals[register] = Some(phi);
                }
            }
        }
        self.locals_for[block.index()] = locals;
    }

    fn value_of_local_at(&mut self, block: BlockId, register: usize) -> Option<ValueId> {
        self.ensure_locals(block);
        self.locals_for[block.index()][register]
    }

    fn initialize_block_locals(&mut self, block: BlockId) -> Result<()> {
        self.block = block;
        self.ensure_locals(block);
        let node = self.graph.block(block);
        // Catch phis were created and fed by the throwing sites.
        if node.is_catch_block() || node.is_exit() || node.predecessors().is_empty() {
            return Ok(());
        }
        let offset = node.offset;

        if node.is_loop_header() {
            let Some(pre_header) = node.loop_info.as_ref().and_then(|info| info.pre_header) else {
                return Err(Error::GraphError(format!("loop header {block} has no pre-header")));
            };
            for register in 0..self.vregs() {
                let Some(incoming) = self.value_of_local_at(pre_header, register) else {
                    continue;
                };
                let ty = self.graph.value(incoming).ty.to_phi_type();
                let phi = self.graph.add_phi(block, register as Register, ty, offset);
                self.locals_for[block.index()][register] = Some(phi);
            }
            self.loop_headers.push(block);
            return Ok(());
        }

        let predecessors = node.predecessors().to_vec();
        for register in 0..self.vregs() {
            let mut values = Vec::with_capacity(predecessors.len());
            for pred in &predecessors {
                match self.value_of_local_at(*pred, register) {
                    Some(value) => values.push(value),
                    None => break,
                }
            }
            // Undefined on some path: no read may follow, since a verified
            // body never reads a register it did not define on every path.
            if values.len() != predecessors.len() {
                continue;
            }
            let first = values[0];
            let value = if values.iter().all(|v| *v == first) {
                first
            } else {
                let ty = self.graph.value(first).ty.to_phi_type();
                let phi = self.graph.add_phi(block, register as Register, ty, offset);
                for value in values {
                    self.graph.add_input(phi, value);
                }
                phi
            };
            self.locals_for[block.index()][register] = Some(value);
        }
        Ok(())
    }

    /// Adds the current locals as inputs of the catch phis of every handler of
    /// the current try block.
    fn propagate_locals_to_catch_blocks(&mut self) {
        let Some(try_entry) = self.graph.block(self.block).try_entry() else {
            return;
        };
        let handlers = self.graph.block(try_entry).exceptional_successors().to_vec();
        for handler in handlers {
            self.ensure_locals(handler);
            for register in 0..self.vregs() {
                let Some(phi) = self.locals_for[handler.index()][register] else {
                    continue;
                };
                match self.locals_for[self.block.index()][register] {
                    Some(local) => self.graph.add_input(phi, local),
                    None => {
                        // Undefined at this throwing site: the handler must not read it.
                        let node = self.graph.value(phi);
                        if node.has_uses() || node.has_env_uses() {
                            self.graph.set_phi_live(phi, false);
                        } else {
                            self.graph.remove_value(phi);
                        }
                        self.locals_for[handler.index()][register] = None;
                    }
                }
            }
        }
    }

    /// Adds the back edge inputs of the loop header phis, innermost loops first.
    ///
    /// A register undefined at some predecessor kills the phi, leaving it with
    /// fewer inputs than predecessors; dead phi elimination removes it.
    fn set_loop_header_phi_inputs(&mut self) {
        for header in std::mem::take(&mut self.loop_headers).into_iter().rev() {
            let predecessors = self.graph.block(header).predecessors().to_vec();
            for phi in self.graph.block(header).phis().to_vec() {
                let Some(register) = self.graph.value(phi).phi().map(|info| usize::from(info.register)) else {
                    continue;
                };
                for pred in &predecessors {
                    match self.value_of_local_at(*pred, register) {
                        Some(value) => self.graph.add_input(phi, value),
                        None => {
                            self.graph.set_phi_live(phi, false);
                            break;
                        }
                    }
                }
            }
        }
    }

    fn initialize_parameters(&mut self) -> Result<()> {
        let method = self.unit.method()?;
        let signature = &method.signature;
        let ins = self.graph.ins();
        let expected = signature.parameter_registers() + usize::from(!self.unit.is_static);
        if expected != usize::from(ins) || ins > self.graph.registers() {
            return Err(invalid_bytecode!(
                "method {} takes {} argument registers, its frame has {}",
                self.unit.method_index,
                expected,
                ins
            ));
        }

        let mut register = self.graph.registers() - ins;
        let mut index = 0u16;
        if !self.unit.is_static {
            let descriptor = self.unit.symbols.type_descriptor(method.class)?;
            let this = self
                .graph
                .add_parameter(index, true, descriptor, DataType::Reference);
            self.update_local(register, this)?;
            self.this_parameter = Some(this);
            register += 1;
            index += 1;
        }
        for descriptor in &signature.parameters {
            let ty = DataType::from_descriptor(descriptor);
            if ty == DataType::Void {
                return Err(invalid_bytecode!("malformed parameter descriptor '{}'", descriptor));
            }
            let parameter = self.graph.add_parameter(index, false, descriptor, ty);
            self.update_local(register, parameter)?;
            register += if ty.is_64bit() { 2 } else { 1 };
            index += 1;
        }
        Ok(())
    }

    /// Stores `value` into `register` of the current table.
    ///
    /// A wide value also clobbers `register + 1`; storing into the high half of
    /// a wide pair clobbers its low half.
    pub(super) fn update_local(&mut self, register: Register, value: ValueId) -> Result<()> {
        let ty = self.graph.value(value).ty;
        let register = usize::from(register);
        let vregs = self.vregs();
        if ty == DataType::Void {
            return Err(invalid_bytecode!("void value stored into v{}", register));
        }
        if register >= vregs || (ty.is_64bit() && register + 1 >= vregs) {
            return Err(invalid_bytecode!(
                "register v{} outside a frame of {} registers",
                register,
                vregs
            ));
        }
        let graph = &*self.graph;
        let locals = &mut self.locals_for[self.block.index()];
        if register > 0 {
            if let Some(low) = locals[register - 1] {
                if graph.value(low).ty.is_64bit() {
                    locals[register - 1] = None;
                }
            }
        }
        locals[register] = Some(value);
        if ty.is_64bit() {
            locals[register + 1] = None;
        }
        Ok(())
    }

    /// Reads `register`, as `ty` when `ty` is a float or reference type.
    ///
    /// Integer requests (and `Void`, for "as is") return the stored value.
    pub(super) fn load_local(&mut self, register: Register, ty: DataType) -> Result<ValueId> {
        let value = self
            .locals()
            .get(usize::from(register))
            .copied()
            .flatten()
            .ok_or_else(|| {
                invalid_bytecode!(
                    "read of undefined register v{} at {:#x}",
                    register,
                    self.offset.unwrap_or(0)
                )
            })?;
        let actual = self.graph.value(value).ty;
        if actual == ty {
            return Ok(value);
        }
        let equivalent = if ty.is_floating_point() {
            self.ssa.float_or_double_equivalent(self.graph, value, ty)
        } else if ty.is_reference() {
            self.ssa.reference_equivalent(self.graph, value)
        } else {
            Some(value)
        };
        equivalent.ok_or_else(|| {
            invalid_bytecode!(
                "v{} holds {} but is read as {} at {:#x}",
                register,
                actual,
                ty,
                self.offset.unwrap_or(0)
            )
        })
    }

    /// Reads the reference in `register`, behind a null check unless the
    /// value is known to be non-null.
    pub(super) fn load_null_checked_local(&mut self, register: Register) -> Result<ValueId> {
        let reference = self.load_local(register, DataType::Reference)?;
        if !self.can_be_null(reference) {
            return Ok(reference);
        }
        Ok(self.append(Op::NullCheck, DataType::Reference, &[reference]))
    }

    fn can_be_null(&self, value: ValueId) -> bool {
        match &self.graph.value(value).kind {
            ValueKind::Parameter { is_this, .. } => !is_this,
            ValueKind::Operation(op) => !matches!(
                op,
                Op::NewInstance { .. }
                    | Op::NewArray { .. }
                    | Op::LoadString { .. }
                    | Op::LoadClass { .. }
                    | Op::ClinitCheck
                    | Op::NullCheck
                    | Op::Invoke(Invoke {
                        dispatch: Dispatch::StaticOrDirect { string_init: true, .. },
                        ..
                    })
            ),
            ValueKind::Phi(_) | ValueKind::Constant(_) => true,
        }
    }

    /// Appends an operation to the block being filled, with an environment
    /// snapshot of the current locals when the operation needs one.
    pub(super) fn append(&mut self, op: Op, ty: DataType, inputs: &[ValueId]) -> ValueId {
        let block = self.current_block.unwrap_or(self.block);
        let needs_environment = op.needs_environment();
        let value = self.graph.append(block, op, ty, inputs, self.offset);
        if needs_environment {
            let slots = self.locals().to_vec();
            self.graph.set_environment(value, slots);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::BlockBuilder,
        bytecode::{MethodAssembler, Opcode, Operands, Signature, SymbolTable},
        ir::Constant,
        resolver::MapResolver,
    };

    struct Built {
        graph: MethodGraph,
        map: BlockMap,
    }

    fn build(symbols: &SymbolTable, method: u32, is_static: bool, asm: MethodAssembler) -> Result<Built> {
        let code = asm.finish()?;
        let unit = CompilationUnit::new(symbols, method, &code).with_static(is_static);
        let resolver = MapResolver::from_symbols(symbols);
        let mut graph = MethodGraph::new(method, code.registers, code.ins, code.outs);
        let map = BlockBuilder::new(&mut graph, &code).build()?;
        graph.analyze()?;
        let mut ssa = SsaFinalizer::new(symbols, false);
        InstructionBuilder::new(&mut graph, &mut ssa, unit, &resolver).build(&map)?;
        Ok(Built { graph, map })
    }

    fn static_method(symbols: &mut SymbolTable, signature: Signature) -> u32 {
        symbols.add_method("LTest;", "run", signature)
    }

    fn returned(graph: &MethodGraph) -> Option<ValueId> {
        graph
            .values()
            .find(|v| v.is_in_graph() && v.op() == Some(&Op::Return))
            .and_then(|v| v.input(0))
    }

    #[test]
    fn test_straight_line_has_no_phis() -> Result<()> {
        let mut symbols = SymbolTable::default();
        let method = static_method(&mut symbols, Signature::new("I", &["I"]));
        let mut asm = MethodAssembler::new(2, 1);
        asm.emit(Opcode::AddIntLit, Operands::BinaryLiteral { a: 0, b: 1, literal: 3 })?;
        asm.ret(Opcode::Return, 0)?;
        let built = build(&symbols, method, true, asm)?;

        assert_eq!(built.graph.phi_count(), 0);
        let sum = returned(&built.graph).unwrap();
        let node = built.graph.value(sum);
        assert_eq!(node.op(), Some(&Op::Binary(crate::ir::BinaryOp::Add)));
        assert!(matches!(built.graph.value(node.inputs()[0]).kind, ValueKind::Parameter { .. }));
        assert_eq!(built.graph.value(node.inputs()[1]).constant(), Some(Constant::Int(3)));
        Ok(())
    }

    #[test]
    fn test_diamond_phi_in_predecessor_order() -> Result<()> {
        let mut symbols = SymbolTable::default();
        let method = static_method(&mut symbols, Signature::new("I", &[]));
        let mut asm = MethodAssembler::new(1, 0);
        asm.const_int(0, 5)?;
        asm.branch(Opcode::IfEqz, &[0], "join")?;
        asm.const_int(0, 7)?;
        asm.label("join")?;
        asm.ret(Opcode::Return, 0)?;
        let built = build(&symbols, method, true, asm)?;

        let phi = returned(&built.graph).unwrap();
        let node = built.graph.value(phi);
        assert!(node.is_phi());
        let inputs: Vec<_> = node
            .inputs()
            .iter()
            .map(|v| built.graph.value(*v).constant())
            .collect();
        assert_eq!(inputs, vec![Some(Constant::Int(7)), Some(Constant::Int(5))]);
        Ok(())
    }

    #[test]
    fn test_wide_store_clobbers_neighbours() -> Result<()> {
        let mut symbols = SymbolTable::default();
        let method = static_method(&mut symbols, Signature::new("I", &[]));
        let mut asm = MethodAssembler::new(3, 0);
        asm.const_int(1, 4)?;
        asm.const_wide(0, 9)?;
        asm.ret(Opcode::Return, 1)?;
        let err = build(&symbols, method, true, asm).err().unwrap();
        assert!(err.to_string().contains("undefined register v1"));

        let mut asm = MethodAssembler::new(3, 0);
        asm.const_wide(0, 9)?;
        asm.const_int(1, 4)?;
        asm.emit(Opcode::MoveWide, Operands::TwoReg { a: 1, b: 0 })?;
        asm.return_void()?;
        let err = build(&symbols, method, true, asm).err().unwrap();
        assert!(err.to_string().contains("undefined register v0"));
        Ok(())
    }

    #[test]
    fn test_loop_header_phi_gets_back_edge() -> Result<()> {
        let mut symbols = SymbolTable::default();
        let method = static_method(&mut symbols, Signature::new("I", &["I"]));
        let mut asm = MethodAssembler::new(2, 1);
        asm.const_int(0, 0)?;
        asm.label("head")?;
        asm.branch(Opcode::IfGe, &[0, 1], "done")?;
        asm.emit(Opcode::AddIntLit, Operands::BinaryLiteral { a: 0, b: 0, literal: 1 })?;
        asm.branch(Opcode::Goto, &[], "head")?;
        asm.label("done")?;
        asm.ret(Opcode::Return, 0)?;
        let code_offset_of_head = 3;
        let built = build(&symbols, method, true, asm)?;

        let header = built.map.block_at(code_offset_of_head).unwrap();
        assert!(built.graph.block(header).is_loop_header());
        let phis = built.graph.block(header).phis();
        assert_eq!(phis.len(), 2);
        for phi in phis {
            assert_eq!(built.graph.value(*phi).inputs().len(), 2);
        }
        let first = built.graph.block(header).instructions()[0];
        assert_eq!(built.graph.value(first).op(), Some(&Op::SuspendCheck));
        assert!(built.graph.value(first).environment().is_some());
        Ok(())
    }

    #[test]
    fn test_instance_method_parameters() -> Result<()> {
        let mut symbols = SymbolTable::default();
        let method = symbols.add_method("LTest;", "wide", Signature::new("J", &["J", "I"]));
        let mut asm = MethodAssembler::new(5, 4);
        asm.ret(Opcode::ReturnWide, 2)?;
        let built = build(&symbols, method, false, asm)?;

        let parameters: Vec<_> = built
            .graph
            .values()
            .filter_map(|v| match &v.kind {
                ValueKind::Parameter { index, is_this, .. } => Some((*index, *is_this, v.ty)),
                _ => None,
            })
            .collect();
        assert_eq!(
            parameters,
            vec![(0, true, DataType::Reference), (1, false, DataType::Int64), (2, false, DataType::Int32)]
        );
        let value = returned(&built.graph).unwrap();
        assert_eq!(built.graph.value(value).ty, DataType::Int64);
        Ok(())
    }

    #[test]
    fn test_signature_mismatch_rejected() -> Result<()> {
        let mut symbols = SymbolTable::default();
        let method = static_method(&mut symbols, Signature::new("V", &["J"]));
        let mut asm = MethodAssembler::new(2, 1);
        asm.return_void()?;
        assert!(matches!(
            build(&symbols, method, true, asm),
            Err(Error::InvalidBytecode { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_minimal_body_calls_itself() -> Result<()> {
        let mut symbols = SymbolTable::default();
        let method = symbols.add_method("LTest;", "native", Signature::new("I", &["I"]));
        let unit = CompilationUnit::synthetic(&symbols, method).with_static(false);
        let resolver = MapResolver::from_symbols(&symbols);
        let mut graph = MethodGraph::new(method, 2, 2, 2);
        let body = BlockBuilder::build_minimal(&mut graph);
        graph.analyze()?;
        let mut ssa = SsaFinalizer::new(&symbols, false);
        InstructionBuilder::new(&mut graph, &mut ssa, unit, &resolver).build_minimal(body)?;

        let last = graph.block(body).last_instruction().unwrap();
        assert_eq!(graph.value(last).op(), Some(&Op::Return));
        let invoke = graph.value(last).input(0).unwrap();
        let node = graph.value(invoke);
        assert!(matches!(node.op(), Some(Op::Invoke(call)) if call.method == method && call.arguments == 2));
        assert_eq!(node.ty, DataType::Int32);
        assert!(!graph.values().any(|v| v.op() == Some(&Op::NullCheck)));
        Ok(())
    }
}
