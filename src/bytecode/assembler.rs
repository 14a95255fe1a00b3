//! Label-based assembler for method bodies.
//!
//! [`MethodAssembler`] lays instructions out at their canonical widths and
//! resolves symbolic labels for branches, switch cases and try ranges when the
//! body is finished. It is the way tests, benchmarks and tools write bytecode
//! without computing offsets by hand.
//!
//! # Examples
//!
//! ```rust,ignore
//! use ssagraph::bytecode::{MethodAssembler, Opcode};
//!
//! let mut asm = MethodAssembler::new(2, 0);
//! asm.const_int(0, 5)?;
//! asm.branch(Opcode::IfEqz, &[0], "join")?;
//! asm.const_int(0, 7)?;
//! asm.label("join")?;
//! asm.ret(Opcode::Return, 0)?;
//! let code = asm.finish()?;
//! ```

use std::collections::HashMap;

use crate::{
    bytecode::{
        ArrayData, CatchHandler, CodeItem, Instruction, Opcode, Operands, Register, SwitchTable,
        TryItem,
    },
    Result,
};

/// Unresolved label references of one instruction.
#[derive(Debug, Clone)]
pub struct LabelFixup {
    /// Index of the instruction to patch
    pub instruction: usize,
    /// Target labels; one for branches, one per case for switches
    pub labels: Vec<String>,
}

/// A try range awaiting label resolution.
#[derive(Debug, Clone)]
struct TryFixup {
    start: String,
    end: String,
    handlers: Vec<(Option<u32>, String)>,
}

/// Assembler producing a [`CodeItem`].
#[derive(Debug, Clone)]
pub struct MethodAssembler {
    registers: u16,
    ins: u16,
    outs: u16,
    offset: u32,
    instructions: Vec<Instruction>,
    labels: HashMap<String, u32>,
    fixups: Vec<LabelFixup>,
    tries: Vec<TryFixup>,
}

impl MethodAssembler {
    /// Creates an assembler for a body with `registers` registers, the last
    /// `ins` of which hold the incoming arguments.
    #[must_use]
    pub fn new(registers: u16, ins: u16) -> Self {
        MethodAssembler {
            registers,
            ins,
            outs: 0,
            offset: 0,
            instructions: Vec::new(),
            labels: HashMap::new(),
            fixups: Vec::new(),
            tries: Vec::new(),
        }
    }

    /// Offset the next instruction will be placed at.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Appends an instruction with fully resolved operands.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the operands name a register
    /// outside the frame.
    pub fn emit(&mut self, opcode: Opcode, operands: Operands) -> Result<&mut Self> {
        self.check_registers(&operands)?;
        if let Operands::Call { args, .. } = &operands {
            self.outs = self.outs.max(args.len() as u16);
        }
        let insn = Instruction::new(self.offset, opcode, operands);
        self.offset = insn.next_offset();
        self.instructions.push(insn);
        Ok(self)
    }

    /// Binds `name` to the offset of the next instruction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the label is already defined.
    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        if self.labels.insert(name.to_string(), self.offset).is_some() {
            return Err(invalid_bytecode!("duplicate label '{}'", name));
        }
        Ok(self)
    }

    /// Appends a branch to `label`.
    ///
    /// `registers` holds the compared registers: none for `goto`, one for the
    /// compare-with-zero forms, two for the two-register forms.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if `opcode` is not a branch or the
    /// register count does not fit it.
    pub fn branch(&mut self, opcode: Opcode, registers: &[Register], label: &str) -> Result<&mut Self> {
        let operands = match (opcode.is_branch(), registers) {
            (true, []) if opcode == Opcode::Goto => Operands::Branch { target: 0 },
            (true, [a]) if opcode != Opcode::Goto => Operands::CompareZero { a: *a, target: 0 },
            (true, [a, b]) if opcode != Opcode::Goto => Operands::Compare {
                a: *a,
                b: *b,
                target: 0,
            },
            _ => {
                return Err(invalid_bytecode!(
                    "'{}' with {} registers is not a branch",
                    opcode,
                    registers.len()
                ))
            }
        };
        self.fixups.push(LabelFixup {
            instruction: self.instructions.len(),
            labels: vec![label.to_string()],
        });
        self.emit(opcode, operands)
    }

    /// Appends a packed switch on `register` with keys starting at `first_key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the register is outside the frame.
    pub fn packed_switch(&mut self, register: Register, first_key: i32, labels: &[&str]) -> Result<&mut Self> {
        self.fixups.push(LabelFixup {
            instruction: self.instructions.len(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        });
        let table = SwitchTable::packed(first_key, vec![0; labels.len()]);
        self.emit(Opcode::PackedSwitch, Operands::Switch { a: register, table })
    }

    /// Appends a sparse switch on `register`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the register is outside the frame.
    pub fn sparse_switch(&mut self, register: Register, cases: &[(i32, &str)]) -> Result<&mut Self> {
        self.fixups.push(LabelFixup {
            instruction: self.instructions.len(),
            labels: cases.iter().map(|(_, l)| (*l).to_string()).collect(),
        });
        let entries: Vec<(i32, u32)> = cases.iter().map(|(key, _)| (*key, 0)).collect();
        let table = SwitchTable::sparse(&entries);
        self.emit(Opcode::SparseSwitch, Operands::Switch { a: register, table })
    }

    /// Declares a try range from label `start` up to label `end` with handlers
    /// given as `(caught type index, handler label)`.
    pub fn try_range(&mut self, start: &str, end: &str, handlers: &[(Option<u32>, &str)]) -> &mut Self {
        self.tries.push(TryFixup {
            start: start.to_string(),
            end: end.to_string(),
            handlers: handlers
                .iter()
                .map(|(ty, label)| (*ty, (*label).to_string()))
                .collect(),
        });
        self
    }

    /// Appends `const` into `register`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the register is outside the frame.
    pub fn const_int(&mut self, register: Register, value: i32) -> Result<&mut Self> {
        self.emit(
            Opcode::Const,
            Operands::Literal {
                a: register,
                value: i64::from(value),
            },
        )
    }

    /// Appends `const-wide` into the pair starting at `register`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the pair is outside the frame.
    pub fn const_wide(&mut self, register: Register, value: i64) -> Result<&mut Self> {
        self.emit(Opcode::ConstWide, Operands::Literal { a: register, value })
    }

    /// Appends a return of `register`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the register is outside the frame.
    pub fn ret(&mut self, opcode: Opcode, register: Register) -> Result<&mut Self> {
        self.emit(opcode, Operands::OneReg { a: register })
    }

    /// Appends `return-void`.
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` for chaining with the other emitters.
    pub fn return_void(&mut self) -> Result<&mut Self> {
        self.emit(Opcode::ReturnVoid, Operands::None)
    }

    /// Appends a call with explicit argument registers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if an argument is outside the frame.
    pub fn invoke(&mut self, opcode: Opcode, args: &[Register], method: u32) -> Result<&mut Self> {
        self.emit(
            opcode,
            Operands::Call {
                args: args.to_vec(),
                index: method,
                proto: None,
            },
        )
    }

    /// Appends `fill-array-data` for the array in `register`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the register is outside the frame.
    pub fn fill_array(&mut self, register: Register, element_width: u8, elements: &[i64]) -> Result<&mut Self> {
        self.emit(
            Opcode::FillArrayData,
            Operands::FillArray {
                a: register,
                data: ArrayData {
                    element_width,
                    elements: elements.to_vec(),
                },
            },
        )
    }

    fn check_registers(&self, operands: &Operands) -> Result<()> {
        let used: Vec<Register> = match operands {
            Operands::None | Operands::Branch { .. } => Vec::new(),
            Operands::OneReg { a }
            | Operands::Literal { a, .. }
            | Operands::RegIndex { a, .. }
            | Operands::CompareZero { a, .. }
            | Operands::Switch { a, .. }
            | Operands::FillArray { a, .. } => vec![*a],
            Operands::TwoReg { a, b }
            | Operands::BinaryLiteral { a, b, .. }
            | Operands::TwoRegIndex { a, b, .. }
            | Operands::Compare { a, b, .. } => vec![*a, *b],
            Operands::ThreeReg { a, b, c } => vec![*a, *b, *c],
            Operands::Call { args, .. } => args.clone(),
        };
        match used.iter().find(|r| **r >= self.registers) {
            Some(r) => Err(invalid_bytecode!(
                "register v{} outside a frame of {} registers",
                r,
                self.registers
            )),
            None => Ok(()),
        }
    }

    fn resolve(&self, label: &str) -> Result<u32> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| invalid_bytecode!("undefined label '{}'", label))
    }

    /// Resolves every label and returns the finished body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] for undefined labels or a body
    /// that fails [`CodeItem::validate`].
    pub fn finish(mut self) -> Result<CodeItem> {
        let fixups = std::mem::take(&mut self.fixups);
        for fixup in &fixups {
            let targets = fixup
                .labels
                .iter()
                .map(|label| self.resolve(label))
                .collect::<Result<Vec<u32>>>()?;
            let insn = &mut self.instructions[fixup.instruction];
            match &mut insn.operands {
                Operands::Branch { target }
                | Operands::Compare { target, .. }
                | Operands::CompareZero { target, .. } => *target = targets[0],
                Operands::Switch { table, .. } => table.targets = targets,
                _ => {}
            }
        }

        let mut tries = Vec::with_capacity(self.tries.len());
        for item in &self.tries {
            let handlers = item
                .handlers
                .iter()
                .map(|(type_index, label)| {
                    Ok(CatchHandler {
                        type_index: *type_index,
                        address: self.resolve(label)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            tries.push(TryItem {
                start: self.resolve(&item.start)?,
                end: self.resolve(&item.end)?,
                handlers,
            });
        }

        let code = CodeItem {
            registers: self.registers,
            ins: self.ins,
            outs: self.outs,
            instructions: self.instructions,
            tries,
        };
        code.validate()?;
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_branch_resolution() -> Result<()> {
        let mut asm = MethodAssembler::new(1, 0);
        asm.const_int(0, 5)?;
        asm.branch(Opcode::IfEqz, &[0], "end")?;
        asm.const_int(0, 7)?;
        asm.label("end")?;
        asm.ret(Opcode::Return, 0)?;
        let code = asm.finish()?;

        assert_eq!(code.instructions.len(), 4);
        assert_eq!(code.instructions[1].target()?, code.instructions[3].offset);
        Ok(())
    }

    #[test]
    fn test_undefined_label() -> Result<()> {
        let mut asm = MethodAssembler::new(1, 0);
        asm.branch(Opcode::Goto, &[], "nowhere")?;
        assert!(asm.finish().is_err());
        Ok(())
    }

    #[test]
    fn test_register_out_of_frame() {
        let mut asm = MethodAssembler::new(1, 0);
        assert!(asm.const_int(3, 0).is_err());
    }

    #[test]
    fn test_switch_and_try_resolution() -> Result<()> {
        let mut asm = MethodAssembler::new(1, 1);
        asm.label("start")?;
        asm.packed_switch(0, 0, &["a", "b"])?;
        asm.label("a")?;
        asm.return_void()?;
        asm.label("b")?;
        asm.return_void()?;
        asm.label("end")?;
        asm.label("handler")?;
        asm.return_void()?;
        asm.try_range("start", "end", &[(None, "handler")]);
        let code = asm.finish()?;

        let table = code.instructions[0].switch_table()?;
        assert_eq!(table.targets, vec![code.instructions[1].offset, code.instructions[2].offset]);
        assert_eq!(code.tries[0].handlers[0].address, code.instructions[3].offset);
        Ok(())
    }
}
