//! Decoded instruction representation.
//!
//! An [`Instruction`] is the unit the builders consume: an offset in 16-bit code
//! units, a normalized [`Opcode`] and a closed set of [`Operands`] shapes. Branch
//! operands are absolute offsets; out-of-line payloads (switch tables, array data)
//! are already decoded into [`SwitchTable`] and [`ArrayData`].
//!
//! The accessors on [`Instruction`] (`a()`, `b()`, `target()`, ...) report an
//! operand shape that does not fit the opcode as
//! [`Error::InvalidBytecode`](crate::Error::InvalidBytecode), so translation code
//! can use `?` instead of matching every shape.

use std::fmt;

use crate::{bytecode::Opcode, Result};

/// A virtual register index.
pub type Register = u16;

/// Decoded operands of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operands {
    /// No operands (`nop`, `return-void`).
    None,
    /// A single register.
    OneReg {
        /// The register
        a: Register,
    },
    /// Destination and source register.
    TwoReg {
        /// Destination (or first) register
        a: Register,
        /// Source (or second) register
        b: Register,
    },
    /// Three registers; `a` is the destination for arithmetic and array gets.
    ThreeReg {
        /// Destination or value register
        a: Register,
        /// First source register
        b: Register,
        /// Second source register
        c: Register,
    },
    /// Register and an immediate literal (`const`, `const-wide`).
    Literal {
        /// Destination register
        a: Register,
        /// The literal, sign-extended
        value: i64,
    },
    /// Two registers and a literal (`add-int/lit16`, `rsub-int`).
    BinaryLiteral {
        /// Destination register
        a: Register,
        /// Source register
        b: Register,
        /// The literal, sign-extended
        literal: i32,
    },
    /// A register and a symbol table index (string, type, field).
    RegIndex {
        /// The register
        a: Register,
        /// Index into the relevant symbol table
        index: u32,
    },
    /// Two registers and a symbol table index (`iget`, `instance-of`, `new-array`).
    TwoRegIndex {
        /// Destination or value register
        a: Register,
        /// Object or size register
        b: Register,
        /// Index into the relevant symbol table
        index: u32,
    },
    /// Unconditional branch.
    Branch {
        /// Absolute target offset
        target: u32,
    },
    /// Two-register conditional branch.
    Compare {
        /// First compared register
        a: Register,
        /// Second compared register
        b: Register,
        /// Absolute target offset
        target: u32,
    },
    /// Conditional branch comparing against zero.
    CompareZero {
        /// The compared register
        a: Register,
        /// Absolute target offset
        target: u32,
    },
    /// Argument list of a call or `filled-new-array`.
    ///
    /// Range forms are expanded to their contiguous register list.
    Call {
        /// Argument registers in order; wide values take two consecutive entries
        args: Vec<Register>,
        /// Method index (or type index for `filled-new-array`)
        index: u32,
        /// Prototype index for polymorphic calls
        proto: Option<u32>,
    },
    /// Switch on a register.
    Switch {
        /// The tested register
        a: Register,
        /// Decoded switch payload
        table: SwitchTable,
    },
    /// `fill-array-data` payload.
    FillArray {
        /// The array register
        a: Register,
        /// Decoded array payload
        data: ArrayData,
    },
}

/// Largest switch lowered to a chain of compares even when its keys are packed.
pub const SMALL_SWITCH_THRESHOLD: usize = 3;

/// Decoded packed or sparse switch payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTable {
    /// `true` for a packed switch (consecutive keys)
    pub packed: bool,
    /// Case keys, one per target
    pub keys: Vec<i32>,
    /// Absolute target offsets, one per key
    pub targets: Vec<u32>,
}

impl SwitchTable {
    /// Creates a packed table with keys `first_key..first_key + targets.len()`.
    #[must_use]
    pub fn packed(first_key: i32, targets: Vec<u32>) -> Self {
        let keys = (0..targets.len())
            .map(|i| first_key.wrapping_add(i as i32))
            .collect();
        SwitchTable {
            packed: true,
            keys,
            targets,
        }
    }

    /// Creates a sparse table from `(key, target)` pairs.
    #[must_use]
    pub fn sparse(entries: &[(i32, u32)]) -> Self {
        SwitchTable {
            packed: false,
            keys: entries.iter().map(|(key, _)| *key).collect(),
            targets: entries.iter().map(|(_, target)| *target).collect(),
        }
    }

    /// Number of case entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Returns `true` if the switch is lowered to a chain of compare-and-branch
    /// blocks instead of a table switch: sparse switches and small packed ones.
    #[must_use]
    pub fn builds_decision_tree(&self) -> bool {
        !self.packed || self.len() <= SMALL_SWITCH_THRESHOLD
    }

    /// First key of the table.
    #[must_use]
    pub fn first_key(&self) -> Option<i32> {
        self.keys.first().copied()
    }

    /// Checks that keys and targets match up and keys are ordered as the payload requires.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] for a malformed payload.
    pub fn validate(&self) -> Result<()> {
        if self.keys.len() != self.targets.len() {
            return Err(invalid_bytecode!(
                "switch payload has {} keys but {} targets",
                self.keys.len(),
                self.targets.len()
            ));
        }
        for pair in self.keys.windows(2) {
            let ordered = if self.packed {
                pair[0].checked_add(1) == Some(pair[1])
            } else {
                pair[0] < pair[1]
            };
            if !ordered {
                return Err(invalid_bytecode!(
                    "switch payload keys out of order: {} then {}",
                    pair[0],
                    pair[1]
                ));
            }
        }
        Ok(())
    }
}

/// Decoded `fill-array-data` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayData {
    /// Width of one element in bytes: 1, 2, 4 or 8
    pub element_width: u8,
    /// Element values, sign-extended
    pub elements: Vec<i64>,
}

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset in code units from the start of the method
    pub offset: u32,
    /// Encoded size in code units
    pub size: u32,
    /// The normalized opcode
    pub opcode: Opcode,
    /// Decoded operands
    pub operands: Operands,
}

impl Instruction {
    /// Creates an instruction with the canonical width of its opcode.
    #[must_use]
    pub fn new(offset: u32, opcode: Opcode, operands: Operands) -> Self {
        Instruction {
            offset,
            size: opcode.width(),
            opcode,
            operands,
        }
    }

    /// Offset of the instruction that follows this one.
    #[must_use]
    pub fn next_offset(&self) -> u32 {
        self.offset + self.size
    }

    /// Every offset this instruction may branch to, excluding the fall-through.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        match &self.operands {
            Operands::Branch { target }
            | Operands::Compare { target, .. }
            | Operands::CompareZero { target, .. } => vec![*target],
            Operands::Switch { table, .. } => table.targets.clone(),
            _ => Vec::new(),
        }
    }

    fn malformed(&self) -> crate::Error {
        invalid_bytecode!(
            "'{}' at {:#x} has unexpected operands {:?}",
            self.opcode,
            self.offset,
            self.operands
        )
    }

    /// The first register operand.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the operands have no register.
    pub fn a(&self) -> Result<Register> {
        match &self.operands {
            Operands::OneReg { a }
            | Operands::TwoReg { a, .. }
            | Operands::ThreeReg { a, .. }
            | Operands::Literal { a, .. }
            | Operands::BinaryLiteral { a, .. }
            | Operands::RegIndex { a, .. }
            | Operands::TwoRegIndex { a, .. }
            | Operands::Compare { a, .. }
            | Operands::CompareZero { a, .. }
            | Operands::Switch { a, .. }
            | Operands::FillArray { a, .. } => Ok(*a),
            _ => Err(self.malformed()),
        }
    }

    /// The second register operand.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the operands have no second register.
    pub fn b(&self) -> Result<Register> {
        match &self.operands {
            Operands::TwoReg { b, .. }
            | Operands::ThreeReg { b, .. }
            | Operands::BinaryLiteral { b, .. }
            | Operands::TwoRegIndex { b, .. }
            | Operands::Compare { b, .. } => Ok(*b),
            _ => Err(self.malformed()),
        }
    }

    /// The third register operand.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] unless the operands are [`Operands::ThreeReg`].
    pub fn c(&self) -> Result<Register> {
        match &self.operands {
            Operands::ThreeReg { c, .. } => Ok(*c),
            _ => Err(self.malformed()),
        }
    }

    /// The immediate literal.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the operands carry no literal.
    pub fn literal(&self) -> Result<i64> {
        match &self.operands {
            Operands::Literal { value, .. } => Ok(*value),
            Operands::BinaryLiteral { literal, .. } => Ok(i64::from(*literal)),
            _ => Err(self.malformed()),
        }
    }

    /// The symbol table index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the operands carry no index.
    pub fn index(&self) -> Result<u32> {
        match &self.operands {
            Operands::RegIndex { index, .. }
            | Operands::TwoRegIndex { index, .. }
            | Operands::Call { index, .. } => Ok(*index),
            _ => Err(self.malformed()),
        }
    }

    /// The branch target.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the operands carry no target.
    pub fn target(&self) -> Result<u32> {
        match &self.operands {
            Operands::Branch { target }
            | Operands::Compare { target, .. }
            | Operands::CompareZero { target, .. } => Ok(*target),
            _ => Err(self.malformed()),
        }
    }

    /// The argument registers of a call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] unless the operands are [`Operands::Call`].
    pub fn args(&self) -> Result<&[Register]> {
        match &self.operands {
            Operands::Call { args, .. } => Ok(args),
            _ => Err(self.malformed()),
        }
    }

    /// The prototype index of a polymorphic call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if no prototype is present.
    pub fn proto(&self) -> Result<u32> {
        match &self.operands {
            Operands::Call {
                proto: Some(proto), ..
            } => Ok(*proto),
            _ => Err(self.malformed()),
        }
    }

    /// The decoded switch payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] unless the operands are [`Operands::Switch`].
    pub fn switch_table(&self) -> Result<&SwitchTable> {
        match &self.operands {
            Operands::Switch { table, .. } => Ok(table),
            _ => Err(self.malformed()),
        }
    }

    /// The decoded array payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] unless the operands are [`Operands::FillArray`].
    pub fn array_data(&self) -> Result<&ArrayData> {
        match &self.operands {
            Operands::FillArray { data, .. } => Ok(data),
            _ => Err(self.malformed()),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}: {}", self.offset, self.opcode)?;
        match &self.operands {
            Operands::None => Ok(()),
            Operands::OneReg { a } => write!(f, " v{a}"),
            Operands::TwoReg { a, b } => write!(f, " v{a}, v{b}"),
            Operands::ThreeReg { a, b, c } => write!(f, " v{a}, v{b}, v{c}"),
            Operands::Literal { a, value } => write!(f, " v{a}, #{value}"),
            Operands::BinaryLiteral { a, b, literal } => write!(f, " v{a}, v{b}, #{literal}"),
            Operands::RegIndex { a, index } => write!(f, " v{a}, @{index}"),
            Operands::TwoRegIndex { a, b, index } => write!(f, " v{a}, v{b}, @{index}"),
            Operands::Branch { target } => write!(f, " {target:04x}"),
            Operands::Compare { a, b, target } => write!(f, " v{a}, v{b}, {target:04x}"),
            Operands::CompareZero { a, target } => write!(f, " v{a}, {target:04x}"),
            Operands::Call { args, index, .. } => {
                let args: Vec<String> = args.iter().map(|r| format!("v{r}")).collect();
                write!(f, " {{{}}}, @{index}", args.join(", "))
            }
            Operands::Switch { a, table } => write!(f, " v{a}, [{} cases]", table.len()),
            Operands::FillArray { a, data } => {
                write!(f, " v{a}, [{} x {}]", data.elements.len(), data.element_width)
            }
        }
    }
}
