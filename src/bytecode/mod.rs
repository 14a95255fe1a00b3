//! Decoded bytecode consumed by the graph builders.
//!
//! Decoding raw method bodies is the job of an external loader; this module
//! defines the decoded form it hands over.
//!
//! # Key Types
//!
//! - [`Opcode`] / [`FlowType`] - Normalized opcode set and its control-flow classes
//! - [`Instruction`] / [`Operands`] - One decoded instruction
//! - [`CodeItem`] / [`TryItem`] - A method body and its exception table
//! - [`SymbolTable`] / [`CompilationUnit`] - What indices in the body refer to
//! - [`MethodAssembler`] - Label-based construction of bodies

mod assembler;
mod code;
mod instruction;
mod opcodes;

pub use assembler::{LabelFixup, MethodAssembler};
pub use code::{
    CatchHandler, CodeItem, CompilationUnit, FieldId, MethodId, Signature, SymbolTable, TryItem,
    CONSTRUCTOR_NAME, STRING_DESCRIPTOR,
};
pub use instruction::{
    ArrayData, Instruction, Operands, Register, SwitchTable, SMALL_SWITCH_THRESHOLD,
};
pub use opcodes::{FlowType, Opcode};
