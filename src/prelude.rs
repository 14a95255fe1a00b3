//! # ssagraph Prelude
//!
//! Convenient re-exports of the types needed to assemble a method body, build
//! its graph and inspect the result.
//!
//! ```rust,ignore
//! use ssagraph::prelude::*;
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ssagraph operations
pub use crate::Error;

/// The result type used throughout ssagraph
pub use crate::Result;

/// Build configuration, budget and statistics
pub use crate::config::{BuildStats, BuilderConfig, CompilationBudget};

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Build driver
pub use crate::builder::{build_methods, GraphBuilder};

/// Individual phases, for callers running them one by one
pub use crate::builder::{BlockBuilder, BlockMap, InstructionBuilder};
pub use crate::ssa::SsaFinalizer;

// ================================================================================================
// Input
// ================================================================================================

/// Decoded bytecode
pub use crate::bytecode::{
    ArrayData, CatchHandler, CodeItem, CompilationUnit, Instruction, MethodAssembler, Opcode,
    Operands, Register, Signature, SwitchTable, SymbolTable, TryItem,
};

/// Symbol resolution
pub use crate::resolver::{
    CachedResolver, FieldFlags, InvokeKind, MapResolver, Resolution, ResolvedField,
    ResolvedMethod, ResolvedType, Resolver, TypeFlags, UnresolvedResolver,
};

// ================================================================================================
// Output
// ================================================================================================

/// The method graph and its parts
pub use crate::ir::{
    BasicBlock, BinaryOp, BlockFlags, BlockId, Condition, Constant, Dispatch, Invoke, MethodGraph,
    Op, Value, ValueId, ValueKind,
};

/// Value types
pub use crate::types::DataType;
