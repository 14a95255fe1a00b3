//! The method graph: an arena of basic blocks and SSA values.
//!
//! # Architecture
//!
//! - [`ids`] - Copyable handles into the arena
//! - [`block`] - Basic blocks, their flags, try/catch role and loop information
//! - [`value`] - Value nodes (phis, parameters, constants, operations) and environments
//! - [`ops`] - The closed set of operations
//! - [`graph`] - The [`MethodGraph`] arena and its mutation API
//! - `analysis` - Back edges, dominators, loops and try membership
//! - `printer` - Text and Graphviz output
//! - [`checker`] - Structural verification
//!
//! # Invariants
//!
//! After a successful build:
//!
//! - every value has exactly one defining block,
//! - every phi outside a catch block has one input per predecessor, in predecessor order,
//! - every input of an instruction dominates it,
//! - use lists mirror input lists exactly.

mod analysis;
pub mod block;
pub mod checker;
pub mod graph;
pub mod ids;
pub mod ops;
mod printer;
pub mod value;

pub use block::{BasicBlock, BlockFlags, LoopInfo, TryCatchInfo};
pub use graph::MethodGraph;
pub use ids::{BlockId, ValueId};
pub use ops::{
    BinaryOp, ClinitCheckRequirement, ComparisonBias, Condition, Dispatch, Invoke, MonitorKind,
    Op, TryBoundaryKind, TypeCheckKind, UnaryOp,
};
pub use value::{Constant, EnvUse, Environment, PhiInfo, UseSite, Value, ValueKind};
