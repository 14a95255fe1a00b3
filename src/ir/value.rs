//! Value nodes of the SSA graph.
//!
//! A [`Value`] is either a phi, a parameter, a constant or an operation. All of
//! them live in the [`MethodGraph`](super::MethodGraph) arena and are referred to
//! by [`ValueId`]. Each value records:
//!
//! - its ordered `inputs` (the values it reads),
//! - the non-owning list of its `uses` (who reads it, at which input index),
//! - the environment slots that capture it (`env_uses`),
//! - for operations that can leave compiled code, its own environment snapshot.
//!
//! Use lists are maintained by the graph's mutation methods; code outside the
//! arena never edits them directly.
//!
//! # Phi Semantics
//!
//! A phi `v3 = Phi(v1, v2)` in a block with predecessors `[B1, B2]` takes `v1`
//! when control arrives from `B1` and `v2` when it arrives from `B2`. Phis of
//! ordinary blocks have exactly one input per predecessor, in predecessor order.
//! Catch-block phis instead have one input per throwing site that reaches the
//! handler while the register is defined.

use std::fmt;

use crate::{
    bytecode::Register,
    ir::{BlockId, Op, ValueId},
    types::DataType,
};

/// A constant value. Floating point constants are kept as raw bits so that
/// constants compare and hash exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    /// 32-bit integer constant
    Int(i32),
    /// 64-bit integer constant
    Long(i64),
    /// 32-bit float constant, as bits
    Float(u32),
    /// 64-bit float constant, as bits
    Double(u64),
    /// The null reference
    Null,
}

impl Constant {
    /// Value type of the constant.
    #[must_use]
    pub const fn data_type(self) -> DataType {
        match self {
            Constant::Int(_) => DataType::Int32,
            Constant::Long(_) => DataType::Int64,
            Constant::Float(_) => DataType::Float32,
            Constant::Double(_) => DataType::Float64,
            Constant::Null => DataType::Reference,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "IntConstant {v}"),
            Constant::Long(v) => write!(f, "LongConstant {v}"),
            Constant::Float(bits) => write!(f, "FloatConstant {}", f32::from_bits(*bits)),
            Constant::Double(bits) => write!(f, "DoubleConstant {}", f64::from_bits(*bits)),
            Constant::Null => write!(f, "NullConstant"),
        }
    }
}

/// Phi-specific state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiInfo {
    /// Virtual register the phi merges
    pub register: Register,
    /// `false` once the phi is known to be dead (type conflict or no uses)
    pub live: bool,
}

/// What a value node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// SSA merge node.
    Phi(PhiInfo),
    /// Incoming argument.
    Parameter {
        /// Position among the arguments, `this` included
        index: u16,
        /// `true` for the receiver
        is_this: bool,
        /// Declared type descriptor
        descriptor: String,
    },
    /// Constant, owned by the entry block.
    Constant(Constant),
    /// Operation.
    Operation(Op),
}

/// One reading of a value by another value's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UseSite {
    /// The reading value
    pub user: ValueId,
    /// Input index within the reader
    pub index: usize,
}

/// One capture of a value by an environment snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvUse {
    /// The value whose environment holds the capture
    pub holder: ValueId,
    /// Register slot in that environment
    pub slot: usize,
}

/// Snapshot of the local variable table at an instruction, one slot per register.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Value of each register, `None` if undefined
    pub slots: Vec<Option<ValueId>>,
}

impl Environment {
    /// Number of register slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the environment has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value captured for `register`.
    #[must_use]
    pub fn get(&self, register: usize) -> Option<ValueId> {
        self.slots.get(register).copied().flatten()
    }
}

/// A node of the SSA graph.
#[derive(Debug, Clone)]
pub struct Value {
    /// Identity of the value
    pub id: ValueId,
    /// Phi, parameter, constant or operation
    pub kind: ValueKind,
    /// Current value type; provisional for phis until the finalizer ran
    pub ty: DataType,
    /// Owning block; `None` once the value has been removed
    pub block: Option<BlockId>,
    /// Operands, in order
    pub(crate) inputs: Vec<ValueId>,
    /// Readers of this value
    pub(crate) uses: Vec<UseSite>,
    /// Environment slots capturing this value
    pub(crate) env_uses: Vec<EnvUse>,
    /// Source offset of the originating instruction
    pub offset: Option<u32>,
    /// Environment snapshot, for operations that need one
    pub(crate) environment: Option<Environment>,
}

impl Value {
    /// Operand values, in order.
    #[must_use]
    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    /// Operand at `index`.
    #[must_use]
    pub fn input(&self, index: usize) -> Option<ValueId> {
        self.inputs.get(index).copied()
    }

    /// Readers of this value.
    #[must_use]
    pub fn uses(&self) -> &[UseSite] {
        &self.uses
    }

    /// Environment captures of this value.
    #[must_use]
    pub fn env_uses(&self) -> &[EnvUse] {
        &self.env_uses
    }

    /// Environment snapshot held by this value.
    #[must_use]
    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    /// Returns `true` if some value reads this one.
    #[must_use]
    pub fn has_uses(&self) -> bool {
        !self.uses.is_empty()
    }

    /// Returns `true` if some environment captures this value.
    #[must_use]
    pub fn has_env_uses(&self) -> bool {
        !self.env_uses.is_empty()
    }

    /// Returns `true` if one environment captures this value in more than one slot.
    #[must_use]
    pub fn has_env_alias(&self) -> bool {
        self.env_uses.iter().enumerate().any(|(i, first)| {
            self.env_uses[i + 1..]
                .iter()
                .any(|other| other.holder == first.holder)
        })
    }

    /// Phi state, if this is a phi.
    #[must_use]
    pub fn phi(&self) -> Option<&PhiInfo> {
        match &self.kind {
            ValueKind::Phi(info) => Some(info),
            _ => None,
        }
    }

    /// Returns `true` for phis.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        matches!(self.kind, ValueKind::Phi(_))
    }

    /// Returns `true` for live phis.
    #[must_use]
    pub fn is_live_phi(&self) -> bool {
        matches!(self.kind, ValueKind::Phi(PhiInfo { live: true, .. }))
    }

    /// Operation payload, if this is an operation.
    #[must_use]
    pub fn op(&self) -> Option<&Op> {
        match &self.kind {
            ValueKind::Operation(op) => Some(op),
            _ => None,
        }
    }

    /// Constant payload, if this is a constant.
    #[must_use]
    pub fn constant(&self) -> Option<Constant> {
        match &self.kind {
            ValueKind::Constant(c) => Some(*c),
            _ => None,
        }
    }

    /// Returns `true` for the 32-bit integer constant zero.
    #[must_use]
    pub fn is_int_zero(&self) -> bool {
        self.constant() == Some(Constant::Int(0))
    }

    /// Returns `true` for the null constant.
    #[must_use]
    pub fn is_null_constant(&self) -> bool {
        self.constant() == Some(Constant::Null)
    }

    /// Returns `true` while the value is attached to a block.
    #[must_use]
    pub fn is_in_graph(&self) -> bool {
        self.block.is_some()
    }

    /// Name of the value's kind, as printed in graph dumps.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ValueKind::Phi(_) => "Phi",
            ValueKind::Parameter { .. } => "Parameter",
            ValueKind::Constant(Constant::Int(_)) => "IntConstant",
            ValueKind::Constant(Constant::Long(_)) => "LongConstant",
            ValueKind::Constant(Constant::Float(_)) => "FloatConstant",
            ValueKind::Constant(Constant::Double(_)) => "DoubleConstant",
            ValueKind::Constant(Constant::Null) => "NullConstant",
            ValueKind::Operation(op) => op.name(),
        }
    }
}
