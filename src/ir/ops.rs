//! Operation payloads of value nodes.
//!
//! Every non-phi, non-constant, non-parameter value carries one [`Op`]. The set is
//! closed and every property the builders and the finalizer need
//! ([`Op::needs_environment`], [`Op::is_control_flow`], [`Op::can_throw`]) is an
//! exhaustive match, so adding an operation forces each of them to be revisited.
//!
//! Operand values are not part of the payload: they are the value's ordered
//! `inputs` in the arena. The documented input layout of each variant is what the
//! instruction builder produces and what the graph checker verifies.

use strum::{Display, IntoStaticStr};

use crate::{resolver::InvokeKind, types::DataType};

/// Comparison performed by a [`Op::Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[allow(missing_docs)]
pub enum Condition {
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanOrEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanOrEqual,
}

/// Two-operand arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    UShr,
}

impl BinaryOp {
    /// Returns `true` for the shifts, whose distance operand is always `Int32`.
    #[must_use]
    pub const fn is_shift(self) -> bool {
        matches!(self, Self::Shl | Self::Shr | Self::UShr)
    }
}

/// One-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// NaN handling of a floating point three-way compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ComparisonBias {
    /// Integer compare, no NaN
    #[strum(serialize = "none")]
    NoBias,
    /// NaN compares greater (`cmpg`)
    #[strum(serialize = "gt")]
    GtBias,
    /// NaN compares less (`cmpl`)
    #[strum(serialize = "lt")]
    LtBias,
}

/// Side of a protected region a try boundary marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TryBoundaryKind {
    /// Control enters the region
    Entry,
    /// Control leaves the region
    Exit,
}

/// Monitor operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MonitorKind {
    /// Acquire the monitor
    Enter,
    /// Release the monitor
    Exit,
}

/// Strategy of an `instance-of` or `check-cast`, derived from the resolved target class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TypeCheckKind {
    /// The class did not resolve
    Unresolved,
    /// Nothing but the class itself can match
    Exact,
    /// Walk the superclass chain
    ClassHierarchy,
    /// Walk the superclass chain, skipping the object's own class
    AbstractClass,
    /// Search the implemented interfaces
    Interface,
    /// Target is `Object[]`
    ArrayObject,
    /// Any other array type
    Array,
}

/// Class initialization obligation of a static call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ClinitCheckRequirement {
    /// The class is initialized
    None,
    /// The callee initializes its class itself
    Implicit,
    /// An explicit [`Op::ClinitCheck`] is the call's last input
    Explicit,
}

/// How a call reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dispatch {
    /// The target did not resolve; resolution and dispatch happen at run time
    Unresolved,
    /// Direct call to a known method
    StaticOrDirect {
        /// Class initialization obligation
        clinit: ClinitCheckRequirement,
        /// `true` for a string constructor turned into a factory call
        string_init: bool,
    },
    /// Virtual dispatch
    Virtual {
        /// Vtable slot
        vtable_index: u32,
    },
    /// Interface dispatch
    Interface {
        /// Interface table slot
        imt_index: u32,
    },
    /// Signature-polymorphic dispatch through a method handle
    Polymorphic {
        /// Prototype index of the call site
        proto: u32,
    },
}

/// A call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Invoke {
    /// Kind of the calling instruction
    pub kind: InvokeKind,
    /// Method index
    pub method: u32,
    /// Dispatch strategy
    pub dispatch: Dispatch,
    /// Number of argument inputs (receiver included); a trailing clinit check is extra
    pub arguments: u32,
}

/// Operation of a value node.
///
/// Input layouts are given as `[input0, input1, ...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum Op {
    /// Unconditional jump to successor 0. `[]`
    Goto,
    /// Two-way branch: successor 0 when false, successor 1 when true. `[condition]`
    If,
    /// Table switch: successor 0 is the default, then one per key. `[value]`
    PackedSwitch {
        /// Key of the first case
        start: i32,
        /// Number of cases
        entries: u32,
    },
    /// Return a value. `[value]`
    Return,
    /// Return without a value. `[]`
    ReturnVoid,
    /// Throw an exception object. `[exception]`
    Throw,
    /// Terminator of the exit block. `[]`
    Exit,
    /// Safepoint at method entry and loop headers. `[]`
    SuspendCheck,
    /// Ends a try boundary block: successor 0 is the normal flow, the rest are handlers. `[]`
    TryBoundary {
        /// Which side of the region
        kind: TryBoundaryKind,
    },

    /// Boolean comparison. `[lhs, rhs]`
    Condition(Condition),
    /// Arithmetic or bitwise operation. `[lhs, rhs]`
    Binary(BinaryOp),
    /// Negation or complement. `[operand]`
    Unary(UnaryOp),
    /// Three-way compare producing -1, 0 or 1. `[lhs, rhs]`
    Compare {
        /// NaN handling
        bias: ComparisonBias,
    },
    /// Numeric conversion to the value's type. `[operand]`
    TypeConversion,

    /// Throws if the divisor is zero; evaluates to it. `[divisor]`
    DivZeroCheck,
    /// Throws if the reference is null; evaluates to it. `[reference]`
    NullCheck,
    /// Throws unless `0 <= index < length`; evaluates to the index. `[index, length]`
    BoundsCheck,
    /// Length of an array. `[array]`
    ArrayLength,
    /// Array element load; the value type is the element type. `[array, index]`
    ArrayGet,
    /// Array element store. `[array, index, value]`
    ArraySet {
        /// Element type implied by the storing instruction
        expected: DataType,
    },

    /// Resolved instance field load. `[object]`
    InstanceFieldGet {
        /// Field index
        field: u32,
        /// Volatile access
        volatile: bool,
    },
    /// Resolved instance field store. `[object, value]`
    InstanceFieldSet {
        /// Field index
        field: u32,
        /// Volatile access
        volatile: bool,
        /// Declared field type
        field_type: DataType,
    },
    /// Resolved static field load. `[class]`
    StaticFieldGet {
        /// Field index
        field: u32,
        /// Volatile access
        volatile: bool,
    },
    /// Resolved static field store. `[class, value]`
    StaticFieldSet {
        /// Field index
        field: u32,
        /// Volatile access
        volatile: bool,
        /// Declared field type
        field_type: DataType,
    },
    /// Instance field load resolved at run time. `[object]`
    UnresolvedInstanceFieldGet {
        /// Field index
        field: u32,
    },
    /// Instance field store resolved at run time. `[object, value]`
    UnresolvedInstanceFieldSet {
        /// Field index
        field: u32,
        /// Declared field type
        field_type: DataType,
    },
    /// Static field load resolved at run time. `[]`
    UnresolvedStaticFieldGet {
        /// Field index
        field: u32,
    },
    /// Static field store resolved at run time. `[value]`
    UnresolvedStaticFieldSet {
        /// Field index
        field: u32,
        /// Declared field type
        field_type: DataType,
    },

    /// Call. `[arguments..., clinit_check?]`
    Invoke(Invoke),
    /// Object allocation. `[class]`
    NewInstance {
        /// Allocated type index
        type_index: u32,
        /// The class needs finalization or did not resolve
        finalizable: bool,
        /// Allocation must check accessibility and instantiability at run time
        needs_checks: bool,
        /// Allocation of the string class, replaced by a factory call later
        is_string: bool,
    },
    /// Array allocation. `[class, length]`
    NewArray {
        /// Array type index
        type_index: u32,
    },
    /// Publication barrier for freshly constructed objects. `[object]`
    ConstructorFence,
    /// Class reference. `[]`
    LoadClass {
        /// Type index
        type_index: u32,
        /// Access must be checked at run time
        needs_access_check: bool,
        /// The class declaring the method being built
        is_referrers_class: bool,
    },
    /// String constant. `[]`
    LoadString {
        /// String index
        string_index: u32,
    },
    /// Ensures the class is initialized; evaluates to it. `[class]`
    ClinitCheck,
    /// Type test. `[object, class]`
    InstanceOf {
        /// Check strategy
        kind: TypeCheckKind,
    },
    /// Throwing type test. `[object, class]`
    CheckCast {
        /// Check strategy
        kind: TypeCheckKind,
    },
    /// The object of a passed cast, typed by it. `[object]`
    BoundType {
        /// Type index the object is known to have
        type_index: u32,
    },
    /// The pending exception at a handler's start. `[]`
    LoadException,
    /// Clears the pending exception. `[]`
    ClearException,
    /// Monitor enter or exit. `[object]`
    Monitor(MonitorKind),
}

impl Op {
    /// Operation name as printed in graph dumps.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Returns `true` for operations that end a block.
    #[must_use]
    pub const fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Op::Goto
                | Op::If
                | Op::PackedSwitch { .. }
                | Op::Return
                | Op::ReturnVoid
                | Op::Throw
                | Op::Exit
                | Op::TryBoundary { .. }
        )
    }

    /// Returns `true` for operations that may raise an exception.
    #[must_use]
    pub const fn can_throw(&self) -> bool {
        match self {
            Op::Throw
            | Op::DivZeroCheck
            | Op::NullCheck
            | Op::BoundsCheck
            | Op::UnresolvedInstanceFieldGet { .. }
            | Op::UnresolvedInstanceFieldSet { .. }
            | Op::UnresolvedStaticFieldGet { .. }
            | Op::UnresolvedStaticFieldSet { .. }
            | Op::Invoke(_)
            | Op::NewInstance { .. }
            | Op::NewArray { .. }
            | Op::LoadClass { .. }
            | Op::LoadString { .. }
            | Op::ClinitCheck
            | Op::CheckCast { .. }
            | Op::InstanceOf { .. }
            | Op::Monitor(MonitorKind::Enter) => true,
            Op::ArraySet { expected } => matches!(expected, DataType::Reference),
            Op::Goto
            | Op::If
            | Op::PackedSwitch { .. }
            | Op::Return
            | Op::ReturnVoid
            | Op::Exit
            | Op::SuspendCheck
            | Op::TryBoundary { .. }
            | Op::Condition(_)
            | Op::Binary(_)
            | Op::Unary(_)
            | Op::Compare { .. }
            | Op::TypeConversion
            | Op::ArrayLength
            | Op::ArrayGet
            | Op::InstanceFieldGet { .. }
            | Op::InstanceFieldSet { .. }
            | Op::StaticFieldGet { .. }
            | Op::StaticFieldSet { .. }
            | Op::ConstructorFence
            | Op::BoundType { .. }
            | Op::LoadException
            | Op::ClearException
            | Op::Monitor(MonitorKind::Exit) => false,
        }
    }

    /// Returns `true` if the operation captures an environment snapshot of the
    /// local variable table when it is created.
    ///
    /// These are the operations that can leave compiled code (throw, call into
    /// the runtime or suspend), where the interpreter state must be reconstructible.
    #[must_use]
    pub const fn needs_environment(&self) -> bool {
        match self {
            Op::SuspendCheck | Op::Monitor(_) => true,
            Op::Goto
            | Op::If
            | Op::PackedSwitch { .. }
            | Op::Return
            | Op::ReturnVoid
            | Op::Exit
            | Op::TryBoundary { .. }
            | Op::Condition(_)
            | Op::Binary(_)
            | Op::Unary(_)
            | Op::Compare { .. }
            | Op::TypeConversion
            | Op::ArrayLength
            | Op::ArrayGet
            | Op::InstanceFieldGet { .. }
            | Op::InstanceFieldSet { .. }
            | Op::StaticFieldGet { .. }
            | Op::StaticFieldSet { .. }
            | Op::ConstructorFence
            | Op::BoundType { .. }
            | Op::LoadException
            | Op::ClearException => false,
            other => other.can_throw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Op::Goto.name(), "Goto");
        assert_eq!(Op::Binary(BinaryOp::Add).name(), "Binary");
        assert_eq!(BinaryOp::UShr.to_string(), "ushr");
        assert_eq!(Condition::LessThanOrEqual.to_string(), "<=");
    }

    #[test]
    fn test_environment_requirements() {
        assert!(Op::SuspendCheck.needs_environment());
        assert!(Op::NullCheck.needs_environment());
        assert!(Op::Monitor(MonitorKind::Exit).needs_environment());
        assert!(!Op::Binary(BinaryOp::Div).needs_environment());
        assert!(!Op::ArraySet { expected: DataType::Int32 }.needs_environment());
        assert!(Op::ArraySet { expected: DataType::Reference }.needs_environment());
    }

    #[test]
    fn test_control_flow() {
        assert!(Op::TryBoundary { kind: TryBoundaryKind::Exit }.is_control_flow());
        assert!(!Op::SuspendCheck.is_control_flow());
    }
}
