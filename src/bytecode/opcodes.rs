//! Opcode set of the register-machine bytecode.
//!
//! Opcodes are normalized: encoding variants that only differ in operand width
//! (`const/4`, `const/16`, `goto/32`, `add-int/2addr`, ...) collapse into one
//! [`Opcode`] whose operands are carried by [`Operands`](super::Operands). The
//! mnemonic of each opcode is available through `Display` (kebab-case).
//!
//! Control-flow behavior is described by [`FlowType`]; [`Opcode::can_throw`] and
//! [`Opcode::can_continue`] drive block splitting and exceptional edges.

use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

use crate::types::DataType;

/// How an instruction affects control flow.
///
/// # Thread Safety
///
/// [`FlowType`] is [`Send`] and [`Sync`] as it only contains unit variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Execution continues with the next instruction.
    Sequential,
    /// Either branches to a target or continues with the next instruction.
    ConditionalBranch,
    /// Always branches to a target.
    UnconditionalBranch,
    /// Multi-way branch, falling through to the next instruction when no key matches.
    Switch,
    /// Leaves the method normally.
    Return,
    /// Leaves the method or the protected region exceptionally.
    Throw,
}

/// A normalized bytecode opcode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[allow(missing_docs)]
pub enum Opcode {
    Nop,
    Move,
    MoveWide,
    MoveObject,
    MoveResult,
    MoveResultWide,
    MoveResultObject,
    MoveException,
    ReturnVoid,
    Return,
    ReturnWide,
    ReturnObject,
    Const,
    ConstWide,
    ConstString,
    ConstClass,
    ConstMethodHandle,
    ConstMethodType,
    MonitorEnter,
    MonitorExit,
    CheckCast,
    InstanceOf,
    ArrayLength,
    NewInstance,
    NewArray,
    FilledNewArray,
    FilledNewArrayRange,
    FillArrayData,
    Throw,
    Goto,
    PackedSwitch,
    SparseSwitch,
    CmplFloat,
    CmpgFloat,
    CmplDouble,
    CmpgDouble,
    CmpLong,
    IfEq,
    IfNe,
    IfLt,
    IfGe,
    IfGt,
    IfLe,
    IfEqz,
    IfNez,
    IfLtz,
    IfGez,
    IfGtz,
    IfLez,
    Aget,
    AgetWide,
    AgetObject,
    AgetBoolean,
    AgetByte,
    AgetChar,
    AgetShort,
    Aput,
    AputWide,
    AputObject,
    AputBoolean,
    AputByte,
    AputChar,
    AputShort,
    Iget,
    IgetWide,
    IgetObject,
    IgetBoolean,
    IgetByte,
    IgetChar,
    IgetShort,
    Iput,
    IputWide,
    IputObject,
    IputBoolean,
    IputByte,
    IputChar,
    IputShort,
    Sget,
    SgetWide,
    SgetObject,
    SgetBoolean,
    SgetByte,
    SgetChar,
    SgetShort,
    Sput,
    SputWide,
    SputObject,
    SputBoolean,
    SputByte,
    SputChar,
    SputShort,
    InvokeVirtual,
    InvokeSuper,
    InvokeDirect,
    InvokeStatic,
    InvokeInterface,
    InvokeVirtualRange,
    InvokeSuperRange,
    InvokeDirectRange,
    InvokeStaticRange,
    InvokeInterfaceRange,
    InvokePolymorphic,
    InvokePolymorphicRange,
    InvokeCustom,
    InvokeCustomRange,
    NegInt,
    NotInt,
    NegLong,
    NotLong,
    NegFloat,
    NegDouble,
    IntToLong,
    IntToFloat,
    IntToDouble,
    LongToInt,
    LongToFloat,
    LongToDouble,
    FloatToInt,
    FloatToLong,
    FloatToDouble,
    DoubleToInt,
    DoubleToLong,
    DoubleToFloat,
    IntToByte,
    IntToChar,
    IntToShort,
    AddInt,
    SubInt,
    MulInt,
    DivInt,
    RemInt,
    AndInt,
    OrInt,
    XorInt,
    ShlInt,
    ShrInt,
    UshrInt,
    AddLong,
    SubLong,
    MulLong,
    DivLong,
    RemLong,
    AndLong,
    OrLong,
    XorLong,
    ShlLong,
    ShrLong,
    UshrLong,
    AddFloat,
    SubFloat,
    MulFloat,
    DivFloat,
    RemFloat,
    AddDouble,
    SubDouble,
    MulDouble,
    DivDouble,
    RemDouble,
    AddIntLit,
    RsubInt,
    MulIntLit,
    DivIntLit,
    RemIntLit,
    AndIntLit,
    OrIntLit,
    XorIntLit,
    ShlIntLit,
    ShrIntLit,
    UshrIntLit,
}

impl Opcode {
    /// Control-flow behavior of this opcode.
    #[must_use]
    pub const fn flow(self) -> FlowType {
        match self {
            Self::Goto => FlowType::UnconditionalBranch,
            Self::IfEq
            | Self::IfNe
            | Self::IfLt
            | Self::IfGe
            | Self::IfGt
            | Self::IfLe
            | Self::IfEqz
            | Self::IfNez
            | Self::IfLtz
            | Self::IfGez
            | Self::IfGtz
            | Self::IfLez => FlowType::ConditionalBranch,
            Self::PackedSwitch | Self::SparseSwitch => FlowType::Switch,
            Self::ReturnVoid | Self::Return | Self::ReturnWide | Self::ReturnObject => {
                FlowType::Return
            }
            Self::Throw => FlowType::Throw,
            _ => FlowType::Sequential,
        }
    }

    /// Returns `true` if execution may continue with the next instruction.
    #[must_use]
    pub const fn can_continue(self) -> bool {
        matches!(
            self.flow(),
            FlowType::Sequential | FlowType::ConditionalBranch | FlowType::Switch
        )
    }

    /// Returns `true` for goto and the conditional branches.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(
            self.flow(),
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch
        )
    }

    /// Returns `true` for packed and sparse switches.
    #[must_use]
    pub const fn is_switch(self) -> bool {
        matches!(self.flow(), FlowType::Switch)
    }

    /// Returns `true` for the return family.
    #[must_use]
    pub const fn is_return(self) -> bool {
        matches!(self.flow(), FlowType::Return)
    }

    /// Returns `true` for instructions after which a block ends unconditionally.
    #[must_use]
    pub const fn ends_block(self) -> bool {
        !matches!(self.flow(), FlowType::Sequential)
    }

    /// Returns `true` for call instructions, whose result may be read by `move-result`.
    #[must_use]
    pub const fn is_invoke(self) -> bool {
        matches!(
            self,
            Self::InvokeVirtual
                | Self::InvokeSuper
                | Self::InvokeDirect
                | Self::InvokeStatic
                | Self::InvokeInterface
                | Self::InvokeVirtualRange
                | Self::InvokeSuperRange
                | Self::InvokeDirectRange
                | Self::InvokeStaticRange
                | Self::InvokeInterfaceRange
                | Self::InvokePolymorphic
                | Self::InvokePolymorphicRange
                | Self::InvokeCustom
                | Self::InvokeCustomRange
        )
    }

    /// Returns `true` if the instruction may raise an exception.
    ///
    /// `monitor-exit` is excluded: within a structured synchronized region it
    /// cannot throw, so it never needs an exceptional edge.
    #[must_use]
    pub const fn can_throw(self) -> bool {
        if self.is_invoke() {
            return true;
        }
        matches!(
            self,
            Self::ConstString
                | Self::ConstClass
                | Self::ConstMethodHandle
                | Self::ConstMethodType
                | Self::MonitorEnter
                | Self::CheckCast
                | Self::InstanceOf
                | Self::ArrayLength
                | Self::NewInstance
                | Self::NewArray
                | Self::FilledNewArray
                | Self::FilledNewArrayRange
                | Self::FillArrayData
                | Self::Throw
                | Self::Aget
                | Self::AgetWide
                | Self::AgetObject
                | Self::AgetBoolean
                | Self::AgetByte
                | Self::AgetChar
                | Self::AgetShort
                | Self::Aput
                | Self::AputWide
                | Self::AputObject
                | Self::AputBoolean
                | Self::AputByte
                | Self::AputChar
                | Self::AputShort
                | Self::Iget
                | Self::IgetWide
                | Self::IgetObject
                | Self::IgetBoolean
                | Self::IgetByte
                | Self::IgetChar
                | Self::IgetShort
                | Self::Iput
                | Self::IputWide
                | Self::IputObject
                | Self::IputBoolean
                | Self::IputByte
                | Self::IputChar
                | Self::IputShort
                | Self::Sget
                | Self::SgetWide
                | Self::SgetObject
                | Self::SgetBoolean
                | Self::SgetByte
                | Self::SgetChar
                | Self::SgetShort
                | Self::Sput
                | Self::SputWide
                | Self::SputObject
                | Self::SputBoolean
                | Self::SputByte
                | Self::SputChar
                | Self::SputShort
                | Self::DivInt
                | Self::RemInt
                | Self::DivLong
                | Self::RemLong
                | Self::DivIntLit
                | Self::RemIntLit
        )
    }

    /// Element or field type accessed by the array and field access opcodes.
    ///
    /// The plain and wide forms report `Int32` and `Int64`; whether they really
    /// access a float is only known once the accessed array or field is typed.
    #[must_use]
    pub const fn access_type(self) -> Option<DataType> {
        Some(match self {
            Self::Aget | Self::Aput | Self::Iget | Self::Iput | Self::Sget | Self::Sput => {
                DataType::Int32
            }
            Self::AgetWide
            | Self::AputWide
            | Self::IgetWide
            | Self::IputWide
            | Self::SgetWide
            | Self::SputWide => DataType::Int64,
            Self::AgetObject
            | Self::AputObject
            | Self::IgetObject
            | Self::IputObject
            | Self::SgetObject
            | Self::SputObject => DataType::Reference,
            Self::AgetBoolean
            | Self::AputBoolean
            | Self::IgetBoolean
            | Self::IputBoolean
            | Self::SgetBoolean
            | Self::SputBoolean => DataType::Bool,
            Self::AgetByte
            | Self::AputByte
            | Self::IgetByte
            | Self::IputByte
            | Self::SgetByte
            | Self::SputByte => DataType::Int8,
            Self::AgetChar
            | Self::AputChar
            | Self::IgetChar
            | Self::IputChar
            | Self::SgetChar
            | Self::SputChar => DataType::Uint16,
            Self::AgetShort
            | Self::AputShort
            | Self::IgetShort
            | Self::IputShort
            | Self::SgetShort
            | Self::SputShort => DataType::Int16,
            _ => return None,
        })
    }

    /// Canonical encoded width in 16-bit code units.
    ///
    /// Normalized opcodes use the widest encoding of their family, so offsets
    /// produced from these widths are always valid.
    #[must_use]
    pub const fn width(self) -> u32 {
        match self {
            Self::Nop
            | Self::Move
            | Self::MoveWide
            | Self::MoveObject
            | Self::MoveResult
            | Self::MoveResultWide
            | Self::MoveResultObject
            | Self::MoveException
            | Self::ReturnVoid
            | Self::Return
            | Self::ReturnWide
            | Self::ReturnObject
            | Self::MonitorEnter
            | Self::MonitorExit
            | Self::ArrayLength
            | Self::Throw
            | Self::NegInt
            | Self::NotInt
            | Self::NegLong
            | Self::NotLong
            | Self::NegFloat
            | Self::NegDouble
            | Self::IntToLong
            | Self::IntToFloat
            | Self::IntToDouble
            | Self::LongToInt
            | Self::LongToFloat
            | Self::LongToDouble
            | Self::FloatToInt
            | Self::FloatToLong
            | Self::FloatToDouble
            | Self::DoubleToInt
            | Self::DoubleToLong
            | Self::DoubleToFloat
            | Self::IntToByte
            | Self::IntToChar
            | Self::IntToShort => 1,
            Self::Const
            | Self::Goto
            | Self::FilledNewArray
            | Self::FilledNewArrayRange
            | Self::FillArrayData
            | Self::PackedSwitch
            | Self::SparseSwitch
            | Self::InvokeVirtual
            | Self::InvokeSuper
            | Self::InvokeDirect
            | Self::InvokeStatic
            | Self::InvokeInterface
            | Self::InvokeVirtualRange
            | Self::InvokeSuperRange
            | Self::InvokeDirectRange
            | Self::InvokeStaticRange
            | Self::InvokeInterfaceRange
            | Self::InvokeCustom
            | Self::InvokeCustomRange => 3,
            Self::InvokePolymorphic | Self::InvokePolymorphicRange => 4,
            Self::ConstWide => 5,
            _ => 2,
        }
    }
}
