//! Per-opcode translation of the instruction builder.

use crate::{
    builder::{instructions::InstructionBuilder, BlockMap},
    bytecode::{Instruction, Opcode, Operands, Register, Signature},
    ir::{
        BinaryOp, ClinitCheckRequirement, ComparisonBias, Condition, Constant, Dispatch, Invoke,
        MonitorKind, Op, TypeCheckKind, UnaryOp, ValueId,
    },
    resolver::{FieldFlags, InvokeKind, ResolvedField, ResolvedType},
    types::DataType,
    Error, Result,
};

/// A class reference built by a `LoadClass`.
struct LoadedClass {
    value: ValueId,
    resolved: Option<ResolvedType>,
    needs_access_check: bool,
}

/// How the receiver of a call is read.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Receiver {
    /// Static call
    None,
    /// Resolved instance call
    NullChecked,
    /// Unresolved instance call; the runtime checks it
    Unchecked,
    /// String constructor turned factory: the receiver is not an argument
    Skipped,
}

impl InstructionBuilder<'_, '_> {
    /// Translates one instruction into the current block.
    pub(super) fn translate(&mut self, insn: &Instruction, map: &BlockMap) -> Result<()> {
        let result = self.latest_result.take();
        match insn.opcode {
            Opcode::Nop => {}

            Opcode::Move => self.build_move(insn, DataType::Int32)?,
            Opcode::MoveWide => self.build_move(insn, DataType::Int64)?,
            Opcode::MoveObject => self.build_move_object(insn)?,
            Opcode::MoveResult | Opcode::MoveResultWide | Opcode::MoveResultObject => {
                let value = result.ok_or_else(|| {
                    invalid_bytecode!("'{}' at {:#x} follows no call", insn.opcode, insn.offset)
                })?;
                self.update_local(insn.a()?, value)?;
            }
            Opcode::MoveException => {
                let exception = self.append(Op::LoadException, DataType::Reference, &[]);
                self.update_local(insn.a()?, exception)?;
                self.append(Op::ClearException, DataType::Void, &[]);
            }

            Opcode::ReturnVoid => {
                if self.unit.requires_constructor_barrier {
                    if let Some(this) = self.this_parameter {
                        self.append(Op::ConstructorFence, DataType::Void, &[this]);
                    }
                }
                self.append(Op::ReturnVoid, DataType::Void, &[]);
                self.current_block = None;
            }
            Opcode::Return | Opcode::ReturnWide | Opcode::ReturnObject => {
                let ty = self.unit.method()?.signature.return_type();
                let value = self.load_local(insn.a()?, ty)?;
                self.append(Op::Return, DataType::Void, &[value]);
                self.current_block = None;
            }

            Opcode::Const => {
                let literal = insn.literal()?;
                let value = i32::try_from(literal)
                    .map_err(|_| invalid_bytecode!("literal {} at {:#x} exceeds 32 bits", literal, insn.offset))?;
                let constant = self.graph.int_constant(value);
                self.update_local(insn.a()?, constant)?;
            }
            Opcode::ConstWide => {
                let constant = self.graph.long_constant(insn.literal()?);
                self.update_local(insn.a()?, constant)?;
            }
            Opcode::ConstString => {
                let string = self.append(
                    Op::LoadString {
                        string_index: insn.index()?,
                    },
                    DataType::Reference,
                    &[],
                );
                self.update_local(insn.a()?, string)?;
            }
            Opcode::ConstClass => {
                let class = self.build_load_class(insn.index()?)?;
                self.update_local(insn.a()?, class.value)?;
            }

            Opcode::MonitorEnter | Opcode::MonitorExit => {
                let kind = if insn.opcode == Opcode::MonitorEnter {
                    MonitorKind::Enter
                } else {
                    MonitorKind::Exit
                };
                let object = self.load_local(insn.a()?, DataType::Reference)?;
                self.append(Op::Monitor(kind), DataType::Void, &[object]);
            }

            Opcode::CheckCast => {
                let (register, type_index) = (insn.a()?, insn.index()?);
                let object = self.load_local(register, DataType::Reference)?;
                let class = self.build_load_class(type_index)?;
                let kind = type_check_kind(class.resolved.as_ref());
                self.append(Op::CheckCast { kind }, DataType::Void, &[object, class.value]);
                let bound = self.append(Op::BoundType { type_index }, DataType::Reference, &[object]);
                self.update_local(register, bound)?;
            }
            Opcode::InstanceOf => {
                let object = self.load_local(insn.b()?, DataType::Reference)?;
                let class = self.build_load_class(insn.index()?)?;
                let kind = type_check_kind(class.resolved.as_ref());
                let test = self.append(Op::InstanceOf { kind }, DataType::Bool, &[object, class.value]);
                self.update_local(insn.a()?, test)?;
            }

            Opcode::ArrayLength => {
                let array = self.load_null_checked_local(insn.b()?)?;
                let length = self.append(Op::ArrayLength, DataType::Int32, &[array]);
                self.update_local(insn.a()?, length)?;
            }
            Opcode::NewInstance => self.build_new_instance(insn)?,
            Opcode::NewArray => {
                let type_index = insn.index()?;
                let length = self.load_local(insn.b()?, DataType::Int32)?;
                let class = self.build_load_class(type_index)?;
                let array = self.append(Op::NewArray { type_index }, DataType::Reference, &[class.value, length]);
                self.append(Op::ConstructorFence, DataType::Void, &[array]);
                self.update_local(insn.a()?, array)?;
            }
            Opcode::FilledNewArray | Opcode::FilledNewArrayRange => self.build_filled_new_array(insn)?,
            Opcode::FillArrayData => self.build_fill_array_data(insn)?,

            Opcode::Throw => {
                let exception = self.load_local(insn.a()?, DataType::Reference)?;
                self.append(Op::Throw, DataType::Void, &[exception]);
                self.current_block = None;
            }
            Opcode::Goto => {
                self.append(Op::Goto, DataType::Void, &[]);
                self.current_block = None;
            }
            Opcode::PackedSwitch | Opcode::SparseSwitch => self.build_switch(insn, map)?,

            Opcode::CmplFloat => self.build_compare(insn, ComparisonBias::LtBias, DataType::Float32)?,
            Opcode::CmpgFloat => self.build_compare(insn, ComparisonBias::GtBias, DataType::Float32)?,
            Opcode::CmplDouble => self.build_compare(insn, ComparisonBias::LtBias, DataType::Float64)?,
            Opcode::CmpgDouble => self.build_compare(insn, ComparisonBias::GtBias, DataType::Float64)?,
            Opcode::CmpLong => self.build_compare(insn, ComparisonBias::NoBias, DataType::Int64)?,

            Opcode::IfEq | Opcode::IfEqz => self.build_if(insn, Condition::Equal)?,
            Opcode::IfNe | Opcode::IfNez => self.build_if(insn, Condition::NotEqual)?,
            Opcode::IfLt | Opcode::IfLtz => self.build_if(insn, Condition::LessThan)?,
            Opcode::IfGe | Opcode::IfGez => self.build_if(insn, Condition::GreaterThanOrEqual)?,
            Opcode::IfGt | Opcode::IfGtz => self.build_if(insn, Condition::GreaterThan)?,
            Opcode::IfLe | Opcode::IfLez => self.build_if(insn, Condition::LessThanOrEqual)?,

            Opcode::Aget
            | Opcode::AgetWide
            | Opcode::AgetObject
            | Opcode::AgetBoolean
            | Opcode::AgetByte
            | Opcode::AgetChar
            | Opcode::AgetShort => self.build_array_access(insn, false)?,
            Opcode::Aput
            | Opcode::AputWide
            | Opcode::AputObject
            | Opcode::AputBoolean
            | Opcode::AputByte
            | Opcode::AputChar
            | Opcode::AputShort => self.build_array_access(insn, true)?,

            Opcode::Iget
            | Opcode::IgetWide
            | Opcode::IgetObject
            | Opcode::IgetBoolean
            | Opcode::IgetByte
            | Opcode::IgetChar
            | Opcode::IgetShort => self.build_instance_field_access(insn, false)?,
            Opcode::Iput
            | Opcode::IputWide
            | Opcode::IputObject
            | Opcode::IputBoolean
            | Opcode::IputByte
            | Opcode::IputChar
            | Opcode::IputShort => self.build_instance_field_access(insn, true)?,
            Opcode::Sget
            | Opcode::SgetWide
            | Opcode::SgetObject
            | Opcode::SgetBoolean
            | Opcode::SgetByte
            | Opcode::SgetChar
            | Opcode::SgetShort => self.build_static_field_access(insn, false)?,
            Opcode::Sput
            | Opcode::SputWide
            | Opcode::SputObject
            | Opcode::SputBoolean
            | Opcode::SputByte
            | Opcode::SputChar
            | Opcode::SputShort => self.build_static_field_access(insn, true)?,

            Opcode::InvokeVirtual | Opcode::InvokeVirtualRange => self.build_invoke(insn, InvokeKind::Virtual)?,
            Opcode::InvokeSuper | Opcode::InvokeSuperRange => self.build_invoke(insn, InvokeKind::Super)?,
            Opcode::InvokeDirect | Opcode::InvokeDirectRange => self.build_invoke(insn, InvokeKind::Direct)?,
            Opcode::InvokeStatic | Opcode::InvokeStaticRange => self.build_invoke(insn, InvokeKind::Static)?,
            Opcode::InvokeInterface | Opcode::InvokeInterfaceRange => {
                self.build_invoke(insn, InvokeKind::Interface)?;
            }
            Opcode::InvokePolymorphic | Opcode::InvokePolymorphicRange => self.build_invoke_polymorphic(insn)?,

            Opcode::NegInt => self.build_unary(insn, UnaryOp::Neg, DataType::Int32)?,
            Opcode::NotInt => self.build_unary(insn, UnaryOp::Not, DataType::Int32)?,
            Opcode::NegLong => self.build_unary(insn, UnaryOp::Neg, DataType::Int64)?,
            Opcode::NotLong => self.build_unary(insn, UnaryOp::Not, DataType::Int64)?,
            Opcode::NegFloat => self.build_unary(insn, UnaryOp::Neg, DataType::Float32)?,
            Opcode::NegDouble => self.build_unary(insn, UnaryOp::Neg, DataType::Float64)?,

            Opcode::IntToLong => self.build_conversion(insn, DataType::Int32, DataType::Int64)?,
            Opcode::IntToFloat => self.build_conversion(insn, DataType::Int32, DataType::Float32)?,
            Opcode::IntToDouble => self.build_conversion(insn, DataType::Int32, DataType::Float64)?,
            Opcode::LongToInt => self.build_conversion(insn, DataType::Int64, DataType::Int32)?,
            Opcode::LongToFloat => self.build_conversion(insn, DataType::Int64, DataType::Float32)?,
            Opcode::LongToDouble => self.build_conversion(insn, DataType::Int64, DataType::Float64)?,
            Opcode::FloatToInt => self.build_conversion(insn, DataType::Float32, DataType::Int32)?,
            Opcode::FloatToLong => self.build_conversion(insn, DataType::Float32, DataType::Int64)?,
            Opcode::FloatToDouble => self.build_conversion(insn, DataType::Float32, DataType::Float64)?,
            Opcode::DoubleToInt => self.build_conversion(insn, DataType::Float64, DataType::Int32)?,
            Opcode::DoubleToLong => self.build_conversion(insn, DataType::Float64, DataType::Int64)?,
            Opcode::DoubleToFloat => self.build_conversion(insn, DataType::Float64, DataType::Float32)?,
            Opcode::IntToByte => self.build_conversion(insn, DataType::Int32, DataType::Int8)?,
            Opcode::IntToChar => self.build_conversion(insn, DataType::Int32, DataType::Uint16)?,
            Opcode::IntToShort => self.build_conversion(insn, DataType::Int32, DataType::Int16)?,

            opcode => match binary_operation(opcode) {
                Some((op, ty)) => self.build_binary(insn, op, ty)?,
                None => {
                    return Err(Error::UnsupportedInstruction {
                        opcode,
                        offset: insn.offset,
                    })
                }
            },
        }
        Ok(())
    }

    // ---- moves ------------------------------------------------------------

    fn build_move(&mut self, insn: &Instruction, ty: DataType) -> Result<()> {
        let value = self.load_local(insn.b()?, ty)?;
        self.update_local(insn.a()?, value)
    }

    /// `move-object` of an integer zero or a phi keeps the value as is; type
    /// propagation settles it later.
    fn build_move_object(&mut self, insn: &Instruction) -> Result<()> {
        let source = insn.b()?;
        let value = self.load_local(source, DataType::Void)?;
        let node = self.graph.value(value);
        let (constant, is_phi) = (node.constant(), node.is_phi());
        let value = match constant {
            Some(Constant::Int(0)) => value,
            Some(Constant::Int(other)) => {
                return Err(invalid_bytecode!(
                    "'move-object' of integer {} at {:#x}",
                    other,
                    insn.offset
                ))
            }
            _ if is_phi => value,
            _ => self.load_local(source, DataType::Reference)?,
        };
        self.update_local(insn.a()?, value)
    }

    // ---- classes and allocation -------------------------------------------

    fn referrer_class(&self) -> Result<u32> {
        Ok(self.unit.method()?.class)
    }

    fn build_load_class(&mut self, type_index: u32) -> Result<LoadedClass> {
        let referrer = self.referrer_class()?;
        let resolved = self.resolver.resolve_type(type_index).into_option();
        let is_referrers_class = resolved.as_ref().is_some_and(|ty| ty.index == referrer);
        let needs_access_check = resolved
            .as_ref()
            .map_or(true, |ty| !ty.is_public() && !is_referrers_class);
        let value = self.append(
            Op::LoadClass {
                type_index,
                needs_access_check,
                is_referrers_class,
            },
            DataType::Reference,
            &[],
        );
        Ok(LoadedClass {
            value,
            resolved,
            needs_access_check,
        })
    }

    /// The class of the method being built counts as initialized.
    fn is_initialized(&self, class: Option<&ResolvedType>) -> Result<bool> {
        let referrer = self.referrer_class()?;
        Ok(class.is_some_and(|ty| ty.index == referrer || self.resolver.is_initialized(ty)))
    }

    /// Loads the declaring class of a resolved member, behind an
    /// initialization check unless it is known to be initialized.
    fn build_declaring_class(&mut self, class: &ResolvedType) -> Result<ValueId> {
        let referrer = self.referrer_class()?;
        let load = self.append(
            Op::LoadClass {
                type_index: class.index,
                needs_access_check: false,
                is_referrers_class: class.index == referrer,
            },
            DataType::Reference,
            &[],
        );
        if self.is_initialized(Some(class))? {
            return Ok(load);
        }
        Ok(self.append(Op::ClinitCheck, DataType::Reference, &[load]))
    }

    fn build_new_instance(&mut self, insn: &Instruction) -> Result<()> {
        let type_index = insn.index()?;
        let class = self.build_load_class(type_index)?;
        let resolved = class.resolved.as_ref();
        let input = if self.is_initialized(resolved)? {
            class.value
        } else {
            self.append(Op::ClinitCheck, DataType::Reference, &[class.value])
        };
        let is_string = resolved.is_some_and(ResolvedType::is_string_class);
        let finalizable = resolved.map_or(true, ResolvedType::is_finalizable);
        let needs_checks = class.needs_access_check || finalizable || resolved.is_some_and(ResolvedType::is_abstract);
        let instance = self.append(
            Op::NewInstance {
                type_index,
                finalizable,
                needs_checks,
                is_string,
            },
            DataType::Reference,
            &[input],
        );
        if !is_string {
            self.append(Op::ConstructorFence, DataType::Void, &[instance]);
        }
        self.update_local(insn.a()?, instance)
    }

    fn build_filled_new_array(&mut self, insn: &Instruction) -> Result<()> {
        let type_index = insn.index()?;
        let args = insn.args()?;
        let symbols = self.unit.symbols;
        let descriptor = symbols.type_descriptor(type_index)?;
        let component = match descriptor.as_bytes().get(1) {
            Some(b'I') => DataType::Int32,
            Some(b'L' | b'[') => DataType::Reference,
            _ => {
                return Err(invalid_bytecode!(
                    "'{}' of '{}' at {:#x}",
                    insn.opcode,
                    descriptor,
                    insn.offset
                ))
            }
        };

        let length = self.graph.int_constant(args.len() as i32);
        let class = self.build_load_class(type_index)?;
        let array = self.append(Op::NewArray { type_index }, DataType::Reference, &[class.value, length]);
        for (position, register) in args.iter().enumerate() {
            let value = self.load_local(*register, component)?;
            let index = self.graph.int_constant(position as i32);
            let store = self.append(Op::ArraySet { expected: component }, DataType::Void, &[array, index, value]);
            self.ssa.record_array_set(self.graph, store);
        }
        self.append(Op::ConstructorFence, DataType::Void, &[array]);
        self.latest_result = Some(array);
        Ok(())
    }

    fn build_fill_array_data(&mut self, insn: &Instruction) -> Result<()> {
        let data = insn.array_data()?;
        let array = self.load_null_checked_local(insn.a()?)?;
        let Some(last) = data.elements.len().checked_sub(1) else {
            return Ok(());
        };
        let last = i32::try_from(last)
            .map_err(|_| invalid_bytecode!("array payload at {:#x} is too large", insn.offset))?;
        let ty = match data.element_width {
            1 => DataType::Int8,
            2 => DataType::Int16,
            4 => DataType::Int32,
            8 => DataType::Int64,
            width => {
                return Err(invalid_bytecode!(
                    "array payload element width {} at {:#x}",
                    width,
                    insn.offset
                ))
            }
        };

        let length = self.append(Op::ArrayLength, DataType::Int32, &[array]);
        let last = self.graph.int_constant(last);
        self.append(Op::BoundsCheck, DataType::Int32, &[last, length]);
        for (position, element) in data.elements.iter().enumerate() {
            let value = if ty == DataType::Int64 {
                self.graph.long_constant(*element)
            } else {
                self.graph.int_constant(*element as i32)
            };
            let index = self.graph.int_constant(position as i32);
            let store = self.append(Op::ArraySet { expected: ty }, DataType::Void, &[array, index, value]);
            self.ssa.record_array_set(self.graph, store);
        }
        Ok(())
    }

    // ---- arrays and fields ------------------------------------------------

    fn build_array_access(&mut self, insn: &Instruction, is_put: bool) -> Result<()> {
        let ty = insn
            .opcode
            .access_type()
            .ok_or_else(|| invalid_bytecode!("'{}' is not an array access", insn.opcode))?;
        let array = self.load_null_checked_local(insn.b()?)?;
        let length = self.append(Op::ArrayLength, DataType::Int32, &[array]);
        let index = self.load_local(insn.c()?, DataType::Int32)?;
        let index = self.append(Op::BoundsCheck, DataType::Int32, &[index, length]);
        if is_put {
            let value = self.load_local(insn.a()?, ty)?;
            let store = self.append(Op::ArraySet { expected: ty }, DataType::Void, &[array, index, value]);
            self.ssa.record_array_set(self.graph, store);
        } else {
            let load = self.append(Op::ArrayGet, ty, &[array, index]);
            self.ssa.record_array_get(self.graph, load);
            self.update_local(insn.a()?, load)?;
        }
        Ok(())
    }

    /// Declared type of the accessed field, checked against the opcode.
    fn field_type(&self, insn: &Instruction, field: u32) -> Result<DataType> {
        let declared = self.unit.symbols.field_type(field)?;
        let expected = insn
            .opcode
            .access_type()
            .ok_or_else(|| invalid_bytecode!("'{}' is not a field access", insn.opcode))?;
        let fits = match expected {
            DataType::Int32 => matches!(declared, DataType::Int32 | DataType::Float32),
            DataType::Int64 => matches!(declared, DataType::Int64 | DataType::Float64),
            other => declared == other,
        };
        if !fits {
            return Err(invalid_bytecode!(
                "'{}' at {:#x} accesses a field of type {}",
                insn.opcode,
                insn.offset,
                declared
            ));
        }
        Ok(declared)
    }

    /// Resolves a field, treating a kind mismatch and a store into a final
    /// field of another class as unresolved.
    fn resolve_field(&self, field: u32, is_static: bool, is_put: bool) -> Result<Option<ResolvedField>> {
        let Some(resolved) = self.resolver.resolve_field(field, is_static).into_option() else {
            return Ok(None);
        };
        if resolved.flags.contains(FieldFlags::STATIC) != is_static {
            log::trace!("field {field} resolved with the wrong static-ness");
            return Ok(None);
        }
        if is_put && resolved.is_final() && resolved.declaring_class.index != self.referrer_class()? {
            return Ok(None);
        }
        Ok(Some(resolved))
    }

    fn build_instance_field_access(&mut self, insn: &Instruction, is_put: bool) -> Result<()> {
        let field = insn.index()?;
        let resolved = self.resolve_field(field, false, is_put)?;
        let object = match resolved {
            Some(_) => self.load_null_checked_local(insn.b()?)?,
            None => self.load_local(insn.b()?, DataType::Reference)?,
        };
        let field_type = self.field_type(insn, field)?;
        let volatile = resolved.as_ref().is_some_and(ResolvedField::is_volatile);

        if is_put {
            let value = self.load_local(insn.a()?, field_type)?;
            let op = match resolved {
                Some(_) => Op::InstanceFieldSet {
                    field,
                    volatile,
                    field_type,
                },
                None => Op::UnresolvedInstanceFieldSet { field, field_type },
            };
            self.append(op, DataType::Void, &[object, value]);
        } else {
            let op = match resolved {
                Some(_) => Op::InstanceFieldGet { field, volatile },
                None => Op::UnresolvedInstanceFieldGet { field },
            };
            let load = self.append(op, field_type, &[object]);
            self.update_local(insn.a()?, load)?;
        }
        Ok(())
    }

    fn build_static_field_access(&mut self, insn: &Instruction, is_put: bool) -> Result<()> {
        let field = insn.index()?;
        let field_type = self.field_type(insn, field)?;
        let Some(resolved) = self.resolve_field(field, true, is_put)? else {
            if is_put {
                let value = self.load_local(insn.a()?, field_type)?;
                self.append(Op::UnresolvedStaticFieldSet { field, field_type }, DataType::Void, &[value]);
            } else {
                let load = self.append(Op::UnresolvedStaticFieldGet { field }, field_type, &[]);
                self.update_local(insn.a()?, load)?;
            }
            return Ok(());
        };

        let class = self.build_declaring_class(&resolved.declaring_class)?;
        let volatile = resolved.is_volatile();
        if is_put {
            let value = self.load_local(insn.a()?, field_type)?;
            self.append(
                Op::StaticFieldSet {
                    field,
                    volatile,
                    field_type,
                },
                DataType::Void,
                &[class, value],
            );
        } else {
            let load = self.append(Op::StaticFieldGet { field, volatile }, field_type, &[class]);
            self.update_local(insn.a()?, load)?;
        }
        Ok(())
    }

    // ---- calls ------------------------------------------------------------

    fn build_invoke(&mut self, insn: &Instruction, kind: InvokeKind) -> Result<()> {
        let method_index = insn.index()?;
        let args = insn.args()?;
        let symbols = self.unit.symbols;
        let signature = &symbols.method(method_index)?.signature;
        let is_static = kind == InvokeKind::Static;
        let mut arguments = signature.parameters.len() as u32 + u32::from(!is_static);

        let Some(resolved) = self.resolver.resolve_method(method_index, kind).into_option() else {
            let invoke = Invoke {
                kind,
                method: method_index,
                dispatch: Dispatch::Unresolved,
                arguments,
            };
            let receiver = if is_static { Receiver::None } else { Receiver::Unchecked };
            return self.append_invoke(invoke, signature, args, receiver, None, insn);
        };

        if resolved.is_string_init() {
            arguments -= 1;
            let invoke = Invoke {
                kind,
                method: method_index,
                dispatch: Dispatch::StaticOrDirect {
                    clinit: ClinitCheckRequirement::Implicit,
                    string_init: true,
                },
                arguments,
            };
            return self.build_string_init(invoke, signature, args, insn);
        }

        let mut method = method_index;
        let mut clinit_check = None;
        let dispatch = match kind {
            InvokeKind::Static => {
                let clinit = if self.is_initialized(Some(&resolved.declaring_class))? {
                    ClinitCheckRequirement::None
                } else {
                    clinit_check = Some(self.build_declaring_class(&resolved.declaring_class)?);
                    ClinitCheckRequirement::Explicit
                };
                Dispatch::StaticOrDirect {
                    clinit,
                    string_init: false,
                }
            }
            InvokeKind::Direct | InvokeKind::Super => {
                if kind == InvokeKind::Super {
                    method = resolved.index;
                }
                Dispatch::StaticOrDirect {
                    clinit: ClinitCheckRequirement::Implicit,
                    string_init: false,
                }
            }
            InvokeKind::Virtual => Dispatch::Virtual {
                vtable_index: resolved.dispatch_index,
            },
            InvokeKind::Interface => Dispatch::Interface {
                imt_index: resolved.dispatch_index,
            },
            InvokeKind::Polymorphic => {
                return Err(invalid_bytecode!("'{}' is not a polymorphic call", insn.opcode));
            }
        };
        let invoke = Invoke {
            kind,
            method,
            dispatch,
            arguments,
        };
        let receiver = if is_static { Receiver::None } else { Receiver::NullChecked };
        self.append_invoke(invoke, signature, args, receiver, clinit_check, insn)
    }

    fn build_invoke_polymorphic(&mut self, insn: &Instruction) -> Result<()> {
        let proto = insn.proto()?;
        let args = insn.args()?;
        let symbols = self.unit.symbols;
        let signature = symbols.proto(proto)?;
        let invoke = Invoke {
            kind: InvokeKind::Polymorphic,
            method: insn.index()?,
            dispatch: Dispatch::Polymorphic { proto },
            arguments: signature.parameters.len() as u32 + 1,
        };
        self.append_invoke(invoke, signature, args, Receiver::NullChecked, None, insn)
    }

    fn build_string_init(&mut self, invoke: Invoke, signature: &Signature, args: &[Register], insn: &Instruction) -> Result<()> {
        let inputs = self.invoke_arguments(signature, args, Receiver::Skipped, insn)?;
        let call = self.append(Op::Invoke(invoke), DataType::Reference, &inputs);
        self.latest_result = Some(call);

        let receiver = *args
            .first()
            .ok_or_else(|| invalid_bytecode!("string constructor call at {:#x} has no receiver", insn.offset))?;
        let allocation = self.load_local(receiver, DataType::Reference)?;
        if matches!(self.graph.value(allocation).op(), Some(Op::NewInstance { .. })) {
            self.ssa.record_uninitialized_string(allocation);
        }
        for slot in self.locals_mut().iter_mut() {
            if *slot == Some(allocation) {
                *slot = Some(call);
            }
        }
        Ok(())
    }

    fn append_invoke(
        &mut self,
        invoke: Invoke,
        signature: &Signature,
        args: &[Register],
        receiver: Receiver,
        clinit_check: Option<ValueId>,
        insn: &Instruction,
    ) -> Result<()> {
        let mut inputs = self.invoke_arguments(signature, args, receiver, insn)?;
        if inputs.len() != invoke.arguments as usize {
            return Err(invalid_bytecode!(
                "call at {:#x} passes {} arguments, {} expected",
                insn.offset,
                inputs.len(),
                invoke.arguments
            ));
        }
        inputs.extend(clinit_check);
        let call = self.append(Op::Invoke(invoke), signature.return_type(), &inputs);
        self.latest_result = Some(call);
        Ok(())
    }

    /// Reads the argument registers of a call. Wide arguments must occupy
    /// consecutive registers.
    fn invoke_arguments(&mut self, signature: &Signature, args: &[Register], receiver: Receiver, insn: &Instruction) -> Result<Vec<ValueId>> {
        let mut inputs = Vec::with_capacity(args.len());
        let mut position = 0;
        if receiver != Receiver::None {
            let register = *args
                .first()
                .ok_or_else(|| invalid_bytecode!("instance call at {:#x} has no receiver", insn.offset))?;
            match receiver {
                Receiver::NullChecked => inputs.push(self.load_null_checked_local(register)?),
                Receiver::Unchecked => inputs.push(self.load_local(register, DataType::Reference)?),
                Receiver::Skipped | Receiver::None => {}
            }
            position = 1;
        }
        for ty in signature.parameter_types() {
            let register = *args.get(position).ok_or_else(|| {
                invalid_bytecode!("call at {:#x} passes too few argument registers", insn.offset)
            })?;
            if ty.is_64bit() {
                let pair = register.checked_add(1).filter(|next| args.get(position + 1) == Some(next));
                if pair.is_none() {
                    return Err(invalid_bytecode!(
                        "wide argument v{} at {:#x} is not a register pair",
                        register,
                        insn.offset
                    ));
                }
                position += 2;
            } else {
                position += 1;
            }
            inputs.push(self.load_local(register, ty)?);
        }
        if position != args.len() {
            return Err(invalid_bytecode!(
                "call at {:#x} passes {} argument registers, {} expected",
                insn.offset,
                args.len(),
                position
            ));
        }
        Ok(inputs)
    }

    // ---- arithmetic -------------------------------------------------------

    fn build_unary(&mut self, insn: &Instruction, op: UnaryOp, ty: DataType) -> Result<()> {
        let operand = self.load_local(insn.b()?, ty)?;
        let value = self.append(Op::Unary(op), ty, &[operand]);
        self.update_local(insn.a()?, value)
    }

    fn build_conversion(&mut self, insn: &Instruction, from: DataType, to: DataType) -> Result<()> {
        let operand = self.load_local(insn.b()?, from)?;
        let value = self.append(Op::TypeConversion, to, &[operand]);
        self.update_local(insn.a()?, value)
    }

    fn build_compare(&mut self, insn: &Instruction, bias: ComparisonBias, ty: DataType) -> Result<()> {
        let lhs = self.load_local(insn.b()?, ty)?;
        let rhs = self.load_local(insn.c()?, ty)?;
        let value = self.append(Op::Compare { bias }, DataType::Int32, &[lhs, rhs]);
        self.update_local(insn.a()?, value)
    }

    fn build_binary(&mut self, insn: &Instruction, op: BinaryOp, ty: DataType) -> Result<()> {
        let rhs_type = if op.is_shift() { DataType::Int32 } else { ty };
        let (lhs, rhs) = match insn.operands {
            Operands::ThreeReg { b, c, .. } => (self.load_local(b, ty)?, self.load_local(c, rhs_type)?),
            Operands::TwoReg { a, b } => (self.load_local(a, ty)?, self.load_local(b, rhs_type)?),
            Operands::BinaryLiteral { b, literal, .. } => {
                let register = self.load_local(b, ty)?;
                let constant = self.graph.int_constant(literal);
                if insn.opcode == Opcode::RsubInt {
                    (constant, register)
                } else {
                    (register, constant)
                }
            }
            _ => {
                return Err(invalid_bytecode!(
                    "'{}' at {:#x} has malformed operands",
                    insn.opcode,
                    insn.offset
                ))
            }
        };

        let rhs = if matches!(op, BinaryOp::Div | BinaryOp::Rem) && ty.is_int_or_long() && !self.is_non_zero_constant(rhs) {
            self.append(Op::DivZeroCheck, ty, &[rhs])
        } else {
            rhs
        };
        let value = self.append(Op::Binary(op), ty, &[lhs, rhs]);
        self.update_local(insn.a()?, value)
    }

    fn is_non_zero_constant(&self, value: ValueId) -> bool {
        match self.graph.value(value).constant() {
            Some(Constant::Int(v)) => v != 0,
            Some(Constant::Long(v)) => v != 0,
            _ => false,
        }
    }

    // ---- control flow -----------------------------------------------------

    fn build_if(&mut self, insn: &Instruction, condition: Condition) -> Result<()> {
        let lhs = self.load_local(insn.a()?, DataType::Int32)?;
        let rhs = match insn.operands {
            Operands::Compare { b, .. } => self.load_local(b, DataType::Int32)?,
            _ => self.graph.int_constant(0),
        };
        let test = self.append(Op::Condition(condition), DataType::Bool, &[lhs, rhs]);
        self.append(Op::If, DataType::Void, &[test]);
        self.current_block = None;
        Ok(())
    }

    /// Small and sparse switches become a chain of compare-and-branch blocks,
    /// the first in the switch block itself.
    fn build_switch(&mut self, insn: &Instruction, map: &BlockMap) -> Result<()> {
        let table = insn.switch_table()?;
        let value = self.load_local(insn.a()?, DataType::Int32)?;

        if table.is_empty() {
            self.append(Op::Goto, DataType::Void, &[]);
        } else if table.builds_decision_tree() {
            let cases = map.case_blocks(insn.offset);
            for (position, key) in table.keys.iter().enumerate() {
                if position > 0 {
                    let block = *cases.get(position - 1).ok_or_else(|| {
                        Error::GraphError(format!("switch at {:#x} lacks case block {}", insn.offset, position))
                    })?;
                    self.current_block = Some(block);
                }
                let key = self.graph.int_constant(*key);
                let test = self.append(Op::Condition(Condition::Equal), DataType::Bool, &[value, key]);
                self.append(Op::If, DataType::Void, &[test]);
            }
        } else {
            let start = table
                .first_key()
                .ok_or_else(|| invalid_bytecode!("switch at {:#x} has no keys", insn.offset))?;
            self.append(
                Op::PackedSwitch {
                    start,
                    entries: table.len() as u32,
                },
                DataType::Void,
                &[value],
            );
        }
        self.current_block = None;
        Ok(())
    }
}

/// Check strategy for a type test against `class`.
fn type_check_kind(class: Option<&ResolvedType>) -> TypeCheckKind {
    let Some(class) = class else {
        return TypeCheckKind::Unresolved;
    };
    if class.is_interface() {
        TypeCheckKind::Interface
    } else if class.is_array() {
        match &class.descriptor[1..] {
            "Ljava/lang/Object;" => TypeCheckKind::ArrayObject,
            component if component.len() == 1 => TypeCheckKind::Exact,
            _ => TypeCheckKind::Array,
        }
    } else if class.is_final() {
        TypeCheckKind::Exact
    } else if class.is_abstract() {
        TypeCheckKind::AbstractClass
    } else {
        TypeCheckKind::ClassHierarchy
    }
}

/// Operation and type of the binary arithmetic opcodes.
fn binary_operation(opcode: Opcode) -> Option<(BinaryOp, DataType)> {
    use BinaryOp::{Add, And, Div, Mul, Or, Rem, Shl, Shr, Sub, UShr, Xor};
    use DataType::{Float32, Float64, Int32, Int64};

    Some(match opcode {
        Opcode::AddInt | Opcode::AddIntLit => (Add, Int32),
        Opcode::SubInt | Opcode::RsubInt => (Sub, Int32),
        Opcode::MulInt | Opcode::MulIntLit => (Mul, Int32),
        Opcode::DivInt | Opcode::DivIntLit => (Div, Int32),
        Opcode::RemInt | Opcode::RemIntLit => (Rem, Int32),
        Opcode::AndInt | Opcode::AndIntLit => (And, Int32),
        Opcode::OrInt | Opcode::OrIntLit => (Or, Int32),
        Opcode::XorInt | Opcode::XorIntLit => (Xor, Int32),
        Opcode::ShlInt | Opcode::ShlIntLit => (Shl, Int32),
        Opcode::ShrInt | Opcode::ShrIntLit => (Shr, Int32),
        Opcode::UshrInt | Opcode::UshrIntLit => (UShr, Int32),
        Opcode::AddLong => (Add, Int64),
        Opcode::SubLong => (Sub, Int64),
        Opcode::MulLong => (Mul, Int64),
        Opcode::DivLong => (Div, Int64),
        Opcode::RemLong => (Rem, Int64),
        Opcode::AndLong => (And, Int64),
        Opcode::OrLong => (Or, Int64),
        Opcode::XorLong => (Xor, Int64),
        Opcode::ShlLong => (Shl, Int64),
        Opcode::ShrLong => (Shr, Int64),
        Opcode::UshrLong => (UShr, Int64),
        Opcode::AddFloat => (Add, Float32),
        Opcode::SubFloat => (Sub, Float32),
        Opcode::MulFloat => (Mul, Float32),
        Opcode::DivFloat => (Div, Float32),
        Opcode::RemFloat => (Rem, Float32),
        Opcode::AddDouble => (Add, Float64),
        Opcode::SubDouble => (Sub, Float64),
        Opcode::MulDouble => (Mul, Float64),
        Opcode::DivDouble => (Div, Float64),
        Opcode::RemDouble => (Rem, Float64),
        _ => return None,
    })
}
