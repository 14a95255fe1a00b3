//! Ambiguous array operations.
//!
//! `aget` and `aput` (and their wide forms) serve both `int[]` and `float[]`
//! (`long[]` and `double[]`). Once the array's own type is known the access is
//! settled: integer arrays drop any float equivalent created on the way,
//! floating point arrays swap the integer get for a float get and make sets
//! store a floating point value.
//!
//! The array type comes from where the array was produced: its allocation, a
//! parameter, field or call result descriptor, a cast, or the element type of
//! an enclosing array. Phis take the type their inputs agree on.

use std::collections::HashSet;

use crate::{
    ir::{Dispatch, MethodGraph, Op, ValueId, ValueKind},
    ssa::{
        equivalents::floating_array_get_after,
        propagation::{add_dependent_phis, equivalent_phis_cleanup},
        SsaFinalizer,
    },
    types::DataType,
    Result,
};

impl SsaFinalizer<'_> {
    pub(super) fn fix_ambiguous_array_ops(&mut self, graph: &mut MethodGraph) -> Result<()> {
        if self.ambiguous_agets.is_empty() && self.ambiguous_asets.is_empty() {
            self.agets_fixed = true;
            return Ok(());
        }
        let mut worklist = Vec::new();

        for aget_int in self.ambiguous_agets.clone() {
            if !graph.value(aget_int).is_in_graph() {
                continue;
            }
            let array_type = self.accessed_component(graph, aget_int)?;
            let aget_float = floating_array_get_after(graph, aget_int);
            if array_type.is_int_or_long() {
                if let Some(aget_float) = aget_float {
                    graph.replace_all_uses(aget_float, aget_int);
                    graph.remove_value(aget_float);
                    add_dependent_phis(graph, aget_int, &mut worklist);
                }
            } else if array_type.is_floating_point() {
                let aget_float = match aget_float {
                    Some(existing) => existing,
                    None => {
                        let inputs = graph.value(aget_int).inputs().to_vec();
                        graph.insert_after(aget_int, Op::ArrayGet, array_type, &inputs)
                    }
                };
                graph.replace_all_uses(aget_int, aget_float);
                graph.remove_value(aget_int);
                add_dependent_phis(graph, aget_float, &mut worklist);
            } else {
                return Err(invalid_bytecode!(
                    "{} access to an array of {} at {:#x}",
                    graph.value(aget_int).ty,
                    array_type,
                    graph.value(aget_int).offset.unwrap_or(0)
                ));
            }
        }
        self.agets_fixed = true;

        for aset in self.ambiguous_asets.clone() {
            if !graph.value(aset).is_in_graph() {
                continue;
            }
            let array_type = self.accessed_component(graph, aset)?;
            if !array_type.is_floating_point() {
                continue;
            }
            let Some(value) = graph.value(aset).input(2) else {
                continue;
            };
            if !graph.value(value).ty.is_floating_point() {
                let equivalent = self
                    .float_or_double_equivalent(graph, value, array_type)
                    .ok_or_else(|| {
                        invalid_bytecode!(
                            "cannot store {} into an array of {} at {:#x}",
                            graph.value(value).ty,
                            array_type,
                            graph.value(aset).offset.unwrap_or(0)
                        )
                    })?;
                graph.replace_input(aset, 2, equivalent);
                if graph.value(equivalent).is_phi() {
                    worklist.push(equivalent);
                }
            }
            graph.set_op(aset, Op::ArraySet { expected: array_type });
        }

        if !worklist.is_empty() {
            self.process_worklist(graph, &mut worklist);
            equivalent_phis_cleanup(graph);
        }
        Ok(())
    }

    /// Element type of the primitive array accessed by `access`.
    fn accessed_component(&self, graph: &MethodGraph, access: ValueId) -> Result<DataType> {
        let node = graph.value(access);
        node.input(0)
            .and_then(|array| self.reference_descriptor(graph, array, &mut HashSet::new()))
            .and_then(|descriptor| DataType::array_component(&descriptor))
            .filter(|component| !component.is_reference())
            .ok_or_else(|| {
                invalid_bytecode!(
                    "cannot infer the array type of the access at {:#x}",
                    node.offset.unwrap_or(0)
                )
            })
    }

    /// Descriptor of the reference `value`, as far as its origin tells.
    fn reference_descriptor(&self, graph: &MethodGraph, value: ValueId, visited: &mut HashSet<ValueId>) -> Option<String> {
        let node = graph.value(value);
        match &node.kind {
            ValueKind::Parameter { descriptor, .. } => Some(descriptor.clone()),
            ValueKind::Phi(_) => {
                if !visited.insert(value) {
                    return None;
                }
                let mut merged: Option<String> = None;
                for input in node.inputs() {
                    if graph.value(*input).is_null_constant() {
                        continue;
                    }
                    let Some(descriptor) = self.reference_descriptor(graph, *input, visited) else {
                        continue;
                    };
                    match &merged {
                        Some(existing) if *existing != descriptor => return None,
                        Some(_) => {}
                        None => merged = Some(descriptor),
                    }
                }
                merged
            }
            ValueKind::Constant(_) => None,
            ValueKind::Operation(op) => {
                let symbols = self.symbols;
                match op {
                    Op::NewArray { type_index } | Op::NewInstance { type_index, .. } | Op::BoundType { type_index } => {
                        symbols.type_descriptor(*type_index).ok().map(str::to_string)
                    }
                    Op::InstanceFieldGet { field, .. }
                    | Op::StaticFieldGet { field, .. }
                    | Op::UnresolvedInstanceFieldGet { field }
                    | Op::UnresolvedStaticFieldGet { field } => {
                        let field = symbols.field(*field).ok()?;
                        symbols.type_descriptor(field.type_index).ok().map(str::to_string)
                    }
                    Op::Invoke(invoke) => {
                        let signature = match invoke.dispatch {
                            Dispatch::Polymorphic { proto } => symbols.proto(proto).ok()?,
                            _ => &symbols.method(invoke.method).ok()?.signature,
                        };
                        Some(signature.return_type.clone())
                    }
                    Op::NullCheck => self.reference_descriptor(graph, node.input(0)?, visited),
                    Op::ArrayGet => {
                        let outer = self.reference_descriptor(graph, node.input(0)?, visited)?;
                        outer.strip_prefix('[').map(str::to_string)
                    }
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::SymbolTable,
        ir::{BlockFlags, BlockId},
    };

    fn body(registers: u16) -> (MethodGraph, BlockId) {
        let mut graph = MethodGraph::new(0, registers, 1, 0);
        let entry = graph.entry();
        let body = graph.add_block(Some(0), BlockFlags::empty());
        graph.add_edge(entry, body);
        (graph, body)
    }

    fn access(graph: &mut MethodGraph, block: BlockId, array: ValueId, ty: DataType) -> ValueId {
        let zero = graph.int_constant(0);
        graph.append(block, Op::ArrayGet, ty, &[array, zero], Some(0))
    }

    #[test]
    fn test_float_array_get_is_replaced() -> Result<()> {
        let symbols = SymbolTable::default();
        let (mut graph, block) = body(2);
        let array = graph.add_parameter(1, false, "[F", DataType::Reference);
        let aget = access(&mut graph, block, array, DataType::Int32);
        let user = graph.append(block, Op::Return, DataType::Void, &[aget], Some(2));

        let mut finalizer = SsaFinalizer::new(&symbols, false);
        finalizer.record_array_get(&graph, aget);
        finalizer.fix_ambiguous_array_ops(&mut graph)?;

        assert!(!graph.value(aget).is_in_graph());
        let replacement = graph.value(user).input(0).unwrap();
        assert_eq!(graph.value(replacement).ty, DataType::Float32);
        assert_eq!(graph.value(replacement).op(), Some(&Op::ArrayGet));
        Ok(())
    }

    #[test]
    fn test_int_array_drops_float_equivalent() -> Result<()> {
        let mut symbols = SymbolTable::default();
        let int_array = symbols.add_type("[I");
        let (mut graph, block) = body(2);
        let class = graph.append(
            block,
            Op::LoadClass {
                type_index: int_array,
                needs_access_check: false,
                is_referrers_class: false,
            },
            DataType::Reference,
            &[],
            Some(0),
        );
        let length = graph.int_constant(1);
        let array = graph.append(block, Op::NewArray { type_index: int_array }, DataType::Reference, &[class, length], Some(0));
        let aget = access(&mut graph, block, array, DataType::Int32);

        let mut finalizer = SsaFinalizer::new(&symbols, false);
        let float = finalizer
            .float_or_double_equivalent(&mut graph, aget, DataType::Float32)
            .unwrap();
        let user = graph.append(block, Op::Return, DataType::Void, &[float], Some(2));
        finalizer.record_array_get(&graph, aget);
        finalizer.fix_ambiguous_array_ops(&mut graph)?;

        assert!(!graph.value(float).is_in_graph());
        assert_eq!(graph.value(user).input(0), Some(aget));
        Ok(())
    }

    #[test]
    fn test_float_array_set_stores_float() -> Result<()> {
        let symbols = SymbolTable::default();
        let (mut graph, block) = body(2);
        let array = graph.add_parameter(1, false, "[D", DataType::Reference);
        let index = graph.int_constant(0);
        let bits = graph.long_constant(0x3ff0_0000_0000_0000);
        let aset = graph.append(
            block,
            Op::ArraySet { expected: DataType::Int64 },
            DataType::Void,
            &[array, index, bits],
            Some(0),
        );
        let mut finalizer = SsaFinalizer::new(&symbols, false);
        finalizer.record_array_set(&graph, aset);
        finalizer.fix_ambiguous_array_ops(&mut graph)?;

        let stored = graph.value(aset).input(2).unwrap();
        assert_eq!(graph.value(stored).ty, DataType::Float64);
        assert_eq!(graph.value(aset).op(), Some(&Op::ArraySet { expected: DataType::Float64 }));
        Ok(())
    }

    #[test]
    fn test_unknown_array_is_rejected() {
        let symbols = SymbolTable::default();
        let (mut graph, block) = body(2);
        let array = graph.add_parameter(1, false, "Ljava/lang/Object;", DataType::Reference);
        let aget = access(&mut graph, block, array, DataType::Int32);
        let mut finalizer = SsaFinalizer::new(&symbols, false);
        finalizer.record_array_get(&graph, aget);
        assert!(finalizer.fix_ambiguous_array_ops(&mut graph).is_err());
    }
}
