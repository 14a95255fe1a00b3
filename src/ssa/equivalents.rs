//! Typed equivalents of ambiguous values.
//!
//! The bytecode does not distinguish an `int` from a `float` register, nor the
//! integer zero from the null reference. When a value built under one
//! interpretation is read under the other, it is swapped for an equivalent of
//! the requested type:
//!
//! - integer constants have bit-identical float and double constants,
//! - the integer zero has the null constant as reference equivalent,
//! - an integer array get has a float array get on the same operands, placed
//!   right after it,
//! - a phi has a copy merging the same register and inputs, placed right after
//!   it; the copy is typed later by propagation.
//!
//! Anything else has no equivalent and the read is malformed.

use crate::{
    ir::{Constant, MethodGraph, Op, ValueId},
    ssa::SsaFinalizer,
    types::DataType,
};

impl SsaFinalizer<'_> {
    /// The float or double equivalent of `value`, creating it if needed.
    pub(crate) fn float_or_double_equivalent(
        &self,
        graph: &mut MethodGraph,
        value: ValueId,
        ty: DataType,
    ) -> Option<ValueId> {
        debug_assert!(ty.is_floating_point());
        let node = graph.value(value);
        if node.is_phi() {
            return phi_equivalent(graph, value, ty);
        }
        let is_array_get = node.op() == Some(&Op::ArrayGet) && node.ty.is_64bit() == ty.is_64bit();
        match node.constant() {
            Some(Constant::Int(v)) if ty == DataType::Float32 => {
                Some(graph.constant(Constant::Float(v as u32)))
            }
            Some(Constant::Long(v)) if ty == DataType::Float64 => {
                Some(graph.constant(Constant::Double(v as u64)))
            }
            _ if is_array_get => self.array_get_equivalent(graph, value),
            _ => None,
        }
    }

    /// The reference equivalent of `value`: null for the integer zero, a
    /// reference-typed copy for a phi.
    pub(crate) fn reference_equivalent(&self, graph: &mut MethodGraph, value: ValueId) -> Option<ValueId> {
        let node = graph.value(value);
        if node.is_int_zero() {
            Some(graph.null_constant())
        } else if node.is_phi() {
            phi_equivalent(graph, value, DataType::Reference)
        } else {
            None
        }
    }

    fn array_get_equivalent(&self, graph: &mut MethodGraph, aget: ValueId) -> Option<ValueId> {
        let ty = graph.value(aget).ty;
        if !ty.is_int_or_long() || self.agets_fixed {
            return None;
        }
        if let Some(existing) = floating_array_get_after(graph, aget) {
            return Some(existing);
        }
        let inputs = graph.value(aget).inputs().to_vec();
        let float_type = if ty.is_64bit() { DataType::Float64 } else { DataType::Float32 };
        Some(graph.insert_after(aget, Op::ArrayGet, float_type, &inputs))
    }
}

/// The floating point array get on the same operands placed right after `aget`.
pub(crate) fn floating_array_get_after(graph: &MethodGraph, aget: ValueId) -> Option<ValueId> {
    let block = graph.value(aget).block?;
    let list = graph.block(block).instructions();
    let position = list.iter().position(|v| *v == aget)?;
    let next = graph.value(*list.get(position + 1)?);
    (next.op() == Some(&Op::ArrayGet)
        && next.ty.is_floating_point()
        && next.inputs() == graph.value(aget).inputs())
    .then_some(next.id)
}

/// The phi of type `ty` for the same register as `phi`.
///
/// Equivalents sit right after the original, at most two of them (one of each
/// other type). A dead equivalent is not revived: a conflict was already found.
fn phi_equivalent(graph: &mut MethodGraph, phi: ValueId, ty: DataType) -> Option<ValueId> {
    let node = graph.value(phi);
    if !node.is_live_phi() {
        return None;
    }
    let register = node.phi()?.register;
    let block = node.block?;
    let phis = graph.block(block).phis();
    let position = phis.iter().position(|p| *p == phi)?;

    let same_register = |id: &ValueId| graph.value(*id).phi().is_some_and(|info| info.register == register);
    let mut next = phis.get(position + 1).filter(|id| same_register(id));
    if next.is_some_and(|id| graph.value(*id).ty != ty) {
        next = phis.get(position + 2).filter(|id| same_register(id));
    }
    match next.copied() {
        Some(candidate) if graph.value(candidate).ty == ty => {
            graph.value(candidate).is_live_phi().then_some(candidate)
        }
        _ => Some(graph.insert_phi_copy_after(phi, ty)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bytecode::SymbolTable, ir::BlockFlags};

    fn join_graph() -> (MethodGraph, ValueId) {
        let mut graph = MethodGraph::new(0, 2, 0, 0);
        let entry = graph.entry();
        let left = graph.add_block(Some(0), BlockFlags::empty());
        let right = graph.add_block(Some(2), BlockFlags::empty());
        let join = graph.add_block(Some(4), BlockFlags::empty());
        graph.add_edge(entry, left);
        graph.add_edge(entry, right);
        graph.add_edge(left, join);
        graph.add_edge(right, join);
        let zero = graph.int_constant(0);
        let one = graph.int_constant(1);
        let phi = graph.add_phi(join, 0, DataType::Int32, Some(4));
        graph.add_input(phi, zero);
        graph.add_input(phi, one);
        (graph, phi)
    }

    #[test]
    fn test_constant_equivalents_are_bit_identical() {
        let symbols = SymbolTable::default();
        let finalizer = SsaFinalizer::new(&symbols, false);
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let one = graph.int_constant(0x3f80_0000);
        let float = finalizer
            .float_or_double_equivalent(&mut graph, one, DataType::Float32)
            .unwrap();
        assert_eq!(graph.value(float).constant(), Some(Constant::Float(0x3f80_0000)));
        assert_eq!(graph.value(float).ty, DataType::Float32);

        let wide = graph.long_constant(-1);
        let double = finalizer
            .float_or_double_equivalent(&mut graph, wide, DataType::Float64)
            .unwrap();
        assert_eq!(graph.value(double).constant(), Some(Constant::Double(u64::MAX)));
        assert!(finalizer
            .float_or_double_equivalent(&mut graph, one, DataType::Float64)
            .is_none());
    }

    #[test]
    fn test_reference_equivalents() {
        let symbols = SymbolTable::default();
        let finalizer = SsaFinalizer::new(&symbols, false);
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let zero = graph.int_constant(0);
        let null = finalizer.reference_equivalent(&mut graph, zero).unwrap();
        assert!(graph.value(null).is_null_constant());
        let seven = graph.int_constant(7);
        assert!(finalizer.reference_equivalent(&mut graph, seven).is_none());
    }

    #[test]
    fn test_phi_equivalents_are_reused() {
        let symbols = SymbolTable::default();
        let finalizer = SsaFinalizer::new(&symbols, false);
        let (mut graph, phi) = join_graph();
        let float = finalizer
            .float_or_double_equivalent(&mut graph, phi, DataType::Float32)
            .unwrap();
        let reference = finalizer.reference_equivalent(&mut graph, phi).unwrap();
        assert_ne!(float, reference);
        assert_eq!(graph.value(float).inputs(), graph.value(phi).inputs());

        let again = finalizer
            .float_or_double_equivalent(&mut graph, phi, DataType::Float32)
            .unwrap();
        assert_eq!(again, float);
        assert_eq!(finalizer.reference_equivalent(&mut graph, phi), Some(reference));

        let block = graph.value(phi).block.unwrap();
        assert_eq!(graph.block(block).phis().len(), 3);
        assert_eq!(graph.block(block).phis()[0], phi);
    }

    #[test]
    fn test_dead_phi_has_no_equivalent() {
        let symbols = SymbolTable::default();
        let finalizer = SsaFinalizer::new(&symbols, false);
        let (mut graph, phi) = join_graph();
        let float = finalizer
            .float_or_double_equivalent(&mut graph, phi, DataType::Float32)
            .unwrap();
        graph.set_phi_live(float, false);
        assert!(finalizer
            .float_or_double_equivalent(&mut graph, phi, DataType::Float32)
            .is_none());
    }
}
