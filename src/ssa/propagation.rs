//! Primitive type propagation over phis.
//!
//! A phi is created with the type of its first input. Propagation recomputes it
//! from all inputs: integral inputs give way to a float or reference input of
//! the same width, and the inputs that disagree with the result are swapped for
//! their typed equivalents. A phi whose inputs cannot agree is marked dead; it
//! must then be unused, which dead phi elimination checks.

use crate::{
    ir::{MethodGraph, ValueId},
    ssa::SsaFinalizer,
};

impl SsaFinalizer<'_> {
    /// Types every live phi. Loop header phis wait for the worklist since their
    /// back edge inputs are not typed yet on the first visit.
    pub(super) fn run_primitive_type_propagation(&mut self, graph: &mut MethodGraph) {
        let mut worklist = Vec::new();
        for block in graph.reverse_post_order().to_vec() {
            let is_header = graph.block(block).is_loop_header();
            for phi in graph.block(block).phis().to_vec() {
                if !graph.value(phi).is_live_phi() {
                    continue;
                }
                if is_header {
                    worklist.push(phi);
                } else {
                    self.update_primitive_type(graph, phi, &mut worklist);
                }
            }
        }
        self.process_worklist(graph, &mut worklist);
        equivalent_phis_cleanup(graph);
    }

    pub(super) fn process_worklist(&mut self, graph: &mut MethodGraph, worklist: &mut Vec<ValueId>) {
        while let Some(phi) = worklist.pop() {
            if graph.value(phi).is_live_phi() && self.update_primitive_type(graph, phi, worklist) {
                add_dependent_phis(graph, phi, worklist);
            }
        }
    }

    /// Retypes `phi`, returning `true` if its type or liveness changed.
    fn update_primitive_type(&mut self, graph: &mut MethodGraph, phi: ValueId, worklist: &mut Vec<ValueId>) -> bool {
        let original = graph.value(phi).ty;
        if !type_phi_from_inputs(graph, phi) || !self.type_inputs_of_phi(graph, phi, worklist) {
            log::trace!("phi {phi} has conflicting input types");
            graph.set_phi_live(phi, false);
            return true;
        }
        graph.value(phi).ty != original
    }

    /// Replaces the inputs of a float or reference phi that have another type.
    fn type_inputs_of_phi(&mut self, graph: &mut MethodGraph, phi: ValueId, worklist: &mut Vec<ValueId>) -> bool {
        let common = graph.value(phi).ty;
        if common.is_integral() {
            return true;
        }
        for index in 0..graph.value(phi).inputs().len() {
            let input = graph.value(phi).inputs()[index];
            if graph.value(input).ty == common {
                continue;
            }
            let equivalent = if common.is_reference() {
                self.reference_equivalent(graph, input)
            } else {
                self.float_or_double_equivalent(graph, input, common)
            };
            let Some(equivalent) = equivalent else {
                return false;
            };
            graph.replace_input(phi, index, equivalent);
            if graph.value(equivalent).is_phi() {
                worklist.push(equivalent);
            }
        }
        true
    }
}

/// Computes the common type of `phi`'s inputs and assigns it.
fn type_phi_from_inputs(graph: &mut MethodGraph, phi: ValueId) -> bool {
    let mut common = graph.value(phi).ty;
    debug_assert!(common.to_phi_type() == common);
    for input in graph.value(phi).inputs() {
        let node = graph.value(*input);
        if node.is_phi() && !node.is_live_phi() {
            return false;
        }
        let input_type = node.ty.to_phi_type();
        if common == input_type {
            continue;
        }
        if common.is_64bit() != input_type.is_64bit() {
            return false;
        }
        if common.is_integral() {
            common = input_type;
        } else if !input_type.is_integral() {
            return false;
        }
    }
    graph.set_type(phi, common);
    true
}

/// Queues the live phis using `value` whose type now disagrees with it.
pub(super) fn add_dependent_phis(graph: &MethodGraph, value: ValueId, worklist: &mut Vec<ValueId>) {
    let node = graph.value(value);
    let dead = node.is_phi() && !node.is_live_phi();
    for site in node.uses() {
        let user = graph.value(site.user);
        if user.is_live_phi() && (dead || user.ty != node.ty) {
            worklist.push(site.user);
        }
    }
}

/// Merges phis that ended up with the type of an equivalent of the same register.
pub(super) fn equivalent_phis_cleanup(graph: &mut MethodGraph) {
    for block in graph.reverse_post_order().to_vec() {
        for phi in graph.block(block).phis().to_vec() {
            let Some(next) = next_equivalent_with_same_type(graph, phi) else {
                continue;
            };
            if graph.value(next).is_live_phi() {
                graph.replace_all_uses(phi, next);
                graph.set_phi_live(phi, false);
            } else {
                graph.replace_all_uses(next, phi);
            }
        }
    }
}

fn next_equivalent_with_same_type(graph: &MethodGraph, phi: ValueId) -> Option<ValueId> {
    let node = graph.value(phi);
    let register = node.phi()?.register;
    let phis = graph.block(node.block?).phis();
    let position = phis.iter().position(|p| *p == phi)?;
    phis[position + 1..]
        .iter()
        .map(|id| graph.value(*id))
        .take_while(|next| next.phi().is_some_and(|info| info.register == register))
        .find(|next| next.ty == node.ty)
        .map(|next| next.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::SymbolTable,
        ir::{BinaryOp, BlockFlags, BlockId, Condition, Constant, Op},
        types::DataType,
    };

    /// entry -> left | right -> join, with a phi for register 0 at `join`.
    fn diamond(left_value: Constant, right_value: Constant) -> (MethodGraph, BlockId, ValueId) {
        let mut graph = MethodGraph::new(0, 2, 0, 0);
        let entry = graph.entry();
        let left = graph.add_block(Some(2), BlockFlags::empty());
        let right = graph.add_block(Some(4), BlockFlags::empty());
        let join = graph.add_block(Some(6), BlockFlags::empty());
        let exit = graph.add_exit_block();
        graph.add_edge(entry, left);
        graph.add_edge(entry, right);
        graph.add_edge(left, join);
        graph.add_edge(right, join);
        graph.add_edge(join, exit);
        let a = graph.constant(left_value);
        let b = graph.constant(right_value);
        let zero = graph.int_constant(0);
        let condition = graph.append(entry, Op::Condition(Condition::Equal), DataType::Bool, &[zero, zero], None);
        graph.append(entry, Op::If, DataType::Void, &[condition], None);
        graph.append(left, Op::Goto, DataType::Void, &[], Some(2));
        graph.append(right, Op::Goto, DataType::Void, &[], Some(4));
        graph.append(exit, Op::Exit, DataType::Void, &[], None);
        let phi = graph.add_phi(join, 0, graph.value(a).ty.to_phi_type(), Some(6));
        graph.add_input(phi, a);
        graph.add_input(phi, b);
        (graph, join, phi)
    }

    #[test]
    fn test_integral_phi_takes_float_input_type() {
        let symbols = SymbolTable::default();
        let mut finalizer = SsaFinalizer::new(&symbols, false);
        let (mut graph, join, phi) = diamond(Constant::Int(1), Constant::Float(0x4000_0000));
        graph.analyze().unwrap();
        finalizer.run_primitive_type_propagation(&mut graph);
        assert_eq!(graph.value(phi).ty, DataType::Float32);
        assert!(graph.value(phi).is_live_phi());
        let first = graph.value(phi).input(0).unwrap();
        assert_eq!(graph.value(first).constant(), Some(Constant::Float(1)));
        assert_eq!(graph.block(join).phis().len(), 1);
    }

    #[test]
    fn test_width_conflict_kills_phi() {
        let symbols = SymbolTable::default();
        let mut finalizer = SsaFinalizer::new(&symbols, false);
        let (mut graph, _, phi) = diamond(Constant::Int(1), Constant::Long(2));
        graph.analyze().unwrap();
        finalizer.run_primitive_type_propagation(&mut graph);
        assert!(!graph.value(phi).is_live_phi());
    }

    #[test]
    fn test_reference_phi_rejects_non_zero_integer() {
        let symbols = SymbolTable::default();
        let mut finalizer = SsaFinalizer::new(&symbols, false);
        let (mut graph, _, phi) = diamond(Constant::Null, Constant::Int(4));
        graph.analyze().unwrap();
        finalizer.run_primitive_type_propagation(&mut graph);
        assert!(!graph.value(phi).is_live_phi());

        let (mut graph, _, phi) = diamond(Constant::Null, Constant::Int(0));
        graph.analyze().unwrap();
        finalizer.run_primitive_type_propagation(&mut graph);
        assert!(graph.value(phi).is_live_phi());
        let second = graph.value(phi).input(1).unwrap();
        assert!(graph.value(second).is_null_constant());
    }

    #[test]
    fn test_equivalent_phis_merge() {
        let (mut graph, join, phi) = diamond(Constant::Int(1), Constant::Int(2));
        graph.analyze().unwrap();
        let copy = graph.insert_phi_copy_after(phi, DataType::Int32);
        let one = graph.int_constant(1);
        let sum = graph.append(join, Op::Binary(BinaryOp::Add), DataType::Int32, &[phi, one], Some(6));
        equivalent_phis_cleanup(&mut graph);
        assert!(!graph.value(phi).is_live_phi());
        assert_eq!(graph.value(sum).input(0), Some(copy));
    }
}
