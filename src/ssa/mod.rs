//! SSA finalization.
//!
//! The instruction builder leaves three kinds of ambiguity behind: phis typed
//! after their first input, integer array accesses that may really be float
//! accesses, and integer zeros compared against references. [`SsaFinalizer`]
//! resolves them and removes the phis and allocations that turn out unused.
//!
//! # Passes
//!
//! 1. Primitive type propagation over phis, to a fixpoint (`propagation`)
//! 2. Redundant phi elimination (`phis`)
//! 3. Null constant repair in reference comparisons
//! 4. Ambiguous array operations resolved from the array's type (`arrays`)
//! 5. Dead phi marking, environment repair and dead phi removal (`phis`)
//! 6. Removal of string allocations made redundant by factory calls
//!
//! Every pass only mutates what is still ambiguous, so running the finalizer on
//! its own output changes nothing.

mod arrays;
mod equivalents;
mod phis;
mod propagation;

use crate::{
    bytecode::SymbolTable,
    ir::{Condition, MethodGraph, Op, ValueId},
    types::DataType,
    Result,
};

/// Post-pass turning the builder's provisional graph into well-typed SSA.
///
/// The instruction builder records the ambiguous operations it creates through
/// the `record_*` methods; [`SsaFinalizer::run`] then settles them.
#[derive(Debug)]
pub struct SsaFinalizer<'a> {
    symbols: &'a SymbolTable,
    debuggable: bool,
    ambiguous_agets: Vec<ValueId>,
    ambiguous_asets: Vec<ValueId>,
    uninitialized_strings: Vec<ValueId>,
    agets_fixed: bool,
}

impl<'a> SsaFinalizer<'a> {
    /// Creates a finalizer resolving array types against `symbols`.
    ///
    /// With `debuggable` set, phis only observed by environments are kept and
    /// string allocations are never removed.
    #[must_use]
    pub fn new(symbols: &'a SymbolTable, debuggable: bool) -> Self {
        SsaFinalizer {
            symbols,
            debuggable,
            ambiguous_agets: Vec::new(),
            ambiguous_asets: Vec::new(),
            uninitialized_strings: Vec::new(),
            agets_fixed: false,
        }
    }

    /// Records an array get of integer or long type.
    pub fn record_array_get(&mut self, graph: &MethodGraph, aget: ValueId) {
        let ty = graph.value(aget).ty;
        debug_assert!(!ty.is_floating_point());
        if ty.is_int_or_long() {
            self.ambiguous_agets.push(aget);
        }
    }

    /// Records a plain or wide array set whose stored value has integer or long type.
    pub fn record_array_set(&mut self, graph: &MethodGraph, aset: ValueId) {
        let node = graph.value(aset);
        let plain = matches!(node.op(), Some(Op::ArraySet { expected }) if expected.is_int_or_long());
        let stored = node.input(2).map(|v| graph.value(v).ty);
        if plain && stored.is_some_and(DataType::is_int_or_long) {
            self.ambiguous_asets.push(aset);
        }
    }

    /// Records a string allocation whose uses were taken over by a factory call.
    pub fn record_uninitialized_string(&mut self, new_instance: ValueId) {
        self.uninitialized_strings.push(new_instance);
    }

    /// Runs every finalization pass over `graph`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] when an array type cannot be
    /// inferred for an ambiguous access, or when a phi whose inputs have
    /// irreconcilable types is still used.
    pub fn run(&mut self, graph: &mut MethodGraph) -> Result<()> {
        let revision = graph.revision();
        self.run_primitive_type_propagation(graph);
        self.eliminate_redundant_phis(graph);
        self.fix_null_constant_type(graph)?;
        self.fix_ambiguous_array_ops(graph)?;
        self.mark_dead_phis(graph)?;
        self.fix_environment_phis(graph);
        self.eliminate_dead_phis(graph)?;
        if !self.debuggable {
            self.remove_redundant_uninitialized_strings(graph);
        }
        log::debug!(
            "method {}: SSA finalized, {} phis, {} mutations",
            graph.method_index(),
            graph.phi_count(),
            graph.revision() - revision
        );
        Ok(())
    }

    /// Replaces the integer zero compared against a reference with the null constant.
    fn fix_null_constant_type(&self, graph: &mut MethodGraph) -> Result<()> {
        let comparisons: Vec<ValueId> = graph
            .values()
            .filter(|v| v.is_in_graph())
            .filter(|v| {
                matches!(
                    v.op(),
                    Some(Op::Condition(Condition::Equal | Condition::NotEqual))
                )
            })
            .map(|v| v.id)
            .collect();

        for condition in comparisons {
            let (Some(left), Some(right)) = (graph.value(condition).input(0), graph.value(condition).input(1))
            else {
                continue;
            };
            let (left_ty, right_ty) = (graph.value(left).ty, graph.value(right).ty);
            let (index, int_operand) = match (left_ty, right_ty) {
                (DataType::Reference, DataType::Int32) => (1, right),
                (DataType::Int32, DataType::Reference) => (0, left),
                _ => continue,
            };
            if !graph.value(int_operand).is_int_zero() {
                return Err(invalid_bytecode!(
                    "reference compared against non-null integer {}",
                    int_operand
                ));
            }
            let null = graph.null_constant();
            graph.replace_input(condition, index, null);
        }
        Ok(())
    }

    /// Removes string allocations nothing but environments observe anymore.
    fn remove_redundant_uninitialized_strings(&mut self, graph: &mut MethodGraph) {
        for new_instance in std::mem::take(&mut self.uninitialized_strings) {
            let node = graph.value(new_instance);
            if !node.is_in_graph() || node.has_uses() || node.has_env_alias() {
                continue;
            }
            let class = node.input(0);
            let null = graph.null_constant();
            graph.replace_all_uses(new_instance, null);
            graph.remove_value(new_instance);

            let Some(mut class) = class else {
                continue;
            };
            if graph.value(class).op() == Some(&Op::ClinitCheck) {
                let check = class;
                let Some(load) = graph.value(check).input(0) else {
                    continue;
                };
                graph.replace_all_uses(check, load);
                graph.remove_value(check);
                class = load;
            }
            let load = graph.value(class);
            if matches!(load.op(), Some(Op::LoadClass { .. })) && !load.has_uses() {
                graph.remove_value(class);
            }
            log::trace!("removed redundant string allocation {new_instance}");
        }
    }
}
