//! Redundant and dead phi elimination.

use std::collections::HashSet;

use crate::{
    ir::{MethodGraph, ValueId},
    ssa::SsaFinalizer,
    Result,
};

impl SsaFinalizer<'_> {
    /// Replaces every phi (or cycle of phis) through which a single other
    /// value flows with that value.
    pub(super) fn eliminate_redundant_phis(&mut self, graph: &mut MethodGraph) {
        let mut worklist: Vec<ValueId> = graph
            .reverse_post_order()
            .iter()
            .flat_map(|b| graph.block(*b).phis().iter().copied())
            .collect();

        while let Some(phi) = worklist.pop() {
            let node = graph.value(phi);
            if !node.is_in_graph() || !node.is_live_phi() {
                continue;
            }

            let mut cycle = vec![phi];
            let mut visited = HashSet::from([phi]);
            let mut catch_phi_in_cycle = is_catch_phi(graph, phi);
            let mut irreducible_in_cycle = is_irreducible_header_phi(graph, phi);

            let mut candidate = single_input(graph, phi);
            if candidate.is_none() {
                // Walk the phis reachable through inputs; the cycle is redundant
                // if exactly one non-phi value enters it.
                let mut index = 0;
                'walk: while index < cycle.len() {
                    let current = cycle[index];
                    index += 1;
                    for input in graph.value(current).inputs() {
                        if *input == current {
                            continue;
                        }
                        if graph.value(*input).is_phi() {
                            if visited.insert(*input) {
                                cycle.push(*input);
                                catch_phi_in_cycle |= is_catch_phi(graph, *input);
                                irreducible_in_cycle |= is_irreducible_header_phi(graph, *input);
                            }
                        } else if candidate.is_none() {
                            candidate = Some(*input);
                        } else if candidate != Some(*input) {
                            candidate = None;
                            cycle.clear();
                            break 'walk;
                        }
                    }
                }
            }

            let Some(candidate) = candidate else {
                continue;
            };
            // Irreducible loops keep their phis; constants are cheap enough to
            // flow through them.
            if irreducible_in_cycle && graph.value(candidate).constant().is_none() {
                continue;
            }

            for current in cycle {
                if !graph.value_strictly_dominates(candidate, current) {
                    // Non-throwing instructions at the start of a try range may
                    // feed catch phis without dominating them.
                    debug_assert!(catch_phi_in_cycle, "{candidate} does not dominate {current}");
                    continue;
                }
                for site in graph.value(current).uses() {
                    if graph.value(site.user).is_phi() && !visited.contains(&site.user) {
                        worklist.push(site.user);
                    }
                }
                log::trace!("phi {current} is redundant, replaced by {candidate}");
                graph.replace_all_uses(current, candidate);
                graph.remove_value(current);
            }
        }
    }

    /// Marks every phi not transitively needed by a non-phi user dead.
    ///
    /// Phis already dead here were killed by conflicting input types; a live
    /// phi reading one means the conflicting value is really used.
    pub(super) fn mark_dead_phis(&mut self, graph: &mut MethodGraph) -> Result<()> {
        let mut conflicting = HashSet::new();
        let mut worklist = Vec::new();
        for block in graph.reverse_post_order().to_vec() {
            for phi in graph.block(block).phis().to_vec() {
                let node = graph.value(phi);
                if !node.is_live_phi() {
                    conflicting.insert(phi);
                    continue;
                }
                let keep_alive = (self.debuggable && node.has_env_uses())
                    || node.uses().iter().any(|site| !graph.value(site.user).is_phi());
                if keep_alive {
                    worklist.push(phi);
                } else {
                    graph.set_phi_live(phi, false);
                }
            }
        }

        while let Some(phi) = worklist.pop() {
            for input in graph.value(phi).inputs().to_vec() {
                let node = graph.value(input);
                if !node.is_phi() || node.is_live_phi() {
                    continue;
                }
                if conflicting.contains(&input) {
                    return Err(invalid_bytecode!(
                        "phi {} for register {} merges irreconcilable types but is used by {}",
                        input,
                        node.phi().map_or(0, |info| info.register),
                        phi
                    ));
                }
                graph.set_phi_live(input, true);
                worklist.push(input);
            }
        }
        Ok(())
    }

    /// Moves environment captures of a dead phi to its live equivalent for the
    /// same register, so deoptimization still sees the value.
    pub(super) fn fix_environment_phis(&mut self, graph: &mut MethodGraph) {
        for block in graph.reverse_post_order().to_vec() {
            let phis = graph.block(block).phis().to_vec();
            for (position, phi) in phis.iter().enumerate() {
                let node = graph.value(*phi);
                if node.is_live_phi() || !node.has_env_uses() {
                    continue;
                }
                let Some(register) = node.phi().map(|info| info.register) else {
                    continue;
                };
                let same_register =
                    |id: &&ValueId| graph.value(**id).phi().is_some_and(|info| info.register == register);
                let mut next = phis.get(position + 1).filter(same_register);
                if next.is_some_and(|id| !graph.value(*id).is_live_phi()) {
                    next = phis.get(position + 2).filter(same_register);
                }
                match next.copied() {
                    Some(next) if graph.value(next).is_live_phi() => graph.replace_all_uses(*phi, next),
                    _ => {}
                }
            }
        }
    }

    /// Removes dead phis, visiting blocks in post order.
    pub(super) fn eliminate_dead_phis(&mut self, graph: &mut MethodGraph) -> Result<()> {
        let order: Vec<_> = graph.reverse_post_order().iter().rev().copied().collect();
        for block in order {
            for phi in graph.block(block).phis().to_vec() {
                let node = graph.value(phi);
                if node.is_live_phi() {
                    continue;
                }
                if let Some(site) = node.uses().iter().find(|site| graph.value(site.user).is_live_phi()
                    || !graph.value(site.user).is_phi())
                {
                    return Err(invalid_bytecode!(
                        "phi {} for register {} merges irreconcilable types but is used by {}",
                        phi,
                        node.phi().map_or(0, |info| info.register),
                        site.user
                    ));
                }
                graph.remove_value(phi);
            }
        }
        Ok(())
    }
}

/// The only input of `phi` other than itself, if there is exactly one.
fn single_input(graph: &MethodGraph, phi: ValueId) -> Option<ValueId> {
    let mut candidate = None;
    for input in graph.value(phi).inputs() {
        if *input == phi {
            continue;
        }
        match candidate {
            None => candidate = Some(*input),
            Some(existing) if existing != *input => return None,
            Some(_) => {}
        }
    }
    candidate
}

fn is_catch_phi(graph: &MethodGraph, phi: ValueId) -> bool {
    graph
        .value(phi)
        .block
        .is_some_and(|b| graph.block(b).is_catch_block())
}

fn is_irreducible_header_phi(graph: &MethodGraph, phi: ValueId) -> bool {
    graph.value(phi).block.is_some_and(|b| {
        graph
            .block(b)
            .loop_info
            .as_ref()
            .is_some_and(|info| info.irreducible)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::SymbolTable,
        ir::{BinaryOp, BlockFlags, BlockId, Op},
        types::DataType,
    };

    struct Loop {
        graph: MethodGraph,
        header: BlockId,
        body: BlockId,
        after: BlockId,
    }

    /// entry -> pre -> header <-> body, header -> after -> exit
    fn simple_loop() -> Loop {
        let mut graph = MethodGraph::new(0, 2, 1, 0);
        let entry = graph.entry();
        let pre = graph.add_block(Some(0), BlockFlags::empty());
        let header = graph.add_block(Some(2), BlockFlags::empty());
        let body = graph.add_block(Some(4), BlockFlags::empty());
        let after = graph.add_block(Some(6), BlockFlags::empty());
        let exit = graph.add_exit_block();
        graph.add_edge(entry, pre);
        graph.add_edge(pre, header);
        graph.add_edge(header, after);
        graph.add_edge(header, body);
        graph.add_edge(body, header);
        graph.add_edge(after, exit);
        graph.append(entry, Op::Goto, DataType::Void, &[], None);
        graph.append(pre, Op::Goto, DataType::Void, &[], Some(0));
        graph.append(body, Op::Goto, DataType::Void, &[], Some(4));
        graph.append(exit, Op::Exit, DataType::Void, &[], None);
        graph.analyze().unwrap();
        Loop {
            graph,
            header,
            body,
            after,
        }
    }

    #[test]
    fn test_loop_invariant_phi_is_redundant() {
        let symbols = SymbolTable::default();
        let mut l = simple_loop();
        let five = l.graph.int_constant(5);
        let phi = l.graph.add_phi(l.header, 0, DataType::Int32, Some(2));
        l.graph.add_input(phi, five);
        l.graph.add_input(phi, phi);
        let ret = l.graph.append(l.after, Op::Return, DataType::Void, &[phi], Some(6));

        SsaFinalizer::new(&symbols, false).eliminate_redundant_phis(&mut l.graph);
        assert!(!l.graph.value(phi).is_in_graph());
        assert_eq!(l.graph.value(ret).input(0), Some(five));
        assert!(l.graph.block(l.header).phis().is_empty());
    }

    #[test]
    fn test_induction_phi_is_kept() {
        let symbols = SymbolTable::default();
        let mut l = simple_loop();
        let zero = l.graph.int_constant(0);
        let one = l.graph.int_constant(1);
        let phi = l.graph.add_phi(l.header, 0, DataType::Int32, Some(2));
        let next = l
            .graph
            .insert_before(l.graph.block(l.body).instructions()[0], Op::Binary(BinaryOp::Add), DataType::Int32, &[phi, one]);
        l.graph.add_input(phi, zero);
        l.graph.add_input(phi, next);
        l.graph.append(l.after, Op::Return, DataType::Void, &[phi], Some(6));

        let mut finalizer = SsaFinalizer::new(&symbols, false);
        finalizer.eliminate_redundant_phis(&mut l.graph);
        assert!(l.graph.value(phi).is_in_graph());

        finalizer.mark_dead_phis(&mut l.graph).unwrap();
        finalizer.eliminate_dead_phis(&mut l.graph).unwrap();
        assert!(l.graph.value(phi).is_live_phi());
    }

    #[test]
    fn test_phi_used_only_by_phis_is_removed() -> Result<()> {
        let symbols = SymbolTable::default();
        let mut l = simple_loop();
        let zero = l.graph.int_constant(0);
        let one = l.graph.int_constant(1);
        let first = l.graph.add_phi(l.header, 0, DataType::Int32, Some(2));
        l.graph.add_input(first, zero);
        l.graph.add_input(first, one);
        let second = l.graph.add_phi(l.header, 1, DataType::Int32, Some(2));
        l.graph.add_input(second, one);
        l.graph.add_input(second, first);

        let mut finalizer = SsaFinalizer::new(&symbols, false);
        finalizer.mark_dead_phis(&mut l.graph)?;
        assert!(!l.graph.value(first).is_live_phi());
        assert!(!l.graph.value(second).is_live_phi());
        finalizer.eliminate_dead_phis(&mut l.graph)?;
        assert!(l.graph.block(l.header).phis().is_empty());
        assert!(!l.graph.value(one).uses().iter().any(|u| u.user == second));
        Ok(())
    }

    #[test]
    fn test_environment_only_phi_survives_when_debuggable() {
        let symbols = SymbolTable::default();
        let mut l = simple_loop();
        let zero = l.graph.int_constant(0);
        let one = l.graph.int_constant(1);
        let phi = l.graph.add_phi(l.header, 0, DataType::Int32, Some(2));
        l.graph.add_input(phi, zero);
        l.graph.add_input(phi, one);
        let check = l.graph.append(l.after, Op::SuspendCheck, DataType::Void, &[], Some(6));
        l.graph.set_environment(check, vec![Some(phi), None]);

        let mut debuggable = SsaFinalizer::new(&symbols, true);
        debuggable.mark_dead_phis(&mut l.graph).unwrap();
        assert!(l.graph.value(phi).is_live_phi());

        let mut release = SsaFinalizer::new(&symbols, false);
        release.mark_dead_phis(&mut l.graph).unwrap();
        release.eliminate_dead_phis(&mut l.graph).unwrap();
        assert!(!l.graph.value(phi).is_in_graph());
        let env = l.graph.value(check).environment().unwrap();
        assert_eq!(env.get(0), None);
    }

    #[test]
    fn test_conflicting_phi_with_real_use_is_rejected() {
        let symbols = SymbolTable::default();
        let mut l = simple_loop();
        let zero = l.graph.int_constant(0);
        let phi = l.graph.add_phi(l.header, 0, DataType::Int32, Some(2));
        l.graph.add_input(phi, zero);
        l.graph.add_input(phi, zero);
        l.graph.append(l.after, Op::Return, DataType::Void, &[phi], Some(6));
        l.graph.set_phi_live(phi, false);

        let mut finalizer = SsaFinalizer::new(&symbols, false);
        finalizer.mark_dead_phis(&mut l.graph).unwrap();
        let err = finalizer.eliminate_dead_phis(&mut l.graph).unwrap_err();
        assert!(err.to_string().contains("irreconcilable"));
    }
}
