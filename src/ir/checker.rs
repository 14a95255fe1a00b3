//! Structural consistency checks over a built graph.
//!
//! A failure here means a builder bug, never bad input, so it is reported as
//! [`Error::GraphError`]. The driver runs [`verify`] when
//! [`BuilderConfig::verify`](crate::BuilderConfig::verify) is set.

use crate::{
    ir::{BasicBlock, MethodGraph, Op, UseSite, Value},
    Error, Result,
};

macro_rules! check {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(Error::GraphError(format!($($arg)*)));
        }
    };
}

/// Verifies edge symmetry, terminators, phi arity, use lists and input dominance.
///
/// # Errors
///
/// Returns [`Error::GraphError`] describing the first inconsistency found.
pub fn verify(graph: &MethodGraph) -> Result<()> {
    for block in graph.blocks() {
        check_edges(graph, block)?;
        check_terminator(graph, block)?;
        for id in block.phis() {
            let phi = graph.value(*id);
            check!(phi.is_phi(), "{} in phi list of {} is not a phi", id, block.id);
            check_phi(graph, block, phi)?;
            check_uses(graph, phi)?;
        }
        for id in block.instructions() {
            let value = graph.value(*id);
            check!(!value.is_phi(), "phi {} in instruction list of {}", id, block.id);
            check!(value.block == Some(block.id), "{} claims block {:?}, listed in {}", id, value.block, block.id);
            check_uses(graph, value)?;
            for input in value.inputs() {
                check!(
                    graph.value_strictly_dominates(*input, *id),
                    "{} does not dominate its user {}",
                    input,
                    id
                );
            }
        }
    }
    Ok(())
}

fn check_edges(graph: &MethodGraph, block: &BasicBlock) -> Result<()> {
    for succ in block.successors() {
        let target = graph.block(*succ);
        check!(!target.is_removed(), "{} has removed successor {}", block.id, succ);
        let forward = block.successors().iter().filter(|s| *s == succ).count();
        let backward = target.predecessors().iter().filter(|p| **p == block.id).count();
        check!(forward == backward, "edge {} -> {} is not mirrored", block.id, succ);
    }
    for pred in block.predecessors() {
        check!(
            graph.block(*pred).successors().contains(&block.id),
            "{} lists predecessor {} which does not branch to it",
            block.id,
            pred
        );
    }
    Ok(())
}

fn check_terminator(graph: &MethodGraph, block: &BasicBlock) -> Result<()> {
    let Some(last) = block.last_instruction() else {
        return Err(Error::GraphError(format!("{} is empty", block.id)));
    };
    for id in &block.instructions()[..block.instructions().len() - 1] {
        let inner = graph.value(*id).op().is_some_and(Op::is_control_flow);
        check!(!inner, "{} has control flow {} before its end", block.id, id);
    }
    let successors = block.successors().len();
    match graph.value(last).op() {
        Some(Op::Goto) => check!(successors == 1, "goto {} has {} successors", last, successors),
        Some(Op::If) => check!(successors == 2, "if {} has {} successors", last, successors),
        Some(Op::PackedSwitch { entries, .. }) => check!(
            successors == *entries as usize + 1,
            "switch {} has {} successors for {} entries",
            last,
            successors,
            entries
        ),
        Some(Op::Return | Op::ReturnVoid | Op::Throw) => {
            check!(successors == 1, "{} must have one successor", last);
        }
        Some(Op::TryBoundary { .. }) => check!(successors >= 1, "boundary {} has no successor", last),
        Some(Op::Exit) => check!(block.is_exit() && successors == 0, "misplaced exit {}", last),
        _ => return Err(Error::GraphError(format!("{} does not end in control flow", block.id))),
    }
    Ok(())
}

fn check_phi(graph: &MethodGraph, block: &BasicBlock, phi: &Value) -> Result<()> {
    check!(phi.block == Some(block.id), "phi {} claims block {:?}", phi.id, phi.block);
    if block.is_catch_block() {
        return Ok(());
    }
    check!(
        phi.inputs().len() == block.predecessors().len(),
        "phi {} has {} inputs for {} predecessors",
        phi.id,
        phi.inputs().len(),
        block.predecessors().len()
    );
    for (input, pred) in phi.inputs().iter().zip(block.predecessors()) {
        let defined = graph.value(*input).block;
        check!(
            defined.is_some_and(|def| graph.dominates(def, *pred)),
            "phi input {} of {} is not available at the end of {}",
            input,
            phi.id,
            pred
        );
    }
    Ok(())
}

fn check_uses(graph: &MethodGraph, value: &Value) -> Result<()> {
    for (index, input) in value.inputs().iter().enumerate() {
        let definition = graph.value(*input);
        check!(definition.is_in_graph(), "{} reads removed value {}", value.id, input);
        check!(
            definition.uses().contains(&UseSite { user: value.id, index }),
            "{} is missing use {}#{}",
            input,
            value.id,
            index
        );
    }
    for site in value.uses() {
        check!(
            graph.value(site.user).input(site.index) == Some(value.id),
            "stale use of {} by {}#{}",
            value.id,
            site.user,
            site.index
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::BlockFlags, types::DataType};

    fn straight_line() -> MethodGraph {
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let entry = graph.entry();
        let body = graph.add_block(Some(0), BlockFlags::empty());
        let exit = graph.add_exit_block();
        graph.add_edge(entry, body);
        graph.add_edge(body, exit);
        graph.append(entry, Op::Goto, DataType::Void, &[], None);
        let five = graph.int_constant(5);
        graph.append(body, Op::Return, DataType::Void, &[five], Some(0));
        graph.append(exit, Op::Exit, DataType::Void, &[], None);
        graph
    }

    #[test]
    fn test_valid_graph() -> Result<()> {
        let mut graph = straight_line();
        graph.analyze()?;
        verify(&graph)
    }

    #[test]
    fn test_missing_terminator() -> Result<()> {
        let mut graph = straight_line();
        graph.analyze()?;
        let body = graph.block(graph.entry()).successors()[0];
        let ret = graph.block(body).instructions()[0];
        graph.remove_value(ret);
        assert!(matches!(verify(&graph), Err(Error::GraphError(_))));
        Ok(())
    }

    #[test]
    fn test_unmirrored_edge() -> Result<()> {
        let mut graph = straight_line();
        graph.analyze()?;
        let entry = graph.entry();
        graph.block_mut(entry).predecessors.push(entry);
        let err = verify(&graph).unwrap_err();
        assert!(err.to_string().contains("does not branch"));
        Ok(())
    }
}
