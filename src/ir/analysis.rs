//! Control-flow analysis run between block building and SSA construction.
//!
//! [`MethodGraph::analyze`] brings a freshly linked block graph into the shape the
//! instruction builder relies on:
//!
//! 1. back edges are discovered by an iterative depth-first search,
//! 2. unreachable blocks are removed,
//! 3. critical edges on normal flow are split and every loop gets a single
//!    pre-header which is the header's first predecessor,
//! 4. the reverse post order and the immediate dominators are computed,
//! 5. loop bodies are populated and irreducible loops flagged,
//! 6. try membership is derived from the boundary blocks.
//!
//! The reverse post order visits a block only once all of its forward
//! predecessors were visited, so every block except loop headers sees all of its
//! predecessors before itself, and loop headers see their pre-header.

use crate::{
    ir::{BlockFlags, BlockId, LoopInfo, MethodGraph, Op, TryBoundaryKind, TryCatchInfo},
    types::DataType,
    utils::BitSet,
    Error, Result,
};

impl MethodGraph {
    /// Runs the CFG analysis pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThrowCatchLoop`] if a catch block is a loop header.
    pub fn analyze(&mut self) -> Result<()> {
        let visited = self.find_back_edges();
        self.remove_unreachable(&visited);
        self.simplify_cfg();
        self.compute_reverse_post_order();
        self.compute_dominators();
        self.populate_loops()?;
        self.compute_try_membership();
        log::debug!(
            "method {}: {} blocks after CFG analysis{}",
            self.method_index(),
            self.block_count(),
            if self.has_irreducible_loops { ", irreducible loops" } else { "" }
        );
        Ok(())
    }

    fn find_back_edges(&mut self) -> BitSet {
        let capacity = self.block_capacity();
        let mut visited = BitSet::new(capacity);
        let mut visiting = BitSet::new(capacity);
        let mut successors_visited = vec![0usize; capacity];
        let entry = self.entry();

        visited.insert(entry.index());
        visiting.insert(entry.index());
        let mut worklist = vec![entry];
        while let Some(&current) = worklist.last() {
            let successors = &self.blocks[current.index()].successors;
            let next = successors_visited[current.index()];
            if next == successors.len() {
                visiting.remove(current.index());
                worklist.pop();
                continue;
            }
            let successor = successors[next];
            successors_visited[current.index()] += 1;
            if visiting.contains(successor.index()) {
                self.blocks[successor.index()]
                    .loop_info
                    .get_or_insert_with(|| LoopInfo::new(successor, capacity))
                    .back_edges
                    .push(current);
            } else if visited.insert(successor.index()) {
                visiting.insert(successor.index());
                worklist.push(successor);
            }
        }
        visited
    }

    fn remove_unreachable(&mut self, visited: &BitSet) {
        for index in 0..self.block_capacity() {
            if !visited.contains(index) && !self.blocks[index].is_removed() {
                log::trace!("removing unreachable block B{index}");
                self.remove_block(BlockId::new(index));
            }
        }
    }

    fn simplify_cfg(&mut self) {
        let mut index = 0;
        while index < self.block_capacity() {
            let block = BlockId::new(index);
            index += 1;
            if self.block(block).is_removed() {
                continue;
            }
            if self.block(block).successors().len() > 1 {
                let normal = self.block(block).normal_successors().len();
                for position in 0..normal {
                    let successor = self.block(block).successors()[position];
                    if Some(successor) == self.exit() {
                        continue;
                    }
                    if self.block(successor).predecessors().len() > 1 {
                        self.split_critical_edge(block, successor);
                    }
                }
            }
            if self.block(block).is_loop_header() {
                self.simplify_loop(block);
            }
        }
    }

    fn split_critical_edge(&mut self, from: BlockId, to: BlockId) {
        let middle = self.split_edge(from, to, Op::Goto, BlockFlags::empty());
        if let Some(info) = &mut self.block_mut(to).loop_info {
            if let Some(edge) = info.back_edges.iter_mut().find(|b| **b == from) {
                *edge = middle;
            }
        }
    }

    fn simplify_loop(&mut self, header: BlockId) {
        let Some(info) = self.block(header).loop_info.clone() else {
            return;
        };
        let incoming: Vec<BlockId> = self
            .block(header)
            .predecessors()
            .iter()
            .copied()
            .filter(|p| !info.is_back_edge(*p))
            .collect();
        let entry_successors = self.block(self.entry()).successors();
        let entry_falls_into_header = entry_successors.len() == 1 && entry_successors[0] == header;

        let pre_header = if incoming.len() != 1 || entry_falls_into_header {
            let offset = self.block(header).offset;
            let pre_header = self.add_block(offset, BlockFlags::SYNTHETIC);
            self.append(pre_header, Op::Goto, DataType::Void, &[], offset);
            for pred in incoming {
                self.replace_successor(pred, header, pre_header);
            }
            self.add_edge(pre_header, header);
            pre_header
        } else {
            incoming[0]
        };

        let preds = &mut self.block_mut(header).predecessors;
        if let Some(position) = preds.iter().position(|p| *p == pre_header) {
            preds.swap(0, position);
        }
        if let Some(info) = &mut self.block_mut(header).loop_info {
            info.pre_header = Some(pre_header);
        }
    }

    fn back_edge_count(&self, block: BlockId) -> usize {
        self.block(block)
            .loop_info
            .as_ref()
            .map_or(0, |info| info.back_edges.len())
    }

    fn compute_reverse_post_order(&mut self) {
        let capacity = self.block_capacity();
        let mut visits = vec![0usize; capacity];
        let mut successors_visited = vec![0usize; capacity];
        let entry = self.entry();
        let mut order = vec![entry];
        let mut worklist = vec![entry];

        while let Some(&current) = worklist.last() {
            let successors = self.block(current).successors();
            let next = successors_visited[current.index()];
            if next == successors.len() {
                worklist.pop();
                continue;
            }
            let successor = successors[next];
            successors_visited[current.index()] += 1;
            visits[successor.index()] += 1;
            let forward = self.block(successor).predecessors().len() - self.back_edge_count(successor);
            if visits[successor.index()] == forward {
                order.push(successor);
                worklist.push(successor);
            }
        }
        self.rpo = order;
    }

    /// Iterative dominator computation over the reverse post order
    /// (Cooper, Harvey and Kennedy).
    fn compute_dominators(&mut self) {
        let mut number = vec![usize::MAX; self.block_capacity()];
        for (position, block) in self.rpo.iter().enumerate() {
            number[block.index()] = position;
        }
        let mut idom: Vec<Option<BlockId>> = vec![None; self.block_capacity()];
        let entry = self.entry();
        idom[entry.index()] = Some(entry);

        let intersect = |idom: &[Option<BlockId>], mut a: BlockId, mut b: BlockId| {
            while a != b {
                while number[a.index()] > number[b.index()] {
                    a = idom[a.index()].unwrap_or(entry);
                }
                while number[b.index()] > number[a.index()] {
                    b = idom[b.index()].unwrap_or(entry);
                }
            }
            a
        };

        let mut changed = true;
        while changed {
            changed = false;
            for &block in self.rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for &pred in self.block(block).predecessors() {
                    if idom[pred.index()].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, pred, current),
                    });
                }
                if new_idom.is_some() && idom[block.index()] != new_idom {
                    idom[block.index()] = new_idom;
                    changed = true;
                }
            }
        }

        for index in 0..self.block_capacity() {
            let block = BlockId::new(index);
            self.block_mut(block).dominator = if block == entry { None } else { idom[index] };
        }
    }

    fn populate_loops(&mut self) -> Result<()> {
        let capacity = self.block_capacity();
        let headers: Vec<BlockId> = self.rpo.iter().copied().filter(|b| self.block(*b).is_loop_header()).collect();
        for header in headers {
            if self.block(header).is_catch_block() {
                return Err(Error::ThrowCatchLoop {
                    offset: self.block(header).offset.unwrap_or(0),
                });
            }
            let Some(mut info) = self.block(header).loop_info.clone() else {
                continue;
            };

            // Blocks reaching a back edge without passing through the header.
            let mut reaching = BitSet::new(capacity);
            reaching.insert(header.index());
            let mut worklist: Vec<BlockId> = info.back_edges.clone();
            while let Some(block) = worklist.pop() {
                if reaching.insert(block.index()) {
                    worklist.extend_from_slice(self.block(block).predecessors());
                }
            }

            info.irreducible = info.back_edges.iter().any(|edge| !self.dominates(header, *edge));
            if info.irreducible {
                self.has_irreducible_loops = true;
                // Restrict to blocks the header reaches.
                let mut reached = BitSet::new(capacity);
                let mut worklist = vec![header];
                while let Some(block) = worklist.pop() {
                    if reached.insert(block.index()) {
                        worklist.extend(
                            self.block(block)
                                .successors()
                                .iter()
                                .copied()
                                .filter(|s| reaching.contains(s.index())),
                        );
                    }
                }
                info.blocks = reached;
            } else {
                info.blocks = reaching;
            }
            self.block_mut(header).loop_info = Some(info);
        }
        Ok(())
    }

    fn compute_try_membership(&mut self) {
        for position in 1..self.rpo.len() {
            let block = self.rpo[position];
            if self.block(block).is_catch_block() {
                continue;
            }
            let Some(&first) = self.block(block).predecessors().first() else {
                continue;
            };
            let info = self.try_entry_of_successors(first).map(|entry| TryCatchInfo::Try { entry });
            self.block_mut(block).try_catch = info;
        }
    }

    fn try_entry_of_successors(&self, block: BlockId) -> Option<BlockId> {
        let last = self.block(block).last_instruction()?;
        match self.value(last).op() {
            Some(Op::TryBoundary { kind: TryBoundaryKind::Entry }) => Some(block),
            Some(Op::TryBoundary { kind: TryBoundaryKind::Exit }) => None,
            _ => self.block(block).try_entry(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ir::{BlockFlags, BlockId, MethodGraph, Op, TryBoundaryKind, TryCatchInfo},
        types::DataType,
        Error, Result,
    };

    fn terminate(graph: &mut MethodGraph, block: BlockId, op: Op) {
        graph.append(block, op, DataType::Void, &[], None);
    }

    /// entry -> b1 -> header <-> body, header -> exit
    fn simple_loop() -> (MethodGraph, BlockId, BlockId, BlockId) {
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let entry = graph.entry();
        let b1 = graph.add_block(Some(0), BlockFlags::empty());
        let header = graph.add_block(Some(2), BlockFlags::empty());
        let body = graph.add_block(Some(4), BlockFlags::empty());
        let ret = graph.add_block(Some(6), BlockFlags::empty());
        let exit = graph.add_exit_block();
        graph.add_edge(entry, b1);
        graph.add_edge(b1, header);
        graph.add_edge(header, ret);
        graph.add_edge(header, body);
        graph.add_edge(body, header);
        graph.add_edge(ret, exit);
        terminate(&mut graph, entry, Op::Goto);
        terminate(&mut graph, b1, Op::Goto);
        terminate(&mut graph, header, Op::If);
        terminate(&mut graph, body, Op::Goto);
        terminate(&mut graph, ret, Op::ReturnVoid);
        terminate(&mut graph, exit, Op::Exit);
        (graph, b1, header, body)
    }

    #[test]
    fn test_loop_analysis() -> Result<()> {
        let (mut graph, b1, header, body) = simple_loop();
        graph.analyze()?;

        let info = graph.block(header).loop_info.clone().unwrap();
        assert_eq!(info.pre_header, Some(b1));
        assert_eq!(info.back_edges, vec![body]);
        assert!(info.contains(body));
        assert!(!info.contains(b1));
        assert!(!info.irreducible);
        assert_eq!(graph.block(header).predecessors()[0], b1);
        assert_eq!(graph.block(header).dominator, Some(b1));

        let rpo = graph.reverse_post_order();
        let pos = |b: BlockId| rpo.iter().position(|x| *x == b).unwrap();
        assert!(pos(b1) < pos(header));
        assert!(pos(header) < pos(body));
        Ok(())
    }

    #[test]
    fn test_entry_never_pre_header() -> Result<()> {
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let entry = graph.entry();
        let header = graph.add_block(Some(0), BlockFlags::empty());
        let exit = graph.add_exit_block();
        graph.add_edge(entry, header);
        graph.add_edge(header, exit);
        graph.add_edge(header, header);
        terminate(&mut graph, entry, Op::Goto);
        terminate(&mut graph, header, Op::If);
        terminate(&mut graph, exit, Op::Exit);
        graph.analyze()?;

        let pre_header = graph.block(header).loop_info.as_ref().and_then(|i| i.pre_header);
        assert!(pre_header.is_some());
        assert_ne!(pre_header, Some(entry));
        assert_eq!(graph.block(header).predecessors()[0], pre_header.unwrap());
        Ok(())
    }

    #[test]
    fn test_critical_edges_split() -> Result<()> {
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let entry = graph.entry();
        let b1 = graph.add_block(Some(0), BlockFlags::empty());
        let b2 = graph.add_block(Some(2), BlockFlags::empty());
        let join = graph.add_block(Some(4), BlockFlags::empty());
        let exit = graph.add_exit_block();
        graph.add_edge(entry, b1);
        graph.add_edge(b1, b2);
        graph.add_edge(b1, join);
        graph.add_edge(b2, join);
        graph.add_edge(join, exit);
        terminate(&mut graph, entry, Op::Goto);
        terminate(&mut graph, b1, Op::If);
        terminate(&mut graph, b2, Op::Goto);
        terminate(&mut graph, join, Op::ReturnVoid);
        terminate(&mut graph, exit, Op::Exit);
        graph.analyze()?;

        let split = graph.block(b1).successors()[1];
        assert_ne!(split, join);
        assert_eq!(graph.block(split).successors(), &[join]);
        assert_eq!(graph.block(join).predecessors(), &[split, b2]);
        Ok(())
    }

    #[test]
    fn test_unreachable_blocks_removed() -> Result<()> {
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let entry = graph.entry();
        let body = graph.add_block(Some(0), BlockFlags::empty());
        let dead = graph.add_block(Some(2), BlockFlags::empty());
        let exit = graph.add_exit_block();
        graph.add_edge(entry, body);
        graph.add_edge(body, exit);
        graph.add_edge(dead, exit);
        terminate(&mut graph, entry, Op::Goto);
        terminate(&mut graph, body, Op::ReturnVoid);
        terminate(&mut graph, dead, Op::ReturnVoid);
        terminate(&mut graph, exit, Op::Exit);
        graph.analyze()?;

        assert!(graph.block(dead).is_removed());
        assert_eq!(graph.block(exit).predecessors(), &[body]);
        assert_eq!(graph.reverse_post_order(), &[entry, body, exit]);
        Ok(())
    }

    #[test]
    fn test_catch_loop_rejected() {
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let entry = graph.entry();
        let handler = graph.add_block(Some(4), BlockFlags::empty());
        graph.block_mut(handler).try_catch = Some(TryCatchInfo::Catch { type_index: None });
        graph.add_edge(entry, handler);
        graph.add_edge(handler, handler);
        terminate(&mut graph, entry, Op::Goto);
        terminate(&mut graph, handler, Op::Goto);
        assert!(matches!(graph.analyze(), Err(Error::ThrowCatchLoop { offset: 4 })));
    }

    #[test]
    fn test_try_membership() -> Result<()> {
        let mut graph = MethodGraph::new(0, 1, 0, 0);
        let entry = graph.entry();
        let enter = graph.add_block(Some(0), BlockFlags::TRY_BOUNDARY | BlockFlags::SYNTHETIC);
        let body = graph.add_block(Some(0), BlockFlags::empty());
        let leave = graph.add_block(Some(2), BlockFlags::TRY_BOUNDARY | BlockFlags::SYNTHETIC);
        let handler = graph.add_block(Some(4), BlockFlags::empty());
        let after = graph.add_block(Some(2), BlockFlags::empty());
        let exit = graph.add_exit_block();
        graph.block_mut(handler).try_catch = Some(TryCatchInfo::Catch { type_index: None });
        graph.add_edge(entry, enter);
        graph.add_edge(enter, body);
        graph.add_edge(enter, handler);
        graph.add_edge(body, leave);
        graph.add_edge(leave, after);
        graph.add_edge(leave, handler);
        graph.add_edge(after, exit);
        graph.add_edge(handler, exit);
        terminate(&mut graph, entry, Op::Goto);
        terminate(&mut graph, enter, Op::TryBoundary { kind: TryBoundaryKind::Entry });
        terminate(&mut graph, body, Op::Goto);
        terminate(&mut graph, leave, Op::TryBoundary { kind: TryBoundaryKind::Exit });
        terminate(&mut graph, after, Op::ReturnVoid);
        terminate(&mut graph, handler, Op::ReturnVoid);
        terminate(&mut graph, exit, Op::Exit);
        graph.analyze()?;

        assert_eq!(graph.block(body).try_entry(), Some(enter));
        assert_eq!(graph.block(leave).try_entry(), Some(enter));
        assert_eq!(graph.block(after).try_catch, None);
        assert_eq!(graph.block(enter).try_catch, None);
        assert!(graph.block(handler).is_catch_block());
        Ok(())
    }
}
