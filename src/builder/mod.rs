//! Graph construction from method bytecode.
//!
//! [`GraphBuilder`] drives the phases that turn one [`CompilationUnit`] into a
//! [`MethodGraph`] in SSA form:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  BlockBuilder        block starts, edges, try boundaries   │
//! │  CompilationBudget   caller-side size policy (optional)    │
//! │  MethodGraph::analyze                                      │
//! │                      back edges, dead blocks, critical     │
//! │                      edges, pre-headers, RPO, dominators,  │
//! │                      loops, try membership                 │
//! │  InstructionBuilder  locals, phis, one node per operation  │
//! │  SsaFinalizer        phi typing, ambiguous arrays, cleanup │
//! │  checker::verify     structural check (optional)           │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A method without a body gets a minimal graph that calls the method itself.
//! Builds of different methods are independent; [`build_methods`] runs them on
//! the rayon pool with a shared resolver.
//!
//! # Examples
//!
//! ```rust,ignore
//! use ssagraph::prelude::*;
//!
//! let mut symbols = SymbolTable::default();
//! let method = symbols.add_method("LMath;", "twice", Signature::new("I", &["I"]));
//! let mut asm = MethodAssembler::new(2, 1);
//! asm.emit(Opcode::AddInt, Operands::ThreeReg { a: 0, b: 1, c: 1 })?;
//! asm.ret(Opcode::Return, 0)?;
//! let code = asm.finish()?;
//!
//! let unit = CompilationUnit::new(&symbols, method, &code).with_static(true);
//! let graph = GraphBuilder::new(&unit, &UnresolvedResolver).build()?;
//! println!("{graph}");
//! ```

mod blocks;
mod instructions;
mod translate;

use rayon::prelude::*;

use crate::{
    bytecode::CompilationUnit,
    config::{BuildStats, BuilderConfig},
    ir::{checker, MethodGraph},
    resolver::Resolver,
    ssa::SsaFinalizer,
    Result,
};

pub use blocks::{BlockBuilder, BlockMap};
pub use instructions::InstructionBuilder;

/// Builds the SSA graph of one method.
pub struct GraphBuilder<'a> {
    unit: &'a CompilationUnit<'a>,
    resolver: &'a dyn Resolver,
    config: BuilderConfig,
}

impl<'a> GraphBuilder<'a> {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new(unit: &'a CompilationUnit<'a>, resolver: &'a dyn Resolver) -> Self {
        GraphBuilder {
            unit,
            resolver,
            config: BuilderConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs every phase and returns the finished graph.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidBytecode`] for malformed bodies
    /// - [`crate::Error::UnsupportedInstruction`] for opcodes without a translation
    /// - [`crate::Error::ThrowCatchLoop`] when a handler is a loop header
    /// - [`crate::Error::SizeBudgetExceeded`] when the configured budget rejects the method
    /// - [`crate::Error::GraphError`] when verification is enabled and fails
    pub fn build(self) -> Result<MethodGraph> {
        self.build_with_stats().map(|(graph, _)| graph)
    }

    /// Like [`GraphBuilder::build`], also returning the measurements of the build.
    ///
    /// # Errors
    ///
    /// See [`GraphBuilder::build`].
    pub fn build_with_stats(self) -> Result<(MethodGraph, BuildStats)> {
        let method = self.unit.method_index;
        self.run().map_err(|error| {
            log::warn!("method {method}: not built: {error}");
            error
        })
    }

    fn run(self) -> Result<(MethodGraph, BuildStats)> {
        let unit = *self.unit;
        let mut ssa = SsaFinalizer::new(unit.symbols, self.config.debuggable);

        let (mut graph, mut stats) = match unit.code {
            Some(code) => {
                let mut graph = MethodGraph::new(unit.method_index, code.registers, code.ins, code.outs);
                let map = BlockBuilder::new(&mut graph, code).build()?;
                let mut stats = map.stats;
                stats.blocks = graph.block_count();
                if let Some(budget) = &self.config.budget {
                    budget.check(&stats)?;
                }
                graph.analyze()?;
                InstructionBuilder::new(&mut graph, &mut ssa, unit, self.resolver).build(&map)?;
                (graph, stats)
            }
            None => {
                let method = unit.method()?;
                let registers = method.signature.parameter_registers() + usize::from(!unit.is_static);
                let registers = u16::try_from(registers)
                    .map_err(|_| invalid_bytecode!("method {} has too many parameters", unit.method_index))?;
                let mut graph = MethodGraph::new(unit.method_index, registers, registers, registers);
                let body = BlockBuilder::build_minimal(&mut graph);
                graph.analyze()?;
                InstructionBuilder::new(&mut graph, &mut ssa, unit, self.resolver).build_minimal(body)?;
                (graph, BuildStats::default())
            }
        };

        ssa.run(&mut graph)?;

        stats.blocks = graph.block_count();
        stats.values = graph.values().filter(|v| v.is_in_graph()).count();
        stats.phis = graph.phi_count();
        if self.config.verify {
            checker::verify(&graph)?;
        }
        log::debug!(
            "method {}: built {} blocks, {} values, {} phis",
            unit.method_index,
            stats.blocks,
            stats.values,
            stats.phis
        );
        Ok((graph, stats))
    }
}

/// Builds many methods in parallel, one independent graph per unit.
///
/// Results are in input order. A rejected method does not affect the others.
pub fn build_methods(
    units: &[CompilationUnit<'_>],
    resolver: &dyn Resolver,
    config: &BuilderConfig,
) -> Vec<Result<MethodGraph>> {
    units
        .par_iter()
        .map(|unit| GraphBuilder::new(unit, resolver).with_config(config.clone()).build())
        .collect()
}
