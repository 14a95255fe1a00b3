// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # ssagraph
//!
//! Control-flow graph and single-pass SSA construction for register-based
//! method bytecode.
//!
//! Given one decoded method body, `ssagraph` builds a [`MethodGraph`]: basic
//! blocks with explicit try/catch boundaries, and SSA values with phis at merge
//! points, typed equivalents for registers the bytecode reuses across types,
//! and environment snapshots at every instruction that can leave compiled code.
//!
//! ## Features
//!
//! - **Block building** - block starts, fall-through and branch edges, switch
//!   lowering, synthetic try boundary blocks and catch landing pads
//! - **CFG analysis** - dead blocks, critical edges, loop pre-headers, reverse
//!   post order, dominators, loops and try membership
//! - **Single-pass SSA** - one walk in reverse post order, with loop header phis
//!   completed afterwards and catch phis fed by every throwing site
//! - **Finalization** - phi typing, ambiguous array accesses, null constants,
//!   dead and redundant phis, redundant string allocations
//! - **Injected resolution** - a [`Resolver`] trait object per build; anything it
//!   cannot resolve becomes an unresolved operation, never an error
//! - **Parallel builds** - independent methods build on the rayon pool through
//!   [`build_methods`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ssagraph::prelude::*;
//!
//! let mut symbols = SymbolTable::default();
//! let method = symbols.add_method("LMath;", "max", Signature::new("I", &["I", "I"]));
//!
//! let mut asm = MethodAssembler::new(2, 2);
//! asm.branch(Opcode::IfGe, &[0, 1], "first")?;
//! asm.ret(Opcode::Return, 1)?;
//! asm.label("first")?;
//! asm.ret(Opcode::Return, 0)?;
//! let code = asm.finish()?;
//!
//! let unit = CompilationUnit::new(&symbols, method, &code).with_static(true);
//! let resolver = MapResolver::from_symbols(&symbols);
//! let graph = GraphBuilder::new(&unit, &resolver).build()?;
//! println!("{graph}");
//! # Ok::<(), ssagraph::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`types`] - The closed set of value types
//! - [`bytecode`] - Decoded instructions, method bodies and symbol tables
//! - [`resolver`] - Symbol resolution collaborator
//! - [`ir`] - The method graph, its blocks, values and operations
//! - [`builder`] - Block builder, instruction builder and the build driver
//! - [`ssa`] - SSA finalization
//! - [`config`] - Build configuration, budgets and statistics
//!
//! ## Error Handling
//!
//! Every build returns [`Result`]. A rejected method never yields a partial
//! graph; see [`Error`] for the categories.
//!
//! ## Logging
//!
//! Phases log through the [`log`] facade: `debug` per phase and method, `trace`
//! for individual finalizer decisions, `warn` when the driver rejects a method.
//! The library installs no logger.

#[macro_use]
pub(crate) mod error;

pub mod builder;
pub mod bytecode;
pub mod config;
pub mod ir;
pub mod prelude;
pub mod resolver;
pub mod ssa;
pub mod types;
pub mod utils;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,ignore
/// use ssagraph::{GraphBuilder, MethodGraph, Result};
///
/// fn build(builder: GraphBuilder<'_>) -> Result<MethodGraph> {
///     builder.build()
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `ssagraph` Error type
///
/// See [`error::Error`] for the categories of rejected builds.
pub use error::Error;

pub use builder::{build_methods, GraphBuilder};
pub use bytecode::{CodeItem, CompilationUnit, MethodAssembler, SymbolTable};
pub use config::{BuildStats, BuilderConfig, CompilationBudget};
pub use ir::{BlockId, MethodGraph, ValueId};
pub use resolver::{CachedResolver, MapResolver, Resolver, UnresolvedResolver};
pub use ssa::SsaFinalizer;
pub use types::DataType;
