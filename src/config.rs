//! Builder configuration, compilation budgets and build statistics.

use crate::{Error, Result};

/// Configuration of a graph build.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Keep values alive for debuggers: phis only used by environments are kept
    /// and redundant string allocations are not removed (default: false).
    pub debuggable: bool,

    /// Run the graph checker after the build (default: on in debug builds).
    pub verify: bool,

    /// Reject methods exceeding this budget before SSA construction (default: none).
    pub budget: Option<CompilationBudget>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            debuggable: false,
            verify: cfg!(debug_assertions),
            budget: None,
        }
    }
}

/// Caller-side policy on method sizes.
///
/// The builders only measure; rejecting is the budget's call. A method is
/// rejected when it exceeds the huge threshold, when it exceeds the large
/// threshold without any branch, or when it needs more blocks than allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilationBudget {
    /// Methods above this size are never compiled (default: 10000 code units).
    pub huge_method_code_units: u32,

    /// Branch-free methods above this size are not worth compiling (default: 600 code units).
    pub large_method_code_units: u32,

    /// Maximum number of blocks after block building (default: 65536).
    pub max_blocks: usize,
}

impl Default for CompilationBudget {
    fn default() -> Self {
        CompilationBudget {
            huge_method_code_units: 10_000,
            large_method_code_units: 600,
            max_blocks: 65_536,
        }
    }
}

impl CompilationBudget {
    /// Applies the budget to the measurements of a build.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeBudgetExceeded`] naming the exceeded limit.
    pub fn check(&self, stats: &BuildStats) -> Result<()> {
        if stats.code_units > self.huge_method_code_units {
            return Err(Error::SizeBudgetExceeded(format!(
                "huge method ({} code units)",
                stats.code_units
            )));
        }
        if stats.code_units > self.large_method_code_units && stats.branches == 0 {
            return Err(Error::SizeBudgetExceeded(format!(
                "large method without branches ({} code units)",
                stats.code_units
            )));
        }
        if stats.blocks > self.max_blocks {
            return Err(Error::SizeBudgetExceeded(format!(
                "{} blocks exceed the limit of {}",
                stats.blocks, self.max_blocks
            )));
        }
        Ok(())
    }
}

/// Measurements collected while building one method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Size of the body in code units
    pub code_units: u32,
    /// Number of bytecode instructions
    pub instructions: usize,
    /// Number of branch and switch instructions
    pub branches: usize,
    /// Number of live blocks in the final graph
    pub blocks: usize,
    /// Number of values in the final graph
    pub values: usize,
    /// Number of phis in the final graph
    pub phis: usize,
    /// Number of distinct catch handler addresses
    pub catch_handlers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_defaults() {
        let budget = CompilationBudget::default();
        let small = BuildStats {
            code_units: 20,
            ..Default::default()
        };
        assert!(budget.check(&small).is_ok());
    }

    #[test]
    fn test_budget_rejections() {
        let budget = CompilationBudget::default();
        let huge = BuildStats {
            code_units: 20_000,
            branches: 50,
            ..Default::default()
        };
        assert!(matches!(budget.check(&huge), Err(Error::SizeBudgetExceeded(_))));

        let straight = BuildStats {
            code_units: 700,
            ..Default::default()
        };
        assert!(budget.check(&straight).is_err());

        let branchy = BuildStats {
            code_units: 700,
            branches: 3,
            ..Default::default()
        };
        assert!(budget.check(&branchy).is_ok());
    }

    #[test]
    fn test_block_limit() {
        let budget = CompilationBudget {
            max_blocks: 4,
            ..Default::default()
        };
        let stats = BuildStats {
            blocks: 5,
            ..Default::default()
        };
        assert!(budget.check(&stats).unwrap_err().to_string().contains("blocks"));
    }
}
