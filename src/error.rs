use thiserror::Error;

use crate::bytecode::Opcode;

macro_rules! invalid_bytecode {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvalidBytecode {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidBytecode {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every way a method build can be rejected.
///
/// A build that returns an error never hands a partial graph downstream. The caller
/// is expected to record the method as skipped and fall back to an uncompiled path;
/// none of these conditions is process-fatal.
///
/// Resolution failures are not errors: a symbol the resolver cannot
/// resolve becomes an unresolved operation node (see
/// [`Resolution::Unresolved`](crate::resolver::Resolution::Unresolved)) and the
/// build continues.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::InvalidBytecode`] - Malformed control flow, operands or try table, or phi
///   types that cannot be reconciled
/// - [`Error::UnsupportedInstruction`] - Recognized opcode that the builder does not translate
/// - [`Error::ThrowCatchLoop`] - A catch handler that is also a loop header
///
/// ## Policy Errors
/// - [`Error::SizeBudgetExceeded`] - Rejected by a [`CompilationBudget`](crate::CompilationBudget)
///
/// ## Internal Errors
/// - [`Error::GraphError`] - The graph checker found a structural inconsistency
///
/// # Examples
///
/// ```rust,ignore
/// use ssagraph::{Error, GraphBuilder};
///
/// match GraphBuilder::new(&unit, &resolver).build() {
///     Ok(graph) => println!("{graph}"),
///     Err(Error::InvalidBytecode { message, file, line }) => {
///         eprintln!("rejected: {message} ({file}:{line})");
///     }
///     Err(e) => eprintln!("skipped: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The method body is malformed and no well-formed graph exists for it.
    ///
    /// Raised for branches to non-instruction offsets, malformed switch or
    /// array payloads, unbalanced try tables, non-contiguous wide call
    /// arguments, and phis whose inputs cannot be reconciled to one type.
    /// The error includes the source location of the rejecting check.
    ///
    /// # Fields
    ///
    /// * `message` - Description of what was malformed
    /// * `file` - Source file where the problem was detected
    /// * `line` - Source line where the problem was detected
    #[error("Invalid bytecode - {file}:{line}: {message}")]
    InvalidBytecode {
        /// The message describing the malformation
        message: String,
        /// The source file in which this error was raised
        file: &'static str,
        /// The source line in which this error was raised
        line: u32,
    },

    /// A recognized opcode that has no translation.
    #[error("Unsupported instruction '{opcode}' at offset {offset:#x}")]
    UnsupportedInstruction {
        /// The opcode that could not be translated
        opcode: Opcode,
        /// Offset of the instruction in code units
        offset: u32,
    },

    /// A catch handler is the header of a loop.
    ///
    /// Control would re-enter the handler through its own exceptional edge,
    /// which the SSA construction cannot express.
    #[error("Catch handler at offset {offset:#x} is a loop header")]
    ThrowCatchLoop {
        /// Offset of the offending handler
        offset: u32,
    },

    /// The method exceeds the caller's compilation budget.
    #[error("Size budget exceeded: {0}")]
    SizeBudgetExceeded(String),

    /// The graph checker found an inconsistency.
    ///
    /// This indicates a bug in the builder rather than bad input.
    #[error("{0}")]
    GraphError(String),
}
