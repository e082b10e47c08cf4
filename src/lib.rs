//! Compile-and-execute engine for typed RPN expression programs.
//!
//! The crate has two loosely coupled halves. The expression runtime turns a
//! stack-oriented textual program into a compact stream of opcode indices
//! and runs it with a tight dispatch loop, resolving every operation at
//! compile time against a process-wide table of typed opcode
//! implementations. The progressive type creator accepts scalars one at a
//! time from a streaming source and grows the result shape from scalar
//! through vector and matrix to sparse matrix over a paged heap.

pub mod consts;
pub mod conv;
pub mod error;
pub mod interpreter;
pub mod object;
pub mod page;
pub mod progressive;
pub mod registry;
pub mod types;

pub mod prelude {
    pub use crate::conv::SafeCast;
    pub use crate::error::{Error, Flags};
    pub use crate::interpreter::{ExecutionMode, Interpreter, VariableInformation};
    pub use crate::object::{Shape, TypedObject};
    pub use crate::page::MemoryPage;
    pub use crate::progressive::ProgressiveTypeCreator;
    pub use crate::registry::{standard, standard_registry, FunctionRecord, Registry, TypeStack};
    pub use crate::types::{Scalar, TypeDescriptor, TypeKind};
}
