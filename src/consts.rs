//! VM parameters

/// Element of the code stream. By position it is either an index into the
/// function registry or a byte offset into the data area.
pub type CodeElement = u16;

/// Byte offset into the runtime data area.
pub type DataAddress = u16;

/* REGISTRY */

/// Maximum number of records the function registry will accept.
pub const MAX_FUNCTIONS: usize = 16384;

/// Depth of the compile-time operand type stack. Programs with deeper operand
/// nesting fail to compile.
pub const TYPE_STACK_DEPTH: usize = 32;

/* CODE STREAM */

/// Sentinel meaning "no operand follows this opcode".
pub const CODE_SENTINEL: CodeElement = CodeElement::MAX;

/// Sentinel location of a variable that has not been assigned a data-area
/// address yet.
pub const UNALLOCATED: DataAddress = DataAddress::MAX;

/* RESERVED MNEMONICS */

/// Loads a variable or constant onto the value stack.
pub const READ_TOKEN: &str = "READ";

/// Stores the value-stack top into an output variable.
pub const WRITE_TOKEN: &str = "WRITE";

/// Declares a typed literal; compiles into a read of the constant area.
pub const CONST_TOKEN: &str = "CONST";

/// Converts the value-stack top to another numeric type.
pub const CAST_TOKEN: &str = "CAST";

/* PAGED HEAP */

/// Default capacity of a single memory page, in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 1024;
