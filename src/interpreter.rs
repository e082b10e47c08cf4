//! [`Interpreter`] implementation

use crate::consts::{CodeElement, DataAddress};
use crate::error::{Error, Flags};
use crate::registry::{standard_registry, Registry};
use crate::types::Scalar;

mod compile;
mod decompile;
mod execute;
mod variables;

pub use execute::ExecutionMode;
pub use variables::VariableInformation;

/// RPN expression virtual machine.
///
/// Usage is two-phase: [`extract_variables`] discovers the program's inputs,
/// outputs and constants, the caller assigns types to them, and [`compile`]
/// turns the text into a flat opcode stream plus a typed data area.
/// [`execute`] then runs the stream against the current input values.
///
/// One instance is owned by one caller at a time; there is no internal
/// locking, and concurrent use of the same instance is undefined.
///
/// [`extract_variables`]: Interpreter::extract_variables
/// [`compile`]: Interpreter::compile
/// [`execute`]: Interpreter::execute
pub struct Interpreter<'r> {
    registry: &'r Registry,
    pub(crate) input_variables: Vec<VariableInformation>,
    pub(crate) output_variables: Vec<VariableInformation>,
    pub(crate) code: Vec<CodeElement>,
    pub(crate) data: Vec<u8>,
    pub(crate) stack: Vec<u8>,
    pub(crate) stack_ptr: usize,
    pub(crate) code_ptr: usize,
    pub(crate) start_of_variables: DataAddress,
    pub(crate) max_data_stack: usize,
    pub(crate) runtime_flags: Flags,
    pub(crate) halted: bool,
}

impl Interpreter<'static> {
    /// Interpreter backed by the standard opcode set.
    pub fn new() -> Self {
        Self::with_registry(standard_registry())
    }
}

impl Default for Interpreter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Interpreter<'r> {
    /// Interpreter backed by a caller-assembled registry. Registration must
    /// be over before the first compile; the registry is read-only from
    /// here on.
    pub fn with_registry(registry: &'r Registry) -> Self {
        Self {
            registry,
            input_variables: Vec::new(),
            output_variables: Vec::new(),
            code: Vec::new(),
            data: Vec::new(),
            stack: Vec::new(),
            stack_ptr: 0,
            code_ptr: 0,
            start_of_variables: 0,
            max_data_stack: 0,
            runtime_flags: Flags::empty(),
            halted: false,
        }
    }

    /// The registry this interpreter dispatches through.
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// The compiled code stream.
    pub fn code(&self) -> &[CodeElement] {
        &self.code
    }

    /// The data area: constants, then inputs, then outputs.
    pub fn data_area(&self) -> &[u8] {
        &self.data
    }

    /// Bytes of the constant region at the front of the data area.
    pub fn size_of_constants(&self) -> usize {
        usize::from(self.start_of_variables)
    }

    /// Elements in the compiled code stream.
    pub fn size_of_code(&self) -> usize {
        self.code.len()
    }

    /// Byte capacity of the value stack, the compile-time high-water mark.
    pub fn size_of_stack(&self) -> usize {
        self.max_data_stack
    }

    /// Flags accumulated by the last execution.
    pub const fn runtime_flags(&self) -> Flags {
        self.runtime_flags
    }

    /* Value-stack and data-area primitives. Registered opcode
     * implementations are written against this surface. */

    /// Pops one scalar off the value stack.
    pub fn pop<T: Scalar>(&mut self) -> T {
        self.stack_ptr -= T::SIZE;
        T::load(&self.stack[self.stack_ptr..])
    }

    /// Pushes one scalar onto the value stack.
    pub fn push<T: Scalar>(&mut self, value: T) {
        value.store(&mut self.stack[self.stack_ptr..]);
        self.stack_ptr += T::SIZE;
    }

    /// Fetches the next element of the code stream.
    pub fn fetch(&mut self) -> CodeElement {
        let element = self.code[self.code_ptr];
        self.code_ptr += 1;
        element
    }

    /// Loads a scalar from the data area.
    pub fn load_data<T: Scalar>(&self, location: DataAddress) -> T {
        T::load(&self.data[usize::from(location)..])
    }

    /// Stores a scalar into the data area.
    pub fn store_data<T: Scalar>(&mut self, location: DataAddress, value: T) {
        value.store(&mut self.data[usize::from(location)..]);
    }

    /// Accumulates run-time error flags. Safe and Debug execution stop at
    /// the next opcode boundary when a halting flag arrives; Fast execution
    /// carries the set to the end.
    pub fn raise(&mut self, flags: Flags) {
        self.runtime_flags |= flags;
    }

    /* Typed access to compiled variables. */

    /// Sets the current value of an input variable.
    pub fn set_input<T: Scalar>(&mut self, name: &str, value: T) -> Result<(), Error> {
        let location = self.typed_location::<T>(name, false)?;
        self.store_data(location, value);
        Ok(())
    }

    /// Current value of an input variable.
    pub fn input<T: Scalar>(&self, name: &str) -> Result<T, Error> {
        let location = self.typed_location::<T>(name, false)?;
        Ok(self.load_data(location))
    }

    /// Current value of an output variable.
    pub fn output<T: Scalar>(&self, name: &str) -> Result<T, Error> {
        let location = self.typed_location::<T>(name, true)?;
        Ok(self.load_data(location))
    }

    fn typed_location<T: Scalar>(&self, name: &str, output: bool) -> Result<DataAddress, Error> {
        let var = if output {
            self.find_output(name).map(|i| &self.output_variables[i])
        } else {
            self.find_input(name).map(|i| &self.input_variables[i])
        };
        let var =
            var.ok_or_else(|| Error::unsupported_feature(format!("variable {name} not found")))?;
        if var.type_descriptor() != T::DESCRIPTOR {
            return Err(Error::parameters(format!(
                "variable {name} is {}, not {}",
                var.type_descriptor(),
                T::DESCRIPTOR
            )));
        }
        var.location()
            .filter(|location| usize::from(*location) + T::SIZE <= self.data.len())
            .ok_or_else(|| {
                Error::new(
                    Flags::NOT_COMPLETED,
                    format!("variable {name} has no storage yet; compile first"),
                )
            })
    }
}
