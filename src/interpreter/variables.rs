//! Variable discovery and bookkeeping

use super::Interpreter;
use crate::consts::{DataAddress, CONST_TOKEN, READ_TOKEN, UNALLOCATED, WRITE_TOKEN};
use crate::error::Error;
use crate::types::TypeDescriptor;

use tracing::debug;

/// Per-variable record: name, type, and byte location in the data area.
#[derive(Debug, Clone)]
pub struct VariableInformation {
    pub(crate) name: String,
    pub(crate) td: TypeDescriptor,
    pub(crate) location: DataAddress,
    pub(crate) used: bool,
}

impl VariableInformation {
    fn untyped(name: &str) -> Self {
        Self {
            name: name.into(),
            td: TypeDescriptor::INVALID,
            location: UNALLOCATED,
            used: false,
        }
    }

    fn constant(name: String, td: TypeDescriptor, location: DataAddress) -> Self {
        Self {
            name,
            td,
            location,
            used: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_descriptor(&self) -> TypeDescriptor {
        self.td
    }

    /// Byte offset in the data area, once assigned by compilation.
    pub fn location(&self) -> Option<DataAddress> {
        (self.location != UNALLOCATED).then_some(self.location)
    }

    /// True for an output the compiled program writes before reading.
    pub fn is_written(&self) -> bool {
        self.used
    }
}

/// One lexed statement: a command plus up to two parameters.
pub(crate) struct Statement<'a> {
    pub command: &'a str,
    pub param1: Option<&'a str>,
    pub param2: Option<&'a str>,
}

/// Splits a program into statements: one per line, tokens separated by runs
/// of space, tab or comma. Blank lines and `#` comment lines are skipped.
pub(crate) fn statements(code: &str) -> impl Iterator<Item = Statement<'_>> {
    code.lines().filter_map(|line| {
        let mut tokens = line
            .split(|c: char| c == ' ' || c == '\t' || c == ',')
            .filter(|t| !t.is_empty());
        let command = tokens.next()?;
        if command.starts_with('#') {
            return None;
        }
        Some(Statement {
            command,
            param1: tokens.next(),
            param2: tokens.next(),
        })
    })
}

/// Rounds `address` up to the natural alignment of a cell of `alignment`
/// bytes.
pub(crate) fn align_address(address: u32, alignment: usize) -> u32 {
    let alignment = alignment.max(1) as u32;
    address + (alignment - address % alignment) % alignment
}

/// Narrows an address to the data-area range. The maximum value is reserved
/// as the unallocated sentinel.
pub(crate) fn address(value: u32) -> Result<DataAddress, Error> {
    DataAddress::try_from(value)
        .ok()
        .filter(|address| *address != UNALLOCATED)
        .ok_or_else(|| Error::fatal("data area exceeds the addressable range"))
}

impl Interpreter<'_> {
    pub(crate) fn find_input(&self, name: &str) -> Option<usize> {
        self.input_variables.iter().position(|v| v.name == name)
    }

    pub(crate) fn find_output(&self, name: &str) -> Option<usize> {
        self.output_variables.iter().position(|v| v.name == name)
    }

    /// Looks a variable up by data-area address, outputs first.
    pub(crate) fn find_variable_at(&self, location: DataAddress) -> Option<&VariableInformation> {
        self.output_variables
            .iter()
            .find(|v| v.location == location)
            .or_else(|| self.input_variables.iter().find(|v| v.location == location))
    }

    /// Input variable by position, in discovery order. Constants surface
    /// here under their synthesised `Constant@<offset>` names.
    pub fn browse_input_variable(&self, index: usize) -> Option<&VariableInformation> {
        self.input_variables.get(index)
    }

    /// Output variable by position, in discovery order.
    pub fn browse_output_variable(&self, index: usize) -> Option<&VariableInformation> {
        self.output_variables.get(index)
    }

    /// Assigns the type of an input surfaced by
    /// [`extract_variables`](Interpreter::extract_variables). Constants'
    /// types are fixed by their declaration and need no assignment.
    pub fn set_input_type(&mut self, name: &str, td: TypeDescriptor) -> Result<(), Error> {
        let index = self.find_input(name).ok_or_else(|| {
            Error::unsupported_feature(format!("input variable {name} not found"))
        })?;
        self.input_variables[index].td = td;
        Ok(())
    }

    /// Assigns the type of an output surfaced by
    /// [`extract_variables`](Interpreter::extract_variables).
    pub fn set_output_type(&mut self, name: &str, td: TypeDescriptor) -> Result<(), Error> {
        let index = self.find_output(name).ok_or_else(|| {
            Error::unsupported_feature(format!("output variable {name} not found"))
        })?;
        self.output_variables[index].td = td;
        Ok(())
    }

    /// First pass: scans the program and registers inputs, outputs and
    /// constants.
    ///
    /// A READ of a name some WRITE declares resolves to that output, so no
    /// input is registered for it. Duplicate READs are tolerated silently;
    /// duplicate WRITEs are an error (outputs are single-assignment). Each
    /// CONST synthesises a hidden input named `Constant@<offset>` whose
    /// value is materialised during compilation.
    pub fn extract_variables(&mut self, code: &str) -> Result<(), Error> {
        self.input_variables.clear();
        self.output_variables.clear();
        self.start_of_variables = 0;

        let mut next_constant: u32 = 0;

        for statement in statements(code) {
            match statement.command {
                READ_TOKEN => {
                    let name = statement
                        .param1
                        .ok_or_else(|| Error::invalid_operation("READ without variable name"))?;
                    if self.find_output(name).is_none() && self.find_input(name).is_none() {
                        self.input_variables.push(VariableInformation::untyped(name));
                    }
                }
                WRITE_TOKEN => {
                    let name = statement
                        .param1
                        .ok_or_else(|| Error::invalid_operation("WRITE without variable name"))?;
                    if self.find_output(name).is_some() {
                        return Err(Error::invalid_operation(format!(
                            "output variable {name} already registered"
                        )));
                    }
                    self.output_variables.push(VariableInformation::untyped(name));
                }
                CONST_TOKEN => {
                    let type_name = statement
                        .param1
                        .ok_or_else(|| Error::invalid_operation("CONST without type name"))?;
                    let td: TypeDescriptor = type_name.parse()?;
                    next_constant = align_address(next_constant, td.storage_size());
                    let location = address(next_constant)?;
                    self.input_variables.push(VariableInformation::constant(
                        format!("Constant@{location}"),
                        td,
                        location,
                    ));
                    next_constant += td.storage_size() as u32;
                }
                _ => {}
            }
        }

        self.start_of_variables = address(next_constant)?;
        debug!(
            constants = usize::from(self.start_of_variables),
            inputs = self.input_variables.len(),
            outputs = self.output_variables.len(),
            "variables extracted"
        );
        Ok(())
    }
}
