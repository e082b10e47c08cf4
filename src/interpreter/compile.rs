//! Translation of statements into the executable stream

use super::variables::{address, align_address, statements};
use super::Interpreter;
use crate::consts::{
    DataAddress, CAST_TOKEN, CODE_SENTINEL, CONST_TOKEN, READ_TOKEN, UNALLOCATED, WRITE_TOKEN,
};
use crate::conv::parse_literal;
use crate::error::{Error, Flags};
use crate::registry::TypeStack;
use crate::types::TypeDescriptor;

use itertools::Itertools;
use tracing::debug;

impl Interpreter<'_> {
    /// Second pass: assigns data-area addresses, materialises constants,
    /// and translates the program into the opcode stream, type-checking
    /// every statement against the registry.
    ///
    /// A successful compile consumes the operand type stack completely; a
    /// leftover operand means the program is ill-formed. The code stream,
    /// data area and stack sizing survive that final check, so diagnostic
    /// execution of an incomplete program remains possible.
    pub fn compile(&mut self, code: &str) -> Result<(), Error> {
        let mut next_address = u32::from(self.start_of_variables);

        for var in &mut self.input_variables {
            if !var.td.is_numeric() {
                return Err(Error::unsupported_feature(format!(
                    "input variable {} has incompatible non-numeric type",
                    var.name
                )));
            }
            if var.location == UNALLOCATED {
                next_address = align_address(next_address, var.td.storage_size());
                var.location = address(next_address)?;
                next_address += var.td.storage_size() as u32;
            } else {
                // constants and recompiled inputs keep their slot
                next_address =
                    next_address.max(u32::from(var.location) + var.td.storage_size() as u32);
            }
        }
        for var in &mut self.output_variables {
            if !var.td.is_numeric() {
                return Err(Error::unsupported_feature(format!(
                    "output variable {} has incompatible non-numeric type",
                    var.name
                )));
            }
            next_address = align_address(next_address, var.td.storage_size());
            var.location = address(next_address)?;
            next_address += var.td.storage_size() as u32;
            var.used = false;
        }

        self.data = vec![0; next_address as usize];
        self.code.clear();
        self.stack.clear();
        self.stack_ptr = 0;
        self.code_ptr = 0;

        let registry = self.registry;
        let mut type_stack = TypeStack::default();
        let mut data_stack_size = 0usize;
        let mut max_data_stack = 0usize;
        let mut next_constant: u32 = 0;

        for statement in statements(code) {
            let mut command = statement.command;
            let mut operand = CODE_SENTINEL;
            let mut match_output = false;

            match command {
                CAST_TOKEN => {
                    let type_name = statement
                        .param1
                        .ok_or_else(|| Error::invalid_operation("CAST without type name"))?;
                    let td: TypeDescriptor = type_name.parse()?;
                    type_stack.push(td)?;
                    match_output = true;
                }
                WRITE_TOKEN => {
                    let name = statement
                        .param1
                        .ok_or_else(|| Error::invalid_operation("WRITE without variable name"))?;
                    let index = self.find_output(name).ok_or_else(|| {
                        Error::unsupported_feature(format!("output variable {name} not found"))
                    })?;
                    let var = &mut self.output_variables[index];
                    numeric_check(name, var.td)?;
                    let td = var.td;
                    operand = var.location;
                    var.used = true;
                    type_stack.push(td)?;
                    match_output = true;
                }
                READ_TOKEN => {
                    let name = statement
                        .param1
                        .ok_or_else(|| Error::invalid_operation("READ without variable name"))?;
                    let (td, location) = self.resolve_read(name)?;
                    type_stack.push(td)?;
                    match_output = true;
                    operand = location;
                }
                CONST_TOKEN => {
                    let type_name = statement.param1.ok_or_else(|| {
                        Error::invalid_operation("CONST without type name and value")
                    })?;
                    let literal = statement.param2.ok_or_else(|| {
                        Error::invalid_operation("CONST without type name and value")
                    })?;
                    let td: TypeDescriptor = type_name.parse()?;
                    next_constant = align_address(next_constant, td.storage_size());
                    let end = next_constant as usize + td.storage_size();
                    if end > usize::from(self.start_of_variables) {
                        return Err(Error::internal_setup(
                            "constant area overflow: compiled text differs from the extracted program",
                        ));
                    }
                    parse_literal(td, literal, &mut self.data[next_constant as usize..end])?;
                    type_stack.push(td)?;
                    match_output = true;
                    operand = next_constant as DataAddress;
                    next_constant += td.storage_size() as u32;
                    // the emitted command is a READ from the constant area
                    command = READ_TOKEN;
                }
                _ => {}
            }

            let pcode = registry
                .find(command, &mut type_stack, match_output, &mut data_stack_size)?
                .ok_or_else(|| {
                    let scan = 2 + usize::from(match_output);
                    let types = (0..scan)
                        .map(|depth| match type_stack.peek(depth) {
                            Some(td) => td.to_string(),
                            None => "-".into(),
                        })
                        .join("|");
                    Error::unsupported_feature(format!("command {command}([{types}]) not found"))
                })?;

            max_data_stack = max_data_stack.max(data_stack_size);

            if self.code.len() + 2 > usize::from(CODE_SENTINEL) {
                return Err(Error::fatal("failed to add instruction to code"));
            }
            self.code.push(pcode);
            if operand != CODE_SENTINEL {
                self.code.push(operand);
            }
        }

        self.stack = vec![0; max_data_stack];
        self.max_data_stack = max_data_stack;

        debug!(
            code = self.code.len(),
            data = self.data.len(),
            stack = max_data_stack,
            "program compiled"
        );

        if !type_stack.is_empty() {
            return Err(Error::internal_setup(format!(
                "operation sequence is incomplete: {} data left in stack",
                type_stack.len()
            )));
        }
        Ok(())
    }

    fn resolve_read(&self, name: &str) -> Result<(TypeDescriptor, DataAddress), Error> {
        // an output the program has already written shadows any input
        if let Some(index) = self.find_output(name) {
            let var = &self.output_variables[index];
            if var.used {
                numeric_check(name, var.td)?;
                return Ok((var.td, var.location));
            }
            if self.find_input(name).is_none() {
                return Err(Error::new(
                    Flags::NOT_COMPLETED,
                    format!("output variable {name} read before being written"),
                ));
            }
        }
        let index = self.find_input(name).ok_or_else(|| {
            Error::unsupported_feature(format!("input variable {name} not found"))
        })?;
        let var = &self.input_variables[index];
        numeric_check(name, var.td)?;
        Ok((var.td, var.location))
    }
}

fn numeric_check(name: &str, td: TypeDescriptor) -> Result<(), Error> {
    if td.is_numeric() {
        Ok(())
    } else {
        Err(Error::unsupported_feature(format!(
            "variable {name} does not have a numeric supported format"
        )))
    }
}
