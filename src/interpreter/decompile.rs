//! Reconstruction of source text from the compiled stream

use super::Interpreter;
use crate::consts::{CAST_TOKEN, CONST_TOKEN, READ_TOKEN, WRITE_TOKEN};
use crate::conv::format_value;
use crate::error::Error;

use itertools::Itertools;

impl Interpreter<'_> {
    /// Walks the code stream and reconstructs a program that recompiles to
    /// the same code stream and data area.
    ///
    /// READ operands below the variable region decompile to the `CONST`
    /// statement they came from, with the stored value rendered in its
    /// round-trippable text form.
    pub fn decompile(&self) -> Result<String, Error> {
        self.decompile_inner(false)
    }

    /// Like [`decompile`](Self::decompile), with each opcode's typed arity
    /// sketch appended. Informational only; the sketch does not re-parse.
    pub fn decompile_with_types(&self) -> Result<String, Error> {
        self.decompile_inner(true)
    }

    fn decompile_inner(&self, show_types: bool) -> Result<String, Error> {
        let mut out = String::new();
        let mut ptr = 0usize;

        while ptr < self.code.len() {
            let pcode = self.code[ptr];
            ptr += 1;
            let record = self.registry.record(pcode).ok_or_else(|| {
                Error::internal_setup(format!("no function record for opcode {pcode}"))
            })?;

            match record.name() {
                READ_TOKEN | WRITE_TOKEN => {
                    let location = *self.code.get(ptr).ok_or_else(|| {
                        Error::internal_setup("code stream ends inside an instruction")
                    })?;
                    ptr += 1;
                    let var = self.find_variable_at(location).ok_or_else(|| {
                        Error::unsupported_feature(format!("no variable or constant @ {location}"))
                    })?;
                    if record.name() == READ_TOKEN && location < self.start_of_variables {
                        // reads below the variable region are literals
                        let td = var.type_descriptor();
                        let value = format_value(td, &self.data[usize::from(location)..])
                            .ok_or_else(|| {
                                Error::unsupported_feature(format!(
                                    "constant @ {location} has no text form"
                                ))
                            })?;
                        out.push_str(&format!("{CONST_TOKEN} {td} {value}"));
                    } else {
                        out.push_str(&format!("{} {}", record.name(), var.name()));
                    }
                }
                CAST_TOKEN => match record.outputs().first() {
                    Some(td) => out.push_str(&format!("{CAST_TOKEN} {td}")),
                    None => out.push_str(CAST_TOKEN),
                },
                name => out.push_str(name),
            }

            if show_types {
                out.push_str(&format!(
                    " ({}",
                    record.inputs().iter().map(ToString::to_string).join(",")
                ));
                if !record.outputs().is_empty() {
                    out.push_str(&format!(
                        " => {}",
                        record.outputs().iter().map(ToString::to_string).join(",")
                    ));
                }
                out.push(')');
            }
            out.push('\n');
        }

        Ok(out)
    }
}
