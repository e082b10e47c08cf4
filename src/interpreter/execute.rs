//! Executors for the compiled stream

use super::Interpreter;
use crate::consts::{CodeElement, READ_TOKEN, WRITE_TOKEN};
use crate::conv::format_value;
use crate::error::{Error, Flags};
use crate::registry::FunctionRecord;
use crate::types::TypeDescriptor;

use std::io;
use tracing::warn;

/// Execution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Tight fetch-dispatch loop with no per-opcode checks; error flags
    /// accumulate and are reported once the stream is exhausted.
    Fast,
    /// Verifies the stack pointer after every opcode and stops on the first
    /// halting error. Advisory out-of-range flags (lossy conversions) do
    /// not stop the loop.
    Safe,
    /// Safe, plus a per-opcode trace rendered to the caller-supplied sink.
    Debug,
}

impl Interpreter<'_> {
    /// Runs the compiled program against the current input values.
    ///
    /// Outputs are not cleared on entry: a READ of an output produced by a
    /// previous execution observes the stale value. The sink is required in
    /// Debug mode and ignored otherwise; a blocking sink blocks execution.
    pub fn execute(
        &mut self,
        mode: ExecutionMode,
        mut sink: Option<&mut dyn io::Write>,
    ) -> Result<(), Error> {
        self.stack_ptr = 0;
        self.code_ptr = 0;
        self.runtime_flags = Flags::empty();
        self.halted = false;

        let registry = self.registry;
        match mode {
            ExecutionMode::Fast => {
                while self.code_ptr < self.code.len() {
                    let pcode = self.fetch();
                    let record = registry.record(pcode).ok_or_else(|| bad_opcode(pcode))?;
                    (record.op())(self);
                }
            }
            ExecutionMode::Safe => {
                while self.code_ptr < self.code.len() && !self.halted {
                    let pcode = self.fetch();
                    let record = registry.record(pcode).ok_or_else(|| bad_opcode(pcode))?;
                    (record.op())(self);
                    self.post_opcode_checks();
                }
                if self.code_ptr < self.code.len() {
                    self.runtime_flags |= Flags::NOT_COMPLETED;
                    warn!("code execution interrupted");
                }
            }
            ExecutionMode::Debug => {
                let sink = sink.as_deref_mut().ok_or_else(|| {
                    Error::parameters("debug mode requested without a trace sink")
                })?;
                self.execute_traced(sink)?;
            }
        }

        let mut context = String::from("execution error");
        if self.stack_ptr != 0 {
            self.runtime_flags |= Flags::INTERNAL_SETUP_ERROR;
            context = format!(
                "stack pointer not back to origin: {} bytes left",
                self.stack_ptr
            );
        }

        if self.runtime_flags.is_empty() {
            Ok(())
        } else {
            Err(Error::new(self.runtime_flags, context))
        }
    }

    /// Convenience wrapper for [`execute`](Self::execute) in Fast mode.
    pub fn execute_fast(&mut self) -> Result<(), Error> {
        self.execute(ExecutionMode::Fast, None)
    }

    fn post_opcode_checks(&mut self) {
        // the stack pointer may legitimately sit at the capacity boundary:
        // it points at the next byte to write
        if self.stack_ptr > self.stack.len() {
            self.runtime_flags |= Flags::OUT_OF_RANGE;
            self.halted = true;
        }
        if self.runtime_flags.is_halting() {
            self.halted = true;
        }
    }

    fn execute_traced(&mut self, sink: &mut dyn io::Write) -> Result<(), Error> {
        let registry = self.registry;
        sink_write(sink, "[line] - [stack] - [code] :: [mnemonic] inputs => outputs\n")?;

        let mut line = 1u32;
        while self.code_ptr < self.code.len() && !self.halted {
            let stack_offset = self.stack_ptr;
            let code_offset = self.code_ptr;
            let pcode = self.fetch();
            let record = registry.record(pcode).ok_or_else(|| bad_opcode(pcode))?;

            let mut text = format!(
                "{line} - {stack_offset} - {code_offset} :: {}",
                record.name()
            );
            self.render_operand_name(record, &mut text);
            if !record.inputs().is_empty() {
                text.push_str(&format!(" ({})", self.render_inputs(record)));
            }

            (record.op())(self);

            if !record.outputs().is_empty() {
                text.push_str(&format!(" => ({})", self.render_outputs(record)));
            }
            if !self.runtime_flags.is_empty() {
                text.push_str(" <ERROR>");
            }
            text.push('\n');
            sink_write(sink, &text)?;

            self.post_opcode_checks();
            line += 1;
        }

        if self.code_ptr < self.code.len() {
            self.runtime_flags |= Flags::NOT_COMPLETED;
            warn!("code execution interrupted");
        } else {
            sink_write(
                sink,
                &format!("{} - {} :: END\n", self.stack_ptr, self.code_ptr),
            )?;
        }
        Ok(())
    }

    /// Names the data-area operand of a READ/WRITE about to dispatch; the
    /// operand element has not been consumed yet.
    fn render_operand_name(&self, record: &FunctionRecord, text: &mut String) {
        if record.name() != READ_TOKEN && record.name() != WRITE_TOKEN {
            return;
        }
        match self
            .code
            .get(self.code_ptr)
            .and_then(|location| self.find_variable_at(*location))
        {
            Some(var) => {
                text.push(' ');
                text.push_str(var.name());
            }
            None => text.push_str(" ?"),
        }
    }

    /// Typed snapshot of the values the next dispatch will pop.
    fn render_inputs(&self, record: &FunctionRecord) -> String {
        let mut offset = self.stack_ptr;
        let mut parts = Vec::with_capacity(record.inputs().len());
        for td in record.inputs() {
            match offset.checked_sub(td.storage_size()) {
                Some(below) => {
                    offset = below;
                    parts.push(render_cell(*td, self.stack.get(offset..)));
                }
                None => parts.push(format!("({td})?")),
            }
        }
        parts.join(",")
    }

    /// Typed snapshot of the values the last dispatch pushed.
    fn render_outputs(&self, record: &FunctionRecord) -> String {
        let total: usize = record.outputs().iter().map(|td| td.storage_size()).sum();
        let Some(mut offset) = self.stack_ptr.checked_sub(total) else {
            return record
                .outputs()
                .iter()
                .map(|td| format!("({td})?"))
                .collect::<Vec<_>>()
                .join(",");
        };
        let mut parts = Vec::with_capacity(record.outputs().len());
        for td in record.outputs() {
            parts.push(render_cell(*td, self.stack.get(offset..)));
            offset += td.storage_size();
        }
        parts.join(",")
    }
}

fn render_cell(td: TypeDescriptor, bytes: Option<&[u8]>) -> String {
    let value = bytes
        .filter(|b| b.len() >= td.storage_size())
        .and_then(|b| format_value(td, b))
        .unwrap_or_else(|| "?".into());
    format!("({td}){value}")
}

fn sink_write(sink: &mut dyn io::Write, text: &str) -> Result<(), Error> {
    sink.write_all(text.as_bytes())
        .map_err(|e| Error::fatal(format!("trace sink failure: {e}")))
}

fn bad_opcode(pcode: CodeElement) -> Error {
    Error::fatal(format!("no function record for opcode {pcode}"))
}
