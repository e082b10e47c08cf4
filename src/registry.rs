//! Function registry: the table of typed opcode implementations

use crate::consts::{CodeElement, MAX_FUNCTIONS, TYPE_STACK_DEPTH};
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::types::TypeDescriptor;

mod builtins;

pub use builtins::{standard, standard_registry};

/// Implementation of one opcode. It pops its inputs off the value stack,
/// computes, and pushes its outputs; READ/WRITE additionally fetch their
/// data-area operand from the code stream.
pub type OpFn = for<'r> fn(&mut Interpreter<'r>);

/// Bounded compile-time stack of operand types. Used only during
/// compilation to verify opcode dispatch; it never exists at run time.
#[derive(Debug, Default, Clone)]
pub struct TypeStack {
    items: Vec<TypeDescriptor>,
}

impl TypeStack {
    /// Pushes a type; the stack is bounded by [`TYPE_STACK_DEPTH`].
    pub fn push(&mut self, td: TypeDescriptor) -> Result<(), Error> {
        if self.items.len() >= TYPE_STACK_DEPTH {
            return Err(Error::fatal("failed to push type into stack"));
        }
        self.items.push(td);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<TypeDescriptor> {
        self.items.pop()
    }

    /// The type `depth` slots below the top.
    pub fn peek(&self, depth: usize) -> Option<TypeDescriptor> {
        self.items
            .len()
            .checked_sub(depth + 1)
            .map(|index| self.items[index])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Registry entry: mnemonic, typed signature and the routine implementing
/// it.
pub struct FunctionRecord {
    name: &'static str,
    /// Input types in pop order: `inputs[0]` is the value-stack top.
    inputs: Vec<TypeDescriptor>,
    /// Output types in push order.
    outputs: Vec<TypeDescriptor>,
    /// Type matched against the sink pushed by READ/WRITE/CONST/CAST when it
    /// differs from the produced outputs (converting writes produce nothing
    /// but still match the destination variable's type).
    sink: Option<TypeDescriptor>,
    op: OpFn,
}

impl FunctionRecord {
    pub fn new(
        name: &'static str,
        inputs: Vec<TypeDescriptor>,
        outputs: Vec<TypeDescriptor>,
        op: OpFn,
    ) -> Self {
        Self {
            name,
            inputs,
            outputs,
            sink: None,
            op,
        }
    }

    /// Record with no outputs that still matches `sink` as its destination
    /// type.
    pub fn with_sink(
        name: &'static str,
        inputs: Vec<TypeDescriptor>,
        sink: TypeDescriptor,
        op: OpFn,
    ) -> Self {
        Self {
            name,
            inputs,
            outputs: Vec::new(),
            sink: Some(sink),
            op,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn inputs(&self) -> &[TypeDescriptor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TypeDescriptor] {
        &self.outputs
    }

    pub fn op(&self) -> OpFn {
        self.op
    }

    fn sink_type(&self) -> Option<TypeDescriptor> {
        self.sink.or_else(|| self.outputs.first().copied())
    }

    /// Matches this record against the current type stack.
    ///
    /// With `match_output` set, the stack top must equal the record's sink
    /// type and the inputs are checked below it; otherwise the inputs are
    /// checked from the top. On success the sink and inputs are popped, the
    /// outputs pushed, and `data_stack_size` adjusted by the net change in
    /// byte storage.
    pub fn try_consume(
        &self,
        name: &str,
        stack: &mut TypeStack,
        match_output: bool,
        data_stack_size: &mut usize,
    ) -> Result<bool, Error> {
        if self.name != name {
            return Ok(false);
        }

        let sink_slots = usize::from(match_output);
        if match_output {
            match (stack.peek(0), self.sink_type()) {
                (Some(top), Some(sink)) if top == sink => {}
                _ => return Ok(false),
            }
        }

        for (depth, expected) in self.inputs.iter().enumerate() {
            match stack.peek(sink_slots + depth) {
                Some(td) if td == *expected => {}
                _ => return Ok(false),
            }
        }

        // found: commit the stack effect
        if match_output {
            stack.pop();
        }
        for _ in &self.inputs {
            if let Some(td) = stack.pop() {
                *data_stack_size -= td.storage_size();
            }
        }
        for td in &self.outputs {
            stack.push(*td)?;
            *data_stack_size += td.storage_size();
        }

        Ok(true)
    }
}

impl std::fmt::Debug for FunctionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRecord")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("sink", &self.sink)
            .finish()
    }
}

/// Append-only table of opcode implementations.
///
/// Lookup is a linear scan in registration order: it runs at compile time
/// only, and overload resolution is defined by that order. The first record
/// that consumes the stack wins and its index becomes the emitted opcode.
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<FunctionRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record; fails once the table holds [`MAX_FUNCTIONS`]
    /// entries.
    pub fn register(&mut self, record: FunctionRecord) -> Result<(), Error> {
        if self.records.len() >= MAX_FUNCTIONS {
            return Err(Error::fatal(format!(
                "function registry is full ({MAX_FUNCTIONS} records)"
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record a compiled opcode refers to.
    pub fn record(&self, code: CodeElement) -> Option<&FunctionRecord> {
        self.records.get(usize::from(code))
    }

    /// Finds the first record for `name` that consumes the current type
    /// stack and returns its index.
    pub fn find(
        &self,
        name: &str,
        stack: &mut TypeStack,
        match_output: bool,
        data_stack_size: &mut usize,
    ) -> Result<Option<CodeElement>, Error> {
        for (index, record) in self.records.iter().enumerate() {
            if record.try_consume(name, stack, match_output, data_stack_size)? {
                return Ok(Some(index as CodeElement));
            }
        }
        Ok(None)
    }
}
