//! Composite runtime error implementation

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Bit-set of failure reasons. Several reasons may accumulate over the
    /// course of a single operation; the executor in particular keeps adding
    /// to the set while it runs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u16 {
        /// No matching opcode, non-numeric type, unsupported conversion.
        const UNSUPPORTED_FEATURE = 1 << 0;
        /// Required token missing, output variable re-declared.
        const INVALID_OPERATION = 1 << 1;
        /// Out of memory, failed append to the code buffer, type stack full.
        const FATAL_ERROR = 1 << 2;
        /// Stack pointer left its bounds, or a lossy numeric conversion.
        const OUT_OF_RANGE = 1 << 3;
        /// Read of a not-yet-written output; execution interrupted early.
        const NOT_COMPLETED = 1 << 4;
        /// Type stack not empty after compile, stack pointer not at base
        /// after execute.
        const INTERNAL_SETUP_ERROR = 1 << 5;
        /// Caller-supplied argument rejected.
        const PARAMETERS_ERROR = 1 << 6;
        /// Operation not legal in the current state.
        const ILLEGAL_OPERATION = 1 << 7;
        /// A comparison that was expected to hold did not.
        const COMPARISON_FAILURE = 1 << 8;
    }
}

impl Flags {
    /// True when the set contains anything beyond the advisory
    /// [`OUT_OF_RANGE`](Flags::OUT_OF_RANGE). Safe and Debug execution stop
    /// on halting flags and keep running on advisory ones.
    pub const fn is_halting(self) -> bool {
        self.difference(Flags::OUT_OF_RANGE).bits() != 0
    }
}

/// Failure value carrying the accumulated reason set plus a human-readable
/// context. Never thrown; every fallible operation returns it by value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{context}")]
pub struct Error {
    flags: Flags,
    context: String,
}

impl Error {
    /// Error with an explicit reason set.
    pub fn new(flags: Flags, context: impl Into<String>) -> Self {
        Self {
            flags,
            context: context.into(),
        }
    }

    /// The accumulated reason set.
    pub const fn flags(&self) -> Flags {
        self.flags
    }

    /// The human-readable context.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Adds further reasons to the set.
    pub fn with(mut self, flags: Flags) -> Self {
        self.flags |= flags;
        self
    }

    /// No matching opcode, type or conversion.
    pub fn unsupported_feature(context: impl Into<String>) -> Self {
        Self::new(Flags::UNSUPPORTED_FEATURE, context)
    }

    /// Malformed statement or forbidden redeclaration.
    pub fn invalid_operation(context: impl Into<String>) -> Self {
        Self::new(Flags::INVALID_OPERATION, context)
    }

    /// Resource exhaustion.
    pub fn fatal(context: impl Into<String>) -> Self {
        Self::new(Flags::FATAL_ERROR, context)
    }

    /// Inconsistent internal state discovered by a final check.
    pub fn internal_setup(context: impl Into<String>) -> Self {
        Self::new(Flags::INTERNAL_SETUP_ERROR, context)
    }

    /// Caller-supplied argument rejected.
    pub fn parameters(context: impl Into<String>) -> Self {
        Self::new(Flags::PARAMETERS_ERROR, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accumulate() {
        let err = Error::unsupported_feature("no SUB for these types")
            .with(Flags::INTERNAL_SETUP_ERROR);
        assert!(err.flags().contains(Flags::UNSUPPORTED_FEATURE));
        assert!(err.flags().contains(Flags::INTERNAL_SETUP_ERROR));
        assert!(!err.flags().contains(Flags::OUT_OF_RANGE));
    }

    #[test]
    fn out_of_range_alone_is_advisory() {
        assert!(!Flags::OUT_OF_RANGE.is_halting());
        assert!(Flags::FATAL_ERROR.is_halting());
        assert!((Flags::OUT_OF_RANGE | Flags::NOT_COMPLETED).is_halting());
        assert!(!Flags::empty().is_halting());
    }
}
