// Fatal per-function compilation errors.
//
// None of these are recoverable: the driver stops emitting the function that
// raised one and reports it to the caller.

use std::fmt;

use crate::cfg::three_address_code::Reg;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodegenError {
    /// An instruction or operand has a shape the backend cannot lower.
    MalformedIr { func: String, reason: String },
    /// A jump names a label that the function never declares.
    UndeclaredLabel { func: String, label: String },
    /// The same label is declared twice in one function.
    DuplicateLabel { func: String, label: String },
    /// More arguments or parameters than there are argument registers.
    TooManyArgs { func: String, count: usize },
    /// Graph coloring found no legal physical register for `reg`.
    OutOfRegisters { func: String, reg: Reg },
    /// A register is read but the allocator never gave it a location.
    Unallocated { func: String, reg: Reg },
}

impl CodegenError {
    pub fn malformed(func: &str, reason: impl Into<String>) -> Self {
        CodegenError::MalformedIr {
            func: func.to_string(),
            reason: reason.into(),
        }
    }

    /// Name of the function whose compilation failed.
    pub fn func(&self) -> &str {
        match self {
            CodegenError::MalformedIr { func, .. }
            | CodegenError::UndeclaredLabel { func, .. }
            | CodegenError::DuplicateLabel { func, .. }
            | CodegenError::TooManyArgs { func, .. }
            | CodegenError::OutOfRegisters { func, .. }
            | CodegenError::Unallocated { func, .. } => func,
        }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::MalformedIr { func, reason } => {
                write!(f, "malformed IR in function {}: {}", func, reason)
            }
            CodegenError::UndeclaredLabel { func, label } => {
                write!(f, "jump to undeclared label {} in function {}", label, func)
            }
            CodegenError::DuplicateLabel { func, label } => {
                write!(f, "label {} declared more than once in function {}", label, func)
            }
            CodegenError::TooManyArgs { func, count } => write!(
                f,
                "function {}: {} arguments exceed the register-passed limit",
                func, count
            ),
            CodegenError::OutOfRegisters { func, reg } => write!(
                f,
                "function {}: no coloring possible with available registers (stuck at {})",
                func, reg
            ),
            CodegenError::Unallocated { func, reg } => {
                write!(f, "function {}: register {} has no allocated location", func, reg)
            }
        }
    }
}

impl std::error::Error for CodegenError {}
