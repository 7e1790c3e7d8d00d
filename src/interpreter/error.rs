use thiserror::Error;

use crate::builtins::BuiltinError;
use crate::token::{Location, Token};

/// A fatal error raised while running a program, positioned at the token
/// that triggered it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Error [line {line}] {location}: {kind}")]
pub struct RuntimeError {
    pub line: usize,
    pub location: Location,
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    pub(crate) fn at(token: &Token, kind: impl Into<RuntimeErrorKind>) -> Self {
        Self {
            line: token.line,
            location: token.location(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    #[error("operands must be numbers")]
    OperandsMustBeNumbers,
    #[error("operands must be integers")]
    OperandsMustBeIntegers,
    #[error("operand must be a number")]
    OperandMustBeNumber,
    #[error("operands must be both strings or both arrays")]
    OperandsNotConcatenable,
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("{callee} is not a function")]
    NotCallable { callee: String },
    #[error("expected {expected} arguments but got {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("{value} is not indexable")]
    NotIndexable { value: String },
    #[error("cannot use {index} as an array index")]
    InvalidIndex { index: String },
    #[error("index {index} out of bound")]
    IndexOutOfBounds { index: String },
    #[error("stack overflow")]
    StackOverflow,
    #[error("can't have a ret statement outside of a function")]
    ReturnOutsideFunction,
    #[error("can't use '{keyword}' outside of a loop")]
    OutsideLoop { keyword: &'static str },
    #[error("failed to write output: {message}")]
    Output { message: String },
    #[error(transparent)]
    Builtin(#[from] BuiltinError),
}
