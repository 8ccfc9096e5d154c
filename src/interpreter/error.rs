use thiserror::Error;

use crate::diagnostics::{Diagnostic, ErrorKind};
use crate::token::Position;

/// Typed errors produced while evaluating the tree.
///
/// Every variant carries the position of the token most relevant to the
/// failing operation; `kind` splits the taxonomy into Type errors (operand
/// shape mismatches) and Runtime errors (everything else).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Undefined variable '{name}'.")]
    UndefinedVariable { name: String, at: Position },
    #[error("Undefined property '{name}'.")]
    UndefinedProperty { name: String, at: Position },
    #[error("Operands must be numbers.")]
    NumberOperands { at: Position },
    #[error("Operands must be two numbers or two strings.")]
    AddOperands { at: Position },
    #[error("Division by zero.")]
    DivisionByZero { at: Position },
    #[error("Can only call functions and classes.")]
    NotCallable { at: Position },
    #[error("Expected {expected} arguments but got {found}.")]
    ArityMismatch {
        expected: usize,
        found: usize,
        at: Position,
    },
    #[error("Only instances have properties.")]
    PropertiesOnInstancesOnly { at: Position },
    #[error("Only instances have fields.")]
    FieldsOnInstancesOnly { at: Position },
    #[error("Can only index arrays.")]
    NotAnArray { at: Position },
    #[error("Array index must be a number.")]
    IndexNotNumber { at: Position },
    #[error("Array index must be an integer.")]
    IndexNotInteger { at: Position },
    #[error("Array index out of bounds.")]
    IndexOutOfBounds { at: Position },
    #[error("'IN' operator requires an array on the right.")]
    InRequiresArray { at: Position },
    #[error("For-in loop requires an array.")]
    ForInRequiresArray { at: Position },
    #[error("Superclass must be a class.")]
    SuperclassMustBeClass { at: Position },
    #[error("Can only instantiate classes.")]
    NotAClass { at: Position },
    #[error("Return outside of function.")]
    ReturnOutsideFunction { at: Position },
    #[error("Invalid number literal '{lexeme}'.")]
    InvalidNumberLiteral { lexeme: String, at: Position },
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget { at: Position },
    #[error("Unknown binary operator.")]
    UnknownBinaryOperator { at: Position },
    #[error("I/O error: {message}")]
    Io { message: String, at: Position },
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::NumberOperands { .. }
            | RuntimeError::AddOperands { .. }
            | RuntimeError::NotCallable { .. }
            | RuntimeError::PropertiesOnInstancesOnly { .. }
            | RuntimeError::FieldsOnInstancesOnly { .. }
            | RuntimeError::NotAnArray { .. }
            | RuntimeError::IndexNotNumber { .. }
            | RuntimeError::IndexNotInteger { .. }
            | RuntimeError::InRequiresArray { .. }
            | RuntimeError::ForInRequiresArray { .. } => ErrorKind::Type,
            RuntimeError::UndefinedVariable { .. }
            | RuntimeError::UndefinedProperty { .. }
            | RuntimeError::DivisionByZero { .. }
            | RuntimeError::ArityMismatch { .. }
            | RuntimeError::IndexOutOfBounds { .. }
            | RuntimeError::SuperclassMustBeClass { .. }
            | RuntimeError::NotAClass { .. }
            | RuntimeError::ReturnOutsideFunction { .. }
            | RuntimeError::InvalidNumberLiteral { .. }
            | RuntimeError::InvalidAssignmentTarget { .. }
            | RuntimeError::UnknownBinaryOperator { .. }
            | RuntimeError::Io { .. } => ErrorKind::Runtime,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            RuntimeError::UndefinedVariable { at, .. }
            | RuntimeError::UndefinedProperty { at, .. }
            | RuntimeError::NumberOperands { at }
            | RuntimeError::AddOperands { at }
            | RuntimeError::DivisionByZero { at }
            | RuntimeError::NotCallable { at }
            | RuntimeError::ArityMismatch { at, .. }
            | RuntimeError::PropertiesOnInstancesOnly { at }
            | RuntimeError::FieldsOnInstancesOnly { at }
            | RuntimeError::NotAnArray { at }
            | RuntimeError::IndexNotNumber { at }
            | RuntimeError::IndexNotInteger { at }
            | RuntimeError::IndexOutOfBounds { at }
            | RuntimeError::InRequiresArray { at }
            | RuntimeError::ForInRequiresArray { at }
            | RuntimeError::SuperclassMustBeClass { at }
            | RuntimeError::NotAClass { at }
            | RuntimeError::ReturnOutsideFunction { at }
            | RuntimeError::InvalidNumberLiteral { at, .. }
            | RuntimeError::InvalidAssignmentTarget { at }
            | RuntimeError::UnknownBinaryOperator { at }
            | RuntimeError::Io { at, .. } => *at,
        }
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.kind(), self.position(), self.to_string())
    }
}
