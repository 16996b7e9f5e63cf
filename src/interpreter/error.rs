use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::token::{Token, TokenKind};

/// A fault raised during evaluation. Each one is fatal to the current
/// run: the interpreter abandons the remaining statements and the
/// error is reported once with its source line.
#[derive(Debug)]
pub enum RuntimeError {
    UndefinedVariable { name: Token },
    NumberOperand { operator: Token },
    NumberOperands { operator: Token },
    AddOperands { operator: Token },
    DivisionByZero { operator: Token },
    NotCallable { paren: Token },
    WrongArity { paren: Token, expected: usize, got: usize },
    PrintIo { path: Option<PathBuf>, source: io::Error },
}

impl RuntimeError {
    pub fn undefined_variable(name: &Token) -> Self {
        Self::UndefinedVariable { name: name.clone() }
    }

    pub fn number_operand(operator: &Token) -> Self {
        Self::NumberOperand {
            operator: operator.clone(),
        }
    }

    pub fn number_operands(operator: &Token) -> Self {
        Self::NumberOperands {
            operator: operator.clone(),
        }
    }

    pub fn add_operands(operator: &Token) -> Self {
        Self::AddOperands {
            operator: operator.clone(),
        }
    }

    pub fn division_by_zero(operator: &Token) -> Self {
        Self::DivisionByZero {
            operator: operator.clone(),
        }
    }

    pub fn not_callable(paren: &Token) -> Self {
        Self::NotCallable {
            paren: paren.clone(),
        }
    }

    pub fn wrong_arity(paren: &Token, expected: usize, got: usize) -> Self {
        Self::WrongArity {
            paren: paren.clone(),
            expected,
            got,
        }
    }

    pub fn print_io(path: Option<PathBuf>, source: io::Error) -> Self {
        Self::PrintIo { path, source }
    }

    /// Source line of the offending token; print-sink faults have no
    /// token to point at.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::UndefinedVariable { name } => Some(name.line),
            Self::NumberOperand { operator }
            | Self::NumberOperands { operator }
            | Self::AddOperands { operator }
            | Self::DivisionByZero { operator } => Some(operator.line),
            Self::NotCallable { paren } | Self::WrongArity { paren, .. } => Some(paren.line),
            Self::PrintIo { .. } => None,
        }
    }

    /// User-facing report: the message, then the line trailer when one
    /// is known.
    pub fn report(&self) -> String {
        match self.line() {
            Some(line) => format!("{self}\n[line {line}]"),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedVariable { name } => {
                write!(f, "Undefined variable '{}'.", name.lexeme)
            }
            Self::NumberOperand { .. } => write!(f, "Operand must be a number."),
            Self::NumberOperands { .. } => write!(f, "Operands must be numbers."),
            Self::AddOperands { .. } => {
                write!(f, "Operands must be two numbers or two strings.")
            }
            Self::DivisionByZero { operator } => {
                if operator.kind == TokenKind::Percent {
                    write!(f, "Remainder when any number is divided by zero is not possible.")
                } else {
                    write!(f, "Division by zero is not possible.")
                }
            }
            Self::NotCallable { .. } => write!(f, "Can only call functions."),
            Self::WrongArity { expected, got, .. } => {
                write!(f, "Expected {expected} arguments but got {got}.")
            }
            Self::PrintIo { path, source } => match path {
                Some(path) => write!(
                    f,
                    "Error while writing print output to '{}': {}",
                    path.display(),
                    source
                ),
                None => write!(f, "Error while writing print output: {source}"),
            },
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PrintIo { source, .. } => Some(source),
            _ => None,
        }
    }
}
