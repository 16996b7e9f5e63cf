use std::fmt;

use owo_colors::OwoColorize;

use crate::token::{Token, TokenKind};

/// Where in the offending line an error points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// Only the line is known (scanner errors).
    Line,
    /// The error sits on the end-of-input token.
    AtEnd,
    /// The error sits on a concrete lexeme.
    At(String),
}

/// A single static error from scanning, parsing, or resolving.
///
/// Rendered as `[line N] Error: message`, `[line N] Error at end: message`,
/// or `[line N] Error at 'lexeme': message`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: usize,
    pub location: ErrorLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            location: ErrorLocation::Line,
            message: message.into(),
        }
    }

    pub fn at_token(token: &Token, message: impl Into<String>) -> Self {
        let location = if token.kind == TokenKind::Eof {
            ErrorLocation::AtEnd
        } else {
            ErrorLocation::At(token.lexeme.clone())
        };
        Self {
            line: token.line,
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            ErrorLocation::Line => {
                write!(f, "[line {}] Error: {}", self.line, self.message)
            }
            ErrorLocation::AtEnd => {
                write!(f, "[line {}] Error at end: {}", self.line, self.message)
            }
            ErrorLocation::At(lexeme) => {
                write!(f, "[line {}] Error at '{}': {}", self.line, lexeme, self.message)
            }
        }
    }
}

/// Collector threaded through the scanner, parser, and resolver.
///
/// Each pipeline pass reports into a `Diagnostics` borrowed from the
/// caller instead of flipping process-wide flags, so the passes stay
/// reentrant and independently testable.
#[derive(Debug, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports an error known only by line (scanner faults).
    pub fn report(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(line, message));
    }

    /// Reports an error anchored to a token (parser and resolver faults).
    pub fn report_at(&mut self, token: &Token, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::at_token(token, message));
    }

    pub fn had_error(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drains the collected diagnostics, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// Renders diagnostics one per line, with an error-count trailer when
/// there is more than one.
pub fn render_diagnostics(diagnostics: &[Diagnostic], use_color: bool) -> String {
    let mut output = String::new();
    for diagnostic in diagnostics {
        if use_color {
            output.push_str(&format!("{}\n", diagnostic.to_string().red()));
        } else {
            output.push_str(&format!("{diagnostic}\n"));
        }
    }
    if diagnostics.len() > 1 {
        output.push_str(&format!("{} errors\n", diagnostics.len()));
    }
    output
}
