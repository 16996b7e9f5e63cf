use std::io::Write;
use std::path::PathBuf;

use crate::ast::ExprIdGen;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::interpreter::{Interpreter, RuntimeError};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// Result of pushing one chunk of source through the pipeline.
#[derive(Debug)]
pub enum RunOutcome {
    Success,
    /// Scan, parse, or resolve errors. Nothing was executed.
    StaticErrors(Vec<Diagnostic>),
    /// Execution started and aborted on this fault.
    RuntimeError(RuntimeError),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}

/// Drives source text through scanning, parsing, resolution, and
/// execution, in that order, with each stage gating the next: any
/// static error means the interpreter never runs.
///
/// A session outlives individual `run` calls. The prompt feeds it one
/// line at a time and keeps its globals; the expression-id generator
/// lives here too, so distances resolved for a closure on an early
/// line are never clobbered by ids from a later one.
pub struct Session<'out> {
    interpreter: Interpreter<'out>,
    ids: ExprIdGen,
}

impl<'out> Session<'out> {
    pub fn new(output: &'out mut dyn Write) -> Self {
        Self {
            interpreter: Interpreter::new(output),
            ids: ExprIdGen::new(),
        }
    }

    /// Routes `print` output into an append-mode file instead of the
    /// session writer.
    pub fn set_print_file(&mut self, path: Option<PathBuf>) {
        self.interpreter.set_print_file(path);
    }

    pub fn run(&mut self, source: &str) -> RunOutcome {
        let mut diagnostics = Diagnostics::new();

        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(tokens, &mut self.ids, &mut diagnostics).parse();
        if diagnostics.had_error() {
            return RunOutcome::StaticErrors(diagnostics.take());
        }

        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        if diagnostics.had_error() {
            return RunOutcome::StaticErrors(diagnostics.take());
        }

        self.interpreter.resolve(locals);
        match self.interpreter.interpret(&statements) {
            Ok(()) => RunOutcome::Success,
            Err(error) => RunOutcome::RuntimeError(error),
        }
    }
}
