use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use super::control_flow::ControlFlow;
use super::environment::Environment;
use super::error::RuntimeError;
use super::natives;
use crate::ast::{Expr, ExprId, ExprKind, Stmt};
use crate::token::{Token, TokenKind};
use crate::value::{UserFunction, Value};

/// Tree-walking evaluator.
///
/// Holds the process-lifetime globals, the current-environment pointer,
/// and the resolver's distance map. Variable access takes the direct
/// `get_at`/`assign_at` path when a distance was recorded for the node
/// and goes straight to the globals otherwise.
///
/// `print` writes to the injected writer, or appends a line to
/// `print_file` when one is configured (opened and closed per print,
/// never held across statements).
pub struct Interpreter<'out> {
    globals: Rc<Environment>,
    environment: Rc<Environment>,
    locals: HashMap<ExprId, usize>,
    output: &'out mut dyn Write,
    print_file: Option<PathBuf>,
}

impl<'out> Interpreter<'out> {
    pub fn new(output: &'out mut dyn Write) -> Self {
        let globals = Environment::new();
        natives::install(&globals);
        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
            print_file: None,
        }
    }

    pub fn set_print_file(&mut self, path: Option<PathBuf>) {
        self.print_file = path;
    }

    /// Merges a resolver run's distance map. Entries accumulate across
    /// prompt lines; expression ids are session-unique so earlier
    /// closures keep their entries.
    pub fn resolve(&mut self, locals: HashMap<ExprId, usize>) {
        self.locals.extend(locals);
    }

    /// Executes a program. The first runtime fault aborts the
    /// remaining statements.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            match self.execute(statement)? {
                ControlFlow::Next => {}
                // The resolver rejects top-level `return`; nothing left
                // to unwind to here.
                ControlFlow::Return(_) => break,
            }
        }
        Ok(())
    }

    fn execute(&mut self, statement: &Stmt) -> Result<ControlFlow, RuntimeError> {
        match statement {
            Stmt::Expression(expression) => {
                self.evaluate(expression)?;
                Ok(ControlFlow::Next)
            }
            Stmt::Print(expression) => {
                let value = self.evaluate(expression)?;
                self.write_print(&value)?;
                Ok(ControlFlow::Next)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(initializer) => self.evaluate(initializer)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
                Ok(ControlFlow::Next)
            }
            Stmt::Block(statements) => {
                let scope = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, scope)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(ControlFlow::Next)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let ControlFlow::Return(value) = self.execute(body)? {
                        return Ok(ControlFlow::Return(value));
                    }
                }
                Ok(ControlFlow::Next)
            }
            Stmt::Function(declaration) => {
                // The environment captured here, at declaration time,
                // is the closure's defining scope.
                let function = Value::Function(Rc::new(UserFunction {
                    declaration: Rc::clone(declaration),
                    closure: Rc::clone(&self.environment),
                }));
                self.environment.define(&declaration.name.lexeme, function);
                Ok(ControlFlow::Next)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                Ok(ControlFlow::Return(value))
            }
        }
    }

    /// Runs statements in the given environment, restoring the previous
    /// one afterwards even when a fault or a `return` passes through.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<Environment>,
    ) -> Result<ControlFlow, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut outcome = Ok(ControlFlow::Next);
        for statement in statements {
            match self.execute(statement) {
                Ok(ControlFlow::Next) => {}
                other => {
                    outcome = other;
                    break;
                }
            }
        }

        self.environment = previous;
        outcome
    }

    fn evaluate(&mut self, expression: &Expr) -> Result<Value, RuntimeError> {
        match &expression.kind {
            ExprKind::Literal(value) => Ok(value.clone()),
            ExprKind::Grouping(inner) => self.evaluate(inner),
            ExprKind::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.kind {
                    TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
                    TokenKind::Minus => match right.as_number() {
                        Some(n) => Ok(Value::Number(-n)),
                        None => Err(RuntimeError::number_operand(operator)),
                    },
                    _ => unreachable!("{:?} is not a unary operator", operator.kind),
                }
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary_op(operator, left, right)
            }
            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                // Short-circuit on the operand value itself; the result
                // is whichever operand decided the answer, not a bool.
                let short_circuits = match operator.kind {
                    TokenKind::Or => left.is_truthy(),
                    TokenKind::And => !left.is_truthy(),
                    _ => unreachable!("{:?} is not a logical operator", operator.kind),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            ExprKind::Variable { name } => self.look_up_variable(name, expression.id),
            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(&expression.id) {
                    Some(&distance) => {
                        self.environment.assign_at(distance, &name.lexeme, value.clone());
                    }
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            ExprKind::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                let mut evaluated = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    evaluated.push(self.evaluate(argument)?);
                }
                self.call_value(callee, evaluated, paren)
            }
        }
    }

    /// Shared invocation contract for both callable flavors: arity is
    /// checked before anything runs, and a non-callable callee fails
    /// the same way regardless of arguments.
    fn call_value(
        &mut self,
        callee: Value,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Native(native) => {
                if arguments.len() != native.arity {
                    return Err(RuntimeError::wrong_arity(paren, native.arity, arguments.len()));
                }
                Ok((native.call)(&arguments))
            }
            Value::Function(function) => {
                if arguments.len() != function.arity() {
                    return Err(RuntimeError::wrong_arity(
                        paren,
                        function.arity(),
                        arguments.len(),
                    ));
                }

                // The call frame encloses the *captured* environment,
                // never the caller's.
                let environment = Environment::with_enclosing(Rc::clone(&function.closure));
                for (param, argument) in function.declaration.params.iter().zip(arguments) {
                    environment.define(&param.lexeme, argument);
                }

                match self.execute_block(&function.declaration.body, environment)? {
                    ControlFlow::Return(value) => Ok(value),
                    ControlFlow::Next => Ok(Value::Nil),
                }
            }
            _ => Err(RuntimeError::not_callable(paren)),
        }
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(self.environment.get_at(distance, &name.lexeme)),
            None => self.globals.get(name),
        }
    }

    fn write_print(&mut self, value: &Value) -> Result<(), RuntimeError> {
        match &self.print_file {
            Some(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| RuntimeError::print_io(Some(path.clone()), e))?;
                writeln!(file, "{value}")
                    .map_err(|e| RuntimeError::print_io(Some(path.clone()), e))
            }
            None => {
                writeln!(self.output, "{value}").map_err(|e| RuntimeError::print_io(None, e))
            }
        }
    }
}

fn binary_op(operator: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match operator.kind {
        TokenKind::Greater => {
            let (l, r) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(l > r))
        }
        TokenKind::GreaterEqual => {
            let (l, r) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(l >= r))
        }
        TokenKind::Less => {
            let (l, r) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(l < r))
        }
        TokenKind::LessEqual => {
            let (l, r) = number_operands(operator, &left, &right)?;
            Ok(Value::Bool(l <= r))
        }
        TokenKind::Minus => {
            let (l, r) = number_operands(operator, &left, &right)?;
            Ok(Value::Number(l - r))
        }
        TokenKind::Star => {
            let (l, r) = number_operands(operator, &left, &right)?;
            Ok(Value::Number(l * r))
        }
        TokenKind::Slash => {
            let (l, r) = number_operands(operator, &left, &right)?;
            if r == 0.0 {
                return Err(RuntimeError::division_by_zero(operator));
            }
            Ok(Value::Number(l / r))
        }
        TokenKind::Percent => {
            let (l, r) = number_operands(operator, &left, &right)?;
            if r == 0.0 {
                return Err(RuntimeError::division_by_zero(operator));
            }
            Ok(Value::Number(l % r))
        }
        TokenKind::Plus => match (&left, &right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::Str(l), Value::Str(r)) => Ok(Value::Str(Rc::from(format!("{l}{r}")))),
            _ => Err(RuntimeError::add_operands(operator)),
        },
        // Equality works across every value pair, with no implicit
        // coercion: mismatched types are simply unequal.
        TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
        TokenKind::BangEqual => Ok(Value::Bool(left != right)),
        _ => unreachable!("{:?} is not a binary operator", operator.kind),
    }
}

fn number_operands(
    operator: &Token,
    left: &Value,
    right: &Value,
) -> Result<(f64, f64), RuntimeError> {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(RuntimeError::number_operands(operator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprIdGen;
    use crate::diagnostic::Diagnostics;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> (String, Result<(), RuntimeError>) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let mut ids = ExprIdGen::new();
        let statements = Parser::new(tokens, &mut ids, &mut diagnostics).parse();
        assert!(!diagnostics.had_error(), "static errors: {:?}", diagnostics.as_slice());
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        assert!(!diagnostics.had_error(), "static errors: {:?}", diagnostics.as_slice());

        let mut output = Vec::new();
        let result = {
            let mut interpreter = Interpreter::new(&mut output);
            interpreter.resolve(locals);
            interpreter.interpret(&statements)
        };
        (String::from_utf8(output).unwrap(), result)
    }

    fn run_ok(source: &str) -> String {
        let (output, result) = run(source);
        result.unwrap();
        output
    }

    #[test]
    fn integral_numbers_print_bare() {
        assert_eq!(run_ok("print 2 + 5;"), "7\n");
        assert_eq!(run_ok("print 0.5 * 3;"), "1.5\n");
    }

    #[test]
    fn division_by_zero_aborts_before_printing() {
        let (output, result) = run("print 1 / 0;");
        assert_eq!(result.unwrap_err().to_string(), "Division by zero is not possible.");
        assert!(output.is_empty());
    }

    #[test]
    fn modulo_by_zero_has_its_own_message() {
        let (_, result) = run("print 1 % 0;");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Remainder when any number is divided by zero is not possible."
        );
    }

    #[test]
    fn equality_is_not_numeric_gated() {
        assert_eq!(run_ok("print \"a\" == \"a\";"), "true\n");
        assert_eq!(run_ok("print true != false;"), "true\n");
        assert_eq!(run_ok("print nil == nil;"), "true\n");
        assert_eq!(run_ok("print nil == 0;"), "false\n");
        assert_eq!(run_ok("print 1 == \"1\";"), "false\n");
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(run_ok("print \"left\" or \"right\";"), "left\n");
        assert_eq!(run_ok("print nil or \"right\";"), "right\n");
        assert_eq!(run_ok("print nil and \"right\";"), "nil\n");
        assert_eq!(run_ok("print 1 and 2;"), "2\n");
    }

    #[test]
    fn short_circuit_skips_right_operand() {
        // The divide-by-zero on the right must never evaluate.
        assert_eq!(run_ok("print true or 1 / 0;"), "true\n");
        assert_eq!(run_ok("print false and 1 / 0;"), "false\n");
    }

    #[test]
    fn environment_is_restored_after_a_block_fault() {
        // The faulting block must not leave its scope installed.
        let source = "var a = 1;\nfun f() { { var a = 2; a + nil; } }\nf();";
        let (_, result) = run(source);
        assert!(result.is_err());
    }

    #[test]
    fn return_unwinds_through_loops_and_blocks() {
        let source = "\
fun find() {
  var i = 0;
  while (true) {
    if (i == 3) {
      return i;
    }
    i = i + 1;
  }
}
print find();
";
        assert_eq!(run_ok(source), "3\n");
    }

    #[test]
    fn falling_off_the_end_returns_nil() {
        assert_eq!(run_ok("fun f() {} print f();"), "nil\n");
    }

    #[test]
    fn calling_a_number_fails_before_the_body() {
        let (_, result) = run("var x = 1; x(2);");
        assert_eq!(result.unwrap_err().to_string(), "Can only call functions.");
    }

    #[test]
    fn arity_mismatch_reports_counts() {
        let (_, result) = run("fun f(a, b) {} f(1);");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Expected 2 arguments but got 1."
        );
    }

    #[test]
    fn clock_is_a_number_and_takes_no_arguments() {
        assert_eq!(run_ok("print clock() >= 0;"), "true\n");
        let (_, result) = run("clock(1);");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Expected 0 arguments but got 1."
        );
    }

    #[test]
    fn function_values_display_by_name() {
        assert_eq!(run_ok("fun greet() {} print greet;"), "<fn greet>\n");
        assert_eq!(run_ok("print clock;"), "<native fn>\n");
    }

    #[test]
    fn print_file_appends_lines() {
        let path = std::env::temp_dir().join(format!(
            "pal-print-sink-{}.txt",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let mut output = Vec::new();
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("print 1; print \"two\";", &mut diagnostics).scan_tokens();
        let mut ids = ExprIdGen::new();
        let statements = Parser::new(tokens, &mut ids, &mut diagnostics).parse();
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        {
            let mut interpreter = Interpreter::new(&mut output);
            interpreter.set_print_file(Some(path.clone()));
            interpreter.resolve(locals);
            interpreter.interpret(&statements).unwrap();
        }

        assert!(output.is_empty(), "file sink must bypass the writer");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "1\ntwo\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn print_file_failure_is_a_runtime_error() {
        let mut output = Vec::new();
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("print 1;", &mut diagnostics).scan_tokens();
        let mut ids = ExprIdGen::new();
        let statements = Parser::new(tokens, &mut ids, &mut diagnostics).parse();
        let locals = Resolver::new(&mut diagnostics).resolve(&statements);
        let result = {
            let mut interpreter = Interpreter::new(&mut output);
            // A directory path cannot be opened for appending.
            interpreter.set_print_file(Some(std::env::temp_dir()));
            interpreter.resolve(locals);
            interpreter.interpret(&statements)
        };
        assert!(matches!(result, Err(RuntimeError::PrintIo { .. })));
    }
}
