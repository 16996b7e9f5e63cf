use std::collections::HashMap;

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Stmt};
use crate::diagnostic::Diagnostics;
use crate::token::Token;

/// Whether resolution is currently inside a function body. Used to
/// reject `return` at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
}

/// Static analysis pass between parsing and execution.
///
/// Walks the whole tree once, maintaining a stack of scope frames that
/// mirrors the environments the interpreter will create. For every
/// variable read or assignment target that lands in a local scope it
/// records how many environments out the binding lives; references
/// that match no frame are left unrecorded and resolve through the
/// globals at runtime. Nothing is evaluated here; the pass only fills
/// the distance map and reports misuse:
///
/// - redeclaring a name within the same scope frame,
/// - reading a variable inside its own initializer,
/// - `return` outside any function body.
pub struct Resolver<'d> {
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<ExprId, usize>,
    current_function: FunctionKind,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Resolver<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionKind::None,
            diagnostics,
        }
    }

    /// Resolves a whole program and returns the distance map keyed by
    /// expression identity.
    pub fn resolve(mut self, statements: &[Stmt]) -> HashMap<ExprId, usize> {
        self.resolve_statements(statements);
        self.locals
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_statement(statement);
        }
    }

    fn resolve_statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Expression(expression) | Stmt::Print(expression) => {
                self.resolve_expression(expression);
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expression(initializer);
                }
                self.define(name);
            }
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expression(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expression(condition);
                self.resolve_statement(body);
            }
            Stmt::Function(declaration) => {
                // Name first, body second: the function may call itself.
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionKind::None {
                    self.diagnostics
                        .report_at(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    self.resolve_expression(value);
                }
            }
        }
    }

    fn resolve_function(&mut self, declaration: &FunctionDecl) {
        let enclosing = self.current_function;
        self.current_function = FunctionKind::Function;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(&declaration.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    fn resolve_expression(&mut self, expression: &Expr) {
        match &expression.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Grouping(inner) => self.resolve_expression(inner),
            ExprKind::Unary { right, .. } => self.resolve_expression(right),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            ExprKind::Variable { name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.diagnostics
                            .report_at(name, "Can't read local variable in its own initializer.");
                    }
                }
                self.resolve_local(expression.id, name);
            }
            ExprKind::Assign { name, value } => {
                self.resolve_expression(value);
                self.resolve_local(expression.id, name);
            }
            ExprKind::Call {
                callee, arguments, ..
            } => {
                self.resolve_expression(callee);
                for argument in arguments {
                    self.resolve_expression(argument);
                }
            }
        }
    }

    /// Inserts the name into the innermost frame as declared but not
    /// yet defined. Shadowing an outer frame is fine; colliding within
    /// the same frame is an error.
    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.contains_key(&name.lexeme) {
            self.diagnostics
                .report_at(name, "Already a variable with this name in this scope.");
        }
        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Records the hop count from the innermost frame to the first one
    /// containing the name. No frame means the reference is global and
    /// stays unrecorded.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (distance, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, distance);
                return;
            }
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }
}
