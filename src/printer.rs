//! Parenthesized tree rendering used by `--ast` and the test suite.
//!
//! Printing is a pure function of the parsed tree: source spacing,
//! comments, and the original operator positions are all gone by the
//! time a tree reaches here.

use crate::ast::{Expr, ExprKind, FunctionDecl, Stmt};

pub fn print_program(statements: &[Stmt]) -> String {
    statements
        .iter()
        .map(print_stmt)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_stmt(statement: &Stmt) -> String {
    match statement {
        Stmt::Expression(expression) => format!("(expr {})", print_expr(expression)),
        Stmt::Print(expression) => format!("(print {})", print_expr(expression)),
        Stmt::Var { name, initializer } => match initializer {
            Some(init) => format!("(var {} {})", name.lexeme, print_expr(init)),
            None => format!("(var {})", name.lexeme),
        },
        Stmt::Block(statements) => {
            let mut parts = vec!["block".to_string()];
            parts.extend(statements.iter().map(print_stmt));
            format!("({})", parts.join(" "))
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => match else_branch {
            Some(else_branch) => format!(
                "(if {} {} {})",
                print_expr(condition),
                print_stmt(then_branch),
                print_stmt(else_branch)
            ),
            None => format!("(if {} {})", print_expr(condition), print_stmt(then_branch)),
        },
        Stmt::While { condition, body } => {
            format!("(while {} {})", print_expr(condition), print_stmt(body))
        }
        Stmt::Function(declaration) => print_function(declaration),
        Stmt::Return { value, .. } => match value {
            Some(value) => format!("(return {})", print_expr(value)),
            None => "(return)".to_string(),
        },
    }
}

fn print_function(declaration: &FunctionDecl) -> String {
    let params = declaration
        .params
        .iter()
        .map(|p| p.lexeme.clone())
        .collect::<Vec<_>>()
        .join(" ");
    let body = declaration
        .body
        .iter()
        .map(print_stmt)
        .collect::<Vec<_>>()
        .join(" ");
    if body.is_empty() {
        format!("(fun {} ({}))", declaration.name.lexeme, params)
    } else {
        format!("(fun {} ({}) {})", declaration.name.lexeme, params, body)
    }
}

pub fn print_expr(expression: &Expr) -> String {
    match &expression.kind {
        ExprKind::Literal(value) => value.to_string(),
        ExprKind::Grouping(inner) => format!("(group {})", print_expr(inner)),
        ExprKind::Unary { operator, right } => {
            format!("({} {})", operator.lexeme, print_expr(right))
        }
        ExprKind::Binary {
            left,
            operator,
            right,
        }
        | ExprKind::Logical {
            left,
            operator,
            right,
        } => format!(
            "({} {} {})",
            operator.lexeme,
            print_expr(left),
            print_expr(right)
        ),
        ExprKind::Variable { name } => name.lexeme.clone(),
        ExprKind::Assign { name, value } => {
            format!("(= {} {})", name.lexeme, print_expr(value))
        }
        ExprKind::Call {
            callee, arguments, ..
        } => {
            let mut parts = vec!["call".to_string(), print_expr(callee)];
            parts.extend(arguments.iter().map(print_expr));
            format!("({})", parts.join(" "))
        }
    }
}
