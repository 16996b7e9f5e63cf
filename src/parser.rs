use std::rc::Rc;

use crate::ast::{Expr, ExprIdGen, ExprKind, FunctionDecl, Stmt};
use crate::diagnostic::Diagnostics;
use crate::token::{Literal, Token, TokenKind};
use crate::value::Value;

/// Sentinel for an already-reported syntax error. The message lives in
/// the diagnostics collector; this type only unwinds the descent back
/// to the nearest declaration so it can synchronize.
#[derive(Debug)]
pub struct ParseError;

pub type ParseResult<T> = Result<T, ParseError>;

/// Recursive-descent parser: one method per precedence level, lowest
/// first. All binary levels fold iteratively and are left-associative;
/// assignment recurses on itself and is right-associative.
///
/// A syntax error inside a declaration is reported, then the parser
/// discards tokens until just past the next `;` or until a token that
/// starts a statement, and resumes with the next declaration. One
/// genuine fault therefore produces one diagnostic, and the returned
/// statement list simply omits the broken declaration.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    ids: &'a mut ExprIdGen,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, ids: &'a mut ExprIdGen, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            tokens,
            current: 0,
            ids,
            diagnostics,
        }
    }

    pub fn parse(mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        statements
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_kind(TokenKind::Fun) {
            self.function("function")
        } else if self.match_kind(TokenKind::Var) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(statement) => Some(statement),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    fn function(&mut self, kind: &str) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {kind} name."))?;
        self.consume(TokenKind::LeftParen, &format!("Expect '(' after {kind} name."))?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= 255 {
                    let token = self.peek().clone();
                    self.diagnostics
                        .report_at(&token, "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;

        self.consume(TokenKind::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;
        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;

        let initializer = if self.match_kind(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_kind(TokenKind::For) {
            return self.for_statement();
        }
        if self.match_kind(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_kind(TokenKind::Print) {
            return self.print_statement();
        }
        if self.match_kind(TokenKind::Return) {
            return self.return_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_kind(TokenKind::LeftBrace) {
            return Ok(Stmt::Block(self.block()?));
        }
        self.expression_statement()
    }

    /// `for` has no AST node of its own: the clauses desugar into a
    /// `while` wrapped in blocks, with a synthetic `true` condition
    /// when none was written.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_kind(TokenKind::Semicolon) {
            None
        } else if self.match_kind(TokenKind::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenKind::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition =
            condition.unwrap_or_else(|| self.make_expr(ExprKind::Literal(Value::Bool(true))));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }

        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expression = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expression))
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if self.match_kind(TokenKind::Equal) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            if let ExprKind::Variable { name } = &expr.kind {
                let name = name.clone();
                return Ok(self.make_expr(ExprKind::Assign {
                    name,
                    value: Box::new(value),
                }));
            }

            // Reported without entering panic mode: the descent is not
            // confused, the left side just is not assignable.
            self.diagnostics.report_at(&equals, "Invalid assignment target.");
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while self.match_kind(TokenKind::Or) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = self.make_expr(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_kind(TokenKind::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = self.make_expr(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.match_kinds(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.match_kinds(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while self.match_kinds(&[TokenKind::Minus, TokenKind::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.match_kinds(&[TokenKind::Slash, TokenKind::Star, TokenKind::Percent]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = self.make_expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_kinds(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(self.make_expr(ExprKind::Unary {
                operator,
                right: Box::new(right),
            }));
        }
        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        while self.match_kind(TokenKind::LeftParen) {
            expr = self.finish_call(expr)?;
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    let token = self.peek().clone();
                    self.diagnostics
                        .report_at(&token, "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;

        Ok(self.make_expr(ExprKind::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        }))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.match_kind(TokenKind::False) {
            return Ok(self.make_expr(ExprKind::Literal(Value::Bool(false))));
        }
        if self.match_kind(TokenKind::True) {
            return Ok(self.make_expr(ExprKind::Literal(Value::Bool(true))));
        }
        if self.match_kind(TokenKind::Nil) {
            return Ok(self.make_expr(ExprKind::Literal(Value::Nil)));
        }

        if self.match_kinds(&[TokenKind::Number, TokenKind::String]) {
            let value = match self.previous().literal.clone() {
                Some(Literal::Number(n)) => Value::Number(n),
                Some(Literal::Str(s)) => Value::Str(Rc::from(s)),
                None => unreachable!("literal token without a literal payload"),
            };
            return Ok(self.make_expr(ExprKind::Literal(value)));
        }

        if self.match_kind(TokenKind::Identifier) {
            let name = self.previous().clone();
            return Ok(self.make_expr(ExprKind::Variable { name }));
        }

        if self.match_kind(TokenKind::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(self.make_expr(ExprKind::Grouping(Box::new(expr))));
        }

        Err(self.error_at_current("Expect expression."))
    }

    /// Discards tokens until a likely statement boundary: just past a
    /// `;`, or in front of a keyword that begins a declaration or
    /// statement.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }

            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }

            self.advance();
        }
    }

    fn make_expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.ids.next_id(),
            kind,
        }
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_kinds(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(self.error_at_current(message))
    }

    fn error_at_current(&mut self, message: &str) -> ParseError {
        let token = self.peek().clone();
        self.diagnostics.report_at(&token, message);
        ParseError
    }

    fn check(&self, kind: TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let mut ids = ExprIdGen::new();
        let statements = Parser::new(tokens, &mut ids, &mut diagnostics).parse();
        (statements, diagnostics)
    }

    #[test]
    fn two_faults_report_two_errors() {
        let source = "var a = ;\nprint 1;\nfun 2() {}\n";
        let (statements, diagnostics) = parse(source);
        assert_eq!(diagnostics.len(), 2, "{:?}", diagnostics.as_slice());
        // The statement between the faults survives.
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print(_)));
    }

    #[test]
    fn invalid_assignment_target_is_soft() {
        let (statements, diagnostics) = parse("1 = 2;");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.as_slice()[0]
            .message
            .contains("Invalid assignment target"));
        // Parsing continued with the left side as the whole expression.
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Expression(_)));
    }

    #[test]
    fn assignment_is_right_associative() {
        let (statements, diagnostics) = parse("a = b = 1;");
        assert!(!diagnostics.had_error());
        let Stmt::Expression(expr) = &statements[0] else {
            panic!("expected expression statement");
        };
        let ExprKind::Assign { name, value } = &expr.kind else {
            panic!("expected assignment");
        };
        assert_eq!(name.lexeme, "a");
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn for_desugars_to_while_in_blocks() {
        let (statements, diagnostics) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!diagnostics.had_error());
        assert_eq!(statements.len(), 1);

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected outer block for initializer");
        };
        assert!(matches!(outer[0], Stmt::Var { .. }));
        let Stmt::While { body, .. } = &outer[1] else {
            panic!("expected while loop");
        };
        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected body block with increment");
        };
        assert!(matches!(inner[0], Stmt::Print(_)));
        assert!(matches!(inner[1], Stmt::Expression(_)));
    }

    #[test]
    fn for_without_condition_gets_synthetic_true() {
        let (statements, diagnostics) = parse("for (;;) print 1;");
        assert!(!diagnostics.had_error());
        let Stmt::While { condition, .. } = &statements[0] else {
            panic!("expected bare while, got {:?}", statements[0]);
        };
        assert_eq!(condition.kind, ExprKind::Literal(Value::Bool(true)));
    }

    #[test]
    fn argument_cap_reports_but_keeps_parsing() {
        let mut source = String::from("f(");
        for _ in 0..256 {
            source.push_str("0, ");
        }
        source.push_str("0);");
        let (statements, diagnostics) = parse(&source);
        assert!(diagnostics
            .as_slice()
            .iter()
            .any(|d| d.message.contains("255 arguments")));
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn reserved_words_do_not_parse_as_identifiers() {
        let (_, diagnostics) = parse("var class = 1;");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn expression_ids_are_unique() {
        let (statements, _) = parse("1 + 2 * 3;");
        let Stmt::Expression(root) = &statements[0] else {
            panic!("expected expression statement");
        };
        let mut ids = Vec::new();
        collect_ids(root, &mut ids);
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    fn collect_ids(expr: &Expr, ids: &mut Vec<crate::ast::ExprId>) {
        ids.push(expr.id);
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Variable { .. } => {}
            ExprKind::Grouping(inner) => collect_ids(inner, ids),
            ExprKind::Unary { right, .. } => collect_ids(right, ids),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                collect_ids(left, ids);
                collect_ids(right, ids);
            }
            ExprKind::Assign { value, .. } => collect_ids(value, ids),
            ExprKind::Call {
                callee, arguments, ..
            } => {
                collect_ids(callee, ids);
                for argument in arguments {
                    collect_ids(argument, ids);
                }
            }
        }
    }
}
