use crate::diagnostic::Diagnostics;
use crate::token::{keyword, Literal, Token, TokenKind};

/// Turns source text into a token sequence terminated by an EOF token.
///
/// One left-to-right pass, no backtracking. Faults (stray characters,
/// unterminated strings) are reported to the diagnostics collector and
/// the scan keeps going, so one bad character never hides the rest of
/// the file.
pub struct Scanner<'src, 'd> {
    source: &'src str,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    diagnostics: &'d mut Diagnostics,
}

impl<'src, 'd> Scanner<'src, 'd> {
    pub fn new(source: &'src str, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            diagnostics,
        }
    }

    pub fn scan_tokens(mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }
        self.tokens
            .push(Token::new(TokenKind::Eof, String::new(), None, self.line));
        self.tokens
    }

    fn scan_token(&mut self) {
        let ch = self.advance();
        match ch {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            ',' => self.add_token(TokenKind::Comma),
            '.' => self.add_token(TokenKind::Dot),
            '-' => self.add_token(TokenKind::Minus),
            '+' => self.add_token(TokenKind::Plus),
            ';' => self.add_token(TokenKind::Semicolon),
            '*' => self.add_token(TokenKind::Star),
            '%' => self.add_token(TokenKind::Percent),
            '!' => {
                let kind = if self.match_next('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.match_next('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_next('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_next('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            '/' => {
                if self.match_next('/') {
                    // Comment runs to the end of the line.
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '"' => self.string(),
            _ => {
                if ch.is_ascii_digit() {
                    self.number();
                } else if is_identifier_start(ch) {
                    self.identifier();
                } else {
                    self.diagnostics.report(self.line, "Unexpected character.");
                }
            }
        }
    }

    /// Scans the remainder of a string literal; newlines are allowed
    /// inside and counted. An unterminated string is reported and
    /// produces no token.
    fn string(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '"' {
                break;
            }
            if ch == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.diagnostics.report(self.line, "Unterminated string.");
            return;
        }

        // Closing quote.
        self.advance();

        let value = self.source[self.start + 1..self.current - 1].to_string();
        self.add_literal_token(TokenKind::String, Literal::Str(value));
    }

    /// Scans a number: a digit run with at most one interior decimal
    /// point. The point is consumed only when a digit follows it, so
    /// `123.` lexes as the number `123` followed by a `.` token.
    fn number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let value: f64 = self.source[self.start..self.current].parse().unwrap();
        self.add_literal_token(TokenKind::Number, Literal::Number(value));
    }

    fn identifier(&mut self) {
        while self.peek().is_some_and(is_identifier_continue) {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        let kind = keyword(text).unwrap_or(TokenKind::Identifier);
        self.add_token(kind);
    }

    fn advance(&mut self) -> char {
        let ch = self.source[self.current..]
            .chars()
            .next()
            .expect("scanner advanced past end of input");
        self.current += ch.len_utf8();
        ch
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.current += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme = self.source[self.start..self.current].to_string();
        self.tokens.push(Token::new(kind, lexeme, None, self.line));
    }

    fn add_literal_token(&mut self, kind: TokenKind, literal: Literal) {
        let lexeme = self.source[self.start..self.current].to_string();
        self.tokens
            .push(Token::new(kind, lexeme, Some(literal), self.line));
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_identifier_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> (Vec<Token>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        (tokens, diagnostics)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diagnostics) = scan(source);
        assert!(!diagnostics.had_error(), "unexpected scan errors");
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn punctuation_and_operators() {
        assert_eq!(
            kinds("(){},.-+;*% ! != = == < <= > >= /"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Semicolon,
                TokenKind::Star,
                TokenKind::Percent,
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Slash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("and class else false for fun if nil or print return super this true var while"),
            vec![
                TokenKind::And,
                TokenKind::Class,
                TokenKind::Else,
                TokenKind::False,
                TokenKind::For,
                TokenKind::Fun,
                TokenKind::If,
                TokenKind::Nil,
                TokenKind::Or,
                TokenKind::Print,
                TokenKind::Return,
                TokenKind::Super,
                TokenKind::This,
                TokenKind::True,
                TokenKind::Var,
                TokenKind::While,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("foo _bar baz42 printer"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn number_literals() {
        let (tokens, _) = scan("42 3.25 0.5");
        assert_eq!(tokens[0].literal, Some(Literal::Number(42.0)));
        assert_eq!(tokens[1].literal, Some(Literal::Number(3.25)));
        assert_eq!(tokens[2].literal, Some(Literal::Number(0.5)));
    }

    #[test]
    fn trailing_dot_is_not_part_of_number() {
        assert_eq!(
            kinds("123."),
            vec![TokenKind::Number, TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn string_literal_value() {
        let (tokens, _) = scan("\"hello\"");
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].literal, Some(Literal::Str("hello".to_string())));
        assert_eq!(tokens[0].lexeme, "\"hello\"");
    }

    #[test]
    fn multiline_string_counts_lines() {
        let (tokens, diagnostics) = scan("\"a\nb\" x");
        assert!(!diagnostics.had_error());
        assert_eq!(tokens[0].literal, Some(Literal::Str("a\nb".to_string())));
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string_reports_and_continues() {
        let (tokens, diagnostics) = scan("\"open");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.as_slice()[0].message.contains("Unterminated string"));
        // The broken literal produces no token, only EOF remains.
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn unknown_character_skipped() {
        let (tokens, diagnostics) = scan("1 @ 2");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn comments_and_whitespace_ignored() {
        assert_eq!(
            kinds("true // the rest is ignored\nfalse"),
            vec![TokenKind::True, TokenKind::False, TokenKind::Eof]
        );
    }

    #[test]
    fn line_numbers_advance() {
        let (tokens, _) = scan("1\n2 3\n4");
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 2, 3, 3]);
    }
}
