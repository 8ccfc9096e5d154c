use std::rc::Rc;

use log::trace;
use thiserror::Error;

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::diagnostics::{Diagnostic, ErrorKind};
use crate::token::{Position, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub at: Position,
}

impl ParseError {
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::new(ErrorKind::Syntax, self.at, self.message.clone())
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Binding strength of an infix token, low to high. Left-associative
/// operators parse their right operand one level up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Equality,
    Comparison,
    Term,
    Factor,
    Call,
}

impl Precedence {
    fn of(kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::Assign => Precedence::Assignment,
            TokenKind::Equal => Precedence::Equality,
            TokenKind::LessThan
            | TokenKind::GreaterThan
            | TokenKind::GtOrEq
            | TokenKind::LtOrEq
            | TokenKind::In => Precedence::Comparison,
            TokenKind::Plus | TokenKind::Minus => Precedence::Term,
            TokenKind::Multiply | TokenKind::Divide => Precedence::Factor,
            TokenKind::Dot | TokenKind::LParen | TokenKind::LBracket => Precedence::Call,
            _ => Precedence::None,
        }
    }

    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Call,
            Precedence::Call => Precedence::Call,
        }
    }
}

/// Recursive-descent statement parser with a Pratt expression core.
///
/// On a syntax error inside a declaration the parser records the error and
/// synchronizes to the next statement boundary, so one mistake does not
/// cascade; `parse` still fails with the first recorded error.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new(TokenKind::Eof, String::new(), 1, 0, 0));
        }
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(statements),
        }
    }

    // --- Statements ---

    fn declaration(&mut self) -> ParseResult<Stmt> {
        trace!("declaration @ '{}'", self.peek().lexeme);
        if self.match_kind(TokenKind::Class) {
            return self.class_declaration();
        }
        if self.match_kind(TokenKind::Function) {
            let function = self.function_declaration()?;
            return Ok(Stmt::Function(function));
        }
        self.statement()
    }

    /// CLASS name [INHERITS super] [ATTRIBUTES [:] attrs] [METHODS [:] fns] END name
    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expected class name.")?;
        trace!("class '{}'", name.lexeme);

        let superclass = if self.match_kind(TokenKind::Inherits) {
            Some(self.consume(TokenKind::Identifier, "Expected superclass name.")?)
        } else {
            None
        };

        // Attributes are parsed and discarded: fields only come into being
        // when a constructor assigns them.
        if self.match_kind(TokenKind::Attributes) {
            self.match_kind(TokenKind::Colon);
            while !self.check(TokenKind::Methods)
                && !self.check(TokenKind::End)
                && !self.is_at_end()
            {
                self.consume(TokenKind::Identifier, "Expected attribute name.")?;
                if self.match_kind(TokenKind::Assign) {
                    self.parse_expression(Precedence::None)?;
                }
            }
        }

        let mut methods = Vec::new();
        if self.match_kind(TokenKind::Methods) {
            self.match_kind(TokenKind::Colon);
            while !self.check(TokenKind::End) && !self.is_at_end() {
                self.consume(TokenKind::Function, "Expected 'FUNCTION' keyword.")?;
                methods.push(self.function_declaration()?);
            }
        }

        self.consume(TokenKind::End, "Expected 'END' after class body.")?;
        let end_name = self.consume(TokenKind::Identifier, "Expected class name after 'END'.")?;
        if end_name.lexeme != name.lexeme {
            return Err(self.error_at(
                &end_name,
                "Class name after 'END' does not match class declaration.",
            ));
        }

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    /// FUNCTION name(params) body END name. The FUNCTION keyword has already
    /// been consumed by the caller.
    fn function_declaration(&mut self) -> ParseResult<Rc<FunctionDecl>> {
        let name = self.consume(TokenKind::Identifier, "Expected function name.")?;
        trace!("function '{}'", name.lexeme);
        self.consume(TokenKind::LParen, "Expected '('.")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.consume(TokenKind::Identifier, "Expected parameter name.")?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "Expected ')'.")?;

        let body = self.block()?;

        self.consume(TokenKind::End, "Expected 'END' after function body.")?;
        let end_name =
            self.consume(TokenKind::Identifier, "Expected function name after 'END'.")?;
        if end_name.lexeme != name.lexeme {
            return Err(self.error_at(
                &end_name,
                "Function name after 'END' does not match function declaration.",
            ));
        }

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        trace!("statement @ '{}'", self.peek().lexeme);
        if self.match_kind(TokenKind::Return) {
            return self.return_statement();
        }
        if self.match_kind(TokenKind::Print) {
            return self.print_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_kind(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_kind(TokenKind::For) {
            return self.for_statement();
        }
        // Functions may nest: an inner FUNCTION closes over the enclosing
        // call's scope. Classes stay top-level.
        if self.match_kind(TokenKind::Function) {
            let function = self.function_declaration()?;
            return Ok(Stmt::Function(function));
        }

        let expr = self.parse_expression(Precedence::None)?;
        Ok(Stmt::Expression(expr))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::End) && !self.check(TokenKind::Else) {
            Some(self.parse_expression(Precedence::None)?)
        } else {
            None
        };
        Ok(Stmt::Return { keyword, value })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        self.consume(TokenKind::LParen, "Expected '(' after PRINT.")?;
        let value = self.parse_expression(Precedence::None)?;
        self.consume(TokenKind::RParen, "Expected ')' after PRINT argument.")?;
        Ok(Stmt::Print { keyword, value })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let condition = self.parse_expression(Precedence::None)?;
        let body = self.block()?;
        self.consume(TokenKind::End, "Expected 'END' after while loop.")?;
        self.consume(TokenKind::While, "Expected 'WHILE' after 'END'.")?;
        Ok(Stmt::While { condition, body })
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let condition = self.parse_expression(Precedence::None)?;
        self.consume(TokenKind::Then, "Expected 'THEN' after if condition.")?;

        let mut then_branch = Vec::new();
        while !self.check(TokenKind::Else) && !self.check(TokenKind::End) && !self.is_at_end() {
            then_branch.push(self.statement()?);
        }

        let mut else_branch = Vec::new();
        if self.match_kind(TokenKind::Else) {
            while !self.check(TokenKind::End) && !self.is_at_end() {
                else_branch.push(self.statement()?);
            }
        }

        self.consume(TokenKind::End, "Expected 'END' after if.")?;
        self.consume(TokenKind::If, "Expected 'IF' after 'END'.")?;

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let variable = self.consume(TokenKind::Identifier, "Expected loop variable after 'FOR'.")?;
        self.consume(TokenKind::In, "Expected 'IN' after loop variable.")?;
        let iterable = self.parse_expression(Precedence::None)?;
        let body = self.block()?;
        self.consume(TokenKind::End, "Expected 'END' after for loop.")?;
        self.consume(TokenKind::For, "Expected 'FOR' after 'END'.")?;
        Ok(Stmt::ForIn {
            variable,
            iterable,
            body,
        })
    }

    /// A block is a plain statement sequence; keywords terminate it.
    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::End) && !self.check(TokenKind::Else) && !self.is_at_end() {
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    // --- Expressions (Pratt) ---

    fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<Expr> {
        let prefix = self.peek().clone();
        if prefix.kind == TokenKind::Eof {
            return Err(self.error_at(&prefix, "Expected expression."));
        }
        self.advance();

        let mut left = match prefix.kind {
            TokenKind::Identifier => Expr::Variable(prefix),
            TokenKind::Integer
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::True
            | TokenKind::False => Expr::Literal(prefix),
            TokenKind::LParen => self.grouping()?,
            TokenKind::LBracket => self.array_literal()?,
            TokenKind::New => self.new_object()?,
            TokenKind::Minus => {
                // Unary minus desugars to `0 - right`, right operand parsed at
                // call precedence so it binds tight.
                let zero = Token::new(
                    TokenKind::Integer,
                    "0".to_string(),
                    prefix.line,
                    prefix.column,
                    1,
                );
                let right = self.parse_expression(Precedence::Call)?;
                Expr::Binary {
                    left: Box::new(Expr::Literal(zero)),
                    op: prefix,
                    right: Box::new(right),
                }
            }
            _ => return Err(self.error_at(&prefix, "Expected expression.")),
        };

        while precedence < Precedence::of(self.peek().kind) {
            self.advance();
            let infix = self.previous().clone();
            left = match infix.kind {
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Multiply
                | TokenKind::Divide
                | TokenKind::Equal
                | TokenKind::GreaterThan
                | TokenKind::GtOrEq
                | TokenKind::LessThan
                | TokenKind::LtOrEq
                | TokenKind::In => self.binary(left, infix)?,
                TokenKind::LParen => self.finish_call(left, infix)?,
                TokenKind::Dot => self.dot(left)?,
                TokenKind::LBracket => self.subscript(left, infix)?,
                TokenKind::Assign => self.assignment(left, infix)?,
                _ => break,
            };
        }

        Ok(left)
    }

    fn grouping(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expression(Precedence::None)?;
        self.consume(TokenKind::RParen, "Expected ')' after expression.")?;
        Ok(expr)
    }

    fn array_literal(&mut self) -> ParseResult<Expr> {
        let mut elements = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expression(Precedence::None)?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RBracket, "Expected ']' after array elements.")?;
        Ok(Expr::ArrayLit(elements))
    }

    fn new_object(&mut self) -> ParseResult<Expr> {
        let class_name = self.consume(TokenKind::Identifier, "Expected class name after 'new'.")?;
        self.consume(TokenKind::LParen, "Expected '(' after class name.")?;
        let args = self.arguments()?;
        Ok(Expr::New { class_name, args })
    }

    fn binary(&mut self, left: Expr, op: Token) -> ParseResult<Expr> {
        let right = self.parse_expression(Precedence::of(op.kind).next())?;
        Ok(Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn finish_call(&mut self, callee: Expr, paren: Token) -> ParseResult<Expr> {
        let args = self.arguments()?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            args,
        })
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression(Precedence::None)?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "Expected ')' after arguments.")?;
        Ok(args)
    }

    fn dot(&mut self, object: Expr) -> ParseResult<Expr> {
        let name = self.consume(TokenKind::Identifier, "Expected property name after '.'.")?;
        Ok(Expr::Get {
            object: Box::new(object),
            name,
        })
    }

    fn subscript(&mut self, array: Expr, bracket: Token) -> ParseResult<Expr> {
        let index = self.parse_expression(Precedence::None)?;
        self.consume(TokenKind::RBracket, "Expected ']' after index.")?;
        Ok(Expr::ArrayAccess {
            array: Box::new(array),
            bracket,
            index: Box::new(index),
        })
    }

    /// Right-associative: `a = b = c` parses as `a = (b = c)`.
    fn assignment(&mut self, target: Expr, op: Token) -> ParseResult<Expr> {
        if !matches!(
            target,
            Expr::Variable(_) | Expr::Get { .. } | Expr::ArrayAccess { .. }
        ) {
            return Err(self.error_at(&op, "Invalid assignment target."));
        }
        let value = self.parse_expression(Precedence::None)?;
        Ok(Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    // --- Token navigation ---

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            self.advance();
            Ok(self.previous().clone())
        } else {
            let token = self.peek().clone();
            Err(self.error_at(&token, message))
        }
    }

    fn error_at(&self, token: &Token, message: &str) -> ParseError {
        if token.kind == TokenKind::Eof {
            ParseError {
                message: format!("{message} at end"),
                at: Position::new(token.line, token.column, 1),
            }
        } else {
            ParseError {
                message: message.to_string(),
                at: token.position(),
            }
        }
    }

    /// Skip tokens until a statement boundary so one syntax error does not
    /// drown the rest of the file in follow-on reports.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::End {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Function
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }
}

pub fn parse_tokens(tokens: Vec<Token>) -> ParseResult<Vec<Stmt>> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_source(source: &str) -> Vec<Stmt> {
        let tokens = lexer::tokenize(source).expect("tokenize should succeed");
        parse_tokens(tokens).expect("parse should succeed")
    }

    fn parse_error(source: &str) -> ParseError {
        let tokens = lexer::tokenize(source).expect("tokenize should succeed");
        parse_tokens(tokens).expect_err("expected parse failure")
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let stmts = parse_source("1 + 2 * 3");

        let Stmt::Expression(Expr::Binary { left, op, right }) = &stmts[0] else {
            panic!("expected binary expression statement");
        };
        assert_eq!(op.kind, TokenKind::Plus);
        assert!(matches!(left.as_ref(), Expr::Literal(t) if t.lexeme == "1"));
        let Expr::Binary { op: inner, .. } = right.as_ref() else {
            panic!("expected nested multiplication");
        };
        assert_eq!(inner.kind, TokenKind::Multiply);
    }

    #[test]
    fn assignment_is_right_associative() {
        let stmts = parse_source("a = b = c");

        let Stmt::Expression(Expr::Assign { target, value }) = &stmts[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(target.as_ref(), Expr::Variable(t) if t.lexeme == "a"));
        let Expr::Assign { target: inner, .. } = value.as_ref() else {
            panic!("expected nested assignment");
        };
        assert!(matches!(inner.as_ref(), Expr::Variable(t) if t.lexeme == "b"));
    }

    #[test]
    fn call_chain_associates_left() {
        // a.b[c](d) == ((a.b)[c])(d)
        let stmts = parse_source("a.b[c](d)");

        let Stmt::Expression(Expr::Call { callee, args, .. }) = &stmts[0] else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        let Expr::ArrayAccess { array, .. } = callee.as_ref() else {
            panic!("expected subscript under call");
        };
        let Expr::Get { object, name } = array.as_ref() else {
            panic!("expected property access under subscript");
        };
        assert_eq!(name.lexeme, "b");
        assert!(matches!(object.as_ref(), Expr::Variable(t) if t.lexeme == "a"));
    }

    #[test]
    fn unary_minus_desugars_to_zero_minus() {
        let stmts = parse_source("-5");

        let Stmt::Expression(Expr::Binary { left, op, right }) = &stmts[0] else {
            panic!("expected desugared binary");
        };
        assert_eq!(op.kind, TokenKind::Minus);
        assert!(matches!(left.as_ref(), Expr::Literal(t) if t.lexeme == "0"));
        assert!(matches!(right.as_ref(), Expr::Literal(t) if t.lexeme == "5"));
    }

    #[test]
    fn parses_function_declaration_with_params() {
        let stmts = parse_source("FUNCTION add(a, b)\nRETURN a + b\nEND add");

        let Stmt::Function(decl) = &stmts[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(decl.name.lexeme, "add");
        let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
        assert_eq!(params, vec!["a", "b"]);
        assert_eq!(decl.body.len(), 1);
        assert!(matches!(&decl.body[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn parses_if_else_and_while() {
        let stmts = parse_source(
            "IF x > 1 THEN\nPRINT(1)\nELSE\nPRINT(2)\nEND IF\nWHILE x > 0\nx = x - 1\nEND WHILE",
        );

        let Stmt::If {
            then_branch,
            else_branch,
            ..
        } = &stmts[0]
        else {
            panic!("expected if statement");
        };
        assert_eq!(then_branch.len(), 1);
        assert_eq!(else_branch.len(), 1);
        assert!(matches!(&stmts[1], Stmt::While { body, .. } if body.len() == 1));
    }

    #[test]
    fn parses_for_in_loop() {
        let stmts = parse_source("FOR x IN [1, 2]\nPRINT(x)\nEND FOR");

        let Stmt::ForIn {
            variable,
            iterable,
            body,
        } = &stmts[0]
        else {
            panic!("expected for-in statement");
        };
        assert_eq!(variable.lexeme, "x");
        assert!(matches!(iterable, Expr::ArrayLit(elements) if elements.len() == 2));
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn class_stores_methods_and_discards_attributes() {
        let source = "CLASS Dog INHERITS Animal\nATTRIBUTES:\nname\nage = 3\nMETHODS:\nFUNCTION speak(self)\nRETURN 1\nEND speak\nEND Dog";
        let stmts = parse_source(source);

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &stmts[0]
        else {
            panic!("expected class declaration");
        };
        assert_eq!(name.lexeme, "Dog");
        assert_eq!(superclass.as_ref().map(|t| t.lexeme.as_str()), Some("Animal"));
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name.lexeme, "speak");
    }

    #[test]
    fn return_without_value_before_end() {
        let stmts = parse_source("FUNCTION f()\nRETURN\nEND f");

        let Stmt::Function(decl) = &stmts[0] else {
            panic!("expected function declaration");
        };
        assert!(matches!(&decl.body[0], Stmt::Return { value: None, .. }));
    }

    #[test]
    fn errors_on_mismatched_end_name() {
        let err = parse_error("FUNCTION f()\nRETURN 1\nEND g");
        assert_eq!(
            err.message,
            "Function name after 'END' does not match function declaration."
        );
        assert_eq!(err.at.line, 3);

        let err = parse_error("CLASS A\nEND B");
        assert_eq!(
            err.message,
            "Class name after 'END' does not match class declaration."
        );
    }

    #[test]
    fn errors_on_invalid_assignment_target() {
        let err = parse_error("1 + 2 = 3");
        assert_eq!(err.message, "Invalid assignment target.");
    }

    #[test]
    fn eof_errors_carry_at_end_suffix() {
        let err = parse_error("PRINT(1");
        assert_eq!(err.message, "Expected ')' after PRINT argument. at end");
        assert_eq!(err.at.length, 1);
    }

    #[test]
    fn dangling_expression_at_eof_is_reported() {
        let err = parse_error("x = ");
        assert_eq!(err.message, "Expected expression. at end");
    }

    #[test]
    fn synchronization_reports_first_error_only() {
        // Two broken declarations: the parser recovers after the first and
        // still surfaces it as the failure.
        let err = parse_error("PRINT 1\nPRINT ]");
        assert_eq!(err.message, "Expected '(' after PRINT.");
        assert_eq!(err.at.line, 1);
    }

    #[test]
    fn empty_token_stream_parses_to_no_statements() {
        let stmts = parse_source("");
        assert!(stmts.is_empty());
    }
}
