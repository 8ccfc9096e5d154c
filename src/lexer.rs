use thiserror::Error;

use crate::diagnostics::{Diagnostic, ErrorKind};
use crate::token::{Position, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unterminated string.")]
    UnterminatedString { at: Position },
    #[error("Identifier starts with number.")]
    IdentifierStartsWithNumber { at: Position },
    #[error("Unexpected character '{character}'.")]
    UnexpectedCharacter { character: char, at: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnterminatedString { at }
            | LexError::IdentifierStartsWithNumber { at }
            | LexError::UnexpectedCharacter { at, .. } => *at,
        }
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::new(ErrorKind::Syntax, self.position(), self.to_string())
    }
}

pub type LexResult<T> = Result<T, LexError>;

/// Single-pass scanner producing the token stream for one source text.
///
/// Byte offsets drive the slicing; `line`/`column` are tracked separately in
/// characters so token spans line up with what an editor shows.
pub struct Lexer<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 0,
            start_line: 1,
            start_column: 0,
        }
    }

    pub fn scan_tokens(mut self) -> LexResult<Vec<Token>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token()?;
        }
        self.tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            self.line,
            self.column,
            0,
        ));
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> LexResult<()> {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenKind::LParen),
            ')' => self.add_token(TokenKind::RParen),
            '[' => self.add_token(TokenKind::LBracket),
            ']' => self.add_token(TokenKind::RBracket),
            ',' => self.add_token(TokenKind::Comma),
            '.' => self.add_token(TokenKind::Dot),
            ':' => self.add_token(TokenKind::Colon),
            '+' => self.add_token(TokenKind::Plus),
            '-' => self.add_token(TokenKind::Minus),
            '*' => self.add_token(TokenKind::Multiply),
            '/' => {
                // Division and `//` comments share a prefix.
                if self.match_char('/') {
                    self.skip_line_comment();
                } else {
                    self.add_token(TokenKind::Divide);
                }
            }
            '#' => self.skip_line_comment(),
            '=' => {
                let kind = if self.match_char('=') {
                    TokenKind::Equal
                } else {
                    TokenKind::Assign
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenKind::LtOrEq
                } else {
                    TokenKind::LessThan
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenKind::GtOrEq
                } else {
                    TokenKind::GreaterThan
                };
                self.add_token(kind);
            }
            ' ' | '\r' | '\t' | '\n' => {}
            '"' | '\'' => self.string(c)?,
            _ => {
                if c.is_ascii_digit() {
                    self.number()?;
                } else if c.is_alphabetic() || c == '_' {
                    self.identifier();
                } else {
                    return Err(LexError::UnexpectedCharacter {
                        character: c,
                        at: Position::new(self.start_line, self.start_column, 1),
                    });
                }
            }
        }
        Ok(())
    }

    /// Scan a string literal delimited by `quote`. Multi-line strings are
    /// permitted; the token stays anchored at the opening quote.
    fn string(&mut self, quote: char) -> LexResult<()> {
        while self.peek() != Some(quote) && !self.is_at_end() {
            self.advance();
        }

        if self.is_at_end() {
            return Err(LexError::UnterminatedString {
                at: Position::new(self.start_line, self.start_column, self.error_span_length()),
            });
        }

        self.advance(); // closing quote
        let value = self.source[self.start + 1..self.current - 1].to_string();
        self.add_literal_token(TokenKind::Str, value);
        Ok(())
    }

    /// Scan an integer or float literal. A dot only extends the number when a
    /// digit follows it, so `a.1` stays `a` `.` `1`.
    fn number(&mut self) -> LexResult<()> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            self.add_token(TokenKind::Float);
        } else if self.peek().is_some_and(|c| c.is_alphabetic()) {
            // A number running into letters is no identifier: `123abc`.
            return Err(LexError::IdentifierStartsWithNumber {
                at: Position::new(self.start_line, self.start_column, self.error_span_length()),
            });
        } else {
            self.add_token(TokenKind::Integer);
        }
        Ok(())
    }

    fn identifier(&mut self) {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let text = &self.source[self.start..self.current];
        let kind = keyword_kind(text).unwrap_or(TokenKind::Identifier);
        self.add_token(kind);
    }

    fn skip_line_comment(&mut self) {
        // The newline is left for normal handling.
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme = self.source[self.start..self.current].to_string();
        let length = lexeme.chars().count();
        self.tokens.push(Token::new(
            kind,
            lexeme,
            self.start_line,
            self.start_column,
            length,
        ));
    }

    /// Add a token whose lexeme is a decoded literal payload rather than the
    /// raw source slice; the span still covers the full source extent.
    fn add_literal_token(&mut self, kind: TokenKind, literal: String) {
        let length = self.source[self.start..self.current].chars().count();
        self.tokens.push(Token::new(
            kind,
            literal,
            self.start_line,
            self.start_column,
            length,
        ));
    }

    /// Length of the current span for error reporting, truncated at the first
    /// newline so carets never run off the offending line.
    fn error_span_length(&self) -> usize {
        let span = &self.source[self.start..self.current];
        let cut = span.find('\n').unwrap_or(span.len());
        span[..cut].chars().count().max(1)
    }

    fn advance(&mut self) -> char {
        let c = self.peek().unwrap_or('\0');
        self.current += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.current += expected.len_utf8();
            self.column += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.source[self.current..].chars().nth(1)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

fn keyword_kind(text: &str) -> Option<TokenKind> {
    // Legacy capitalized spellings are accepted as synonyms.
    let kind = match text {
        "CLASS" => TokenKind::Class,
        "INHERITS" => TokenKind::Inherits,
        "ATTRIBUTES" | "Attributes" => TokenKind::Attributes,
        "METHODS" | "Methods" => TokenKind::Methods,
        "FUNCTION" => TokenKind::Function,
        "RETURN" => TokenKind::Return,
        "NEW" | "new" => TokenKind::New,
        "END" => TokenKind::End,
        "IF" => TokenKind::If,
        "THEN" => TokenKind::Then,
        "ELSE" => TokenKind::Else,
        "WHILE" => TokenKind::While,
        "FOR" => TokenKind::For,
        "IN" => TokenKind::In,
        "PRINT" => TokenKind::Print,
        "TRUE" | "True" => TokenKind::True,
        "FALSE" | "False" => TokenKind::False,
        _ => return None,
    };
    Some(kind)
}

pub fn tokenize(source: &str) -> LexResult<Vec<Token>> {
    Lexer::new(source).scan_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn scans_simple_assignment() {
        let input = "x = 10\n";
        let tokens = tokenize(input).expect("tokenize should succeed");

        let expected = vec![
            (TokenKind::Identifier, "x"),
            (TokenKind::Assign, "="),
            (TokenKind::Integer, "10"),
            (TokenKind::Eof, ""),
        ];
        let actual: Vec<(TokenKind, &str)> = tokens
            .iter()
            .map(|token| (token.kind, token.lexeme.as_str()))
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn scans_function_declaration() {
        let input = indoc! {"
            FUNCTION add(a, b)
              RETURN a + b
            END add
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Function,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Identifier,
                TokenKind::RParen,
                TokenKind::Return,
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::Identifier,
                TokenKind::End,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_two_character_operators() {
        assert_eq!(
            kinds("a == b <= c >= d < e > f"),
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Identifier,
                TokenKind::LtOrEq,
                TokenKind::Identifier,
                TokenKind::GtOrEq,
                TokenKind::Identifier,
                TokenKind::LessThan,
                TokenKind::Identifier,
                TokenKind::GreaterThan,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn accepts_legacy_keyword_spellings() {
        assert_eq!(
            kinds("Attributes Methods True False new"),
            vec![
                TokenKind::Attributes,
                TokenKind::Methods,
                TokenKind::True,
                TokenKind::False,
                TokenKind::New,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_floats_from_dot_operator() {
        assert_eq!(
            kinds("3.14 a.b 2."),
            vec![
                TokenKind::Float,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Integer,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_both_comment_styles() {
        let input = indoc! {"
            x = 1 // trailing comment
            # full line comment
            y = 2
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Integer,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Integer,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_store_inner_text_and_full_span() {
        let tokens = tokenize("s = \"hello\"").expect("tokenize should succeed");
        let string = &tokens[2];
        assert_eq!(string.kind, TokenKind::Str);
        assert_eq!(string.lexeme, "hello");
        assert_eq!(string.column, 4);
        assert_eq!(string.length, 7);
    }

    #[test]
    fn single_quoted_strings_are_accepted() {
        let tokens = tokenize("'abc'").expect("tokenize should succeed");
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "abc");
    }

    #[test]
    fn tracks_lines_and_columns() {
        let input = "x = 1\n  y = 22\n";
        let tokens = tokenize(input).expect("tokenize should succeed");

        let y = &tokens[3];
        assert_eq!((y.line, y.column, y.length), (2, 2, 1));
        let twenty_two = &tokens[5];
        assert_eq!((twenty_two.line, twenty_two.column, twenty_two.length), (2, 6, 2));
        let eof = tokens.last().expect("token stream is never empty");
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.line, 3);
    }

    #[test]
    fn multi_line_string_is_anchored_at_opening_quote() {
        let tokens = tokenize("s = \"a\nb\"\nx").expect("tokenize should succeed");
        let string = &tokens[2];
        assert_eq!(string.lexeme, "a\nb");
        assert_eq!((string.line, string.column), (1, 4));
        let x = &tokens[3];
        assert_eq!(x.line, 3);
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = tokenize("PRINT(\"abc").expect_err("expected unterminated string");
        assert_eq!(
            err,
            LexError::UnterminatedString {
                at: Position::new(1, 6, 4),
            }
        );
        assert_eq!(err.to_string(), "Unterminated string.");
    }

    #[test]
    fn unterminated_string_span_stops_at_newline() {
        let err = tokenize("\"abc\ndef").expect_err("expected unterminated string");
        assert_eq!(
            err,
            LexError::UnterminatedString {
                at: Position::new(1, 0, 4),
            }
        );
    }

    #[test]
    fn errors_on_identifier_starting_with_number() {
        let err = tokenize("x = 123abc").expect_err("expected lex failure");
        assert_eq!(
            err,
            LexError::IdentifierStartsWithNumber {
                at: Position::new(1, 4, 3),
            }
        );
    }

    #[test]
    fn errors_on_unexpected_character() {
        let err = tokenize("x = 1 @ 2").expect_err("expected lex failure");
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                character: '@',
                at: Position::new(1, 6, 1),
            }
        );
        assert_eq!(err.to_string(), "Unexpected character '@'.");
    }

    #[test]
    fn empty_source_yields_lone_eof() {
        let tokens = tokenize("").expect("tokenize should succeed");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        assert_eq!((tokens[0].line, tokens[0].column), (1, 0));
    }
}
