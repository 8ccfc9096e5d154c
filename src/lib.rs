//! `scsa` library crate.
//!
//! Interpreter for the SCSA teaching-pseudocode language. High-level layout:
//! - frontend: `lexer` + `parser` produce the AST (`ast`)
//! - execution: `interpreter` walks the AST directly
//! - `diagnostics` renders stage errors with source context
//! - `printer` provides the token-table and AST debug renderings

pub mod ast;
pub mod diagnostics;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod token;
