//! Error rendering with source context.
//!
//! Stage errors are plain values (`Result`) everywhere in the crate; the
//! driver hands them to a [`Reporter`] which renders one diagnostic block and
//! leaves process exit to the caller. Nothing in here unwinds.

use std::fmt;

use color_print::cformat;

use crate::token::Position;

/// Pipeline stage named in the diagnostic header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lexing,
    Parsing,
    Runtime,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Lexing => "Lexing",
            Stage::Parsing => "Parsing",
            Stage::Runtime => "Runtime",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Type,
    Runtime,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "Syntax Error",
            ErrorKind::Type => "Type Error",
            ErrorKind::Runtime => "Runtime Error",
        }
    }
}

/// One renderable error: kind, span, message.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub line: usize,
    pub column: usize,
    pub length: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, at: Position, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: at.line,
            column: at.column,
            length: at.length.max(1),
            message: message.into(),
        }
    }
}

/// Renders diagnostics against one source text.
pub struct Reporter<'a> {
    source: &'a str,
    filename: Option<&'a str>,
    stage: Stage,
}

impl<'a> Reporter<'a> {
    pub fn new(source: &'a str, filename: Option<&'a str>, stage: Stage) -> Self {
        Self {
            source,
            filename,
            stage,
        }
    }

    /// Write the rendered block to stderr.
    pub fn emit(&self, diagnostic: &Diagnostic) {
        eprint!("{}", self.render(diagnostic));
    }

    /// Build the diagnostic block: stage header, file banner, dimmed context
    /// gutter, highlighted span, caret underline with label and message.
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();
        out.push_str(&cformat!(
            "<red>[An error occurred during stage: '{}']</>\n",
            self.stage
        ));
        if let Some(name) = self.filename {
            out.push_str(&cformat!(
                "  <blue>--></> {}:{}:{}\n",
                name,
                diagnostic.line,
                diagnostic.column + 1
            ));
        }

        let lines: Vec<&str> = self.source.lines().collect();
        let index = diagnostic.line.saturating_sub(1);

        // Up to two preceding context lines, dimmed.
        for i in index.saturating_sub(2)..index {
            if let Some(text) = lines.get(i) {
                out.push_str(&cformat!(" <blue>{:>4} |</> <dim>{}</>\n", i + 1, text));
            }
        }

        let offending: Vec<char> = lines.get(index).copied().unwrap_or("").chars().collect();
        let column = diagnostic.column.min(offending.len());
        let available = offending.len().saturating_sub(column);
        let length = diagnostic.length.max(1).min(available.max(1));

        let before: String = offending[..column].iter().collect();
        let span_end = (column + length).min(offending.len());
        let span: String = offending[column..span_end].iter().collect();
        let after: String = offending[span_end..].iter().collect();
        out.push_str(&cformat!(
            " <blue>{:>4} |</> {}<red>{}</>{}\n",
            diagnostic.line,
            before,
            span,
            after
        ));

        // Caret row. Tabs in the leading indentation are copied through so
        // the underline stays aligned on tab-using sources.
        let mut pad = String::new();
        for c in offending.iter().take(column) {
            pad.push(if *c == '\t' { '\t' } else { ' ' });
        }
        while pad.len() < column {
            pad.push(' ');
        }
        let carets = "^".repeat(length);
        out.push_str(&cformat!(
            "      <blue>|</> {}<red>{} {}: {}</>\n",
            pad,
            carets,
            diagnostic.kind.label(),
            diagnostic.message
        ));

        // One trailing context line when it exists.
        if let Some(text) = lines.get(index + 1) {
            out.push_str(&cformat!(" <blue>{:>4} |</> <dim>{}</>\n", index + 2, text));
        }

        out
    }
}
