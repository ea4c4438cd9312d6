// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Span-carrying s-expression trees over the WebAssembly text format.
//!
//! Tokens come from the `wast` lexer; this module only folds them into nested
//! lists and records the byte span of every node so that callers can splice
//! the original text.

use core::{fmt, mem};

use wast::lexer::{Lexer, TokenKind};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn slice<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexpr<'a> {
    /// A keyword, identifier, number or any other bare token.
    Atom { text: &'a str, span: Span },
    /// A string literal, including its surrounding quotes.
    Str { text: &'a str, span: Span },
    List { items: Vec<Sexpr<'a>>, span: Span },
}

impl<'a> Sexpr<'a> {
    pub fn span(&self) -> Span {
        match self {
            Sexpr::Atom { span, .. } | Sexpr::Str { span, .. } | Sexpr::List { span, .. } => *span,
        }
    }

    pub fn as_atom(&self) -> Option<&'a str> {
        match self {
            Sexpr::Atom { text, .. } => Some(*text),
            _ => None,
        }
    }

    /// Returns the leading keyword of a list, e.g. `func` for `(func $f ...)`.
    pub fn head(&self) -> Option<&'a str> {
        match self {
            Sexpr::List { items, .. } => items.first().and_then(Sexpr::as_atom),
            _ => None,
        }
    }
}

/// The disassembly could not be read as a sequence of balanced s-expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedDisassembly {
    pub offset: usize,
    pub reason: String,
}

impl MalformedDisassembly {
    fn new(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<wast::Error> for MalformedDisassembly {
    fn from(err: wast::Error) -> Self {
        Self::new(err.span().offset(), err.message())
    }
}

impl fmt::Display for MalformedDisassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed disassembly at byte {}: {}",
            self.offset, self.reason
        )
    }
}

impl core::error::Error for MalformedDisassembly {}

/// Reads `src` into the sequence of top-level s-expressions it contains.
///
/// # Errors
///
/// Returns [`MalformedDisassembly`] for unbalanced parentheses and for
/// anything the `wast` lexer rejects (unterminated strings or block comments,
/// stray characters).
pub fn parse(src: &str) -> Result<Vec<Sexpr<'_>>, MalformedDisassembly> {
    let mut current: Vec<Sexpr<'_>> = Vec::new();
    let mut open: Vec<(usize, Vec<Sexpr<'_>>)> = Vec::new();

    for token in Lexer::new(src).iter(0) {
        let token = token?;
        let span = Span {
            start: token.offset,
            end: token.offset + token.src(src).len(),
        };
        let text = span.slice(src);

        match token.kind {
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment => {}
            TokenKind::LParen => open.push((span.start, mem::take(&mut current))),
            TokenKind::RParen => {
                let Some((start, parent)) = open.pop() else {
                    return Err(MalformedDisassembly::new(span.start, "unbalanced `)`"));
                };
                let items = mem::replace(&mut current, parent);
                current.push(Sexpr::List {
                    items,
                    span: Span {
                        start,
                        end: span.end,
                    },
                });
            }
            TokenKind::String => current.push(Sexpr::Str { text, span }),
            TokenKind::Id
            | TokenKind::Keyword
            | TokenKind::Annotation
            | TokenKind::Reserved
            | TokenKind::Integer(_)
            | TokenKind::Float(_) => current.push(Sexpr::Atom { text, span }),
        }
    }

    if let Some((start, _)) = open.last() {
        return Err(MalformedDisassembly::new(*start, "unclosed `(`"));
    }

    Ok(current)
}
