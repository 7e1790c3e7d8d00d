//! Compile-time diagnostics collected by the lexer, parser and resolver.
//!
//! Every stage appends to a [`Diagnostics`] value it is handed; the pipeline
//! checks it between stages and stops as soon as it is non-empty.

use std::fmt;

use thiserror::Error;

use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::resolver::ResolveError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Diagnostic {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl Diagnostic {
    pub fn line(&self) -> usize {
        match self {
            Diagnostic::Lex(error) => error.line(),
            Diagnostic::Parse(error) => error.line,
            Diagnostic::Resolve(error) => error.line(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: impl Into<Diagnostic>) {
        let diagnostic = diagnostic.into();
        log::debug!("diagnostic: {diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        f.write_str(&lines.join("\n"))
    }
}
