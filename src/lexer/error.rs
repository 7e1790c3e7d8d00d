use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Error [line {line}]: unexpected character '{character}'")]
    UnexpectedCharacter { character: char, line: usize },
    #[error("Error [line {line}]: unterminated string")]
    UnterminatedString { line: usize },
    #[error("Error [line {line}]: indentation error, no open block is {width} columns wide")]
    InvalidDedent { width: usize, line: usize },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { line, .. }
            | LexError::UnterminatedString { line }
            | LexError::InvalidDedent { line, .. } => *line,
        }
    }
}
