use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Delimiters
    Colon,        // :
    Comma,        // ,
    LParen,       // (
    RParen,       // )
    LBracket,     // [
    RBracket,     // ]
    LBrace,       // {
    RBrace,       // }
    QuestionMark, // ?

    // Operators
    Plus,         // +
    PlusPlus,     // ++
    Minus,        // -
    Star,         // *
    Slash,        // /
    Caret,        // ^
    Percent,      // %
    Bang,         // !
    BangEqual,    // !=
    Equal,        // =
    EqualEqual,   // ==
    FatArrow,     // =>
    Greater,      // >
    GreaterEqual, // >=
    Less,         // <
    LessEqual,    // <=

    // Literals
    Identifier,
    String,
    Number,

    // Keywords
    And,
    Or,
    Xor,
    If,
    Elif,
    Else,
    True,
    False,
    Func,
    Ret,
    Let,
    While,
    Print,
    Nihl,
    Break,
    Continue,

    // Structural
    Newline,
    Indent,
    Dedent,
    EOF,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "if" => Self::If,
            "elif" => Self::Elif,
            "else" => Self::Else,
            "true" => Self::True,
            "false" => Self::False,
            "func" => Self::Func,
            "ret" => Self::Ret,
            "let" => Self::Let,
            "while" => Self::While,
            "print" => Self::Print,
            "nihl" => Self::Nihl,
            "break" => Self::Break,
            "continue" => Self::Continue,
            _ => return None,
        };
        Some(kind)
    }
}

/// Value carried by `String` and `Number` tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub literal: Option<Literal>,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            literal: None,
        }
    }

    pub fn with_literal(mut self, literal: Literal) -> Self {
        self.literal = Some(literal);
        self
    }

    /// Structural tokens have no source text.
    pub fn structural(kind: TokenKind, line: usize) -> Self {
        Self::new(kind, "", line)
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Where a diagnostic attached to this token points to.
    pub fn location(&self) -> Location {
        match self.kind {
            TokenKind::EOF => Location::EndOfFile,
            TokenKind::Newline => Location::EndOfLine,
            TokenKind::Indent => Location::Indent,
            TokenKind::Dedent => Location::Dedent,
            _ => Location::Lexeme(self.lexeme.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Lexeme(String),
    EndOfLine,
    EndOfFile,
    Indent,
    Dedent,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Lexeme(lexeme) => write!(f, "at '{lexeme}'"),
            Location::EndOfLine => f.write_str("at end of line"),
            Location::EndOfFile => f.write_str("at end of file"),
            Location::Indent => f.write_str("at indent"),
            Location::Dedent => f.write_str("at dedent"),
        }
    }
}
