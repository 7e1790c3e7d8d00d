use std::{iter::Peekable, str::CharIndices};

use log::debug;

use crate::diagnostics::Diagnostics;
use crate::token::{Literal, Token, TokenKind};

mod error;

pub use error::LexError;

const TAB_WIDTH: usize = 4;

pub struct Lexer<'a, 'd> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    indent_stack: Vec<usize>,
    tokens: Vec<Token>,
    diagnostics: &'d mut Diagnostics,
    start: usize,
    line: usize,
}

impl<'a, 'd> Lexer<'a, 'd> {
    /// `input` must already use `\n` line endings, see [`scan`].
    pub fn new(input: &'a str, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            indent_stack: vec![0],
            tokens: Vec::new(),
            diagnostics,
            start: 0,
            line: 1,
        }
    }

    /// Produces the raw token stream, before [`layout`].
    pub fn tokenize(mut self) -> Vec<Token> {
        while let Some(&(start, _)) = self.chars.peek() {
            self.start = start;
            self.scan_token();
        }

        // Terminates the last statement even without a trailing newline.
        self.add_structural(TokenKind::Newline);
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.add_structural(TokenKind::Dedent);
        }
        self.add_structural(TokenKind::EOF);
        self.tokens
    }

    fn scan_token(&mut self) {
        let Some((_, ch)) = self.advance_char() else {
            return;
        };

        match ch {
            ':' => self.add_token(TokenKind::Colon),
            ',' => self.add_token(TokenKind::Comma),
            '(' => self.add_token(TokenKind::LParen),
            ')' => self.add_token(TokenKind::RParen),
            '[' => self.add_token(TokenKind::LBracket),
            ']' => self.add_token(TokenKind::RBracket),
            '{' => self.add_token(TokenKind::LBrace),
            '}' => self.add_token(TokenKind::RBrace),
            '?' => self.add_token(TokenKind::QuestionMark),
            '-' => self.add_token(TokenKind::Minus),
            '*' => self.add_token(TokenKind::Star),
            '/' => self.add_token(TokenKind::Slash),
            '^' => self.add_token(TokenKind::Caret),
            '%' => self.add_token(TokenKind::Percent),
            '+' => {
                let kind = if self.eat('+') {
                    TokenKind::PlusPlus
                } else {
                    TokenKind::Plus
                };
                self.add_token(kind);
            }
            '!' => {
                let kind = if self.eat('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.eat('=') {
                    TokenKind::EqualEqual
                } else if self.eat('>') {
                    TokenKind::FatArrow
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.eat('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.eat('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            '#' => self.skip_comment(),
            ' ' | '\t' => {}
            '\n' => {
                self.add_structural(TokenKind::Newline);
                self.line += 1;
                self.scan_indentation();
            }
            '\'' => self.read_string(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(),
            character => self.diagnostics.push(LexError::UnexpectedCharacter {
                character,
                line: self.line,
            }),
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    /// Measures the leading whitespace of the line that just started and
    /// emits `Indent`/`Dedent` against the indentation stack.
    fn scan_indentation(&mut self) {
        let mut width = 0;
        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width += TAB_WIDTH,
                _ => break,
            }
            self.advance_char();
        }

        // Blank and comment-only lines never open or close blocks.
        if matches!(self.chars.peek(), None | Some((_, '\n' | '#'))) {
            return;
        }

        let current = self.current_indent();
        if width > current {
            self.indent_stack.push(width);
            self.add_structural(TokenKind::Indent);
        } else if width < current {
            while width < self.current_indent() {
                self.indent_stack.pop();
                self.add_structural(TokenKind::Dedent);
            }
            if width != self.current_indent() {
                self.diagnostics.push(LexError::InvalidDedent {
                    width,
                    line: self.line,
                });
            }
        }
    }

    fn read_string(&mut self) {
        let start_line = self.line;
        loop {
            match self.chars.peek() {
                None => {
                    self.diagnostics
                        .push(LexError::UnterminatedString { line: start_line });
                    return;
                }
                Some(&(_, '\'')) => break,
                Some(&(_, '\n')) => {
                    self.line += 1;
                    self.advance_char();
                }
                Some(_) => {
                    self.advance_char();
                }
            }
        }
        self.advance_char(); // Consume closing quote

        let end = self.current_index();
        let content = self.input[self.start + 1..end - 1].to_string();
        self.tokens.push(
            Token::new(TokenKind::String, &self.input[self.start..end], start_line)
                .with_literal(Literal::String(content)),
        );
    }

    fn read_number(&mut self) {
        self.consume_digits();
        if self.peek_char() == Some('.') && self.peek_next_char().is_some_and(|c| c.is_ascii_digit())
        {
            self.advance_char(); // Consume '.'
            self.consume_digits();
        }

        let end = self.current_index();
        let lexeme = &self.input[self.start..end];
        // Digits with an optional fraction always form a valid float.
        let value = lexeme.parse::<f64>().unwrap_or_default();
        self.tokens.push(
            Token::new(TokenKind::Number, lexeme, self.line).with_literal(Literal::Number(value)),
        );
    }

    fn read_identifier(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end = self.current_index();
        let ident = &self.input[self.start..end];
        let kind = TokenKind::keyword(ident).unwrap_or(TokenKind::Identifier);
        self.add_token(kind);
    }

    fn consume_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance_char();
        }
    }
}

impl<'a, 'd> Lexer<'a, 'd> {
    fn advance_char(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance_char();
            true
        } else {
            false
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn current_indent(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }

    fn add_token(&mut self, kind: TokenKind) {
        let end = self.current_index();
        let lexeme = &self.input[self.start..end];
        self.tokens.push(Token::new(kind, lexeme, self.line));
    }

    fn add_structural(&mut self, kind: TokenKind) {
        self.tokens.push(Token::structural(kind, self.line));
    }
}

/// Normalizes statement separators: drops leading newlines, folds
/// `Newline Indent` into `Indent` and runs of newlines into one.
pub fn layout(tokens: Vec<Token>) -> Vec<Token> {
    let mut tokens = tokens
        .into_iter()
        .skip_while(|token| token.kind == TokenKind::Newline)
        .peekable();
    let mut laid_out = Vec::new();
    while let Some(token) = tokens.next() {
        if token.kind == TokenKind::Newline
            && matches!(
                tokens.peek().map(Token::kind),
                Some(TokenKind::Newline | TokenKind::Indent)
            )
        {
            continue;
        }
        laid_out.push(token);
    }
    laid_out
}

/// Scans `source` into a laid-out token stream. Lexical errors are recorded in
/// `diagnostics` and scanning carries on past them.
pub fn scan(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
    let tokens = layout(Lexer::new(&normalized, diagnostics).tokenize());
    debug!("lexer produced {} tokens", tokens.len());
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan(source, &mut diagnostics);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics}");
        tokens.into_iter().map(|token| token.kind).collect()
    }

    fn lex_errors(source: &str) -> Vec<LexError> {
        let mut diagnostics = Diagnostics::new();
        scan(source, &mut diagnostics);
        diagnostics
            .iter()
            .filter_map(|diagnostic| match diagnostic {
                crate::diagnostics::Diagnostic::Lex(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let input = indoc! {"
            func add(a, b)
                ret a + b
            print add(1, 2)
        "};
        let expected = vec![
            TokenKind::Func,
            TokenKind::Identifier,
            TokenKind::LParen,
            TokenKind::Identifier,
            TokenKind::Comma,
            TokenKind::Identifier,
            TokenKind::RParen,
            TokenKind::Indent,
            TokenKind::Ret,
            TokenKind::Identifier,
            TokenKind::Plus,
            TokenKind::Identifier,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Print,
            TokenKind::Identifier,
            TokenKind::LParen,
            TokenKind::Number,
            TokenKind::Comma,
            TokenKind::Number,
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::EOF,
        ];
        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn tab_and_four_spaces_open_the_same_block() {
        let spaces = "while x\n    print x\n";
        let tabs = "while x\n\tprint x\n";
        assert_eq!(kinds(spaces), kinds(tabs));
    }

    #[test]
    fn closes_open_blocks_at_end_of_input() {
        let input = "if a\n  if b\n    print 1";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::If,
                TokenKind::Identifier,
                TokenKind::Indent,
                TokenKind::If,
                TokenKind::Identifier,
                TokenKind::Indent,
                TokenKind::Print,
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Dedent,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn blank_and_comment_lines_do_not_change_indentation() {
        let input = indoc! {"

            # leading comment
            while x
                print 1

              # shallower comment
                print 2
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::While,
                TokenKind::Identifier,
                TokenKind::Indent,
                TokenKind::Print,
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::Print,
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn recognizes_two_character_operators() {
        assert_eq!(
            kinds("a != b == c => d ++ e <= f >= g ! h = i + j < k > l"),
            vec![
                TokenKind::Identifier,
                TokenKind::BangEqual,
                TokenKind::Identifier,
                TokenKind::EqualEqual,
                TokenKind::Identifier,
                TokenKind::FatArrow,
                TokenKind::Identifier,
                TokenKind::PlusPlus,
                TokenKind::Identifier,
                TokenKind::LessEqual,
                TokenKind::Identifier,
                TokenKind::GreaterEqual,
                TokenKind::Identifier,
                TokenKind::Bang,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::Identifier,
                TokenKind::Less,
                TokenKind::Identifier,
                TokenKind::Greater,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn reads_number_and_string_literals() {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan("print 3.25 ++ 'lamp'", &mut diagnostics);
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[1].literal, Some(Literal::Number(3.25)));
        assert_eq!(tokens[3].lexeme, "'lamp'");
        assert_eq!(tokens[3].literal, Some(Literal::String("lamp".to_string())));
    }

    #[test]
    fn multi_line_strings_advance_the_line_counter() {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan("print 'one\ntwo'\nprint x\r\n", &mut diagnostics);
        assert!(diagnostics.is_empty());
        assert_eq!(
            tokens[1].literal,
            Some(Literal::String("one\ntwo".to_string()))
        );
        let second_print = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Print)
            .nth(1)
            .expect("second print");
        assert_eq!(second_print.line, 3);
    }

    #[test]
    fn errors_on_inconsistent_dedent() {
        let input = "if a\n    print 1\n  print 2\n";
        assert_eq!(
            lex_errors(input),
            vec![LexError::InvalidDedent { width: 2, line: 3 }]
        );
    }

    #[test]
    fn keeps_scanning_after_unexpected_character() {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan("let x = 1 @ 2\n", &mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.to_string().contains("unexpected character '@'"));
        let numbers = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Number)
            .count();
        assert_eq!(numbers, 2);
    }

    #[test]
    fn errors_on_unterminated_string() {
        assert_eq!(
            lex_errors("print 'never closed\n\n"),
            vec![LexError::UnterminatedString { line: 1 }]
        );
    }
}
