use std::rc::Rc;

use log::{debug, trace};
use thiserror::Error;

use crate::ast::{
    BinaryOperator, Expression, FunctionDecl, LiteralValue, LogicalOperator, NodeId, Program,
    Statement, UnaryOperator,
};
use crate::diagnostics::Diagnostics;
use crate::token::{Literal, Location, Token, TokenKind};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Error [line {line}] {location}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub location: Location,
    pub message: String,
}

impl ParseError {
    fn at(token: &Token, message: impl Into<String>) -> Self {
        Self {
            line: token.line,
            location: token.location(),
            message: message.into(),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

type Level<'d> = fn(&mut Parser<'d>) -> ParseResult<Expression>;

pub struct Parser<'d> {
    tokens: Vec<Token>,
    current: usize,
    next_id: usize,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    pub fn new(mut tokens: Vec<Token>, diagnostics: &'d mut Diagnostics) -> Self {
        if tokens.last().map(Token::kind) != Some(TokenKind::EOF) {
            let line = tokens.last().map(|token| token.line).unwrap_or(1);
            tokens.push(Token::structural(TokenKind::EOF, line));
        }
        Self {
            tokens,
            current: 0,
            next_id: 0,
            diagnostics,
        }
    }

    pub fn parse_program(mut self) -> Program {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.statement() {
                trace!("parsed {statement}");
                statements.push(statement);
            }
        }
        Program { statements }
    }

    /// Parses one statement. A statement with a syntax error is reported,
    /// skipped up to the next synchronization point and dropped.
    fn statement(&mut self) -> Option<Statement> {
        let start = self.current;
        match self.parse_statement() {
            Ok(statement) => Some(statement),
            Err(error) => {
                self.diagnostics.push(error);
                if self.current == start {
                    self.advance();
                }
                self.synchronize();
                None
            }
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.peek().kind {
            TokenKind::Print => self.print_statement(),
            TokenKind::Let => self.let_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Func => self.func_statement(),
            TokenKind::Ret => self.ret_statement(),
            TokenKind::Break => {
                let keyword = self.advance();
                self.expect(TokenKind::Newline, "expect new line after 'break'")?;
                Ok(Statement::Break(keyword))
            }
            TokenKind::Continue => {
                let keyword = self.advance();
                self.expect(TokenKind::Newline, "expect new line after 'continue'")?;
                Ok(Statement::Continue(keyword))
            }
            _ => {
                let expr = self.expression()?;
                self.expect(
                    TokenKind::Newline,
                    "expect new line after expression statement",
                )?;
                Ok(Statement::Expression(expr))
            }
        }
    }

    fn print_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.advance();
        let value = self.expression()?;
        self.expect(TokenKind::Newline, "expect new line after print statement")?;
        Ok(Statement::Print { keyword, value })
    }

    fn let_statement(&mut self) -> ParseResult<Statement> {
        self.advance();
        let name = self.expect(TokenKind::Identifier, "expect variable name after 'let'")?;
        let initializer = if self.eat(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Newline, "expect new line after let statement")?;
        Ok(Statement::Let { name, initializer })
    }

    fn if_statement(&mut self) -> ParseResult<Statement> {
        self.advance();
        let mut branches = Vec::new();
        let condition = self.expression()?;
        branches.push((condition, self.block("if")?));
        while self.eat(TokenKind::Elif) {
            let condition = self.expression()?;
            branches.push((condition, self.block("elif")?));
        }
        if self.eat(TokenKind::Else) {
            let always = Expression::Literal(LiteralValue::Boolean(true));
            branches.push((always, self.block("else")?));
        }
        Ok(Statement::If { branches })
    }

    fn while_statement(&mut self) -> ParseResult<Statement> {
        self.advance();
        let condition = self.expression()?;
        let body = self.block("while")?;
        Ok(Statement::While {
            condition,
            body: Box::new(body),
        })
    }

    fn func_statement(&mut self) -> ParseResult<Statement> {
        self.advance();
        let name = self.expect(TokenKind::Identifier, "expect function name after 'func'")?;
        self.expect(TokenKind::LParen, "expect '(' after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.expect(TokenKind::Identifier, "expect parameter name")?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "expect ')' after parameters")?;
        let body = self.block_statements("function declaration")?;
        Ok(Statement::Func(Rc::new(FunctionDecl { name, params, body })))
    }

    fn ret_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.advance();
        let value = if self.check(TokenKind::Newline) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::Newline, "expect new line after ret statement")?;
        Ok(Statement::Ret { keyword, value })
    }

    fn block(&mut self, context: &str) -> ParseResult<Statement> {
        Ok(Statement::Block(self.block_statements(context)?))
    }

    /// `[':'] Indent statement* Dedent`
    fn block_statements(&mut self, context: &str) -> ParseResult<Vec<Statement>> {
        self.eat(TokenKind::Colon);
        self.expect(
            TokenKind::Indent,
            &format!("expect indented block after {context}"),
        )?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::Dedent) && !self.is_at_end() {
            if let Some(statement) = self.statement() {
                statements.push(statement);
            }
        }
        self.expect(TokenKind::Dedent, "expect end of block")?;
        Ok(statements)
    }

    fn expression(&mut self) -> ParseResult<Expression> {
        self.comma()
    }

    fn comma(&mut self) -> ParseResult<Expression> {
        self.binary_level(Self::assignment, &[(TokenKind::Comma, BinaryOperator::Comma)])
    }

    fn assignment(&mut self) -> ParseResult<Expression> {
        let target = self.ternary()?;
        if !self.check(TokenKind::Equal) {
            return Ok(target);
        }
        let equals = self.advance();
        let value = Box::new(self.assignment()?);
        match target {
            Expression::Variable { id, name } => Ok(Expression::Assign { id, name, value }),
            Expression::Index {
                object,
                bracket,
                index,
            } => Ok(Expression::SetIndex {
                object,
                bracket,
                index,
                value,
            }),
            other => {
                // Reported without unwinding; the surrounding statement parses on.
                self.diagnostics
                    .push(ParseError::at(&equals, "invalid assignment target"));
                Ok(other)
            }
        }
    }

    fn ternary(&mut self) -> ParseResult<Expression> {
        let condition = self.logic_or()?;
        if !self.eat(TokenKind::QuestionMark) {
            return Ok(condition);
        }
        let then_branch = self.ternary()?;
        self.expect(TokenKind::Colon, "expect ':' after '?' in ternary expression")?;
        let else_branch = self.ternary()?;
        Ok(Expression::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn logic_or(&mut self) -> ParseResult<Expression> {
        self.logical_level(
            Self::logic_and,
            &[
                (TokenKind::Or, LogicalOperator::Or),
                (TokenKind::Xor, LogicalOperator::Xor),
            ],
        )
    }

    fn logic_and(&mut self) -> ParseResult<Expression> {
        self.logical_level(Self::equality, &[(TokenKind::And, LogicalOperator::And)])
    }

    fn equality(&mut self) -> ParseResult<Expression> {
        self.binary_level(
            Self::comparison,
            &[
                (TokenKind::EqualEqual, BinaryOperator::Equal),
                (TokenKind::BangEqual, BinaryOperator::NotEqual),
            ],
        )
    }

    fn comparison(&mut self) -> ParseResult<Expression> {
        self.binary_level(
            Self::additive,
            &[
                (TokenKind::Less, BinaryOperator::Less),
                (TokenKind::LessEqual, BinaryOperator::LessEqual),
                (TokenKind::Greater, BinaryOperator::Greater),
                (TokenKind::GreaterEqual, BinaryOperator::GreaterEqual),
            ],
        )
    }

    fn additive(&mut self) -> ParseResult<Expression> {
        self.binary_level(
            Self::multiplicative,
            &[
                (TokenKind::Plus, BinaryOperator::Add),
                (TokenKind::Minus, BinaryOperator::Sub),
                (TokenKind::PlusPlus, BinaryOperator::Concat),
            ],
        )
    }

    fn multiplicative(&mut self) -> ParseResult<Expression> {
        self.binary_level(
            Self::power,
            &[
                (TokenKind::Star, BinaryOperator::Mul),
                (TokenKind::Slash, BinaryOperator::Div),
                (TokenKind::Percent, BinaryOperator::Rem),
            ],
        )
    }

    /// Right-associative: `2 ^ 3 ^ 2` is `2 ^ (3 ^ 2)`.
    fn power(&mut self) -> ParseResult<Expression> {
        let left = self.unary()?;
        if !self.check(TokenKind::Caret) {
            return Ok(left);
        }
        let token = self.advance();
        let right = self.power()?;
        Ok(Expression::Binary {
            left: Box::new(left),
            op: BinaryOperator::Pow,
            token,
            right: Box::new(right),
        })
    }

    fn unary(&mut self) -> ParseResult<Expression> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Bang => UnaryOperator::Not,
            _ => return self.postfix(),
        };
        let token = self.advance();
        let right = self.unary()?;
        Ok(Expression::Unary {
            op,
            token,
            right: Box::new(right),
        })
    }

    fn postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.assignment()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let paren = self.expect(TokenKind::RParen, "expect ')' after arguments")?;
                expr = Expression::Call {
                    callee: Box::new(expr),
                    paren,
                    args,
                };
            } else if self.check(TokenKind::LBracket) {
                let bracket = self.advance();
                let index = self.expression()?;
                self.expect(TokenKind::RBracket, "expect ']' after index")?;
                expr = Expression::Index {
                    object: Box::new(expr),
                    bracket,
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> ParseResult<Expression> {
        let literal = match self.peek().kind {
            TokenKind::True => LiteralValue::Boolean(true),
            TokenKind::False => LiteralValue::Boolean(false),
            TokenKind::Nihl => LiteralValue::Nihl,
            TokenKind::Number | TokenKind::String => {
                let token = self.advance();
                return match token.literal {
                    Some(Literal::Number(value)) => {
                        Ok(Expression::Literal(LiteralValue::Number(value)))
                    }
                    Some(Literal::String(value)) => {
                        Ok(Expression::Literal(LiteralValue::String(value)))
                    }
                    None => Err(ParseError::at(&token, "malformed literal")),
                };
            }
            TokenKind::Identifier => {
                let name = self.advance();
                let id = self.node_id();
                return Ok(Expression::Variable { id, name });
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "expect ')' after expression")?;
                return Ok(Expression::Grouping(Box::new(expr)));
            }
            TokenKind::LBracket => {
                self.advance();
                return self.array();
            }
            TokenKind::LBrace => {
                self.advance();
                return self.map();
            }
            _ => return Err(self.error("unexpected token")),
        };
        self.advance();
        Ok(Expression::Literal(literal))
    }

    fn array(&mut self) -> ParseResult<Expression> {
        let mut elements = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                elements.push(self.assignment()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket, "expect ']' after array literal")?;
        Ok(Expression::Array(elements))
    }

    fn map(&mut self) -> ParseResult<Expression> {
        let mut pairs = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let key = self.assignment()?;
                self.expect(TokenKind::FatArrow, "expect '=>' after map key")?;
                let value = self.assignment()?;
                pairs.push((key, value));
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "expect '}' after map literal")?;
        Ok(Expression::Map(pairs))
    }

    fn binary_level(
        &mut self,
        next: Level<'d>,
        operators: &[(TokenKind, BinaryOperator)],
    ) -> ParseResult<Expression> {
        let mut left = next(self)?;
        while let Some(op) = self.match_operator(operators) {
            let token = self.advance();
            let right = next(self)?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                token,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_level(
        &mut self,
        next: Level<'d>,
        operators: &[(TokenKind, LogicalOperator)],
    ) -> ParseResult<Expression> {
        let mut left = next(self)?;
        while let Some(op) = self.match_operator(operators) {
            let token = self.advance();
            let right = next(self)?;
            left = Expression::Logical {
                left: Box::new(left),
                op,
                token,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn match_operator<Op: Copy>(&self, operators: &[(TokenKind, Op)]) -> Option<Op> {
        let kind = self.peek().kind;
        operators
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, op)| *op)
    }

    /// Discards tokens up to the end of the broken statement: past the next
    /// newline, before a statement keyword or a dedent, or past a whole
    /// indented block that belonged to it.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Newline => {
                    self.advance();
                    return;
                }
                TokenKind::Indent => {
                    self.skip_block();
                    return;
                }
                TokenKind::Dedent
                | TokenKind::If
                | TokenKind::Func
                | TokenKind::Ret
                | TokenKind::Let
                | TokenKind::While
                | TokenKind::Print => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn skip_block(&mut self) {
        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.advance().kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }
}

impl<'d> Parser<'d> {
    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::EOF
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::at(self.peek(), message)
    }
}

/// Parses a laid-out token stream. Syntax errors are recorded in
/// `diagnostics`; the offending statements are left out of the program.
pub fn parse(tokens: Vec<Token>, diagnostics: &mut Diagnostics) -> Program {
    let program = Parser::new(tokens, diagnostics).parse_program();
    debug!("parser produced {} statements", program.statements.len());
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> (Program, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = lexer::scan(source, &mut diagnostics);
        assert!(diagnostics.is_empty(), "lexing failed: {diagnostics}");
        let program = parse(tokens, &mut diagnostics);
        (program, diagnostics)
    }

    fn render(source: &str) -> String {
        let (program, diagnostics) = parse_source(source);
        assert!(diagnostics.is_empty(), "parsing failed: {diagnostics}");
        program
            .statements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn arithmetic_follows_precedence_and_associativity() {
        assert_eq!(
            render("1 + 2 * 3 ^ 2 ^ 2 - -4"),
            "(expr (- (+ 1 (* 2 (^ 3 (^ 2 2)))) (- 4)))"
        );
        assert_eq!(render("8 / 4 % 3 ++ x"), "(expr (++ (% (/ 8 4) 3) x))");
        assert_eq!(render("-2 ^ 2"), "(expr (^ (- 2) 2))");
    }

    #[test]
    fn logic_binds_looser_than_comparison_and_tighter_than_ternary() {
        assert_eq!(
            render("a or b and c == d < e ? f : g ? h : i"),
            "(expr (? (or a (and b (== c (< d e)))) f (? g h i)))"
        );
        assert_eq!(render("a xor !b"), "(expr (xor a (! b)))");
    }

    #[test]
    fn assignment_is_right_associative_and_comma_is_loosest() {
        assert_eq!(render("a = b = 1, c"), "(expr (, (= a (= b 1)) c))");
        assert_eq!(render("let x = (1, 2)"), "(let x (group (, 1 2)))");
    }

    #[test]
    fn parses_postfix_chains_and_composite_literals() {
        assert_eq!(render("f(1, 2)[0](x)"), "(expr (call (index (call f 1 2) 0) x))");
        assert_eq!(
            render("m['k'] = [1, 2] ++ {1 => 'a', nihl => true}"),
            "(expr (set-index m 'k' (++ (array 1 2) (map (1 'a') (nihl true)))))"
        );
        assert_eq!(render("print [] ++ {}"), "(print (++ (array) (map)))");
    }

    #[test]
    fn parses_if_elif_else_chain() {
        let source = indoc! {"
            if a
                print 1
            elif b:
                print 2
            else
                print 3
        "};
        assert_eq!(
            render(source),
            "(if (a (block (print 1))) (b (block (print 2))) (true (block (print 3))))"
        );
    }

    #[test]
    fn parses_functions_loops_and_jumps() {
        let source = indoc! {"
            func f(a, b)
                while true
                    if a
                        break
                    continue
                ret
            ret a
        "};
        assert_eq!(
            render(source),
            "(func f (a b) (while true (block (if (a (block (break)))) (continue))) (ret))\n(ret a)"
        );
    }

    #[test]
    fn tab_and_space_indentation_parse_identically() {
        let spaces = "while i < 3\n    let i = i + 1\n    print i\n";
        let tabs = "while i < 3\n\tlet i = i + 1\n\tprint i\n";
        let (with_spaces, _) = parse_source(spaces);
        let (with_tabs, _) = parse_source(tabs);
        assert_eq!(with_spaces, with_tabs);
    }

    #[test]
    fn reports_invalid_assignment_target() {
        let (_, diagnostics) = parse_source("1 + 2 = 3\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.to_string(),
            "Error [line 1] at '=': invalid assignment target"
        );
    }

    #[test]
    fn recovers_at_the_next_statement() {
        let source = indoc! {"
            print )
            let = 3
            print 'ok'
        "};
        let (program, diagnostics) = parse_source(source);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(program.statements.len(), 1);
        assert_eq!(program.statements[0].to_string(), "(print 'ok')");
    }

    #[test]
    fn unexpected_indentation_is_one_error() {
        let source = "print 1\n    print 2\nprint 3\n";
        let (program, diagnostics) = parse_source(source);
        assert_eq!(
            diagnostics.to_string(),
            "Error [line 2] at indent: expect new line after print statement"
        );
        assert_eq!(program.statements.len(), 1);
        assert_eq!(program.statements[0].to_string(), "(print 3)");
    }

    #[test]
    fn errors_inside_blocks_keep_the_block() {
        let source = indoc! {"
            while x
                print (1
                print 2
        "};
        let (program, diagnostics) = parse_source(source);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            program.statements[0].to_string(),
            "(while x (block (print 2)))"
        );
    }

    #[test]
    fn reports_end_of_file_location() {
        let mut diagnostics = Diagnostics::new();
        let program = parse(vec![Token::new(TokenKind::Let, "let", 4)], &mut diagnostics);
        assert!(program.statements.is_empty());
        assert_eq!(
            diagnostics.to_string(),
            "Error [line 4] at end of file: expect variable name after 'let'"
        );
    }
}
