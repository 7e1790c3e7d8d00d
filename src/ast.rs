//! Syntax tree shared by the resolver and the interpreter.
//!
//! The parser builds these nodes once. Variable reads and assignment targets
//! carry a [`NodeId`] so the resolver can attach scope distances to them
//! without mutating the tree.

use std::fmt;
use std::rc::Rc;

use crate::token::Token;

/// Identity of a variable-reference or assignment node, unique per parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, PartialEq, Clone)]
pub enum LiteralValue {
    Nihl,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(LiteralValue),
    Grouping(Box<Expression>),
    Unary {
        op: UnaryOperator,
        token: Token,
        right: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        token: Token,
        right: Box<Expression>,
    },
    Logical {
        left: Box<Expression>,
        op: LogicalOperator,
        token: Token,
        right: Box<Expression>,
    },
    Ternary {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    Variable {
        id: NodeId,
        name: Token,
    },
    Assign {
        id: NodeId,
        name: Token,
        value: Box<Expression>,
    },
    Array(Vec<Expression>),
    Map(Vec<(Expression, Expression)>),
    Call {
        callee: Box<Expression>,
        paren: Token,
        args: Vec<Expression>,
    },
    Index {
        object: Box<Expression>,
        bracket: Token,
        index: Box<Expression>,
    },
    SetIndex {
        object: Box<Expression>,
        bracket: Token,
        index: Box<Expression>,
        value: Box<Expression>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Comma,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogicalOperator {
    And,
    Or,
    Xor,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Print {
        keyword: Token,
        value: Expression,
    },
    Expression(Expression),
    Let {
        name: Token,
        initializer: Option<Expression>,
    },
    Block(Vec<Statement>),
    /// `if`/`elif`/`else` chain; `else` is a branch whose condition is `true`.
    If {
        branches: Vec<(Expression, Statement)>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    Func(Rc<FunctionDecl>),
    Ret {
        keyword: Token,
        value: Option<Expression>,
    },
    Break(Token),
    Continue(Token),
}

/// Shared between the tree and every closure created from it.
#[derive(Debug, PartialEq, Clone)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "!",
        }
    }
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Comma => ",",
            BinaryOperator::Concat => "++",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Pow => "^",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }
}

impl LogicalOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
            LogicalOperator::Xor => "xor",
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for item in items {
        write!(f, " {item}")?;
    }
    Ok(())
}

/// Fully parenthesized prefix form, e.g. `(+ 1 (* 2 3))`.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(LiteralValue::Nihl) => f.write_str("nihl"),
            Expression::Literal(LiteralValue::Boolean(value)) => write!(f, "{value}"),
            Expression::Literal(LiteralValue::Number(value)) => write!(f, "{value}"),
            Expression::Literal(LiteralValue::String(value)) => write!(f, "'{value}'"),
            Expression::Grouping(inner) => write!(f, "(group {inner})"),
            Expression::Unary { op, right, .. } => write!(f, "({} {right})", op.symbol()),
            Expression::Binary {
                left, op, right, ..
            } => write!(f, "({} {left} {right})", op.symbol()),
            Expression::Logical {
                left, op, right, ..
            } => write!(f, "({} {left} {right})", op.symbol()),
            Expression::Ternary {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "(? {condition} {then_branch} {else_branch})"),
            Expression::Variable { name, .. } => f.write_str(&name.lexeme),
            Expression::Assign { name, value, .. } => write!(f, "(= {} {value})", name.lexeme),
            Expression::Array(elements) => {
                f.write_str("(array")?;
                write_list(f, elements)?;
                f.write_str(")")
            }
            Expression::Map(pairs) => {
                f.write_str("(map")?;
                for (key, value) in pairs {
                    write!(f, " ({key} {value})")?;
                }
                f.write_str(")")
            }
            Expression::Call { callee, args, .. } => {
                write!(f, "(call {callee}")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expression::Index { object, index, .. } => write!(f, "(index {object} {index})"),
            Expression::SetIndex {
                object,
                index,
                value,
                ..
            } => write!(f, "(set-index {object} {index} {value})"),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Print { value, .. } => write!(f, "(print {value})"),
            Statement::Expression(expr) => write!(f, "(expr {expr})"),
            Statement::Let {
                name,
                initializer: Some(initializer),
            } => write!(f, "(let {} {initializer})", name.lexeme),
            Statement::Let {
                name,
                initializer: None,
            } => write!(f, "(let {})", name.lexeme),
            Statement::Block(statements) => {
                f.write_str("(block")?;
                write_list(f, statements)?;
                f.write_str(")")
            }
            Statement::If { branches } => {
                f.write_str("(if")?;
                for (condition, block) in branches {
                    write!(f, " ({condition} {block})")?;
                }
                f.write_str(")")
            }
            Statement::While { condition, body } => write!(f, "(while {condition} {body})"),
            Statement::Func(decl) => {
                write!(f, "(func {} (", decl.name.lexeme)?;
                let params = decl
                    .params
                    .iter()
                    .map(|param| param.lexeme.as_str())
                    .collect::<Vec<_>>();
                f.write_str(&params.join(" "))?;
                f.write_str(")")?;
                write_list(f, &decl.body)?;
                f.write_str(")")
            }
            Statement::Ret {
                value: Some(value), ..
            } => write!(f, "(ret {value})"),
            Statement::Ret { value: None, .. } => f.write_str("(ret)"),
            Statement::Break(_) => f.write_str("(break)"),
            Statement::Continue(_) => f.write_str("(continue)"),
        }
    }
}
