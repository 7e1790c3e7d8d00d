//! Static scope resolution.
//!
//! Walks the tree once and records, for every variable read and assignment
//! target that refers to a local binding, how many environments up the
//! binding lives. Names bound in the outermost scope, and names not bound at
//! all, get no entry and are looked up in the globals at runtime.

use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::ast::{Expression, FunctionDecl, NodeId, Program, Statement};
use crate::diagnostics::Diagnostics;
use crate::token::{Location, Token};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HopTable {
    hops: HashMap<NodeId, usize>,
}

impl HopTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: NodeId, distance: usize) {
        let previous = self.hops.insert(id, distance);
        debug_assert!(previous.is_none(), "node {id:?} resolved twice");
    }

    pub fn get(&self, id: NodeId) -> Option<usize> {
        self.hops.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Error [line {line}] {location}: can't read local variable in its own initializer")]
    SelfReferentialInitializer { line: usize, location: Location },
    #[error("Error [line {line}] {location}: can't have a ret statement outside of a function")]
    ReturnOutsideFunction { line: usize, location: Location },
    #[error("Error [line {line}] {location}: can't use 'break' outside of a loop")]
    BreakOutsideLoop { line: usize, location: Location },
    #[error("Error [line {line}] {location}: can't use 'continue' outside of a loop")]
    ContinueOutsideLoop { line: usize, location: Location },
}

impl ResolveError {
    pub fn line(&self) -> usize {
        match self {
            ResolveError::SelfReferentialInitializer { line, .. }
            | ResolveError::ReturnOutsideFunction { line, .. }
            | ResolveError::BreakOutsideLoop { line, .. }
            | ResolveError::ContinueOutsideLoop { line, .. } => *line,
        }
    }
}

pub struct Resolver<'h, 'd> {
    /// Innermost last. `false` means declared but not yet defined.
    scopes: Vec<HashMap<String, bool>>,
    hops: &'h mut HopTable,
    diagnostics: &'d mut Diagnostics,
    function_depth: usize,
    loop_depth: usize,
}

impl<'h, 'd> Resolver<'h, 'd> {
    pub fn new(hops: &'h mut HopTable, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            scopes: vec![HashMap::new()],
            hops,
            diagnostics,
            function_depth: 0,
            loop_depth: 0,
        }
    }

    pub fn resolve_program(&mut self, program: &Program) {
        self.resolve_statements(&program.statements);
    }

    fn resolve_statements(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.resolve_statement(statement);
        }
    }

    fn resolve_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Print { value: expr, .. } | Statement::Expression(expr) => {
                self.resolve_expression(expr)
            }
            Statement::Let { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expression(initializer);
                }
                self.define(name);
            }
            Statement::Block(statements) => {
                self.scopes.push(HashMap::new());
                self.resolve_statements(statements);
                self.scopes.pop();
            }
            Statement::If { branches } => {
                for (condition, block) in branches {
                    self.resolve_expression(condition);
                    self.resolve_statement(block);
                }
            }
            Statement::While { condition, body } => {
                self.resolve_expression(condition);
                self.loop_depth += 1;
                self.resolve_statement(body);
                self.loop_depth -= 1;
            }
            Statement::Func(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl);
            }
            Statement::Ret { keyword, value } => {
                if self.function_depth == 0 {
                    self.diagnostics.push(ResolveError::ReturnOutsideFunction {
                        line: keyword.line,
                        location: keyword.location(),
                    });
                }
                if let Some(value) = value {
                    self.resolve_expression(value);
                }
            }
            Statement::Break(keyword) => {
                if self.loop_depth == 0 {
                    self.diagnostics.push(ResolveError::BreakOutsideLoop {
                        line: keyword.line,
                        location: keyword.location(),
                    });
                }
            }
            Statement::Continue(keyword) => {
                if self.loop_depth == 0 {
                    self.diagnostics.push(ResolveError::ContinueOutsideLoop {
                        line: keyword.line,
                        location: keyword.location(),
                    });
                }
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl) {
        // A loop around the declaration does not enclose the body.
        let enclosing_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;

        self.scopes.push(HashMap::new());
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(&decl.body);
        self.scopes.pop();

        self.function_depth -= 1;
        self.loop_depth = enclosing_loops;
    }

    fn resolve_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Literal(_) => {}
            Expression::Grouping(inner) => self.resolve_expression(inner),
            Expression::Unary { right, .. } => self.resolve_expression(right),
            Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            Expression::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expression(condition);
                self.resolve_expression(then_branch);
                self.resolve_expression(else_branch);
            }
            Expression::Variable { id, name } => {
                let innermost = self.scopes.last();
                if innermost.and_then(|scope| scope.get(&name.lexeme)) == Some(&false) {
                    self.diagnostics.push(ResolveError::SelfReferentialInitializer {
                        line: name.line,
                        location: name.location(),
                    });
                }
                self.resolve_local(*id, name);
            }
            Expression::Assign { id, name, value } => {
                self.resolve_expression(value);
                self.resolve_local(*id, name);
            }
            Expression::Array(elements) => {
                for element in elements {
                    self.resolve_expression(element);
                }
            }
            Expression::Map(pairs) => {
                for (key, value) in pairs {
                    self.resolve_expression(key);
                    self.resolve_expression(value);
                }
            }
            Expression::Call { callee, args, .. } => {
                self.resolve_expression(callee);
                for arg in args {
                    self.resolve_expression(arg);
                }
            }
            Expression::Index { object, index, .. } => {
                self.resolve_expression(object);
                self.resolve_expression(index);
            }
            Expression::SetIndex {
                object,
                index,
                value,
                ..
            } => {
                self.resolve_expression(object);
                self.resolve_expression(index);
                self.resolve_expression(value);
            }
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        let depth = self.scopes.len();
        let found = self
            .scopes
            .iter()
            .rposition(|scope| scope.contains_key(&name.lexeme));
        // Index 0 is the global scope.
        if let Some(index) = found
            && index > 0
        {
            self.hops.record(id, depth - 1 - index);
        }
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }
}

/// Fills `hops` for `program`, recording scope errors in `diagnostics`.
pub fn resolve(program: &Program, hops: &mut HopTable, diagnostics: &mut Diagnostics) {
    Resolver::new(hops, diagnostics).resolve_program(program);
    debug!("resolver recorded {} local references", hops.len());
}
