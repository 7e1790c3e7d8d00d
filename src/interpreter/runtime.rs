use std::cell::RefCell;
use std::io::Write;
use std::mem;
use std::rc::Rc;

use log::trace;

use crate::ast::{
    BinaryOperator, Expression, LiteralValue, LogicalOperator, NodeId, Statement, UnaryOperator,
};
use crate::token::Token;

use super::{
    EnvRef, Environment, ExecResult, Function, Interpreter, MAX_CALL_DEPTH, MapObject,
    RuntimeError, RuntimeErrorKind, Value, format_number,
};

type RunResult<T> = std::result::Result<T, RuntimeError>;

impl<W: Write> Interpreter<W> {
    /// Runs `statements` with `environment` as the current scope and puts the
    /// previous scope back on every exit path.
    pub(super) fn exec_block(
        &mut self,
        statements: &[Statement],
        environment: EnvRef,
    ) -> RunResult<ExecResult> {
        let previous = mem::replace(&mut self.environment, environment);
        let result = self.exec_statements(statements);
        self.environment = previous;
        result
    }

    fn exec_statements(&mut self, statements: &[Statement]) -> RunResult<ExecResult> {
        for statement in statements {
            match self.exec_statement(statement)? {
                ExecResult::Normal => {}
                signal => return Ok(signal),
            }
        }
        Ok(ExecResult::Normal)
    }

    pub(super) fn exec_statement(&mut self, statement: &Statement) -> RunResult<ExecResult> {
        match statement {
            Statement::Print { keyword, value } => {
                let value = self.eval_expression(value)?;
                writeln!(self.output, "{value}").map_err(|error| {
                    RuntimeError::at(
                        keyword,
                        RuntimeErrorKind::Output {
                            message: error.to_string(),
                        },
                    )
                })?;
                Ok(ExecResult::Normal)
            }
            Statement::Expression(expr) => {
                self.eval_expression(expr)?;
                Ok(ExecResult::Normal)
            }
            Statement::Let { name, initializer } => {
                let value = match initializer {
                    Some(initializer) => self.eval_expression(initializer)?,
                    None => Value::Nihl,
                };
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(ExecResult::Normal)
            }
            Statement::Block(statements) => {
                let scope = Environment::child(&self.environment);
                self.exec_block(statements, scope)
            }
            Statement::If { branches } => {
                for (condition, block) in branches {
                    if self.eval_expression(condition)?.is_truthy() {
                        return self.exec_statement(block);
                    }
                }
                Ok(ExecResult::Normal)
            }
            Statement::While { condition, body } => {
                self.loop_depth += 1;
                let result = self.exec_loop(condition, body);
                self.loop_depth -= 1;
                result
            }
            Statement::Func(decl) => {
                let function = Function {
                    decl: Rc::clone(decl),
                    closure: Rc::clone(&self.environment),
                };
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
                Ok(ExecResult::Normal)
            }
            Statement::Ret { keyword, value } => {
                if self.call_depth == 0 {
                    return Err(RuntimeError::at(
                        keyword,
                        RuntimeErrorKind::ReturnOutsideFunction,
                    ));
                }
                let value = match value {
                    Some(value) => self.eval_expression(value)?,
                    None => Value::Nihl,
                };
                Ok(ExecResult::Return(value))
            }
            Statement::Break(keyword) => {
                self.expect_loop(keyword, "break")?;
                Ok(ExecResult::Break)
            }
            Statement::Continue(keyword) => {
                self.expect_loop(keyword, "continue")?;
                Ok(ExecResult::Continue)
            }
        }
    }

    fn exec_loop(&mut self, condition: &Expression, body: &Statement) -> RunResult<ExecResult> {
        while self.eval_expression(condition)?.is_truthy() {
            match self.exec_statement(body)? {
                ExecResult::Normal | ExecResult::Continue => {}
                ExecResult::Break => break,
                ExecResult::Return(value) => return Ok(ExecResult::Return(value)),
            }
        }
        Ok(ExecResult::Normal)
    }

    fn expect_loop(&self, keyword: &Token, name: &'static str) -> RunResult<()> {
        if self.loop_depth == 0 {
            return Err(RuntimeError::at(
                keyword,
                RuntimeErrorKind::OutsideLoop { keyword: name },
            ));
        }
        Ok(())
    }

    pub(super) fn eval_expression(&mut self, expr: &Expression) -> RunResult<Value> {
        match expr {
            Expression::Literal(literal) => Ok(match literal {
                LiteralValue::Nihl => Value::Nihl,
                LiteralValue::Boolean(value) => Value::Boolean(*value),
                LiteralValue::Number(value) => Value::Number(*value),
                LiteralValue::String(value) => Value::string(value.as_str()),
            }),
            Expression::Grouping(inner) => self.eval_expression(inner),
            Expression::Unary { op, token, right } => {
                let right = self.eval_expression(right)?;
                match op {
                    UnaryOperator::Negate => match right {
                        Value::Number(value) => Ok(Value::Number(-value)),
                        _ => Err(RuntimeError::at(token, RuntimeErrorKind::OperandMustBeNumber)),
                    },
                    UnaryOperator::Not => Ok(Value::Boolean(!right.is_truthy())),
                }
            }
            Expression::Binary {
                left,
                op,
                token,
                right,
            } => {
                let left = self.eval_expression(left)?;
                let right = self.eval_expression(right)?;
                binary(*op, token, left, right)
            }
            Expression::Logical {
                left,
                op,
                right,
                ..
            } => self.eval_logical(left, *op, right),
            Expression::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expression(condition)?.is_truthy() {
                    self.eval_expression(then_branch)
                } else {
                    self.eval_expression(else_branch)
                }
            }
            Expression::Variable { id, name } => self.read_variable(*id, name),
            Expression::Assign { id, name, value } => {
                let value = self.eval_expression(value)?;
                self.assign_variable(*id, name, value.clone())?;
                Ok(value)
            }
            Expression::Array(elements) => self.eval_array(elements),
            Expression::Map(pairs) => self.eval_map(pairs),
            Expression::Call {
                callee,
                paren,
                args,
            } => self.eval_call(callee, paren, args),
            Expression::Index {
                object,
                bracket,
                index,
            } => self.eval_index(object, bracket, index),
            Expression::SetIndex {
                object,
                bracket,
                index,
                value,
            } => self.eval_set_index(object, bracket, index, value),
        }
    }

    // The helpers below stay out of line so the recursive `eval_expression`
    // frame only holds what every expression needs.

    #[inline(never)]
    fn eval_logical(
        &mut self,
        left: &Expression,
        op: LogicalOperator,
        right: &Expression,
    ) -> RunResult<Value> {
        let left = self.eval_expression(left)?.is_truthy();
        match op {
            LogicalOperator::Or if left => Ok(Value::Boolean(true)),
            LogicalOperator::And if !left => Ok(Value::Boolean(false)),
            LogicalOperator::Or | LogicalOperator::And => self.eval_expression(right),
            LogicalOperator::Xor => {
                let right = self.eval_expression(right)?.is_truthy();
                Ok(Value::Boolean(left != right))
            }
        }
    }

    #[inline(never)]
    fn eval_array(&mut self, elements: &[Expression]) -> RunResult<Value> {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(self.eval_expression(element)?);
        }
        Ok(Value::array(values))
    }

    #[inline(never)]
    fn eval_map(&mut self, pairs: &[(Expression, Expression)]) -> RunResult<Value> {
        let mut map = MapObject::new();
        for (key, value) in pairs {
            let key = self.eval_expression(key)?;
            let value = self.eval_expression(value)?;
            map.insert(key, value);
        }
        Ok(Value::Map(Rc::new(RefCell::new(map))))
    }

    #[inline(never)]
    fn eval_index(
        &mut self,
        object: &Expression,
        bracket: &Token,
        index: &Expression,
    ) -> RunResult<Value> {
        let object = self.eval_indexable(object, bracket)?;
        let index = self.eval_expression(index)?;
        match &object {
            Value::Array(elements) => {
                let elements = elements.borrow();
                let position = array_position(bracket, &index, elements.len())?;
                Ok(elements[position].clone())
            }
            Value::Map(map) => Ok(map.borrow().get(&index).unwrap_or(Value::Nihl)),
            _ => Err(not_indexable(bracket, &object)),
        }
    }

    #[inline(never)]
    fn eval_set_index(
        &mut self,
        object: &Expression,
        bracket: &Token,
        index: &Expression,
        value: &Expression,
    ) -> RunResult<Value> {
        let object = self.eval_indexable(object, bracket)?;
        let index = self.eval_expression(index)?;
        if let Value::Array(elements) = &object {
            let length = elements.borrow().len();
            array_position(bracket, &index, length)?;
        }
        let value = self.eval_expression(value)?;
        match &object {
            Value::Array(elements) => {
                let mut elements = elements.borrow_mut();
                let length = elements.len();
                let position = array_position(bracket, &index, length)?;
                elements[position] = value;
            }
            Value::Map(map) => map.borrow_mut().insert(index, value),
            _ => return Err(not_indexable(bracket, &object)),
        }
        Ok(object)
    }

    fn eval_indexable(&mut self, object: &Expression, bracket: &Token) -> RunResult<Value> {
        let object = self.eval_expression(object)?;
        match object {
            Value::Array(_) | Value::Map(_) => Ok(object),
            other => Err(not_indexable(bracket, &other)),
        }
    }

    fn read_variable(&self, id: NodeId, name: &Token) -> RunResult<Value> {
        let value = match self.hops.get(id) {
            Some(distance) => Environment::get_at(&self.environment, distance, &name.lexeme),
            None => self.globals.borrow().get(&name.lexeme),
        };
        value.ok_or_else(|| undefined_variable(name))
    }

    fn assign_variable(&mut self, id: NodeId, name: &Token, value: Value) -> RunResult<()> {
        let assigned = match self.hops.get(id) {
            Some(distance) => {
                Environment::assign_at(&self.environment, distance, &name.lexeme, value)
            }
            None => self.globals.borrow_mut().assign(&name.lexeme, value),
        };
        if assigned {
            Ok(())
        } else {
            Err(undefined_variable(name))
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expression,
        paren: &Token,
        args: &[Expression],
    ) -> RunResult<Value> {
        let callee = self.eval_expression(callee)?;
        let mut evaluated_args = Vec::with_capacity(args.len());
        for arg in args {
            evaluated_args.push(self.eval_expression(arg)?);
        }
        self.call_value(callee, evaluated_args, paren)
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> RunResult<Value> {
        match callee {
            Value::Builtin(builtin) => {
                check_arity(paren, builtin.arity, args.len())?;
                trace!("calling builtin '{}'", builtin.name);
                builtin
                    .call(&args)
                    .map_err(|error| RuntimeError::at(paren, error))
            }
            Value::Function(function) => {
                check_arity(paren, function.arity(), args.len())?;
                if self.call_depth >= MAX_CALL_DEPTH {
                    return Err(RuntimeError::at(paren, RuntimeErrorKind::StackOverflow));
                }
                trace!("calling '{}'", function.name());

                let scope = Environment::child(&function.closure);
                {
                    let mut scope = scope.borrow_mut();
                    for (param, arg) in function.decl.params.iter().zip(args) {
                        scope.define(&param.lexeme, arg);
                    }
                }

                // Loops around the call site do not enclose the body.
                let enclosing_loops = mem::replace(&mut self.loop_depth, 0);
                self.call_depth += 1;
                let result = self.exec_block(&function.decl.body, scope);
                self.call_depth -= 1;
                self.loop_depth = enclosing_loops;

                match result? {
                    ExecResult::Return(value) => Ok(value),
                    ExecResult::Normal | ExecResult::Break | ExecResult::Continue => {
                        Ok(Value::Nihl)
                    }
                }
            }
            other => Err(RuntimeError::at(
                paren,
                RuntimeErrorKind::NotCallable {
                    callee: other.repr(),
                },
            )),
        }
    }
}

fn binary(op: BinaryOperator, token: &Token, left: Value, right: Value) -> RunResult<Value> {
    let value = match op {
        BinaryOperator::Comma => right,
        BinaryOperator::Equal => Value::Boolean(left.equals(&right)),
        BinaryOperator::NotEqual => Value::Boolean(!left.equals(&right)),
        BinaryOperator::Concat => match (&left, &right) {
            (Value::String(left), Value::String(right)) => Value::string(format!("{left}{right}")),
            (Value::Array(left), Value::Array(right)) => {
                let mut elements = left.borrow().clone();
                elements.extend(right.borrow().iter().cloned());
                Value::array(elements)
            }
            _ => {
                return Err(RuntimeError::at(
                    token,
                    RuntimeErrorKind::OperandsNotConcatenable,
                ));
            }
        },
        BinaryOperator::Rem => {
            let (left, right) = numbers(token, &left, &right)?;
            if left.fract() != 0.0 || right.fract() != 0.0 {
                return Err(RuntimeError::at(
                    token,
                    RuntimeErrorKind::OperandsMustBeIntegers,
                ));
            }
            Value::Number(left % right)
        }
        BinaryOperator::Add => arithmetic(token, &left, &right, |l, r| Value::Number(l + r))?,
        BinaryOperator::Sub => arithmetic(token, &left, &right, |l, r| Value::Number(l - r))?,
        BinaryOperator::Mul => arithmetic(token, &left, &right, |l, r| Value::Number(l * r))?,
        BinaryOperator::Div => arithmetic(token, &left, &right, |l, r| Value::Number(l / r))?,
        BinaryOperator::Pow => arithmetic(token, &left, &right, |l, r| Value::Number(l.powf(r)))?,
        BinaryOperator::Less => arithmetic(token, &left, &right, |l, r| Value::Boolean(l < r))?,
        BinaryOperator::LessEqual => {
            arithmetic(token, &left, &right, |l, r| Value::Boolean(l <= r))?
        }
        BinaryOperator::Greater => arithmetic(token, &left, &right, |l, r| Value::Boolean(l > r))?,
        BinaryOperator::GreaterEqual => {
            arithmetic(token, &left, &right, |l, r| Value::Boolean(l >= r))?
        }
    };
    Ok(value)
}

fn arithmetic(
    token: &Token,
    left: &Value,
    right: &Value,
    apply: impl FnOnce(f64, f64) -> Value,
) -> RunResult<Value> {
    let (left, right) = numbers(token, left, right)?;
    Ok(apply(left, right))
}

fn numbers(token: &Token, left: &Value, right: &Value) -> RunResult<(f64, f64)> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => Ok((*left, *right)),
        _ => Err(RuntimeError::at(
            token,
            RuntimeErrorKind::OperandsMustBeNumbers,
        )),
    }
}

/// Validates `index` against an array of `length` elements.
fn array_position(bracket: &Token, index: &Value, length: usize) -> RunResult<usize> {
    let &Value::Number(position) = index else {
        return Err(invalid_index(bracket, index));
    };
    if position < 0.0 || position.fract() != 0.0 {
        return Err(invalid_index(bracket, index));
    }
    if position >= length as f64 {
        return Err(RuntimeError::at(
            bracket,
            RuntimeErrorKind::IndexOutOfBounds {
                index: format_number(position),
            },
        ));
    }
    Ok(position as usize)
}

fn check_arity(paren: &Token, expected: usize, found: usize) -> RunResult<()> {
    if expected != found {
        return Err(RuntimeError::at(
            paren,
            RuntimeErrorKind::ArityMismatch { expected, found },
        ));
    }
    Ok(())
}

fn invalid_index(bracket: &Token, index: &Value) -> RuntimeError {
    RuntimeError::at(
        bracket,
        RuntimeErrorKind::InvalidIndex {
            index: index.repr(),
        },
    )
}

fn not_indexable(bracket: &Token, value: &Value) -> RuntimeError {
    RuntimeError::at(
        bracket,
        RuntimeErrorKind::NotIndexable {
            value: value.repr(),
        },
    )
}

fn undefined_variable(name: &Token) -> RuntimeError {
    RuntimeError::at(
        name,
        RuntimeErrorKind::UndefinedVariable {
            name: name.lexeme.clone(),
        },
    )
}
