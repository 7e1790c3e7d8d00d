use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use log::debug;

use crate::ast::Program;
use crate::builtins::{self, Builtin};
use crate::resolver::HopTable;

mod environment;
mod error;
mod map;
mod runtime;
mod value;


pub use environment::{EnvRef, Environment};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use map::MapObject;
pub use value::{ArrayRef, Function, MapRef, Value, format_number};

/// Nested user-function calls deeper than this fail with a stack overflow.
pub const MAX_CALL_DEPTH: usize = 2048;

/// How a statement finished. Anything but `Normal` unwinds to the nearest
/// loop or call boundary.
pub(crate) enum ExecResult {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Tree-walking interpreter writing `print` output to `W`.
pub struct Interpreter<W: Write> {
    globals: EnvRef,
    environment: EnvRef,
    hops: HopTable,
    output: W,
    call_depth: usize,
    loop_depth: usize,
}

impl<W: Write> Interpreter<W> {
    pub fn new(output: W) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        for builtin in builtins::registry() {
            globals
                .borrow_mut()
                .define(builtin.name, Value::Builtin(builtin));
        }
        Self {
            environment: Rc::clone(&globals),
            globals,
            hops: HopTable::new(),
            output,
            call_depth: 0,
            loop_depth: 0,
        }
    }

    /// Installs (or replaces) a global host function.
    pub fn define_builtin(&mut self, builtin: Builtin) {
        debug!("defining builtin '{}'/{}", builtin.name, builtin.arity);
        self.globals
            .borrow_mut()
            .define(builtin.name, Value::Builtin(builtin));
    }

    /// Runs a resolved program. Top-level code runs in the global scope, so
    /// globals defined by one call stay visible to the next.
    pub fn interpret(&mut self, program: &Program, hops: HopTable) -> Result<(), RuntimeError> {
        // Execution pipeline:
        // interpret -> exec_statement -> eval_expression -> eval_call
        // -> call_value -> exec_block (function body).
        self.hops = hops;
        self.environment = Rc::clone(&self.globals);
        self.call_depth = 0;
        self.loop_depth = 0;
        debug!(
            "interpreting {} top-level statements",
            program.statements.len()
        );
        for statement in &program.statements {
            // ret, break and continue are rejected where they are raised
            // when nothing can catch them, so no signal reaches this loop.
            self.exec_statement(statement)?;
        }
        Ok(())
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
