//! `lamp`: an indentation-sensitive scripting language.
//!
//! Source goes through four stages: [`lexer::scan`], [`parser::parse`],
//! [`resolver::resolve`] and [`Interpreter::interpret`]. The first three
//! report into a shared [`Diagnostics`] collector and the pipeline stops
//! after the first stage that reported anything.

use std::io::Write;
use std::thread;

use log::debug;
use thiserror::Error;

pub mod ast;
pub mod builtins;
pub mod diagnostics;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod token;

pub use ast::Program;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use interpreter::{Interpreter, RuntimeError, Value};
pub use resolver::HopTable;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Compile(Diagnostics),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("failed to start the interpreter thread")]
    Spawn(#[source] std::io::Error),
}

/// Runs the compile-time stages over `source`.
pub fn compile(source: &str) -> Result<(Program, HopTable), Diagnostics> {
    let mut diagnostics = Diagnostics::new();

    let tokens = lexer::scan(source, &mut diagnostics);
    if !diagnostics.is_empty() {
        debug!("lexing failed with {} diagnostics", diagnostics.len());
        return Err(diagnostics);
    }

    let program = parser::parse(tokens, &mut diagnostics);
    if !diagnostics.is_empty() {
        debug!("parsing failed with {} diagnostics", diagnostics.len());
        return Err(diagnostics);
    }

    let mut hops = HopTable::new();
    resolver::resolve(&program, &mut hops, &mut diagnostics);
    if !diagnostics.is_empty() {
        debug!("resolution failed with {} diagnostics", diagnostics.len());
        return Err(diagnostics);
    }

    Ok((program, hops))
}

/// Stack given to the thread [`run`] executes on. Sized so that
/// [`interpreter::MAX_CALL_DEPTH`] nested calls fit in an unoptimized build.
pub const RUN_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Compiles and runs `source`, writing `print` output to `output`.
///
/// The pipeline runs on its own thread with [`RUN_STACK_SIZE`] bytes of
/// stack, so deep recursion ends in a stack overflow [`RuntimeError`]
/// whatever the caller's stack is. [`Interpreter::interpret`] runs on the
/// caller's stack.
pub fn run<W: Write + Send>(source: &str, output: W) -> Result<(), Error> {
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("lamp".to_string())
            .stack_size(RUN_STACK_SIZE)
            .spawn_scoped(scope, move || run_on_current_thread(source, output))
            .map_err(Error::Spawn)?;
        match worker.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

fn run_on_current_thread<W: Write>(source: &str, output: W) -> Result<(), Error> {
    let (program, hops) = compile(source).map_err(Error::Compile)?;
    let mut interpreter = Interpreter::new(output);
    interpreter.interpret(&program, hops)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn stops_after_lexing_errors() {
        // `ret` outside a function would be a resolve error, but lexing fails first.
        let diagnostics = compile("ret 1 $\n").expect_err("lex error");
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics.iter().next(),
            Some(Diagnostic::Lex(_))
        ));
    }

    #[test]
    fn stops_after_parse_errors() {
        let diagnostics = compile("ret (\n").expect_err("parse error");
        assert!(diagnostics.iter().all(|d| matches!(d, Diagnostic::Parse(_))));
    }

    #[test]
    fn reports_every_resolve_error() {
        let source = indoc! {"
            ret 1
            let a = a
        "};
        let diagnostics = compile(source).expect_err("resolve errors");
        assert_eq!(
            diagnostics.to_string(),
            indoc! {"
                Error [line 1] at 'ret': can't have a ret statement outside of a function
                Error [line 2] at 'a': can't read local variable in its own initializer"}
        );
    }

    #[test]
    fn compile_errors_skip_execution() {
        let mut output = Vec::new();
        let error = run("print 'never'\nprint (\n", &mut output).expect_err("parse error");
        assert!(matches!(error, Error::Compile(_)));
        assert!(output.is_empty());
    }

    #[test]
    fn deep_recursion_does_not_depend_on_the_callers_stack() {
        let source = indoc! {"
            func sum(n)
                ret n == 0 ? 0 : n + sum(n - 1)
            print sum(1000)
        "};
        let runaway = indoc! {"
            func forever(n)
                ret forever(n + 1)
            forever(0)
        "};
        // Far smaller than the stack any of these programs needs.
        let caller = thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(move || {
                let mut output = Vec::new();
                run(source, &mut output).expect("runs");
                let overflow = run(runaway, Vec::new()).expect_err("too deep");
                (String::from_utf8_lossy(&output).into_owned(), overflow.to_string())
            })
            .expect("spawn");
        let (output, overflow) = caller.join().expect("caller thread");
        assert_eq!(output, "500500\n");
        assert_eq!(overflow, "Error [line 2] at ')': stack overflow");
    }

    #[test]
    fn runs_a_program() {
        let mut output = Vec::new();
        run("let greeting = 'hi'\nprint greeting ++ '!'\n", &mut output).expect("runs");
        assert_eq!(String::from_utf8_lossy(&output), "hi!\n");
    }
}
