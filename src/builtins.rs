//! Host functions installed in the global environment.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::interpreter::Value;

pub type BuiltinFn = fn(&[Value]) -> Result<Value, BuiltinError>;

/// A native callable with a fixed arity. Arity is checked by the interpreter
/// before `function` runs.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub function: BuiltinFn,
}

impl Builtin {
    pub const fn new(name: &'static str, arity: usize, function: BuiltinFn) -> Self {
        Self {
            name,
            arity,
            function,
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, BuiltinError> {
        (self.function)(args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuiltinError {
    #[error("{builtin}: {message}")]
    Type {
        builtin: &'static str,
        message: String,
    },
    #[error("{builtin}: cannot access '{path}': {message}")]
    Io {
        builtin: &'static str,
        path: String,
        message: String,
    },
}

/// The builtins every interpreter starts with.
pub fn registry() -> Vec<Builtin> {
    vec![
        Builtin::new("len", 1, len),
        Builtin::new("typeof", 1, type_of),
        Builtin::new("clock", 0, clock),
        Builtin::new("readFile", 1, read_file),
        Builtin::new("writeFile", 2, write_file),
        Builtin::new("appendFile", 2, append_file),
    ]
}

fn len(args: &[Value]) -> Result<Value, BuiltinError> {
    let length = match &args[0] {
        Value::String(value) => value.chars().count(),
        Value::Array(elements) => elements.borrow().len(),
        other => {
            return Err(BuiltinError::Type {
                builtin: "len",
                message: format!("expected a string or an array, got {}", other.type_name()),
            });
        }
    };
    Ok(Value::Number(length as f64))
}

fn type_of(args: &[Value]) -> Result<Value, BuiltinError> {
    Ok(Value::string(args[0].type_name()))
}

fn clock(_args: &[Value]) -> Result<Value, BuiltinError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    Ok(Value::Number(millis as f64))
}

fn read_file(args: &[Value]) -> Result<Value, BuiltinError> {
    let path = expect_string("readFile", "path", &args[0])?;
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Value::string(contents)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Value::Nihl),
        Err(error) => Err(io_error("readFile", path, &error)),
    }
}

fn write_file(args: &[Value]) -> Result<Value, BuiltinError> {
    let path = expect_string("writeFile", "path", &args[0])?;
    let contents = expect_string("writeFile", "content", &args[1])?;
    fs::write(path, contents).map_err(|error| io_error("writeFile", path, &error))?;
    Ok(Value::Nihl)
}

fn append_file(args: &[Value]) -> Result<Value, BuiltinError> {
    let path = expect_string("appendFile", "path", &args[0])?;
    let contents = expect_string("appendFile", "content", &args[1])?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(contents.as_bytes()))
        .map_err(|error| io_error("appendFile", path, &error))?;
    Ok(Value::Nihl)
}

fn expect_string<'v>(
    builtin: &'static str,
    argument: &str,
    value: &'v Value,
) -> Result<&'v str, BuiltinError> {
    match value {
        Value::String(value) => Ok(value.as_ref()),
        other => Err(BuiltinError::Type {
            builtin,
            message: format!("{argument} must be a string, got {}", other.type_name()),
        }),
    }
}

fn io_error(builtin: &'static str, path: &str, error: &io::Error) -> BuiltinError {
    BuiltinError::Io {
        builtin,
        path: path.to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin(name: &str) -> Builtin {
        registry()
            .into_iter()
            .find(|builtin| builtin.name == name)
            .expect("builtin is registered")
    }

    fn scratch_path(name: &str) -> String {
        let path = std::env::temp_dir().join(format!("lamp-{}-{name}", std::process::id()));
        let _ = fs::remove_file(&path);
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = registry().iter().map(|builtin| builtin.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), registry().len());
    }

    #[test]
    fn len_counts_strings_and_arrays() {
        let len = builtin("len");
        assert_eq!(len.call(&[Value::string("héllo")]), Ok(Value::Number(5.0)));
        assert_eq!(
            len.call(&[Value::array(vec![Value::Nihl, Value::Nihl])]),
            Ok(Value::Number(2.0))
        );
        assert!(matches!(
            len.call(&[Value::Number(3.0)]),
            Err(BuiltinError::Type { builtin: "len", .. })
        ));
    }

    #[test]
    fn typeof_names_each_type() {
        let type_of = builtin("typeof");
        let cases = [
            (Value::Nihl, "nihl"),
            (Value::Boolean(true), "boolean"),
            (Value::Number(1.0), "number"),
            (Value::string("x"), "string"),
            (Value::array(Vec::new()), "array"),
            (Value::map(Vec::new()), "map"),
            (Value::Builtin(builtin("len")), "function"),
        ];
        for (value, expected) in cases {
            assert_eq!(type_of.call(&[value]), Ok(Value::string(expected)));
        }
    }

    #[test]
    fn clock_is_positive() {
        let Ok(Value::Number(millis)) = builtin("clock").call(&[]) else {
            panic!("clock should return a number");
        };
        assert!(millis > 0.0);
    }

    #[test]
    fn file_builtins_round_trip() {
        let path = scratch_path("files");
        let missing = builtin("readFile").call(&[Value::string(path.as_str())]);
        assert_eq!(missing, Ok(Value::Nihl));

        let write = builtin("writeFile").call(&[Value::string(path.as_str()), Value::string("a")]);
        assert_eq!(write, Ok(Value::Nihl));
        builtin("appendFile")
            .call(&[Value::string(path.as_str()), Value::string("b")])
            .expect("append succeeds");
        let contents = builtin("readFile").call(&[Value::string(path.as_str())]);
        assert_eq!(contents, Ok(Value::string("ab")));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn file_builtins_require_string_arguments() {
        let error = builtin("writeFile")
            .call(&[Value::Number(1.0), Value::string("x")])
            .unwrap_err();
        assert_eq!(error.to_string(), "writeFile: path must be a string, got number");
    }
}
