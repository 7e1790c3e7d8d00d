use std::cell::RefCell;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::builtins::Builtin;

use super::{EnvRef, MapObject};

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<MapObject>>;

/// A runtime value. Arrays, maps and functions are shared handles: cloning
/// the value aliases the same collection or closure.
#[derive(Clone)]
pub enum Value {
    Nihl,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Map(MapRef),
    Function(Rc<Function>),
    Builtin(Builtin),
}

/// A user function closed over the scope it was declared in.
pub struct Function {
    pub decl: Rc<FunctionDecl>,
    pub closure: EnvRef,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.decl.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<func {}/{}>", self.name(), self.arity())
    }
}

impl Value {
    pub fn string(value: impl Into<Rc<str>>) -> Self {
        Value::String(value.into())
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        Value::Map(Rc::new(RefCell::new(MapObject::from_pairs(pairs))))
    }

    /// `false`, `nihl` and `0` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nihl => false,
            Value::Boolean(value) => *value,
            Value::Number(value) => *value != 0.0,
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nihl => "nihl",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Function(_) | Value::Builtin(_) => "function",
        }
    }

    /// `==` semantics: scalars by value, collections and functions by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nihl, Value::Nihl) => true,
            (Value::Boolean(left), Value::Boolean(right)) => left == right,
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Array(left), Value::Array(right)) => Rc::ptr_eq(left, right),
            (Value::Map(left), Value::Map(right)) => Rc::ptr_eq(left, right),
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            (Value::Builtin(left), Value::Builtin(right)) => left == right,
            _ => false,
        }
    }

    /// Map key equality: like [`Value::equals`], except that `NaN` matches itself.
    pub fn key_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(left), Value::Number(right)) if left.is_nan() && right.is_nan() => true,
            _ => self.equals(other),
        }
    }

    /// Consistent with [`Value::key_equals`].
    pub fn key_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self {
            Value::Nihl => 0u8.hash(&mut hasher),
            Value::Boolean(value) => {
                1u8.hash(&mut hasher);
                value.hash(&mut hasher);
            }
            Value::Number(value) => {
                2u8.hash(&mut hasher);
                let bits = if value.is_nan() {
                    f64::NAN.to_bits()
                } else if *value == 0.0 {
                    0
                } else {
                    value.to_bits()
                };
                bits.hash(&mut hasher);
            }
            Value::String(value) => {
                3u8.hash(&mut hasher);
                value.hash(&mut hasher);
            }
            Value::Array(array) => {
                4u8.hash(&mut hasher);
                Rc::as_ptr(array).hash(&mut hasher);
            }
            Value::Map(map) => {
                5u8.hash(&mut hasher);
                Rc::as_ptr(map).hash(&mut hasher);
            }
            Value::Function(function) => {
                6u8.hash(&mut hasher);
                Rc::as_ptr(function).hash(&mut hasher);
            }
            Value::Builtin(builtin) => {
                7u8.hash(&mut hasher);
                builtin.name.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Rendering used inside collections and in error messages: strings are quoted.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, &mut Vec::new());
        out
    }

    fn render(&self, out: &mut String, ancestors: &mut Vec<*const ()>) {
        match self {
            Value::String(value) => {
                out.push('\'');
                out.push_str(value);
                out.push('\'');
            }
            Value::Array(array) => {
                let id = Rc::as_ptr(array) as *const ();
                if ancestors.contains(&id) {
                    out.push_str("[Circular]");
                    return;
                }
                ancestors.push(id);
                out.push('[');
                for (position, element) in array.borrow().iter().enumerate() {
                    if position > 0 {
                        out.push_str(", ");
                    }
                    element.render(out, ancestors);
                }
                out.push(']');
                ancestors.pop();
            }
            Value::Map(map) => {
                let id = Rc::as_ptr(map) as *const ();
                if ancestors.contains(&id) {
                    out.push_str("[Circular]");
                    return;
                }
                ancestors.push(id);
                out.push('{');
                for (position, (key, value)) in map.borrow().entries().iter().enumerate() {
                    if position > 0 {
                        out.push_str(", ");
                    }
                    key.render(out, ancestors);
                    out.push_str(" => ");
                    value.render(out, ancestors);
                }
                out.push('}');
                ancestors.pop();
            }
            scalar => out.push_str(&scalar.to_string()),
        }
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        format!("{sign}Infinity")
    } else if value == 0.0 {
        // covers -0
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// What `print` writes: like [`Value::repr`], but a string on its own is raw.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nihl => f.write_str("nihl"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Number(value) => f.write_str(&format_number(*value)),
            Value::String(value) => f.write_str(value),
            Value::Function(function) => write!(f, "<func {}>", function.name()),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
            Value::Array(_) | Value::Map(_) => f.write_str(&self.repr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_language_rules() {
        assert!(!Value::Nihl.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(-0.0).is_truthy());
        assert!(Value::Number(f64::NAN).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::array(Vec::new()).is_truthy());
        assert!(Value::map(Vec::new()).is_truthy());
    }

    #[test]
    fn formats_numbers() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn equality_is_by_value_for_scalars_and_identity_for_collections() {
        let array = Value::array(vec![Value::Number(1.0)]);
        assert!(array.equals(&array.clone()));
        assert!(!array.equals(&Value::array(vec![Value::Number(1.0)])));
        assert!(Value::string("a").equals(&Value::string("a")));
        assert!(!Value::Number(1.0).equals(&Value::Boolean(true)));
        assert!(!Value::Number(f64::NAN).equals(&Value::Number(f64::NAN)));
        assert!(Value::Number(f64::NAN).key_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn renders_nested_collections() {
        let value = Value::array(vec![
            Value::string("a"),
            Value::Nihl,
            Value::map(vec![(Value::Number(1.0), Value::Boolean(false))]),
        ]);
        assert_eq!(value.to_string(), "['a', nihl, {1 => false}]");
        assert_eq!(Value::string("a").to_string(), "a");
        assert_eq!(Value::string("a").repr(), "'a'");
    }

    #[test]
    fn renders_cycles_as_circular() {
        let array = Value::array(vec![Value::Number(1.0)]);
        if let Value::Array(elements) = &array {
            elements.borrow_mut().push(array.clone());
        }
        assert_eq!(array.to_string(), "[1, [Circular]]");

        // a shared child that is not an ancestor is rendered in full
        let child = Value::array(Vec::new());
        let parent = Value::array(vec![child.clone(), child]);
        assert_eq!(parent.to_string(), "[[], []]");
    }
}
