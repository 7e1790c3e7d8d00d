use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::Value;

pub type EnvRef = Rc<RefCell<Environment>>;

/// One scope's bindings plus a shared link to the scope around it.
#[derive(Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// A fresh scope nested in `parent`.
    pub fn child(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Self::with_enclosing(Rc::clone(parent))))
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Looks `name` up in this scope only.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    /// Rebinds an existing name in this scope only; `false` if it is not bound here.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let next = current.borrow().enclosing.clone()?;
            current = next;
        }
        Some(current)
    }

    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Option<Value> {
        let scope = Self::ancestor(env, distance)?;
        scope.borrow().get(name)
    }

    pub fn assign_at(env: &EnvRef, distance: usize, name: &str, value: Value) -> bool {
        match Self::ancestor(env, distance) {
            Some(scope) => scope.borrow_mut().assign(name, value),
            None => false,
        }
    }
}

// Bindings can hold closures over this very scope, so only names are shown.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("enclosed", &self.enclosing.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_enclosing_links_by_distance() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("x", Value::Number(1.0));
        let block = Environment::child(&global);
        let inner = Environment::child(&block);
        inner.borrow_mut().define("x", Value::Number(2.0));

        assert_eq!(Environment::get_at(&inner, 0, "x"), Some(Value::Number(2.0)));
        assert_eq!(Environment::get_at(&inner, 2, "x"), Some(Value::Number(1.0)));
        assert_eq!(Environment::get_at(&inner, 1, "x"), None);
        assert_eq!(Environment::get_at(&inner, 3, "x"), None);
    }

    #[test]
    fn assign_only_touches_the_target_scope() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("n", Value::Number(0.0));
        let child = Environment::child(&global);

        assert!(!child.borrow_mut().assign("n", Value::Number(5.0)));
        assert!(Environment::assign_at(&child, 1, "n", Value::Number(5.0)));
        assert_eq!(global.borrow().get("n"), Some(Value::Number(5.0)));
        assert_eq!(child.borrow().get("n"), None);
    }
}
