use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::Value;

/// One lexical scope: bindings plus an optional parent link.
///
/// Scopes are shared (`Rc`) because closures keep their defining environment
/// alive past the block that created it.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// A fresh scope whose lookups fall through to `enclosing`.
    pub fn with_enclosing(enclosing: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
        }))
    }

    /// Create or overwrite a binding in this scope.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Update the nearest enclosing binding of `name`. Returns false when no
    /// scope binds it; the caller decides whether that is an implicit
    /// declaration or an error.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.enclosing {
            Some(parent) => parent.borrow_mut().assign(name, value),
            None => false,
        }
    }

    /// Resolve `name` innermost-outward.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        self.enclosing.as_ref().and_then(|parent| parent.borrow().get(name))
    }
}
