use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;

use super::env::Environment;

/// Runtime value model of the tree-walking evaluator.
///
/// Arrays, callables, and instances are shared handles: assignment copies the
/// handle, not the payload, which is what gives arrays and instances their
/// reference semantics.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Callable(Callable),
    Instance(Rc<RefCell<Instance>>),
}

#[derive(Debug, Clone)]
pub enum Callable {
    Function(Rc<Function>),
    Class(Rc<Class>),
}

/// A user function: declaration plus the environment in force where it was
/// defined (its closure).
pub struct Function {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }
}

// Closures point back into environments that can hold this very function, so
// Debug stays shallow.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .finish()
    }
}

#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    pub methods: HashMap<String, Rc<Function>>,
}

impl Class {
    /// Resolve a method along the superclass chain, closest class first.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Arguments a `NEW` expression must supply: the constructor's parameters
    /// minus the receiver slot.
    pub fn arity(&self) -> usize {
        self.find_method("constructor")
            .map(|constructor| constructor.arity().saturating_sub(1))
            .unwrap_or(0)
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }
}

// Fields can reference the instance itself; keep Debug shallow.
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl Value {
    /// Exactly Nil and false are falsy; 0, "" and [] are truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

/// The `==` rule: different tags never compare equal, Nil equals Nil,
/// primitives compare by content, shared values by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Callable(Callable::Function(a)), Value::Callable(Callable::Function(b))) => {
                Rc::ptr_eq(a, b)
            }
            (Value::Callable(Callable::Class(a)), Value::Callable(Callable::Class(b))) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

/// Stringification used by `PRINT`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::Array(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Value::Callable(Callable::Function(function)) => {
                write!(f, "<fn {}>", function.name())
            }
            Value::Callable(Callable::Class(class)) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => {
                write!(f, "<{} instance>", instance.borrow().class.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    #[test]
    fn truthiness_is_nil_and_false_only() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::Str(String::new()).is_truthy());
        assert!(array(vec![]).is_truthy());
    }

    #[test]
    fn equality_compares_primitives_by_content() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::Number(2.0), Value::Number(2.0));
        assert_eq!(Value::Str("a".into()), Value::Str("a".into()));
        assert_ne!(Value::Number(1.0), Value::Bool(true));
        assert_ne!(Value::Nil, Value::Bool(false));
    }

    #[test]
    fn arrays_compare_by_identity() {
        let shared = Rc::new(RefCell::new(vec![Value::Number(1.0)]));
        let a = Value::Array(Rc::clone(&shared));
        let b = Value::Array(shared);
        assert_eq!(a, b);

        let other = array(vec![Value::Number(1.0)]);
        assert_ne!(a, other);
    }

    #[test]
    fn numbers_render_integral_values_without_decimals() {
        assert_eq!(Value::Number(7.0).to_string(), "7");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
    }

    #[test]
    fn arrays_render_recursively() {
        let value = array(vec![
            Value::Number(1.0),
            Value::Str("two".into()),
            array(vec![Value::Bool(true)]),
        ]);
        assert_eq!(value.to_string(), "[1, two, [true]]");
    }

    #[test]
    fn nil_renders_as_null() {
        assert_eq!(Value::Nil.to_string(), "null");
    }
}
