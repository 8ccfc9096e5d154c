//! Tree-walking evaluator.
//!
//! Statements execute against an environment passed down the walk, so every
//! exit path (normal completion, return signal, error) drops back to the
//! caller's scope without restoration bookkeeping. `return` travels as a
//! control-flow marker, not an error, and is absorbed at call boundaries.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::token::{Position, Token, TokenKind};

pub mod env;
pub mod error;
pub mod value;

use env::Environment;
pub use error::RuntimeError;
pub use value::{Callable, Class, Function, Instance, Value};

/// Control-flow marker threaded out of statement execution. `Return` carries
/// the position of its keyword so a top-level return can be reported.
enum Flow {
    Continue,
    Return(Value, Position),
}

/// Evaluates a parsed program, writing `PRINT` output to the supplied writer.
pub struct Interpreter<'w, W: Write> {
    output: &'w mut W,
    globals: Rc<RefCell<Environment>>,
}

impl<'w, W: Write> Interpreter<'w, W> {
    pub fn new(output: &'w mut W) -> Self {
        Self {
            output,
            globals: Environment::new(),
        }
    }

    /// Execute statements in order against the global environment. The first
    /// runtime error aborts; the driver renders it.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        let globals = Rc::clone(&self.globals);
        for stmt in statements {
            if let Flow::Return(_, at) = self.exec_stmt(stmt, &globals)? {
                return Err(RuntimeError::ReturnOutsideFunction { at });
            }
        }
        Ok(())
    }

    fn exec_block(
        &mut self,
        statements: &[Stmt],
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            match self.exec_stmt(stmt, env)? {
                Flow::Continue => {}
                returning => return Ok(returning),
            }
        }
        Ok(Flow::Continue)
    }

    fn exec_stmt(
        &mut self,
        stmt: &Stmt,
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.eval_expr(expr, env)?;
                Ok(Flow::Continue)
            }
            Stmt::Print { keyword, value } => {
                let value = self.eval_expr(value, env)?;
                writeln!(self.output, "{value}").map_err(|error| RuntimeError::Io {
                    message: error.to_string(),
                    at: keyword.position(),
                })?;
                Ok(Flow::Continue)
            }
            Stmt::Return { keyword, value } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value, keyword.position()))
            }
            Stmt::Block(statements) => {
                self.exec_block(statements, &Environment::with_enclosing(env))
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(condition, env)?.is_truthy() {
                    self.exec_block(then_branch, env)
                } else {
                    self.exec_block(else_branch, env)
                }
            }
            Stmt::While { condition, body } => {
                while self.eval_expr(condition, env)?.is_truthy() {
                    match self.exec_block(body, env)? {
                        Flow::Continue => {}
                        returning => return Ok(returning),
                    }
                }
                Ok(Flow::Continue)
            }
            Stmt::ForIn {
                variable,
                iterable,
                body,
            } => {
                let iterable = self.eval_expr(iterable, env)?;
                let Value::Array(elements) = iterable else {
                    return Err(RuntimeError::ForInRequiresArray {
                        at: variable.position(),
                    });
                };
                // Iterate a snapshot so body mutations of the array cannot
                // invalidate the traversal mid-flight.
                let snapshot: Vec<Value> = elements.borrow().clone();
                for element in snapshot {
                    let loop_env = Environment::with_enclosing(env);
                    loop_env.borrow_mut().define(&variable.lexeme, element);
                    match self.exec_block(body, &loop_env)? {
                        Flow::Continue => {}
                        returning => return Ok(returning),
                    }
                }
                Ok(Flow::Continue)
            }
            Stmt::Function(declaration) => {
                let function = Function {
                    declaration: Rc::clone(declaration),
                    closure: Rc::clone(env),
                };
                env.borrow_mut().define(
                    &declaration.name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
                Ok(Flow::Continue)
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.exec_class(name, superclass.as_ref(), methods, env)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn exec_class(
        &mut self,
        name: &Token,
        superclass: Option<&Token>,
        methods: &[Rc<FunctionDecl>],
        env: &Rc<RefCell<Environment>>,
    ) -> Result<(), RuntimeError> {
        let superclass_value = match superclass {
            Some(token) => {
                let value = env.borrow().get(&token.lexeme).ok_or_else(|| {
                    RuntimeError::UndefinedVariable {
                        name: token.lexeme.clone(),
                        at: token.position(),
                    }
                })?;
                match value {
                    Value::Callable(Callable::Class(class)) => Some(class),
                    _ => {
                        return Err(RuntimeError::SuperclassMustBeClass {
                            at: token.position(),
                        });
                    }
                }
            }
            None => None,
        };

        // Methods close over the class environment, which additionally binds
        // `super` when a superclass exists.
        let class_env = match &superclass_value {
            Some(class) => {
                let class_env = Environment::with_enclosing(env);
                class_env
                    .borrow_mut()
                    .define("super", Value::Callable(Callable::Class(Rc::clone(class))));
                class_env
            }
            None => Rc::clone(env),
        };

        let mut method_map = HashMap::new();
        for declaration in methods {
            let function = Function {
                declaration: Rc::clone(declaration),
                closure: Rc::clone(&class_env),
            };
            method_map.insert(declaration.name.lexeme.clone(), Rc::new(function));
        }

        let class = Class {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_map,
        };
        env.borrow_mut().define(
            &name.lexeme,
            Value::Callable(Callable::Class(Rc::new(class))),
        );
        Ok(())
    }

    fn eval_expr(
        &mut self,
        expr: &Expr,
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(token) => self.eval_literal(token),
            Expr::Variable(token) => env.borrow().get(&token.lexeme).ok_or_else(|| {
                RuntimeError::UndefinedVariable {
                    name: token.lexeme.clone(),
                    at: token.position(),
                }
            }),
            Expr::Assign { target, value } => {
                let value = self.eval_expr(value, env)?;
                self.eval_assign(target, value, env)
            }
            Expr::Binary { left, op, right } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                self.eval_binary(left, op, right)
            }
            Expr::Call {
                callee,
                paren,
                args,
            } => {
                let callee = self.eval_expr(callee, env)?;
                let args = self.eval_args(args, env)?;
                match callee {
                    Value::Callable(Callable::Function(function)) => {
                        if args.len() != function.arity() {
                            return Err(RuntimeError::ArityMismatch {
                                expected: function.arity(),
                                found: args.len(),
                                at: paren.position(),
                            });
                        }
                        self.invoke(&function, args)
                    }
                    Value::Callable(Callable::Class(class)) => {
                        self.construct(&class, args, paren.position())
                    }
                    _ => Err(RuntimeError::NotCallable {
                        at: paren.position(),
                    }),
                }
            }
            Expr::Get { object, name } => {
                let object = self.eval_expr(object, env)?;
                let Value::Instance(instance) = object else {
                    return Err(RuntimeError::PropertiesOnInstancesOnly {
                        at: name.position(),
                    });
                };
                let instance = instance.borrow();
                if let Some(value) = instance.fields.get(&name.lexeme) {
                    return Ok(value.clone());
                }
                if let Some(method) = instance.class.find_method(&name.lexeme) {
                    return Ok(Value::Callable(Callable::Function(method)));
                }
                Err(RuntimeError::UndefinedProperty {
                    name: name.lexeme.clone(),
                    at: name.position(),
                })
            }
            Expr::ArrayAccess {
                array,
                bracket,
                index,
            } => {
                let array = self.eval_expr(array, env)?;
                let index = self.eval_expr(index, env)?;
                let Value::Array(elements) = array else {
                    return Err(RuntimeError::NotAnArray {
                        at: bracket.position(),
                    });
                };
                let elements = elements.borrow();
                let slot = array_index(index, bracket, elements.len())?;
                Ok(elements[slot].clone())
            }
            Expr::ArrayLit(elements) => {
                let values = self.eval_args(elements, env)?;
                Ok(Value::Array(Rc::new(RefCell::new(values))))
            }
            Expr::New { class_name, args } => {
                let value = env.borrow().get(&class_name.lexeme).ok_or_else(|| {
                    RuntimeError::UndefinedVariable {
                        name: class_name.lexeme.clone(),
                        at: class_name.position(),
                    }
                })?;
                let Value::Callable(Callable::Class(class)) = value else {
                    return Err(RuntimeError::NotAClass {
                        at: class_name.position(),
                    });
                };
                let args = self.eval_args(args, env)?;
                self.construct(&class, args, class_name.position())
            }
        }
    }

    fn eval_literal(&self, token: &Token) -> Result<Value, RuntimeError> {
        match token.kind {
            TokenKind::Integer | TokenKind::Float => {
                let number: f64 = token.lexeme.parse().map_err(|_| {
                    RuntimeError::InvalidNumberLiteral {
                        lexeme: token.lexeme.clone(),
                        at: token.position(),
                    }
                })?;
                Ok(Value::Number(number))
            }
            TokenKind::Str => Ok(Value::Str(token.lexeme.clone())),
            TokenKind::True => Ok(Value::Bool(true)),
            TokenKind::False => Ok(Value::Bool(false)),
            _ => Ok(Value::Nil),
        }
    }

    /// Store `value` into an assignment target. A plain variable updates the
    /// nearest binding, or declares in the current scope when unbound
    /// anywhere. The stored value is the result of the expression.
    fn eval_assign(
        &mut self,
        target: &Expr,
        value: Value,
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Value, RuntimeError> {
        match target {
            Expr::Variable(name) => {
                let assigned = env.borrow_mut().assign(&name.lexeme, value.clone());
                if !assigned {
                    env.borrow_mut().define(&name.lexeme, value.clone());
                }
            }
            Expr::Get { object, name } => {
                let object = self.eval_expr(object, env)?;
                let Value::Instance(instance) = object else {
                    return Err(RuntimeError::FieldsOnInstancesOnly {
                        at: name.position(),
                    });
                };
                instance
                    .borrow_mut()
                    .fields
                    .insert(name.lexeme.clone(), value.clone());
            }
            Expr::ArrayAccess {
                array,
                bracket,
                index,
            } => {
                let array = self.eval_expr(array, env)?;
                let index = self.eval_expr(index, env)?;
                let Value::Array(elements) = array else {
                    return Err(RuntimeError::NotAnArray {
                        at: bracket.position(),
                    });
                };
                let mut elements = elements.borrow_mut();
                let slot = array_index(index, bracket, elements.len())?;
                elements[slot] = value.clone();
            }
            other => {
                return Err(RuntimeError::InvalidAssignmentTarget {
                    at: expr_position(other),
                });
            }
        }
        Ok(value)
    }

    fn eval_binary(&self, left: Value, op: &Token, right: Value) -> Result<Value, RuntimeError> {
        let at = op.position();
        match op.kind {
            TokenKind::Plus => match (left, right) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::Str(l), Value::Str(r)) => Ok(Value::Str(l + &r)),
                _ => Err(RuntimeError::AddOperands { at }),
            },
            TokenKind::Minus => {
                let (l, r) = number_operands(left, right, at)?;
                Ok(Value::Number(l - r))
            }
            TokenKind::Multiply => {
                let (l, r) = number_operands(left, right, at)?;
                Ok(Value::Number(l * r))
            }
            TokenKind::Divide => {
                let (l, r) = number_operands(left, right, at)?;
                if r == 0.0 {
                    return Err(RuntimeError::DivisionByZero { at });
                }
                Ok(Value::Number(l / r))
            }
            TokenKind::GreaterThan => {
                let (l, r) = number_operands(left, right, at)?;
                Ok(Value::Bool(l > r))
            }
            TokenKind::GtOrEq => {
                let (l, r) = number_operands(left, right, at)?;
                Ok(Value::Bool(l >= r))
            }
            TokenKind::LessThan => {
                let (l, r) = number_operands(left, right, at)?;
                Ok(Value::Bool(l < r))
            }
            TokenKind::LtOrEq => {
                let (l, r) = number_operands(left, right, at)?;
                Ok(Value::Bool(l <= r))
            }
            TokenKind::Equal => Ok(Value::Bool(left == right)),
            TokenKind::In => {
                let Value::Array(elements) = right else {
                    return Err(RuntimeError::InRequiresArray { at });
                };
                let found = elements.borrow().iter().any(|element| *element == left);
                Ok(Value::Bool(found))
            }
            _ => Err(RuntimeError::UnknownBinaryOperator { at }),
        }
    }

    fn eval_args(
        &mut self,
        exprs: &[Expr],
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Vec<Value>, RuntimeError> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.eval_expr(expr, env)?);
        }
        Ok(values)
    }

    /// Run a function body in a fresh scope extending its closure. The
    /// return signal stops here.
    fn invoke(&mut self, function: &Rc<Function>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let call_env = Environment::with_enclosing(&function.closure);
        for (param, arg) in function.declaration.params.iter().zip(args) {
            call_env.borrow_mut().define(&param.lexeme, arg);
        }
        match self.exec_block(&function.declaration.body, &call_env)? {
            Flow::Return(value, _) => Ok(value),
            Flow::Continue => Ok(Value::Nil),
        }
    }

    /// Instantiate a class: build the instance, then run `constructor` (found
    /// along the superclass chain) with the instance prepended to the
    /// caller's arguments. The constructor's return value is ignored.
    fn construct(
        &mut self,
        class: &Rc<Class>,
        args: Vec<Value>,
        at: Position,
    ) -> Result<Value, RuntimeError> {
        let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(class))));
        match class.find_method("constructor") {
            Some(constructor) => {
                let expected = class.arity();
                if args.len() != expected {
                    return Err(RuntimeError::ArityMismatch {
                        expected,
                        found: args.len(),
                        at,
                    });
                }
                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(Value::Instance(Rc::clone(&instance)));
                call_args.extend(args);
                self.invoke(&constructor, call_args)?;
            }
            None => {
                if !args.is_empty() {
                    return Err(RuntimeError::ArityMismatch {
                        expected: 0,
                        found: args.len(),
                        at,
                    });
                }
            }
        }
        Ok(Value::Instance(instance))
    }
}

fn number_operands(left: Value, right: Value, at: Position) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok((l, r)),
        _ => Err(RuntimeError::NumberOperands { at }),
    }
}

/// Validate an index value against an array of `len` elements.
fn array_index(index: Value, bracket: &Token, len: usize) -> Result<usize, RuntimeError> {
    let Value::Number(number) = index else {
        return Err(RuntimeError::IndexNotNumber {
            at: bracket.position(),
        });
    };
    if number.fract() != 0.0 {
        return Err(RuntimeError::IndexNotInteger {
            at: bracket.position(),
        });
    }
    let index = number as i64;
    if index < 0 || index as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds {
            at: bracket.position(),
        });
    }
    Ok(index as usize)
}

/// Representative position of an expression, for diagnostics on nodes that
/// carry no single token of their own.
fn expr_position(expr: &Expr) -> Position {
    match expr {
        Expr::Literal(token) | Expr::Variable(token) => token.position(),
        Expr::Assign { target, .. } => expr_position(target),
        Expr::Binary { op, .. } => op.position(),
        Expr::Call { paren, .. } => paren.position(),
        Expr::Get { name, .. } => name.position(),
        Expr::ArrayAccess { bracket, .. } => bracket.position(),
        Expr::ArrayLit(elements) => elements.first().map(expr_position).unwrap_or_default(),
        Expr::New { class_name, .. } => class_name.position(),
    }
}
