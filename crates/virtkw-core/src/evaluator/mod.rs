//! Tree-walking evaluator for method bodies
//!
//! Each method invocation gets a fresh [`Frame`]; thunks created during the
//! invocation capture that frame. Jumps travel through the `Err` side of
//! `Flow` as `Unwind` so they cross expression nesting, and are turned
//! into [`Signal`] values at thunk boundaries.

use tracing::trace;

use crate::{
    ast::{BinaryOp, LValue, MethodAst},
    runtime::Runtime,
    world::ObjectId,
    Result, VirtkwError,
};

pub mod errors;
mod thunk;
mod value;

pub use errors::EvalError;
pub use thunk::{Frame, Scope, Thunk};
pub use value::{Signal, Value};

#[cfg(test)]
mod tests;

/// Non-local exit in progress
#[derive(Debug)]
pub(crate) enum Unwind {
    Break,
    Continue,
    Return(Value),
    Error(VirtkwError),
}

impl Unwind {
    /// Reify a jump that escaped a thunk as a signal value
    pub(crate) fn into_signal(self) -> Result<Value> {
        match self {
            Unwind::Break => Ok(Value::Signal(Signal::Break)),
            Unwind::Continue => Ok(Value::Signal(Signal::Continue)),
            Unwind::Return(value) => Ok(Value::Signal(Signal::Return(Box::new(value)))),
            Unwind::Error(err) => Err(err),
        }
    }
}

impl From<VirtkwError> for Unwind {
    fn from(err: VirtkwError) -> Self {
        Unwind::Error(err)
    }
}

impl From<EvalError> for Unwind {
    fn from(err: EvalError) -> Self {
        Unwind::Error(err.into())
    }
}

pub(crate) type Flow<T> = std::result::Result<T, Unwind>;

/// Headroom left before a nested evaluation moves to a fresh stack segment
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Run `f` on a heap-allocated stack segment when the current one is nearly
/// used up. Method invocations and thunk forcing nest through here, so deep
/// recursion hits the call-depth limit instead of the native stack.
pub(crate) fn grow_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, f)
}

/// Arithmetic operation types
#[derive(Debug, Clone, Copy, PartialEq)]
enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

pub struct Evaluator {
    runtime: Runtime,
    frame: Frame,
}

impl Evaluator {
    pub(crate) fn with_frame(runtime: Runtime, frame: Frame) -> Self {
        Self { runtime, frame }
    }

    /// Look up and run `method` on `receiver`
    pub fn invoke_method(
        runtime: &Runtime,
        receiver: ObjectId,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let installed = runtime
            .world()
            .resolve_method(receiver, method)?
            .ok_or_else(|| EvalError::method_not_found(method, receiver))?;
        let def = installed.def;
        if def.params.len() != args.len() {
            return Err(EvalError::ArityMismatch {
                method: method.to_string(),
                expected: def.params.len(),
                actual: args.len(),
            }
            .into());
        }

        let _depth = runtime.enter_call()?;
        let locals = def.params.iter().cloned().zip(args).collect();
        let mut evaluator = Self::with_frame(runtime.clone(), thunk::new_frame(receiver, locals));

        match grow_stack(|| evaluator.eval_body(&def.body)) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Break) => Err(EvalError::StrayJump("break").into()),
            Err(Unwind::Continue) => Err(EvalError::StrayJump("continue").into()),
            Err(Unwind::Error(err)) => Err(err),
        }
    }

    /// Evaluate statements in order; the value is the last statement's
    pub(crate) fn eval_body(&mut self, statements: &[MethodAst]) -> Flow<Value> {
        let mut last = Value::Null;
        for stmt in statements {
            last = self.eval(stmt)?;
        }
        Ok(last)
    }

    fn eval(&mut self, ast: &MethodAst) -> Flow<Value> {
        match ast {
            // Literals and basic values
            MethodAst::Number(n) => Ok(Value::Integer(*n)),
            MethodAst::Float(x) => Ok(Value::Float(*x)),
            MethodAst::String(s) => Ok(Value::String(s.clone())),
            MethodAst::Boolean(b) => Ok(Value::Boolean(*b)),
            MethodAst::Null => Ok(Value::Null),
            MethodAst::Identifier(name) => self.eval_identifier(name),
            MethodAst::SelfRef => Ok(Value::Object(self.receiver())),

            // Operators
            MethodAst::Binary { op, left, right } => self.eval_binary(*op, left, right),
            MethodAst::And { left, right } => self.eval_and(left, right),
            MethodAst::Or { left, right } => self.eval_or(left, right),
            MethodAst::Not { operand } => {
                let value = self.eval(operand)?;
                Ok(Value::Boolean(!value.is_truthy()))
            }
            MethodAst::UnaryMinus { operand } => self.eval_unary_minus(operand),

            // Object operations
            MethodAst::Assignment { target, value } => self.eval_assignment(target, value),
            MethodAst::PropertyAccess { object, property } => {
                let obj = self.eval_object(object, "property access")?;
                Ok(self
                    .runtime
                    .world()
                    .get_property(obj, property)
                    .unwrap_or(Value::Null))
            }
            MethodAst::MethodCall {
                object,
                method,
                args,
            } => {
                let obj = self.eval_object(object, "method call")?;
                let arg_values = self.eval_args(args)?;
                Ok(Evaluator::invoke_method(&self.runtime, obj, method, arg_values)?)
            }
            MethodAst::FunctionCall { name, args } => self.eval_function_call(name, args),
            MethodAst::Invoke { callee, args } => self.eval_invoke(callee, args),

            // Keyword registry access
            MethodAst::KeywordLookup { receiver, keyword } => {
                let obj = self.eval_object(receiver, "keyword lookup")?;
                let class = self.runtime.world().class_of(obj)?;
                let behavior = self.runtime.registry().lookup(obj, class, *keyword)?;
                Ok(Value::Behavior(behavior))
            }
            MethodAst::Thunk { body } => Ok(Value::Thunk(Thunk::new(
                body.clone(),
                self.frame.clone(),
                self.runtime.clone(),
            ))),

            MethodAst::List { elements } => Ok(Value::List(self.eval_args(elements)?)),

            // Control flow
            MethodAst::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval_body(then_branch)
                } else if let Some(else_stmts) = else_branch {
                    self.eval_body(else_stmts)
                } else {
                    Ok(Value::Null)
                }
            }
            MethodAst::While { condition, body } => self.eval_while(condition, body),
            MethodAst::Return { value } => {
                let ret = match value {
                    Some(v) => self.eval(v)?,
                    None => Value::Null,
                };
                Err(Unwind::Return(ret))
            }
            MethodAst::Break => Err(Unwind::Break),
            MethodAst::Continue => Err(Unwind::Continue),

            MethodAst::Block(statements) => self.eval_body(statements),
        }
    }

    fn receiver(&self) -> ObjectId {
        self.frame.read().receiver
    }

    fn eval_identifier(&self, name: &str) -> Flow<Value> {
        let found = self.frame.read().variables.get(name).cloned();
        found.ok_or_else(|| EvalError::variable_not_found(name).into())
    }

    fn eval_args(&mut self, args: &[MethodAst]) -> Flow<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        Ok(values)
    }

    fn eval_object(&mut self, ast: &MethodAst, operation: &str) -> Flow<ObjectId> {
        match self.eval(ast)? {
            Value::Object(id) => Ok(id),
            other => Err(EvalError::unary_type_error(operation, "object", other.type_name()).into()),
        }
    }

    /// `a && b` yields `a` when falsy, otherwise `b`; `b` is only evaluated when needed
    fn eval_and(&mut self, left: &MethodAst, right: &MethodAst) -> Flow<Value> {
        let left_val = self.eval(left)?;
        if left_val.is_truthy() {
            self.eval(right)
        } else {
            Ok(left_val)
        }
    }

    /// `a || b` yields `a` when truthy, otherwise `b`
    fn eval_or(&mut self, left: &MethodAst, right: &MethodAst) -> Flow<Value> {
        let left_val = self.eval(left)?;
        if left_val.is_truthy() {
            Ok(left_val)
        } else {
            self.eval(right)
        }
    }

    fn eval_while(&mut self, condition: &MethodAst, body: &[MethodAst]) -> Flow<Value> {
        while self.eval(condition)?.is_truthy() {
            match self.eval_body(body) {
                Ok(_) | Err(Unwind::Continue) => {}
                Err(Unwind::Break) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(Value::Null)
    }

    fn eval_assignment(&mut self, target: &LValue, value: &MethodAst) -> Flow<Value> {
        match target {
            LValue::Variable(name) => {
                let val = self.eval(value)?;
                self.frame
                    .write()
                    .variables
                    .insert(name.clone(), val.clone());
                Ok(val)
            }
            LValue::Property { object, property } => {
                let obj = self.eval_object(object, "property assignment")?;
                let val = self.eval(value)?;
                self.runtime
                    .world()
                    .set_property(obj, property, val.clone())?;
                Ok(val)
            }
        }
    }

    fn eval_function_call(&mut self, name: &str, args: &[MethodAst]) -> Flow<Value> {
        let function = self
            .runtime
            .function(name)
            .ok_or_else(|| EvalError::FunctionNotFound {
                name: name.to_string(),
            })?;
        let arg_values = self.eval_args(args)?;
        Ok(function(&arg_values)?)
    }

    /// Call a behavior (or force a thunk) and re-raise any signal it returns
    fn eval_invoke(&mut self, callee: &MethodAst, args: &[MethodAst]) -> Flow<Value> {
        let result = match self.eval(callee)? {
            Value::Behavior(behavior) => {
                let mut thunks = Vec::with_capacity(args.len());
                for arg in args {
                    match self.eval(arg)? {
                        Value::Thunk(t) => thunks.push(t),
                        other => {
                            return Err(EvalError::unary_type_error(
                                "behavior operand",
                                "thunk",
                                other.type_name(),
                            )
                            .into())
                        }
                    }
                }
                if self.runtime.config().trace_dispatch {
                    trace!(receiver = %self.receiver(), operands = thunks.len(), "dispatching keyword behavior");
                }
                behavior.call(&thunks)?
            }
            Value::Thunk(thunk) if args.is_empty() => thunk.force()?,
            other => {
                return Err(
                    EvalError::unary_type_error("invocation", "behavior", other.type_name()).into(),
                )
            }
        };

        match result {
            Value::Signal(Signal::Break) => Err(Unwind::Break),
            Value::Signal(Signal::Continue) => Err(Unwind::Continue),
            Value::Signal(Signal::Return(value)) => Err(Unwind::Return(*value)),
            value => Ok(value),
        }
    }

    fn eval_unary_minus(&mut self, operand: &MethodAst) -> Flow<Value> {
        match self.eval(operand)? {
            Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
            Value::Float(x) => Ok(Value::Float(-x)),
            other => Err(EvalError::unary_type_error("negation", "number", other.type_name()).into()),
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &MethodAst, right: &MethodAst) -> Flow<Value> {
        let l = self.eval(left)?;
        let r = self.eval(right)?;
        let value = match op {
            BinaryOp::Add => arithmetic(ArithmeticOp::Add, l, r)?,
            BinaryOp::Subtract => arithmetic(ArithmeticOp::Subtract, l, r)?,
            BinaryOp::Multiply => arithmetic(ArithmeticOp::Multiply, l, r)?,
            BinaryOp::Divide => arithmetic(ArithmeticOp::Divide, l, r)?,
            BinaryOp::Modulo => arithmetic(ArithmeticOp::Modulo, l, r)?,
            BinaryOp::Equal => Value::Boolean(l == r),
            BinaryOp::NotEqual => Value::Boolean(l != r),
            BinaryOp::LessThan
            | BinaryOp::LessEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterEqual => compare(op, &l, &r)?,
        };
        Ok(value)
    }
}

fn arithmetic(op: ArithmeticOp, left: Value, right: Value) -> std::result::Result<Value, EvalError> {
    let name = match op {
        ArithmeticOp::Add => "add",
        ArithmeticOp::Subtract => "subtract",
        ArithmeticOp::Multiply => "multiply",
        ArithmeticOp::Divide => "divide",
        ArithmeticOp::Modulo => "take modulo of",
    };
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => match op {
            ArithmeticOp::Add => Ok(Value::Integer(a.wrapping_add(b))),
            ArithmeticOp::Subtract => Ok(Value::Integer(a.wrapping_sub(b))),
            ArithmeticOp::Multiply => Ok(Value::Integer(a.wrapping_mul(b))),
            ArithmeticOp::Divide | ArithmeticOp::Modulo if b == 0 => Err(EvalError::DivisionByZero),
            ArithmeticOp::Divide => Ok(Value::Integer(a.wrapping_div(b))),
            ArithmeticOp::Modulo => Ok(Value::Integer(a.wrapping_rem(b))),
        },
        (Value::Integer(a), Value::Float(b)) => float_arithmetic(op, a as f64, b),
        (Value::Float(a), Value::Integer(b)) => float_arithmetic(op, a, b as f64),
        (Value::Float(a), Value::Float(b)) => float_arithmetic(op, a, b),
        (Value::String(a), Value::String(b)) if op == ArithmeticOp::Add => {
            Ok(Value::String(a + &b))
        }
        (Value::String(a), other) if op == ArithmeticOp::Add => {
            Ok(Value::String(format!("{a}{other}")))
        }
        (Value::List(mut a), Value::List(b)) if op == ArithmeticOp::Add => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (l, r) => Err(EvalError::binary_type_error(name, l.type_name(), r.type_name())),
    }
}

fn float_arithmetic(op: ArithmeticOp, a: f64, b: f64) -> std::result::Result<Value, EvalError> {
    let result = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide if b == 0.0 => return Err(EvalError::DivisionByZero),
        ArithmeticOp::Divide => a / b,
        ArithmeticOp::Modulo => a % b,
    };
    Ok(Value::Float(result))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> std::result::Result<Value, EvalError> {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            return Err(EvalError::binary_type_error(
                "compare",
                left.type_name(),
                right.type_name(),
            ))
        }
    };
    let Some(ordering) = ordering else {
        return Ok(Value::Boolean(false));
    };
    let result = match op {
        BinaryOp::LessThan => ordering == Ordering::Less,
        BinaryOp::LessEqual => ordering != Ordering::Greater,
        BinaryOp::GreaterThan => ordering == Ordering::Greater,
        BinaryOp::GreaterEqual => ordering != Ordering::Less,
        _ => false,
    };
    Ok(Value::Boolean(result))
}
