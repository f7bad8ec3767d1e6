use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;

use super::{grow_stack, Evaluator, Value};
use crate::{ast::MethodAst, runtime::Runtime, world::ObjectId, Result};

/// Local state of one method invocation
#[derive(Debug)]
pub struct Scope {
    pub receiver: ObjectId,
    pub variables: HashMap<String, Value>,
}

/// Shared handle to an invocation scope; thunks created during the
/// invocation hold the same handle
pub type Frame = Arc<RwLock<Scope>>;

pub(crate) fn new_frame(receiver: ObjectId, variables: HashMap<String, Value>) -> Frame {
    Arc::new(RwLock::new(Scope {
        receiver,
        variables,
    }))
}

/// Zero-argument deferred evaluation of a statement list.
///
/// The body runs in the frame of the method that created the thunk, so it
/// reads and writes the same locals. Forcing twice evaluates twice.
#[derive(Clone)]
pub struct Thunk {
    body: Arc<Vec<MethodAst>>,
    frame: Frame,
    runtime: Runtime,
}

impl Thunk {
    pub(crate) fn new(body: Vec<MethodAst>, frame: Frame, runtime: Runtime) -> Self {
        Self {
            body: Arc::new(body),
            frame,
            runtime,
        }
    }

    /// Thunk over a fresh, empty scope for `receiver`
    pub fn detached(runtime: &Runtime, receiver: ObjectId, body: Vec<MethodAst>) -> Self {
        Self::new(body, new_frame(receiver, HashMap::new()), runtime.clone())
    }

    /// Evaluate the body and return its last value.
    ///
    /// A `break`, `continue` or `return` escaping the body comes back as
    /// `Value::Signal` rather than an error.
    pub fn force(&self) -> Result<Value> {
        let mut evaluator = Evaluator::with_frame(self.runtime.clone(), self.frame.clone());
        grow_stack(|| evaluator.eval_body(&self.body)).or_else(|unwind| unwind.into_signal())
    }

    pub fn receiver(&self) -> ObjectId {
        self.frame.read().receiver
    }

    pub fn body(&self) -> &[MethodAst] {
        &self.body
    }

    pub fn ptr_eq(&self, other: &Thunk) -> bool {
        Arc::ptr_eq(&self.body, &other.body) && Arc::ptr_eq(&self.frame, &other.frame)
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thunk")
            .field("statements", &self.body.len())
            .field("receiver", &self.receiver())
            .finish()
    }
}
