use thiserror::Error;

/// Evaluator-specific error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Type error: {operation} requires {expected}, got {actual}")]
    TypeError {
        operation: String,
        expected: String,
        actual: String,
    },

    #[error("Type error: cannot {operation} {left_type} and {right_type}")]
    BinaryTypeError {
        operation: String,
        left_type: String,
        right_type: String,
    },

    #[error("Method '{method}' not found on {receiver}")]
    MethodNotFound { method: String, receiver: String },

    #[error("Function '{name}' is not defined")]
    FunctionNotFound { name: String },

    #[error("Variable '{name}' not found")]
    VariableNotFound { name: String },

    #[error("Method '{method}' expects {expected} arguments, got {actual}")]
    ArityMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("'{0}' used outside of a loop")]
    StrayJump(&'static str),

    #[error("Call depth exceeded {limit}")]
    DepthExceeded { limit: usize },

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl EvalError {
    /// Create a type error for unary operations
    pub fn unary_type_error(operation: &str, expected: &str, actual: &str) -> Self {
        Self::TypeError {
            operation: operation.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a type error for binary operations
    pub fn binary_type_error(operation: &str, left_type: &str, right_type: &str) -> Self {
        Self::BinaryTypeError {
            operation: operation.to_string(),
            left_type: left_type.to_string(),
            right_type: right_type.to_string(),
        }
    }

    pub fn method_not_found(method: &str, receiver: impl std::fmt::Display) -> Self {
        Self::MethodNotFound {
            method: method.to_string(),
            receiver: receiver.to_string(),
        }
    }

    pub fn variable_not_found(name: &str) -> Self {
        Self::VariableNotFound {
            name: name.to_string(),
        }
    }
}
