use thiserror::Error;

/// Runtime faults raised while interpreting a program
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
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

    #[error("Name '{name}' is not defined")]
    NameNotFound { name: String },

    #[error("{function}() takes {expected} arguments but {actual} were given")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Index out of range: {message}")]
    IndexError { message: String },

    #[error("Value error: {message}")]
    ValueError { message: String },

    #[error("Integer overflow in {operation}")]
    Overflow { operation: String },

    #[error("Maximum recursion depth of {limit} exceeded")]
    RecursionLimit { limit: usize },

    #[error("Step budget of {limit} exhausted")]
    StepLimit { limit: u64 },

    #[error("Deadline of {timeout_ms}ms exceeded")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl EvaluatorError {
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

    pub fn name_not_found(name: &str) -> Self {
        Self::NameNotFound {
            name: name.to_string(),
        }
    }

    pub fn arity(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        Self::Arity {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::IndexError {
            message: message.into(),
        }
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::ValueError {
            message: message.into(),
        }
    }

    pub fn overflow(operation: &str) -> Self {
        Self::Overflow {
            operation: operation.to_string(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
