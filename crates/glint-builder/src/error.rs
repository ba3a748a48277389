//! Error types for program building.

use alloc::string::String;

use glint_codegen::CodegenError;
use glint_ir::{Target, TypeError};
use thiserror::Error;

/// Result type for builder operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Error raised while describing, merging or emitting a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A value could not be given the required type.
    #[error("cannot use {value} as {expected}")]
    TypeCast { value: String, expected: String },
    #[error("{function} expects {expected} arguments, got {got}")]
    ParamLength {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("{function}: argument {index} must be {expected}, got {got}")]
    ParamType {
        function: String,
        index: usize,
        expected: String,
        got: String,
    },
    #[error("{function}: {message}")]
    ParamValue { function: String, message: String },
    /// No builtin or user overload accepts the arguments.
    #[error("no overload of {function} accepts ({args}) in `{call}`")]
    NoOverload {
        function: String,
        args: String,
        call: String,
    },
    /// Address-of, dereference or assignment applied to the wrong kind of expression.
    #[error("reference error: {0}")]
    Reference(String),
    #[error("{what} is not supported on {target}")]
    Unsupported { what: String, target: Target },
    /// An operation was called where the current scope does not allow it.
    #[error("scope error: {0}")]
    ScopeMisuse(String),
    /// Stage declarations that cannot be reconciled into one program.
    #[error("cannot merge stages: {0}")]
    Merge(String),
    /// A compiler defect, not a problem with the described program.
    #[error("internal builder error: {0}")]
    Internal(String),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

impl BuildError {
    /// Create a type conversion error.
    pub fn type_cast(value: impl Into<String>, expected: impl Into<String>) -> Self {
        BuildError::TypeCast {
            value: value.into(),
            expected: expected.into(),
        }
    }

    pub fn param_value(function: impl Into<String>, message: impl Into<String>) -> Self {
        BuildError::ParamValue {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn reference(msg: impl Into<String>) -> Self {
        BuildError::Reference(msg.into())
    }

    pub fn unsupported(what: impl Into<String>, target: Target) -> Self {
        BuildError::Unsupported {
            what: what.into(),
            target,
        }
    }

    pub fn scope(msg: impl Into<String>) -> Self {
        BuildError::ScopeMisuse(msg.into())
    }

    pub fn merge(msg: impl Into<String>) -> Self {
        BuildError::Merge(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        BuildError::Internal(msg.into())
    }

    /// Check if the error is a compiler defect rather than a user mistake.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            BuildError::Internal(_) | BuildError::Codegen(CodegenError::Internal(_))
        )
    }
}
