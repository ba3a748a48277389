//! Error types for the type system.

use alloc::string::String;

use thiserror::Error;

use crate::target::Target;

/// Result type for type-system operations.
pub type TypeResult<T> = Result<T, TypeError>;

/// Error raised while constructing, naming or laying out types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// The type has no spelling on the requested target.
    #[error("type {ty} is not supported on {target}")]
    UnsupportedType { ty: String, target: Target },
    /// A layout rule was violated (std140 stride, misplaced runtime array, ...).
    #[error("layout error: {0}")]
    Layout(String),
    /// The type cannot live in host-visible memory.
    #[error("type {0} is not host-shareable")]
    NotHostShareable(String),
    /// The type description itself is malformed.
    #[error("invalid type: {0}")]
    Invalid(String),
    /// A type identifier failed to parse.
    #[error("parse error at position {position}: {message}")]
    Parse { message: String, position: usize },
}

impl TypeError {
    /// Create an unsupported-type error.
    pub fn unsupported(ty: impl Into<String>, target: Target) -> Self {
        TypeError::UnsupportedType {
            ty: ty.into(),
            target,
        }
    }

    /// Create a layout error.
    pub fn layout(msg: impl Into<String>) -> Self {
        TypeError::Layout(msg.into())
    }

    /// Create an invalid-type error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        TypeError::Invalid(msg.into())
    }
}
