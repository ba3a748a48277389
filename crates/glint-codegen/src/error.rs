//! Error types for source emission.

use alloc::string::String;

use glint_ir::{Target, TypeError};
use thiserror::Error;

/// Result type for emission.
pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// The construct has no spelling in the target language.
    #[error("{what} is not supported on {target}")]
    Unsupported { what: String, target: Target },
    #[error(transparent)]
    Type(#[from] TypeError),
    /// The module handed to the emitter is malformed.
    #[error("internal codegen error: {0}")]
    Internal(String),
}

impl CodegenError {
    pub fn unsupported(what: impl Into<String>, target: Target) -> Self {
        CodegenError::Unsupported {
            what: what.into(),
            target,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CodegenError::Internal(msg.into())
    }
}
