use crate::device::DeviceError;
use crate::expression::error::SyntaxError;

/// Convenience result type used across drawscript.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Top-level error taxonomy used by the parse and run entry points.
#[derive(thiserror::Error, Debug)]
pub enum ScriptError {
    /// Malformed expression or directive text.
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// A reference to a variable, section or resource that does not exist.
    #[error("unresolved reference: {0}")]
    Unresolved(String),

    /// A directive that is well-formed but not valid where it appears.
    #[error("invalid directive: {0}")]
    Invalid(String),

    /// Failure reported by the graphics collaborator.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Broken internal invariant. Never caused by user input alone.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScriptError {
    /// Build a [`ScriptError::Unresolved`] value.
    pub fn unresolved(msg: impl Into<String>) -> Self {
        Self::Unresolved(msg.into())
    }

    /// Build a [`ScriptError::Invalid`] value.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Build a [`ScriptError::Internal`] value and report it as a bug.
    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(%msg, "BUG: internal invariant violated");
        Self::Internal(msg)
    }

    /// Byte offset into the offending expression, for syntax errors.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Syntax(e) => Some(e.offset),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
