//! Error taxonomy shared by the resolver, reifier, promotion pass and assembler.
//!
//! Every error is terminal: one failing nested schema aborts the enclosing call.

/// A local `$ref` that cannot be followed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("empty reference path")]
    Empty,
    #[error("reference `{0}` is not relative to the current document (expected `#/...`)")]
    NotLocal(String),
    #[error("reference `{0}` does not name a root component")]
    MissingRoot(String),
    #[error("reference `{0}` names an undefined component")]
    NotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("unsupported schema shape: {0}")]
    UnsupportedShape(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("schema does not parse at {path}: {message}")]
    Parse { path: String, message: String },
}

impl Error {
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedShape(message.into())
    }
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Error::IllegalState(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
