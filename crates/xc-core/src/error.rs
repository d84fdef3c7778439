use crate::diagnostics::Diagnostic;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A compiler defect: an unreachable path was reached. Halts the current unit.
    #[error("internal compiler error: {0}")]
    Invariant(String),
    #[error("{0}")]
    Diagnostic(Box<Diagnostic>),
    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::Invariant(message.into())
    }

    pub fn diagnostic(diagnostic: Diagnostic) -> Self {
        Error::Diagnostic(Box::new(diagnostic))
    }

    pub fn is_invariant(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}

pub type Result<T> = result::Result<T, Error>;

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}
