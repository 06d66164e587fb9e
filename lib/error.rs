//! Errors surfaced by Harrier.
//!
//! Every failure a procedure, the resolver, the memory facade or the posix
//! model can produce is a variant of [`Error`]. The engine driving Harrier
//! decides what to do with the path: kill it, continue with an unconstrained
//! value, or escalate.

use crate::il;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No procedure is bound to the symbol `{0}`")]
    UnknownSymbol(String),
    #[error("Bad file descriptor {0}")]
    BadFileDescriptor(u64),
    #[error("Architecture mismatch, expected {expected} bits but found {found} bits")]
    ArchitectureMismatch { expected: usize, found: usize },
    #[error("Symbolic address or length is not supported: {0}")]
    SymbolicAddressUnsupported(il::Expression),
    #[error("Failed to resolve argument {index}: {reason}")]
    ArgumentResolutionFailure { index: usize, reason: String },
    #[error("Sort error, invalid bitness between expressions")]
    Sort,
    #[error("Error in evaluation of arithmetic expression: {0}")]
    Arithmetic(String),
    #[error("Attempted to evaluate a scalar, `{0}`, as a constant")]
    EvalScalar(String),
    #[error("Read of uninitialized memory at 0x{0:x}")]
    UnmappedRead(u64),
    #[error("Write to 0x{0:x} is not permitted")]
    PermissionDenied(u64),
    #[error("Value has too many bits to be used as an address")]
    TooManyAddressBits,
    #[error("No satisfying value exists under the current path constraints")]
    Unsatisfiable,
    #[error("A symbolic value must be concretized, but no solver is configured")]
    NoSolver,
    #[error("No plugin is registered under the name `{0}`")]
    PluginMissing(String),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Custom(String),
    #[error("{0}, {1}")]
    Chain(Box<Error>, Box<Error>),
}

impl Error {
    /// Attach additional context to this error.
    pub fn chain(self, other: Error) -> Error {
        Error::Chain(Box::new(self), Box::new(other))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error::Custom(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
