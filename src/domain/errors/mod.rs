// Domain errors - Error types for the alignment domain

use std::fmt;

/// Domain-specific error types
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid arguments provided
    BadArgs(String),
    /// A parameter is missing a value or bound, or holds NaN
    InvalidParameter(String),
    /// An interval was configured with an illegal length or reference length
    InvalidInterval(String),
    /// A support (reference or query) is ill-defined
    InvalidSupport(String),
    /// A coordinate or index lies outside of its valid range
    OutOfRange(String),
    /// The model's parameters describe an impossible configuration
    IllegalState(String),
    /// A kernel was configured inconsistently
    InvalidKernel(String),
    /// A signal could not be constructed or parsed
    InvalidSignal(String),
    /// A referenced item does not exist
    NotFound(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::BadArgs(msg) => write!(f, "Bad arguments: {}", msg),
            DomainError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            DomainError::InvalidInterval(msg) => write!(f, "Invalid interval: {}", msg),
            DomainError::InvalidSupport(msg) => write!(f, "Invalid support: {}", msg),
            DomainError::OutOfRange(msg) => write!(f, "Out of range: {}", msg),
            DomainError::IllegalState(msg) => write!(f, "Illegal model state: {}", msg),
            DomainError::InvalidKernel(msg) => write!(f, "Invalid kernel: {}", msg),
            DomainError::InvalidSignal(msg) => write!(f, "Invalid signal: {}", msg),
            DomainError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

/// Result alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
