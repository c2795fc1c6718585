//! Error types for the Vigil policy decision point.
//!
//! Evaluation failures inside a decision pipeline are carried in-band as
//! [`Val::Error`](crate::value::Val::Error) and end up as INDETERMINATE
//! decisions. The types in this module cover everything that happens
//! outside a running pipeline: indexing documents, loading configuration,
//! and maintaining the document store.

use thiserror::Error;

/// Root error type for the Vigil system.
#[derive(Debug, Error)]
pub enum Error {
    /// Expression evaluation errors
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    /// Formula index errors
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// PDP configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Document store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// A variable was referenced that is not bound in the context
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    /// An operand had the wrong type for the operation
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// No function with the given name is known
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// No attribute source with the given name is known
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// A target expression produced something other than a boolean
    #[error("Target is not a boolean: {0}")]
    NonBooleanTarget(String),

    /// The evaluation pipeline itself failed
    #[error("Evaluation failed: {0}")]
    Failed(String),
}

/// Errors raised while turning a document target into a formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// DNF expansion would exceed the clause limit
    #[error("Formula too large: {clauses} clauses exceed limit {limit}")]
    FormulaTooLarge { clauses: usize, limit: usize },

    /// The target is a constant that is not a boolean
    #[error("Target of '{0}' is a non-boolean constant")]
    NonBooleanConstant(String),

    /// A document with the given id is not indexed
    #[error("Document not indexed: {0}")]
    NotIndexed(String),
}

/// Errors in PDP configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Combining algorithm identifier is not one of the six known ones
    #[error("Unknown combining algorithm: {0}")]
    UnknownAlgorithm(String),

    /// A variable definition is malformed
    #[error("Invalid variable '{name}': {reason}")]
    InvalidVariable { name: String, reason: String },

    /// A configuration value is out of range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Errors raised by a document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Document with the given id was not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A document with the given id already exists
    #[error("Document conflict: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type used throughout the Vigil system.
pub type Result<T> = std::result::Result<T, Error>;
