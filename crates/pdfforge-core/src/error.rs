use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid input name {name:?}: {reason}")]
    InvalidInputName { name: String, reason: String },

    #[error("Unreadable document {input:?}: {reason}")]
    UnreadableDocument { input: String, reason: String },

    #[error("Nothing to assemble: {0}")]
    EmptyInputSet(String),

    #[error("Serialization failed during {step}: {reason}")]
    SerializationFailure { step: &'static str, reason: String },
}

/// Machine-readable error kind reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingInput,
    InvalidRange,
    InvalidInputName,
    UnreadableDocument,
    EmptyInputSet,
    SerializationFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingInput => "missing_input",
            ErrorKind::InvalidRange => "invalid_range",
            ErrorKind::InvalidInputName => "invalid_input_name",
            ErrorKind::UnreadableDocument => "unreadable_document",
            ErrorKind::EmptyInputSet => "empty_input_set",
            ErrorKind::SerializationFailure => "serialization_failure",
        }
    }

    /// Whether the failure was caused by the client's input (400-class)
    /// rather than by the assembly itself (500-class).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ErrorKind::SerializationFailure)
    }
}

impl AssembleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssembleError::MissingInput(_) => ErrorKind::MissingInput,
            AssembleError::InvalidRange(_) => ErrorKind::InvalidRange,
            AssembleError::InvalidInputName { .. } => ErrorKind::InvalidInputName,
            AssembleError::UnreadableDocument { .. } => ErrorKind::UnreadableDocument,
            AssembleError::EmptyInputSet(_) => ErrorKind::EmptyInputSet,
            AssembleError::SerializationFailure { .. } => ErrorKind::SerializationFailure,
        }
    }

    pub(crate) fn unreadable(input: &str, reason: impl ToString) -> Self {
        AssembleError::UnreadableDocument {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn serialization(step: &'static str, reason: impl ToString) -> Self {
        AssembleError::SerializationFailure {
            step,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_name(name: &str, reason: impl ToString) -> Self {
        AssembleError::InvalidInputName {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
