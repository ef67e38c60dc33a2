//! Closed taxonomy of fault kinds for the action scheduler.
//!
//! Every fault the engine can raise is one variant of [`IsmError`]. Callers match on
//! variants rather than on dynamic type identity; there is no trait-object error
//! hierarchy here, by design.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, IsmError>;

#[derive(Debug, Error)]
pub enum IsmError {
    #[error("unsupported rdbms backend: {0}")]
    RdbmsNotRecognised(String),

    #[error("unrecognised timestamp/tag stamp format: {0}")]
    TimestampFormatNotRecognised(String),

    #[error("mandatory configuration key missing: {0}")]
    PropertyKeyNotRecognised(String),

    #[error("unrecognised execution phase: {0}")]
    ExecutionPhaseUnrecognised(String),

    #[error("no row found in `phases` where exactly one was expected")]
    ExecutionPhaseNotFound,

    #[error("duplicate row for action `{0}` in the control database")]
    DuplicateDataInControlDatabase(String),

    #[error("missing row for action `{0}` in the control database")]
    MissingDataInControlDatabase(String),

    #[error("SQL statement contains mixed or unrecognised parameter markers: {0}")]
    UnrecognisedParameterisationCharacter(String),

    #[error("malformed action pack `{0}`: {1}")]
    MalformedActionPack(String, String),

    #[error("orphaned semaphore file with no companion message: {0}")]
    OrphanedSemaphoreFile(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
