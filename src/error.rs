//! Error types for each part of the library.

use std::path::PathBuf;

use thiserror::Error;

use crate::quiz::QuizState;

/// Failures of the progress store.
///
/// `StorageUnavailable` and `NotInitialized` mean the store cannot be used at
/// all; `Write` means one record failed to persist. None of them are retried
/// by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable at {path}: {reason}")]
    StorageUnavailable { path: PathBuf, reason: String },

    #[error("store used before initialize() completed")]
    NotInitialized,

    #[error("failed to write {record}: {source}")]
    Write {
        record: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to read {collection}: {source}")]
    Read {
        collection: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Refusals of the quiz engine. These never touch persisted data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot start a quiz from an empty word pool")]
    EmptyPool,

    #[error("session size must be at least one question")]
    ZeroSessionSize,

    #[error("{operation} is not valid while {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: QuizState,
    },
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("dictionary not found: {0}")]
    NotFound(String),

    #[error("dictionary {name} has no words")]
    Empty { name: String },

    #[error("unable to parse dictionary {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to read dictionary file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlashcardError {
    #[error("cannot play flashcards from an empty deck")]
    EmptyDeck,
}
