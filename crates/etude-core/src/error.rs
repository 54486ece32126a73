//! Error types for etude-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for etude-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in etude-core
#[derive(Debug, Error)]
pub enum Error {
    /// A note name that is not one of the 12 pitch classes plus octave
    #[error("invalid note name: '{0}'")]
    InvalidNote(String),

    /// Exercise data that fails validation (mismatched arrays, bad fingering, ...)
    #[error("invalid exercise data: {0}")]
    InvalidExercise(String),

    /// An exercise id that is not present in the library
    #[error("exercise not found: '{0}'")]
    ExerciseNotFound(String),

    /// MIDI backend error
    #[error("MIDI error: {0}")]
    Midi(String),

    /// Failure reading an exercise or list file
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON in an exercise or list file
    #[error("malformed JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
