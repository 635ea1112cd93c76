// THEORY:
// The `error` module collects every failure the sorting engine can report. The
// engine never silently defaults a decision: an item that fits no category, a bin
// that falls outside the physical fixture, or a profile document that cannot be
// trusted all come back to the caller as explicit values.
//
// Three layers of error exist:
// 1.  **Load time** (`ProfileParseError`, `ConfigError`): fatal, reported to the
//     operator before the first item is routed.
// 2.  **Per item** (`SortError::NoMatchingCategory`, `SortError::GridExhausted`):
//     recoverable, the sort loop decides whether to skip the item or halt.
// 3.  **Infrastructure** (`StatePoisoned`, `WorkerUnavailable`): the shared state or
//     the lane workers are gone and the run cannot continue.

use crate::core_modules::bin_grid::BinLocation;
use std::path::PathBuf;

/// A profile document could not be turned into a usable `Profile`.
#[derive(Debug, thiserror::Error)]
pub enum ProfileParseError {
    #[error("failed to read profile file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed profile document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid profile: {0}")]
    Invalid(String),
}

/// The sorter configuration could not be loaded or is out of range.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

/// Everything that can go wrong while routing an item to a bin.
#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("no category in the profile matches item {item}")]
    NoMatchingCategory { item: String },

    #[error("bin {location} is outside the fixture ({columns} columns x {rows} rows)")]
    GridExhausted {
        location: BinLocation,
        columns: u32,
        rows: u32,
    },

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("snapshot does not fit this profile: {0}")]
    SnapshotMismatch(String),

    #[error("routing state was poisoned by a panicked lane")]
    StatePoisoned,

    #[error("lane worker is no longer running")]
    WorkerUnavailable,

    #[error("actuation failed: {0}")]
    Actuation(String),
}

/// Result type for routing operations.
pub type SortResult<T> = Result<T, SortError>;
