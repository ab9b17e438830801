//! Typed errors for catalog loading and the points ledger.

use std::path::PathBuf;

use thiserror::Error;

/// Structural problems that abort a catalog load. Recoverable field errors
/// (bad timeout, permission or cost) never surface here; they fall back to
/// defaults with a warning.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read event catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("event catalog is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("['{name}'] is not an event table")]
    NotATable { name: String },

    #[error("['{name}']['kind'] is not an event kind")]
    InvalidKind { name: String },

    #[error("['{name}']['action'] is not an action")]
    MissingAction { name: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("empty user reference")]
    EmptyUser,

    #[error("user not found: {0}")]
    UnknownUser(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
