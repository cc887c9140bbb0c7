//! Error types for linetag

use std::path::PathBuf;

use thiserror::Error;

use crate::syntax::StateId;

/// Result type alias for linetag operations
pub type Result<T> = std::result::Result<T, ColorizerError>;

/// Colorizer error types
#[derive(Error, Debug)]
pub enum ColorizerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid mode file {path}: {source}")]
    ModeParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("State {state} belongs to session {state_generation}, current session is {current}")]
    StaleState {
        state: StateId,
        state_generation: u32,
        current: u32,
    },

    #[error("No continuation registered for state {0}")]
    UnknownState(StateId),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
