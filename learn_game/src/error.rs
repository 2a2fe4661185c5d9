use crate::board::StateKey;
use std::path::PathBuf;

/// Errors raised by the board and the players.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("cell {action} is not available")]
    IllegalMove { action: usize },

    #[error("no legal actions remain on board {0}")]
    EmptyActionSet(StateKey),
}

/// Errors that can occur during training.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("game error during training: {0}")]
    Game(#[from] GameError),

    #[error("training worker stopped before handing the game back")]
    WorkerDisconnected,
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
