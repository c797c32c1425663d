use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PokerError {
    #[error("Invalid rank: {0}")]
    InvalidRank(char),

    #[error("Invalid suit: {0}")]
    InvalidSuit(char),

    #[error("Invalid card notation: {0}")]
    InvalidCardNotation(String),

    #[error("Invalid board notation: {0}")]
    InvalidBoardNotation(String),

    #[error("Duplicate card: {0}")]
    DuplicateCard(String),

    #[error("Need at least {need} cards, got {got}")]
    NotEnoughCards { need: usize, got: usize },

    #[error("At most {max} cards can be evaluated, got {got}")]
    TooManyCards { max: usize, got: usize },

    #[error("Cannot deal {requested} cards, only {available} remaining")]
    NotEnoughDeck { requested: usize, available: usize },

    #[error("Invalid hand rank {0}, expected 1..=7462")]
    InvalidHandRank(u32),

    #[error("Illegal action {action} at {stage}, legal actions: [{legal}]")]
    IllegalAction {
        action: String,
        stage: String,
        legal: String,
    },

    #[error("Invalid action name: {0}")]
    InvalidAction(String),

    #[error("Action probabilities must be non-negative and sum to 1, got sum {0}")]
    InvalidDistribution(f64),

    #[error("Only heads-up play is supported, got {0} players")]
    UnsupportedPlayerCount(usize),

    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("Snapshot not found at {0}; point at a file written by a previous run")]
    SnapshotMissing(PathBuf),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type PokerResult<T> = Result<T, PokerError>;
