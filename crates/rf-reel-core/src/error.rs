//! Error types for the round core
//!
//! Configuration errors are fatal and surface at startup. Sequencing errors
//! are fatal for the round in flight: they are logged, the round is aborted
//! and the error is returned to the caller. Everything else (a match count
//! with no payout entry, too few scatters, an idle session) is ordinary
//! control flow and ends up inside `RoundResult`.

use thiserror::Error;

use crate::symbols::SymbolType;

/// Invalid static configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid grid: {0}")]
    InvalidGrid(&'static str),

    #[error("Symbol table is empty")]
    NoSymbols,

    #[error("Symbol {0:?} defined more than once")]
    DuplicateSymbol(SymbolType),

    #[error("Invalid weight {weight} for symbol {symbol:?}")]
    InvalidWeight { symbol: SymbolType, weight: f64 },

    #[error("Total symbol weight must be positive (bonus weights: {bonus_active})")]
    NonPositiveTotalWeight { bonus_active: bool },

    #[error("At most one scatter symbol is allowed, found {0}")]
    MultipleScatters(usize),

    #[error("Payout key {key} for symbol {symbol:?} must be positive")]
    InvalidPayoutKey { symbol: SymbolType, key: u32 },

    #[error("Bonus award key {key} for symbol {symbol:?} must be positive")]
    InvalidAwardKey { symbol: SymbolType, key: u32 },

    #[error("Win-line id {0} must be a positive integer")]
    InvalidLineId(i32),

    #[error("Win-line id {0} is used more than once")]
    DuplicateLineId(i32),

    #[error("Win-line {line_id}: mask has {actual} cells, grid has {expected}")]
    MaskLength {
        line_id: i32,
        expected: usize,
        actual: usize,
    },

    #[error("Win-line {line_id}: reel {reel} selects {selected} cells, expected exactly 1")]
    MaskColumn {
        line_id: i32,
        reel: usize,
        selected: usize,
    },

    #[error("Default bet must be positive, got {0}")]
    InvalidDefaultBet(f64),

    #[error("Invalid timing: {0}")]
    InvalidTiming(&'static str),

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Config IO error: {0}")]
    Io(String),
}

/// Ordering violations between the round engine and the reel choreography
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencingError {
    #[error("Reel {reel} reached deceleration without a target symbol sequence")]
    MissingTarget { reel: usize },

    #[error("Reel {reel}: target has {actual} symbols, reel shows {expected}")]
    TargetLength {
        reel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Reel {reel} settled on symbols that differ from its target")]
    ReconciliationFailed { reel: usize },

    #[error("Round {round_id} completed while the previous completion is still unconsumed")]
    UnconsumedCompletion { round_id: u64 },

    #[error("A round is already in flight")]
    RoundInFlight,

    #[error("Waiting for the bonus popup to be acknowledged")]
    AwaitingAcknowledge,
}

/// Top-level error for the round core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SlotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sequencing(#[from] SequencingError),

    #[error("Invalid bet: {0}")]
    InvalidBet(f64),
}

/// Result type alias
pub type SlotResult<T> = Result<T, SlotError>;
