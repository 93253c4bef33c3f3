//! Round engine: one round end-to-end
//!
//! Generate a grid (bonus weights when a session is active), evaluate it,
//! move the bonus session and hand back an immutable [`RoundResult`]. The
//! whole sequence runs synchronously under `&mut self`, so one round is one
//! atomic unit; [`SharedRoundEngine`] keeps that true across threads.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bonus::{BonusSession, BonusSessionState, SessionTransition, granted_spins};
use crate::config::SlotConfig;
use crate::error::{ConfigError, SlotError, SlotResult};
use crate::grid::{Grid, GridGenerator};
use crate::paytable::{EvaluationResult, PayTable, WinLineResult};
use crate::symbols::SymbolType;

/// Immutable outcome of one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Sequential round id (1-based)
    pub round_id: u64,
    /// Bet the round was scored with
    pub bet: f64,
    /// Played inside a bonus session (no wager taken)
    pub free_round: bool,
    /// Final grid
    pub grid: Grid,
    /// Winning lines in id order, then the scatter result when it qualifies
    pub line_results: Vec<WinLineResult>,
    /// Sum of every payout in `line_results`
    pub total_payout: f64,
    /// Scatter cells anywhere on the grid
    pub scatter_count: u32,
    /// Free spins granted this round (trigger award or retrigger extension)
    pub bonus_awarded: Option<u32>,
    /// Session transition applied after this round
    pub bonus_transition: SessionTransition,
    /// Free rounds left after this round
    pub rounds_remaining: u32,
}

impl RoundResult {
    /// Check if this is a winning round
    pub fn is_win(&self) -> bool {
        self.total_payout > 0.0
    }

    /// Win-to-bet ratio
    pub fn win_ratio(&self) -> f64 {
        if self.bet > 0.0 {
            self.total_payout / self.bet
        } else {
            0.0
        }
    }

    /// Final symbols of one reel, top to bottom
    pub fn reel_symbols(&self, reel: usize) -> Vec<SymbolType> {
        self.grid.reel(reel).to_vec()
    }
}

/// Session statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_spins: u64,
    pub free_spins: u64,
    pub total_bet: f64,
    pub total_win: f64,
    pub wins: u64,
    pub losses: u64,
    pub sessions_triggered: u64,
    pub free_spins_awarded: u64,
    pub max_win_ratio: f64,
}

impl SessionStats {
    /// Calculate RTP (percent of wagered returned)
    pub fn rtp(&self) -> f64 {
        if self.total_bet > 0.0 {
            (self.total_win / self.total_bet) * 100.0
        } else {
            0.0
        }
    }

    /// Calculate hit rate (percent of rounds that paid)
    pub fn hit_rate(&self) -> f64 {
        if self.total_spins > 0 {
            (self.wins as f64 / self.total_spins as f64) * 100.0
        } else {
            0.0
        }
    }

    fn record(&mut self, result: &RoundResult) {
        self.total_spins += 1;
        if result.free_round {
            self.free_spins += 1;
        } else {
            self.total_bet += result.bet;
        }
        self.total_win += result.total_payout;

        if result.is_win() {
            self.wins += 1;
        } else {
            self.losses += 1;
        }

        if result.bonus_transition == SessionTransition::Start {
            self.sessions_triggered += 1;
        }
        self.free_spins_awarded += result.bonus_awarded.unwrap_or(0) as u64;

        self.max_win_ratio = self.max_win_ratio.max(result.win_ratio());
    }
}

/// Round engine
pub struct RoundEngine {
    /// Configuration (validated)
    config: SlotConfig,
    /// Paytable
    paytable: PayTable,
    /// Outcome RNG
    rng: StdRng,
    /// Free-spin session
    session: BonusSession,
    /// Current session stats
    stats: SessionStats,
    /// Rounds played
    round_count: u64,
}

impl RoundEngine {
    /// Create an engine; the config is validated first
    pub fn from_config(config: SlotConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "Round engine ready: {}x{} grid, {} win-lines, bonus {}",
            config.grid.reel_count,
            config.grid.symbols_per_reel,
            config.win_lines.len(),
            if config.bonus.enabled { "enabled" } else { "disabled" }
        );

        Ok(Self {
            paytable: PayTable::from_config(&config),
            rng: StdRng::from_os_rng(),
            session: BonusSession::new(config.bonus.retrigger),
            stats: SessionStats::default(),
            round_count: 0,
            config,
        })
    }

    /// Create a seeded engine for reproducible runs
    pub fn with_seed(config: SlotConfig, seed: u64) -> Result<Self, ConfigError> {
        let mut engine = Self::from_config(config)?;
        engine.seed(seed);
        Ok(engine)
    }

    /// Seed RNG for reproducible results
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Get current config
    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Get the paytable
    pub fn paytable(&self) -> &PayTable {
        &self.paytable
    }

    /// Get session stats
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Reset session stats
    pub fn reset_stats(&mut self) {
        self.stats = SessionStats::default();
    }

    /// Current bonus session state
    pub fn session_state(&self) -> BonusSessionState {
        self.session.state()
    }

    /// Win accumulated over the current (or just ended) bonus session
    pub fn session_win(&self) -> f64 {
        self.session.session_win()
    }

    /// Is a bonus session running?
    pub fn in_free_spins(&self) -> bool {
        self.session.is_active()
    }

    /// Rounds played so far
    pub fn round_count(&self) -> u64 {
        self.round_count
    }

    /// Play one round with a freshly generated grid
    pub fn play_round(&mut self, bet: f64) -> SlotResult<RoundResult> {
        validate_bet(bet)?;
        let bonus_active = self.session.is_active();
        let grid = GridGenerator::generate(
            self.config.grid,
            &self.config.symbols,
            bonus_active,
            &mut self.rng,
        )?;
        Ok(self.resolve(bet, grid))
    }

    /// Play one round on a given grid (scripted outcomes, replays)
    pub fn play_forced(&mut self, bet: f64, grid: Grid) -> SlotResult<RoundResult> {
        validate_bet(bet)?;
        if grid.config() != self.config.grid {
            return Err(
                ConfigError::InvalidGrid("forced grid does not match configured dimensions").into(),
            );
        }
        Ok(self.resolve(bet, grid))
    }

    /// Drop any running bonus session
    pub fn reset_session(&mut self) {
        self.session.reset();
    }

    fn resolve(&mut self, bet: f64, grid: Grid) -> RoundResult {
        self.round_count += 1;
        let free_round = self.session.is_active();

        let evaluation = self.paytable.evaluate(&grid, bet);
        let awarded = self.free_spins_for(&evaluation);
        let previous = self.session.state();
        let transition = self.session.record_round(awarded, evaluation.total_payout);
        let granted = granted_spins(previous, self.session.state(), transition);

        let result = RoundResult {
            round_id: self.round_count,
            bet,
            free_round,
            grid,
            scatter_count: evaluation.scatter_count(),
            total_payout: evaluation.total_payout,
            line_results: evaluation.line_results,
            bonus_awarded: (granted > 0).then_some(granted),
            bonus_transition: transition,
            rounds_remaining: self.session.rounds_remaining(),
        };

        log::debug!(
            "Round {}: payout {:.2} ({} results), scatters {}, transition {:?}",
            result.round_id,
            result.total_payout,
            result.line_results.len(),
            result.scatter_count,
            result.bonus_transition
        );

        self.stats.record(&result);
        result
    }

    /// Free spins this evaluation grants under the bonus rules
    fn free_spins_for(&self, evaluation: &EvaluationResult) -> u32 {
        if !self.config.bonus.enabled || !evaluation.scatter_qualifies() {
            return 0;
        }
        let award_table_empty = self
            .config
            .symbols
            .scatter()
            .is_none_or(|def| def.bonus_award.as_ref().is_none_or(|t| t.is_empty()));

        if award_table_empty {
            self.config.bonus.base_session_length
        } else {
            evaluation.free_spins_awarded()
        }
    }
}

fn validate_bet(bet: f64) -> SlotResult<()> {
    if bet.is_finite() && bet > 0.0 {
        Ok(())
    } else {
        Err(SlotError::InvalidBet(bet))
    }
}

/// Round engine behind a mutex, for hosts that drive rounds from several threads
#[derive(Clone)]
pub struct SharedRoundEngine {
    inner: Arc<Mutex<RoundEngine>>,
}

impl SharedRoundEngine {
    pub fn new(engine: RoundEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Play one round; generate, evaluate and advance run under one lock
    pub fn play_round(&self, bet: f64) -> SlotResult<RoundResult> {
        self.inner.lock().play_round(bet)
    }

    /// Snapshot of the session stats
    pub fn stats(&self) -> SessionStats {
        self.inner.lock().stats().clone()
    }

    /// Current bonus session state
    pub fn session_state(&self) -> BonusSessionState {
        self.inner.lock().session_state()
    }
}
