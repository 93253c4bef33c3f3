//! Presentation boundary
//!
//! [`SlotGame`] is what a renderer talks to: `request_spin` computes the
//! outcome synchronously and starts the choreography, `update` drives it
//! from the frame loop, and `acknowledge_bonus_popup` releases the bonus
//! flow after a free-spin popup is dismissed. Everything the renderer needs
//! to draw arrives as [`RoundEvent`]s on the channel from [`SlotGame::events`].

use crossbeam_channel::Receiver;

use crate::bonus::{BonusSessionState, SessionTransition};
use crate::config::SlotConfig;
use crate::engine::{RoundEngine, RoundResult, SessionStats};
use crate::error::{ConfigError, SequencingError, SlotError, SlotResult};
use crate::events::{EventSink, RoundEvent, RoundTrace};
use crate::grid::Grid;
use crate::orchestrator::{Cue, SpinOrchestrator};

/// What the game is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    /// Ready for `request_spin`
    #[default]
    Idle,
    /// Reels spinning or wins being shown
    RoundInFlight,
    /// A bonus start/end popup is up
    AwaitingAcknowledge(SessionTransition),
    /// Next free round starts on its own
    AutoSpinPending,
}

/// Round engine plus choreography behind one API
pub struct SlotGame {
    engine: RoundEngine,
    orchestrator: SpinOrchestrator,
    state: GameState,
    /// Bet carried into automatic free rounds
    session_bet: f64,
}

impl SlotGame {
    /// Create a game; the config is validated first
    pub fn new(config: SlotConfig) -> Result<Self, ConfigError> {
        let engine = RoundEngine::from_config(config)?;
        let orchestrator = SpinOrchestrator::new(engine.config(), EventSink::new());
        Ok(Self::assemble(engine, orchestrator))
    }

    /// Create a game with reproducible outcomes and filler symbols
    pub fn with_seed(config: SlotConfig, seed: u64) -> Result<Self, ConfigError> {
        let engine = RoundEngine::with_seed(config, seed)?;
        let orchestrator = SpinOrchestrator::new(engine.config(), EventSink::new())
            .with_presentation_seed(seed.wrapping_add(1));
        Ok(Self::assemble(engine, orchestrator))
    }

    fn assemble(engine: RoundEngine, orchestrator: SpinOrchestrator) -> Self {
        Self {
            session_bet: engine.config().default_bet,
            engine,
            orchestrator,
            state: GameState::Idle,
        }
    }

    /// Receiver for round events
    pub fn events(&self) -> Receiver<RoundEvent> {
        self.orchestrator.subscribe()
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == GameState::Idle
    }

    pub fn config(&self) -> &SlotConfig {
        self.engine.config()
    }

    pub fn stats(&self) -> &SessionStats {
        self.engine.stats()
    }

    pub fn session_state(&self) -> BonusSessionState {
        self.engine.session_state()
    }

    /// Orchestrator clock (ms)
    pub fn now_ms(&self) -> f64 {
        self.orchestrator.now_ms()
    }

    pub fn orchestrator(&self) -> &SpinOrchestrator {
        &self.orchestrator
    }

    /// Trace of the current (or most recent) round
    pub fn last_trace(&self) -> Option<&RoundTrace> {
        self.orchestrator.trace()
    }

    /// Compute a round and start its choreography
    pub fn request_spin(&mut self, bet: f64) -> SlotResult<RoundResult> {
        self.check_ready()?;
        let result = self.engine.play_round(bet)?;
        self.session_bet = bet;
        self.start_round(result)
    }

    /// Like [`request_spin`](Self::request_spin) on a scripted grid
    pub fn request_spin_forced(&mut self, bet: f64, grid: Grid) -> SlotResult<RoundResult> {
        self.check_ready()?;
        let result = self.engine.play_forced(bet, grid)?;
        self.session_bet = bet;
        self.start_round(result)
    }

    /// Advance the choreography by one frame
    pub fn update(&mut self, dt_ms: f64) -> SlotResult<()> {
        let cues = match self.orchestrator.update(dt_ms) {
            Ok(cues) => cues,
            Err(e) => return Err(self.fail(e)),
        };

        for cue in cues {
            match cue {
                Cue::PresentationFinished {
                    round_id,
                    transition,
                } => self.on_presentation_finished(round_id, transition),
                Cue::AutoSpinDue => self.on_auto_spin()?,
            }
        }
        Ok(())
    }

    /// Dismiss a bonus start/end popup.
    ///
    /// Returns false when no popup was waiting.
    pub fn acknowledge_bonus_popup(&mut self) -> bool {
        let GameState::AwaitingAcknowledge(transition) = self.state else {
            log::warn!("acknowledge_bonus_popup with no popup pending ({:?})", self.state);
            return false;
        };

        if transition == SessionTransition::Start {
            self.orchestrator
                .schedule_auto_spin(self.engine.config().timing.auto_spin_delay_ms);
            self.state = GameState::AutoSpinPending;
        } else {
            self.state = GameState::Idle;
        }
        true
    }

    /// Abort the round in flight: cancel timers, idle the reels.
    ///
    /// Pending auto-spins and popups are dropped too. The bonus session itself
    /// is kept; the next `request_spin` continues it.
    pub fn abort_round(&mut self) -> Option<u64> {
        let in_flight = self.state == GameState::RoundInFlight;
        let round_id = self.orchestrator.abort().filter(|_| in_flight);
        self.state = GameState::Idle;

        if let Some(round_id) = round_id {
            log::info!("Round {} aborted", round_id);
            self.orchestrator.emit(RoundEvent::RoundAborted {
                round_id,
                reason: "aborted by host".to_string(),
            });
        }
        round_id
    }

    fn check_ready(&self) -> Result<(), SequencingError> {
        match self.state {
            GameState::Idle => Ok(()),
            GameState::AwaitingAcknowledge(_) => Err(SequencingError::AwaitingAcknowledge),
            GameState::RoundInFlight | GameState::AutoSpinPending => {
                Err(SequencingError::RoundInFlight)
            }
        }
    }

    fn start_round(&mut self, result: RoundResult) -> SlotResult<RoundResult> {
        if let Err(e) = self.orchestrator.begin_round(result.clone()) {
            return Err(self.fail(e));
        }
        self.orchestrator.emit(RoundEvent::SpinRequested {
            round_id: result.round_id,
            bet: result.bet,
            free_round: result.free_round,
        });
        self.state = GameState::RoundInFlight;
        Ok(result)
    }

    fn on_presentation_finished(&mut self, round_id: u64, transition: SessionTransition) {
        self.orchestrator.consume_completion();
        let rounds_remaining = self.engine.session_state().rounds_remaining;

        self.state = match transition {
            SessionTransition::None => GameState::Idle,
            SessionTransition::Start => {
                self.orchestrator.emit(RoundEvent::BonusSessionStarted {
                    free_spins_awarded: rounds_remaining,
                });
                GameState::AwaitingAcknowledge(transition)
            }
            SessionTransition::Continue => {
                self.orchestrator.emit(RoundEvent::BonusSessionContinued { rounds_remaining });
                self.orchestrator
                    .schedule_auto_spin(self.engine.config().timing.auto_spin_delay_ms);
                GameState::AutoSpinPending
            }
            SessionTransition::End => {
                self.orchestrator.emit(RoundEvent::BonusSessionEnded {
                    total_win: self.engine.session_win(),
                });
                GameState::AwaitingAcknowledge(transition)
            }
        };
        log::debug!("Round {} presented, now {:?}", round_id, self.state);
    }

    fn on_auto_spin(&mut self) -> SlotResult<()> {
        if self.state != GameState::AutoSpinPending {
            return Ok(());
        }
        self.state = GameState::Idle;
        let result = self.engine.play_round(self.session_bet)?;
        self.start_round(result).map(|_| ())
    }

    /// Report a sequencing error and abort the round
    fn fail(&mut self, error: SequencingError) -> SlotError {
        log::error!("Sequencing error, aborting round: {}", error);
        let round_id = self.orchestrator.abort().unwrap_or(0);
        self.orchestrator.emit(RoundEvent::RoundAborted {
            round_id,
            reason: error.to_string(),
        });
        self.state = GameState::Idle;
        SlotError::Sequencing(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TimingConfig;

    fn game() -> SlotGame {
        SlotGame::with_seed(SlotConfig::reference().with_timing(TimingConfig::turbo()), 8).unwrap()
    }

    #[test]
    fn test_spin_returns_result_synchronously() {
        let mut game = game();
        let result = game.request_spin(2.0).unwrap();
        assert_eq!(result.round_id, 1);
        assert_eq!(result.bet, 2.0);
        assert_eq!(game.state(), GameState::RoundInFlight);
    }

    #[test]
    fn test_spin_rejected_while_in_flight() {
        let mut game = game();
        game.request_spin(1.0).unwrap();
        assert_eq!(
            game.request_spin(1.0).unwrap_err(),
            SlotError::Sequencing(SequencingError::RoundInFlight)
        );
        assert_eq!(game.stats().total_spins, 1);
    }

    #[test]
    fn test_invalid_bet() {
        let mut game = game();
        assert_eq!(game.request_spin(-1.0).unwrap_err(), SlotError::InvalidBet(-1.0));
        assert!(game.is_idle());
    }

    #[test]
    fn test_acknowledge_without_popup() {
        let mut game = game();
        assert!(!game.acknowledge_bonus_popup());
    }

    #[test]
    fn test_abort_when_idle_is_quiet() {
        let mut game = game();
        let events = game.events();
        assert_eq!(game.abort_round(), None);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = SlotConfig::reference();
        config.grid.symbols_per_reel = 5;
        assert!(SlotGame::new(config).is_err());
    }
}
