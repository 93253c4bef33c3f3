//! Free-spin bonus session
//!
//! The session is a two-state machine (`Idle`, `Active(n)`) driven once per
//! round by the scatter award of that round. [`advance`] is the whole rule;
//! [`BonusSession`] wraps it with the running session total.

use serde::{Deserialize, Serialize};

use crate::config::RetriggerPolicy;

/// Session state between rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BonusSessionState {
    /// A free-spin session is running
    pub active: bool,
    /// Free rounds left, including the next one
    pub rounds_remaining: u32,
}

impl BonusSessionState {
    /// No session
    pub fn idle() -> Self {
        Self::default()
    }

    /// Session with `rounds_remaining` free rounds
    pub fn active(rounds_remaining: u32) -> Self {
        Self {
            active: true,
            rounds_remaining,
        }
    }
}

/// Session transition produced by a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTransition {
    #[default]
    None,
    Start,
    Continue,
    End,
}

/// Apply one round's free-spin award to the session state.
///
/// From idle a positive award starts a session. From `Active(n)` the round
/// consumes one spin; a session reaching zero ends on this round and any
/// award won on it is dropped.
pub fn advance(
    current: BonusSessionState,
    awarded: u32,
    policy: RetriggerPolicy,
) -> (BonusSessionState, SessionTransition) {
    if !current.active {
        return if awarded > 0 {
            (BonusSessionState::active(awarded), SessionTransition::Start)
        } else {
            (BonusSessionState::idle(), SessionTransition::None)
        };
    }

    let left = current.rounds_remaining.saturating_sub(1);
    if left == 0 {
        return (BonusSessionState::idle(), SessionTransition::End);
    }

    let extension = match policy {
        RetriggerPolicy::Extend => awarded,
        RetriggerPolicy::Ignore => 0,
    };
    (
        BonusSessionState::active(left.saturating_add(extension)),
        SessionTransition::Continue,
    )
}

/// Spins a transition actually granted: the trigger award on `Start`, the
/// retrigger extension on `Continue`, nothing otherwise
pub fn granted_spins(
    previous: BonusSessionState,
    next: BonusSessionState,
    transition: SessionTransition,
) -> u32 {
    match transition {
        SessionTransition::Start => next.rounds_remaining,
        SessionTransition::Continue => {
            (next.rounds_remaining + 1).saturating_sub(previous.rounds_remaining)
        }
        SessionTransition::End | SessionTransition::None => 0,
    }
}

/// Session tracker owned by the round engine
#[derive(Debug, Clone, Default)]
pub struct BonusSession {
    state: BonusSessionState,
    policy: RetriggerPolicy,
    /// Win accumulated over the running session (trigger round included)
    session_win: f64,
    /// Spins granted since the session started, retriggers included
    total_awarded: u32,
}

impl BonusSession {
    /// Create an idle session
    pub fn new(policy: RetriggerPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Current state
    pub fn state(&self) -> BonusSessionState {
        self.state
    }

    /// Session running?
    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Free rounds left
    pub fn rounds_remaining(&self) -> u32 {
        self.state.rounds_remaining
    }

    /// Win accumulated over the running (or just ended) session
    pub fn session_win(&self) -> f64 {
        self.session_win
    }

    /// Spins granted over the running (or just ended) session
    pub fn total_awarded(&self) -> u32 {
        self.total_awarded
    }

    /// Record a round's outcome and move the state machine
    pub fn record_round(&mut self, awarded: u32, round_win: f64) -> SessionTransition {
        let (next, transition) = advance(self.state, awarded, self.policy);

        match transition {
            SessionTransition::Start => {
                self.session_win = round_win;
                self.total_awarded = awarded;
                log::info!("Bonus session started: {} free spins", awarded);
            }
            SessionTransition::Continue => {
                self.session_win += round_win;
                let extension = granted_spins(self.state, next, transition);
                if extension > 0 {
                    self.total_awarded += extension;
                    log::info!(
                        "Bonus session retriggered: +{} spins, {} remaining",
                        extension,
                        next.rounds_remaining
                    );
                }
            }
            SessionTransition::End => {
                self.session_win += round_win;
                if awarded > 0 {
                    log::debug!("Award of {} on the final free round is not carried over", awarded);
                }
                log::info!(
                    "Bonus session ended: {} spins, total win {:.2}",
                    self.total_awarded,
                    self.session_win
                );
            }
            SessionTransition::None => {}
        }

        self.state = next;
        transition
    }

    /// Drop any running session
    pub fn reset(&mut self) {
        self.state = BonusSessionState::idle();
        self.session_win = 0.0;
        self.total_awarded = 0;
    }
}
