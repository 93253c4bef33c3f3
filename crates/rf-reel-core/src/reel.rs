//! Per-reel timing state machine
//!
//! `Idle → Accelerating → Spinning → Decelerating → Settling → Idle`
//!
//! Offsets are in symbol heights. Every integer crossing scrolls one symbol
//! in at the top of the window and drops one at the bottom. On a stop command
//! the reel fixes a grid-aligned stop offset; once exactly one window of
//! steps remains, the target symbols are queued so the window shows the
//! target precisely when the reel snaps to the stop offset.

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::SequencingError;
use crate::symbols::SymbolType;
use crate::timing::TimingConfig;

/// Frame length the per-frame slowdown factor is expressed against (60 Hz)
const REFERENCE_FRAME_MS: f64 = 1000.0 / 60.0;

/// Reel phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReelPhase {
    #[default]
    Idle,
    Accelerating,
    Spinning,
    Decelerating,
    Settling,
}

impl ReelPhase {
    /// Reel is moving
    pub fn is_moving(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Snapshot of one reel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReelState {
    pub index: usize,
    pub phase: ReelPhase,
    /// Scrolled distance in symbol heights
    pub current_offset: f64,
    pub target: Option<Vec<SymbolType>>,
}

/// Motion constants for one reel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReelMotion {
    pub accelerate_ms: f64,
    pub spin_speed: f64,
    pub slowdown_per_frame: f64,
    pub settle_speed: f64,
    pub stop_lead_symbols: u32,
}

impl ReelMotion {
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            accelerate_ms: timing.accelerate_ms,
            spin_speed: timing.spin_speed,
            slowdown_per_frame: timing.slowdown_per_frame,
            settle_speed: timing.settle_speed,
            stop_lead_symbols: timing.stop_lead_symbols,
        }
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Nothing to report (idle, or still moving)
    Running,
    /// Snapped to the stop offset showing the target; reel is idle again.
    /// `after_ms` is how far into the tick the stop offset was reached.
    Settled { after_ms: f64 },
}

/// One reel
#[derive(Debug, Clone)]
pub struct ReelTimer {
    index: usize,
    symbols_per_reel: usize,
    motion: ReelMotion,
    phase: ReelPhase,
    /// Whole symbol steps scrolled
    steps: u64,
    /// Progress towards the next step, in [0, 1)
    fraction: f64,
    /// Symbols per second
    speed: f64,
    accelerating_ms: f64,
    /// Visible symbols, top to bottom
    window: VecDeque<SymbolType>,
    /// Symbols queued to scroll in next (front first)
    incoming: VecDeque<SymbolType>,
    target: Option<Vec<SymbolType>>,
    stop_at: Option<u64>,
    /// Cosmetic symbols scrolled in before the target is queued
    fillers: Vec<SymbolType>,
}

impl ReelTimer {
    /// Create an idle reel showing fillers
    pub fn new(
        index: usize,
        symbols_per_reel: usize,
        motion: ReelMotion,
        fillers: Vec<SymbolType>,
    ) -> Self {
        let window = fillers
            .iter()
            .copied()
            .cycle()
            .skip(index)
            .take(symbols_per_reel)
            .collect();

        Self {
            index,
            symbols_per_reel,
            motion,
            phase: ReelPhase::Idle,
            steps: 0,
            fraction: 0.0,
            speed: 0.0,
            accelerating_ms: 0.0,
            window,
            incoming: VecDeque::new(),
            target: None,
            stop_at: None,
            fillers,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> ReelPhase {
        self.phase
    }

    /// Scrolled distance in symbol heights
    pub fn offset(&self) -> f64 {
        self.steps as f64 + self.fraction
    }

    /// Current speed (symbols per second)
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Visible symbols, top to bottom
    pub fn visible(&self) -> Vec<SymbolType> {
        self.window.iter().copied().collect()
    }

    pub fn target(&self) -> Option<&[SymbolType]> {
        self.target.as_deref()
    }

    /// Snapshot
    pub fn state(&self) -> ReelState {
        ReelState {
            index: self.index,
            phase: self.phase,
            current_offset: self.offset(),
            target: self.target.clone(),
        }
    }

    /// Hand the reel the symbols it has to land on (top to bottom)
    pub fn set_target(&mut self, target: Vec<SymbolType>) -> Result<(), SequencingError> {
        if target.len() != self.symbols_per_reel {
            return Err(SequencingError::TargetLength {
                reel: self.index,
                expected: self.symbols_per_reel,
                actual: target.len(),
            });
        }
        self.target = Some(target);
        Ok(())
    }

    /// Start accelerating
    pub fn start(&mut self) {
        if self.phase.is_moving() {
            log::warn!("Reel {} start ignored: already {:?}", self.index, self.phase);
            return;
        }
        self.speed = 0.0;
        self.accelerating_ms = 0.0;
        self.stop_at = None;
        self.incoming.clear();
        self.set_phase(ReelPhase::Accelerating);
        if self.motion.accelerate_ms <= 0.0 {
            self.speed = self.motion.spin_speed;
            self.set_phase(ReelPhase::Spinning);
        }
    }

    /// Begin decelerating towards a grid-aligned stop.
    ///
    /// The target must already be known; landing on anything else would
    /// show an outcome different from the one that was scored.
    pub fn stop(&mut self) -> Result<(), SequencingError> {
        if !matches!(self.phase, ReelPhase::Accelerating | ReelPhase::Spinning) {
            log::warn!("Reel {} stop ignored: {:?}", self.index, self.phase);
            return Ok(());
        }
        if self.target.is_none() {
            return Err(SequencingError::MissingTarget { reel: self.index });
        }

        let distance = self.symbols_per_reel as u64 + self.motion.stop_lead_symbols as u64;
        self.stop_at = Some(self.steps + distance);
        self.set_phase(ReelPhase::Decelerating);
        self.splice_if_due()
    }

    /// Return to idle immediately, dropping target and motion
    pub fn reset(&mut self) {
        self.phase = ReelPhase::Idle;
        self.speed = 0.0;
        self.fraction = 0.0;
        self.accelerating_ms = 0.0;
        self.stop_at = None;
        self.incoming.clear();
        self.target = None;
    }

    /// Advance motion by `dt_ms`; `rng` only draws cosmetic fillers
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        dt_ms: f64,
        rng: &mut R,
    ) -> Result<TickOutcome, SequencingError> {
        if dt_ms <= 0.0 {
            return Ok(TickOutcome::Running);
        }

        match self.phase {
            ReelPhase::Idle => return Ok(TickOutcome::Running),
            ReelPhase::Accelerating => {
                self.accelerating_ms += dt_ms;
                let ramp = (self.accelerating_ms / self.motion.accelerate_ms).min(1.0);
                self.speed = self.motion.spin_speed * ramp;
                if ramp >= 1.0 {
                    self.set_phase(ReelPhase::Spinning);
                }
            }
            ReelPhase::Spinning => self.speed = self.motion.spin_speed,
            ReelPhase::Decelerating | ReelPhase::Settling => {
                let decay = self.motion.slowdown_per_frame.powf(dt_ms / REFERENCE_FRAME_MS);
                self.speed = (self.speed * decay).max(self.motion.settle_speed);
            }
        }

        let total = self.speed * dt_ms / 1000.0;
        let mut travel = total;
        while self.fraction + travel >= 1.0 {
            travel -= 1.0 - self.fraction;
            self.fraction = 0.0;
            self.step(rng);

            if self.stop_at == Some(self.steps) {
                let after_ms = if self.speed > 0.0 {
                    ((total - travel) * 1000.0 / self.speed).clamp(0.0, dt_ms)
                } else {
                    dt_ms
                };
                return self.settle().map(|_| TickOutcome::Settled { after_ms });
            }
            self.splice_if_due()?;
        }
        self.fraction += travel;

        Ok(TickOutcome::Running)
    }

    fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let next = self
            .incoming
            .pop_front()
            .or_else(|| self.fillers.choose(rng).copied())
            .unwrap_or(SymbolType::Circle);
        self.window.pop_back();
        self.window.push_front(next);
        self.steps += 1;
    }

    /// Queue the target once exactly one window of steps is left
    fn splice_if_due(&mut self) -> Result<(), SequencingError> {
        if self.phase != ReelPhase::Decelerating {
            return Ok(());
        }
        let Some(stop_at) = self.stop_at else {
            return Ok(());
        };
        if stop_at.saturating_sub(self.steps) != self.symbols_per_reel as u64 {
            return Ok(());
        }

        let target = self
            .target
            .as_ref()
            .ok_or(SequencingError::MissingTarget { reel: self.index })?;
        // First queued ends up at the bottom
        self.incoming = target.iter().rev().copied().collect();
        self.set_phase(ReelPhase::Settling);
        Ok(())
    }

    fn settle(&mut self) -> Result<(), SequencingError> {
        self.fraction = 0.0;
        self.speed = 0.0;
        self.stop_at = None;
        self.set_phase(ReelPhase::Idle);

        let matches = self
            .target
            .as_ref()
            .is_some_and(|t| t.iter().eq(self.window.iter()));
        if !matches {
            return Err(SequencingError::ReconciliationFailed { reel: self.index });
        }
        Ok(())
    }

    fn set_phase(&mut self, phase: ReelPhase) {
        if self.phase != phase {
            log::trace!("Reel {}: {:?} -> {:?}", self.index, self.phase, phase);
            self.phase = phase;
        }
    }
}
