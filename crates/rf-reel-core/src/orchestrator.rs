//! Spin orchestrator: cross-reel timing, settle barrier and win reveal
//!
//! The orchestrator owns every reel and a virtual-clock [`Scheduler`]. A
//! round goes:
//!
//! 1. `begin_round` hands each reel its final symbols and schedules
//!    staggered start and stop commands
//! 2. reels settle one by one; the [`SettleBarrier`] fires once all have
//! 3. after the check-win delay each result in `line_results` is highlighted
//!    in turn, every reel holding a matching cell pulsing once
//! 4. when the last pulse on any reel ends, `WinPresentationFinished` fires
//!    and the caller gets [`Cue::PresentationFinished`]
//!
//! Time only advances through [`SpinOrchestrator::update`].

use rand::prelude::*;

use crate::barrier::{BarrierState, SettleBarrier};
use crate::bonus::SessionTransition;
use crate::config::SlotConfig;
use crate::engine::RoundResult;
use crate::error::SequencingError;
use crate::events::{EventSink, RoundEvent, RoundTrace};
use crate::reel::{ReelMotion, ReelState, ReelTimer, TickOutcome};
use crate::scheduler::Scheduler;
use crate::timing::TimingConfig;

/// Timed actions on the orchestrator clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinAction {
    StartReel(usize),
    StopReel(usize),
    /// Post-settle delay elapsed; begin the win reveal
    Reveal,
    /// Highlight `line_results[index]`
    HighlightLine(usize),
    PulseEnd { reel: usize },
    AutoSpin,
}

/// Orchestrator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestratorPhase {
    #[default]
    Idle,
    /// Reels moving
    Spinning,
    /// All reels settled, waiting for the check-win delay
    Revealing,
    /// Win-lines being highlighted
    Highlighting,
    /// Presentation finished, completion not yet consumed
    Finished,
}

/// Signals for the owner of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Reveal done; the bonus transition may now be shown
    PresentationFinished {
        round_id: u64,
        transition: SessionTransition,
    },
    /// A scheduled automatic spin is due
    AutoSpinDue,
}

/// Spin orchestrator
pub struct SpinOrchestrator {
    timing: TimingConfig,
    reels: Vec<ReelTimer>,
    scheduler: Scheduler<SpinAction>,
    barrier: SettleBarrier,
    phase: OrchestratorPhase,
    /// Result the reels are landing on
    result: Option<RoundResult>,
    /// Round whose completion has fired but was not yet consumed
    unconsumed: Option<u64>,
    /// Highlight pulses running per reel
    pulses: Vec<u32>,
    /// Every line of the current result has been highlighted
    lines_done: bool,
    events: EventSink,
    /// Cosmetic filler symbols only; never touches outcomes
    presentation_rng: StdRng,
}

impl SpinOrchestrator {
    /// Create with one idle reel per grid column
    pub fn new(config: &SlotConfig, events: EventSink) -> Self {
        let motion = ReelMotion::from_timing(&config.timing);
        let fillers = config.symbols.symbol_types();
        let reel_count = config.grid.reel_count;

        let reels = (0..reel_count)
            .map(|i| ReelTimer::new(i, config.grid.symbols_per_reel, motion, fillers.clone()))
            .collect();

        Self {
            timing: config.timing.clone(),
            reels,
            scheduler: Scheduler::new(),
            barrier: SettleBarrier::new(reel_count),
            phase: OrchestratorPhase::Idle,
            result: None,
            unconsumed: None,
            pulses: vec![0; reel_count],
            lines_done: false,
            events,
            presentation_rng: StdRng::from_os_rng(),
        }
    }

    /// Builder: seed the filler RNG (reproducible traces)
    pub fn with_presentation_seed(mut self, seed: u64) -> Self {
        self.presentation_rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn phase(&self) -> OrchestratorPhase {
        self.phase
    }

    /// A round is spinning or being revealed
    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            OrchestratorPhase::Spinning
                | OrchestratorPhase::Revealing
                | OrchestratorPhase::Highlighting
        )
    }

    /// Current virtual time (ms)
    pub fn now_ms(&self) -> f64 {
        self.scheduler.now_ms()
    }

    pub fn reels(&self) -> &[ReelTimer] {
        &self.reels
    }

    pub fn reel_states(&self) -> Vec<ReelState> {
        self.reels.iter().map(|r| r.state()).collect()
    }

    /// Reels settled so far this round
    pub fn settled_count(&self) -> usize {
        self.barrier.settled_count()
    }

    /// Result of the round in flight (or last finished)
    pub fn result(&self) -> Option<&RoundResult> {
        self.result.as_ref()
    }

    pub fn subscribe(&self) -> crossbeam_channel::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    pub fn trace(&self) -> Option<&RoundTrace> {
        self.events.trace()
    }

    /// Emit an event stamped with the current virtual time
    pub fn emit(&mut self, event: RoundEvent) {
        let now = self.scheduler.now_ms();
        self.events.emit(now, event);
    }

    /// Hand the reels a computed result and start the choreography
    pub fn begin_round(&mut self, result: RoundResult) -> Result<(), SequencingError> {
        if self.is_busy() {
            return Err(SequencingError::RoundInFlight);
        }
        self.events.begin_trace(result.round_id);
        self.resolve(result)?;
        self.start_spin()
    }

    /// Supply the final symbols for every reel.
    ///
    /// Normally called by [`begin_round`](Self::begin_round) before any reel
    /// moves; a host may call it late, as long as it lands before the first
    /// stop command.
    pub fn resolve(&mut self, result: RoundResult) -> Result<(), SequencingError> {
        for (i, reel) in self.reels.iter_mut().enumerate() {
            reel.set_target(result.reel_symbols(i))?;
        }
        self.result = Some(result);
        Ok(())
    }

    /// Schedule staggered start and stop commands for every reel
    pub fn start_spin(&mut self) -> Result<(), SequencingError> {
        if self.is_busy() {
            return Err(SequencingError::RoundInFlight);
        }

        let reel_count = self.reels.len();
        for i in 0..reel_count {
            self.scheduler
                .schedule(self.timing.start_delay(i), SpinAction::StartReel(i));
        }
        for i in 0..reel_count {
            self.scheduler
                .schedule(self.timing.stop_delay(i, reel_count), SpinAction::StopReel(i));
        }

        self.barrier.reset();
        self.pulses.fill(0);
        self.lines_done = false;
        self.phase = OrchestratorPhase::Spinning;
        Ok(())
    }

    /// Consume the finished round's completion; the orchestrator goes idle
    pub fn consume_completion(&mut self) {
        self.unconsumed = None;
        if self.phase == OrchestratorPhase::Finished {
            self.phase = OrchestratorPhase::Idle;
        }
    }

    /// Fire [`Cue::AutoSpinDue`] after `delay_ms`
    pub fn schedule_auto_spin(&mut self, delay_ms: f64) {
        self.scheduler.schedule(delay_ms, SpinAction::AutoSpin);
    }

    /// Cancel every timer and return all reels to idle.
    ///
    /// Returns the id of the round that was in flight, if any.
    pub fn abort(&mut self) -> Option<u64> {
        let cancelled = self.scheduler.cancel_all();
        for reel in &mut self.reels {
            reel.reset();
        }
        self.barrier.reset();
        self.pulses.fill(0);
        self.lines_done = false;
        self.unconsumed = None;
        self.phase = OrchestratorPhase::Idle;

        let round_id = self.result.take().map(|r| r.round_id);
        log::debug!("Orchestrator aborted: {} timers cancelled", cancelled);
        round_id
    }

    /// Advance the clock by `dt_ms`, moving reels and firing due timers in order
    pub fn update(&mut self, dt_ms: f64) -> Result<Vec<Cue>, SequencingError> {
        let mut cues = Vec::new();
        let end = self.scheduler.now_ms() + dt_ms.max(0.0);

        loop {
            let due = self.scheduler.next_due().filter(|&due| due <= end);
            self.tick_reels_to(due.unwrap_or(end))?;

            while let Some((_, action)) = self.scheduler.pop_due() {
                self.handle(action, &mut cues)?;
            }
            if due.is_none() {
                break;
            }
        }

        Ok(cues)
    }

    /// Move every reel up to `time_ms`; each settle is handled at the instant
    /// the reel reached its stop offset
    fn tick_reels_to(&mut self, time_ms: f64) -> Result<(), SequencingError> {
        let start = self.scheduler.now_ms();
        let dt_ms = time_ms - start;
        if dt_ms > 0.0 {
            let mut settled = Vec::new();
            for (i, reel) in self.reels.iter_mut().enumerate() {
                if let TickOutcome::Settled { after_ms } =
                    reel.tick(dt_ms, &mut self.presentation_rng)?
                {
                    settled.push((start + after_ms, i));
                }
            }
            // Stable sort: simultaneous settles stay in reel order
            settled.sort_by(|a, b| a.0.total_cmp(&b.0));
            for (at_ms, reel) in settled {
                self.scheduler.advance_to(at_ms);
                self.on_reel_settled(reel)?;
            }
        }
        self.scheduler.advance_to(time_ms);
        Ok(())
    }

    fn on_reel_settled(&mut self, reel: usize) -> Result<(), SequencingError> {
        let symbols = self.reels[reel].visible();
        self.emit(RoundEvent::ReelSettled { reel, symbols });

        match self.barrier.record(reel) {
            BarrierState::Complete => self.on_all_settled(),
            BarrierState::Pending { .. } | BarrierState::Ignored => Ok(()),
        }
    }

    fn on_all_settled(&mut self) -> Result<(), SequencingError> {
        if let Some(round_id) = self.unconsumed {
            return Err(SequencingError::UnconsumedCompletion { round_id });
        }
        let Some(result) = self.result.clone() else {
            return Err(SequencingError::MissingTarget { reel: 0 });
        };

        log::debug!("Round {} settled on all reels", result.round_id);
        self.unconsumed = Some(result.round_id);
        self.phase = OrchestratorPhase::Revealing;
        self.emit(RoundEvent::RoundCompleted {
            result: Box::new(result),
        });
        self.scheduler
            .schedule(self.timing.check_win_delay_ms, SpinAction::Reveal);
        Ok(())
    }

    fn handle(&mut self, action: SpinAction, cues: &mut Vec<Cue>) -> Result<(), SequencingError> {
        match action {
            SpinAction::StartReel(i) => {
                if let Some(reel) = self.reels.get_mut(i) {
                    reel.start();
                    self.emit(RoundEvent::ReelStarted { reel: i });
                }
            }
            SpinAction::StopReel(i) => {
                if let Some(reel) = self.reels.get_mut(i) {
                    reel.stop()?;
                    self.emit(RoundEvent::ReelStopping { reel: i });
                }
            }
            SpinAction::Reveal => {
                let has_lines = self
                    .result
                    .as_ref()
                    .is_some_and(|r| !r.line_results.is_empty());
                if has_lines {
                    self.phase = OrchestratorPhase::Highlighting;
                    self.highlight_line(0, cues);
                } else {
                    self.finish_presentation(cues);
                }
            }
            SpinAction::HighlightLine(index) => self.highlight_line(index, cues),
            SpinAction::PulseEnd { reel } => {
                if let Some(pulses) = self.pulses.get_mut(reel) {
                    *pulses = pulses.saturating_sub(1);
                }
                self.finish_if_quiet(cues);
            }
            SpinAction::AutoSpin => cues.push(Cue::AutoSpinDue),
        }
        Ok(())
    }

    fn highlight_line(&mut self, index: usize, cues: &mut Vec<Cue>) {
        let Some((line_id, cells, reels, total)) = self.result.as_ref().and_then(|r| {
            r.line_results
                .get(index)
                .map(|line| (line.line_id, line.cells.clone(), line.reels(), r.line_results.len()))
        }) else {
            self.lines_done = true;
            self.finish_if_quiet(cues);
            return;
        };

        self.emit(RoundEvent::WinLineHighlighted { line_id, cells });
        for reel in reels {
            if let Some(pulses) = self.pulses.get_mut(reel) {
                *pulses += 1;
                self.scheduler
                    .schedule(self.timing.highlight_ms, SpinAction::PulseEnd { reel });
            }
        }

        if index + 1 < total {
            self.scheduler.schedule(
                self.timing.highlight_ms + self.timing.line_gap_ms,
                SpinAction::HighlightLine(index + 1),
            );
        } else {
            self.lines_done = true;
            self.finish_if_quiet(cues);
        }
    }

    fn finish_if_quiet(&mut self, cues: &mut Vec<Cue>) {
        if self.phase == OrchestratorPhase::Highlighting
            && self.lines_done
            && self.pulses.iter().all(|&p| p == 0)
        {
            self.finish_presentation(cues);
        }
    }

    fn finish_presentation(&mut self, cues: &mut Vec<Cue>) {
        let Some((round_id, transition)) = self
            .result
            .as_ref()
            .map(|r| (r.round_id, r.bonus_transition))
        else {
            return;
        };

        self.phase = OrchestratorPhase::Finished;
        self.emit(RoundEvent::WinPresentationFinished { round_id });
        cues.push(Cue::PresentationFinished {
            round_id,
            transition,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RoundEngine;
    use crate::timing::StopPolicy;
    use approx::assert_relative_eq;

    const FRAME_MS: f64 = 1000.0 / 60.0;

    fn setup(timing: TimingConfig) -> (RoundEngine, SpinOrchestrator) {
        let config = SlotConfig::reference().with_timing(timing);
        let engine = RoundEngine::with_seed(config.clone(), 21).unwrap();
        let orchestrator =
            SpinOrchestrator::new(&config, EventSink::new()).with_presentation_seed(5);
        (engine, orchestrator)
    }

    fn run_until_finished(orchestrator: &mut SpinOrchestrator) -> Vec<Cue> {
        for _ in 0..20_000 {
            let cues = orchestrator.update(FRAME_MS).unwrap();
            if !cues.is_empty() {
                return cues;
            }
        }
        panic!("presentation never finished");
    }

    #[test]
    fn test_reels_land_on_result() {
        let (mut engine, mut orchestrator) = setup(TimingConfig::normal());
        let result = engine.play_round(1.0).unwrap();
        let grid = result.grid.clone();

        orchestrator.begin_round(result).unwrap();
        let cues = run_until_finished(&mut orchestrator);

        assert!(matches!(cues[0], Cue::PresentationFinished { .. }));
        assert_eq!(orchestrator.phase(), OrchestratorPhase::Finished);
        for (i, reel) in orchestrator.reels().iter().enumerate() {
            assert_eq!(reel.visible(), grid.reel(i));
        }
    }

    #[test]
    fn test_start_and_stop_schedule() {
        let (mut engine, mut orchestrator) = setup(TimingConfig::normal());
        orchestrator.begin_round(engine.play_round(1.0).unwrap()).unwrap();
        run_until_finished(&mut orchestrator);

        let trace = orchestrator.trace().unwrap();
        let starts: Vec<f64> = trace
            .events_by_type("reel_started")
            .iter()
            .map(|e| e.at_ms)
            .collect();
        let stops: Vec<f64> = trace
            .events_by_type("reel_stopping")
            .iter()
            .map(|e| e.at_ms)
            .collect();
        assert_eq!(starts, vec![0.0, 300.0, 600.0, 900.0]);
        assert_eq!(stops, vec![1400.0, 1800.0, 2200.0, 2600.0]);
    }

    #[test]
    fn test_per_reel_offset_policy() {
        let timing = TimingConfig {
            stop_policy: StopPolicy::PerReelOffset,
            ..TimingConfig::normal()
        };
        let (mut engine, mut orchestrator) = setup(timing);
        orchestrator.begin_round(engine.play_round(1.0).unwrap()).unwrap();
        run_until_finished(&mut orchestrator);

        let trace = orchestrator.trace().unwrap();
        let order: Vec<usize> = trace
            .events
            .iter()
            .filter_map(|e| match e.event {
                RoundEvent::ReelStopping { reel } => Some(reel),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(trace.events_by_type("reel_stopping")[3].at_ms, 1400.0);
    }

    #[test]
    fn test_round_completed_after_every_settle() {
        let (mut engine, mut orchestrator) = setup(TimingConfig::turbo());
        orchestrator.begin_round(engine.play_round(1.0).unwrap()).unwrap();
        run_until_finished(&mut orchestrator);

        let trace = orchestrator.trace().unwrap();
        let names: Vec<&str> = trace.events.iter().map(|e| e.event.type_name()).collect();
        let completed = names.iter().position(|n| *n == "round_completed").unwrap();
        assert_eq!(names.iter().filter(|n| **n == "round_completed").count(), 1);
        assert_eq!(names[..completed].iter().filter(|n| **n == "reel_settled").count(), 4);
        assert_eq!(names.last(), Some(&"win_presentation_finished"));
    }

    #[test]
    fn test_settles_stamped_at_stop_offset_not_frame_end() {
        let (mut engine, mut orchestrator) = setup(TimingConfig::normal());
        orchestrator.begin_round(engine.play_round(1.0).unwrap()).unwrap();

        // One oversized frame covers the whole round
        let cues = orchestrator.update(60_000.0).unwrap();
        assert!(matches!(cues[..], [Cue::PresentationFinished { .. }]));

        let trace = orchestrator.trace().unwrap();
        assert!(trace.events.windows(2).all(|w| w[0].at_ms <= w[1].at_ms));

        let stops = trace.events_by_type("reel_stopping");
        let settles = trace.events_by_type("reel_settled");
        assert_eq!(settles.len(), 4);
        for settle in &settles {
            let RoundEvent::ReelSettled { reel, .. } = settle.event else {
                unreachable!()
            };
            let stop = stops
                .iter()
                .find(|s| s.event == RoundEvent::ReelStopping { reel })
                .unwrap();
            assert!(settle.at_ms > stop.at_ms);
            assert!(settle.at_ms < 10_000.0, "reel {} at {}", reel, settle.at_ms);
        }

        let last_settle = settles.iter().map(|e| e.at_ms).fold(0.0, f64::max);
        let completed = trace.events_by_type("round_completed")[0].at_ms;
        assert_eq!(completed, last_settle);

        let reveal = trace
            .events
            .iter()
            .find(|e| {
                matches!(
                    e.event,
                    RoundEvent::WinLineHighlighted { .. }
                        | RoundEvent::WinPresentationFinished { .. }
                )
            })
            .unwrap();
        assert_relative_eq!(
            reveal.at_ms,
            completed + TimingConfig::normal().check_win_delay_ms,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_second_round_rejected_while_spinning() {
        let (mut engine, mut orchestrator) = setup(TimingConfig::normal());
        orchestrator.begin_round(engine.play_round(1.0).unwrap()).unwrap();
        orchestrator.update(100.0).unwrap();

        let next = engine.play_round(1.0).unwrap();
        assert_eq!(
            orchestrator.begin_round(next).unwrap_err(),
            SequencingError::RoundInFlight
        );
    }

    #[test]
    fn test_unconsumed_completion_is_fatal() {
        let (mut engine, mut orchestrator) = setup(TimingConfig::instant());
        orchestrator.begin_round(engine.play_round(1.0).unwrap()).unwrap();
        run_until_finished(&mut orchestrator);

        // Completion of round 1 never consumed
        orchestrator.begin_round(engine.play_round(1.0).unwrap()).unwrap();
        let err = (0..100)
            .find_map(|_| orchestrator.update(FRAME_MS).err())
            .unwrap();
        assert_eq!(err, SequencingError::UnconsumedCompletion { round_id: 1 });
    }

    #[test]
    fn test_stop_before_result_is_fatal() {
        let (mut engine, mut orchestrator) = setup(TimingConfig::normal());
        orchestrator.start_spin().unwrap();

        let err = (0..500)
            .find_map(|_| orchestrator.update(FRAME_MS).err())
            .unwrap();
        assert_eq!(err, SequencingError::MissingTarget { reel: 0 });

        // A late result that arrives before the first stop is fine
        orchestrator.abort();
        orchestrator.start_spin().unwrap();
        orchestrator.update(1000.0).unwrap();
        orchestrator.resolve(engine.play_round(1.0).unwrap()).unwrap();
        run_until_finished(&mut orchestrator);
    }

    #[test]
    fn test_abort_cancels_everything() {
        let (mut engine, mut orchestrator) = setup(TimingConfig::normal());
        orchestrator.begin_round(engine.play_round(1.0).unwrap()).unwrap();
        orchestrator.update(700.0).unwrap();

        assert_eq!(orchestrator.abort(), Some(1));
        assert_eq!(orchestrator.phase(), OrchestratorPhase::Idle);
        assert!(
            orchestrator
                .reel_states()
                .iter()
                .all(|s| s.phase == crate::reel::ReelPhase::Idle)
        );
        for _ in 0..300 {
            assert!(orchestrator.update(FRAME_MS).unwrap().is_empty());
        }
    }
}
