//! Round events, the channel that carries them and the per-round trace
//!
//! Presentation code receives [`RoundEvent`]s on a crossbeam channel. Every
//! emitted event is also recorded with its virtual-clock timestamp in the
//! current [`RoundTrace`].

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};

use crate::engine::RoundResult;
use crate::paytable::WinCell;
use crate::symbols::SymbolType;

/// Everything presentation code is told about a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    /// Outcome computed, choreography starting
    SpinRequested {
        round_id: u64,
        bet: f64,
        free_round: bool,
    },
    ReelStarted {
        reel: usize,
    },
    ReelStopping {
        reel: usize,
    },
    /// Reel snapped to the grid showing its final symbols
    ReelSettled {
        reel: usize,
        symbols: Vec<SymbolType>,
    },
    /// Every reel settled; the result may be revealed
    RoundCompleted {
        result: Box<RoundResult>,
    },
    WinLineHighlighted {
        line_id: i32,
        cells: Vec<WinCell>,
    },
    /// Last highlight pulse on any reel finished
    WinPresentationFinished {
        round_id: u64,
    },
    BonusSessionStarted {
        free_spins_awarded: u32,
    },
    BonusSessionContinued {
        rounds_remaining: u32,
    },
    BonusSessionEnded {
        total_win: f64,
    },
    RoundAborted {
        round_id: u64,
        reason: String,
    },
}

impl RoundEvent {
    /// Event type name (matches the serialized tag)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SpinRequested { .. } => "spin_requested",
            Self::ReelStarted { .. } => "reel_started",
            Self::ReelStopping { .. } => "reel_stopping",
            Self::ReelSettled { .. } => "reel_settled",
            Self::RoundCompleted { .. } => "round_completed",
            Self::WinLineHighlighted { .. } => "win_line_highlighted",
            Self::WinPresentationFinished { .. } => "win_presentation_finished",
            Self::BonusSessionStarted { .. } => "bonus_session_started",
            Self::BonusSessionContinued { .. } => "bonus_session_continued",
            Self::BonusSessionEnded { .. } => "bonus_session_ended",
            Self::RoundAborted { .. } => "round_aborted",
        }
    }
}

/// An event with its virtual-clock time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Milliseconds on the orchestrator clock
    pub at_ms: f64,
    pub event: RoundEvent,
}

/// Events of one round in emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrace {
    pub round_id: u64,

    /// All events in chronological order
    pub events: Vec<TimedEvent>,

    /// When this trace was recorded
    pub recorded_at: DateTime<Utc>,
}

impl RoundTrace {
    /// Create a new empty trace
    pub fn new(round_id: u64) -> Self {
        Self {
            round_id,
            events: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn push(&mut self, at_ms: f64, event: RoundEvent) {
        self.events.push(TimedEvent { at_ms, event });
    }

    /// Get total duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.at_ms - first.at_ms,
            _ => 0.0,
        }
    }

    /// Get events by type name
    pub fn events_by_type(&self, type_name: &str) -> Vec<&TimedEvent> {
        self.events
            .iter()
            .filter(|e| e.event.type_name() == type_name)
            .collect()
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Sending side of the event channel, with trace recording
#[derive(Debug)]
pub struct EventSink {
    sender: Sender<RoundEvent>,
    receiver: Receiver<RoundEvent>,
    trace: Option<RoundTrace>,
}

impl EventSink {
    /// Create an unbounded event channel
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            trace: None,
        }
    }

    /// A receiver for presentation code
    pub fn subscribe(&self) -> Receiver<RoundEvent> {
        self.receiver.clone()
    }

    /// Start recording a new round (replaces the previous trace)
    pub fn begin_trace(&mut self, round_id: u64) {
        self.trace = Some(RoundTrace::new(round_id));
    }

    /// Trace of the current (or most recent) round
    pub fn trace(&self) -> Option<&RoundTrace> {
        self.trace.as_ref()
    }

    /// Record and send an event
    pub fn emit(&mut self, at_ms: f64, event: RoundEvent) {
        log::debug!("[{:>8.1} ms] {}", at_ms, event.type_name());
        if let Some(trace) = self.trace.as_mut() {
            trace.push(at_ms, event.clone());
        }
        // The sink keeps its own receiver alive, so this cannot disconnect
        if self.sender.send(event).is_err() {
            log::warn!("Event channel closed");
        }
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
