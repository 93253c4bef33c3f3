//! # rf-reel-core: reel slot round core
//!
//! Outcome generation and round choreography for a reel-based slot game.
//! A wager produces a weighted random symbol grid, the grid is scored against
//! the paytable and win-lines, scatters drive a free-spin session, and a set
//! of independently timed reels is steered onto the already-scored grid.
//!
//! ## Features
//!
//! - **Weighted Generation**: Per-cell weighted draws, alternate weights during free spins
//! - **Line + Scatter Evaluation**: Exact-count line pays, threshold-floor scatter pays
//! - **Bonus Sessions**: Start / continue / end free-spin state machine with retrigger policy
//! - **Reel Choreography**: Staggered start/stop, settle barrier, sequenced win highlights
//! - **Typed Events**: Channel-delivered round events with a per-round trace
//!
//! ## Architecture
//!
//! ```text
//! SlotGame (request_spin / update / acknowledge_bonus_popup)
//!     │
//!     ├── RoundEngine
//!     │     ├── GridGenerator (SymbolTable, effective weights)
//!     │     ├── PayTable (win-lines + scatter)
//!     │     └── BonusSession
//!     │           │
//!     │           v
//!     │     RoundResult
//!     │
//!     └── SpinOrchestrator
//!           ├── Scheduler (virtual clock)
//!           ├── ReelTimer × reel_count
//!           ├── SettleBarrier
//!           └── EventSink → RoundEvent
//! ```

pub mod barrier;
pub mod bonus;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod game;
pub mod grid;
pub mod orchestrator;
pub mod paytable;
pub mod reel;
pub mod scheduler;
pub mod symbols;
pub mod timing;

pub use barrier::*;
pub use bonus::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use game::*;
pub use grid::*;
pub use orchestrator::*;
pub use paytable::*;
pub use reel::*;
pub use scheduler::*;
pub use symbols::*;
pub use timing::*;
