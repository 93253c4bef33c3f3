//! Reel round simulator
//!
//! Usage:
//!   rf-reel-sim --rounds 10000 --timing instant   - Full choreography, reference game
//!   rf-reel-sim --config game.yaml --fast         - Outcomes only, no reels
//!   rf-reel-sim --rounds 1 --trace round.json     - Dump the last round's events

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

use rf_reel_core::{
    GameState, RoundEngine, SessionStats, SlotConfig, SlotGame, TimingConfig, TimingProfile,
};

#[derive(Parser)]
#[command(name = "rf-reel-sim", about = "Headless reel round simulator")]
struct Cli {
    /// Slot config (.json, .yaml or .yml); the reference game when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Paid rounds to play (free rounds come on top)
    #[arg(short, long, default_value_t = 1000)]
    rounds: u64,

    /// Bet per paid round; the config's default bet when omitted
    #[arg(short, long)]
    bet: Option<f64>,

    /// RNG seed for reproducible runs
    #[arg(short, long)]
    seed: Option<u64>,

    /// Override the config's timing profile
    #[arg(short, long, value_enum)]
    timing: Option<Timing>,

    /// Frame length fed to the choreography (ms)
    #[arg(long, default_value_t = 1000.0 / 60.0)]
    frame_ms: f64,

    /// Skip the choreography and only compute outcomes
    #[arg(long)]
    fast: bool,

    /// Write the last round's event trace as JSON
    #[arg(long)]
    trace: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Timing {
    Normal,
    Turbo,
    Instant,
}

impl From<Timing> for TimingProfile {
    fn from(timing: Timing) -> Self {
        match timing {
            Timing::Normal => TimingProfile::Normal,
            Timing::Turbo => TimingProfile::Turbo,
            Timing::Instant => TimingProfile::Instant,
        }
    }
}

/// Upper bound on frames per round before the run is declared stuck
const MAX_FRAMES_PER_ROUND: u64 = 1_000_000;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if !(cli.frame_ms.is_finite() && cli.frame_ms > 0.0) {
        bail!("--frame-ms must be a positive number, got {}", cli.frame_ms);
    }
    if cli.fast && cli.trace.is_some() {
        bail!("--trace needs the choreography; drop --fast");
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(timing) = cli.timing {
        config = config.with_timing(TimingConfig::from_profile(timing.into()));
    }
    let bet = cli.bet.unwrap_or(config.default_bet);

    log::info!(
        "Simulating {} rounds at bet {} ({})",
        cli.rounds,
        bet,
        if cli.fast { "outcomes only" } else { "full choreography" }
    );

    let stats = if cli.fast {
        run_fast(config, &cli, bet)?
    } else {
        run_full(config, &cli, bet)?
    };

    print_report(&stats);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SlotConfig> {
    match path {
        Some(path) => SlotConfig::load(path)
            .with_context(|| format!("Failed to load slot config {}", path.display())),
        None => Ok(SlotConfig::reference()),
    }
}

/// Engine only: free rounds are played back to back
fn run_fast(config: SlotConfig, cli: &Cli, bet: f64) -> Result<SessionStats> {
    let mut engine = match cli.seed {
        Some(seed) => RoundEngine::with_seed(config, seed)?,
        None => RoundEngine::from_config(config)?,
    };

    let mut paid = 0;
    while paid < cli.rounds || engine.in_free_spins() {
        if !engine.in_free_spins() {
            paid += 1;
        }
        engine.play_round(bet).context("Round failed")?;
    }
    Ok(engine.stats().clone())
}

/// Every round goes through the reels; bonus popups are acknowledged at once
fn run_full(config: SlotConfig, cli: &Cli, bet: f64) -> Result<SessionStats> {
    let mut game = match cli.seed {
        Some(seed) => SlotGame::with_seed(config, seed)?,
        None => SlotGame::new(config)?,
    };
    let events = game.events();

    let mut paid = 0;
    let mut frames = 0;
    while paid < cli.rounds || !game.is_idle() {
        match game.state() {
            GameState::Idle => {
                let result = game.request_spin(bet).context("Spin rejected")?;
                log::debug!(
                    "Round {}: paid {} ({} line results)",
                    result.round_id,
                    result.total_payout,
                    result.line_results.len()
                );
                paid += 1;
                frames = 0;
            }
            GameState::AwaitingAcknowledge(transition) => {
                log::debug!("Acknowledging {:?} popup", transition);
                game.acknowledge_bonus_popup();
            }
            GameState::RoundInFlight | GameState::AutoSpinPending => {
                game.update(cli.frame_ms).context("Round aborted")?;
                frames += 1;
                if frames > MAX_FRAMES_PER_ROUND {
                    bail!("Round did not finish after {} frames", frames);
                }
            }
        }
        // Nobody renders; keep the channel from growing
        while events.try_recv().is_ok() {}
    }

    if let Some(path) = &cli.trace {
        let trace = game.last_trace().context("No round was played")?;
        let json = trace.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write trace {}", path.display()))?;
        log::info!(
            "Trace of round {} written to {} ({} events, {:.0} ms)",
            trace.round_id,
            path.display(),
            trace.events.len(),
            trace.duration_ms()
        );
    }

    Ok(game.stats().clone())
}

fn print_report(stats: &SessionStats) {
    println!("Rounds:          {}", stats.total_spins);
    println!("  paid:          {}", stats.total_spins - stats.free_spins);
    println!("  free:          {}", stats.free_spins);
    println!("Total bet:       {:.2}", stats.total_bet);
    println!("Total win:       {:.2}", stats.total_win);
    println!("RTP:             {:.2}%", stats.rtp());
    println!("Hit rate:        {:.2}%", stats.hit_rate());
    println!("Max win:         {:.1}x", stats.max_win_ratio);
    println!("Bonus sessions:  {}", stats.sessions_triggered);
    println!("Spins awarded:   {}", stats.free_spins_awarded);
}
