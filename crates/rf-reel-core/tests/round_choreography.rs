//! End-to-end round tests through the presentation API
//!
//! Drives `SlotGame` with a fixed 60 Hz frame tick, the way a renderer would,
//! and checks the event stream it produces.

use crossbeam_channel::Receiver;

use rf_reel_core::{
    BonusConfig, GameState, Grid, GridConfig, RoundEvent, SequencingError, SessionTransition,
    SlotConfig, SlotError, SlotGame, StopPolicy, SymbolDefinition, SymbolTable, SymbolType,
    TimingConfig, WinLine,
};

const FRAME_MS: f64 = 1000.0 / 60.0;
const MAX_FRAMES: usize = 200_000;

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn drain(events: &Receiver<RoundEvent>) -> Vec<RoundEvent> {
    events.try_iter().collect()
}

fn run_until(game: &mut SlotGame, mut done: impl FnMut(&SlotGame) -> bool) {
    for _ in 0..MAX_FRAMES {
        if done(game) {
            return;
        }
        game.update(FRAME_MS).unwrap();
    }
    panic!("condition not reached, game state {:?}", game.state());
}

fn position(events: &[RoundEvent], name: &str) -> Option<usize> {
    events.iter().position(|e| e.type_name() == name)
}

fn count(events: &[RoundEvent], name: &str) -> usize {
    events.iter().filter(|e| e.type_name() == name).count()
}

/// 4 × 6, one symbol paying 10× for four of a kind, one line across row 0
fn single_symbol_config() -> SlotConfig {
    let grid = GridConfig::reference();
    SlotConfig {
        grid,
        symbols: SymbolTable::new(vec![SymbolDefinition::regular(
            SymbolType::Circle,
            1.0,
            &[(4, 10.0)],
        )])
        .unwrap(),
        win_lines: vec![WinLine::from_rows(1, &[0, 0, 0, 0], grid.symbols_per_reel)],
        ..SlotConfig::reference()
    }
}

/// Reference grid of CIRCLEs with three scatters on row 3
fn scatter_trigger_grid() -> Grid {
    let mut cells = vec![SymbolType::Circle; 24];
    for pos in [3, 9, 15] {
        cells[pos] = SymbolType::StarCircle;
    }
    Grid::from_flat(GridConfig::reference(), cells).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SINGLE ROUND
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_concrete_first_row_round() {
    let mut game = SlotGame::with_seed(single_symbol_config(), 1).unwrap();
    let events = game.events();

    let result = game.request_spin(10.0).unwrap();
    assert_eq!(result.total_payout, 100.0);
    assert_eq!(result.line_results.len(), 1);
    assert_eq!(result.line_results[0].match_count, 4);

    run_until(&mut game, |g| g.is_idle());
    let events = drain(&events);

    assert_eq!(events[0].type_name(), "spin_requested");
    assert_eq!(count(&events, "reel_settled"), 4);
    assert_eq!(count(&events, "round_completed"), 1);

    let completed = position(&events, "round_completed").unwrap();
    let last_settle = events
        .iter()
        .rposition(|e| e.type_name() == "reel_settled")
        .unwrap();
    assert!(last_settle < completed);

    match &events[completed] {
        RoundEvent::RoundCompleted { result } => assert_eq!(result.total_payout, 100.0),
        other => panic!("unexpected {:?}", other),
    }

    let highlighted: Vec<(i32, usize)> = events
        .iter()
        .filter_map(|e| match e {
            RoundEvent::WinLineHighlighted { line_id, cells } => Some((*line_id, cells.len())),
            _ => None,
        })
        .collect();
    assert_eq!(highlighted, vec![(1, 4)]);
    assert_eq!(events.last().map(|e| e.type_name()), Some("win_presentation_finished"));
}

#[test]
fn test_settled_reels_show_scored_grid() {
    let config = SlotConfig::reference().with_bonus(BonusConfig {
        enabled: false,
        ..BonusConfig::default()
    });
    let mut game = SlotGame::with_seed(config, 99).unwrap();
    let events = game.events();

    for _ in 0..5 {
        let result = game.request_spin(1.0).unwrap();
        run_until(&mut game, |g| g.is_idle());

        let settled: Vec<(usize, Vec<SymbolType>)> = drain(&events)
            .into_iter()
            .filter_map(|e| match e {
                RoundEvent::ReelSettled { reel, symbols } => Some((reel, symbols)),
                _ => None,
            })
            .collect();

        assert_eq!(settled.len(), 4);
        for (reel, symbols) in settled {
            assert_eq!(symbols, result.reel_symbols(reel), "round {}", result.round_id);
        }
    }
}

#[test]
fn test_stop_order_follows_reel_index() {
    for policy in [
        StopPolicy::PerReelOffset,
        StopPolicy::CommonInstant {
            stop_stagger_ms: 250.0,
        },
    ] {
        let timing = TimingConfig {
            stop_policy: policy,
            ..TimingConfig::normal()
        };
        let mut game =
            SlotGame::with_seed(single_symbol_config().with_timing(timing), 4).unwrap();
        game.request_spin(1.0).unwrap();
        run_until(&mut game, |g| g.is_idle());

        let trace = game.last_trace().unwrap();
        let stops: Vec<(usize, f64)> = trace
            .events
            .iter()
            .filter_map(|e| match &e.event {
                RoundEvent::ReelStopping { reel } => Some((*reel, e.at_ms)),
                _ => None,
            })
            .collect();

        assert_eq!(stops.len(), 4);
        for pair in stops.windows(2) {
            assert_eq!(pair[1].0, pair[0].0 + 1, "{:?}", policy);
            assert!(pair[1].1 > pair[0].1, "{:?}", policy);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BONUS FLOW
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_bonus_popup_gates_free_rounds() {
    let config = SlotConfig::reference().with_timing(TimingConfig::turbo());
    let mut game = SlotGame::with_seed(config, 12).unwrap();
    let events = game.events();

    let trigger = game.request_spin_forced(1.0, scatter_trigger_grid()).unwrap();
    assert_eq!(trigger.bonus_transition, SessionTransition::Start);
    assert_eq!(trigger.bonus_awarded, Some(2));

    run_until(&mut game, |g| {
        g.state() == GameState::AwaitingAcknowledge(SessionTransition::Start)
    });
    let trigger_events = drain(&events);
    let finished = position(&trigger_events, "win_presentation_finished").unwrap();
    let popup = position(&trigger_events, "bonus_session_started").unwrap();
    assert!(finished < popup);
    assert!(trigger_events.contains(&RoundEvent::BonusSessionStarted {
        free_spins_awarded: 2
    }));

    // Nothing moves while the popup is up
    for _ in 0..600 {
        game.update(FRAME_MS).unwrap();
    }
    assert!(drain(&events).is_empty());
    assert_eq!(
        game.request_spin(1.0).unwrap_err(),
        SlotError::Sequencing(SequencingError::AwaitingAcknowledge)
    );

    assert!(game.acknowledge_bonus_popup());
    assert_eq!(game.state(), GameState::AutoSpinPending);

    run_until(&mut game, |g| {
        g.state() == GameState::AwaitingAcknowledge(SessionTransition::End)
    });
    let session_events = drain(&events);

    let free_rounds: Vec<bool> = session_events
        .iter()
        .filter_map(|e| match e {
            RoundEvent::SpinRequested { free_round, .. } => Some(*free_round),
            _ => None,
        })
        .collect();
    assert!(free_rounds.len() >= 2);
    assert!(free_rounds.iter().all(|&free| free));
    assert!(count(&session_events, "bonus_session_continued") >= 1);
    assert_eq!(session_events.last().map(|e| e.type_name()), Some("bonus_session_ended"));

    assert!(game.acknowledge_bonus_popup());
    assert!(game.is_idle());
    assert!(!game.session_state().active);
    assert_eq!(game.stats().total_bet, 1.0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// ABORT
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_abort_mid_spin() {
    let mut game = SlotGame::with_seed(single_symbol_config(), 2).unwrap();
    let events = game.events();

    game.request_spin(1.0).unwrap();
    for _ in 0..40 {
        game.update(FRAME_MS).unwrap();
    }

    assert_eq!(game.abort_round(), Some(1));
    assert!(game.is_idle());
    assert!(
        game.orchestrator()
            .reel_states()
            .iter()
            .all(|s| !s.phase.is_moving())
    );

    let aborted = drain(&events);
    assert_eq!(count(&aborted, "round_completed"), 0);
    assert!(matches!(
        aborted.last(),
        Some(RoundEvent::RoundAborted { round_id: 1, .. })
    ));

    // Cancelled timers never fire
    for _ in 0..600 {
        game.update(FRAME_MS).unwrap();
    }
    assert!(drain(&events).is_empty());

    // The next round runs normally
    game.request_spin(1.0).unwrap();
    run_until(&mut game, |g| g.is_idle());
    assert_eq!(count(&drain(&events), "round_completed"), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_headless_batch_completes_every_round() {
    let config = SlotConfig::reference().with_timing(TimingConfig::instant());
    let mut game = SlotGame::with_seed(config, 2024).unwrap();
    let events = game.events();

    let mut requested = 0;
    let mut frames = 0;
    while requested < 200 || !game.is_idle() {
        match game.state() {
            GameState::Idle => {
                game.request_spin(1.0).unwrap();
                requested += 1;
            }
            GameState::AwaitingAcknowledge(_) => {
                game.acknowledge_bonus_popup();
            }
            GameState::RoundInFlight | GameState::AutoSpinPending => {
                game.update(FRAME_MS).unwrap();
            }
        }
        frames += 1;
        assert!(frames < MAX_FRAMES);
    }

    let stats = game.stats().clone();
    let events = drain(&events);

    assert_eq!(stats.total_spins, requested + stats.free_spins);
    assert_eq!(stats.total_bet, requested as f64);
    assert_eq!(count(&events, "round_completed") as u64, stats.total_spins);
    assert_eq!(count(&events, "win_presentation_finished") as u64, stats.total_spins);
    assert_eq!(count(&events, "reel_settled") as u64, stats.total_spins * 4);
    assert_eq!(
        count(&events, "bonus_session_started") as u64,
        stats.sessions_triggered
    );
    assert_eq!(
        count(&events, "bonus_session_ended"),
        count(&events, "bonus_session_started")
    );

    let trace = game.last_trace().unwrap();
    let json = trace.to_json().unwrap();
    assert!(json.contains("win_presentation_finished"));
}
