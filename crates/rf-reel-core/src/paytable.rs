//! Paytable and win calculation
//!
//! Line wins need an exact match count in the symbol's payout table. Scatter
//! wins are counted anywhere on the grid and use the largest table key that
//! does not exceed the count, for both the payout and the free-spin award.

use serde::{Deserialize, Serialize};

use crate::config::{GridConfig, SlotConfig, WinLine};
use crate::grid::{CellPosition, Grid};
use crate::symbols::{SymbolTable, SymbolType, floor_lookup};

/// Line id reported for the scatter evaluation
pub const SCATTER_LINE_ID: i32 = -1;

/// A cell that contributed to a win
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinCell {
    pub reel: usize,
    pub row: usize,
    pub symbol: SymbolType,
}

impl WinCell {
    pub fn position(&self) -> CellPosition {
        CellPosition::new(self.reel, self.row)
    }
}

/// One scored win-line, or the scatter evaluation (`line_id == -1`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinLineResult {
    /// Win-line id, or [`SCATTER_LINE_ID`]
    pub line_id: i32,
    /// Matched symbol
    pub symbol: SymbolType,
    /// Consecutive matches from reel 0 (lines) or grid-wide count (scatter)
    pub match_count: u32,
    /// Win amount (multiplier × bet)
    pub payout: f64,
    /// Flat positions covered by the line (scatter: every scatter cell)
    pub mask_positions: Vec<usize>,
    /// Matching cells with their symbols, in reel order
    pub cells: Vec<WinCell>,
}

impl WinLineResult {
    /// Scatter result?
    pub fn is_scatter(&self) -> bool {
        self.line_id == SCATTER_LINE_ID
    }

    /// Reels holding at least one matching cell, ascending
    pub fn reels(&self) -> Vec<usize> {
        let mut reels: Vec<usize> = self.cells.iter().map(|c| c.reel).collect();
        reels.dedup();
        reels
    }
}

/// Scatter evaluation with its free-spin award
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterResult {
    /// Scored like a line, with `line_id == -1`
    pub result: WinLineResult,
    /// Free spins granted by the award table
    pub free_spins_awarded: u32,
    /// Count reached the smallest award key
    pub qualifies: bool,
}

/// Result of evaluating a grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Winning lines in line-id order, then the scatter result when it qualifies
    pub line_results: Vec<WinLineResult>,
    /// Scatter evaluation (absent when no symbol is a scatter)
    pub scatter: Option<ScatterResult>,
    /// Sum of line payouts plus scatter payout
    pub total_payout: f64,
}

impl EvaluationResult {
    /// Check if this is a winning spin
    pub fn is_win(&self) -> bool {
        self.total_payout > 0.0
    }

    /// Scatter cells on the grid
    pub fn scatter_count(&self) -> u32 {
        self.scatter
            .as_ref()
            .map(|s| s.result.match_count)
            .unwrap_or(0)
    }

    /// Free spins from the scatter award table
    pub fn free_spins_awarded(&self) -> u32 {
        self.scatter
            .as_ref()
            .map(|s| s.free_spins_awarded)
            .unwrap_or(0)
    }

    /// Scatter reached its minimum count
    pub fn scatter_qualifies(&self) -> bool {
        self.scatter.as_ref().is_some_and(|s| s.qualifies)
    }
}

/// Complete paytable: symbols, win-lines and grid shape
#[derive(Debug, Clone)]
pub struct PayTable {
    /// Symbol definitions
    pub symbols: SymbolTable,
    /// Win-lines, sorted by id
    pub win_lines: Vec<WinLine>,
    /// Grid layout
    pub grid: GridConfig,
}

impl PayTable {
    /// Create a paytable; lines are kept in id order
    pub fn new(symbols: SymbolTable, mut win_lines: Vec<WinLine>, grid: GridConfig) -> Self {
        win_lines.sort_by_key(|line| line.id);
        Self {
            symbols,
            win_lines,
            grid,
        }
    }

    /// Create a paytable from a (validated) slot config
    pub fn from_config(config: &SlotConfig) -> Self {
        Self::new(config.symbols.clone(), config.win_lines.clone(), config.grid)
    }

    /// Evaluate every win-line plus the scatter
    pub fn evaluate(&self, grid: &Grid, bet: f64) -> EvaluationResult {
        self.evaluate_flat(grid.flat(), bet)
    }

    /// Evaluate a flat column-major grid
    pub fn evaluate_flat(&self, flat: &[SymbolType], bet: f64) -> EvaluationResult {
        let mut line_results = self.evaluate_lines(flat, bet);
        let scatter = self.evaluate_scatter(flat, bet);

        if let Some(scatter) = scatter.as_ref().filter(|s| s.qualifies) {
            line_results.push(scatter.result.clone());
        }

        let total_payout = line_results.iter().map(|r| r.payout).sum();

        EvaluationResult {
            line_results,
            scatter,
            total_payout,
        }
    }

    /// Score each win-line independently; non-winning lines are omitted
    pub fn evaluate_lines(&self, flat: &[SymbolType], bet: f64) -> Vec<WinLineResult> {
        self.win_lines
            .iter()
            .filter_map(|line| self.evaluate_line(flat, line, bet))
            .collect()
    }

    fn evaluate_line(
        &self,
        flat: &[SymbolType],
        line: &WinLine,
        bet: f64,
    ) -> Option<WinLineResult> {
        let positions = line.positions();
        let line_symbols: Vec<SymbolType> = positions
            .iter()
            .map(|&pos| flat.get(pos).copied())
            .collect::<Option<_>>()?;

        let anchor = *line_symbols.first()?;
        let definition = self.symbols.get(anchor)?;
        if definition.is_scatter {
            return None;
        }

        let match_count = line_symbols.iter().take_while(|&&s| s == anchor).count();
        let multiplier = definition.line_pay(match_count as u32)?;

        let cells = positions[..match_count]
            .iter()
            .map(|&pos| self.cell(pos, anchor))
            .collect();

        Some(WinLineResult {
            line_id: line.id,
            symbol: anchor,
            match_count: match_count as u32,
            payout: multiplier * bet,
            mask_positions: positions,
            cells,
        })
    }

    /// Count scatters anywhere on the grid; `None` when no symbol is a scatter
    pub fn evaluate_scatter(&self, flat: &[SymbolType], bet: f64) -> Option<ScatterResult> {
        let definition = self.symbols.scatter()?;
        let scatter = definition.symbol_type;

        let positions: Vec<usize> = flat
            .iter()
            .enumerate()
            .filter_map(|(pos, &s)| (s == scatter).then_some(pos))
            .collect();
        let count = positions.len() as u32;
        let qualifies = count >= definition.min_scatter_count();

        let (payout, free_spins_awarded) = if qualifies {
            let multiplier = floor_lookup(&definition.payout, count).unwrap_or(0.0);
            let award = definition
                .bonus_award
                .as_ref()
                .and_then(|table| floor_lookup(table, count))
                .unwrap_or(0);
            (multiplier * bet, award)
        } else {
            (0.0, 0)
        };

        let cells = positions.iter().map(|&pos| self.cell(pos, scatter)).collect();

        Some(ScatterResult {
            result: WinLineResult {
                line_id: SCATTER_LINE_ID,
                symbol: scatter,
                match_count: count,
                payout,
                mask_positions: positions,
                cells,
            },
            free_spins_awarded,
            qualifies,
        })
    }

    fn cell(&self, pos: usize, symbol: SymbolType) -> WinCell {
        let spr = self.grid.symbols_per_reel.max(1);
        WinCell {
            reel: pos / spr,
            row: pos % spr,
            symbol,
        }
    }
}
