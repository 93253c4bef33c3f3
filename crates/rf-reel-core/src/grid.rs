//! Symbol grid and weighted grid generation

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::error::ConfigError;
use crate::symbols::{SymbolTable, SymbolType, effective_weight};

/// A cell address on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPosition {
    pub reel: usize,
    pub row: usize,
}

impl CellPosition {
    pub fn new(reel: usize, row: usize) -> Self {
        Self { reel, row }
    }
}

/// One round's symbol grid.
///
/// Stored flat, column-major (`reel * symbols_per_reel + row`). Never mutated
/// after generation; each round replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    config: GridConfig,
    cells: Vec<SymbolType>,
}

impl Grid {
    /// Wrap a flat column-major cell list
    pub fn from_flat(config: GridConfig, cells: Vec<SymbolType>) -> Result<Self, ConfigError> {
        config.validate()?;
        if cells.len() != config.total_positions() {
            return Err(ConfigError::InvalidGrid("cell count does not match grid dimensions"));
        }
        Ok(Self { config, cells })
    }

    /// Build from one symbol list per reel
    pub fn from_reels(reels: &[Vec<SymbolType>]) -> Result<Self, ConfigError> {
        let symbols_per_reel = reels.first().map(|r| r.len()).unwrap_or(0);
        if reels.iter().any(|r| r.len() != symbols_per_reel) {
            return Err(ConfigError::InvalidGrid("reels have different lengths"));
        }
        let config = GridConfig::new(reels.len(), symbols_per_reel);
        Self::from_flat(config, reels.concat())
    }

    /// Grid dimensions
    pub fn config(&self) -> GridConfig {
        self.config
    }

    /// Flat column-major view
    pub fn flat(&self) -> &[SymbolType] {
        &self.cells
    }

    /// Symbol at a cell
    pub fn get(&self, reel: usize, row: usize) -> Option<SymbolType> {
        if reel >= self.config.reel_count || row >= self.config.symbols_per_reel {
            return None;
        }
        self.cells.get(self.config.flat_index(reel, row)).copied()
    }

    /// Symbols on one reel, top to bottom
    pub fn reel(&self, reel: usize) -> &[SymbolType] {
        let start = reel * self.config.symbols_per_reel;
        let end = start + self.config.symbols_per_reel;
        self.cells.get(start..end).unwrap_or(&[])
    }

    /// Per-reel symbol lists
    pub fn reels(&self) -> Vec<Vec<SymbolType>> {
        self.cells
            .chunks(self.config.symbols_per_reel)
            .map(|c| c.to_vec())
            .collect()
    }

    /// Number of cells holding `symbol`
    pub fn count(&self, symbol: SymbolType) -> usize {
        self.cells.iter().filter(|&&s| s == symbol).count()
    }
}

/// Pick the definition selected by `draw` (in `[0, total_weight)`).
///
/// Walks definitions in table order accumulating effective weight and takes
/// the first whose cumulative weight is `>= draw`. Zero-weight definitions
/// are never eligible.
pub fn select_weighted(table: &SymbolTable, bonus_active: bool, draw: f64) -> SymbolType {
    let mut cumulative = 0.0;
    let mut last_eligible = None;

    for definition in table.definitions() {
        let weight = effective_weight(definition, bonus_active);
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last_eligible = Some(definition.symbol_type);
        if cumulative >= draw {
            return definition.symbol_type;
        }
    }

    // Only reachable through float rounding at the top edge
    last_eligible.unwrap_or(SymbolType::Circle)
}

/// Weighted grid generator
pub struct GridGenerator;

impl GridGenerator {
    /// Generate one grid; every cell is an independent weighted draw.
    ///
    /// Fails fast when the effective total weight is not positive.
    pub fn generate<R: Rng + ?Sized>(
        config: GridConfig,
        table: &SymbolTable,
        bonus_active: bool,
        rng: &mut R,
    ) -> Result<Grid, ConfigError> {
        config.validate()?;
        let total_weight = table.total_weight(bonus_active);
        if !(total_weight.is_finite() && total_weight > 0.0) {
            return Err(ConfigError::NonPositiveTotalWeight { bonus_active });
        }

        let cells = (0..config.total_positions())
            .map(|_| {
                let draw = rng.random::<f64>() * total_weight;
                select_weighted(table, bonus_active, draw)
            })
            .collect();

        Ok(Grid { config, cells })
    }
}
