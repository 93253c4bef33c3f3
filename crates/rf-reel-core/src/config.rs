//! Slot configuration: grid, win-lines, bonus rules, loading and validation

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::symbols::SymbolTable;
use crate::timing::TimingConfig;

/// Grid layout (reels × symbols per reel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of reels (columns)
    pub reel_count: usize,
    /// Number of visible symbols per reel (rows)
    pub symbols_per_reel: usize,
}

impl GridConfig {
    /// Create a grid layout
    pub fn new(reel_count: usize, symbols_per_reel: usize) -> Self {
        Self {
            reel_count,
            symbols_per_reel,
        }
    }

    /// Reference 4 × 6 layout
    pub fn reference() -> Self {
        Self::new(4, 6)
    }

    /// Total grid positions
    pub fn total_positions(&self) -> usize {
        self.reel_count * self.symbols_per_reel
    }

    /// Flat (column-major) index of a cell
    pub fn flat_index(&self, reel: usize, row: usize) -> usize {
        reel * self.symbols_per_reel + row
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reel_count == 0 {
            return Err(ConfigError::InvalidGrid("reel count must be > 0"));
        }
        if self.symbols_per_reel == 0 {
            return Err(ConfigError::InvalidGrid("symbols per reel must be > 0"));
        }
        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::reference()
    }
}

/// A win-line: one selected cell per reel, as a flat column-major mask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinLine {
    /// Unique positive id
    pub id: i32,
    /// `reel_count * symbols_per_reel` flags, column-major
    pub mask: Vec<bool>,
}

impl WinLine {
    /// Build a line from the selected row on each reel
    pub fn from_rows(id: i32, rows: &[usize], symbols_per_reel: usize) -> Self {
        let mut mask = vec![false; rows.len() * symbols_per_reel];
        for (reel, &row) in rows.iter().enumerate() {
            if row < symbols_per_reel {
                mask[reel * symbols_per_reel + row] = true;
            }
        }
        Self { id, mask }
    }

    /// Straight line along one row
    pub fn straight(id: i32, row: usize, grid: GridConfig) -> Self {
        Self::from_rows(id, &vec![row; grid.reel_count], grid.symbols_per_reel)
    }

    /// Selected flat positions, ascending (= reel order)
    pub fn positions(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter_map(|(i, &selected)| selected.then_some(i))
            .collect()
    }

    /// Check mask shape against the grid
    pub fn validate(&self, grid: GridConfig) -> Result<(), ConfigError> {
        if self.id <= 0 {
            return Err(ConfigError::InvalidLineId(self.id));
        }
        let expected = grid.total_positions();
        if self.mask.len() != expected {
            return Err(ConfigError::MaskLength {
                line_id: self.id,
                expected,
                actual: self.mask.len(),
            });
        }
        for (reel, column) in self.mask.chunks(grid.symbols_per_reel).enumerate() {
            let selected = column.iter().filter(|&&s| s).count();
            if selected != 1 {
                return Err(ConfigError::MaskColumn {
                    line_id: self.id,
                    reel,
                    selected,
                });
            }
        }
        Ok(())
    }
}

/// Reference win-lines for the 4 × 6 grid: six straight rows and two bent lines
pub fn reference_win_lines() -> Vec<WinLine> {
    let grid = GridConfig::reference();
    let mut lines: Vec<WinLine> = (0..grid.symbols_per_reel)
        .map(|row| WinLine::straight(row as i32 + 1, row, grid))
        .collect();
    lines.push(WinLine::from_rows(7, &[0, 1, 1, 0], grid.symbols_per_reel));
    lines.push(WinLine::from_rows(8, &[5, 4, 4, 5], grid.symbols_per_reel));
    lines
}

/// How free spins won inside an active session are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// Add the award to the rounds remaining
    Extend,
    /// Awards inside an active session are dropped
    Ignore,
}

impl Default for RetriggerPolicy {
    fn default() -> Self {
        Self::Extend
    }
}

/// Free-spin session rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusConfig {
    /// Sessions can be triggered at all
    pub enabled: bool,
    /// Spins awarded by a qualifying scatter when the award table is empty
    pub base_session_length: u32,
    /// Retrigger handling inside a session
    pub retrigger: RetriggerPolicy,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_session_length: 3,
            retrigger: RetriggerPolicy::Extend,
        }
    }
}

/// Complete slot configuration, static for a game session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Grid layout
    pub grid: GridConfig,
    /// Symbol definitions (walk order = config order)
    pub symbols: SymbolTable,
    /// Win-line definitions
    pub win_lines: Vec<WinLine>,
    /// Bet used when the caller does not supply one
    #[serde(default = "default_bet")]
    pub default_bet: f64,
    /// Free-spin rules
    #[serde(default)]
    pub bonus: BonusConfig,
    /// Choreography timing
    #[serde(default)]
    pub timing: TimingConfig,
}

fn default_bet() -> f64 {
    1.0
}

impl SlotConfig {
    /// Reference 4 × 6 game with eight win-lines
    pub fn reference() -> Self {
        Self {
            grid: GridConfig::reference(),
            symbols: SymbolTable::reference(),
            win_lines: reference_win_lines(),
            default_bet: 1.0,
            bonus: BonusConfig::default(),
            timing: TimingConfig::normal(),
        }
    }

    /// Builder: set timing
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Builder: set bonus rules
    pub fn with_bonus(mut self, bonus: BonusConfig) -> Self {
        self.bonus = bonus;
        self
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML config
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.yaml`/`.yml` parse as YAML, anything else as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let config = if is_yaml {
            Self::from_yaml_str(&text)?
        } else {
            Self::from_json_str(&text)?
        };
        log::info!(
            "Loaded slot config {}: {}x{} grid, {} symbols, {} win-lines",
            path.display(),
            config.grid.reel_count,
            config.grid.symbols_per_reel,
            config.symbols.definitions().len(),
            config.win_lines.len()
        );
        Ok(config)
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Check every static invariant; any failure is fatal at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate()?;
        self.symbols.validate()?;

        for (i, line) in self.win_lines.iter().enumerate() {
            line.validate(self.grid)?;
            if self.win_lines[..i].iter().any(|l| l.id == line.id) {
                return Err(ConfigError::DuplicateLineId(line.id));
            }
        }

        if !(self.default_bet.is_finite() && self.default_bet > 0.0) {
            return Err(ConfigError::InvalidDefaultBet(self.default_bet));
        }

        self.timing.validate()
    }
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self::reference()
    }
}
