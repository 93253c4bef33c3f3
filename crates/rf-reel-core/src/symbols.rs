//! Symbol definitions and the symbol table

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Symbol kind. Identity is by value, never by grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolType {
    Circle,
    StarCircle,
    Trapezoid,
    EmptyTrapezoid,
    Star,
}

impl SymbolType {
    /// Every symbol kind, in declaration order
    pub const ALL: [SymbolType; 5] = [
        SymbolType::Circle,
        SymbolType::StarCircle,
        SymbolType::Trapezoid,
        SymbolType::EmptyTrapezoid,
        SymbolType::Star,
    ];

    /// Config/display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Circle => "CIRCLE",
            Self::StarCircle => "STAR_CIRCLE",
            Self::Trapezoid => "TRAPEZOID",
            Self::EmptyTrapezoid => "EMPTY_TRAPEZOID",
            Self::Star => "STAR",
        }
    }
}

/// A symbol definition: selection weights, payouts and scatter awards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDefinition {
    /// Symbol kind
    #[serde(rename = "type")]
    pub symbol_type: SymbolType,
    /// Base selection weight
    pub weight: f64,
    /// Replaces `weight` while a bonus session is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_weight: Option<f64>,
    /// Match count → bet multiplier
    #[serde(default)]
    pub payout: BTreeMap<u32, f64>,
    /// Scored grid-wide instead of along win-lines
    #[serde(default)]
    pub is_scatter: bool,
    /// Scatter count → free spins granted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_award: Option<BTreeMap<u32, u32>>,
}

impl SymbolDefinition {
    /// Create a regular (line-paying) symbol
    pub fn regular(symbol_type: SymbolType, weight: f64, pays: &[(u32, f64)]) -> Self {
        Self {
            symbol_type,
            weight,
            alt_weight: None,
            payout: pays.iter().copied().collect(),
            is_scatter: false,
            bonus_award: None,
        }
    }

    /// Create a scatter symbol with a free-spin award table
    pub fn scatter(
        symbol_type: SymbolType,
        weight: f64,
        pays: &[(u32, f64)],
        awards: &[(u32, u32)],
    ) -> Self {
        Self {
            symbol_type,
            weight,
            alt_weight: None,
            payout: pays.iter().copied().collect(),
            is_scatter: true,
            bonus_award: Some(awards.iter().copied().collect()),
        }
    }

    /// Builder: set the bonus-session weight
    pub fn with_alt_weight(mut self, alt_weight: f64) -> Self {
        self.alt_weight = Some(alt_weight);
        self
    }

    /// Exact-count line payout multiplier
    pub fn line_pay(&self, match_count: u32) -> Option<f64> {
        self.payout.get(&match_count).copied()
    }

    /// Smallest scatter count that qualifies for an award (3 when the table is empty)
    pub fn min_scatter_count(&self) -> u32 {
        self.bonus_award
            .as_ref()
            .and_then(|table| table.keys().next().copied())
            .unwrap_or(DEFAULT_MIN_SCATTER_COUNT)
    }
}

/// Scatter threshold used when the award table is empty
pub const DEFAULT_MIN_SCATTER_COUNT: u32 = 3;

/// Weight a definition contributes to a draw.
///
/// `alt_weight` applies only while a bonus session is active; the
/// definition itself is never modified.
pub fn effective_weight(definition: &SymbolDefinition, bonus_active: bool) -> f64 {
    match definition.alt_weight {
        Some(alt) if bonus_active => alt,
        _ => definition.weight,
    }
}

/// Value of the largest key that is still `<= count`
pub fn floor_lookup<V: Copy>(table: &BTreeMap<u32, V>, count: u32) -> Option<V> {
    table.range(..=count).next_back().map(|(_, value)| *value)
}

/// Ordered, immutable set of symbol definitions.
///
/// Definition order is the walk order for weighted selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTable {
    definitions: Vec<SymbolDefinition>,
}

impl SymbolTable {
    /// Build and validate a table
    pub fn new(definitions: Vec<SymbolDefinition>) -> Result<Self, ConfigError> {
        let table = Self { definitions };
        table.validate()?;
        Ok(table)
    }

    /// Reference five-symbol game
    pub fn reference() -> Self {
        Self {
            definitions: vec![
                SymbolDefinition::regular(SymbolType::Circle, 20.0, &[(3, 5.0), (4, 10.0)]),
                SymbolDefinition::scatter(
                    SymbolType::StarCircle,
                    5.0,
                    &[(3, 5.0), (4, 10.0)],
                    &[(3, 2), (4, 3)],
                )
                .with_alt_weight(2.0),
                SymbolDefinition::regular(SymbolType::Trapezoid, 15.0, &[(3, 10.0), (4, 20.0)]),
                SymbolDefinition::regular(
                    SymbolType::EmptyTrapezoid,
                    10.0,
                    &[(3, 20.0), (4, 40.0)],
                ),
                SymbolDefinition::regular(SymbolType::Star, 5.0, &[(3, 50.0), (4, 100.0)]),
            ],
        }
    }

    /// Definitions in walk order
    pub fn definitions(&self) -> &[SymbolDefinition] {
        &self.definitions
    }

    /// Get a definition by symbol kind
    pub fn get(&self, symbol_type: SymbolType) -> Option<&SymbolDefinition> {
        self.definitions
            .iter()
            .find(|d| d.symbol_type == symbol_type)
    }

    /// The scatter definition, if any
    pub fn scatter(&self) -> Option<&SymbolDefinition> {
        self.definitions.iter().find(|d| d.is_scatter)
    }

    /// Is this symbol kind the scatter?
    pub fn is_scatter(&self, symbol_type: SymbolType) -> bool {
        self.get(symbol_type).is_some_and(|d| d.is_scatter)
    }

    /// Symbol kinds in walk order
    pub fn symbol_types(&self) -> Vec<SymbolType> {
        self.definitions.iter().map(|d| d.symbol_type).collect()
    }

    /// Sum of effective weights
    pub fn total_weight(&self, bonus_active: bool) -> f64 {
        self.definitions
            .iter()
            .map(|d| effective_weight(d, bonus_active))
            .sum()
    }

    /// Check the table invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.definitions.is_empty() {
            return Err(ConfigError::NoSymbols);
        }

        for (i, def) in self.definitions.iter().enumerate() {
            if self.definitions[..i]
                .iter()
                .any(|d| d.symbol_type == def.symbol_type)
            {
                return Err(ConfigError::DuplicateSymbol(def.symbol_type));
            }

            for weight in std::iter::once(def.weight).chain(def.alt_weight) {
                if !weight.is_finite() || weight < 0.0 {
                    return Err(ConfigError::InvalidWeight {
                        symbol: def.symbol_type,
                        weight,
                    });
                }
            }

            if def.payout.contains_key(&0) {
                return Err(ConfigError::InvalidPayoutKey {
                    symbol: def.symbol_type,
                    key: 0,
                });
            }

            if def.bonus_award.as_ref().is_some_and(|t| t.contains_key(&0)) {
                return Err(ConfigError::InvalidAwardKey {
                    symbol: def.symbol_type,
                    key: 0,
                });
            }
        }

        let scatters = self.definitions.iter().filter(|d| d.is_scatter).count();
        if scatters > 1 {
            return Err(ConfigError::MultipleScatters(scatters));
        }

        if self.total_weight(false) <= 0.0 {
            return Err(ConfigError::NonPositiveTotalWeight {
                bonus_active: false,
            });
        }
        if self.total_weight(true) <= 0.0 {
            return Err(ConfigError::NonPositiveTotalWeight { bonus_active: true });
        }

        Ok(())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_weight_switches_only_in_bonus() {
        let table = SymbolTable::reference();
        let scatter = table.scatter().unwrap();

        assert_eq!(effective_weight(scatter, false), 5.0);
        assert_eq!(effective_weight(scatter, true), 2.0);

        let circle = table.get(SymbolType::Circle).unwrap();
        assert_eq!(effective_weight(circle, true), 20.0);

        // Base weights are untouched by lookups
        assert_eq!(scatter.weight, 5.0);
        assert_eq!(table.total_weight(false), 55.0);
        assert_eq!(table.total_weight(true), 52.0);
    }

    #[test]
    fn test_floor_lookup() {
        let table: BTreeMap<u32, u32> = [(3, 2), (4, 3)].into_iter().collect();
        assert_eq!(floor_lookup(&table, 2), None);
        assert_eq!(floor_lookup(&table, 3), Some(2));
        assert_eq!(floor_lookup(&table, 4), Some(3));
        assert_eq!(floor_lookup(&table, 5), Some(3));
    }

    #[test]
    fn test_min_scatter_count() {
        let table = SymbolTable::reference();
        assert_eq!(table.scatter().unwrap().min_scatter_count(), 3);

        let bare = SymbolDefinition::scatter(SymbolType::Star, 1.0, &[], &[]);
        assert_eq!(bare.min_scatter_count(), DEFAULT_MIN_SCATTER_COUNT);

        let high = SymbolDefinition::scatter(SymbolType::Star, 1.0, &[], &[(5, 10), (4, 8)]);
        assert_eq!(high.min_scatter_count(), 4);
    }

    #[test]
    fn test_validation_rejects_zero_total_weight() {
        let result = SymbolTable::new(vec![
            SymbolDefinition::regular(SymbolType::Circle, 0.0, &[(3, 1.0)]),
            SymbolDefinition::regular(SymbolType::Star, 0.0, &[(3, 1.0)]),
        ]);
        assert_eq!(
            result.unwrap_err(),
            ConfigError::NonPositiveTotalWeight {
                bonus_active: false
            }
        );
    }

    #[test]
    fn test_validation_rejects_zero_bonus_weight() {
        let result = SymbolTable::new(vec![
            SymbolDefinition::regular(SymbolType::Circle, 4.0, &[]).with_alt_weight(0.0),
        ]);
        assert_eq!(
            result.unwrap_err(),
            ConfigError::NonPositiveTotalWeight { bonus_active: true }
        );
    }

    #[test]
    fn test_validation_rejects_bad_tables() {
        let negative = SymbolTable::new(vec![SymbolDefinition::regular(
            SymbolType::Circle,
            -1.0,
            &[],
        )]);
        assert!(matches!(negative, Err(ConfigError::InvalidWeight { .. })));

        let duplicate = SymbolTable::new(vec![
            SymbolDefinition::regular(SymbolType::Circle, 1.0, &[]),
            SymbolDefinition::regular(SymbolType::Circle, 2.0, &[]),
        ]);
        assert_eq!(
            duplicate.unwrap_err(),
            ConfigError::DuplicateSymbol(SymbolType::Circle)
        );

        let two_scatters = SymbolTable::new(vec![
            SymbolDefinition::scatter(SymbolType::Star, 1.0, &[], &[(3, 1)]),
            SymbolDefinition::scatter(SymbolType::StarCircle, 1.0, &[], &[(3, 1)]),
        ]);
        assert_eq!(two_scatters.unwrap_err(), ConfigError::MultipleScatters(2));

        let zero_award = SymbolTable::new(vec![SymbolDefinition::scatter(
            SymbolType::Star,
            1.0,
            &[],
            &[(0, 1)],
        )]);
        assert!(matches!(zero_award, Err(ConfigError::InvalidAwardKey { key: 0, .. })));
    }

    #[test]
    fn test_table_serde_names() {
        let json = serde_json::to_string(&SymbolTable::reference()).unwrap();
        assert!(json.contains("\"STAR_CIRCLE\""));
        assert!(json.contains("\"is_scatter\":true"));

        let back: SymbolTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SymbolTable::reference());
    }
}
