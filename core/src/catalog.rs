//! Tower definition registry and the built-in tier chain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{EquationEngine, TowerCatalog, TowerType};

/// Static description of one tower tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowerDefinition {
    /// Type described by the definition.
    #[serde(rename = "id")]
    pub tower_type: TowerType,
    /// Glyph drawn for the tower.
    pub symbol: String,
    /// Tier of the type.
    pub tier: u32,
    /// Damage per shot.
    pub damage: f64,
    /// Shots per second.
    pub rate: f32,
    /// Range as a fraction of the smaller viewport dimension.
    pub range: f32,
    /// Energy required to place the tower or merge into it.
    pub cost: f64,
    /// Type produced by merging or upgrading.
    #[serde(default)]
    pub next_tier_id: Option<TowerType>,
    /// Type produced by demoting.
    #[serde(default)]
    pub previous_tier_id: Option<TowerType>,
}

/// Definition registry backed by an in-memory table.
#[derive(Clone, Debug, PartialEq)]
pub struct StandardCatalog {
    definitions: BTreeMap<TowerType, TowerDefinition>,
    cost_growth: f64,
    equation_values: BTreeMap<TowerType, f64>,
}

impl StandardCatalog {
    /// Builds a catalog from explicit definitions.
    ///
    /// Later definitions replace earlier ones of the same type.
    #[must_use]
    pub fn from_definitions(definitions: impl IntoIterator<Item = TowerDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|definition| (definition.tower_type, definition))
                .collect(),
            cost_growth: 0.0,
            equation_values: BTreeMap::new(),
        }
    }

    /// Sets the fractional cost increase applied per tower of the same type already placed.
    #[must_use]
    pub fn with_cost_growth(mut self, growth: f64) -> Self {
        self.cost_growth = if growth.is_finite() { growth.max(0.0) } else { 0.0 };
        self
    }

    /// Overrides the live equation value reported for a type.
    #[must_use]
    pub fn with_equation_value(mut self, tower_type: TowerType, value: f64) -> Self {
        let _ = self.equation_values.insert(tower_type, value);
        self
    }

    /// Replaces or inserts a definition.
    pub fn insert(&mut self, definition: TowerDefinition) {
        let _ = self.definitions.insert(definition.tower_type, definition);
    }

    /// Iterator over every definition in tier order.
    pub fn definitions(&self) -> impl Iterator<Item = &TowerDefinition> {
        self.definitions.values()
    }
}

impl Default for StandardCatalog {
    /// Built-in chain: alpha merges into beta, beta into gamma, and so on up to infinity.
    fn default() -> Self {
        let chain = TowerType::ALL;
        let definitions = chain.iter().enumerate().map(|(index, tower_type)| {
            let tier = index as i32;
            TowerDefinition {
                tower_type: *tower_type,
                symbol: tower_type.glyph().to_owned(),
                tier: tower_type.tier(),
                damage: (8.0 * 1.85f64.powi(tier)).round(),
                rate: default_rate(*tower_type),
                range: default_range(*tower_type),
                cost: (25.0 * 2.5f64.powi(tier)).round(),
                next_tier_id: chain.get(index + 1).copied(),
                previous_tier_id: index.checked_sub(1).map(|previous| chain[previous]),
            }
        });
        Self::from_definitions(definitions).with_cost_growth(0.1)
    }
}

impl TowerCatalog for StandardCatalog {
    fn definition(&self, tower_type: TowerType) -> Option<&TowerDefinition> {
        self.definitions.get(&tower_type)
    }

    fn action_cost(&self, tower_type: TowerType, same_type_count: usize) -> Option<f64> {
        let definition = self.definition(tower_type)?;
        let exponent = i32::try_from(same_type_count).unwrap_or(i32::MAX);
        Some(definition.cost * (1.0 + self.cost_growth).powi(exponent))
    }

    fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl EquationEngine for StandardCatalog {
    fn tower_equation_result(&self, tower_type: TowerType) -> f64 {
        if let Some(value) = self.equation_values.get(&tower_type) {
            return *value;
        }
        self.definition(tower_type)
            .map_or(0.0, |definition| definition.damage)
    }
}

fn default_rate(tower_type: TowerType) -> f32 {
    match tower_type {
        TowerType::Delta => 0.8,
        TowerType::Epsilon => 1.2,
        TowerType::Zeta => 0.6,
        TowerType::Theta => 2.0,
        TowerType::Iota => 0.5,
        TowerType::Sigma => 0.7,
        TowerType::Infinity => 0.0,
        _ => 1.0,
    }
}

fn default_range(tower_type: TowerType) -> f32 {
    match tower_type {
        TowerType::Gamma => 0.3,
        TowerType::Theta => 0.18,
        TowerType::Iota => 0.2,
        TowerType::Infinity => 0.3,
        _ => 0.24,
    }
}
