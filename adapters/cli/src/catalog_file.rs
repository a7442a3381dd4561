//! TOML overrides applied on top of the built-in tower catalog.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use thero_idle_core::{StandardCatalog, TowerDefinition, TowerType};

/// Contents of a catalog override file.
///
/// ```toml
/// costGrowth = 0.15
///
/// [[towers]]
/// id = "alpha"
/// symbol = "α"
/// tier = 0
/// damage = 10.0
/// rate = 1.2
/// range = 0.2
/// cost = 20.0
/// nextTierId = "beta"
///
/// [[equations]]
/// tower = "beta"
/// value = 4.0
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    cost_growth: Option<f64>,
    #[serde(default)]
    towers: Vec<TowerDefinition>,
    #[serde(default)]
    equations: Vec<EquationOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EquationOverride {
    tower: TowerType,
    value: f64,
}

/// Reads a catalog override file from disk.
pub(crate) fn load(path: &Path) -> Result<StandardCatalog> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read tower catalog {}", path.display()))?;
    parse(&contents).with_context(|| format!("failed to parse tower catalog {}", path.display()))
}

/// Builds a catalog from the built-in chain with the file's entries replacing matching types.
pub(crate) fn parse(contents: &str) -> Result<StandardCatalog> {
    let file: CatalogFile = toml::from_str(contents)?;
    let mut catalog = StandardCatalog::default();
    for definition in file.towers {
        anyhow::ensure!(
            definition.cost.is_finite() && definition.cost >= 0.0,
            "{} has an invalid cost {}",
            definition.tower_type,
            definition.cost
        );
        catalog.insert(definition);
    }
    if let Some(growth) = file.cost_growth {
        anyhow::ensure!(
            growth.is_finite() && growth >= 0.0,
            "cost growth must be a non-negative number"
        );
        catalog = catalog.with_cost_growth(growth);
    }
    for equation in file.equations {
        catalog = catalog.with_equation_value(equation.tower, equation.value);
    }
    Ok(catalog)
}
