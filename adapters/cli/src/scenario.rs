//! Scenario files describing a level run.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use thero_idle_core::{LevelConfig, TowerType, Viewport};

/// Encoding of a scenario file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScenarioFormat {
    Toml,
    Json,
}

impl ScenarioFormat {
    /// Picks the format from a file extension.
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            Some(extension) if extension.eq_ignore_ascii_case("json") => Ok(Self::Json),
            _ => bail!(
                "unsupported scenario format for {}; expected .toml or .json",
                path.display()
            ),
        }
    }
}

/// Level plus the scripted actions taken while it runs.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Scenario {
    /// Level to play.
    pub(crate) level: LevelConfig,
    /// Energy available when combat starts.
    #[serde(default)]
    pub(crate) starting_energy: f64,
    /// Whether the wave schedule wraps into further cycles.
    #[serde(default)]
    pub(crate) endless: bool,
    /// Simulated seconds per tick.
    #[serde(default = "default_tick_seconds")]
    pub(crate) tick_seconds: f32,
    /// Tick limit after which an unresolved run stops.
    #[serde(default = "default_max_ticks")]
    pub(crate) max_ticks: u32,
    /// Battlefield size; the session default applies when absent.
    #[serde(default)]
    pub(crate) viewport: Option<Viewport>,
    /// Catalog override file, relative to the scenario file.
    #[serde(default)]
    pub(crate) catalog: Option<PathBuf>,
    /// Towers placed as the run progresses.
    #[serde(default)]
    pub(crate) placements: Vec<ScriptedPlacement>,
    /// Supply links between scripted placements.
    #[serde(default)]
    pub(crate) links: Vec<ScriptedLink>,
}

/// Tower placed once the run reaches `at` seconds and its cost is affordable.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptedPlacement {
    pub(crate) tower: TowerType,
    pub(crate) x: f32,
    pub(crate) y: f32,
    #[serde(default)]
    pub(crate) at: f32,
    #[serde(default)]
    pub(crate) slot: Option<u32>,
}

/// Supply link between two scripted placements, referenced by index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptedLink {
    pub(crate) source: usize,
    pub(crate) target: usize,
}

fn default_tick_seconds() -> f32 {
    0.05
}

fn default_max_ticks() -> u32 {
    72_000
}

impl Scenario {
    /// Reads and validates a scenario file; the catalog path is resolved against its directory.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let format = ScenarioFormat::from_path(path)?;
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let mut scenario = Self::parse(&contents, format)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        if let (Some(catalog), Some(directory)) = (scenario.catalog.as_mut(), path.parent()) {
            *catalog = directory.join(&*catalog);
        }
        Ok(scenario)
    }

    /// Parses and validates scenario contents.
    pub(crate) fn parse(contents: &str, format: ScenarioFormat) -> Result<Self> {
        let scenario: Self = match format {
            ScenarioFormat::Toml => toml::from_str(contents)?,
            ScenarioFormat::Json => serde_json::from_str(contents)?,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0) {
            bail!("tickSeconds must be positive, got {}", self.tick_seconds);
        }
        if self.level.waves.is_empty() {
            bail!("level `{}` has no waves", self.level.id);
        }
        if !self.level.radial_spawn && self.level.path.len() < 2 {
            bail!("level `{}` needs a path of at least two points", self.level.id);
        }
        let placements = self.placements.len();
        for link in &self.links {
            if link.source >= placements || link.target >= placements {
                bail!(
                    "link {} -> {} refers to a missing placement; {placements} are scripted",
                    link.source,
                    link.target
                );
            }
            if link.source == link.target {
                bail!("placement {} cannot supply itself", link.source);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEADOW: &str = r#"
        startingEnergy = 120.0

        [level]
        id = "meadow"
        lives = 10.0
        path = [{ x = 0.0, y = 0.5 }, { x = 1.0, y = 0.5 }]

        [[level.waves]]
        interval = 0.5
        groups = [{ count = 3, hp = 6.0, speed = 0.05, reward = 1.0 }]

        [[placements]]
        tower = "alpha"
        x = 0.2
        y = 0.45

        [[placements]]
        tower = "beta"
        x = 0.3
        y = 0.55
        at = 4.0

        [[links]]
        source = 0
        target = 1
    "#;

    #[test]
    fn parses_toml_scenarios_with_defaults() {
        let scenario = Scenario::parse(MEADOW, ScenarioFormat::Toml).expect("scenario parses");

        assert_eq!(scenario.level.id, "meadow");
        assert_eq!(scenario.level.waves[0].groups[0].count, 3);
        assert_eq!(scenario.level.waves[0].groups[0].archetype.hp, 6.0);
        assert_eq!(scenario.starting_energy, 120.0);
        assert_eq!(scenario.tick_seconds, 0.05);
        assert!(!scenario.endless);
        assert_eq!(scenario.placements[1].tower, TowerType::Beta);
        assert_eq!(scenario.placements[1].at, 4.0);
        assert_eq!(scenario.links, vec![ScriptedLink { source: 0, target: 1 }]);
    }

    #[test]
    fn parses_json_scenarios() {
        let json = r#"{
            "level": {
                "id": "spiral",
                "radialSpawn": true,
                "waves": [{ "groups": [{ "count": 2, "hp": 4.0, "speed": 0.1 }] }]
            },
            "tickSeconds": 0.1,
            "viewport": { "width": 800.0, "height": 600.0 }
        }"#;

        let scenario = Scenario::parse(json, ScenarioFormat::Json).expect("scenario parses");

        assert!(scenario.level.radial_spawn);
        assert_eq!(scenario.tick_seconds, 0.1);
        assert_eq!(scenario.viewport, Some(Viewport::new(800.0, 600.0)));
        assert!(scenario.placements.is_empty());
    }

    #[test]
    fn rejects_links_to_missing_placements() {
        let broken = MEADOW.replace("target = 1", "target = 7");

        let error = Scenario::parse(&broken, ScenarioFormat::Toml).expect_err("link is invalid");
        assert!(error.to_string().contains("missing placement"));
    }

    #[test]
    fn rejects_non_positive_tick_length() {
        let broken = MEADOW.replace("startingEnergy = 120.0", "tickSeconds = 0.0");

        assert!(Scenario::parse(&broken, ScenarioFormat::Toml).is_err());
    }

    #[test]
    fn format_follows_the_file_extension() {
        assert_eq!(
            ScenarioFormat::from_path(Path::new("levels/meadow.TOML")).expect("toml"),
            ScenarioFormat::Toml
        );
        assert_eq!(
            ScenarioFormat::from_path(Path::new("meadow.json")).expect("json"),
            ScenarioFormat::Json
        );
        assert!(ScenarioFormat::from_path(Path::new("meadow.yaml")).is_err());
    }
}
