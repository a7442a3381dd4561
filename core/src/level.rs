//! Level configuration consumed read-only by the combat state machine.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_LIVES;

/// Spawn interval applied when a wave omits one or configures a non-positive value.
pub const DEFAULT_SPAWN_INTERVAL: f32 = 1.0;

/// Complete description of a playable level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    /// Identifier reported to lifecycle callbacks.
    #[serde(default)]
    pub id: String,
    /// Ordered wave schedules.
    #[serde(default)]
    pub waves: Vec<WaveConfig>,
    /// Lives available at the start of combat.
    #[serde(default)]
    pub lives: Option<f64>,
    /// Normalized path enemies follow from spawn to goal.
    #[serde(default)]
    pub path: Vec<PathPoint>,
    /// Enemies spawn off-screen at a random angle and converge on the center.
    #[serde(default)]
    pub radial_spawn: bool,
    /// Goal point for radial levels; defaults to the middle of the battlefield.
    #[serde(default)]
    pub center_spawn: Option<NormalizedPoint>,
    /// Upper bound on the energy balance.
    #[serde(default, alias = "theroCap")]
    pub energy_cap: Option<f64>,
    /// Crystal objectives placed when the level starts.
    #[serde(default)]
    pub crystals: Vec<NormalizedPoint>,
}

impl LevelConfig {
    /// Returns a sanitized copy of the configuration.
    ///
    /// Path and crystal coordinates are clamped to `0..1`, non-positive spawn
    /// intervals fall back to [`DEFAULT_SPAWN_INTERVAL`], empty groups are
    /// dropped and non-positive lives or caps are discarded.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut level = self.clone();

        for point in &mut level.path {
            point.x = clamp_unit(point.x);
            point.y = clamp_unit(point.y);
            point.speed_multiplier = point
                .speed_multiplier
                .filter(|multiplier| multiplier.is_finite() && *multiplier > 0.0);
        }

        for crystal in &mut level.crystals {
            crystal.x = clamp_unit(crystal.x);
            crystal.y = clamp_unit(crystal.y);
        }

        if let Some(center) = level.center_spawn.as_mut() {
            center.x = clamp_unit(center.x);
            center.y = clamp_unit(center.y);
        }

        for wave in &mut level.waves {
            if !(wave.interval.is_finite() && wave.interval > 0.0) {
                wave.interval = DEFAULT_SPAWN_INTERVAL;
            }
            wave.delay = wave.delay.filter(|delay| delay.is_finite() && *delay >= 0.0);
            wave.groups.retain(|group| group.count > 0);
            for group in &mut wave.groups {
                group.archetype.interval = group
                    .archetype
                    .interval
                    .filter(|interval| interval.is_finite() && *interval > 0.0);
            }
        }

        level.lives = level.lives.filter(|lives| lives.is_finite() && *lives > 0.0);
        level.energy_cap = level.energy_cap.filter(|cap| !cap.is_nan() && *cap > 0.0);
        level
    }

    /// Lives configured for the level, falling back to [`DEFAULT_LIVES`].
    #[must_use]
    pub fn lives_or_default(&self) -> f64 {
        self.lives.unwrap_or(DEFAULT_LIVES)
    }

    /// Energy cap configured for the level, unbounded when absent.
    #[must_use]
    pub fn energy_cap_or_unbounded(&self) -> f64 {
        self.energy_cap.unwrap_or(f64::INFINITY)
    }

    /// Goal point used by radial levels.
    #[must_use]
    pub fn radial_center(&self) -> NormalizedPoint {
        self.center_spawn.unwrap_or(NormalizedPoint { x: 0.5, y: 0.5 })
    }
}

/// Bounded spawn schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveConfig {
    /// Enemy groups spawned in order.
    #[serde(default)]
    pub groups: Vec<EnemyGroup>,
    /// Optional boss spawned after every group.
    #[serde(default)]
    pub boss: Option<EnemyArchetype>,
    /// Seconds between successive spawns.
    #[serde(default = "default_interval")]
    pub interval: f32,
    /// Seconds before the first spawn.
    #[serde(default)]
    pub delay: Option<f32>,
}

impl WaveConfig {
    /// Number of enemies the wave emits, counting the boss.
    #[must_use]
    pub fn total_spawn_count(&self) -> u32 {
        let groups: u32 = self.groups.iter().map(|group| group.count).sum();
        groups + u32::from(self.boss.is_some())
    }

    /// Resolves which archetype the spawn at `index` belongs to.
    ///
    /// Groups are walked by cumulative count; the boss always occupies the
    /// final slot. Returns the archetype and whether it is the boss.
    #[must_use]
    pub fn archetype_at(&self, index: u32) -> Option<(&EnemyArchetype, bool)> {
        let mut cumulative = 0u32;
        for group in &self.groups {
            cumulative += group.count;
            if index < cumulative {
                return Some((&group.archetype, false));
            }
        }

        match &self.boss {
            Some(boss) if index == cumulative => Some((boss, true)),
            _ => None,
        }
    }
}

/// Run of identical enemies inside a wave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyGroup {
    /// Number of enemies emitted by the group.
    pub count: u32,
    /// Shared archetype for every enemy in the group.
    #[serde(flatten)]
    pub archetype: EnemyArchetype,
}

/// Base statistics of an enemy before endless-cycle scaling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyArchetype {
    /// Base hit points.
    pub hp: f64,
    /// Base speed in path fractions per second.
    pub speed: f32,
    /// Energy awarded on death.
    #[serde(default)]
    pub reward: f64,
    /// Codex entry used by presentation layers.
    #[serde(default)]
    pub codex_id: Option<String>,
    /// Glyph used by presentation layers.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Spawn spacing override applied after this archetype spawns.
    #[serde(default)]
    pub interval: Option<f32>,
    /// Shield absorbed before hit points.
    #[serde(default)]
    pub shield: Option<f64>,
}

/// Node of the enemy path in normalized coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPoint {
    /// Horizontal position in `0..1`.
    pub x: f32,
    /// Vertical position in `0..1`.
    pub y: f32,
    /// Speed multiplier applied on the segment leaving this point.
    #[serde(default)]
    pub speed_multiplier: Option<f32>,
    /// Enemies travelling the segment leaving this point cannot be targeted.
    #[serde(default)]
    pub tunnel: bool,
}

impl PathPoint {
    /// Normalized position as a vector.
    #[must_use]
    pub fn to_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Plain normalized coordinate pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    /// Horizontal position in `0..1`.
    pub x: f32,
    /// Vertical position in `0..1`.
    pub y: f32,
}

impl NormalizedPoint {
    /// Normalized position as a vector.
    #[must_use]
    pub fn to_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

fn default_interval() -> f32 {
    DEFAULT_SPAWN_INTERVAL
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archetype(hp: f64) -> EnemyArchetype {
        EnemyArchetype {
            hp,
            speed: 0.1,
            reward: 1.0,
            codex_id: None,
            symbol: None,
            interval: None,
            shield: None,
        }
    }

    fn wave() -> WaveConfig {
        WaveConfig {
            groups: vec![
                EnemyGroup {
                    count: 2,
                    archetype: archetype(5.0),
                },
                EnemyGroup {
                    count: 1,
                    archetype: archetype(8.0),
                },
            ],
            boss: Some(archetype(100.0)),
            interval: 0.5,
            delay: None,
        }
    }

    #[test]
    fn total_spawn_count_includes_boss() {
        assert_eq!(wave().total_spawn_count(), 4);
    }

    #[test]
    fn archetype_lookup_walks_cumulative_counts() {
        let wave = wave();
        assert_eq!(wave.archetype_at(1).map(|(a, boss)| (a.hp, boss)), Some((5.0, false)));
        assert_eq!(wave.archetype_at(2).map(|(a, boss)| (a.hp, boss)), Some((8.0, false)));
        assert_eq!(wave.archetype_at(3).map(|(a, boss)| (a.hp, boss)), Some((100.0, true)));
        assert!(wave.archetype_at(4).is_none());
    }

    #[test]
    fn normalization_sanitizes_configuration() {
        let mut broken = wave();
        broken.interval = -1.0;
        broken.groups.push(EnemyGroup {
            count: 0,
            archetype: archetype(1.0),
        });
        let level = LevelConfig {
            waves: vec![broken],
            lives: Some(0.0),
            path: vec![PathPoint {
                x: 1.4,
                y: -0.2,
                speed_multiplier: Some(0.0),
                tunnel: false,
            }],
            ..LevelConfig::default()
        };

        let normalized = level.normalized();
        assert_eq!(normalized.waves[0].interval, DEFAULT_SPAWN_INTERVAL);
        assert_eq!(normalized.waves[0].groups.len(), 2);
        assert_eq!(normalized.path[0].x, 1.0);
        assert_eq!(normalized.path[0].y, 0.0);
        assert!(normalized.path[0].speed_multiplier.is_none());
        assert_eq!(normalized.lives_or_default(), crate::DEFAULT_LIVES);
    }

    #[test]
    fn camel_case_keys_and_cap_alias_deserialize() {
        let json = r#"{
            "id": "1-1",
            "theroCap": 500,
            "radialSpawn": true,
            "waves": [{ "interval": 2, "groups": [{ "count": 3, "hp": 10, "speed": 0.05, "codexId": "mote" }] }]
        }"#;
        let level: LevelConfig = serde_json::from_str(json).expect("level parses");
        assert_eq!(level.energy_cap, Some(500.0));
        assert!(level.radial_spawn);
        assert_eq!(level.waves[0].groups[0].archetype.codex_id.as_deref(), Some("mote"));
    }
}
