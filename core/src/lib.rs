#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Thero Idle combat engine.
//!
//! This crate defines the data records and collaborator seams that connect the
//! combat systems. The combat state machine owns [`Enemy`] records, the tower
//! orchestration controller owns [`Tower`] records, and every system reports
//! what happened by pushing [`Event`] values into caller-provided buffers.
//! External collaborators (tower definitions, equations, placement rules and
//! the energy wallet) are expressed as traits so sessions and tests can plug in
//! their own implementations.

mod catalog;
mod checkpoint;
mod contracts;
mod enemy;
mod event;
mod level;
mod tower;

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use catalog::{StandardCatalog, TowerDefinition};
pub use checkpoint::{CheckpointError, TowerRecord};
pub use contracts::{
    EnemyUpdateContext, EnergyLedger, EquationEngine, PlacementRequest, PlacementValidator,
    SpawnContext, TowerCatalog,
};
pub use enemy::{AmplifierStack, DamageLedger, Debuffs, Enemy, SlowStack, SpawnOrigin};
pub use event::{DefeatSummary, Event, SoundCue, VictorySummary};
pub use level::{
    EnemyArchetype, EnemyGroup, LevelConfig, NormalizedPoint, PathPoint, WaveConfig,
    DEFAULT_SPAWN_INTERVAL,
};
pub use tower::{BehaviorState, Soldier, StoredShots, Tower};

/// Lives granted to a level that does not configure its own.
pub const DEFAULT_LIVES: f64 = 20.0;

/// Unique identifier assigned to a placed tower.
///
/// Identifiers are allocated from a monotonic counter and survive merges and
/// tier transitions. They render as `tower-<n>` for display and logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId(u32);

impl TowerId {
    /// Creates a new tower identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the tower identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tower-{}", self.0)
    }
}

/// Unique identifier assigned to a spawned enemy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EnemyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enemy-{}", self.0)
    }
}

/// Unique identifier assigned to a crystal objective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CrystalId(u32);

impl CrystalId {
    /// Creates a new crystal identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Kinds of towers that can be placed on the battlefield.
///
/// Tiers chain through the Greek alphabet: merging two towers of one kind
/// produces the next kind, ending with `Infinity`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TowerType {
    /// Tier 1 projectile tower; supplies stored shots to beta and iota.
    Alpha,
    /// Tier 2 projectile tower; consumes stored alpha shots.
    Beta,
    /// Tier 3 piercing beam tower; consumes stored alpha and beta shots.
    Gamma,
    /// Soldier deployment tower.
    Delta,
    /// Chaining strike tower.
    Epsilon,
    /// Burst volley tower.
    Zeta,
    /// Damage amplifier tower.
    Eta,
    /// Slow field tower.
    Theta,
    /// Pulse tower consuming every stored shot kind.
    Iota,
    /// Generic projectile tower.
    Kappa,
    /// Generic projectile tower.
    Lambda,
    /// Generic projectile tower.
    Mu,
    /// Generic projectile tower.
    Nu,
    /// Generic projectile tower.
    Xi,
    /// Generic projectile tower.
    Omicron,
    /// Generic projectile tower.
    Pi,
    /// Generic projectile tower.
    Rho,
    /// Tower that absorbs allied fire and releases it on its next shot.
    Sigma,
    /// Generic projectile tower.
    Tau,
    /// Generic projectile tower.
    Upsilon,
    /// Generic projectile tower.
    Phi,
    /// Projectile tower whose kills may convert enemies into thralls.
    Chi,
    /// Projectile tower whose kills trigger cluster detonations.
    Psi,
    /// Generic projectile tower.
    Omega,
    /// Support tower projecting a damage aura; never attacks.
    Infinity,
}

impl TowerType {
    /// Every tower type in tier order.
    pub const ALL: [TowerType; 25] = [
        Self::Alpha,
        Self::Beta,
        Self::Gamma,
        Self::Delta,
        Self::Epsilon,
        Self::Zeta,
        Self::Eta,
        Self::Theta,
        Self::Iota,
        Self::Kappa,
        Self::Lambda,
        Self::Mu,
        Self::Nu,
        Self::Xi,
        Self::Omicron,
        Self::Pi,
        Self::Rho,
        Self::Sigma,
        Self::Tau,
        Self::Upsilon,
        Self::Phi,
        Self::Chi,
        Self::Psi,
        Self::Omega,
        Self::Infinity,
    ];

    /// Lowercase key used in configuration files and logs.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Gamma => "gamma",
            Self::Delta => "delta",
            Self::Epsilon => "epsilon",
            Self::Zeta => "zeta",
            Self::Eta => "eta",
            Self::Theta => "theta",
            Self::Iota => "iota",
            Self::Kappa => "kappa",
            Self::Lambda => "lambda",
            Self::Mu => "mu",
            Self::Nu => "nu",
            Self::Xi => "xi",
            Self::Omicron => "omicron",
            Self::Pi => "pi",
            Self::Rho => "rho",
            Self::Sigma => "sigma",
            Self::Tau => "tau",
            Self::Upsilon => "upsilon",
            Self::Phi => "phi",
            Self::Chi => "chi",
            Self::Psi => "psi",
            Self::Omega => "omega",
            Self::Infinity => "infinity",
        }
    }

    /// Glyph shown for the tower.
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Alpha => "α",
            Self::Beta => "β",
            Self::Gamma => "γ",
            Self::Delta => "δ",
            Self::Epsilon => "ε",
            Self::Zeta => "ζ",
            Self::Eta => "η",
            Self::Theta => "θ",
            Self::Iota => "ι",
            Self::Kappa => "κ",
            Self::Lambda => "λ",
            Self::Mu => "μ",
            Self::Nu => "ν",
            Self::Xi => "ξ",
            Self::Omicron => "ο",
            Self::Pi => "π",
            Self::Rho => "ρ",
            Self::Sigma => "σ",
            Self::Tau => "τ",
            Self::Upsilon => "υ",
            Self::Phi => "φ",
            Self::Chi => "χ",
            Self::Psi => "ψ",
            Self::Omega => "ω",
            Self::Infinity => "∞",
        }
    }

    /// One-based position of the type in the tier chain.
    #[must_use]
    pub fn tier(self) -> u32 {
        Self::ALL
            .iter()
            .position(|candidate| *candidate == self)
            .map_or(1, |index| index as u32 + 1)
    }

    /// Looks up a type by its configuration key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.key().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for TowerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Policy used to rank enemies when a tower picks its own target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPriority {
    /// Enemy furthest along the path.
    #[default]
    First,
    /// Enemy with the most hit points.
    Strongest,
    /// Enemy with the fewest hit points.
    Weakest,
}

/// Player-selected behavior mode for towers that support one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorMode {
    /// Tower follows global focus and its own priority policy.
    #[default]
    Pursuit,
    /// Tower ignores the globally focused enemy.
    Sentinel,
}

/// Terminal result of a combat session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Every wave was cleared.
    Victory,
    /// Lives were exhausted.
    Defeat,
}

/// Pixel dimensions of the battlefield used to resolve normalized coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width of the battlefield in pixels.
    pub width: f32,
    /// Height of the battlefield in pixels.
    pub height: f32,
}

impl Viewport {
    /// Creates a new viewport description.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Smaller of the two dimensions; fractional ranges scale by this value.
    #[must_use]
    pub fn min_dimension(&self) -> f32 {
        self.width.min(self.height)
    }

    /// Reports whether both dimensions are finite and positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Converts a normalized `0..1` position into pixels.
    #[must_use]
    pub fn to_pixels(&self, normalized: Vec2) -> Vec2 {
        Vec2::new(normalized.x * self.width, normalized.y * self.height)
    }

    /// Converts a fractional range into pixels.
    #[must_use]
    pub fn range_to_pixels(&self, fraction: f32) -> f32 {
        (fraction * self.min_dimension()).max(0.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(960.0, 540.0)
    }
}

/// Destructible objective placed on the battlefield that towers may be told to focus.
#[derive(Clone, Debug, PartialEq)]
pub struct Crystal {
    /// Identifier of the crystal.
    pub id: CrystalId,
    /// Pixel position of the crystal.
    pub position: Vec2,
    /// Remaining integrity; the crystal shatters at zero.
    pub integrity: f64,
}

/// Reference to whatever a tower resolved as its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetRef {
    /// A hostile enemy.
    Enemy(EnemyId),
    /// A crystal objective.
    Crystal(CrystalId),
    /// An allied sigma tower that absorbs incoming fire.
    Sigma(TowerId),
}

#[cfg(test)]
mod tests {
    use super::{TowerId, TowerType, Viewport};
    use glam::Vec2;

    #[test]
    fn tower_id_renders_with_tag() {
        assert_eq!(TowerId::new(7).to_string(), "tower-7");
    }

    #[test]
    fn tier_follows_alphabet_order() {
        assert_eq!(TowerType::Alpha.tier(), 1);
        assert_eq!(TowerType::Gamma.tier(), 3);
        assert_eq!(TowerType::Infinity.tier(), 25);
    }

    #[test]
    fn keys_resolve_back_to_types() {
        for ty in TowerType::ALL {
            assert_eq!(TowerType::from_key(ty.key()), Some(ty));
        }
        assert_eq!(TowerType::from_key("Sigma"), Some(TowerType::Sigma));
        assert_eq!(TowerType::from_key("aleph"), None);
    }

    #[test]
    fn viewport_scales_ranges_by_smaller_dimension() {
        let viewport = Viewport::new(800.0, 400.0);
        assert!((viewport.range_to_pixels(0.25) - 100.0).abs() < f32::EPSILON);
        assert_eq!(viewport.to_pixels(Vec2::new(0.5, 0.5)), Vec2::new(400.0, 200.0));
        assert!(!Viewport::new(0.0, 10.0).is_valid());
    }
}
