//! Failures reported by tower actions and controller construction.

use thero_idle_core::{TowerId, TowerType};
use thiserror::Error;

/// Reasons a player-facing tower action was refused.
///
/// The `Display` text doubles as the status line shown to the player.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TowerActionError {
    /// No level is active, so the battlefield cannot be modified.
    #[error("no level is active")]
    NoActiveLevel,
    /// Nothing is dragged and the loadout is empty.
    #[error("select a tower first")]
    NoTowerSelected,
    /// The catalog does not define the type.
    #[error("{0} has no definition")]
    UnknownDefinition(TowerType),
    /// The type is not unlocked or not part of the active loadout.
    #[error("{0} is not in the active loadout")]
    Locked(TowerType),
    /// The tower already reached the last tier of its chain.
    #[error("{0} cannot be upgraded further")]
    MaxTier(TowerType),
    /// The tower has no lower tier to demote into.
    #[error("{0} has no lower tier")]
    NoPreviousTier(TowerType),
    /// The balance does not cover the action.
    #[error("need {deficit} more energy")]
    InsufficientEnergy {
        /// Energy the action costs.
        required: f64,
        /// Energy that would be available.
        available: f64,
        /// Missing amount.
        deficit: f64,
    },
    /// The placement validator or the occupancy rules refused the spot.
    #[error("{0}")]
    InvalidPlacement(String),
    /// The referenced tower is not on the battlefield.
    #[error("{0} is not on the battlefield")]
    MissingTower(TowerId),
    /// The pair cannot form a supply link.
    #[error("{supplier} cannot supply {receiver}")]
    IncompatibleConnection {
        /// Tower that would feed shots.
        supplier: TowerId,
        /// Tower that would receive them.
        receiver: TowerId,
    },
}

impl TowerActionError {
    pub(crate) fn insufficient(required: f64, available: f64) -> Self {
        Self::InsufficientEnergy {
            required,
            available,
            deficit: required - available,
        }
    }
}

/// Programmer errors raised while wiring the controller.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The catalog has no definitions at all.
    #[error("tower catalog is empty")]
    EmptyCatalog,
    /// The viewport has a non-positive or non-finite dimension.
    #[error("viewport {width}x{height} is degenerate")]
    InvalidViewport {
        /// Requested width.
        width: f32,
        /// Requested height.
        height: f32,
    },
}
