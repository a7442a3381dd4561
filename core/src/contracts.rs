//! Collaborator seams supplied by the host around the combat core.

use std::fmt;

use glam::Vec2;

use crate::{Enemy, Tower, TowerDefinition, TowerType, Viewport};

/// Registry supplying tower definitions and pricing.
pub trait TowerCatalog: fmt::Debug {
    /// Definition of the provided type, if known.
    fn definition(&self, tower_type: TowerType) -> Option<&TowerDefinition>;

    /// Type reached by merging or upgrading.
    fn next_tier(&self, tower_type: TowerType) -> Option<TowerType> {
        self.definition(tower_type)
            .and_then(|definition| definition.next_tier_id)
    }

    /// Type reached by demoting.
    fn previous_tier(&self, tower_type: TowerType) -> Option<TowerType> {
        self.definition(tower_type)
            .and_then(|definition| definition.previous_tier_id)
    }

    /// Energy required to place (or merge into) a tower of the provided type
    /// when `same_type_count` towers of that type already exist.
    fn action_cost(&self, tower_type: TowerType, same_type_count: usize) -> Option<f64> {
        let _ = same_type_count;
        self.definition(tower_type).map(|definition| definition.cost)
    }

    /// Energy returned when the tower is sold.
    fn sell_refund(&self, tower: &Tower) -> f64 {
        tower.cost_history.iter().sum()
    }

    /// Reports whether the catalog has no definitions at all.
    fn is_empty(&self) -> bool;
}

/// Live stat computation for a tower type given the player's current investments.
pub trait EquationEngine {
    /// Current computed value of the type's equation.
    fn tower_equation_result(&self, tower_type: TowerType) -> f64;
}

/// Energy wallet validated by tower actions.
pub trait EnergyLedger {
    /// Current balance.
    fn energy(&self) -> f64;

    /// Upper bound of the balance.
    fn energy_cap(&self) -> f64;

    /// Overwrites the balance.
    fn set_energy(&mut self, energy: f64);
}

/// Candidate placement handed to a [`PlacementValidator`].
#[derive(Clone, Copy, Debug)]
pub struct PlacementRequest<'a> {
    /// Type being placed.
    pub tower_type: TowerType,
    /// Requested position in normalized coordinates.
    pub normalized: Vec2,
    /// Requested position in pixels.
    pub position: Vec2,
    /// Towers already on the battlefield.
    pub towers: &'a [Tower],
    /// Battlefield dimensions.
    pub viewport: Viewport,
}

/// Generic placement rule (path overlap, bounds and similar).
pub trait PlacementValidator: fmt::Debug {
    /// Accepts the request or returns a short human-readable reason.
    fn validate(&self, request: &PlacementRequest<'_>) -> Result<(), String>;
}

/// Spawn-time collaborator used by the wave spawner.
pub trait SpawnContext {
    /// Pixel position of the first path point.
    fn path_origin(&self) -> Vec2;

    /// Pixel position of an off-screen radial spawn at a random angle.
    fn radial_origin(&mut self) -> Vec2;

    /// Lets the caller attach presentation-only fields to a new enemy.
    fn register_enemy(&mut self, enemy: &mut Enemy) {
        let _ = enemy;
    }
}

/// Per-tick collaborator used while enemies advance.
pub trait EnemyUpdateContext {
    /// Decays and applies debuffs.
    fn apply_debuffs(&mut self, enemy: &mut Enemy, delta: f32);

    /// Moves the enemy and updates its progress.
    fn advance(&mut self, enemy: &mut Enemy, delta: f32);
}
