//! Per-type behavior table.

use thero_idle_core::TowerType;

/// How a tower type delivers its attacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Behavior {
    /// Deferred-damage projectile.
    Projectile,
    /// Piercing beam applied immediately along the tower's range.
    Beam,
    /// Soldiers deployed toward enemies; upkeep runs every tick.
    Soldiers,
    /// Strike that jumps between nearby enemies.
    Chain,
    /// Volley of projectiles at the best few enemies.
    Burst,
    /// Projectile that leaves a damage amplifier on its target.
    Amplify,
    /// Periodic slow applied around the tower; never fires.
    SlowField,
    /// Area strike around the tower.
    Pulse,
    /// Fires projectiles and absorbs allied fire between shots.
    Absorber,
    /// Passive damage bonus for nearby towers; never fires.
    Aura,
}

impl Behavior {
    /// Reports whether towers of this behavior pick targets on the generic path.
    ///
    /// Soldier towers run their upkeep first and still take part.
    #[must_use]
    pub fn participates_in_generic_targeting(self) -> bool {
        !matches!(self, Self::SlowField | Self::Aura)
    }

    /// Reports whether the behavior has per-tick work besides firing.
    #[must_use]
    pub fn has_tick(self) -> bool {
        matches!(self, Self::Soldiers | Self::SlowField)
    }
}

/// Behavior of the provided tower type.
#[must_use]
pub fn behavior_for(tower_type: TowerType) -> Behavior {
    match tower_type {
        TowerType::Gamma => Behavior::Beam,
        TowerType::Delta => Behavior::Soldiers,
        TowerType::Epsilon => Behavior::Chain,
        TowerType::Zeta => Behavior::Burst,
        TowerType::Eta => Behavior::Amplify,
        TowerType::Theta => Behavior::SlowField,
        TowerType::Iota => Behavior::Pulse,
        TowerType::Sigma => Behavior::Absorber,
        TowerType::Infinity => Behavior::Aura,
        _ => Behavior::Projectile,
    }
}
