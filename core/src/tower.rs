//! Authoritative tower records owned by the orchestration controller.

use std::collections::BTreeSet;

use glam::Vec2;

use crate::{
    BehaviorMode, EnemyId, TargetPriority, TowerDefinition, TowerId, TowerType, Viewport,
};

/// Placed defensive unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Tower {
    /// Identifier that survives merges and tier transitions.
    pub id: TowerId,
    /// Current kind of the tower.
    pub tower_type: TowerType,
    /// Tier of the current kind.
    pub tier: u32,
    /// Glyph drawn for the tower.
    pub symbol: String,
    /// Position in normalized `0..1` coordinates.
    pub normalized: Vec2,
    /// Position in pixels derived from the normalized position.
    pub position: Vec2,
    /// Damage of the current tier definition.
    pub base_damage: f64,
    /// Shots per second of the current tier definition.
    pub base_rate: f32,
    /// Fractional range of the current tier definition.
    pub base_range: f32,
    /// Effective damage per shot.
    pub damage: f64,
    /// Effective shots per second.
    pub rate: f32,
    /// Effective range in pixels.
    pub range: f32,
    /// Seconds until the next shot.
    pub cooldown: f32,
    /// Downstream tower this tower supplies, if any.
    pub link_target: Option<TowerId>,
    /// Upstream towers supplying this tower.
    pub link_sources: BTreeSet<TowerId>,
    /// Bonus shots accumulated from upstream suppliers.
    pub stored: StoredShots,
    /// Anchor slot occupied by the tower.
    pub slot_id: Option<u32>,
    /// Policy used when the tower picks its own target.
    pub target_priority: TargetPriority,
    /// Player-selected behavior mode.
    pub behavior_mode: BehaviorMode,
    /// Enemy the player pinned as this tower's target.
    pub manual_target: Option<EnemyId>,
    /// Type-specific runtime state.
    pub behavior: BehaviorState,
    /// Energy paid to reach each tier, oldest first.
    pub cost_history: Vec<f64>,
}

impl Tower {
    /// Creates a freshly placed tower from its definition.
    #[must_use]
    pub fn from_definition(
        id: TowerId,
        definition: &TowerDefinition,
        normalized: Vec2,
        viewport: Viewport,
    ) -> Self {
        let mut tower = Self {
            id,
            tower_type: definition.tower_type,
            tier: definition.tier,
            symbol: definition.symbol.clone(),
            normalized,
            position: viewport.to_pixels(normalized),
            base_damage: definition.damage,
            base_rate: definition.rate,
            base_range: definition.range,
            damage: definition.damage,
            rate: definition.rate,
            range: viewport.range_to_pixels(definition.range),
            cooldown: 0.0,
            link_target: None,
            link_sources: BTreeSet::new(),
            stored: StoredShots::default(),
            slot_id: None,
            target_priority: TargetPriority::default(),
            behavior_mode: BehaviorMode::default(),
            manual_target: None,
            behavior: BehaviorState::for_type(definition.tower_type),
            cost_history: Vec::new(),
        };
        tower.clamp_cooldown();
        tower
    }

    /// Rewrites type, tier and stats from a new tier definition in place.
    ///
    /// Identity, position, connections and cost history are preserved; the
    /// type-specific behavior state and stored shots are reinitialized.
    pub fn apply_definition(&mut self, definition: &TowerDefinition, viewport: Viewport) {
        self.tower_type = definition.tower_type;
        self.tier = definition.tier;
        self.symbol = definition.symbol.clone();
        self.base_damage = definition.damage;
        self.base_rate = definition.rate;
        self.base_range = definition.range;
        self.damage = definition.damage;
        self.rate = definition.rate;
        self.range = viewport.range_to_pixels(definition.range);
        self.behavior = BehaviorState::for_type(definition.tower_type);
        self.stored = StoredShots::default();
        self.manual_target = None;
        self.clamp_cooldown();
    }

    /// Recomputes pixel position and range after the viewport changed.
    pub fn relocate(&mut self, viewport: Viewport) {
        self.position = viewport.to_pixels(self.normalized);
        self.range = viewport.range_to_pixels(self.base_range);
    }

    /// Seconds between shots, or `None` for towers that never fire.
    #[must_use]
    pub fn shot_interval(&self) -> Option<f32> {
        if self.rate.is_finite() && self.rate > 0.0 {
            Some(1.0 / self.rate)
        } else {
            None
        }
    }

    /// Euclidean pixel distance to a point.
    #[must_use]
    pub fn distance_to(&self, point: Vec2) -> f32 {
        self.position.distance(point)
    }

    /// Reports whether a point lies within the tower's range.
    #[must_use]
    pub fn in_range(&self, point: Vec2) -> bool {
        self.range > 0.0 && self.distance_to(point) <= self.range
    }

    fn clamp_cooldown(&mut self) {
        if let Some(interval) = self.shot_interval() {
            self.cooldown = self.cooldown.min(interval);
        }
    }
}

/// Bonus shots accumulated from upstream supply-chain towers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoredShots {
    /// Shots stored by alpha suppliers.
    pub alpha: u32,
    /// Shots stored by beta suppliers.
    pub beta: u32,
    /// Shots stored by gamma suppliers.
    pub gamma: u32,
}

impl StoredShots {
    /// Adds one stored shot from a supplier of the provided type.
    ///
    /// Returns `false` when the type cannot store shots.
    pub fn add(&mut self, source: TowerType) -> bool {
        match self.slot_mut(source) {
            Some(slot) => {
                *slot = slot.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Number of shots stored from suppliers of the provided type.
    #[must_use]
    pub fn count(&self, source: TowerType) -> u32 {
        match source {
            TowerType::Alpha => self.alpha,
            TowerType::Beta => self.beta,
            TowerType::Gamma => self.gamma,
            _ => 0,
        }
    }

    /// Removes and returns every shot stored from the provided type.
    pub fn take(&mut self, source: TowerType) -> u32 {
        self.slot_mut(source).map_or(0, std::mem::take)
    }

    /// Drops counters whose supplier type is absent from `suppliers`.
    pub fn retain_suppliers(&mut self, suppliers: &[TowerType]) {
        for source in [TowerType::Alpha, TowerType::Beta, TowerType::Gamma] {
            if !suppliers.contains(&source) {
                let _ = self.take(source);
            }
        }
    }

    /// Total stored shots across every supplier type.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.alpha
            .saturating_add(self.beta)
            .saturating_add(self.gamma)
    }

    fn slot_mut(&mut self, source: TowerType) -> Option<&mut u32> {
        match source {
            TowerType::Alpha => Some(&mut self.alpha),
            TowerType::Beta => Some(&mut self.beta),
            TowerType::Gamma => Some(&mut self.gamma),
            _ => None,
        }
    }
}

/// Type-specific runtime state carried by a tower.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum BehaviorState {
    /// The tower has no state beyond its shared fields.
    #[default]
    Stateless,
    /// Soldiers deployed by a delta tower.
    Soldiers {
        /// Soldiers currently on the field.
        soldiers: Vec<Soldier>,
    },
    /// Pulse timing for a theta slow field.
    SlowField {
        /// Seconds until the next slow pulse.
        pulse_timer: f32,
    },
    /// Allied fire absorbed by a sigma tower.
    Absorber {
        /// Damage waiting to be released on the next shot.
        stored_damage: f64,
    },
    /// Marker for infinity support towers.
    Aura,
}

impl BehaviorState {
    /// Initial state for a tower of the provided type.
    #[must_use]
    pub fn for_type(tower_type: TowerType) -> Self {
        match tower_type {
            TowerType::Delta => Self::Soldiers {
                soldiers: Vec::new(),
            },
            TowerType::Theta => Self::SlowField { pulse_timer: 0.0 },
            TowerType::Sigma => Self::Absorber { stored_damage: 0.0 },
            TowerType::Infinity => Self::Aura,
            _ => Self::Stateless,
        }
    }

    /// Clears live state before the tower leaves the roster.
    ///
    /// Returns `true` when something had to be torn down.
    pub fn teardown(&mut self) -> bool {
        let live = match self {
            Self::Soldiers { soldiers } => !soldiers.is_empty(),
            Self::Absorber { stored_damage } => *stored_damage > 0.0,
            Self::Aura => true,
            Self::SlowField { .. } | Self::Stateless => false,
        };
        *self = Self::Stateless;
        live
    }
}

/// Unit deployed by a delta tower.
#[derive(Clone, Debug, PartialEq)]
pub struct Soldier {
    /// Pixel position of the soldier.
    pub position: Vec2,
    /// Enemy the soldier is engaging.
    pub target: Option<EnemyId>,
    /// Seconds until the soldier strikes again.
    pub attack_timer: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_shots_only_accept_supply_types() {
        let mut stored = StoredShots::default();
        assert!(stored.add(TowerType::Alpha));
        assert!(stored.add(TowerType::Alpha));
        assert!(stored.add(TowerType::Gamma));
        assert!(!stored.add(TowerType::Iota));
        assert_eq!(stored.total(), 3);
        assert_eq!(stored.take(TowerType::Alpha), 2);
        assert_eq!(stored.count(TowerType::Alpha), 0);
    }

    #[test]
    fn total_saturates_at_the_counter_limit() {
        let stored = StoredShots {
            alpha: u32::MAX,
            beta: 2,
            gamma: 1,
        };
        assert_eq!(stored.total(), u32::MAX);
    }

    #[test]
    fn retain_suppliers_drops_orphaned_counters() {
        let mut stored = StoredShots {
            alpha: 3,
            beta: 2,
            gamma: 1,
        };
        stored.retain_suppliers(&[TowerType::Beta]);
        assert_eq!(
            stored,
            StoredShots {
                alpha: 0,
                beta: 2,
                gamma: 0
            }
        );
    }

    #[test]
    fn teardown_reports_live_state() {
        let mut soldiers = BehaviorState::Soldiers {
            soldiers: vec![Soldier {
                position: Vec2::ZERO,
                target: None,
                attack_timer: 0.0,
            }],
        };
        assert!(soldiers.teardown());
        assert_eq!(soldiers, BehaviorState::Stateless);
        assert!(!BehaviorState::for_type(TowerType::Theta).teardown());
    }
}
