//! Plain tower records used to checkpoint and restore the roster.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    BehaviorMode, BehaviorState, StoredShots, TargetPriority, Tower, TowerId, TowerType, Viewport,
};

/// Serializable snapshot of one tower.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowerRecord {
    /// Tower identifier.
    pub id: TowerId,
    /// Tower type.
    #[serde(rename = "type")]
    pub tower_type: TowerType,
    /// Tier of the type.
    pub tier: u32,
    /// Normalized position.
    pub normalized: Vec2,
    /// Damage of the tier definition.
    pub base_damage: f64,
    /// Rate of the tier definition.
    pub base_rate: f32,
    /// Fractional range of the tier definition.
    pub base_range: f32,
    /// Effective damage.
    pub damage: f64,
    /// Effective rate.
    pub rate: f32,
    /// Effective range in pixels when the record was captured.
    pub range: f32,
    /// Seconds until the next shot.
    pub cooldown: f32,
    /// Downstream supply link.
    #[serde(default)]
    pub link_target_id: Option<TowerId>,
    /// Upstream suppliers.
    #[serde(default)]
    pub link_sources: Vec<TowerId>,
    /// Stored alpha shots.
    #[serde(default)]
    pub stored_alpha_shots: u32,
    /// Stored beta shots.
    #[serde(default)]
    pub stored_beta_shots: u32,
    /// Stored gamma shots.
    #[serde(default)]
    pub stored_gamma_shots: u32,
    /// Anchor slot occupied by the tower.
    #[serde(default)]
    pub slot_id: Option<u32>,
    /// Target priority policy.
    #[serde(default)]
    pub target_priority: TargetPriority,
    /// Behavior mode.
    #[serde(default)]
    pub behavior_mode: BehaviorMode,
    /// Energy paid per tier.
    #[serde(default)]
    pub cost_history: Vec<f64>,
    /// Damage absorbed by a sigma tower.
    #[serde(default)]
    pub stored_sigma_damage: f64,
}

impl TowerRecord {
    /// Captures a tower into a plain record.
    #[must_use]
    pub fn capture(tower: &Tower) -> Self {
        let stored_sigma_damage = match tower.behavior {
            BehaviorState::Absorber { stored_damage } => stored_damage,
            _ => 0.0,
        };
        Self {
            id: tower.id,
            tower_type: tower.tower_type,
            tier: tower.tier,
            normalized: tower.normalized,
            base_damage: tower.base_damage,
            base_rate: tower.base_rate,
            base_range: tower.base_range,
            damage: tower.damage,
            rate: tower.rate,
            range: tower.range,
            cooldown: tower.cooldown,
            link_target_id: tower.link_target,
            link_sources: tower.link_sources.iter().copied().collect(),
            stored_alpha_shots: tower.stored.alpha,
            stored_beta_shots: tower.stored.beta,
            stored_gamma_shots: tower.stored.gamma,
            slot_id: tower.slot_id,
            target_priority: tower.target_priority,
            behavior_mode: tower.behavior_mode,
            cost_history: tower.cost_history.clone(),
            stored_sigma_damage,
        }
    }

    /// Rebuilds a tower from the record for the provided viewport.
    ///
    /// Connections are left empty; the owner of the roster relinks them.
    #[must_use]
    pub fn to_tower(&self, viewport: Viewport) -> Tower {
        let mut behavior = BehaviorState::for_type(self.tower_type);
        if let BehaviorState::Absorber { stored_damage } = &mut behavior {
            *stored_damage = self.stored_sigma_damage.max(0.0);
        }

        Tower {
            id: self.id,
            tower_type: self.tower_type,
            tier: self.tier,
            symbol: self.tower_type.glyph().to_owned(),
            normalized: self.normalized,
            position: viewport.to_pixels(self.normalized),
            base_damage: self.base_damage,
            base_rate: self.base_rate,
            base_range: self.base_range,
            damage: self.damage,
            rate: self.rate,
            range: viewport.range_to_pixels(self.base_range),
            cooldown: self.cooldown.max(0.0),
            link_target: None,
            link_sources: Default::default(),
            stored: StoredShots {
                alpha: self.stored_alpha_shots,
                beta: self.stored_beta_shots,
                gamma: self.stored_gamma_shots,
            },
            slot_id: self.slot_id,
            target_priority: self.target_priority,
            behavior_mode: self.behavior_mode,
            manual_target: None,
            behavior,
            cost_history: self.cost_history.clone(),
        }
    }
}

/// Reasons a checkpoint cannot be restored.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CheckpointError {
    /// Two records share an identifier.
    #[error("checkpoint contains {0} more than once")]
    DuplicateTower(TowerId),
    /// A record names a type the catalog does not define.
    #[error("checkpoint references undefined tower type {0}")]
    UnknownDefinition(TowerType),
    /// A record links to a tower missing from the checkpoint.
    #[error("{tower} links to missing {target}")]
    DanglingLink {
        /// Tower holding the link.
        tower: TowerId,
        /// Missing downstream tower.
        target: TowerId,
    },
    /// The controller has no active level to restore into.
    #[error("no level is active")]
    NoActiveLevel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StandardCatalog, TowerCatalog};

    fn sample_tower() -> Tower {
        let catalog = StandardCatalog::default();
        let definition = catalog
            .definition(TowerType::Sigma)
            .cloned()
            .unwrap_or_else(|| panic!("sigma definition"));
        let mut tower = Tower::from_definition(
            TowerId::new(3),
            &definition,
            Vec2::new(0.25, 0.75),
            Viewport::new(800.0, 600.0),
        );
        tower.behavior = BehaviorState::Absorber {
            stored_damage: 12.5,
        };
        tower.stored.beta = 2;
        tower.cost_history = vec![30.0, 45.0];
        tower.link_target = Some(TowerId::new(9));
        tower
    }

    #[test]
    fn record_survives_bincode() {
        let record = TowerRecord::capture(&sample_tower());
        let bytes = bincode::serialize(&record).expect("serialize");
        let restored: TowerRecord = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, record);
    }

    #[test]
    fn restoring_recomputes_pixels_and_drops_links() {
        let record = TowerRecord::capture(&sample_tower());
        let tower = record.to_tower(Viewport::new(400.0, 400.0));
        assert_eq!(tower.position, Vec2::new(100.0, 300.0));
        assert!((tower.range - record.base_range * 400.0).abs() < 1e-3);
        assert!(tower.link_target.is_none());
        assert_eq!(
            tower.behavior,
            BehaviorState::Absorber {
                stored_damage: 12.5
            }
        );
        assert_eq!(tower.stored.beta, 2);
    }

    #[test]
    fn record_uses_type_key_in_json() {
        let record = TowerRecord::capture(&sample_tower());
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains("\"type\":\"sigma\""));
        assert!(json.contains("\"linkTargetId\":9"));
    }
}
