//! Shot damage resolution and delivery of landed projectiles.

use thero_idle_core::{BehaviorState, EquationEngine, Event, Tower, TowerType};
use thero_idle_system_combat_state::CombatState;
use thero_idle_system_projectiles::{Impact, ImpactEffect};

/// Supplier types whose stored shots the receiving type consumes.
#[must_use]
pub fn consumed_suppliers(tower_type: TowerType) -> &'static [TowerType] {
    match tower_type {
        TowerType::Beta => &[TowerType::Alpha],
        TowerType::Gamma => &[TowerType::Alpha, TowerType::Beta],
        TowerType::Iota => &[TowerType::Alpha, TowerType::Beta, TowerType::Gamma],
        _ => &[],
    }
}

/// Damage of the tower's next shot.
///
/// Stored supply-chain shots are consumed and each contributes the supplier
/// type's current equation value. Sigma towers release their absorbed damage.
pub fn resolve_tower_shot_damage(
    tower: &mut Tower,
    equations: &dyn EquationEngine,
    out: &mut Vec<Event>,
) -> f64 {
    let mut damage = tower.damage;
    let mut shots = 0;
    for supplier in consumed_suppliers(tower.tower_type) {
        let stored = tower.stored.take(*supplier);
        if stored > 0 {
            damage += f64::from(stored) * equations.tower_equation_result(*supplier);
            shots += stored;
        }
    }
    if let BehaviorState::Absorber { stored_damage } = &mut tower.behavior {
        damage += std::mem::take(stored_damage);
    }
    if shots > 0 {
        out.push(Event::SwirlLaunched {
            tower: tower.id,
            shots,
        });
    }
    damage
}

/// Applies landed projectiles to the enemy roster in landing order.
///
/// Impacts on enemies that already left the roster are dropped.
pub fn deliver_impacts(impacts: &[Impact], combat: &mut CombatState, out: &mut Vec<Event>) {
    for impact in impacts {
        if let ImpactEffect::Amplify { bonus, duration } = impact.effect {
            let _ = combat.apply_amplifier(impact.target, Some(impact.tower), bonus, duration);
        }
        let _ = combat.damage_enemy(impact.target, impact.damage, Some(impact.tower), out);
    }
}
