#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-tick tower driver.
//!
//! Every tick each tower cools down, then either feeds its downstream tower
//! (supply links), or runs its type-specific upkeep followed by the generic
//! target-and-fire step when its behavior takes part in it. Damage from
//! projectiles is scheduled on the [`ProjectileQueue`]; beams, pulses, chains
//! and soldiers apply damage immediately.

mod behavior;
mod damage;

use std::time::Duration;

use glam::Vec2;
use thero_idle_core::{
    BehaviorState, Crystal, CrystalId, EnemyId, EquationEngine, Event, Soldier, TargetRef, Tower,
    TowerId, TowerType,
};
use thero_idle_system_combat_state::CombatState;
use thero_idle_system_projectiles::{ImpactEffect, ProjectileQueue};
use thero_idle_system_tower_targeting::{
    FocusState, SigmaCandidate, TargetInfo, TargetOptions, TargetingView, TowerTargeting,
};
use tracing::debug;

pub use behavior::{behavior_for, Behavior};
pub use damage::{consumed_suppliers, deliver_impacts, resolve_tower_shot_damage};

/// Tuning values for tower attacks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Pixel width of piercing beams.
    pub beam_width: f32,
    /// Extra enemies a chaining strike jumps to.
    pub chain_jumps: usize,
    /// Jump distance as a fraction of the tower's range.
    pub chain_range_fraction: f32,
    /// Damage multiplier applied per jump.
    pub chain_falloff: f64,
    /// Enemies targeted by one burst volley.
    pub burst_count: usize,
    /// Damage bonus left by amplifier projectiles.
    pub amplify_bonus: f64,
    /// Seconds an amplifier lasts.
    pub amplify_duration: f32,
    /// Speed reduction applied by slow fields.
    pub slow_strength: f32,
    /// Seconds a slow lasts.
    pub slow_duration: f32,
    /// Seconds between slow field pulses.
    pub slow_pulse_interval: f32,
    /// Soldiers a single tower keeps on the field.
    pub max_soldiers: usize,
    /// Soldier movement in pixels per second.
    pub soldier_speed: f32,
    /// Seconds between soldier strikes.
    pub soldier_attack_interval: f32,
    /// Fraction of the tower's damage dealt per soldier strike.
    pub soldier_damage_fraction: f64,
    /// Pixel distance at which a soldier can strike.
    pub soldier_reach: f32,
    /// Damage bonus granted per infinity tower in range.
    pub aura_bonus: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            beam_width: 12.0,
            chain_jumps: 3,
            chain_range_fraction: 0.5,
            chain_falloff: 0.75,
            burst_count: 3,
            amplify_bonus: 0.25,
            amplify_duration: 3.0,
            slow_strength: 0.35,
            slow_duration: 1.0,
            slow_pulse_interval: 0.5,
            max_soldiers: 3,
            soldier_speed: 120.0,
            soldier_attack_interval: 0.8,
            soldier_damage_fraction: 0.5,
            soldier_reach: 14.0,
            aura_bonus: 0.1,
        }
    }
}

/// Mutable world state the dispatcher works against during one tick.
pub struct DispatchContext<'a> {
    /// Enemy roster and combat flags.
    pub combat: &'a mut CombatState,
    /// Crystal objectives; shattered crystals are removed.
    pub crystals: &'a mut Vec<Crystal>,
    /// Player focus.
    pub focus: FocusState,
    /// Queue receiving deferred-damage projectiles.
    pub projectiles: &'a mut ProjectileQueue,
    /// Live equation values for stored-shot conversion.
    pub equations: &'a dyn EquationEngine,
    /// Event sink.
    pub out: &'a mut Vec<Event>,
}

/// Tower dispatcher with reusable scratch buffers.
#[derive(Debug, Default)]
pub struct TowerDispatch {
    config: Config,
    targeting: TowerTargeting,
    sigma_towers: Vec<SigmaCandidate>,
    transfers: Vec<(TowerId, TowerId, TowerType)>,
    charges: Vec<(TowerId, f64)>,
}

impl TowerDispatch {
    /// Creates a dispatcher with empty scratch buffers.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Tuning values in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Advances every tower by `dt`.
    pub fn update_towers(
        &mut self,
        dt: Duration,
        towers: &mut [Tower],
        ctx: &mut DispatchContext<'_>,
    ) {
        let delta = dt.as_secs_f32();
        self.apply_auras(towers);

        self.sigma_towers.clear();
        self.sigma_towers.extend(
            towers
                .iter()
                .filter(|tower| tower.tower_type == TowerType::Sigma)
                .map(|tower| SigmaCandidate {
                    tower: tower.id,
                    position: tower.position,
                }),
        );
        self.transfers.clear();
        self.charges.clear();

        for tower in towers.iter_mut() {
            tower.cooldown = (tower.cooldown - delta).max(0.0);
            if !ctx.combat.is_combat_active() {
                continue;
            }

            if let Some(target) = tower.link_target {
                self.update_supplier(tower, target);
                continue;
            }

            let behavior = behavior_for(tower.tower_type);
            if behavior.has_tick() {
                self.run_type_tick(behavior, tower, delta, ctx);
            }
            if !behavior.participates_in_generic_targeting() || tower.cooldown > 0.0 {
                continue;
            }

            let Some(interval) = tower.shot_interval() else {
                continue;
            };
            if let Some(info) = self.find_target(tower, ctx) {
                tower.cooldown = interval;
                self.fire_at_target(tower, info, ctx);
            }
        }

        self.settle_transfers(towers, ctx.out);
    }

    /// Per-tick work of behaviors that report [`Behavior::has_tick`].
    fn run_type_tick(
        &self,
        behavior: Behavior,
        tower: &mut Tower,
        delta: f32,
        ctx: &mut DispatchContext<'_>,
    ) {
        match behavior {
            Behavior::Soldiers => self.tick_soldiers(tower, delta, ctx),
            Behavior::SlowField => self.tick_slow_field(tower, delta, ctx),
            _ => {}
        }
    }

    /// Resolves the target a tower fires at this tick.
    ///
    /// Sigma towers never fall back to absorbing their own kind.
    pub fn find_target(
        &mut self,
        tower: &mut Tower,
        ctx: &DispatchContext<'_>,
    ) -> Option<TargetInfo> {
        let view = TargetingView {
            enemies: ctx.combat.enemies(),
            crystals: ctx.crystals.as_slice(),
            sigma_towers: &self.sigma_towers,
            focus: ctx.focus,
        };
        let options = TargetOptions {
            allow_sigma: tower.tower_type != TowerType::Sigma,
        };
        self.targeting.find_target(tower, &view, options)
    }

    /// Delivers one attack of `tower` at a resolved target.
    pub fn fire_at_target(
        &mut self,
        tower: &mut Tower,
        info: TargetInfo,
        ctx: &mut DispatchContext<'_>,
    ) {
        match info.target {
            TargetRef::Crystal(crystal) => {
                let damage = resolve_tower_shot_damage(tower, ctx.equations, ctx.out);
                emit_instant_visual(tower, info, ctx.out);
                damage_crystal(ctx.crystals, crystal, damage, ctx.out);
            }
            TargetRef::Sigma(sigma) => {
                let damage = resolve_tower_shot_damage(tower, ctx.equations, ctx.out);
                emit_instant_visual(tower, info, ctx.out);
                self.charges.push((sigma, damage));
            }
            TargetRef::Enemy(enemy) => match behavior_for(tower.tower_type) {
                Behavior::Soldiers => self.deploy_soldier(tower, enemy, ctx.out),
                Behavior::Beam => self.fire_beam(tower, info, ctx),
                Behavior::Chain => self.fire_chain(tower, info, ctx),
                Behavior::Pulse => self.fire_pulse(tower, ctx),
                Behavior::Burst => self.fire_burst(tower, ctx),
                Behavior::Amplify => {
                    let damage = resolve_tower_shot_damage(tower, ctx.equations, ctx.out);
                    let effect = ImpactEffect::Amplify {
                        bonus: self.config.amplify_bonus,
                        duration: self.config.amplify_duration,
                    };
                    emit_tower_attack_visuals(tower, info, damage, effect, ctx);
                }
                Behavior::Projectile
                | Behavior::Absorber
                | Behavior::SlowField
                | Behavior::Aura => {
                    let damage = resolve_tower_shot_damage(tower, ctx.equations, ctx.out);
                    emit_tower_attack_visuals(tower, info, damage, ImpactEffect::Damage, ctx);
                }
            },
        }
    }

    fn apply_auras(&self, towers: &mut [Tower]) {
        let auras: Vec<(Vec2, f32)> = towers
            .iter()
            .filter(|tower| tower.tower_type == TowerType::Infinity)
            .map(|tower| (tower.position, tower.range))
            .collect();
        for tower in towers.iter_mut() {
            if tower.tower_type == TowerType::Infinity {
                continue;
            }
            let covering = auras
                .iter()
                .filter(|(position, range)| {
                    *range > 0.0 && position.distance(tower.position) <= *range
                })
                .count();
            tower.damage = tower.base_damage * (1.0 + self.config.aura_bonus * covering as f64);
        }
    }

    fn update_supplier(&mut self, tower: &mut Tower, target: TowerId) {
        if tower.cooldown > 0.0 {
            return;
        }
        let Some(interval) = tower.shot_interval() else {
            return;
        };
        tower.cooldown = interval;
        self.transfers.push((tower.id, target, tower.tower_type));
    }

    fn settle_transfers(&mut self, towers: &mut [Tower], out: &mut Vec<Event>) {
        for (source, target, tower_type) in self.transfers.drain(..) {
            let Some(receiver) = towers.iter_mut().find(|tower| tower.id == target) else {
                continue;
            };
            if receiver.stored.add(tower_type) {
                out.push(Event::ShotStored {
                    source,
                    target,
                    tower_type,
                });
            }
        }
        for (sigma, amount) in self.charges.drain(..) {
            let Some(absorber) = towers.iter_mut().find(|tower| tower.id == sigma) else {
                continue;
            };
            if let BehaviorState::Absorber { stored_damage } = &mut absorber.behavior {
                *stored_damage += amount;
                out.push(Event::SigmaCharged {
                    tower: sigma,
                    amount,
                });
            }
        }
    }

    fn tick_soldiers(&self, tower: &mut Tower, delta: f32, ctx: &mut DispatchContext<'_>) {
        let id = tower.id;
        let origin = tower.position;
        let range = tower.range;
        let damage = tower.damage * self.config.soldier_damage_fraction;
        let BehaviorState::Soldiers { soldiers } = &mut tower.behavior else {
            return;
        };

        for soldier in soldiers.iter_mut() {
            soldier.attack_timer = (soldier.attack_timer - delta).max(0.0);
            let engaged = soldier
                .target
                .and_then(|enemy| ctx.combat.enemy(enemy))
                .filter(|enemy| enemy.is_targetable())
                .map(|enemy| (enemy.id, enemy.position));
            let target = engaged.or_else(|| {
                ctx.combat
                    .enemies_within(origin, range)
                    .min_by(|a, b| {
                        a.position
                            .distance(soldier.position)
                            .total_cmp(&b.position.distance(soldier.position))
                    })
                    .map(|enemy| (enemy.id, enemy.position))
            });
            soldier.target = target.map(|(enemy, _)| enemy);
            let Some((enemy, position)) = target else {
                continue;
            };

            let offset = position - soldier.position;
            let distance = offset.length();
            if distance > self.config.soldier_reach {
                let step = (self.config.soldier_speed * delta)
                    .min(distance - self.config.soldier_reach);
                soldier.position += offset / distance * step;
                continue;
            }
            if soldier.attack_timer <= 0.0 {
                soldier.attack_timer = self.config.soldier_attack_interval;
                let _ = ctx.combat.damage_enemy(enemy, damage, Some(id), ctx.out);
            }
        }
    }

    fn tick_slow_field(&self, tower: &mut Tower, delta: f32, ctx: &mut DispatchContext<'_>) {
        let id = tower.id;
        let origin = tower.position;
        let range = tower.range;
        let BehaviorState::SlowField { pulse_timer } = &mut tower.behavior else {
            return;
        };
        *pulse_timer -= delta;
        if *pulse_timer > 0.0 {
            return;
        }
        *pulse_timer = self.config.slow_pulse_interval;

        let slowed: Vec<EnemyId> = ctx
            .combat
            .enemies_within(origin, range)
            .map(|enemy| enemy.id)
            .collect();
        for enemy in &slowed {
            let _ = ctx.combat.apply_slow(
                *enemy,
                Some(id),
                self.config.slow_strength,
                self.config.slow_duration,
            );
        }
        ctx.out.push(Event::PulseEmitted {
            tower: id,
            radius: range,
            hits: count(slowed.len()),
        });
    }

    fn deploy_soldier(&self, tower: &mut Tower, enemy: EnemyId, out: &mut Vec<Event>) {
        let id = tower.id;
        let origin = tower.position;
        let BehaviorState::Soldiers { soldiers } = &mut tower.behavior else {
            return;
        };
        if soldiers.len() >= self.config.max_soldiers {
            return;
        }
        soldiers.push(Soldier {
            position: origin,
            target: Some(enemy),
            attack_timer: 0.0,
        });
        out.push(Event::SoldierDeployed {
            tower: id,
            soldiers: soldiers.len(),
        });
    }

    fn fire_beam(&self, tower: &mut Tower, info: TargetInfo, ctx: &mut DispatchContext<'_>) {
        let origin = tower.position;
        // A target on top of the tower still sits on any line through it.
        let direction = (info.position - origin).try_normalize().unwrap_or(Vec2::X);
        let damage = resolve_tower_shot_damage(tower, ctx.equations, ctx.out);
        let end = origin + direction * tower.range;
        let half_width = self.config.beam_width * 0.5;
        let struck: Vec<EnemyId> = ctx
            .combat
            .enemies()
            .iter()
            .filter(|enemy| {
                enemy.is_targetable()
                    && distance_to_segment(enemy.position, origin, end) <= half_width
            })
            .map(|enemy| enemy.id)
            .collect();
        for enemy in &struck {
            let _ = ctx.combat.damage_enemy(*enemy, damage, Some(tower.id), ctx.out);
        }
        ctx.out.push(Event::BeamFired {
            tower: tower.id,
            origin,
            end,
            hits: count(struck.len()),
        });
    }

    fn fire_chain(&self, tower: &mut Tower, info: TargetInfo, ctx: &mut DispatchContext<'_>) {
        let TargetRef::Enemy(first) = info.target else {
            return;
        };
        let damage = resolve_tower_shot_damage(tower, ctx.equations, ctx.out);
        let jump_range = tower.range * self.config.chain_range_fraction;

        let mut struck = vec![first];
        let mut cursor = info.position;
        for _ in 0..self.config.chain_jumps {
            let next = ctx
                .combat
                .enemies_within(cursor, jump_range)
                .filter(|enemy| !struck.contains(&enemy.id))
                .min_by(|a, b| {
                    a.position
                        .distance(cursor)
                        .total_cmp(&b.position.distance(cursor))
                        .then_with(|| a.id.cmp(&b.id))
                })
                .map(|enemy| (enemy.id, enemy.position));
            let Some((enemy, position)) = next else {
                break;
            };
            struck.push(enemy);
            cursor = position;
        }

        let mut hit = damage;
        for enemy in &struck {
            let _ = ctx.combat.damage_enemy(*enemy, hit, Some(tower.id), ctx.out);
            hit *= self.config.chain_falloff;
        }
        ctx.out.push(Event::ChainStruck {
            tower: tower.id,
            enemies: struck,
        });
    }

    fn fire_pulse(&self, tower: &mut Tower, ctx: &mut DispatchContext<'_>) {
        let damage = resolve_tower_shot_damage(tower, ctx.equations, ctx.out);
        let struck: Vec<EnemyId> = ctx
            .combat
            .enemies_within(tower.position, tower.range)
            .map(|enemy| enemy.id)
            .collect();
        for enemy in &struck {
            let _ = ctx.combat.damage_enemy(*enemy, damage, Some(tower.id), ctx.out);
        }
        ctx.out.push(Event::PulseEmitted {
            tower: tower.id,
            radius: tower.range,
            hits: count(struck.len()),
        });
    }

    fn fire_burst(&mut self, tower: &mut Tower, ctx: &mut DispatchContext<'_>) {
        let damage = resolve_tower_shot_damage(tower, ctx.equations, ctx.out);
        let volley = self
            .targeting
            .rank_enemies(tower, ctx.combat.enemies(), self.config.burst_count);
        for info in volley {
            emit_tower_attack_visuals(tower, info, damage, ImpactEffect::Damage, ctx);
        }
    }
}

/// Schedules a deferred-damage projectile and reports the shot.
pub fn emit_tower_attack_visuals(
    tower: &Tower,
    info: TargetInfo,
    damage: f64,
    effect: ImpactEffect,
    ctx: &mut DispatchContext<'_>,
) {
    let TargetRef::Enemy(enemy) = info.target else {
        return;
    };
    let travel_time = ctx
        .projectiles
        .launch(tower.id, enemy, damage, effect, info.distance);
    debug!(
        target: "thero_idle::dispatch",
        tower = %tower.id,
        enemy = %enemy,
        damage,
        travel_time,
        "projectile launched"
    );
    ctx.out.push(Event::TowerFired {
        tower: tower.id,
        target: info.target,
        origin: tower.position,
        destination: info.position,
        travel_time,
    });
}

fn emit_instant_visual(tower: &Tower, info: TargetInfo, out: &mut Vec<Event>) {
    out.push(Event::TowerFired {
        tower: tower.id,
        target: info.target,
        origin: tower.position,
        destination: info.position,
        travel_time: 0.0,
    });
}

fn damage_crystal(
    crystals: &mut Vec<Crystal>,
    id: CrystalId,
    damage: f64,
    out: &mut Vec<Event>,
) {
    let Some(index) = crystals.iter().position(|crystal| crystal.id == id) else {
        return;
    };
    let crystal = &mut crystals[index];
    crystal.integrity = (crystal.integrity - damage.max(0.0)).max(0.0);
    out.push(Event::CrystalDamaged {
        crystal: id,
        integrity: crystal.integrity,
    });
    if crystal.integrity <= 0.0 {
        let _ = crystals.remove(index);
        debug!(target: "thero_idle::dispatch", crystal = id.get(), "crystal shattered");
        out.push(Event::CrystalShattered { crystal: id });
    }
}

fn distance_to_segment(point: Vec2, start: Vec2, end: Vec2) -> f32 {
    let span = end - start;
    let length_squared = span.length_squared();
    if length_squared <= f32::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(span) / length_squared).clamp(0.0, 1.0);
    point.distance(start + span * t)
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
