#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative combat state machine for a single level session.
//!
//! [`CombatState`] owns the wave schedule, the enemy roster, lives, energy and
//! the terminal outcome. Every per-tick operation is gated on the combat being
//! active; victory and defeat each deactivate combat until the next
//! [`CombatState::start_combat`] or [`CombatState::reset`].

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thero_idle_core::{
    DamageLedger, Debuffs, DefeatSummary, Enemy, EnemyArchetype, EnemyId, EnemyUpdateContext,
    EnergyLedger, Event, LevelConfig, Outcome, SoundCue, SpawnContext, SpawnOrigin, TowerId,
    VictorySummary,
};
use tracing::{debug, info};

const DEFAULT_RNG_SEED: u64 = 0x5eed_c0de_2f1b_77a3;

/// Tuning values for the combat state machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Seed for the death-side-effect rolls.
    pub rng_seed: u64,
    /// Probability that a dying enemy requests a chi thrall conversion.
    pub chi_conversion_chance: f64,
    /// Base of the geometric hit point scaling applied per endless cycle.
    pub cycle_hp_base: f64,
    /// Linear speed increase applied per endless cycle.
    pub cycle_speed_step: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rng_seed: DEFAULT_RNG_SEED,
            chi_conversion_chance: 0.1,
            cycle_hp_base: 10.0,
            cycle_speed_step: 0.1,
        }
    }
}

/// Parameters applied when combat starts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StartOptions {
    /// Wave index combat starts at.
    pub starting_wave_index: usize,
    /// Lives override; the level's lives apply when absent.
    pub starting_lives: Option<f64>,
    /// Energy available when combat starts.
    pub starting_energy: f64,
    /// Whether the schedule wraps into further cycles after the last wave.
    pub endless: bool,
    /// Endless cycle combat starts at.
    pub starting_cycle: u32,
    /// Seconds before the first wave's first spawn.
    pub initial_spawn_delay: Option<f32>,
}

/// Read-only snapshot of the active wave's runtime state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveProgress {
    /// Index into the level's wave list.
    pub index: usize,
    /// Enemies emitted so far.
    pub spawned: u32,
    /// Enemies the wave emits in total, counting the boss.
    pub total: u32,
    /// Wave timer value at which the next spawn is due.
    pub next_spawn: f32,
    /// Hit point multiplier captured when the wave started.
    pub multiplier: f64,
}

impl WaveProgress {
    /// Reports whether every scheduled enemy has been emitted.
    #[must_use]
    pub fn fully_spawned(&self) -> bool {
        self.spawned >= self.total
    }
}

/// Wave progression, enemy roster and session outcome.
#[derive(Debug)]
pub struct CombatState {
    config: Config,
    level: LevelConfig,
    rng: ChaCha8Rng,
    wave_index: usize,
    base_wave_count: usize,
    wave_timer: f32,
    active_wave: Option<WaveProgress>,
    pending_victory_wave: Option<u32>,
    endless: bool,
    endless_cycle: u32,
    max_wave_reached: u32,
    enemies: Vec<Enemy>,
    next_enemy_id: u32,
    lives: f64,
    energy: f64,
    outcome: Option<Outcome>,
    combat_active: bool,
}

impl CombatState {
    /// Creates an idle state machine for a sanitized copy of the level.
    #[must_use]
    pub fn new(level: &LevelConfig, config: Config) -> Self {
        let level = level.normalized();
        let lives = level.lives_or_default();
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            base_wave_count: level.waves.len(),
            config,
            level,
            wave_index: 0,
            wave_timer: 0.0,
            active_wave: None,
            pending_victory_wave: None,
            endless: false,
            endless_cycle: 0,
            max_wave_reached: 0,
            enemies: Vec::new(),
            next_enemy_id: 0,
            lives,
            energy: 0.0,
            outcome: None,
            combat_active: false,
        }
    }

    /// Resets every piece of state and begins the wave schedule.
    ///
    /// A level without waves starts with no active wave and idles.
    pub fn start_combat(&mut self, options: StartOptions, out: &mut Vec<Event>) {
        self.reset();
        self.wave_index = options.starting_wave_index;
        self.lives = options
            .starting_lives
            .filter(|lives| lives.is_finite())
            .unwrap_or_else(|| self.level.lives_or_default())
            .max(0.0);
        self.energy = sanitize_energy(options.starting_energy).min(self.energy_cap());
        self.endless = options.endless;
        self.endless_cycle = options.starting_cycle;
        self.combat_active = true;

        out.push(Event::CombatStarted {
            level: self.level.id.clone(),
        });
        info!(
            target: "thero_idle::combat",
            level = %self.level.id,
            waves = self.base_wave_count,
            endless = self.endless,
            cycle = self.endless_cycle,
            "combat started"
        );

        if self.wave_index >= self.base_wave_count && self.base_wave_count > 0 {
            self.wave_index = 0;
        }
        self.begin_wave(options.initial_spawn_delay, out);
    }

    /// Moves to the next wave, wrapping into a new cycle or resolving victory
    /// once the schedule is exhausted.
    pub fn advance_wave(&mut self, out: &mut Vec<Event>) {
        let finished_wave = self.wave_number();
        self.wave_index += 1;

        if self.wave_index < self.base_wave_count {
            self.begin_wave(None, out);
            return;
        }

        if self.endless && self.base_wave_count > 0 {
            self.wave_index = 0;
            self.endless_cycle += 1;
            debug!(
                target: "thero_idle::combat",
                cycle = self.endless_cycle,
                "endless cycle wrapped"
            );
            self.begin_wave(None, out);
            return;
        }

        self.active_wave = None;
        self.pending_victory_wave = Some(finished_wave);
        let _ = self.check_victory_condition(out);
    }

    /// Emits every enemy whose spawn slot became due during `delta` seconds.
    pub fn spawn_enemies<C>(&mut self, delta: f32, context: &mut C, out: &mut Vec<Event>)
    where
        C: SpawnContext + ?Sized,
    {
        if !self.combat_active {
            return;
        }
        let Some(active) = self.active_wave.as_mut() else {
            return;
        };
        let Some(wave) = self.level.waves.get(active.index) else {
            return;
        };

        self.wave_timer += delta.max(0.0);
        let wave_number = wave_number(self.endless_cycle, self.base_wave_count, self.wave_index);
        let speed_scalar = speed_scalar(&self.config, self.endless_cycle);

        while active.spawned < active.total && self.wave_timer >= active.next_spawn {
            let Some((archetype, boss)) = wave.archetype_at(active.spawned) else {
                break;
            };

            self.next_enemy_id += 1;
            let origin = if self.level.radial_spawn {
                SpawnOrigin::Radial {
                    origin: context.radial_origin(),
                }
            } else {
                SpawnOrigin::Path
            };
            let mut enemy = build_enemy(
                EnemyId::new(self.next_enemy_id),
                archetype,
                active.multiplier,
                speed_scalar,
                origin,
                context.path_origin(),
            );
            enemy.wave_number = wave_number;
            enemy.is_boss = boss;
            context.register_enemy(&mut enemy);

            active.spawned += 1;
            active.next_spawn = self.wave_timer + archetype.interval.unwrap_or(wave.interval);

            debug!(
                target: "thero_idle::combat",
                enemy = %enemy.id,
                hp = enemy.hp,
                boss,
                "enemy spawned"
            );
            out.push(Event::EnemySpawned {
                enemy: enemy.id,
                wave_number,
                boss,
            });
            self.enemies.push(enemy);
        }

        self.complete_wave_if_cleared(out);
    }

    /// Applies debuffs and movement to every enemy and resolves breaches.
    ///
    /// Enemies are visited in reverse roster order so removals never skip an
    /// entry. A breach costs lives equal to the enemy's remaining hit points.
    pub fn update_enemies<C>(&mut self, delta: f32, context: &mut C, out: &mut Vec<Event>)
    where
        C: EnemyUpdateContext + ?Sized,
    {
        if !self.combat_active {
            return;
        }

        let delta = delta.max(0.0);
        for index in (0..self.enemies.len()).rev() {
            let enemy = &mut self.enemies[index];
            context.apply_debuffs(enemy, delta);
            context.advance(enemy, delta);
            if enemy.progress < 1.0 {
                continue;
            }

            let breached = self.enemies.remove(index);
            let damage = breached.hp.max(0.0);
            self.lives = (self.lives - damage).max(0.0);
            debug!(
                target: "thero_idle::combat",
                enemy = %breached.id,
                damage,
                lives = self.lives,
                "enemy breached"
            );
            out.push(Event::EnemyBreached {
                enemy: breached.id,
                damage,
                lives: self.lives,
            });
            out.push(Event::Sound(SoundCue::EnemyBreach));

            if self.check_defeat_condition(out) {
                return;
            }
        }

        let _ = self.check_victory_condition(out);
    }

    /// Applies a hit to an enemy, resolving its death when hit points run out.
    ///
    /// Returns the hit points removed, or `None` when the enemy is gone.
    pub fn damage_enemy(
        &mut self,
        enemy: EnemyId,
        amount: f64,
        source: Option<TowerId>,
        out: &mut Vec<Event>,
    ) -> Option<f64> {
        let target = self.enemies.iter_mut().find(|candidate| candidate.id == enemy)?;
        let dealt = target.take_damage(amount, source);
        if !target.is_alive() {
            let _ = self.handle_enemy_death(enemy, out);
        }
        Some(dealt)
    }

    /// Resolves an enemy's death: reward, attribution, death side effects and
    /// the wave completion check.
    ///
    /// Returns `false` when the enemy is no longer on the roster.
    pub fn handle_enemy_death(&mut self, enemy: EnemyId, out: &mut Vec<Event>) -> bool {
        let Some(index) = self.enemies.iter().position(|candidate| candidate.id == enemy) else {
            return false;
        };
        let dead = self.enemies.remove(index);

        self.add_energy(dead.reward);
        out.push(Event::EnemyKilled {
            enemy: dead.id,
            reward: dead.reward,
            position: dead.position,
        });
        if let Some(tower) = dead.damage_contributors.top_contributor() {
            out.push(Event::KillAttributed {
                tower,
                enemy: dead.id,
            });
        }

        let chance = self.config.chi_conversion_chance.clamp(0.0, 1.0);
        if self.rng.gen_bool(chance) {
            out.push(Event::ChiConversionRequested {
                enemy: dead.id,
                position: dead.position,
                max_hp: dead.max_hp,
            });
        }
        out.push(Event::PsiClusterTriggered {
            enemy: dead.id,
            position: dead.position,
        });
        debug!(
            target: "thero_idle::combat",
            enemy = %dead.id,
            reward = dead.reward,
            energy = self.energy,
            "enemy killed"
        );

        self.complete_wave_if_cleared(out);
        let _ = self.check_victory_condition(out);
        true
    }

    /// Resolves victory if the schedule is exhausted and the roster is empty.
    ///
    /// Returns whether the session outcome is victory.
    pub fn check_victory_condition(&mut self, out: &mut Vec<Event>) -> bool {
        if self.outcome == Some(Outcome::Victory) {
            return true;
        }
        if !self.combat_active || self.endless || !self.enemies.is_empty() {
            return false;
        }
        let Some(wave_number) = self.pending_victory_wave else {
            return false;
        };

        self.outcome = Some(Outcome::Victory);
        self.combat_active = false;
        let summary = VictorySummary {
            wave_number,
            max_wave_reached: self.max_wave_reached,
            final_energy: self.energy,
        };
        info!(
            target: "thero_idle::combat",
            level = %self.level.id,
            wave = wave_number,
            energy = self.energy,
            "victory"
        );
        out.push(Event::Sound(SoundCue::Victory));
        out.push(Event::Victory(summary));
        true
    }

    /// Resolves defeat if lives are exhausted.
    ///
    /// Returns whether the session outcome is defeat.
    pub fn check_defeat_condition(&mut self, out: &mut Vec<Event>) -> bool {
        if self.outcome == Some(Outcome::Defeat) {
            return true;
        }
        if !self.combat_active || self.lives > 0.0 {
            return false;
        }

        self.outcome = Some(Outcome::Defeat);
        self.combat_active = false;
        let summary = DefeatSummary {
            wave_number: self.wave_number(),
            max_wave_reached: self.max_wave_reached,
        };
        info!(
            target: "thero_idle::combat",
            level = %self.level.id,
            wave = summary.wave_number,
            "defeat"
        );
        out.push(Event::Sound(SoundCue::Defeat));
        out.push(Event::Defeat(summary));
        true
    }

    /// Returns every piece of state to its construction defaults.
    pub fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.config.rng_seed);
        self.wave_index = 0;
        self.wave_timer = 0.0;
        self.active_wave = None;
        self.pending_victory_wave = None;
        self.endless = false;
        self.endless_cycle = 0;
        self.max_wave_reached = 0;
        self.enemies.clear();
        self.next_enemy_id = 0;
        self.lives = self.level.lives_or_default();
        self.energy = 0.0;
        self.outcome = None;
        self.combat_active = false;
    }

    /// Overwrites the lives counter without resolving defeat.
    pub fn set_lives(&mut self, lives: f64) {
        self.lives = if lives.is_nan() { 0.0 } else { lives.max(0.0) };
    }

    /// Adds energy, respecting the level's energy cap.
    pub fn add_energy(&mut self, amount: f64) {
        let amount = sanitize_energy(amount);
        self.energy = (self.energy + amount).min(self.energy_cap());
    }

    /// Removes lives as a breach would, resolving defeat when none remain.
    pub fn apply_breach_damage(&mut self, damage: f64, out: &mut Vec<Event>) {
        self.lives = (self.lives - sanitize_energy(damage)).max(0.0);
        let _ = self.check_defeat_condition(out);
    }

    /// Opens or closes the per-tick gate without touching the outcome.
    pub fn set_combat_active(&mut self, active: bool) {
        self.combat_active = active;
    }

    /// Adds a timed slow to an enemy.
    pub fn apply_slow(
        &mut self,
        enemy: EnemyId,
        source: Option<TowerId>,
        strength: f32,
        duration: f32,
    ) -> bool {
        match self.enemy_mut(enemy) {
            Some(target) => {
                target.debuffs.apply_slow(source, strength, duration);
                true
            }
            None => false,
        }
    }

    /// Adds a timed damage amplifier to an enemy.
    pub fn apply_amplifier(
        &mut self,
        enemy: EnemyId,
        source: Option<TowerId>,
        bonus: f64,
        duration: f32,
    ) -> bool {
        match self.enemy_mut(enemy) {
            Some(target) => {
                target.debuffs.apply_amplifier(source, bonus, duration);
                true
            }
            None => false,
        }
    }

    /// Level configuration the session runs, after sanitization.
    #[must_use]
    pub fn level(&self) -> &LevelConfig {
        &self.level
    }

    /// Index into the level's wave list.
    #[must_use]
    pub fn wave_index(&self) -> usize {
        self.wave_index
    }

    /// One-based display wave number accounting for endless cycles.
    #[must_use]
    pub fn wave_number(&self) -> u32 {
        wave_number(self.endless_cycle, self.base_wave_count, self.wave_index)
    }

    /// Seconds accumulated by the active wave.
    #[must_use]
    pub fn wave_timer(&self) -> f32 {
        self.wave_timer
    }

    /// Highest display wave number started this session.
    #[must_use]
    pub fn max_wave_reached(&self) -> u32 {
        self.max_wave_reached
    }

    /// Runtime state of the active wave.
    #[must_use]
    pub fn active_wave(&self) -> Option<WaveProgress> {
        self.active_wave
    }

    /// Number of waves in the level.
    #[must_use]
    pub fn base_wave_count(&self) -> usize {
        self.base_wave_count
    }

    /// Hit point multiplier of the current cycle.
    #[must_use]
    pub fn cycle_multiplier(&self) -> f64 {
        cycle_multiplier(&self.config, self.endless_cycle)
    }

    /// Speed multiplier of the current cycle.
    #[must_use]
    pub fn speed_scalar(&self) -> f32 {
        speed_scalar(&self.config, self.endless_cycle)
    }

    /// Live enemies in spawn order.
    #[must_use]
    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    /// Looks up a live enemy.
    #[must_use]
    pub fn enemy(&self, enemy: EnemyId) -> Option<&Enemy> {
        self.enemies.iter().find(|candidate| candidate.id == enemy)
    }

    /// Number of live enemies.
    #[must_use]
    pub fn enemy_count(&self) -> usize {
        self.enemies.len()
    }

    /// Targetable enemies within `radius` pixels of `center`, in roster order.
    pub fn enemies_within(&self, center: Vec2, radius: f32) -> impl Iterator<Item = &Enemy> + '_ {
        self.enemies.iter().filter(move |enemy| {
            enemy.is_targetable() && enemy.position.distance(center) <= radius
        })
    }

    /// Terminal outcome, if one has been resolved.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Remaining lives.
    #[must_use]
    pub fn lives(&self) -> f64 {
        self.lives
    }

    /// Reports whether per-tick work runs.
    #[must_use]
    pub fn is_combat_active(&self) -> bool {
        self.combat_active
    }

    /// Reports whether the schedule wraps after the last wave.
    #[must_use]
    pub fn is_endless(&self) -> bool {
        self.endless
    }

    /// Current endless cycle.
    #[must_use]
    pub fn endless_cycle(&self) -> u32 {
        self.endless_cycle
    }

    fn enemy_mut(&mut self, enemy: EnemyId) -> Option<&mut Enemy> {
        self.enemies.iter_mut().find(|candidate| candidate.id == enemy)
    }

    fn begin_wave(&mut self, delay_override: Option<f32>, out: &mut Vec<Event>) {
        self.wave_timer = 0.0;
        let Some(wave) = self.level.waves.get(self.wave_index) else {
            self.active_wave = None;
            return;
        };

        let delay = delay_override
            .or(wave.delay)
            .filter(|delay| delay.is_finite())
            .unwrap_or(0.0)
            .max(0.0);
        let progress = WaveProgress {
            index: self.wave_index,
            spawned: 0,
            total: wave.total_spawn_count(),
            next_spawn: delay,
            multiplier: cycle_multiplier(&self.config, self.endless_cycle),
        };
        self.active_wave = Some(progress);

        let number = self.wave_number();
        self.max_wave_reached = self.max_wave_reached.max(number);
        debug!(
            target: "thero_idle::combat",
            wave = number,
            index = self.wave_index,
            cycle = self.endless_cycle,
            spawns = progress.total,
            "wave started"
        );
        out.push(Event::WaveStarted {
            wave_number: number,
            wave_index: self.wave_index,
            cycle: self.endless_cycle,
        });
    }

    fn complete_wave_if_cleared(&mut self, out: &mut Vec<Event>) {
        if !self.combat_active || !self.enemies.is_empty() {
            return;
        }
        if self.active_wave.is_some_and(|wave| wave.fully_spawned()) {
            self.advance_wave(out);
        }
    }
}

impl EnergyLedger for CombatState {
    fn energy(&self) -> f64 {
        self.energy
    }

    fn energy_cap(&self) -> f64 {
        self.level.energy_cap_or_unbounded()
    }

    fn set_energy(&mut self, energy: f64) {
        self.energy = sanitize_energy(energy).min(self.energy_cap());
    }
}

/// Display wave number: `cycle × base_wave_count + wave_index + 1`.
#[must_use]
pub fn wave_number(cycle: u32, base_wave_count: usize, wave_index: usize) -> u32 {
    let cycle = u64::from(cycle);
    let base = base_wave_count as u64;
    let number = cycle * base + wave_index as u64 + 1;
    u32::try_from(number).unwrap_or(u32::MAX)
}

fn cycle_multiplier(config: &Config, cycle: u32) -> f64 {
    let exponent = i32::try_from(cycle).unwrap_or(i32::MAX);
    config.cycle_hp_base.powi(exponent)
}

fn speed_scalar(config: &Config, cycle: u32) -> f32 {
    1.0 + config.cycle_speed_step * cycle as f32
}

fn sanitize_energy(amount: f64) -> f64 {
    if amount.is_finite() {
        amount.max(0.0)
    } else {
        0.0
    }
}

fn build_enemy(
    id: EnemyId,
    archetype: &EnemyArchetype,
    multiplier: f64,
    speed_scalar: f32,
    origin: SpawnOrigin,
    path_origin: Vec2,
) -> Enemy {
    let hp = archetype.hp * multiplier;
    let position = match origin {
        SpawnOrigin::Path => path_origin,
        SpawnOrigin::Radial { origin } => origin,
    };
    Enemy {
        id,
        hp,
        max_hp: hp,
        speed: archetype.speed * speed_scalar,
        reward: archetype.reward * multiplier,
        progress: 0.0,
        position,
        origin,
        wave_number: 0,
        is_boss: false,
        codex_id: archetype.codex_id.clone(),
        symbol: archetype.symbol.clone(),
        in_tunnel: false,
        damage_contributors: DamageLedger::default(),
        debuffs: Debuffs {
            shield: archetype.shield.unwrap_or(0.0).max(0.0),
            ..Debuffs::default()
        },
    }
}
