#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Level lifecycle for Thero Idle.
//!
//! A [`Session`] wires the combat state machine, enemy movement, the tower
//! controller, the tower dispatcher and the projectile queue into one playable
//! level. Entering a level rebuilds every manager from a normalized copy of the
//! level configuration. Gameplay is driven exclusively through [`apply`], and
//! read access goes through the [`query`] module.

mod checkpoint;
mod error;
mod hooks;

use std::{fmt, sync::Arc, time::Duration};

use glam::Vec2;
use thero_idle_core::{
    BehaviorMode, Crystal, CrystalId, EnemyId, EnergyLedger, EquationEngine, Event, LevelConfig,
    TargetPriority, TowerCatalog, TowerId, Viewport,
};
use thero_idle_system_combat_state::{CombatState, Config as CombatConfig};
use thero_idle_system_movement::{Config as MovementConfig, Movement};
use thero_idle_system_projectiles::{Config as ProjectileConfig, Impact, ProjectileQueue};
use thero_idle_system_tower_dispatch::{
    deliver_impacts, Config as DispatchConfig, DispatchContext, TowerDispatch,
};
use thero_idle_system_tower_orchestration::{
    Config as OrchestrationConfig, Loadout, PathClearance, TowerOrchestration,
};
use thero_idle_system_tower_targeting::FocusState;
use tracing::info;

pub use checkpoint::SessionCheckpoint;
pub use error::SessionError;
pub use hooks::{DefeatReport, NoHooks, SessionHooks, VictoryReport};
pub use thero_idle_system_combat_state::StartOptions;
pub use thero_idle_system_tower_orchestration::PlacementOptions;

/// Tuning values for a session and every system it owns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    /// Pixel dimensions of the battlefield.
    pub viewport: Viewport,
    /// Normalized distance towers must keep from the enemy path.
    pub path_clearance: f32,
    /// Integrity of every crystal placed when a level is entered.
    pub crystal_integrity: f64,
    /// Combat state machine tuning.
    pub combat: CombatConfig,
    /// Movement tuning.
    pub movement: MovementConfig,
    /// Tower controller tuning.
    pub towers: OrchestrationConfig,
    /// Tower attack tuning.
    pub dispatch: DispatchConfig,
    /// Projectile travel tuning.
    pub projectiles: ProjectileConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(1280.0, 720.0),
            path_clearance: 0.04,
            crystal_integrity: 100.0,
            combat: CombatConfig::default(),
            movement: MovementConfig::default(),
            towers: OrchestrationConfig::default(),
            dispatch: DispatchConfig::default(),
            projectiles: ProjectileConfig::default(),
        }
    }
}

/// Gameplay commands accepted by [`apply`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Starts (or restarts) combat on the entered level.
    StartCombat(StartOptions),
    /// Advances the simulation.
    Tick {
        /// Simulated time elapsed since the previous tick.
        dt: Duration,
    },
    /// Places a tower, merging into a same-type tower under the point.
    PlaceTower {
        /// Normalized battlefield position.
        normalized: Vec2,
        /// Type, slot and override selection.
        options: PlacementOptions,
    },
    /// Upgrades a tower to its next tier.
    UpgradeTower {
        /// Tower to upgrade.
        tower: TowerId,
        /// Cost shown to the player, if one was quoted.
        quoted_cost: Option<f64>,
    },
    /// Demotes a tower, selling it when it sits at the base tier.
    DemoteTower {
        /// Tower to demote.
        tower: TowerId,
    },
    /// Sells a tower.
    SellTower {
        /// Tower to sell.
        tower: TowerId,
    },
    /// Links a supplier to a downstream tower.
    Connect {
        /// Supplying tower.
        source: TowerId,
        /// Supplied tower.
        target: TowerId,
    },
    /// Removes a supply link; a missing link is ignored.
    Disconnect {
        /// Supplying tower.
        source: TowerId,
        /// Supplied tower.
        target: TowerId,
    },
    /// Changes how a tower ranks enemies.
    SetTargetPriority {
        /// Tower to configure.
        tower: TowerId,
        /// New policy.
        priority: TargetPriority,
    },
    /// Changes a tower's behavior mode.
    SetBehaviorMode {
        /// Tower to configure.
        tower: TowerId,
        /// New mode.
        mode: BehaviorMode,
    },
    /// Pins or clears a tower's manual target.
    SetManualTarget {
        /// Tower to configure.
        tower: TowerId,
        /// Enemy to pin, or `None` to clear.
        enemy: Option<EnemyId>,
    },
    /// Focuses every tower on an enemy.
    FocusEnemy(Option<EnemyId>),
    /// Focuses every tower on a crystal.
    FocusCrystal(Option<CrystalId>),
}

/// Playable level session.
pub struct Session {
    config: SessionConfig,
    catalog: Arc<dyn TowerCatalog>,
    equations: Arc<dyn EquationEngine>,
    hooks: Box<dyn SessionHooks>,
    loadout: Loadout,
    active: Option<ActiveLevel>,
    tick_index: u64,
}

#[derive(Debug)]
struct ActiveLevel {
    level: LevelConfig,
    combat: CombatState,
    movement: Movement,
    towers: TowerOrchestration,
    dispatch: TowerDispatch,
    projectiles: ProjectileQueue,
    impacts: Vec<Impact>,
    crystals: Vec<Crystal>,
    focus: FocusState,
    start_energy: f64,
}

impl Session {
    /// Creates a session backed by a catalog that also evaluates equations.
    pub fn new<C>(config: SessionConfig, catalog: Arc<C>) -> Result<Self, SessionError>
    where
        C: TowerCatalog + EquationEngine + 'static,
    {
        let equations: Arc<dyn EquationEngine> = catalog.clone();
        Self::with_collaborators(config, catalog, equations)
    }

    /// Creates a session from separate catalog and equation collaborators.
    pub fn with_collaborators(
        config: SessionConfig,
        catalog: Arc<dyn TowerCatalog>,
        equations: Arc<dyn EquationEngine>,
    ) -> Result<Self, SessionError> {
        // Empty catalogs and degenerate viewports fail here, not on entry.
        TowerOrchestration::new(
            config.towers,
            Arc::clone(&catalog),
            Box::new(PathClearance::open()),
        )?
        .activate(config.viewport)?;

        Ok(Self {
            config,
            catalog,
            equations,
            hooks: Box::new(NoHooks),
            loadout: Loadout::default(),
            active: None,
            tick_index: 0,
        })
    }

    /// Replaces the host callbacks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Box<dyn SessionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Session tuning values.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Loadout applied to every entered level.
    #[must_use]
    pub fn loadout(&self) -> &Loadout {
        &self.loadout
    }

    /// Replaces the loadout, including the one of the entered level.
    pub fn set_loadout(&mut self, loadout: Loadout) {
        if let Some(active) = self.active.as_mut() {
            *active.towers.loadout_mut() = loadout.clone();
        }
        self.loadout = loadout;
    }

    /// Enters a level, discarding any level in progress.
    ///
    /// Every manager is rebuilt from a normalized copy of `level`. Combat
    /// waits for [`Command::StartCombat`].
    pub fn enter_level(&mut self, level: &LevelConfig) -> Result<(), SessionError> {
        let level = level.normalized();
        let viewport = self.config.viewport;
        let mut towers = TowerOrchestration::new(
            self.config.towers,
            Arc::clone(&self.catalog),
            Box::new(PathClearance::new(&level.path, self.config.path_clearance)),
        )?;
        towers.activate(viewport)?;
        *towers.loadout_mut() = self.loadout.clone();

        self.leave_level();
        let crystals = level
            .crystals
            .iter()
            .zip(1u32..)
            .map(|(point, id)| Crystal {
                id: CrystalId::new(id),
                position: viewport.to_pixels(point.to_vec2()),
                integrity: self.config.crystal_integrity,
            })
            .collect();

        info!(
            target: "thero_idle::session",
            level = %level.id,
            waves = level.waves.len(),
            radial = level.radial_spawn,
            "level entered"
        );
        self.active = Some(ActiveLevel {
            combat: CombatState::new(&level, self.config.combat),
            movement: Movement::new(&level, viewport, self.config.movement),
            towers,
            dispatch: TowerDispatch::new(self.config.dispatch),
            projectiles: ProjectileQueue::new(self.config.projectiles),
            impacts: Vec::new(),
            crystals,
            focus: FocusState::default(),
            start_energy: 0.0,
            level,
        });
        Ok(())
    }

    /// Leaves the level in progress, dropping its towers and enemies.
    pub fn leave_level(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.towers.deactivate();
            info!(target: "thero_idle::session", level = %active.level.id, "level left");
        }
    }

    /// Re-enters the level in progress from scratch.
    pub fn retry_level(&mut self) -> Result<(), SessionError> {
        let level = self
            .active
            .as_ref()
            .map(|active| active.level.clone())
            .ok_or(SessionError::NoActiveLevel)?;
        self.enter_level(&level)
    }

    /// Captures the entered level.
    pub fn checkpoint(&self) -> Result<SessionCheckpoint, SessionError> {
        let active = self.active.as_ref().ok_or(SessionError::NoActiveLevel)?;
        Ok(SessionCheckpoint {
            level: active.level.id.clone(),
            towers: active.towers.checkpoint(),
            energy: active.combat.energy(),
            lives: active.combat.lives(),
            wave_index: active.combat.wave_index(),
            cycle: active.combat.endless_cycle(),
            endless: active.combat.is_endless(),
        })
    }

    /// Restores a checkpoint into the entered level and restarts combat at
    /// the checkpointed wave.
    ///
    /// Nothing changes when the checkpoint is rejected.
    pub fn restore(
        &mut self,
        checkpoint: &SessionCheckpoint,
        out: &mut Vec<Event>,
    ) -> Result<(), SessionError> {
        let start = out.len();
        let active = self.active.as_mut().ok_or(SessionError::NoActiveLevel)?;
        if checkpoint.level != active.level.id {
            return Err(SessionError::LevelMismatch {
                expected: active.level.id.clone(),
                found: checkpoint.level.clone(),
            });
        }
        active.towers.restore_towers_from_checkpoint(&checkpoint.towers)?;

        active.projectiles.clear();
        active.focus = FocusState::default();
        active.start_energy = checkpoint.energy;
        active.combat.start_combat(
            StartOptions {
                starting_wave_index: checkpoint.wave_index,
                endless: checkpoint.endless,
                starting_cycle: checkpoint.cycle,
                ..StartOptions::default()
            },
            out,
        );
        active.combat.set_lives(checkpoint.lives);
        active.combat.set_energy(checkpoint.energy);
        info!(
            target: "thero_idle::session",
            level = %checkpoint.level,
            towers = checkpoint.towers.len(),
            wave = active.combat.wave_number(),
            "checkpoint restored"
        );
        self.route_hooks(&out[start..]);
        Ok(())
    }

    fn execute(&mut self, command: Command, out: &mut Vec<Event>) -> Result<(), SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActiveLevel)?;
        match command {
            Command::StartCombat(options) => {
                active.projectiles.clear();
                active.focus = FocusState::default();
                active.start_energy = options.starting_energy;
                active.combat.start_combat(options, out);
            }
            Command::Tick { dt } => {
                self.tick_index = self.tick_index.saturating_add(1);
                active.tick(dt, self.equations.as_ref(), out);
            }
            Command::PlaceTower {
                normalized,
                options,
            } => {
                let _ = active
                    .towers
                    .add_tower_at(normalized, options, &mut active.combat, out)?;
            }
            Command::UpgradeTower { tower, quoted_cost } => {
                let _ = active.towers.upgrade_tower_tier(
                    tower,
                    quoted_cost,
                    &mut active.combat,
                    out,
                )?;
            }
            Command::DemoteTower { tower } => {
                let _ = active
                    .towers
                    .demote_tower_tier(tower, &mut active.combat, out)?;
            }
            Command::SellTower { tower } => {
                let _ = active.towers.sell_tower(tower, &mut active.combat, out)?;
            }
            Command::Connect { source, target } => {
                active.towers.add_tower_connection(source, target, out)?;
            }
            Command::Disconnect { source, target } => {
                let _ = active.towers.remove_tower_connection(source, target, out);
            }
            Command::SetTargetPriority { tower, priority } => {
                active.towers.set_target_priority(tower, priority)?;
            }
            Command::SetBehaviorMode { tower, mode } => {
                active.towers.set_behavior_mode(tower, mode)?;
            }
            Command::SetManualTarget { tower, enemy } => {
                active.towers.set_manual_target(tower, enemy)?;
            }
            Command::FocusEnemy(enemy) => active.focus.enemy = enemy,
            Command::FocusCrystal(crystal) => active.focus.crystal = crystal,
        }
        Ok(())
    }

    fn route_hooks(&mut self, events: &[Event]) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let context = hooks::ReportContext {
            towers: active.towers.towers().len(),
            lives: active.combat.lives(),
            start_energy: active.start_energy,
        };
        hooks::route_events(self.hooks.as_mut(), &active.level.id, context, events);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("loadout", &self.loadout)
            .field("active", &self.active)
            .field("tick_index", &self.tick_index)
            .finish_non_exhaustive()
    }
}

impl ActiveLevel {
    /// Runs one frame: spawn, move, towers, then projectile impacts.
    fn tick(&mut self, dt: Duration, equations: &dyn EquationEngine, out: &mut Vec<Event>) {
        let delta = dt.as_secs_f32();
        let start = out.len();
        self.combat.spawn_enemies(delta, &mut self.movement, out);
        self.combat.update_enemies(delta, &mut self.movement, out);

        let mut context = DispatchContext {
            combat: &mut self.combat,
            crystals: &mut self.crystals,
            focus: self.focus,
            projectiles: &mut self.projectiles,
            equations,
            out: &mut *out,
        };
        let dispatch = &mut self.dispatch;
        self.towers
            .tick_towers(|towers| dispatch.update_towers(dt, towers, &mut context));

        self.cancel_orphaned_projectiles(&out[start..]);

        if self.combat.is_combat_active() {
            let landed = out.len();
            self.impacts.clear();
            self.projectiles.advance(dt, &mut self.impacts);
            deliver_impacts(&self.impacts, &mut self.combat, out);
            self.cancel_orphaned_projectiles(&out[landed..]);
        }
        self.release_stale_focus();
    }

    /// Drops projectiles homing on enemies that died or breached.
    fn cancel_orphaned_projectiles(&mut self, events: &[Event]) {
        for event in events {
            if let Event::EnemyKilled { enemy, .. } | Event::EnemyBreached { enemy, .. } = event {
                self.projectiles.cancel_for(*enemy);
            }
        }
    }

    fn release_stale_focus(&mut self) {
        if let Some(enemy) = self.focus.enemy {
            if self.combat.enemy(enemy).is_none() {
                self.focus.enemy = None;
            }
        }
        if let Some(crystal) = self.focus.crystal {
            if !self.crystals.iter().any(|candidate| candidate.id == crystal) {
                self.focus.crystal = None;
            }
        }
    }
}

/// Applies a gameplay command to the session.
///
/// Events produced by the command are appended to `out` and forwarded to the
/// session hooks, including the error sound of a rejected tower action.
pub fn apply(
    session: &mut Session,
    command: Command,
    out: &mut Vec<Event>,
) -> Result<(), SessionError> {
    let start = out.len();
    let result = session.execute(command, out);
    session.route_hooks(&out[start..]);
    result
}

/// Query functions that provide read-only access to the session state.
pub mod query {
    use thero_idle_core::{
        Crystal, Enemy, EnergyLedger, LevelConfig, Outcome, Tower, TowerId, TowerType,
    };
    use thero_idle_system_projectiles::Projectile;
    use thero_idle_system_tower_targeting::FocusState;

    use super::{ActiveLevel, Session};

    fn active(session: &Session) -> Option<&ActiveLevel> {
        session.active.as_ref()
    }

    /// Normalized configuration of the entered level.
    #[must_use]
    pub fn level(session: &Session) -> Option<&LevelConfig> {
        active(session).map(|active| &active.level)
    }

    /// Number of commanded ticks processed so far.
    #[must_use]
    pub fn tick_index(session: &Session) -> u64 {
        session.tick_index
    }

    /// Tower roster in placement order.
    #[must_use]
    pub fn towers(session: &Session) -> &[Tower] {
        match active(session) {
            Some(active) => active.towers.towers(),
            None => &[],
        }
    }

    /// Looks up one tower.
    #[must_use]
    pub fn tower(session: &Session, id: TowerId) -> Option<&Tower> {
        active(session).and_then(|active| active.towers.tower(id))
    }

    /// Supply links as `(source, target)` pairs.
    #[must_use]
    pub fn connections(session: &Session) -> Vec<(TowerId, TowerId)> {
        active(session)
            .map(|active| {
                active
                    .towers
                    .connections()
                    .iter()
                    .map(|(source, target)| (*source, *target))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Live enemies in spawn order.
    #[must_use]
    pub fn enemies(session: &Session) -> &[Enemy] {
        match active(session) {
            Some(active) => active.combat.enemies(),
            None => &[],
        }
    }

    /// Crystals still standing.
    #[must_use]
    pub fn crystals(session: &Session) -> &[Crystal] {
        match active(session) {
            Some(active) => &active.crystals,
            None => &[],
        }
    }

    /// Projectiles in flight.
    #[must_use]
    pub fn projectiles(session: &Session) -> &[Projectile] {
        match active(session) {
            Some(active) => active.projectiles.in_flight(),
            None => &[],
        }
    }

    /// Current player focus.
    #[must_use]
    pub fn focus(session: &Session) -> FocusState {
        active(session).map_or_else(FocusState::default, |active| active.focus)
    }

    /// Energy balance.
    #[must_use]
    pub fn energy(session: &Session) -> f64 {
        active(session).map_or(0.0, |active| active.combat.energy())
    }

    /// Lives left.
    #[must_use]
    pub fn lives(session: &Session) -> f64 {
        active(session).map_or(0.0, |active| active.combat.lives())
    }

    /// One-based display wave number.
    #[must_use]
    pub fn wave_number(session: &Session) -> u32 {
        active(session).map_or(0, |active| active.combat.wave_number())
    }

    /// Highest display wave number reached.
    #[must_use]
    pub fn max_wave_reached(session: &Session) -> u32 {
        active(session).map_or(0, |active| active.combat.max_wave_reached())
    }

    /// Terminal outcome, once resolved.
    #[must_use]
    pub fn outcome(session: &Session) -> Option<Outcome> {
        active(session).and_then(|active| active.combat.outcome())
    }

    /// Reports whether per-tick combat work runs.
    #[must_use]
    pub fn is_combat_active(session: &Session) -> bool {
        active(session).is_some_and(|active| active.combat.is_combat_active())
    }

    /// Status line left by the last rejected tower action.
    #[must_use]
    pub fn status_message(session: &Session) -> Option<&str> {
        active(session).and_then(|active| active.towers.status_message())
    }

    /// Energy a fresh placement of the type costs.
    #[must_use]
    pub fn quote_placement_cost(session: &Session, tower_type: TowerType) -> Option<f64> {
        active(session).and_then(|active| active.towers.quote_placement_cost(tower_type))
    }

    /// Energy upgrading the tower costs.
    #[must_use]
    pub fn quote_upgrade_cost(session: &Session, id: TowerId) -> Option<f64> {
        active(session).and_then(|active| active.towers.quote_upgrade_cost(id))
    }
}
