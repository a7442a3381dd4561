//! Callbacks through which a session reports lifecycle milestones to its host.

use glam::Vec2;
use thero_idle_core::{DefeatSummary, EnemyId, Event, TowerId, VictorySummary};

/// Figures handed to [`SessionHooks::on_victory`].
///
/// Reward formulas are the host's business; the session only reports the
/// inputs they depend on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VictoryReport {
    /// Combat summary captured when the last wave cleared.
    pub summary: VictorySummary,
    /// Towers standing at the end of the level.
    pub towers: usize,
    /// Lives left.
    pub lives: f64,
    /// Energy the session started combat with.
    pub start_energy: f64,
}

/// Figures handed to [`SessionHooks::on_defeat`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DefeatReport {
    /// Combat summary captured when lives ran out.
    pub summary: DefeatSummary,
    /// Towers standing at the end of the level.
    pub towers: usize,
}

/// Host callbacks invoked after the events that trigger them.
///
/// Every method defaults to a no-op so hosts implement only what they need.
pub trait SessionHooks {
    /// Combat started on the level.
    fn on_combat_start(&mut self, level: &str) {
        let _ = level;
    }

    /// Every wave of the level was cleared.
    fn on_victory(&mut self, level: &str, report: &VictoryReport) {
        let _ = (level, report);
    }

    /// Lives ran out.
    fn on_defeat(&mut self, level: &str, report: &DefeatReport) {
        let _ = (level, report);
    }

    /// A kill was credited to a tower.
    fn record_kill(&mut self, tower: TowerId) {
        let _ = tower;
    }

    /// A dying enemy rolled a thrall conversion.
    fn try_convert_enemy_to_chi_thrall(&mut self, enemy: EnemyId, position: Vec2, max_hp: f64) {
        let _ = (enemy, position, max_hp);
    }

    /// A dying enemy detonates a psi cluster.
    fn trigger_psi_cluster(&mut self, enemy: EnemyId, position: Vec2) {
        let _ = (enemy, position);
    }

    /// An enemy died and paid out `reward`.
    fn notify_enemy_death(&mut self, enemy: EnemyId, reward: f64) {
        let _ = (enemy, reward);
    }
}

/// Hooks that ignore every callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl SessionHooks for NoHooks {}

/// Snapshot of session state needed to build reports while routing events.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ReportContext {
    pub(crate) towers: usize,
    pub(crate) lives: f64,
    pub(crate) start_energy: f64,
}

/// Forwards the hook-worthy events of one command to the host.
pub(crate) fn route_events(
    hooks: &mut dyn SessionHooks,
    level: &str,
    context: ReportContext,
    events: &[Event],
) {
    for event in events {
        match event {
            Event::CombatStarted { level } => hooks.on_combat_start(level),
            Event::Victory(summary) => hooks.on_victory(
                level,
                &VictoryReport {
                    summary: *summary,
                    towers: context.towers,
                    lives: context.lives,
                    start_energy: context.start_energy,
                },
            ),
            Event::Defeat(summary) => hooks.on_defeat(
                level,
                &DefeatReport {
                    summary: *summary,
                    towers: context.towers,
                },
            ),
            Event::KillAttributed { tower, .. } => hooks.record_kill(*tower),
            Event::ChiConversionRequested {
                enemy,
                position,
                max_hp,
            } => hooks.try_convert_enemy_to_chi_thrall(*enemy, *position, *max_hp),
            Event::PsiClusterTriggered { enemy, position } => {
                hooks.trigger_psi_cluster(*enemy, *position)
            }
            Event::EnemyKilled { enemy, reward, .. } => hooks.notify_enemy_death(*enemy, *reward),
            _ => {}
        }
    }
}
