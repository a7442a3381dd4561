#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that resolves tower targets from combat snapshots.
//!
//! Resolution order, first match wins: the tower's manual target, the
//! globally focused enemy (ignored by sentinel towers), the focused crystal,
//! the best enemy under the tower's priority policy and finally, when the
//! caller allows it, an allied sigma tower that absorbs incoming fire.

use glam::Vec2;
use thero_idle_core::{
    BehaviorMode, Crystal, CrystalId, Enemy, EnemyId, TargetPriority, TargetRef, Tower, TowerId,
};

/// Globally focused targets selected by the player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FocusState {
    /// Enemy every pursuit tower prefers while it is in range.
    pub enemy: Option<EnemyId>,
    /// Crystal every tower prefers while it is in range.
    pub crystal: Option<CrystalId>,
}

/// Allied sigma tower that other towers may fire into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SigmaCandidate {
    /// Identifier of the sigma tower.
    pub tower: TowerId,
    /// Pixel position of the sigma tower.
    pub position: Vec2,
}

/// Read-only combat snapshot consumed by target resolution.
#[derive(Clone, Copy, Debug)]
pub struct TargetingView<'a> {
    /// Live enemies.
    pub enemies: &'a [Enemy],
    /// Crystal objectives.
    pub crystals: &'a [Crystal],
    /// Sigma towers available as fallback targets.
    pub sigma_towers: &'a [SigmaCandidate],
    /// Player focus.
    pub focus: FocusState,
}

/// Switches controlling optional resolution steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TargetOptions {
    /// Fall back to sigma towers when nothing hostile qualifies.
    pub allow_sigma: bool,
}

/// Resolved target with its geometry relative to the tower.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetInfo {
    /// What the tower aims at.
    pub target: TargetRef,
    /// Pixel position of the target.
    pub position: Vec2,
    /// Pixel distance from the tower.
    pub distance: f32,
}

/// Tower targeting system that reuses scratch buffers when ranking enemies.
#[derive(Debug, Default)]
pub struct TowerTargeting {
    ranking: Vec<RankedEnemy>,
}

impl TowerTargeting {
    /// Creates a new targeting system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the target a tower fires at this tick.
    ///
    /// A manual target that died, vanished or left range is cleared from the
    /// tower and resolution continues with the next step.
    pub fn find_target(
        &mut self,
        tower: &mut Tower,
        view: &TargetingView<'_>,
        options: TargetOptions,
    ) -> Option<TargetInfo> {
        if let Some(manual) = tower.manual_target {
            match enemy_in_range(tower, view.enemies, manual) {
                Some(info) => return Some(info),
                None => tower.manual_target = None,
            }
        }

        if tower.behavior_mode != BehaviorMode::Sentinel {
            if let Some(info) = view
                .focus
                .enemy
                .and_then(|focused| enemy_in_range(tower, view.enemies, focused))
            {
                return Some(info);
            }
        }

        if let Some(focused) = view.focus.crystal {
            let crystal = view
                .crystals
                .iter()
                .find(|crystal| crystal.id == focused && crystal.integrity > 0.0);
            if let Some(crystal) = crystal.filter(|crystal| tower.in_range(crystal.position)) {
                return Some(TargetInfo {
                    target: TargetRef::Crystal(crystal.id),
                    position: crystal.position,
                    distance: tower.distance_to(crystal.position),
                });
            }
        }

        if let Some(best) = self.best_enemy(tower, view.enemies) {
            return Some(best);
        }

        if options.allow_sigma {
            return nearest_sigma(tower, view.sigma_towers);
        }
        None
    }

    /// Best in-range enemy under the tower's priority policy.
    pub fn best_enemy(&mut self, tower: &Tower, enemies: &[Enemy]) -> Option<TargetInfo> {
        self.rank_enemies(tower, enemies, 1).first().copied()
    }

    /// Ranks in-range enemies under the tower's priority policy.
    ///
    /// `first` prefers the highest progress; `strongest` and `weakest` compare
    /// hit points, breaking ties by highest progress. Remaining ties go to the
    /// lower enemy id. At most `limit` entries are returned.
    pub fn rank_enemies(
        &mut self,
        tower: &Tower,
        enemies: &[Enemy],
        limit: usize,
    ) -> Vec<TargetInfo> {
        self.ranking.clear();
        for enemy in enemies {
            if !enemy.is_targetable() || !tower.in_range(enemy.position) {
                continue;
            }
            self.ranking.push(RankedEnemy {
                id: enemy.id,
                hp: enemy.hp,
                progress: enemy.progress,
                position: enemy.position,
                distance: tower.distance_to(enemy.position),
            });
        }

        let priority = tower.target_priority;
        self.ranking.sort_by(|a, b| a.ordering(b, priority));
        self.ranking
            .iter()
            .take(limit)
            .map(|ranked| TargetInfo {
                target: TargetRef::Enemy(ranked.id),
                position: ranked.position,
                distance: ranked.distance,
            })
            .collect()
    }
}

fn enemy_in_range(tower: &Tower, enemies: &[Enemy], id: EnemyId) -> Option<TargetInfo> {
    let enemy = enemies.iter().find(|enemy| enemy.id == id)?;
    if !enemy.is_targetable() || !tower.in_range(enemy.position) {
        return None;
    }
    Some(TargetInfo {
        target: TargetRef::Enemy(enemy.id),
        position: enemy.position,
        distance: tower.distance_to(enemy.position),
    })
}

fn nearest_sigma(tower: &Tower, candidates: &[SigmaCandidate]) -> Option<TargetInfo> {
    candidates
        .iter()
        .filter(|candidate| candidate.tower != tower.id && tower.in_range(candidate.position))
        .map(|candidate| (candidate, tower.distance_to(candidate.position)))
        .min_by(|(a, a_distance), (b, b_distance)| {
            a_distance
                .total_cmp(b_distance)
                .then_with(|| a.tower.cmp(&b.tower))
        })
        .map(|(candidate, distance)| TargetInfo {
            target: TargetRef::Sigma(candidate.tower),
            position: candidate.position,
            distance,
        })
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct RankedEnemy {
    id: EnemyId,
    hp: f64,
    progress: f32,
    position: Vec2,
    distance: f32,
}

impl RankedEnemy {
    fn ordering(&self, other: &Self, priority: TargetPriority) -> std::cmp::Ordering {
        let by_progress = other.progress.total_cmp(&self.progress);
        let primary = match priority {
            TargetPriority::First => by_progress,
            TargetPriority::Strongest => other.hp.total_cmp(&self.hp).then(by_progress),
            TargetPriority::Weakest => self.hp.total_cmp(&other.hp).then(by_progress),
        };
        primary.then_with(|| self.id.cmp(&other.id))
    }
}
