//! Drives a session through a scenario until the level resolves.

use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use glam::Vec2;
use thero_idle_core::{EnemyId, Event, Outcome, StandardCatalog, TowerId};
use thero_idle_session::{
    apply, query, Command, PlacementOptions, Session, SessionCheckpoint, SessionConfig,
    SessionError, SessionHooks, StartOptions,
};
use thero_idle_system_tower_orchestration::TowerActionError;
use tracing::{debug, info, warn};

use crate::{
    catalog_file,
    scenario::{Scenario, ScriptedLink},
};

/// Per-run tallies collected through the session hooks.
#[derive(Debug, Default)]
struct Tally {
    kills: BTreeMap<TowerId, u32>,
    deaths: u32,
    rewards: f64,
}

struct TallyHooks(Rc<RefCell<Tally>>);

impl SessionHooks for TallyHooks {
    fn record_kill(&mut self, tower: TowerId) {
        *self.0.borrow_mut().kills.entry(tower).or_insert(0) += 1;
    }

    fn notify_enemy_death(&mut self, _enemy: EnemyId, reward: f64) {
        let mut tally = self.0.borrow_mut();
        tally.deaths += 1;
        tally.rewards += reward;
    }
}

/// Result of a scenario run.
#[derive(Debug)]
pub(crate) struct RunReport {
    pub(crate) level: String,
    pub(crate) outcome: Option<Outcome>,
    pub(crate) ticks: u64,
    pub(crate) wave: u32,
    pub(crate) lives: f64,
    pub(crate) energy: f64,
    pub(crate) towers: usize,
    pub(crate) deaths: u32,
    pub(crate) rewards: f64,
    pub(crate) kills: BTreeMap<TowerId, u32>,
    pub(crate) checkpoint: SessionCheckpoint,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            Some(Outcome::Victory) => "victory",
            Some(Outcome::Defeat) => "defeat",
            None => "unresolved",
        };
        writeln!(f, "level {}: {outcome} after {} ticks", self.level, self.ticks)?;
        writeln!(
            f,
            "wave {} | lives {} | energy {:.1} | towers {}",
            self.wave, self.lives, self.energy, self.towers
        )?;
        write!(
            f,
            "enemies defeated {} for {:.1} energy",
            self.deaths, self.rewards
        )?;
        for (tower, kills) in &self.kills {
            write!(f, "\n  {tower}: {kills} kills")?;
        }
        Ok(())
    }
}

/// Scripted placement waiting for its time and energy.
#[derive(Debug)]
struct Pending {
    index: usize,
    attempted: bool,
}

/// Plays `scenario`, optionally resuming from `checkpoint`.
///
/// Scripted placements are skipped when a checkpoint supplies the roster.
pub(crate) fn run(
    scenario: &Scenario,
    checkpoint: Option<&SessionCheckpoint>,
    max_ticks: Option<u32>,
) -> Result<RunReport> {
    let catalog = match &scenario.catalog {
        Some(path) => catalog_file::load(path)?,
        None => StandardCatalog::default(),
    };
    let mut config = SessionConfig::default();
    if let Some(viewport) = scenario.viewport {
        config.viewport = viewport;
    }

    let tally = Rc::new(RefCell::new(Tally::default()));
    let mut session = Session::new(config, Arc::new(catalog))
        .context("failed to configure the session")?
        .with_hooks(Box::new(TallyHooks(Rc::clone(&tally))));
    session
        .enter_level(&scenario.level)
        .with_context(|| format!("failed to enter level `{}`", scenario.level.id))?;

    let mut out = Vec::new();
    let mut pending: Vec<Pending> = Vec::new();
    match checkpoint {
        Some(checkpoint) => {
            session
                .restore(checkpoint, &mut out)
                .context("failed to restore checkpoint")?;
            info!(
                target: "thero_idle::session",
                level = %checkpoint.level,
                wave_index = checkpoint.wave_index,
                towers = checkpoint.towers.len(),
                "checkpoint restored"
            );
        }
        None => {
            apply(
                &mut session,
                Command::StartCombat(StartOptions {
                    starting_energy: scenario.starting_energy,
                    endless: scenario.endless,
                    ..StartOptions::default()
                }),
                &mut out,
            )?;
            pending = (0..scenario.placements.len())
                .map(|index| Pending {
                    index,
                    attempted: false,
                })
                .collect();
        }
    }

    let step = Duration::from_secs_f32(scenario.tick_seconds);
    let limit = max_ticks.unwrap_or(scenario.max_ticks);
    let mut placed: BTreeMap<usize, TowerId> = BTreeMap::new();
    let mut links: Vec<_> = scenario.links.clone();
    let mut elapsed = 0.0_f32;

    for _ in 0..limit {
        if query::outcome(&session).is_some() {
            break;
        }
        place_due(&mut session, scenario, elapsed, &mut pending, &mut placed, &mut out);
        connect_ready(&mut session, &mut links, &placed, &mut out);

        apply(&mut session, Command::Tick { dt: step }, &mut out)?;
        elapsed += scenario.tick_seconds;
        out.clear();
    }

    let tally = tally.borrow();
    let report = RunReport {
        level: scenario.level.id.clone(),
        outcome: query::outcome(&session),
        ticks: query::tick_index(&session),
        wave: query::max_wave_reached(&session),
        lives: query::lives(&session),
        energy: query::energy(&session),
        towers: query::towers(&session).len(),
        deaths: tally.deaths,
        rewards: tally.rewards,
        kills: tally.kills.clone(),
        checkpoint: session.checkpoint()?,
    };
    info!(
        target: "thero_idle::session",
        level = %report.level,
        outcome = ?report.outcome,
        ticks = report.ticks,
        "run finished"
    );
    Ok(report)
}

/// Places every due placement the balance covers; unaffordable ones wait for later ticks.
fn place_due(
    session: &mut Session,
    scenario: &Scenario,
    elapsed: f32,
    pending: &mut Vec<Pending>,
    placed: &mut BTreeMap<usize, TowerId>,
    out: &mut Vec<Event>,
) {
    pending.retain_mut(|entry| {
        let placement = scenario.placements[entry.index];
        if placement.at > elapsed {
            return true;
        }
        let start = out.len();
        let result = apply(
            session,
            Command::PlaceTower {
                normalized: Vec2::new(placement.x, placement.y),
                options: PlacementOptions {
                    tower_type: Some(placement.tower),
                    slot_id: placement.slot,
                    auto_anchor: true,
                },
            },
            out,
        );
        match result {
            Ok(()) => {
                if let Some(tower) = placed_tower(&out[start..]) {
                    let _ = placed.insert(entry.index, tower);
                }
                debug!(
                    target: "thero_idle::session",
                    placement = entry.index,
                    tower_type = %placement.tower,
                    "scripted placement applied"
                );
                false
            }
            Err(SessionError::Tower(TowerActionError::InsufficientEnergy { deficit, .. })) => {
                if !entry.attempted {
                    debug!(
                        target: "thero_idle::session",
                        placement = entry.index,
                        deficit,
                        "scripted placement waiting for energy"
                    );
                    entry.attempted = true;
                }
                true
            }
            Err(error) => {
                warn!(
                    target: "thero_idle::session",
                    placement = entry.index,
                    %error,
                    "scripted placement dropped"
                );
                false
            }
        }
    });
}

fn placed_tower(events: &[Event]) -> Option<TowerId> {
    events.iter().rev().find_map(|event| match event {
        Event::TowerPlaced { tower, .. } | Event::TowerMerged { tower, .. } => Some(*tower),
        _ => None,
    })
}

/// Connects every link whose endpoints are both on the battlefield.
fn connect_ready(
    session: &mut Session,
    links: &mut Vec<ScriptedLink>,
    placed: &BTreeMap<usize, TowerId>,
    out: &mut Vec<Event>,
) {
    links.retain(|link| {
        let (Some(source), Some(target)) = (placed.get(&link.source), placed.get(&link.target))
        else {
            return true;
        };
        if let Err(error) = apply(
            session,
            Command::Connect {
                source: *source,
                target: *target,
            },
            out,
        ) {
            warn!(
                target: "thero_idle::session",
                supplier = %source,
                receiver = %target,
                %error,
                "scripted link dropped"
            );
        }
        false
    });
}
