#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tower lifecycle controller owning the roster and the supply-chain graph.
//!
//! Every mutating action validates completely before touching state. A
//! refused action pushes [`SoundCue::Error`], stores the error text as the
//! status message and returns the error; nothing else changes.

mod error;
mod placement;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use glam::Vec2;
use thero_idle_core::{
    BehaviorMode, CheckpointError, EnemyId, EnergyLedger, Event, PlacementRequest,
    PlacementValidator, SoundCue, TargetPriority, Tower, TowerCatalog, TowerDefinition, TowerId,
    TowerRecord, TowerType, Viewport,
};
use tracing::debug;

pub use error::{ConfigError, TowerActionError};
pub use placement::{Loadout, PathClearance};

/// Ordered supplier/receiver pairs allowed to form a supply link.
pub const SUPPLY_PAIRS: [(TowerType, TowerType); 5] = [
    (TowerType::Alpha, TowerType::Beta),
    (TowerType::Beta, TowerType::Gamma),
    (TowerType::Alpha, TowerType::Iota),
    (TowerType::Beta, TowerType::Iota),
    (TowerType::Gamma, TowerType::Iota),
];

/// Tuning values for the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Normalized distance within which a placement lands on an existing tower.
    pub merge_radius: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self { merge_radius: 0.04 }
    }
}

/// Caller-selected details of a placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlacementOptions {
    /// Explicit type; falls back to the dragged type and then the loadout.
    pub tower_type: Option<TowerType>,
    /// Anchor slot the tower occupies.
    pub slot_id: Option<u32>,
    /// Scripted placement that skips the loadout check.
    pub auto_anchor: bool,
}

/// Result of a successful demotion request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DemoteOutcome {
    /// The tower moved down one tier.
    Demoted {
        /// Type after the demotion.
        to: TowerType,
    },
    /// The tower sat at the base tier and was sold instead.
    Sold {
        /// Energy refunded by the sale.
        refund: f64,
    },
}

/// Controller owning the tower roster, the connection maps and the loadout.
#[derive(Debug)]
pub struct TowerOrchestration {
    config: Config,
    catalog: Arc<dyn TowerCatalog>,
    validator: Box<dyn PlacementValidator>,
    viewport: Option<Viewport>,
    towers: Vec<Tower>,
    next_tower_id: u32,
    connections: BTreeMap<TowerId, TowerId>,
    connection_sources: BTreeMap<TowerId, BTreeSet<TowerId>>,
    infinity_towers: BTreeSet<TowerId>,
    loadout: Loadout,
    dragging: Option<TowerType>,
    open_menu: Option<TowerId>,
    status_message: Option<String>,
    occupied_slots: BTreeMap<u32, TowerId>,
    placements: Vec<PlacedTower>,
}

/// Controller-owned fields of a tower, held across a dispatcher tick.
#[derive(Clone, Copy, Debug)]
struct PlacedTower {
    id: TowerId,
    tower_type: TowerType,
    tier: u32,
    normalized: Vec2,
    position: Vec2,
    slot_id: Option<u32>,
    base_damage: f64,
    base_rate: f32,
    base_range: f32,
}

impl PlacedTower {
    fn capture(tower: &Tower) -> Self {
        Self {
            id: tower.id,
            tower_type: tower.tower_type,
            tier: tower.tier,
            normalized: tower.normalized,
            position: tower.position,
            slot_id: tower.slot_id,
            base_damage: tower.base_damage,
            base_rate: tower.base_rate,
            base_range: tower.base_range,
        }
    }

    fn reinstate(&self, tower: &mut Tower) {
        tower.id = self.id;
        tower.tower_type = self.tower_type;
        tower.tier = self.tier;
        tower.normalized = self.normalized;
        tower.position = self.position;
        tower.slot_id = self.slot_id;
        tower.base_damage = self.base_damage;
        tower.base_rate = self.base_rate;
        tower.base_range = self.base_range;
    }
}

enum PlacementPlan {
    Merge {
        index: usize,
        next: TowerDefinition,
        cost: f64,
    },
    Fresh {
        definition: TowerDefinition,
        cost: f64,
    },
}

impl TowerOrchestration {
    /// Creates a controller around its required collaborators.
    ///
    /// Fails when the catalog is empty; a controller without definitions
    /// cannot perform any action.
    pub fn new(
        config: Config,
        catalog: Arc<dyn TowerCatalog>,
        validator: Box<dyn PlacementValidator>,
    ) -> Result<Self, ConfigError> {
        if catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        Ok(Self {
            config,
            catalog,
            validator,
            viewport: None,
            towers: Vec::new(),
            next_tower_id: 1,
            connections: BTreeMap::new(),
            connection_sources: BTreeMap::new(),
            infinity_towers: BTreeSet::new(),
            loadout: Loadout::default(),
            dragging: None,
            open_menu: None,
            status_message: None,
            occupied_slots: BTreeMap::new(),
            placements: Vec::new(),
        })
    }

    /// Opens the battlefield for tower actions.
    pub fn activate(&mut self, viewport: Viewport) -> Result<(), ConfigError> {
        ensure_viewport(viewport)?;
        self.viewport = Some(viewport);
        for tower in &mut self.towers {
            tower.relocate(viewport);
        }
        Ok(())
    }

    /// Closes the battlefield and clears the roster.
    ///
    /// Identifiers keep counting up so towers of different levels never share one.
    pub fn deactivate(&mut self) {
        self.viewport = None;
        self.towers.clear();
        self.connections.clear();
        self.connection_sources.clear();
        self.infinity_towers.clear();
        self.occupied_slots.clear();
        self.dragging = None;
        self.open_menu = None;
        self.status_message = None;
    }

    /// Updates the battlefield dimensions and recomputes pixel geometry.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), ConfigError> {
        ensure_viewport(viewport)?;
        if self.viewport.is_some() {
            self.viewport = Some(viewport);
            for tower in &mut self.towers {
                tower.relocate(viewport);
            }
        }
        Ok(())
    }

    /// Places a tower, merging into an existing same-type tower at the spot.
    pub fn add_tower_at<L: EnergyLedger + ?Sized>(
        &mut self,
        normalized: Vec2,
        options: PlacementOptions,
        ledger: &mut L,
        out: &mut Vec<Event>,
    ) -> Result<TowerId, TowerActionError> {
        let (plan, viewport) = match self.plan_placement(normalized, options, ledger.energy()) {
            Ok(planned) => planned,
            Err(error) => return Err(self.reject(error, out)),
        };

        match plan {
            PlacementPlan::Merge { index, next, cost } => {
                ledger.set_energy(ledger.energy() - cost);
                let tower = &mut self.towers[index];
                let id = tower.id;
                let from = tower.tower_type;
                tower.apply_definition(&next, viewport);
                tower.cost_history.push(cost);
                debug!(
                    target: "thero_idle::towers",
                    tower = %id,
                    from = %from,
                    to = %next.tower_type,
                    cost,
                    "towers merged"
                );
                out.push(Event::TowerMerged {
                    tower: id,
                    from,
                    to: next.tower_type,
                    cost,
                });
                self.after_tier_change(id, from, next.tower_type, out);
                out.push(Event::Sound(SoundCue::TowerMerged));
                Ok(id)
            }
            PlacementPlan::Fresh { definition, cost } => {
                ledger.set_energy(ledger.energy() - cost);
                let id = TowerId::new(self.next_tower_id);
                self.next_tower_id += 1;
                let mut tower = Tower::from_definition(id, &definition, normalized, viewport);
                tower.slot_id = options.slot_id;
                tower.cost_history.push(cost);
                if let Some(slot) = options.slot_id {
                    let _ = self.occupied_slots.insert(slot, id);
                }
                if tower.tower_type == TowerType::Infinity {
                    let _ = self.infinity_towers.insert(id);
                }
                debug!(
                    target: "thero_idle::towers",
                    tower = %id,
                    tower_type = %tower.tower_type,
                    cost,
                    "tower placed"
                );
                out.push(Event::TowerPlaced {
                    tower: id,
                    tower_type: tower.tower_type,
                    cost,
                });
                out.push(Event::Sound(SoundCue::TowerPlaced));
                self.towers.push(tower);
                Ok(id)
            }
        }
    }

    /// Moves a tower to the next tier of its chain.
    ///
    /// `quoted_cost` reuses a cost already shown to the player; otherwise the
    /// catalog prices the next tier.
    pub fn upgrade_tower_tier<L: EnergyLedger + ?Sized>(
        &mut self,
        id: TowerId,
        quoted_cost: Option<f64>,
        ledger: &mut L,
        out: &mut Vec<Event>,
    ) -> Result<TowerType, TowerActionError> {
        let plan = self.plan_upgrade(id, quoted_cost, ledger.energy());
        let (index, next, cost, viewport) = match plan {
            Ok(plan) => plan,
            Err(error) => return Err(self.reject(error, out)),
        };

        ledger.set_energy(ledger.energy() - cost);
        let tower = &mut self.towers[index];
        let from = tower.tower_type;
        tower.apply_definition(&next, viewport);
        tower.cost_history.push(cost);
        debug!(
            target: "thero_idle::towers",
            tower = %id,
            from = %from,
            to = %next.tower_type,
            cost,
            "tower upgraded"
        );
        out.push(Event::TowerUpgraded {
            tower: id,
            from,
            to: next.tower_type,
            cost,
        });
        self.after_tier_change(id, from, next.tower_type, out);
        out.push(Event::Sound(SoundCue::TowerUpgraded));
        Ok(next.tower_type)
    }

    /// Moves a tower down one tier, or sells it when it sits at the base tier.
    ///
    /// The most recent cost entry is refunded and the lower tier's current
    /// entry cost is charged; the refunded balance is capped before the
    /// charge is checked.
    pub fn demote_tower_tier<L: EnergyLedger + ?Sized>(
        &mut self,
        id: TowerId,
        ledger: &mut L,
        out: &mut Vec<Event>,
    ) -> Result<DemoteOutcome, TowerActionError> {
        let Some(index) = self.index_of(id) else {
            return Err(self.reject(TowerActionError::MissingTower(id), out));
        };
        let tower_type = self.towers[index].tower_type;
        if self.catalog.previous_tier(tower_type).is_none() && self.towers[index].tier <= 1 {
            let refund = self.sell_tower(id, ledger, out)?;
            return Ok(DemoteOutcome::Sold { refund });
        }

        let plan = self.plan_demotion(index, ledger.energy(), ledger.energy_cap());
        let (previous, refund, entry, available, viewport) = match plan {
            Ok(plan) => plan,
            Err(error) => return Err(self.reject(error, out)),
        };

        ledger.set_energy(available - entry);
        let tower = &mut self.towers[index];
        let _ = tower.cost_history.pop();
        match tower.cost_history.last_mut() {
            Some(top) => *top = entry,
            None => tower.cost_history.push(entry),
        }
        tower.apply_definition(&previous, viewport);
        debug!(
            target: "thero_idle::towers",
            tower = %id,
            from = %tower_type,
            to = %previous.tower_type,
            refund,
            cost = entry,
            "tower demoted"
        );
        out.push(Event::TowerDemoted {
            tower: id,
            from: tower_type,
            to: previous.tower_type,
            refund,
            cost: entry,
        });
        self.after_tier_change(id, tower_type, previous.tower_type, out);
        out.push(Event::Sound(SoundCue::TowerDemoted));
        Ok(DemoteOutcome::Demoted {
            to: previous.tower_type,
        })
    }

    /// Removes a tower and refunds it. Returns the refunded energy.
    pub fn sell_tower<L: EnergyLedger + ?Sized>(
        &mut self,
        id: TowerId,
        ledger: &mut L,
        out: &mut Vec<Event>,
    ) -> Result<f64, TowerActionError> {
        if self.viewport.is_none() {
            return Err(self.reject(TowerActionError::NoActiveLevel, out));
        }
        let Some(index) = self.index_of(id) else {
            return Err(self.reject(TowerActionError::MissingTower(id), out));
        };

        self.remove_all_connections_for_tower(id, out);
        if self.open_menu == Some(id) {
            self.open_menu = None;
        }
        let mut tower = self.towers.remove(index);
        let _ = tower.behavior.teardown();
        out.push(Event::BehaviorTornDown {
            tower: id,
            tower_type: tower.tower_type,
        });
        let _ = self.infinity_towers.remove(&id);
        if let Some(slot) = tower.slot_id {
            let _ = self.occupied_slots.remove(&slot);
        }

        let refund = self.catalog.sell_refund(&tower).max(0.0);
        let energy = ledger.energy();
        ledger.set_energy((energy + refund).min(ledger.energy_cap().max(energy)));
        debug!(
            target: "thero_idle::towers",
            tower = %id,
            tower_type = %tower.tower_type,
            refund,
            "tower sold"
        );
        out.push(Event::TowerSold {
            tower: id,
            tower_type: tower.tower_type,
            refund,
        });
        out.push(Event::Sound(SoundCue::TowerSold));
        Ok(refund)
    }

    /// Reports whether `source` may supply shots to `target`.
    ///
    /// The pair must be allowed, both towers need a positive range and each
    /// must reach the other.
    #[must_use]
    pub fn are_towers_connection_compatible(&self, source: TowerId, target: TowerId) -> bool {
        if source == target {
            return false;
        }
        let (Some(supplier), Some(receiver)) = (self.tower(source), self.tower(target)) else {
            return false;
        };
        if !SUPPLY_PAIRS.contains(&(supplier.tower_type, receiver.tower_type)) {
            return false;
        }
        if supplier.range <= 0.0 || receiver.range <= 0.0 {
            return false;
        }
        let distance = supplier.distance_to(receiver.position);
        distance <= supplier.range && distance <= receiver.range
    }

    /// Links `source` to `target`, replacing any other outgoing link of `source`.
    pub fn add_tower_connection(
        &mut self,
        source: TowerId,
        target: TowerId,
        out: &mut Vec<Event>,
    ) -> Result<(), TowerActionError> {
        for id in [source, target] {
            if self.index_of(id).is_none() {
                return Err(self.reject(TowerActionError::MissingTower(id), out));
            }
        }
        if !self.are_towers_connection_compatible(source, target) {
            let error = TowerActionError::IncompatibleConnection {
                supplier: source,
                receiver: target,
            };
            return Err(self.reject(error, out));
        }
        if self.connections.get(&source) == Some(&target) {
            return Ok(());
        }
        if let Some(previous) = self.connections.get(&source).copied() {
            let _ = self.unlink(source, previous, out);
        }

        let _ = self.connections.insert(source, target);
        let _ = self
            .connection_sources
            .entry(target)
            .or_default()
            .insert(source);
        if let Some(supplier) = self.tower_mut(source) {
            supplier.link_target = Some(target);
        }
        if let Some(receiver) = self.tower_mut(target) {
            let _ = receiver.link_sources.insert(source);
        }
        self.refresh_supplier_state(target);
        debug!(
            target: "thero_idle::towers",
            supplier = %source,
            receiver = %target,
            "towers connected"
        );
        out.push(Event::TowerConnected { source, target });
        Ok(())
    }

    /// Removes the link from `source` to `target`. Returns `false` when absent.
    pub fn remove_tower_connection(
        &mut self,
        source: TowerId,
        target: TowerId,
        out: &mut Vec<Event>,
    ) -> bool {
        self.unlink(source, target, out)
    }

    /// Removes the outgoing link of a tower and every link feeding it.
    pub fn remove_all_connections_for_tower(&mut self, id: TowerId, out: &mut Vec<Event>) {
        if let Some(target) = self.connections.get(&id).copied() {
            let _ = self.unlink(id, target, out);
        }
        let sources: Vec<_> = self
            .connection_sources
            .get(&id)
            .map(|sources| sources.iter().copied().collect())
            .unwrap_or_default();
        for source in sources {
            let _ = self.unlink(source, id, out);
        }
    }

    /// Energy required to place a tower of the provided type now.
    #[must_use]
    pub fn quote_placement_cost(&self, tower_type: TowerType) -> Option<f64> {
        self.catalog
            .action_cost(tower_type, self.tower_count_of(tower_type))
    }

    /// Energy required to upgrade the tower now, if it can be upgraded.
    #[must_use]
    pub fn quote_upgrade_cost(&self, id: TowerId) -> Option<f64> {
        let tower = self.tower(id)?;
        let next = self.catalog.next_tier(tower.tower_type)?;
        self.quote_placement_cost(next)
    }

    /// Captures the roster as plain records.
    #[must_use]
    pub fn checkpoint(&self) -> Vec<TowerRecord> {
        self.towers.iter().map(TowerRecord::capture).collect()
    }

    /// Replaces the roster with checkpointed records and relinks the graph.
    ///
    /// Records are validated before anything is replaced.
    pub fn restore_towers_from_checkpoint(
        &mut self,
        records: &[TowerRecord],
    ) -> Result<(), CheckpointError> {
        let viewport = self.viewport.ok_or(CheckpointError::NoActiveLevel)?;
        let mut ids = BTreeSet::new();
        for record in records {
            if !ids.insert(record.id) {
                return Err(CheckpointError::DuplicateTower(record.id));
            }
            if self.catalog.definition(record.tower_type).is_none() {
                return Err(CheckpointError::UnknownDefinition(record.tower_type));
            }
        }
        for record in records {
            if let Some(target) = record.link_target_id {
                if !ids.contains(&target) || target == record.id {
                    return Err(CheckpointError::DanglingLink {
                        tower: record.id,
                        target,
                    });
                }
            }
        }

        self.towers = records
            .iter()
            .map(|record| record.to_tower(viewport))
            .collect();
        self.connections.clear();
        self.connection_sources.clear();
        self.infinity_towers.clear();
        self.occupied_slots.clear();
        self.open_menu = None;

        for record in records {
            if let Some(target) = record.link_target_id {
                let _ = self.connections.insert(record.id, target);
                let _ = self
                    .connection_sources
                    .entry(target)
                    .or_default()
                    .insert(record.id);
            }
        }
        for tower in &mut self.towers {
            tower.link_target = self.connections.get(&tower.id).copied();
            tower.link_sources = self
                .connection_sources
                .get(&tower.id)
                .cloned()
                .unwrap_or_default();
            if tower.tower_type == TowerType::Infinity {
                let _ = self.infinity_towers.insert(tower.id);
            }
            if let Some(slot) = tower.slot_id {
                let _ = self.occupied_slots.insert(slot, tower.id);
            }
        }
        let highest = records.iter().map(|record| record.id.get()).max();
        if let Some(highest) = highest {
            self.next_tower_id = self.next_tower_id.max(highest + 1);
        }
        debug!(
            target: "thero_idle::towers",
            towers = self.towers.len(),
            links = self.connections.len(),
            "roster restored"
        );
        Ok(())
    }

    /// Changes how a tower ranks enemies.
    pub fn set_target_priority(
        &mut self,
        id: TowerId,
        priority: TargetPriority,
    ) -> Result<(), TowerActionError> {
        let tower = self
            .tower_mut(id)
            .ok_or(TowerActionError::MissingTower(id))?;
        tower.target_priority = priority;
        Ok(())
    }

    /// Changes a tower's behavior mode.
    pub fn set_behavior_mode(
        &mut self,
        id: TowerId,
        mode: BehaviorMode,
    ) -> Result<(), TowerActionError> {
        let tower = self
            .tower_mut(id)
            .ok_or(TowerActionError::MissingTower(id))?;
        tower.behavior_mode = mode;
        Ok(())
    }

    /// Pins or clears the enemy a tower prefers.
    pub fn set_manual_target(
        &mut self,
        id: TowerId,
        enemy: Option<EnemyId>,
    ) -> Result<(), TowerActionError> {
        let tower = self
            .tower_mut(id)
            .ok_or(TowerActionError::MissingTower(id))?;
        tower.manual_target = enemy;
        Ok(())
    }

    /// Opens the tower menu for a tower.
    pub fn open_tower_menu(&mut self, id: TowerId) -> Result<(), TowerActionError> {
        if self.index_of(id).is_none() {
            return Err(TowerActionError::MissingTower(id));
        }
        self.open_menu = Some(id);
        Ok(())
    }

    /// Closes the tower menu.
    pub fn close_tower_menu(&mut self) {
        self.open_menu = None;
    }

    /// Tower whose menu is open.
    #[must_use]
    pub fn open_menu(&self) -> Option<TowerId> {
        self.open_menu
    }

    /// Sets the type currently dragged from the loadout.
    pub fn set_dragging(&mut self, tower_type: Option<TowerType>) {
        self.dragging = tower_type;
    }

    /// Type currently dragged from the loadout.
    #[must_use]
    pub fn dragging(&self) -> Option<TowerType> {
        self.dragging
    }

    /// Player loadout.
    #[must_use]
    pub fn loadout(&self) -> &Loadout {
        &self.loadout
    }

    /// Mutable access to the player loadout.
    pub fn loadout_mut(&mut self) -> &mut Loadout {
        &mut self.loadout
    }

    /// Short text describing the last refused action.
    #[must_use]
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Clears the status message.
    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    /// Reports whether a level is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.viewport.is_some()
    }

    /// Battlefield dimensions of the active level.
    #[must_use]
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Configuration of the controller.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tower catalog shared with the controller.
    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn TowerCatalog> {
        &self.catalog
    }

    /// Towers in placement order.
    #[must_use]
    pub fn towers(&self) -> &[Tower] {
        &self.towers
    }

    /// Hands the roster to the per-tick dispatcher.
    ///
    /// `tick` may change runtime state such as cooldowns, effective stats,
    /// stored shots and behavior state. Identity, tier, placement and link
    /// fields are reinstated from the controller's records once it returns.
    pub fn tick_towers<R>(&mut self, tick: impl FnOnce(&mut [Tower]) -> R) -> R {
        self.placements.clear();
        self.placements.extend(self.towers.iter().map(PlacedTower::capture));
        let result = tick(&mut self.towers);
        for (tower, placed) in self.towers.iter_mut().zip(&self.placements) {
            placed.reinstate(tower);
            tower.link_target = self.connections.get(&tower.id).copied();
            match self.connection_sources.get(&tower.id) {
                Some(sources) if tower.link_sources != *sources => {
                    tower.link_sources.clone_from(sources);
                }
                None if !tower.link_sources.is_empty() => tower.link_sources.clear(),
                _ => {}
            }
        }
        result
    }

    /// Tower with the provided identifier.
    #[must_use]
    pub fn tower(&self, id: TowerId) -> Option<&Tower> {
        self.towers.iter().find(|tower| tower.id == id)
    }

    /// Number of towers of the provided type.
    #[must_use]
    pub fn tower_count_of(&self, tower_type: TowerType) -> usize {
        self.towers
            .iter()
            .filter(|tower| tower.tower_type == tower_type)
            .count()
    }

    /// Outgoing supply links keyed by supplier.
    #[must_use]
    pub fn connections(&self) -> &BTreeMap<TowerId, TowerId> {
        &self.connections
    }

    /// Suppliers keyed by the tower they feed.
    #[must_use]
    pub fn connection_sources(&self) -> &BTreeMap<TowerId, BTreeSet<TowerId>> {
        &self.connection_sources
    }

    /// Infinity towers currently on the battlefield.
    #[must_use]
    pub fn infinity_towers(&self) -> &BTreeSet<TowerId> {
        &self.infinity_towers
    }

    /// Tower occupying an anchor slot.
    #[must_use]
    pub fn slot_occupant(&self, slot: u32) -> Option<TowerId> {
        self.occupied_slots.get(&slot).copied()
    }

    fn plan_placement(
        &self,
        normalized: Vec2,
        options: PlacementOptions,
        energy: f64,
    ) -> Result<(PlacementPlan, Viewport), TowerActionError> {
        let viewport = self.viewport.ok_or(TowerActionError::NoActiveLevel)?;
        let tower_type = options
            .tower_type
            .or(self.dragging)
            .or_else(|| self.loadout.first_available())
            .ok_or(TowerActionError::NoTowerSelected)?;
        let definition = self.definition(tower_type)?;
        if !options.auto_anchor && !self.loadout.is_available(tower_type) {
            return Err(TowerActionError::Locked(tower_type));
        }

        if let Some(index) = self.occupant_at(normalized) {
            let occupant = &self.towers[index];
            if occupant.tower_type != tower_type {
                return Err(TowerActionError::InvalidPlacement(format!(
                    "{} already occupies this spot",
                    occupant.tower_type
                )));
            }
            let next_type = self
                .catalog
                .next_tier(tower_type)
                .ok_or(TowerActionError::MaxTier(tower_type))?;
            let next = self.definition(next_type)?;
            let cost = self.action_cost(next_type)?;
            ensure_affordable(cost, energy)?;
            return Ok((PlacementPlan::Merge { index, next, cost }, viewport));
        }

        if let Some(slot) = options.slot_id {
            if self.occupied_slots.contains_key(&slot) {
                return Err(TowerActionError::InvalidPlacement(format!(
                    "anchor slot {slot} is occupied"
                )));
            }
        }
        let cost = self.action_cost(tower_type)?;
        ensure_affordable(cost, energy)?;
        let request = PlacementRequest {
            tower_type,
            normalized,
            position: viewport.to_pixels(normalized),
            towers: &self.towers,
            viewport,
        };
        self.validator
            .validate(&request)
            .map_err(TowerActionError::InvalidPlacement)?;
        Ok((PlacementPlan::Fresh { definition, cost }, viewport))
    }

    fn plan_upgrade(
        &self,
        id: TowerId,
        quoted_cost: Option<f64>,
        energy: f64,
    ) -> Result<(usize, TowerDefinition, f64, Viewport), TowerActionError> {
        let viewport = self.viewport.ok_or(TowerActionError::NoActiveLevel)?;
        let index = self
            .index_of(id)
            .ok_or(TowerActionError::MissingTower(id))?;
        let tower_type = self.towers[index].tower_type;
        let next_type = self
            .catalog
            .next_tier(tower_type)
            .ok_or(TowerActionError::MaxTier(tower_type))?;
        let next = self.definition(next_type)?;
        let cost = match quoted_cost.filter(|cost| cost.is_finite() && *cost >= 0.0) {
            Some(cost) => cost,
            None => self.action_cost(next_type)?,
        };
        ensure_affordable(cost, energy)?;
        Ok((index, next, cost, viewport))
    }

    fn plan_demotion(
        &self,
        index: usize,
        energy: f64,
        energy_cap: f64,
    ) -> Result<(TowerDefinition, f64, f64, f64, Viewport), TowerActionError> {
        let viewport = self.viewport.ok_or(TowerActionError::NoActiveLevel)?;
        let tower = &self.towers[index];
        let previous_type = self
            .catalog
            .previous_tier(tower.tower_type)
            .ok_or(TowerActionError::NoPreviousTier(tower.tower_type))?;
        let previous = self.definition(previous_type)?;
        let refund = tower.cost_history.last().copied().unwrap_or(0.0);
        let entry = self.action_cost(previous_type)?;
        let available = (energy + refund).min(energy_cap);
        ensure_affordable(entry, available)?;
        Ok((previous, refund, entry, available, viewport))
    }

    fn after_tier_change(
        &mut self,
        id: TowerId,
        from: TowerType,
        to: TowerType,
        out: &mut Vec<Event>,
    ) {
        if from == TowerType::Infinity {
            let _ = self.infinity_towers.remove(&id);
        }
        if to == TowerType::Infinity {
            let _ = self.infinity_towers.insert(id);
        }
        out.push(Event::GlyphTransition { tower: id, from, to });
        self.revalidate_connections(id, out);
    }

    fn revalidate_connections(&mut self, id: TowerId, out: &mut Vec<Event>) {
        if let Some(target) = self.connections.get(&id).copied() {
            if !self.are_towers_connection_compatible(id, target) {
                let _ = self.unlink(id, target, out);
            }
        }
        let sources: Vec<_> = self
            .connection_sources
            .get(&id)
            .map(|sources| sources.iter().copied().collect())
            .unwrap_or_default();
        for source in sources {
            if !self.are_towers_connection_compatible(source, id) {
                let _ = self.unlink(source, id, out);
            }
        }
    }

    fn unlink(&mut self, source: TowerId, target: TowerId, out: &mut Vec<Event>) -> bool {
        if self.connections.get(&source) != Some(&target) {
            return false;
        }
        let _ = self.connections.remove(&source);
        if let Some(sources) = self.connection_sources.get_mut(&target) {
            let _ = sources.remove(&source);
            if sources.is_empty() {
                let _ = self.connection_sources.remove(&target);
            }
        }
        if let Some(supplier) = self.tower_mut(source) {
            supplier.link_target = None;
        }
        if let Some(receiver) = self.tower_mut(target) {
            let _ = receiver.link_sources.remove(&source);
        }
        self.refresh_supplier_state(target);
        debug!(
            target: "thero_idle::towers",
            supplier = %source,
            receiver = %target,
            "towers disconnected"
        );
        out.push(Event::TowerDisconnected { source, target });
        true
    }

    fn refresh_supplier_state(&mut self, target: TowerId) {
        let suppliers: Vec<TowerType> = self
            .connection_sources
            .get(&target)
            .into_iter()
            .flatten()
            .filter_map(|source| self.tower(*source).map(|tower| tower.tower_type))
            .collect();
        if let Some(receiver) = self.tower_mut(target) {
            receiver.stored.retain_suppliers(&suppliers);
        }
    }

    fn reject(&mut self, error: TowerActionError, out: &mut Vec<Event>) -> TowerActionError {
        debug!(
            target: "thero_idle::towers",
            reason = %error,
            "tower action refused"
        );
        self.status_message = Some(error.to_string());
        out.push(Event::Sound(SoundCue::Error));
        error
    }

    fn definition(&self, tower_type: TowerType) -> Result<TowerDefinition, TowerActionError> {
        self.catalog
            .definition(tower_type)
            .cloned()
            .ok_or(TowerActionError::UnknownDefinition(tower_type))
    }

    fn action_cost(&self, tower_type: TowerType) -> Result<f64, TowerActionError> {
        self.quote_placement_cost(tower_type)
            .ok_or(TowerActionError::UnknownDefinition(tower_type))
    }

    fn occupant_at(&self, normalized: Vec2) -> Option<usize> {
        self.towers
            .iter()
            .enumerate()
            .map(|(index, tower)| (index, tower.normalized.distance(normalized)))
            .filter(|(_, distance)| *distance <= self.config.merge_radius)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, _)| index)
    }

    fn index_of(&self, id: TowerId) -> Option<usize> {
        self.towers.iter().position(|tower| tower.id == id)
    }

    fn tower_mut(&mut self, id: TowerId) -> Option<&mut Tower> {
        self.towers.iter_mut().find(|tower| tower.id == id)
    }
}

fn ensure_affordable(cost: f64, available: f64) -> Result<(), TowerActionError> {
    if available < cost {
        return Err(TowerActionError::insufficient(cost, available));
    }
    Ok(())
}

fn ensure_viewport(viewport: Viewport) -> Result<(), ConfigError> {
    if viewport.is_valid() {
        Ok(())
    } else {
        Err(ConfigError::InvalidViewport {
            width: viewport.width,
            height: viewport.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thero_idle_core::StandardCatalog;

    struct Wallet {
        energy: f64,
        cap: f64,
    }

    impl EnergyLedger for Wallet {
        fn energy(&self) -> f64 {
            self.energy
        }

        fn energy_cap(&self) -> f64 {
            self.cap
        }

        fn set_energy(&mut self, energy: f64) {
            self.energy = energy;
        }
    }

    fn controller() -> TowerOrchestration {
        let mut controller = TowerOrchestration::new(
            Config::default(),
            Arc::new(StandardCatalog::default()),
            Box::new(PathClearance::open()),
        )
        .unwrap_or_else(|error| panic!("controller: {error}"));
        controller
            .activate(Viewport::new(1000.0, 1000.0))
            .unwrap_or_else(|error| panic!("activate: {error}"));
        controller
    }

    #[test]
    fn empty_catalog_is_a_construction_error() {
        let result = TowerOrchestration::new(
            Config::default(),
            Arc::new(StandardCatalog::from_definitions(Vec::new())),
            Box::new(PathClearance::open()),
        );
        assert!(matches!(result, Err(ConfigError::EmptyCatalog)));
    }

    #[test]
    fn refused_actions_record_a_status_message() {
        let mut controller = controller();
        let mut wallet = Wallet {
            energy: 10.0,
            cap: 100.0,
        };
        let mut out = Vec::new();
        let error = controller
            .add_tower_at(Vec2::new(0.5, 0.5), PlacementOptions::default(), &mut wallet, &mut out)
            .err();

        assert_eq!(error, Some(TowerActionError::insufficient(25.0, 10.0)));
        assert_eq!(controller.status_message(), Some("need 15 more energy"));
        assert_eq!(out, vec![Event::Sound(SoundCue::Error)]);
    }

    #[test]
    fn infinity_towers_are_tracked_through_tier_changes() {
        let mut controller = controller();
        let mut wallet = Wallet {
            energy: 1e30,
            cap: f64::INFINITY,
        };
        let mut out = Vec::new();
        let id = controller
            .add_tower_at(
                Vec2::new(0.5, 0.5),
                PlacementOptions {
                    tower_type: Some(TowerType::Omega),
                    slot_id: Some(4),
                    auto_anchor: true,
                },
                &mut wallet,
                &mut out,
            )
            .unwrap_or_else(|error| panic!("place: {error}"));
        assert!(controller.infinity_towers().is_empty());

        let _ = controller
            .upgrade_tower_tier(id, None, &mut wallet, &mut out)
            .unwrap_or_else(|error| panic!("upgrade: {error}"));
        assert!(controller.infinity_towers().contains(&id));

        let _ = controller
            .demote_tower_tier(id, &mut wallet, &mut out)
            .unwrap_or_else(|error| panic!("demote: {error}"));
        assert!(controller.infinity_towers().is_empty());

        let _ = controller
            .sell_tower(id, &mut wallet, &mut out)
            .unwrap_or_else(|error| panic!("sell: {error}"));
        assert_eq!(controller.slot_occupant(4), None);
    }
}
