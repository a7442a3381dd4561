use std::sync::Arc;

use glam::Vec2;
use thero_idle_core::{
    CheckpointError, EnergyLedger, Event, SoundCue, StandardCatalog, TowerId, TowerType, Viewport,
};
use thero_idle_system_tower_orchestration::{
    Config, DemoteOutcome, PathClearance, PlacementOptions, TowerActionError, TowerOrchestration,
};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Wallet {
    energy: f64,
    cap: f64,
}

impl Wallet {
    fn new(energy: f64) -> Self {
        Self {
            energy,
            cap: f64::INFINITY,
        }
    }
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
    .expect("catalog is populated");
    controller
        .activate(Viewport::new(1000.0, 1000.0))
        .expect("viewport is valid");
    controller
}

fn place(
    controller: &mut TowerOrchestration,
    tower_type: TowerType,
    at: Vec2,
    wallet: &mut Wallet,
    out: &mut Vec<Event>,
) -> TowerId {
    controller
        .add_tower_at(
            at,
            PlacementOptions {
                tower_type: Some(tower_type),
                auto_anchor: true,
                ..PlacementOptions::default()
            },
            wallet,
            out,
        )
        .expect("placement succeeds")
}

fn assert_connection_maps_are_inverse(controller: &TowerOrchestration) {
    for (source, target) in controller.connections() {
        let sources = controller
            .connection_sources()
            .get(target)
            .expect("target has a source set");
        assert!(sources.contains(source));
        assert_eq!(controller.tower(*source).and_then(|t| t.link_target), Some(*target));
    }
    for (target, sources) in controller.connection_sources() {
        assert!(!sources.is_empty());
        for source in sources {
            assert_eq!(controller.connections().get(source), Some(target));
        }
        let receiver = controller.tower(*target).expect("receiver exists");
        assert_eq!(&receiver.link_sources, sources);
    }
}

#[test]
fn upgrade_then_demote_charges_only_the_lower_entry_cost() {
    let mut controller = controller();
    let mut wallet = Wallet::new(1_000.0);
    let mut out = Vec::new();
    let id = place(&mut controller, TowerType::Alpha, Vec2::new(0.2, 0.2), &mut wallet, &mut out);

    let before = wallet.energy;
    let upgrade_cost = controller.quote_upgrade_cost(id).expect("beta exists");
    let entry_cost = controller
        .quote_placement_cost(TowerType::Alpha)
        .expect("alpha exists");

    let upgraded = controller.upgrade_tower_tier(id, None, &mut wallet, &mut out);
    assert_eq!(upgraded, Ok(TowerType::Beta));
    assert_eq!(wallet.energy, before - upgrade_cost);

    let demoted = controller.demote_tower_tier(id, &mut wallet, &mut out);
    assert_eq!(
        demoted,
        Ok(DemoteOutcome::Demoted {
            to: TowerType::Alpha
        })
    );
    assert_eq!(wallet.energy, before - entry_cost);

    let tower = controller.tower(id).expect("tower kept its identity");
    assert_eq!(tower.tower_type, TowerType::Alpha);
    assert_eq!(tower.cost_history, vec![entry_cost]);
    assert!(out.contains(&Event::TowerDemoted {
        tower: id,
        from: TowerType::Beta,
        to: TowerType::Alpha,
        refund: upgrade_cost,
        cost: entry_cost,
    }));
}

#[test]
fn merging_keeps_the_identifier_and_records_the_cost() {
    let mut controller = controller();
    let mut wallet = Wallet::new(1_000.0);
    let mut out = Vec::new();
    let id = place(&mut controller, TowerType::Alpha, Vec2::new(0.5, 0.5), &mut wallet, &mut out);
    let merge_cost = controller.quote_upgrade_cost(id).expect("beta exists");

    let merged = place(&mut controller, TowerType::Alpha, Vec2::new(0.51, 0.5), &mut wallet, &mut out);

    assert_eq!(merged, id);
    assert_eq!(controller.towers().len(), 1);
    let tower = controller.tower(id).expect("merged tower");
    assert_eq!(tower.tower_type, TowerType::Beta);
    assert_eq!(tower.tier, 2);
    assert_eq!(tower.cost_history, vec![25.0, merge_cost]);
    assert!(out.contains(&Event::GlyphTransition {
        tower: id,
        from: TowerType::Alpha,
        to: TowerType::Beta,
    }));
    assert_eq!(out.last(), Some(&Event::Sound(SoundCue::TowerMerged)));

    let refused = controller.add_tower_at(
        Vec2::new(0.5, 0.5),
        PlacementOptions {
            tower_type: Some(TowerType::Gamma),
            ..PlacementOptions::default()
        },
        &mut wallet,
        &mut out,
    );
    assert!(matches!(refused, Err(TowerActionError::InvalidPlacement(_))));
}

#[test]
fn the_last_tier_cannot_merge_further() {
    let mut controller = controller();
    let mut wallet = Wallet::new(f64::MAX);
    let mut out = Vec::new();
    let _ = place(&mut controller, TowerType::Infinity, Vec2::new(0.5, 0.5), &mut wallet, &mut out);

    let refused = controller.add_tower_at(
        Vec2::new(0.5, 0.5),
        PlacementOptions {
            tower_type: Some(TowerType::Infinity),
            auto_anchor: true,
            ..PlacementOptions::default()
        },
        &mut wallet,
        &mut out,
    );
    assert_eq!(refused, Err(TowerActionError::MaxTier(TowerType::Infinity)));
    assert_eq!(controller.status_message(), Some("infinity cannot be upgraded further"));
}

#[test]
fn rejected_placements_leave_state_untouched() {
    let mut controller = controller();
    let mut wallet = Wallet::new(1_000.0);
    let mut out = Vec::new();
    let id = place(&mut controller, TowerType::Alpha, Vec2::new(0.3, 0.3), &mut wallet, &mut out);
    wallet.energy = 10.0;
    let towers_before = controller.towers().to_vec();
    out.clear();

    for _ in 0..2 {
        let fresh = controller.add_tower_at(
            Vec2::new(0.7, 0.7),
            PlacementOptions::default(),
            &mut wallet,
            &mut out,
        );
        assert!(matches!(
            fresh,
            Err(TowerActionError::InsufficientEnergy { deficit, .. }) if deficit > 0.0
        ));
        let merge = controller.add_tower_at(
            Vec2::new(0.3, 0.3),
            PlacementOptions::default(),
            &mut wallet,
            &mut out,
        );
        assert!(matches!(merge, Err(TowerActionError::InsufficientEnergy { .. })));

        assert_eq!(controller.towers(), towers_before.as_slice());
        assert_eq!(wallet.energy, 10.0);
    }

    assert_eq!(controller.tower(id).map(|t| t.cost_history.len()), Some(1));
    assert_eq!(out, vec![Event::Sound(SoundCue::Error); 4]);
}

#[test]
fn loadout_gates_manual_placement_but_not_auto_anchor() {
    let mut controller = controller();
    let mut wallet = Wallet::new(f64::MAX);
    let mut out = Vec::new();

    let locked = controller.add_tower_at(
        Vec2::new(0.2, 0.2),
        PlacementOptions {
            tower_type: Some(TowerType::Omega),
            ..PlacementOptions::default()
        },
        &mut wallet,
        &mut out,
    );
    assert_eq!(locked, Err(TowerActionError::Locked(TowerType::Omega)));
    assert!(controller.towers().is_empty());

    let _ = place(&mut controller, TowerType::Omega, Vec2::new(0.2, 0.2), &mut wallet, &mut out);

    controller.set_dragging(Some(TowerType::Gamma));
    let dragged = controller
        .add_tower_at(Vec2::new(0.8, 0.8), PlacementOptions::default(), &mut wallet, &mut out)
        .expect("dragged gamma placed");
    assert_eq!(
        controller.tower(dragged).map(|t| t.tower_type),
        Some(TowerType::Gamma)
    );

    controller.set_dragging(None);
    let fallback = controller
        .add_tower_at(Vec2::new(0.8, 0.2), PlacementOptions::default(), &mut wallet, &mut out)
        .expect("first loadout slot placed");
    assert_eq!(
        controller.tower(fallback).map(|t| t.tower_type),
        Some(TowerType::Alpha)
    );
}

#[test]
fn inactive_controller_refuses_every_action() {
    let mut controller = controller();
    controller.deactivate();
    let mut wallet = Wallet::new(1_000.0);
    let mut out = Vec::new();

    let placed = controller.add_tower_at(
        Vec2::new(0.5, 0.5),
        PlacementOptions::default(),
        &mut wallet,
        &mut out,
    );
    assert_eq!(placed, Err(TowerActionError::NoActiveLevel));
    assert_eq!(wallet.energy, 1_000.0);
}

#[test]
fn demoting_a_base_tier_tower_sells_it_with_a_capped_refund() {
    let mut controller = controller();
    let mut wallet = Wallet {
        energy: 30.0,
        cap: 30.0,
    };
    let mut out = Vec::new();
    let id = controller
        .add_tower_at(
            Vec2::new(0.5, 0.5),
            PlacementOptions {
                slot_id: Some(2),
                ..PlacementOptions::default()
            },
            &mut wallet,
            &mut out,
        )
        .expect("alpha placed");
    assert_eq!(controller.slot_occupant(2), Some(id));
    wallet.energy = 20.0;
    controller.open_tower_menu(id).expect("menu opens");

    let outcome = controller.demote_tower_tier(id, &mut wallet, &mut out);

    assert_eq!(outcome, Ok(DemoteOutcome::Sold { refund: 25.0 }));
    assert_eq!(wallet.energy, 30.0);
    assert!(controller.towers().is_empty());
    assert_eq!(controller.open_menu(), None);
    assert_eq!(controller.slot_occupant(2), None);
    assert!(out.contains(&Event::BehaviorTornDown {
        tower: id,
        tower_type: TowerType::Alpha,
    }));
}

#[test]
fn demotion_that_cannot_be_recharged_is_refused() {
    let mut controller = controller();
    let mut wallet = Wallet::new(1_000.0);
    let mut out = Vec::new();
    let id = place(&mut controller, TowerType::Alpha, Vec2::new(0.5, 0.5), &mut wallet, &mut out);
    let _ = controller
        .upgrade_tower_tier(id, None, &mut wallet, &mut out)
        .expect("upgrade");
    let history = controller.tower(id).map(|t| t.cost_history.clone());
    wallet = Wallet {
        energy: 0.0,
        cap: 10.0,
    };

    let refused = controller.demote_tower_tier(id, &mut wallet, &mut out);

    assert_eq!(
        refused,
        Err(TowerActionError::InsufficientEnergy {
            required: 25.0,
            available: 10.0,
            deficit: 15.0,
        })
    );
    assert_eq!(wallet.energy, 0.0);
    assert_eq!(controller.tower(id).map(|t| t.tower_type), Some(TowerType::Beta));
    assert_eq!(controller.tower(id).map(|t| t.cost_history.clone()), history);
}

#[test]
fn upgrade_honours_a_quoted_cost() {
    let mut controller = controller();
    let mut wallet = Wallet::new(100.0);
    let mut out = Vec::new();
    let id = place(&mut controller, TowerType::Alpha, Vec2::new(0.5, 0.5), &mut wallet, &mut out);

    let upgraded = controller.upgrade_tower_tier(id, Some(5.0), &mut wallet, &mut out);

    assert_eq!(upgraded, Ok(TowerType::Beta));
    assert_eq!(wallet.energy, 70.0);
    assert_eq!(controller.tower(id).map(|t| t.cost_history.clone()), Some(vec![25.0, 5.0]));
}

#[test]
fn connection_maps_stay_exact_inverses() {
    let mut controller = controller();
    let mut wallet = Wallet::new(f64::MAX);
    let mut out = Vec::new();
    let first = place(&mut controller, TowerType::Alpha, Vec2::new(0.3, 0.5), &mut wallet, &mut out);
    let second = place(&mut controller, TowerType::Alpha, Vec2::new(0.3, 0.6), &mut wallet, &mut out);
    let beta = place(&mut controller, TowerType::Beta, Vec2::new(0.45, 0.5), &mut wallet, &mut out);
    let gamma = place(&mut controller, TowerType::Gamma, Vec2::new(0.6, 0.5), &mut wallet, &mut out);
    let iota = place(&mut controller, TowerType::Iota, Vec2::new(0.4, 0.6), &mut wallet, &mut out);

    assert!(!controller.are_towers_connection_compatible(beta, first));
    assert!(!controller.are_towers_connection_compatible(first, first));
    assert!(!controller.are_towers_connection_compatible(gamma, iota));

    controller.add_tower_connection(first, beta, &mut out).expect("alpha feeds beta");
    assert_connection_maps_are_inverse(&controller);
    controller.add_tower_connection(second, beta, &mut out).expect("alpha feeds beta");
    controller.add_tower_connection(beta, gamma, &mut out).expect("beta feeds gamma");
    assert_connection_maps_are_inverse(&controller);

    controller.add_tower_connection(first, iota, &mut out).expect("alpha feeds iota");
    assert_eq!(controller.connections().get(&first), Some(&iota));
    assert!(out.contains(&Event::TowerDisconnected {
        source: first,
        target: beta,
    }));
    assert_connection_maps_are_inverse(&controller);

    let refused = controller.add_tower_connection(gamma, iota, &mut out);
    assert_eq!(
        refused,
        Err(TowerActionError::IncompatibleConnection {
            supplier: gamma,
            receiver: iota,
        })
    );

    controller.add_tower_connection(beta, iota, &mut out).expect("beta feeds iota");
    assert!(controller.remove_tower_connection(second, beta, &mut out));
    assert!(!controller.remove_tower_connection(second, beta, &mut out));
    assert_connection_maps_are_inverse(&controller);

    controller.remove_all_connections_for_tower(iota, &mut out);
    assert!(controller.connections().is_empty());
    assert!(controller.connection_sources().is_empty());
    assert_connection_maps_are_inverse(&controller);
}

#[test]
fn tier_changes_drop_links_that_became_incompatible() {
    let mut controller = controller();
    let mut wallet = Wallet::new(f64::MAX);
    let mut out = Vec::new();
    let alpha = place(&mut controller, TowerType::Alpha, Vec2::new(0.3, 0.5), &mut wallet, &mut out);
    let beta = place(&mut controller, TowerType::Beta, Vec2::new(0.45, 0.5), &mut wallet, &mut out);
    controller.add_tower_connection(alpha, beta, &mut out).expect("linked");

    let _ = controller
        .upgrade_tower_tier(beta, None, &mut wallet, &mut out)
        .expect("beta becomes gamma");

    assert!(controller.connections().is_empty());
    assert_eq!(controller.tower(alpha).and_then(|t| t.link_target), None);
    assert_connection_maps_are_inverse(&controller);
}

#[test]
fn selling_a_hub_tears_down_every_link() {
    let mut controller = controller();
    let mut wallet = Wallet::new(f64::MAX);
    let mut out = Vec::new();
    let alpha = place(&mut controller, TowerType::Alpha, Vec2::new(0.3, 0.5), &mut wallet, &mut out);
    let beta = place(&mut controller, TowerType::Beta, Vec2::new(0.45, 0.5), &mut wallet, &mut out);
    let gamma = place(&mut controller, TowerType::Gamma, Vec2::new(0.6, 0.5), &mut wallet, &mut out);
    controller.add_tower_connection(alpha, beta, &mut out).expect("linked");
    controller.add_tower_connection(beta, gamma, &mut out).expect("linked");

    let _ = controller.sell_tower(beta, &mut wallet, &mut out).expect("sold");

    assert!(controller.connections().is_empty());
    assert_eq!(controller.tower(alpha).and_then(|t| t.link_target), None);
    assert!(controller
        .tower(gamma)
        .map(|t| t.link_sources.is_empty())
        .unwrap_or(false));
}

#[test]
fn checkpoint_restores_roster_and_links() {
    let mut controller = controller();
    let mut wallet = Wallet::new(f64::MAX);
    let mut out = Vec::new();
    let alpha = place(&mut controller, TowerType::Alpha, Vec2::new(0.3, 0.5), &mut wallet, &mut out);
    let beta = place(&mut controller, TowerType::Beta, Vec2::new(0.375, 0.5), &mut wallet, &mut out);
    controller.add_tower_connection(alpha, beta, &mut out).expect("linked");
    let records = controller.checkpoint();

    let mut restored = TowerOrchestration::new(
        Config::default(),
        Arc::new(StandardCatalog::default()),
        Box::new(PathClearance::open()),
    )
    .expect("catalog is populated");
    assert_eq!(
        restored.restore_towers_from_checkpoint(&records),
        Err(CheckpointError::NoActiveLevel)
    );
    restored
        .activate(Viewport::new(500.0, 500.0))
        .expect("viewport is valid");
    restored
        .restore_towers_from_checkpoint(&records)
        .expect("checkpoint is consistent");

    assert_eq!(restored.connections().get(&alpha), Some(&beta));
    assert_connection_maps_are_inverse(&restored);
    let moved = restored.tower(beta).expect("beta restored");
    assert_eq!(moved.position, Vec2::new(187.5, 250.0));

    let next = place(&mut restored, TowerType::Gamma, Vec2::new(0.8, 0.8), &mut wallet, &mut out);
    assert!(next > beta);
}

#[test]
fn inconsistent_checkpoints_are_refused_before_mutation() {
    let mut controller = controller();
    let mut wallet = Wallet::new(f64::MAX);
    let mut out = Vec::new();
    let alpha = place(&mut controller, TowerType::Alpha, Vec2::new(0.3, 0.5), &mut wallet, &mut out);
    let mut records = controller.checkpoint();
    records[0].link_target_id = Some(TowerId::new(99));

    assert_eq!(
        controller.restore_towers_from_checkpoint(&records),
        Err(CheckpointError::DanglingLink {
            tower: alpha,
            target: TowerId::new(99),
        })
    );
    records[0].link_target_id = None;
    records.push(records[0].clone());
    assert_eq!(
        controller.restore_towers_from_checkpoint(&records),
        Err(CheckpointError::DuplicateTower(alpha))
    );
    assert_eq!(controller.towers().len(), 1);
}

#[test]
fn dispatcher_tick_keeps_controller_owned_fields() {
    let mut controller = controller();
    let mut wallet = Wallet::new(f64::MAX);
    let mut out = Vec::new();
    let alpha = place(&mut controller, TowerType::Alpha, Vec2::new(0.3, 0.5), &mut wallet, &mut out);
    let beta = place(&mut controller, TowerType::Beta, Vec2::new(0.45, 0.5), &mut wallet, &mut out);
    controller.add_tower_connection(alpha, beta, &mut out).expect("alpha feeds beta");
    let before: Vec<_> = controller.towers().to_vec();

    let touched = controller.tick_towers(|towers| {
        for tower in towers.iter_mut() {
            tower.id = TowerId::new(99);
            tower.tower_type = TowerType::Omega;
            tower.tier = 7;
            tower.position = Vec2::ZERO;
            tower.base_damage = 0.0;
            tower.link_target = None;
            tower.link_sources.clear();
            tower.cooldown = 0.25;
        }
        towers.len()
    });

    assert_eq!(touched, 2);
    for (tower, original) in controller.towers().iter().zip(&before) {
        assert_eq!(tower.id, original.id);
        assert_eq!(tower.tower_type, original.tower_type);
        assert_eq!(tower.tier, original.tier);
        assert_eq!(tower.position, original.position);
        assert_eq!(tower.base_damage, original.base_damage);
        assert_eq!(tower.cooldown, 0.25);
    }
    assert_eq!(controller.tower(alpha).and_then(|t| t.link_target), Some(beta));
    assert_connection_maps_are_inverse(&controller);
}
