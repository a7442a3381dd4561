use glam::Vec2;
use thero_idle_core::{
    Enemy, EnemyArchetype, EnemyGroup, EnemyUpdateContext, EnergyLedger, Event, LevelConfig,
    Outcome, SpawnContext, TowerId, WaveConfig,
};
use thero_idle_system_combat_state::{CombatState, Config, StartOptions};

struct Spawner {
    registered: u32,
}

impl SpawnContext for Spawner {
    fn path_origin(&self) -> Vec2 {
        Vec2::new(5.0, 5.0)
    }

    fn radial_origin(&mut self) -> Vec2 {
        Vec2::new(-50.0, 0.0)
    }

    fn register_enemy(&mut self, enemy: &mut Enemy) {
        self.registered += 1;
        enemy.symbol = Some(format!("#{}", self.registered));
    }
}

struct Stride {
    step: f32,
}

impl EnemyUpdateContext for Stride {
    fn apply_debuffs(&mut self, enemy: &mut Enemy, delta: f32) {
        enemy.debuffs.decay(delta);
    }

    fn advance(&mut self, enemy: &mut Enemy, _delta: f32) {
        enemy.progress += self.step;
    }
}

fn archetype(hp: f64, speed: f32, reward: f64) -> EnemyArchetype {
    EnemyArchetype {
        hp,
        speed,
        reward,
        codex_id: None,
        symbol: None,
        interval: None,
        shield: None,
    }
}

fn wave(count: u32, hp: f64) -> WaveConfig {
    WaveConfig {
        groups: vec![EnemyGroup {
            count,
            archetype: archetype(hp, 0.1, 2.0),
        }],
        boss: None,
        interval: 1.0,
        delay: None,
    }
}

fn level(waves: Vec<WaveConfig>) -> LevelConfig {
    LevelConfig {
        id: "test-level".to_owned(),
        waves,
        ..LevelConfig::default()
    }
}

fn tick(
    state: &mut CombatState,
    spawner: &mut Spawner,
    stride: &mut Stride,
    out: &mut Vec<Event>,
) {
    state.spawn_enemies(1.0, spawner, out);
    state.update_enemies(1.0, stride, out);
}

fn count(events: &[Event], predicate: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|event| predicate(event)).count()
}

#[test]
fn breaching_every_enemy_still_completes_the_wave_once() {
    let mut state = CombatState::new(&level(vec![wave(3, 1.0), wave(3, 1.0)]), Config::default());
    let mut spawner = Spawner { registered: 0 };
    let mut stride = Stride { step: 1.0 };
    let mut out = Vec::new();
    state.start_combat(StartOptions::default(), &mut out);

    for _ in 0..20 {
        tick(&mut state, &mut spawner, &mut stride, &mut out);
    }

    let second_wave_starts = count(&out, |event| {
        matches!(event, Event::WaveStarted { wave_index: 1, .. })
    });
    assert_eq!(second_wave_starts, 1);
    assert_eq!(count(&out, |event| matches!(event, Event::EnemyKilled { .. })), 0);
    assert_eq!(count(&out, |event| matches!(event, Event::EnemyBreached { .. })), 6);
    assert_eq!(count(&out, |event| matches!(event, Event::Victory(_))), 1);
    assert_eq!(state.outcome(), Some(Outcome::Victory));
    assert_eq!(state.lives(), 14.0);
    assert_eq!(spawner.registered, 6);
}

#[test]
fn enemies_spawned_in_a_cycle_scale_exactly() {
    let mut state = CombatState::new(&level(vec![wave(4, 7.0)]), Config::default());
    let mut spawner = Spawner { registered: 0 };
    let mut out = Vec::new();
    state.start_combat(
        StartOptions {
            endless: true,
            starting_cycle: 2,
            ..StartOptions::default()
        },
        &mut out,
    );

    for _ in 0..4 {
        state.spawn_enemies(1.0, &mut spawner, &mut out);
    }

    assert_eq!(state.enemy_count(), 4);
    let expected_speed = 0.1 * state.speed_scalar();
    for enemy in state.enemies() {
        assert_eq!(enemy.hp, 700.0);
        assert_eq!(enemy.max_hp, 700.0);
        assert_eq!(enemy.speed, expected_speed);
        assert_eq!(enemy.reward, 200.0);
        assert_eq!(enemy.wave_number, 3);
    }
}

#[test]
fn endless_mode_wraps_into_the_next_cycle() {
    let mut state = CombatState::new(&level(vec![wave(1, 3.0), wave(1, 3.0)]), Config::default());
    let mut spawner = Spawner { registered: 0 };
    let mut stride = Stride { step: 0.0 };
    let mut out = Vec::new();
    state.start_combat(
        StartOptions {
            endless: true,
            starting_lives: Some(1000.0),
            ..StartOptions::default()
        },
        &mut out,
    );

    for _ in 0..2 {
        state.spawn_enemies(1.0, &mut spawner, &mut out);
        let ids: Vec<_> = state.enemies().iter().map(|enemy| enemy.id).collect();
        for id in ids {
            let _ = state.damage_enemy(id, 1e9, Some(TowerId::new(1)), &mut out);
        }
        state.update_enemies(1.0, &mut stride, &mut out);
    }

    assert_eq!(state.endless_cycle(), 1);
    assert_eq!(state.wave_index(), 0);
    assert_eq!(state.wave_number(), 3);
    assert_eq!(state.max_wave_reached(), 3);
    assert!(state.outcome().is_none());

    state.spawn_enemies(1.0, &mut spawner, &mut out);
    assert_eq!(state.enemies()[0].hp, 30.0);
}

#[test]
fn breach_larger_than_remaining_lives_resolves_defeat() {
    let mut state = CombatState::new(
        &LevelConfig {
            lives: Some(20.0),
            ..level(vec![wave(1, 25.0)])
        },
        Config::default(),
    );
    let mut spawner = Spawner { registered: 0 };
    let mut stride = Stride { step: 1.0 };
    let mut out = Vec::new();
    state.start_combat(StartOptions::default(), &mut out);

    tick(&mut state, &mut spawner, &mut stride, &mut out);

    assert_eq!(state.lives(), 0.0);
    assert_eq!(state.outcome(), Some(Outcome::Defeat));
    assert!(!state.is_combat_active());
    assert!(out.iter().any(|event| matches!(
        event,
        Event::EnemyBreached { damage, lives, .. } if *damage == 25.0 && *lives == 0.0
    )));
    assert_eq!(count(&out, |event| matches!(event, Event::Defeat(_))), 1);

    tick(&mut state, &mut spawner, &mut stride, &mut out);
    assert_eq!(count(&out, |event| matches!(event, Event::Defeat(_))), 1);
    assert!(!state.check_victory_condition(&mut out));
}

#[test]
fn breach_damage_helper_resolves_defeat() {
    let mut state = CombatState::new(&level(vec![wave(1, 1.0)]), Config::default());
    let mut out = Vec::new();
    state.start_combat(StartOptions::default(), &mut out);

    state.apply_breach_damage(25.0, &mut out);

    assert_eq!(state.lives(), 0.0);
    assert!(state.check_defeat_condition(&mut out));
    assert!(!state.is_combat_active());
}

#[test]
fn clearing_the_final_wave_reports_the_wave_it_finished() {
    let mut state = CombatState::new(&level(vec![wave(1, 5.0), wave(1, 5.0)]), Config::default());
    let mut spawner = Spawner { registered: 0 };
    let mut out = Vec::new();
    state.start_combat(
        StartOptions {
            starting_energy: 10.0,
            ..StartOptions::default()
        },
        &mut out,
    );

    for _ in 0..2 {
        state.spawn_enemies(1.0, &mut spawner, &mut out);
        let id = state.enemies()[0].id;
        assert_eq!(state.damage_enemy(id, 5.0, None, &mut out), Some(5.0));
    }

    let summary = out.iter().find_map(|event| match event {
        Event::Victory(summary) => Some(*summary),
        _ => None,
    });
    let summary = summary.expect("victory resolved");
    assert_eq!(summary.wave_number, 2);
    assert_eq!(summary.max_wave_reached, 2);
    assert_eq!(summary.final_energy, 14.0);
    assert_eq!(state.outcome(), Some(Outcome::Victory));
    assert!(!state.is_combat_active());
}

#[test]
fn deaths_award_capped_energy_and_credit_the_first_top_contributor() {
    let mut state = CombatState::new(
        &LevelConfig {
            energy_cap: Some(11.0),
            ..level(vec![wave(2, 10.0)])
        },
        Config {
            chi_conversion_chance: 1.0,
            ..Config::default()
        },
    );
    let mut spawner = Spawner { registered: 0 };
    let mut out = Vec::new();
    state.start_combat(
        StartOptions {
            starting_energy: 10.0,
            ..StartOptions::default()
        },
        &mut out,
    );
    state.spawn_enemies(1.0, &mut spawner, &mut out);
    let id = state.enemies()[0].id;
    out.clear();

    let _ = state.damage_enemy(id, 5.0, Some(TowerId::new(8)), &mut out);
    let _ = state.damage_enemy(id, 5.0, Some(TowerId::new(3)), &mut out);

    assert_eq!(state.energy(), 11.0);
    assert!(state.enemy(id).is_none());
    assert!(out.contains(&Event::KillAttributed {
        tower: TowerId::new(8),
        enemy: id,
    }));
    assert_eq!(
        count(&out, |event| matches!(event, Event::ChiConversionRequested { .. })),
        1
    );
    assert_eq!(
        count(&out, |event| matches!(event, Event::PsiClusterTriggered { .. })),
        1
    );
    assert!(!state.handle_enemy_death(id, &mut out));
}

#[test]
fn boss_spawns_after_every_group_with_group_intervals() {
    let mut boss_wave = wave(2, 4.0);
    boss_wave.groups[0].archetype.interval = Some(3.0);
    boss_wave.boss = Some(archetype(50.0, 0.05, 10.0));
    let mut state = CombatState::new(&level(vec![boss_wave]), Config::default());
    let mut spawner = Spawner { registered: 0 };
    let mut out = Vec::new();
    state.start_combat(StartOptions::default(), &mut out);

    state.spawn_enemies(0.5, &mut spawner, &mut out);
    assert_eq!(state.enemy_count(), 1);
    state.spawn_enemies(2.0, &mut spawner, &mut out);
    assert_eq!(state.enemy_count(), 1, "group interval overrides the wave interval");
    state.spawn_enemies(1.0, &mut spawner, &mut out);
    assert_eq!(state.enemy_count(), 2);
    state.spawn_enemies(3.0, &mut spawner, &mut out);
    assert_eq!(state.enemy_count(), 3);

    let boss = &state.enemies()[2];
    assert!(boss.is_boss);
    assert_eq!(boss.hp, 50.0);
    assert_eq!(boss.symbol.as_deref(), Some("#3"));
    assert_eq!(state.active_wave().map(|wave| wave.spawned), Some(3));
}

#[test]
fn inactive_combat_skips_per_tick_work() {
    let mut state = CombatState::new(&level(vec![wave(2, 1.0)]), Config::default());
    let mut spawner = Spawner { registered: 0 };
    let mut out = Vec::new();
    state.start_combat(StartOptions::default(), &mut out);
    state.set_combat_active(false);

    state.spawn_enemies(5.0, &mut spawner, &mut out);
    assert_eq!(state.enemy_count(), 0);
    assert_eq!(state.wave_timer(), 0.0);

    state.reset();
    assert!(!state.is_combat_active());
    assert_eq!(state.wave_number(), 1);
    assert_eq!(state.energy(), 0.0);
}
