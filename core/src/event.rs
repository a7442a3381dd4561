//! Events broadcast by the combat systems.

use glam::Vec2;

use crate::{CrystalId, EnemyId, TargetRef, TowerId, TowerType};

/// Fire-and-forget audio cues for the host's sound manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundCue {
    /// A player action was rejected.
    Error,
    /// A tower was placed.
    TowerPlaced,
    /// A tower was merged into the next tier.
    TowerMerged,
    /// A tower was upgraded through its menu.
    TowerUpgraded,
    /// A tower was demoted.
    TowerDemoted,
    /// A tower was sold.
    TowerSold,
    /// An enemy reached the goal.
    EnemyBreach,
    /// The level was won.
    Victory,
    /// The level was lost.
    Defeat,
}

/// Figures reported when the final wave is cleared.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VictorySummary {
    /// Display wave number at the moment of victory.
    pub wave_number: u32,
    /// Highest display wave number reached.
    pub max_wave_reached: u32,
    /// Energy held when combat ended.
    pub final_energy: f64,
}

/// Figures reported when lives run out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DefeatSummary {
    /// Display wave number at the moment of defeat.
    pub wave_number: u32,
    /// Highest display wave number reached.
    pub max_wave_reached: u32,
}

/// Observable state transitions emitted by the combat systems.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Combat started for a level.
    CombatStarted {
        /// Identifier of the level.
        level: String,
    },
    /// A wave's runtime state was created.
    WaveStarted {
        /// One-based display wave number.
        wave_number: u32,
        /// Index into the level's wave list.
        wave_index: usize,
        /// Endless cycle the wave belongs to.
        cycle: u32,
    },
    /// An enemy entered the battlefield.
    EnemySpawned {
        /// Identifier of the new enemy.
        enemy: EnemyId,
        /// One-based display wave number.
        wave_number: u32,
        /// Whether the enemy is the wave's boss.
        boss: bool,
    },
    /// An enemy reached the goal.
    EnemyBreached {
        /// Identifier of the enemy.
        enemy: EnemyId,
        /// Lives removed by the breach.
        damage: f64,
        /// Lives remaining afterwards.
        lives: f64,
    },
    /// An enemy died.
    EnemyKilled {
        /// Identifier of the enemy.
        enemy: EnemyId,
        /// Energy awarded.
        reward: f64,
        /// Pixel position of the death.
        position: Vec2,
    },
    /// A kill was credited to the tower with the most damage.
    KillAttributed {
        /// Credited tower.
        tower: TowerId,
        /// Enemy that died.
        enemy: EnemyId,
    },
    /// A dying enemy rolled a thrall conversion.
    ChiConversionRequested {
        /// Enemy that died.
        enemy: EnemyId,
        /// Pixel position of the death.
        position: Vec2,
        /// Hit points the enemy spawned with.
        max_hp: f64,
    },
    /// A dying enemy triggers a psi cluster detonation.
    PsiClusterTriggered {
        /// Enemy that died.
        enemy: EnemyId,
        /// Pixel position of the death.
        position: Vec2,
    },
    /// Every wave was cleared.
    Victory(VictorySummary),
    /// Lives ran out.
    Defeat(DefeatSummary),
    /// A new tower joined the roster.
    TowerPlaced {
        /// Identifier of the new tower.
        tower: TowerId,
        /// Type of the new tower.
        tower_type: TowerType,
        /// Energy paid.
        cost: f64,
    },
    /// A placement merged into an existing tower.
    TowerMerged {
        /// Tower that absorbed the merge.
        tower: TowerId,
        /// Type before the merge.
        from: TowerType,
        /// Type after the merge.
        to: TowerType,
        /// Energy paid.
        cost: f64,
    },
    /// A tower was upgraded to the next tier.
    TowerUpgraded {
        /// Upgraded tower.
        tower: TowerId,
        /// Type before the upgrade.
        from: TowerType,
        /// Type after the upgrade.
        to: TowerType,
        /// Energy paid.
        cost: f64,
    },
    /// A tower was demoted to the previous tier.
    TowerDemoted {
        /// Demoted tower.
        tower: TowerId,
        /// Type before the demotion.
        from: TowerType,
        /// Type after the demotion.
        to: TowerType,
        /// Energy refunded for the removed tier.
        refund: f64,
        /// Entry cost charged for the previous tier.
        cost: f64,
    },
    /// A tower left the roster.
    TowerSold {
        /// Sold tower.
        tower: TowerId,
        /// Type of the sold tower.
        tower_type: TowerType,
        /// Energy refunded.
        refund: f64,
    },
    /// A supply link was created.
    TowerConnected {
        /// Supplying tower.
        source: TowerId,
        /// Supplied tower.
        target: TowerId,
    },
    /// A supply link was removed.
    TowerDisconnected {
        /// Supplying tower.
        source: TowerId,
        /// Supplied tower.
        target: TowerId,
    },
    /// A glyph morph animation should play for a tier change.
    GlyphTransition {
        /// Tower whose glyph changes.
        tower: TowerId,
        /// Type before the change.
        from: TowerType,
        /// Type after the change.
        to: TowerType,
    },
    /// Type-specific state was discarded when a tower left the roster.
    BehaviorTornDown {
        /// Removed tower.
        tower: TowerId,
        /// Type of the removed tower.
        tower_type: TowerType,
    },
    /// A tower launched a projectile whose damage lands after `travel_time`.
    TowerFired {
        /// Firing tower.
        tower: TowerId,
        /// Resolved target.
        target: TargetRef,
        /// Pixel launch point.
        origin: Vec2,
        /// Pixel aim point.
        destination: Vec2,
        /// Seconds until impact.
        travel_time: f32,
    },
    /// A piercing beam was fired.
    BeamFired {
        /// Firing tower.
        tower: TowerId,
        /// Pixel start of the beam.
        origin: Vec2,
        /// Pixel end of the beam.
        end: Vec2,
        /// Enemies struck.
        hits: u32,
    },
    /// A pulse struck every enemy around a tower.
    PulseEmitted {
        /// Pulsing tower.
        tower: TowerId,
        /// Pixel radius of the pulse.
        radius: f32,
        /// Enemies struck.
        hits: u32,
    },
    /// A chaining strike jumped across enemies.
    ChainStruck {
        /// Firing tower.
        tower: TowerId,
        /// Enemies struck in order.
        enemies: Vec<EnemyId>,
    },
    /// A delta tower deployed a soldier.
    SoldierDeployed {
        /// Deploying tower.
        tower: TowerId,
        /// Soldiers on the field afterwards.
        soldiers: usize,
    },
    /// A supplier stored a shot in its downstream tower.
    ShotStored {
        /// Supplying tower.
        source: TowerId,
        /// Receiving tower.
        target: TowerId,
        /// Type of the stored shot.
        tower_type: TowerType,
    },
    /// Stored shots were released as part of a shot.
    SwirlLaunched {
        /// Tower releasing the shots.
        tower: TowerId,
        /// Stored shots consumed.
        shots: u32,
    },
    /// A sigma tower absorbed allied fire.
    SigmaCharged {
        /// Absorbing tower.
        tower: TowerId,
        /// Damage absorbed.
        amount: f64,
    },
    /// A crystal took damage.
    CrystalDamaged {
        /// Damaged crystal.
        crystal: CrystalId,
        /// Integrity remaining.
        integrity: f64,
    },
    /// A crystal was destroyed.
    CrystalShattered {
        /// Destroyed crystal.
        crystal: CrystalId,
    },
    /// A sound cue should play.
    Sound(SoundCue),
}
