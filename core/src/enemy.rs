//! Enemy records owned by the combat state machine.

use glam::Vec2;

use crate::{EnemyId, TowerId};

/// Hostile unit progressing toward the goal.
#[derive(Clone, Debug, PartialEq)]
pub struct Enemy {
    /// Identifier allocated by the spawner.
    pub id: EnemyId,
    /// Remaining hit points.
    pub hp: f64,
    /// Hit points at spawn, after cycle scaling.
    pub max_hp: f64,
    /// Path fractions per second, after cycle scaling.
    pub speed: f32,
    /// Energy awarded on death, after cycle scaling.
    pub reward: f64,
    /// Fraction of the route covered; `1.0` means the goal was reached.
    pub progress: f32,
    /// Pixel position.
    pub position: Vec2,
    /// Where the enemy entered the battlefield.
    pub origin: SpawnOrigin,
    /// One-based wave number the enemy belongs to.
    pub wave_number: u32,
    /// Whether the enemy is its wave's boss.
    pub is_boss: bool,
    /// Codex entry used by presentation layers.
    pub codex_id: Option<String>,
    /// Glyph used by presentation layers.
    pub symbol: Option<String>,
    /// Whether the enemy currently travels through a tunnel and cannot be targeted.
    pub in_tunnel: bool,
    /// Damage dealt per tower, used for kill attribution.
    pub damage_contributors: DamageLedger,
    /// Active debuffs.
    pub debuffs: Debuffs,
}

impl Enemy {
    /// Reports whether the enemy still has hit points.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Reports whether towers may select the enemy.
    #[must_use]
    pub fn is_targetable(&self) -> bool {
        self.is_alive() && !self.in_tunnel
    }

    /// Applies a hit, returning the hit points removed.
    ///
    /// Amplifier stacks scale the hit, the shield absorbs first, and the
    /// scaled amount is credited to `source` for kill attribution.
    pub fn take_damage(&mut self, amount: f64, source: Option<TowerId>) -> f64 {
        if !(amount.is_finite() && amount > 0.0) {
            return 0.0;
        }

        let scaled = amount * self.debuffs.damage_multiplier();
        let absorbed = scaled.min(self.debuffs.shield.max(0.0));
        self.debuffs.shield -= absorbed;
        let dealt = scaled - absorbed;
        self.hp -= dealt;

        if let Some(tower) = source {
            self.damage_contributors.record(tower, scaled);
        }
        dealt
    }
}

/// Entry point of an enemy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpawnOrigin {
    /// First point of the level path.
    Path,
    /// Off-screen point on the radial spawn ring.
    Radial {
        /// Pixel position the enemy spawned at.
        origin: Vec2,
    },
}

/// Cumulative damage per tower in first-hit order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DamageLedger {
    entries: Vec<(TowerId, f64)>,
}

impl DamageLedger {
    /// Adds damage dealt by a tower.
    pub fn record(&mut self, tower: TowerId, amount: f64) {
        match self.entries.iter_mut().find(|(id, _)| *id == tower) {
            Some((_, total)) => *total += amount,
            None => self.entries.push((tower, amount)),
        }
    }

    /// Damage dealt by a tower so far.
    #[must_use]
    pub fn total_for(&self, tower: TowerId) -> f64 {
        self.entries
            .iter()
            .find(|(id, _)| *id == tower)
            .map_or(0.0, |(_, total)| *total)
    }

    /// Tower with the largest cumulative damage.
    ///
    /// Ties go to the tower that hit first.
    #[must_use]
    pub fn top_contributor(&self) -> Option<TowerId> {
        let mut best: Option<(TowerId, f64)> = None;
        for (tower, total) in &self.entries {
            match best {
                Some((_, best_total)) if *total <= best_total => {}
                _ => best = Some((*tower, *total)),
            }
        }
        best.map(|(tower, _)| tower)
    }

    /// Iterator over contributions in first-hit order.
    pub fn iter(&self) -> impl Iterator<Item = (TowerId, f64)> + '_ {
        self.entries.iter().copied()
    }
}

/// Timed slow applied by a tower.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlowStack {
    /// Tower that applied the slow.
    pub source: Option<TowerId>,
    /// Fraction of speed removed, `0..1`.
    pub strength: f32,
    /// Seconds remaining.
    pub remaining: f32,
}

/// Timed damage amplifier applied by a tower.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmplifierStack {
    /// Tower that applied the amplifier.
    pub source: Option<TowerId>,
    /// Additional damage fraction taken.
    pub bonus: f64,
    /// Seconds remaining.
    pub remaining: f32,
}

/// Transient debuffs carried by an enemy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Debuffs {
    /// Active slow stacks; only the strongest applies.
    pub slows: Vec<SlowStack>,
    /// Active amplifier stacks; bonuses add up.
    pub amplifiers: Vec<AmplifierStack>,
    /// Shield absorbed before hit points.
    pub shield: f64,
}

/// Strongest slow an enemy can suffer.
const MAX_SLOW: f32 = 0.9;

impl Debuffs {
    /// Adds a slow stack, refreshing any stack from the same source.
    pub fn apply_slow(&mut self, source: Option<TowerId>, strength: f32, duration: f32) {
        let strength = strength.clamp(0.0, MAX_SLOW);
        match self
            .slows
            .iter_mut()
            .find(|stack| source.is_some() && stack.source == source)
        {
            Some(stack) => {
                stack.strength = stack.strength.max(strength);
                stack.remaining = stack.remaining.max(duration);
            }
            None => self.slows.push(SlowStack {
                source,
                strength,
                remaining: duration,
            }),
        }
    }

    /// Adds an amplifier stack, refreshing any stack from the same source.
    pub fn apply_amplifier(&mut self, source: Option<TowerId>, bonus: f64, duration: f32) {
        match self
            .amplifiers
            .iter_mut()
            .find(|stack| source.is_some() && stack.source == source)
        {
            Some(stack) => {
                stack.bonus = stack.bonus.max(bonus);
                stack.remaining = stack.remaining.max(duration);
            }
            None => self.amplifiers.push(AmplifierStack {
                source,
                bonus,
                remaining: duration,
            }),
        }
    }

    /// Speed multiplier after the strongest slow.
    #[must_use]
    pub fn speed_factor(&self) -> f32 {
        let strongest = self
            .slows
            .iter()
            .map(|stack| stack.strength)
            .fold(0.0f32, f32::max);
        1.0 - strongest.min(MAX_SLOW)
    }

    /// Damage multiplier from every amplifier stack.
    #[must_use]
    pub fn damage_multiplier(&self) -> f64 {
        1.0 + self
            .amplifiers
            .iter()
            .map(|stack| stack.bonus.max(0.0))
            .sum::<f64>()
    }

    /// Counts down timers and drops expired stacks.
    pub fn decay(&mut self, delta: f32) {
        for stack in &mut self.slows {
            stack.remaining -= delta;
        }
        for stack in &mut self.amplifiers {
            stack.remaining -= delta;
        }
        self.slows.retain(|stack| stack.remaining > 0.0);
        self.amplifiers.retain(|stack| stack.remaining > 0.0);
    }
}
