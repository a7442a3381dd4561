#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deferred damage queue modelling projectile travel time.
//!
//! A launched projectile is a plain record with an elapsed-time counter. The
//! queue advances every record each tick and hands out the impacts whose
//! travel time elapsed; applying them to enemies is the caller's job.

use std::time::Duration;

use thero_idle_core::{EnemyId, TowerId};

/// Tuning values for projectile travel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Pixels travelled per second.
    pub base_travel_speed: f32,
    /// Shortest travel time, in seconds.
    pub min_travel_time: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_travel_speed: 480.0,
            min_travel_time: 0.05,
        }
    }
}

/// Extra effect carried by a projectile besides its damage.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ImpactEffect {
    /// Plain damage.
    #[default]
    Damage,
    /// Damage preceded by a timed damage amplifier.
    Amplify {
        /// Additional damage fraction the target takes.
        bonus: f64,
        /// Seconds the amplifier lasts.
        duration: f32,
    },
}

/// Projectile in flight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projectile {
    /// Tower that fired the projectile.
    pub tower: TowerId,
    /// Enemy the projectile is homing on.
    pub target: EnemyId,
    /// Damage delivered on impact.
    pub damage: f64,
    /// Effect applied on impact.
    pub effect: ImpactEffect,
    /// Seconds between launch and impact.
    pub travel_time: f32,
    /// Seconds since launch.
    pub elapsed: f32,
}

/// Projectile whose travel time elapsed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Impact {
    /// Tower credited with the damage.
    pub tower: TowerId,
    /// Enemy struck.
    pub target: EnemyId,
    /// Damage to apply.
    pub damage: f64,
    /// Effect to apply.
    pub effect: ImpactEffect,
}

/// Queue of projectiles in flight, in launch order.
#[derive(Debug, Default)]
pub struct ProjectileQueue {
    config: Config,
    in_flight: Vec<Projectile>,
}

impl ProjectileQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            in_flight: Vec::new(),
        }
    }

    /// Travel time for a shot covering `distance` pixels.
    #[must_use]
    pub fn travel_time(&self, distance: f32) -> f32 {
        let floor = self.config.min_travel_time.max(0.0);
        if self.config.base_travel_speed <= 0.0 || !distance.is_finite() {
            return floor;
        }
        (distance.max(0.0) / self.config.base_travel_speed).max(floor)
    }

    /// Launches a projectile and returns its travel time.
    pub fn launch(
        &mut self,
        tower: TowerId,
        target: EnemyId,
        damage: f64,
        effect: ImpactEffect,
        distance: f32,
    ) -> f32 {
        let travel_time = self.travel_time(distance);
        self.in_flight.push(Projectile {
            tower,
            target,
            damage,
            effect,
            travel_time,
            elapsed: 0.0,
        });
        travel_time
    }

    /// Advances every projectile and appends the ones that landed to `out`.
    ///
    /// Impacts are reported in launch order.
    pub fn advance(&mut self, dt: Duration, out: &mut Vec<Impact>) {
        let delta = dt.as_secs_f32();
        let mut index = 0;
        while index < self.in_flight.len() {
            let projectile = &mut self.in_flight[index];
            projectile.elapsed += delta;
            if projectile.elapsed < projectile.travel_time {
                index += 1;
                continue;
            }

            let landed = self.in_flight.remove(index);
            out.push(Impact {
                tower: landed.tower,
                target: landed.target,
                damage: landed.damage,
                effect: landed.effect,
            });
        }
    }

    /// Drops projectiles homing on an enemy that no longer exists.
    pub fn cancel_for(&mut self, target: EnemyId) {
        self.in_flight.retain(|projectile| projectile.target != target);
    }

    /// Projectiles currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> &[Projectile] {
        &self.in_flight
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Reports whether no projectile is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Drops every projectile.
    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn travel_time_is_floored() {
        let queue = ProjectileQueue::new(Config {
            base_travel_speed: 100.0,
            min_travel_time: 0.2,
        });
        assert_eq!(queue.travel_time(50.0), 0.5);
        assert_eq!(queue.travel_time(5.0), 0.2);
    }

    #[test]
    fn impacts_land_after_travel_in_launch_order() {
        let mut queue = ProjectileQueue::new(Config {
            base_travel_speed: 100.0,
            min_travel_time: 0.0,
        });
        let _ = queue.launch(TowerId::new(1), EnemyId::new(1), 4.0, ImpactEffect::Damage, 50.0);
        let _ = queue.launch(TowerId::new(2), EnemyId::new(2), 6.0, ImpactEffect::Damage, 25.0);
        let _ = queue.launch(TowerId::new(3), EnemyId::new(3), 8.0, ImpactEffect::Damage, 200.0);

        let mut out = Vec::new();
        queue.advance(Duration::from_millis(250), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tower, TowerId::new(2));

        queue.advance(Duration::from_millis(250), &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].damage, 4.0);
        assert_eq!(queue.len(), 1);

        queue.cancel_for(EnemyId::new(3));
        assert!(queue.is_empty());
    }
}
