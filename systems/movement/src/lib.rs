#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic movement system that walks enemies along the level route.
//!
//! Path levels are resolved into pixel segments with cumulative arc lengths;
//! an enemy's progress is the fraction of the total length it has covered.
//! Radial levels spawn enemies on an off-screen ring and pull them straight
//! toward the configured center, progress being the fraction of the ring
//! radius covered. Both modes share the debuff decay applied before movement.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thero_idle_core::{
    Enemy, EnemyUpdateContext, LevelConfig, SpawnContext, SpawnOrigin, Viewport,
};

const DEFAULT_RNG_SEED: u64 = 0x7e40_11d1_a3c5_9b27;

/// Tuning values for the movement system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Seed for the radial spawn angle generator.
    pub rng_seed: u64,
    /// Pixels between the viewport corners and the radial spawn ring.
    pub radial_margin: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rng_seed: DEFAULT_RNG_SEED,
            radial_margin: 32.0,
        }
    }
}

/// Pure system that positions enemies along the level route.
#[derive(Debug)]
pub struct Movement {
    route: Route,
    rng: ChaCha8Rng,
}

impl Movement {
    /// Resolves the level geometry against the provided viewport.
    #[must_use]
    pub fn new(level: &LevelConfig, viewport: Viewport, config: Config) -> Self {
        let route = if level.radial_spawn {
            let center = viewport.to_pixels(level.radial_center().to_vec2());
            let half_diagonal = Vec2::new(viewport.width, viewport.height).length() * 0.5;
            let farthest_corner = [
                Vec2::ZERO,
                Vec2::new(viewport.width, 0.0),
                Vec2::new(0.0, viewport.height),
                Vec2::new(viewport.width, viewport.height),
            ]
            .iter()
            .map(|corner| corner.distance(center))
            .fold(half_diagonal, f32::max);
            Route::Radial {
                center,
                radius: farthest_corner + config.radial_margin.max(0.0),
            }
        } else {
            Route::Path(PathGeometry::new(level, viewport))
        };

        Self {
            route,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Total pixel length of the path, or the ring radius for radial levels.
    #[must_use]
    pub fn route_length(&self) -> f32 {
        match &self.route {
            Route::Path(path) => path.total_length,
            Route::Radial { radius, .. } => *radius,
        }
    }

    /// Pixel position matching a path progress fraction.
    ///
    /// Radial levels have no fixed route and report their center.
    #[must_use]
    pub fn position_at(&self, progress: f32) -> Vec2 {
        match &self.route {
            Route::Path(path) => path.locate(progress).position,
            Route::Radial { center, .. } => *center,
        }
    }

    /// Reports whether the path segment at `progress` is a tunnel.
    #[must_use]
    pub fn is_tunnel_at(&self, progress: f32) -> bool {
        match &self.route {
            Route::Path(path) => path.locate(progress).tunnel,
            Route::Radial { .. } => false,
        }
    }
}

impl SpawnContext for Movement {
    fn path_origin(&self) -> Vec2 {
        self.position_at(0.0)
    }

    fn radial_origin(&mut self) -> Vec2 {
        match self.route {
            Route::Radial { center, radius } => {
                let angle = self.rng.gen_range(0.0..TAU);
                center + Vec2::new(angle.cos(), angle.sin()) * radius
            }
            Route::Path(_) => self.path_origin(),
        }
    }
}

impl EnemyUpdateContext for Movement {
    fn apply_debuffs(&mut self, enemy: &mut Enemy, delta: f32) {
        enemy.debuffs.decay(delta);
    }

    fn advance(&mut self, enemy: &mut Enemy, delta: f32) {
        let speed = enemy.speed.max(0.0) * enemy.debuffs.speed_factor();
        match &self.route {
            Route::Path(path) => {
                let segment = path.locate(enemy.progress);
                enemy.progress += speed * segment.speed_multiplier * delta;
                let arrived = path.locate(enemy.progress);
                enemy.position = arrived.position;
                enemy.in_tunnel = arrived.tunnel;
            }
            Route::Radial { center, .. } => {
                enemy.progress += speed * delta;
                let origin = match enemy.origin {
                    SpawnOrigin::Radial { origin } => origin,
                    SpawnOrigin::Path => enemy.position,
                };
                enemy.position = origin.lerp(*center, enemy.progress.min(1.0));
                enemy.in_tunnel = false;
            }
        }
    }
}

#[derive(Clone, Debug)]
enum Route {
    Path(PathGeometry),
    Radial { center: Vec2, radius: f32 },
}

#[derive(Clone, Debug, Default)]
struct PathGeometry {
    segments: Vec<Segment>,
    start: Vec2,
    total_length: f32,
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    from: Vec2,
    to: Vec2,
    offset: f32,
    length: f32,
    speed_multiplier: f32,
    tunnel: bool,
}

#[derive(Clone, Copy, Debug)]
struct Located {
    position: Vec2,
    speed_multiplier: f32,
    tunnel: bool,
}

impl PathGeometry {
    fn new(level: &LevelConfig, viewport: Viewport) -> Self {
        let Some(first) = level.path.first() else {
            return Self::default();
        };

        let mut segments = Vec::with_capacity(level.path.len().saturating_sub(1));
        let mut offset = 0.0;
        for pair in level.path.windows(2) {
            let from = viewport.to_pixels(pair[0].to_vec2());
            let to = viewport.to_pixels(pair[1].to_vec2());
            let length = from.distance(to);
            if length <= f32::EPSILON {
                continue;
            }
            segments.push(Segment {
                from,
                to,
                offset,
                length,
                speed_multiplier: pair[0].speed_multiplier.unwrap_or(1.0),
                tunnel: pair[0].tunnel,
            });
            offset += length;
        }

        Self {
            segments,
            start: viewport.to_pixels(first.to_vec2()),
            total_length: offset,
        }
    }

    fn locate(&self, progress: f32) -> Located {
        let Some(last) = self.segments.last() else {
            return Located {
                position: self.start,
                speed_multiplier: 1.0,
                tunnel: false,
            };
        };

        let distance = progress.clamp(0.0, 1.0) * self.total_length;
        let index = self
            .segments
            .partition_point(|segment| segment.offset + segment.length < distance);
        let segment = self.segments.get(index).unwrap_or(last);
        let along = ((distance - segment.offset) / segment.length).clamp(0.0, 1.0);

        Located {
            position: segment.from.lerp(segment.to, along),
            speed_multiplier: segment.speed_multiplier,
            tunnel: segment.tunnel && progress < 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thero_idle_core::PathPoint;

    fn point(x: f32, y: f32) -> PathPoint {
        PathPoint {
            x,
            y,
            speed_multiplier: None,
            tunnel: false,
        }
    }

    #[test]
    fn progress_maps_onto_arc_length() {
        let level = LevelConfig {
            path: vec![point(0.0, 0.0), point(0.5, 0.0), point(0.5, 1.0)],
            ..LevelConfig::default()
        };
        let movement = Movement::new(&level, Viewport::new(200.0, 100.0), Config::default());

        assert_eq!(movement.route_length(), 200.0);
        assert_eq!(movement.position_at(0.25), Vec2::new(50.0, 0.0));
        assert_eq!(movement.position_at(0.75), Vec2::new(100.0, 50.0));
        assert_eq!(movement.position_at(1.5), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn empty_path_parks_enemies_at_start() {
        let movement = Movement::new(
            &LevelConfig::default(),
            Viewport::default(),
            Config::default(),
        );
        assert_eq!(movement.path_origin(), Vec2::ZERO);
        assert_eq!(movement.route_length(), 0.0);
    }
}
