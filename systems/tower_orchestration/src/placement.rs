//! Placement rules and the player's tower loadout.

use std::collections::BTreeSet;

use glam::Vec2;
use thero_idle_core::{PathPoint, PlacementRequest, PlacementValidator, TowerType};

/// Validator refusing spots outside the battlefield or too close to the path.
#[derive(Clone, Debug, PartialEq)]
pub struct PathClearance {
    path: Vec<Vec2>,
    clearance: f32,
}

impl PathClearance {
    /// Creates a validator keeping `clearance` normalized units away from the path.
    #[must_use]
    pub fn new(path: &[PathPoint], clearance: f32) -> Self {
        Self {
            path: path.iter().map(PathPoint::to_vec2).collect(),
            clearance: clearance.max(0.0),
        }
    }

    /// Validator for levels without a path; only the bounds are checked.
    #[must_use]
    pub fn open() -> Self {
        Self {
            path: Vec::new(),
            clearance: 0.0,
        }
    }

    fn distance_to_path(&self, point: Vec2) -> Option<f32> {
        match self.path.as_slice() {
            [] => None,
            [only] => Some(only.distance(point)),
            points => points
                .windows(2)
                .map(|segment| distance_to_segment(point, segment[0], segment[1]))
                .min_by(f32::total_cmp),
        }
    }
}

impl PlacementValidator for PathClearance {
    fn validate(&self, request: &PlacementRequest<'_>) -> Result<(), String> {
        let point = request.normalized;
        let inside = (0.0..=1.0).contains(&point.x) && (0.0..=1.0).contains(&point.y);
        if !inside {
            return Err("towers must be placed on the battlefield".to_owned());
        }
        if let Some(distance) = self.distance_to_path(point) {
            if distance < self.clearance {
                return Err("too close to the enemy path".to_owned());
            }
        }
        Ok(())
    }
}

fn distance_to_segment(point: Vec2, start: Vec2, end: Vec2) -> f32 {
    let span = end - start;
    let length_squared = span.length_squared();
    if length_squared <= f32::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(span) / length_squared).clamp(0.0, 1.0);
    point.distance(start + span * t)
}

/// Tower types the player brought into the level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loadout {
    slots: Vec<TowerType>,
    unlocked: BTreeSet<TowerType>,
}

impl Loadout {
    /// Creates a loadout from its slots; every slotted type counts as unlocked.
    #[must_use]
    pub fn new(slots: Vec<TowerType>) -> Self {
        let unlocked = slots.iter().copied().collect();
        Self { slots, unlocked }
    }

    /// Slotted types in display order.
    #[must_use]
    pub fn slots(&self) -> &[TowerType] {
        &self.slots
    }

    /// First slotted type, used when nothing is being dragged.
    #[must_use]
    pub fn first_available(&self) -> Option<TowerType> {
        self.slots
            .iter()
            .copied()
            .find(|tower_type| self.unlocked.contains(tower_type))
    }

    /// Marks a type as unlocked.
    pub fn unlock(&mut self, tower_type: TowerType) {
        let _ = self.unlocked.insert(tower_type);
    }

    /// Removes a type from the unlocked set.
    pub fn lock(&mut self, tower_type: TowerType) {
        let _ = self.unlocked.remove(&tower_type);
    }

    /// Replaces the slotted types.
    pub fn set_slots(&mut self, slots: Vec<TowerType>) {
        self.slots = slots;
    }

    /// Reports whether the type is both unlocked and slotted.
    #[must_use]
    pub fn is_available(&self, tower_type: TowerType) -> bool {
        self.unlocked.contains(&tower_type) && self.slots.contains(&tower_type)
    }
}

impl Default for Loadout {
    fn default() -> Self {
        Self::new(vec![
            TowerType::Alpha,
            TowerType::Beta,
            TowerType::Gamma,
            TowerType::Delta,
        ])
    }
}
