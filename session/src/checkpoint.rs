//! Serializable snapshot of a running level.

use serde::{Deserialize, Serialize};
use thero_idle_core::TowerRecord;

/// Everything needed to resume a level where it was left.
///
/// Enemies and projectiles in flight are not captured; a restored level
/// resumes at the start of the checkpointed wave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCheckpoint {
    /// Identifier of the level the snapshot belongs to.
    pub level: String,
    /// Tower roster including connections and stored shots.
    pub towers: Vec<TowerRecord>,
    /// Energy balance.
    pub energy: f64,
    /// Lives left.
    pub lives: f64,
    /// Index of the wave in progress.
    pub wave_index: usize,
    /// Endless cycle in progress.
    #[serde(default)]
    pub cycle: u32,
    /// Whether the level was running in endless mode.
    #[serde(default)]
    pub endless: bool,
}
