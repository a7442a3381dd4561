//! Failures reported by the level session.

use thero_idle_core::CheckpointError;
use thero_idle_system_tower_orchestration::{ConfigError, TowerActionError};
use thiserror::Error;

/// Failures surfaced by the level session.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SessionError {
    /// The command needs a level to be entered first.
    #[error("no level is active")]
    NoActiveLevel,
    /// A checkpoint was captured on a different level.
    #[error("checkpoint belongs to level `{found}`, not `{expected}`")]
    LevelMismatch {
        /// Level currently entered.
        expected: String,
        /// Level named by the checkpoint.
        found: String,
    },
    /// A tower action was rejected.
    #[error(transparent)]
    Tower(#[from] TowerActionError),
    /// A checkpoint could not be restored.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    /// The session was configured with unusable values.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
