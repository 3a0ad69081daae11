//! Error types for canopy-topology.

use thiserror::Error;

/// Result type for topology construction.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Reasons a `(physical_id, root, N)` triple cannot form a tree position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The tree protocol needs at least two participants.
    #[error("tree gather needs at least {min} participants, got {size}")]
    TooFewParticipants { size: usize, min: usize },

    /// The requested root is not a participant.
    #[error("root {root} out of range for {size} participants")]
    RootOutOfRange { root: usize, size: usize },

    /// The local physical id is not a participant.
    #[error("physical id {id} out of range for {size} participants")]
    RankOutOfRange { id: usize, size: usize },
}
