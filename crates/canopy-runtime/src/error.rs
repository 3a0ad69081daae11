//! Error types for canopy-runtime.

use thiserror::Error;

use crate::message::ParticipantId;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the participant runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// A message was addressed to a participant that does not exist.
    #[error("unknown participant {target} (cluster size {size})")]
    UnknownParticipant { target: ParticipantId, size: usize },

    /// The target participant's inbox has been dropped.
    #[error("participant {0} is no longer receiving")]
    Disconnected(ParticipantId),

    /// A frame could not be encoded or decoded.
    #[error("frame codec error: {0}")]
    Frame(#[from] bincode::Error),
}
