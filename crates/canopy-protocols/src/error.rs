//! Error types for canopy-protocols.

use std::time::Duration;

use canopy_runtime::ParticipantId;
use canopy_topology::{SlotId, TopologyError};
use thiserror::Error;

/// Result type for canopy-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a gather call. None of them are retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The participant set cannot form a tree (fewer than two participants,
    /// or root/rank out of range).
    #[error("invalid topology: {0}")]
    InvalidTopology(#[from] TopologyError),

    /// A peer disagrees on the cluster size for this registration.
    #[error(
        "registration {registration:?} mismatch: local cluster size {local}, participant {sender} sent {remote}"
    )]
    RegistrationMismatch {
        registration: String,
        sender: ParticipantId,
        local: usize,
        remote: usize,
    },

    /// A drain did not observe READY before its deadline.
    #[error("slot {slot} not signalled within {after:?}")]
    Timeout { slot: SlotId, after: Duration },

    /// Not every participant reached the completion barrier before the
    /// deadline.
    #[error("barrier {barrier:?} not released within {after:?}")]
    BarrierTimeout { barrier: String, after: Duration },

    /// The output buffer cannot hold every participant's block.
    #[error("output holds {actual} elements, gather needs {required}")]
    OutputTooSmall { required: usize, actual: usize },

    /// A decoded record names a rank outside the cluster, or its block
    /// does not fit the address space.
    #[error("record from rank {source_rank} does not fit a cluster of {size}")]
    InvalidRecord { source_rank: u64, size: usize },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A record failed to encode or decode.
    #[error("record codec error: {0}")]
    Codec(#[from] canopy_codec::CodecError),

    /// The runtime could not deliver a message or run the barrier.
    #[error("runtime error: {0}")]
    Runtime(#[from] canopy_runtime::Error),
}
