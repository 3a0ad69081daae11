//! Canopy Runtime - participants, remote invocation and barriers
//!
//! This crate provides:
//! - The collaborator traits a collective needs from its host runtime
//!   ([`ParticipantDirectory`], [`RemoteInvoker`], [`GlobalBarrier`])
//! - The wire message exchanged between participants ([`Message`])
//! - An in-process reference runtime ([`LocalCluster`]) where every
//!   participant has its own inbox and messages travel as encoded frames
//!
//! # Design Philosophy
//!
//! Remote invocations are one-way and fire-and-forget. A sender never learns
//! whether its message was applied; protocols layer their own completion
//! signals on top (for the tree gather, the slot READY flag).
//!
//! # Example
//!
//! ```rust,ignore
//! use canopy_runtime::{LocalCluster, ParticipantDirectory};
//!
//! let endpoints = LocalCluster::new(4);
//! for endpoint in endpoints {
//!     let (participant, inbox) = endpoint.into_parts();
//!     assert_eq!(participant.cluster_size(), 4);
//! }
//! ```

pub mod error;
pub mod local;
pub mod message;
pub mod traits;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use local::{Inbox, LocalCluster, LocalClusterConfig, LocalEndpoint, LocalParticipant};
pub use message::{DeliverRecords, Message, MsgKind, ParticipantId};
pub use traits::{GlobalBarrier, ParticipantDirectory, RemoteInvoker};
