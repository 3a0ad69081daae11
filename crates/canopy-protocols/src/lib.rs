//! Canopy Protocols - Binary-Tree Gather
//!
//! This crate implements a gather collective: every participant contributes
//! one segment, and the root ends up with all segments ordered by relative
//! rank.
//!
//! # Overview
//!
//! Participants form a virtual complete binary tree over ranks rotated by
//! the chosen root. Contributions travel upward as encoded records:
//!
//! - **Leaves** push their own record straight into the parent's slot
//! - **Internal nodes** drain their children's slots (A before B), append
//!   their own record and push the batch upward in one invocation
//! - **The root** drains its children's slots and scatters every record into
//!   the output at `source_rank × block_size`
//!
//! Every slot is written by one participant and drained by one participant,
//! exactly once per call. The only suspension points are the drains.
//!
//! # Example
//!
//! ```rust,ignore
//! use canopy_codec::BincodeCodec;
//! use canopy_protocols::{Gather, GatherConfig, GatherNode};
//! use canopy_runtime::LocalCluster;
//!
//! for endpoint in LocalCluster::new(4) {
//!     tokio::spawn(async move {
//!         let (participant, inbox) = endpoint.into_parts();
//!         let node = GatherNode::spawn(participant, inbox);
//!         let gather = Gather::new(&node, GatherConfig::new("call-1"), BincodeCodec::<u64>::new())?;
//!
//!         let mut output = vec![0u64; 4 * 2];
//!         let report = gather.gather(&[1, 2], &mut output).await?;
//!         tracing::info!(?report, "gathered");
//!         Ok::<_, canopy_protocols::Error>(())
//!     });
//! }
//! ```

pub mod config;
pub mod error;
pub mod gather;
pub mod node;
pub mod registry;
pub mod slots;
pub mod tree;

pub use config::{BlockingPolicy, CommunicationPattern, GatherConfig, RootSegment, Visibility};
pub use error::{Error, Result};
pub use gather::Gather;
pub use node::GatherNode;
pub use registry::SlotRegistry;
pub use slots::{ChildSlotStore, SlotState, WaitPolicy, WaitStrategy};
pub use tree::{BinaryTreeGather, GatherContext, GatherReport};

// Re-export the types callers need to drive a gather
pub use canopy_topology::{RankTopology, Role, SlotId};
