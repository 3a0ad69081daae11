//! Wire messages exchanged between participants

use bytes::Bytes;
use canopy_codec::EncodedRecord;
use canopy_topology::SlotId;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Physical participant identifier
pub type ParticipantId = usize;

/// Message type classification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgKind {
    /// Records pushed into a slot store
    DeliverRecords,
}

/// Append `records` to `slot` of the store registered as `registration` on
/// participant `target`, then mark the slot ready.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverRecords {
    /// Call-scoped registration name of the target store
    pub registration: String,
    /// Receiving participant
    pub target: ParticipantId,
    /// Sending participant
    pub source: ParticipantId,
    /// Slot to append to
    pub slot: SlotId,
    /// Cluster size as seen by the sender
    pub world_size: usize,
    /// Records in merge order
    pub records: Vec<EncodedRecord>,
}

/// A one-way remote invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Push records into a remote slot
    DeliverRecords(DeliverRecords),
}

impl Message {
    /// Get the message kind
    pub fn kind(&self) -> MsgKind {
        match self {
            Self::DeliverRecords(_) => MsgKind::DeliverRecords,
        }
    }

    /// Get the receiving participant
    pub fn target(&self) -> ParticipantId {
        match self {
            Self::DeliverRecords(deliver) => deliver.target,
        }
    }

    /// Encode into a frame
    pub fn to_frame(&self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    /// Decode a frame produced by [`Message::to_frame`]
    pub fn from_frame(frame: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(frame)?)
    }
}

impl From<DeliverRecords> for Message {
    fn from(deliver: DeliverRecords) -> Self {
        Self::DeliverRecords(deliver)
    }
}
