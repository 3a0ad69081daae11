//! Collaborator interfaces a collective consumes from its host runtime.

use std::future::Future;

use crate::error::Result;
use crate::message::{Message, ParticipantId};

/// Membership of the participant set for one call.
pub trait ParticipantDirectory {
    /// Number of participants, identical everywhere for one call.
    fn cluster_size(&self) -> usize;

    /// This process's physical id in `0..cluster_size()`.
    fn local_id(&self) -> ParticipantId;
}

/// Fire-and-forget execution on a remote participant.
///
/// `invoke` returns once the message has been handed to the transport. No
/// acknowledgment is ever delivered back.
pub trait RemoteInvoker {
    /// Send `message` to `target`.
    fn invoke(&self, target: ParticipantId, message: &Message) -> Result<()>;
}

/// Named all-participants rendezvous.
pub trait GlobalBarrier {
    /// Wait until every participant has called `wait` with the same `name`.
    fn wait(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}
