//! Gather node - a participant handle plus its inbox dispatcher.
//!
//! The dispatcher task is the only code that writes this participant's slot
//! stores. Remote participants never touch them directly; they send
//! [`Message::DeliverRecords`](canopy_runtime::Message) frames that the
//! dispatcher applies in arrival order.

use std::sync::Arc;

use canopy_runtime::{Inbox, ParticipantDirectory, ParticipantId};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::registry::SlotRegistry;

/// A participant ready to take part in gathers.
///
/// Dropping the node stops its dispatcher.
#[derive(Debug)]
pub struct GatherNode<P> {
    participant: P,
    registry: Arc<SlotRegistry>,
    dispatcher: JoinHandle<()>,
}

impl<P: ParticipantDirectory> GatherNode<P> {
    /// Start dispatching `inbox` into a fresh registry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(participant: P, inbox: Inbox) -> Self {
        let registry = Arc::new(SlotRegistry::new(participant.cluster_size()));
        let dispatcher = tokio::spawn(dispatch(registry.clone(), inbox));

        debug!(
            participant = participant.local_id(),
            size = participant.cluster_size(),
            "Started gather node"
        );

        Self {
            participant,
            registry,
            dispatcher,
        }
    }

    /// This participant's physical id.
    pub fn local_id(&self) -> ParticipantId {
        self.participant.local_id()
    }

    /// Number of participants.
    pub fn cluster_size(&self) -> usize {
        self.participant.cluster_size()
    }
}

impl<P> GatherNode<P> {
    /// The participant handle.
    pub fn participant(&self) -> &P {
        &self.participant
    }

    /// Slot stores registered on this participant.
    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }
}

impl<P> Drop for GatherNode<P> {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

async fn dispatch(registry: Arc<SlotRegistry>, mut inbox: Inbox) {
    while let Some(message) = inbox.recv().await {
        match message {
            Ok(message) => registry.dispatch(message),
            Err(e) => warn!(participant = inbox.id(), error = %e, "Dropping undecodable frame"),
        }
    }
    debug!(participant = inbox.id(), "Inbox closed");
}
