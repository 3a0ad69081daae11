//! In-process cluster for tests and simulation
//!
//! Every participant gets:
//! - An unbounded inbox of encoded frames
//! - A [`LocalParticipant`] handle implementing the collaborator traits
//!
//! Messages are framed with bincode on send and decoded on receive, so the
//! protocol sees exactly what a networked transport would deliver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, Barrier};

use crate::error::{Error, Result};
use crate::message::{Message, ParticipantId};
use crate::traits::{GlobalBarrier, ParticipantDirectory, RemoteInvoker};

/// Local cluster configuration
#[derive(Debug, Clone)]
pub struct LocalClusterConfig {
    /// Number of participants
    pub size: usize,
    /// Upper bound of a random per-message delivery delay.
    /// `None` delivers synchronously inside `invoke`.
    pub max_jitter: Option<Duration>,
    /// Seed for the jitter generator
    pub seed: u64,
}

impl Default for LocalClusterConfig {
    fn default() -> Self {
        Self {
            size: 4,
            max_jitter: None,
            seed: 42,
        }
    }
}

impl LocalClusterConfig {
    /// Create a config for `size` participants.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Delay every delivery by a random duration up to `max`.
    #[must_use]
    pub fn with_jitter(mut self, max: Duration) -> Self {
        self.max_jitter = Some(max);
        self
    }

    /// Set the jitter seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// State shared by every participant of one cluster
struct Shared {
    config: LocalClusterConfig,
    inboxes: Vec<mpsc::UnboundedSender<Bytes>>,
    barriers: Mutex<HashMap<String, Arc<Barrier>>>,
    rng: Mutex<StdRng>,
    frames_sent: AtomicU64,
}

impl Shared {
    fn jitter(&self) -> Option<Duration> {
        let max = self.config.max_jitter?;
        let max_micros = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Some(Duration::from_micros(rng.gen_range(0..=max_micros)))
    }
}

/// Builder for in-process clusters
pub struct LocalCluster;

impl LocalCluster {
    /// Create `size` connected participants with synchronous delivery.
    pub fn new(size: usize) -> Vec<LocalEndpoint> {
        Self::with_config(LocalClusterConfig::new(size))
    }

    /// Create connected participants from a configuration.
    pub fn with_config(config: LocalClusterConfig) -> Vec<LocalEndpoint> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..config.size).map(|_| mpsc::unbounded_channel()).unzip();

        tracing::debug!(
            size = config.size,
            jitter = ?config.max_jitter,
            "Created local cluster"
        );

        let shared = Arc::new(Shared {
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            config,
            inboxes: senders,
            barriers: Mutex::new(HashMap::new()),
            frames_sent: AtomicU64::new(0),
        });

        receivers
            .into_iter()
            .enumerate()
            .map(|(id, rx)| LocalEndpoint {
                participant: LocalParticipant {
                    id,
                    shared: shared.clone(),
                },
                inbox: Inbox { id, rx },
            })
            .collect()
    }
}

/// One participant's handle and inbox
pub struct LocalEndpoint {
    /// Handle implementing the collaborator traits
    pub participant: LocalParticipant,
    /// Frames addressed to this participant
    pub inbox: Inbox,
}

impl LocalEndpoint {
    /// Split into handle and inbox.
    pub fn into_parts(self) -> (LocalParticipant, Inbox) {
        (self.participant, self.inbox)
    }
}

/// Handle for one participant of a [`LocalCluster`]
#[derive(Clone)]
pub struct LocalParticipant {
    id: ParticipantId,
    shared: Arc<Shared>,
}

impl LocalParticipant {
    /// Named barriers that have not released yet
    pub fn open_barriers(&self) -> usize {
        self.shared
            .barriers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total frames sent by every participant of this cluster
    pub fn frames_sent(&self) -> u64 {
        self.shared.frames_sent.load(Ordering::Relaxed)
    }

    fn barrier(&self, name: &str) -> Arc<Barrier> {
        let mut barriers = self
            .shared
            .barriers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        barriers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Barrier::new(self.shared.config.size)))
            .clone()
    }
}

impl std::fmt::Debug for LocalParticipant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalParticipant")
            .field("id", &self.id)
            .field("size", &self.shared.config.size)
            .finish()
    }
}

impl ParticipantDirectory for LocalParticipant {
    fn cluster_size(&self) -> usize {
        self.shared.config.size
    }

    fn local_id(&self) -> ParticipantId {
        self.id
    }
}

impl RemoteInvoker for LocalParticipant {
    /// Frame `message` and push it into `target`'s inbox.
    ///
    /// With jitter configured the push happens on a spawned task, so this
    /// must be called from within a tokio runtime.
    fn invoke(&self, target: ParticipantId, message: &Message) -> Result<()> {
        let tx = self
            .shared
            .inboxes
            .get(target)
            .ok_or(Error::UnknownParticipant {
                target,
                size: self.shared.config.size,
            })?
            .clone();
        let frame = message.to_frame()?;
        self.shared.frames_sent.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(
            source = self.id,
            target,
            kind = ?message.kind(),
            bytes = frame.len(),
            "Invoking remote participant"
        );

        match self.shared.jitter() {
            None => tx.send(frame).map_err(|_| Error::Disconnected(target)),
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if tx.send(frame).is_err() {
                        tracing::warn!(target, "Dropped delayed frame: participant gone");
                    }
                });
                Ok(())
            }
        }
    }
}

impl GlobalBarrier for LocalParticipant {
    fn wait(&self, name: &str) -> impl std::future::Future<Output = Result<()>> + Send {
        let barrier = self.barrier(name);
        let shared = self.shared.clone();
        let id = self.id;
        let name = name.to_string();
        async move {
            tracing::trace!(participant = id, barrier = %name, "Entering barrier");
            // Everyone fetched the barrier before it released, so the leader
            // can drop the named entry.
            if barrier.wait().await.is_leader() {
                let mut barriers = shared.barriers.lock().unwrap_or_else(PoisonError::into_inner);
                if barriers.get(&name).is_some_and(|current| Arc::ptr_eq(current, &barrier)) {
                    barriers.remove(&name);
                }
            }
            Ok(())
        }
    }
}

/// Receiving end of a participant's frames
pub struct Inbox {
    id: ParticipantId,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Inbox {
    /// Owner of this inbox
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Wait for the next message. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Result<Message>> {
        let frame = self.rx.recv().await?;
        Some(Message::from_frame(&frame))
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Result<Message>> {
        let frame = self.rx.try_recv().ok()?;
        Some(Message::from_frame(&frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::DeliverRecords;
    use canopy_topology::SlotId;
    use tokio_test::{assert_pending, assert_ready};

    fn deliver(target: ParticipantId, source: ParticipantId) -> Message {
        DeliverRecords {
            registration: "test".into(),
            target,
            source,
            slot: SlotId::for_child(source),
            world_size: 3,
            records: vec![canopy_codec::encode_bincode(source as u64, &[source as u8]).unwrap()],
        }
        .into()
    }

    #[test]
    fn test_cluster_creation() {
        let endpoints = LocalCluster::new(3);
        assert_eq!(endpoints.len(), 3);
        for (id, endpoint) in endpoints.iter().enumerate() {
            assert_eq!(endpoint.participant.local_id(), id);
            assert_eq!(endpoint.participant.cluster_size(), 3);
            assert_eq!(endpoint.inbox.id(), id);
        }
    }

    #[tokio::test]
    async fn test_invoke_delivers_frame() {
        let mut endpoints = LocalCluster::new(3);
        let (p2, _) = endpoints.pop().unwrap().into_parts();
        let (_, mut inbox1) = endpoints.pop().unwrap().into_parts();

        p2.invoke(1, &deliver(1, 2)).unwrap();

        let Message::DeliverRecords(msg) = inbox1.recv().await.unwrap().unwrap();
        assert_eq!(msg.source, 2);
        assert_eq!(msg.slot, SlotId::B);
        assert_eq!(p2.frames_sent(), 1);
        assert!(inbox1.try_recv().is_none());
    }

    #[test]
    fn test_unknown_participant() {
        let endpoints = LocalCluster::new(2);
        let err = endpoints[0].participant.invoke(5, &deliver(5, 0)).unwrap_err();
        assert!(matches!(err, Error::UnknownParticipant { target: 5, size: 2 }));
    }

    #[test]
    fn test_dropped_inbox_is_disconnected() {
        let mut endpoints = LocalCluster::new(2);
        let (_, inbox1) = endpoints.pop().unwrap().into_parts();
        drop(inbox1);
        let err = endpoints[0].participant.invoke(1, &deliver(1, 0)).unwrap_err();
        assert!(matches!(err, Error::Disconnected(1)));
    }

    #[tokio::test]
    async fn test_jittered_delivery_arrives() {
        let config = LocalClusterConfig::new(3)
            .with_jitter(Duration::from_millis(5))
            .with_seed(7);
        let mut endpoints = LocalCluster::with_config(config);
        let (_, mut inbox0) = endpoints.remove(0).into_parts();

        endpoints[0].participant.invoke(0, &deliver(0, 1)).unwrap();
        endpoints[1].participant.invoke(0, &deliver(0, 2)).unwrap();

        let mut sources = Vec::new();
        for _ in 0..2 {
            let Message::DeliverRecords(msg) = inbox0.recv().await.unwrap().unwrap();
            sources.push(msg.source);
        }
        sources.sort_unstable();
        assert_eq!(sources, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_barrier_waits_for_everyone() {
        let endpoints = LocalCluster::new(2);
        let a = endpoints[0].participant.clone();
        let b = endpoints[1].participant.clone();

        let mut first = tokio_test::task::spawn(a.wait("done"));
        assert_pending!(first.poll());

        let mut second = tokio_test::task::spawn(b.wait("done"));
        assert_eq!(a.open_barriers(), 1);
        assert_ready!(second.poll()).unwrap();
        assert!(first.is_woken());
        assert_ready!(first.poll()).unwrap();
        assert_eq!(a.open_barriers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_barriers_released_after_each_round() {
        let endpoints = LocalCluster::new(3);
        let participants: Vec<_> = endpoints.iter().map(|e| e.participant.clone()).collect();

        for round in 0..20 {
            let name = format!("round-{round}");
            let waits = participants.iter().map(|p| {
                let p = p.clone();
                let name = name.clone();
                tokio::spawn(async move { p.wait(&name).await })
            });
            for handle in waits.collect::<Vec<_>>() {
                handle.await.unwrap().unwrap();
            }
        }
        assert_eq!(participants[0].open_barriers(), 0);
    }
}
