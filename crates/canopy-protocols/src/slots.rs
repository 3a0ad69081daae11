//! Child slot store - the synchronization core of the tree gather.
//!
//! Every participant owns one [`ChildSlotStore`] per call. It holds two
//! upward slots (A and B, one per child) and one downward slot written by
//! the parent when the result is fanned out.
//!
//! # Slot Contract
//!
//! Each slot has exactly one writer and one reader per call:
//!
//! 1. The writer appends its records, then flips the state EMPTY → READY
//!    with `Release` ordering.
//! 2. The reader observes READY with `Acquire` ordering, flips it back to
//!    EMPTY and takes the buffered records.
//!
//! The flip is the only ordering primitive: everything appended before the
//! release is visible after the acquire. The buffer mutex is never contended
//! because the writer drops it before the flip and the reader only takes it
//! after observing READY.
//!
//! # Waiting
//!
//! A drain waits without limit unless a deadline is configured. Two wait
//! strategies honour the same contract:
//!
//! - [`WaitStrategy::Spin`]: re-check the flag, yielding to the scheduler
//!   between checks. Lowest latency, burns CPU while waiting.
//! - [`WaitStrategy::Park`]: sleep on a [`Notify`] the writer signals.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use canopy_codec::EncodedRecord;
use canopy_runtime::{DeliverRecords, ParticipantId};
use canopy_topology::SlotId;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{trace, warn};

use crate::error::{Error, Result};

const EMPTY: u8 = 0;
const READY: u8 = 1;

/// Observable state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing to drain.
    Empty,
    /// Records appended and signalled, not yet drained.
    Ready,
}

/// How a drain waits for its slot to become READY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitStrategy {
    /// Poll the flag, yielding between polls.
    Spin,
    /// Sleep until the writer signals.
    #[default]
    Park,
}

/// Wait strategy plus optional deadline for one drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitPolicy {
    /// How to wait.
    pub strategy: WaitStrategy,
    /// Give up after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl WaitPolicy {
    /// Park without a deadline.
    #[must_use]
    pub fn park() -> Self {
        Self::default()
    }

    /// Spin without a deadline.
    #[must_use]
    pub fn spin() -> Self {
        Self {
            strategy: WaitStrategy::Spin,
            timeout: None,
        }
    }

    /// Set the deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A single-writer, single-reader handoff.
#[derive(Debug, Default)]
struct Slot {
    state: AtomicU8,
    buffer: Mutex<Vec<EncodedRecord>>,
    notify: Notify,
}

impl Slot {
    /// Append, then publish. Returns `false` if the slot was already READY.
    fn append_and_signal(&self, records: Vec<EncodedRecord>) -> bool {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(records);

        let flipped = self
            .state
            .compare_exchange(EMPTY, READY, Ordering::Release, Ordering::Relaxed)
            .is_ok();
        self.notify.notify_one();
        flipped
    }

    /// Take the records if READY.
    fn try_drain(&self) -> Option<Vec<EncodedRecord>> {
        self.state
            .compare_exchange(READY, EMPTY, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        let records = std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner));
        Some(records)
    }

    async fn wait_and_drain(&self, strategy: WaitStrategy) -> Vec<EncodedRecord> {
        loop {
            if let Some(records) = self.try_drain() {
                return records;
            }
            match strategy {
                WaitStrategy::Spin => {
                    std::hint::spin_loop();
                    tokio::task::yield_now().await;
                }
                WaitStrategy::Park => self.notify.notified().await,
            }
        }
    }

    fn state(&self) -> SlotState {
        match self.state.load(Ordering::Acquire) {
            READY => SlotState::Ready,
            _ => SlotState::Empty,
        }
    }

    fn reset(&self) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.state.store(EMPTY, Ordering::Release);
    }
}

/// Per-participant, per-call slot state registered under one name.
#[derive(Debug)]
pub struct ChildSlotStore {
    registration: String,
    world_size: usize,
    slots: [Slot; 3],
    mismatch: Mutex<Option<(ParticipantId, usize)>>,
    deliveries: AtomicU64,
}

impl ChildSlotStore {
    /// Create an empty store for a cluster of `world_size` participants.
    pub fn new(registration: impl Into<String>, world_size: usize) -> Self {
        Self {
            registration: registration.into(),
            world_size,
            slots: Default::default(),
            mismatch: Mutex::new(None),
            deliveries: AtomicU64::new(0),
        }
    }

    /// Registration name shared by every participant of the call.
    pub fn registration(&self) -> &str {
        &self.registration
    }

    /// Cluster size this store expects senders to agree on.
    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// Current state of `slot`.
    pub fn state(&self, slot: SlotId) -> SlotState {
        self.slots[slot.index()].state()
    }

    /// Number of deliveries applied since creation or the last reset.
    pub fn deliveries(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }

    /// Append `records` to `slot` and mark it READY.
    ///
    /// Signalling a slot twice before it is drained is not supported; the
    /// records are still appended but the second call returns `false`.
    pub fn append_and_signal(&self, slot: SlotId, records: Vec<EncodedRecord>) -> bool {
        let count = records.len();
        let flipped = self.slots[slot.index()].append_and_signal(records);
        self.deliveries.fetch_add(1, Ordering::Relaxed);

        if flipped {
            trace!(registration = %self.registration, %slot, records = count, "Slot signalled");
        } else {
            warn!(
                registration = %self.registration,
                %slot,
                records = count,
                "Slot signalled twice before drain"
            );
        }
        flipped
    }

    /// Apply a delivery from a remote participant.
    ///
    /// A sender that disagrees on the cluster size still signals the slot so
    /// the waiting drain wakes up and reports the mismatch.
    pub fn accept(&self, deliver: DeliverRecords) -> bool {
        if deliver.world_size != self.world_size {
            warn!(
                registration = %self.registration,
                sender = deliver.source,
                local = self.world_size,
                remote = deliver.world_size,
                "Cluster size mismatch in delivery"
            );
            let mut mismatch = self.mismatch.lock().unwrap_or_else(PoisonError::into_inner);
            mismatch.get_or_insert((deliver.source, deliver.world_size));
        }
        self.append_and_signal(deliver.slot, deliver.records)
    }

    /// Wait until `slot` is READY, reset it to EMPTY and return its records.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if `policy.timeout` elapses first
    /// - [`Error::RegistrationMismatch`] if any delivery to this store came
    ///   from a participant with a different cluster size
    pub async fn wait_and_drain(&self, slot: SlotId, policy: WaitPolicy) -> Result<Vec<EncodedRecord>> {
        let wait = self.slots[slot.index()].wait_and_drain(policy.strategy);
        let records = match policy.timeout {
            None => wait.await,
            Some(after) => tokio::time::timeout(after, wait).await.map_err(|_| {
                warn!(registration = %self.registration, %slot, ?after, "Drain timed out");
                Error::Timeout { slot, after }
            })?,
        };
        self.check_registration()?;

        trace!(registration = %self.registration, %slot, records = records.len(), "Slot drained");
        Ok(records)
    }

    /// Drain A, then B, concatenating in that order.
    pub async fn wait_and_drain_both(&self, policy: WaitPolicy) -> Result<Vec<EncodedRecord>> {
        let mut records = self.wait_and_drain(SlotId::A, policy).await?;
        records.extend(self.wait_and_drain(SlotId::B, policy).await?);
        Ok(records)
    }

    /// Drain the slots of `count` children: none, A only, or A then B.
    pub async fn wait_and_drain_children(&self, count: usize, policy: WaitPolicy) -> Result<Vec<EncodedRecord>> {
        match count {
            0 => Ok(Vec::new()),
            1 => self.wait_and_drain(SlotId::A, policy).await,
            _ => self.wait_and_drain_both(policy).await,
        }
    }

    /// Return every slot to EMPTY and forget previous deliveries.
    pub fn reset(&self) {
        for slot in &self.slots {
            slot.reset();
        }
        *self.mismatch.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.deliveries.store(0, Ordering::Relaxed);
    }

    fn check_registration(&self) -> Result<()> {
        match *self.mismatch.lock().unwrap_or_else(PoisonError::into_inner) {
            None => Ok(()),
            Some((sender, remote)) => Err(Error::RegistrationMismatch {
                registration: self.registration.clone(),
                sender,
                local: self.world_size,
                remote,
            }),
        }
    }
}
