//! Binary-tree gather.
//!
//! Each participant runs exactly one of three paths, decided by its tree
//! position before any message is sent:
//!
//! - **Leaf**: encode the local segment and push it into the parent's slot
//!   picked by this rank's parity.
//! - **Internal**: drain the child slots (A then B), append the local record,
//!   push the batch upward in one invocation.
//! - **Root**: drain the child slots and scatter every record into the
//!   output at `source_rank × block_size`.
//!
//! With [`Visibility::AllParticipants`] the root then pushes the complete
//! batch back down through every child's parent slot, and every participant
//! scatters it into its own output.

use std::sync::Arc;

use canopy_codec::{ElementCodec, EncodedRecord, RecordCodec};
use canopy_runtime::{
    DeliverRecords, GlobalBarrier, Message, ParticipantDirectory, ParticipantId, RemoteInvoker,
};
use canopy_topology::{RankTopology, Role, SlotId};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::{BlockingPolicy, GatherConfig, RootSegment, Visibility};
use crate::error::{Error, Result};
use crate::node::GatherNode;
use crate::slots::ChildSlotStore;

/// Per-call, per-participant state derived at construction.
#[derive(Debug, Clone)]
pub struct GatherContext {
    topology: RankTopology,
    store: Arc<ChildSlotStore>,
}

impl GatherContext {
    /// Tree position of this participant.
    pub fn topology(&self) -> &RankTopology {
        &self.topology
    }

    /// This participant's slot store for the call.
    pub fn store(&self) -> &Arc<ChildSlotStore> {
        &self.store
    }

    /// Root parameter of the call.
    pub fn root(&self) -> usize {
        self.topology.root()
    }

    /// Relative rank after rotation.
    pub fn rel_rank(&self) -> usize {
        self.topology.rel_rank()
    }

    /// Relative rank of the parent, `None` at the root.
    pub fn parent(&self) -> Option<usize> {
        self.topology.parent()
    }

    /// Number of child slots drained: 0, 1 or 2.
    pub fn expected_child_count(&self) -> usize {
        self.topology.expected_child_count()
    }
}

/// What one participant did during a gather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherReport {
    /// Physical id of the participant.
    pub participant: ParticipantId,
    /// Relative rank of the participant.
    pub rel_rank: usize,
    /// Path taken.
    pub role: Role,
    /// Records drained from child slots plus the local record, if forwarded.
    pub records_merged: usize,
    /// Output elements written locally.
    pub elements_written: usize,
}

/// Gather over a virtual complete binary tree.
pub struct BinaryTreeGather<'n, P, C> {
    node: &'n GatherNode<P>,
    config: GatherConfig,
    codec: RecordCodec<C>,
    context: GatherContext,
}

impl<'n, P, C> BinaryTreeGather<'n, P, C>
where
    P: ParticipantDirectory + RemoteInvoker + GlobalBarrier,
    C: ElementCodec,
    C::Element: Clone,
{
    /// Place this participant in the tree and register its slot store.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTopology`] for fewer than two participants or an
    /// out-of-range root.
    pub fn new(node: &'n GatherNode<P>, config: GatherConfig, codec: C) -> Result<Self> {
        let topology = RankTopology::new(node.local_id(), config.root, node.cluster_size())?;
        let store = node.registry().get_or_create(&config.registration_name);

        debug!(
            participant = node.local_id(),
            rel_rank = topology.rel_rank(),
            role = %topology.role(),
            children = topology.expected_child_count(),
            registration = %config.registration_name,
            "Prepared tree gather"
        );

        Ok(Self {
            node,
            config,
            codec: RecordCodec::new(codec),
            context: GatherContext { topology, store },
        })
    }

    /// Derived per-call state.
    pub fn context(&self) -> &GatherContext {
        &self.context
    }

    /// Configuration of the call.
    pub fn config(&self) -> &GatherConfig {
        &self.config
    }

    /// Contribute `input` and, where this participant sees the result, fill
    /// `output` (`cluster_size × input.len()` elements).
    pub async fn gather(&self, input: &[C::Element], output: &mut [C::Element]) -> Result<GatherReport> {
        let topology = self.context.topology;
        let store = &self.context.store;
        let policy = self.config.wait_policy();
        let block_size = input.len();

        let writes_output =
            topology.is_root() || self.config.visibility == Visibility::AllParticipants;
        let required = topology.size() * block_size;
        if writes_output && output.len() < required {
            return Err(Error::OutputTooSmall {
                required,
                actual: output.len(),
            });
        }

        let mut report = GatherReport {
            participant: topology.physical_id(),
            rel_rank: topology.rel_rank(),
            role: topology.role(),
            records_merged: 0,
            elements_written: 0,
        };

        let own = self.codec.encode(topology.rel_rank() as u64, input)?;

        let assembled = match topology.role() {
            Role::Leaf => {
                report.records_merged = 1;
                self.send_up(vec![own])?;
                None
            }
            Role::Internal => {
                let mut batch = store
                    .wait_and_drain_children(topology.expected_child_count(), policy)
                    .await?;
                batch.push(own);
                report.records_merged = batch.len();
                self.send_up(batch)?;
                None
            }
            Role::Root => {
                let drained = store
                    .wait_and_drain_children(topology.expected_child_count(), policy)
                    .await?;
                report.records_merged = drained.len();

                let mut batch = Vec::with_capacity(drained.len() + 1);
                if self.config.root_segment == RootSegment::Seed {
                    output[..block_size].clone_from_slice(input);
                    report.elements_written += block_size;
                    batch.push(own);
                }
                report.elements_written += self.scatter(&drained, output)?;
                batch.extend(drained);
                Some(batch)
            }
        };

        if self.config.visibility == Visibility::AllParticipants {
            let batch = match assembled {
                Some(batch) => batch,
                None => store.wait_and_drain(SlotId::Parent, policy).await?,
            };
            self.send_down(&batch)?;
            if !topology.is_root() {
                report.elements_written += self.scatter(&batch, output)?;
            }
        }

        if self.config.blocking == BlockingPolicy::Blocking {
            let barrier = self.config.barrier_name();
            let wait = self.node.participant().wait(&barrier);
            match policy.timeout {
                None => wait.await?,
                Some(after) => tokio::time::timeout(after, wait).await.map_err(|_| {
                    warn!(participant = report.participant, %barrier, ?after, "Barrier timed out");
                    Error::BarrierTimeout {
                        barrier: barrier.clone(),
                        after,
                    }
                })??,
            }
        }

        debug!(
            participant = report.participant,
            rel_rank = report.rel_rank,
            role = ?report.role,
            records = report.records_merged,
            written = report.elements_written,
            "Gather complete"
        );

        Ok(report)
    }

    /// Push `records` into the parent's slot chosen by this rank's parity.
    fn send_up(&self, records: Vec<EncodedRecord>) -> Result<()> {
        let topology = &self.context.topology;
        let Some(parent) = topology.parent_physical_id() else {
            return Ok(());
        };
        let slot = topology.upward_slot();

        trace!(
            rel_rank = topology.rel_rank(),
            parent,
            %slot,
            records = records.len(),
            "Sending records upward"
        );

        self.deliver(parent, slot, records)
    }

    /// Push the assembled batch into every child's parent slot.
    fn send_down(&self, records: &[EncodedRecord]) -> Result<()> {
        for (child, physical) in self.context.topology.children_physical() {
            trace!(
                rel_rank = self.context.topology.rel_rank(),
                child,
                records = records.len(),
                "Fanning records out"
            );
            self.deliver(physical, SlotId::Parent, records.to_vec())?;
        }
        Ok(())
    }

    fn deliver(&self, target: ParticipantId, slot: SlotId, records: Vec<EncodedRecord>) -> Result<()> {
        let message: Message = DeliverRecords {
            registration: self.config.registration_name.clone(),
            target,
            source: self.node.local_id(),
            slot,
            world_size: self.context.topology.size(),
            records,
        }
        .into();
        self.node.participant().invoke(target, &message)?;
        Ok(())
    }

    /// Decode `records` and write each one at `source_rank × element_count`.
    fn scatter(&self, records: &[EncodedRecord], output: &mut [C::Element]) -> Result<usize> {
        let size = self.context.topology.size();
        let mut written = 0;

        for record in records {
            let decoded = self.codec.decode(record)?;
            let source_rank = decoded.source_rank();
            let rank = usize::try_from(source_rank)
                .ok()
                .filter(|&rank| rank < size)
                .ok_or(Error::InvalidRecord { source_rank, size })?;

            let block = decoded.header().len()?;
            let (offset, end) = rank
                .checked_mul(block)
                .and_then(|offset| Some((offset, offset.checked_add(block)?)))
                .ok_or(Error::InvalidRecord { source_rank, size })?;
            if end > output.len() {
                return Err(Error::OutputTooSmall {
                    required: end,
                    actual: output.len(),
                });
            }

            let mut elements = decoded.elements();
            for (slot, element) in output[offset..end].iter_mut().zip(elements.by_ref()) {
                *slot = element?;
                written += 1;
            }
            elements.finish()?;
        }

        Ok(written)
    }
}

impl<P, C> Drop for BinaryTreeGather<'_, P, C> {
    /// Every writer of this participant's slots has been drained by the time
    /// a completed call is dropped, so nothing recreates the store.
    fn drop(&mut self) {
        self.node.registry().release(&self.context.store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RootSegment;
    use crate::slots::WaitStrategy;
    use canopy_codec::BincodeCodec;
    use canopy_runtime::{LocalCluster, LocalClusterConfig, LocalParticipant};
    use std::time::Duration;

    type Outcome = (GatherReport, Vec<i64>);

    /// Run one gather on every participant; `inputs[id]` is participant `id`'s segment.
    async fn run(cluster: LocalClusterConfig, config: GatherConfig, inputs: Vec<Vec<i64>>) -> Vec<Outcome> {
        let size = cluster.size;
        let mut handles = Vec::new();
        for (endpoint, input) in LocalCluster::with_config(cluster).into_iter().zip(inputs) {
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                let (participant, inbox) = endpoint.into_parts();
                let node = GatherNode::spawn(participant, inbox);
                let gather = BinaryTreeGather::new(&node, config, BincodeCodec::<i64>::new()).unwrap();
                let mut output = vec![-1i64; size * input.len()];
                let report = gather.gather(&input, &mut output).await.unwrap();
                (report, output)
            }));
        }
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }
        outcomes
    }

    fn segments(size: usize, block: usize) -> Vec<Vec<i64>> {
        (0..size)
            .map(|id| (0..block).map(|i| (id * 10 + i) as i64).collect())
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_four_participants_root_zero_leaves_root_offset() {
        let inputs = vec![vec![0, 1], vec![10, 11], vec![20, 21], vec![30, 31]];
        let config = GatherConfig::new("n4")
            .non_blocking()
            .with_root_segment(RootSegment::Omit);
        let outcomes = run(LocalClusterConfig::new(4), config, inputs).await;

        let (report, output) = &outcomes[0];
        assert_eq!(report.role, Role::Root);
        assert_eq!(report.records_merged, 3);
        assert_eq!(report.elements_written, 6);
        assert_eq!(output, &vec![-1, -1, 10, 11, 20, 21, 30, 31]);

        assert_eq!(outcomes[1].0.role, Role::Internal);
        assert_eq!(outcomes[1].0.records_merged, 2);
        assert_eq!(outcomes[3].0.role, Role::Leaf);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_seeded_root_fills_every_offset() {
        let outcomes = run(LocalClusterConfig::new(4), GatherConfig::new("seed"), segments(4, 2)).await;
        assert_eq!(outcomes[0].1, vec![0, 1, 10, 11, 20, 21, 30, 31]);
        assert_eq!(outcomes[0].0.elements_written, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rotated_root_orders_by_relative_rank() {
        // root = 1, N = 3: physical 0 -> rel 1, 1 -> rel 2, 2 -> rel 0.
        let config = GatherConfig::new("rot").with_root(1);
        let outcomes = run(LocalClusterConfig::new(3), config, segments(3, 2)).await;

        let (root_report, root_output) = &outcomes[2];
        assert_eq!(root_report.role, Role::Root);
        assert_eq!(root_output, &vec![20, 21, 0, 1, 10, 11]);

        assert_eq!(outcomes[1].0.rel_rank, 2);
        assert_eq!(outcomes[1].0.role, Role::Leaf);
        assert_eq!(outcomes[1].1, vec![-1; 6]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fan_out_reaches_everyone() {
        let config = GatherConfig::new("all").with_visibility(Visibility::AllParticipants);
        let outcomes = run(LocalClusterConfig::new(7), config, segments(7, 3)).await;

        let expected = outcomes[0].1.clone();
        assert!(!expected.contains(&-1));
        for (report, output) in &outcomes {
            assert_eq!(output, &expected, "participant {}", report.participant);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_spin_strategy_with_jitter() {
        let cluster = LocalClusterConfig::new(6)
            .with_jitter(Duration::from_millis(3))
            .with_seed(11);
        let config = GatherConfig::new("spin").with_wait_strategy(WaitStrategy::Spin);
        let outcomes = run(cluster, config, segments(6, 1)).await;
        assert_eq!(outcomes[0].1, vec![0, 10, 20, 30, 40, 50]);
    }

    #[tokio::test]
    async fn test_rejects_single_participant() {
        let (participant, inbox) = LocalCluster::new(1).pop().unwrap().into_parts();
        let node: GatherNode<LocalParticipant> = GatherNode::spawn(participant, inbox);
        let result = BinaryTreeGather::new(&node, GatherConfig::new("one"), BincodeCodec::<i64>::new());
        assert!(matches!(result, Err(Error::InvalidTopology(_))));
    }

    #[tokio::test]
    async fn test_root_output_too_small() {
        let (participant, inbox) = LocalCluster::new(2).remove(0).into_parts();
        let node = GatherNode::spawn(participant, inbox);
        let gather = BinaryTreeGather::new(&node, GatherConfig::new("small"), BincodeCodec::<i64>::new()).unwrap();

        let mut output = vec![0i64; 3];
        let err = gather.gather(&[1, 2], &mut output).await.unwrap_err();
        assert!(matches!(err, Error::OutputTooSmall { required: 4, actual: 3 }));
    }

    #[cfg(target_pointer_width = "64")]
    #[tokio::test]
    async fn test_oversized_record_is_rejected() {
        use canopy_codec::EncodedRecord;
        use canopy_runtime::RemoteInvoker;

        let mut endpoints = LocalCluster::new(2);
        let (p1, inbox1) = endpoints.pop().unwrap().into_parts();
        let (p0, inbox0) = endpoints.pop().unwrap().into_parts();
        let root = GatherNode::spawn(p0, inbox0);
        let _leaf = GatherNode::spawn(p1.clone(), inbox1);

        // Rank 1 with 2^63 elements: the block end overflows usize.
        let mut raw = 1u64.to_le_bytes().to_vec();
        raw.extend_from_slice(&(1u64 << 63).to_le_bytes());
        let message: Message = DeliverRecords {
            registration: "oversized".into(),
            target: 0,
            source: 1,
            slot: SlotId::A,
            world_size: 2,
            records: vec![EncodedRecord::from_bytes(raw)],
        }
        .into();
        p1.invoke(0, &message).unwrap();

        let config = GatherConfig::new("oversized").non_blocking();
        let gather = BinaryTreeGather::new(&root, config, BincodeCodec::<i64>::new()).unwrap();
        let mut output = vec![0i64; 4];
        let err = gather.gather(&[1, 2], &mut output).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { source_rank: 1, size: 2 }));
    }

    #[tokio::test]
    async fn test_store_released_on_drop() {
        let (participant, inbox) = LocalCluster::new(2).remove(0).into_parts();
        let node = GatherNode::spawn(participant, inbox);
        let gather = BinaryTreeGather::new(&node, GatherConfig::new("scoped"), BincodeCodec::<i64>::new()).unwrap();
        assert!(node.registry().get("scoped").is_some());

        drop(gather);
        assert!(node.registry().is_empty());
    }

    #[tokio::test]
    async fn test_context_matches_topology() {
        let (participant, inbox) = LocalCluster::new(5).remove(1).into_parts();
        let node = GatherNode::spawn(participant, inbox);
        let gather = BinaryTreeGather::new(&node, GatherConfig::new("ctx"), BincodeCodec::<i64>::new()).unwrap();

        let context = gather.context();
        assert_eq!(context.root(), 0);
        assert_eq!(context.rel_rank(), 1);
        assert_eq!(context.parent(), Some(0));
        assert_eq!(context.expected_child_count(), 2);
        assert_eq!(context.store().registration(), "ctx");
    }
}
