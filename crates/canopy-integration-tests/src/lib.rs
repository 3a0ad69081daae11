//! Shared harness for cross-crate gather scenarios.

use canopy_codec::BincodeCodec;
use canopy_protocols::{Gather, GatherConfig, GatherNode, GatherReport};
use canopy_runtime::{LocalCluster, LocalClusterConfig, ParticipantId};
use futures::future::join_all;

/// Initial value of every output element.
pub const SENTINEL: i64 = -1;

/// What one participant's gather returned, plus its output buffer.
pub type Outcome = canopy_protocols::Result<(GatherReport, Vec<i64>)>;

/// Segment contributed by physical participant `id`.
pub fn segment(id: ParticipantId, block_size: usize) -> Vec<i64> {
    (0..block_size).map(|i| (id * 100 + i) as i64).collect()
}

/// Run one gather with the same configuration everywhere.
pub async fn run_gather(
    cluster: LocalClusterConfig,
    config: GatherConfig,
    block_size: usize,
) -> anyhow::Result<Vec<Outcome>> {
    run_gather_with(cluster, block_size, move |_| config.clone()).await
}

/// Run one gather, building each participant's configuration from its id.
///
/// Outcomes are indexed by physical id.
pub async fn run_gather_with<F>(
    cluster: LocalClusterConfig,
    block_size: usize,
    config_for: F,
) -> anyhow::Result<Vec<Outcome>>
where
    F: Fn(ParticipantId) -> GatherConfig,
{
    let size = cluster.size;
    let handles = LocalCluster::with_config(cluster)
        .into_iter()
        .enumerate()
        .map(|(id, endpoint)| {
            let config = config_for(id);
            tokio::spawn(async move {
                let (participant, inbox) = endpoint.into_parts();
                let node = GatherNode::spawn(participant, inbox);
                let gather = Gather::new(&node, config, BincodeCodec::<i64>::new())?;
                let mut output = vec![SENTINEL; size * block_size];
                let report = gather.gather(&segment(id, block_size), &mut output).await?;
                Ok::<_, canopy_protocols::Error>((report, output))
            })
        })
        .collect::<Vec<_>>();

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.map_err(anyhow::Error::from))
        .collect()
}
