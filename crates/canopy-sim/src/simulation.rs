//! Gather simulation over an in-process cluster.

use std::time::{Duration, Instant};

use anyhow::Context;
use canopy_codec::BincodeCodec;
use canopy_protocols::{Gather, GatherConfig, GatherNode};
use canopy_runtime::{LocalCluster, LocalClusterConfig};
use tracing::{debug, info};

use crate::events::{segment, ParticipantOutcome, SimulationOutcome};

/// Configuration for the simulation.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of participants
    pub size: usize,
    /// Elements each participant contributes
    pub block_size: usize,
    /// Upper bound on the random delay added to every delivery
    pub max_jitter: Option<Duration>,
    /// Seed for the jitter generator
    pub seed: u64,
    /// Configuration shared by every participant
    pub gather: GatherConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            size: 8,
            block_size: 2,
            max_jitter: None,
            seed: 42,
            gather: GatherConfig::new("canopy-sim/gather"),
        }
    }
}

impl SimulationConfig {
    /// Set the participant count.
    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Set the segment length.
    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Delay every delivery by up to `max`.
    #[must_use]
    pub fn with_jitter(mut self, max: Duration, seed: u64) -> Self {
        self.max_jitter = Some(max);
        self.seed = seed;
        self
    }

    /// Replace the gather configuration.
    #[must_use]
    pub fn with_gather(mut self, gather: GatherConfig) -> Self {
        self.gather = gather;
        self
    }
}

/// Runs gathers and records what every participant saw.
pub struct Simulation {
    config: SimulationConfig,
}

impl Simulation {
    /// Create a new simulation with the given configuration.
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run one gather on every participant and collect the results.
    ///
    /// Fails on the first participant whose gather returned an error.
    pub async fn run(&self) -> anyhow::Result<SimulationOutcome> {
        let SimulationConfig {
            size,
            block_size,
            max_jitter,
            seed,
            ref gather,
        } = self.config;

        let mut cluster = LocalClusterConfig::new(size).with_seed(seed);
        if let Some(max) = max_jitter {
            cluster = cluster.with_jitter(max);
        }

        info!(size, block_size, root = gather.root, jitter = ?max_jitter, "Starting simulated gather");
        let started = Instant::now();

        let endpoints = LocalCluster::with_config(cluster);
        let observer = endpoints
            .first()
            .map(|endpoint| endpoint.participant.clone())
            .context("cluster has no participants")?;

        let mut handles = Vec::with_capacity(size);
        for endpoint in endpoints {
            let config = gather.clone();
            handles.push(tokio::spawn(async move {
                let (participant, inbox) = endpoint.into_parts();
                let node = GatherNode::spawn(participant, inbox);
                let gather = Gather::new(&node, config, BincodeCodec::<u64>::new())?;

                let input = segment(node.local_id(), block_size);
                let mut output = vec![0u64; size * block_size];
                let report = gather.gather(&input, &mut output).await?;
                debug!(participant = node.local_id(), ?report, "Participant finished");

                Ok::<_, canopy_protocols::Error>(ParticipantOutcome { report, output })
            }));
        }

        let mut participants = Vec::with_capacity(size);
        for (id, handle) in handles.into_iter().enumerate() {
            let outcome = handle
                .await
                .with_context(|| format!("participant {id} panicked"))?
                .with_context(|| format!("participant {id} failed"))?;
            participants.push(outcome);
        }

        let outcome = SimulationOutcome {
            size,
            block_size,
            root: gather.root,
            root_segment: gather.root_segment,
            visibility: gather.visibility,
            frames_sent: observer.frames_sent(),
            elapsed_micros: started.elapsed().as_micros() as u64,
            participants,
        };

        info!(
            frames = outcome.frames_sent,
            elapsed_us = outcome.elapsed_micros,
            correct = outcome.is_correct(),
            "Simulated gather complete"
        );

        Ok(outcome)
    }
}
