//! Results of a simulated gather.

use canopy_protocols::{GatherReport, RootSegment, Visibility};
use canopy_topology::{physical_id, Rank};
use serde::{Deserialize, Serialize};

/// Value participant `physical` contributes at position `index` of its segment.
///
/// Segments never overlap for fewer than 1000 elements per participant, so a
/// misplaced block is visible in the output.
pub fn contribution(physical: Rank, index: usize) -> u64 {
    (physical * 1000 + index) as u64 + 1
}

/// Input segment of participant `physical`.
pub fn segment(physical: Rank, block_size: usize) -> Vec<u64> {
    (0..block_size).map(|i| contribution(physical, i)).collect()
}

/// What one participant returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantOutcome {
    /// Summary returned by `gather`.
    pub report: GatherReport,
    /// The participant's output buffer after the call.
    pub output: Vec<u64>,
}

/// Everything one simulated gather produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub size: usize,
    pub block_size: usize,
    pub root: Rank,
    pub root_segment: RootSegment,
    pub visibility: Visibility,
    /// Frames sent across the whole cluster.
    pub frames_sent: u64,
    pub elapsed_micros: u64,
    /// Indexed by physical id.
    pub participants: Vec<ParticipantOutcome>,
}

impl SimulationOutcome {
    /// Physical id of the participant that ended up as the tree root.
    pub fn root_participant(&self) -> Rank {
        physical_id(0, self.root, self.size)
    }

    /// The root's output buffer.
    pub fn root_output(&self) -> &[u64] {
        &self.participants[self.root_participant()].output
    }

    /// Output the root should hold: every segment at its relative rank's
    /// offset, the root's own offset zeroed when it is omitted.
    pub fn expected_output(&self) -> Vec<u64> {
        let mut expected = Vec::with_capacity(self.size * self.block_size);
        for rel in 0..self.size {
            if rel == 0 && self.root_segment == RootSegment::Omit {
                expected.extend(std::iter::repeat(0).take(self.block_size));
            } else {
                expected.extend(segment(physical_id(rel, self.root, self.size), self.block_size));
            }
        }
        expected
    }

    /// Physical ids whose output differs from what they should hold.
    ///
    /// Under root-only visibility only the root is checked.
    pub fn mismatches(&self) -> Vec<Rank> {
        let expected = self.expected_output();
        let root = self.root_participant();
        self.participants
            .iter()
            .enumerate()
            .filter(|(id, _)| self.visibility == Visibility::AllParticipants || *id == root)
            .filter(|(_, outcome)| outcome.output != expected)
            .map(|(id, _)| id)
            .collect()
    }

    /// Check if every checked output is correct.
    pub fn is_correct(&self) -> bool {
        self.mismatches().is_empty()
    }
}
