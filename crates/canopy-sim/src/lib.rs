//! Canopy Simulator
//!
//! Runs gathers over an in-process cluster and checks every participant's
//! output against the segments that were contributed.
//!
//! # Architecture
//!
//! - **Simulation**: Spawns one task per participant, each with its own
//!   inbox and dispatcher, and runs one gather on all of them
//! - **Outcome**: Per-participant reports and outputs, serializable to JSON
//!
//! # Usage
//!
//! ```ignore
//! let config = SimulationConfig::default().with_size(16).with_block_size(4);
//! let outcome = Simulation::new(config).run().await?;
//! assert!(outcome.is_correct());
//! ```

mod events;
mod simulation;

pub use events::{contribution, segment, ParticipantOutcome, SimulationOutcome};
pub use simulation::{Simulation, SimulationConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn outcome_serializes_to_json() {
        let outcome = Simulation::new(SimulationConfig::default().with_size(3))
            .run()
            .await
            .unwrap();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["size"], 3);
        assert_eq!(json["participants"].as_array().unwrap().len(), 3);
        assert_eq!(json["participants"][0]["report"]["role"], "Root");
    }

    #[test]
    fn segment_matches_contribution() {
        assert_eq!(segment(2, 3), vec![contribution(2, 0), contribution(2, 1), contribution(2, 2)]);
    }
}
