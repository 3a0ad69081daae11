//! Canopy gather simulator
//!
//! Usage: `canopy-sim [N] [block_size] [root]`
//!
//! Everything else (blocking policy, wait strategy, root segment, visibility,
//! drain timeout) comes from the `CANOPY_*` environment variables.

use std::env;

use anyhow::Context;
use canopy_protocols::GatherConfig;
use canopy_sim::{Simulation, SimulationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("canopy=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();

    let size: usize = match args.get(1) {
        Some(arg) => arg.parse().with_context(|| format!("N: not a number: {arg:?}"))?,
        None => 8,
    };
    let block_size: usize = match args.get(2) {
        Some(arg) => arg.parse().with_context(|| format!("block_size: not a number: {arg:?}"))?,
        None => 2,
    };

    let mut gather = GatherConfig::from_env("canopy-sim/gather")?;
    if let Some(arg) = args.get(3) {
        gather.root = arg.parse().with_context(|| format!("root: not a number: {arg:?}"))?;
    }

    println!("Canopy gather simulator");
    println!("=======================");
    println!("  Participants: {size}");
    println!("  Block size:   {block_size}");
    println!("  Root:         {}", gather.root);
    println!();

    let config = SimulationConfig::default()
        .with_size(size)
        .with_block_size(block_size)
        .with_gather(gather);
    let outcome = Simulation::new(config).run().await?;

    println!("Root (participant {}) output:", outcome.root_participant());
    println!("  {:?}", outcome.root_output());
    println!();
    println!("{}", serde_json::to_string_pretty(&outcome.participants.iter().map(|p| p.report).collect::<Vec<_>>())?);

    if !outcome.is_correct() {
        anyhow::bail!("outputs differ from contributions at participants {:?}", outcome.mismatches());
    }

    Ok(())
}
