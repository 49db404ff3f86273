//! Warden convergence simulator CLI
//!
//! Runs a seeded node-churn simulation against the partition guardian and
//! reports whether the cluster healed.
//!
//! # Example
//!
//! ```bash
//! # Default run: 8 nodes, 64 partitions, 200 churn ticks
//! converge
//!
//! # Heavier churn on a bigger cluster
//! converge -n 20 -p 1024 --churn-ticks 500 --kill-prob 0.1
//! ```

use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warden_cluster::sim::{ChurnSim, SimConfig};

/// Warden convergence simulator
///
/// Fully deterministic: given the same seed, produces identical results
/// every run.
#[derive(Parser, Debug)]
#[command(name = "converge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of cluster nodes
    #[arg(short = 'n', long, default_value = "8")]
    nodes: u32,

    /// Number of partitions
    #[arg(short = 'p', long, default_value = "64")]
    partitions: usize,

    /// Replicas per partition (primary included)
    #[arg(short = 'r', long, default_value = "3")]
    replicas: usize,

    /// Ticks of random node churn
    #[arg(long, default_value = "200")]
    churn_ticks: usize,

    /// Maximum ticks the heal phase may take
    #[arg(long, default_value = "200")]
    heal_ticks: usize,

    /// Per-tick probability of killing an alive node
    #[arg(long, default_value = "0.05")]
    kill_prob: f64,

    /// Per-tick probability of reviving a dead node
    #[arg(long, default_value = "0.2")]
    revive_prob: f64,

    /// Random seed for deterministic simulation
    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,warden_cluster=info")),
        )
        .init();

    let args = Args::parse();

    info!(
        nodes = args.nodes,
        partitions = args.partitions,
        replicas = args.replicas,
        churn_ticks = args.churn_ticks,
        seed = args.seed,
        "starting churn run"
    );

    let config = SimConfig {
        seed: args.seed,
        node_count: args.nodes,
        partition_count: args.partitions,
        max_replica_count: args.replicas,
        churn_ticks: args.churn_ticks,
        heal_ticks: args.heal_ticks,
        kill_probability: args.kill_prob,
        revive_probability: args.revive_prob,
        tick_interval: Duration::from_millis(100),
    };

    let mut sim = ChurnSim::new(config);
    let report = match sim.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("invariant violation, aborting: {e}");
            std::process::exit(1);
        }
    };

    println!("\n=== Churn Run Complete ===");
    println!("Ticks:      {}", report.ticks_run);
    println!("Proposals:  {}", report.proposals_sent);
    println!("Applied:    {}", report.applied);
    println!("Kills:      {}", report.kills);
    println!("Revives:    {}", report.revives);
    println!("Converged:  {}", report.converged);

    if !report.converged {
        std::process::exit(2);
    }
}
