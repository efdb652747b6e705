//! quorumsim CLI
//!
//! Run multi-round PBFT simulations with configurable Byzantine faults.
//!
//! # Example
//!
//! ```bash
//! # 20 random rounds on 12 nodes, each Byzantine with probability 0.2
//! quorumsim --nodes 12 --byzantine-probability 0.2 --rounds 20
//!
//! # Pin nodes 1 and 2 as Byzantine and print the final state as JSON
//! quorumsim -n 4 --byzantine 1 --byzantine 2 --value A --json
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use quorumsim_bft::PbftConfig;
use quorumsim_simulator::{Simulator, SimulatorConfig, WorkloadConfig};
use quorumsim_types::NodeId;
use serde::Serialize;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// quorumsim PBFT simulator
///
/// Drives rounds of propose / pre-prepare / prepare / commit among honest and
/// Byzantine nodes. Given the same seed, produces identical results every run.
#[derive(Parser, Debug)]
#[command(name = "quorumsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of nodes
    #[arg(short = 'n', long, default_value = "12")]
    nodes: usize,

    /// Probability that each node is Byzantine (0.0-1.0)
    #[arg(short = 'p', long, default_value = "0.2")]
    byzantine_probability: f64,

    /// Make every node honest
    #[arg(long, conflicts_with = "byzantine")]
    all_honest: bool,

    /// Pin a node id as Byzantine (repeatable); overrides the probability
    #[arg(short = 'b', long = "byzantine")]
    byzantine: Vec<u32>,

    /// Draw Byzantine flags again at the start of every round
    #[arg(long)]
    redraw: bool,

    /// Number of rounds to run
    #[arg(short = 'r', long, default_value = "20")]
    rounds: usize,

    /// Maximum values submitted per round before giving up
    #[arg(long, default_value = "10")]
    max_attempts: u32,

    /// Submit this value every round (default: random A/B)
    #[arg(long, conflicts_with = "alternate")]
    value: Option<String>,

    /// Alternate A and B between rounds
    #[arg(long)]
    alternate: bool,

    /// Consecutive failures that trigger a view change
    #[arg(long, default_value = "3")]
    max_failures: u32,

    /// View change delay in milliseconds
    #[arg(long, default_value = "2000")]
    view_change_delay_ms: u64,

    /// Rotate the leader to `view mod N` on view change
    #[arg(long)]
    rotate_leader: bool,

    /// Random seed for deterministic simulation
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Print the report and final state as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    report: &'a quorumsim_simulator::SimulationReport,
    state: &'a quorumsim_bft::PbftSnapshot,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,quorumsim_simulator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.nodes == 0 {
        bail!("--nodes must be at least 1");
    }

    let mut pbft = PbftConfig::new(args.nodes, args.byzantine_probability, args.all_honest)
        .with_redraw_each_round(args.redraw)
        .with_seed(args.seed)
        .with_max_consecutive_failures(args.max_failures)
        .with_view_change_delay(Duration::from_millis(args.view_change_delay_ms))
        .with_rotate_leader_on_view_change(args.rotate_leader);
    if !args.byzantine.is_empty() {
        pbft = pbft.with_fixed_byzantine(args.byzantine.iter().copied().map(NodeId));
    }

    let workload = match (&args.value, args.alternate) {
        (Some(value), _) => WorkloadConfig::fixed(value.as_str()),
        (None, true) => WorkloadConfig::alternating(),
        (None, false) => WorkloadConfig::random(),
    }
    .with_rounds(args.rounds)
    .with_max_attempts(args.max_attempts);

    info!(
        nodes = args.nodes,
        byzantine_probability = args.byzantine_probability,
        rounds = args.rounds,
        seed = args.seed,
        "Starting simulation"
    );

    let config = SimulatorConfig::default()
        .with_pbft(pbft)
        .with_workload(workload);
    let mut simulator = Simulator::new(config).context("failed to create simulator")?;
    let report = simulator.run();

    if args.json {
        let state = simulator.snapshot();
        let output = JsonOutput {
            report: &report,
            state: &state,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    report.print_summary();

    let state = simulator.snapshot();
    println!("=== Final State ===");
    println!("Phase:       {}", state.phase.as_str());
    println!("View:        {}", state.view);
    println!("Leader:      {}", state.current_leader);
    println!(
        "Byzantine:   {} of {} (tolerated: {})",
        state.byzantine_count,
        state.replicas.len(),
        if state.is_fault_tolerant { "yes" } else { "no" }
    );
    println!("\n=== Decision Log ===");
    for block in &state.decisions {
        println!("{block}");
    }
    Ok(())
}
