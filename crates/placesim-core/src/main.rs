//! placesim CLI: compare datacenter placement policies under offered load.

use clap::{Parser, Subcommand};
use placesim_core::config::SimConfig;
use placesim_core::coordinator::Coordinator;
use placesim_core::stats;
use placesim_core::{SimError, Topology};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "placesim",
    about = "Simulate service placement and admission control across datacenters",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full policy × load × seed sweep.
    Run {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Topology file, overriding `topology.file`.
        #[arg(short, long)]
        topology: Option<PathBuf>,
        /// Worker threads, overriding `simulation.threads`.
        #[arg(long)]
        threads: Option<usize>,
        /// Comma-separated policies, overriding `policies.names`.
        #[arg(short, long, value_delimiter = ',')]
        policies: Vec<String>,
        /// Output directory, overriding `simulation.output_dir`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run one load once and print the timeline.
    Single {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Topology file, overriding `topology.file`.
        #[arg(short, long)]
        topology: Option<PathBuf>,
        /// Policy to run. All configured policies when omitted.
        #[arg(short, long)]
        policy: Option<String>,
        /// Offered load in Erlangs.
        #[arg(short, long)]
        load: f64,
        /// Seed index within the load.
        #[arg(long, default_value = "0")]
        seed_index: u32,
    },
    /// Describe the topology and its candidate paths.
    Topology {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Topology file, overriding `topology.file`.
        #[arg(short, long)]
        topology: Option<PathBuf>,
    },
    /// List available policies.
    ListPolicies,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,placesim_core=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), SimError> {
    match cli.command {
        Commands::Run {
            config,
            topology,
            threads,
            policies,
            output,
        } => {
            let mut sim_config = SimConfig::from_file(&config)?;
            if let Some(threads) = threads {
                sim_config.simulation.threads = threads;
            }
            if !policies.is_empty() {
                sim_config.policies.names = policies;
            }
            if let Some(output) = output {
                sim_config.simulation.output_dir = output;
            }
            let sim_config = sim_config.finalize()?;
            let topo = load_shared_topology(&sim_config, topology.as_deref())?;

            let coordinator = Coordinator::new(sim_config, topo);
            let bundle = coordinator.run_all()?;
            println!("{}", stats::format_comparison_table(&bundle.summaries));

            let path = bundle.write_to(&coordinator.config().simulation.output_dir)?;
            println!("Results written to {}", path.display());
        }
        Commands::Single {
            config,
            topology,
            policy,
            load,
            seed_index,
        } => {
            let mut sim_config = SimConfig::from_file(&config)?;
            sim_config.traffic.min_load = load;
            sim_config.traffic.max_load = load;
            if let Some(policy) = policy {
                sim_config.policies.names = vec![policy];
            }
            let sim_config = sim_config.finalize()?;
            let topo = load_shared_topology(&sim_config, topology.as_deref())?;

            let results = placesim_core::compare_policies(&sim_config, topo, load, seed_index)?;
            for metrics in &results {
                println!("{}", stats::format_run_table(metrics));
            }
        }
        Commands::Topology { config, topology } => {
            let sim_config = SimConfig::from_file(&config)?;
            let topo = load_shared_topology(&sim_config, topology.as_deref())?;
            print_topology(&topo);
        }
        Commands::ListPolicies => {
            println!("Available routing policies:");
            for name in placesim_policies::available_policies() {
                println!("  - {}", name);
            }
        }
    }
    Ok(())
}

fn load_shared_topology(
    config: &SimConfig,
    path: Option<&Path>,
) -> Result<Arc<Topology>, SimError> {
    let topology = placesim_core::load_topology(config, path)?;
    info!(
        name = %topology.name,
        nodes = topology.nodes().len(),
        links = topology.links().len(),
        datacenters = topology.datacenters().len(),
        paths = topology.catalog().total_paths(),
        "Loaded topology"
    );
    Ok(Arc::new(topology))
}

fn print_topology(topo: &Topology) {
    println!("\n{:=<60}", format!("  Topology: {}  ", topo.name));
    println!(
        "  Nodes: {} | Links: {} | k = {}",
        topo.nodes().len(),
        topo.links().len(),
        topo.k_paths()
    );
    println!("{:-<60}", "  Datacenters  ");
    for &dc in topo.datacenters() {
        let node = topo.node(dc);
        println!(
            "  {:<20} {:>6} compute units, degree {}",
            node.name,
            node.total_compute_units,
            topo.neighbors(dc).len()
        );
    }
    println!("{:-<60}", "  Candidate paths  ");
    for &source in topo.sources() {
        let counts: Vec<String> = topo
            .datacenters()
            .iter()
            .map(|&dc| {
                let candidates = topo.catalog().candidates(source, dc);
                let shortest = candidates.first().map(|p| p.hops()).unwrap_or(0);
                format!("{}:{}({}h)", topo.node(dc).name, candidates.len(), shortest)
            })
            .collect();
        println!("  {:<20} {}", topo.node(source).name, counts.join("  "));
    }
    println!("{:=<60}", "");
}
