/// Integration tests for sweeps: planning, parallel aggregation and the
/// results bundle.
use placesim_core::config::SimConfig;
use placesim_core::coordinator::{plan_runs, Coordinator, ResultsBundle, RESULTS_FILE};
use placesim_core::topology::Topology;
use placesim_core::SimError;
use std::sync::Arc;

const TOPOLOGY: &str = r#"
name = "square"

[[nodes]]
name = "n0"

[[nodes]]
name = "n1"

[[nodes]]
name = "n2"

[[nodes]]
name = "n3"
role = "transit"

[[links]]
a = "n0"
b = "n1"

[[links]]
a = "n1"
b = "n2"

[[links]]
a = "n2"
b = "n3"

[[links]]
a = "n3"
b = "n0"
network_units = 30
"#;

fn sweep_config(output_dir: &std::path::Path, topology_file: &std::path::Path) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
name = "coordinator-test"
seed = 11
num_arrivals = 500
track_stats_every = 100
num_seeds = 3
threads = 3
progress_interval_secs = 1
output_dir = "{}"

[traffic]
min_load = 20
max_load = 40
load_step = 10

[topology]
file = "{}"
k_paths = 2
num_dcs = 1
dc_placement = "first"
compute_units_per_dc = 30
network_units_per_link = 20

[policies]
names = ["CADC", "FADC", "FLB"]
"#,
        output_dir.display(),
        topology_file.display()
    ))
    .unwrap()
}

fn setup() -> (tempfile::TempDir, SimConfig, Arc<Topology>) {
    let dir = tempfile::tempdir().unwrap();
    let topology_file = dir.path().join("square.toml");
    std::fs::write(&topology_file, TOPOLOGY).unwrap();
    let config = sweep_config(&dir.path().join("out"), &topology_file);
    let topology = Arc::new(placesim_core::load_topology(&config, None).unwrap());
    (dir, config, topology)
}

#[test]
fn test_topology_file_is_annotated() {
    let (_dir, _config, topology) = setup();
    assert_eq!(topology.name, "square");
    let n0 = topology.node_id("n0").unwrap();
    let n3 = topology.node_id("n3").unwrap();
    assert_eq!(topology.datacenters(), &[n0]);
    // n3 is transit, so only n1 and n2 send traffic.
    assert_eq!(topology.sources().len(), 2);
    assert_eq!(topology.node(n0).total_compute_units, 30);
    let link = topology.link_between(n3, n0).unwrap();
    assert_eq!(topology.links()[link].total_network_units, 30);
    assert_eq!(topology.links()[0].total_network_units, 20);
    // Each source reaches n0 both ways round the square.
    for &source in topology.sources() {
        assert_eq!(topology.catalog().candidates(source, n0).len(), 2);
    }
}

#[test]
fn test_sweep_fills_every_bucket() {
    let (_dir, config, topology) = setup();
    let coordinator = Coordinator::new(config.clone(), topology);
    let bundle = coordinator.run_all().unwrap();

    assert_eq!(bundle.policies, vec!["CADC", "FADC", "FLB"]);
    assert_eq!(bundle.loads, vec![20.0, 30.0, 40.0]);
    assert_eq!(bundle.summaries.len(), 9);
    assert_eq!(bundle.runs.len(), config.total_runs());
    for summary in &bundle.summaries {
        assert_eq!(summary.seeds, 3);
        let mean = summary.mean.unwrap();
        assert!((0.0..=1.0).contains(&mean.blocking_ratio));
        assert!((0.0..=1.0).contains(&mean.avg_link_utilization));
        assert!((0.0..=1.0).contains(&mean.avg_datacenter_utilization));
    }
}

#[test]
fn test_sweep_matches_sequential_runs() {
    let (_dir, config, topology) = setup();
    let bundle = Coordinator::new(config.clone(), Arc::clone(&topology))
        .run_all()
        .unwrap();

    for (spec, recorded) in plan_runs(&config).iter().zip(&bundle.runs) {
        let sequential =
            placesim_core::execute_one_run(&config, Arc::clone(&topology), spec).unwrap();
        assert_eq!(recorded.policy, spec.policy);
        assert_eq!(recorded.seed_index, spec.seed_index);
        assert_eq!(recorded.blocked, sequential.blocked);
        assert_eq!(recorded.timeline, sequential.timeline);
    }
}

#[test]
fn test_bundle_round_trip() {
    let (_dir, config, topology) = setup();
    let bundle = Coordinator::new(config.clone(), topology).run_all().unwrap();

    let path = bundle.write_to(&config.simulation.output_dir).unwrap();
    assert_eq!(path, config.simulation.output_dir.join(RESULTS_FILE));

    let loaded = ResultsBundle::read_from(&path).unwrap();
    assert_eq!(loaded.topology, "square");
    assert_eq!(loaded.summaries.len(), bundle.summaries.len());
    for (read, written) in loaded.summaries.iter().zip(&bundle.summaries) {
        assert_eq!(read.policy, written.policy);
        assert_eq!(read.load, written.load);
        assert_eq!(read.seeds, written.seeds);
        let (read, written) = (read.mean.unwrap(), written.mean.unwrap());
        assert!((read.blocking_ratio - written.blocking_ratio).abs() < 1e-12);
        assert!((read.avg_link_utilization - written.avg_link_utilization).abs() < 1e-12);
    }
    assert_eq!(loaded.runs.len(), bundle.runs.len());
    assert_eq!(loaded.finished_at, bundle.finished_at);
}

#[test]
fn test_failed_run_keeps_partial_results() {
    let (_dir, mut config, topology) = setup();
    // Bypass validation to plant a policy no run can build.
    config.policies.names = vec!["CADC".to_string(), "RR".to_string()];
    let coordinator = Coordinator::new(config, topology);
    let results = coordinator.new_results();

    let err = coordinator.run_into(&results).unwrap_err();
    assert!(matches!(err, SimError::UnknownPolicy(ref name) if name == "RR"));

    let progress = results.progress();
    assert_eq!(progress.total, 2 * 3 * 3);
    assert!(progress.performed <= 3 * 3);
    let summaries = results.summaries();
    assert_eq!(summaries.len(), 6);
    assert!(summaries
        .iter()
        .filter(|s| s.policy == "RR")
        .all(|s| s.mean.is_none()));
}

#[test]
fn test_worker_panic_ends_the_sweep() {
    let (_dir, mut config, topology) = setup();
    // FLB cannot be built without a link capacity to normalize by.
    config.policies.names = vec!["FLB".to_string()];
    config.topology.network_units_per_link = 0;
    let coordinator = Coordinator::new(config, topology);

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let results = coordinator.new_results();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            coordinator.run_into(&results)
        }));
        let _ = tx.send(outcome.is_err());
    });

    let panicked = rx
        .recv_timeout(std::time::Duration::from_secs(60))
        .expect("sweep did not return after a worker panic");
    assert!(panicked);
}
