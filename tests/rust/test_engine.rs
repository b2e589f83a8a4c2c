/// Integration tests for the event engine: admission, blocking, sampling and
/// reproducibility.
use placesim_core::config::SimConfig;
use placesim_core::coordinator::{execute_one_run, RunSpec};
use placesim_core::service::Service;
use placesim_core::topology::Topology;
use placesim_core::SimulationEngine;
use placesim_policies::{CapacityView, ClosestAvailable};
use std::sync::Arc;

fn config(num_arrivals: u64, track_stats_every: u64, load: f64) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
name = "engine-test"
seed = 42
num_arrivals = {num_arrivals}
track_stats_every = {track_stats_every}
num_seeds = 1

[traffic]
min_load = {load}
max_load = {load}

[topology]
network_units_per_link = 10
"#
    ))
    .unwrap()
}

/// One source and one datacenter joined by a single link.
fn pair(compute_units: u32, network_units: u32) -> Arc<Topology> {
    Arc::new(
        Topology::builder("pair")
            .source("src")
            .datacenter("dc", compute_units)
            .link("src", "dc", network_units)
            .build(1)
            .unwrap(),
    )
}

fn engine(config: &SimConfig, topology: Arc<Topology>) -> SimulationEngine {
    SimulationEngine::new(
        RunSpec::new("CADC", config.traffic.min_load, 0, config.simulation.seed),
        topology,
        Box::new(ClosestAvailable::new()),
        config,
    )
    .unwrap()
}

#[test]
fn test_full_reservation_then_block() {
    let config = config(2, 1, 1.0);
    let topology = pair(10, 10);
    let src = topology.node_id("src").unwrap();
    let dc = topology.node_id("dc").unwrap();
    let link = topology.link_between(src, dc).unwrap();

    let mut engine = engine(&config, Arc::clone(&topology));
    engine.load_trace(vec![
        Service::new(0, src, 10, 10, 0.0, 5.0),
        Service::new(1, src, 10, 10, 1.0, 5.0),
    ])
    .unwrap();

    assert!(engine.step().unwrap());
    assert_eq!(engine.ledger().available_compute(dc), 0);
    assert_eq!(engine.ledger().available_network(link), 0);
    assert_eq!(engine.blocked_so_far(), 0);

    assert!(engine.step().unwrap());
    assert_eq!(engine.arrivals_so_far(), 2);
    assert_eq!(engine.blocked_so_far(), 1);

    let metrics = engine.run().unwrap();
    assert_eq!(metrics.blocking_ratio, 0.5);
    assert_eq!(metrics.avg_datacenter_utilization, 1.0);
    assert_eq!(metrics.avg_link_utilization, 1.0);
    assert_eq!(metrics.timeline[0].blocking_ratio, 0.0);
    assert_eq!(metrics.timeline[1].blocking_ratio, 0.5);
    // The admitted service departed during the drain.
    assert!(engine.ledger().is_at_baseline());
}

#[test]
fn test_sample_reports_known_admission_mix() {
    let track_stats_every = 10;
    let admitted = 4;
    let config = config(100, track_stats_every, 1.0);
    let topology = pair(admitted as u32, 10);
    let src = topology.node_id("src").unwrap();

    let mut engine = engine(&config, topology);
    // Services hold far longer than the trace lasts: the first `admitted`
    // fill the datacenter and every later one is blocked.
    let services = (0..15)
        .map(|i| Service::new(i, src, 1, 1, 1.0 + i as f64, 1_000.0))
        .collect();
    engine.load_trace(services).unwrap();
    let metrics = engine.run().unwrap();

    let sample = metrics.timeline[0];
    assert_eq!(sample.arrivals, track_stats_every);
    assert_eq!(
        sample.blocking_ratio,
        (track_stats_every - admitted) as f64 / track_stats_every as f64
    );
    assert_eq!(sample.blocking_ratio, 0.6);
    assert_eq!(sample.avg_datacenter_utilization, 1.0);
    assert_eq!(sample.avg_link_utilization, 0.4);
    assert_eq!(metrics.timeline.len(), 1);
    assert_eq!(metrics.blocked, 11);
}

#[test]
fn test_same_spec_replays_exactly() {
    let config = config(2_000, 500, 15.0);
    let topology = pair(20, 20);
    let spec = RunSpec::new("FLB", 15.0, 3, 42);

    let a = execute_one_run(&config, Arc::clone(&topology), &spec).unwrap();
    let b = execute_one_run(&config, Arc::clone(&topology), &spec).unwrap();
    assert_eq!(a.blocked, b.blocked);
    assert_eq!(a.sim_time, b.sim_time);
    assert_eq!(a.events_processed, b.events_processed);
    assert_eq!(a.timeline, b.timeline);

    let other = RunSpec::new("FLB", 15.0, 4, 42);
    let c = execute_one_run(&config, topology, &other).unwrap();
    assert_ne!(a.sim_time, c.sim_time);
}

#[test]
fn test_policies_see_the_same_arrivals() {
    let config = config(1_000, 250, 15.0);
    let topology = pair(20, 20);

    let times: Vec<f64> = ["CADC", "FADC", "FLB"]
        .iter()
        .map(|policy| {
            let spec = RunSpec::new(*policy, 15.0, 0, 42);
            execute_one_run(&config, Arc::clone(&topology), &spec)
                .unwrap()
                .sim_time
        })
        .collect();
    assert_eq!(times[0], times[1]);
    assert_eq!(times[1], times[2]);
}

#[test]
fn test_arrival_rate_matches_load() {
    // N arrivals at rate L take about N / L time units.
    let config = config(20_000, 5_000, 100.0);
    let spec = RunSpec::new("CADC", 100.0, 0, 1);
    let metrics = execute_one_run(&config, pair(1_000, 1_000), &spec).unwrap();
    assert!(
        (metrics.sim_time - 200.0).abs() < 10.0,
        "sim_time {} too far from 200",
        metrics.sim_time
    );
    assert_eq!(metrics.blocked, 0);
}

#[test]
fn test_single_link_blocking_near_erlang_b() {
    // Ten servers offered ten Erlangs: Erlang B gives about 0.2146.
    let config = config(20_000, 5_000, 10.0);
    let metrics =
        execute_one_run(&config, pair(10, 10), &RunSpec::new("CADC", 10.0, 0, 7)).unwrap();
    assert!(
        (metrics.blocking_ratio - 0.2146).abs() < 0.05,
        "blocking ratio {} too far from Erlang B",
        metrics.blocking_ratio
    );
}

#[test]
fn test_drained_run_ends_at_baseline() {
    let config = config(3_000, 1_000, 12.0);
    let topology = pair(10, 10);
    let mut engine = engine(&config, topology);
    let metrics = engine.run().unwrap();

    assert_eq!(metrics.arrivals, 3_000);
    assert_eq!(engine.pending_events(), 0);
    assert!(engine.ledger().is_at_baseline());
    assert_eq!(
        metrics.events_processed,
        metrics.arrivals + (metrics.arrivals - metrics.blocked)
    );
}
