/// Property tests for the resource ledger against a simple reference model.
use placesim_core::ledger::{Capacity, ResourceLedger};
use placesim_core::topology::Topology;
use placesim_policies::{LinkId, NodeId, Path};
use proptest::prelude::*;
use proptest::sample::Index;
use std::sync::Arc;

/// s - t, t - a, t - b with datacenters a (10 units) and b (6 units).
fn fork() -> Topology {
    Topology::builder("fork")
        .source("s")
        .transit("t")
        .datacenter("a", 10)
        .datacenter("b", 6)
        .link("s", "t", 8)
        .link("t", "a", 5)
        .link("t", "b", 7)
        .build(1)
        .unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    Reserve {
        to_b: bool,
        computing_units: u32,
        network_units: u32,
    },
    Release(Index),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<bool>(), 0u32..8, 0u32..8).prop_map(|(to_b, computing_units, network_units)| {
            Op::Reserve {
                to_b,
                computing_units,
                network_units,
            }
        }),
        any::<Index>().prop_map(Op::Release),
    ]
}

struct Held {
    datacenter: NodeId,
    path: Arc<Path>,
    computing_units: u32,
    network_units: u32,
}

/// Expected available units per node and link given what is held.
fn expected(topo: &Topology, held: &[Held]) -> (Vec<u32>, Vec<u32>) {
    let mut compute: Vec<u32> = topo.nodes().iter().map(|n| n.total_compute_units).collect();
    let mut network: Vec<u32> = topo.links().iter().map(|l| l.total_network_units).collect();
    for h in held {
        compute[h.datacenter as usize] -= h.computing_units;
        for &link in h.path.links() {
            network[link] -= h.network_units;
        }
    }
    (compute, network)
}

fn state(topo: &Topology, ledger: &ResourceLedger) -> (Vec<Capacity>, Vec<Capacity>) {
    let compute = (0..topo.nodes().len() as NodeId)
        .map(|id| ledger.compute(id))
        .collect();
    let network = (0..topo.links().len() as LinkId)
        .map(|id| ledger.network(id))
        .collect();
    (compute, network)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn ledger_tracks_held_reservations(ops in prop::collection::vec(op(), 1..60)) {
        let topo = fork();
        let s = topo.node_id("s").unwrap();
        let a = topo.node_id("a").unwrap();
        let b = topo.node_id("b").unwrap();
        let mut ledger = ResourceLedger::new(&topo);
        let mut held: Vec<Held> = Vec::new();

        for op in ops {
            match op {
                Op::Reserve { to_b, computing_units, network_units } => {
                    let datacenter = if to_b { b } else { a };
                    let path = topo.catalog().candidates(s, datacenter)[0].clone();
                    let (compute, network) = expected(&topo, &held);
                    let fits = compute[datacenter as usize] >= computing_units
                        && path.links().iter().all(|&l| network[l] >= network_units);

                    let before = state(&topo, &ledger);
                    let reserved = ledger.try_reserve(datacenter, &path, computing_units, network_units);
                    prop_assert_eq!(reserved, fits);
                    if reserved {
                        held.push(Held { datacenter, path, computing_units, network_units });
                    } else {
                        prop_assert_eq!(before, state(&topo, &ledger));
                    }
                }
                Op::Release(index) => {
                    if held.is_empty() {
                        continue;
                    }
                    let h = held.remove(index.index(held.len()));
                    prop_assert!(ledger
                        .release(h.datacenter, &h.path, h.computing_units, h.network_units)
                        .is_ok());
                }
            }

            let (compute, network) = expected(&topo, &held);
            let (actual_compute, actual_network) = state(&topo, &ledger);
            for (cap, want) in actual_compute.iter().zip(&compute) {
                prop_assert_eq!(cap.available, *want);
                prop_assert!(cap.available <= cap.total);
            }
            for (cap, want) in actual_network.iter().zip(&network) {
                prop_assert_eq!(cap.available, *want);
                prop_assert!(cap.available <= cap.total);
            }
            prop_assert!(ledger.check_invariants().is_ok());
        }

        for h in held.drain(..) {
            prop_assert!(ledger
                .release(h.datacenter, &h.path, h.computing_units, h.network_units)
                .is_ok());
        }
        prop_assert!(ledger.is_at_baseline());
    }

    #[test]
    fn reserve_then_release_restores_state(
        to_b in any::<bool>(),
        computing_units in 0u32..=6,
        network_units in 0u32..=5,
    ) {
        let topo = fork();
        let s = topo.node_id("s").unwrap();
        let datacenter = topo.node_id(if to_b { "b" } else { "a" }).unwrap();
        let path = topo.catalog().candidates(s, datacenter)[0].clone();
        let mut ledger = ResourceLedger::new(&topo);

        let before = state(&topo, &ledger);
        prop_assert!(ledger.try_reserve(datacenter, &path, computing_units, network_units));
        ledger.release(datacenter, &path, computing_units, network_units).unwrap();
        prop_assert_eq!(before, state(&topo, &ledger));
    }
}

#[test]
fn test_release_beyond_total_is_an_error() {
    let topo = fork();
    let s = topo.node_id("s").unwrap();
    let a = topo.node_id("a").unwrap();
    let path = topo.catalog().candidates(s, a)[0].clone();
    let mut ledger = ResourceLedger::new(&topo);

    assert!(ledger.release(a, &path, 1, 0).is_err());
    assert!(ledger.release(a, &path, 0, 1).is_err());
    assert!(ledger.is_at_baseline());
}

#[test]
fn test_utilization_averages() {
    let topo = fork();
    let s = topo.node_id("s").unwrap();
    let a = topo.node_id("a").unwrap();
    let path = topo.catalog().candidates(s, a)[0].clone();
    let mut ledger = ResourceLedger::new(&topo);

    assert!(ledger.try_reserve(a, &path, 5, 4));
    // a at 5/10, b idle.
    assert!((ledger.datacenter_utilization() - 0.25).abs() < 1e-12);
    // s-t at 4/8, t-a at 4/5, t-b idle.
    let expected = (0.5 + 0.8 + 0.0) / 3.0;
    assert!((ledger.link_utilization() - expected).abs() < 1e-12);
}
