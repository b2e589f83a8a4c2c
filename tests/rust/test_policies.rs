/// Integration tests for routing policies against real topologies and ledgers.
use placesim_core::ledger::ResourceLedger;
use placesim_core::topology::Topology;
use placesim_policies::*;

fn request(computing_units: u32, network_units: u32) -> ServiceRequest {
    ServiceRequest {
        id: 0,
        source: 0,
        computing_units,
        network_units,
    }
}

fn admitted(decision: RoutingDecision) -> (NodeId, usize) {
    match decision {
        RoutingDecision::Admit { datacenter, path } => (datacenter, path.hops()),
        RoutingDecision::Reject => panic!("expected admission"),
    }
}

/// Source `s` reaches `near` in 2 hops and `far` in 5, on disjoint paths.
fn near_and_far() -> Topology {
    Topology::builder("near-far")
        .source("s")
        .transit("x1")
        .transit("y1")
        .transit("y2")
        .transit("y3")
        .transit("y4")
        .datacenter("near", 10)
        .datacenter("far", 10)
        .link("s", "x1", 10)
        .link("x1", "near", 10)
        .link("s", "y1", 10)
        .link("y1", "y2", 10)
        .link("y2", "y3", 10)
        .link("y3", "y4", 10)
        .link("y4", "far", 10)
        .build(3)
        .unwrap()
}

/// Source `s` with datacenters `x` and `y` one hop away each.
fn two_direct() -> Topology {
    Topology::builder("two-direct")
        .source("s")
        .datacenter("x", 10)
        .datacenter("y", 10)
        .link("s", "x", 10)
        .link("s", "y", 10)
        .build(1)
        .unwrap()
}

#[test]
fn test_closest_and_farthest_on_same_state() {
    let topo = near_and_far();
    let ledger = ResourceLedger::new(&topo);
    let near = topo.node_id("near").unwrap();
    let far = topo.node_id("far").unwrap();
    let service = request(1, 1);

    let closest = ClosestAvailable::new().decide(&service, &ledger, topo.catalog());
    assert_eq!(admitted(closest), (near, 2));

    let farthest = FarthestAvailable::new().decide(&service, &ledger, topo.catalog());
    assert_eq!(admitted(farthest), (far, 5));
}

#[test]
fn test_closest_skips_congested_path() {
    let topo = near_and_far();
    let mut ledger = ResourceLedger::new(&topo);
    let s = topo.node_id("s").unwrap();
    let near = topo.node_id("near").unwrap();
    let far = topo.node_id("far").unwrap();

    let near_path = topo.catalog().candidates(s, near)[0].clone();
    assert!(ledger.try_reserve(near, &near_path, 1, 8));

    // Three units no longer fit on the way to `near`.
    let decision = ClosestAvailable::new().decide(&request(1, 3), &ledger, topo.catalog());
    assert_eq!(admitted(decision), (far, 5));
}

#[test]
fn test_full_datacenters_reject() {
    let topo = near_and_far();
    let ledger = ResourceLedger::new(&topo);
    for name in available_policies() {
        let policy = policy_by_name(name, 10).unwrap();
        let decision = policy.decide(&request(11, 1), &ledger, topo.catalog());
        assert_eq!(decision, RoutingDecision::Reject, "{} admitted", name);
    }
}

/// Load `x` and `y` and return what FLB picks for a 1/1 service plus both
/// scores.
fn flb_pick(x_load: (u32, u32), y_load: (u32, u32)) -> (NodeId, f64, f64) {
    let topo = two_direct();
    let mut ledger = ResourceLedger::new(&topo);
    let s = topo.node_id("s").unwrap();
    let x = topo.node_id("x").unwrap();
    let y = topo.node_id("y").unwrap();
    let x_path = topo.catalog().candidates(s, x)[0].clone();
    let y_path = topo.catalog().candidates(s, y)[0].clone();
    assert!(ledger.try_reserve(x, &x_path, x_load.0, x_load.1));
    assert!(ledger.try_reserve(y, &y_path, y_load.0, y_load.1));

    let flb = FullLoadBalancing::new(10);
    let x_score = flb.score(
        max_link_usage(&ledger, &x_path),
        datacenter_utilization(&ledger, x),
    );
    let y_score = flb.score(
        max_link_usage(&ledger, &y_path),
        datacenter_utilization(&ledger, y),
    );
    let (dc, _) = admitted(flb.decide(&request(1, 1), &ledger, topo.catalog()));
    (dc, x_score, y_score)
}

#[test]
fn test_flb_mirrored_loads_tie_to_first_datacenter() {
    // x: 90% compute, link 1/10. y: 10% compute, link 9/10.
    let (dc, x_score, y_score) = flb_pick((9, 1), (1, 9));
    assert!((x_score - 0.1 * 0.9).abs() < 1e-12);
    assert!((y_score - 0.9 * 0.1).abs() < 1e-12);
    assert_eq!(x_score, y_score);
    assert_eq!(dc, 1, "tie must go to x, the first datacenter");
}

#[test]
fn test_flb_picks_lower_product() {
    // x: 0.1 * 0.8 = 0.08 against y: 0.9 * 0.1 = 0.09.
    let (dc, x_score, y_score) = flb_pick((8, 1), (1, 9));
    assert!((x_score - 0.08).abs() < 1e-12);
    assert!((y_score - 0.09).abs() < 1e-12);
    assert_eq!(dc, 1);

    // x: 0.1 * 0.9 = 0.09 against y: 0.7 * 0.1 = 0.07.
    let (dc, x_score, y_score) = flb_pick((9, 1), (1, 7));
    assert!((x_score - 0.09).abs() < 1e-12);
    assert!((y_score - 0.07).abs() < 1e-12);
    assert_eq!(dc, 2);
}

#[test]
fn test_equal_hops_tie_to_first_datacenter() {
    let topo = two_direct();
    let ledger = ResourceLedger::new(&topo);
    let x = topo.node_id("x").unwrap();
    for policy in [
        Box::new(ClosestAvailable::new()) as Box<dyn RoutingPolicy>,
        Box::new(FarthestAvailable::new()),
        Box::new(FullLoadBalancing::new(10)),
    ] {
        let (dc, hops) = admitted(policy.decide(&request(1, 1), &ledger, topo.catalog()));
        assert_eq!((dc, hops), (x, 1), "{} broke the tie", policy.name());
    }
}

#[test]
fn test_decide_does_not_reserve() {
    let topo = two_direct();
    let ledger = ResourceLedger::new(&topo);
    for name in available_policies() {
        let policy = policy_by_name(name, 10).unwrap();
        assert!(policy.decide(&request(5, 5), &ledger, topo.catalog()).is_admit());
    }
    assert!(ledger.is_at_baseline());
}
