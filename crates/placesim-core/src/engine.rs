//! Discrete-event simulation engine.
//!
//! The engine maintains a priority queue of [`SimEvent`]s sorted by timestamp.
//! Each iteration pops the next event, advances the virtual clock, and
//! processes it. Arrivals ask the routing policy for a placement, reserve the
//! chosen resources through the run's private [`ResourceLedger`], and schedule
//! both their own departure and the next arrival. Departures release what
//! their arrival reserved.

use crate::clock::SimClock;
use crate::config::{ConfigError, SimConfig, UnitRange};
use crate::coordinator::RunSpec;
use crate::error::SimError;
use crate::ledger::ResourceLedger;
use crate::service::Service;
use crate::stats::{RunMetrics, Snapshot, StatsTracker};
use crate::topology::Topology;
use placesim_policies::{RoutingDecision, RoutingPolicy};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Events in the discrete-event simulation.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// A service arrives at its source node and asks for placement.
    Arrival(Service),
    /// An admitted service finishes and releases its resources.
    Departure(Service),
}

/// A timestamped event for the priority queue.
#[derive(Debug, Clone)]
struct TimedEvent {
    time: f64,
    sequence: u64,
    event: SimEvent,
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time.total_cmp(&other.time).is_eq() && self.sequence == other.sequence
    }
}

impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want min-heap
        other
            .time
            .total_cmp(&self.time)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// The main simulation engine. One engine is one run.
pub struct SimulationEngine {
    /// Virtual clock.
    clock: SimClock,
    /// Event queue (min-heap by time).
    event_queue: BinaryHeap<TimedEvent>,
    /// Sequence counter for tie-breaking.
    sequence: u64,
    /// Capacity state private to this run.
    ledger: ResourceLedger,
    topology: Arc<Topology>,
    policy: Box<dyn RoutingPolicy>,
    spec: RunSpec,
    rng: ChaCha8Rng,
    inter_arrival: Exp<f64>,
    holding: Exp<f64>,
    computing_units: UnitRange,
    network_units: UnitRange,
    num_arrivals: u64,
    track_stats_every: u64,
    drain_departures: bool,
    /// Arrivals come from [`load_trace`](Self::load_trace) instead of the
    /// Poisson generator.
    trace_loaded: bool,
    primed: bool,
    /// Set once [`run`](Self::run) has returned its metrics.
    finished: bool,
    generated: u64,
    arrivals_so_far: u64,
    blocked_so_far: u64,
    stats: StatsTracker,
    /// Figures captured when the last arrival was processed.
    final_snapshot: Option<Snapshot>,
    /// Total events processed.
    events_processed: u64,
}

impl SimulationEngine {
    /// Create the engine for one run.
    ///
    /// Arrivals follow a Poisson process of rate `load / mean_holding_time`
    /// and holding times are exponential with mean `mean_holding_time`, both
    /// drawn from a stream seeded with `spec.seed`.
    pub fn new(
        spec: RunSpec,
        topology: Arc<Topology>,
        policy: Box<dyn RoutingPolicy>,
        config: &SimConfig,
    ) -> Result<Self, SimError> {
        let traffic = &config.traffic;
        let inter_arrival = exp(spec.load / traffic.mean_holding_time, "arrival rate")?;
        let holding = exp(1.0 / traffic.mean_holding_time, "departure rate")?;
        let track_stats_every = config.simulation.track_stats_every;
        if track_stats_every == 0 {
            return Err(SimError::Config(ConfigError::Validation(
                "track_stats_every must be > 0".to_string(),
            )));
        }

        Ok(Self {
            clock: SimClock::new(),
            event_queue: BinaryHeap::new(),
            sequence: 0,
            ledger: ResourceLedger::new(&topology),
            rng: ChaCha8Rng::seed_from_u64(spec.seed),
            inter_arrival,
            holding,
            computing_units: traffic.computing_units,
            network_units: traffic.network_units,
            num_arrivals: config.simulation.num_arrivals,
            track_stats_every,
            drain_departures: config.simulation.drain_departures,
            trace_loaded: false,
            primed: false,
            finished: false,
            generated: 0,
            arrivals_so_far: 0,
            blocked_so_far: 0,
            stats: StatsTracker::with_capacity(
                (config.simulation.num_arrivals / track_stats_every) as usize,
            ),
            final_snapshot: None,
            events_processed: 0,
            topology,
            policy,
            spec,
        })
    }

    /// Schedule an event at a given time.
    pub fn schedule_event(&mut self, time: f64, event: SimEvent) {
        self.event_queue.push(TimedEvent {
            time,
            sequence: self.sequence,
            event,
        });
        self.sequence += 1;
    }

    /// Replace generated traffic with a fixed list of services.
    ///
    /// The run then ends after the last of these arrivals instead of after
    /// `num_arrivals` generated ones. Must be called before the first
    /// [`step`](Self::step) or [`run`](Self::run).
    pub fn load_trace(&mut self, services: Vec<Service>) -> Result<(), SimError> {
        if self.primed {
            return Err(SimError::InvariantViolation(
                "trace loaded after the run started".to_string(),
            ));
        }
        self.trace_loaded = true;
        self.num_arrivals = services.len() as u64;
        for service in services {
            let arrival = service.arrival_time;
            self.schedule_event(arrival, SimEvent::Arrival(service));
        }
        Ok(())
    }

    /// Run the simulation and return the run's metrics.
    ///
    /// Metrics are captured when the last arrival is processed. With
    /// `drain_departures` set, the remaining departures are processed
    /// afterwards and the ledger must end fully available.
    pub fn run(&mut self) -> Result<RunMetrics, SimError> {
        if self.finished {
            return Err(SimError::InvariantViolation(
                "run already finished; build a new engine".to_string(),
            ));
        }
        debug!(
            policy = %self.spec.policy,
            load = self.spec.load,
            seed_index = self.spec.seed_index,
            num_arrivals = self.num_arrivals,
            "Starting run"
        );

        self.prime();
        while self.final_snapshot.is_none() {
            if !self.step()? {
                break;
            }
        }
        let Some(last) = self.final_snapshot else {
            return Err(SimError::InvariantViolation(format!(
                "event queue ran dry after {} of {} arrivals",
                self.arrivals_so_far, self.num_arrivals
            )));
        };

        if self.drain_departures {
            self.drain()?;
        }

        debug!(
            policy = %self.spec.policy,
            load = self.spec.load,
            seed_index = self.spec.seed_index,
            blocking_ratio = last.blocking_ratio,
            events = self.events_processed,
            "Run finished"
        );

        self.finished = true;
        Ok(RunMetrics {
            policy: self.spec.policy.clone(),
            load: self.spec.load,
            seed_index: self.spec.seed_index,
            seed: self.spec.seed,
            arrivals: self.arrivals_so_far,
            blocked: self.blocked_so_far,
            blocking_ratio: last.blocking_ratio,
            avg_link_utilization: last.avg_link_utilization,
            avg_datacenter_utilization: last.avg_datacenter_utilization,
            sim_time: last.time,
            events_processed: self.events_processed,
            timeline: std::mem::take(&mut self.stats).into_samples(),
        })
    }

    /// Process the next event. Returns `false` once the queue is empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        self.prime();
        let Some(timed_event) = self.event_queue.pop() else {
            return Ok(false);
        };
        self.clock.advance_to(timed_event.time);
        self.events_processed += 1;

        match timed_event.event {
            SimEvent::Arrival(service) => self.handle_arrival(service)?,
            SimEvent::Departure(service) => self.handle_departure(service)?,
        }
        Ok(true)
    }

    /// Schedule the first generated arrival, once.
    fn prime(&mut self) {
        if self.primed {
            return;
        }
        self.primed = true;
        if self.num_arrivals == 0 {
            self.final_snapshot = Some(self.snapshot());
        } else if !self.trace_loaded {
            self.schedule_next_arrival();
        }
    }

    /// Draw the next service of the arrival stream and enqueue it.
    fn schedule_next_arrival(&mut self) {
        let time = self.clock.now() + self.inter_arrival.sample(&mut self.rng);
        let sources = self.topology.sources();
        let source = sources[self.rng.gen_range(0..sources.len())];
        let computing_units = self
            .rng
            .gen_range(self.computing_units.min..=self.computing_units.max);
        let network_units = self
            .rng
            .gen_range(self.network_units.min..=self.network_units.max);
        let holding_time = self.holding.sample(&mut self.rng);

        let service = Service::new(
            self.generated,
            source,
            computing_units,
            network_units,
            time,
            holding_time,
        );
        self.generated += 1;
        self.schedule_event(time, SimEvent::Arrival(service));
    }

    /// Handle an arrival: place it or block it.
    fn handle_arrival(&mut self, mut service: Service) -> Result<(), SimError> {
        self.arrivals_so_far += 1;
        if !self.trace_loaded && self.generated < self.num_arrivals {
            self.schedule_next_arrival();
        }

        let decision = self.policy.decide(
            &service.request(),
            &self.ledger,
            self.topology.catalog(),
        );
        match decision {
            RoutingDecision::Admit { datacenter, path } => {
                if !self.ledger.try_reserve(
                    datacenter,
                    &path,
                    service.computing_units,
                    service.network_units,
                ) {
                    return Err(SimError::InvariantViolation(format!(
                        "{} admitted service {} at datacenter {} but the ledger cannot hold it",
                        self.policy.name(),
                        service.id,
                        datacenter
                    )));
                }
                trace!(
                    time = self.clock.now(),
                    service = service.id,
                    datacenter,
                    hops = path.hops(),
                    "Admitted"
                );
                service.admit(datacenter, path)?;
                let departure = service.departure_time();
                self.schedule_event(departure, SimEvent::Departure(service));
            }
            RoutingDecision::Reject => {
                trace!(time = self.clock.now(), service = service.id, "Blocked");
                service.reject()?;
                self.blocked_so_far += 1;
            }
        }

        if self.arrivals_so_far % self.track_stats_every == 0 {
            self.stats.sample(
                self.arrivals_so_far,
                self.blocked_so_far,
                self.clock.now(),
                &self.ledger,
            );
        }
        if self.arrivals_so_far == self.num_arrivals {
            self.final_snapshot = Some(self.snapshot());
        }
        Ok(())
    }

    /// Handle a departure: release what the arrival reserved.
    fn handle_departure(&mut self, mut service: Service) -> Result<(), SimError> {
        let (Some(datacenter), Some(path)) = (service.datacenter(), service.path().cloned())
        else {
            return Err(SimError::InvariantViolation(format!(
                "service {} departed without a placement",
                service.id
            )));
        };
        self.ledger.release(
            datacenter,
            &path,
            service.computing_units,
            service.network_units,
        )?;
        service.depart()?;
        trace!(time = self.clock.now(), service = service.id, "Departed");
        Ok(())
    }

    /// Process trailing departures and check the ledger returned to baseline.
    fn drain(&mut self) -> Result<(), SimError> {
        while self.step()? {}
        self.ledger.check_invariants()?;
        if !self.ledger.is_at_baseline() {
            return Err(SimError::InvariantViolation(
                "resources still held after all departures".to_string(),
            ));
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            self.arrivals_so_far,
            self.blocked_so_far,
            self.clock.now(),
            &self.ledger,
        )
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn arrivals_so_far(&self) -> u64 {
        self.arrivals_so_far
    }

    pub fn blocked_so_far(&self) -> u64 {
        self.blocked_so_far
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Snapshots taken so far.
    pub fn timeline(&self) -> &[Snapshot] {
        self.stats.samples()
    }

    /// Get the number of pending events.
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }
}

fn exp(rate: f64, what: &str) -> Result<Exp<f64>, SimError> {
    Exp::new(rate).map_err(|e| {
        SimError::Config(ConfigError::Validation(format!(
            "invalid {} {}: {}",
            what, rate, e
        )))
    })
}
