//! Routing Engine: distance-vector control plane for one node
//!
//! Ties the per-neighbor distance vectors and the node's own route table
//! together. Every inbound event is processed to completion and yields the
//! [`Action`]s the surrounding transport must carry out:
//!
//! 1. **Link up**: remember the port latency, hand the new neighbor our full table
//! 2. **Link down**: forget the port, its hosts and neighbors, re-derive routes that used it
//! 3. **Route advertisement**: record the claim, re-run selection, push real changes at once
//! 4. **Host discovery**: pin the host to its port
//! 5. **Data**: forward along the route, never back out the arrival port
//! 6. **Timer tick**: age out claims and routes, advertise everything, flush poisons
//!
//! Advertisements toward a route's own next hop are suppressed (split
//! horizon) or sent at [`INFINITY`] (poisoned reverse) depending on
//! [`RouterConfig::poison_mode`].

use super::distance::{Distance, Latency, INFINITY};
use super::neighbors::{Adjacency, NeighborDistanceStore};
use super::table::{RouteEntry, RouteOrigin, RoutingTable};
use crate::config::RouterConfig;
use crate::packet::{Action, DataPacket, Event, NodeId, Packet, Port, RouteAdvertisement};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Result of re-running best-route selection for one destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteUpdate {
    /// Same port and distance as before
    Unchanged,
    /// New route, or a different port or distance
    Changed,
    /// A route existed and no finite alternative remains
    Removed,
    /// No route before, none now
    Absent,
}

/// A winning candidate from best-route selection
#[derive(Debug, Clone, Copy)]
struct Candidate {
    port: Option<Port>,
    distance: Distance,
    origin: RouteOrigin,
}

/// Running counters (for diagnostics)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub advertisements_sent: u64,
    pub poisons_sent: u64,
    pub data_forwarded: u64,
    pub data_dropped_no_route: u64,
    pub data_dropped_hairpin: u64,
    pub claims_expired: u64,
    pub routes_expired: u64,
}

/// Point-in-time view of the engine state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSummary {
    pub ports_up: usize,
    pub neighbors: usize,
    pub hosts: usize,
    pub routes: usize,
    pub pending_poisons: usize,
}

/// Distance-vector routing engine for a single node
pub struct RoutingEngine {
    /// Our own identity
    local_id: NodeId,
    config: RouterConfig,
    /// Up ports and their link latency (ordered so output is deterministic)
    ports: BTreeMap<Port, Latency>,
    /// Directly attached hosts
    hosts: HashMap<NodeId, Port>,
    neighbors: NeighborDistanceStore,
    table: RoutingTable,
    /// Lost destinations to advertise at INFINITY on the next tick
    pending_poison: BTreeSet<NodeId>,
    stats: EngineStats,
}

impl RoutingEngine {
    /// Create an engine that knows only its own route
    pub fn new(local_id: NodeId, config: RouterConfig) -> Self {
        let mut table = RoutingTable::new();
        table.set(local_id.clone(), None, Distance::ZERO, 0, RouteOrigin::Local);

        RoutingEngine {
            local_id,
            config,
            ports: BTreeMap::new(),
            hosts: HashMap::new(),
            neighbors: NeighborDistanceStore::new(),
            table,
            pending_poison: BTreeSet::new(),
            stats: EngineStats::default(),
        }
    }

    /// Dispatch one event
    pub fn handle(&mut self, event: Event, now: u64) -> Vec<Action> {
        match event {
            Event::LinkUp { port, latency } => self.on_link_up(port, latency, now),
            Event::LinkDown { port } => self.on_link_down(port, now),
            Event::Packet { packet, port } => match packet {
                Packet::Route(advertisement) => self.on_route_packet(advertisement, port, now),
                Packet::HostDiscovery { host } => self.on_host_discovery(host, port, now),
                Packet::Data(data) => self.on_data_packet(data, port),
            },
            Event::TimerTick => self.on_timer_tick(now),
        }
    }

    /// A link came up: record it and send the new neighbor our whole table
    pub fn on_link_up(&mut self, port: Port, latency: Latency, now: u64) -> Vec<Action> {
        info!("{}: link up on {} (latency {})", self.local_id, port, latency);

        let previous = self.ports.insert(port, latency);
        let mut actions = Vec::new();

        // Same port, new latency: every route through it may have moved
        if previous.is_some_and(|old| old != latency) {
            for destination in self.known_destinations() {
                if self.reevaluate(&destination, now) == RouteUpdate::Changed {
                    actions.extend(self.advertise(&destination));
                }
            }
        }

        for route in self.table.snapshot() {
            if let Some(distance) = self.advertised_distance(&route, port) {
                actions.push(self.send_route(route.destination, distance, port));
            }
        }

        actions
    }

    /// A link went down: drop everything learned through it and re-derive
    pub fn on_link_down(&mut self, port: Port, now: u64) -> Vec<Action> {
        if self.ports.remove(&port).is_none() {
            debug!("{}: link down on unknown {}, ignoring", self.local_id, port);
            return Vec::new();
        }
        info!("{}: link down on {}", self.local_id, port);

        self.hosts.retain(|_, host_port| *host_port != port);
        self.neighbors.drop_port(port);

        let mut affected = self.table.destinations_via(port);
        affected.sort();

        let mut actions = Vec::new();
        for destination in affected {
            match self.reevaluate(&destination, now) {
                RouteUpdate::Changed => actions.extend(self.advertise(&destination)),
                RouteUpdate::Removed => {
                    debug!("{}: no route left to {}", self.local_id, destination)
                }
                RouteUpdate::Unchanged | RouteUpdate::Absent => {}
            }
        }

        actions
    }

    /// A neighbor advertised a distance to some destination
    pub fn on_route_packet(
        &mut self,
        advertisement: RouteAdvertisement,
        port: Port,
        now: u64,
    ) -> Vec<Action> {
        let RouteAdvertisement {
            source,
            destination,
            distance,
        } = advertisement;

        if !self.ports.contains_key(&port) {
            warn!(
                "{}: advertisement from {} on down {}, ignoring",
                self.local_id, source, port
            );
            return Vec::new();
        }
        if source == self.local_id {
            return Vec::new();
        }

        // Each link to a neighbor keeps its own vector
        let adjacency = Adjacency::new(source, port);
        let changed = self
            .neighbors
            .record_claim(&adjacency, &destination, distance, now);
        debug!(
            "{}: {} claims {} at {}{}",
            self.local_id,
            adjacency,
            destination,
            distance,
            if changed { "" } else { " (unchanged)" }
        );

        match self.reevaluate(&destination, now) {
            RouteUpdate::Changed => self.advertise(&destination),
            RouteUpdate::Removed => {
                debug!("{}: route to {} withdrawn", self.local_id, destination);
                Vec::new()
            }
            RouteUpdate::Unchanged | RouteUpdate::Absent => Vec::new(),
        }
    }

    /// A host announced itself on `port`
    pub fn on_host_discovery(&mut self, host: NodeId, port: Port, now: u64) -> Vec<Action> {
        if !self.ports.contains_key(&port) {
            warn!(
                "{}: host discovery for {} on down {}, ignoring",
                self.local_id, host, port
            );
            return Vec::new();
        }

        info!("{}: host {} attached on {}", self.local_id, host, port);
        self.hosts.insert(host.clone(), port);

        if self.reevaluate(&host, now) == RouteUpdate::Changed {
            self.advertise(&host)
        } else {
            Vec::new()
        }
    }

    /// Forward a data packet along its route, or drop it
    pub fn on_data_packet(&mut self, packet: DataPacket, port: Port) -> Vec<Action> {
        let out_port = match self.table.port_of(&packet.destination) {
            Some(out_port) => out_port,
            None => {
                debug!(
                    "{}: no route to {}, dropping data",
                    self.local_id, packet.destination
                );
                self.stats.data_dropped_no_route += 1;
                return Vec::new();
            }
        };

        if out_port == port {
            debug!(
                "{}: data for {} would hairpin out {}, dropping",
                self.local_id, packet.destination, port
            );
            self.stats.data_dropped_hairpin += 1;
            return Vec::new();
        }

        self.stats.data_forwarded += 1;
        vec![Action::ForwardData {
            packet,
            port: out_port,
        }]
    }

    /// Periodic work: expire stale state, advertise the table, flush poisons
    pub fn on_timer_tick(&mut self, now: u64) -> Vec<Action> {
        let timeout = self.config.route_timeout_secs;

        let expired_claims = self.neighbors.expire(now, timeout);
        let expired_routes = self.table.expire(now, timeout);
        self.stats.claims_expired += expired_claims.len() as u64;
        self.stats.routes_expired += expired_routes.len() as u64;

        let lapsed: BTreeSet<NodeId> = expired_routes
            .iter()
            .map(|route| route.destination.clone())
            .collect();
        let mut affected = lapsed.clone();
        affected.extend(expired_claims.into_iter().map(|claim| claim.destination));

        for destination in &affected {
            let update = self.reevaluate(destination, now);
            if update == RouteUpdate::Absent
                && lapsed.contains(destination)
                && self.config.poison_mode
            {
                self.pending_poison.insert(destination.clone());
            }
        }
        if !lapsed.is_empty() {
            debug!("{}: {} route(s) expired", self.local_id, lapsed.len());
        }

        let mut actions = Vec::new();
        let ports: Vec<Port> = self.ports.keys().copied().collect();

        for route in self.table.snapshot() {
            for &port in &ports {
                if let Some(distance) = self.advertised_distance(&route, port) {
                    actions.push(self.send_route(route.destination.clone(), distance, port));
                }
            }
        }

        let poisoned = std::mem::take(&mut self.pending_poison);
        for destination in poisoned {
            debug!("{}: poisoning {}", self.local_id, destination);
            for &port in &ports {
                self.stats.poisons_sent += 1;
                actions.push(self.send_route(destination.clone(), INFINITY, port));
            }
        }

        actions
    }

    // Accessors

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn route(&self, destination: &NodeId) -> Option<&RouteEntry> {
        self.table.get(destination)
    }

    /// All routes sorted by destination
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.table.snapshot()
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn neighbor_store(&self) -> &NeighborDistanceStore {
        &self.neighbors
    }

    pub fn port_latency(&self, port: Port) -> Option<Latency> {
        self.ports.get(&port).copied()
    }

    pub fn is_poison_pending(&self, destination: &NodeId) -> bool {
        self.pending_poison.contains(destination)
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn summary(&self) -> RoutingSummary {
        RoutingSummary {
            ports_up: self.ports.len(),
            neighbors: self.neighbors.neighbor_count(),
            hosts: self.hosts.len(),
            routes: self.table.len(),
            pending_poisons: self.pending_poison.len(),
        }
    }

    // Helper methods

    /// Bellman-Ford step: cheapest finite way to reach `destination` right now
    fn best_route(&self, destination: &NodeId) -> Option<Candidate> {
        if *destination == self.local_id {
            return Some(Candidate {
                port: None,
                distance: Distance::ZERO,
                origin: RouteOrigin::Local,
            });
        }

        let mut best: Option<Candidate> = None;

        for (adjacency, entry) in self.neighbors.claims_for(destination) {
            let port = adjacency.port;
            let Some(&latency) = self.ports.get(&port) else {
                continue;
            };

            let total = latency + entry.distance;
            if total.is_infinite() {
                continue;
            }
            // Strictly better only: the first adjacency evaluated keeps ties
            if best.map_or(true, |b| total < b.distance) {
                best = Some(Candidate {
                    port: Some(port),
                    distance: total,
                    origin: RouteOrigin::Learned,
                });
            }
        }

        // A directly attached host beats any equal or worse learned route
        if let Some(&host_port) = self.hosts.get(destination) {
            if let Some(&latency) = self.ports.get(&host_port) {
                if latency.is_finite() && best.map_or(true, |b| latency <= b.distance) {
                    best = Some(Candidate {
                        port: Some(host_port),
                        distance: latency,
                        origin: RouteOrigin::Host,
                    });
                }
            }
        }

        best
    }

    /// Re-run selection for `destination` and store the outcome
    fn reevaluate(&mut self, destination: &NodeId, now: u64) -> RouteUpdate {
        let previous = self
            .table
            .get(destination)
            .map(|route| (route.out_port, route.total_distance));

        match self.best_route(destination) {
            Some(candidate) => {
                self.table.set(
                    destination.clone(),
                    candidate.port,
                    candidate.distance,
                    now,
                    candidate.origin,
                );
                self.pending_poison.remove(destination);

                if previous == Some((candidate.port, candidate.distance)) {
                    RouteUpdate::Unchanged
                } else {
                    debug!(
                        "{}: route to {} is now {} via {:?}",
                        self.local_id, destination, candidate.distance, candidate.port
                    );
                    RouteUpdate::Changed
                }
            }
            None => {
                if self.table.remove(destination).is_some() {
                    if self.config.poison_mode {
                        self.pending_poison.insert(destination.clone());
                    }
                    RouteUpdate::Removed
                } else {
                    RouteUpdate::Absent
                }
            }
        }
    }

    /// Triggered update for one destination on every up port
    fn advertise(&mut self, destination: &NodeId) -> Vec<Action> {
        let Some(route) = self.table.get(destination).cloned() else {
            return Vec::new();
        };

        let ports: Vec<Port> = self.ports.keys().copied().collect();
        let mut actions = Vec::with_capacity(ports.len());
        for port in ports {
            if let Some(distance) = self.advertised_distance(&route, port) {
                actions.push(self.send_route(destination.clone(), distance, port));
            }
        }
        actions
    }

    /// Distance to announce for `route` on `port`, or `None` to stay silent
    fn advertised_distance(&self, route: &RouteEntry, port: Port) -> Option<Distance> {
        if route.out_port == Some(port) {
            if self.config.poison_mode {
                Some(INFINITY)
            } else {
                None
            }
        } else {
            Some(route.total_distance)
        }
    }

    fn send_route(&mut self, destination: NodeId, distance: Distance, port: Port) -> Action {
        self.stats.advertisements_sent += 1;
        Action::SendRoute {
            destination,
            distance,
            port,
        }
    }

    /// Every destination any state could produce a route for
    fn known_destinations(&self) -> Vec<NodeId> {
        let mut destinations: BTreeSet<NodeId> =
            self.table.all_destinations().into_iter().collect();
        destinations.extend(self.hosts.keys().cloned());
        destinations.extend(self.neighbors.known_destinations());
        destinations.into_iter().collect()
    }
}
