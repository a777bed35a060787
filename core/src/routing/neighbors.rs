//! Per-neighbor distance vectors
//!
//! For every adjacency (a neighbor heard through one port) we keep the
//! latest distance it announced for each destination. The latest announcement
//! always wins, even when it is worse than what we had: link latencies can
//! legitimately grow, and a neighbor withdrawing a route shows up as a worse
//! (or infinite) claim.
//!
//! Two routers joined by parallel links are two adjacencies. Each link gets
//! its own vector, so poisoned reverse on one link never overwrites the real
//! distance announced on the other.
//!
//! Adjacencies are iterated in the order they were first heard from, which
//! keeps tie-breaking in route selection reproducible.

use super::distance::Distance;
use crate::packet::{NodeId, Port};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// A neighbor as seen through one of our ports
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Adjacency {
    pub neighbor: NodeId,
    pub port: Port,
}

impl Adjacency {
    pub fn new(neighbor: NodeId, port: Port) -> Self {
        Adjacency { neighbor, port }
    }
}

impl fmt::Display for Adjacency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.neighbor, self.port)
    }
}

/// One neighbor's claim about one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    pub destination: NodeId,
    pub distance: Distance,
    /// When the claim was last announced (seconds)
    pub recorded_at: u64,
}

impl NeighborEntry {
    pub fn is_expired(&self, now: u64, timeout: u64) -> bool {
        now.saturating_sub(self.recorded_at) >= timeout
    }
}

/// A claim dropped by [`NeighborDistanceStore::expire`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredClaim {
    pub adjacency: Adjacency,
    pub destination: NodeId,
}

/// adjacency → destination → latest claim
#[derive(Debug, Default)]
pub struct NeighborDistanceStore {
    vectors: HashMap<Adjacency, HashMap<NodeId, NeighborEntry>>,
    /// First-heard order of adjacencies
    order: Vec<Adjacency>,
}

impl NeighborDistanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) a claim heard on `adjacency`
    ///
    /// Returns whether the stored distance changed. The timestamp is always
    /// refreshed, even when the distance is unchanged.
    pub fn record_claim(
        &mut self,
        adjacency: &Adjacency,
        destination: &NodeId,
        distance: Distance,
        now: u64,
    ) -> bool {
        if !self.vectors.contains_key(adjacency) {
            self.order.push(adjacency.clone());
        }

        let vector = self.vectors.entry(adjacency.clone()).or_default();
        let previous = vector.insert(
            destination.clone(),
            NeighborEntry {
                destination: destination.clone(),
                distance,
                recorded_at: now,
            },
        );

        previous.map_or(true, |old| old.distance != distance)
    }

    /// Latest claim heard on `adjacency` about `destination`
    pub fn claim(&self, adjacency: &Adjacency, destination: &NodeId) -> Option<&NeighborEntry> {
        self.vectors.get(adjacency)?.get(destination)
    }

    /// Forget everything a neighbor told us, on every port
    ///
    /// Returns the destinations it had claims for, sorted.
    pub fn drop_neighbor(&mut self, neighbor: &NodeId) -> Vec<NodeId> {
        self.drop_where(|adjacency| adjacency.neighbor == *neighbor)
    }

    /// Forget every adjacency on `port` (the link went down)
    ///
    /// Returns the destinations they had claims for, sorted.
    pub fn drop_port(&mut self, port: Port) -> Vec<NodeId> {
        self.drop_where(|adjacency| adjacency.port == port)
    }

    fn drop_where(&mut self, doomed: impl Fn(&Adjacency) -> bool) -> Vec<NodeId> {
        let mut destinations = BTreeSet::new();
        let vectors = &mut self.vectors;
        self.order.retain(|adjacency| {
            if !doomed(adjacency) {
                return true;
            }
            if let Some(vector) = vectors.remove(adjacency) {
                destinations.extend(vector.into_keys());
            }
            false
        });
        destinations.into_iter().collect()
    }

    /// Remove every claim whose age is at least `timeout`
    ///
    /// Adjacencies left without any claim are forgotten entirely.
    pub fn expire(&mut self, now: u64, timeout: u64) -> Vec<ExpiredClaim> {
        let mut expired = Vec::new();

        for adjacency in &self.order {
            if let Some(vector) = self.vectors.get_mut(adjacency) {
                let mut stale: Vec<NodeId> = vector
                    .values()
                    .filter(|entry| entry.is_expired(now, timeout))
                    .map(|entry| entry.destination.clone())
                    .collect();
                stale.sort();
                for destination in stale {
                    vector.remove(&destination);
                    expired.push(ExpiredClaim {
                        adjacency: adjacency.clone(),
                        destination,
                    });
                }
            }
        }

        let vectors = &mut self.vectors;
        self.order.retain(|adjacency| {
            let empty = vectors.get(adjacency).map_or(true, |v| v.is_empty());
            if empty {
                vectors.remove(adjacency);
            }
            !empty
        });

        expired
    }

    /// Adjacencies in first-heard order
    pub fn adjacencies(&self) -> impl Iterator<Item = &Adjacency> {
        self.order.iter()
    }

    /// Every claim for `destination`, in first-heard order of adjacencies
    pub fn claims_for<'a>(
        &'a self,
        destination: &'a NodeId,
    ) -> impl Iterator<Item = (&'a Adjacency, &'a NeighborEntry)> + 'a {
        self.order.iter().filter_map(move |adjacency| {
            self.vectors
                .get(adjacency)
                .and_then(|vector| vector.get(destination))
                .map(|entry| (adjacency, entry))
        })
    }

    /// Every destination any adjacency has a claim for, sorted and deduplicated
    pub fn known_destinations(&self) -> Vec<NodeId> {
        let destinations: BTreeSet<&NodeId> = self
            .vectors
            .values()
            .flat_map(|vector| vector.keys())
            .collect();
        destinations.into_iter().cloned().collect()
    }

    /// Whether `neighbor` is heard on any port
    pub fn contains_neighbor(&self, neighbor: &NodeId) -> bool {
        self.order
            .iter()
            .any(|adjacency| adjacency.neighbor == *neighbor)
    }

    /// Distinct neighbors, however many links they share with us
    pub fn neighbor_count(&self) -> usize {
        self.order
            .iter()
            .map(|adjacency| &adjacency.neighbor)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn adjacency_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
