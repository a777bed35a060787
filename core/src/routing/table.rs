//! The node's own resolved routes
//!
//! A plain state container: one [`RouteEntry`] per destination. Selection
//! logic lives in the engine; the table only stores, looks up and ages out.

use super::distance::Distance;
use crate::packet::{NodeId, Port};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a route came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteOrigin {
    /// The node itself (distance 0, never expires)
    Local,
    /// A directly attached host (pinned until its link goes down)
    Host,
    /// Derived from neighbor advertisements (ages out)
    Learned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub destination: NodeId,
    /// `None` only for the node's own route
    pub out_port: Option<Port>,
    pub total_distance: Distance,
    /// When the route was last (re)computed (seconds)
    pub created_at: u64,
    pub origin: RouteOrigin,
}

impl RouteEntry {
    pub fn is_expired(&self, now: u64, timeout: u64) -> bool {
        self.origin == RouteOrigin::Learned && now.saturating_sub(self.created_at) >= timeout
    }
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<NodeId, RouteEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the route to `destination`
    pub fn set(
        &mut self,
        destination: NodeId,
        port: Option<Port>,
        distance: Distance,
        now: u64,
        origin: RouteOrigin,
    ) {
        self.routes.insert(
            destination.clone(),
            RouteEntry {
                destination,
                out_port: port,
                total_distance: distance,
                created_at: now,
                origin,
            },
        );
    }

    pub fn get(&self, destination: &NodeId) -> Option<&RouteEntry> {
        self.routes.get(destination)
    }

    pub fn remove(&mut self, destination: &NodeId) -> Option<RouteEntry> {
        self.routes.remove(destination)
    }

    /// Outgoing port for `destination`, if the route leaves through one
    pub fn port_of(&self, destination: &NodeId) -> Option<Port> {
        self.routes.get(destination).and_then(|route| route.out_port)
    }

    pub fn contains(&self, destination: &NodeId) -> bool {
        self.routes.contains_key(destination)
    }

    pub fn all_destinations(&self) -> Vec<NodeId> {
        self.routes.keys().cloned().collect()
    }

    /// Destinations whose route leaves through `port`
    pub fn destinations_via(&self, port: Port) -> Vec<NodeId> {
        self.routes
            .values()
            .filter(|route| route.out_port == Some(port))
            .map(|route| route.destination.clone())
            .collect()
    }

    /// Drop learned routes whose age is at least `timeout`
    pub fn expire(&mut self, now: u64, timeout: u64) -> Vec<RouteEntry> {
        let stale: Vec<NodeId> = self
            .routes
            .values()
            .filter(|route| route.is_expired(now, timeout))
            .map(|route| route.destination.clone())
            .collect();

        stale
            .iter()
            .filter_map(|destination| self.routes.remove(destination))
            .collect()
    }

    /// All routes sorted by destination
    pub fn snapshot(&self) -> Vec<RouteEntry> {
        let mut routes: Vec<RouteEntry> = self.routes.values().cloned().collect();
        routes.sort_by(|a, b| a.destination.cmp(&b.destination));
        routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
