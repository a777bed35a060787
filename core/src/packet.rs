//! Wire-level vocabulary between a routing node and its environment
//!
//! Inbound traffic is a closed [`Packet`] union, classified once at the
//! boundary; the engine never re-inspects packet kinds deeper down. Outbound
//! work is expressed as [`Action`]s that the surrounding transport executes.

use crate::routing::{Distance, Latency};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a router or host
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        NodeId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(name: &str) -> Self {
        NodeId::new(name)
    }
}

/// Port number, local to one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(pub u32);

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {}", self.0)
    }
}

/// A neighbor's claim: "I can reach `destination` at `distance`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAdvertisement {
    pub source: NodeId,
    pub destination: NodeId,
    pub distance: Distance,
}

/// Application payload travelling between hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPacket {
    pub source: NodeId,
    pub destination: NodeId,
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// Everything that can arrive on a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Packet {
    /// Distance-vector advertisement from a neighboring router
    Route(RouteAdvertisement),
    /// A host announcing itself on the link it is attached to
    HostDiscovery { host: NodeId },
    /// Payload to be forwarded toward `destination`
    Data(DataPacket),
}

/// Discrete inputs driving one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    LinkUp { port: Port, latency: Latency },
    LinkDown { port: Port },
    Packet { packet: Packet, port: Port },
    TimerTick,
}

/// Outbound work produced by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Advertise our distance to `destination` out of `port`
    SendRoute {
        destination: NodeId,
        distance: Distance,
        port: Port,
    },
    /// Hand a data packet to the link on `port`
    ForwardData { packet: DataPacket, port: Port },
}

impl Action {
    /// Port this action leaves on
    pub fn port(&self) -> Port {
        match self {
            Action::SendRoute { port, .. } => *port,
            Action::ForwardData { port, .. } => *port,
        }
    }
}
