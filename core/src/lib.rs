// DVRoute Core: distance-vector routing node
//
// Each node sees only its own ports and what its neighbors announce, and
// still converges on shortest paths. The engine is a synchronous state
// machine fed with events and a caller-supplied clock; the node actor wraps
// it in a tokio task for live use.

pub mod config;
pub mod node;
pub mod packet;
pub mod routing;

pub use config::{ConfigError, RouterConfig};
pub use node::{spawn_node, NodeError, NodeHandle};
pub use packet::{Action, DataPacket, Event, NodeId, Packet, Port, RouteAdvertisement};
pub use routing::{
    Distance, EngineStats, Latency, RouteEntry, RouteOrigin, RoutingEngine, RoutingSummary,
    INFINITY,
};
