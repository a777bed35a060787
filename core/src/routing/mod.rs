//! Distance-Vector Routing: Bellman-Ford over neighbor advertisements
//!
//! Each node learns the network purely from what its direct neighbors tell it:
//! - Distance: saturating hop metric capped at INFINITY (unreachable)
//! - Neighbors: the latest distance claimed for every destination on every adjacency
//! - Table: the node's own resolved route per destination
//! - Engine: event handling, best-route selection and advertisement policy
//!
//! Loops are kept in check by split horizon, or by poisoned reverse plus
//! one-shot route poisoning when poison mode is enabled.

pub mod distance;
pub mod neighbors;
pub mod table;
pub mod engine;

pub use distance::{Distance, Latency, INFINITY};
pub use neighbors::{Adjacency, ExpiredClaim, NeighborDistanceStore, NeighborEntry};
pub use table::{RouteEntry, RouteOrigin, RoutingTable};
pub use engine::{EngineStats, RoutingEngine, RoutingSummary};
