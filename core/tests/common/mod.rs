// In-process network harness for multi-node routing scenarios
//
// Links deliver instantly and in FIFO order. Time only moves when a test
// calls tick(), so every scenario is deterministic. After every event the
// harness looks at the acting router's table and records peak distances and
// any pair of routers that use each other as next hop for one destination.

#![allow(dead_code)]

use dvroute_core::{
    Action, DataPacket, Distance, Event, NodeId, Packet, Port, RouteAdvertisement, RouteEntry,
    RouterConfig, RoutingEngine,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Upper bound on deliveries per settle() before we call it a storm
const MAX_DELIVERIES: usize = 100_000;

enum Device {
    Router(RoutingEngine),
    /// Announces itself on link-up, records data addressed to it
    Host { received: Vec<DataPacket> },
    /// Floods everything out of every other port, counts data packets
    Hub { data_seen: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    node: String,
    port: Port,
}

/// Two routers that were each other's next hop for one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingLoop {
    pub at: u64,
    pub destination: String,
    /// Sorted pair
    pub routers: (String, String),
}

impl RoutingLoop {
    fn new(at: u64, destination: &NodeId, a: &str, b: &str) -> Self {
        let routers = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        RoutingLoop {
            at,
            destination: destination.to_string(),
            routers,
        }
    }
}

struct Link {
    a: Endpoint,
    b: Endpoint,
    up: bool,
}

pub struct Network {
    pub now: u64,
    config: RouterConfig,
    devices: BTreeMap<String, Device>,
    next_port: HashMap<String, u32>,
    links: Vec<Link>,
    queue: VecDeque<(Endpoint, Packet)>,
    /// Routers whose output is discarded
    muted: HashSet<String>,
    /// Routers that forwarded data since the last ping
    pub trail: Vec<String>,
    /// Every route advertisement sent: (router, destination, distance)
    pub adverts: Vec<(String, String, u32)>,
    /// Highest finite distance each router held per destination
    peaks: HashMap<(String, String), Distance>,
    loops: Vec<RoutingLoop>,
}

impl Network {
    pub fn new(poison_mode: bool) -> Self {
        Self::with_config(RouterConfig::default().with_poison_mode(poison_mode))
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Network {
            now: 0,
            config,
            devices: BTreeMap::new(),
            next_port: HashMap::new(),
            links: Vec::new(),
            queue: VecDeque::new(),
            muted: HashSet::new(),
            trail: Vec::new(),
            adverts: Vec::new(),
            peaks: HashMap::new(),
            loops: Vec::new(),
        }
    }

    pub fn add_router(&mut self, name: &str) -> &mut Self {
        let engine = RoutingEngine::new(NodeId::new(name), self.config.clone());
        self.devices.insert(name.to_string(), Device::Router(engine));
        self
    }

    pub fn add_host(&mut self, name: &str) -> &mut Self {
        self.devices
            .insert(name.to_string(), Device::Host { received: Vec::new() });
        self
    }

    pub fn add_hub(&mut self, name: &str) -> &mut Self {
        self.devices
            .insert(name.to_string(), Device::Hub { data_seen: 0 });
        self
    }

    /// Bring up a link between `a` and `b` and let the network settle
    ///
    /// Returns the port the new link occupies on `a`.
    pub fn link(&mut self, a: &str, b: &str, latency: u32) -> Port {
        let ends = [
            Endpoint {
                node: a.to_string(),
                port: self.alloc_port(a),
            },
            Endpoint {
                node: b.to_string(),
                port: self.alloc_port(b),
            },
        ];
        self.links.push(Link {
            a: ends[0].clone(),
            b: ends[1].clone(),
            up: true,
        });

        for end in &ends {
            if let Some(Device::Router(engine)) = self.devices.get_mut(&end.node) {
                let actions = engine.on_link_up(end.port, Distance::new(latency), self.now);
                self.observe(&end.node);
                self.dispatch(&end.node, actions);
            }
        }
        for end in &ends {
            if let Some(Device::Host { .. }) = self.devices.get(&end.node) {
                let discovery = Packet::HostDiscovery {
                    host: NodeId::new(end.node.as_str()),
                };
                self.transmit(end, discovery);
            }
        }

        self.settle();
        ends[0].port
    }

    /// Take down the live link between `a` and `b` and let the network settle
    pub fn unlink(&mut self, a: &str, b: &str) {
        let link = self
            .links
            .iter_mut()
            .find(|l| {
                l.up && ((l.a.node == a && l.b.node == b) || (l.a.node == b && l.b.node == a))
            })
            .unwrap_or_else(|| panic!("no live link between {} and {}", a, b));
        link.up = false;
        let ends = [link.a.clone(), link.b.clone()];

        for end in &ends {
            if let Some(Device::Router(engine)) = self.devices.get_mut(&end.node) {
                let actions = engine.on_link_down(end.port, self.now);
                self.observe(&end.node);
                self.dispatch(&end.node, actions);
            }
        }

        self.settle();
    }

    /// Silence a router without taking its links down
    pub fn mute(&mut self, router: &str) {
        self.muted.insert(router.to_string());
    }

    /// Advance one timer interval, tick every router, settle
    pub fn tick(&mut self) {
        self.now += self.config.timer_interval_secs;
        let now = self.now;

        let routers: Vec<String> = self
            .devices
            .iter()
            .filter(|(_, device)| matches!(device, Device::Router(_)))
            .map(|(name, _)| name.clone())
            .collect();

        for name in routers {
            if let Some(Device::Router(engine)) = self.devices.get_mut(&name) {
                let actions = engine.on_timer_tick(now);
                self.observe(&name);
                self.dispatch(&name, actions);
            }
        }

        self.settle();
    }

    pub fn ticks(&mut self, count: usize) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Send one data packet from host `from` to `to`; true if it arrived
    pub fn ping(&mut self, from: &str, to: &str) -> bool {
        self.trail.clear();
        let before = self.delivered_to(to);

        let packet = Packet::Data(DataPacket {
            source: NodeId::new(from),
            destination: NodeId::new(to),
            payload: b"ping".to_vec(),
        });
        let ends: Vec<Endpoint> = self
            .links
            .iter()
            .filter(|l| l.up)
            .flat_map(|l| [l.a.clone(), l.b.clone()])
            .filter(|end| end.node == from)
            .collect();
        for end in &ends {
            self.transmit(end, packet.clone());
        }

        self.settle();
        self.delivered_to(to) > before
    }

    /// Data packets addressed to `host` that reached it
    pub fn delivered_to(&self, host: &str) -> usize {
        match self.devices.get(host) {
            Some(Device::Host { received }) => received
                .iter()
                .filter(|data| data.destination.as_str() == host)
                .count(),
            _ => 0,
        }
    }

    pub fn hub_data_seen(&self, hub: &str) -> usize {
        match self.devices.get(hub) {
            Some(Device::Hub { data_seen }) => *data_seen,
            _ => 0,
        }
    }

    pub fn engine(&self, router: &str) -> &RoutingEngine {
        match self.devices.get(router) {
            Some(Device::Router(engine)) => engine,
            _ => panic!("{} is not a router", router),
        }
    }

    pub fn route(&self, router: &str, destination: &str) -> Option<RouteEntry> {
        self.engine(router)
            .route(&NodeId::new(destination))
            .cloned()
    }

    pub fn distance(&self, router: &str, destination: &str) -> Option<u32> {
        self.route(router, destination)
            .map(|route| route.total_distance.value())
    }

    /// Port `a` uses for its live link to `b`
    pub fn port_between(&self, a: &str, b: &str) -> Port {
        self.links
            .iter()
            .filter(|l| l.up)
            .find_map(|l| {
                if l.a.node == a && l.b.node == b {
                    Some(l.a.port)
                } else if l.b.node == a && l.a.node == b {
                    Some(l.b.port)
                } else {
                    None
                }
            })
            .unwrap_or_else(|| panic!("no live link between {} and {}", a, b))
    }

    /// Highest finite distance `router` held for `destination` since the last reset
    pub fn peak(&self, router: &str, destination: &str) -> Option<u32> {
        self.peaks
            .get(&(router.to_string(), destination.to_string()))
            .map(|d| d.value())
    }

    pub fn reset_peaks(&mut self) {
        self.peaks.clear();
    }

    /// Mutual next hops observed since the last reset, in order
    pub fn loops_seen(&self) -> &[RoutingLoop] {
        &self.loops
    }

    pub fn reset_loops(&mut self) {
        self.loops.clear();
    }

    /// Mutual next hops in the tables right now
    pub fn current_loops(&self) -> Vec<RoutingLoop> {
        let mut loops = Vec::new();
        for router in self.routers() {
            for route in self.engine(&router).routes() {
                if let Some(next) = self.mutual_next_hop(&router, &route.destination) {
                    if router < next {
                        loops.push(RoutingLoop::new(self.now, &route.destination, &router, &next));
                    }
                }
            }
        }
        loops
    }

    /// Advertisements `router` sent for `destination` at `distance`
    pub fn adverts_of(&self, router: &str, destination: &str, distance: u32) -> usize {
        self.adverts
            .iter()
            .filter(|(r, d, x)| r == router && d == destination && *x == distance)
            .count()
    }

    /// (destination, port, distance) for every route of `router`
    pub fn table_view(&self, router: &str) -> Vec<(String, Option<Port>, u32)> {
        self.engine(router)
            .routes()
            .into_iter()
            .map(|r| (r.destination.to_string(), r.out_port, r.total_distance.value()))
            .collect()
    }

    pub fn routers(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|(_, device)| matches!(device, Device::Router(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    // Internals

    fn alloc_port(&mut self, node: &str) -> Port {
        let next = self.next_port.entry(node.to_string()).or_insert(0);
        let port = Port(*next);
        *next += 1;
        port
    }

    fn peer_of(&self, from: &Endpoint) -> Option<Endpoint> {
        self.links.iter().filter(|l| l.up).find_map(|l| {
            if l.a == *from {
                Some(l.b.clone())
            } else if l.b == *from {
                Some(l.a.clone())
            } else {
                None
            }
        })
    }

    fn transmit(&mut self, from: &Endpoint, packet: Packet) {
        if let Some(peer) = self.peer_of(from) {
            self.queue.push_back((peer, packet));
        }
    }

    fn dispatch(&mut self, router: &str, actions: Vec<Action>) {
        if self.muted.contains(router) {
            return;
        }

        for action in actions {
            let from = Endpoint {
                node: router.to_string(),
                port: action.port(),
            };
            match action {
                Action::SendRoute {
                    destination,
                    distance,
                    ..
                } => {
                    self.adverts.push((
                        router.to_string(),
                        destination.to_string(),
                        distance.value(),
                    ));
                    let advertisement = RouteAdvertisement {
                        source: NodeId::new(router),
                        destination,
                        distance,
                    };
                    self.transmit(&from, Packet::Route(advertisement));
                }
                Action::ForwardData { packet, .. } => {
                    self.trail.push(router.to_string());
                    self.transmit(&from, Packet::Data(packet));
                }
            }
        }
    }

    fn settle(&mut self) {
        let mut deliveries = 0;
        while let Some((to, packet)) = self.queue.pop_front() {
            deliveries += 1;
            assert!(deliveries < MAX_DELIVERIES, "network did not settle");
            self.receive(to, packet);
        }
    }

    fn receive(&mut self, to: Endpoint, packet: Packet) {
        let now = self.now;
        let flood = match self.devices.get_mut(&to.node) {
            Some(Device::Router(engine)) => {
                let actions = engine.handle(
                    Event::Packet {
                        packet,
                        port: to.port,
                    },
                    now,
                );
                self.observe(&to.node);
                self.dispatch(&to.node, actions);
                return;
            }
            Some(Device::Host { received }) => {
                if let Packet::Data(data) = packet {
                    received.push(data);
                }
                return;
            }
            Some(Device::Hub { data_seen }) => {
                if matches!(packet, Packet::Data(_)) {
                    *data_seen += 1;
                }
                packet
            }
            None => return,
        };

        let outs: Vec<Endpoint> = self
            .links
            .iter()
            .filter(|l| l.up)
            .flat_map(|l| [l.a.clone(), l.b.clone()])
            .filter(|end| end.node == to.node && end.port != to.port)
            .collect();
        for out in &outs {
            self.transmit(out, flood.clone());
        }
    }

    /// Router on the far side of `router`'s route to `destination`
    fn next_hop(&self, router: &str, destination: &NodeId) -> Option<String> {
        let port = self.engine(router).route(destination)?.out_port?;
        let from = Endpoint {
            node: router.to_string(),
            port,
        };
        let peer = self.peer_of(&from)?;
        match self.devices.get(&peer.node) {
            Some(Device::Router(_)) => Some(peer.node),
            _ => None,
        }
    }

    /// The next hop, if it routes `destination` straight back to `router`
    fn mutual_next_hop(&self, router: &str, destination: &NodeId) -> Option<String> {
        let next = self.next_hop(router, destination)?;
        let back = self.next_hop(&next, destination)?;
        (back == router).then_some(next)
    }

    fn observe(&mut self, router: &str) {
        let routes = self.engine(router).routes();
        for route in &routes {
            let key = (router.to_string(), route.destination.to_string());
            let peak = self.peaks.entry(key).or_insert(route.total_distance);
            if route.total_distance > *peak {
                *peak = route.total_distance;
            }
        }

        for route in &routes {
            if let Some(next) = self.mutual_next_hop(router, &route.destination) {
                let found = RoutingLoop::new(self.now, &route.destination, router, &next);
                self.loops.push(found);
            }
        }
    }
}
