// Node actor: one routing engine running as a tokio task
//
// The engine is owned by a single task and never shared:
// - Events and queries arrive over a bounded command channel
// - A periodic interval drives the timer tick
// - Outbound actions leave over a bounded channel, in the order produced
//
// The clock handed to the engine is whole seconds since the actor started.

use crate::config::{ConfigError, RouterConfig};
use crate::packet::{Action, Event, NodeId, Packet, Port};
use crate::routing::{EngineStats, Latency, RouteEntry, RoutingEngine, RoutingSummary};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

/// Capacity of the inbound command channel
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the outbound action channel
const ACTION_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Invalid router config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Node task not running")]
    Stopped,
}

/// Commands that can be sent to the node task
#[derive(Debug)]
enum NodeCommand {
    /// Feed one event to the engine
    Event(Event),
    /// Snapshot of the route table
    Routes { reply: oneshot::Sender<Vec<RouteEntry>> },
    /// Engine state counts
    Summary { reply: oneshot::Sender<RoutingSummary> },
    /// Running counters
    Stats { reply: oneshot::Sender<EngineStats> },
    /// Stop the task
    Shutdown,
}

/// Handle to communicate with a running node task
#[derive(Clone)]
pub struct NodeHandle {
    id: NodeId,
    command_tx: mpsc::Sender<NodeCommand>,
}

impl NodeHandle {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Feed an arbitrary event to the engine
    pub async fn send_event(&self, event: Event) -> Result<(), NodeError> {
        self.command_tx
            .send(NodeCommand::Event(event))
            .await
            .map_err(|_| NodeError::Stopped)
    }

    pub async fn link_up(&self, port: Port, latency: Latency) -> Result<(), NodeError> {
        self.send_event(Event::LinkUp { port, latency }).await
    }

    pub async fn link_down(&self, port: Port) -> Result<(), NodeError> {
        self.send_event(Event::LinkDown { port }).await
    }

    /// Hand a packet that arrived on `port` to the node
    pub async fn deliver(&self, packet: Packet, port: Port) -> Result<(), NodeError> {
        self.send_event(Event::Packet { packet, port }).await
    }

    /// Current routes, sorted by destination
    pub async fn routes(&self) -> Result<Vec<RouteEntry>, NodeError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(NodeCommand::Routes { reply }, reply_rx).await
    }

    pub async fn summary(&self) -> Result<RoutingSummary, NodeError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(NodeCommand::Summary { reply }, reply_rx).await
    }

    pub async fn stats(&self) -> Result<EngineStats, NodeError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(NodeCommand::Stats { reply }, reply_rx).await
    }

    /// Stop the node task
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        self.command_tx
            .send(NodeCommand::Shutdown)
            .await
            .map_err(|_| NodeError::Stopped)
    }

    async fn request<T>(
        &self,
        command: NodeCommand,
        reply_rx: oneshot::Receiver<T>,
    ) -> Result<T, NodeError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| NodeError::Stopped)?;
        reply_rx.await.map_err(|_| NodeError::Stopped)
    }
}

/// Validate `config`, spawn the node task and return its handle plus the
/// stream of actions it produces.
///
/// Must be called from within a tokio runtime.
pub fn spawn_node(
    id: NodeId,
    config: RouterConfig,
) -> Result<(NodeHandle, mpsc::Receiver<Action>), NodeError> {
    config.validate()?;

    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (action_tx, action_rx) = mpsc::channel(ACTION_CHANNEL_CAPACITY);

    let handle = NodeHandle {
        id: id.clone(),
        command_tx,
    };

    tokio::spawn(run_node(RoutingEngine::new(id, config), command_rx, action_tx));

    Ok((handle, action_rx))
}

async fn run_node(
    mut engine: RoutingEngine,
    mut command_rx: mpsc::Receiver<NodeCommand>,
    action_tx: mpsc::Sender<Action>,
) {
    let started = Instant::now();
    let period = Duration::from_secs(engine.config().timer_interval_secs);
    let mut ticker = time::interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "Node {} started (poison: {})",
        engine.local_id(),
        engine.config().poison_mode
    );

    loop {
        let actions = tokio::select! {
            _ = ticker.tick() => {
                let now = started.elapsed().as_secs();
                engine.on_timer_tick(now)
            }

            command = command_rx.recv() => {
                match command {
                    Some(NodeCommand::Event(event)) => {
                        let now = started.elapsed().as_secs();
                        engine.handle(event, now)
                    }
                    Some(NodeCommand::Routes { reply }) => {
                        let _ = reply.send(engine.routes());
                        continue;
                    }
                    Some(NodeCommand::Summary { reply }) => {
                        let _ = reply.send(engine.summary());
                        continue;
                    }
                    Some(NodeCommand::Stats { reply }) => {
                        let _ = reply.send(engine.stats().clone());
                        continue;
                    }
                    Some(NodeCommand::Shutdown) => {
                        tracing::info!("Node {} shutting down", engine.local_id());
                        break;
                    }
                    None => {
                        tracing::debug!("Node {}: all handles dropped", engine.local_id());
                        break;
                    }
                }
            }
        };

        for action in actions {
            if action_tx.send(action).await.is_err() {
                tracing::warn!("Node {}: action receiver dropped, stopping", engine.local_id());
                return;
            }
        }
    }
}
