//! Hub Coordinator
//!
//! One event loop owns the client registry. Registration, unregistration
//! and fan-out all arrive as [`HubEvent`]s on a single channel and are
//! processed one at a time, so the registry needs no lock.
//!
//! Enqueueing onto a client's outbound queue never blocks: a client whose
//! queue is full is evicted on the spot and the fan-out carries on with
//! the remaining clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::client::{self, Client, ClientHandle, ClientId, TaskSettings};
use super::messages::{Envelope, JOINED_NOTICE, LEFT_NOTICE};

/// Configuration for the hub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of each client's outbound queue; a full queue evicts the client
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// Capacity of the hub's event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Maximum number of registered clients (0 = unlimited)
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Heartbeat ping interval in milliseconds (0 = disabled)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Time allowed for a single frame write in milliseconds
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Notify other clients when a client joins or leaves
    #[serde(default = "default_announce_presence")]
    pub announce_presence: bool,
}

fn default_outbound_capacity() -> usize {
    64
}

fn default_event_capacity() -> usize {
    1024
}

fn default_max_clients() -> usize {
    10_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

fn default_announce_presence() -> bool {
    true
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
            event_capacity: default_event_capacity(),
            max_clients: default_max_clients(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            announce_presence: default_announce_presence(),
        }
    }
}

impl HubConfig {
    fn task_settings(&self) -> TaskSettings {
        TaskSettings {
            heartbeat: (self.heartbeat_interval_ms > 0)
                .then(|| Duration::from_millis(self.heartbeat_interval_ms)),
            write_timeout: Duration::from_millis(self.write_timeout_ms.max(1)),
        }
    }
}

/// Events processed by the hub loop, in arrival order
#[derive(Debug)]
pub enum HubEvent {
    /// Admit a client and start its tasks
    Register(Client),
    /// Remove a client and close its outbound queue; no-op if absent
    Unregister(ClientId),
    /// Directed close requested by an operator; same effect as `Unregister`
    Disconnect(ClientId),
    /// Enqueue an encoded envelope on every registered client
    Broadcast(String),
    /// Enqueue an encoded envelope on clients with a matching user id
    SendTo { user_id: i64, payload: String },
    /// Report the registry contents
    Snapshot(oneshot::Sender<HubStats>),
}

/// Public view of one registered client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub user_id: i64,
    pub connected_at: DateTime<Utc>,
    /// Payloads waiting in the outbound queue
    pub queued: usize,
}

/// Registry snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubStats {
    pub client_count: usize,
    pub clients: Vec<ClientInfo>,
}

/// Errors returned to callers of the hub handle
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Hub event loop is not running")]
    Closed,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl<T> From<mpsc::error::SendError<T>> for HubError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        HubError::Closed
    }
}

/// Cloneable handle to the hub loop
///
/// Every method only submits an event; none of them touches the registry.
#[derive(Clone)]
pub struct Hub {
    events: mpsc::Sender<HubEvent>,
}

impl Hub {
    /// Spawn the hub loop and return a handle to it
    ///
    /// The loop keeps its own sender for the client tasks it spawns, so it
    /// runs for the life of the process. Abort the returned task to stop it.
    pub fn start(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (events, rx) = mpsc::channel(config.event_capacity.max(1));
        let hub_loop = HubLoop::new(config, rx, events.clone());
        let task = tokio::spawn(hub_loop.run());

        (Self { events }, task)
    }

    /// Submit a client for admission
    pub async fn register(&self, client: Client) -> Result<(), HubError> {
        self.events.send(HubEvent::Register(client)).await?;
        Ok(())
    }

    /// Remove a client; unknown ids are ignored
    pub async fn unregister(&self, id: &str) -> Result<(), HubError> {
        self.events.send(HubEvent::Unregister(id.to_string())).await?;
        Ok(())
    }

    /// Close a client on request
    pub async fn disconnect(&self, id: &str) -> Result<(), HubError> {
        self.events.send(HubEvent::Disconnect(id.to_string())).await?;
        Ok(())
    }

    /// Fan an envelope out to every registered client
    pub async fn broadcast(&self, envelope: &Envelope) -> Result<(), HubError> {
        let payload = envelope.encode()?;
        self.events.send(HubEvent::Broadcast(payload)).await?;
        Ok(())
    }

    /// Fan an envelope out to the clients of one user
    pub async fn send_to(&self, user_id: i64, envelope: &Envelope) -> Result<(), HubError> {
        let payload = envelope.encode()?;
        self.events
            .send(HubEvent::SendTo { user_id, payload })
            .await?;
        Ok(())
    }

    /// Take a snapshot of the registry
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (tx, rx) = oneshot::channel();
        self.events.send(HubEvent::Snapshot(tx)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Current number of registered clients
    pub async fn client_count(&self) -> Result<usize, HubError> {
        Ok(self.stats().await?.client_count)
    }
}

/// Set of registered clients
#[derive(Debug, Default)]
pub(crate) struct Registry {
    clients: HashMap<ClientId, ClientHandle>,
}

impl Registry {
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    pub fn insert(&mut self, handle: ClientHandle) {
        self.clients.insert(handle.id.clone(), handle);
    }

    /// Remove a client and close its outbound queue
    pub fn remove(&mut self, id: &str) -> Option<ClientId> {
        let handle = self.clients.remove(id)?;
        handle.lifecycle.begin_closing();
        // Dropping the only sender closes the queue
        Some(handle.id)
    }

    /// Try to enqueue `payload` on every client accepted by `filter`.
    ///
    /// Returns the clients whose queue could not take it. They are still
    /// registered; the caller evicts them.
    pub fn deliver<F>(&self, payload: &str, filter: F) -> Vec<ClientId>
    where
        F: Fn(&ClientHandle) -> bool,
    {
        let mut rejected = Vec::new();

        for handle in self.clients.values().filter(|h| filter(h)) {
            match handle.outbound.try_send(payload.to_string()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        client_id = %handle.id,
                        user_id = handle.user_id,
                        "Outbound queue full, evicting slow client"
                    );
                    rejected.push(handle.id.clone());
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(client_id = %handle.id, "Write task gone, evicting client");
                    rejected.push(handle.id.clone());
                }
            }
        }

        rejected
    }

    pub fn snapshot(&self) -> HubStats {
        let clients = self
            .clients
            .values()
            .map(|h| ClientInfo {
                id: h.id.clone(),
                user_id: h.user_id,
                connected_at: h.connected_at,
                queued: h.queued(),
            })
            .collect();

        HubStats {
            client_count: self.clients.len(),
            clients,
        }
    }
}

/// State owned by the hub loop task
pub(crate) struct HubLoop {
    registry: Registry,
    config: HubConfig,
    settings: TaskSettings,
    rx: mpsc::Receiver<HubEvent>,
    /// Handed to the tasks of every admitted client
    events: mpsc::Sender<HubEvent>,
    joined_notice: String,
    left_notice: String,
}

impl HubLoop {
    pub fn new(
        config: HubConfig,
        rx: mpsc::Receiver<HubEvent>,
        events: mpsc::Sender<HubEvent>,
    ) -> Self {
        Self {
            registry: Registry::default(),
            settings: config.task_settings(),
            config,
            rx,
            events,
            joined_notice: Envelope::notice(JOINED_NOTICE).encode().unwrap_or_default(),
            left_notice: Envelope::notice(LEFT_NOTICE).encode().unwrap_or_default(),
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            outbound_capacity = self.config.outbound_capacity,
            max_clients = self.config.max_clients,
            "Hub loop started"
        );

        while let Some(event) = self.rx.recv().await {
            self.handle(event);
        }

        tracing::info!(clients = self.registry.len(), "Hub loop stopped");
    }

    /// Process one event to completion. Never awaits.
    pub fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register(client) => self.admit(client),
            HubEvent::Unregister(id) => self.evict(vec![id]),
            HubEvent::Disconnect(id) => {
                tracing::info!(client_id = %id, "Directed close requested");
                self.evict(vec![id]);
            }
            HubEvent::Broadcast(payload) => {
                let rejected = self.registry.deliver(&payload, |_| true);
                self.evict(rejected);
            }
            HubEvent::SendTo { user_id, payload } => {
                let rejected = self.registry.deliver(&payload, |h| h.user_id == user_id);
                self.evict(rejected);
            }
            HubEvent::Snapshot(reply) => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    fn admit(&mut self, client: Client) {
        let Client {
            id,
            user_id,
            connection,
            lifecycle,
        } = client;

        if self.registry.contains(&id) {
            tracing::warn!(client_id = %id, "Client already registered, ignoring");
            lifecycle.refuse();
            return;
        }

        if self.config.max_clients > 0 && self.registry.len() >= self.config.max_clients {
            tracing::warn!(
                client_id = %id,
                limit = self.config.max_clients,
                "Client limit reached, refusing connection"
            );
            lifecycle.refuse();
            return;
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity.max(1));
        lifecycle.activate();
        lifecycle.task_started();
        lifecycle.task_started();

        tokio::spawn(client::read_loop(
            id.clone(),
            connection.reader,
            Arc::clone(&lifecycle),
            self.events.clone(),
        ));
        tokio::spawn(client::write_loop(
            id.clone(),
            connection.writer,
            outbound_rx,
            Arc::clone(&lifecycle),
            self.events.clone(),
            self.settings,
        ));

        let rejected = if self.config.announce_presence && !self.joined_notice.is_empty() {
            self.registry.deliver(&self.joined_notice, |_| true)
        } else {
            Vec::new()
        };

        self.registry.insert(ClientHandle {
            id: id.clone(),
            user_id,
            outbound: outbound_tx,
            lifecycle,
            connected_at: Utc::now(),
        });

        tracing::info!(
            client_id = %id,
            user_id,
            clients = self.registry.len(),
            "Client registered"
        );

        self.evict(rejected);
    }

    /// Remove every listed client. Departure notices that overflow further
    /// queues add those clients to the work list.
    fn evict(&mut self, mut pending: Vec<ClientId>) {
        while let Some(id) = pending.pop() {
            if self.registry.remove(&id).is_none() {
                continue;
            }

            tracing::info!(
                client_id = %id,
                clients = self.registry.len(),
                "Client unregistered"
            );

            if self.config.announce_presence
                && !self.left_notice.is_empty()
                && !self.registry.is_empty()
            {
                pending.extend(self.registry.deliver(&self.left_notice, |_| true));
            }
        }
    }
}
