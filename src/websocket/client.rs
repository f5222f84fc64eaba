//! Client State and Tasks
//!
//! A [`Client`] is one admitted connection. Once the hub admits it, two
//! tasks own the connection: the read task turns inbound frames into
//! broadcast events, and the write task drains the client's outbound
//! queue to the wire. Neither task touches the registry; both talk to the
//! hub only by submitting events.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use uuid::Uuid;

use super::connection::{Connection, ConnectionError, Frame, FrameReader, FrameWriter};
use super::hub::HubEvent;
use super::messages::Envelope;

/// Process-unique identifier of an admitted client
pub type ClientId = String;

/// Position of a client in its lifecycle
///
/// States only move forward: `Connecting -> Active -> Closing -> Closed`.
/// A client refused at admission goes straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Shared lifecycle of one client
///
/// Transitions are compare-and-set, so repeating one is a no-op. The hub
/// loop performs `Active -> Closing` together with registry removal; the
/// last exiting task performs `Closing -> Closed`.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<ClientState>,
    live_tasks: AtomicUsize,
    unregister_requested: AtomicBool,
}

impl Lifecycle {
    fn new() -> Self {
        let (state, _) = watch::channel(ClientState::Connecting);
        Self {
            state,
            live_tasks: AtomicUsize::new(0),
            unregister_requested: AtomicBool::new(false),
        }
    }

    /// Current state
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    fn transition(&self, from: ClientState, to: ClientState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn activate(&self) -> bool {
        self.transition(ClientState::Connecting, ClientState::Active)
    }

    pub(crate) fn refuse(&self) {
        self.transition(ClientState::Connecting, ClientState::Closed);
    }

    /// Mark the client as removed from the registry.
    ///
    /// Also consumes the unregister request so no task submits one later.
    pub(crate) fn begin_closing(&self) -> bool {
        self.unregister_requested.store(true, Ordering::SeqCst);
        let changed = self.transition(ClientState::Active, ClientState::Closing);
        if changed {
            self.try_finish();
        }
        changed
    }

    /// Returns true for the first caller only; that caller submits the
    /// single `Unregister` event of this lifecycle.
    pub(crate) fn request_unregister(&self) -> bool {
        !self.unregister_requested.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn task_started(&self) {
        self.live_tasks.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn task_exited(&self) {
        if self.live_tasks.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.try_finish();
        }
    }

    fn try_finish(&self) {
        if self.live_tasks.load(Ordering::SeqCst) == 0 {
            self.transition(ClientState::Closing, ClientState::Closed);
        }
    }
}

/// A connection waiting to be admitted by the hub
#[derive(Debug)]
pub struct Client {
    pub(crate) id: ClientId,
    pub(crate) user_id: i64,
    pub(crate) connection: Connection,
    pub(crate) lifecycle: Arc<Lifecycle>,
}

impl Client {
    /// Create a client with a freshly generated id
    pub fn new(user_id: i64, connection: Connection) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), user_id, connection)
    }

    /// Create a client with a caller-chosen id
    pub fn with_id(id: impl Into<ClientId>, user_id: i64, connection: Connection) -> Self {
        Self {
            id: id.into(),
            user_id,
            connection,
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Lifecycle handle, usable after the client has been handed to the hub
    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }
}

/// Registry entry for an admitted client
///
/// The entry holds the only sender of the outbound queue, so removing
/// the entry from the registry is what closes the queue.
#[derive(Debug)]
pub(crate) struct ClientHandle {
    pub id: ClientId,
    pub user_id: i64,
    pub outbound: mpsc::Sender<String>,
    pub lifecycle: Arc<Lifecycle>,
    pub connected_at: DateTime<Utc>,
}

impl ClientHandle {
    /// Number of payloads waiting in the outbound queue
    pub fn queued(&self) -> usize {
        self.outbound.max_capacity() - self.outbound.capacity()
    }
}

/// Per-client task settings taken from the hub configuration
#[derive(Debug, Clone, Copy)]
pub(crate) struct TaskSettings {
    pub heartbeat: Option<Duration>,
    pub write_timeout: Duration,
}

/// Submit the single `Unregister` event of this lifecycle
async fn submit_unregister(id: &str, lifecycle: &Lifecycle, events: &mpsc::Sender<HubEvent>) {
    if lifecycle.request_unregister() {
        let _ = events.send(HubEvent::Unregister(id.to_string())).await;
    }
}

/// Read task: inbound frames become broadcasts until the peer goes away
/// or the hub removes the client.
pub(crate) async fn read_loop(
    id: ClientId,
    mut reader: Box<dyn FrameReader>,
    lifecycle: Arc<Lifecycle>,
    events: mpsc::Sender<HubEvent>,
) {
    let mut state = lifecycle.subscribe();

    loop {
        let frame = tokio::select! {
            _ = removed(&mut state) => {
                tracing::trace!(client_id = %id, "Read task stopping, client removed");
                break;
            }
            frame = reader.read_frame() => frame,
        };

        match frame {
            Ok(Some(text)) => {
                let payload = match Envelope::from_client(&id, text).encode() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!(client_id = %id, error = %e, "Failed to encode envelope");
                        continue;
                    }
                };
                if events.send(HubEvent::Broadcast(payload)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(client_id = %id, "Peer closed connection");
                submit_unregister(&id, &lifecycle, &events).await;
                break;
            }
            Err(e) => {
                tracing::debug!(client_id = %id, error = %e, "Read failed");
                submit_unregister(&id, &lifecycle, &events).await;
                break;
            }
        }
    }

    drop(reader);
    lifecycle.task_exited();
}

/// Write task: the only writer of the connection for its whole lifetime.
///
/// Drains the outbound queue and sends heartbeat pings. When the hub
/// closes the queue a close frame is written and the task ends.
pub(crate) async fn write_loop(
    id: ClientId,
    mut writer: Box<dyn FrameWriter>,
    mut outbound: mpsc::Receiver<String>,
    lifecycle: Arc<Lifecycle>,
    events: mpsc::Sender<HubEvent>,
    settings: TaskSettings,
) {
    let mut heartbeat = settings.heartbeat.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        let result = tokio::select! {
            biased;
            next = outbound.recv() => match next {
                Some(payload) => write(&mut writer, Frame::Text(payload), settings.write_timeout).await,
                None => {
                    if let Err(e) = write(&mut writer, Frame::Close, settings.write_timeout).await {
                        tracing::trace!(client_id = %id, error = %e, "Close frame not delivered");
                    }
                    break;
                }
            },
            _ = tick(&mut heartbeat) => write(&mut writer, Frame::Ping, settings.write_timeout).await,
        };

        if let Err(e) = result {
            tracing::debug!(client_id = %id, error = %e, "Write failed");
            submit_unregister(&id, &lifecycle, &events).await;
            break;
        }
    }

    drop(writer);
    lifecycle.task_exited();
}

async fn removed(state: &mut watch::Receiver<ClientState>) {
    let _ = state.wait_for(|s| *s >= ClientState::Closing).await;
}

async fn write(
    writer: &mut Box<dyn FrameWriter>,
    frame: Frame,
    limit: Duration,
) -> Result<(), ConnectionError> {
    tokio::time::timeout(limit, writer.write_frame(frame))
        .await
        .map_err(|_| ConnectionError::Timeout)?
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
