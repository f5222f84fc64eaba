//! # Hubcast
//!
//! Real-time broadcast hub for WebSocket clients: messages from any client,
//! or pushed over HTTP, are fanned out to all connected clients or to the
//! clients of one user.
//!
//! ## Features
//!
//! - **Single-owner registry**: one event loop serializes every registration,
//!   removal and fan-out, so the client set needs no lock
//! - **Slow-consumer eviction**: a client whose bounded outbound queue is full
//!   is dropped instead of stalling delivery to everyone else
//! - **Addressed delivery**: push to every connection of a user id
//! - **Heartbeat**: periodic pings detect dead peers
//!
//! ## Modules
//!
//! - [`websocket`]: Hub, client tasks and connection adapter
//! - [`api`]: HTTP endpoints with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hubcast::websocket::{Envelope, Hub, HubConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (hub, _hub_task) = Hub::start(HubConfig::default());
//!
//!     // Everyone
//!     hub.broadcast(&Envelope::notice("maintenance in 5 minutes")).await?;
//!
//!     // Only the connections of user 42
//!     hub.send_to(42, &Envelope::notice("your export is ready")).await?;
//!
//!     println!("{} clients connected", hub.client_count().await?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod websocket;

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{
    Client, ClientInfo, ClientState, Connection, ConnectionError, Envelope, Hub, HubConfig,
    HubError, HubStats, websocket_handler,
};

pub use config::{generate_default_config, Config, ConfigError, LoggingConfig, ServerConfig};
