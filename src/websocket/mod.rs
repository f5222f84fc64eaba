//! WebSocket Broadcast Hub
//!
//! Fans messages out to every connected WebSocket client, or to the
//! clients of one user, without letting a slow client stall the others.
//!
//! ## Architecture
//!
//! - **Hub**: single event loop that owns the client registry
//! - **Client**: per-connection read and write tasks
//! - **Connection**: adapter traits over the socket halves
//! - **Handler**: WebSocket upgrade endpoint
//! - **Messages**: the JSON envelope carried in every text frame
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8090/ws?user_id=42');
//!
//! ws.onopen = () => ws.send('hello everyone');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   console.log(msg.sender, msg.content);
//! };
//! ```

mod client;
mod connection;
mod handler;
mod hub;
mod messages;

pub use client::{Client, ClientId, ClientState, Lifecycle};
pub use connection::{Connection, ConnectionError, Frame, FrameReader, FrameWriter};
pub use handler::{resolve_user_id, websocket_handler, UpgradeParams, USER_ID_HEADER};
pub use hub::{ClientInfo, Hub, HubConfig, HubError, HubEvent, HubStats};
pub use messages::{Envelope, JOINED_NOTICE, LEFT_NOTICE};

#[cfg(test)]
pub(crate) use connection::memory;
