//! The live-update client.
//!
//! One persistent WebSocket connection to the AssetWire backend, with many
//! logical channels multiplexed over it. The module splits along the
//! concerns of the connection lifecycle:
//!
//! - [`Client`]: public facade wiring the pieces together
//! - [`ConnectionManager`]: owns the socket and the state machine
//! - [`ChannelRegistry`](channels::ChannelRegistry): the topic set that
//!   survives reconnects
//! - [`EventRouter`](router::EventRouter): fan-out of inbound frames to
//!   registered handlers
//! - [`Config`]: heartbeat interval and reconnect policy
//!
//! # Example
//!
//! ```ignore
//! let client = Client::new(endpoint, credentials, Config::default())?;
//! client.subscribe_to_channel(Channel::asset(42))?;
//! client.on(EventType::CommentAdded, |data| { /* ... */ });
//! client.connect()?;
//! ```

pub mod channels;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod router;

pub use client::Client;
pub use config::{Config, ReconnectConfig};
pub use connection::{ConnectionManager, ConnectionState};
#[expect(
    clippy::module_name_repetitions,
    reason = "LiveError includes module name for clarity when used outside this module"
)]
pub use error::LiveError;
pub use frame::Frame;
pub use router::{EventRouter, HandlerId};
