//! # Skiff Relay
//!
//! The rendezvous relay: pairs two peers who present the same room id, then
//! blindly copies bytes between them. The relay never parses, decrypts, or
//! originates a single byte of the forwarded stream, and it learns nothing
//! beyond the public room id.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod http;
pub mod protocol;
pub mod room;
pub mod server;

pub use protocol::{Banner, JoinReply};
pub use room::RoomTable;
pub use server::{Relay, RelayConfig};

use std::time::Duration;

/// Default relay TCP ports
pub const DEFAULT_TCP_PORTS: [u16; 2] = [27140, 27141];

/// Default HTTP liveness port
pub const DEFAULT_HTTP_PORT: u16 = 8140;

/// A room with no traffic for this long is torn down
pub const ROOM_IDLE_MAX: Duration = Duration::from_secs(10 * 60);
