//! # Skiff Core
//!
//! The transfer engine: both peer state machines, code-phrase handling,
//! options, and the wiring that connects a peer to a relay (public or
//! LAN-discovered).
//!
//! The protocol in one breath: both peers join the same relay room (named
//! by the public first word of the code phrase), run a code-phrase key
//! exchange over the forwarded stream, then drive a typed, sealed message
//! protocol through metadata exchange, per-file resume planning, chunk
//! streaming, and integrity verification.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod options;
pub mod phrase;
pub mod progress;
pub mod receiver;
pub mod sender;
mod session;
pub mod state;

pub use client::{receive, send};
pub use error::TransferError;
pub use options::Options;
pub use progress::{Progress, ProgressEvent};
pub use state::TransferState;

use std::time::Duration;

/// Interval between keep-alive frames while a peer waits
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a relay connection to establish
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay slot occupied by the sending peer
pub const ROLE_SENDER: u8 = 0;

/// Relay slot occupied by the receiving peer
pub const ROLE_RECEIVER: u8 = 1;
