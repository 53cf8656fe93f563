//! The transfer error set.

use skiff_wire::WireError;
use thiserror::Error;

/// Everything that can abort a transfer.
///
/// This set is closed on purpose: each variant corresponds to one
/// user-distinguishable failure, and the CLI prints exactly one line per
/// terminal error.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Local I/O failure (disk or socket)
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream broke protocol framing
    #[error("framing: {0}")]
    Framing(WireError),

    /// A sealed message failed authentication mid-session
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The peers' code phrases do not match
    #[error("wrong code phrase")]
    WrongCode,

    /// A message kind arrived that the current state cannot accept
    #[error("protocol violation: unexpected '{got}' while {state}")]
    ProtocolViolation {
        /// State the peer was in
        state: &'static str,
        /// What arrived instead
        got: &'static str,
    },

    /// The receiving peer declined the offered files
    #[error("peer refused files")]
    PeerRefused,

    /// The requested relay room slot is already occupied
    #[error("relay room is busy")]
    RoomBusy,

    /// A read or connect deadline passed
    #[error("timed out")]
    Timeout,

    /// The peer (or the local user) aborted the transfer
    #[error("transfer cancelled")]
    Cancelled,
}

impl From<WireError> for TransferError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Timeout => Self::Timeout,
            WireError::Io(io) => Self::Io(io),
            WireError::Crypto(_) => Self::AuthenticationFailed,
            other => Self::Framing(other),
        }
    }
}

impl TransferError {
    /// Short stable label for logs and the one-line stderr summary
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Framing(_) => "framing",
            Self::AuthenticationFailed => "authentication-failed",
            Self::WrongCode => "wrong-code",
            Self::ProtocolViolation { .. } => "protocol-violation",
            Self::PeerRefused => "peer-refused",
            Self::RoomBusy => "room-busy",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}
