//! Transfer states.

/// The monotonic state progression both peers move through.
///
/// Transitions are driven only by receiving a message of the kind the
/// current state expects; anything else is a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Paired through the relay, key exchange in flight
    Connected,
    /// Session key agreed, metadata pending
    KeyAgreed,
    /// Transfer set known to both sides
    MetadataExchanged,
    /// Receiver announced its resume plan for the current file
    RecipientReady,
    /// Chunks in flight
    Transferring,
    /// Current file written, integrity check running
    Verifying,
    /// All files accounted for
    Done,
    /// Aborted
    Failed,
}

impl TransferState {
    /// Stable lowercase label for logs and violation messages
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::KeyAgreed => "key-agreed",
            Self::MetadataExchanged => "metadata-exchanged",
            Self::RecipientReady => "recipient-ready",
            Self::Transferring => "transferring",
            Self::Verifying => "verifying",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(TransferState::Connected.label(), "connected");
        assert_eq!(TransferState::RecipientReady.label(), "recipient-ready");
    }
}
