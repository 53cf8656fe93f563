//! Advisory progress events.
//!
//! The state machines emit these on an out-of-band channel for whatever
//! front-end is listening. Dropping the receiving end is harmless; events
//! never affect protocol behavior.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// One advisory progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Paired with the peer through a relay
    Connected,
    /// Session key agreed
    KeyAgreed,
    /// Transfer metadata known
    Plan {
        /// Number of files in the transfer
        files: usize,
        /// Total payload bytes
        total_bytes: u64,
    },
    /// A file began transferring
    FileStarted {
        /// Index in the transfer set
        index: usize,
        /// File name
        name: String,
        /// File size in bytes
        size: u64,
        /// Chunks requested by the resume plan; 0 means the whole file
        missing_chunks: usize,
    },
    /// A chunk moved
    Chunk {
        /// Index in the transfer set
        index: usize,
        /// Bytes moved so far for this file
        bytes_done: u64,
        /// File size in bytes
        size: u64,
    },
    /// A file was already complete and skipped
    FileSkipped {
        /// Index in the transfer set
        index: usize,
        /// File name
        name: String,
    },
    /// A file finished and verified
    FileCompleted {
        /// Index in the transfer set
        index: usize,
        /// File name
        name: String,
    },
    /// The whole transfer completed
    Finished,
}

/// Handle the state machines emit progress through
#[derive(Debug, Clone)]
pub struct Progress {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl Progress {
    /// A progress handle plus the receiving end for a front-end to consume
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A handle that drops every event
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit one event; never fails, never blocks
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
