//! Peer options.

use std::path::PathBuf;

/// Default public relay address a peer dials
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:27140";

/// Everything a peer needs to run one transfer
#[derive(Debug, Clone)]
pub struct Options {
    /// The code phrase; its first word is the public room id
    pub shared_secret: String,
    /// Sending (true) or receiving (false)
    pub is_sender: bool,
    /// host:port of the public rendezvous relay
    pub relay_address: String,
    /// Skip LAN discovery entirely
    pub disable_local: bool,
    /// Use only LAN discovery, never the public relay
    pub local_only: bool,
    /// Accept incoming transfers without a confirmation prompt
    pub no_prompt: bool,
    /// Write received bytes to standard output instead of files
    pub stdout: bool,
    /// Verbose logging
    pub debug: bool,
    /// Receiver's destination directory
    pub output_dir: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            shared_secret: String::new(),
            is_sender: false,
            relay_address: DEFAULT_RELAY_ADDR.to_string(),
            disable_local: false,
            local_only: false,
            no_prompt: false,
            stdout: false,
            debug: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Options {
    /// Check the options are usable for a transfer
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unusable field.
    pub fn validate(&self) -> Result<(), String> {
        if self.shared_secret.is_empty() {
            return Err("a shared code phrase is required".to_string());
        }
        if self.local_only && self.disable_local {
            return Err("local-only and disable-local are mutually exclusive".to_string());
        }
        if !self.local_only && !self.relay_address.contains(':') {
            return Err(format!(
                "relay address '{}' must be host:port",
                self.relay_address
            ));
        }
        Ok(())
    }
}
