//! # Skiff Crypto
//!
//! Cryptographic primitives for the skiff transfer protocol.
//!
//! This crate provides:
//! - SPAKE2 code-phrase key exchange with mutual key confirmation
//! - AES-256-GCM envelope sealing with PBKDF2 key derivation
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm |
//! |----------|-----------|
//! | Key Exchange | SPAKE2 (Ed25519 group) |
//! | Key Confirmation | HMAC-SHA256 |
//! | KDF | PBKDF2-HMAC-SHA256 |
//! | AEAD | AES-256-GCM |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod error;
pub mod exchange;

pub use envelope::Envelope;
pub use error::CryptoError;
pub use exchange::{KeyExchange, Role};

/// Session key size produced by the key exchange
pub const SESSION_KEY_SIZE: usize = 32;

/// Envelope salt size on the wire
pub const SALT_SIZE: usize = 8;

/// AES-GCM nonce size on the wire
pub const NONCE_SIZE: usize = 12;

/// Key confirmation tag size appended to exchange flows
pub const CONFIRM_TAG_SIZE: usize = 32;
