//! Error types for skiff cryptography.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed
    #[error("encryption failed")]
    EncryptionFailed,

    /// Ciphertext failed authentication
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Envelope shorter than salt + nonce + tag
    #[error("envelope too short: {0} bytes")]
    TruncatedEnvelope(usize),

    /// Envelope salt does not match the session salt
    #[error("envelope salt does not match session salt")]
    SaltMismatch,

    /// Salt has the wrong length
    #[error("salt must be {expected} bytes, got {actual}")]
    BadSaltLength {
        /// Required salt size
        expected: usize,
        /// Size received
        actual: usize,
    },

    /// Peer sent an unusable exchange flow
    #[error("malformed key exchange flow")]
    BadExchangeFlow,

    /// Peer's key confirmation tag did not verify
    #[error("key confirmation failed")]
    ConfirmationFailed,

    /// Session key requested before the exchange completed
    #[error("session key not yet agreed")]
    NotYetAgreed,

    /// An exchange flow arrived after the exchange completed
    #[error("key exchange already complete")]
    ExchangeComplete,
}
