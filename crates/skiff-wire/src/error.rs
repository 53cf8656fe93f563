//! Error types for the skiff wire layer.

use thiserror::Error;

/// Wire-level errors
#[derive(Debug, Error)]
pub enum WireError {
    /// The peer closed the stream (EOF, possibly mid-frame)
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The 5-digit length header could not be parsed
    #[error("malformed frame header: {0:?}")]
    MalformedHeader(String),

    /// A frame exceeds the maximum payload the header can express
    #[error("frame of {0} bytes exceeds the framing limit")]
    Oversized(usize),

    /// No bytes arrived within the read deadline
    #[error("read timed out")]
    Timeout,

    /// Message (de)serialization failed, including unknown message kinds
    #[error("message codec: {0}")]
    Codec(#[from] serde_json::Error),

    /// Deflate compression or decompression failed
    #[error("compression: {0}")]
    Compression(std::io::Error),

    /// Envelope sealing or opening failed
    #[error(transparent)]
    Crypto(#[from] skiff_crypto::CryptoError),

    /// Underlying socket error
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}
