//! Typed protocol messages and their codec.
//!
//! A message is a small tagged record. On the wire it is JSON, deflated,
//! then sealed in the session envelope. The three key exchange flows travel
//! before any key exists and use the plain (unsealed, uncompressed) JSON
//! form.

use crate::error::WireError;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use serde::{Deserialize, Serialize};
use skiff_crypto::Envelope;
use std::io::{Read, Write};

/// The closed set of protocol message kinds.
///
/// Anything else on the wire fails deserialization and is treated as a
/// protocol violation by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Key exchange flow
    #[serde(rename = "pake")]
    Pake,
    /// Sender's transfer metadata
    #[serde(rename = "fileinfo")]
    FileInfo,
    /// Receiver's per-file resume plan
    #[serde(rename = "recipientready")]
    RecipientReady,
    /// Reserved for alternative transport negotiation
    #[serde(rename = "offer")]
    Offer,
    /// Reserved for alternative transport negotiation
    #[serde(rename = "answer")]
    Answer,
    /// One file chunk at an absolute offset
    #[serde(rename = "chunk")]
    Chunk,
    /// Acknowledgement, used for chunk flow control
    #[serde(rename = "ok")]
    Ok,
    /// Sender finished streaming the current file
    #[serde(rename = "close-sender")]
    CloseSender,
    /// Receiver finished writing the current file
    #[serde(rename = "close-recipient")]
    CloseRecipient,
    /// All files accounted for; session over
    #[serde(rename = "finished")]
    Finished,
    /// Fatal error, text carries the reason
    #[serde(rename = "error")]
    Error,
}

impl MessageKind {
    /// Wire name of this kind
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Pake => "pake",
            Self::FileInfo => "fileinfo",
            Self::RecipientReady => "recipientready",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Chunk => "chunk",
            Self::Ok => "ok",
            Self::CloseSender => "close-sender",
            Self::CloseRecipient => "close-recipient",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }
}

/// One protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message kind tag
    #[serde(rename = "t")]
    pub kind: MessageKind,

    /// Human-readable text (error reasons)
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Opaque payload, base64 in the JSON form
    #[serde(rename = "b", default, skip_serializing_if = "Option::is_none", with = "b64")]
    pub bytes: Option<Vec<u8>>,

    /// Numeric argument: file index or chunk offset
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub num: Option<u64>,
}

impl Message {
    /// A bare message of the given kind
    #[must_use]
    pub fn bare(kind: MessageKind) -> Self {
        Self {
            kind,
            text: None,
            bytes: None,
            num: None,
        }
    }

    /// A key exchange flow
    #[must_use]
    pub fn pake(flow: Vec<u8>) -> Self {
        Self {
            bytes: Some(flow),
            ..Self::bare(MessageKind::Pake)
        }
    }

    /// Transfer metadata, already serialized by the caller
    #[must_use]
    pub fn fileinfo(payload: Vec<u8>) -> Self {
        Self {
            bytes: Some(payload),
            ..Self::bare(MessageKind::FileInfo)
        }
    }

    /// Resume plan for file `index`; `missing` is the serialized offset list
    #[must_use]
    pub fn recipient_ready(index: u64, missing: Vec<u8>) -> Self {
        Self {
            num: Some(index),
            bytes: Some(missing),
            ..Self::bare(MessageKind::RecipientReady)
        }
    }

    /// One chunk at the given absolute byte offset
    #[must_use]
    pub fn chunk(offset: u64, data: Vec<u8>) -> Self {
        Self {
            num: Some(offset),
            bytes: Some(data),
            ..Self::bare(MessageKind::Chunk)
        }
    }

    /// A fatal error with a reason
    #[must_use]
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            text: Some(reason.into()),
            ..Self::bare(MessageKind::Error)
        }
    }
}

/// Serialize, compress, and seal one message
///
/// # Errors
///
/// Fails on serialization, compression, or sealing errors; all are fatal
/// for the session.
pub fn encode(envelope: &Envelope, message: &Message) -> Result<Vec<u8>, WireError> {
    let json = serde_json::to_vec(message)?;
    let compressed = deflate(&json)?;
    Ok(envelope.encrypt(&compressed)?)
}

/// Open, decompress, and deserialize one sealed message
///
/// # Errors
///
/// Fails on envelope, decompression, or parse errors; all are fatal for
/// the session.
pub fn decode(envelope: &Envelope, blob: &[u8]) -> Result<Message, WireError> {
    let compressed = envelope.decrypt(blob)?;
    let json = inflate(&compressed)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Serialize one message in the plain pre-key form
///
/// # Errors
///
/// Fails if JSON serialization fails.
pub fn encode_plain(message: &Message) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(message)?)
}

/// Deserialize one plain pre-key message
///
/// # Errors
///
/// Fails if the bytes are not a valid message.
pub fn decode_plain(bytes: &[u8]) -> Result<Message, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, WireError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(WireError::Compression)?;
    encoder.finish().map_err(WireError::Compression)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(WireError::Compression)?;
    Ok(out)
}

mod b64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(d)?;
        match text {
            Some(t) => STANDARD
                .decode(t)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_envelope() -> Envelope {
        Envelope::new(b"session key", b"testsalt").unwrap()
    }

    #[test]
    fn test_sealed_roundtrip() {
        let env = test_envelope();
        let msg = Message::chunk(40_960, vec![0xAB; 512]);

        let blob = encode(&env, &msg).unwrap();
        let back = decode(&env, &blob).unwrap();

        assert_eq!(back, msg);
    }

    #[test]
    fn test_plain_roundtrip() {
        let msg = Message::pake(vec![1, 2, 3, 4]);
        let bytes = encode_plain(&msg).unwrap();
        let back = decode_plain(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_json_shape() {
        let msg = Message {
            kind: MessageKind::Error,
            text: Some("refusing files".into()),
            bytes: None,
            num: None,
        };
        let json = String::from_utf8(encode_plain(&msg).unwrap()).unwrap();
        assert_eq!(json, r#"{"t":"error","m":"refusing files"}"#);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = decode_plain(br#"{"t":"teleport"}"#).unwrap_err();
        assert!(matches!(err, WireError::Codec(_)));
    }

    #[test]
    fn test_sealed_form_is_opaque() {
        let env = test_envelope();
        let msg = Message::error("secret reason");
        let blob = encode(&env, &msg).unwrap();
        let visible = String::from_utf8_lossy(&blob);
        assert!(!visible.contains("secret reason"));
    }

    #[test]
    fn test_decode_with_wrong_envelope_fails() {
        let env = test_envelope();
        let other = Envelope::new(b"other key", b"testsalt").unwrap();
        let blob = encode(&env, &Message::bare(MessageKind::Ok)).unwrap();
        assert!(matches!(decode(&other, &blob), Err(WireError::Crypto(_))));
    }

    proptest! {
        #[test]
        fn prop_sealed_roundtrip(
            text in proptest::option::of(".*"),
            bytes in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..2048)),
            num in proptest::option::of(any::<u64>()),
        ) {
            let env = test_envelope();
            let msg = Message { kind: MessageKind::Chunk, text, bytes, num };
            let blob = encode(&env, &msg).unwrap();
            prop_assert_eq!(decode(&env, &blob).unwrap(), msg);
        }
    }
}
