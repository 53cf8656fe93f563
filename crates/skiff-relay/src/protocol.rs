//! Relay join protocol.
//!
//! A connecting peer sends one framed JSON banner naming the room and its
//! role slot; the relay answers with one framed JSON reply. Everything
//! after an accepted reply is opaque forwarded bytes.

use serde::{Deserialize, Serialize};

/// The join banner a peer presents on connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    /// Public room identifier
    pub room: String,
    /// Slot to occupy: 0 or 1
    pub role: u8,
}

impl Banner {
    /// Serialize to the framed JSON form
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse from the framed JSON form
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid banner.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// The relay's answer to a join banner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinReply {
    /// Slot occupied; forwarding begins once the partner arrives
    #[serde(rename = "accepted")]
    Accepted,
    /// The requested (room, role) slot is already taken
    #[serde(rename = "room-busy")]
    RoomBusy,
    /// The banner was unusable (bad role)
    #[serde(rename = "invalid")]
    Invalid,
}

impl JoinReply {
    /// Serialize to the framed JSON form
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self)
    }

    /// Parse from the framed JSON form
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid reply.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_roundtrip() {
        let banner = Banner {
            room: "carpet".into(),
            role: 1,
        };
        let bytes = banner.to_bytes().unwrap();
        assert_eq!(Banner::from_bytes(&bytes).unwrap(), banner);
    }

    #[test]
    fn test_reply_wire_form() {
        assert_eq!(JoinReply::Accepted.to_bytes().unwrap(), br#""accepted""#);
        assert_eq!(JoinReply::RoomBusy.to_bytes().unwrap(), br#""room-busy""#);
    }

    #[test]
    fn test_reply_roundtrip() {
        for reply in [JoinReply::Accepted, JoinReply::RoomBusy, JoinReply::Invalid] {
            let bytes = reply.to_bytes().unwrap();
            assert_eq!(JoinReply::from_bytes(&bytes).unwrap(), reply);
        }
    }

    #[test]
    fn test_garbage_banner_rejected() {
        assert!(Banner::from_bytes(b"not json").is_err());
        assert!(Banner::from_bytes(br#"{"room":"x"}"#).is_err());
    }
}
