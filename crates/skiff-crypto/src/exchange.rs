//! Code-phrase key exchange.
//!
//! A three-flow SPAKE2 exchange with explicit key confirmation. The
//! initiator is the first party to put bytes on the wire:
//!
//! 1. Initiator -> Responder: initiator's public share.
//! 2. Responder -> Initiator: responder's public share plus its
//!    confirmation tag.
//! 3. Initiator -> Responder: initiator's confirmation tag.
//!
//! After flow 3 both sides hold the same 32-byte session key and have
//! proven possession of the code phrase to each other. A mismatched phrase
//! surfaces as [`CryptoError::ConfirmationFailed`] at flow 2 (initiator) or
//! flow 3 (responder).

use crate::error::CryptoError;
use crate::{CONFIRM_TAG_SIZE, SESSION_KEY_SIZE};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use spake2::{Ed25519Group, Identity, Password, Spake2};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const INITIATOR_ID: &[u8] = b"skiff-initiator";
const RESPONDER_ID: &[u8] = b"skiff-responder";

/// Which side of the exchange this peer plays.
///
/// The initiator sends the first flow; in a transfer that is the receiving
/// peer, which opens the exchange as soon as the relay pairs the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// First sender of exchange bytes
    Initiator,
    /// Responder to the first flow
    Responder,
}

enum Stage {
    /// Waiting for the peer's public share. The responder carries its own
    /// outbound share here until it can attach it to flow 2.
    AwaitShare {
        pake: Spake2<Ed25519Group>,
        own_share: Option<Vec<u8>>,
    },
    /// Responder only: key computed, waiting for the initiator's tag
    AwaitConfirm { key: Zeroizing<[u8; SESSION_KEY_SIZE]> },
    /// Mutual confirmation complete
    Verified { key: Zeroizing<[u8; SESSION_KEY_SIZE]> },
    /// A flow failed; the exchange is unusable
    Failed,
}

/// One peer's half of the code-phrase key exchange
pub struct KeyExchange {
    role: Role,
    stage: Stage,
}

impl KeyExchange {
    /// Start as the initiator. Returns the engine and the first flow to send.
    #[must_use]
    pub fn initiator(secret: &[u8]) -> (Self, Vec<u8>) {
        let (pake, share) = Spake2::<Ed25519Group>::start_a(
            &Password::new(secret),
            &Identity::new(INITIATOR_ID),
            &Identity::new(RESPONDER_ID),
        );
        (
            Self {
                role: Role::Initiator,
                stage: Stage::AwaitShare {
                    pake,
                    own_share: None,
                },
            },
            share,
        )
    }

    /// Start as the responder. Produces no bytes until the first flow arrives.
    #[must_use]
    pub fn responder(secret: &[u8]) -> Self {
        let (pake, share) = Spake2::<Ed25519Group>::start_b(
            &Password::new(secret),
            &Identity::new(INITIATOR_ID),
            &Identity::new(RESPONDER_ID),
        );
        Self {
            role: Role::Responder,
            stage: Stage::AwaitShare {
                pake,
                own_share: Some(share),
            },
        }
    }

    /// This peer's role
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Feed one inbound flow. Returns the bytes to send back, if any.
    ///
    /// # Errors
    ///
    /// [`CryptoError::BadExchangeFlow`] for unparseable flows,
    /// [`CryptoError::ConfirmationFailed`] when the peer's tag does not
    /// verify (in practice: the code phrases differ), and
    /// [`CryptoError::ExchangeComplete`] for flows after verification.
    pub fn update(&mut self, flow: &[u8]) -> Result<Option<Vec<u8>>, CryptoError> {
        match std::mem::replace(&mut self.stage, Stage::Failed) {
            Stage::AwaitShare { pake, own_share } => match self.role {
                Role::Initiator => {
                    // Flow 2: responder share || responder tag.
                    if flow.len() <= CONFIRM_TAG_SIZE {
                        return Err(CryptoError::BadExchangeFlow);
                    }
                    let (share, tag) = flow.split_at(flow.len() - CONFIRM_TAG_SIZE);
                    let key = finish(pake, share)?;
                    verify_tag(&key, Role::Responder, tag)?;
                    let reply = confirm_tag(&key, Role::Initiator);
                    self.stage = Stage::Verified { key };
                    Ok(Some(reply))
                }
                Role::Responder => {
                    // Flow 1: initiator share.
                    let key = finish(pake, flow)?;
                    let mut reply = own_share.unwrap_or_default();
                    reply.extend_from_slice(&confirm_tag(&key, Role::Responder));
                    self.stage = Stage::AwaitConfirm { key };
                    Ok(Some(reply))
                }
            },
            Stage::AwaitConfirm { key } => {
                // Flow 3: initiator tag.
                verify_tag(&key, Role::Initiator, flow)?;
                self.stage = Stage::Verified { key };
                Ok(None)
            }
            Stage::Verified { key } => {
                self.stage = Stage::Verified { key };
                Err(CryptoError::ExchangeComplete)
            }
            Stage::Failed => Err(CryptoError::BadExchangeFlow),
        }
    }

    /// True once mutual confirmation has completed
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self.stage, Stage::Verified { .. })
    }

    /// The agreed 32-byte session key
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::NotYetAgreed`] until [`Self::is_verified`].
    pub fn session_key(&self) -> Result<[u8; SESSION_KEY_SIZE], CryptoError> {
        match &self.stage {
            Stage::Verified { key } => Ok(**key),
            _ => Err(CryptoError::NotYetAgreed),
        }
    }
}

fn finish(
    pake: Spake2<Ed25519Group>,
    share: &[u8],
) -> Result<Zeroizing<[u8; SESSION_KEY_SIZE]>, CryptoError> {
    let raw = pake.finish(share).map_err(|_| CryptoError::BadExchangeFlow)?;
    if raw.len() != SESSION_KEY_SIZE {
        return Err(CryptoError::BadExchangeFlow);
    }
    let mut key = Zeroizing::new([0u8; SESSION_KEY_SIZE]);
    key.copy_from_slice(&raw);
    Ok(key)
}

fn confirm_tag(key: &[u8; SESSION_KEY_SIZE], role: Role) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(match role {
        Role::Initiator => b"skiff-confirm-initiator",
        Role::Responder => b"skiff-confirm-responder",
    });
    mac.finalize().into_bytes().to_vec()
}

fn verify_tag(
    key: &[u8; SESSION_KEY_SIZE],
    role: Role,
    tag: &[u8],
) -> Result<(), CryptoError> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(match role {
        Role::Initiator => b"skiff-confirm-initiator",
        Role::Responder => b"skiff-confirm-responder",
    });
    mac.verify_slice(tag)
        .map_err(|_| CryptoError::ConfirmationFailed)
}
