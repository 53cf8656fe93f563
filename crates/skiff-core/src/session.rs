//! Shared session plumbing: the key exchange loop, envelope derivation,
//! and sealed message transport.

use crate::error::TransferError;
use crate::state::TransferState;
use skiff_crypto::{CryptoError, Envelope, KeyExchange, Role, SESSION_KEY_SIZE};
use skiff_wire::message::{self, Message, MessageKind};
use skiff_wire::FramedStream;
use tokio::io::{AsyncRead, AsyncWrite};

/// The error text announcing a failed code-phrase check to the peer
pub(crate) const WRONG_CODE_TEXT: &str = "wrong code phrase";

/// The error text announcing a declined transfer to the peer
pub(crate) const REFUSED_TEXT: &str = "refusing files";

/// Run the key exchange over the framed stream and derive the session
/// envelope.
///
/// `pending` is an already-received first frame (the wiring layer may have
/// read it while racing connection attempts); it is consumed before any
/// fresh reads.
pub(crate) async fn establish<S>(
    framed: &mut FramedStream<S>,
    secret: &str,
    role: Role,
    mut pending: Option<Vec<u8>>,
) -> Result<Envelope, TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut exchange = match role {
        Role::Initiator => {
            let (exchange, flow) = KeyExchange::initiator(secret.as_bytes());
            framed
                .send(&message::encode_plain(&Message::pake(flow))?)
                .await?;
            exchange
        }
        Role::Responder => KeyExchange::responder(secret.as_bytes()),
    };

    while !exchange.is_verified() {
        let frame = match pending.take() {
            Some(frame) => frame,
            None => framed.recv().await?,
        };
        let msg = message::decode_plain(&frame)?;
        match msg.kind {
            MessageKind::Pake => {
                let flow = msg.bytes.ok_or(TransferError::ProtocolViolation {
                    state: TransferState::Connected.label(),
                    got: "pake without payload",
                })?;
                match exchange.update(&flow) {
                    Ok(Some(reply)) => {
                        framed
                            .send(&message::encode_plain(&Message::pake(reply))?)
                            .await?;
                    }
                    Ok(None) => {}
                    Err(CryptoError::ConfirmationFailed) => {
                        // Tell the peer why we are leaving so it can report
                        // the same failure instead of a dead socket.
                        let notice = message::encode_plain(&Message::error(WRONG_CODE_TEXT))?;
                        let _ = framed.send(&notice).await;
                        return Err(TransferError::WrongCode);
                    }
                    Err(_) => return Err(TransferError::AuthenticationFailed),
                }
            }
            MessageKind::Error => return Err(remote_error(msg.text)),
            other => {
                return Err(TransferError::ProtocolViolation {
                    state: TransferState::Connected.label(),
                    got: other.label(),
                });
            }
        }
    }

    let key = zeroize::Zeroizing::new(
        exchange
            .session_key()
            .map_err(|_| TransferError::AuthenticationFailed)?,
    );
    derive_envelope(&key, secret)
}

/// Derive the session envelope from the agreed key. The code phrase seeds
/// the derivation salt so both sides arrive at the same 8 bytes without
/// another round trip.
pub(crate) fn derive_envelope(
    key: &[u8; SESSION_KEY_SIZE],
    secret: &str,
) -> Result<Envelope, TransferError> {
    let salt_source = blake3::hash(secret.as_bytes());
    Envelope::new(key, &salt_source.as_bytes()[..skiff_crypto::SALT_SIZE])
        .map_err(|_| TransferError::AuthenticationFailed)
}

/// Seal and send one message
pub(crate) async fn send_sealed<S>(
    framed: &mut FramedStream<S>,
    envelope: &Envelope,
    msg: &Message,
) -> Result<(), TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(&message::encode(envelope, msg)?).await?;
    Ok(())
}

/// Receive and open one sealed message
pub(crate) async fn recv_sealed<S>(
    framed: &mut FramedStream<S>,
    envelope: &Envelope,
) -> Result<Message, TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = framed.recv().await?;
    Ok(message::decode(envelope, &frame)?)
}

/// Map a peer's `error` message onto the local error set
pub(crate) fn remote_error(text: Option<String>) -> TransferError {
    match text.as_deref() {
        Some(REFUSED_TEXT) => TransferError::PeerRefused,
        Some(WRONG_CODE_TEXT) => TransferError::WrongCode,
        Some(reason) => {
            tracing::warn!(reason, "peer aborted the transfer");
            TransferError::Cancelled
        }
        None => TransferError::Cancelled,
    }
}

/// Failures the peer either announced itself or was already told about;
/// echoing them back would only confuse its state machine.
pub(crate) fn peer_already_knows(error: &TransferError) -> bool {
    matches!(
        error,
        TransferError::PeerRefused | TransferError::WrongCode | TransferError::Cancelled
    )
}

/// Best-effort final error message to the peer before giving up
pub(crate) async fn send_error_notice<S>(
    framed: &mut FramedStream<S>,
    envelope: Option<&Envelope>,
    error: &TransferError,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let text = match error {
        TransferError::WrongCode => WRONG_CODE_TEXT.to_string(),
        TransferError::PeerRefused => REFUSED_TEXT.to_string(),
        other => other.to_string(),
    };
    let msg = Message::error(text);
    let encoded = match envelope {
        Some(env) => message::encode(env, &msg),
        None => message::encode_plain(&msg),
    };
    if let Ok(bytes) = encoded {
        let _ = framed.send(&bytes).await;
    }
}
