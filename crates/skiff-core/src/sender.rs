//! The sending peer's state machine.
//!
//! The sender responds to the receiver's key exchange, offers its transfer
//! set, then streams whatever chunks each `recipientready` asks for. The
//! receiver owns the file cursor: the index inside `recipientready` names
//! the file to stream, so re-requests after a failed integrity check need
//! no extra protocol.

use crate::error::TransferError;
use crate::progress::{Progress, ProgressEvent};
use crate::session;
use crate::state::TransferState;
use skiff_crypto::Role;
use skiff_files::chunker::{ChunkReader, chunk_offsets};
use skiff_files::{FileInfo, TransferSet};
use skiff_wire::FramedStream;
use skiff_wire::message::{Message, MessageKind};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};

/// Drive one sending session to completion.
///
/// `sources[i]` is the on-disk path behind `set.files[i]`. `pending` is a
/// first frame the wiring layer may have read while racing relays.
///
/// # Errors
///
/// Any [`TransferError`]; a best-effort `error` message goes to the peer
/// before returning.
pub async fn run_sender<S>(
    mut framed: FramedStream<S>,
    secret: &str,
    set: &TransferSet,
    sources: &[PathBuf],
    pending: Option<Vec<u8>>,
    progress: &Progress,
) -> Result<(), TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug_assert_eq!(set.files.len(), sources.len());

    let envelope = session::establish(&mut framed, secret, Role::Responder, pending).await?;
    progress.emit(ProgressEvent::KeyAgreed);

    match drive(&mut framed, &envelope, set, sources, progress).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if !session::peer_already_knows(&e) {
                session::send_error_notice(&mut framed, Some(&envelope), &e).await;
            }
            Err(e)
        }
    }
}

async fn drive<S>(
    framed: &mut FramedStream<S>,
    envelope: &skiff_crypto::Envelope,
    set: &TransferSet,
    sources: &[PathBuf],
    progress: &Progress,
) -> Result<(), TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(set).map_err(|e| TransferError::Io(std::io::Error::other(e)))?;
    session::send_sealed(framed, envelope, &Message::fileinfo(payload)).await?;
    progress.emit(ProgressEvent::Plan {
        files: set.files.len(),
        total_bytes: set.total_bytes(),
    });
    tracing::debug!(files = set.files.len(), "transfer set offered");

    let mut state = TransferState::MetadataExchanged;
    loop {
        let msg = session::recv_sealed(framed, envelope).await;
        let msg = match (state, msg) {
            // The receiver's first sealed message is where a survived key
            // mismatch would surface as an authentication failure.
            (TransferState::MetadataExchanged, Err(TransferError::AuthenticationFailed)) => {
                return Err(TransferError::WrongCode);
            }
            (_, msg) => msg?,
        };

        match msg.kind {
            MessageKind::RecipientReady => {
                let index = msg.num.ok_or(TransferError::ProtocolViolation {
                    state: state.label(),
                    got: "recipientready without index",
                })? as usize;
                if index >= set.files.len() {
                    return Err(TransferError::ProtocolViolation {
                        state: state.label(),
                        got: "recipientready past end of set",
                    });
                }
                let missing: Vec<u64> = match &msg.bytes {
                    Some(bytes) => serde_json::from_slice(bytes)
                        .map_err(|e| TransferError::Framing(e.into()))?,
                    None => Vec::new(),
                };

                state = TransferState::RecipientReady;
                tracing::debug!(state = state.label(), file = index, "resume plan received");
                stream_file(
                    framed,
                    envelope,
                    index,
                    &sources[index],
                    &set.files[index],
                    &missing,
                    progress,
                )
                .await?;
                state = TransferState::Transferring;
            }
            MessageKind::CloseRecipient => {
                let index = msg.num.unwrap_or_default() as usize;
                if let Some(info) = set.files.get(index) {
                    progress.emit(ProgressEvent::FileCompleted {
                        index,
                        name: info.name.clone(),
                    });
                }
                state = TransferState::MetadataExchanged;
            }
            MessageKind::Finished => {
                progress.emit(ProgressEvent::Finished);
                tracing::debug!("receiver reported all files complete");
                return Ok(());
            }
            MessageKind::Error => return Err(session::remote_error(msg.text)),
            other => {
                return Err(TransferError::ProtocolViolation {
                    state: state.label(),
                    got: other.label(),
                });
            }
        }
    }
}

/// Stream the requested chunks of one file, then close it out.
async fn stream_file<S>(
    framed: &mut FramedStream<S>,
    envelope: &skiff_crypto::Envelope,
    index: usize,
    source: &Path,
    info: &FileInfo,
    missing: &[u64],
    progress: &Progress,
) -> Result<(), TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    progress.emit(ProgressEvent::FileStarted {
        index,
        name: info.name.clone(),
        size: info.size,
        missing_chunks: missing.len(),
    });
    tracing::debug!(
        file = %info.name,
        resume = !missing.is_empty(),
        "streaming chunks"
    );

    let mut reader = ChunkReader::open(source)?;
    let offsets: Vec<u64> = if missing.is_empty() {
        chunk_offsets(info.size).collect()
    } else {
        missing.to_vec()
    };

    let mut sent = 0u64;
    for offset in offsets {
        let data = reader.read_at(offset)?;
        sent += data.len() as u64;
        session::send_sealed(framed, envelope, &Message::chunk(offset, data)).await?;

        // Per-chunk acknowledgement doubles as flow control.
        let ack = session::recv_sealed(framed, envelope).await?;
        match ack.kind {
            MessageKind::Ok => progress.emit(ProgressEvent::Chunk {
                index,
                bytes_done: sent,
                size: info.size,
            }),
            MessageKind::Error => return Err(session::remote_error(ack.text)),
            other => {
                return Err(TransferError::ProtocolViolation {
                    state: TransferState::Transferring.label(),
                    got: other.label(),
                });
            }
        }
    }

    session::send_sealed(framed, envelope, &Message::bare(MessageKind::CloseSender)).await?;
    Ok(())
}
