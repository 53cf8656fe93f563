//! The receiving peer's state machine.
//!
//! The receiver opens the key exchange, confirms the offered transfer set
//! with its user, then walks the file list: hash-skip what is already
//! complete, announce a resume plan for what is not, write the chunks that
//! arrive, and verify the result. A file that fails verification is
//! re-requested once before the session aborts.

use crate::error::TransferError;
use crate::options::Options;
use crate::progress::{Progress, ProgressEvent};
use crate::session;
use crate::state::TransferState;
use skiff_crypto::Role;
use skiff_files::chunker::ChunkWriter;
use skiff_files::{FileInfo, TransferSet, hasher, resume};
use skiff_wire::FramedStream;
use skiff_wire::message::{Message, MessageKind};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};

/// Drive one receiving session to completion.
///
/// `confirm` renders the confirmation prompt; it is skipped when
/// `opts.no_prompt` is set.
///
/// # Errors
///
/// Any [`TransferError`]; a best-effort `error` message goes to the peer
/// before returning.
pub async fn run_receiver<S, F>(
    mut framed: FramedStream<S>,
    opts: &Options,
    mut confirm: F,
    progress: &Progress,
) -> Result<(), TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&TransferSet) -> bool,
{
    let secret = opts.shared_secret.as_str();
    let envelope = session::establish(&mut framed, secret, Role::Initiator, None).await?;
    progress.emit(ProgressEvent::KeyAgreed);

    match drive(&mut framed, &envelope, opts, &mut confirm, progress).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if !session::peer_already_knows(&e) {
                session::send_error_notice(&mut framed, Some(&envelope), &e).await;
            }
            Err(e)
        }
    }
}

async fn drive<S, F>(
    framed: &mut FramedStream<S>,
    envelope: &skiff_crypto::Envelope,
    opts: &Options,
    confirm: &mut F,
    progress: &Progress,
) -> Result<(), TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&TransferSet) -> bool,
{
    // First sealed message: a key mismatch that survived the exchange
    // surfaces here and must read as "wrong code" to the user.
    let msg = match session::recv_sealed(framed, envelope).await {
        Err(TransferError::AuthenticationFailed) => return Err(TransferError::WrongCode),
        msg => msg?,
    };
    let set: TransferSet = match msg.kind {
        MessageKind::FileInfo => {
            let bytes = msg.bytes.ok_or(TransferError::ProtocolViolation {
                state: TransferState::KeyAgreed.label(),
                got: "fileinfo without payload",
            })?;
            serde_json::from_slice(&bytes).map_err(|e| TransferError::Framing(e.into()))?
        }
        MessageKind::Error => return Err(session::remote_error(msg.text)),
        other => {
            return Err(TransferError::ProtocolViolation {
                state: TransferState::KeyAgreed.label(),
                got: other.label(),
            });
        }
    };
    progress.emit(ProgressEvent::Plan {
        files: set.files.len(),
        total_bytes: set.total_bytes(),
    });
    tracing::debug!(
        files = set.files.len(),
        machine = %set.machine_id,
        "transfer set offered"
    );

    if !opts.no_prompt && !confirm(&set) {
        session::send_sealed(framed, envelope, &Message::error(session::REFUSED_TEXT)).await?;
        return Err(TransferError::PeerRefused);
    }

    let mut index = 0usize;
    let mut retried = vec![false; set.files.len()];
    while index < set.files.len() {
        let info = &set.files[index];
        let dest = dest_path(&opts.output_dir, info)?;

        if !opts.stdout {
            if let Some(found) = hasher::hash_file_if_present(&dest)? {
                if found == info.hash {
                    progress.emit(ProgressEvent::FileSkipped {
                        index,
                        name: info.name.clone(),
                    });
                    tracing::debug!(file = %info.name, "already complete, skipping");
                    index += 1;
                    continue;
                }
            }
        }

        let missing = if opts.stdout {
            Vec::new()
        } else {
            resume::missing_chunks(&dest, info.size)?
        };
        progress.emit(ProgressEvent::FileStarted {
            index,
            name: info.name.clone(),
            size: info.size,
            missing_chunks: missing.len(),
        });

        let plan =
            serde_json::to_vec(&missing).map_err(|e| TransferError::Io(std::io::Error::other(e)))?;
        session::send_sealed(
            framed,
            envelope,
            &Message::recipient_ready(index as u64, plan),
        )
        .await?;

        let verified = receive_file(framed, envelope, opts, index, info, &dest, progress).await?;
        if verified {
            session::send_sealed(
                framed,
                envelope,
                &Message {
                    num: Some(index as u64),
                    ..Message::bare(MessageKind::CloseRecipient)
                },
            )
            .await?;
            progress.emit(ProgressEvent::FileCompleted {
                index,
                name: info.name.clone(),
            });
            index += 1;
        } else if opts.stdout {
            // Bytes already went to stdout; nothing to re-request.
            return Err(integrity_error(info));
        } else if !retried[index] {
            tracing::warn!(file = %info.name, "integrity check failed, re-requesting");
            retried[index] = true;
            session::send_sealed(
                framed,
                envelope,
                &Message {
                    num: Some(index as u64),
                    ..Message::bare(MessageKind::CloseRecipient)
                },
            )
            .await?;
            // Same index: the next loop pass recomputes the resume plan
            // against whatever landed on disk.
        } else {
            return Err(integrity_error(info));
        }
    }

    session::send_sealed(framed, envelope, &Message::bare(MessageKind::Finished)).await?;
    progress.emit(ProgressEvent::Finished);
    tracing::debug!("all files complete");
    Ok(())
}

/// Accept chunks for one file until `close-sender`; returns whether the
/// result verified against the advertised hash.
async fn receive_file<S>(
    framed: &mut FramedStream<S>,
    envelope: &skiff_crypto::Envelope,
    opts: &Options,
    index: usize,
    info: &FileInfo,
    dest: &Path,
    progress: &Progress,
) -> Result<bool, TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    enum Sink {
        File(ChunkWriter),
        Stdout {
            out: std::io::Stdout,
            hasher: blake3::Hasher,
        },
    }

    let mut sink = if opts.stdout {
        Sink::Stdout {
            out: std::io::stdout(),
            hasher: blake3::Hasher::new(),
        }
    } else {
        Sink::File(ChunkWriter::open(dest, info.size)?)
    };

    let mut received = 0u64;
    loop {
        let msg = session::recv_sealed(framed, envelope).await?;
        match msg.kind {
            MessageKind::Chunk => {
                let offset = msg.num.ok_or(TransferError::ProtocolViolation {
                    state: TransferState::Transferring.label(),
                    got: "chunk without offset",
                })?;
                let data = msg.bytes.ok_or(TransferError::ProtocolViolation {
                    state: TransferState::Transferring.label(),
                    got: "chunk without payload",
                })?;

                match &mut sink {
                    Sink::File(writer) => writer.write_at(offset, &data)?,
                    Sink::Stdout { out, hasher } => {
                        hasher.update(&data);
                        out.lock().write_all(&data)?;
                    }
                }
                received += data.len() as u64;

                session::send_sealed(framed, envelope, &Message::bare(MessageKind::Ok)).await?;
                progress.emit(ProgressEvent::Chunk {
                    index,
                    bytes_done: received,
                    size: info.size,
                });
            }
            MessageKind::CloseSender => break,
            MessageKind::Error => return Err(session::remote_error(msg.text)),
            other => {
                return Err(TransferError::ProtocolViolation {
                    state: TransferState::Transferring.label(),
                    got: other.label(),
                });
            }
        }
    }

    // Verifying: the advertised hash is the only acceptance criterion.
    match sink {
        Sink::File(mut writer) => {
            writer.sync()?;
            Ok(hasher::hash_file(dest)? == info.hash)
        }
        Sink::Stdout { mut out, hasher } => {
            out.flush()?;
            Ok(*hasher.finalize().as_bytes() == info.hash)
        }
    }
}

fn dest_path(output_dir: &Path, info: &FileInfo) -> Result<PathBuf, TransferError> {
    // Only the base name is trusted; anything path-like in the advertised
    // name must not escape the output directory.
    let name = Path::new(&info.name)
        .file_name()
        .ok_or_else(|| {
            TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unusable file name {:?}", info.name),
            ))
        })?;
    Ok(output_dir.join(name))
}

fn integrity_error(info: &FileInfo) -> TransferError {
    TransferError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("integrity check failed for {}", info.name),
    ))
}
