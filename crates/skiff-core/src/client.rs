//! Peer wiring: connecting to a relay (public, self-hosted LAN, or both)
//! and handing the paired stream to the right state machine.
//!
//! A sender with LAN discovery enabled hosts its own relay on an ephemeral
//! port and races it against the public relay; whichever room pairs first
//! carries the transfer. A receiver listens briefly for a LAN beacon and
//! otherwise dials the public relay.

use crate::error::TransferError;
use crate::options::Options;
use crate::phrase;
use crate::progress::{Progress, ProgressEvent};
use crate::receiver::run_receiver;
use crate::sender::run_sender;
use crate::{CONNECT_TIMEOUT, KEEPALIVE_INTERVAL, ROLE_RECEIVER, ROLE_SENDER};
use skiff_discovery::Beacon;
use skiff_files::{FileInfo, TransferSet};
use skiff_relay::{Banner, JoinReply, Relay, RelayConfig};
use skiff_wire::{FramedStream, WireError};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use tokio::net::TcpStream;
use tokio::task::{AbortHandle, JoinSet};

/// Dial a relay and claim a room slot.
///
/// # Errors
///
/// [`TransferError::RoomBusy`] when the slot is taken; otherwise connect,
/// framing, or timeout errors.
pub async fn join_room(
    addr: &str,
    room: &str,
    role: u8,
) -> Result<FramedStream<TcpStream>, TransferError> {
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| TransferError::Timeout)??;
    stream.set_nodelay(true).ok();

    let mut framed = FramedStream::new(stream);
    let banner = Banner {
        room: room.to_string(),
        role,
    };
    let banner_bytes = banner
        .to_bytes()
        .map_err(|e| TransferError::Io(std::io::Error::other(e)))?;
    framed.send(&banner_bytes).await?;

    let reply_bytes = framed.recv().await?;
    let reply = JoinReply::from_bytes(&reply_bytes)
        .map_err(|e| TransferError::Framing(WireError::Codec(e)))?;
    match reply {
        JoinReply::Accepted => Ok(framed),
        JoinReply::RoomBusy => Err(TransferError::RoomBusy),
        JoinReply::Invalid => Err(TransferError::ProtocolViolation {
            state: "connected",
            got: "relay rejected banner",
        }),
    }
}

/// Wait in a claimed room until the partner's first bytes arrive.
///
/// Keep-alives flow while waiting so NAT mappings and the relay's idle
/// clock stay warm. Returns the stream plus the first real frame.
async fn wait_for_peer(
    mut framed: FramedStream<TcpStream>,
) -> Result<(FramedStream<TcpStream>, Vec<u8>), TransferError> {
    framed.set_keepalive(Some(KEEPALIVE_INTERVAL));
    let first = framed.recv().await?;
    Ok((framed, first))
}

/// Abort a set of background tasks when the transfer ends, however it ends.
struct AbortGuard(Vec<AbortHandle>);

impl Drop for AbortGuard {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Send files to whoever presents the same code phrase.
///
/// # Errors
///
/// Any [`TransferError`]; the transfer is aborted on the first failure.
pub async fn send(
    opts: &Options,
    paths: &[PathBuf],
    progress: &Progress,
) -> Result<(), TransferError> {
    opts.validate()
        .map_err(|m| TransferError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, m)))?;
    if paths.is_empty() {
        return Err(TransferError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "nothing to send",
        )));
    }

    let room = phrase::room_id(&opts.shared_secret).to_string();

    let mut files = Vec::with_capacity(paths.len());
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(FileInfo::scan(path)?);
        sources.push(path.canonicalize()?);
    }
    let set = TransferSet {
        files,
        machine_id: phrase::machine_id(),
    };

    let mut attempts: JoinSet<Result<(FramedStream<TcpStream>, Vec<u8>), TransferError>> =
        JoinSet::new();
    let mut background = Vec::new();

    if !opts.disable_local {
        let local_config = RelayConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            tcp_ports: vec![0],
            http_port: None,
            ..RelayConfig::default()
        };
        match Relay::bind(local_config).await {
            Ok(relay) => {
                let port = relay.local_addrs()?[0].port();
                background.push(
                    tokio::spawn(async move {
                        let _ = relay.run().await;
                    })
                    .abort_handle(),
                );
                background.push(
                    tokio::spawn(skiff_discovery::announce(Beacon {
                        room_id: room.clone(),
                        port,
                    }))
                    .abort_handle(),
                );
                let local_room = room.clone();
                attempts.spawn(async move {
                    let framed =
                        join_room(&format!("127.0.0.1:{port}"), &local_room, ROLE_SENDER).await?;
                    wait_for_peer(framed).await
                });
            }
            Err(e) => {
                tracing::debug!(error = %e, "local relay unavailable");
                if opts.local_only {
                    return Err(TransferError::Io(e));
                }
            }
        }
    }

    if !opts.local_only {
        let addr = opts.relay_address.clone();
        let public_room = room.clone();
        attempts.spawn(async move {
            let framed = join_room(&addr, &public_room, ROLE_SENDER).await?;
            wait_for_peer(framed).await
        });
    }

    let _guard = AbortGuard(background);

    let mut last_error = TransferError::Timeout;
    let (framed, first_frame) = loop {
        match attempts.join_next().await {
            None => return Err(last_error),
            Some(Ok(Ok(winner))) => break winner,
            Some(Ok(Err(e))) => {
                tracing::debug!(error = %e, "connection attempt failed");
                last_error = e;
            }
            Some(Err(e)) => {
                tracing::debug!(error = %e, "connection attempt panicked");
            }
        }
    };
    // Dropping the set tears down the losing attempt's socket; its relay
    // room empties out with it.
    drop(attempts);
    progress.emit(ProgressEvent::Connected);
    tracing::debug!(room = %room, "paired with receiver");

    run_sender(
        framed,
        &opts.shared_secret,
        &set,
        &sources,
        Some(first_frame),
        progress,
    )
    .await
}

/// Receive files from whoever presents the same code phrase.
///
/// # Errors
///
/// Any [`TransferError`]; the transfer is aborted on the first failure.
pub async fn receive<F>(
    opts: &Options,
    confirm: F,
    progress: &Progress,
) -> Result<(), TransferError>
where
    F: FnMut(&TransferSet) -> bool,
{
    opts.validate()
        .map_err(|m| TransferError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, m)))?;

    let room = phrase::room_id(&opts.shared_secret).to_string();

    let mut addr = None;
    if !opts.disable_local {
        if let Some(found) =
            skiff_discovery::listen_for(&room, skiff_discovery::LISTEN_WINDOW).await
        {
            tracing::debug!(peer = %found, "using discovered local relay");
            addr = Some(found.to_string());
        }
    }
    let addr = match addr {
        Some(a) => a,
        None if opts.local_only => {
            tracing::debug!("no local peer discovered and public relay disabled");
            return Err(TransferError::Timeout);
        }
        None => opts.relay_address.clone(),
    };

    let framed = join_room(&addr, &room, ROLE_RECEIVER).await?;
    progress.emit(ProgressEvent::Connected);
    tracing::debug!(room = %room, relay = %addr, "paired with sender");

    run_receiver(framed, opts, confirm, progress).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_relay() -> std::net::SocketAddr {
        let relay = Relay::bind(RelayConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            tcp_ports: vec![0],
            http_port: None,
            ..RelayConfig::default()
        })
        .await
        .unwrap();
        let addr = relay.local_addrs().unwrap()[0];
        tokio::spawn(async move {
            let _ = relay.run().await;
        });
        addr
    }

    #[tokio::test]
    async fn test_join_room_accepted() {
        let addr = test_relay().await;
        let joined = join_room(&addr.to_string(), "r1", ROLE_SENDER).await;
        assert!(joined.is_ok());
    }

    #[tokio::test]
    async fn test_join_room_busy() {
        let addr = test_relay().await;
        let _first = join_room(&addr.to_string(), "r1", ROLE_SENDER).await.unwrap();
        let second = join_room(&addr.to_string(), "r1", ROLE_SENDER).await;
        assert!(matches!(second, Err(TransferError::RoomBusy)));
    }

    #[tokio::test]
    async fn test_join_room_unreachable() {
        // A port nothing listens on: connection refused surfaces as Io.
        let result = join_room("127.0.0.1:1", "r1", ROLE_SENDER).await;
        assert!(matches!(
            result,
            Err(TransferError::Io(_)) | Err(TransferError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_send_requires_paths() {
        let opts = Options {
            shared_secret: "a-b-c".into(),
            disable_local: true,
            ..Options::default()
        };
        let result = send(&opts, &[], &Progress::disabled()).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }
}
