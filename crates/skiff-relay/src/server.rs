//! Relay server: accept loops, banner handling, pair-forwarding, sweeping.

use crate::http;
use crate::protocol::{Banner, JoinReply};
use crate::room::{Activity, Claim, ParkedPeer, RoomTable, Settled};
use crate::{DEFAULT_TCP_PORTS, ROOM_IDLE_MAX};
use skiff_wire::{FramedStream, WireError};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind listeners on
    pub bind_addr: IpAddr,
    /// TCP ports to accept peers on (0 picks an ephemeral port)
    pub tcp_ports: Vec<u16>,
    /// Optional HTTP liveness port
    pub http_port: Option<u16>,
    /// Idle limit before a room is torn down
    pub room_idle: Duration,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
    /// How long a fresh connection gets to present its banner
    pub banner_deadline: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            tcp_ports: DEFAULT_TCP_PORTS.to_vec(),
            http_port: None,
            room_idle: ROOM_IDLE_MAX,
            sweep_interval: Duration::from_secs(60),
            banner_deadline: Duration::from_secs(10),
        }
    }
}

/// A bound relay, ready to run
pub struct Relay {
    listeners: Vec<TcpListener>,
    http_listener: Option<TcpListener>,
    table: Arc<RoomTable>,
    config: RelayConfig,
}

impl Relay {
    /// Bind all configured ports
    ///
    /// # Errors
    ///
    /// Returns an error if any listener fails to bind.
    pub async fn bind(config: RelayConfig) -> io::Result<Self> {
        let mut listeners = Vec::with_capacity(config.tcp_ports.len());
        for port in &config.tcp_ports {
            let listener = TcpListener::bind(SocketAddr::new(config.bind_addr, *port)).await?;
            tracing::info!(addr = %listener.local_addr()?, "relay listening");
            listeners.push(listener);
        }

        let http_listener = match config.http_port {
            Some(port) => {
                let listener = TcpListener::bind(SocketAddr::new(config.bind_addr, port)).await?;
                tracing::info!(addr = %listener.local_addr()?, "liveness endpoint");
                Some(listener)
            }
            None => None,
        };

        Ok(Self {
            listeners,
            http_listener,
            table: Arc::new(RoomTable::new()),
            config,
        })
    }

    /// Addresses of the bound peer listeners
    ///
    /// # Errors
    ///
    /// Returns an error if a listener's local address cannot be read.
    pub fn local_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.listeners.iter().map(TcpListener::local_addr).collect()
    }

    /// Address of the liveness endpoint, if configured
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
    }

    /// Run accept loops, the sweeper, and the liveness endpoint forever
    ///
    /// # Errors
    ///
    /// Currently never returns `Err`; the signature leaves room for
    /// startup-time failures surfacing from spawned components.
    pub async fn run(self) -> io::Result<()> {
        let mut tasks = JoinSet::new();

        for listener in self.listeners {
            let table = self.table.clone();
            let config = self.config.clone();
            tasks.spawn(accept_loop(listener, table, config));
        }

        {
            let table = self.table.clone();
            let interval = self.config.sweep_interval;
            let idle_max = self.config.room_idle;
            tasks.spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    let removed = table.sweep(idle_max);
                    if removed > 0 {
                        tracing::debug!(removed, "swept idle rooms");
                    }
                }
            });
        }

        if let Some(listener) = self.http_listener {
            tasks.spawn(async move {
                if let Err(e) = http::serve(listener).await {
                    tracing::error!(error = %e, "liveness endpoint failed");
                }
            });
        }

        while tasks.join_next().await.is_some() {}
        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, table: Arc<RoomTable>, config: RelayConfig) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::debug!(peer = %addr, "connection accepted");
                let table = table.clone();
                let config = config.clone();
                tokio::spawn(handle_peer(stream, table, config));
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn handle_peer(stream: TcpStream, table: Arc<RoomTable>, config: RelayConfig) {
    let mut framed = FramedStream::with_deadline(stream, config.banner_deadline);

    let banner = match framed.recv().await.map(|b| Banner::from_bytes(&b)) {
        Ok(Ok(banner)) => banner,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "unparseable banner");
            let _ = reply(&mut framed, JoinReply::Invalid).await;
            return;
        }
        Err(e) => {
            tracing::debug!(error = %e, "no banner received");
            return;
        }
    };

    if banner.role > 1 {
        tracing::debug!(role = banner.role, "rejecting bad role");
        let _ = reply(&mut framed, JoinReply::Invalid).await;
        return;
    }

    match table.claim(&banner.room, banner.role) {
        Claim::Busy => {
            tracing::debug!(room = %banner.room, role = banner.role, "slot busy");
            let _ = reply(&mut framed, JoinReply::RoomBusy).await;
        }
        Claim::Reserved(reservation) => {
            if reply(&mut framed, JoinReply::Accepted).await.is_err() {
                table.release(reservation);
                return;
            }
            let (stream, leftover) = framed.into_parts();
            match table.settle(reservation, ParkedPeer { stream, leftover }) {
                Settled::Parked => {
                    tracing::debug!(room = %banner.room, role = banner.role, "peer parked");
                }
                Settled::Paired {
                    mine,
                    partner,
                    activity,
                } => {
                    tracing::debug!(room = %banner.room, "room paired, forwarding");
                    forward(mine, partner, activity, config.room_idle).await;
                    table.leave(&banner.room);
                    tracing::debug!(room = %banner.room, "room closed");
                }
            }
        }
    }
}

async fn reply<S>(framed: &mut FramedStream<S>, join_reply: JoinReply) -> Result<(), WireError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let bytes = join_reply
        .to_bytes()
        .map_err(|e| WireError::Io(io::Error::other(e)))?;
    framed.send(&bytes).await
}

/// Blind byte forwarding between the two paired peers.
///
/// Runs until either side closes, errors, or the room goes idle. Bytes
/// either peer sent ahead of pairing are delivered first.
async fn forward(a: ParkedPeer, b: ParkedPeer, activity: Arc<Activity>, idle_max: Duration) {
    let (read_a, write_a) = a.stream.into_split();
    let (read_b, write_b) = b.stream.into_split();

    tokio::join!(
        copy_half(read_a, write_b, a.leftover, activity.clone(), idle_max),
        copy_half(read_b, write_a, b.leftover, activity.clone(), idle_max),
    );
}

/// Copy one direction until EOF, error, or the idle limit
async fn copy_half(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    pending: Vec<u8>,
    activity: Arc<Activity>,
    idle_max: Duration,
) {
    if !pending.is_empty() {
        activity.touch();
        if writer.write_all(&pending).await.is_err() {
            let _ = writer.shutdown().await;
            return;
        }
    }

    let mut buf = [0u8; 4096];
    loop {
        match tokio::time::timeout(idle_max, reader.read(&mut buf)).await {
            Err(_) => {
                tracing::debug!("forward direction idle past limit");
                break;
            }
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                activity.touch();
                if writer.write_all(&buf[..n]).await.is_err() {
                    break;
                }
            }
            Ok(Err(_)) => break,
        }
    }
    let _ = writer.shutdown().await;
}
