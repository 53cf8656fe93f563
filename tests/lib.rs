//! Shared helpers for skiff integration tests.

use skiff_core::Options;
use skiff_relay::{Relay, RelayConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Bind a relay on an ephemeral loopback port and run it in the background
pub async fn spawn_relay() -> SocketAddr {
    let relay = Relay::bind(RelayConfig {
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        tcp_ports: vec![0],
        http_port: None,
        ..RelayConfig::default()
    })
    .await
    .expect("relay bind");
    let addr = relay.local_addrs().expect("relay addrs")[0];
    tokio::spawn(async move {
        let _ = relay.run().await;
    });
    addr
}

/// Peer options pinned to a test relay, LAN discovery off
pub fn peer_options(secret: &str, relay: SocketAddr, is_sender: bool, out_dir: &Path) -> Options {
    Options {
        shared_secret: secret.to_string(),
        is_sender,
        relay_address: relay.to_string(),
        disable_local: true,
        local_only: false,
        no_prompt: true,
        stdout: false,
        debug: false,
        output_dir: out_dir.to_path_buf(),
    }
}
