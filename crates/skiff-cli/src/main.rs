//! Skiff CLI
//!
//! Code-phrase file transfer through an untrusted relay.

mod progress;
mod prompt;

use clap::{Parser, Subcommand};
use skiff_core::options::DEFAULT_RELAY_ADDR;
use skiff_core::{Options, Progress, TransferError, phrase};
use skiff_relay::{DEFAULT_HTTP_PORT, DEFAULT_TCP_PORTS, Relay, RelayConfig};
use std::path::PathBuf;

/// Skiff - send files with a code phrase
#[derive(Parser)]
#[command(name = "skiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one or more files
    Send {
        /// Files to send
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Code phrase; generated when omitted
        #[arg(long)]
        code: Option<String>,

        /// Public relay address
        #[arg(long, default_value = DEFAULT_RELAY_ADDR)]
        relay: String,

        /// Skip LAN discovery
        #[arg(long)]
        no_local: bool,

        /// Use only LAN discovery, never the public relay
        #[arg(long, conflicts_with = "no_local")]
        local_only: bool,
    },

    /// Receive files
    Receive {
        /// Code phrase agreed with the sender
        code: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Accept the transfer without prompting
        #[arg(long)]
        yes: bool,

        /// Write received bytes to standard output instead of files
        #[arg(long)]
        stdout: bool,

        /// Public relay address
        #[arg(long, default_value = DEFAULT_RELAY_ADDR)]
        relay: String,

        /// Skip LAN discovery
        #[arg(long)]
        no_local: bool,

        /// Use only LAN discovery, never the public relay
        #[arg(long, conflicts_with = "no_local")]
        local_only: bool,
    },

    /// Run a rendezvous relay
    Relay {
        /// TCP ports to accept peers on
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_TCP_PORTS)]
        ports: Vec<u16>,

        /// HTTP liveness port
        #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
        liveness_port: u16,

        /// Disable the HTTP liveness endpoint
        #[arg(long)]
        no_liveness: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.debug { "debug" } else { "info" })
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        // One line per terminal failure; the kind makes it grep-able.
        if let Some(t) = e.downcast_ref::<TransferError>() {
            eprintln!("skiff: {} ({})", t, t.kind());
        } else {
            eprintln!("skiff: {e}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Send {
            paths,
            code,
            relay,
            no_local,
            local_only,
        } => {
            let code = code.unwrap_or_else(phrase::generate_phrase);
            eprintln!("Code phrase: {}", console::style(&code).bold());
            eprintln!("On the other machine run:\n    skiff receive {code}");

            let opts = Options {
                shared_secret: code,
                is_sender: true,
                relay_address: relay,
                disable_local: no_local,
                local_only,
                debug: cli.debug,
                ..Options::default()
            };

            let (progress, events) = Progress::channel();
            let renderer = progress::spawn_renderer(events);
            let result = cancellable(skiff_core::send(&opts, &paths, &progress)).await;
            drop(progress);
            let _ = renderer.await;
            result?;
        }
        Commands::Receive {
            code,
            out,
            yes,
            stdout,
            relay,
            no_local,
            local_only,
        } => {
            if !stdout && !out.exists() {
                std::fs::create_dir_all(&out)?;
            }

            let opts = Options {
                shared_secret: code,
                is_sender: false,
                relay_address: relay,
                disable_local: no_local,
                local_only,
                no_prompt: yes,
                stdout,
                debug: cli.debug,
                output_dir: out,
            };

            let (progress, events) = Progress::channel();
            let renderer = progress::spawn_renderer(events);
            let result =
                cancellable(skiff_core::receive(&opts, prompt::confirm_transfer, &progress)).await;
            drop(progress);
            let _ = renderer.await;
            result?;
        }
        Commands::Relay {
            ports,
            liveness_port,
            no_liveness,
        } => {
            let config = RelayConfig {
                tcp_ports: ports,
                http_port: (!no_liveness).then_some(liveness_port),
                ..RelayConfig::default()
            };
            let relay = Relay::bind(config).await?;
            tokio::select! {
                result = relay.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("relay shutting down");
                }
            }
        }
    }
    Ok(())
}

/// Run a transfer, turning Ctrl-C into a clean `Cancelled` failure.
/// Dropping the transfer future closes its sockets, which the peer sees
/// as EOF.
async fn cancellable(
    transfer: impl Future<Output = Result<(), TransferError>>,
) -> Result<(), TransferError> {
    tokio::select! {
        result = transfer => result,
        _ = tokio::signal::ctrl_c() => Err(TransferError::Cancelled),
    }
}
