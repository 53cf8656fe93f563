//! Terminal progress rendering.

use indicatif::{ProgressBar, ProgressStyle};
use skiff_core::ProgressEvent;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Consume progress events until the sending side hangs up
pub fn spawn_renderer(mut events: UnboundedReceiver<ProgressEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;
        while let Some(event) = events.recv().await {
            match event {
                ProgressEvent::Connected => {
                    eprintln!("Peer connected");
                }
                ProgressEvent::KeyAgreed => {
                    eprintln!("Session key agreed");
                }
                ProgressEvent::Plan { files, total_bytes } => {
                    eprintln!("{files} file(s), {}", format_bytes(total_bytes));
                }
                ProgressEvent::FileStarted {
                    name,
                    size,
                    missing_chunks,
                    ..
                } => {
                    let label = if missing_chunks > 0 {
                        format!("{name} (resuming {missing_chunks} chunks)")
                    } else {
                        name
                    };
                    bar = Some(transfer_bar(size, &label));
                }
                ProgressEvent::Chunk { bytes_done, .. } => {
                    if let Some(bar) = &bar {
                        bar.set_position(bytes_done);
                    }
                }
                ProgressEvent::FileSkipped { name, .. } => {
                    eprintln!("{name}: already complete, skipped");
                }
                ProgressEvent::FileCompleted { name, .. } => {
                    if let Some(bar) = bar.take() {
                        bar.finish_and_clear();
                    }
                    eprintln!("{name}: done");
                }
                ProgressEvent::Finished => {
                    if let Some(bar) = bar.take() {
                        bar.finish_and_clear();
                    }
                    eprintln!("Transfer complete");
                }
            }
        }
        if let Some(bar) = bar.take() {
            bar.abandon();
        }
    })
}

fn transfer_bar(total_bytes: u64, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(total_bytes);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    bar.set_message(label.to_string());
    bar
}

/// Format bytes in human-readable form
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{size:.2} {}", UNITS[unit_idx])
}
