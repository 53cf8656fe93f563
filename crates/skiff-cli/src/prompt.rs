//! Interactive confirmation prompt for incoming transfers.

use crate::progress::format_bytes;
use console::style;
use skiff_files::TransferSet;
use std::io::BufRead;

/// Show the offered files and ask the user to accept or decline
pub fn confirm_transfer(set: &TransferSet) -> bool {
    eprintln!(
        "Incoming transfer from machine {}:",
        style(&set.machine_id).bold()
    );
    for info in &set.files {
        eprintln!("    {} ({})", info.name, format_bytes(info.size));
    }
    eprint!("Accept {} file(s)? (y/N) ", set.files.len());

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes" | "YES")
}
