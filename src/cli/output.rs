//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::infofile::{InfoFile, KeyEntry};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of the repository's unlock keys (Index, Type, Key).
///
/// Passphrase entries show only their position; nothing secret is printed.
pub fn print_keys_table(info: &InfoFile) {
    if info.keys.is_empty() && !info.has_legacy_passphrase() {
        self::info("This repository has no unlock keys.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Index", "Type", "Key"]);

    for (index, entry) in info.keys.iter().enumerate() {
        let key = match entry {
            KeyEntry::Passphrase { .. } => "(passphrase)".to_string(),
            KeyEntry::Asymmetric { recipient_id, .. } => recipient_id.clone(),
        };
        table.add_row(vec![index.to_string(), entry.kind_label().to_string(), key]);
    }

    if info.has_legacy_passphrase() {
        table.add_row(vec![
            "-".to_string(),
            "legacy".to_string(),
            "(passphrase, run `repokey upgrade`)".to_string(),
        ]);
    }

    println!("{table}");
}
