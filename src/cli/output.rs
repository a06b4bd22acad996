//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::apikey::ApiKeyEntry;
use crate::audit::{AuditEntry, AuditStats};
use crate::vault::SecretEntry;

/// Print a green success message.
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning.
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message.
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint.
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of secrets (names and timestamps, never values).
pub fn print_secrets_table(secrets: &[SecretEntry]) {
    if secrets.is_empty() {
        info("No secrets in the vault yet.");
        tip("Run `arca add <key>` to add your first secret.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Key", "Description", "Created", "Modified"]);

    for s in secrets {
        table.add_row(vec![
            s.key.clone(),
            s.description.clone().unwrap_or_default(),
            s.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            s.modified_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        ]);
    }

    println!("{table}");
}

/// Print a table of API keys (hashes are never shown in full).
pub fn print_api_keys_table(keys: &[ApiKeyEntry]) {
    if keys.is_empty() {
        info("No API keys yet.");
        tip("Run `arca key generate <name> --full` to create one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Name", "Level", "Active", "Last used"]);

    for k in keys {
        table.add_row(vec![
            k.id.to_string(),
            k.name.clone(),
            k.permissions.level.name().to_string(),
            if k.is_active { "yes" } else { "no" }.to_string(),
            k.last_used_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string()),
        ]);
    }

    println!("{table}");
}

/// Print a table of audit entries, oldest first.
pub fn print_audit_table(entries: &[AuditEntry]) {
    if entries.is_empty() {
        info("No audit entries in the current window.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Key", "Action", "Secret", "Ok", "Error"]);

    for e in entries {
        table.add_row(vec![
            e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            e.api_key_name.clone(),
            e.action.name().to_string(),
            e.secret_key.clone().unwrap_or_default(),
            if e.success { "yes" } else { "no" }.to_string(),
            e.error_message.clone().unwrap_or_default(),
        ]);
    }

    println!("{table}");
}

/// Print audit statistics.
pub fn print_audit_stats(stats: &AuditStats) {
    info(&format!(
        "{} requests in window: {} ok, {} failed, {} api keys, {} secrets touched",
        stats.total, stats.successes, stats.failures, stats.unique_api_keys, stats.unique_secret_keys
    ));

    if !stats.top_secrets.is_empty() {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Secret", "Requests"]);
        for (key, count) in &stats.top_secrets {
            table.add_row(vec![key.clone(), count.to_string()]);
        }
        println!("{table}");
    }
}
