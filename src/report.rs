//! Console output for verbose runs

use console::style;
use humansize::{format_size, BINARY};
use std::ffi::OsString;
use std::path::Path;

/// Quote one argument for a POSIX shell, only when needed
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r#"'\''"#))
}

/// Render a command line so it can be pasted into a shell
pub fn format_command(cmd: &[OsString]) -> String {
    cmd.iter()
        .map(|arg| shell_quote(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print the engine command before it runs
pub fn print_command(cmd: &[OsString]) {
    println!("{}", style("Engine command").cyan().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("{}", format_command(cmd));
    println!();
}

/// Print where the snapshot went
pub fn print_summary(output: &Path, columns: usize, elapsed_secs: f64) {
    let size_str = std::fs::metadata(output)
        .map(|m| format_size(m.len(), BINARY))
        .unwrap_or_else(|_| "unknown size".to_string());

    println!();
    println!("{}", style("Snapshot Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Columns:").bold(), columns);
    println!("  {} {:.1}s", style("Duration:").bold(), elapsed_secs);
    println!(
        "  {} {} ({})",
        style("Database:").bold(),
        output.display(),
        size_str
    );
    println!();
}
