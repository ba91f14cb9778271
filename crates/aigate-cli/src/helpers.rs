//! Shared CLI helpers: path expansion, image arguments, response printing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use aigate_gateway::{AskResponse, ImageSource};

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Turn an `--image` argument into an [`ImageSource`].
///
/// Anything with a scheme is passed on as a URL and gated later; everything
/// else is read from disk.
pub fn image_source(arg: &str) -> Result<ImageSource> {
    if arg.contains("://") {
        return Ok(ImageSource::Url(arg.to_string()));
    }
    let path = expand_tilde(arg);
    let mime_type = mime_for_path(&path)
        .with_context(|| format!("unsupported image type: {}", path.display()))?;
    let data = std::fs::read(&path)
        .with_context(|| format!("failed to read image {}", path.display()))?;
    Ok(ImageSource::Bytes {
        data,
        mime_type: mime_type.to_string(),
    })
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Print a gateway response to stdout.
pub fn print_response(response: &AskResponse) {
    println!();
    if response.success {
        let served_by = match (&response.provider, &response.model) {
            (Some(provider), Some(model)) => format!("{provider}/{model}"),
            _ => "unknown".to_string(),
        };
        println!(
            "{} {}",
            "aigate".cyan().bold(),
            format!("via {served_by} · {} tokens", response.tokens).dimmed()
        );
        if response.text.is_empty() {
            println!("{}", "(no response)".dimmed());
        } else {
            println!("{}", response.text);
        }
    } else {
        println!("{} {}", "✗".red().bold(), response.text);
    }
    println!();
}

/// Print the banner shown at REPL start.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "aigate".cyan().bold(), version.dimmed());
    println!(
        "{}",
        "Type a message, \"/reset\" to clear history, or \"exit\" to quit.".dimmed()
    );
    println!();
}

/// Print a "thinking" placeholder (for non-log mode).
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
