//! `aigate onboard`: initialize configuration.
//!
//! - Creates `~/.aigate/config.json` with defaults (never with secrets from
//!   the environment)
//! - Creates the REPL history directory
//! - Writes an empty content catalogue the operator can fill in

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use aigate_core::config::{save_config, Config};
use aigate_core::utils::get_data_path;

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "aigate setup".cyan().bold());
    println!();

    setup(&get_data_path())?;

    println!();
    println!("  Add credentials to the config, or export them, e.g.:");
    println!("    {}", "export GROQ_API_KEYS=key1,key2".dimmed());
    println!("    {}", "export GEMINI_API_KEY=key".dimmed());
    println!();
    println!(
        "{}",
        "  Setup complete! Run `aigate status`, then `aigate ask`.".green()
    );
    println!();

    Ok(())
}

fn setup(data_dir: &Path) -> Result<()> {
    let config_path = data_dir.join("config.json");

    if config_path.exists() {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    } else {
        save_config(&Config::default(), Some(&config_path))?;
        println!(
            "  {} created config at {}",
            "✓".green(),
            config_path.display()
        );
    }

    let history_dir = data_dir.join("history");
    std::fs::create_dir_all(&history_dir)?;

    create_template(&data_dir.join("content.json"), CONTENT_TEMPLATE)?;

    Ok(())
}

/// Create a template file if it doesn't exist.
fn create_template(path: &Path, content: &str) -> Result<()> {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    if path.exists() {
        println!("  {} {} already exists", "✓".green(), name);
    } else {
        std::fs::write(path, content)?;
        println!(
            "  {} created {} (set grounding.contentFile to use it)",
            "✓".green(),
            name
        );
    }
    Ok(())
}

const CONTENT_TEMPLATE: &str = r#"[
  {
    "category": "archive",
    "title": "Example entry",
    "description": "Replace with your own catalogue. Only approved items are used.",
    "path": "/archive/example",
    "approved": false
  }
]
"#;

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
