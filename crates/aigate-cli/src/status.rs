//! `aigate status`: show credentials, chains, and grounding sources.
//!
//! Credentials are reported as counts only.

use anyhow::Result;
use colored::Colorize;

use aigate_core::config::{get_config_path, load_config};
use aigate_providers::registry::PROVIDERS;
use aigate_providers::{FallbackChain, FallbackChains};

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "aigate status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );
    println!(
        "  {:<18} {}",
        "Timeouts:".bold(),
        format!(
            "text {}s | fetch {}s",
            config.timeouts.text_secs, config.timeouts.fetch_secs
        )
        .dimmed()
    );
    println!(
        "  {:<18} {}",
        "Cooldown:".bold(),
        format!(
            "{}s per credential | recheck {}s when all blocked",
            config.rate_limit.default_cooldown_secs, config.rate_limit.all_blocked_recheck_secs
        )
        .dimmed()
    );

    // Providers
    println!();
    println!("  {}", "Providers:".bold());
    for spec in PROVIDERS {
        let count = config
            .providers
            .get_by_name(spec.name)
            .map(|p| p.credentials().len())
            .unwrap_or(0);
        println!("    {:<20} {}", spec.display_name, credential_status(count));
    }

    // Chains
    let chains = FallbackChains::from_config(&config.chains);
    println!();
    println!("  {}", "Chains:".bold());
    println!("    {:<20} {}", "chat / title", describe_chain(&chains.chat));
    println!("    {:<20} {}", "analysis", describe_chain(&chains.analysis));
    println!("    {:<20} {}", "vision", describe_chain(&chains.vision));

    // Grounding
    println!();
    println!("  {}", "Grounding:".bold());
    println!("    {:<20} {}", "Site base", config.grounding.site_base_url);
    let content = match config.grounding.content_file.as_deref() {
        Some(path) if crate::helpers::expand_tilde(path).exists() => {
            format!("{} {path}", "✓".green())
        }
        Some(path) => format!("{} {path}", "✗ missing".red()),
        None => format!("{}", "· not configured".dimmed()),
    };
    println!("    {:<20} {}", "Content file", content);

    let brave = if config.tools.web.search.api_key.trim().is_empty() {
        format!("{}", "· not configured".dimmed())
    } else if !config.grounding.web_enabled {
        format!("{}", "· key set, disabled".dimmed())
    } else {
        format!("{} (key set)", "✓".green())
    };
    println!("    {:<20} {}", "Brave Search", brave);

    println!();

    Ok(())
}

fn credential_status(count: usize) -> String {
    match count {
        0 => format!("{}", "· not configured".dimmed()),
        1 => format!("{} 1 key", "✓".green()),
        n => format!("{} {n} keys", "✓".green()),
    }
}

/// `groq/a → gemini/b`, or a placeholder for an empty chain.
fn describe_chain(chain: &FallbackChain) -> String {
    if chain.is_empty() {
        return "(empty)".to_string();
    }
    chain
        .iter()
        .map(|link| link.to_string())
        .collect::<Vec<_>>()
        .join(" → ")
}
