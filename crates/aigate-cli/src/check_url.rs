//! `aigate check-url`: run a URL through the SSRF gate without fetching it.

use anyhow::Result;
use colored::Colorize;

use aigate_gateway::guard;

/// Run the check. Exits non-zero when the URL is rejected.
pub fn run(url: &str) -> Result<()> {
    match guard::validate(url) {
        Ok(parsed) => {
            println!("{} {}", "✓ allowed".green().bold(), parsed);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗ blocked".red().bold(), e);
            anyhow::bail!("URL rejected by the SSRF gate")
        }
    }
}
