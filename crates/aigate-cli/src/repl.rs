//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history. The
//! conversation is kept in memory, trimmed to the last ten turns.

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use aigate_core::types::{trailing_window, Turn};
use aigate_gateway::{AskRequest, Gateway};
use aigate_providers::MAX_CONTEXT_TURNS;

use crate::helpers;
use crate::AskOptions;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// Clears the conversation without leaving.
const RESET_COMMAND: &str = "/reset";

/// Run the interactive REPL loop.
pub async fn run(gateway: &Gateway, options: &AskOptions) -> Result<()> {
    helpers::print_banner();

    let mut editor = create_editor()?;
    let mut conversation = Conversation::default();

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => break,
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_exit_command(trimmed) {
            println!("\nGoodbye!");
            break;
        }

        let _ = editor.add_history_entry(&input);

        if trimmed.eq_ignore_ascii_case(RESET_COMMAND) {
            conversation.clear();
            println!("(history cleared)\n");
            continue;
        }

        let request = match options.apply(AskRequest::new(conversation.with_user(trimmed))) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("\n✗ {e}\n");
                continue;
            }
        };

        debug!(turns = request.turns.len(), "sending");
        helpers::print_thinking();
        let response = gateway.ask(request).await;
        helpers::clear_thinking();
        helpers::print_response(&response);

        if response.success {
            conversation.record(trimmed, &response.text);
        }
    }

    save_history(&mut editor);

    Ok(())
}

/// Rolling conversation history. Only answered exchanges are kept.
#[derive(Debug, Default)]
struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// History plus a new user turn, ready to send.
    fn with_user(&self, text: &str) -> Vec<Turn> {
        let mut turns = self.turns.clone();
        turns.push(Turn::user(text));
        turns
    }

    fn record(&mut self, question: &str, answer: &str) {
        self.turns.push(Turn::user(question));
        self.turns.push(Turn::assistant(answer));
        self.turns = trailing_window(&self.turns, MAX_CONTEXT_TURNS);
    }

    fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

fn history_path() -> std::path::PathBuf {
    aigate_core::utils::get_data_path()
        .join("history")
        .join("cli_history")
}

fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
