//! REPL – the interactive chat loop.
//!
//! Supported commands:
//!   /help          – show this list
//!   /new           – start a new conversation (memories stay on disk)
//!   /mem           – show all stored memories
//!   /clear         – delete all stored memories
//!   /config [save] – show the effective configuration, or write it out
//!   /quit | /exit  – exit
//!
//! `new`, `mem`, `clear`, `quit` and `exit` also work without the slash.
//! Anything else is a chat message.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use recall_memory::Persistence;
use recall_runtime::{ChatSession, Command, TurnOutcome};
use tokio::runtime::Runtime;

use crate::config::{self, Config};

/// What a line of input asks the REPL to do.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Input<'a> {
    Help,
    ShowConfig,
    SaveConfig,
    Unknown(&'a str),
    /// Session commands and chat messages.
    Turn(&'a str),
}

pub(crate) fn classify(line: &str) -> Input<'_> {
    match line {
        "/help" => Input::Help,
        "/config" => Input::ShowConfig,
        "/config save" => Input::SaveConfig,
        other if other.starts_with('/') && Command::parse(other).is_none() => Input::Unknown(other),
        other => Input::Turn(other),
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run<P: Persistence + Send>(
    runtime: &Runtime,
    session: &ChatSession<P>,
    cfg: &Config,
    shutdown: Arc<AtomicBool>,
) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "You:".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                println!("\n{}", "Goodbye.".green());
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        match classify(line.trim()) {
            Input::Help => cmd_help(),
            Input::ShowConfig => cmd_config(cfg),
            Input::SaveConfig => cmd_save_config(cfg),
            Input::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
            Input::Turn(message) => {
                let outcome = runtime.block_on(session.handle_message(message));
                print_outcome(&outcome);
                if outcome.quit {
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
    }
}

fn print_outcome(outcome: &TurnOutcome) {
    if outcome.quit {
        println!("{}", outcome.reply.green());
        return;
    }
    println!("{} {}", "AI:".bold().green(), outcome.reply);
    if outcome.saved > 0 {
        println!(
            "{}",
            format!("[memory] saved {} new fact(s)", outcome.saved).dimmed()
        );
    }
    if let Some(e) = &outcome.store_error {
        println!("{}: {}", "Memory store error".red(), e);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn cmd_help() {
    println!();
    println!("{}", "Commands".bold().underline());
    println!("  {}           – start a new conversation (memories stay on disk)", "/new".bold().cyan());
    println!("  {}           – show all stored memories", "/mem".bold().cyan());
    println!("  {}         – delete all stored memories", "/clear".bold().cyan());
    println!("  {}  – show the configuration, or write it to disk", "/config [save]".bold().cyan());
    println!("  {}   – exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_config(cfg: &Config) {
    println!("{}", "Configuration".bold().underline());
    println!("  File           : {}", config::config_path().display().to_string().dimmed());
    println!("  Memory store   : {}", cfg.memory_path.display().to_string().yellow());
    println!("  LLM base URL   : {}", cfg.llm_base_url.yellow());
    println!("  Model          : {}", cfg.model.yellow());
    println!(
        "  API key        : {}",
        if cfg.api_key().is_some() { "set".green() } else { "not set".yellow() }
    );
    println!("  Top-k          : {}", cfg.top_k.to_string().yellow());
    println!("  Min score      : {}", cfg.min_score.to_string().yellow());
    println!("  History window : {}", cfg.history_window.to_string().yellow());
}

fn cmd_save_config(cfg: &Config) {
    match config::save(cfg) {
        Ok(()) => println!(
            "{} {}",
            "✓ Config saved to".green(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}
