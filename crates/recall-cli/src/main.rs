//! `recall-cli` – terminal chat with long-term memory.
//!
//! This binary:
//!
//! 1. Loads `.env` (then `.env.example`) without overriding exported
//!    variables, and initialises tracing.
//! 2. Resolves `~/.recall/config.toml` plus environment overrides.
//! 3. Reports the LLM mode and probes the endpoint's model list.
//! 4. Opens the memory store and drops the user into the chat REPL.
//! 5. Intercepts **Ctrl-C** to stop after the current line.

mod config;
mod probe;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use recall_memory::MemoryEngine;
use recall_runtime::{
    AssistantResponder, ChatSession, FactExtractor, LlmDriver, SessionConfig, init_tracing,
};

fn main() {
    load_env_files();
    let _tracing = init_tracing("recall");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – press Enter to exit.".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let (cfg, config_error) = config::resolve();
    if let Some(e) = config_error {
        println!("{}: {}", "Config error".red(), e);
        println!("  Using default configuration.");
    }
    info!(config = ?cfg, "configuration resolved");

    // ── LLM mode ──────────────────────────────────────────────────────────
    let driver = Arc::new(LlmDriver::new(&cfg.llm_base_url, &cfg.model, cfg.api_key()));
    if driver.is_enabled() {
        println!(
            "  LLM mode: {} ({} via {})",
            "enabled".green(),
            driver.model().bold(),
            driver.base_url().dimmed()
        );
        probe_endpoint(&cfg);
    } else {
        println!(
            "  LLM mode: {} (set {}); using fallback behavior",
            "no API key found".yellow(),
            "GROK_API_KEY".bold()
        );
    }

    // ── Memory store ──────────────────────────────────────────────────────
    let engine = match MemoryEngine::open_path(&cfg.memory_path) {
        Ok(engine) => engine,
        Err(e) => {
            println!("{}: {}", "Failed to open memory store".red(), e);
            std::process::exit(1);
        }
    };
    println!(
        "  Memory store: {} ({} fact(s))",
        engine.store().path().display().to_string().bold(),
        engine.len()
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            println!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    let session = ChatSession::new(
        engine,
        Arc::new(FactExtractor::new(driver.clone())),
        Arc::new(AssistantResponder::new(driver, cfg.history_window)),
        SessionConfig {
            top_k: cfg.top_k,
            min_score: cfg.min_score,
        },
    );

    repl::cmd_help();
    repl::run(&runtime, &session, &cfg, shutdown);
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup helpers
// ─────────────────────────────────────────────────────────────────────────────

fn load_env_files() {
    for filename in [".env", ".env.example"] {
        if let Err(e) = dotenvy::from_filename(filename)
            && !e.not_found()
        {
            eprintln!("[recall] ignoring {filename}: {e}");
        }
    }
}

fn probe_endpoint(cfg: &config::Config) {
    use std::io::Write;
    print!("  Probing {} … ", cfg.llm_base_url.dimmed());
    std::io::stdout().flush().ok();

    let key = cfg.api_key();
    match probe::fetch_models(&cfg.llm_base_url, key.as_deref()) {
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            if !models.is_empty() && !probe::lists_model(&models, &cfg.model) {
                println!(
                    "  {} model {} is not in the list; requests may fail.",
                    "Warning:".yellow(),
                    cfg.model.bold()
                );
            }
        }
        Err(e) => {
            println!("{}", "unreachable".yellow());
            println!("  {}", e.dimmed());
            println!("  Replies will use the fallback behavior until the endpoint responds.");
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════╗".bold().cyan());
    println!("{}", "  ║            recall            ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════╝".bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Recall".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  AI memory chatbot");
    println!();
}
