mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use taskdesk::storage::log_path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let env = commands::load_environment(args.server)?;
    init_tracing(&env.data_dir);

    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::List { status } => commands::list(&env, status),
        cli::Command::Add {
            title,
            description,
            priority,
            due,
            category,
        } => commands::add(&env, title, description, priority, due, category),
        cli::Command::Stats => commands::stats(&env),
        cli::Command::Drafts { action } => match action {
            cli::DraftAction::Show => commands::drafts_show(&env),
            cli::DraftAction::Clear => commands::drafts_clear(&env),
        },
        cli::Command::Tui => commands::tui(&env),
    }
}

// Opt-in via RUST_LOG. Output goes to a file because the TUI owns the terminal.
fn init_tracing(data_dir: &Path) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(raw) if !raw.trim().is_empty() => match EnvFilter::try_new(raw.trim()) {
            Ok(filter) => filter,
            Err(_) => return,
        },
        _ => return,
    };
    if fs::create_dir_all(data_dir).is_err() {
        return;
    }
    let file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path(data_dir))
    {
        Ok(file) => file,
        Err(_) => return,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init();
}
