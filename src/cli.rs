use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "taskdesk", version, about = "Terminal client for the task server")]
pub struct Cli {
    /// Task server base URL (overrides the config file)
    #[arg(long, global = true)]
    pub server: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List tasks on the server
    List {
        /// Only show tasks with this status (pending, in_progress, completed, cancelled)
        #[arg(long)]
        status: Option<String>,
    },
    /// Add a task through the same checks as the add-task form
    Add {
        /// Title of the task
        title: String,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
        /// Priority (low, medium, high, urgent)
        #[arg(long)]
        priority: Option<String>,
        /// Due date in YYYY-MM-DD format
        #[arg(long)]
        due: Option<String>,
        /// Id of an existing category
        #[arg(long)]
        category: Option<u64>,
    },
    /// Show task statistics
    Stats,
    /// Inspect or clear autosaved form drafts
    Drafts {
        #[command(subcommand)]
        action: DraftAction,
    },
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum DraftAction {
    /// Print saved drafts
    Show,
    /// Remove all saved drafts
    Clear,
}
