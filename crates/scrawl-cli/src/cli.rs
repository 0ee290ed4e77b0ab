use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "scrawl")]
#[command(about = "Draft notes from the terminal, synced when the network allows")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a note; the body is read from stdin or an editor
    Write {
        /// Note title
        #[arg(short, long)]
        title: Option<String>,
        /// Continue an existing note instead of starting a new one
        #[arg(long, value_name = "ID")]
        id: Option<String>,
        /// Apply every stdin line as an edit as it arrives
        #[arg(long)]
        stream: bool,
    },
    /// List notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search notes; an empty query lists everything
    Search {
        /// Search query
        query: String,
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a note
    Delete {
        /// Note ID
        id: String,
    },
    /// Send the locally stored draft if it has unsynced changes
    Sync,
    /// Inspect or discard the locally stored draft
    Draft {
        #[command(subcommand)]
        command: DraftCommands,
    },
    /// Sign in, sign up or sign out
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Manage the client config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum DraftCommands {
    /// Print the stored draft
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the stored draft without sending it
    Discard,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Show whether a session is stored
    Status,
    /// Clear the stored session
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the config file, keeping values not given here
    Init {
        /// Base URL of the notes API
        #[arg(long)]
        api_base_url: Option<String>,
        /// Quiet period before edits are saved, in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
    /// Print the effective config
    Show,
}
