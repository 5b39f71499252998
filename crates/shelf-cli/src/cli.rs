use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Offline-first textbook listings from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Work offline: never contact the remote store
    #[arg(long, global = true)]
    pub offline: bool,

    /// Owner id for new listings and the `list` filter (defaults to $SHELF_OWNER, then "local")
    #[arg(long, global = true, value_name = "ID")]
    pub owner: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new listing
    #[command(alias = "new")]
    Add {
        /// Listing title
        #[arg(long)]
        title: String,
        #[command(flatten)]
        fields: ListingFields,
    },
    /// List listings, refreshing from the remote store when online
    ///
    /// With `--owner`, only that owner's listings are shown.
    List {
        /// Only listings with unpushed changes
        #[arg(long)]
        pending: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single listing
    Get {
        /// Record ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing listing
    Edit {
        /// Record ID or unique ID prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: ListingFields,
    },
    /// Delete a listing
    Delete {
        /// Record ID or unique ID prefix
        id: String,
    },
    /// Push pending local changes to the remote store
    Sync,
    /// Track connectivity and push pending changes whenever it returns
    Watch,
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

/// Optional listing fields shared by `add` and `edit`.
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct ListingFields {
    /// Author name
    #[arg(long)]
    pub author: Option<String>,
    /// Asking price
    #[arg(long)]
    pub price: Option<f64>,
    /// Subject category
    #[arg(long)]
    pub category: Option<String>,
    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,
    /// Cover image URL
    #[arg(long)]
    pub image_url: Option<String>,
    /// Extra field as key=value (repeatable)
    #[arg(long = "field", value_name = "KEY=VALUE")]
    pub extra: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
