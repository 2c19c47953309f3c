use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Write and sync blog articles from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local article database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the sync settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Work against the local store only
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new article
    #[command(alias = "new")]
    Add(AddArgs),
    /// List articles, newest first
    List(ListArgs),
    /// Show one article
    Show {
        /// Article ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing article
    Edit(EditArgs),
    /// Delete an article
    Delete {
        /// Article ID or unique ID prefix
        id: String,
    },
    /// Replay queued writes and reconcile with the hosted table
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show connectivity and pending sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List articles that differ between the local and hosted copies
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the local article store
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Replace the local article store with a JSON export
    Import {
        /// Export file produced by `quire export`
        path: PathBuf,
    },
    /// Show or change the sync settings file
    Config(ConfigArgs),
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

#[derive(Args, Debug, Default)]
pub struct AddArgs {
    /// Article title
    #[arg(short, long)]
    pub title: String,
    /// Category (defaults to "General")
    #[arg(short, long)]
    pub category: Option<String>,
    /// Tag, repeatable
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Author (defaults to "Admin")
    #[arg(long)]
    pub author: Option<String>,
    /// draft, published or archived
    #[arg(long)]
    pub status: Option<String>,
    /// public, private or link-only
    #[arg(long)]
    pub visibility: Option<String>,
    /// Article body; read from stdin or $EDITOR when omitted
    pub content: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Number of articles to show
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
    /// Number of articles to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub visibility: Option<String>,
    /// Case-insensitive text search over title, content and excerpt
    #[arg(short, long)]
    pub search: Option<String>,
    /// Print the number of matching articles instead of listing them
    #[arg(long)]
    pub count: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// auto, local-wins, cloud-wins or merge
    #[arg(long, value_name = "POLICY")]
    pub conflict_policy: Option<String>,
    /// Sync at startup and when connectivity returns
    #[arg(long, value_name = "BOOL")]
    pub auto_sync: Option<bool>,
    /// Never contact the hosted table
    #[arg(long, value_name = "BOOL")]
    pub offline_mode: Option<bool>,
    /// Period of the background queue drain
    #[arg(long, value_name = "SECS")]
    pub sync_interval_secs: Option<u64>,
    /// Failed replays of one queued write before it is dropped
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,
    /// Edits closer together than this may conflict
    #[arg(long, value_name = "SECS")]
    pub conflict_window_secs: Option<u64>,
    #[arg(long, value_name = "SECS")]
    pub remote_timeout_secs: Option<u64>,
    /// Capacity of the local store
    #[arg(long, value_name = "BYTES")]
    pub local_quota_bytes: Option<usize>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct EditArgs {
    /// Article ID or unique ID prefix
    pub id: String,
    /// New title
    #[arg(short, long)]
    pub title: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub visibility: Option<String>,
    /// Replace tags, repeatable
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

impl EditArgs {
    /// Whether any field flag was given; otherwise the body is edited.
    pub fn has_field_changes(&self) -> bool {
        self.title.is_some()
            || self.status.is_some()
            || self.visibility.is_some()
            || !self.tags.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
