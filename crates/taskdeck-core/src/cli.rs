use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::builder::ValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::view::FilterMode;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Terminal dashboard for a task tracking service",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8000
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the task table with stats
    List(ListArgs),
    /// Show only the stats line
    Stats(QueryArgs),
    /// Show one task in full
    Show { id: u64 },
    /// Create a task
    Add(AddArgs),
    /// Change fields of a task; an empty value clears it
    Edit(EditArgs),
    /// Flip a task between open and done
    Toggle { id: u64 },
    /// Mark a task done
    Done { id: u64 },
    /// Delete a task after confirmation
    Delete {
        id: u64,
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// Search task titles on the server
    Search { term: Vec<String> },
    /// Show per-tag totals
    Tags,
    /// Manage documents attached to a task
    #[command(subcommand)]
    Docs(DocsCommand),
}

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    #[arg(long = "search")]
    pub search: Option<String>,

    #[arg(long = "tag")]
    pub tag: Option<String>,

    #[arg(long = "hide-done")]
    pub hide_done: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(
        short = 'f',
        long = "filter",
        value_parser = ValueParser::new(|s: &str| s.parse::<FilterMode>())
    )]
    pub filter: Option<FilterMode>,

    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true)]
    pub title: Vec<String>,

    #[arg(short = 'p', long = "priority", default_value_t = taskdeck_shared::DEFAULT_PRIORITY)]
    pub priority: u8,

    #[arg(long = "due")]
    pub due: Option<String>,

    #[arg(long = "notes")]
    pub notes: Option<String>,

    /// Comma separated
    #[arg(long = "tags")]
    pub tags: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: u64,

    #[arg(long = "title")]
    pub title: Option<String>,

    #[arg(short = 'p', long = "priority")]
    pub priority: Option<u8>,

    #[arg(long = "due")]
    pub due: Option<String>,

    #[arg(long = "notes")]
    pub notes: Option<String>,

    #[arg(long = "tags")]
    pub tags: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DocsCommand {
    /// List documents of a task
    List { task_id: u64 },
    /// Attach a file to a task
    Upload { task_id: u64, path: PathBuf },
    /// Save a document to disk
    Download {
        task_id: u64,
        doc_id: u64,
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// Delete a document after confirmation
    Delete {
        task_id: u64,
        doc_id: u64,
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
