use crate::range::parse_day;
use anyhow::Result;
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "devdiary")]
#[command(about = "Developer activity journal across local git repositories")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Config file (default: ./devdiary.toml, then the user config dir)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "DEVDIARY_ROOT", help = "Directory whose child repositories are scanned")]
    pub root: Option<PathBuf>,

    #[arg(long, global = true, help = "Search the root recursively instead of one level deep")]
    pub recursive: bool,

    #[arg(long, global = true, help = "Also look inside hidden (dot) directories")]
    pub include_hidden: bool,

    #[arg(short, long, global = true, action = ArgAction::Count, help = "More logging (-v info, -vv debug)")]
    pub verbose: u8,
}

#[derive(Args, Clone, Debug)]
pub struct ScanArgs {
    #[arg(long, short, help = "today, weekly, monthly or custom:YYYY-MM-DD (default: weekly)")]
    pub mode: Option<String>,

    #[arg(long, value_parser = parse_day, help = "Last day to include (YYYY-MM-DD)")]
    pub until: Option<NaiveDate>,

    #[arg(long = "repo", help = "Scan this repository instead of the root (repeatable)")]
    pub repos: Vec<PathBuf>,

    #[arg(long, help = "Output as JSON", conflicts_with_all = ["ndjson", "markdown"])]
    pub json: bool,

    #[arg(long, help = "Output one JSON commit per line", conflicts_with = "markdown")]
    pub ndjson: bool,

    #[arg(long, help = "Output as Markdown")]
    pub markdown: bool,

    #[arg(long, short, help = "Write the report to a file instead of stdout")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Ask the local Ollama server for a standup summary")]
    pub summarize: bool,

    #[arg(long, env = "DEVDIARY_MODEL", help = "Ollama model")]
    pub model: Option<String>,

    #[arg(long, env = "DEVDIARY_OLLAMA_ENDPOINT", help = "Ollama base URL")]
    pub ollama_endpoint: Option<String>,

    #[arg(long, value_parser = humantime::parse_duration, help = "Cancel the scan after this long (e.g. 90s) and report what finished")]
    pub max_duration: Option<Duration>,

    #[arg(long, value_parser = humantime::parse_duration, help = "Timeout per git invocation (default: 30s)")]
    pub timeout: Option<Duration>,

    #[arg(long, short, help = "Maximum repositories scanned in parallel")]
    pub jobs: Option<usize>,

    #[arg(long, help = "Scan at most this many repositories")]
    pub max_repos: Option<usize>,

    #[arg(long, help = "Extra path segment to treat as noise (repeatable)")]
    pub exclude: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect commits and diff statistics over a date range
    Scan(ScanArgs),
    /// List the repositories a scan would visit
    Repos {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Scan(args) => crate::scan::exec(self.common, args),
            Commands::Repos { json } => crate::repos::exec(self.common, json),
        }
    }
}
