use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Config file (YAML). Defaults to `novelfetch.yaml` in the working directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Download root directory (overrides `download_path`).
    #[arg(long, global = true)]
    pub out: Option<String>,

    /// Delay before each series member request (overrides `request_delay_ms`).
    #[arg(long, global = true)]
    pub delay_ms: Option<u64>,

    /// Disable the progress bar.
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Interactive shell when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Fetch(FetchArgs),
    Merge(MergeArgs),
    Scan(ScanArgs),
    Shell,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Item ids to fetch; series members are fetched along with them.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Series directory to merge.
    #[arg(long)]
    pub dir: String,

    /// Output file name, written next to the series directory
    /// (default: `<dir name>_<timestamp>.txt`).
    #[arg(long)]
    pub name: Option<String>,

    /// Overwrite an existing output file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan for downloaded items.
    #[arg(long)]
    pub dir: String,
}
