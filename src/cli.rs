use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Search(SearchArgs),
    Visit(VisitArgs),
    Download(DownloadArgs),
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search keyword.
    pub keyword: String,
}

#[derive(Debug, Args)]
pub struct VisitArgs {
    /// Page URL (must be http/https).
    pub url: String,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Table-of-contents URL of the document (must be http/https).
    pub url: String,

    /// Directory the `<title>.txt` output is created in.
    #[arg(long, default_value = ".")]
    pub out_dir: String,

    /// Lower bound of the random pause between pages.
    #[arg(long, default_value_t = 5)]
    pub min_delay_secs: u64,

    /// Upper bound of the random pause between pages.
    #[arg(long, default_value_t = 60)]
    pub max_delay_secs: u64,

    /// Navigation attempts per page before it is skipped.
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Bound on loading, extracting and locating the next link of one page.
    #[arg(long, default_value_t = 300)]
    pub unit_timeout_secs: u64,
}
