use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    chapterwalk::logging::init().context("init logging")?;

    let cli = chapterwalk::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        chapterwalk::cli::Command::Search(args) => {
            chapterwalk::search::run(args).await.context("search")?;
        }
        chapterwalk::cli::Command::Visit(args) => {
            chapterwalk::visit::run(args).await.context("visit")?;
        }
        chapterwalk::cli::Command::Download(args) => {
            chapterwalk::download::run(args).await.context("download")?;
        }
    }

    Ok(())
}
