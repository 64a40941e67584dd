use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use crate::browser::{ChromeConfig, ChromeSession};
use crate::cli::DownloadArgs;
use crate::config::TraversalConfig;
use crate::pacing::RandomPacer;
use crate::sink;
use crate::traverse::{self, Outcome};
use crate::visit::parse_page_url;

pub async fn run(args: DownloadArgs) -> anyhow::Result<()> {
    let toc_url = parse_page_url(&args.url)?;
    if args.min_delay_secs > args.max_delay_secs {
        anyhow::bail!(
            "--min-delay-secs ({}) must not exceed --max-delay-secs ({})",
            args.min_delay_secs,
            args.max_delay_secs
        );
    }

    let config = TraversalConfig {
        max_attempts: args.max_attempts.max(1),
        unit_timeout: Duration::from_secs(args.unit_timeout_secs),
        ..TraversalConfig::default()
    };
    let pacer = RandomPacer {
        between_pages: (
            Duration::from_secs(args.min_delay_secs),
            Duration::from_secs(args.max_delay_secs),
        ),
        ..RandomPacer::default()
    };
    let out_dir = PathBuf::from(&args.out_dir);

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let session = ChromeSession::launch(&ChromeConfig::from_env())
        .await
        .context("start browser")?;
    tracing::info!(url = %toc_url, out_dir = %out_dir.display(), "download started");

    let mut output = None;
    let result = traverse::traverse(
        &session,
        &pacer,
        &config,
        &toc_url,
        |document_title| {
            let path = sink::output_path(&out_dir, document_title);
            tracing::info!(path = %path.display(), "writing output");
            output = Some(path.clone());
            sink::create_file_sink(&path)
        },
        &cancel,
    )
    .await;
    session.close().await;
    interrupt.abort();

    let (report, _file) = result.context("traverse document")?;
    let path = output.unwrap_or_default();
    log_report(&report, &path);
    if report.outcome == Outcome::Cancelled {
        tracing::warn!(path = %path.display(), "download interrupted; partial output kept");
    }
    Ok(())
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("interrupt received; stopping after the current page");
            cancel.cancel();
        }
        Err(err) => tracing::debug!(?err, "listen for interrupt"),
    }
}

fn log_report(report: &traverse::TraversalReport, path: &Path) {
    let elapsed = report.finished_at - report.started_at;
    tracing::info!(
        outcome = ?report.outcome,
        units = report.units,
        pages = report.pages,
        errors = report.errors,
        visited = report.visited,
        elapsed_secs = elapsed.num_seconds(),
        path = %path.display(),
        "download finished"
    );
    if report.errors > 0 {
        tracing::warn!(
            errors = report.errors,
            "some pages were replaced by error placeholders"
        );
    }
}
