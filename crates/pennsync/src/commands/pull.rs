//! `pull` handler: downloads placeholder files with a progress bar.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use pennsync_core::{PullEvent, PullReport, RetryPolicy, SyncService};

use crate::cli::{GlobalOpts, PullArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn summary(report: &PullReport) -> String {
    format!(
        "{} downloaded ({} bytes), {} already present, {} failed",
        report.downloaded.len(),
        report.bytes,
        report.skipped,
        report.failed.len()
    )
}

pub async fn handle(
    service: &SyncService,
    args: PullArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let bar = progress_bar(global.quiet);
    let policy = RetryPolicy {
        max_attempts: args.attempts,
        ..RetryPolicy::default()
    };

    let report = service
        .puller()
        .with_policy(policy)
        .pull(&args.path, |event| match event {
            PullEvent::Started { total } => {
                bar.set_length(u64::try_from(*total).unwrap_or(u64::MAX));
            }
            PullEvent::Downloaded { path, .. } => {
                bar.set_message(path.display().to_string());
                bar.inc(1);
            }
            PullEvent::Skipped { .. } => bar.inc(1),
            PullEvent::Failed { path, error } => {
                bar.println(format!("failed: {}: {error}", path.display()));
                bar.inc(1);
            }
        })
        .await;
    bar.finish_and_clear();
    let report = report?;

    let out = output::render_single(
        global.output,
        &report,
        |r| {
            if r.failed.is_empty() {
                return summary(r);
            }
            let rows: Vec<FailureRow> = r
                .failed
                .iter()
                .map(|f| FailureRow {
                    file: f.path.display().to_string(),
                    error: f.error.clone(),
                })
                .collect();
            format!("{}\n{}", output::render_table(&rows), summary(r))
        },
        |r| {
            r.downloaded
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    output::print_output(&out, global.quiet);

    let total = report.downloaded.len() + report.skipped + report.failed.len();
    util::batch_result("pull", report.failed.len(), total)
}
