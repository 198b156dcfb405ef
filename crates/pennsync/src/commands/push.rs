//! `push` handler.

use tabled::Tabled;

use pennsync_core::{PushReport, SyncService};

use crate::cli::{GlobalOpts, PushArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PushRow {
    #[tabled(rename = "Dataset")]
    dataset: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Added")]
    added: usize,
    #[tabled(rename = "Manifest")]
    manifest: String,
    #[tabled(rename = "Details")]
    details: String,
}

fn push_row(report: &PushReport, color: bool) -> PushRow {
    let manifest = report
        .manifest
        .as_ref()
        .map(|m| m.manifest_id.to_string())
        .unwrap_or_default();

    let details = if let Some(ref error) = report.error {
        error.clone()
    } else if report.dry_run {
        "dry run, nothing uploaded".into()
    } else if let Some(failed) = report.manifest.as_ref().map(|m| m.failed()).filter(|n| *n > 0) {
        format!("{failed} file(s) not attached")
    } else {
        String::new()
    };

    PushRow {
        dataset: report.dataset.clone(),
        outcome: output::outcome_label(&report.outcome.to_string(), color),
        added: report.added.len(),
        manifest,
        details,
    }
}

pub async fn handle(
    service: &SyncService,
    args: PushArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let Some(datasets) = util::select_datasets(service, &args.dataset, global.quiet).await? else {
        return Ok(());
    };

    let batch = service
        .pusher()
        .dry_run(args.dry_run)
        .push_all(&datasets)
        .await;

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &batch.reports,
        |r| push_row(r, color),
        |r| format!("{}\t{}", r.dataset, r.outcome),
    );
    output::print_output(&out, global.quiet);

    let tally = batch.tally();
    if !global.quiet {
        eprintln!(
            "{} succeeded, {} without changes, {} failed",
            tally.success, tally.no_changes, tally.failed
        );
    }
    util::batch_result("push", tally.failed, batch.reports.len())
}
