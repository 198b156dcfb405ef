//! `map` handler.

use tabled::Tabled;

use pennsync_core::{MapOutcome, MapReport, SyncService};

use crate::cli::{GlobalOpts, MapArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct MapRow {
    #[tabled(rename = "Dataset")]
    dataset: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn map_row(report: &MapReport, color: bool) -> MapRow {
    MapRow {
        dataset: report.dataset.clone(),
        outcome: output::outcome_label(&report.outcome.to_string(), color),
        path: report.path.display().to_string(),
        error: report.error.clone().unwrap_or_default(),
    }
}

pub async fn handle(
    service: &SyncService,
    args: MapArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let datasets = match args.dataset {
        Some(raw) => match util::select_datasets(service, &raw, global.quiet).await? {
            Some(found) => found,
            None => return Ok(()),
        },
        None => service.datasets(args.filter.as_deref()).await?,
    };
    if datasets.is_empty() {
        if !global.quiet {
            eprintln!("No datasets to map");
        }
        return Ok(());
    }

    let batch = service
        .mapper()
        .remove_existing(args.remove_existing)
        .map_all(&datasets)
        .await;

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &batch.reports,
        |r| map_row(r, color),
        |r| format!("{}\t{}", r.dataset, r.outcome),
    );
    output::print_output(&out, global.quiet);

    let failed = batch
        .reports
        .iter()
        .filter(|r| r.outcome == MapOutcome::Failed)
        .count();
    util::batch_result("map", failed, batch.reports.len())
}
