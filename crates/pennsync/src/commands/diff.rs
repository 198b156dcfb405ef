//! `diff` handler. Runs against the local workspace only.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use pennsync_core::{AgentCli, CoreError, DataLayout, DiffEngine, DiffRow, DiffSet};

use crate::cli::{DiffArgs, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct DiffTableRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "Local path")]
    local_path: String,
}

fn change_label(row: &DiffRow) -> String {
    row.change_kind
        .as_ref()
        .map_or_else(|| "UNKNOWN".to_owned(), ToString::to_string)
}

fn diff_row(row: &DiffRow, color: bool) -> DiffTableRow {
    DiffTableRow {
        file: row.file_name.clone(),
        path: row.relative_path.clone(),
        change: output::outcome_label(&change_label(row), color),
        local_path: row.local_path.display().to_string(),
    }
}

/// Per-dataset result. A dataset that cannot be diffed never stops the batch.
enum DiffOutcome {
    Done(DiffSet),
    Failed { dataset: String, error: String },
}

#[derive(Serialize)]
struct DiffView<'a> {
    #[serde(flatten)]
    set: &'a DiffSet,
    summary: BTreeMap<String, usize>,
}

#[derive(Serialize)]
struct FailedView<'a> {
    dataset: &'a str,
    error: &'a str,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OutcomeView<'a> {
    Done(DiffView<'a>),
    Failed(FailedView<'a>),
}

impl<'a> From<&'a DiffOutcome> for OutcomeView<'a> {
    fn from(outcome: &'a DiffOutcome) -> Self {
        match outcome {
            DiffOutcome::Done(set) => Self::Done(DiffView {
                set,
                summary: set.summary(),
            }),
            DiffOutcome::Failed { dataset, error } => Self::Failed(FailedView { dataset, error }),
        }
    }
}

fn summary_line(summary: &BTreeMap<String, usize>) -> String {
    summary
        .iter()
        .map(|(kind, count)| format!("{kind}: {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_table(outcomes: &[DiffOutcome], color: bool) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        if !out.is_empty() {
            out.push('\n');
        }
        let set = match outcome {
            DiffOutcome::Done(set) => set,
            DiffOutcome::Failed { dataset, error } => {
                let _ = writeln!(
                    out,
                    "{dataset}: {}\n  {error}",
                    output::outcome_label("FAILED", color)
                );
                continue;
            }
        };
        if set.is_empty() {
            let _ = writeln!(out, "{}: no changes", set.dataset);
            continue;
        }
        let _ = writeln!(out, "{}: {} change(s)", set.dataset, set.rows.len());
        let rows: Vec<DiffTableRow> = set.rows.iter().map(|r| diff_row(r, color)).collect();
        let _ = writeln!(out, "{}", output::render_table(&rows));
        let _ = writeln!(out, "{}", summary_line(&set.summary()));
        if set.dropped > 0 {
            let _ = writeln!(out, "({} malformed row(s) skipped)", set.dropped);
        }
    }
    out.trim_end().to_owned()
}

pub async fn handle(args: DiffArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let names = util::parse_names(&args.dataset)?;
    let local = config::local_settings(global)?;
    let runner = AgentCli::new(local.tool);
    let layout = DataLayout::new(local.base_dir);
    let engine = DiffEngine::new(&runner, &layout);

    let mut outcomes = Vec::with_capacity(names.len());
    for name in &names {
        let dir = layout.dataset_dir(name);
        let result = if dir.is_dir() {
            engine.diff(name).await
        } else {
            Err(CoreError::DatasetNotMapped { path: dir })
        };
        match result {
            Ok(set) => outcomes.push(DiffOutcome::Done(set)),
            Err(err) => {
                warn!(dataset = %name, error = %err, "diff failed");
                outcomes.push(DiffOutcome::Failed {
                    dataset: name.clone(),
                    error: CliError::from(err).to_string(),
                });
            }
        }
    }

    let out = match global.output {
        OutputFormat::Table => render_table(&outcomes, output::should_color(global.color)),
        format => {
            let views: Vec<OutcomeView<'_>> = outcomes.iter().map(OutcomeView::from).collect();
            output::render_list(
                format,
                &views,
                |v| match v {
                    OutcomeView::Done(v) => DiffSummaryRow {
                        dataset: v.set.dataset.clone(),
                        summary: summary_line(&v.summary),
                    },
                    OutcomeView::Failed(f) => DiffSummaryRow {
                        dataset: f.dataset.to_owned(),
                        summary: format!("FAILED: {}", f.error),
                    },
                },
                |v| match v {
                    OutcomeView::Done(v) => v
                        .set
                        .rows
                        .iter()
                        .map(|r| format!("{}\t{}", change_label(r), r.local_path.display()))
                        .collect::<Vec<_>>()
                        .join("\n"),
                    OutcomeView::Failed(f) => format!("FAILED\t{}", f.dataset),
                },
            )
        }
    };
    output::print_output(&out, global.quiet);

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, DiffOutcome::Failed { .. }))
        .count();
    util::batch_result("diff", failed, outcomes.len())
}

#[derive(Tabled)]
struct DiffSummaryRow {
    #[tabled(rename = "Dataset")]
    dataset: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_lists_kinds_in_order() {
        let mut summary = BTreeMap::new();
        summary.insert("MODIFIED".to_owned(), 1);
        summary.insert("ADDED".to_owned(), 2);
        assert_eq!(summary_line(&summary), "ADDED: 2, MODIFIED: 1");
    }

    #[test]
    fn empty_set_renders_no_changes() {
        let set = DiffSet {
            dataset: "EPS0000001".into(),
            ..DiffSet::default()
        };
        assert_eq!(
            render_table(&[DiffOutcome::Done(set)], false),
            "EPS0000001: no changes"
        );
    }

    #[test]
    fn failed_dataset_is_listed_with_its_error() {
        let outcomes = [
            DiffOutcome::Failed {
                dataset: "EPS0000001".into(),
                error: "Dataset is not mapped at data/output/EPS0000001".into(),
            },
            DiffOutcome::Done(DiffSet {
                dataset: "EPS0000002".into(),
                ..DiffSet::default()
            }),
        ];
        let rendered = render_table(&outcomes, false);
        assert_eq!(
            rendered,
            "EPS0000001: FAILED\n  Dataset is not mapped at data/output/EPS0000001\n\n\
             EPS0000002: no changes"
        );

        let json = serde_json::to_value(OutcomeView::from(&outcomes[0])).unwrap_or_default();
        assert_eq!(json["dataset"], "EPS0000001");
        assert!(json["error"].as_str().is_some_and(|e| e.contains("not mapped")));
    }
}
