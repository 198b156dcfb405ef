// ── Upload orchestrator ──
//
// Per dataset: check the mapped directory, select it in the agent, diff,
// build a manifest from the ADDED rows and start the upload. Datasets are
// pushed one at a time and a failure only stops its own dataset.

use std::fmt;

use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::diff::DiffEngine;
use crate::error::CoreError;
use crate::layout::DataLayout;
use crate::manifest::{ManifestBuilder, ManifestHandle};
use crate::model::{Dataset, DiffRow};
use crate::tool::{AgentCommand, ToolRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushOutcome {
    Success,
    NoChanges,
    Failed,
}

impl fmt::Display for PushOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "SUCCESS",
            Self::NoChanges => "NO_CHANGES",
            Self::Failed => "FAILED",
        })
    }
}

/// Result of pushing one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    pub dataset: String,
    pub outcome: PushOutcome,
    pub dry_run: bool,
    /// Rows selected for upload.
    pub added: Vec<DiffRow>,
    pub manifest: Option<ManifestHandle>,
    pub error: Option<String>,
}

impl PushReport {
    fn new(dataset: &Dataset, outcome: PushOutcome) -> Self {
        Self {
            dataset: dataset.name.clone(),
            outcome,
            dry_run: false,
            added: Vec::new(),
            manifest: None,
            error: None,
        }
    }

    fn failed(dataset: &Dataset, err: &CoreError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::new(dataset, PushOutcome::Failed)
        }
    }
}

/// Outcomes of a batch, in processing order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport<T> {
    pub reports: Vec<T>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            reports: Vec::new(),
        }
    }
}

/// Counts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushTally {
    pub success: usize,
    pub no_changes: usize,
    pub failed: usize,
}

impl BatchReport<PushReport> {
    pub fn tally(&self) -> PushTally {
        let mut tally = PushTally::default();
        for report in &self.reports {
            match report.outcome {
                PushOutcome::Success => tally.success += 1,
                PushOutcome::NoChanges => tally.no_changes += 1,
                PushOutcome::Failed => tally.failed += 1,
            }
        }
        tally
    }

    pub fn has_failures(&self) -> bool {
        self.tally().failed > 0
    }
}

/// Pushes local additions of mapped datasets.
#[derive(Debug)]
pub struct Pusher<'a, R> {
    runner: &'a R,
    layout: &'a DataLayout,
    dry_run: bool,
}

impl<'a, R: ToolRunner> Pusher<'a, R> {
    pub fn new(runner: &'a R, layout: &'a DataLayout) -> Self {
        Self {
            runner,
            layout,
            dry_run: false,
        }
    }

    /// Stop after the diff and only report what would be uploaded.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Push each dataset in turn. Never stops early.
    pub async fn push_all(&self, datasets: &[Dataset]) -> BatchReport<PushReport> {
        let mut batch = BatchReport::default();
        for dataset in datasets {
            batch.reports.push(self.push(dataset).await);
        }
        let tally = batch.tally();
        info!(
            success = tally.success,
            no_changes = tally.no_changes,
            failed = tally.failed,
            "push finished"
        );
        batch
    }

    /// Push one dataset. Errors become a FAILED report.
    pub async fn push(&self, dataset: &Dataset) -> PushReport {
        let span = info_span!("push", dataset = %dataset.name);
        match self.try_push(dataset).instrument(span).await {
            Ok(report) => report,
            Err(err) => {
                error!(dataset = %dataset.name, error = %err, "push failed");
                PushReport::failed(dataset, &err)
            }
        }
    }

    async fn try_push(&self, dataset: &Dataset) -> Result<PushReport, CoreError> {
        let dir = self.layout.dataset_dir(&dataset.name);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(CoreError::DatasetNotMapped { path: dir });
        }

        self.runner
            .run(&AgentCommand::DatasetUse {
                dataset_id: dataset.id.clone(),
            })
            .await?;

        let diff = DiffEngine::new(self.runner, self.layout)
            .diff(&dataset.name)
            .await?;
        if diff.is_empty() {
            info!("no changes, nothing to upload");
            return Ok(PushReport::new(dataset, PushOutcome::NoChanges));
        }

        let added = diff.added()?;
        if added.is_empty() {
            info!(rows = diff.rows.len(), "no ADDED files, nothing to upload");
            return Ok(PushReport::new(dataset, PushOutcome::NoChanges));
        }
        info!(files = added.len(), "found ADDED files to upload");

        let mut report = PushReport::new(dataset, PushOutcome::Success);
        report.added = added.iter().map(|r| (*r).clone()).collect();

        if self.dry_run {
            for row in &added {
                info!(path = %row.relative_path, file = %row.file_name, "would upload");
            }
            report.dry_run = true;
            return Ok(report);
        }

        let handle = ManifestBuilder::new(self.runner).build(&added).await?;
        if handle.failed() > 0 {
            warn!(
                attached = handle.attached,
                failed = handle.failed(),
                "some files were not attached"
            );
        }

        self.runner
            .run(&AgentCommand::UploadManifest {
                manifest_id: handle.manifest_id,
            })
            .await?;
        info!(manifest_id = handle.manifest_id, "upload started");

        report.manifest = Some(handle);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tool::fake::{ScriptedRunner, failed};
    use crate::tool::{ToolError, ToolOutput};

    const DIFF: &str = "\
+-----------+-----------+----------+
| PATH      | FILE NAME | UPDATE   |
+-----------+-----------+----------+
| sub1/anat | t1.nii.gz | ADDED    |
| sub1/anat | t2.nii.gz | MODIFIED |
| sub1/func | bold.nii  | DELETED  |
|           | README    | ADDED    |
+-----------+-----------+----------+
";

    fn dataset() -> Dataset {
        Dataset {
            id: "N:dataset:1".into(),
            name: "DS1".into(),
        }
    }

    fn mapped(base: &Path, files: &[&str]) -> DataLayout {
        let layout = DataLayout::new(base);
        let dir = layout.dataset_dir("DS1");
        std::fs::create_dir_all(&dir).expect("mkdir");
        for file in files {
            let path = dir.join(file);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(path, b"data").expect("write");
        }
        layout
    }

    fn agent(diff: &'static str) -> ScriptedRunner {
        ScriptedRunner::new(move |cmd| match cmd {
            AgentCommand::MapDiff { .. } => Ok(ToolOutput::stdout(diff)),
            AgentCommand::ManifestCreate { .. } => {
                Ok(ToolOutput::stdout("Manifest ID: 42 Message: ok"))
            }
            _ => Ok(ToolOutput::default()),
        })
    }

    #[tokio::test]
    async fn only_added_rows_reach_manifest_in_diff_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = mapped(dir.path(), &["sub1/anat/t1.nii.gz", "sub1/anat/t2.nii.gz", "README"]);
        let runner = agent(DIFF);

        let report = Pusher::new(&runner, &layout).push(&dataset()).await;

        assert_eq!(report.outcome, PushOutcome::Success, "{:?}", report.error);
        let dataset_dir = layout.dataset_dir("DS1");
        assert_eq!(
            runner.calls(),
            [
                AgentCommand::DatasetUse {
                    dataset_id: "N:dataset:1".into()
                },
                AgentCommand::MapDiff {
                    path: dataset_dir.clone()
                },
                AgentCommand::ManifestCreate {
                    path: dataset_dir.join("sub1/anat/t1.nii.gz"),
                    target: Some("sub1/anat".into()),
                },
                AgentCommand::ManifestAdd {
                    manifest_id: 42,
                    path: dataset_dir.join("README"),
                    target: None,
                },
                AgentCommand::UploadManifest { manifest_id: 42 },
            ]
        );
        let manifest = report.manifest.expect("manifest");
        assert_eq!(manifest.attached, 2);
    }

    #[tokio::test]
    async fn second_push_without_changes_is_no_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = mapped(dir.path(), &["sub1/anat/t1.nii.gz", "README"]);

        // The agent reports ADDED rows until an upload has happened.
        let uploaded = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&uploaded);
        let runner = ScriptedRunner::new(move |cmd| match cmd {
            AgentCommand::MapDiff { .. } if flag.load(Ordering::SeqCst) => Ok(ToolOutput::stdout(
                "| PATH | FILE NAME | UPDATE |\n| sub1/anat | t1.nii.gz | UNCHANGED |\n",
            )),
            AgentCommand::MapDiff { .. } => Ok(ToolOutput::stdout(DIFF)),
            AgentCommand::ManifestCreate { .. } => Ok(ToolOutput::stdout("Manifest ID: 3")),
            AgentCommand::UploadManifest { .. } => {
                flag.store(true, Ordering::SeqCst);
                Ok(ToolOutput::default())
            }
            _ => Ok(ToolOutput::default()),
        });
        let pusher = Pusher::new(&runner, &layout);

        assert_eq!(pusher.push(&dataset()).await.outcome, PushOutcome::Success);
        let calls_after_first = runner.calls().len();

        let second = pusher.push(&dataset()).await;
        assert_eq!(second.outcome, PushOutcome::NoChanges);
        let second_calls = &runner.calls()[calls_after_first..];
        assert!(
            !second_calls
                .iter()
                .any(|c| matches!(c, AgentCommand::ManifestCreate { .. })),
            "no manifest on second push"
        );
    }

    #[tokio::test]
    async fn empty_diff_is_no_changes_without_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = mapped(dir.path(), &[]);
        let runner = agent("+---+\n| PATH | FILE NAME | UPDATE |\n+---+\n");

        let report = Pusher::new(&runner, &layout).push(&dataset()).await;

        assert_eq!(report.outcome, PushOutcome::NoChanges);
        assert!(report.manifest.is_none());
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn dry_run_creates_no_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = mapped(dir.path(), &["sub1/anat/t1.nii.gz", "README"]);
        let runner = agent(DIFF);

        let report = Pusher::new(&runner, &layout)
            .dry_run(true)
            .push(&dataset())
            .await;

        assert_eq!(report.outcome, PushOutcome::Success);
        assert!(report.dry_run);
        let names: Vec<&str> = report.added.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, ["t1.nii.gz", "README"]);
        assert!(report.manifest.is_none());
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn unmapped_dataset_fails_before_touching_agent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = DataLayout::new(dir.path());
        let runner = agent(DIFF);

        let report = Pusher::new(&runner, &layout).push(&dataset()).await;

        assert_eq!(report.outcome, PushOutcome::Failed);
        assert!(report.error.expect("error").contains("map the dataset first"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn dataset_use_failure_is_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = mapped(dir.path(), &[]);
        let runner = ScriptedRunner::new(|_| Err(failed("agent is not running")));

        let report = Pusher::new(&runner, &layout).push(&dataset()).await;

        assert_eq!(report.outcome, PushOutcome::Failed);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_change_column_is_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = mapped(dir.path(), &[]);
        let runner = agent("| PATH | FILE NAME | SIZE |\n| a | b.txt | 3 |\n");

        let report = Pusher::new(&runner, &layout).push(&dataset()).await;

        assert_eq!(report.outcome, PushOutcome::Failed);
        assert!(report.error.expect("error").contains("no change column"));
    }

    #[tokio::test]
    async fn nothing_attached_does_not_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Mapped, but none of the ADDED files exist locally.
        let layout = mapped(dir.path(), &[]);
        let runner = agent(DIFF);

        let report = Pusher::new(&runner, &layout).push(&dataset()).await;

        assert_eq!(report.outcome, PushOutcome::Failed);
        assert!(
            !runner
                .calls()
                .iter()
                .any(|c| matches!(c, AgentCommand::UploadManifest { .. }))
        );
    }

    #[tokio::test]
    async fn batch_continues_after_failure_and_tallies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = mapped(dir.path(), &["sub1/anat/t1.nii.gz", "README"]);
        let runner = ScriptedRunner::new(|cmd| match cmd {
            AgentCommand::DatasetUse { dataset_id } if dataset_id == "N:dataset:2" => {
                Err::<ToolOutput, ToolError>(failed("unknown dataset"))
            }
            AgentCommand::MapDiff { .. } => Ok(ToolOutput::stdout(DIFF)),
            AgentCommand::ManifestCreate { .. } => Ok(ToolOutput::stdout("ID: 1")),
            _ => Ok(ToolOutput::default()),
        });
        std::fs::create_dir_all(layout.dataset_dir("DS2")).expect("mkdir");
        std::fs::create_dir_all(layout.dataset_dir("DS3")).expect("mkdir");

        let datasets = [
            Dataset {
                id: "N:dataset:2".into(),
                name: "DS2".into(),
            },
            dataset(),
            Dataset {
                id: "N:dataset:3".into(),
                name: "DS3".into(),
            },
        ];
        let batch = Pusher::new(&runner, &layout).push_all(&datasets).await;

        let outcomes: Vec<PushOutcome> = batch.reports.iter().map(|r| r.outcome).collect();
        // DS3 has ADDED rows but no local files.
        assert_eq!(
            outcomes,
            [PushOutcome::Failed, PushOutcome::Success, PushOutcome::Failed]
        );
        assert_eq!(
            batch.tally(),
            PushTally {
                success: 1,
                no_changes: 0,
                failed: 2
            }
        );
        assert!(batch.has_failures());
    }
}
