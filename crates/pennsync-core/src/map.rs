// Mapping remote datasets into `<base>/output/<name>` through the agent.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::CoreError;
use crate::layout::DataLayout;
use crate::model::Dataset;
use crate::push::BatchReport;
use crate::tool::{AgentCommand, ToolRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapOutcome {
    Mapped,
    /// Already mapped and left alone.
    Skipped,
    Failed,
}

impl fmt::Display for MapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mapped => "MAPPED",
            Self::Skipped => "SKIPPED",
            Self::Failed => "FAILED",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapReport {
    pub dataset: String,
    pub path: PathBuf,
    pub outcome: MapOutcome,
    pub error: Option<String>,
}

impl BatchReport<MapReport> {
    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| r.outcome == MapOutcome::Failed)
    }
}

#[derive(Debug)]
pub struct Mapper<'a, R> {
    runner: &'a R,
    layout: &'a DataLayout,
    remove_existing: bool,
}

impl<'a, R: ToolRunner> Mapper<'a, R> {
    pub fn new(runner: &'a R, layout: &'a DataLayout) -> Self {
        Self {
            runner,
            layout,
            remove_existing: false,
        }
    }

    /// Delete an existing mapped directory and map it again.
    pub fn remove_existing(mut self, remove: bool) -> Self {
        self.remove_existing = remove;
        self
    }

    pub async fn map_all(&self, datasets: &[Dataset]) -> BatchReport<MapReport> {
        let mut batch = BatchReport::default();
        for dataset in datasets {
            batch.reports.push(self.map(dataset).await);
        }
        batch
    }

    pub async fn map(&self, dataset: &Dataset) -> MapReport {
        let path = self.layout.dataset_dir(&dataset.name);
        let (outcome, error) = match self.try_map(dataset).await {
            Ok(outcome) => (outcome, None),
            Err(err) => {
                error!(dataset = %dataset.name, error = %err, "map failed");
                (MapOutcome::Failed, Some(err.to_string()))
            }
        };
        MapReport {
            dataset: dataset.name.clone(),
            path,
            outcome,
            error,
        }
    }

    async fn try_map(&self, dataset: &Dataset) -> Result<MapOutcome, CoreError> {
        let path = self.layout.dataset_dir(&dataset.name);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            if !self.remove_existing {
                warn!(dataset = %dataset.name, path = %path.display(), "already mapped, skipping");
                return Ok(MapOutcome::Skipped);
            }
            info!(path = %path.display(), "removing existing mapping");
            tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| CoreError::io(&path, e))?;
        }

        let output_dir = self.layout.output_dir();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| CoreError::io(&output_dir, e))?;

        info!(dataset = %dataset.name, path = %path.display(), "mapping dataset");
        self.runner
            .run(&AgentCommand::Map {
                dataset_id: dataset.id.clone(),
                path,
            })
            .await?;
        Ok(MapOutcome::Mapped)
    }
}
