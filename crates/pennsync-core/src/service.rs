// ── Sync service ──
//
// Entry point for consumers: owns the platform client, the agent runner
// and the local layout, and hands out the per-operation workers.

use tracing::{info, warn};

use pennsync_api::PennsieveClient;

use crate::config::SyncConfig;
use crate::datasets::{Selection, filter_datasets, select_by_name};
use crate::diff::DiffEngine;
use crate::error::CoreError;
use crate::layout::DataLayout;
use crate::map::Mapper;
use crate::model::Dataset;
use crate::pull::Puller;
use crate::push::Pusher;
use crate::tool::{AgentCli, ToolRunner};

#[derive(Debug)]
pub struct SyncService<R = AgentCli> {
    client: PennsieveClient,
    runner: R,
    layout: DataLayout,
}

impl SyncService<AgentCli> {
    /// Build the client and agent runner described by `config`.
    ///
    /// No network traffic happens until the first platform call.
    pub fn new(config: &SyncConfig) -> Result<Self, CoreError> {
        let client = PennsieveClient::new(
            config.credentials.clone(),
            &config.transport(),
            config.identity_endpoint.clone(),
        )?;
        Ok(Self::with_runner(
            client,
            AgentCli::new(config.tool.clone()),
            DataLayout::new(config.base_dir.clone()),
        ))
    }
}

impl<R: ToolRunner> SyncService<R> {
    pub fn with_runner(client: PennsieveClient, runner: R, layout: DataLayout) -> Self {
        Self {
            client,
            runner,
            layout,
        }
    }

    pub fn client(&self) -> &PennsieveClient {
        &self.client
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Remote datasets, optionally filtered by a name substring, sorted by name.
    pub async fn datasets(&self, filter: Option<&str>) -> Result<Vec<Dataset>, CoreError> {
        let all: Vec<Dataset> = self
            .client
            .list_datasets()
            .await?
            .into_iter()
            .map(Dataset::from)
            .collect();
        info!(count = all.len(), "fetched datasets");
        Ok(filter_datasets(all, filter))
    }

    /// Resolve requested names against the remote listing.
    pub async fn select(&self, names: &[String]) -> Result<Selection, CoreError> {
        let available = self.datasets(None).await?;
        let selection = select_by_name(&available, names);
        for name in &selection.missing {
            warn!(dataset = %name, "dataset not found on the platform");
        }
        Ok(selection)
    }

    pub fn diff_engine(&self) -> DiffEngine<'_, R> {
        DiffEngine::new(&self.runner, &self.layout)
    }

    pub fn mapper(&self) -> Mapper<'_, R> {
        Mapper::new(&self.runner, &self.layout)
    }

    pub fn pusher(&self) -> Pusher<'_, R> {
        Pusher::new(&self.runner, &self.layout)
    }

    pub fn puller(&self) -> Puller<'_> {
        Puller::new(&self.client)
    }
}
