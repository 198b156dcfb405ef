// ── Manifest builder ──
//
// Turns the ADDED rows of a diff into one upload manifest: the first
// existing file creates it, every later file is appended. A manifest only
// ever grows; nothing is removed, reordered or rolled back.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::DiffRow;
use crate::tool::{AgentCommand, ToolError, ToolRunner};

/// Fatal manifest failures. Per-row problems are [`RowFailure`]s instead.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest create failed: {0}")]
    Create(#[source] ToolError),

    #[error("no manifest ID in tool output: {output:?}")]
    IdParse { output: String },

    #[error("no file could be attached to a manifest ({skipped} skipped)")]
    NothingAttached { skipped: usize },
}

/// Why a single row was left out of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowFailureKind {
    /// The local file does not exist.
    FileMissing,
    /// `manifest add` failed.
    RemoteAttach { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub path: PathBuf,
    #[serde(flatten)]
    pub kind: RowFailureKind,
}

/// A manifest with at least one attached file, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestHandle {
    pub manifest_id: u64,
    pub attached: usize,
    pub failures: Vec<RowFailure>,
}

impl ManifestHandle {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Builder progress. The attached count lives on the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestState {
    Empty,
    Created { manifest_id: u64 },
    Extended { manifest_id: u64 },
}

impl ManifestState {
    fn manifest_id(self) -> Option<u64> {
        match self {
            Self::Empty => None,
            Self::Created { manifest_id } | Self::Extended { manifest_id } => Some(manifest_id),
        }
    }
}

/// Extract the manifest id from `manifest create` output.
///
/// Looks for `ID:` (any case), optional whitespace, then a decimal number,
/// e.g. `Manifest ID: 40 Message: Successfully indexed 1 files.`
pub fn parse_manifest_id(output: &str) -> Result<u64, ManifestError> {
    output
        .lines()
        .find_map(id_in_line)
        .ok_or_else(|| ManifestError::IdParse {
            output: output.trim().to_owned(),
        })
}

fn id_in_line(line: &str) -> Option<u64> {
    // ASCII lowering keeps byte offsets aligned with `line`.
    let lower = line.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find("id:") {
        let rest = line[from + pos + 3..].trim_start();
        let digits: &str = rest
            .find(|c: char| !c.is_ascii_digit())
            .map_or(rest, |end| &rest[..end]);
        if let Ok(id) = digits.parse() {
            return Some(id);
        }
        from += pos + 3;
    }
    None
}

/// Builds one manifest from ADDED rows through the agent tool.
///
/// The first row whose local file exists creates the manifest; every later
/// row is appended to it. A missing file before that point is recorded as a
/// row failure and the next existing file seeds the manifest instead of the
/// whole dataset failing, as the upstream push script did.
#[derive(Debug)]
pub struct ManifestBuilder<'a, R> {
    runner: &'a R,
    state: ManifestState,
    attached: usize,
    failures: Vec<RowFailure>,
}

impl<'a, R: ToolRunner> ManifestBuilder<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self {
            runner,
            state: ManifestState::Empty,
            attached: 0,
            failures: Vec::new(),
        }
    }

    /// Attach `rows` in order and return the finished manifest.
    pub async fn build(mut self, rows: &[&DiffRow]) -> Result<ManifestHandle, ManifestError> {
        for row in rows {
            self.attach(row).await?;
        }

        let Some(manifest_id) = self.state.manifest_id() else {
            return Err(ManifestError::NothingAttached {
                skipped: self.failures.len(),
            });
        };

        info!(
            manifest_id,
            attached = self.attached,
            failed = self.failures.len(),
            "manifest ready"
        );
        Ok(ManifestHandle {
            manifest_id,
            attached: self.attached,
            failures: self.failures,
        })
    }

    async fn attach(&mut self, row: &DiffRow) -> Result<(), ManifestError> {
        if !file_exists(&row.local_path).await {
            warn!(path = %row.local_path.display(), "file not found, skipping");
            self.failures.push(RowFailure {
                path: row.local_path.clone(),
                kind: RowFailureKind::FileMissing,
            });
            return Ok(());
        }

        let target = row.target().map(str::to_owned);

        match self.state.manifest_id() {
            None => {
                info!(file = %row.file_name, target = ?target, "creating manifest");
                let output = self
                    .runner
                    .run(&AgentCommand::ManifestCreate {
                        path: row.local_path.clone(),
                        target,
                    })
                    .await
                    .map_err(ManifestError::Create)?;
                let manifest_id = parse_manifest_id(&output.stdout)?;
                info!(manifest_id, "created manifest");
                self.attached = 1;
                self.state = ManifestState::Created { manifest_id };
            }
            Some(manifest_id) => {
                debug!(manifest_id, file = %row.file_name, target = ?target, "adding file");
                let result = self
                    .runner
                    .run(&AgentCommand::ManifestAdd {
                        manifest_id,
                        path: row.local_path.clone(),
                        target,
                    })
                    .await;
                match result {
                    Ok(_) => {
                        self.attached += 1;
                        self.state = ManifestState::Extended { manifest_id };
                    }
                    Err(err) => {
                        warn!(file = %row.file_name, error = %err, "failed to add file");
                        self.failures.push(RowFailure {
                            path: row.local_path.clone(),
                            kind: RowFailureKind::RemoteAttach {
                                message: err.to_string(),
                            },
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
