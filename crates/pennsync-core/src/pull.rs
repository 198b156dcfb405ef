// ── Pull ──
//
// A mapped dataset starts out as placeholder files whose only content is a
// package id. Pull swaps each placeholder for the real object, fetched via a
// presigned URL from the download manifest endpoint.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pennsync_api::{PACKAGE_PREFIX, PennsieveClient};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::CoreError;

/// Local agent state, relative to the dataset root.
pub const LOCAL_MANIFEST: &str = ".pennsieve/manifest.json";

/// Files larger than this cannot be placeholders and are never read.
const MAX_PLACEHOLDER_LEN: u64 = 256;

// ── Local manifest ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LocalManifest {
    #[serde(default)]
    files: Vec<LocalFile>,
}

#[derive(Debug, Deserialize)]
struct LocalFile {
    #[serde(rename = "packageId")]
    package_id: Option<String>,
}

/// Walk up from `start` to the nearest `.pennsieve/manifest.json`.
pub fn find_local_manifest(start: &Path) -> Option<PathBuf> {
    let dir = if start.is_file() { start.parent()? } else { start };
    dir.ancestors()
        .map(|d| d.join(LOCAL_MANIFEST))
        .find(|candidate| candidate.is_file())
}

fn bare_package_id(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix(PACKAGE_PREFIX).unwrap_or(raw)
}

/// Package ids listed in a local manifest, without the `N:package:` prefix.
pub async fn load_package_ids(path: &Path) -> Result<HashSet<String>, CoreError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::io(path, e))?;
    let manifest: LocalManifest = serde_json::from_str(&text).map_err(|e| CoreError::Config {
        message: format!("invalid {}: {e}", path.display()),
    })?;
    Ok(manifest
        .files
        .iter()
        .filter_map(|f| f.package_id.as_deref())
        .map(bare_package_id)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Regular files under `path` (or `path` itself), skipping agent state and
/// in-progress downloads.
pub fn candidate_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// The package id a placeholder file points at, if it is one.
async fn placeholder_id(path: &Path, known: &HashSet<String>) -> Option<String> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    if meta.len() > MAX_PLACEHOLDER_LEN {
        return None;
    }
    let content = tokio::fs::read_to_string(path).await.ok()?;
    let id = bare_package_id(&content);
    known.contains(id).then(|| id.to_owned())
}

// ── Retry policy ─────────────────────────────────────────────────────

/// Exponential backoff for object downloads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Delay before retry number `attempt + 1`.
pub fn calculate_backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    let base = policy.initial_delay.as_secs_f64() * 2.0_f64.powi(i32::try_from(attempt.min(30)).unwrap_or(30));
    let capped = base.min(policy.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Puller ───────────────────────────────────────────────────────────

/// Progress notifications, one per file.
#[derive(Debug, Clone)]
pub enum PullEvent {
    Started { total: usize },
    Downloaded { path: PathBuf, bytes: u64 },
    Skipped { path: PathBuf },
    Failed { path: PathBuf, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PullFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PullReport {
    pub downloaded: Vec<PathBuf>,
    pub skipped: usize,
    pub failed: Vec<PullFailure>,
    pub bytes: u64,
}

/// Downloads placeholder files.
#[derive(Debug)]
pub struct Puller<'a> {
    client: &'a PennsieveClient,
    policy: RetryPolicy,
}

impl<'a> Puller<'a> {
    pub fn new(client: &'a PennsieveClient) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace every placeholder under `path` with its object.
    ///
    /// Per-file failures are reported and counted; only a missing or
    /// unreadable local manifest fails the whole run.
    pub async fn pull<F>(&self, path: &Path, mut observer: F) -> Result<PullReport, CoreError>
    where
        F: FnMut(&PullEvent),
    {
        let manifest = find_local_manifest(path).ok_or_else(|| CoreError::LocalManifestNotFound {
            path: path.to_path_buf(),
        })?;
        let known = load_package_ids(&manifest).await?;
        debug!(manifest = %manifest.display(), packages = known.len(), "loaded local manifest");

        let files = candidate_files(path);
        observer(&PullEvent::Started { total: files.len() });

        let mut report = PullReport::default();
        for file in files {
            let Some(package_id) = placeholder_id(&file, &known).await else {
                debug!(path = %file.display(), "not a placeholder, skipping");
                report.skipped += 1;
                observer(&PullEvent::Skipped { path: file });
                continue;
            };

            info!(path = %file.display(), package_id = %package_id, "downloading");
            match self.fetch(&package_id, &file).await {
                Ok(bytes) => {
                    report.bytes += bytes;
                    observer(&PullEvent::Downloaded {
                        path: file.clone(),
                        bytes,
                    });
                    report.downloaded.push(file);
                }
                Err(err) => {
                    warn!(path = %file.display(), error = %err, "download failed");
                    let error = err.to_string();
                    observer(&PullEvent::Failed {
                        path: file.clone(),
                        error: error.clone(),
                    });
                    report.failed.push(PullFailure { path: file, error });
                }
            }
        }

        info!(
            downloaded = report.downloaded.len(),
            skipped = report.skipped,
            failed = report.failed.len(),
            "pull finished"
        );
        Ok(report)
    }

    async fn fetch(&self, package_id: &str, dest: &Path) -> Result<u64, CoreError> {
        let manifest = self.client.download_manifest(package_id).await?;
        let url = manifest
            .first_url()
            .ok_or_else(|| CoreError::Api {
                message: format!("download manifest for {package_id} has no URL"),
                status: None,
            })?
            .to_owned();

        let mut attempt = 0;
        loop {
            match self.client.download_to_file(&url, dest).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if attempt + 1 < self.policy.max_attempts => {
                    let delay = calculate_backoff(attempt, &self.policy);
                    attempt += 1;
                    warn!(
                        error = %err,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        "download failed, retrying in {:.1}s",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
