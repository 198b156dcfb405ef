// Package endpoints: download manifests and presigned-URL downloads

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::client::{PennsieveClient, check_status, redact};
use crate::error::Error;

/// Node-id prefix the platform puts in front of package identifiers.
pub const PACKAGE_PREFIX: &str = "N:package:";

/// Whole-transfer limit for one object download. Overrides the client's
/// request timeout, which is sized for API calls.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Response of `POST /packages/download-manifest`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadManifest {
    #[serde(default)]
    pub data: Vec<DownloadTarget>,
}

/// One downloadable object with its presigned URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadTarget {
    pub url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DownloadManifest {
    /// Presigned URL of the first object, if the manifest has one.
    pub fn first_url(&self) -> Option<&str> {
        self.data.first().map(|t| t.url.as_str())
    }
}

impl PennsieveClient {
    /// Request presigned download URLs for one package.
    ///
    /// `package_id` may be given with or without the `N:package:` prefix.
    pub async fn download_manifest(&self, package_id: &str) -> Result<DownloadManifest, Error> {
        let bare = package_id.strip_prefix(PACKAGE_PREFIX).unwrap_or(package_id);
        let body = json!({ "nodeIds": [format!("{PACKAGE_PREFIX}{bare}")] });

        self.session()
            .call(|token| {
                let body = &body;
                async move {
                    let url = self.api_url("packages/download-manifest", &[], &token)?;
                    self.post_json(url, body).await
                }
            })
            .await
    }

    /// Stream a presigned URL into `dest`.
    ///
    /// Bytes go to a hidden sibling file that replaces `dest` only after
    /// the transfer completes, so a failed download leaves `dest` intact.
    /// Returns the number of bytes written.
    pub async fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64, Error> {
        let url = Url::parse(url)?;
        debug!("downloading {} -> {}", redact(&url), dest.display());

        let mut resp = check_status(
            self.http()
                .get(url)
                .timeout(DOWNLOAD_TIMEOUT)
                .send()
                .await?,
        )
        .await?;

        let partial = partial_path(dest);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written: u64 = 0;

        let copied: Result<(), Error> = async {
            while let Some(chunk) = resp.chunk().await? {
                file.write_all(&chunk).await?;
                written += u64::try_from(chunk.len()).unwrap_or(u64::MAX);
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        drop(file);
        if let Err(err) = copied {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err);
        }

        tokio::fs::rename(&partial, dest).await?;
        Ok(written)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.download"))
}
