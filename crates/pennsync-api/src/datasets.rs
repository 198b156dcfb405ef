// Dataset endpoints

use serde::{Deserialize, Serialize};

use crate::client::PennsieveClient;
use crate::error::Error;

/// One entry of the `/datasets/` listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetEnvelope {
    pub content: DatasetContent,
}

/// The fields of a dataset this client relies on. Everything else the
/// platform sends is kept in `extra`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetContent {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PennsieveClient {
    /// List every dataset visible to the authenticated user.
    ///
    /// `GET /datasets/?includeBannerUrl=false&includePublishedDataset=false&api_key={token}`
    pub async fn list_datasets(&self) -> Result<Vec<DatasetEnvelope>, Error> {
        self.session()
            .call(|token| async move {
                let url = self.api_url(
                    "datasets/",
                    &[
                        ("includeBannerUrl", "false"),
                        ("includePublishedDataset", "false"),
                    ],
                    &token,
                )?;
                self.get_json(url).await
            })
            .await
    }
}
