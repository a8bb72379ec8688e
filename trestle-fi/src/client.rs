//! Remote inspection API client
//!
//! The core consumes four remote operations: structure metadata, the
//! previous inspection's condition ratings, inspection submission, and
//! asset upload. They sit behind the [`StructureApi`] trait so the
//! submission assembler and the loading flow can be exercised against an
//! in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use trestle_common::model::{PriorRating, RawElement};

use crate::error::{Error, Result};
use crate::submit::InspectionEntity;

const USER_AGENT: &str = "Trestle/0.1 (field-inspection)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Structure metadata as returned by the remote API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructurePayload {
    pub element_metadata: Vec<RawElement>,
}

/// Condition ratings from the structure's most recent inspection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousInspection {
    pub condition_ratings: Vec<PriorRating>,
}

/// Remote asset reference returned by image upload
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAsset {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    inspection_id: Uuid,
}

/// Remote API operations the core depends on
#[async_trait]
pub trait StructureApi: Send + Sync {
    /// Fetch a structure's element metadata
    async fn fetch_structure(&self, structure_id: &str) -> Result<StructurePayload>;

    /// Fetch the previous inspection's ratings; `None` for a first inspection
    async fn fetch_previous_inspection(
        &self,
        structure_id: &str,
    ) -> Result<Option<PreviousInspection>>;

    /// Submit an assembled inspection, returning its assigned id
    async fn submit_inspection(&self, entity: &InspectionEntity) -> Result<Uuid>;

    /// Upload one image blob to remote asset storage
    async fn upload_image(&self, data: Vec<u8>, file_name: &str) -> Result<RemoteAsset>;
}

/// HTTP implementation of [`StructureApi`]
pub struct HttpStructureApi {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpStructureApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Api(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl StructureApi for HttpStructureApi {
    async fn fetch_structure(&self, structure_id: &str) -> Result<StructurePayload> {
        let url = self.url(&format!("structures/{structure_id}"));
        debug!(structure_id, "Fetching structure metadata");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!("GET {url} returned {status}")));
        }

        response
            .json::<StructurePayload>()
            .await
            .map_err(|e| Error::Api(e.to_string()))
    }

    async fn fetch_previous_inspection(
        &self,
        structure_id: &str,
    ) -> Result<Option<PreviousInspection>> {
        let url = self.url(&format!("structures/{structure_id}/previous-inspection"));
        debug!(structure_id, "Fetching previous inspection");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Api(format!("GET {url} returned {status}")));
        }

        response
            .json::<PreviousInspection>()
            .await
            .map(Some)
            .map_err(|e| Error::Api(e.to_string()))
    }

    async fn submit_inspection(&self, entity: &InspectionEntity) -> Result<Uuid> {
        let url = self.url("inspections");
        debug!(
            ratings = entity.condition_ratings.len(),
            actions = entity.maintenance_actions.len(),
            "Submitting inspection"
        );

        let response = self
            .http_client
            .post(&url)
            .json(entity)
            .send()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!("POST {url} returned {status}")));
        }

        let body = response
            .json::<SubmitResponse>()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;
        Ok(body.inspection_id)
    }

    async fn upload_image(&self, data: Vec<u8>, file_name: &str) -> Result<RemoteAsset> {
        let url = self.url("assets");
        debug!(file_name, bytes = data.len(), "Uploading image");

        let response = self
            .http_client
            .post(&url)
            .query(&[("fileName", file_name)])
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api(format!("POST {url} returned {status}")));
        }

        response
            .json::<RemoteAsset>()
            .await
            .map_err(|e| Error::Api(e.to_string()))
    }
}
