//! Server access.
//!
//! [`SeedApi`] is the request/response contract the polling core depends on.
//! [`HttpSeedClient`] implements it over reqwest; tests substitute an
//! in-memory fake. [`ProgressClient`] sits on top and classifies a progress
//! poll as success or failure.

use async_trait::async_trait;
use reqwest::Method;
use seedwatch_protocol::{
    ActionResponse, AnalysesEnvelope, AnalysisEnvelope, AnalysisId, AnalysisRecord, ProgressKey,
    ProgressKeyResponse, ProgressSnapshot,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::WatchConfig;
use crate::error::{ApiError, ProgressError};

/// Remote operations consumed by the tracker, lifecycle, and board.
#[async_trait]
pub trait SeedApi: Send + Sync {
    /// `GET progress/{key}/`, returned as-is (an error status is not an `Err` here)
    async fn get_progress(&self, key: &ProgressKey) -> Result<ProgressSnapshot, ApiError>;

    /// `GET analyses/{id}/progress_key/`; `None` when no task is running
    async fn get_progress_key(&self, id: AnalysisId) -> Result<Option<ProgressKey>, ApiError>;

    /// `GET analyses/{id}/`
    async fn get_analysis(&self, id: AnalysisId) -> Result<AnalysisRecord, ApiError>;

    /// `GET analyses/`
    async fn list_analyses(&self) -> Result<Vec<AnalysisRecord>, ApiError>;

    /// `POST analyses/{id}/start/`
    async fn start_analysis(&self, id: AnalysisId) -> Result<ActionResponse, ApiError>;

    /// `POST analyses/{id}/stop/`
    async fn stop_analysis(&self, id: AnalysisId) -> Result<ActionResponse, ApiError>;

    /// `DELETE analyses/{id}/`
    async fn delete_analysis(&self, id: AnalysisId) -> Result<ActionResponse, ApiError>;
}

/// Fetches progress snapshots and turns `status: error` into a failure.
///
/// No retries happen here.
#[derive(Clone)]
pub struct ProgressClient {
    api: Arc<dyn SeedApi>,
}

impl ProgressClient {
    pub fn new(api: Arc<dyn SeedApi>) -> Self {
        Self { api }
    }

    pub async fn fetch(&self, key: &ProgressKey) -> Result<ProgressSnapshot, ProgressError> {
        let snapshot = self.api.get_progress(key).await?;
        if snapshot.is_error() {
            return Err(ProgressError::RemoteTask(Box::new(snapshot)));
        }
        Ok(snapshot)
    }
}

/// reqwest-backed implementation of [`SeedApi`].
///
/// Every request is scoped with the `organization_id` query parameter.
pub struct HttpSeedClient {
    http: reqwest::Client,
    base_url: Url,
    organization_id: u64,
}

impl HttpSeedClient {
    pub fn new(base_url: Url, organization_id: u64, timeout: Duration) -> Result<Self, ApiError> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("seedwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            organization_id,
        })
    }

    pub fn from_config(config: &WatchConfig) -> anyhow::Result<Self> {
        let client = Self::new(
            config.base_url()?,
            config.organization_id,
            config.request_timeout(),
        )?;
        Ok(client)
    }

    /// Build `{base}/{segments...}/`. Segments are percent-encoded, so
    /// progress keys containing `:` or `/` are safe.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .query(&[("organization_id", self.organization_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// The server answers rejected actions with a non-2xx status and an
    /// `{status: "error", message}` body; that body is the useful result.
    async fn send_action(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<ActionResponse, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!("{} {}", method, url);

        let response = self
            .http
            .request(method, url)
            .query(&[("organization_id", self.organization_id)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<ActionResponse>(&body) {
            Ok(action) => Ok(action),
            Err(_) if status.is_success() && body.trim().is_empty() => {
                Ok(ActionResponse::success())
            }
            Err(_) => Err(ApiError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl SeedApi for HttpSeedClient {
    async fn get_progress(&self, key: &ProgressKey) -> Result<ProgressSnapshot, ApiError> {
        self.get_json(&["progress", key.as_str()]).await
    }

    async fn get_progress_key(&self, id: AnalysisId) -> Result<Option<ProgressKey>, ApiError> {
        let id = id.to_string();
        let response: ProgressKeyResponse =
            self.get_json(&["analyses", id.as_str(), "progress_key"]).await?;
        Ok(response.progress_key)
    }

    async fn get_analysis(&self, id: AnalysisId) -> Result<AnalysisRecord, ApiError> {
        let id = id.to_string();
        let envelope: AnalysisEnvelope = self.get_json(&["analyses", id.as_str()]).await?;
        Ok(envelope.analysis)
    }

    async fn list_analyses(&self) -> Result<Vec<AnalysisRecord>, ApiError> {
        let envelope: AnalysesEnvelope = self.get_json(&["analyses"]).await?;
        Ok(envelope.analyses)
    }

    async fn start_analysis(&self, id: AnalysisId) -> Result<ActionResponse, ApiError> {
        let id = id.to_string();
        self.send_action(Method::POST, &["analyses", id.as_str(), "start"]).await
    }

    async fn stop_analysis(&self, id: AnalysisId) -> Result<ActionResponse, ApiError> {
        let id = id.to_string();
        self.send_action(Method::POST, &["analyses", id.as_str(), "stop"]).await
    }

    async fn delete_analysis(&self, id: AnalysisId) -> Result<ActionResponse, ApiError> {
        let id = id.to_string();
        self.send_action(Method::DELETE, &["analyses", id.as_str()]).await
    }
}
