//! REST adapter for the generation and training endpoints.

use async_trait::async_trait;
use atelier_core::{JobId, PartName};
use atelier_jobs::{FetchError, JobSnapshot, PartSpec, SnapshotFetcher};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::{ClientConfig, ConfigError};

/// Kind of remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum JobResource {
    /// Two-sided image generation (`front` and `back` parts).
    Generation,
    /// Model training (one `model` part).
    Training,
}

impl JobResource {
    pub fn path(&self) -> &'static str {
        match self {
            JobResource::Generation => "generations",
            JobResource::Training => "trainings",
        }
    }
}

/// `GET /generations/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    pub id: JobId,
    #[serde(default)]
    pub front_count: u32,
    #[serde(default)]
    pub back_count: u32,
    #[serde(default)]
    pub front_images: Vec<String>,
    #[serde(default)]
    pub back_images: Vec<String>,
    #[serde(default)]
    pub front_error: Option<String>,
    #[serde(default)]
    pub back_error: Option<String>,
}

impl GenerationResponse {
    pub fn into_snapshot(self) -> Result<JobSnapshot, FetchError> {
        let side = |requested: u32, images: Vec<String>, error: Option<String>| {
            let spec = PartSpec::new(requested).with_artifacts(images);
            match error.filter(|e| !e.trim().is_empty()) {
                Some(error) => spec.with_error(error),
                None => spec,
            }
        };

        Ok(JobSnapshot::builder(self.id)
            .part(PartName::FRONT, side(self.front_count, self.front_images, self.front_error))
            .part(PartName::BACK, side(self.back_count, self.back_images, self.back_error))
            .build()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// `GET /trainings/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingResponse {
    pub id: JobId,
    pub status: TrainingStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub model_url: Option<String>,
}

impl TrainingResponse {
    pub fn into_snapshot(self) -> Result<JobSnapshot, FetchError> {
        let model = PartSpec::new(1);
        let model = match self.status {
            TrainingStatus::Queued | TrainingStatus::Running => model,
            TrainingStatus::Succeeded => match self.model_url {
                Some(url) => model.with_artifacts([url]),
                None => model.with_produced(1),
            },
            TrainingStatus::Failed => {
                model.with_error(self.error.unwrap_or_else(|| "training failed".to_string()))
            }
        };

        Ok(JobSnapshot::builder(self.id)
            .part(PartName::MODEL, model)
            .build()?)
    }
}

/// Shared HTTP client for the atelier backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// A fetch capability for one kind of job.
    pub fn fetcher(&self, resource: JobResource) -> ResourceFetcher {
        ResourceFetcher {
            client: self.clone(),
            resource,
        }
    }

    pub async fn generation(&self, job_id: &JobId) -> Result<GenerationResponse, FetchError> {
        self.get_json(&self.job_url(JobResource::Generation, job_id)).await
    }

    pub async fn training(&self, job_id: &JobId) -> Result<TrainingResponse, FetchError> {
        self.get_json(&self.job_url(JobResource::Training, job_id)).await
    }

    /// Absolute URL for `location`; relative paths are resolved against the API base.
    pub fn resolve(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            format!("{}/{}", self.base_url, location.trim_start_matches('/'))
        }
    }

    /// Raw body of `location`.
    pub async fn get_bytes(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.send(&self.resolve(location)).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;
        Ok(body.to_vec())
    }

    fn job_url(&self, resource: JobResource, job_id: &JobId) -> String {
        format!("{}/{}/{}", self.base_url, resource.path(), job_id)
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut req = self.http.get(url);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self
            .send(url)
            .await?
            .bytes()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| FetchError::invalid(e.to_string()))
    }
}

/// [`SnapshotFetcher`] over one REST resource.
#[derive(Debug, Clone)]
pub struct ResourceFetcher {
    client: ApiClient,
    resource: JobResource,
}

#[async_trait]
impl SnapshotFetcher for ResourceFetcher {
    async fn fetch_snapshot(&self, job_id: &JobId) -> Result<JobSnapshot, FetchError> {
        let snapshot = match self.resource {
            JobResource::Generation => self.client.generation(job_id).await?.into_snapshot()?,
            JobResource::Training => self.client.training(job_id).await?.into_snapshot()?,
        };

        if snapshot.job_id() != *job_id {
            return Err(FetchError::invalid(format!(
                "{} response for {job_id} carries id {}",
                self.resource.path(),
                snapshot.job_id()
            )));
        }

        tracing::debug!(
            job_id = %job_id,
            resource = self.resource.path(),
            state = %snapshot.state(),
            "fetched snapshot"
        );
        Ok(snapshot)
    }
}
