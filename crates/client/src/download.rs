//! Stores produced artifacts in a local directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use atelier_core::PartName;
use atelier_jobs::{
    ArtifactError, ArtifactRef, ArtifactSink, DownloadReport, JobSnapshot, produced_artifacts,
};
use reqwest::Url;

use crate::api::ApiClient;

const IMAGE_EXTENSION: &str = "png";
const MAX_EXTENSION_LEN: usize = 16;

/// Downloads every artifact of a snapshot into `dir` as
/// `{job_id}-{part}-{index}.{ext}`.
///
/// The extension comes from the URL path. Without one, image parts (`front`,
/// `back`) get `png` and other parts are written without an extension.
#[derive(Debug, Clone)]
pub struct DirectoryDownloader {
    client: ApiClient,
    dir: PathBuf,
}

impl DirectoryDownloader {
    pub fn new(client: ApiClient, dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn target_path(&self, artifact: &ArtifactRef, url: &str) -> PathBuf {
        let stem = format!("{}-{}-{}", artifact.job_id, artifact.part, artifact.index);
        match extension_for(&artifact.part, url) {
            Some(ext) => self.dir.join(format!("{stem}.{ext}")),
            None => self.dir.join(stem),
        }
    }

    async fn download_one(&self, artifact: &ArtifactRef) -> Result<PathBuf, ArtifactError> {
        let url = self.client.resolve(&artifact.url);
        let body = self
            .client
            .get_bytes(&url)
            .await
            .map_err(|e| ArtifactError::Download {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let path = self.target_path(artifact, &url);
        tokio::fs::write(&path, &body).await?;
        Ok(path)
    }
}

#[async_trait]
impl ArtifactSink for DirectoryDownloader {
    async fn download_all(&self, snapshot: &JobSnapshot) -> Result<DownloadReport, ArtifactError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut report = DownloadReport::default();
        for artifact in produced_artifacts(snapshot) {
            match self.download_one(&artifact).await {
                Ok(path) => {
                    tracing::info!(
                        job_id = %artifact.job_id,
                        part = %artifact.part,
                        index = artifact.index,
                        path = %path.display(),
                        "artifact saved"
                    );
                    report.written.push(path);
                }
                Err(error) => {
                    tracing::warn!(
                        job_id = %artifact.job_id,
                        part = %artifact.part,
                        index = artifact.index,
                        error = %error,
                        "artifact download failed"
                    );
                    report.failures.push((artifact, error));
                }
            }
        }

        Ok(report)
    }
}

/// Extension to store an artifact under.
fn extension_for(part: &PartName, url: &str) -> Option<String> {
    extension_of(url).or_else(|| {
        matches!(part.as_str(), PartName::FRONT | PartName::BACK)
            .then(|| IMAGE_EXTENSION.to_string())
    })
}

/// File extension of the URL path, if it has a usable one.
fn extension_of(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let file = url.path().rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let usable = (1..=MAX_EXTENSION_LEN).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    usable.then_some(ext)
}
