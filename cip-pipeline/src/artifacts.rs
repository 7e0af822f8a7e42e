//! Per-pipeline artifact files
//!
//! Large or binary-ish stage products live on disk under `<root>/data`, keyed
//! by pipeline id. Stage payloads record the path relative to the data
//! directory. Writes overwrite, so rerunning a stage is idempotent.
//!
//! ```text
//! data/
//!   extractions/{id}.md
//!   drafts/{id}.md
//!   fingerprints/{id}.json
//!   outputs/{id}.html
//!   outputs/{id}_metadata.json
//! ```

use cip_common::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// File store rooted at the data directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    data_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn extraction_file(id: Uuid) -> String {
        format!("extractions/{}.md", id)
    }

    pub fn draft_file(id: Uuid) -> String {
        format!("drafts/{}.md", id)
    }

    pub fn fingerprint_file(id: Uuid) -> String {
        format!("fingerprints/{}.json", id)
    }

    pub fn html_file(id: Uuid) -> String {
        format!("outputs/{}.html", id)
    }

    pub fn metadata_file(id: Uuid) -> String {
        format!("outputs/{}_metadata.json", id)
    }

    /// Absolute path of a relative artifact name
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.data_dir.join(relative)
    }

    /// Save extracted source text
    pub async fn write_extraction(&self, id: Uuid, content: &str) -> Result<String> {
        let relative = Self::extraction_file(id);
        self.write(&relative, content.as_bytes()).await?;
        Ok(relative)
    }

    pub async fn read_extraction(&self, id: Uuid) -> Result<String> {
        self.read_string(&Self::extraction_file(id)).await
    }

    /// Save a Markdown draft
    pub async fn write_draft(&self, id: Uuid, content: &str) -> Result<String> {
        let relative = Self::draft_file(id);
        self.write(&relative, content.as_bytes()).await?;
        Ok(relative)
    }

    pub async fn read_draft(&self, id: Uuid) -> Result<String> {
        self.read_string(&Self::draft_file(id)).await
    }

    /// Save the source fingerprint (one embedding per source chunk)
    pub async fn write_fingerprint(&self, id: Uuid, embeddings: &[Vec<f32>]) -> Result<String> {
        let relative = Self::fingerprint_file(id);
        let json = serde_json::to_vec(embeddings)
            .map_err(|e| Error::Internal(format!("Failed to serialize fingerprint: {}", e)))?;
        self.write(&relative, &json).await?;
        Ok(relative)
    }

    /// Load the source fingerprint; `None` when it was never written
    pub async fn read_fingerprint(&self, id: Uuid) -> Result<Option<Vec<Vec<f32>>>> {
        let path = self.resolve(&Self::fingerprint_file(id));
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::Internal(format!("Failed to parse fingerprint {}: {}", path.display(), e)))
    }

    /// Save the final HTML and its metadata, returning both relative names
    pub async fn write_output(&self, id: Uuid, html: &str, metadata: &Value) -> Result<(String, String)> {
        let html_file = Self::html_file(id);
        let metadata_file = Self::metadata_file(id);
        let metadata_json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| Error::Internal(format!("Failed to serialize output metadata: {}", e)))?;

        self.write(&html_file, html.as_bytes()).await?;
        self.write(&metadata_file, &metadata_json).await?;
        Ok((html_file, metadata_file))
    }

    pub async fn read_html(&self, id: Uuid) -> Result<String> {
        self.read_string(&Self::html_file(id)).await
    }

    async fn write(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Artifact written");
        Ok(())
    }

    async fn read_string(&self, relative: &str) -> Result<String> {
        let path = self.resolve(relative);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("artifact {}", path.display())))
            }
            Err(e) => Err(e.into()),
        }
    }
}
