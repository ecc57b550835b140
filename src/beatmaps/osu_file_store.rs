use async_trait::async_trait;
use bytes::Bytes;
use std::{
    path::{Path, PathBuf},
    time::Duration
};
use tracing::{debug, warn};

use super::{md5_hex, BeatmapSource, FetchError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `.osu` files cached on disk as `{root}/{map_id}.osu`, downloaded from
/// `{mirror_url}/{map_id}` when missing or outdated.
pub struct OsuFileStore {
    root: PathBuf,
    mirror_url: String,
    http: reqwest::Client
}

impl OsuFileStore {
    pub fn new(root: impl Into<PathBuf>, mirror_url: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(OsuFileStore {
            root: root.into(),
            mirror_url: mirror_url.trim_end_matches('/').to_string(),
            http
        })
    }

    /// Whether the file on disk can be used as-is
    async fn is_current(&self, path: &Path, expected_md5: Option<&str>) -> Result<bool, FetchError> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(false);
        }

        match expected_md5 {
            Some(expected) => {
                let data = tokio::fs::read(path).await?;
                Ok(md5_hex(&data) == expected)
            }
            None => Ok(true)
        }
    }

    async fn download(&self, map_id: i32) -> Result<Bytes, FetchError> {
        let url = format!("{}/{}", self.mirror_url, map_id);
        debug!("Downloading beatmap {} from {}", map_id, url);

        let body = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if body.is_empty() {
            return Err(FetchError::NotFound(map_id));
        }

        Ok(body)
    }

    async fn fetch(&self, map_id: i32, expected_md5: Option<&str>) -> Result<(), FetchError> {
        let path = self.beatmap_path(map_id);
        if self.is_current(&path, expected_md5).await? {
            return Ok(());
        }

        let body = self.download(map_id).await?;

        if let Some(expected) = expected_md5 {
            let actual = md5_hex(&body);
            if actual != expected {
                return Err(FetchError::HashMismatch {
                    map_id,
                    expected: expected.to_string(),
                    actual
                });
            }
        }

        self.store(map_id, &body).await
    }

    fn partial_path(&self, map_id: i32) -> PathBuf {
        self.root.join(format!("{}.osu.part", map_id))
    }

    /// Writes next to the final path and renames into place, so an
    /// interrupted write never leaves a truncated `.osu` behind
    async fn store(&self, map_id: i32, body: &[u8]) -> Result<(), FetchError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let partial = self.partial_path(map_id);
        tokio::fs::write(&partial, body).await?;
        tokio::fs::rename(&partial, self.beatmap_path(map_id)).await?;

        Ok(())
    }
}

#[async_trait]
impl BeatmapSource for OsuFileStore {
    async fn ensure_available(&self, map_id: i32, expected_md5: Option<&str>) -> bool {
        match self.fetch(map_id, expected_md5).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Beatmap {} unavailable: {}", map_id, e);
                false
            }
        }
    }

    async fn is_present(&self, map_id: i32, expected_md5: Option<&str>) -> bool {
        self.is_current(&self.beatmap_path(map_id), expected_md5)
            .await
            .unwrap_or(false)
    }

    fn beatmap_path(&self, map_id: i32) -> PathBuf {
        self.root.join(format!("{}.osu", map_id))
    }
}
