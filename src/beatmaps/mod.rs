pub mod osu_file_store;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub use osu_file_store::OsuFileStore;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to beatmap mirror failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Beatmap file io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mirror has no file for beatmap {0}")]
    NotFound(i32),

    #[error("Beatmap {map_id} hash mismatch (expected {expected}, got {actual})")]
    HashMismatch { map_id: i32, expected: String, actual: String }
}

/// Makes sure a beatmap's `.osu` file is present locally.
#[async_trait]
pub trait BeatmapSource: Send + Sync {
    /// Returns true once the file for `map_id` is on disk (and matches
    /// `expected_md5` when one is given). Fetches it if needed. Never errors;
    /// any failure means "not available".
    async fn ensure_available(&self, map_id: i32, expected_md5: Option<&str>) -> bool;

    /// Local-only check, never touches the network. Sources that cannot
    /// tell report false and let `ensure_available` decide.
    async fn is_present(&self, _map_id: i32, _expected_md5: Option<&str>) -> bool {
        false
    }

    fn beatmap_path(&self, map_id: i32) -> PathBuf;
}

/// Lowercase hex MD5, the format beatmap hashes are stored in
pub fn md5_hex(data: &[u8]) -> String {
    use md5::{Digest, Md5};

    format!("{:x}", Md5::digest(data))
}
