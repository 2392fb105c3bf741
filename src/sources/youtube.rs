use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::SongResolver;
use crate::{audio::queue::Song, error::ResolveError};

/// Resolves songs by asking yt-dlp for the video metadata.
pub struct YtDlpResolver {
    binary: String,
}

/// The fields of `yt-dlp --dump-json` the bot uses.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    webpage_url: String,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn is_url(query: &str) -> bool {
        Url::parse(query)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    /// URLs are looked up directly, anything else becomes a single-result search.
    fn target(query: &str) -> String {
        if Self::is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        }
    }

    fn parse_output(query: &str, stdout: &str) -> Result<Song, ResolveError> {
        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| ResolveError::NotFound(query.to_string()))?;

        let info: YtDlpInfo = serde_json::from_str(line)?;
        Ok(Song::new(info.title, info.webpage_url))
    }
}

#[async_trait]
impl SongResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Song, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::EmptyQuery);
        }

        let target = Self::target(query);
        debug!("📊 Resolving: {}", target);

        let output = Command::new(&self.binary)
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                target.as_str(),
            ])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Extractor(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let song = Self::parse_output(query, &stdout)?;
        info!("🔍 Resolved {} to {}", query, song.url);

        Ok(song)
    }
}
