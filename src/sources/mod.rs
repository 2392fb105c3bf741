pub mod youtube;

use async_trait::async_trait;

use crate::{audio::queue::Song, error::ResolveError};

pub use youtube::YtDlpResolver;

/// Turns an `enqueue` request into a song with a canonical URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SongResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Song, ResolveError>;
}

/// The url wins over the title; with neither the term is empty and resolution fails.
pub fn search_term(url: Option<&str>, title: Option<&str>) -> String {
    url.or(title).unwrap_or_default().trim().to_string()
}
