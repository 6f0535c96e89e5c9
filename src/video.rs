//! Video metadata + transcript resolution.
//!
//! One capability, two interchangeable strategies selected at construction:
//! [`scrape::PageScrapeResolver`] (watch-page metadata + caption API) and
//! [`ytdlp::YtDlpResolver`] (unified extractor manifest). Callers depend
//! only on the [`Resolve`] trait.

pub mod scrape;
pub mod ytdlp;

use crate::config::{Config, ResolverKind};
use crate::error::ResolveError;

use serde::{Deserialize, Serialize};

/// Title sentinel when the metadata fetch fails or carries no title.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Description sentinel when the metadata fetch itself fails.
pub const DESCRIPTION_FETCH_FAILED: &str = "Error fetching description.";

/// Description sentinel when the page loads but carries no description.
pub const NO_DESCRIPTION: &str = "No description found.";

/// A video link extracted from message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    pub url: String,
    /// The 11-character video id, when it could be isolated from the URL.
    pub id: Option<String>,
}

/// Everything the digest generator needs about one video.
///
/// Built once per candidate, consumed once, discarded. An empty
/// `transcript` means "no captions available" and causes the batch loop to
/// skip the candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub title: String,
    pub description: String,
    /// Caption text in temporal order. Empty when unavailable.
    pub transcript: String,
    /// Every GitHub URL found in the description, in order.
    pub repo_links: Vec<String>,
}

impl VideoRecord {
    pub fn has_transcript(&self) -> bool {
        !self.transcript.is_empty()
    }

    /// The one repository link surfaced to the digest, if any.
    pub fn repo_link(&self) -> Option<&str> {
        self.repo_links.first().map(String::as_str)
    }
}

/// Transcript + metadata resolution capability.
#[async_trait::async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, reference: &VideoReference) -> Result<VideoRecord, ResolveError>;
}

/// Construct the strategy the configuration selects.
pub fn build_resolver(config: &Config) -> anyhow::Result<Box<dyn Resolve>> {
    match config.resolver {
        ResolverKind::Scrape => Ok(Box::new(scrape::PageScrapeResolver::new(
            &config.caption_lang,
        )?)),
        ResolverKind::YtDlp => Ok(Box::new(ytdlp::YtDlpResolver::new(&config.caption_lang)?)),
    }
}
