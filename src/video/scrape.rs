//! Page-scrape resolution strategy: watch-page Open Graph metadata plus the
//! caption transcript API.
//!
//! Requires an isolated video id — the caption API is keyed by id, not URL.

use crate::error::ResolveError;
use crate::links;
use crate::video::{
    DESCRIPTION_FETCH_FAILED, NO_DESCRIPTION, Resolve, UNKNOWN_TITLE, VideoRecord, VideoReference,
};

use anyhow::Context as _;
use scraper::{Html, Selector};
use std::time::Duration;
use yt_transcript_rs::api::YouTubeTranscriptApi;

/// Browser-like User-Agent; YouTube serves stripped-down pages to obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct PageScrapeResolver {
    http: reqwest::Client,
    caption_api: YouTubeTranscriptApi,
    caption_lang: String,
}

impl PageScrapeResolver {
    pub fn new(caption_lang: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        let caption_api = YouTubeTranscriptApi::new(None, None, None)
            .map_err(|e| anyhow::anyhow!("failed to build caption API client: {e}"))?;
        Ok(Self {
            http,
            caption_api,
            caption_lang: caption_lang.to_string(),
        })
    }

    /// Fetch the watch page and pull title/description out of its meta tags.
    /// Any failure degrades to sentinel values; the transcript fetch decides
    /// whether the candidate is usable.
    async fn fetch_metadata(&self, video_id: &str) -> (String, String) {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let html = match self.http.get(&url).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.text().await {
                    Ok(html) => html,
                    Err(error) => {
                        tracing::warn!(%error, video_id, "failed to read watch page body");
                        return (UNKNOWN_TITLE.into(), DESCRIPTION_FETCH_FAILED.into());
                    }
                },
                Err(error) => {
                    tracing::warn!(%error, video_id, "watch page returned error status");
                    return (UNKNOWN_TITLE.into(), DESCRIPTION_FETCH_FAILED.into());
                }
            },
            Err(error) => {
                tracing::warn!(%error, video_id, "failed to fetch watch page");
                return (UNKNOWN_TITLE.into(), DESCRIPTION_FETCH_FAILED.into());
            }
        };

        parse_metadata(&html)
    }

    async fn fetch_transcript(&self, video_id: &str) -> String {
        let languages = [self.caption_lang.as_str()];
        match self
            .caption_api
            .fetch_transcript(video_id, &languages, false)
            .await
        {
            Ok(transcript) => transcript
                .snippets
                .iter()
                .map(|snippet| snippet.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            Err(error) => {
                tracing::warn!(%error, video_id, "no transcript available");
                String::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl Resolve for PageScrapeResolver {
    async fn resolve(&self, reference: &VideoReference) -> Result<VideoRecord, ResolveError> {
        let video_id = reference.id.as_deref().ok_or(ResolveError::MissingVideoId)?;

        let transcript = self.fetch_transcript(video_id).await;
        let (title, description) = self.fetch_metadata(video_id).await;
        let repo_links = links::extract_repo_links(&description);

        Ok(VideoRecord {
            title,
            description,
            transcript,
            repo_links,
        })
    }
}

/// Extract og:title / og:description from watch-page HTML.
///
/// Kept synchronous and free-standing: `scraper::Html` is not `Send`, so it
/// must not live across an await point.
fn parse_metadata(html: &str) -> (String, String) {
    let document = Html::parse_document(html);

    let title = meta_content(&document, r#"meta[property="og:title"]"#)
        .unwrap_or_else(|| UNKNOWN_TITLE.into());
    let description = meta_content(&document, r#"meta[property="og:description"]"#)
        .unwrap_or_else(|| NO_DESCRIPTION.into());

    (title, description)
}

fn meta_content(document: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(str::to_string)
}
