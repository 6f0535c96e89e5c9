//! Unified-extractor resolution strategy: `yt-dlp -J` for metadata and the
//! caption track manifest, then a plain HTTP fetch of the selected track.
//!
//! Works on raw URLs, so references whose 11-char id could not be isolated
//! still resolve under this strategy.

use crate::error::ResolveError;
use crate::links;
use crate::video::{NO_DESCRIPTION, Resolve, UNKNOWN_TITLE, VideoRecord, VideoReference};

use anyhow::Context as _;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub struct YtDlpResolver {
    http: reqwest::Client,
    caption_lang: String,
}

/// The subset of the extractor's JSON dump the resolver consumes.
///
/// Caption maps are `BTreeMap` so "first matching language key" is
/// deterministic regardless of the extractor's emission order.
#[derive(Debug, Deserialize)]
struct ExtractorManifest {
    title: Option<String>,
    description: Option<String>,
    /// Manually authored caption tracks, keyed by language tag.
    #[serde(default)]
    subtitles: BTreeMap<String, Vec<CaptionFormat>>,
    /// Auto-generated caption tracks, same shape.
    #[serde(default)]
    automatic_captions: BTreeMap<String, Vec<CaptionFormat>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptionFormat {
    ext: Option<String>,
    url: Option<String>,
}

/// json3 caption payload: a flat event list whose segments carry their own
/// spacing, so concatenation must not insert separators.
#[derive(Debug, Deserialize)]
struct Json3Track {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

impl YtDlpResolver {
    pub fn new(caption_lang: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            caption_lang: caption_lang.to_string(),
        })
    }

    /// Run the extractor and parse its JSON dump.
    async fn fetch_manifest(&self, url: &str) -> Result<ExtractorManifest, ResolveError> {
        let output = Command::new("yt-dlp")
            .args(["-J", "--skip-download", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ResolveError::Extractor(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Extractor(stderr.trim().to_string()));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Fetch the selected caption track and flatten it to plain text.
    /// Failures degrade to an empty transcript rather than propagating.
    async fn fetch_track_text(&self, format: &CaptionFormat) -> String {
        let Some(url) = format.url.as_deref() else {
            return String::new();
        };

        let payload = match self.http.get(url).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => response.text().await.unwrap_or_default(),
                Err(error) => {
                    tracing::warn!(%error, "caption track returned error status");
                    return String::new();
                }
            },
            Err(error) => {
                tracing::warn!(%error, "failed to fetch caption track");
                return String::new();
            }
        };

        if format.ext.as_deref() == Some("json3") {
            flatten_json3(&payload)
        } else {
            payload
        }
    }
}

#[async_trait::async_trait]
impl Resolve for YtDlpResolver {
    async fn resolve(&self, reference: &VideoReference) -> Result<VideoRecord, ResolveError> {
        let manifest = self.fetch_manifest(&reference.url).await?;

        let title = manifest.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.into());
        let description = manifest
            .description
            .clone()
            .unwrap_or_else(|| NO_DESCRIPTION.into());
        let repo_links = links::extract_repo_links(&description);

        let transcript = match select_caption_track(&manifest, &self.caption_lang) {
            Some(format) => self.fetch_track_text(format).await,
            None => {
                tracing::info!(url = %reference.url, "no caption track for configured language");
                String::new()
            }
        };

        Ok(VideoRecord {
            title,
            description,
            transcript,
            repo_links,
        })
    }
}

/// Pick the caption track to fetch: manual tracks before auto-generated
/// ones, first language key matching the configured prefix (so `en` accepts
/// `en-US`), and within the track a structured json3 format over anything
/// else.
fn select_caption_track<'a>(
    manifest: &'a ExtractorManifest,
    lang_prefix: &str,
) -> Option<&'a CaptionFormat> {
    [&manifest.subtitles, &manifest.automatic_captions]
        .into_iter()
        .find_map(|tracks| {
            let (_, formats) = tracks
                .iter()
                .find(|(lang, _)| lang.starts_with(lang_prefix))?;
            formats
                .iter()
                .find(|f| f.ext.as_deref() == Some("json3"))
                .or_else(|| formats.first())
        })
}

/// Concatenate all segment texts in document order, no inserted separators.
fn flatten_json3(payload: &str) -> String {
    let track: Json3Track = match serde_json::from_str(payload) {
        Ok(track) => track,
        Err(error) => {
            tracing::warn!(%error, "caption payload was not valid json3");
            return String::new();
        }
    };

    track
        .events
        .iter()
        .flat_map(|event| event.segs.iter())
        .map(|seg| seg.utf8.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn manifest_from(json: &str) -> ExtractorManifest {
        serde_json::from_str(json).expect("fixture should parse")
    }

    const MANIFEST: &str = indoc! {r#"
        {
          "title": "Trending GitHub Repos This Week",
          "description": "Code at https://github.com/acme/widget",
          "subtitles": {
            "en-US": [
              {"ext": "vtt", "url": "https://captions.test/en.vtt"},
              {"ext": "json3", "url": "https://captions.test/en.json3"}
            ]
          },
          "automatic_captions": {
            "en": [
              {"ext": "json3", "url": "https://captions.test/auto.json3"}
            ]
          }
        }
    "#};

    #[test]
    fn test_manual_track_preferred_over_auto() {
        let manifest = manifest_from(MANIFEST);
        let format = select_caption_track(&manifest, "en").expect("track should match");
        assert_eq!(format.url.as_deref(), Some("https://captions.test/en.json3"));
    }

    #[test]
    fn test_language_prefix_tolerates_regional_suffix() {
        let manifest = manifest_from(
            r#"{"subtitles": {"pt-BR": [{"ext": "json3", "url": "https://captions.test/pt.json3"}]}}"#,
        );
        assert!(select_caption_track(&manifest, "pt").is_some());
        assert!(select_caption_track(&manifest, "en").is_none());
    }

    #[test]
    fn test_json3_format_preferred_within_track() {
        let manifest = manifest_from(
            r#"{"subtitles": {"en": [
                {"ext": "srv1", "url": "https://captions.test/a"},
                {"ext": "json3", "url": "https://captions.test/b"}
            ]}}"#,
        );
        let format = select_caption_track(&manifest, "en").expect("track should match");
        assert_eq!(format.ext.as_deref(), Some("json3"));
    }

    #[test]
    fn test_first_format_when_no_json3() {
        let manifest = manifest_from(
            r#"{"subtitles": {"en": [
                {"ext": "vtt", "url": "https://captions.test/a"},
                {"ext": "srv1", "url": "https://captions.test/b"}
            ]}}"#,
        );
        let format = select_caption_track(&manifest, "en").expect("track should match");
        assert_eq!(format.url.as_deref(), Some("https://captions.test/a"));
    }

    #[test]
    fn test_no_captions_at_all() {
        let manifest = manifest_from(r#"{"title": "t"}"#);
        assert!(select_caption_track(&manifest, "en").is_none());
    }

    #[test]
    fn test_flatten_json3_preserves_order_without_separators() {
        let payload = indoc! {r#"
            {
              "events": [
                {"segs": [{"utf8": "never gonna "}, {"utf8": "give"}]},
                {"segs": [{"utf8": " you up"}]}
              ]
            }
        "#};
        assert_eq!(flatten_json3(payload), "never gonna give you up");
    }

    #[test]
    fn test_flatten_json3_tolerates_eventless_payload() {
        assert_eq!(flatten_json3(r#"{"events": [{}]}"#), "");
        assert_eq!(flatten_json3("not json"), "");
    }
}
