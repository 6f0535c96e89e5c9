//! Link extraction: YouTube URLs out of message text, video ids out of
//! URLs, and GitHub repository links out of video descriptions.
//!
//! Pure functions, no network access.

use crate::video::VideoReference;
use regex::Regex;
use std::sync::LazyLock;

/// Matches both the short-link and canonical YouTube hosts.
static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(www\.)?(youtube\.com|youtu\.be)/[^\s>]+")
        .expect("video url pattern is valid")
});

/// Permissive 11-char id match, tolerant of surrounding path/query syntax
/// (`watch?v=ID`, `youtu.be/ID`, `/embed/ID?t=30`, ...).
static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("video id pattern is valid")
});

static REPO_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://github\.com/[^\s]+").expect("repo link pattern is valid")
});

/// First YouTube URL in the text, if any.
pub fn find_video_url(text: &str) -> Option<&str> {
    VIDEO_URL.find(text).map(|m| m.as_str())
}

/// Isolate the 11-character video id from a YouTube URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Produce a video reference from free-form message text.
///
/// When the id cannot be isolated the full URL is kept as the fallback
/// reference so a resolver that accepts raw URLs can still operate.
pub fn extract_video_reference(text: &str) -> Option<VideoReference> {
    let url = find_video_url(text)?;
    Some(VideoReference {
        url: url.to_string(),
        id: extract_video_id(url),
    })
}

/// Every GitHub URL in a video description, in order of appearance.
pub fn extract_repo_links(description: &str) -> Vec<String> {
    REPO_LINK
        .find_iter(description)
        .map(|m| m.as_str().to_string())
        .collect()
}
