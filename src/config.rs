//! Configuration loading and validation.
//!
//! Everything comes from the environment (a `.env` file is honored by the
//! binary before this runs). Credentials are required; tuning knobs have
//! defaults matching the production deployment.

use crate::error::ConfigError;

/// Which transcript-acquisition strategy the resolver uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    /// Watch-page scrape for metadata + caption API for the transcript.
    Scrape,
    /// `yt-dlp -J` manifest for metadata and caption track selection.
    YtDlp,
}

/// briefbot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Slack bot token (xoxb-...).
    pub slack_bot_token: String,

    /// Channel the batch scans and replies in.
    pub slack_channel_id: String,

    /// Gemini API key. Optional at load time so a missing key surfaces as a
    /// visible generation failure instead of preventing the scan.
    pub gemini_api_key: Option<String>,

    /// Model identifier passed to the generation API.
    pub model: String,

    /// Caption language preference; matched as a prefix so regional
    /// variants (`en-US`, `en-GB`) satisfy `en`.
    pub caption_lang: String,

    /// Hard cap on transcript characters embedded in the prompt.
    pub transcript_char_cap: usize,

    /// Delay between processed messages, in seconds.
    pub inter_message_delay_secs: u64,

    /// How many recent messages one batch run scans.
    pub history_limit: u16,

    /// Which resolver strategy to construct.
    pub resolver: ResolverKind,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let slack_bot_token =
            require_var("SLACK_BOT_TOKEN")?;
        let slack_channel_id =
            require_var("SLACK_CHANNEL_ID")?;
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let model = std::env::var("BRIEFBOT_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash".into());
        let caption_lang = std::env::var("BRIEFBOT_CAPTION_LANG")
            .unwrap_or_else(|_| "en".into());

        let transcript_char_cap =
            parse_var("BRIEFBOT_TRANSCRIPT_CAP", 25_000)?;
        let inter_message_delay_secs =
            parse_var("BRIEFBOT_DELAY_SECS", 2)?;
        let history_limit =
            parse_var("BRIEFBOT_HISTORY_LIMIT", 20)?;

        let resolver = match std::env::var("BRIEFBOT_RESOLVER").as_deref() {
            Err(_) | Ok("scrape") => ResolverKind::Scrape,
            Ok("ytdlp") => ResolverKind::YtDlp,
            Ok(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "BRIEFBOT_RESOLVER",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            slack_bot_token,
            slack_channel_id,
            gemini_api_key,
            model,
            caption_lang,
            transcript_char_cap,
            inter_message_delay_secs,
            history_limit,
            resolver,
        })
    }
}

fn require_var(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(key))
}

fn parse_var<T: std::str::FromStr>(
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw,
        }),
    }
}
