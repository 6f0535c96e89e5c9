//! Top-level error types for briefbot.
//!
//! The batch loop's failure policy is encoded in which enum a stage returns:
//! `ConfigError` and the identity/history variants of `SlackError` are fatal
//! to the run, `ResolveError` and the replies variant skip the candidate,
//! `LlmError` degrades into a visible in-channel error string, and post
//! failures are logged only.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Slack(#[from] SlackError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Slack API errors, one variant per operation the batch depends on.
#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("failed to resolve own bot identity: {0}")]
    Identity(String),

    #[error("failed to fetch channel history: {0}")]
    History(String),

    #[error("failed to fetch thread replies for {thread_ts}: {source}")]
    Replies {
        thread_ts: String,
        source: anyhow::Error,
    },

    #[error("failed to post reply to {thread_ts}: {source}")]
    Post {
        thread_ts: String,
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Video resolution errors. Any of these means "skip this candidate";
/// partial failures inside a strategy degrade to sentinel values instead.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("reference has no isolated video id and the strategy requires one")]
    MissingVideoId,

    #[error("extractor invocation failed: {0}")]
    Extractor(String),

    #[error("extractor output was not valid JSON: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// LLM generation errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("GEMINI_API_KEY not found")]
    MissingApiKey,

    #[error("digest generation failed: {0}")]
    Completion(String),
}
