//! briefbot: a Slack bot that digests YouTube links posted in a channel.
//!
//! Each run scans the most recent channel messages newest-first, resolves the
//! transcript and metadata for every YouTube link that hasn't been handled
//! yet, and posts a Gemini-written digest as a threaded reply. "Already
//! handled" is detected from live thread replies rather than a database.

pub mod batch;
pub mod config;
pub mod digest;
pub mod error;
pub mod links;
pub mod slack;
pub mod video;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};

/// One message from the channel's history, as the batch loop sees it.
///
/// `ts` is Slack's per-channel message id; it is monotonically increasing,
/// which is what makes the newest-first early-stop dedup sound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub ts: String,
    /// Author user id. Absent for system and some bot messages.
    pub author: Option<String>,
    pub text: String,
    /// Root `ts` of the thread this message belongs to, if it is threaded.
    pub thread_ts: Option<String>,
}

impl ChannelMessage {
    /// The thread root this message anchors: its own `ts` if it starts no
    /// thread, otherwise the recorded thread root.
    pub fn thread_root(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

/// One reply inside a thread, reduced to what the dedup check needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadReply {
    pub author: Option<String>,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_root_unthreaded_message_is_its_own_root() {
        let msg = ChannelMessage {
            ts: "1700000000.000100".into(),
            author: Some("U123".into()),
            text: "hello".into(),
            thread_ts: None,
        };
        assert_eq!(msg.thread_root(), "1700000000.000100");
    }

    #[test]
    fn test_thread_root_prefers_recorded_thread_ts() {
        let msg = ChannelMessage {
            ts: "1700000000.000200".into(),
            author: Some("U123".into()),
            text: "reply".into(),
            thread_ts: Some("1700000000.000100".into()),
        };
        assert_eq!(msg.thread_root(), "1700000000.000100");
    }
}
