//! Batch orchestration: the scan → dedup → resolve → generate → post loop.
//!
//! One run walks a bounded window of recent channel messages newest-first.
//! Finding a thread the bot already replied in stops the whole batch, since
//! processing is monotonic from newest to oldest every run — everything
//! older has necessarily been handled. All other per-candidate failures
//! skip that candidate and continue the scan.

use crate::config::Config;
use crate::digest::GenerateDigest;
use crate::error::{Error, SlackError};
use crate::links;
use crate::video::Resolve;
use crate::{ChannelMessage, ThreadReply};

use std::time::Duration;

/// Chat-platform capability the batch loop depends on.
///
/// [`crate::slack::SlackChannelClient`] is the production implementation;
/// tests drive the loop with an in-memory fake.
#[async_trait::async_trait]
pub trait ChannelApi: Send + Sync {
    async fn resolve_own_identity(&self) -> Result<String, SlackError>;
    async fn fetch_history(&self, limit: u16) -> Result<Vec<ChannelMessage>, SlackError>;
    async fn fetch_thread_replies(&self, thread_ts: &str)
    -> Result<Vec<ThreadReply>, SlackError>;
    async fn post_reply(&self, thread_ts: &str, text: &str) -> Result<(), SlackError>;
}

/// How a batch run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The scan hit an already-replied thread and stopped at that message.
    Stopped { at_ts: String, replied: usize },
    /// The scan exhausted the history window.
    WindowExhausted { replied: usize },
}

pub struct BatchRunner {
    chat: Box<dyn ChannelApi>,
    resolver: Box<dyn Resolve>,
    generator: Box<dyn GenerateDigest>,
    history_limit: u16,
    inter_message_delay: Duration,
    dry_run: bool,
}

impl BatchRunner {
    pub fn new(
        config: &Config,
        chat: Box<dyn ChannelApi>,
        resolver: Box<dyn Resolve>,
        generator: Box<dyn GenerateDigest>,
    ) -> Self {
        Self {
            chat,
            resolver,
            generator,
            history_limit: config.history_limit,
            inter_message_delay: Duration::from_secs(config.inter_message_delay_secs),
            dry_run: false,
        }
    }

    /// Skip the posting step; everything else runs normally.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute one batch run to its stop condition or window exhaustion.
    ///
    /// Identity and history failures are fatal; everything downstream is
    /// per-candidate.
    pub async fn run(&self) -> Result<BatchOutcome, Error> {
        let own_id = self.chat.resolve_own_identity().await?;
        let messages = self.chat.fetch_history(self.history_limit).await?;
        tracing::info!(count = messages.len(), "scanning channel history");

        let mut replied = 0usize;

        for message in &messages {
            let Some(reference) = links::extract_video_reference(&message.text) else {
                continue;
            };
            tracing::info!(ts = %message.ts, url = %reference.url, "found video link");

            let replies = match self.chat.fetch_thread_replies(message.thread_root()).await {
                Ok(replies) => replies,
                Err(error) => {
                    tracing::warn!(%error, ts = %message.ts, "dedup check failed, skipping");
                    continue;
                }
            };

            if already_replied(&replies, &own_id) {
                tracing::info!(ts = %message.ts, "found an already-processed video, stopping");
                return Ok(BatchOutcome::Stopped {
                    at_ts: message.ts.clone(),
                    replied,
                });
            }

            let record = match self.resolver.resolve(&reference).await {
                Ok(record) => record,
                Err(error) => {
                    tracing::warn!(%error, ts = %message.ts, "could not resolve video, skipping");
                    continue;
                }
            };

            if record.title.is_empty() || !record.has_transcript() {
                tracing::info!(ts = %message.ts, "no transcript available, skipping");
                continue;
            }

            let digest = match self.generator.generate(&record, record.repo_link()).await {
                Ok(digest) => digest,
                // Degraded but visible: the failure is posted in-channel
                // instead of silently dropping the candidate.
                Err(error) => format!("Error generating AI analysis: {error}"),
            };

            if self.dry_run {
                tracing::info!(ts = %message.ts, chars = digest.len(), "dry run, not posting");
            } else if let Err(error) = self.chat.post_reply(&message.ts, &digest).await {
                tracing::warn!(%error, ts = %message.ts, "failed to post reply");
            }

            replied += 1;
            tokio::time::sleep(self.inter_message_delay).await;
        }

        Ok(BatchOutcome::WindowExhausted { replied })
    }
}

/// The dedup decision: has this bot already replied in the thread?
fn already_replied(replies: &[ThreadReply], own_id: &str) -> bool {
    replies
        .iter()
        .any(|reply| reply.author.as_deref() == Some(own_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverKind;
    use crate::error::{LlmError, ResolveError};
    use crate::video::{Resolve, VideoRecord, VideoReference};

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const BOT_ID: &str = "UBOT";

    fn test_config() -> Config {
        Config {
            slack_bot_token: "xoxb-test".into(),
            slack_channel_id: "C0TEST".into(),
            gemini_api_key: None,
            model: "gemini-2.5-flash".into(),
            caption_lang: "en".into(),
            transcript_char_cap: 25_000,
            inter_message_delay_secs: 0,
            history_limit: 20,
            resolver: ResolverKind::Scrape,
        }
    }

    /// Slack history is newest-first, so `ts` decreases with window position.
    fn ts_at(index: usize) -> String {
        format!("1700000000.{:06}", 999_000 - index)
    }

    fn video_message(index: usize) -> ChannelMessage {
        ChannelMessage {
            ts: ts_at(index),
            author: Some("U123".into()),
            text: format!("look https://youtu.be/dQw4w9WgXc{} wow", index % 10),
            thread_ts: None,
        }
    }

    fn chatter_message(index: usize) -> ChannelMessage {
        ChannelMessage {
            ts: ts_at(index),
            author: Some("U123".into()),
            text: "no links here".into(),
            thread_ts: None,
        }
    }

    /// In-memory chat fake: serves a fixed history, marks listed threads as
    /// already replied-to by the bot, records posts. Shared handles stay
    /// valid after the fake is boxed into the runner.
    struct FakeChat {
        history: Vec<ChannelMessage>,
        replied_threads: Vec<String>,
        failing_threads: Vec<String>,
        posts: Arc<Mutex<Vec<(String, String)>>>,
        replies_fetched: Arc<AtomicUsize>,
    }

    impl FakeChat {
        fn new(history: Vec<ChannelMessage>) -> Self {
            Self {
                history,
                replied_threads: Vec::new(),
                failing_threads: Vec::new(),
                posts: Arc::new(Mutex::new(Vec::new())),
                replies_fetched: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_replied(mut self, threads: &[&str]) -> Self {
            self.replied_threads = threads.iter().map(|t| t.to_string()).collect();
            self
        }

        fn with_failing(mut self, threads: &[&str]) -> Self {
            self.failing_threads = threads.iter().map(|t| t.to_string()).collect();
            self
        }
    }

    #[async_trait::async_trait]
    impl ChannelApi for FakeChat {
        async fn resolve_own_identity(&self) -> Result<String, SlackError> {
            Ok(BOT_ID.into())
        }

        async fn fetch_history(&self, limit: u16) -> Result<Vec<ChannelMessage>, SlackError> {
            Ok(self.history.iter().take(limit as usize).cloned().collect())
        }

        async fn fetch_thread_replies(
            &self,
            thread_ts: &str,
        ) -> Result<Vec<ThreadReply>, SlackError> {
            self.replies_fetched.fetch_add(1, Ordering::SeqCst);
            if self.failing_threads.iter().any(|t| t == thread_ts) {
                return Err(SlackError::Replies {
                    thread_ts: thread_ts.to_string(),
                    source: anyhow::anyhow!("simulated outage"),
                });
            }
            if self.replied_threads.iter().any(|t| t == thread_ts) {
                return Ok(vec![ThreadReply {
                    author: Some(BOT_ID.into()),
                    text: "*Summary* ...".into(),
                }]);
            }
            Ok(vec![])
        }

        async fn post_reply(&self, thread_ts: &str, text: &str) -> Result<(), SlackError> {
            self.posts
                .lock()
                .unwrap()
                .push((thread_ts.to_string(), text.to_string()));
            Ok(())
        }
    }

    /// Resolver fake returning a fixed record; `empty_transcript` simulates
    /// videos without captions.
    struct FakeResolver {
        empty_transcript: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FakeResolver {
        fn new() -> Self {
            Self {
                empty_transcript: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn without_captions() -> Self {
            Self {
                empty_transcript: true,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait::async_trait]
    impl Resolve for FakeResolver {
        async fn resolve(
            &self,
            _reference: &VideoReference,
        ) -> Result<VideoRecord, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(VideoRecord {
                title: "Widget Deep Dive".into(),
                description: "see https://github.com/acme/widget".into(),
                transcript: if self.empty_transcript {
                    String::new()
                } else {
                    "hello world".into()
                },
                repo_links: vec!["https://github.com/acme/widget".into()],
            })
        }
    }

    struct FakeGenerator {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl GenerateDigest for FakeGenerator {
        async fn generate(
            &self,
            record: &VideoRecord,
            repo_link: Option<&str>,
        ) -> Result<String, LlmError> {
            if self.fail {
                return Err(LlmError::Completion("simulated".into()));
            }
            Ok(format!(
                "*Summary* {} / {}",
                record.title,
                repo_link.unwrap_or("N/A")
            ))
        }
    }

    fn runner(chat: FakeChat, resolver: FakeResolver, fail_generation: bool) -> BatchRunner {
        BatchRunner::new(
            &test_config(),
            Box::new(chat),
            Box::new(resolver),
            Box::new(FakeGenerator {
                fail: fail_generation,
            }),
        )
    }

    #[tokio::test]
    async fn test_messages_without_links_never_reach_dedup_or_resolver() {
        let history: Vec<ChannelMessage> = (0..5).map(chatter_message).collect();
        let chat = FakeChat::new(history);
        let resolver = FakeResolver::new();

        // Clone the shared counters before the fakes are boxed away.
        let resolver_calls = resolver.calls.clone();
        let replies_fetched = chat.replies_fetched.clone();

        let outcome = runner(chat, resolver, false).run().await.expect("run ok");

        assert_eq!(outcome, BatchOutcome::WindowExhausted { replied: 0 });
        assert_eq!(replies_fetched.load(Ordering::SeqCst), 0);
        assert_eq!(resolver_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_at_first_replied_thread() {
        // Newest-first window of 20 video messages; position 5 already has
        // a bot reply. Positions 0-4 get replies; 6-19 are never examined.
        let history: Vec<ChannelMessage> = (0..20).map(video_message).collect();
        let replied_ts = history[5].ts.clone();
        let chat = FakeChat::new(history.clone()).with_replied(&[replied_ts.as_str()]);

        let posts = chat.posts.clone();
        let replies_fetched = chat.replies_fetched.clone();

        let outcome = runner(chat, FakeResolver::new(), false)
            .run()
            .await
            .expect("run ok");

        assert_eq!(
            outcome,
            BatchOutcome::Stopped {
                at_ts: replied_ts,
                replied: 5
            }
        );
        let posted = posts.lock().unwrap();
        assert_eq!(posted.len(), 5);
        let posted_ts: Vec<&str> = posted.iter().map(|(ts, _)| ts.as_str()).collect();
        let expected: Vec<&str> = history[..5].iter().map(|m| m.ts.as_str()).collect();
        assert_eq!(posted_ts, expected);
        // Positions 0-5 were dedup-checked, 6-19 never were.
        assert_eq!(replies_fetched.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_second_run_posts_nothing() {
        // Idempotence: if the newest video message's thread now carries the
        // bot reply, a re-run stops immediately with zero posts.
        let history: Vec<ChannelMessage> = (0..3).map(video_message).collect();
        let newest_ts = history[0].ts.clone();
        let chat = FakeChat::new(history).with_replied(&[newest_ts.as_str()]);
        let posts = chat.posts.clone();

        let outcome = runner(chat, FakeResolver::new(), false)
            .run()
            .await
            .expect("run ok");

        assert_eq!(
            outcome,
            BatchOutcome::Stopped {
                at_ts: newest_ts,
                replied: 0
            }
        );
        assert!(posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dedup_fetch_failure_skips_instead_of_stopping() {
        let history: Vec<ChannelMessage> = (0..2).map(video_message).collect();
        let failing_ts = history[0].ts.clone();
        let chat = FakeChat::new(history.clone()).with_failing(&[failing_ts.as_str()]);
        let posts = chat.posts.clone();

        let outcome = runner(chat, FakeResolver::new(), false)
            .run()
            .await
            .expect("run ok");

        // The failing candidate is skipped; the older one still processes.
        assert_eq!(outcome, BatchOutcome::WindowExhausted { replied: 1 });
        let posted = posts.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, history[1].ts);
    }

    #[tokio::test]
    async fn test_missing_transcript_skips_without_posting() {
        let history = vec![video_message(0), video_message(1)];
        let chat = FakeChat::new(history);
        let posts = chat.posts.clone();

        let outcome = runner(chat, FakeResolver::without_captions(), false)
            .run()
            .await
            .expect("run ok");

        assert_eq!(outcome, BatchOutcome::WindowExhausted { replied: 0 });
        assert!(posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_posted_visibly() {
        let history = vec![video_message(0)];
        let chat = FakeChat::new(history);
        let posts = chat.posts.clone();

        let outcome = runner(chat, FakeResolver::new(), true)
            .run()
            .await
            .expect("run ok");

        assert_eq!(outcome, BatchOutcome::WindowExhausted { replied: 1 });
        let posted = posts.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].1.starts_with("Error generating AI analysis:"));
    }

    #[test]
    fn test_already_replied_decision() {
        let own = |author: &str| ThreadReply {
            author: Some(author.into()),
            text: "text".into(),
        };
        assert!(already_replied(&[own("U1"), own(BOT_ID)], BOT_ID));
        assert!(!already_replied(&[own("U1"), own("U2")], BOT_ID));
        assert!(!already_replied(&[], BOT_ID));
        // Authorless (system) replies never match.
        assert!(!already_replied(
            &[ThreadReply {
                author: None,
                text: "joined".into()
            }],
            BOT_ID
        ));
    }
}
