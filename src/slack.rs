//! Slack channel client using slack-morphism.
//!
//! Thin wrapper over the four API calls the batch loop needs: `auth.test`
//! for the bot's own identity, `conversations.history` for the scan window,
//! `conversations.replies` for the dedup check, and `chat.postMessage` for
//! the threaded digest reply. Wire types are converted into the crate's
//! [`ChannelMessage`] / [`ThreadReply`] at this boundary.

use crate::batch::ChannelApi;
use crate::error::SlackError;
use crate::{ChannelMessage, ThreadReply};

use anyhow::Context as _;
use slack_morphism::prelude::*;
use std::sync::Arc;

/// Slack channel client bound to one channel.
pub struct SlackChannelClient {
    /// Shared HTTP client — constructed once, reused across all API calls.
    /// Holds a hyper connection pool internally.
    client: Arc<SlackHyperClient>,
    /// Pre-built API token wrapping the bot token. Created once alongside
    /// `client`.
    token: SlackApiToken,
    channel: SlackChannelId,
}

impl SlackChannelClient {
    pub fn new(
        bot_token: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("failed to create slack HTTP connector")?,
        ));
        let token = SlackApiToken::new(SlackApiTokenValue(bot_token.into()));
        Ok(Self {
            client,
            token,
            channel: SlackChannelId(channel_id.into()),
        })
    }

    /// Open a session against the cached client using the cached bot token.
    fn session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.token)
    }

    /// Resolve the bot's own user id via `auth.test`.
    pub async fn resolve_own_identity(&self) -> Result<String, SlackError> {
        let auth_response = self
            .session()
            .auth_test()
            .await
            .map_err(|e| SlackError::Identity(e.to_string()))?;
        let bot_user_id = auth_response.user_id.0;
        tracing::info!(bot_user_id = %bot_user_id, "slack bot user id resolved");
        Ok(bot_user_id)
    }

    /// Fetch the most recent `limit` channel messages.
    ///
    /// Slack returns newest-first and the batch loop depends on exactly that
    /// order for its early-stop guarantee, so no reordering happens here.
    pub async fn fetch_history(&self, limit: u16) -> Result<Vec<ChannelMessage>, SlackError> {
        let req = SlackApiConversationsHistoryRequest::new()
            .with_channel(self.channel.clone())
            .with_limit(limit);
        let messages = self
            .session()
            .conversations_history(&req)
            .await
            .map_err(|e| SlackError::History(e.to_string()))?
            .messages;

        let result: Vec<ChannelMessage> = messages
            .into_iter()
            .map(|msg| ChannelMessage {
                ts: msg.origin.ts.0.clone(),
                author: msg.sender.user.as_ref().map(|u| u.0.clone()),
                text: msg.content.text.clone().unwrap_or_default(),
                thread_ts: msg.origin.thread_ts.as_ref().map(|t| t.0.clone()),
            })
            .collect();

        tracing::info!(
            count = result.len(),
            channel_id = %self.channel.0,
            "fetched slack channel history"
        );

        Ok(result)
    }

    /// Fetch every reply in the thread rooted at `thread_ts`.
    pub async fn fetch_thread_replies(
        &self,
        thread_ts: &str,
    ) -> Result<Vec<ThreadReply>, SlackError> {
        let req = SlackApiConversationsRepliesRequest::new(
            self.channel.clone(),
            SlackTs(thread_ts.to_string()),
        );
        let messages = self
            .session()
            .conversations_replies(&req)
            .await
            .map_err(|e| SlackError::Replies {
                thread_ts: thread_ts.to_string(),
                source: anyhow::anyhow!(e.to_string()),
            })?
            .messages;

        Ok(messages
            .into_iter()
            .map(|msg| ThreadReply {
                author: msg.sender.user.as_ref().map(|u| u.0.clone()),
                text: msg.content.text.clone().unwrap_or_default(),
            })
            .collect())
    }

    /// Post `text` as a reply in the thread anchored at `thread_ts`.
    pub async fn post_reply(&self, thread_ts: &str, text: &str) -> Result<(), SlackError> {
        let req = SlackApiChatPostMessageRequest::new(
            self.channel.clone(),
            SlackMessageContent::new().with_text(text.to_string()),
        )
        .opt_thread_ts(Some(SlackTs(thread_ts.to_string())));

        self.session()
            .chat_post_message(&req)
            .await
            .map_err(|e| SlackError::Post {
                thread_ts: thread_ts.to_string(),
                source: anyhow::anyhow!(e.to_string()),
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ChannelApi for SlackChannelClient {
    async fn resolve_own_identity(&self) -> Result<String, SlackError> {
        SlackChannelClient::resolve_own_identity(self).await
    }

    async fn fetch_history(&self, limit: u16) -> Result<Vec<ChannelMessage>, SlackError> {
        SlackChannelClient::fetch_history(self, limit).await
    }

    async fn fetch_thread_replies(
        &self,
        thread_ts: &str,
    ) -> Result<Vec<ThreadReply>, SlackError> {
        SlackChannelClient::fetch_thread_replies(self, thread_ts).await
    }

    async fn post_reply(&self, thread_ts: &str, text: &str) -> Result<(), SlackError> {
        SlackChannelClient::post_reply(self, thread_ts, text).await
    }
}
