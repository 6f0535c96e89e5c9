//! Digest generation: fixed persona prompt + one Gemini completion call.

use crate::config::Config;
use crate::error::LlmError;
use crate::video::VideoRecord;

use rig::completion::Prompt as _;
use rig::providers::gemini;

/// Marker embedded in the prompt when the description carried no repo link.
const NO_REPO_LINK: &str = "N/A";

/// Generates digests through the Gemini API.
///
/// Construction never fails: a missing API key is carried as `None` and
/// surfaces as a [`LlmError::MissingApiKey`] at generation time, so the
/// failure is visible in-channel instead of aborting the batch up front.
pub struct DigestGenerator {
    client: Option<gemini::Client>,
    model: String,
    transcript_char_cap: usize,
}

/// Digest generation capability; the batch loop depends on this seam.
#[async_trait::async_trait]
pub trait GenerateDigest: Send + Sync {
    async fn generate(
        &self,
        record: &VideoRecord,
        repo_link: Option<&str>,
    ) -> Result<String, LlmError>;
}

impl DigestGenerator {
    pub fn new(config: &Config) -> Self {
        let client = config
            .gemini_api_key
            .as_deref()
            .map(gemini::Client::new);
        Self {
            client,
            model: config.model.clone(),
            transcript_char_cap: config.transcript_char_cap,
        }
    }

    fn build_prompt(&self, record: &VideoRecord, repo_link: Option<&str>) -> String {
        let repo_link = repo_link.unwrap_or(NO_REPO_LINK);
        let transcript = truncate_chars(&record.transcript, self.transcript_char_cap);

        format!(
            r#"You are a senior QA Engineer and GitHub trends analyst, expert in API testing, automation, and SRE.

Analyze the following GitHub-trends YouTube video and return a SHORT, SLACK-FRIENDLY message.

User context: Mid-senior QA at a sportsbook platform, building ReportPortal visualizers, Slack workflows, and IoT smart locks.

VIDEO META
Title: {title}
Repo URL: {repo_link}
Description: {description}

TRANSCRIPT (TRUNCATED)
{transcript}

FORMAT YOUR ANSWER EXACTLY LIKE THIS (INCLUDING BLANK LINES):

*Summary*
[1-2 sentences max. No line breaks here.]

*Key Takeaways & QA*
- [Bullet 1 - max 1 line]
- [Bullet 2 - max 1 line]
- [Bullet 3 - max 1 line]

*Project Ideas*
1. **Work repo automation:** [one sentence, focus on CI/CD, API testing, k6, ReportPortal]
2. **Personal IoT:** [one sentence, focus side projects]

*GitHub repo link*
{repo_link}

RULES
- Max 180 words total.
- Add a blank line between sections.
- Do NOT merge sections together; each heading must be followed by its own content and then a blank line.
- Use only top-3, most actionable ideas for this specific user.
"#,
            title = record.title,
            description = record.description,
        )
    }
}

#[async_trait::async_trait]
impl GenerateDigest for DigestGenerator {
    async fn generate(
        &self,
        record: &VideoRecord,
        repo_link: Option<&str>,
    ) -> Result<String, LlmError> {
        let client = self.client.as_ref().ok_or(LlmError::MissingApiKey)?;
        let prompt = self.build_prompt(record, repo_link);

        tracing::debug!(
            prompt_length = prompt.len(),
            model = %self.model,
            "calling generation API"
        );

        let agent = client.agent(&self.model).build();
        let response = agent
            .prompt(&prompt)
            .await
            .map_err(|e| LlmError::Completion(e.to_string()))?;

        tracing::info!(
            response_length = response.len(),
            model = %self.model,
            "digest generated"
        );

        Ok(response)
    }
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _character)) => &text[..byte_index],
        None => text,
    }
}
