//! Conversation summarization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use pulldown_cmark::{Options, Parser, html};
use tracing::{debug, info};

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::sources::Conversation;

pub const SUMMARY_SYSTEM_PROMPT: &str = "\
Summary instructions:
- You are a helpful assistant that summarizes conversations in chat messages.
- You will be given a conversation and you will need to summarize it very concisely.
- Focus and list out key points, decisions made, and tasks assigned.
- Present the summary in a nice Markdown format.
- The format of the output should be:
** Key Points **
* key point 1
* key point 2
* ...

** Decisions Made **
* decision 1
* decision 2
* ...

** Tasks Assigned **
* task assignment 1
* task assignment 2
* ...
";

/// Returned instead of calling the model when there is nothing to summarize.
pub const EMPTY_SUMMARY: &str = "**No messages found** in the selected time range.";

pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Markdown summary of a raw transcript. One call, no retries.
    pub async fn summarize(&self, transcript: &str) -> Result<String, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(transcript),
        ]);
        let response = self.llm.complete(request).await?;
        info!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Summary generated"
        );
        Ok(response.content)
    }

    /// Summarize a conversation; an empty one yields [`EMPTY_SUMMARY`].
    pub async fn summarize_conversation(&self, conversation: &Conversation) -> Result<String, LlmError> {
        if conversation.is_empty() {
            debug!("Empty conversation, skipping model call");
            return Ok(EMPTY_SUMMARY.to_string());
        }
        self.summarize(&conversation.to_transcript()).await
    }
}

/// Markdown → HTML for the dashboard.
pub fn render_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Write `summary_<channel>_<YYYYMMDD_HHMMSS>.md` under `dir`.
pub async fn save_summary(dir: &Path, channel_id: &str, markdown: &str) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let safe_id: String = channel_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let path = dir.join(format!("summary_{safe_id}_{stamp}.md"));
    tokio::fs::write(&path, markdown).await?;
    info!(path = %path.display(), "Summary saved");
    Ok(path)
}
