//! Batch extraction of action items from saved summaries.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::grouping::{ActionsByClient, AllActions, organize_by_client};
use super::model::{ActionItem, RawAction};
use crate::error::ExtractError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

pub const ALL_ACTIONS_FILE: &str = "all_actions.json";
pub const ACTIONS_BY_CLIENT_FILE: &str = "actions_by_client.json";

pub const DEFAULT_CLIENT: &str = "TechCorp Solutions";

/// Keyword → client, checked in order against the lowercased summary.
pub const CLIENT_KEYWORDS: &[(&str, &str)] = &[
    ("workflow_approval", "TechCorp Solutions"),
    ("new_feature", "TechCorp Solutions"),
    ("approval_system", "TechCorp Solutions"),
    ("user_friendly", "TechCorp Solutions"),
    ("frustration", "TechCorp Solutions"),
    ("employees", "TechCorp Solutions"),
    ("guide", "TechCorp Solutions"),
    ("tutorial", "TechCorp Solutions"),
    ("support", "TechCorp Solutions"),
    ("training", "TechCorp Solutions"),
    ("user_testing", "TechCorp Solutions"),
    ("design", "TechCorp Solutions"),
    ("implementation", "TechCorp Solutions"),
    ("onboarding", "TechCorp Solutions"),
    ("account_manager", "TechCorp Solutions"),
    ("client", "TechCorp Solutions"),
    ("meeting", "TechCorp Solutions"),
    ("summary", "TechCorp Solutions"),
];

pub const EXTRACTION_PROMPT: &str = r#"
You are an expert customer success manager who manages client accounts. Given the following meeting summary, generate exactly three actionable items that the customer success team should take next to address client concerns and improve the client experience.
For each action, provide a short description and a brief reasoning for why it is important for client satisfaction and account retention.
Output the result as a JSON array, where each item is an object with 'action', 'reasoning', 'priority' (high/medium/low), and 'category' (support/training/documentation/design/communication) fields.

Meeting Summary:
"""
{summary}
"""

JSON:
"#;

static JSON_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// Client named by the first matching keyword, else [`DEFAULT_CLIENT`].
pub fn identify_client(summary: &str) -> &'static str {
    let lower = summary.to_lowercase();
    CLIENT_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, client)| *client)
        .unwrap_or(DEFAULT_CLIENT)
}

/// Recover the action array from a model reply. The widest `[...]` span is
/// tried first, then the whole reply.
pub fn parse_actions(response: &str) -> Option<Vec<RawAction>> {
    let trimmed = response.trim();
    let candidate = JSON_ARRAY
        .find(trimmed)
        .map(|m| m.as_str())
        .unwrap_or(trimmed);
    serde_json::from_str(candidate).ok()
}

/// `summary_*.md` and `summary_*.txt` under each directory, sorted by file
/// name. Missing directories are skipped.
pub async fn find_summary_files(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for dir in dirs {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Summary directory unavailable");
                continue;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if is_summary_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

fn is_summary_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with("summary_") && (name.ends_with(".md") || name.ends_with(".txt"))
}

/// Outcome of one extraction batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    pub files_found: usize,
    pub files_processed: usize,
    pub files_failed: Vec<String>,
    pub total_actions: usize,
    pub clients: Vec<String>,
    pub written: bool,
    #[serde(skip)]
    pub all_actions: AllActions,
    #[serde(skip)]
    pub by_client: ActionsByClient,
}

pub struct ActionExtractor {
    llm: Arc<dyn LlmProvider>,
    output_dir: PathBuf,
}

impl ActionExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            llm,
            output_dir: output_dir.into(),
        }
    }

    pub fn all_actions_path(&self) -> PathBuf {
        self.output_dir.join(ALL_ACTIONS_FILE)
    }

    pub fn by_client_path(&self) -> PathBuf {
        self.output_dir.join(ACTIONS_BY_CLIENT_FILE)
    }

    /// Extract actions from one summary file. Any failure is logged and
    /// yields `None`.
    pub async fn process_summary(&self, path: &Path) -> Option<Vec<ActionItem>> {
        let file_name = path.file_name()?.to_string_lossy().into_owned();

        let summary = match tokio::fs::read_to_string(path).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Failed to read summary");
                return None;
            }
        };

        let client = identify_client(&summary);
        debug!(file = %file_name, client, "Identified client");

        let prompt = EXTRACTION_PROMPT.replace("{summary}", &summary);
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)]);
        let content = match self.llm.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Action extraction call failed");
                return None;
            }
        };

        let Some(raw) = parse_actions(&content) else {
            warn!(file = %file_name, raw = %content, "Could not parse actions from model output");
            return None;
        };

        let generated_at = Utc::now();
        let items: Vec<ActionItem> = raw
            .into_iter()
            .map(|r| ActionItem::from_raw(r, client, &file_name, generated_at))
            .collect();
        info!(file = %file_name, client, count = items.len(), "Actions extracted");
        Some(items)
    }

    /// Process every summary file in `dirs` and write both artifacts if
    /// anything was produced.
    pub async fn run(&self, dirs: &[PathBuf]) -> Result<ExtractionReport, ExtractError> {
        let files = find_summary_files(dirs).await;
        let mut report = ExtractionReport {
            files_found: files.len(),
            ..Default::default()
        };
        if files.is_empty() {
            info!(dirs = ?dirs, "No summary files found");
            return Ok(report);
        }

        for path in &files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.process_summary(path).await {
                Some(items) if !items.is_empty() => {
                    report.files_processed += 1;
                    report.total_actions += items.len();
                    report.all_actions.insert(name, items);
                }
                _ => report.files_failed.push(name),
            }
        }

        report.by_client = organize_by_client(&report.all_actions);
        report.clients = report.by_client.keys().cloned().collect();

        if !report.all_actions.is_empty() {
            write_artifact(&self.all_actions_path(), &report.all_actions).await?;
            write_artifact(&self.by_client_path(), &report.by_client).await?;
            report.written = true;
        }

        info!(
            found = report.files_found,
            processed = report.files_processed,
            failed = report.files_failed.len(),
            actions = report.total_actions,
            "Action extraction finished"
        );
        Ok(report)
    }
}

async fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<(), ExtractError> {
    let write_err = |source| ExtractError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let body = serde_json::to_vec_pretty(value).map_err(|source| ExtractError::Artifact {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, body).await.map_err(write_err)?;
    debug!(path = %path.display(), "Artifact written");
    Ok(())
}

/// Load an artifact. `Ok(None)` when it has not been generated yet.
pub async fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ExtractError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ExtractError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| ExtractError::Artifact {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::actions::model::{Category, Priority};
    use crate::error::LlmError;
    use crate::llm::{CompletionResponse, FinishReason};

    /// Replies by matching a marker in the prompt; unknown prompts fail.
    struct ScriptedLlm {
        replies: Vec<(&'static str, &'static str)>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let prompt = request.messages[0].content.clone();
            self.prompts.lock().unwrap().push(prompt.clone());
            let reply = self
                .replies
                .iter()
                .find(|(marker, _)| prompt.contains(marker))
                .map(|(_, reply)| reply.to_string())
                .ok_or_else(|| LlmError::RequestFailed {
                    provider: "scripted".into(),
                    reason: "no reply".into(),
                })?;
            Ok(CompletionResponse {
                content: reply,
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    #[test]
    fn no_keyword_falls_back_to_default_client() {
        assert_eq!(identify_client("Quarterly numbers look fine."), DEFAULT_CLIENT);
        assert_eq!(identify_client("Discussed ONBOARDING"), "TechCorp Solutions");
    }

    #[test]
    fn array_is_recovered_from_prose() {
        let reply = "Here are the actions:\n[{\"action\": \"Write a guide\", \"reasoning\": \"Users are lost\", \"priority\": \"high\", \"category\": \"documentation\"}]\nLet me know!";
        let actions = parse_actions(reply).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, "Write a guide");
        assert_eq!(actions[0].priority, Some(Priority::High));
        assert_eq!(actions[0].category, Some(Category::Documentation));
    }

    #[test]
    fn unparseable_reply_is_none() {
        assert!(parse_actions("I cannot help with that.").is_none());
        assert!(parse_actions("[not, json]").is_none());
    }

    #[tokio::test]
    async fn summary_files_are_filtered_and_sorted() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        for (dir, name) in [
            (&a, "summary_b.md"),
            (&a, "notes.md"),
            (&b, "summary_a.txt"),
            (&b, "summary_c.json"),
        ] {
            tokio::fs::write(dir.path().join(name), "x").await.unwrap();
        }

        let files = find_summary_files(&[
            a.path().to_path_buf(),
            b.path().to_path_buf(),
            a.path().join("missing"),
        ])
        .await;
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["summary_a.txt", "summary_b.md"]);
    }

    #[tokio::test]
    async fn batch_continues_past_failures_and_writes_artifacts() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        tokio::fs::write(input.path().join("summary_1.md"), "GOOD onboarding call")
            .await
            .unwrap();
        tokio::fs::write(input.path().join("summary_2.md"), "PROSE only")
            .await
            .unwrap();
        tokio::fs::write(input.path().join("summary_3.md"), "DOWN model")
            .await
            .unwrap();
        tokio::fs::write(input.path().join("summary_4.txt"), "ALSO good, new vendor")
            .await
            .unwrap();

        let llm = Arc::new(ScriptedLlm {
            replies: vec![
                (
                    "GOOD",
                    r#"Sure! [{"action":"Schedule training","reasoning":"r","priority":"high","category":"training"},{"action":"Follow up","reasoning":"r"}]"#,
                ),
                ("PROSE", "Sorry, no JSON today."),
                (
                    "ALSO",
                    r#"[{"action":"Send notes","reasoning":"r","priority":"low","category":"communication"}]"#,
                ),
            ],
            prompts: Mutex::new(Vec::new()),
        });
        let extractor = ActionExtractor::new(llm.clone(), output.path().join("part2"));

        let report = extractor.run(&[input.path().to_path_buf()]).await.unwrap();

        assert_eq!(report.files_found, 4);
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.files_failed, vec!["summary_2.md", "summary_3.md"]);
        assert_eq!(report.total_actions, 3);
        assert!(report.written);
        assert_eq!(llm.prompts.lock().unwrap().len(), 4);

        let all: AllActions = read_artifact(&extractor.all_actions_path())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(all.len(), 2);
        let first = &all["summary_1.md"];
        assert_eq!(first[0].client, "TechCorp Solutions");
        assert_eq!(first[0].source_file, "summary_1.md");
        assert_eq!(first[1].priority, Priority::Medium);
        assert_eq!(first[1].category, Category::Support);

        let by_client: ActionsByClient = read_artifact(&extractor.by_client_path())
            .await
            .unwrap()
            .unwrap();
        let client = &by_client[DEFAULT_CLIENT];
        assert_eq!(client.client_info.total_actions, 3);
        assert_eq!(client.client_info.high_priority, 1);
        assert_eq!(client.client_info.medium_priority, 1);
        assert_eq!(client.client_info.low_priority, 1);
    }

    #[tokio::test]
    async fn nothing_extracted_writes_nothing() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        tokio::fs::write(input.path().join("summary_1.md"), "PROSE").await.unwrap();

        let llm = Arc::new(ScriptedLlm {
            replies: vec![("PROSE", "no json")],
            prompts: Mutex::new(Vec::new()),
        });
        let extractor = ActionExtractor::new(llm, output.path());
        let report = extractor.run(&[input.path().to_path_buf()]).await.unwrap();

        assert!(!report.written);
        assert!(
            read_artifact::<AllActions>(&extractor.all_actions_path())
                .await
                .unwrap()
                .is_none()
        );
    }
}
