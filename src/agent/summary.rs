//! Final summarization of a run.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::Configuration;
use crate::llm::ModelClient;
use crate::memory::Message;
use crate::prompt::{self, render_template};

use super::{AgentContext, FileInfo};

/// Separator between the summary text and the delivered file names.
const FILE_LIST_SEPARATOR: &str = "$$$";

/// Summary of a run and the files it delivers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummaryResult {
    pub task_summary: String,
    pub files: Vec<FileInfo>,
}

/// One-shot agent that summarizes a finished run.
///
/// Never fails: a model error yields the configured failure summary.
pub struct SummaryAgent {
    context: Arc<AgentContext>,
    llm: Arc<dyn ModelClient>,
    system_prompt: String,
    message_size_limit: usize,
    failure_summary: String,
}

impl SummaryAgent {
    pub fn new(
        context: Arc<AgentContext>,
        llm: Arc<dyn ModelClient>,
        config: &Configuration,
    ) -> Self {
        let settings = &config.summary;
        Self {
            context,
            llm,
            system_prompt: settings
                .system_prompt
                .clone()
                .unwrap_or_else(|| prompt::SUMMARY_SYSTEM_PROMPT.to_string()),
            message_size_limit: settings.message_size_limit,
            failure_summary: settings.failure_summary.clone(),
        }
    }

    /// Summarize `messages` for `query`.
    ///
    /// # Arguments
    /// * `messages` - Memory of the agent that did the work.
    /// * `query` - The user's original request.
    pub async fn summarize(&self, messages: &[Message], query: &str) -> TaskSummaryResult {
        let request_id = self.context.request_id.as_str();
        if messages.is_empty() || query.is_empty() {
            warn!(request_id, "Nothing to summarize");
            return TaskSummaryResult::default();
        }

        let history: String = messages
            .iter()
            .map(|m| {
                let content: String = m.content.chars().take(self.message_size_limit).collect();
                format!("role:{} content:{}\n", m.role, content)
            })
            .collect();
        let prompt = render_template(
            &self.system_prompt,
            &[
                ("taskHistory", history.as_str()),
                ("fileNameDesc", self.file_descriptions().as_str()),
                ("query", query),
            ],
        );

        match self
            .llm
            .ask(request_id, vec![Message::user(prompt, None)], None, Some(0.01))
            .await
        {
            Ok(answer) => {
                info!(request_id, "Summary: {}", answer);
                self.parse_answer(&answer)
            }
            Err(e) => {
                error!(request_id, "Summarization failed: {:#}", e);
                self.context
                    .log(|l| l.log_error(&format!("Summarization failed: {:#}", e), None));
                TaskSummaryResult {
                    task_summary: self.failure_summary.clone(),
                    files: Vec::new(),
                }
            }
        }
    }

    /// Summarize and build the terminal `result` payload.
    ///
    /// When the summary names no files, every user-visible product file is
    /// delivered, most recent first.
    pub async fn result_payload(&self, messages: &[Message], query: &str) -> Value {
        let summary = self.summarize(messages, query).await;
        let files = if summary.files.is_empty() {
            self.context
                .product_files()
                .into_iter()
                .rev()
                .filter(|f| !f.is_internal)
                .collect()
        } else {
            summary.files
        };
        json!({ "taskSummary": summary.task_summary, "fileList": files })
    }

    fn file_descriptions(&self) -> String {
        self.context
            .product_files()
            .iter()
            .filter(|f| !f.is_internal)
            .map(|f| format!("{} : {}", f.file_name, f.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Split `summary$$$file names` and match the names to product files.
    fn parse_answer(&self, answer: &str) -> TaskSummaryResult {
        let Some((summary, names)) = answer.split_once(FILE_LIST_SEPARATOR) else {
            return TaskSummaryResult {
                task_summary: answer.to_string(),
                files: Vec::new(),
            };
        };

        let mut candidates = self.context.product_files();
        candidates.reverse();

        let files = names
            .split(|c: char| matches!(c, ',' | '、' | '\n'))
            .filter(|item| !item.trim().is_empty())
            .filter_map(|item| {
                candidates
                    .iter()
                    .find(|f| item.contains(f.file_name.trim()))
                    .cloned()
            })
            .collect();

        TaskSummaryResult {
            task_summary: summary.to_string(),
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, ScriptedModel};
    use super::*;

    fn summary_agent(model: Arc<ScriptedModel>) -> (SummaryAgent, Arc<AgentContext>) {
        let ctx = Arc::new(context());
        ctx.add_product_file(FileInfo::new("data.csv", "Raw data"));
        ctx.add_product_file(FileInfo::new("search.json", "Search hits").internal());
        ctx.add_product_file(FileInfo::new("report.md", "Final report"));
        let agent = SummaryAgent::new(ctx.clone(), model, &Configuration::default());
        (agent, ctx)
    }

    fn history() -> Vec<Message> {
        vec![
            Message::user("write a report", None),
            Message::assistant("done", None),
        ]
    }

    #[tokio::test]
    async fn test_summary_with_named_files() {
        let model = Arc::new(ScriptedModel::new());
        model.push_answer(Ok("Report written.$$$report.md, data.csv".to_string()));
        let (agent, _ctx) = summary_agent(model);

        let result = agent.summarize(&history(), "write a report").await;

        assert_eq!(result.task_summary, "Report written.");
        let names: Vec<&str> = result.files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["report.md", "data.csv"]);
    }

    #[tokio::test]
    async fn test_summary_without_separator() {
        let model = Arc::new(ScriptedModel::new());
        model.push_answer(Ok("Just text".to_string()));
        let (agent, _ctx) = summary_agent(model);

        let payload = agent.result_payload(&history(), "write a report").await;

        assert_eq!(payload["taskSummary"], "Just text");
        let names: Vec<&str> = payload["fileList"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["fileName"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["report.md", "data.csv"]);
    }

    #[tokio::test]
    async fn test_model_failure_returns_failure_summary() {
        let model = Arc::new(ScriptedModel::new());
        model.push_answer(Err(anyhow::anyhow!("connection reset")));
        let (agent, _ctx) = summary_agent(model);

        let result = agent.summarize(&history(), "write a report").await;
        assert_eq!(
            result.task_summary,
            Configuration::default().summary.failure_summary
        );
        assert!(result.files.is_empty());
    }

    #[tokio::test]
    async fn test_empty_history_is_not_summarized() {
        let model = Arc::new(ScriptedModel::new());
        let (agent, _ctx) = summary_agent(model);
        let result = agent.summarize(&[], "write a report").await;
        assert_eq!(result, TaskSummaryResult::default());
    }
}
