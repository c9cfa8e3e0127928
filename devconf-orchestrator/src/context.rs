//! Conversation context forwarded to remote agents.
//!
//! A remote agent receives one A2A message per turn. Earlier turns travel in a
//! leading text part typed `context`; the query itself is typed `user_message`.
//! Long histories are condensed by an LLM first.

use crate::prompts::{SUMMARIZATION_PROMPT, render};
use devconf_a2a::{Message as A2aMessage, Part};
use devconf_core::{DevconfError, Message, Result, Role};
use devconf_model::{ChatModel, ChatRequest};
use std::sync::Arc;

pub const CONTEXT_PART: &str = "context";
pub const USER_MESSAGE_PART: &str = "user_message";
pub const CONTEXT_HEADER: &str = "For context:";
pub const SUMMARY_DELIMITER: &str = "###USER INPUT###";

/// Text parts for one remote agent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub context: Option<String>,
    pub query: String,
}

impl AgentRequest {
    pub fn into_message(self, context_id: &str) -> A2aMessage {
        let mut builder = A2aMessage::builder().context_id(context_id);
        if let Some(context) = self.context {
            builder = builder.part(Part::typed_text(context, CONTEXT_PART));
        }
        builder.part(Part::typed_text(self.query, USER_MESSAGE_PART)).build()
    }

    /// Length in characters, not bytes.
    fn char_count(&self) -> usize {
        self.context.as_deref().map_or(0, |c| c.chars().count()) + self.query.chars().count()
    }
}

/// `For context:` block with one line per earlier message, or `None` for a
/// fresh conversation.
pub fn context_text(history: &[Message]) -> Option<String> {
    let lines: Vec<String> = history
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| match m.role {
            Role::User => format!("User previously asked: {}", m.content.trim()),
            Role::Agent => format!("[{}] replied: {}", m.author, m.content.trim()),
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(format!("{}\n{}", CONTEXT_HEADER, lines.join("\n")))
    }
}

/// Split `Context Summary: ...\n###USER INPUT### ...` into the summary and the
/// (possibly rewritten) input. `None` when either half is missing.
pub fn parse_summary_output(output: &str) -> Option<(String, String)> {
    let (summary, input) = output.split_once(SUMMARY_DELIMITER)?;
    let (summary, input) = (summary.trim(), input.trim());
    if summary.is_empty() || input.is_empty() {
        return None;
    }
    Some((summary.to_string(), input.to_string()))
}

#[derive(Clone)]
pub struct ContextSummarizer {
    model: Option<Arc<dyn ChatModel>>,
    min_chars: usize,
}

impl ContextSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, min_chars: usize) -> Self {
        Self { model: Some(model), min_chars }
    }

    /// Forward the full history every time.
    pub fn disabled() -> Self {
        Self { model: None, min_chars: usize::MAX }
    }

    /// Build the request for `query`, condensing the history when it is long.
    /// Summarisation failures fall back to the full history.
    pub async fn prepare(&self, history: &[Message], query: &str) -> AgentRequest {
        let request = AgentRequest { context: context_text(history), query: query.to_string() };

        let (Some(model), Some(context)) = (&self.model, request.context.as_deref()) else {
            return request;
        };
        if request.char_count() < self.min_chars {
            return request;
        }

        match self.summarize(model.as_ref(), context, query).await {
            Ok((summary, query)) => {
                tracing::info!(
                    original_chars = request.char_count(),
                    summary_chars = summary.chars().count(),
                    "conversation context summarized"
                );
                AgentRequest { context: Some(format!("{}\n{}", CONTEXT_HEADER, summary)), query }
            }
            Err(e) => {
                tracing::warn!(error = %e, "context summarization failed, forwarding full history");
                request
            }
        }
    }

    async fn summarize(
        &self,
        model: &dyn ChatModel,
        context: &str,
        query: &str,
    ) -> Result<(String, String)> {
        let history = context.strip_prefix(CONTEXT_HEADER).unwrap_or(context).trim();
        let prompt = render(SUMMARIZATION_PROMPT, &[("history", history), ("input", query)]);
        let response = model.complete(ChatRequest::prompt(prompt)).await?;
        let output = response
            .text_content()
            .ok_or_else(|| DevconfError::Model("summarization returned no text".to_string()))?;
        parse_summary_output(output).ok_or_else(|| {
            DevconfError::Model(format!("summary is missing the {} delimiter", SUMMARY_DELIMITER))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use devconf_model::ChatResponse;

    struct SummaryModel;

    #[async_trait]
    impl ChatModel for SummaryModel {
        fn name(&self) -> &str {
            "summary"
        }

        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse::text("Context Summary: short\n###USER INPUT### rewritten"))
        }
    }

    fn history() -> Vec<Message> {
        vec![
            Message::user("m1", "Who maintains tokio?"),
            Message::agent("m1", "github_agent", "The tokio-rs organisation."),
        ]
    }

    #[test]
    fn test_context_text_lines() {
        assert_eq!(
            context_text(&history()).unwrap(),
            "For context:\nUser previously asked: Who maintains tokio?\n[github_agent] replied: The tokio-rs organisation."
        );
        assert_eq!(context_text(&[]), None);
    }

    #[test]
    fn test_parse_summary_output() {
        let (summary, input) =
            parse_summary_output("Context Summary: user asked about tokio\n###USER INPUT### How many stars does tokio have?")
                .unwrap();
        assert_eq!(summary, "Context Summary: user asked about tokio");
        assert_eq!(input, "How many stars does tokio have?");

        assert!(parse_summary_output("Context Summary: no delimiter").is_none());
        assert!(parse_summary_output("###USER INPUT###   ").is_none());
    }

    #[test]
    fn test_message_parts_are_typed() {
        let request =
            AgentRequest { context: Some("For context:\nx".into()), query: "stars?".into() };
        let message = request.into_message("conv-1");
        assert_eq!(message.context_id.as_deref(), Some("conv-1"));
        assert_eq!(message.parts.len(), 2);
        assert_eq!(message.typed_text(CONTEXT_PART), Some("For context:\nx"));
        assert_eq!(message.typed_text(USER_MESSAGE_PART), Some("stars?"));
    }

    #[tokio::test]
    async fn test_disabled_summarizer_keeps_history() {
        let request = ContextSummarizer::disabled().prepare(&history(), "and its license?").await;
        assert_eq!(request.query, "and its license?");
        assert!(request.context.unwrap().contains("[github_agent] replied"));
    }

    #[tokio::test]
    async fn test_threshold_counts_characters_not_bytes() {
        let history = vec![Message::user("m1", "日本語のドキュメントはありますか")];
        let request = AgentRequest { context: context_text(&history), query: "ü".to_string() };
        let chars = request.char_count();
        assert!(chars < request.context.as_deref().unwrap().len());

        let below = ContextSummarizer::new(Arc::new(SummaryModel), chars + 1);
        let kept = below.prepare(&history, "ü").await;
        assert_eq!(kept, request);

        let at = ContextSummarizer::new(Arc::new(SummaryModel), chars);
        let summarized = at.prepare(&history, "ü").await;
        assert_eq!(summarized.query, "rewritten");
        assert_eq!(summarized.context.as_deref(), Some("For context:\nContext Summary: short"));
    }
}
