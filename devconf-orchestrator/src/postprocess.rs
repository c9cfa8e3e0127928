use crate::prompts::{POSTPROCESSING_PROMPT, render};
use devconf_core::{DevconfError, Result};
use devconf_model::{ChatModel, ChatRequest};
use std::sync::Arc;

/// Output of the review pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewed {
    pub content: String,
    pub thinking: Option<String>,
}

/// Reviews a remote agent's reply and translates it into the user's language.
#[derive(Clone)]
pub struct Postprocessor {
    model: Arc<dyn ChatModel>,
}

impl Postprocessor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn review(&self, query: &str, reply: &str, language: &str) -> Result<Reviewed> {
        let prompt = render(
            POSTPROCESSING_PROMPT,
            &[("query", query), ("language", language), ("reply", reply)],
        );
        let response = self.model.complete(ChatRequest::prompt(prompt)).await?;
        let content = response
            .text_content()
            .ok_or_else(|| DevconfError::Model("postprocessing returned no text".to_string()))?
            .to_string();

        tracing::debug!(language, changed = content != reply.trim(), "reply postprocessed");
        Ok(Reviewed { content, thinking: response.reasoning })
    }
}
