use crate::tool::Tool;
use async_trait::async_trait;
use devconf_a2a::{AgentExecutor, AgentOutput, AgentOutputStream, Message, RequestContext};
use devconf_core::{DevconfError, Result};
use devconf_model::{ChatMessage, ChatModel, ChatRequest, StreamAccumulator, ToolCall};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_MAX_TURNS: usize = 8;

/// An LLM with tools behind an A2A endpoint. Each request runs the tool loop:
/// stream a completion, execute any requested tools, feed the results back,
/// until the model answers without tool calls.
pub struct LlmAgent {
    name: String,
    instruction: String,
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    max_turns: usize,
}

pub struct LlmAgentBuilder {
    name: String,
    instruction: String,
    model: Option<Arc<dyn ChatModel>>,
    tools: Vec<Arc<dyn Tool>>,
    max_turns: usize,
}

impl LlmAgentBuilder {
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn build(self) -> Result<LlmAgent> {
        let model = self
            .model
            .ok_or_else(|| DevconfError::Config(format!("agent {} has no model", self.name)))?;
        Ok(LlmAgent {
            name: self.name,
            instruction: self.instruction,
            model,
            tools: self.tools,
            max_turns: self.max_turns,
        })
    }
}

impl LlmAgent {
    pub fn builder(name: impl Into<String>) -> LlmAgentBuilder {
        LlmAgentBuilder {
            name: name.into(),
            instruction: String::new(),
            model: None,
            tools: Vec::new(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub async fn run(&self, ctx: RequestContext) -> Result<AgentOutputStream> {
        let prompt = prompt_from_message(&ctx.message);
        if prompt.trim().is_empty() {
            return Err(DevconfError::Validation("message has no text".to_string()));
        }

        let name = self.name.clone();
        let model = self.model.clone();
        let tools = self.tools.clone();
        let definitions: Vec<_> = tools.iter().map(|t| t.definition()).collect();
        let max_turns = self.max_turns;
        let cancel = ctx.cancel.clone();
        let mut messages = Vec::with_capacity(4);
        if !self.instruction.is_empty() {
            messages.push(ChatMessage::system(self.instruction.clone()));
        }
        messages.push(ChatMessage::user(prompt));

        tracing::info!(agent = %name, task_id = %ctx.task_id, tools = tools.len(), "agent run started");

        let stream = async_stream::stream! {
            for turn in 1..=max_turns {
                if cancel.is_cancelled() {
                    tracing::info!(agent = %name, "agent run canceled");
                    return;
                }

                let request = ChatRequest::new(messages.clone()).with_tools(definitions.clone());
                let mut deltas = match model.stream(request).await {
                    Ok(deltas) => deltas,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                let mut accumulator = StreamAccumulator::new();
                while let Some(delta) = deltas.next().await {
                    let delta = match delta {
                        Ok(delta) => delta,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
                        yield Ok(AgentOutput::TextChunk(text.to_string()));
                    }
                    accumulator.push(&delta);
                }

                let response = accumulator.finish();
                if response.tool_calls.is_empty() {
                    tracing::info!(agent = %name, turns = turn, "agent run finished");
                    return;
                }

                messages.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    response.tool_calls.clone(),
                ));
                for call in &response.tool_calls {
                    yield Ok(AgentOutput::Progress(format!("Running {}...", call.function.name)));
                    let result = execute_tool(&tools, call).await;
                    messages.push(ChatMessage::tool_result(call.id.clone(), result));
                }
            }

            yield Err(DevconfError::Internal(format!(
                "Max iterations ({}) exceeded",
                max_turns
            )));
        };

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl AgentExecutor for LlmAgent {
    async fn execute(&self, ctx: RequestContext) -> Result<AgentOutputStream> {
        self.run(ctx).await
    }
}

/// The text handed to the model: the forwarded context block, if any,
/// followed by the user's question.
pub fn prompt_from_message(message: &Message) -> String {
    match (message.typed_text("context"), message.typed_text("user_message")) {
        (Some(context), Some(question)) => format!("{}\n\n{}", context, question),
        (None, Some(question)) => question.to_string(),
        _ => message.text_content(),
    }
}

/// Run one tool call. Failures are reported to the model as `{"error": ...}`
/// instead of aborting the run.
async fn execute_tool(tools: &[Arc<dyn Tool>], call: &ToolCall) -> String {
    let name = call.function.name.as_str();
    let Some(tool) = tools.iter().find(|t| t.name() == name) else {
        tracing::warn!(tool = %name, "model requested an unknown tool");
        return json!({"error": format!("Unknown tool: {}", name)}).to_string();
    };

    tracing::info!(tool = %name, "executing tool");
    match tool.execute(call.parsed_arguments()).await {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
        Err(e) => {
            tracing::warn!(tool = %name, error = %e, "tool failed");
            json!({"error": e.to_string()}).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devconf_a2a::Part;

    #[test]
    fn test_prompt_from_message() {
        let message = Message::builder()
            .part(Part::typed_text("For context:\nUser previously asked: hi", "context"))
            .part(Part::typed_text("what is axum?", "user_message"))
            .build();
        assert_eq!(
            prompt_from_message(&message),
            "For context:\nUser previously asked: hi\n\nwhat is axum?"
        );

        let plain = Message::builder().part(Part::text("plain question")).build();
        assert_eq!(prompt_from_message(&plain), "plain question");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let call = ToolCall::new("call_1", "rm_rf", "{}");
        let result = execute_tool(&[], &call).await;
        assert_eq!(result, r#"{"error":"Unknown tool: rm_rf"}"#);
    }
}
