use async_trait::async_trait;
use devconf_core::Result;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A chat message in OpenAI wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: Some(content.into()), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, content)
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: ChatRole::Assistant, content, tool_calls, tool_call_id: None }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_type(),
            function: FunctionCall { name: name.into(), arguments: arguments.into() },
        }
    }

    /// Arguments parsed as JSON. Malformed or empty arguments become `{}`.
    pub fn parsed_arguments(&self) -> Value {
        serde_json::from_str(&self.function.arguments)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Default::default()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as produced by the model.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: function_type(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Overrides the client's configured model when set.
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, ..Default::default() }
    }

    /// Single user-turn request, the shape used by the prompt-only helpers.
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::user(prompt)])
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), finish_reason: Some("stop".into()), ..Default::default() }
    }

    /// Trimmed text content, `None` when the model produced nothing.
    pub fn text_content(&self) -> Option<&str> {
        self.content.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Incremental piece of a streamed completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatDelta {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

impl From<ChatResponse> for ChatDelta {
    fn from(response: ChatResponse) -> Self {
        let tool_calls = response
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| ToolCallDelta {
                index: index as u32,
                id: Some(call.id),
                name: Some(call.function.name),
                arguments: Some(call.function.arguments),
            })
            .collect();
        Self {
            content: response.content,
            reasoning: response.reasoning,
            tool_calls,
            finish_reason: response.finish_reason,
        }
    }
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatDelta>> + Send>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Streamed completion. The default yields the blocking result as one delta.
    async fn stream(&self, request: ChatRequest) -> Result<ChatStream> {
        let response = self.complete(request).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(ChatDelta::from(response)) })))
    }
}

/// Folds stream deltas back into a full response. Tool call fragments are
/// joined per index.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    reasoning: String,
    tool_calls: BTreeMap<u32, ToolCall>,
    finish_reason: Option<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &ChatDelta) {
        if let Some(content) = &delta.content {
            self.content.push_str(content);
        }
        if let Some(reasoning) = &delta.reasoning {
            self.reasoning.push_str(reasoning);
        }
        for fragment in &delta.tool_calls {
            let entry = self
                .tool_calls
                .entry(fragment.index)
                .or_insert_with(|| ToolCall::new(format!("call_{}", fragment.index), "", ""));
            if let Some(id) = &fragment.id {
                entry.id = id.clone();
            }
            if let Some(name) = &fragment.name {
                entry.function.name.push_str(name);
            }
            if let Some(arguments) = &fragment.arguments {
                entry.function.arguments.push_str(arguments);
            }
        }
        if delta.finish_reason.is_some() {
            self.finish_reason = delta.finish_reason.clone();
        }
    }

    pub fn finish(self) -> ChatResponse {
        ChatResponse {
            content: (!self.content.is_empty()).then_some(self.content),
            reasoning: (!self.reasoning.is_empty()).then_some(self.reasoning),
            tool_calls: self.tool_calls.into_values().collect(),
            finish_reason: self.finish_reason,
        }
    }
}

pub async fn collect_stream(mut stream: ChatStream) -> Result<ChatResponse> {
    let mut accumulator = StreamAccumulator::new();
    while let Some(delta) = stream.next().await {
        accumulator.push(&delta?);
    }
    Ok(accumulator.finish())
}
