use crate::prompts::{
    CLARIFICATION_REPLY, GITHUB_AGENT_DESCRIPTION, GOOGLE_SEARCH_AGENT_DESCRIPTION, GREETING_REPLY,
    META_REPLY, ROUTING_PROMPT, render,
};
use devconf_core::{AgentRoutes, DevconfError, Intent, Message, Result, Role};
use devconf_model::{ChatModel, ChatRequest};
use serde::Deserialize;
use std::sync::Arc;

/// Earlier messages shown to the routing model.
const HISTORY_WINDOW: usize = 10;
const HISTORY_LINE_LIMIT: usize = 500;

/// What the supervisor does with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Forward to the remote agent serving this intent.
    Delegate(Intent),
    /// Answer without a remote agent (greetings, meta questions, clarification).
    Direct { reply: String, thinking: Option<String> },
}

impl RoutingDecision {
    pub fn direct(reply: impl Into<String>) -> Self {
        RoutingDecision::Direct { reply: reply.into(), thinking: None }
    }
}

#[derive(Deserialize)]
struct RawDecision {
    route: String,
    #[serde(default)]
    reply: Option<String>,
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    // drop the language tag line
    let inner = inner.split_once('\n').map(|(_, body)| body).unwrap_or(inner);
    inner.trim_end().strip_suffix("```").unwrap_or(inner).trim()
}

fn parse_json_decision(text: &str) -> Option<RoutingDecision> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let raw: RawDecision = serde_json::from_str(text.get(start..=end)?).ok()?;
    let route = raw.route.trim();

    if let Some(intent) = Intent::from_agent_name(route) {
        return Some(RoutingDecision::Delegate(intent));
    }
    if route.eq_ignore_ascii_case("direct") {
        let reply = raw
            .reply
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| CLARIFICATION_REPLY.to_string());
        return Some(RoutingDecision::direct(reply));
    }
    None
}

/// The agent named first in free text, if any.
fn mentioned_agent(text: &str) -> Option<Intent> {
    Intent::ALL
        .into_iter()
        .filter_map(|intent| text.find(intent.agent_name()).map(|pos| (pos, intent)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, intent)| intent)
}

/// Interpret the routing model's output. Accepts the JSON object (optionally
/// fenced), then an agent name anywhere in the text, and otherwise treats the
/// whole text as a direct reply.
pub fn parse_routing_decision(output: &str) -> RoutingDecision {
    let text = strip_code_fence(output);
    if let Some(decision) = parse_json_decision(text) {
        return decision;
    }
    if let Some(intent) = mentioned_agent(text) {
        tracing::debug!(agent = intent.agent_name(), "routing decision taken from free text");
        return RoutingDecision::Delegate(intent);
    }
    if text.is_empty() {
        RoutingDecision::direct(CLARIFICATION_REPLY)
    } else {
        RoutingDecision::direct(text)
    }
}

fn clip(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > HISTORY_LINE_LIMIT {
        let head: String = text.chars().take(HISTORY_LINE_LIMIT).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn history_text(history: &[Message]) -> String {
    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    if recent.is_empty() {
        return "(no earlier messages)".to_string();
    }
    recent
        .iter()
        .map(|m| match m.role {
            Role::User => format!("User: {}", clip(&m.content)),
            Role::Agent => format!("{}: {}", m.author, clip(&m.content)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// LLM-backed intent classification over the configured agent routes.
#[derive(Clone)]
pub struct IntentRouter {
    model: Arc<dyn ChatModel>,
    routes: AgentRoutes,
}

impl IntentRouter {
    pub fn new(model: Arc<dyn ChatModel>, routes: AgentRoutes) -> Self {
        Self { model, routes }
    }

    pub fn routes(&self) -> &AgentRoutes {
        &self.routes
    }

    fn agents_text(&self) -> String {
        let lines: Vec<&str> = self
            .routes
            .iter()
            .map(|route| match route.intent {
                Intent::GoogleSearch => GOOGLE_SEARCH_AGENT_DESCRIPTION,
                Intent::GithubSearch => GITHUB_AGENT_DESCRIPTION,
            })
            .collect();
        if lines.is_empty() {
            "(none available; answer directly)".to_string()
        } else {
            lines.join("\n")
        }
    }

    fn prompt(&self, query: &str, history: &[Message]) -> String {
        let today = chrono::Utc::now().format("%B %d, %Y").to_string();
        render(
            ROUTING_PROMPT,
            &[
                ("today", &today),
                ("greeting", GREETING_REPLY),
                ("meta", META_REPLY),
                ("clarification", CLARIFICATION_REPLY),
                ("agents", &self.agents_text()),
                ("history", &history_text(history)),
                ("query", query),
            ],
        )
    }

    /// Decide who answers `query`. Model failures are returned as
    /// [`DevconfError::Model`].
    pub async fn classify(&self, query: &str, history: &[Message]) -> Result<RoutingDecision> {
        let request = ChatRequest::prompt(self.prompt(query, history)).with_temperature(0.0);
        let response = self.model.complete(request).await.map_err(|e| match e {
            DevconfError::Model(_) => e,
            other => DevconfError::Model(other.to_string()),
        })?;

        let output = response
            .text_content()
            .ok_or_else(|| DevconfError::Model("routing model returned no text".to_string()))?;

        let decision = match parse_routing_decision(output) {
            RoutingDecision::Direct { reply, .. } => {
                RoutingDecision::Direct { reply, thinking: response.reasoning.clone() }
            }
            delegate => delegate,
        };

        match &decision {
            RoutingDecision::Delegate(intent) => {
                tracing::info!(agent = intent.agent_name(), "message routed to remote agent")
            }
            RoutingDecision::Direct { .. } => tracing::info!("message answered directly"),
        }
        Ok(decision)
    }
}
