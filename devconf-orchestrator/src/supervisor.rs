//! The supervisor pipeline: preprocess, route, forward, postprocess, persist.

use crate::config::OrchestratorConfig;
use crate::context::ContextSummarizer;
use crate::postprocess::Postprocessor;
use crate::preprocess::{Preprocessed, Preprocessor};
use crate::prompts::EMPTY_AGENT_REPLY;
use crate::remote::RemoteAgents;
use crate::routing::{IntentRouter, RoutingDecision};
use devconf_a2a::AgentOutput;
use devconf_core::{APP_NAME, DevconfError, Message, Result, agent_names};
use devconf_model::{ChatModel, OpenAiCompatibleClient, OpenAiCompatibleConfig};
use devconf_session::{GetRequest, SessionStore};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;

pub const ROUTING_PROGRESS: &str = "Routing your question...";

/// One step of a supervisor turn, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    Progress { author: String, message: String },
    /// Reply text. `is_final` marks the complete reply rather than a chunk.
    Content { author: String, content: String, is_final: bool, thinking: Option<String> },
    /// Always last on success; the turn has been persisted.
    Completed(SupervisorReply),
}

/// The finished answer to one user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupervisorReply {
    pub conversation_id: String,
    pub message_id: String,
    pub author: String,
    pub content: String,
    pub thinking: Option<String>,
}

pub type SupervisorEvents = Pin<Box<dyn Stream<Item = Result<SupervisorEvent>> + Send>>;

pub struct SupervisorStream {
    pub conversation_id: String,
    pub message_id: String,
    pub events: SupervisorEvents,
}

struct Inner {
    app_name: String,
    sessions: Arc<dyn SessionStore>,
    router: IntentRouter,
    agents: RemoteAgents,
    summarizer: ContextSummarizer,
    preprocessor: Option<Preprocessor>,
    postprocessor: Option<Postprocessor>,
}

/// Routes user messages to remote agents and records the conversation.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

pub struct SupervisorBuilder {
    app_name: String,
    sessions: Arc<dyn SessionStore>,
    router: IntentRouter,
    agents: RemoteAgents,
    summarizer: ContextSummarizer,
    preprocessor: Option<Preprocessor>,
    postprocessor: Option<Postprocessor>,
}

impl SupervisorBuilder {
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn preprocessor(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.preprocessor = Some(Preprocessor::new(model));
        self
    }

    pub fn postprocessor(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.postprocessor = Some(Postprocessor::new(model));
        self
    }

    pub fn summarizer(mut self, summarizer: ContextSummarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn build(self) -> Supervisor {
        Supervisor {
            inner: Arc::new(Inner {
                app_name: self.app_name,
                sessions: self.sessions,
                router: self.router,
                agents: self.agents,
                summarizer: self.summarizer,
                preprocessor: self.preprocessor,
                postprocessor: self.postprocessor,
            }),
        }
    }
}

fn chat_model(config: &OrchestratorConfig, model: &str) -> Result<Arc<dyn ChatModel>> {
    let client = OpenAiCompatibleClient::new(
        OpenAiCompatibleConfig::new(&config.llm_api_key, model)
            .with_base_url(&config.llm_base_url)
            .with_timeout(config.default_timeout)
            .with_connect_timeout(config.connect_timeout)
            .with_verify_ssl(config.verify_ssl),
    )?;
    Ok(Arc::new(client))
}

impl Supervisor {
    /// Pre- and postprocessing are off and the full history is always forwarded.
    pub fn builder(
        sessions: Arc<dyn SessionStore>,
        router: IntentRouter,
        agents: RemoteAgents,
    ) -> SupervisorBuilder {
        SupervisorBuilder {
            app_name: APP_NAME.to_string(),
            sessions,
            router,
            agents,
            summarizer: ContextSummarizer::disabled(),
            preprocessor: None,
            postprocessor: None,
        }
    }

    /// Wire the OpenAI-compatible models and A2A clients described by `config`.
    pub fn from_config(config: &OrchestratorConfig, sessions: Arc<dyn SessionStore>) -> Result<Self> {
        let supervisor_model = chat_model(config, &config.supervisor_model)?;
        let preprocessing_model = chat_model(config, &config.preprocessing_model)?;

        let routes = config.agent_routes();
        for route in routes.iter() {
            tracing::info!(agent = %route.name, url = %route.base_url, "remote agent configured");
        }
        let agents = RemoteAgents::from_routes(&routes, &config.a2a_client_config())?;
        let router = IntentRouter::new(supervisor_model.clone(), routes);

        let mut builder = Supervisor::builder(sessions, router, agents)
            .app_name(&config.app_name)
            .summarizer(ContextSummarizer::new(
                preprocessing_model.clone(),
                config.summarization_min_chars,
            ));
        if config.preprocessing_enabled {
            builder = builder.preprocessor(preprocessing_model);
        }
        if config.postprocessing_enabled {
            builder = builder.postprocessor(supervisor_model);
        }
        Ok(builder.build())
    }

    pub fn app_name(&self) -> &str {
        &self.inner.app_name
    }

    pub fn agents(&self) -> &RemoteAgents {
        &self.inner.agents
    }

    /// Run one turn and stream its events. Validation and unknown
    /// conversations fail before the stream starts.
    pub async fn handle_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        input: &str,
    ) -> Result<SupervisorStream> {
        self.start(user_id, conversation_id, input, true).await
    }

    /// Run one turn to completion without streaming from the remote agent.
    pub async fn handle_message_collected(
        &self,
        user_id: &str,
        conversation_id: &str,
        input: &str,
    ) -> Result<SupervisorReply> {
        let mut stream = self.start(user_id, conversation_id, input, false).await?;
        while let Some(event) = stream.events.next().await {
            if let SupervisorEvent::Completed(reply) = event? {
                return Ok(reply);
            }
        }
        Err(DevconfError::Internal("supervisor finished without a reply".to_string()))
    }

    async fn start(
        &self,
        user_id: &str,
        conversation_id: &str,
        input: &str,
        streaming: bool,
    ) -> Result<SupervisorStream> {
        let input = input.trim().to_string();
        if input.is_empty() {
            return Err(DevconfError::Validation("Input cannot be empty.".to_string()));
        }

        let conversation = self
            .inner
            .sessions
            .get(GetRequest {
                app_name: self.inner.app_name.clone(),
                user_id: user_id.to_string(),
                conversation_id: conversation_id.to_string(),
            })
            .await?;

        let message_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            conversation_id = %conversation.id,
            message_id = %message_id,
            history = conversation.messages.len(),
            streaming,
            "handling message"
        );

        let events = self.clone().run(
            conversation.id.clone(),
            message_id.clone(),
            input,
            conversation.messages,
            streaming,
        );
        Ok(SupervisorStream { conversation_id: conversation.id, message_id, events })
    }

    async fn preprocess(&self, input: &str) -> Preprocessed {
        let Some(preprocessor) = &self.inner.preprocessor else {
            return Preprocessed::passthrough(input);
        };
        match preprocessor.preprocess(input).await {
            Ok(preprocessed) => preprocessed,
            Err(e) => {
                tracing::warn!(error = %e, "preprocessing failed, using the original query");
                Preprocessed::passthrough(input)
            }
        }
    }

    async fn postprocess(&self, input: &str, reply: &str, language: &str) -> (String, Option<String>) {
        let Some(postprocessor) = &self.inner.postprocessor else {
            return (reply.to_string(), None);
        };
        match postprocessor.review(input, reply, language).await {
            Ok(reviewed) => (reviewed.content, reviewed.thinking),
            Err(e) => {
                tracing::warn!(error = %e, "postprocessing failed, keeping the agent reply");
                (reply.to_string(), None)
            }
        }
    }

    /// User message and reply are appended together once the reply is
    /// complete; failed or abandoned turns leave the history untouched.
    async fn persist(&self, input: &str, reply: &SupervisorReply, streamed: bool) -> Result<()> {
        let sessions = &self.inner.sessions;
        sessions
            .append(&reply.conversation_id, Message::user(&reply.message_id, input))
            .await?;
        sessions
            .append(
                &reply.conversation_id,
                Message::agent(&reply.message_id, &reply.author, &reply.content)
                    .with_thinking(reply.thinking.clone())
                    .with_streamed(streamed),
            )
            .await
    }

    fn run(
        self,
        conversation_id: String,
        message_id: String,
        input: String,
        history: Vec<Message>,
        streaming: bool,
    ) -> SupervisorEvents {
        Box::pin(async_stream::stream! {
            yield Ok(SupervisorEvent::Progress {
                author: agent_names::SUPERVISOR_AGENT.to_string(),
                message: ROUTING_PROGRESS.to_string(),
            });

            let preprocessed = self.preprocess(&input).await;
            let decision = match self.inner.router.classify(&preprocessed.query, &history).await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::error!(error = %e, "routing failed");
                    yield Err(e);
                    return;
                }
            };

            let reply = match decision {
                RoutingDecision::Direct { reply, thinking } => {
                    yield Ok(SupervisorEvent::Content {
                        author: agent_names::SUPERVISOR_AGENT.to_string(),
                        content: reply.clone(),
                        is_final: true,
                        thinking: thinking.clone(),
                    });
                    SupervisorReply {
                        conversation_id: conversation_id.clone(),
                        message_id: message_id.clone(),
                        author: agent_names::SUPERVISOR_AGENT.to_string(),
                        content: reply,
                        thinking,
                    }
                }
                RoutingDecision::Delegate(intent) => {
                    let Some(agent) = self.inner.agents.get(intent).cloned() else {
                        yield Err(DevconfError::DependencyUnavailable(intent.agent_name().to_string()));
                        return;
                    };
                    let author = agent.name().to_string();
                    yield Ok(SupervisorEvent::Progress {
                        author: author.clone(),
                        message: intent.progress_message().to_string(),
                    });

                    let request = self.inner.summarizer.prepare(&history, &preprocessed.query).await;
                    let message = request.into_message(&conversation_id);

                    let mut text = String::new();
                    if streaming {
                        let mut outputs = match agent.stream(message).await {
                            Ok(outputs) => outputs,
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        };
                        while let Some(output) = outputs.next().await {
                            match output {
                                Ok(AgentOutput::Progress(progress)) => {
                                    yield Ok(SupervisorEvent::Progress {
                                        author: author.clone(),
                                        message: progress,
                                    });
                                }
                                Ok(AgentOutput::TextChunk(chunk)) => {
                                    text.push_str(&chunk);
                                    yield Ok(SupervisorEvent::Content {
                                        author: author.clone(),
                                        content: chunk,
                                        is_final: false,
                                        thinking: None,
                                    });
                                }
                                Err(e) => {
                                    tracing::error!(agent = %author, error = %e, "remote agent stream failed");
                                    yield Err(e);
                                    return;
                                }
                            }
                        }
                    } else {
                        match agent.send(message).await {
                            Ok(reply) => text = reply,
                            Err(e) => {
                                tracing::error!(agent = %author, error = %e, "remote agent call failed");
                                yield Err(e);
                                return;
                            }
                        }
                    }

                    let (content, thinking) = if text.trim().is_empty() {
                        tracing::warn!(agent = %author, "remote agent returned an empty reply");
                        (EMPTY_AGENT_REPLY.to_string(), None)
                    } else {
                        self.postprocess(&input, &text, &preprocessed.language).await
                    };

                    if !streaming || content != text {
                        yield Ok(SupervisorEvent::Content {
                            author: author.clone(),
                            content: content.clone(),
                            is_final: true,
                            thinking: thinking.clone(),
                        });
                    }

                    SupervisorReply {
                        conversation_id: conversation_id.clone(),
                        message_id: message_id.clone(),
                        author,
                        content,
                        thinking,
                    }
                }
            };

            if let Err(e) = self.persist(&input, &reply, streaming).await {
                tracing::error!(error = %e, "failed to persist conversation turn");
                yield Err(e);
                return;
            }
            tracing::info!(
                conversation_id = %reply.conversation_id,
                message_id = %reply.message_id,
                author = %reply.author,
                "message handled"
            );
            yield Ok(SupervisorEvent::Completed(reply));
        })
    }
}
