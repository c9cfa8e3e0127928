//! Prompt templates for the supervisor's own model calls.
//!
//! Placeholders are `{name}` and are filled with [`render`].

pub const GREETING_REPLY: &str =
    "Hello! I'm here to help you with your technical questions. What can I assist you with today?";

pub const META_REPLY: &str = "I'm an AI assistant. I can help you with technical topics, documentation, and troubleshooting. How may I help you?";

pub const CLARIFICATION_REPLY: &str =
    "Could you please provide more details about what you need help with?";

pub const EMPTY_AGENT_REPLY: &str =
    "No response was generated from the subagent. Please try again or rephrase your question.";

pub const PREPROCESSING_PROMPT: &str = r#"Prepare the user's query for a routing assistant.

User query: {query}

1. Detect the language of the query (English, German, Chinese, Spanish, French, ...).
2. If the query is not in English, translate it to English. Keep technical terms
   such as "Kubernetes", "Linux" or "Python" unchanged and preserve the intent.
3. Fix obvious typos so the query is clear and specific.

Answer in exactly this format:
LANGUAGE: <detected language>
<the English query>

Example:
LANGUAGE: German
What is Linux?"#;

pub const ROUTING_PROMPT: &str = r#"Today's date: {today}.

You route technical questions to specialised agents.

Answer some messages yourself instead of routing them:
- Greetings ("Hi", "Hello", "Good morning"): reply "{greeting}"
- Acknowledgements ("Thanks", "OK", "Goodbye"): reply briefly and politely
- Questions about yourself ("Who are you?", "What model are you?", "What can you do?"): reply "{meta}"
- Input too short or vague to act on: reply "{clarification}"

Available agents:
{agents}

Use the conversation so far to resolve references such as "it" or "that repo".

Conversation so far:
{history}

Current query (already translated to English): {query}

Answer with a single JSON object and nothing else:
{"route": "<agent name or direct>", "reply": "<your reply when route is direct, otherwise empty>"}"#;

pub const GOOGLE_SEARCH_AGENT_DESCRIPTION: &str = "google_search_agent: searches the web. Use it for news, documentation, how-to questions and general technical knowledge.";

pub const GITHUB_AGENT_DESCRIPTION: &str = "github_agent: analyses GitHub. Use it for repositories, stars, contributors, issues, pull requests and releases.";

pub const POSTPROCESSING_PROMPT: &str = r#"You review an assistant's answer before it is shown to the user.

User question: {query}
Language of the user: {language}

Answer to review (in English):
{reply}

1. Check the answer for accuracy, completeness and a professional tone. Improve
   clarity and formatting where needed, but keep every fact, link and code block.
2. If the answer reports an error, explain it in a user-friendly way.
3. If the user's language is English, return the reviewed answer. Otherwise
   translate it into {language}, keeping technical terms in English.

Return only the final answer."#;

pub const SUMMARIZATION_PROMPT: &str = r#"Condense a conversation into context for an AI agent.

Conversation history:
{history}

Last user input:
{input}

1. Summarise the history concisely. Keep every identifier (repository names,
   version numbers, error codes, commands, file paths) and the key facts and
   outcomes. Drop filler.
2. Keep the last user input exactly as written unless it refers back to the
   history ("it", "that one", "the previous", "also"). In that case replace only
   the ambiguous reference with what it refers to.

Output format:
Context Summary: <summary>
###USER INPUT### <last user input>"#;

/// Replace each `{key}` in `template` with its value.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}
