use crate::prompts::{PREPROCESSING_PROMPT, render};
use devconf_core::{DevconfError, Result};
use devconf_model::{ChatModel, ChatRequest};
use std::sync::Arc;

pub const DEFAULT_LANGUAGE: &str = "English";

/// A query after language detection and translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub language: String,
    pub query: String,
}

impl Preprocessed {
    /// The query as typed, assumed to be English.
    pub fn passthrough(query: impl Into<String>) -> Self {
        Self { language: DEFAULT_LANGUAGE.to_string(), query: query.into() }
    }
}

/// Split `LANGUAGE: <lang>\n<query>` output. A missing header means English and
/// an empty body means `fallback_query`.
pub fn parse_preprocessing_output(output: &str, fallback_query: &str) -> Preprocessed {
    let output = output.trim();
    let (first, rest) = output.split_once('\n').unwrap_or((output, ""));

    let header = first.trim();
    let language = header
        .get(..9)
        .filter(|prefix| prefix.eq_ignore_ascii_case("language:"))
        .map(|_| header[9..].trim());

    let (language, query) = match language {
        Some(lang) => (lang, rest.trim()),
        None => (DEFAULT_LANGUAGE, output),
    };

    Preprocessed {
        language: if language.is_empty() { DEFAULT_LANGUAGE } else { language }.to_string(),
        query: if query.is_empty() { fallback_query } else { query }.to_string(),
    }
}

/// Detects the query language and translates it to English.
#[derive(Clone)]
pub struct Preprocessor {
    model: Arc<dyn ChatModel>,
}

impl Preprocessor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn preprocess(&self, query: &str) -> Result<Preprocessed> {
        let prompt = render(PREPROCESSING_PROMPT, &[("query", query)]);
        let response = self.model.complete(ChatRequest::prompt(prompt)).await?;
        let output = response
            .text_content()
            .ok_or_else(|| DevconfError::Model("preprocessing returned no text".to_string()))?;

        let preprocessed = parse_preprocessing_output(output, query);
        tracing::info!(language = %preprocessed.language, "query preprocessed");
        Ok(preprocessed)
    }
}
