use crate::traits::{KeywordExtractor, TermExpander};
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use url::Url;

pub const DEFAULT_LLM_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash";

const EXTRACT_PROMPT: &str = "Extract target wood species or synonyms in lowercase English transliteration \
(e.g. акація → acacia). Respond only with a raw JSON array of strings. \
If nothing is found return an empty array.";

const SYNONYM_PROMPT: &str = "For each term provide common synonyms or translations in Ukrainian, \
English and Russian. Respond with a JSON object mapping the term to an array of synonyms.";

#[derive(Debug, Clone)]
pub struct LlmEndpointConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

/// Client for the hosted language model that extracts keywords and expands
/// terms. Without an endpoint config every call fails with `NotConfigured`,
/// which callers treat like any other outage.
pub struct LlmClient {
    client: Client,
    config: Option<LlmEndpointConfig>,
}

impl LlmClient {
    pub fn new(config: Option<LlmEndpointConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let cfg = self.config.as_ref().ok_or(ServiceError::NotConfigured)?;

        let mut url = Url::parse(&format!(
            "{}/v1beta/models/{}:generateContent",
            cfg.endpoint.trim_end_matches('/'),
            cfg.model
        ))?;
        url.query_pairs_mut().append_pair("key", &cfg.api_key);

        let payload = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };

        let response = self.client.post(url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(ServiceError::BackendResponse {
                backend: cfg.model.clone(),
                details: response.status().to_string(),
            });
        }

        let reply: GenerateResponse = response.json().await?;
        reply_text(&reply)
    }
}

#[async_trait]
impl KeywordExtractor for LlmClient {
    async fn extract(&self, text: &str, _known: &[String]) -> Result<Vec<String>, ServiceError> {
        let reply = self.generate(&format!("{EXTRACT_PROMPT}\n\n{text}")).await?;
        parse_keywords(&reply)
    }
}

#[async_trait]
impl TermExpander for LlmClient {
    async fn synonyms(
        &self,
        terms: &[String],
    ) -> Result<HashMap<String, Vec<String>>, ServiceError> {
        let reply = self
            .generate(&format!("{SYNONYM_PROMPT}\n\n{}", terms.join(", ")))
            .await?;
        parse_synonyms(&reply)
    }
}

fn reply_text(reply: &GenerateResponse) -> Result<String, ServiceError> {
    let text = reply
        .candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(ServiceError::MalformedReply("reply had no text".to_string()));
    }
    Ok(text)
}

/// The first well-formed JSON value opening with `open` in `content`.
/// Models wrap answers in prose and code fences, so every candidate position
/// is tried in turn.
fn first_json(content: &str, open: char) -> Option<Value> {
    content
        .char_indices()
        .filter(|(_, c)| *c == open)
        .find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&content[start..])
                .into_iter::<Value>()
                .next()
                .and_then(Result::ok)
        })
}

pub fn parse_keywords(reply: &str) -> Result<Vec<String>, ServiceError> {
    let Some(Value::Array(items)) = first_json(reply, '[') else {
        return Err(ServiceError::MalformedReply(truncate(reply)));
    };

    Ok(items
        .iter()
        .map(|item| match item {
            Value::String(text) => text.trim().to_lowercase(),
            other => other.to_string().to_lowercase(),
        })
        .filter(|keyword| !keyword.is_empty())
        .collect())
}

pub fn parse_synonyms(reply: &str) -> Result<HashMap<String, Vec<String>>, ServiceError> {
    let Some(Value::Object(entries)) = first_json(reply, '{') else {
        return Err(ServiceError::MalformedReply(truncate(reply)));
    };

    Ok(entries
        .into_iter()
        .filter_map(|(term, synonyms)| match synonyms {
            Value::Array(items) => Some((
                term.to_lowercase(),
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.to_lowercase(),
                        other => other.to_string().to_lowercase(),
                    })
                    .collect(),
            )),
            _ => None,
        })
        .collect())
}

/// Local second strategy when extraction is unavailable: every known token
/// that occurs in the lowercased text, in vocabulary order.
pub fn fallback_keywords(text: &str, known: &[String]) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = HashSet::new();
    known
        .iter()
        .map(|token| token.to_lowercase())
        .filter(|token| !token.is_empty() && lowered.contains(token.as_str()))
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

fn truncate(reply: &str) -> String {
    reply.chars().take(120).collect()
}
