use crate::conversation::ReplyGateway;
use crate::message_store::HistoryTurn;
use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const BODY_SNIPPET_CHARS: usize = 200;

pub const EMPTY_REPLY_FALLBACK: &str =
    "I'm sorry, I couldn't find an answer to that just now. Could you rephrase your question?";

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub host: String,
    pub model: String,
    pub api_key: Option<String>,
    pub system: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            api_key: None,
            system: "You are Aura's concierge. Answer warmly and briefly, and only recommend objects from the Aura collection.".to_string(),
            temperature: 0.4,
            max_tokens: 512,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upstream rejected the request with HTTP {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("malformed reply: {0}")]
    Malformed(String),
    #[error("exchange worker failed: {0}")]
    Worker(String),
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Reply gateway backed by an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        // Every exchange runs on its own short-lived runtime, so pooled
        // connections must not outlive the request that opened them.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(0)
            .build()
            .context("Unable to build the HTTP client")?;

        Ok(Self { client, config })
    }

    pub async fn oneshot(&self, prompt: &str) -> Result<String, GatewayError> {
        self.get_reply_text(&[], prompt).await
    }

    async fn get_reply_text(
        &self,
        history: &[HistoryTurn],
        utterance: &str,
    ) -> Result<String, GatewayError> {
        let result = self
            .oneshot_with_messages(self.build_messages(history, utterance))
            .await;

        if let Err(err) = &result {
            tracing::warn!(error = %err, model = %self.config.model, "concierge reply failed");
        }

        result
    }

    pub async fn oneshot_with_messages(
        &self,
        messages: Vec<Message>,
    ) -> Result<String, GatewayError> {
        let req = ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let url = self.url("/v1/chat/completions");
        let bearer = self.config.api_key.as_deref().unwrap_or("ollama");

        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .json(&req)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                url: url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status,
                body: body_snippet(&body),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|source| GatewayError::Transport { url, source })?;

        let out: ChatCompletionsResponse = serde_json::from_str(&body)
            .map_err(|err| {
                GatewayError::Malformed(format!("{err} in body: {}", body_snippet(&body)))
            })?;

        Ok(extract_reply_text(&out))
    }

    pub fn build_messages(&self, history: &[HistoryTurn], utterance: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message {
            role: "system".to_string(),
            content: self.config.system.clone(),
        });

        for turn in history {
            messages.push(Message {
                role: turn.role.as_api_value().to_string(),
                content: turn.text.clone(),
            });
        }

        messages.push(Message {
            role: "user".to_string(),
            content: utterance.to_string(),
        });

        messages
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), path)
    }
}

impl ReplyGateway for ChatClient {
    async fn get_reply(
        &self,
        history: &[HistoryTurn],
        utterance: &str,
    ) -> Result<String, GatewayError> {
        self.get_reply_text(history, utterance).await
    }
}

#[derive(Serialize, Debug)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize, Debug)]
struct AssistantMessage {
    content: Option<String>,
}

// Error bodies end up in warn logs.
fn body_snippet(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(BODY_SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn extract_reply_text(response: &ChatCompletionsResponse) -> String {
    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_deref())
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string())
}
