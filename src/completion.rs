//! Chat completion client
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (Groq by
//! default). Each request carries the fixed system instruction, the prior
//! turns chosen by the caller, and the new user message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::transcript::Turn;
use crate::{Error, Failure, Result};

/// Produces an assistant reply for a user message
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a reply to `user_text`
    ///
    /// `history` holds the earlier turns to send as context; it may be empty.
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable, rejects the request or
    /// returns no usable reply
    async fn complete(&self, history: &[Turn], user_text: &str) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// One message in a chat completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completion API
pub struct ChatCompletionClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    system_prompt: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl ChatCompletionClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client can't be built
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config("completion API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Model used for completions
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionClient {
    async fn complete(&self, history: &[Turn], user_text: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: build_messages(&self.system_prompt, history, user_text),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "completion request failed");
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::Completion(format!("API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response.json().await?;

        let reply = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::Completion("response contained no reply".to_string()))?;

        tracing::debug!(chars = reply.len(), "completion received");
        Ok(reply)
    }

    fn name(&self) -> &'static str {
        "chat-completions"
    }
}

/// Assemble the message list: system instruction, history, then the new message
#[must_use]
pub fn build_messages(system_prompt: &str, history: &[Turn], user_text: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new("system", system_prompt));
    messages.extend(
        history
            .iter()
            .map(|turn| ChatMessage::new(turn.role().as_str(), turn.content())),
    );
    messages.push(ChatMessage::new("user", user_text));
    messages
}

/// Map a completion result onto the failure taxonomy
///
/// # Errors
///
/// Network, HTTP and empty-reply errors become `ServiceUnavailable`;
/// anything else is `Unknown`
pub fn classify_completion(result: Result<String>) -> std::result::Result<String, Failure> {
    result.map_err(|e| match e {
        Error::Http(_) | Error::Completion(_) => Failure::ServiceUnavailable(e.to_string()),
        other => Failure::Unknown(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_without_history() {
        let messages = build_messages("Be brief.", &[], "Bonjour");

        assert_eq!(
            messages,
            [ChatMessage::new("system", "Be brief."), ChatMessage::new("user", "Bonjour")]
        );
    }

    #[test]
    fn history_sits_between_system_and_user() {
        let history = [Turn::user("Salut"), Turn::assistant("Bonjour !")];
        let messages = build_messages("sys", &history, "Ça va ?");

        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[2].content, "Bonjour !");
        assert_eq!(messages[3].content, "Ça va ?");
    }

    #[test]
    fn request_omits_unset_options() {
        let request = ChatCompletionRequest {
            model: "m",
            messages: build_messages("s", &[], "u"),
            max_tokens: None,
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn completion_errors_are_classified() {
        assert!(matches!(
            classify_completion(Err(Error::Completion("503".to_string()))),
            Err(Failure::ServiceUnavailable(_))
        ));
        assert!(matches!(
            classify_completion(Err(Error::Config("bad".to_string()))),
            Err(Failure::Unknown(_))
        ));
        assert_eq!(classify_completion(Ok("ok".to_string())), Ok("ok".to_string()));
    }
}
