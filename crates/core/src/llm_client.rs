//! Chat model seam and its OpenAI-compatible implementation.
//!
//! The Gemini API is reached through its OpenAI-compatible endpoint, so a
//! single `async-openai` based client covers it.

use crate::{
    conversation::{Turn, TurnRole},
    error::ProviderError,
};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Base URL of Gemini's OpenAI-compatible API.
pub const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Sampling settings fixed at process start.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-lite".to_string(),
            temperature: 0.7,
            max_output_tokens: 150,
        }
    }
}

/// A model that produces the next reply for a conversation.
///
/// `turns` always ends with the user turn that should be answered.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, turns: &[Turn]) -> Result<String, ProviderError>;
}

/// An implementation of `ChatModel` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    settings: GenerationSettings,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL.
    /// * `settings` - Model name and sampling parameters used on every request.
    pub fn new(config: OpenAIConfig, settings: GenerationSettings) -> Self {
        Self {
            client: Client::with_config(config),
            settings,
        }
    }

    /// Convenience constructor pointing at Gemini's OpenAI-compatible endpoint.
    pub fn gemini(api_key: &str, api_base: &str, settings: GenerationSettings) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self::new(config, settings)
    }

    fn build_messages(
        system_prompt: &str,
        turns: &[Turn],
    ) -> Result<Vec<ChatCompletionRequestMessage>, ProviderError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()?
                .into(),
        );
        for turn in turns {
            let message = match turn.role {
                TurnRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
                TurnRole::Model => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
            };
            messages.push(message);
        }
        Ok(messages)
    }
}

#[async_trait]
impl ChatModel for OpenAICompatibleClient {
    #[allow(deprecated)]
    async fn complete(&self, system_prompt: &str, turns: &[Turn]) -> Result<String, ProviderError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(Self::build_messages(system_prompt, turns)?)
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_output_tokens)
            .n(1)
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyReply)
    }
}

/// A `ChatModel` with predictable output for development and testing.
///
/// Queued replies are returned first, in order. Once the queue is empty the
/// model echoes the last user turn along with how many turns it was shown.
#[derive(Default)]
pub struct ScriptedChatModel {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
}

impl ScriptedChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model that answers with `replies` before falling back to echoing.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
        }
    }

    /// Queues a single outcome, which may be a failure.
    pub async fn push(&self, outcome: Result<String, ProviderError>) {
        self.replies.lock().await.push_back(outcome);
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, _system_prompt: &str, turns: &[Turn]) -> Result<String, ProviderError> {
        if let Some(outcome) = self.replies.lock().await.pop_front() {
            return outcome;
        }
        let last = turns.last().map(|t| t.text.as_str()).unwrap_or_default();
        Ok(format!("[{} turns] you said: {}", turns.len(), last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_start_with_system_prompt_and_keep_turn_order() {
        let turns = vec![
            Turn::user("hi"),
            Turn::model("hello there"),
            Turn::user("what's on sale?"),
        ];
        let messages = OpenAICompatibleClient::build_messages("be brief", &turns).unwrap();

        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn default_settings_match_low_latency_profile() {
        let settings = GenerationSettings::default();
        assert_eq!(settings.model, "gemini-2.5-flash-lite");
        assert_eq!(settings.max_output_tokens, 150);
        assert!((settings.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn scripted_model_replays_queue_then_echoes() {
        let model = ScriptedChatModel::with_replies(["first"]);
        model.push(Err(ProviderError::EmptyReply)).await;

        let turns = vec![Turn::user("ping")];
        assert_eq!(model.complete("", &turns).await.unwrap(), "first");
        assert_eq!(
            model.complete("", &turns).await,
            Err(ProviderError::EmptyReply)
        );
        assert_eq!(
            model.complete("", &turns).await.unwrap(),
            "[1 turns] you said: ping"
        );
    }
}
