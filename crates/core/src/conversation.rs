//! Conversation handles and the client that advances them.
//!
//! A `Conversation` owns the turn history of one phone call. The
//! `ConversationClient` holds no per-call state: it takes a conversation,
//! asks the model for the next reply and records both turns on success.

use crate::{error::ProviderError, llm_client::ChatModel};
use std::{sync::Arc, time::Duration};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

/// A single utterance in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// The running state of one multi-turn exchange with the model.
#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: Arc<str>,
    history: Vec<Turn>,
}

impl Conversation {
    /// Starts an empty conversation seeded with `system_prompt`.
    pub fn new(system_prompt: Arc<str>) -> Self {
        Self {
            system_prompt,
            history: Vec::new(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Completed turns, oldest first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }
}

/// Issues request/response exchanges against a `ChatModel`.
pub struct ConversationClient {
    model: Arc<dyn ChatModel>,
    system_prompt: Arc<str>,
    timeout: Duration,
}

impl ConversationClient {
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: impl Into<Arc<str>>, timeout: Duration) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            timeout,
        }
    }

    /// Creates a fresh conversation handle using this client's system prompt.
    pub fn start_conversation(&self) -> Conversation {
        Conversation::new(self.system_prompt.clone())
    }

    /// Sends `utterance` and returns the model's reply.
    ///
    /// On success the utterance and the reply are appended to the
    /// conversation history. On failure the history is left untouched.
    pub async fn send(
        &self,
        conversation: &mut Conversation,
        utterance: &str,
    ) -> Result<String, ProviderError> {
        conversation.history.push(Turn::user(utterance));

        let call = self
            .model
            .complete(&conversation.system_prompt, &conversation.history);
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(reply) if reply.trim().is_empty() => {
                conversation.history.pop();
                Err(ProviderError::EmptyReply)
            }
            Ok(reply) => {
                debug!(turns = conversation.history.len() + 1, "Model replied");
                conversation.history.push(Turn::model(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                conversation.history.pop();
                Err(e)
            }
        }
    }
}
