//! JSON messages exchanged with the telephony provider's ConversationRelay.

use serde::{Deserialize, Serialize};

/// Messages sent by the provider to the relay.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundEvent {
    /// Opens the relay for a call. Always the first message on a connection.
    #[serde(rename_all = "camelCase")]
    Setup {
        call_sid: String,
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        to: Option<String>,
        #[serde(default)]
        direction: Option<String>,
    },
    /// A transcribed caller utterance.
    #[serde(rename_all = "camelCase")]
    Prompt {
        voice_prompt: String,
        #[serde(default)]
        lang: Option<String>,
        #[serde(default)]
        last: Option<bool>,
    },
    /// The caller spoke over the reply being played.
    #[serde(rename_all = "camelCase")]
    Interrupt {
        #[serde(default)]
        utterance_until_interrupt: Option<String>,
        #[serde(default)]
        duration_until_interrupt_ms: Option<u64>,
    },
    /// Any other message type (`dtmf`, `error`, ...).
    #[serde(other)]
    Unknown,
}

impl InboundEvent {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Messages sent by the relay to the provider.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundEvent {
    /// Text for the provider to speak. `last` marks the end of the reply.
    Text { token: String, last: bool },
}

impl OutboundEvent {
    /// A complete reply sent as a single final chunk.
    pub fn final_text(token: impl Into<String>) -> Self {
        Self::Text {
            token: token.into(),
            last: true,
        }
    }
}
