//! Provider-independent core of the call relay: conversation handles, the
//! chat model seam and the per-call session registry.

pub mod conversation;
pub mod error;
pub mod llm_client;
pub mod registry;

pub use conversation::{Conversation, ConversationClient, Turn, TurnRole};
pub use error::ProviderError;
pub use llm_client::{ChatModel, GenerationSettings, OpenAICompatibleClient, ScriptedChatModel};
pub use registry::{SessionRegistry, SharedConversation};
