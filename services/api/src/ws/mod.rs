//! ConversationRelay WebSocket handling.
//!
//! - `protocol`: JSON events exchanged with the telephony provider.
//! - `relay`: the per-call state machine driving the conversation.
//! - `session`: the WebSocket connection lifecycle around it.

pub mod protocol;
pub mod relay;
pub mod session;

pub use session::ws_handler;
