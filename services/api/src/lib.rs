//! Call Relay API Library Crate
//!
//! This library contains the web service that connects a phone call to a
//! language model: configuration, shared state, HTTP handlers, the Twilio
//! client, TwiML rendering and the ConversationRelay WebSocket. The binaries
//! are thin wrappers around it.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod telephony;
pub mod twiml;
pub mod ws;
